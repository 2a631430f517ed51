//! Optional YAML settings for the command line front end.

mod settings;

pub use settings::{DeleteSettings, Settings, SettingsError, default_settings_path};
