use std::path::PathBuf;

use providerfs::config::default_settings_path;

use crate::cli::{Cli, Command};

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub command: Command,
    pub settings_path: PathBuf,
}

impl From<Cli> for RuntimeConfig {
    fn from(cli: Cli) -> Self {
        Self {
            command: cli.command,
            settings_path: cli.config.unwrap_or_else(default_settings_path),
        }
    }
}
