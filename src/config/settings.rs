use compio::{fs::File, io::AsyncReadExt, io::BufReader};
use hashlink::LinkedHashMap;
use saphyr::{LoadableYamlNode, Scalar, Yaml};
use snafu::prelude::*;
use std::{
    borrow::Cow,
    io::{self, Cursor},
    path::{Path, PathBuf},
};
use tracing::{debug, info};

use clap::ValueEnum;

use crate::{ext::BestEffortPathExt, operation::OperationOptions, ordering::SortOrder};

const SETTINGS_FILE_NAME: &str = "providerfs.yaml";

pub fn default_settings_path() -> PathBuf {
    PathBuf::from(SETTINGS_FILE_NAME)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteSettings {
    pub force: bool,
    pub progress: bool,
    pub count_bytes: bool,
}

impl Default for DeleteSettings {
    fn default() -> Self {
        Self {
            force: false,
            progress: true,
            count_bytes: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub order: SortOrder,
    pub delete: DeleteSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            order: SortOrder::NameAsc,
            delete: DeleteSettings::default(),
        }
    }
}

impl Settings {
    /// Reads the settings file at `path`. A missing file yields the defaults.
    pub async fn read(path: &Path) -> Result<Self, SettingsError> {
        debug!("Opening settings file: {}", path.best_effort_path_display());
        let file = match File::open(path).await {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!(
                    "No settings file at {}, using defaults",
                    path.best_effort_path_display()
                );
                return Ok(Settings::default());
            }
            Err(err) => {
                return Err(err).context(ReadSnafu {
                    file_path: path.best_effort_path_display(),
                });
            }
        };

        let cursor = Cursor::new(file);
        let mut reader = BufReader::new(cursor);
        let res = reader.read_to_string(String::new()).await;
        match res.0 {
            Ok(n) => debug!("Read settings file: {n} bytes"),
            Err(err) => {
                return Err(err).context(ReadSnafu {
                    file_path: path.best_effort_path_display(),
                });
            }
        }
        res.1.as_str().try_into()
    }

    pub fn operation_options(&self) -> OperationOptions {
        OperationOptions {
            report_progress: self.delete.progress,
            count_bytes: self.delete.count_bytes,
        }
    }

    fn parse_order(top_level: &LinkedHashMap<Yaml, Yaml>) -> Result<SortOrder, SettingsError> {
        let Some(value) = top_level.get(&key("order")) else {
            return Ok(Settings::default().order);
        };
        let order = value.as_str().context(InvalidOrderSnafu {
            value: format!("{value:?}"),
        })?;
        SortOrder::from_str(order, true)
            .ok()
            .context(InvalidOrderSnafu { value: order })
    }

    fn parse_delete(
        top_level: &LinkedHashMap<Yaml, Yaml>,
    ) -> Result<DeleteSettings, SettingsError> {
        let defaults = DeleteSettings::default();
        let Some(section) = top_level.get(&key("delete")) else {
            return Ok(defaults);
        };
        if is_null(section) {
            return Ok(defaults);
        }
        let section = section.as_mapping().context(DeleteNotMapSnafu)?;

        Ok(DeleteSettings {
            force: flag(section, "force", defaults.force)?,
            progress: flag(section, "progress", defaults.progress)?,
            count_bytes: flag(section, "count_bytes", defaults.count_bytes)?,
        })
    }
}

fn key(name: &'static str) -> Yaml<'static> {
    Yaml::Value(Scalar::String(Cow::Borrowed(name)))
}

fn is_null(value: &Yaml) -> bool {
    matches!(value, Yaml::Value(Scalar::Null))
}

fn flag(
    section: &LinkedHashMap<Yaml, Yaml>,
    name: &'static str,
    default: bool,
) -> Result<bool, SettingsError> {
    match section.get(&key(name)) {
        None => Ok(default),
        Some(Yaml::Value(Scalar::Boolean(value))) => Ok(*value),
        Some(_) => NotABooleanSnafu { key: name }.fail(),
    }
}

impl TryFrom<&str> for Settings {
    type Error = SettingsError;

    fn try_from(contents: &str) -> Result<Self, Self::Error> {
        let documents = Yaml::load_from_str(contents).context(ParseSnafu)?;
        let Some(document) = documents.first() else {
            debug!("Settings file is empty, using defaults");
            return Ok(Settings::default());
        };
        if is_null(document) {
            return Ok(Settings::default());
        }

        let top_level = document.as_mapping().context(TopLevelNotMapSnafu)?;
        Ok(Settings {
            order: Self::parse_order(top_level)?,
            delete: Self::parse_delete(top_level)?,
        })
    }
}

#[derive(Debug, Snafu)]
pub enum SettingsError {
    #[snafu(display("Failed to read the settings file: {}", file_path))]
    ReadError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("Failed to parse the settings file"))]
    ParseError { source: saphyr::ScanError },
    #[snafu(display("Top level of the settings file should be a map"))]
    TopLevelNotMap,
    #[snafu(display("Unknown sort order '{}'", value))]
    InvalidOrder { value: String },
    #[snafu(display("The delete section should be a map"))]
    DeleteNotMap,
    #[snafu(display("Setting 'delete.{}' should be true or false", key))]
    NotABoolean { key: &'static str },
}
