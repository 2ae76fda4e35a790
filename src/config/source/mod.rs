//! `config` crate sources reading the TOML config file.
//!
//! The file holds global keys at its root and one table per profile:
//!
//! ```toml
//! version = 1
//! base_url = "https://api.example.com"
//!
//! [default]
//! auth_type = "basic"
//! username = "rob"
//! ```

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use config::{ConfigError, Value, ValueKind};
pub use global::GlobalConfigSource;
pub use profile::ProfileConfigSource;

pub mod global;
pub mod profile;

#[derive(thiserror::Error, Debug)]
pub enum ConfigSourceError {
    #[error("Failed to read file {}: {}", .0.display(), .1)]
    FailedToReadFile(PathBuf, std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    FailedToParseTOML(#[from] toml::de::Error),

    #[error("Invalid root, was expecting table")]
    InvalidRootExpectedTable,

    #[error("Invalid profile, was expecting table")]
    InvalidProfileExpectedTable,
}

impl From<ConfigSourceError> for ConfigError {
    fn from(error: ConfigSourceError) -> Self {
        ConfigError::Foreign(Box::new(error))
    }
}

fn config_value_from_toml_file(
    origin: impl Into<String>,
    source: impl AsRef<Path>,
    root_extractor: impl FnOnce(toml::Table) -> Result<toml::Table, ConfigSourceError>,
) -> Result<HashMap<String, Value>, ConfigSourceError> {
    let source = source.as_ref();
    let origin = origin.into();

    let file_content = std::fs::read_to_string(source)
        .map_err(|e| ConfigSourceError::FailedToReadFile(source.to_path_buf(), e))?;

    let toml_config: toml::Value =
        toml::from_str(&file_content).map_err(ConfigSourceError::FailedToParseTOML)?;

    let toml::Value::Table(toml_root) = toml_config else {
        return Err(ConfigSourceError::InvalidRootExpectedTable);
    };

    let root = root_extractor(toml_root)?;

    // Only scalar values are settings; nested tables are profiles.
    let mut config_value = HashMap::new();
    for (key, value) in root {
        let value_kind = match value {
            toml::Value::String(s) => Some(ValueKind::String(s)),
            toml::Value::Integer(i) => Some(ValueKind::I64(i)),
            toml::Value::Float(f) => Some(ValueKind::Float(f)),
            toml::Value::Boolean(b) => Some(ValueKind::Boolean(b)),
            toml::Value::Array(_) | toml::Value::Datetime(_) | toml::Value::Table(_) => None,
        };

        if let Some(value_kind) = value_kind {
            config_value.insert(key, Value::new(Some(&origin), value_kind));
        }
    }

    Ok(config_value)
}
