use std::{collections::HashMap, path::PathBuf};

use config::{ConfigError, Source, Value};

use super::{ConfigSourceError, config_value_from_toml_file};

/// The keys of one profile table. A profile missing from the file yields no
/// keys rather than an error.
#[derive(Clone, Debug)]
pub struct ProfileConfigSource {
    source: PathBuf,
    profile_name: String,
}

impl ProfileConfigSource {
    pub fn new(source: impl Into<PathBuf>, profile_name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            profile_name: profile_name.into(),
        }
    }
}

impl Source for ProfileConfigSource {
    fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
        Box::new((*self).clone())
    }

    fn collect(&self) -> Result<HashMap<String, Value>, ConfigError> {
        let config = config_value_from_toml_file(
            self.profile_name.clone(),
            &self.source,
            |mut toml_config| match toml_config.remove(&self.profile_name) {
                Some(toml::Value::Table(profile_config)) => Ok(profile_config),
                Some(_) => Err(ConfigSourceError::InvalidProfileExpectedTable),
                None => Ok(toml::Table::new()),
            },
        )?;

        Ok(config)
    }
}
