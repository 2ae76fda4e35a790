use std::{collections::HashMap, path::PathBuf};

use config::{ConfigError, Source, Value};

use super::config_value_from_toml_file;

/// The keys at the root of the config file, shared by every profile.
#[derive(Clone, Debug)]
pub struct GlobalConfigSource {
    source: PathBuf,
}

impl GlobalConfigSource {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

impl Source for GlobalConfigSource {
    fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
        Box::new((*self).clone())
    }

    fn collect(&self) -> Result<HashMap<String, Value>, ConfigError> {
        Ok(config_value_from_toml_file("global", &self.source, Ok)?)
    }
}
