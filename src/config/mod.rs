use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment};

use serde::Deserialize;
use source::{GlobalConfigSource, ProfileConfigSource};

use crate::path::ConfigFilePathError;

pub mod source;

/// The only config file version this crate understands.
pub const SUPPORTED_CONFIG_VERSION: u32 = 1;

/// Prefix of the environment variables overriding file settings, e.g.
/// `WEBCLIENT_AUTH_BASE_URL`.
pub const ENV_PREFIX: &str = "WEBCLIENT_AUTH";

#[derive(thiserror::Error, Debug)]
pub enum LoadConfigError {
    #[error("Failed to get config file path: {0}")]
    FailedToGetConfigFilePath(#[from] ConfigFilePathError),

    #[error("Failed to build config: {0}")]
    FailedToBuildConfig(#[from] ConfigError),

    #[error("Unsupported config version: {0}")]
    UnsupportedConfigVersion(u32),
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL that relative request paths resolve against
    pub base_url: Option<String>,
    /// Timeout for each underlying exchange, in seconds
    pub timeout_secs: Option<u64>,

    /// The authentication type to use
    pub auth_type: Option<AuthType>,
    /// Username for basic and digest authentication
    pub username: Option<String>,
    /// Password for basic and digest authentication
    pub password: Option<String>,

    /// Bearer token attached to every request
    pub access_token: Option<String>,
    /// Refresh token used to obtain a new access token after a 401
    pub refresh_token: Option<String>,
    /// OAuth2 client ID
    pub client_id: Option<String>,
    /// OAuth2 client secret, for the client credentials grant
    pub client_secret: Option<String>,
    /// OAuth2 token endpoint
    pub token_endpoint: Option<String>,
    /// Scope requested when refreshing
    pub scope: Option<String>,
}

impl ClientConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub enum AuthType {
    /// Basic credentials, sent only after a 401
    #[serde(rename = "basic")]
    Basic,
    /// Digest credentials, answering a 401 challenge
    #[serde(rename = "digest")]
    Digest,
    /// Bearer token, refreshed after a 401
    #[serde(rename = "bearer")]
    Bearer,
}

impl AuthType {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthType::Basic => "basic",
            AuthType::Digest => "digest",
            AuthType::Bearer => "bearer",
        }
    }
}

/// Load the config from the default file and environment variables for a given profile
/// If no profile name is provided, the default profile is loaded
pub fn load_config(profile_name: Option<&str>) -> Result<ClientConfig, LoadConfigError> {
    let config_file_path = crate::path::config_file()?;
    load_config_from_file(config_file_path, true, profile_name)
}

/// Load the config for a given file and profile, optionally loading environment variables
pub fn load_config_from_file(
    config_file_path: impl AsRef<Path>,
    load_environment_variables: bool,
    profile_name: Option<&str>,
) -> Result<ClientConfig, LoadConfigError> {
    let config_file_path = config_file_path.as_ref();

    // Layers (from lowest to highest precedence):
    // 1. Global keys at the root of the file
    // 2. The profile table
    // 3. WEBCLIENT_AUTH_* environment variables (optionally loaded for testing)
    let mut config_builder = Config::builder()
        .add_source(GlobalConfigSource::new(config_file_path))
        .add_source(ProfileConfigSource::new(
            config_file_path,
            profile_name.unwrap_or("default"),
        ));

    if load_environment_variables {
        config_builder = config_builder.add_source(Environment::with_prefix(ENV_PREFIX));
    }

    let config = config_builder.build()?;

    let config_version = config
        .get::<u32>("version")
        .map_err(|_| LoadConfigError::UnsupportedConfigVersion(0))?;
    if config_version != SUPPORTED_CONFIG_VERSION {
        return Err(LoadConfigError::UnsupportedConfigVersion(config_version));
    }

    Ok(config.try_deserialize::<ClientConfig>()?)
}
