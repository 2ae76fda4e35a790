use std::path::PathBuf;

use thiserror::Error;

/// Name of the directory holding this crate's config under the platform
/// config directory.
const CONFIG_DIR_NAME: &str = "webclient-auth";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigDirError {
    #[error("Could not determine config directory")]
    CouldNotDetermineConfigDir,
}

/// Get the path to the config directory for the current platform
///
/// On macOS, this is `~/Library/Application Support/webclient-auth`
/// On Linux, this is `~/.config/webclient-auth`
/// On Windows, this is `%APPDATA%\webclient-auth`
pub fn config_directory() -> Result<PathBuf, ConfigDirError> {
    let config_dir = dirs::config_dir().ok_or(ConfigDirError::CouldNotDetermineConfigDir)?;
    Ok(config_dir.join(CONFIG_DIR_NAME))
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigFilePathError {
    #[error("Could not determine config file path")]
    CouldNotDetermineConfigDir {
        #[from]
        source: ConfigDirError,
    },
}

/// Get the path to the config file for the current platform
///
/// On Linux, this is `~/.config/webclient-auth/config.toml`
pub fn config_file() -> Result<PathBuf, ConfigFilePathError> {
    Ok(config_directory()?.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_lives_in_the_config_directory() {
        // Some CI containers have no home directory; nothing to check there.
        let (Ok(dir), Ok(file)) = (config_directory(), config_file()) else {
            return;
        };
        assert!(dir.ends_with(CONFIG_DIR_NAME));
        assert_eq!(file.parent(), Some(dir.as_path()));
        assert_eq!(file.file_name().and_then(|n| n.to_str()), Some("config.toml"));
    }
}
