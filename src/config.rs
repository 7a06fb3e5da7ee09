//! `~/.keybox/keybox.conf`: the only configuration this crate has, a single
//! `path` override for where the keybox file lives.
//!
//! Resolution order (highest precedence first): `--path` CLI flag,
//! `KEYBOX_FILE` environment variable, this config file, then the default
//! `~/.keybox/keybox.safe`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONFIG_ENV: &str = "KEYBOX_CONFIG";
const FILE_ENV: &str = "KEYBOX_FILE";
const APP_DIR: &str = ".keybox";
const CONFIG_FILE_NAME: &str = "keybox.conf";
const DEFAULT_KEYBOX_FILE_NAME: &str = "keybox.safe";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to determine the home directory")]
    HomeDirUnavailable,

    #[error("io error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FileConfig {
    keybox: KeyboxSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct KeyboxSection {
    path: Option<PathBuf>,
}

pub fn config_path() -> Result<PathBuf, ConfigError> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }
    let mut dir = dirs::home_dir().ok_or(ConfigError::HomeDirUnavailable)?;
    dir.push(APP_DIR);
    dir.push(CONFIG_FILE_NAME);
    Ok(dir)
}

fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
        Err(err) => Err(err.into()),
    }
}

/// Resolve the keybox file path per the precedence documented above.
/// `cli_path` is the `--path` flag, if given.
pub fn resolve_keybox_path(cli_path: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = cli_path {
        return Ok(path);
    }
    if let Ok(path) = std::env::var(FILE_ENV) {
        return Ok(PathBuf::from(path));
    }

    let config_file = config_path()?;
    let config = load_config(&config_file)?;
    if let Some(path) = config.keybox.path {
        return Ok(path);
    }

    let mut dir = dirs::home_dir().ok_or(ConfigError::HomeDirUnavailable)?;
    dir.push(APP_DIR);
    dir.push(DEFAULT_KEYBOX_FILE_NAME);
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_path_wins_over_everything() {
        let path = resolve_keybox_path(Some(PathBuf::from("/tmp/explicit.safe"))).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/explicit.safe"));
    }

    #[test]
    fn missing_config_file_falls_back_to_default_layout() {
        // SAFETY: test-only env var, no other thread in this crate reads it concurrently.
        unsafe {
            std::env::remove_var(FILE_ENV);
        }
        let config_dir = tempfile::tempdir().unwrap();
        unsafe {
            std::env::set_var(
                CONFIG_ENV,
                config_dir.path().join("nonexistent.conf"),
            );
        }
        let path = resolve_keybox_path(None).unwrap();
        assert!(path.ends_with(".keybox/keybox.safe"));
        unsafe {
            std::env::remove_var(CONFIG_ENV);
        }
    }
}
