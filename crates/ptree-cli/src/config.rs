//! TOML settings for the `ptree` binary.
//!
//! Settings cover the element API connection, the layout sizes and the
//! GitHub lookups. They come from the first file found among:
//!
//! 1. the `--config` path,
//! 2. `ptree/config.toml` under the working directory,
//! 3. `config.toml` in the platform configuration directory,
//!
//! and fall back to the built-in defaults.

use std::{
    fs,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use log::{debug, info};
use thiserror::Error;

use ptree::{PtreeError, config::AppConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse TOML configuration: {0}")]
    Parse(String),

    #[error("Missing configuration file: {0}")]
    MissingFile(PathBuf),

    #[error("Invalid layout setting: {0}")]
    Layout(String),
}

impl From<ConfigError> for PtreeError {
    fn from(err: ConfigError) -> Self {
        PtreeError::Config(err.to_string())
    }
}

/// Loads the settings for this run.
///
/// # Errors
///
/// An explicit path must exist. Any file found must parse and give
/// positive node sizes.
pub fn load_config(explicit_path: Option<impl AsRef<Path>>) -> Result<AppConfig, PtreeError> {
    if let Some(path) = explicit_path {
        return read_settings(path.as_ref(), "--config");
    }

    let local = PathBuf::from("ptree").join("config.toml");
    if local.exists() {
        return read_settings(&local, "working directory");
    }

    match ProjectDirs::from("org", "lsst", "ptree") {
        Some(dirs) => {
            let platform = dirs.config_dir().join("config.toml");
            if platform.exists() {
                return read_settings(&platform, "platform config directory");
            }
            debug!(file_name:? = platform; "No settings in the platform config directory");
        }
        None => debug!("No platform config directory on this system"),
    }

    debug!("Using built-in settings");
    Ok(AppConfig::default())
}

fn read_settings(path: &Path, source: &str) -> Result<AppConfig, PtreeError> {
    if !path.exists() {
        return Err(ConfigError::MissingFile(path.to_path_buf()).into());
    }
    info!(file_name:? = path, source; "Loading settings");

    let content = fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    check_layout(&config)?;
    Ok(config)
}

/// Zero or negative node sizes collapse every diagram onto one point.
fn check_layout(config: &AppConfig) -> Result<(), ConfigError> {
    let layout = config.layout();
    for (name, value) in [
        ("leaf_width", layout.leaf_width()),
        ("leaf_height", layout.leaf_height()),
        ("big_gap", layout.big_gap()),
    ] {
        if value.is_nan() || value <= 0.0 {
            return Err(ConfigError::Layout(format!("{name} must be positive, got {value}")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[gateway]\nresource = \"project-1\"\nmax_retries = 3\n\n[layout]\nleaf_width = 4.0\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();

        assert_eq!(config.gateway().resource(), Some("project-1"));
        assert_eq!(config.gateway().retry_policy().max_retries(), Some(3));
        assert_eq!(config.layout().leaf_width(), 4.0);
        assert_eq!(config.layout().big_gap(), 1.5);
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(Some(dir.path().join("absent.toml")));
        assert!(matches!(result, Err(PtreeError::Config(message)) if message.contains("absent.toml")));
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[layout\nleaf_width = 4.0\n").unwrap();

        assert!(matches!(load_config(Some(&path)), Err(PtreeError::Config(_))));
    }

    #[test]
    fn test_non_positive_leaf_width_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[layout]\nleaf_width = 0.0\n").unwrap();

        let result = load_config(Some(&path));
        assert!(matches!(result, Err(PtreeError::Config(message)) if message.contains("leaf_width")));
    }
}
