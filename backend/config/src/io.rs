//! Config file location and loading.

use crate::schema::ExitrackConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Default config file name within the config directory.
const CONFIG_FILE_NAME: &str = "config.yaml";

const STORE_FILE_NAME: &str = "submissions.db";

const LOG_DIR_NAME: &str = "logs";

/// Resolve the config directory.
/// Priority: `EXITRACK_CONFIG_DIR` env > `~/.exitrack/`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("EXITRACK_CONFIG_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    match dirs::home_dir() {
        Some(home) => home.join(".exitrack"),
        None => PathBuf::from(".exitrack"),
    }
}

pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// Store database used when the config does not name one.
pub fn default_store_path(config_dir: &Path) -> PathBuf {
    config_dir.join(STORE_FILE_NAME)
}

pub fn default_log_dir(config_dir: &Path) -> PathBuf {
    config_dir.join(LOG_DIR_NAME)
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Load and parse the config from disk.
///
/// Returns `Ok(Default::default())` if the file doesn't exist (first run).
pub async fn load_config(path: &Path) -> Result<ExitrackConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(ExitrackConfig::default());
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    if raw.trim().is_empty() {
        return Ok(ExitrackConfig::default());
    }

    let config: ExitrackConfig = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse config YAML at: {}", path.display()))?;

    info!(path = %path.display(), "Loaded config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&config_file_path(dir.path())).await.unwrap();
        assert_eq!(cfg, ExitrackConfig::default());
    }

    #[tokio::test]
    async fn reads_yaml_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file_path(dir.path());
        std::fs::write(&path, "store:\n  capacity: 7\n").unwrap();
        let cfg = load_config(&path).await.unwrap();
        assert_eq!(cfg.store_capacity(), 7);
    }

    #[tokio::test]
    async fn malformed_yaml_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file_path(dir.path());
        std::fs::write(&path, "store: [unclosed").unwrap();
        let err = load_config(&path).await.unwrap_err().to_string();
        assert!(err.contains("config.yaml"));
    }

    #[test]
    fn expands_home_prefix_only() {
        assert_eq!(expand_home("/var/lib/x.db"), PathBuf::from("/var/lib/x.db"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/x.db"), home.join("x.db"));
        }
    }
}
