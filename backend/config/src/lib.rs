//! `exitrack-config`: runtime configuration.
//!
//! Provides:
//! - Typed config schema (endpoint, recognition, store, logging)
//! - YAML loading with first-run defaults
//! - `${ENV_VAR}` substitution
//! - Default value application
//! - Range and pattern validation

pub mod defaults;
pub mod env;
pub mod io;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{resolve_env_vars_with, MissingEnvVarError};
pub use io::{
    config_dir, config_file_path, default_log_dir, default_store_path, expand_home, load_config,
};
pub use schema::{
    EndpointConfig, ExitrackConfig, LoggingConfig, RecognitionConfig, RecognitionEngine,
    StoreConfig,
};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Load, substitute env vars, apply defaults and validate a config file.
///
/// This is the main entry point for loading a config at runtime. Warnings are
/// logged; any validation error fails the load.
pub async fn load_and_prepare(path: &Path) -> Result<ExitrackConfig> {
    let raw_config = load_config(path).await?;
    let env: HashMap<String, String> = std::env::vars().collect();
    prepare(raw_config, &env)
        .with_context(|| format!("Invalid config at: {}", path.display()))
}

/// Everything `load_and_prepare` does after reading the file.
pub fn prepare(raw_config: ExitrackConfig, env: &HashMap<String, String>) -> Result<ExitrackConfig> {
    let value: Value = serde_json::to_value(&raw_config)
        .context("Failed to serialize config for processing")?;

    let value = resolve_env_vars_with(&value, env).context("Failed to resolve env vars in config")?;

    let config: ExitrackConfig =
        serde_json::from_value(value).context("Failed to deserialize config after processing")?;

    let config = apply_all_defaults(config);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    if !report.is_valid() {
        let messages: Vec<String> = report.errors.iter().map(|e| e.to_string()).collect();
        bail!(messages.join("; "));
    }

    Ok(config)
}

/// Store database path: the configured one, else beside the config file.
pub fn resolve_store_path(config: &ExitrackConfig, config_dir: &Path) -> PathBuf {
    match config.store_path() {
        Some(p) if !p.trim().is_empty() => expand_home(p),
        _ => default_store_path(config_dir),
    }
}

/// Log directory: the configured one, else `logs/` beside the config file.
pub fn resolve_log_dir(config: &ExitrackConfig, config_dir: &Path) -> PathBuf {
    match config.log_dir() {
        Some(p) if !p.trim().is_empty() => expand_home(p),
        _ => default_log_dir(config_dir),
    }
}
