use crate::config::PublishConfig;
use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use std::fs;
use std::path::Path;
use tracing::{error, info};

/// Environment variable holding the storage bearer token.
pub const TOKEN_ENV: &str = "DROPBOX_TOKEN";

/// Expand `{year}` in the base folder.
pub fn expand_base_folder(base_folder: &str, year: i32) -> String {
    base_folder.replace("{year}", &year.to_string())
}

/// Loads a static YAML config file (no secrets), injects the storage token from the
/// environment and validates the result.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PublishConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let mut config: PublishConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    config.storage.token = match std::env::var(TOKEN_ENV) {
        Ok(token) => {
            info!("{TOKEN_ENV} found in env");
            token
        }
        Err(e) => {
            error!(error = ?e, "{TOKEN_ENV} environment variable not set");
            anyhow::bail!("{TOKEN_ENV} environment variable not set: {e}");
        }
    };

    config.storage.base_folder = expand_base_folder(&config.storage.base_folder, Utc::now().year());

    // Relative template directories are taken from the config file's location.
    if config.templates_dir.is_relative() {
        if let Some(parent) = path_ref.parent() {
            config.templates_dir = parent.join(&config.templates_dir);
        }
    }

    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path_ref.display()))?;
    config.trace_loaded();
    Ok(config)
}
