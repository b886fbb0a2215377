//! Config loading and local identity.

use std::path::{Path, PathBuf};

use cooperate_types::NetworkId;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::error::CooperateError;

/// Load configuration from the given path, or the default location.
pub fn load_config(path: Option<&Path>) -> Result<Config, CooperateError> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => default_config_path(),
    };

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| CooperateError::Config(format!("failed to read config: {e}")))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| CooperateError::Config(format!("failed to parse config: {e}")))?;
        info!(path = %config_path.display(), "loaded config");
        Ok(config)
    } else {
        info!("no config file found, using defaults");
        Ok(Config::default())
    }
}

/// Resolve the local network id: the configured one, else the persisted
/// one in `config_dir`, else a freshly generated one that gets persisted.
pub fn resolve_network_id(config: &Config, config_dir: &Path) -> Result<NetworkId, CooperateError> {
    if let Some(id) = config.identity.network_id.as_deref() {
        if !id.trim().is_empty() {
            return Ok(NetworkId::new(id.trim()));
        }
    }
    load_or_create_network_id(config_dir)
}

/// Load or create a persistent network id.
pub fn load_or_create_network_id(config_dir: &Path) -> Result<NetworkId, CooperateError> {
    let id_path = config_dir.join("network-id");

    if id_path.exists() {
        let content = std::fs::read_to_string(&id_path)
            .map_err(|e| CooperateError::Config(format!("failed to read network-id: {e}")))?;
        let uuid: Uuid = content
            .trim()
            .parse()
            .map_err(|e| CooperateError::Config(format!("invalid network-id: {e}")))?;
        let id = NetworkId::new(uuid.to_string());
        info!(id = %id.anonymize(), "loaded network id");
        Ok(id)
    } else {
        std::fs::create_dir_all(config_dir)
            .map_err(|e| CooperateError::Config(format!("failed to create config dir: {e}")))?;

        let uuid = Uuid::new_v4();
        std::fs::write(&id_path, uuid.to_string())
            .map_err(|e| CooperateError::Config(format!("failed to write network-id: {e}")))?;

        let id = NetworkId::new(uuid.to_string());
        info!(id = %id.anonymize(), "created new network id");
        Ok(id)
    }
}

/// Get the default config directory path.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("cooperate")
}

/// Get the default config file path.
fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}
