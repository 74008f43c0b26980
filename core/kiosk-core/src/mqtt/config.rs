use crate::error::{KioskError, Result};
use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Broker settings from `~/dashboard-project/config/mqtt.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MqttConfig {
    pub broker: String,
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub tls: bool,
    #[serde(default)]
    pub cafile: Option<PathBuf>,
    #[serde(default)]
    pub certfile: Option<PathBuf>,
    #[serde(default)]
    pub keyfile: Option<PathBuf>,
}

impl MqttConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(KioskError::ConfigNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)
            .map_err(|e| KioskError::io("Failed to read MQTT config", e))?;
        Self::parse(path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self> {
        let config: MqttConfig =
            serde_json::from_str(content).map_err(|e| KioskError::ConfigMalformed {
                path: path.to_path_buf(),
                details: e.to_string(),
            })?;
        if config.broker.trim().is_empty() {
            return Err(KioskError::ConfigMalformed {
                path: path.to_path_buf(),
                details: "broker must not be empty".to_string(),
            });
        }
        Ok(config)
    }

    /// Username and password, when a non-empty username is configured.
    pub fn credentials(&self) -> Option<(String, String)> {
        let username = self.username.as_deref().filter(|u| !u.is_empty())?;
        Some((
            username.to_string(),
            self.password.clone().unwrap_or_default(),
        ))
    }

    /// Client certificate and key, only when both are configured.
    pub fn client_auth_paths(&self) -> Option<(&Path, &Path)> {
        match (&self.certfile, &self.keyfile) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }
}
