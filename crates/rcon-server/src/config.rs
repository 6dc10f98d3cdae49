//! TOML configuration for the server binary.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::service::{ServerConfig, DEFAULT_PORT};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    #[error("invalid bind address {0:?}")]
    InvalidBindAddress(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub network: NetworkSection,
    #[serde(default)]
    pub auth: AuthSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSection {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSection {
    /// Empty means "not configured"; the binary refuses to start.
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_auth_timeout_ms")]
    pub auth_timeout_ms: u64,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_auth_timeout_ms() -> u64 {
    2000
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            password: String::new(),
            auth_timeout_ms: default_auth_timeout_ms(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            network: NetworkSection::default(),
            auth: AuthSection::default(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }

    /// Lowers the file representation into the service's runtime config.
    pub fn service_config(&self) -> Result<ServerConfig, ConfigError> {
        let ip: IpAddr = self
            .network
            .bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(self.network.bind_address.clone()))?;
        Ok(ServerConfig {
            bind_addr: SocketAddr::new(ip, self.network.port),
            password: self.auth.password.clone(),
            auth_timeout: Duration::from_millis(self.auth.auth_timeout_ms),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
