//! Configuration for the `mailbox-usage` tool.
//!
//! Resolution order for the config file:
//!
//! 1. Explicit `--config` path
//! 2. `MAILADMIN_CONFIG` environment variable
//! 3. `<config dir>/mailadmin-rpc/config.toml` (XDG on Linux, Library on macOS)
//! 4. Built-in defaults
//!
//! ```toml
//! [application]
//! name = "Mailbox usage monitor"
//! vendor = "Example Ltd."
//! version = "1.0"
//!
//! [server]
//! host = "mail.example.com"
//! user = "admin"
//! endpoint = "admin"
//! verify_certificates = false
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::session::{Application, Endpoint};
use crate::transport::{TransportOptions, DEFAULT_CONNECT_TIMEOUT_SECS};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "MAILADMIN_CONFIG";

/// Product surface to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    #[default]
    Admin,
    Client,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub user: String,
    pub endpoint: EndpointKind,
    /// Overrides the endpoint preset's port.
    pub port: Option<u16>,
    pub encrypted: bool,
    pub verify_certificates: bool,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            user: String::new(),
            endpoint: EndpointKind::Admin,
            port: None,
            encrypted: true,
            verify_certificates: true,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub application: Application,
    pub server: ServerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            application: Application {
                name: "Mailbox usage monitor".to_string(),
                vendor: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            server: ServerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from the first config file found, or defaults if none exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match resolve_path(explicit) {
            Some(path) => Self::from_file(&path),
            None => {
                tracing::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Endpoint preset with the optional port override applied.
    pub fn endpoint(&self) -> Endpoint {
        let mut endpoint = match self.server.endpoint {
            EndpointKind::Admin => Endpoint::admin(),
            EndpointKind::Client => Endpoint::client(),
        };
        if let Some(port) = self.server.port {
            endpoint.port = port;
        }
        endpoint
    }

    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            encrypted: self.server.encrypted,
            verify_certificates: self.server.verify_certificates,
            connect_timeout: Duration::from_secs(self.server.connect_timeout_secs),
            read_timeout: self.server.read_timeout_secs.map(Duration::from_secs),
        }
    }
}

fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }

    dirs::config_dir()
        .map(|dir| dir.join("mailadmin-rpc").join("config.toml"))
        .filter(|path| path.exists())
}
