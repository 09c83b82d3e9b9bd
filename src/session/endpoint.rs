//! Endpoint presets and application identity.

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// JSON-RPC protocol version spoken by both product surfaces.
pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol version, port and base path of one product surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub version: String,
    pub port: u16,
    pub path: String,
}

impl Endpoint {
    /// Validate and build an endpoint. Fails only when all three parts are
    /// empty (`port == 0` counts as empty).
    pub fn new(version: &str, port: u16, path: &str) -> Result<Self, ApiError> {
        if version.is_empty() && port == 0 && path.is_empty() {
            return Err(ApiError::Configuration("JSON-RPC not defined.".to_string()));
        }
        Ok(Self {
            version: version.to_string(),
            port,
            path: path.to_string(),
        })
    }

    /// Web administration interface.
    pub fn admin() -> Self {
        Self {
            version: JSONRPC_VERSION.to_string(),
            port: 4040,
            path: "/admin/api/jsonrpc/".to_string(),
        }
    }

    /// End-user client (webmail) interface.
    pub fn client() -> Self {
        Self {
            version: JSONRPC_VERSION.to_string(),
            port: 443,
            path: "/webmail/api/jsonrpc/".to_string(),
        }
    }

    /// Path used for multipart uploads.
    pub fn upload_path(&self) -> String {
        format!("{}upload/", self.path)
    }

    /// Value of the `Host` header; the port is omitted for 443.
    pub fn host_header(&self, hostname: &str) -> String {
        let host = bracketed(hostname);
        if self.port == 443 {
            host
        } else {
            format!("{}:{}", host, self.port)
        }
    }

    /// Full URL of the endpoint, used in error messages.
    pub fn target_url(&self, hostname: &str, encrypted: bool) -> String {
        let scheme = if encrypted { "https" } else { "http" };
        format!("{}://{}:{}{}", scheme, bracketed(hostname), self.port, self.path)
    }
}

/// IPv6 literals need brackets wherever a port may follow.
fn bracketed(hostname: &str) -> String {
    if hostname.contains(':') {
        format!("[{}]", hostname)
    } else {
        hostname.to_string()
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::admin()
    }
}

/// Identity the client registers with on login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Application {
    pub name: String,
    pub vendor: String,
    pub version: String,
}

impl Application {
    /// Validate and build an application identity. Fails only when all
    /// three fields are empty.
    pub fn new(name: &str, vendor: &str, version: &str) -> Result<Self, ApiError> {
        let application = Self {
            name: name.to_string(),
            vendor: vendor.to_string(),
            version: version.to_string(),
        };
        if application.is_empty() {
            return Err(ApiError::Configuration("Application not defined.".to_string()));
        }
        Ok(application)
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.vendor.is_empty() && self.version.is_empty()
    }
}
