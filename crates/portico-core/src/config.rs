//! Platform configuration.
//!
//! The configuration file is JSON with the bridge connection settings and an
//! ordered list of per-device timing entries:
//!
//! ```json
//! {
//!   "bridge_url": "192.168.1.20",
//!   "bridge_port": 64100,
//!   "icona_token": "secret",
//!   "devices": [
//!     { "name": "GARAGE", "type": "garage_door", "opening_time": 5, "closing_time": 8, "opened_time": 15 }
//!   ]
//! }
//! ```
//!
//! The configuration is read-only once loaded.

use crate::constants::{DEFAULT_BRIDGE_PORT, DEFAULT_IO_TIMEOUT_MS};
use crate::duration::{self, DurationConfig};
use crate::{DeviceKind, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Bridge host name or IP address.
    pub bridge_url: String,

    #[serde(default = "default_bridge_port")]
    pub bridge_port: u16,

    /// Credential token presented to the bridge on every session.
    #[serde(alias = "credential_token")]
    pub icona_token: String,

    /// Ordered timing entries; the first entry matching a device name wins.
    #[serde(default)]
    pub devices: Vec<DurationConfig>,

    /// Bound on each bridge I/O operation, in milliseconds.
    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: u64,
}

fn default_bridge_port() -> u16 {
    DEFAULT_BRIDGE_PORT
}

fn default_io_timeout_ms() -> u64 {
    DEFAULT_IO_TIMEOUT_MS
}

impl PlatformConfig {
    /// Parse and validate a configuration from a JSON string.
    ///
    /// # Errors
    /// Returns `Error::Json` for malformed input and `Error::Config` when a
    /// required value is empty or zero.
    pub fn from_json(content: &str) -> Result<Self> {
        let config: PlatformConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file.
    ///
    /// # Errors
    /// Returns `Error::Io` if the file cannot be read, otherwise the same
    /// errors as [`PlatformConfig::from_json`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading platform configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Check the values serde cannot check.
    ///
    /// # Errors
    /// Returns `Error::Config` describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.bridge_url.trim().is_empty() {
            return Err(Error::Config("bridge_url must not be empty".to_string()));
        }
        if self.bridge_port == 0 {
            return Err(Error::Config("bridge_port must not be 0".to_string()));
        }
        if self.icona_token.is_empty() {
            return Err(Error::MissingConfig("icona_token".to_string()));
        }
        if self.io_timeout_ms == 0 {
            return Err(Error::Config("io_timeout_ms must be positive".to_string()));
        }
        if let Some(entry) = self.devices.iter().find(|d| d.name.is_empty()) {
            return Err(Error::Config(format!(
                "device entry of type '{}' has an empty name",
                entry.kind.as_str()
            )));
        }
        Ok(())
    }

    /// Timing entry for `device_name`, falling back to the built-in default.
    #[must_use]
    pub fn durations_for(&self, device_name: &str, kind: DeviceKind) -> DurationConfig {
        duration::resolve(&self.devices, device_name, kind)
    }

    /// Kind explicitly configured for `device_name`, if any.
    #[must_use]
    pub fn configured_kind(&self, device_name: &str) -> Option<DeviceKind> {
        self.devices
            .iter()
            .find(|d| d.name == device_name)
            .map(|d| d.kind)
    }

    /// Connection settings for the network layer.
    #[must_use]
    pub fn bridge_settings(&self) -> BridgeSettings {
        BridgeSettings {
            host: self.bridge_url.trim().to_string(),
            port: self.bridge_port,
            token: self.icona_token.clone(),
            io_timeout: Duration::from_millis(self.io_timeout_ms),
        }
    }
}

/// Everything needed to open one bridge session.
#[derive(Clone, PartialEq, Eq)]
pub struct BridgeSettings {
    pub host: String,
    pub port: u16,
    pub token: String,
    pub io_timeout: Duration,
}

impl BridgeSettings {
    /// `host:port` form used for logging and connecting.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// The token is a credential; keep it out of logs.
impl std::fmt::Debug for BridgeSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("token", &"***")
            .field("io_timeout", &self.io_timeout)
            .finish()
    }
}
