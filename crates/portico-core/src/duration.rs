//! Per-device timing parameters.
//!
//! The bridge gives no feedback about physical position, so the whole
//! simulated timeline of a device is determined by three durations:
//! how long it takes to open, to close, and how long it stays open.

use crate::DeviceKind;
use crate::constants::{
    DEFAULT_CLOSING_TIME_SECS, DEFAULT_OPENED_TIME_SECS, DEFAULT_OPENING_TIME_SECS,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing entry for one device, keyed by the remote device name.
///
/// Durations are whole seconds. `opening_time`/`closing_time` model travel
/// and only matter for kinds with travel (garage doors and gates).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: DeviceKind,

    #[serde(default = "default_opening_time")]
    pub opening_time: u64,

    #[serde(default = "default_closing_time")]
    pub closing_time: u64,

    #[serde(default = "default_opened_time")]
    pub opened_time: u64,

    /// Gates only: simulate travel (`true`) or open and revert instantly.
    #[serde(default = "default_temporized")]
    pub temporized: bool,
}

fn default_opening_time() -> u64 {
    DEFAULT_OPENING_TIME_SECS
}

fn default_closing_time() -> u64 {
    DEFAULT_CLOSING_TIME_SECS
}

fn default_opened_time() -> u64 {
    DEFAULT_OPENED_TIME_SECS
}

fn default_temporized() -> bool {
    true
}

impl DurationConfig {
    /// Built-in default entry for `name`.
    #[must_use]
    pub fn fallback(name: impl Into<String>, kind: DeviceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            opening_time: DEFAULT_OPENING_TIME_SECS,
            closing_time: DEFAULT_CLOSING_TIME_SECS,
            opened_time: DEFAULT_OPENED_TIME_SECS,
            temporized: true,
        }
    }

    #[must_use]
    pub fn opening(&self) -> Duration {
        Duration::from_secs(self.opening_time)
    }

    #[must_use]
    pub fn closing(&self) -> Duration {
        Duration::from_secs(self.closing_time)
    }

    #[must_use]
    pub fn opened(&self) -> Duration {
        Duration::from_secs(self.opened_time)
    }
}

/// Resolve the timing entry for `device_name`.
///
/// The first entry whose name matches exactly wins. When there is none the
/// built-in default is returned with `name` and `kind` taken from the
/// caller. A missing entry is not an error.
///
/// # Examples
///
/// ```
/// use portico_core::{DeviceKind, duration::resolve};
///
/// let config = resolve(&[], "Unknown", DeviceKind::Door);
/// assert_eq!(config.name, "Unknown");
/// assert_eq!(config.kind, DeviceKind::Door);
/// assert_eq!(
///     (config.opening_time, config.closing_time, config.opened_time),
///     (20, 20, 60)
/// );
/// ```
#[must_use]
pub fn resolve(table: &[DurationConfig], device_name: &str, kind: DeviceKind) -> DurationConfig {
    table
        .iter()
        .find(|entry| entry.name == device_name)
        .cloned()
        .unwrap_or_else(|| DurationConfig::fallback(device_name, kind))
}
