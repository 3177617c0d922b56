use crate::{Result, constants::IDENTITY_NAMESPACE, error::Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of physical access device.
///
/// Fixed when the device identity is created; selects the transition
/// sequence the engine runs after a successful activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Lock,
    Door,
    GarageDoor,
    Gate,
}

impl DeviceKind {
    /// Configuration name of the kind (`lock`, `door`, `garage_door`, `gate`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceKind::Lock => "lock",
            DeviceKind::Door => "door",
            DeviceKind::GarageDoor => "garage_door",
            DeviceKind::Gate => "gate",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DeviceKind::Lock => write!(f, "Lock"),
            DeviceKind::Door => write!(f, "Door"),
            DeviceKind::GarageDoor => write!(f, "Garage Door"),
            DeviceKind::Gate => write!(f, "Gate"),
        }
    }
}

impl std::str::FromStr for DeviceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lock" => Ok(DeviceKind::Lock),
            "door" => Ok(DeviceKind::Door),
            "garage_door" => Ok(DeviceKind::GarageDoor),
            "gate" => Ok(DeviceKind::Gate),
            _ => Err(Error::UnknownDeviceKind(s.to_string())),
        }
    }
}

/// Stable identity of a local device.
///
/// Derived from `(name, apt_address, output_index)` so that a device
/// rediscovered on a later pass maps onto the one registered before.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceIdentity(Uuid);

impl DeviceIdentity {
    /// Derive the identity for a remote device descriptor.
    ///
    /// Pure: the same inputs always produce the same identity.
    ///
    /// # Examples
    ///
    /// ```
    /// use portico_core::DeviceIdentity;
    ///
    /// let a = DeviceIdentity::resolve("Gate", "SB000006", 1);
    /// let b = DeviceIdentity::resolve("Gate", "SB000006", 1);
    /// assert_eq!(a, b);
    /// assert_ne!(a, DeviceIdentity::resolve("Gate", "SB000006", 2));
    /// ```
    #[must_use]
    pub fn resolve(name: &str, remote_address: &str, output_index: u32) -> Self {
        let seed = format!("{name}-{remote_address}:{output_index}");
        DeviceIdentity(Uuid::new_v5(&IDENTITY_NAMESPACE, seed.as_bytes()))
    }

    /// Get the inner UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DeviceIdentity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let uuid = Uuid::parse_str(s).map_err(|e| Error::InvalidData {
            message: format!("Invalid device identity '{s}': {e}"),
        })?;
        Ok(DeviceIdentity(uuid))
    }
}

/// Address book section a remote device was listed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceSource {
    /// Entry of the open-door address book.
    Door,
    /// Entry of the actuator address book.
    Actuator,
}

/// Reference to a remote device, as sent in the activation command.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceRef {
    pub name: String,
    pub apt_address: String,
    pub output_index: u32,
    pub source: DeviceSource,
}

impl DeviceRef {
    pub fn new(
        name: impl Into<String>,
        apt_address: impl Into<String>,
        output_index: u32,
        source: DeviceSource,
    ) -> Self {
        Self {
            name: name.into(),
            apt_address: apt_address.into(),
            output_index,
            source,
        }
    }

    /// Identity of the local device backing this reference.
    #[must_use]
    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::resolve(&self.name, &self.apt_address, self.output_index)
    }

    /// Human-facing name: lower-cased, then the first letter upper-cased.
    ///
    /// ```
    /// use portico_core::{DeviceRef, DeviceSource};
    ///
    /// let device = DeviceRef::new("CANCELLO PEDONALE", "SB1", 0, DeviceSource::Door);
    /// assert_eq!(device.display_name(), "Cancello pedonale");
    /// ```
    #[must_use]
    pub fn display_name(&self) -> String {
        let lower = self.name.to_lowercase();
        let mut chars = lower.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl fmt::Display for DeviceRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({}:{})", self.name, self.apt_address, self.output_index)
    }
}
