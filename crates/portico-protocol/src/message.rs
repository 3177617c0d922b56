use portico_core::{DeviceRef, DeviceSource};
use serde::{Deserialize, Serialize};

/// Message sent by a client to the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeRequest {
    /// Present the credential token. Answered with [`BridgeResponse::Auth`].
    Authenticate { token: String },

    /// Ask for the address book. Answered with [`BridgeResponse::Config`].
    GetConfig { scope: String },

    /// Prepare the door-opening channel for an apartment address.
    OpenDoorInit { apt_address: String },

    /// Trigger the actuator of one device.
    OpenDoor {
        apt_address: String,
        output_index: u32,
        name: String,
    },
}

/// Message sent by the bridge in answer to a [`BridgeRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeResponse {
    Auth {
        code: i32,
    },
    Config {
        address_book: AddressBook,
    },
    Ack {
        code: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl BridgeResponse {
    /// Short name of the variant, for logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeResponse::Auth { .. } => "auth",
            BridgeResponse::Config { .. } => "config",
            BridgeResponse::Ack { .. } => "ack",
        }
    }
}

/// Entry of the open-door address book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorItem {
    pub name: String,
    pub apt_address: String,
    pub output_index: u32,
}

/// Entry of the actuator address book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorItem {
    pub name: String,
    pub apt_address: String,
    pub output_index: u32,
}

/// Devices the bridge can actuate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBook {
    /// Apartment address of the bridge itself, used to initialise door opening.
    pub apt_address: String,

    #[serde(default)]
    pub doors: Vec<DoorItem>,

    #[serde(default)]
    pub actuators: Vec<ActuatorItem>,
}

impl AddressBook {
    /// All devices as activation references, doors first.
    pub fn device_refs(&self) -> Vec<DeviceRef> {
        self.doors
            .iter()
            .map(DeviceRef::from)
            .chain(self.actuators.iter().map(DeviceRef::from))
            .collect()
    }

    /// Total number of devices.
    pub fn len(&self) -> usize {
        self.doors.len() + self.actuators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doors.is_empty() && self.actuators.is_empty()
    }
}

impl From<&DoorItem> for DeviceRef {
    fn from(item: &DoorItem) -> Self {
        DeviceRef::new(
            item.name.clone(),
            item.apt_address.clone(),
            item.output_index,
            DeviceSource::Door,
        )
    }
}

impl From<&ActuatorItem> for DeviceRef {
    fn from(item: &ActuatorItem) -> Self {
        DeviceRef::new(
            item.name.clone(),
            item.apt_address.clone(),
            item.output_index,
            DeviceSource::Actuator,
        )
    }
}

impl From<&DeviceRef> for BridgeRequest {
    fn from(device: &DeviceRef) -> Self {
        BridgeRequest::OpenDoor {
            apt_address: device.apt_address.clone(),
            output_index: device.output_index,
            name: device.name.clone(),
        }
    }
}
