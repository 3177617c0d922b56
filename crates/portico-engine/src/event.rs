//! State-change events and the sink they are published to.
//!
//! The engine is the only producer. Field names follow the vocabulary of
//! home-automation accessories (`LockState`, `TargetPosition`,
//! `CurrentPosition`, `PositionState`, `CurrentDoorState`, `TargetDoorState`)
//! so a binding can map each update onto a characteristic directly.

use chrono::{DateTime, Utc};
use portico_core::DeviceIdentity;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    Unsecured,
    Secured,
}

/// Direction of travel reported for positional devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionState {
    Decreasing,
    Increasing,
    Stopped,
}

/// Current state of a garage door.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorState {
    Open,
    Closed,
    Opening,
    Closing,
}

/// Target state of a garage door.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetDoorState {
    Open,
    Closed,
}

/// One externally observable field update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value")]
pub enum StateUpdate {
    LockState(LockState),
    /// 0/1 for doors, 0-100 for gates.
    TargetPosition(u8),
    /// 0/1 for doors, 0-100 for gates.
    CurrentPosition(u8),
    PositionState(PositionState),
    CurrentDoorState(DoorState),
    TargetDoorState(TargetDoorState),
}

impl StateUpdate {
    /// Name of the updated field.
    pub fn field_name(&self) -> &'static str {
        match self {
            StateUpdate::LockState(_) => "LockState",
            StateUpdate::TargetPosition(_) => "TargetPosition",
            StateUpdate::CurrentPosition(_) => "CurrentPosition",
            StateUpdate::PositionState(_) => "PositionState",
            StateUpdate::CurrentDoorState(_) => "CurrentDoorState",
            StateUpdate::TargetDoorState(_) => "TargetDoorState",
        }
    }
}

impl fmt::Display for StateUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateUpdate::LockState(v) => write!(f, "LockState={v:?}"),
            StateUpdate::TargetPosition(v) => write!(f, "TargetPosition={v}"),
            StateUpdate::CurrentPosition(v) => write!(f, "CurrentPosition={v}"),
            StateUpdate::PositionState(v) => write!(f, "PositionState={v:?}"),
            StateUpdate::CurrentDoorState(v) => write!(f, "CurrentDoorState={v:?}"),
            StateUpdate::TargetDoorState(v) => write!(f, "TargetDoorState={v:?}"),
        }
    }
}

/// Event published by a device state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DeviceEvent {
    StateChanged(StateUpdate),
    ActivationFailed { code: i32, message: String },
}

impl DeviceEvent {
    pub fn is_failure(&self) -> bool {
        matches!(self, DeviceEvent::ActivationFailed { .. })
    }

    /// The field update carried by this event, if any.
    pub fn update(&self) -> Option<&StateUpdate> {
        match self {
            DeviceEvent::StateChanged(update) => Some(update),
            DeviceEvent::ActivationFailed { .. } => None,
        }
    }
}

impl From<StateUpdate> for DeviceEvent {
    fn from(update: StateUpdate) -> Self {
        DeviceEvent::StateChanged(update)
    }
}

/// Event with the device it belongs to and the wall-clock time it was published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub device_id: DeviceIdentity,
    #[serde(flatten)]
    pub event: DeviceEvent,
    pub timestamp: DateTime<Utc>,
}

impl EventRecord {
    pub fn new(device_id: DeviceIdentity, event: DeviceEvent) -> Self {
        Self {
            device_id,
            event,
            timestamp: Utc::now(),
        }
    }
}

/// Receiver of device events.
///
/// Publishing is fire-and-forget. Calls for one device arrive in the exact
/// order the device emitted them; there is no ordering across devices.
pub trait EventSink: Send + Sync + 'static {
    fn publish(&self, device_id: DeviceIdentity, event: DeviceEvent);
}

/// Sink forwarding every event into an unbounded Tokio channel.
///
/// # Examples
///
/// ```
/// use portico_core::DeviceIdentity;
/// use portico_engine::{ChannelSink, DeviceEvent, EventSink, LockState, StateUpdate};
///
/// let (sink, mut rx) = ChannelSink::new();
/// let id = DeviceIdentity::resolve("Front", "SB1", 0);
/// sink.publish(id, StateUpdate::LockState(LockState::Unsecured).into());
///
/// let record = rx.try_recv().unwrap();
/// assert_eq!(record.device_id, id);
/// ```
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<EventRecord>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<EventRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn publish(&self, device_id: DeviceIdentity, event: DeviceEvent) {
        // A dropped receiver just means nobody is listening any more
        let _ = self.tx.send(EventRecord::new(device_id, event));
    }
}

/// Sink that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&self, device_id: DeviceIdentity, event: DeviceEvent) {
        match event {
            DeviceEvent::StateChanged(update) => {
                info!(device = %device_id, field = update.field_name(), "{}", update);
            }
            DeviceEvent::ActivationFailed { code, message } => {
                warn!(device = %device_id, code, "Activation failed: {}", message);
            }
        }
    }
}
