//! Device engine for Portico.
//!
//! Simulates the physical lifecycle of remotely actuated devices. The bridge
//! only acknowledges commands; it never reports an actual position. After a
//! successful activation each device walks a timed transition table and
//! publishes the state it is assumed to be in.
//!
//! - [`DeviceRegistry`] owns one [`DeviceStateMachine`] per device identity
//! - [`TransitionTable`] holds the per-kind cycles as data
//! - [`EventSink`] receives every state change, in order, per device
//! - [`AccessoryCache`] persists known devices between runs

pub mod cache;
pub mod event;
pub mod machine;
pub mod registry;
pub mod timer;
pub mod transition;

pub use cache::{AccessoryCache, CachedAccessory};
pub use event::{
    ChannelSink, DeviceEvent, DoorState, EventRecord, EventSink, LockState, PositionState,
    StateUpdate, TargetDoorState, TracingSink,
};
pub use machine::{DeviceSnapshot, DeviceStateMachine};
pub use registry::DeviceRegistry;
pub use timer::{TimerSet, TimerToken};
pub use transition::{Phase, Stage, TransitionTable};
