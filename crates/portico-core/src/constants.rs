//! Core constants shared by every Portico crate.
//!
//! The values here describe the bridge contract (status codes, default port)
//! and the built-in timing used when a device has no explicit duration entry.
//!
//! # Usage
//!
//! ```
//! use portico_core::constants::*;
//!
//! assert_eq!(BRIDGE_STATUS_OK, 200);
//! assert_eq!(DEFAULT_OPENED_TIME_SECS, 60);
//! ```

// ============================================================================
// Bridge Protocol
// ============================================================================

/// Status code the bridge returns for a successful authentication or command.
///
/// Any other code is a remote-reported failure and must be surfaced as-is.
pub const BRIDGE_STATUS_OK: i32 = 200;

/// Code attached to failures that never reached the bridge (transport, timeout).
pub const LOCAL_FAILURE_CODE: i32 = 0;

/// Default TCP port of the bridge.
pub const DEFAULT_BRIDGE_PORT: u16 = 64100;

/// Default bound on every single bridge I/O operation (connect, send, receive).
pub const DEFAULT_IO_TIMEOUT_MS: u64 = 10_000;

/// Scope requested when enumerating devices during discovery.
pub const DISCOVERY_SCOPE_ALL: &str = "all";

// ============================================================================
// Default Durations
// ============================================================================

/// Travel time used for opening when the device has no duration entry.
pub const DEFAULT_OPENING_TIME_SECS: u64 = 20;

/// Travel time used for closing when the device has no duration entry.
pub const DEFAULT_CLOSING_TIME_SECS: u64 = 20;

/// Time a device stays open when it has no duration entry.
pub const DEFAULT_OPENED_TIME_SECS: u64 = 60;

// ============================================================================
// Position Values
// ============================================================================

/// Binary door position when fully open.
pub const DOOR_POSITION_OPEN: u8 = 1;

/// Binary door position when closed.
pub const DOOR_POSITION_CLOSED: u8 = 0;

/// Percentage gate position when fully open.
pub const GATE_POSITION_OPEN: u8 = 100;

/// Percentage gate position when closed.
pub const GATE_POSITION_CLOSED: u8 = 0;

// ============================================================================
// Identity
// ============================================================================

/// UUID namespace for deterministic device identities.
///
/// Identities are UUIDv5 values of `"{name}-{apt_address}:{output_index}"` in
/// this namespace. Changing it re-keys every cached accessory.
pub const IDENTITY_NAMESPACE: uuid::Uuid =
    uuid::Uuid::from_u128(0x6f0c_2a1e_8d4b_4c3e_9a57_1b2d_3c4e_5f60);
