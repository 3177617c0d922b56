//! Wire protocol spoken with the bridge.
//!
//! The bridge owns the network link to the physical devices. A session
//! exchanges newline-delimited JSON messages:
//!
//! ```text
//! client                                bridge
//!   | -- authenticate{token} ------------> |
//!   | <------------------------ auth{code} |
//!   | -- get_config{scope} --------------> |      (discovery)
//!   | <---------------- config{address_book} |
//!   | -- open_door_init{apt_address} ----> |      (activation)
//!   | <------------------------- ack{code} |
//!   | -- open_door{device} --------------> |
//!   | <------------------------- ack{code} |
//! ```

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{BridgeCodec, ClientCodec, ServerCodec};
pub use error::ProtocolError;
pub use message::{ActuatorItem, AddressBook, BridgeRequest, BridgeResponse, DoorItem};
