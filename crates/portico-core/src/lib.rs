//! Core types for Portico, a timer-driven simulator for remotely actuated
//! doors, locks, garage doors and gates.

pub mod activation;
pub mod config;
pub mod constants;
pub mod duration;
pub mod error;
pub mod types;

pub use activation::{ActivationError, ActivationResult, Activator};
pub use config::{BridgeSettings, PlatformConfig};
pub use duration::DurationConfig;
pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
