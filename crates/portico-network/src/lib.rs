//! Network layer for talking to the bridge.
//!
//! # Components
//!
//! - **BridgeClient**: one TCP session with the bridge
//! - **BridgeActivator**: the activation adapter used by the device engine;
//!   opens and closes its own session for every activation
//! - **discover**: enumerates the devices the bridge exposes
//!
//! # Example
//!
//! ```no_run
//! use portico_core::{Activator, PlatformConfig};
//! use portico_network::{BridgeActivator, discover};
//!
//! # async fn example(config: PlatformConfig) -> Result<(), Box<dyn std::error::Error>> {
//! let settings = config.bridge_settings();
//! let book = discover(&settings).await?;
//!
//! let activator = BridgeActivator::new(settings, book.apt_address.clone());
//! for device in book.device_refs() {
//!     let result = activator.activate(&device).await;
//!     println!("{}: {}", device, result.success());
//! }
//! # Ok(())
//! # }
//! ```

mod activator;
mod client;
mod discovery;

pub use activator::BridgeActivator;
pub use client::{BridgeClient, BridgeClientError};
pub use discovery::{DiscoveryError, discover};
