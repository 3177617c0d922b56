//! Device discovery through the bridge.

use portico_core::BridgeSettings;
use portico_core::constants::{BRIDGE_STATUS_OK, DISCOVERY_SCOPE_ALL};
use portico_protocol::AddressBook;
use thiserror::Error;
use tracing::{info, warn};

use crate::client::{BridgeClient, BridgeClientError};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Bridge session failed: {0}")]
    Client(#[from] BridgeClientError),

    #[error("Bridge rejected authentication (code {0})")]
    Authentication(i32),
}

/// Enumerate the devices the bridge can actuate.
///
/// Opens a session, authenticates, requests the full address book and closes
/// the session on every exit path.
///
/// # Errors
///
/// Returns `DiscoveryError::Authentication` for a non-200 code, or the
/// underlying client error for transport failures.
pub async fn discover(settings: &BridgeSettings) -> Result<AddressBook, DiscoveryError> {
    info!("Discovering devices on bridge {}", settings.address());

    let mut client = BridgeClient::new(settings);
    let outcome = fetch_address_book(&mut client, settings).await;

    if let Err(e) = client.close().await {
        warn!("Error closing discovery session: {}", e);
    }

    let book = outcome?;
    info!(
        doors = book.doors.len(),
        actuators = book.actuators.len(),
        "Discovery completed"
    );
    Ok(book)
}

async fn fetch_address_book(
    client: &mut BridgeClient,
    settings: &BridgeSettings,
) -> Result<AddressBook, DiscoveryError> {
    client.connect().await?;

    let code = client.authenticate(&settings.token).await?;
    if code != BRIDGE_STATUS_OK {
        warn!(code, "Received code {} from bridge during authentication", code);
        return Err(DiscoveryError::Authentication(code));
    }

    Ok(client.get_config(DISCOVERY_SCOPE_ALL).await?)
}
