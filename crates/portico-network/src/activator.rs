//! Activation Client Adapter.
//!
//! Every activation opens its own bridge session, so concurrent activations
//! of different devices never share a connection:
//!
//! ```text
//! connect ─> authenticate ─> open_door_init ─> open_door ─> close
//!    │             │                │               │          ▲
//!    └─────────────┴────── any failure ─────────────┴──────────┘
//! ```
//!
//! The connection is closed on every exit path before the result is
//! returned. Nothing is retried.

use portico_core::constants::{BRIDGE_STATUS_OK, LOCAL_FAILURE_CODE};
use portico_core::{ActivationError, ActivationResult, Activator, BridgeSettings, DeviceRef};
use tracing::{debug, info, warn};

use crate::client::{BridgeClient, BridgeClientError};

/// Stage of the session a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Connect,
    Authenticate,
    Command,
}

/// Activates devices through the bridge, one session per call.
#[derive(Debug, Clone)]
pub struct BridgeActivator {
    settings: BridgeSettings,

    /// Apartment address of the bridge, from the discovered address book.
    bridge_apt_address: String,
}

impl BridgeActivator {
    pub fn new(settings: BridgeSettings, bridge_apt_address: impl Into<String>) -> Self {
        Self {
            settings,
            bridge_apt_address: bridge_apt_address.into(),
        }
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    async fn run_session(
        &self,
        client: &mut BridgeClient,
        device: &DeviceRef,
    ) -> Result<(), ActivationError> {
        client
            .connect()
            .await
            .map_err(|e| session_error(Stage::Connect, e))?;

        let code = client
            .authenticate(&self.settings.token)
            .await
            .map_err(|e| session_error(Stage::Authenticate, e))?;
        if code != BRIDGE_STATUS_OK {
            warn!(code, "Bridge rejected authentication");
            return Err(ActivationError::Authentication { code });
        }

        let (code, message) = client
            .open_door_init(&self.bridge_apt_address)
            .await
            .map_err(|e| session_error(Stage::Command, e))?;
        check_ack("open_door_init", code, message)?;

        let (code, message) = client
            .open_door(device)
            .await
            .map_err(|e| session_error(Stage::Command, e))?;
        check_ack("open_door", code, message)?;

        Ok(())
    }
}

impl Activator for BridgeActivator {
    async fn activate(&self, device: &DeviceRef) -> ActivationResult {
        debug!(device = %device, "Activating device");

        let mut client = BridgeClient::new(&self.settings);
        let outcome = self.run_session(&mut client, device).await;

        if let Err(e) = client.close().await {
            warn!("Error closing bridge session: {}", e);
        }

        match outcome {
            Ok(()) => {
                info!(device = %device, "Activation acknowledged");
                ActivationResult::succeeded()
            }
            Err(error) => {
                warn!(device = %device, code = error.code(), "Activation failed: {}", error);
                ActivationResult::failed(error)
            }
        }
    }
}

fn check_ack(command: &str, code: i32, message: Option<String>) -> Result<(), ActivationError> {
    if code == BRIDGE_STATUS_OK {
        return Ok(());
    }
    let message = message.unwrap_or_else(|| format!("{command} rejected"));
    Err(ActivationError::command(code, message))
}

/// Map a client error to the activation failure taxonomy.
fn session_error(stage: Stage, error: BridgeClientError) -> ActivationError {
    if let Some(timeout_ms) = error.timeout_ms() {
        return ActivationError::Timeout { timeout_ms };
    }
    match stage {
        Stage::Connect | Stage::Authenticate => ActivationError::transport(error.to_string()),
        Stage::Command => ActivationError::command(LOCAL_FAILURE_CODE, error.to_string()),
    }
}
