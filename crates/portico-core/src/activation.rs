//! Activation contract between the device engine and the bridge.
//!
//! The engine only needs one operation from the bridge: send the activation
//! command for a device and report whether it was acknowledged. Failures are
//! values, not errors: the engine turns them into a single failure event.

use crate::DeviceRef;
use crate::constants::{BRIDGE_STATUS_OK, LOCAL_FAILURE_CODE};
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;

/// Why an activation did not happen.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivationError {
    /// Connection could not be established or was lost.
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// The bridge rejected the credential token.
    #[error("Authentication rejected by bridge (code {code})")]
    Authentication { code: i32 },

    /// Authentication succeeded but the door command failed.
    #[error("Activation command failed (code {code}): {message}")]
    Command { code: i32, message: String },

    /// The bridge did not answer within the configured bound.
    #[error("Bridge did not answer within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl ActivationError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn command(code: i32, message: impl Into<String>) -> Self {
        Self::Command {
            code,
            message: message.into(),
        }
    }

    /// Status code to surface with the failure.
    ///
    /// Remote-reported failures carry the bridge code; local failures carry
    /// [`LOCAL_FAILURE_CODE`].
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::Authentication { code } | Self::Command { code, .. } => *code,
            Self::Transport { .. } | Self::Timeout { .. } => LOCAL_FAILURE_CODE,
        }
    }
}

/// Outcome of one activation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationResult {
    pub code: i32,
    pub error: Option<ActivationError>,
}

impl ActivationResult {
    /// Acknowledged activation.
    #[must_use]
    pub fn succeeded() -> Self {
        Self {
            code: BRIDGE_STATUS_OK,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(error: ActivationError) -> Self {
        Self {
            code: error.code(),
            error: Some(error),
        }
    }

    #[inline]
    #[must_use]
    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    /// Human-readable failure description, `None` on success.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

impl From<ActivationError> for ActivationResult {
    fn from(error: ActivationError) -> Self {
        Self::failed(error)
    }
}

/// Sends the activation command for a device.
///
/// Implementations must not retry, and must release every resource they
/// acquire before the returned future completes, whatever the outcome.
pub trait Activator: Send + Sync + 'static {
    fn activate(&self, device: &DeviceRef) -> impl Future<Output = ActivationResult> + Send;
}
