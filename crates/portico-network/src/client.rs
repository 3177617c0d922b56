//! TCP client for bridge sessions.
//!
//! One `BridgeClient` is one session with the bridge. The client is a thin
//! transport layer over [`ClientCodec`]:
//! - **No automatic retry**: caller decides retry strategy
//! - **No connection pooling**: a new connection per session
//! - **No keepalive**: sessions are short-lived
//!
//! # Example Usage
//!
//! ```no_run
//! use portico_core::PlatformConfig;
//! use portico_network::BridgeClient;
//!
//! # async fn example(config: PlatformConfig) -> Result<(), Box<dyn std::error::Error>> {
//! let settings = config.bridge_settings();
//! let mut client = BridgeClient::new(&settings);
//! client.connect().await?;
//!
//! let code = client.authenticate(&settings.token).await?;
//! println!("Authentication code: {code}");
//!
//! client.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Timeout Handling
//!
//! Connect, send and receive are each bounded by the configured I/O timeout.
//! Closing uses its own short bound so a dead peer cannot stall cleanup.

use futures::{SinkExt, StreamExt};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, trace, warn};

use portico_core::{BridgeSettings, DeviceRef};
use portico_protocol::{AddressBook, BridgeRequest, BridgeResponse, ClientCodec, ProtocolError};

/// Bound on flush and shutdown while closing.
const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Errors that can occur during a bridge session.
#[derive(Debug, Error)]
pub enum BridgeClientError {
    /// Client is not connected to the bridge
    #[error("Not connected to bridge")]
    NotConnected,

    /// Connection attempt timed out
    #[error("Connection timeout after {0}ms")]
    ConnectionTimeout(u64),

    /// Read operation timed out
    #[error("Read timeout after {0}ms")]
    ReadTimeout(u64),

    /// Write operation timed out
    #[error("Write timeout after {0}ms")]
    WriteTimeout(u64),

    /// Connection was lost during operation
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Bridge answered with a message of the wrong kind
    #[error("Unexpected response: expected {expected}, got {actual}")]
    UnexpectedResponse {
        expected: &'static str,
        actual: &'static str,
    },

    /// Framing or decoding error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Low-level I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeClientError {
    /// Timeout in milliseconds, if this error is a timeout.
    pub fn timeout_ms(&self) -> Option<u64> {
        match self {
            Self::ConnectionTimeout(ms) | Self::ReadTimeout(ms) | Self::WriteTimeout(ms) => {
                Some(*ms)
            }
            _ => None,
        }
    }
}

/// A single session with the bridge.
///
/// # Connection Lifecycle
///
/// 1. Create client with `new()`
/// 2. Connect with `connect()`
/// 3. Authenticate, then issue commands
/// 4. Close with `close()`
pub struct BridgeClient {
    host: String,
    port: u16,

    /// Framed TCP stream (None if not connected)
    framed: Option<Framed<TcpStream, ClientCodec>>,

    /// Timeout for all I/O operations
    timeout: Duration,
}

impl BridgeClient {
    /// Create a new client. The client is not connected after creation.
    ///
    /// # Example
    ///
    /// ```
    /// use portico_core::PlatformConfig;
    /// use portico_network::BridgeClient;
    ///
    /// let config = PlatformConfig::from_json(
    ///     r#"{"bridge_url": "127.0.0.1", "icona_token": "t"}"#,
    /// ).unwrap();
    /// let client = BridgeClient::new(&config.bridge_settings());
    /// assert!(!client.is_connected());
    /// ```
    pub fn new(settings: &BridgeSettings) -> Self {
        debug!("Creating bridge client for {}", settings.address());

        Self {
            host: settings.host.clone(),
            port: settings.port,
            framed: None,
            timeout: settings.io_timeout,
        }
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    /// Connect to the bridge.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection times out, is refused, or the
    /// address cannot be resolved.
    pub async fn connect(&mut self) -> Result<(), BridgeClientError> {
        info!("Connecting to bridge at {}:{}", self.host, self.port);

        let connect = TcpStream::connect((self.host.as_str(), self.port));
        let stream = match tokio::time::timeout(self.timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                error!("Connection failed: {}", e);
                return Err(e.into());
            }
            Err(_) => {
                warn!("Connection timeout after {}ms", self.timeout_ms());
                return Err(BridgeClientError::ConnectionTimeout(self.timeout_ms()));
            }
        };

        // Commands are tiny and latency matters more than throughput.
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }

        self.framed = Some(Framed::new(stream, ClientCodec::new()));

        debug!("Bridge client connected");
        Ok(())
    }

    /// Send one request.
    ///
    /// # Errors
    ///
    /// Returns an error if the client is not connected, the write times out,
    /// or the connection is lost.
    pub async fn send(&mut self, request: BridgeRequest) -> Result<(), BridgeClientError> {
        let timeout = self.timeout;
        let timeout_ms = self.timeout_ms();
        let framed = self.framed.as_mut().ok_or(BridgeClientError::NotConnected)?;

        match tokio::time::timeout(timeout, framed.send(request)).await {
            Ok(Ok(())) => {
                trace!("Request sent");
                Ok(())
            }
            Ok(Err(e)) => {
                error!("Failed to send request: {}", e);
                Err(e.into())
            }
            Err(_) => {
                warn!("Send timeout after {}ms", timeout_ms);
                Err(BridgeClientError::WriteTimeout(timeout_ms))
            }
        }
    }

    /// Receive one response.
    ///
    /// # Errors
    ///
    /// Returns an error if the client is not connected, the read times out,
    /// the bridge closes the connection, or the frame cannot be decoded.
    pub async fn recv(&mut self) -> Result<BridgeResponse, BridgeClientError> {
        let timeout = self.timeout;
        let timeout_ms = self.timeout_ms();
        let framed = self.framed.as_mut().ok_or(BridgeClientError::NotConnected)?;

        match tokio::time::timeout(timeout, framed.next()).await {
            Ok(Some(Ok(response))) => {
                trace!(kind = response.kind(), "Received response");
                Ok(response)
            }
            Ok(Some(Err(e))) => {
                error!("Failed to decode response: {}", e);
                Err(e.into())
            }
            Ok(None) => {
                warn!("Connection closed by bridge");
                Err(BridgeClientError::ConnectionLost(
                    "Bridge closed connection".to_string(),
                ))
            }
            Err(_) => {
                warn!("Receive timeout after {}ms", timeout_ms);
                Err(BridgeClientError::ReadTimeout(timeout_ms))
            }
        }
    }

    async fn request(
        &mut self,
        request: BridgeRequest,
    ) -> Result<BridgeResponse, BridgeClientError> {
        self.send(request).await?;
        self.recv().await
    }

    /// Present the credential token and return the bridge status code.
    ///
    /// A rejected token is not an error here: the code is returned and the
    /// caller decides (200 means success).
    ///
    /// # Errors
    ///
    /// Returns transport errors, or `UnexpectedResponse` if the bridge does
    /// not answer with an authentication result.
    pub async fn authenticate(&mut self, token: &str) -> Result<i32, BridgeClientError> {
        debug!("Authenticating with bridge");
        match self
            .request(BridgeRequest::Authenticate {
                token: token.to_string(),
            })
            .await?
        {
            BridgeResponse::Auth { code } => Ok(code),
            other => Err(BridgeClientError::UnexpectedResponse {
                expected: "auth",
                actual: other.kind(),
            }),
        }
    }

    /// Fetch the address book for `scope`.
    ///
    /// # Errors
    ///
    /// Returns transport errors, or `UnexpectedResponse` if the bridge does
    /// not answer with a configuration.
    pub async fn get_config(&mut self, scope: &str) -> Result<AddressBook, BridgeClientError> {
        debug!(scope, "Requesting bridge configuration");
        match self
            .request(BridgeRequest::GetConfig {
                scope: scope.to_string(),
            })
            .await?
        {
            BridgeResponse::Config { address_book } => Ok(address_book),
            other => Err(BridgeClientError::UnexpectedResponse {
                expected: "config",
                actual: other.kind(),
            }),
        }
    }

    /// Prepare door opening for the bridge apartment address.
    ///
    /// Returns the acknowledgement code and optional message.
    ///
    /// # Errors
    ///
    /// Returns transport errors, or `UnexpectedResponse` for a non-ack answer.
    pub async fn open_door_init(
        &mut self,
        apt_address: &str,
    ) -> Result<(i32, Option<String>), BridgeClientError> {
        self.expect_ack(BridgeRequest::OpenDoorInit {
            apt_address: apt_address.to_string(),
        })
        .await
    }

    /// Trigger the actuator of `device`.
    ///
    /// Returns the acknowledgement code and optional message.
    ///
    /// # Errors
    ///
    /// Returns transport errors, or `UnexpectedResponse` for a non-ack answer.
    pub async fn open_door(
        &mut self,
        device: &DeviceRef,
    ) -> Result<(i32, Option<String>), BridgeClientError> {
        debug!(device = %device, "Sending open door command");
        self.expect_ack(BridgeRequest::from(device)).await
    }

    async fn expect_ack(
        &mut self,
        request: BridgeRequest,
    ) -> Result<(i32, Option<String>), BridgeClientError> {
        match self.request(request).await? {
            BridgeResponse::Ack { code, message } => Ok((code, message)),
            other => Err(BridgeClientError::UnexpectedResponse {
                expected: "ack",
                actual: other.kind(),
            }),
        }
    }

    /// Returns `true` if the client has an active connection.
    pub fn is_connected(&self) -> bool {
        self.framed.is_some()
    }

    /// Close the connection gracefully.
    ///
    /// Idempotent: calling it on a closed client does nothing. Flush and
    /// shutdown are bounded by 500ms each.
    ///
    /// # Errors
    ///
    /// Currently always succeeds; failures during flush or shutdown are
    /// logged and the connection is dropped anyway.
    pub async fn close(&mut self) -> Result<(), BridgeClientError> {
        if let Some(mut framed) = self.framed.take() {
            info!("Closing connection to bridge {}:{}", self.host, self.port);

            let flush = SinkExt::<BridgeRequest>::flush(&mut framed);
            match tokio::time::timeout(CLOSE_TIMEOUT, flush).await {
                Ok(Ok(())) => debug!("Flush completed"),
                Ok(Err(e)) => warn!("Error flushing during close: {}", e),
                Err(_) => warn!("Flush timeout during close"),
            }

            let mut stream = framed.into_inner();
            match tokio::time::timeout(CLOSE_TIMEOUT, stream.shutdown()).await {
                Ok(Ok(())) => debug!("Shutdown completed"),
                Ok(Err(e)) => warn!("Error during shutdown: {}", e),
                Err(_) => warn!("Shutdown timeout during close"),
            }
        }

        Ok(())
    }
}

impl Drop for BridgeClient {
    fn drop(&mut self) {
        if self.framed.is_some() {
            debug!("BridgeClient dropped while connected - connection will be closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_core::DeviceSource;

    fn settings(host: &str, port: u16, timeout_ms: u64) -> BridgeSettings {
        BridgeSettings {
            host: host.to_string(),
            port,
            token: "token".to_string(),
            io_timeout: Duration::from_millis(timeout_ms),
        }
    }

    #[test]
    fn test_client_not_connected_initially() {
        let client = BridgeClient::new(&settings("127.0.0.1", 64100, 1000));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_commands_without_connect() {
        let mut client = BridgeClient::new(&settings("127.0.0.1", 64100, 1000));

        assert!(matches!(
            client.authenticate("t").await,
            Err(BridgeClientError::NotConnected)
        ));
        let device = DeviceRef::new("Gate", "SB1", 0, DeviceSource::Door);
        assert!(matches!(
            client.open_door(&device).await,
            Err(BridgeClientError::NotConnected)
        ));
        assert!(matches!(
            client.recv().await,
            Err(BridgeClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_connection_timeout() {
        // Non-routable address (RFC 5737 TEST-NET-1)
        let mut client = BridgeClient::new(&settings("192.0.2.1", 9999, 100));
        let result = client.connect().await;

        // Hosts without a route fail fast instead of timing out
        assert!(matches!(
            result,
            Err(BridgeClientError::ConnectionTimeout(100) | BridgeClientError::Io(_))
        ));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_multiple_close_calls() {
        let mut client = BridgeClient::new(&settings("127.0.0.1", 64100, 1000));
        client.close().await.unwrap();
        client.close().await.unwrap();
    }

    #[test]
    fn test_timeout_ms() {
        assert_eq!(BridgeClientError::ReadTimeout(5).timeout_ms(), Some(5));
        assert_eq!(BridgeClientError::NotConnected.timeout_ms(), None);
    }
}
