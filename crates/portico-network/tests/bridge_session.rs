//! Integration tests for bridge sessions.
//!
//! These tests run the activation adapter and discovery against a mock
//! bridge on a local TCP port and check both the outcome and what the
//! bridge observed on the wire.

use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

use portico_core::{ActivationError, Activator, BridgeSettings, DeviceRef, DeviceSource};
use portico_network::{BridgeActivator, DiscoveryError, discover};
use portico_protocol::{AddressBook, BridgeRequest, BridgeResponse, DoorItem, ServerCodec};

/// How the mock bridge answers.
#[derive(Debug, Clone, Copy)]
struct Script {
    auth_code: i32,
    init_code: i32,
    open_code: i32,
    /// When false the bridge reads requests but never answers.
    respond: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            auth_code: 200,
            init_code: 200,
            open_code: 200,
            respond: true,
        }
    }
}

fn sample_book() -> AddressBook {
    AddressBook {
        apt_address: "SB000006".to_string(),
        doors: vec![DoorItem {
            name: "PEDONALE".to_string(),
            apt_address: "SB100001".to_string(),
            output_index: 1,
        }],
        actuators: vec![],
    }
}

/// Serve `sessions` connections and return the requests seen in each.
///
/// Each session ends when the client closes its side.
async fn spawn_bridge(
    script: Script,
    sessions: usize,
) -> (SocketAddr, JoinHandle<Vec<Vec<BridgeRequest>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let mut seen = Vec::new();
        for _ in 0..sessions {
            let (stream, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(stream, ServerCodec::new());
            let mut requests = Vec::new();

            while let Some(Ok(request)) = framed.next().await {
                let response = match &request {
                    BridgeRequest::Authenticate { .. } => BridgeResponse::Auth {
                        code: script.auth_code,
                    },
                    BridgeRequest::GetConfig { .. } => BridgeResponse::Config {
                        address_book: sample_book(),
                    },
                    BridgeRequest::OpenDoorInit { .. } => BridgeResponse::Ack {
                        code: script.init_code,
                        message: None,
                    },
                    BridgeRequest::OpenDoor { .. } => BridgeResponse::Ack {
                        code: script.open_code,
                        message: Some("door command".to_string()),
                    },
                };
                requests.push(request);
                if script.respond {
                    framed.send(response).await.unwrap();
                }
            }
            seen.push(requests);
        }
        seen
    });

    (addr, handle)
}

fn settings(addr: SocketAddr, timeout_ms: u64) -> BridgeSettings {
    BridgeSettings {
        host: addr.ip().to_string(),
        port: addr.port(),
        token: "secret".to_string(),
        io_timeout: Duration::from_millis(timeout_ms),
    }
}

fn device() -> DeviceRef {
    DeviceRef::new("PEDONALE", "SB100001", 1, DeviceSource::Door)
}

#[tokio::test]
async fn test_activation_success_closes_session() {
    let (addr, bridge) = spawn_bridge(Script::default(), 1).await;
    let activator = BridgeActivator::new(settings(addr, 1000), "SB000006");

    let result = activator.activate(&device()).await;
    assert!(result.success());
    assert_eq!(result.code, 200);

    // The bridge task only finishes once the client closed the connection
    let sessions = tokio::time::timeout(Duration::from_secs(2), bridge)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        sessions[0],
        vec![
            BridgeRequest::Authenticate {
                token: "secret".to_string()
            },
            BridgeRequest::OpenDoorInit {
                apt_address: "SB000006".to_string()
            },
            BridgeRequest::OpenDoor {
                apt_address: "SB100001".to_string(),
                output_index: 1,
                name: "PEDONALE".to_string(),
            },
        ]
    );
}

#[tokio::test]
async fn test_authentication_rejected() {
    let script = Script {
        auth_code: 401,
        ..Script::default()
    };
    let (addr, bridge) = spawn_bridge(script, 1).await;
    let activator = BridgeActivator::new(settings(addr, 1000), "SB000006");

    let result = activator.activate(&device()).await;
    assert!(!result.success());
    assert_eq!(result.code, 401);
    assert_eq!(
        result.error,
        Some(ActivationError::Authentication { code: 401 })
    );

    let sessions = tokio::time::timeout(Duration::from_secs(2), bridge)
        .await
        .unwrap()
        .unwrap();
    // No door command after a rejected token
    assert_eq!(sessions[0].len(), 1);
}

#[tokio::test]
async fn test_command_rejected() {
    let script = Script {
        open_code: 503,
        ..Script::default()
    };
    let (addr, bridge) = spawn_bridge(script, 1).await;
    let activator = BridgeActivator::new(settings(addr, 1000), "SB000006");

    let result = activator.activate(&device()).await;
    assert_eq!(result.code, 503);
    assert!(matches!(
        result.error,
        Some(ActivationError::Command { code: 503, .. })
    ));

    let sessions = tokio::time::timeout(Duration::from_secs(2), bridge)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sessions[0].len(), 3);
}

#[tokio::test]
async fn test_init_rejected_skips_open_door() {
    let script = Script {
        init_code: 500,
        ..Script::default()
    };
    let (addr, bridge) = spawn_bridge(script, 1).await;
    let activator = BridgeActivator::new(settings(addr, 1000), "SB000006");

    let result = activator.activate(&device()).await;
    assert!(matches!(
        result.error,
        Some(ActivationError::Command { code: 500, .. })
    ));

    let sessions = tokio::time::timeout(Duration::from_secs(2), bridge)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sessions[0].len(), 2);
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let activator = BridgeActivator::new(settings(addr, 1000), "SB000006");
    let result = activator.activate(&device()).await;

    assert_eq!(result.code, 0);
    assert!(matches!(
        result.error,
        Some(ActivationError::Transport { .. })
    ));
}

#[tokio::test]
async fn test_hung_bridge_times_out() {
    let script = Script {
        respond: false,
        ..Script::default()
    };
    let (addr, bridge) = spawn_bridge(script, 1).await;
    let activator = BridgeActivator::new(settings(addr, 100), "SB000006");

    let result = activator.activate(&device()).await;
    assert_eq!(
        result.error,
        Some(ActivationError::Timeout { timeout_ms: 100 })
    );

    // The session is still closed after the timeout
    let sessions = tokio::time::timeout(Duration::from_secs(2), bridge)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sessions[0].len(), 1);
}

#[tokio::test]
async fn test_each_activation_opens_its_own_session() {
    let (addr, bridge) = spawn_bridge(Script::default(), 2).await;
    let activator = BridgeActivator::new(settings(addr, 1000), "SB000006");

    assert!(activator.activate(&device()).await.success());
    assert!(activator.activate(&device()).await.success());

    let sessions = tokio::time::timeout(Duration::from_secs(2), bridge)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sessions.len(), 2);
    assert!(sessions.iter().all(|s| s.len() == 3));
}

#[tokio::test]
async fn test_discover_returns_address_book() {
    let (addr, bridge) = spawn_bridge(Script::default(), 1).await;

    let book = discover(&settings(addr, 1000)).await.unwrap();
    assert_eq!(book, sample_book());

    let sessions = tokio::time::timeout(Duration::from_secs(2), bridge)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        sessions[0][1],
        BridgeRequest::GetConfig { ref scope } if scope == "all"
    ));
}

#[tokio::test]
async fn test_discover_authentication_rejected() {
    let script = Script {
        auth_code: 403,
        ..Script::default()
    };
    let (addr, _bridge) = spawn_bridge(script, 1).await;

    let result = discover(&settings(addr, 1000)).await;
    assert!(matches!(result, Err(DiscoveryError::Authentication(403))));
}
