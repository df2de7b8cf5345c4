// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end tests against a scripted mock matrix.

use rfmatrix::codec;
use rfmatrix::{
    ConnectionHealth, FlagState, MatrixClient, MatrixConfig, MatrixError, MatrixEvent,
    PollOutcome, StatusMode, TransportError,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// How the mock answers one request.
#[derive(Clone)]
enum Answer {
    /// Send the framed body (checksum appended) and close.
    Reply(&'static str),
    /// Close without sending anything.
    Close,
    /// Keep the connection open without answering.
    Silent,
}

struct MockMatrix {
    port: u16,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockMatrix {
    async fn start(script: impl Fn(&str) -> Answer + Send + Sync + 'static) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let script = Arc::new(script);

        let log = requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut sock, _)) = listener.accept().await else {
                    break;
                };
                let log = log.clone();
                let script = script.clone();
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 256];
                    while !buf.ends_with(b"\r\n") {
                        match sock.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }
                    // the checksum may be a space, so only strip the line end
                    let request = String::from_utf8_lossy(&buf[..buf.len() - 2]).into_owned();
                    let inner = codec::decode(&request)
                        .map(|r| r.inner)
                        .unwrap_or_default();
                    log.lock().await.push(request);

                    match script(&inner) {
                        Answer::Reply(body) => {
                            let packet = codec::encode(body).expect("encode reply");
                            let _ = sock.write_all(packet.as_bytes()).await;
                        }
                        Answer::Close => {}
                        Answer::Silent => tokio::time::sleep(Duration::from_secs(10)).await,
                    }
                });
            }
        });

        Self { port, requests }
    }

    fn config(&self) -> MatrixConfig {
        MatrixConfig {
            idle_timeout_ms: 50,
            overall_timeout_ms: 400,
            ..MatrixConfig::new("127.0.0.1", self.port)
        }
    }

    async fn requests(&self) -> Vec<String> {
        self.requests.lock().await.clone()
    }
}

fn device(inner: &str) -> Answer {
    match inner {
        "ABT?" => Answer::Reply("BAT?,RX-A,RX-B,RX-C,RX-D,ANT1,ANT2,ANT3,ANT4"),
        "AB?" => Answer::Reply("BASTATUS,001,002,003,004,O,O,O,F"),
        "ABQ" => Answer::Reply("BAQOFOO"),
        _ => Answer::Close,
    }
}

#[tokio::test]
async fn test_refresh_aliases_and_status() {
    let mock = MockMatrix::start(device).await;
    let client = MatrixClient::new(mock.config()).expect("client");
    let mut events = client.subscribe();

    assert_eq!(
        client.refresh_aliases().await.expect("aliases"),
        PollOutcome::Updated
    );
    assert_eq!(
        events.recv().await.expect("event"),
        MatrixEvent::TopologyChanged {
            inputs: 4,
            outputs: 4
        }
    );

    assert_eq!(
        client.refresh_status().await.expect("status"),
        PollOutcome::Updated
    );

    let snap = client.snapshot();
    assert_eq!(snap.connection, ConnectionHealth::Ok);
    assert_eq!(snap.outputs[2].name, "RX-C");
    assert_eq!(snap.outputs[2].source, 3);
    assert_eq!(snap.outputs[2].source_name, "ANT3");
    assert_eq!(snap.health.summary, FlagState::Fault);
    assert!(snap.last_status.starts_with("{BASTATUS,001"));

    let requests = mock.requests().await;
    assert!(requests[0].starts_with("{ABT?}"));
    assert!(requests[1].starts_with("{AB?}"));
}

#[tokio::test]
async fn test_quick_status_keeps_routing() {
    let mock = MockMatrix::start(device).await;
    let client = MatrixClient::new(mock.config()).expect("client");

    client.refresh_status().await.expect("status");
    client.refresh_quick_status().await.expect("quick");

    client.with_state(|state| {
        assert_eq!(state.routes(), &[1, 2, 3, 4]);
        assert_eq!(state.health().psu2, FlagState::Fault);
        assert_eq!(state.health().summary, FlagState::Ok);
    });
}

#[tokio::test]
async fn test_empty_reply_is_warning_not_failure() {
    let mock = MockMatrix::start(|_| Answer::Close).await;
    let client = MatrixClient::new(mock.config()).expect("client");

    assert_eq!(
        client.refresh_status().await.expect("empty reply is not an error"),
        PollOutcome::NoData
    );
    assert_eq!(
        client.with_state(|s| s.connection()),
        ConnectionHealth::Warning
    );
}

#[tokio::test]
async fn test_unparsable_reply_is_warning() {
    let mock = MockMatrix::start(|_| Answer::Reply("BANAK")).await;
    let client = MatrixClient::new(mock.config()).expect("client");

    assert_eq!(
        client.refresh_aliases().await.expect("reply"),
        PollOutcome::Unparsable
    );
    assert_eq!(
        client.with_state(|s| s.connection()),
        ConnectionHealth::Warning
    );
}

#[tokio::test]
async fn test_silent_device_times_out() {
    let mock = MockMatrix::start(|_| Answer::Silent).await;
    let client = MatrixClient::new(mock.config()).expect("client");

    let started = Instant::now();
    let err = client.refresh_status().await.expect_err("timeout");
    let elapsed = started.elapsed();

    assert!(matches!(
        err,
        MatrixError::Transport(TransportError::Timeout(_))
    ));
    assert!(elapsed >= Duration::from_millis(400), "{:?}", elapsed);
    assert!(elapsed < Duration::from_secs(3), "{:?}", elapsed);
}

#[tokio::test]
async fn test_route_commands_on_the_wire() {
    let mock = MockMatrix::start(device).await;
    let client = MatrixClient::new(mock.config()).expect("client");
    client.refresh_aliases().await.expect("aliases");

    client.route(2, 0).await.expect("legacy route");
    client.route_pair(1, 3).await.expect("pair route");
    client.select_output(3).expect("select");
    client.route_selected(4).await.expect("selected route");
    client.route_selected_pair(1).await.expect("selected pair");

    let requests = mock.requests().await;
    let bodies: Vec<String> = requests
        .iter()
        .skip(1)
        .map(|r| codec::decode(r).expect("framed").inner)
        .collect();
    assert_eq!(
        bodies,
        vec![
            "ABs,002,000",
            "ABs,001,003",
            "ABs,002,004",
            "ABs,003,004",
            "ABs,003,001",
            "ABs,004,002",
        ]
    );

    for request in &requests {
        let reply = codec::decode(request).expect("framed");
        assert!(reply.checksum_valid(), "bad checksum in {:?}", request);
    }
}

#[tokio::test]
async fn test_route_does_not_assume_new_state() {
    let mock = MockMatrix::start(device).await;
    let client = MatrixClient::new(mock.config()).expect("client");
    client.refresh_status().await.expect("status");

    client.route(1, 4).await.expect("route");
    assert_eq!(client.with_state(|s| s.routed_input(1)), 1);
}

#[tokio::test]
async fn test_invalid_pair_sends_nothing() {
    let mock = MockMatrix::start(device).await;
    let client = MatrixClient::new(mock.config()).expect("client");
    client.refresh_aliases().await.expect("aliases");

    assert!(client.route_pair(3, 4).await.is_err());
    assert!(client.route_pair(2, 1).await.is_err());
    assert!(client.route_pair(5, 1).await.is_err());
    assert_eq!(mock.requests().await.len(), 1);
    assert!(!client.snapshot().last_error.is_empty());
}

#[tokio::test]
async fn test_refused_connection_marks_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);

    let config = MatrixConfig {
        idle_timeout_ms: 50,
        overall_timeout_ms: 400,
        ..MatrixConfig::new("127.0.0.1", port)
    };
    let client = MatrixClient::new(config).expect("client");

    let err = client.route(1, 1).await.expect_err("refused");
    assert!(err.is_transport());
    assert_eq!(
        client.with_state(|s| s.connection()),
        ConnectionHealth::ConnectionFailure
    );
}

#[tokio::test]
async fn test_refresh_failure_is_reported() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);

    let config = MatrixConfig {
        idle_timeout_ms: 50,
        overall_timeout_ms: 400,
        ..MatrixConfig::new("127.0.0.1", port)
    };
    let client = MatrixClient::new(config).expect("client");
    let mut events = client.subscribe();

    let err = client.refresh_status().await.expect_err("refused");
    assert!(err.is_transport());

    let snap = client.snapshot();
    assert_eq!(snap.connection, ConnectionHealth::ConnectionFailure);
    assert!(!snap.last_error.is_empty());
    assert_eq!(
        events.recv().await.expect("event"),
        MatrixEvent::ConnectionChanged {
            health: ConnectionHealth::ConnectionFailure
        }
    );

    client.refresh_aliases().await.expect_err("refused");
    client.refresh_quick_status().await.expect_err("refused");
    assert_eq!(
        client.with_state(|s| s.connection()),
        ConnectionHealth::ConnectionFailure
    );
}

#[tokio::test]
async fn test_pollers_drive_state() {
    let mock = MockMatrix::start(device).await;
    let config = MatrixConfig {
        alias_poll_ms: 500,
        status_poll_ms: 200,
        status_mode: StatusMode::Full,
        ..mock.config()
    };
    let client = MatrixClient::new(config).expect("client");

    let pollers = client.start_polling();
    tokio::time::sleep(Duration::from_millis(700)).await;
    pollers.shutdown().await;

    let snap = client.snapshot();
    assert_eq!(snap.topology.outputs, 4);
    assert_eq!(snap.inputs[3].name, "ANT4");
    assert_eq!(snap.outputs[3].source, 4);

    let seen = mock.requests().await.len();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(mock.requests().await.len(), seen);
}

#[tokio::test]
async fn test_pollers_survive_failures() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);

    let config = MatrixConfig {
        idle_timeout_ms: 50,
        overall_timeout_ms: 300,
        status_poll_ms: 200,
        ..MatrixConfig::new("127.0.0.1", port)
    };
    let client = MatrixClient::new(config).expect("client");

    let pollers = client.start_polling();
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(pollers.status().is_running());
    assert!(pollers.alias().is_running());
    pollers.shutdown().await;

    let snap = client.snapshot();
    assert_eq!(snap.connection, ConnectionHealth::ConnectionFailure);
    assert!(snap.last_error.contains("Transport"));
}
