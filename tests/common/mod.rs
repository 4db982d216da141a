//! Shared helpers for end-to-end tests against a live gateway.

#![allow(dead_code, clippy::panic)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use classroom_gateway::app_state::AppState;
use classroom_gateway::build_app;
use classroom_gateway::config::GatewayConfig;
use classroom_gateway::domain::SessionId;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// WebSocket client used by the tests.
pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Running gateway under test.
#[derive(Debug)]
pub struct Gateway {
    /// Bound address.
    pub addr: SocketAddr,
    /// State shared with the server, for registry assertions.
    pub state: AppState,
}

/// Starts a gateway on an ephemeral port with the given `AUTH_TOKENS`.
pub async fn spawn_gateway(tokens: &str) -> Gateway {
    spawn_gateway_with(tokens, &[]).await
}

/// Starts a gateway with `AUTH_TOKENS` plus extra environment overrides.
pub async fn spawn_gateway_with(tokens: &str, overrides: &[(&str, &str)]) -> Gateway {
    let mut env: HashMap<String, String> = overrides
        .iter()
        .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
        .collect();
    env.insert("AUTH_TOKENS".to_string(), tokens.to_string());
    env.entry("OUTBOX_CAPACITY".to_string())
        .or_insert_with(|| "64".to_string());
    let Ok(config) = GatewayConfig::from_lookup(move |key| env.get(key).cloned()) else {
        panic!("test config should load");
    };
    let state = AppState::from_config(&config);
    let app = build_app(state.clone(), &config);

    let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Gateway { addr, state }
}

impl Gateway {
    /// Opens a classroom-channel connection and waits until it is
    /// registered.
    pub async fn join(&self, session: i64) -> Client {
        let before = self.connections(session).await;
        let client = self.connect(&format!("/ws/{session}")).await;
        self.wait_for_connections(session, before + 1).await;
        client
    }

    /// Opens a WebSocket to `path` without waiting for registration.
    pub async fn connect(&self, path: &str) -> Client {
        let url = format!("ws://{}{path}", self.addr);
        let Ok((client, _)) = connect_async(url.as_str()).await else {
            panic!("websocket connect to {url} failed");
        };
        client
    }

    /// Returns the live connection count of `session`.
    pub async fn connections(&self, session: i64) -> usize {
        self.state
            .engine
            .registry()
            .connection_count(SessionId::new(session))
            .await
    }

    /// Polls the registry until `session` has exactly `expected`
    /// connections.
    pub async fn wait_for_connections(&self, session: i64, expected: usize) {
        for _ in 0..300 {
            if self.connections(session).await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "session {session} never reached {expected} connections (has {})",
            self.connections(session).await
        );
    }

    /// Base HTTP URL of the gateway.
    pub fn http(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

/// Sends a text frame.
pub async fn send(client: &mut Client, text: &str) {
    if client.send(Message::text(text.to_string())).await.is_err() {
        panic!("send failed");
    }
}

/// Sends a binary frame.
pub async fn send_binary(client: &mut Client, bytes: &[u8]) {
    if client.send(Message::binary(bytes.to_vec())).await.is_err() {
        panic!("send failed");
    }
}

/// Receives the next text frame as JSON, skipping control frames.
pub async fn recv_json(client: &mut Client) -> Value {
    loop {
        let next = tokio::time::timeout(Duration::from_secs(3), client.next()).await;
        let Ok(Some(Ok(message))) = next else {
            panic!("expected a frame");
        };
        match message {
            Message::Text(text) => {
                let Ok(value) = serde_json::from_str(text.as_str()) else {
                    panic!("frame is not JSON: {}", text.as_str());
                };
                return value;
            }
            Message::Ping(_) | Message::Pong(_) => {}
            other => panic!("unexpected frame {other:?}"),
        }
    }
}

/// Asserts that no text frame arrives within a short window.
pub async fn assert_silent(client: &mut Client) {
    if let Ok(Some(Ok(Message::Text(text)))) =
        tokio::time::timeout(Duration::from_millis(200), client.next()).await
    {
        panic!("expected silence, got {}", text.as_str());
    }
}

/// Waits for the server to close the socket and returns the close code.
pub async fn expect_close(client: &mut Client) -> Option<u16> {
    loop {
        match tokio::time::timeout(Duration::from_secs(3), client.next()).await {
            Ok(Some(Ok(Message::Close(frame)))) => return frame.map(|f| u16::from(f.code)),
            Ok(Some(Ok(_))) => {}
            Ok(Some(Err(_)) | None) => return None,
            Err(_) => panic!("socket was not closed"),
        }
    }
}
