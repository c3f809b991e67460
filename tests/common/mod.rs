//! Shared helpers for integration tests: a real server on an ephemeral port
//! plus WebSocket and SSE client utilities.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use huddle_server::chat::storage::{ChatStore, SqliteChatStore};
use huddle_server::events::hub::EventHub;
use huddle_server::events::snapshot::{SnapshotStore, SqliteSnapshotStore};
use huddle_server::state::AppState;
use huddle_server::ws::registry::ConnectionRegistry;
use huddle_server::{auth, db, routes};

pub type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
}

/// Start the server on a random port with the default SQLite collaborators.
pub async fn start_test_server() -> TestServer {
    start_test_server_with(None, None).await
}

/// Start the server with a substituted chat-store collaborator.
pub async fn start_test_server_with_store(chat_store: Option<Arc<dyn ChatStore>>) -> TestServer {
    start_test_server_with(chat_store, None).await
}

/// Start the server with a substituted snapshot-store collaborator.
pub async fn start_test_server_with_snapshots(snapshots: Arc<dyn SnapshotStore>) -> TestServer {
    start_test_server_with(None, Some(snapshots)).await
}

async fn start_test_server_with(
    chat_store: Option<Arc<dyn ChatStore>>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
) -> TestServer {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = db::init_db(&data_dir).expect("Failed to init DB");
    let jwt_secret = auth::token::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");

    let state = AppState {
        db: db.clone(),
        jwt_secret,
        call_connections: ConnectionRegistry::new(),
        chat_connections: ConnectionRegistry::new(),
        notification_events: EventHub::new(),
        project_events: EventHub::new(),
        chat_store: chat_store.unwrap_or_else(|| Arc::new(SqliteChatStore::new(db.clone()))),
        snapshots: snapshots.unwrap_or_else(|| Arc::new(SqliteSnapshotStore::new(db))),
    };

    let app = routes::build_router(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
        let _keep = tmp_dir;
    });

    TestServer { addr, state }
}

/// Connect a call-signaling WebSocket client.
pub async fn connect_call(addr: SocketAddr, project: &str, channel: &str, user: &str) -> WsStream {
    let url = format!("ws://{}/ws/call/{}/{}/{}", addr, project, channel, user);
    let (ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("Failed to connect call WebSocket");
    ws
}

/// Connect a chat WebSocket client with an access token.
pub async fn connect_chat(
    addr: SocketAddr,
    project: &str,
    channel: &str,
    user: &str,
    token: &str,
) -> WsStream {
    let url = format!(
        "ws://{}/ws/chat/{}/{}/{}?token={}",
        addr, project, channel, user, token
    );
    let (ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("Failed to connect chat WebSocket");
    ws
}

/// Read the next text frame as JSON, skipping keepalive ping/pong frames.
pub async fn next_json(ws: &mut WsStream) -> serde_json::Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("Timed out waiting for frame")
            .expect("Stream ended unexpectedly")
            .expect("WebSocket error");
        match msg {
            Message::Text(text) => {
                return serde_json::from_str(text.as_str()).expect("Frame is not JSON")
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Unexpected frame: {:?}", other),
        }
    }
}

/// Read the next text frame raw, skipping keepalive ping/pong frames.
pub async fn next_text(ws: &mut WsStream) -> String {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("Timed out waiting for frame")
            .expect("Stream ended unexpectedly")
            .expect("WebSocket error");
        match msg {
            Message::Text(text) => return text.as_str().to_string(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Unexpected frame: {:?}", other),
        }
    }
}

/// Assert that no data frame arrives within `ms` milliseconds.
pub async fn assert_silent(ws: &mut WsStream, ms: u64) {
    match tokio::time::timeout(Duration::from_millis(ms), ws.next()).await {
        Err(_) => {}
        Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => {}
        Ok(other) => panic!("Expected silence, got: {:?}", other),
    }
}

/// Assert the server closed the connection (close frame, error, or EOF).
pub async fn expect_closed(ws: &mut WsStream) {
    loop {
        match tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("Timed out waiting for close")
        {
            None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(other)) => panic!("Expected close, got: {:?}", other),
        }
    }
}
