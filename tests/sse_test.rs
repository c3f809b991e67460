//! Integration tests for the SSE endpoints: snapshot-first delivery, live
//! updates, per-entity isolation, and subscriber cleanup on disconnect.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::Notify;

use huddle_server::events::snapshot::{SnapshotError, SnapshotStore};
use huddle_server::state::AppState;

/// Incremental reader over an SSE byte stream, one `data:` frame at a time.
struct SseReader {
    stream: futures_util::stream::BoxStream<'static, reqwest::Result<bytes::Bytes>>,
    buf: String,
}

impl SseReader {
    async fn connect(url: &str) -> SseReader {
        let response = reqwest::get(url).await.expect("SSE request failed");
        assert_eq!(response.status(), 200);
        assert_eq!(
            response
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok()),
            Some("text/event-stream")
        );
        assert_eq!(
            response
                .headers()
                .get("cache-control")
                .and_then(|v| v.to_str().ok()),
            Some("no-cache")
        );

        SseReader {
            stream: response.bytes_stream().boxed(),
            buf: String::new(),
        }
    }

    /// Next `data:` payload, parsed as JSON. Skips keep-alive comments.
    async fn next_frame(&mut self) -> serde_json::Value {
        loop {
            if let Some(pos) = self.buf.find("\n\n") {
                let rest = self.buf.split_off(pos + 2);
                let frame = std::mem::replace(&mut self.buf, rest);
                let frame = frame.trim_end().to_string();
                if frame.starts_with(':') {
                    continue;
                }
                let data = frame
                    .strip_prefix("data: ")
                    .unwrap_or_else(|| panic!("Frame without data field: {:?}", frame));
                return serde_json::from_str(data).expect("SSE payload is not JSON");
            }

            let chunk = tokio::time::timeout(Duration::from_secs(2), self.stream.next())
                .await
                .expect("Timed out waiting for SSE frame")
                .expect("SSE stream ended unexpectedly")
                .expect("SSE stream error");
            self.buf
                .push_str(std::str::from_utf8(&chunk).expect("SSE chunk is not UTF-8"));
        }
    }

    /// Assert no data frame arrives within `ms` milliseconds.
    async fn assert_silent(&mut self, ms: u64) {
        match tokio::time::timeout(Duration::from_millis(ms), self.stream.next()).await {
            Err(_) => {}
            Ok(Some(Ok(chunk))) => {
                let text = String::from_utf8_lossy(&chunk).to_string();
                assert!(
                    text.trim_start().starts_with(':'),
                    "Expected silence, got frame: {:?}",
                    text
                );
            }
            Ok(other) => panic!("Expected silence, got: {:?}", other),
        }
    }
}

fn seed_notification(state: &AppState, member_id: &str, content: &str) {
    let conn = state.db.lock().unwrap();
    conn.execute(
        "INSERT INTO notifications (id, member_id, kind, content, is_read, created_at)
         VALUES (?1, ?2, 'task', ?3, 0, ?4)",
        rusqlite::params![
            uuid::Uuid::new_v4().to_string(),
            member_id,
            content,
            chrono::Utc::now().to_rfc3339()
        ],
    )
    .unwrap();
}

fn seed_project(state: &AppState, project_id: &str, name: &str) {
    let conn = state.db.lock().unwrap();
    conn.execute(
        "INSERT INTO projects (id, name, description, updated_at) VALUES (?1, ?2, '', ?3)",
        rusqlite::params![project_id, name, chrono::Utc::now().to_rfc3339()],
    )
    .unwrap();
}

#[tokio::test]
async fn notification_stream_sends_snapshot_then_live_updates() {
    let server = common::start_test_server().await;
    seed_notification(&server.state, "42", "review the sprint board");

    let mut member_42 = SseReader::connect(&format!(
        "http://{}/api/members/42/notifications/stream",
        server.addr
    ))
    .await;
    let mut member_43 = SseReader::connect(&format!(
        "http://{}/api/members/43/notifications/stream",
        server.addr
    ))
    .await;

    // First frame is the current notification list
    let snapshot = member_42.next_frame().await;
    let list = snapshot.as_array().expect("snapshot is a JSON array");
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["content"], "review the sprint board");

    // A member with no notifications still gets a (empty) snapshot
    let empty = member_43.next_frame().await;
    assert_eq!(empty.as_array().map(Vec::len), Some(0));

    // A mutating operation elsewhere publishes the updated list
    let updated = serde_json::json!([
        {"id": "n1", "content": "review the sprint board", "is_read": true}
    ]);
    server
        .state
        .notification_events
        .send_event("42", &updated.to_string());

    let frame = member_42.next_frame().await;
    assert_eq!(frame, updated);

    // Member 43 never sees member 42's events
    member_43.assert_silent(300).await;
}

#[tokio::test]
async fn project_stream_404_when_project_is_missing() {
    let server = common::start_test_server().await;

    let response = reqwest::get(format!(
        "http://{}/api/projects/ghost/stream",
        server.addr
    ))
    .await
    .unwrap();
    assert_eq!(response.status(), 404);

    // The rejected request must not leave a subscription behind
    assert_eq!(server.state.project_events.subscriber_count("ghost"), 0);
}

/// Snapshot store whose project fetch blocks until the test releases it,
/// for exercising updates that race the initial fetch.
struct GatedSnapshotStore {
    entered: Arc<Notify>,
    release: Arc<Notify>,
    project: serde_json::Value,
}

#[async_trait]
impl SnapshotStore for GatedSnapshotStore {
    async fn member_notifications(
        &self,
        _member_id: &str,
    ) -> Result<serde_json::Value, SnapshotError> {
        Ok(serde_json::json!([]))
    }

    async fn project_state(&self, _project_id: &str) -> Result<serde_json::Value, SnapshotError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(self.project.clone())
    }
}

#[tokio::test]
async fn update_published_during_snapshot_fetch_is_not_lost() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let server = common::start_test_server_with_snapshots(Arc::new(GatedSnapshotStore {
        entered: entered.clone(),
        release: release.clone(),
        project: serde_json::json!({"id": "p1", "name": "stale"}),
    }))
    .await;

    let url = format!("http://{}/api/projects/p1/stream", server.addr);
    let connecting = tokio::spawn(async move { SseReader::connect(&url).await });

    // The handler is parked inside the snapshot fetch; its queue must
    // already be registered so this update is buffered, not dropped.
    tokio::time::timeout(Duration::from_secs(2), entered.notified())
        .await
        .expect("Snapshot fetch never started");
    assert_eq!(server.state.project_events.subscriber_count("p1"), 1);

    let updated = serde_json::json!({"id": "p1", "name": "fresh"});
    server
        .state
        .project_events
        .send_event("p1", &updated.to_string());
    release.notify_one();

    let mut client = connecting.await.unwrap();
    assert_eq!(client.next_frame().await["name"], "stale");
    assert_eq!(client.next_frame().await, updated);
}

#[tokio::test]
async fn project_stream_sends_snapshot_then_live_updates() {
    let server = common::start_test_server().await;
    seed_project(&server.state, "p1", "Apollo");

    let mut client = SseReader::connect(&format!(
        "http://{}/api/projects/p1/stream",
        server.addr
    ))
    .await;

    let snapshot = client.next_frame().await;
    assert_eq!(snapshot["id"], "p1");
    assert_eq!(snapshot["name"], "Apollo");

    let updated = serde_json::json!({"id": "p1", "name": "Apollo Renamed"});
    server
        .state
        .project_events
        .send_event("p1", &updated.to_string());

    assert_eq!(client.next_frame().await, updated);
}

#[tokio::test]
async fn subscriber_is_pruned_after_client_disconnect() {
    let server = common::start_test_server().await;
    seed_project(&server.state, "p1", "Apollo");

    {
        let mut client = SseReader::connect(&format!(
            "http://{}/api/projects/p1/stream",
            server.addr
        ))
        .await;
        client.next_frame().await; // snapshot
        assert_eq!(server.state.project_events.subscriber_count("p1"), 1);
        // Dropping the reader closes the HTTP connection
    }

    for _ in 0..20 {
        if server.state.project_events.subscriber_count("p1") == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("Subscriber queue was not pruned after disconnect");
}
