//! Server-side WebSocket keepalive: periodic pings with a pong deadline so
//! dead transports are detected promptly instead of lingering until a write
//! fails.

use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout};

use super::ConnectionSender;

/// Ping interval: server sends a WebSocket ping every 30 seconds.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Pong timeout: if no pong arrives within 10 seconds after a ping, close.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Spawn the keepalive task for a connection.
///
/// Returns the task handle (aborted at teardown) and a channel the reader
/// loop uses to report received pongs.
pub fn spawn(tx: ConnectionSender) -> (JoinHandle<()>, mpsc::UnboundedSender<()>) {
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();

    let handle = tokio::spawn(async move {
        let mut ping_timer = interval(PING_INTERVAL);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            if tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                // Writer task has died, connection is gone
                break;
            }

            match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
                Ok(Some(())) => {
                    // Pong received, continue
                }
                _ => {
                    tracing::warn!("Pong timeout, closing connection");
                    let _ = tx.send(Message::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "Pong timeout".into(),
                    })));
                    break;
                }
            }
        }
    });

    (handle, pong_tx)
}
