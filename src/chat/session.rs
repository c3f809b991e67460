//! Per-connection actor for channel chat.
//!
//! Each inbound frame is persisted through the chat-store collaborator and,
//! only on successful persistence, re-broadcast to the other members of the
//! same (project, channel). A storage failure is logged and the frame is not
//! broadcast; the connection stays open for subsequent messages.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::state::AppState;
use crate::ws::{self, fanout, keepalive};

const CLOSE_SUPERSEDED: u16 = 4000;

/// Inbound chat frame: the text body to persist and broadcast.
#[derive(Debug, Deserialize)]
pub struct ChatSubmission {
    pub content: String,
}

/// Run the actor for one authenticated chat WebSocket.
pub async fn run_connection(
    socket: WebSocket,
    state: AppState,
    project_id: String,
    channel_id: String,
    user_id: String,
) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    if let Some(superseded) =
        state
            .chat_connections
            .register(&project_id, &channel_id, &user_id, tx.clone())
    {
        tracing::info!(
            project_id = %project_id,
            channel_id = %channel_id,
            user_id = %user_id,
            "closing superseded chat connection"
        );
        let _ = superseded.send(Message::Close(Some(CloseFrame {
            code: CLOSE_SUPERSEDED,
            reason: "Superseded by new connection".into(),
        })));
    }

    let writer_handle = tokio::spawn(ws::writer_task(ws_sender, rx));
    let (ping_handle, pong_tx) = keepalive::spawn(tx.clone());

    tracing::info!(
        project_id = %project_id,
        channel_id = %channel_id,
        user_id = %user_id,
        "chat connection active"
    );

    loop {
        match ws_receiver.next().await {
            Some(Ok(Message::Text(raw))) => {
                let submission: ChatSubmission = match serde_json::from_str(raw.as_str()) {
                    Ok(submission) => submission,
                    Err(e) => {
                        tracing::warn!(
                            user_id = %user_id,
                            error = %e,
                            "malformed chat frame, closing connection"
                        );
                        break;
                    }
                };

                // Persist first; broadcast only what was durably recorded
                match state
                    .chat_store
                    .create_chat(&project_id, &channel_id, &user_id, &submission.content)
                    .await
                {
                    Ok(record) => match serde_json::to_string(&record) {
                        Ok(frame) => fanout::send_to_others(
                            &state.chat_connections,
                            &project_id,
                            &channel_id,
                            &user_id,
                            &frame,
                        ),
                        Err(e) => {
                            tracing::error!(
                                user_id = %user_id,
                                error = %e,
                                "failed to serialize chat record"
                            );
                        }
                    },
                    Err(e) => {
                        tracing::error!(
                            user_id = %user_id,
                            error = %e,
                            "chat persistence failed, message not broadcast"
                        );
                    }
                }
            }
            Some(Ok(Message::Binary(_))) => {
                tracing::debug!(user_id = %user_id, "ignoring binary frame on text protocol");
            }
            Some(Ok(Message::Ping(data))) => {
                let _ = tx.send(Message::Pong(data));
            }
            Some(Ok(Message::Pong(_))) => {
                let _ = pong_tx.send(());
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(user_id = %user_id, reason = ?frame, "client initiated close");
                break;
            }
            Some(Err(e)) => {
                tracing::warn!(user_id = %user_id, error = %e, "WebSocket receive error");
                break;
            }
            None => {
                tracing::info!(user_id = %user_id, "WebSocket stream ended");
                break;
            }
        }
    }

    // Teardown: no leave broadcast for chat, just the unregister discipline
    writer_handle.abort();
    ping_handle.abort();
    state
        .chat_connections
        .unregister_conn(&project_id, &channel_id, &user_id, &tx);

    tracing::info!(
        project_id = %project_id,
        channel_id = %channel_id,
        user_id = %user_id,
        "chat connection closed"
    );
}
