//! Per-connection actor for the call-signaling relay.
//!
//! Lifecycle per connection: accept, register, announce join, relay frames,
//! then a single teardown block (unregister + leave notice) that runs
//! exactly once no matter which path ended the read loop.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::StreamExt;
use tokio::sync::mpsc;

use crate::call::protocol::{self, SignalEnvelope, SignalKind};
use crate::state::AppState;
use crate::ws::{self, fanout, keepalive};

/// Close code sent to a connection replaced by a reconnect for the same
/// (project, channel, user) triple.
const CLOSE_SUPERSEDED: u16 = 4000;

/// Run the actor for one accepted call-signaling WebSocket.
pub async fn run_connection(
    socket: WebSocket,
    state: AppState,
    project_id: String,
    channel_id: String,
    user_id: String,
) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    // Last writer wins: a reconnect replaces the old entry, and the stale
    // transport is told to close instead of lingering until its read fails.
    if let Some(superseded) =
        state
            .call_connections
            .register(&project_id, &channel_id, &user_id, tx.clone())
    {
        tracing::info!(
            project_id = %project_id,
            channel_id = %channel_id,
            user_id = %user_id,
            "closing superseded call connection"
        );
        let _ = superseded.send(Message::Close(Some(CloseFrame {
            code: CLOSE_SUPERSEDED,
            reason: "Superseded by new connection".into(),
        })));
    }

    // Spawn writer task: forwards mpsc messages to the WebSocket sink
    let writer_handle = tokio::spawn(ws::writer_task(ws_sender, rx));
    let (ping_handle, pong_tx) = keepalive::spawn(tx.clone());

    tracing::info!(
        project_id = %project_id,
        channel_id = %channel_id,
        user_id = %user_id,
        "call signaling connection active"
    );

    // Announce the join to everyone already in the channel
    fanout::send_to_others(
        &state.call_connections,
        &project_id,
        &channel_id,
        &user_id,
        &protocol::user_joined_frame(&user_id),
    );

    // Reader loop: relay inbound frames until the connection ends
    loop {
        match ws_receiver.next().await {
            Some(Ok(Message::Text(raw))) => {
                let envelope = match SignalEnvelope::parse(raw.as_str()) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        tracing::warn!(
                            user_id = %user_id,
                            error = %e,
                            "malformed signaling frame, closing connection"
                        );
                        break;
                    }
                };

                match envelope.kind {
                    SignalKind::Offer | SignalKind::Answer | SignalKind::IceCandidate => {
                        match envelope.target {
                            Some(target) => {
                                // Forward the raw frame verbatim. An absent or
                                // already-closed target drops the frame with no
                                // error surfaced to the sender.
                                if !fanout::send_to(
                                    &state.call_connections,
                                    &project_id,
                                    &channel_id,
                                    &target,
                                    raw.as_str(),
                                ) {
                                    tracing::debug!(
                                        user_id = %user_id,
                                        target = %target,
                                        "relay target absent, frame dropped"
                                    );
                                }
                            }
                            None => {
                                tracing::debug!(
                                    user_id = %user_id,
                                    "relay frame without target, dropped"
                                );
                            }
                        }
                    }
                    SignalKind::Disconnect => {
                        tracing::info!(user_id = %user_id, "client requested disconnect");
                        break;
                    }
                    SignalKind::UserJoined | SignalKind::UserLeft => {
                        // Server-originated notice types; ignore from clients
                        tracing::debug!(
                            user_id = %user_id,
                            "ignoring client-sent join/leave notice"
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

    // Teardown: single exit point for every path out of the loop above.
    writer_handle.abort();
    ping_handle.abort();

    // Only announce the leave if this connection still owned its registry
    // entry; a superseded connection's participant is still in the channel.
    let removed =
        state
            .call_connections
            .unregister_conn(&project_id, &channel_id, &user_id, &tx);
    if removed {
        fanout::send_to_others(
            &state.call_connections,
            &project_id,
            &channel_id,
            &user_id,
            &protocol::user_left_frame(&user_id),
        );
    }

    tracing::info!(
        project_id = %project_id,
        channel_id = %channel_id,
        user_id = %user_id,
        "call signaling connection closed"
    );
}
