//! Best-effort delivery helpers shared by call signaling and chat.
//!
//! Fan-out iterates a registry snapshot; a failed delivery to one peer is
//! logged and skipped, it never aborts the remaining sends and never closes
//! the originating connection.

use axum::extract::ws::Message;

use super::registry::ConnectionRegistry;

/// Deliver a text frame to every participant in (scope, subscope) except
/// `exclude` (normally the originator).
pub fn send_to_others(
    registry: &ConnectionRegistry,
    scope: &str,
    subscope: &str,
    exclude: &str,
    frame: &str,
) {
    for (participant, sender) in registry.list(scope, subscope) {
        if participant == exclude {
            continue;
        }
        if sender.send(Message::Text(frame.into())).is_err() {
            tracing::debug!(
                scope = %scope,
                subscope = %subscope,
                participant = %participant,
                "peer connection closed mid-broadcast, frame dropped"
            );
        }
    }
}

/// Deliver a text frame to one named participant.
/// Returns false when the participant is absent or its connection has
/// already closed; the frame is dropped in both cases.
pub fn send_to(
    registry: &ConnectionRegistry,
    scope: &str,
    subscope: &str,
    participant: &str,
    frame: &str,
) -> bool {
    match registry.lookup(scope, subscope, participant) {
        Some(sender) => sender.send(Message::Text(frame.into())).is_ok(),
        None => false,
    }
}
