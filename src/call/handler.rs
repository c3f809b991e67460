use axum::{
    extract::{Path, State, WebSocketUpgrade},
    response::Response,
};

use crate::call::session;
use crate::state::AppState;

/// GET /ws/call/{project_id}/{channel_id}/{user_id}
/// WebSocket upgrade endpoint for WebRTC call signaling. Spawns a session
/// actor for the connection.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Path((project_id, channel_id, user_id)): Path<(String, String, String)>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| {
        session::run_connection(socket, state, project_id, channel_id, user_id)
    })
}
