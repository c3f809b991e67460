use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::auth::token;
use crate::chat::session;
use crate::state::AppState;

/// Query parameters for the chat WebSocket connection.
/// Auth is via query param ?token=JWT since WebSocket upgrades cannot carry
/// an Authorization header from browsers.
#[derive(Debug, Deserialize)]
pub struct ChatAuthQuery {
    pub token: String,
}

/// GET /ws/chat/{project_id}/{channel_id}/{user_id}?token=JWT
/// WebSocket upgrade endpoint for channel chat.
///
/// The token is verified before the upgrade: a failed verification rejects
/// the request with 401 (403 when the token subject is not the path user)
/// and no registry state is ever created for the connection.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Path((project_id, channel_id, user_id)): Path<(String, String, String)>,
    Query(params): Query<ChatAuthQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    match token::validate_access_token(&state.jwt_secret, &params.token) {
        Ok(claims) if claims.sub == user_id => {
            tracing::info!(user_id = %claims.sub, "chat WebSocket authenticated");
            ws.on_upgrade(move |socket| {
                session::run_connection(socket, state, project_id, channel_id, user_id)
            })
        }
        Ok(claims) => {
            tracing::warn!(
                token_sub = %claims.sub,
                path_user = %user_id,
                "chat token subject does not match path user"
            );
            StatusCode::FORBIDDEN.into_response()
        }
        Err(err) => {
            tracing::warn!(error = %err, "chat WebSocket auth failed");
            StatusCode::UNAUTHORIZED.into_response()
        }
    }
}
