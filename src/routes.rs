use axum::{routing::get, Router};

use crate::call::handler as call_handler;
use crate::chat::handler as chat_handler;
use crate::events::stream;
use crate::state::AppState;

/// Build the full axum Router with all routes.
pub fn build_router(state: AppState) -> Router {
    // WebSocket endpoints (call auth is handled at the app gateway; chat
    // auth is via ?token= query param)
    let ws_routes = Router::new()
        .route(
            "/ws/call/{project_id}/{channel_id}/{user_id}",
            get(call_handler::ws_upgrade),
        )
        .route(
            "/ws/chat/{project_id}/{channel_id}/{user_id}",
            get(chat_handler::ws_upgrade),
        );

    // SSE endpoints for live notification and project updates
    let sse_routes = Router::new()
        .route(
            "/api/members/{member_id}/notifications/stream",
            get(stream::notification_stream),
        )
        .route(
            "/api/projects/{project_id}/stream",
            get(stream::project_stream),
        );

    // Health check
    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(ws_routes)
        .merge(sse_routes)
        .merge(health)
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
