use std::sync::Arc;

use crate::chat::storage::ChatStore;
use crate::db::DbPool;
use crate::events::hub::EventHub;
use crate::events::snapshot::SnapshotStore;
use crate::ws::registry::ConnectionRegistry;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// JWT signing secret (256-bit random key)
    pub jwt_secret: Vec<u8>,
    /// Live call-signaling connections, keyed project/channel/user
    pub call_connections: ConnectionRegistry,
    /// Live chat connections. Separate instance from call signaling so a
    /// signaling frame can never reach a chat socket or vice versa.
    pub chat_connections: ConnectionRegistry,
    /// SSE subscribers for per-member notification updates
    pub notification_events: EventHub,
    /// SSE subscribers for per-project updates
    pub project_events: EventHub,
    /// Chat persistence collaborator
    pub chat_store: Arc<dyn ChatStore>,
    /// Entity snapshot collaborator for initial SSE frames
    pub snapshots: Arc<dyn SnapshotStore>,
}
