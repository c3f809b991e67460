//! Chat persistence collaborator.
//!
//! The session actor only depends on the `ChatStore` trait, so tests can
//! substitute a failing store to exercise the persistence-failure path.

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::db::models::ChatRecord;
use crate::db::DbPool;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("storage task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
    #[error("database lock poisoned")]
    LockPoisoned,
}

/// Durable storage for chat messages.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Create one chat record; author is the connected user, timestamp is
    /// receipt time.
    async fn create_chat(
        &self,
        project_id: &str,
        channel_id: &str,
        user_id: &str,
        content: &str,
    ) -> Result<ChatRecord, StorageError>;
}

/// SQLite-backed store. rusqlite is synchronous, so writes go through
/// `spawn_blocking` against the shared `Arc<Mutex<Connection>>`.
pub struct SqliteChatStore {
    db: DbPool,
}

impl SqliteChatStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ChatStore for SqliteChatStore {
    async fn create_chat(
        &self,
        project_id: &str,
        channel_id: &str,
        user_id: &str,
        content: &str,
    ) -> Result<ChatRecord, StorageError> {
        let record = ChatRecord {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            channel_id: channel_id.to_string(),
            user_id: user_id.to_string(),
            content: content.to_string(),
            created_at: Utc::now().to_rfc3339(),
        };

        let db = self.db.clone();
        let row = record.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| StorageError::LockPoisoned)?;
            conn.execute(
                "INSERT INTO chat_messages (id, project_id, channel_id, user_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    row.id,
                    row.project_id,
                    row.channel_id,
                    row.user_id,
                    row.content,
                    row.created_at
                ],
            )?;
            Ok::<(), StorageError>(())
        })
        .await??;

        Ok(record)
    }
}
