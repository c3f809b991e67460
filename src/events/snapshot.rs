//! Entity snapshot collaborator for initial SSE frames.
//!
//! A newly subscribed client must never see a stale or empty initial view,
//! so the stream handlers fetch the entity's current state through this
//! trait and emit it as the first frame before entering the live queue.

use async_trait::async_trait;
use thiserror::Error;

use crate::db::models::{Notification, Project};
use crate::db::DbPool;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("entity not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("snapshot task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("database lock poisoned")]
    LockPoisoned,
}

/// Read access to the current state of streamed entities.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Current notification list for a member, newest first. An unknown
    /// member simply has an empty list.
    async fn member_notifications(&self, member_id: &str) -> Result<serde_json::Value, SnapshotError>;

    /// Current state of a project; `NotFound` if the project does not exist.
    async fn project_state(&self, project_id: &str) -> Result<serde_json::Value, SnapshotError>;
}

pub struct SqliteSnapshotStore {
    db: DbPool,
}

impl SqliteSnapshotStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn member_notifications(
        &self,
        member_id: &str,
    ) -> Result<serde_json::Value, SnapshotError> {
        let db = self.db.clone();
        let member_id = member_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| SnapshotError::LockPoisoned)?;
            let mut stmt = conn.prepare(
                "SELECT id, member_id, kind, content, is_read, created_at
                 FROM notifications WHERE member_id = ?1 ORDER BY created_at DESC",
            )?;
            let rows = stmt.query_map(rusqlite::params![member_id], |row| {
                Ok(Notification {
                    id: row.get(0)?,
                    member_id: row.get(1)?,
                    kind: row.get(2)?,
                    content: row.get(3)?,
                    is_read: row.get::<_, i64>(4)? != 0,
                    created_at: row.get(5)?,
                })
            })?;
            let notifications: Vec<Notification> = rows.collect::<Result<_, _>>()?;
            Ok(serde_json::to_value(notifications)?)
        })
        .await?
    }

    async fn project_state(&self, project_id: &str) -> Result<serde_json::Value, SnapshotError> {
        let db = self.db.clone();
        let project_id = project_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| SnapshotError::LockPoisoned)?;
            let project = conn.query_row(
                "SELECT id, name, description, updated_at FROM projects WHERE id = ?1",
                rusqlite::params![project_id],
                |row| {
                    Ok(Project {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                        updated_at: row.get(3)?,
                    })
                },
            );
            match project {
                Ok(project) => Ok(serde_json::to_value(project)?),
                Err(rusqlite::Error::QueryReturnedNoRows) => Err(SnapshotError::NotFound),
                Err(e) => Err(SnapshotError::Database(e)),
            }
        })
        .await?
    }
}
