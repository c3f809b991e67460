use serde::Serialize;

/// A persisted chat message. Serialized as-is for the post-persistence
/// broadcast to other channel members.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRecord {
    pub id: String,
    pub project_id: String,
    pub channel_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: String,
}

/// A member notification row, part of the initial SSE snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: String,
    pub member_id: String,
    pub kind: String,
    pub content: String,
    pub is_read: bool,
    pub created_at: String,
}

/// A project row, the initial frame of the project update stream.
#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: String,
    pub updated_at: String,
}
