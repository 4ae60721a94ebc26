use crate::domain::entities::RemoteRecord;
use crate::domain::value_objects::{
    AuthorProfile, Content, InteractionKind, PostId, RecordId, TargetRef, UserId,
};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Server outcome of a like toggle: the authoritative flag and counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeOutcome {
    pub is_liked: bool,
    pub like_count: u32,
}

/// Payload of an interaction insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionDraft {
    pub author: AuthorProfile,
    pub target: TargetRef,
    pub kind: InteractionKind,
    pub content: Content,
}

/// One page of a read query, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPage {
    pub items: Vec<RemoteRecord>,
    pub next_cursor: Option<String>,
}

/// Pagination position, compound over the sort key. Ordering
/// tie-breaks on id, so a timestamp alone would skip rows sharing the
/// last-returned instant across a page boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    pub created_at: DateTime<Utc>,
    pub id: String,
}

impl PageCursor {
    pub fn new(created_at: DateTime<Utc>, id: impl Into<String>) -> Self {
        Self {
            created_at,
            id: id.into(),
        }
    }

    /// Cursor pointing past the last record of a page, if that record
    /// carries a server identity.
    pub fn after(record: &RemoteRecord) -> Option<Self> {
        record
            .id
            .server_str()
            .map(|id| Self::new(record.created_at, id))
    }

    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let (stamp, id) = raw
            .split_once('|')
            .ok_or_else(|| AppError::Validation(format!("bad cursor {raw}")))?;
        let created_at = stamp
            .parse::<DateTime<Utc>>()
            .map_err(|_| AppError::Validation(format!("bad cursor {raw}")))?;
        Ok(Self::new(created_at, id))
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.created_at.to_rfc3339(), self.id)
    }
}

/// The only boundary to the managed backend. Mutations return the
/// authoritative result or an error; persisted layout is opaque.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Toggles the caller's like on a post; one call flips the row.
    async fn toggle_like(&self, user: &UserId, post: &PostId) -> Result<LikeOutcome, AppError>;

    /// Current like flag and aggregate counter for a post.
    async fn fetch_like_state(&self, user: &UserId, post: &PostId)
        -> Result<LikeOutcome, AppError>;

    /// Persists a new comment or message and returns the confirmed row.
    async fn insert_interaction(&self, draft: InteractionDraft)
        -> Result<RemoteRecord, AppError>;

    /// Deletes an interaction by its server identity.
    async fn delete_interaction(&self, kind: InteractionKind, id: &RecordId)
        -> Result<(), AppError>;

    /// Toggles the caller's like on a single interaction record.
    async fn toggle_interaction_like(
        &self,
        user: &UserId,
        kind: InteractionKind,
        id: &RecordId,
    ) -> Result<LikeOutcome, AppError>;

    /// Ordered read query with an opaque pagination cursor.
    async fn fetch_interactions(
        &self,
        target: &TargetRef,
        kind: InteractionKind,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<RecordPage, AppError>;
}
