use crate::domain::value_objects::{
    AuthorProfile, Content, InteractionKind, PostId, RecordId, TargetRef, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authoritative server row for an interaction; the unit returned by
/// mutation responses, read queries and the realtime change feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub id: RecordId,
    pub author: AuthorProfile,
    pub target: TargetRef,
    pub kind: InteractionKind,
    pub content: Content,
    pub created_at: DateTime<Utc>,
    pub like_count: u32,
}

/// A change-feed event scoped to the subscribed target set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum ChangeEvent {
    /// An interaction row was inserted or updated.
    InteractionUpserted { record: RemoteRecord },
    /// An interaction row was deleted (author delete or parent expiry cascade).
    InteractionDeleted {
        target: TargetRef,
        kind: InteractionKind,
        id: RecordId,
    },
    /// A like row for a post was inserted (`liked`) or deleted.
    LikeSet {
        post: PostId,
        user: UserId,
        liked: bool,
        like_count: u32,
    },
}

impl ChangeEvent {
    /// The target the event applies to, used for subscription routing.
    pub fn target(&self) -> TargetRef {
        match self {
            ChangeEvent::InteractionUpserted { record } => record.target.clone(),
            ChangeEvent::InteractionDeleted { target, .. } => target.clone(),
            ChangeEvent::LikeSet { post, .. } => TargetRef::Post(post.clone()),
        }
    }
}
