use crate::domain::entities::change::RemoteRecord;
use crate::domain::value_objects::{
    AuthorProfile, Content, InteractionKind, RecordId, SyncStatus, TargetRef,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A like-able comment or chat message as rendered by the client.
///
/// Created either optimistically (`pending`, keyed by a Tentative
/// Identity) or from an authoritative server row (`confirmed`). The
/// id is re-keyed to the server identity on confirmation; rendered
/// output never retains a Tentative Identity afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub id: RecordId,
    pub author: AuthorProfile,
    pub target: TargetRef,
    pub kind: InteractionKind,
    pub content: Content,
    pub created_at: DateTime<Utc>,
    pub status: SyncStatus,
    pub is_liked: bool,
    pub like_count: u32,
}

impl InteractionRecord {
    pub fn pending(
        author: AuthorProfile,
        target: TargetRef,
        kind: InteractionKind,
        content: Content,
    ) -> Self {
        Self {
            id: RecordId::tentative(),
            author,
            target,
            kind,
            content,
            created_at: Utc::now(),
            status: SyncStatus::Pending,
            is_liked: false,
            like_count: 0,
        }
    }

    /// Re-keys the record to the authoritative server row.
    pub fn confirm(&mut self, remote: &RemoteRecord) {
        self.id = remote.id.clone();
        self.created_at = remote.created_at;
        self.like_count = remote.like_count;
        self.status = SyncStatus::Confirmed;
    }

    pub fn mark_failed(&mut self) {
        self.status = SyncStatus::Failed;
    }

    pub fn mark_pending(&mut self) {
        self.status = SyncStatus::Pending;
    }

    pub fn is_pending(&self) -> bool {
        self.status == SyncStatus::Pending
    }

    pub fn is_failed(&self) -> bool {
        self.status == SyncStatus::Failed
    }

    /// Locally negates the like flag and adjusts the counter, returning
    /// the pre-toggle snapshot for rollback.
    pub fn toggle_like_local(&mut self) -> (bool, u32) {
        let snapshot = (self.is_liked, self.like_count);
        if self.is_liked {
            self.is_liked = false;
            self.like_count = self.like_count.saturating_sub(1);
        } else {
            self.is_liked = true;
            self.like_count += 1;
        }
        snapshot
    }

    /// Server-wins overwrite of the like fields.
    pub fn apply_like_outcome(&mut self, is_liked: bool, like_count: u32) {
        self.is_liked = is_liked;
        self.like_count = like_count;
    }

    pub fn restore_like(&mut self, snapshot: (bool, u32)) {
        self.is_liked = snapshot.0;
        self.like_count = snapshot.1;
    }
}

impl From<RemoteRecord> for InteractionRecord {
    fn from(remote: RemoteRecord) -> Self {
        Self {
            id: remote.id,
            author: remote.author,
            target: remote.target,
            kind: remote.kind,
            content: remote.content,
            created_at: remote.created_at,
            status: SyncStatus::Confirmed,
            is_liked: false,
            like_count: remote.like_count,
        }
    }
}
