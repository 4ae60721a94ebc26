use crate::domain::value_objects::{ActionKind, RecordId, TargetRef, UserId};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Queued user action awaiting server confirmation, persisted so an
/// interrupted session can surface unsent drafts on restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineActionDraft {
    pub user: UserId,
    pub action: ActionKind,
    pub target: TargetRef,
    pub local_id: RecordId,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineActionRecord {
    pub record_id: i64,
    pub user: UserId,
    pub action: ActionKind,
    pub target: TargetRef,
    pub local_id: RecordId,
    pub payload: Value,
    pub remote_id: Option<String>,
    pub is_synced: bool,
    pub created_at: DateTime<Utc>,
    pub synced_at: Option<DateTime<Utc>>,
}

/// Before/after pair captured around an optimistic mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimisticSnapshot {
    pub snapshot_id: String,
    pub target: TargetRef,
    pub original: Value,
    pub updated: Value,
    pub is_confirmed: bool,
    pub created_at: DateTime<Utc>,
}

impl OptimisticSnapshot {
    pub fn capture(target: TargetRef, original: Value, updated: Value) -> Self {
        Self {
            snapshot_id: uuid::Uuid::new_v4().to_string(),
            target,
            original,
            updated,
            is_confirmed: false,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait OfflineStore: Send + Sync {
    async fn save_action(&self, draft: OfflineActionDraft)
        -> Result<OfflineActionRecord, AppError>;
    async fn list_pending(&self, user: &UserId) -> Result<Vec<OfflineActionRecord>, AppError>;
    async fn mark_synced(&self, record_id: i64, remote_id: &str) -> Result<(), AppError>;
    async fn discard_action(&self, record_id: i64) -> Result<(), AppError>;

    async fn save_snapshot(&self, snapshot: OptimisticSnapshot) -> Result<String, AppError>;
    async fn confirm_snapshot(&self, snapshot_id: &str) -> Result<(), AppError>;
    /// Removes the snapshot and returns the original value for rollback.
    async fn take_snapshot(&self, snapshot_id: &str) -> Result<Option<Value>, AppError>;
    /// Drops synced rows and confirmed snapshots older than the given
    /// instant. Runs as housekeeping when unsent drafts are listed.
    async fn purge_confirmed(&self, before: DateTime<Utc>) -> Result<u32, AppError>;
}
