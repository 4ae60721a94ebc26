//! Optimistic client-state synchronization core for ephemeral social
//! feeds.
//!
//! Likes, comments and chat messages are applied to local state the
//! moment the user acts, dispatched to the remote store, and then
//! reconciled against the authoritative response. Failures roll the
//! local state back to its pre-action snapshot and surface exactly one
//! notice; nothing is retried on the user's behalf. A change feed
//! merges other users' activity into the same state, keyed by record
//! identity so replays and echoes are harmless.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

pub use application::ports::{
    ChangeFeed, ChangeStream, InteractionDraft, LikeOutcome, Notice, NoticeLevel, Notifier,
    OfflineStore, RecordPage, RemoteStore,
};
pub use application::services::{InteractionService, LikeService, RealtimeRouter};
pub use domain::entities::{ChangeEvent, InteractionRecord, LikeState, RemoteRecord, Session};
pub use domain::value_objects::{
    ActionKind, AuthorProfile, Content, GroupId, InteractionKind, PostId, RecordId, SyncStatus,
    TargetRef, UserId,
};
pub use shared::{AppConfig, AppError, ScopeToken};

use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber. `FLICKER_LOG` holds the
/// filter directive; `RUST_LOG` is honored as a fallback.
pub fn init_logging() {
    let filter = std::env::var("FLICKER_LOG")
        .ok()
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("flicker_core=debug,info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
