use crate::application::ports::{Notice, Notifier, OfflineStore, OptimisticSnapshot, RemoteStore};
use crate::domain::entities::{ChangeEvent, LikeState, Session};
use crate::domain::value_objects::{ActionKind, PostId, TargetRef};
use crate::shared::{AppError, InFlightGuard, ScopeToken};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Optimistic like toggles for posts.
///
/// A tap flips the local flag and moves the counter by one before the
/// remote call is dispatched. The server response overwrites both
/// fields; a failed call restores the pre-tap snapshot and surfaces
/// exactly one notice. While a toggle for a post is unsettled, further
/// taps on the same post are rejected, not queued.
pub struct LikeService {
    session: Session,
    remote: Arc<dyn RemoteStore>,
    notifier: Arc<dyn Notifier>,
    offline: Option<Arc<dyn OfflineStore>>,
    guard: InFlightGuard,
    scope: ScopeToken,
    states: Mutex<HashMap<PostId, LikeState>>,
}

impl LikeService {
    pub fn new(
        session: Session,
        remote: Arc<dyn RemoteStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            session,
            remote,
            notifier,
            offline: None,
            guard: InFlightGuard::new(),
            scope: ScopeToken::new(),
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Persists a before/after snapshot around each toggle so an
    /// interrupted session can be rolled back on restart.
    pub fn with_offline(mut self, store: Arc<dyn OfflineStore>) -> Self {
        self.offline = Some(store);
        self
    }

    /// Token the owning view revokes on unmount. Settles arriving after
    /// revocation are discarded.
    pub fn scope(&self) -> ScopeToken {
        self.scope.clone()
    }

    /// Fetches the authoritative like state for a post and caches it.
    pub async fn load(&self, post: &PostId) -> Result<LikeState, AppError> {
        let outcome = self
            .remote
            .fetch_like_state(self.session.user_id(), post)
            .await?;
        let state = LikeState::new(outcome.is_liked, outcome.like_count);
        self.states.lock().await.insert(post.clone(), state);
        Ok(state)
    }

    pub async fn state(&self, post: &PostId) -> Option<LikeState> {
        self.states.lock().await.get(post).copied()
    }

    /// Flips the like for a post. Returns the settled state on success
    /// and `AppError::InFlight` when a toggle for the same post is
    /// still unsettled.
    pub async fn toggle_like(&self, post: &PostId) -> Result<LikeState, AppError> {
        let key = format!(
            "{}:{}:{}",
            self.session.user_id(),
            post,
            ActionKind::ToggleLike
        );
        self.guard.begin(&key).await?;
        let result = self.toggle_like_inner(post).await;
        self.guard.finish(&key).await;
        result
    }

    async fn toggle_like_inner(&self, post: &PostId) -> Result<LikeState, AppError> {
        let (snapshot, updated) = {
            let mut states = self.states.lock().await;
            let state = states.entry(post.clone()).or_default();
            let snapshot = state.toggle();
            (snapshot, *state)
        };
        debug!(post = %post, is_liked = updated.is_liked, "applied optimistic like toggle");
        let snapshot_id = self.save_snapshot(post, snapshot, updated).await;

        match self.remote.toggle_like(self.session.user_id(), post).await {
            Ok(outcome) => {
                if !self.scope.is_active() {
                    debug!(post = %post, "scope revoked, discarding like settle");
                    return Ok(updated);
                }
                let settled = {
                    let mut states = self.states.lock().await;
                    let state = states.entry(post.clone()).or_default();
                    state.apply_server(outcome.is_liked, outcome.like_count);
                    *state
                };
                self.settle_snapshot(snapshot_id).await;
                Ok(settled)
            }
            Err(err) => {
                if !self.scope.is_active() {
                    return Err(err);
                }
                if err.requires_rollback() {
                    let mut states = self.states.lock().await;
                    if matches!(err, AppError::NotFound(_)) {
                        // The post expired or was deleted under us.
                        states.remove(post);
                    } else if let Some(state) = states.get_mut(post) {
                        *state = snapshot;
                    }
                }
                self.revert_snapshot(snapshot_id).await;
                warn!(post = %post, kind = err.kind(), error = %err, "like toggle failed");
                let message = if matches!(err, AppError::NotFound(_)) {
                    "This post is no longer available"
                } else {
                    "Could not update like. Please try again."
                };
                self.notifier.notify(Notice::error(message)).await;
                Err(err)
            }
        }
    }

    /// Merges a like event originated by another user. The aggregate
    /// counter follows the server value; the caller's own flag only
    /// moves through `toggle_like`, so self-originated events are
    /// skipped.
    pub async fn apply_change(&self, event: ChangeEvent) {
        if let ChangeEvent::LikeSet {
            post,
            user,
            like_count,
            ..
        } = event
        {
            if &user == self.session.user_id() {
                return;
            }
            let mut states = self.states.lock().await;
            if let Some(state) = states.get_mut(&post) {
                state.apply_external(like_count);
            }
        }
    }

    async fn save_snapshot(
        &self,
        post: &PostId,
        original: LikeState,
        updated: LikeState,
    ) -> Option<String> {
        let store = self.offline.as_ref()?;
        let original = serde_json::to_value(original).ok()?;
        let updated = serde_json::to_value(updated).ok()?;
        let snapshot =
            OptimisticSnapshot::capture(TargetRef::post(post.clone()), original, updated);
        match store.save_snapshot(snapshot).await {
            Ok(id) => Some(id),
            Err(err) => {
                warn!(post = %post, error = %err, "failed to persist optimistic snapshot");
                None
            }
        }
    }

    async fn settle_snapshot(&self, snapshot_id: Option<String>) {
        if let (Some(store), Some(id)) = (self.offline.as_ref(), snapshot_id) {
            if let Err(err) = store.confirm_snapshot(&id).await {
                warn!(snapshot_id = %id, error = %err, "failed to confirm snapshot");
            }
        }
    }

    async fn revert_snapshot(&self, snapshot_id: Option<String>) {
        if let (Some(store), Some(id)) = (self.offline.as_ref(), snapshot_id) {
            if let Err(err) = store.take_snapshot(&id).await {
                warn!(snapshot_id = %id, error = %err, "failed to drop snapshot");
            }
        }
    }
}
