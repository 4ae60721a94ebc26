use crate::application::ports::{
    InteractionDraft, Notice, Notifier, OfflineActionDraft, OfflineActionRecord, OfflineStore,
    RemoteStore,
};
use crate::domain::entities::{ChangeEvent, InteractionLedger, InteractionRecord, Session};
use crate::domain::value_objects::{
    ActionKind, Content, InteractionKind, RecordId, TargetRef,
};
use crate::shared::config::SyncConfig;
use crate::shared::{AppError, InFlightGuard, ScopeToken};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Optimistic list synchronization for one interaction kind.
///
/// Each target owns a ledger of records. An add renders a Pending
/// record under a Tentative Identity before dispatch, then re-keys it
/// to the server row on confirmation. A failed add leaves the rendered
/// list exactly as it was and parks the draft for a manual resend;
/// deletes and per-record likes roll back the same way. Change-feed
/// events merge by identity, so replaying them is harmless.
pub struct InteractionService {
    session: Session,
    kind: InteractionKind,
    remote: Arc<dyn RemoteStore>,
    notifier: Arc<dyn Notifier>,
    offline: Option<Arc<dyn OfflineStore>>,
    guard: InFlightGuard,
    scope: ScopeToken,
    page_size: u32,
    max_pending_per_target: u32,
    ledgers: Mutex<HashMap<TargetRef, InteractionLedger>>,
}

impl InteractionService {
    /// Comment threads under posts.
    pub fn comments(
        session: Session,
        remote: Arc<dyn RemoteStore>,
        notifier: Arc<dyn Notifier>,
        sync: &SyncConfig,
    ) -> Self {
        Self::new(InteractionKind::Comment, session, remote, notifier, sync)
    }

    /// Group chat messages.
    pub fn messages(
        session: Session,
        remote: Arc<dyn RemoteStore>,
        notifier: Arc<dyn Notifier>,
        sync: &SyncConfig,
    ) -> Self {
        Self::new(InteractionKind::Message, session, remote, notifier, sync)
    }

    fn new(
        kind: InteractionKind,
        session: Session,
        remote: Arc<dyn RemoteStore>,
        notifier: Arc<dyn Notifier>,
        sync: &SyncConfig,
    ) -> Self {
        Self {
            session,
            kind,
            remote,
            notifier,
            offline: None,
            guard: InFlightGuard::new(),
            scope: ScopeToken::new(),
            page_size: sync.page_size,
            max_pending_per_target: sync.max_pending_per_target,
            ledgers: Mutex::new(HashMap::new()),
        }
    }

    /// Queues each dispatched action so an interrupted session can
    /// surface unsent drafts on restart.
    pub fn with_offline(mut self, store: Arc<dyn OfflineStore>) -> Self {
        self.offline = Some(store);
        self
    }

    pub fn kind(&self) -> InteractionKind {
        self.kind
    }

    /// Token the owning view revokes on unmount.
    pub fn scope(&self) -> ScopeToken {
        self.scope.clone()
    }

    /// Loads the newest page for a target, keeping local pending
    /// records that the fetch cannot know about.
    pub async fn load(&self, target: &TargetRef) -> Result<Vec<InteractionRecord>, AppError> {
        let page = self
            .remote
            .fetch_interactions(target, self.kind, None, self.page_size)
            .await?;
        let mut ledgers = self.ledgers.lock().await;
        let ledger = Self::entry(&mut ledgers, target, self.kind);
        ledger.replace_confirmed(page.items, page.next_cursor);
        Ok(ledger.rendered())
    }

    /// Follows the pagination cursor. Returns whether more pages
    /// remain.
    pub async fn load_more(&self, target: &TargetRef) -> Result<bool, AppError> {
        let cursor = {
            let ledgers = self.ledgers.lock().await;
            match ledgers.get(target).and_then(|l| l.next_cursor()) {
                Some(cursor) => cursor.to_string(),
                None => return Ok(false),
            }
        };
        let page = self
            .remote
            .fetch_interactions(target, self.kind, Some(&cursor), self.page_size)
            .await?;
        let mut ledgers = self.ledgers.lock().await;
        let ledger = Self::entry(&mut ledgers, target, self.kind);
        ledger.append_page(page.items, page.next_cursor);
        Ok(ledger.next_cursor().is_some())
    }

    /// Posts a new comment or message optimistically. A second add for
    /// the same target while the first is unsettled is rejected with
    /// `AppError::InFlight`, not queued.
    pub async fn add(
        &self,
        target: &TargetRef,
        content: &str,
    ) -> Result<InteractionRecord, AppError> {
        let content = Content::new(content).map_err(AppError::Validation)?;
        let key = self.add_key(target);
        self.guard.begin(&key).await?;
        let result = self.add_inner(target, content).await;
        self.guard.finish(&key).await;
        result
    }

    async fn add_inner(
        &self,
        target: &TargetRef,
        content: Content,
    ) -> Result<InteractionRecord, AppError> {
        let record = InteractionRecord::pending(
            self.session.profile.clone(),
            target.clone(),
            self.kind,
            content,
        );
        let local_id = record.id.clone();

        {
            let mut ledgers = self.ledgers.lock().await;
            let ledger = Self::entry(&mut ledgers, target, self.kind);
            let pending = ledger.rendered().iter().filter(|r| r.is_pending()).count();
            let backlog = (pending + ledger.failed_count()) as u32;
            if backlog >= self.max_pending_per_target {
                return Err(AppError::Validation(
                    "Too many unconfirmed drafts for this target".to_string(),
                ));
            }
            ledger.insert_pending(record.clone());
        }
        debug!(target = %target, kind = %self.kind, id = %local_id, "applied optimistic insert");

        let queued = self
            .queue_action(target, self.kind.add_action(), &record)
            .await;
        self.dispatch_insert(target, record, queued).await
    }

    /// Resends a failed draft. The draft re-enters the rendered list
    /// as Pending under its original Tentative Identity.
    pub async fn retry(
        &self,
        target: &TargetRef,
        local_id: &RecordId,
    ) -> Result<InteractionRecord, AppError> {
        let key = self.add_key(target);
        self.guard.begin(&key).await?;
        let result = self.retry_inner(target, local_id).await;
        self.guard.finish(&key).await;
        result
    }

    async fn retry_inner(
        &self,
        target: &TargetRef,
        local_id: &RecordId,
    ) -> Result<InteractionRecord, AppError> {
        let record = {
            let mut ledgers = self.ledgers.lock().await;
            let ledger = ledgers
                .get_mut(target)
                .ok_or_else(|| AppError::NotFound(format!("no records for {target}")))?;
            let mut record = ledger
                .take_failed(local_id)
                .ok_or_else(|| AppError::NotFound(format!("no failed draft {local_id}")))?;
            record.mark_pending();
            ledger.insert_pending(record.clone());
            record
        };
        self.dispatch_insert(target, record, None).await
    }

    fn add_key(&self, target: &TargetRef) -> String {
        format!(
            "{}:{}:{}",
            self.session.user_id(),
            target,
            self.kind.add_action()
        )
    }

    async fn dispatch_insert(
        &self,
        target: &TargetRef,
        record: InteractionRecord,
        queued: Option<i64>,
    ) -> Result<InteractionRecord, AppError> {
        let draft = InteractionDraft {
            author: record.author.clone(),
            target: target.clone(),
            kind: self.kind,
            content: record.content.clone(),
        };
        let local_id = record.id.clone();

        match self.remote.insert_interaction(draft).await {
            Ok(remote) => {
                if !self.scope.is_active() {
                    debug!(target = %target, "scope revoked, discarding insert settle");
                    return Ok(record);
                }
                let confirmed = {
                    let mut ledgers = self.ledgers.lock().await;
                    let ledger = Self::entry(&mut ledgers, target, self.kind);
                    ledger.confirm(&local_id, &remote)
                };
                if let Some(record_id) = queued {
                    self.settle_queued(record_id, &remote.id).await;
                }
                Ok(confirmed.unwrap_or_else(|| remote.into()))
            }
            Err(err) => {
                if !self.scope.is_active() {
                    return Err(err);
                }
                let expired = matches!(err, AppError::NotFound(_));
                {
                    let mut ledgers = self.ledgers.lock().await;
                    if expired {
                        // The parent post or group is gone; nothing
                        // under it can render anymore.
                        ledgers.remove(target);
                    } else if let Some(ledger) = ledgers.get_mut(target) {
                        ledger.rollback_insert(&local_id);
                    }
                }
                if expired {
                    if let Some(record_id) = queued {
                        self.discard_queued(record_id).await;
                    }
                }
                warn!(target = %target, kind = err.kind(), error = %err, "insert failed, rolled back");
                let message = if expired {
                    match self.kind {
                        InteractionKind::Comment => "This post is no longer available",
                        InteractionKind::Message => "This group is no longer available",
                    }
                } else {
                    match self.kind {
                        InteractionKind::Comment => "Could not post your comment. Tap to retry.",
                        InteractionKind::Message => "Could not send your message. Tap to retry.",
                    }
                };
                self.notifier.notify(Notice::error(message)).await;
                Err(err)
            }
        }
    }

    /// Removes a record optimistically. Deleting a still-pending or
    /// failed draft is local-only; the tombstone suppresses a late
    /// confirmation. A remote NotFound is treated as success since the
    /// record is gone either way.
    pub async fn delete(&self, target: &TargetRef, id: &RecordId) -> Result<(), AppError> {
        if id.is_tentative() {
            let mut ledgers = self.ledgers.lock().await;
            let ledger = ledgers
                .get_mut(target)
                .ok_or_else(|| AppError::NotFound(format!("no records for {target}")))?;
            if ledger.remove(id).is_some() || ledger.take_failed(id).is_some() {
                return Ok(());
            }
            return Err(AppError::NotFound(format!("no record {id}")));
        }
        let key = format!(
            "{}:{}:{}",
            self.session.user_id(),
            id,
            self.kind.delete_action()
        );
        self.guard.begin(&key).await?;
        let result = self.delete_inner(target, id).await;
        self.guard.finish(&key).await;
        result
    }

    async fn delete_inner(&self, target: &TargetRef, id: &RecordId) -> Result<(), AppError> {
        let (pos, record) = {
            let mut ledgers = self.ledgers.lock().await;
            let ledger = ledgers
                .get_mut(target)
                .ok_or_else(|| AppError::NotFound(format!("no records for {target}")))?;
            ledger
                .remove(id)
                .ok_or_else(|| AppError::NotFound(format!("no record {id}")))?
        };

        match self.remote.delete_interaction(self.kind, id).await {
            Ok(()) => Ok(()),
            Err(AppError::NotFound(_)) => {
                debug!(id = %id, "record already deleted remotely");
                Ok(())
            }
            Err(err) => {
                if self.scope.is_active() {
                    let mut ledgers = self.ledgers.lock().await;
                    if let Some(ledger) = ledgers.get_mut(target) {
                        ledger.restore(pos, record);
                    }
                    warn!(id = %id, kind = err.kind(), error = %err, "delete failed, restored record");
                    self.notifier
                        .notify(Notice::error("Could not delete. Please try again."))
                        .await;
                }
                Err(err)
            }
        }
    }

    /// Flips the caller's like on a single record, server-wins.
    pub async fn toggle_record_like(
        &self,
        target: &TargetRef,
        id: &RecordId,
    ) -> Result<InteractionRecord, AppError> {
        let key = format!("{}:{}:{}", self.session.user_id(), id, ActionKind::ToggleLike);
        self.guard.begin(&key).await?;
        let result = self.toggle_record_like_inner(target, id).await;
        self.guard.finish(&key).await;
        result
    }

    async fn toggle_record_like_inner(
        &self,
        target: &TargetRef,
        id: &RecordId,
    ) -> Result<InteractionRecord, AppError> {
        let snapshot = {
            let mut ledgers = self.ledgers.lock().await;
            let record = ledgers
                .get_mut(target)
                .and_then(|ledger| ledger.get_mut(id))
                .ok_or_else(|| AppError::NotFound(format!("no record {id}")))?;
            record.toggle_like_local()
        };

        match self
            .remote
            .toggle_interaction_like(self.session.user_id(), self.kind, id)
            .await
        {
            Ok(outcome) => {
                let mut ledgers = self.ledgers.lock().await;
                let record = ledgers
                    .get_mut(target)
                    .and_then(|ledger| ledger.get_mut(id))
                    .ok_or_else(|| AppError::NotFound(format!("no record {id}")))?;
                if self.scope.is_active() {
                    record.apply_like_outcome(outcome.is_liked, outcome.like_count);
                }
                Ok(record.clone())
            }
            Err(err) => {
                if self.scope.is_active() {
                    let mut ledgers = self.ledgers.lock().await;
                    if matches!(err, AppError::NotFound(_)) {
                        if let Some(ledger) = ledgers.get_mut(target) {
                            ledger.remove_by_id(id);
                        }
                    } else if err.requires_rollback() {
                        if let Some(record) = ledgers
                            .get_mut(target)
                            .and_then(|ledger| ledger.get_mut(id))
                        {
                            record.restore_like(snapshot);
                        }
                    }
                    warn!(id = %id, kind = err.kind(), error = %err, "record like toggle failed");
                    self.notifier
                        .notify(Notice::error("Could not update like. Please try again."))
                        .await;
                }
                Err(err)
            }
        }
    }

    /// Merges a change-feed event for this kind. Upserts are keyed by
    /// identity; a self-echo arriving before the direct response is
    /// collapsed when the insert settles.
    pub async fn apply_change(&self, event: ChangeEvent) {
        match event {
            ChangeEvent::InteractionUpserted { record } if record.kind == self.kind => {
                let target = record.target.clone();
                let mut ledgers = self.ledgers.lock().await;
                let ledger = Self::entry(&mut ledgers, &target, self.kind);
                ledger.merge_remote(record);
            }
            ChangeEvent::InteractionDeleted { target, kind, id } if kind == self.kind => {
                let mut ledgers = self.ledgers.lock().await;
                if let Some(ledger) = ledgers.get_mut(&target) {
                    ledger.remove_by_id(&id);
                }
            }
            _ => {}
        }
    }

    /// Current rendered list, newest first.
    pub async fn records(&self, target: &TargetRef) -> Vec<InteractionRecord> {
        self.ledgers
            .lock()
            .await
            .get(target)
            .map(|ledger| ledger.rendered())
            .unwrap_or_default()
    }

    /// Denormalized total, including optimistic inserts.
    pub async fn aggregate_count(&self, target: &TargetRef) -> u32 {
        self.ledgers
            .lock()
            .await
            .get(target)
            .map(|ledger| ledger.aggregate_count())
            .unwrap_or_default()
    }

    /// Drafts parked by failed sends, available for `retry`.
    pub async fn failed_drafts(&self, target: &TargetRef) -> Vec<InteractionRecord> {
        self.ledgers
            .lock()
            .await
            .get(target)
            .map(|ledger| ledger.failed_drafts())
            .unwrap_or_default()
    }

    /// Persisted actions that never reached the server, surfaced on
    /// restart so the user can decide what to resend. Confirmed rows
    /// older than a day are swept out in the same pass.
    pub async fn unsent_actions(&self) -> Result<Vec<OfflineActionRecord>, AppError> {
        let Some(store) = self.offline.as_ref() else {
            return Ok(Vec::new());
        };
        let horizon = chrono::Utc::now() - chrono::Duration::days(1);
        if let Err(err) = store.purge_confirmed(horizon).await {
            warn!(error = %err, "failed to purge confirmed offline actions");
        }
        let pending = store.list_pending(self.session.user_id()).await?;
        Ok(pending
            .into_iter()
            .filter(|action| action.action == self.kind.add_action())
            .collect())
    }

    fn entry<'a>(
        ledgers: &'a mut HashMap<TargetRef, InteractionLedger>,
        target: &TargetRef,
        kind: InteractionKind,
    ) -> &'a mut InteractionLedger {
        ledgers
            .entry(target.clone())
            .or_insert_with(|| InteractionLedger::new(target.clone(), kind))
    }

    async fn queue_action(
        &self,
        target: &TargetRef,
        action: ActionKind,
        record: &InteractionRecord,
    ) -> Option<i64> {
        let store = self.offline.as_ref()?;
        let payload = serde_json::to_value(record).unwrap_or(serde_json::Value::Null);
        let draft = OfflineActionDraft {
            user: self.session.user_id().clone(),
            action,
            target: target.clone(),
            local_id: record.id.clone(),
            payload,
        };
        match store.save_action(draft).await {
            Ok(saved) => Some(saved.record_id),
            Err(err) => {
                warn!(target = %target, error = %err, "failed to queue offline action");
                None
            }
        }
    }

    async fn settle_queued(&self, record_id: i64, remote_id: &RecordId) {
        if let (Some(store), Some(server_id)) = (self.offline.as_ref(), remote_id.server_str()) {
            if let Err(err) = store.mark_synced(record_id, server_id).await {
                warn!(record_id, error = %err, "failed to mark offline action synced");
            }
        }
    }

    async fn discard_queued(&self, record_id: i64) {
        if let Some(store) = self.offline.as_ref() {
            if let Err(err) = store.discard_action(record_id).await {
                warn!(record_id, error = %err, "failed to discard offline action");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{LikeOutcome, RecordPage};
    use crate::domain::entities::RemoteRecord;
    use crate::domain::value_objects::{AuthorProfile, PostId, SyncStatus, UserId};
    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration, Utc};
    use std::collections::VecDeque;
    use std::time::Duration;

    struct MockRemote {
        insert_results: Mutex<VecDeque<Result<RemoteRecord, AppError>>>,
        delete_results: Mutex<VecDeque<Result<(), AppError>>>,
        like_results: Mutex<VecDeque<Result<LikeOutcome, AppError>>>,
        pages: Mutex<VecDeque<RecordPage>>,
        insert_latency: Option<Duration>,
    }

    impl MockRemote {
        fn new() -> Self {
            Self {
                insert_results: Mutex::new(VecDeque::new()),
                delete_results: Mutex::new(VecDeque::new()),
                like_results: Mutex::new(VecDeque::new()),
                pages: Mutex::new(VecDeque::new()),
                insert_latency: None,
            }
        }
    }

    #[async_trait]
    impl RemoteStore for MockRemote {
        async fn toggle_like(
            &self,
            _user: &UserId,
            _post: &PostId,
        ) -> Result<LikeOutcome, AppError> {
            unimplemented!("not exercised by interaction tests")
        }

        async fn fetch_like_state(
            &self,
            _user: &UserId,
            _post: &PostId,
        ) -> Result<LikeOutcome, AppError> {
            unimplemented!("not exercised by interaction tests")
        }

        async fn insert_interaction(
            &self,
            draft: InteractionDraft,
        ) -> Result<RemoteRecord, AppError> {
            if let Some(latency) = self.insert_latency {
                tokio::time::sleep(latency).await;
            }
            self.insert_results
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Err(AppError::Internal(format!("no scripted insert for {}", draft.content))))
        }

        async fn delete_interaction(
            &self,
            _kind: InteractionKind,
            _id: &RecordId,
        ) -> Result<(), AppError> {
            self.delete_results
                .lock()
                .await
                .pop_front()
                .unwrap_or(Ok(()))
        }

        async fn toggle_interaction_like(
            &self,
            _user: &UserId,
            _kind: InteractionKind,
            _id: &RecordId,
        ) -> Result<LikeOutcome, AppError> {
            self.like_results
                .lock()
                .await
                .pop_front()
                .unwrap_or(Ok(LikeOutcome {
                    is_liked: true,
                    like_count: 1,
                }))
        }

        async fn fetch_interactions(
            &self,
            _target: &TargetRef,
            _kind: InteractionKind,
            _cursor: Option<&str>,
            _limit: u32,
        ) -> Result<RecordPage, AppError> {
            Ok(self.pages.lock().await.pop_front().unwrap_or(RecordPage {
                items: Vec::new(),
                next_cursor: None,
            }))
        }
    }

    struct MockOffline {
        actions: Mutex<Vec<OfflineActionRecord>>,
        purges: Mutex<Vec<DateTime<Utc>>>,
    }

    impl MockOffline {
        fn new() -> Self {
            Self {
                actions: Mutex::new(Vec::new()),
                purges: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl OfflineStore for MockOffline {
        async fn save_action(
            &self,
            draft: OfflineActionDraft,
        ) -> Result<OfflineActionRecord, AppError> {
            let mut actions = self.actions.lock().await;
            let record = OfflineActionRecord {
                record_id: actions.len() as i64 + 1,
                user: draft.user,
                action: draft.action,
                target: draft.target,
                local_id: draft.local_id,
                payload: draft.payload,
                remote_id: None,
                is_synced: false,
                created_at: Utc::now(),
                synced_at: None,
            };
            actions.push(record.clone());
            Ok(record)
        }

        async fn list_pending(
            &self,
            user: &UserId,
        ) -> Result<Vec<OfflineActionRecord>, AppError> {
            Ok(self
                .actions
                .lock()
                .await
                .iter()
                .filter(|action| !action.is_synced && &action.user == user)
                .cloned()
                .collect())
        }

        async fn mark_synced(&self, record_id: i64, remote_id: &str) -> Result<(), AppError> {
            let mut actions = self.actions.lock().await;
            if let Some(action) = actions.iter_mut().find(|a| a.record_id == record_id) {
                action.is_synced = true;
                action.remote_id = Some(remote_id.to_string());
                action.synced_at = Some(Utc::now());
            }
            Ok(())
        }

        async fn discard_action(&self, record_id: i64) -> Result<(), AppError> {
            self.actions
                .lock()
                .await
                .retain(|action| action.record_id != record_id);
            Ok(())
        }

        async fn save_snapshot(
            &self,
            snapshot: crate::application::ports::OptimisticSnapshot,
        ) -> Result<String, AppError> {
            Ok(snapshot.snapshot_id)
        }

        async fn confirm_snapshot(&self, _snapshot_id: &str) -> Result<(), AppError> {
            Ok(())
        }

        async fn take_snapshot(
            &self,
            _snapshot_id: &str,
        ) -> Result<Option<serde_json::Value>, AppError> {
            Ok(None)
        }

        async fn purge_confirmed(&self, before: DateTime<Utc>) -> Result<u32, AppError> {
            self.purges.lock().await.push(before);
            let mut actions = self.actions.lock().await;
            let len = actions.len();
            actions.retain(|action| !(action.is_synced && action.created_at < before));
            Ok((len - actions.len()) as u32)
        }
    }

    struct RecordingNotifier {
        notices: Mutex<Vec<Notice>>,
    }

    impl RecordingNotifier {
        fn new() -> Self {
            Self {
                notices: Mutex::new(Vec::new()),
            }
        }

        async fn count(&self) -> usize {
            self.notices.lock().await.len()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, notice: Notice) {
            self.notices.lock().await.push(notice);
        }
    }

    fn session() -> Session {
        Session::new(AuthorProfile::new(UserId::new("alice".into()).unwrap(), "alice"))
    }

    fn target() -> TargetRef {
        TargetRef::post(PostId::new("p1".into()).unwrap())
    }

    fn remote_record(id: &str, content: &str, minutes_ago: i64) -> RemoteRecord {
        RemoteRecord {
            id: RecordId::server(id),
            author: AuthorProfile::new(UserId::new("bob".into()).unwrap(), "bob"),
            target: target(),
            kind: InteractionKind::Comment,
            content: Content::new(content).unwrap(),
            created_at: Utc::now() - ChronoDuration::minutes(minutes_ago),
            like_count: 0,
        }
    }

    fn service(remote: Arc<MockRemote>, notifier: Arc<RecordingNotifier>) -> InteractionService {
        InteractionService::comments(session(), remote, notifier, &SyncConfig {
            page_size: 30,
            max_pending_per_target: 3,
        })
    }

    #[tokio::test]
    async fn add_renders_pending_then_confirms() {
        let remote = Arc::new(MockRemote::new());
        let mut confirmed = remote_record("srv-1", "hello", 0);
        confirmed.author = session().profile;
        remote
            .insert_results
            .lock()
            .await
            .push_back(Ok(confirmed));
        let notifier = Arc::new(RecordingNotifier::new());
        let svc = service(remote, notifier.clone());

        let settled = svc.add(&target(), "hello").await.unwrap();

        assert_eq!(settled.id.server_str(), Some("srv-1"));
        assert_eq!(settled.status, SyncStatus::Confirmed);
        let rendered = svc.records(&target()).await;
        assert_eq!(rendered.len(), 1);
        assert!(!rendered.iter().any(|r| r.id.is_tentative()));
        assert_eq!(svc.aggregate_count(&target()).await, 1);
        assert_eq!(notifier.count().await, 0);
    }

    #[tokio::test]
    async fn failed_add_rolls_back_and_parks_draft() {
        let remote = Arc::new(MockRemote::new());
        remote.pages.lock().await.push_back(RecordPage {
            items: vec![remote_record("a", "first", 10)],
            next_cursor: None,
        });
        remote
            .insert_results
            .lock()
            .await
            .push_back(Err(AppError::Network("offline".into())));
        let notifier = Arc::new(RecordingNotifier::new());
        let svc = service(remote, notifier.clone());

        let before = svc.load(&target()).await.unwrap();
        svc.add(&target(), "doomed").await.expect_err("network down");

        assert_eq!(svc.records(&target()).await, before);
        let drafts = svc.failed_drafts(&target()).await;
        assert_eq!(drafts.len(), 1);
        assert!(drafts[0].is_failed());
        assert_eq!(notifier.count().await, 1);
    }

    #[tokio::test]
    async fn retry_resends_parked_draft() {
        let remote = Arc::new(MockRemote::new());
        remote
            .insert_results
            .lock()
            .await
            .push_back(Err(AppError::Network("offline".into())));
        remote
            .insert_results
            .lock()
            .await
            .push_back(Ok(remote_record("srv-2", "second try", 0)));
        let notifier = Arc::new(RecordingNotifier::new());
        let svc = service(remote, notifier.clone());

        svc.add(&target(), "second try").await.expect_err("first send fails");
        let draft_id = svc.failed_drafts(&target()).await[0].id.clone();

        let settled = svc.retry(&target(), &draft_id).await.unwrap();

        assert_eq!(settled.id.server_str(), Some("srv-2"));
        assert!(svc.failed_drafts(&target()).await.is_empty());
        assert_eq!(svc.records(&target()).await.len(), 1);
    }

    #[tokio::test]
    async fn expired_target_clears_everything() {
        let remote = Arc::new(MockRemote::new());
        remote.pages.lock().await.push_back(RecordPage {
            items: vec![remote_record("a", "first", 10)],
            next_cursor: None,
        });
        remote
            .insert_results
            .lock()
            .await
            .push_back(Err(AppError::NotFound("post expired".into())));
        let notifier = Arc::new(RecordingNotifier::new());
        let svc = service(remote, notifier.clone());

        svc.load(&target()).await.unwrap();
        svc.add(&target(), "too late").await.expect_err("post is gone");

        assert!(svc.records(&target()).await.is_empty());
        assert_eq!(notifier.count().await, 1);
    }

    #[tokio::test]
    async fn delete_not_found_counts_as_success() {
        let remote = Arc::new(MockRemote::new());
        remote.pages.lock().await.push_back(RecordPage {
            items: vec![remote_record("a", "first", 10)],
            next_cursor: None,
        });
        remote
            .delete_results
            .lock()
            .await
            .push_back(Err(AppError::NotFound("already gone".into())));
        let notifier = Arc::new(RecordingNotifier::new());
        let svc = service(remote, notifier.clone());
        svc.load(&target()).await.unwrap();

        svc.delete(&target(), &RecordId::server("a")).await.unwrap();

        assert!(svc.records(&target()).await.is_empty());
        assert_eq!(notifier.count().await, 0);
    }

    #[tokio::test]
    async fn deleting_a_pending_draft_never_reaches_the_server() {
        let mut remote = MockRemote::new();
        remote.insert_latency = Some(Duration::from_millis(30));
        remote
            .insert_results
            .get_mut()
            .push_back(Ok(remote_record("srv-1", "changed my mind", 0)));
        let remote = Arc::new(remote);
        let notifier = Arc::new(RecordingNotifier::new());
        let svc = Arc::new(service(remote, notifier));

        let adder = {
            let svc = svc.clone();
            tokio::spawn(async move { svc.add(&target(), "changed my mind").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let pending_id = svc.records(&target()).await[0].id.clone();
        assert!(pending_id.is_tentative());

        svc.delete(&target(), &pending_id).await.unwrap();
        assert!(svc.records(&target()).await.is_empty());

        // The late confirmation is suppressed by the tombstone.
        adder.await.unwrap().unwrap();
        assert!(svc.records(&target()).await.is_empty());
    }

    #[tokio::test]
    async fn failed_delete_restores_record() {
        let remote = Arc::new(MockRemote::new());
        remote.pages.lock().await.push_back(RecordPage {
            items: vec![remote_record("a", "first", 10), remote_record("b", "second", 5)],
            next_cursor: None,
        });
        remote
            .delete_results
            .lock()
            .await
            .push_back(Err(AppError::Network("offline".into())));
        let notifier = Arc::new(RecordingNotifier::new());
        let svc = service(remote, notifier.clone());
        let before = svc.load(&target()).await.unwrap();

        svc.delete(&target(), &RecordId::server("b"))
            .await
            .expect_err("network down");

        assert_eq!(svc.records(&target()).await, before);
        assert_eq!(notifier.count().await, 1);
    }

    #[tokio::test]
    async fn record_like_rolls_back_on_failure() {
        let remote = Arc::new(MockRemote::new());
        remote.pages.lock().await.push_back(RecordPage {
            items: vec![remote_record("a", "first", 10)],
            next_cursor: None,
        });
        remote
            .like_results
            .lock()
            .await
            .push_back(Err(AppError::Network("offline".into())));
        let notifier = Arc::new(RecordingNotifier::new());
        let svc = service(remote, notifier.clone());
        svc.load(&target()).await.unwrap();
        let id = RecordId::server("a");

        svc.toggle_record_like(&target(), &id)
            .await
            .expect_err("network down");

        let record = &svc.records(&target()).await[0];
        assert!(!record.is_liked);
        assert_eq!(record.like_count, 0);
        assert_eq!(notifier.count().await, 1);
    }

    #[tokio::test]
    async fn echo_before_confirm_yields_single_record() {
        let mut remote = MockRemote::new();
        remote.insert_latency = Some(Duration::from_millis(30));
        let confirmed = remote_record("srv-echo", "hello", 0);
        remote
            .insert_results
            .get_mut()
            .push_back(Ok(confirmed.clone()));
        let remote = Arc::new(remote);
        let notifier = Arc::new(RecordingNotifier::new());
        let svc = Arc::new(service(remote, notifier));

        let adder = {
            let svc = svc.clone();
            tokio::spawn(async move { svc.add(&target(), "hello").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        // The feed echoes the insert before the direct response lands.
        svc.apply_change(ChangeEvent::InteractionUpserted { record: confirmed })
            .await;

        adder.await.unwrap().unwrap();

        let rendered = svc.records(&target()).await;
        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered[0].id, RecordId::server("srv-echo"));
        assert_eq!(svc.aggregate_count(&target()).await, 1);
    }

    #[tokio::test]
    async fn concurrent_add_for_same_target_is_rejected() {
        let mut remote = MockRemote::new();
        remote.insert_latency = Some(Duration::from_millis(30));
        remote
            .insert_results
            .get_mut()
            .push_back(Ok(remote_record("srv-1", "first", 0)));
        let remote = Arc::new(remote);
        let notifier = Arc::new(RecordingNotifier::new());
        let svc = Arc::new(service(remote, notifier));
        let target = target();

        let (first, second) =
            tokio::join!(svc.add(&target, "first"), svc.add(&target, "second"));

        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(AppError::InFlight(_)))));
        assert_eq!(svc.records(&target).await.len(), 1);
    }

    #[tokio::test]
    async fn draft_backlog_cap_rejects_further_adds() {
        let remote = Arc::new(MockRemote::new());
        for _ in 0..3 {
            remote
                .insert_results
                .lock()
                .await
                .push_back(Err(AppError::Network("offline".into())));
        }
        let notifier = Arc::new(RecordingNotifier::new());
        let svc = service(remote, notifier);

        for i in 0..3 {
            let _ = svc.add(&target(), &format!("draft {i}")).await;
        }
        assert_eq!(svc.failed_drafts(&target()).await.len(), 3);

        let err = svc
            .add(&target(), "one too many")
            .await
            .expect_err("backlog full");
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn restart_surface_lists_only_unsynced_drafts() {
        let remote = Arc::new(MockRemote::new());
        {
            let mut inserts = remote.insert_results.lock().await;
            let mut confirmed = remote_record("srv-1", "made it", 0);
            confirmed.author = session().profile;
            inserts.push_back(Ok(confirmed));
            inserts.push_back(Err(AppError::Network("offline".into())));
        }
        let notifier = Arc::new(RecordingNotifier::new());
        let offline = Arc::new(MockOffline::new());
        let svc = service(remote, notifier).with_offline(offline.clone());

        svc.add(&target(), "made it").await.unwrap();
        svc.add(&target(), "lost").await.expect_err("network down");

        let unsent = svc.unsent_actions().await.unwrap();
        assert_eq!(unsent.len(), 1);
        assert!(!unsent[0].is_synced);
        assert_eq!(unsent[0].action, ActionKind::AddComment);
        // Listing sweeps stale confirmed rows in the same pass.
        assert_eq!(offline.purges.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn blank_content_is_rejected_before_apply() {
        let remote = Arc::new(MockRemote::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let svc = service(remote, notifier.clone());

        let err = svc.add(&target(), "   ").await.expect_err("blank");

        assert!(matches!(err, AppError::Validation(_)));
        assert!(svc.records(&target()).await.is_empty());
        // Pre-apply rejections do not raise a rollback notice.
        assert_eq!(notifier.count().await, 0);
    }
}
