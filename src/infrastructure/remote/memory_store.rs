use crate::application::ports::{
    ChangeFeed, ChangeStream, InteractionDraft, LikeOutcome, PageCursor, RecordPage, RemoteStore,
};
use crate::domain::entities::{ChangeEvent, RemoteRecord};
use crate::domain::value_objects::{InteractionKind, PostId, RecordId, TargetRef, UserId};
use crate::shared::AppError;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::Mutex;

/// In-process backend, the shared authority for tests and local
/// development. Every mutation is broadcast on the change feed, so two
/// services built over the same store observe each other the way two
/// devices do against the real backend.
pub struct MemoryRemoteStore {
    state: Mutex<MemoryState>,
    events: broadcast::Sender<ChangeEvent>,
}

#[derive(Default)]
struct MemoryState {
    interactions: HashMap<String, RemoteRecord>,
    post_likes: HashMap<String, HashSet<String>>,
    base_counts: HashMap<String, u32>,
    record_likes: HashMap<String, HashSet<String>>,
    fail_next: VecDeque<AppError>,
    latency: Option<Duration>,
    mutation_calls: u32,
    next_id: u64,
}

impl MemoryRemoteStore {
    pub fn new(channel_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(channel_capacity);
        Self {
            state: Mutex::new(MemoryState::default()),
            events,
        }
    }

    /// Scripts the next mutation to fail with the given error.
    pub async fn fail_next(&self, err: AppError) {
        self.state.lock().await.fail_next.push_back(err);
    }

    /// Delays every mutation, for tests racing a second dispatch
    /// against an unsettled first one.
    pub async fn set_latency(&self, latency: Duration) {
        self.state.lock().await.latency = Some(latency);
    }

    pub async fn mutation_calls(&self) -> u32 {
        self.state.lock().await.mutation_calls
    }

    pub async fn seed_record(&self, record: RemoteRecord) {
        if let Some(id) = record.id.server_str() {
            self.state
                .lock()
                .await
                .interactions
                .insert(id.to_string(), record);
        }
    }

    pub async fn seed_like_count(&self, post: &PostId, count: u32) {
        self.state
            .lock()
            .await
            .base_counts
            .insert(post.as_str().to_string(), count);
    }

    /// Applies latency, charges the mutation counter and pops any
    /// scripted failure.
    async fn gate(&self) -> Result<(), AppError> {
        let latency = self.state.lock().await.latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let mut state = self.state.lock().await;
        state.mutation_calls += 1;
        match state.fail_next.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn emit(&self, event: ChangeEvent) {
        // No receivers is fine; nobody is watching yet.
        let _ = self.events.send(event);
    }

    fn like_count_of(state: &MemoryState, post: &str) -> u32 {
        let base = state.base_counts.get(post).copied().unwrap_or(0);
        let live = state
            .post_likes
            .get(post)
            .map(|users| users.len() as u32)
            .unwrap_or(0);
        base + live
    }
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn toggle_like(&self, user: &UserId, post: &PostId) -> Result<LikeOutcome, AppError> {
        self.gate().await?;
        let (liked, like_count) = {
            let mut state = self.state.lock().await;
            let users = state
                .post_likes
                .entry(post.as_str().to_string())
                .or_default();
            let liked = if users.remove(user.as_str()) {
                false
            } else {
                users.insert(user.as_str().to_string());
                true
            };
            (liked, Self::like_count_of(&state, post.as_str()))
        };
        self.emit(ChangeEvent::LikeSet {
            post: post.clone(),
            user: user.clone(),
            liked,
            like_count,
        });
        Ok(LikeOutcome {
            is_liked: liked,
            like_count,
        })
    }

    async fn fetch_like_state(
        &self,
        user: &UserId,
        post: &PostId,
    ) -> Result<LikeOutcome, AppError> {
        let state = self.state.lock().await;
        let is_liked = state
            .post_likes
            .get(post.as_str())
            .map(|users| users.contains(user.as_str()))
            .unwrap_or(false);
        Ok(LikeOutcome {
            is_liked,
            like_count: Self::like_count_of(&state, post.as_str()),
        })
    }

    async fn insert_interaction(
        &self,
        draft: InteractionDraft,
    ) -> Result<RemoteRecord, AppError> {
        self.gate().await?;
        let record = {
            let mut state = self.state.lock().await;
            state.next_id += 1;
            let id = format!("srv-{}", state.next_id);
            let record = RemoteRecord {
                id: RecordId::server(id.clone()),
                author: draft.author,
                target: draft.target,
                kind: draft.kind,
                content: draft.content,
                created_at: Utc::now(),
                like_count: 0,
            };
            state.interactions.insert(id, record.clone());
            record
        };
        self.emit(ChangeEvent::InteractionUpserted {
            record: record.clone(),
        });
        Ok(record)
    }

    async fn delete_interaction(
        &self,
        kind: InteractionKind,
        id: &RecordId,
    ) -> Result<(), AppError> {
        self.gate().await?;
        let id_str = id
            .server_str()
            .ok_or_else(|| AppError::Validation("expected a server identity".to_string()))?;
        let removed = {
            let mut state = self.state.lock().await;
            state.record_likes.remove(id_str);
            state.interactions.remove(id_str)
        };
        match removed {
            Some(record) => {
                self.emit(ChangeEvent::InteractionDeleted {
                    target: record.target,
                    kind,
                    id: id.clone(),
                });
                Ok(())
            }
            None => Err(AppError::NotFound(format!("no interaction {id_str}"))),
        }
    }

    async fn toggle_interaction_like(
        &self,
        user: &UserId,
        _kind: InteractionKind,
        id: &RecordId,
    ) -> Result<LikeOutcome, AppError> {
        self.gate().await?;
        let id_str = id
            .server_str()
            .ok_or_else(|| AppError::Validation("expected a server identity".to_string()))?;
        let (outcome, record) = {
            let mut state = self.state.lock().await;
            if !state.interactions.contains_key(id_str) {
                return Err(AppError::NotFound(format!("no interaction {id_str}")));
            }
            let users = state.record_likes.entry(id_str.to_string()).or_default();
            let is_liked = if users.remove(user.as_str()) {
                false
            } else {
                users.insert(user.as_str().to_string());
                true
            };
            let like_count = users.len() as u32;
            let record = state
                .interactions
                .get_mut(id_str)
                .map(|record| {
                    record.like_count = like_count;
                    record.clone()
                });
            (
                LikeOutcome {
                    is_liked,
                    like_count,
                },
                record,
            )
        };
        if let Some(record) = record {
            self.emit(ChangeEvent::InteractionUpserted { record });
        }
        Ok(outcome)
    }

    async fn fetch_interactions(
        &self,
        target: &TargetRef,
        kind: InteractionKind,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<RecordPage, AppError> {
        let cutoff = cursor.map(PageCursor::parse).transpose()?;

        let state = self.state.lock().await;
        let mut matching: Vec<&RemoteRecord> = state
            .interactions
            .values()
            .filter(|record| &record.target == target && record.kind == kind)
            .filter(|record| match &cutoff {
                Some(cutoff) => {
                    record.created_at < cutoff.created_at
                        || (record.created_at == cutoff.created_at
                            && record.id.to_string() < cutoff.id)
                }
                None => true,
            })
            .collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.to_string().cmp(&a.id.to_string()))
        });

        let remaining = matching.len().saturating_sub(limit as usize);
        let items: Vec<RemoteRecord> = matching
            .into_iter()
            .take(limit as usize)
            .cloned()
            .collect();
        let next_cursor = if remaining > 0 {
            items
                .last()
                .and_then(PageCursor::after)
                .map(|cursor| cursor.to_string())
        } else {
            None
        };
        Ok(RecordPage { items, next_cursor })
    }
}

#[async_trait]
impl ChangeFeed for MemoryRemoteStore {
    async fn subscribe(&self, targets: &[TargetRef]) -> Result<ChangeStream, AppError> {
        let rx = self.events.subscribe();
        let targets: HashSet<TargetRef> = targets.iter().cloned().collect();
        let stream = futures::stream::unfold((rx, targets), |(mut rx, targets)| async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if targets.contains(&event.target()) {
                            return Some((event, (rx, targets)));
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{AuthorProfile, Content};
    use futures::StreamExt;

    fn user(name: &str) -> UserId {
        UserId::new(name.into()).unwrap()
    }

    fn post() -> PostId {
        PostId::new("p1".into()).unwrap()
    }

    fn draft(content: &str) -> InteractionDraft {
        InteractionDraft {
            author: AuthorProfile::new(user("alice"), "alice"),
            target: TargetRef::post(post()),
            kind: InteractionKind::Comment,
            content: Content::new(content).unwrap(),
        }
    }

    #[tokio::test]
    async fn like_toggle_round_trips() {
        let store = MemoryRemoteStore::default();
        store.seed_like_count(&post(), 3).await;

        let on = store.toggle_like(&user("alice"), &post()).await.unwrap();
        assert_eq!(on.is_liked, true);
        assert_eq!(on.like_count, 4);

        let off = store.toggle_like(&user("alice"), &post()).await.unwrap();
        assert_eq!(off.is_liked, false);
        assert_eq!(off.like_count, 3);
        assert_eq!(store.mutation_calls().await, 2);
    }

    #[tokio::test]
    async fn scripted_failure_is_consumed_once() {
        let store = MemoryRemoteStore::default();
        store.fail_next(AppError::Network("offline".into())).await;

        let err = store
            .toggle_like(&user("alice"), &post())
            .await
            .expect_err("scripted failure");
        assert!(matches!(err, AppError::Network(_)));

        store.toggle_like(&user("alice"), &post()).await.unwrap();
    }

    #[tokio::test]
    async fn pagination_walks_newest_first() {
        let store = MemoryRemoteStore::default();
        for i in 0..5 {
            store
                .insert_interaction(draft(&format!("comment {i}")))
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let first = store
            .fetch_interactions(&TargetRef::post(post()), InteractionKind::Comment, None, 2)
            .await
            .unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.items[0].content.as_str(), "comment 4");
        let cursor = first.next_cursor.expect("more pages");

        let second = store
            .fetch_interactions(
                &TargetRef::post(post()),
                InteractionKind::Comment,
                Some(&cursor),
                2,
            )
            .await
            .unwrap();
        assert_eq!(second.items.len(), 2);
        assert_eq!(second.items[0].content.as_str(), "comment 2");
    }

    #[tokio::test]
    async fn shared_timestamps_survive_the_page_boundary() {
        let store = MemoryRemoteStore::default();
        let stamp = Utc::now();
        for name in ["a", "b", "c", "d", "e"] {
            store
                .seed_record(RemoteRecord {
                    id: RecordId::server(format!("srv-{name}")),
                    author: AuthorProfile::new(user("alice"), "alice"),
                    target: TargetRef::post(post()),
                    kind: InteractionKind::Comment,
                    content: Content::new(name).unwrap(),
                    created_at: stamp,
                    like_count: 0,
                })
                .await;
        }

        let mut seen = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = store
                .fetch_interactions(
                    &TargetRef::post(post()),
                    InteractionKind::Comment,
                    cursor.as_deref(),
                    2,
                )
                .await
                .unwrap();
            seen.extend(page.items.into_iter().map(|record| record.id));
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        // Every row lands exactly once despite the common timestamp.
        assert_eq!(seen.len(), 5);
        seen.sort_by_key(|id| id.to_string());
        seen.dedup();
        assert_eq!(seen.len(), 5);
    }

    #[tokio::test]
    async fn subscription_filters_by_target() {
        let store = MemoryRemoteStore::default();
        let mut stream = store
            .subscribe(&[TargetRef::post(post())])
            .await
            .unwrap();

        let mut other = draft("elsewhere");
        other.target = TargetRef::post(PostId::new("p2".into()).unwrap());
        store.insert_interaction(other).await.unwrap();
        let seen = store.insert_interaction(draft("visible")).await.unwrap();

        // The p2 insert is filtered out; the first event is ours.
        match stream.next().await.expect("event") {
            ChangeEvent::InteractionUpserted { record } => assert_eq!(record.id, seen.id),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_of_unknown_record_is_not_found() {
        let store = MemoryRemoteStore::default();
        let err = store
            .delete_interaction(InteractionKind::Comment, &RecordId::server("ghost"))
            .await
            .expect_err("nothing to delete");
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
