use crate::application::ports::ChangeFeed;
use crate::application::services::{InteractionService, LikeService};
use crate::domain::entities::ChangeEvent;
use crate::domain::value_objects::{InteractionKind, TargetRef};
use crate::shared::config::RealtimeConfig;
use crate::shared::AppError;
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Routes change-feed events to the service owning each state shape.
///
/// The subscription always covers exactly the currently visible
/// targets. Re-scoping drops the old stream before opening the new
/// one, so no event is delivered for a target that scrolled away.
pub struct RealtimeRouter {
    feed: Arc<dyn ChangeFeed>,
    likes: Arc<LikeService>,
    comments: Arc<InteractionService>,
    messages: Arc<InteractionService>,
    resubscribe_debounce: Duration,
    inner: Mutex<RouterInner>,
}

struct RouterInner {
    targets: Vec<TargetRef>,
    pump: Option<JoinHandle<()>>,
    last_subscribe: Option<Instant>,
}

enum Route {
    Likes,
    Comments,
    Messages,
}

impl RealtimeRouter {
    pub fn new(
        feed: Arc<dyn ChangeFeed>,
        likes: Arc<LikeService>,
        comments: Arc<InteractionService>,
        messages: Arc<InteractionService>,
        realtime: &RealtimeConfig,
    ) -> Self {
        Self {
            feed,
            likes,
            comments,
            messages,
            resubscribe_debounce: Duration::from_millis(realtime.resubscribe_debounce_ms),
            inner: Mutex::new(RouterInner {
                targets: Vec::new(),
                pump: None,
                last_subscribe: None,
            }),
        }
    }

    /// Re-scopes the subscription to the given target set. A call with
    /// the same set (order and duplicates ignored) is a no-op; an
    /// empty set tears the subscription down.
    pub async fn set_visible_targets(&self, targets: &[TargetRef]) -> Result<(), AppError> {
        let mut next: Vec<TargetRef> = targets.to_vec();
        next.sort_by_key(|target| target.to_string());
        next.dedup();

        let mut inner = self.inner.lock().await;
        if inner.targets == next {
            return Ok(());
        }
        if let Some(pump) = inner.pump.take() {
            pump.abort();
        }
        if next.is_empty() {
            inner.targets.clear();
            debug!("no visible targets, subscription torn down");
            return Ok(());
        }

        // Throttles resubscription during rapid feed scrolling; calls
        // serialize on the lock, so the last requested set wins.
        if let Some(last) = inner.last_subscribe {
            let elapsed = last.elapsed();
            if elapsed < self.resubscribe_debounce {
                tokio::time::sleep(self.resubscribe_debounce - elapsed).await;
            }
        }
        // The set is committed only once the subscription holds, so a
        // retry after a failed subscribe is not mistaken for a no-op.
        let mut stream = match self.feed.subscribe(&next).await {
            Ok(stream) => stream,
            Err(err) => {
                inner.targets.clear();
                return Err(err);
            }
        };
        inner.targets = next.clone();
        inner.last_subscribe = Some(Instant::now());
        info!(targets = next.len(), "subscribed to change feed");
        let likes = self.likes.clone();
        let comments = self.comments.clone();
        let messages = self.messages.clone();
        inner.pump = Some(tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                let route = match &event {
                    ChangeEvent::LikeSet { .. } => Route::Likes,
                    ChangeEvent::InteractionUpserted { record } => {
                        if record.kind == InteractionKind::Message {
                            Route::Messages
                        } else {
                            Route::Comments
                        }
                    }
                    ChangeEvent::InteractionDeleted { kind, .. } => {
                        if *kind == InteractionKind::Message {
                            Route::Messages
                        } else {
                            Route::Comments
                        }
                    }
                };
                match route {
                    Route::Likes => likes.apply_change(event).await,
                    Route::Comments => comments.apply_change(event).await,
                    Route::Messages => messages.apply_change(event).await,
                }
            }
            debug!("change feed stream closed");
        }));
        Ok(())
    }

    pub async fn visible_targets(&self) -> Vec<TargetRef> {
        self.inner.lock().await.targets.clone()
    }

    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(pump) = inner.pump.take() {
            pump.abort();
        }
        inner.targets.clear();
    }
}

impl Drop for RealtimeRouter {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.try_lock() {
            if let Some(pump) = inner.pump.take() {
                pump.abort();
            }
        }
    }
}
