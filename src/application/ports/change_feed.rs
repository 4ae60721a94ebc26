use crate::domain::entities::ChangeEvent;
use crate::domain::value_objects::TargetRef;
use crate::shared::error::AppError;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Cancellable stream of change events; dropping it tears the
/// underlying subscription down.
pub type ChangeStream = Pin<Box<dyn Stream<Item = ChangeEvent> + Send>>;

/// Realtime boundary to the managed backend. A subscription is scoped
/// to an explicit target set; re-scoping means subscribing anew and
/// dropping the old stream.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self, targets: &[TargetRef]) -> Result<ChangeStream, AppError>;
}
