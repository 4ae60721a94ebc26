use crate::shared::AppError;
use std::collections::HashSet;
use tokio::sync::Mutex;

/// Suppresses duplicate concurrent dispatches for the same
/// (user, target, action) key. A second attempt while the first is
/// unsettled is rejected with `AppError::InFlight`; nothing is queued.
pub struct InFlightGuard {
    active: Mutex<HashSet<String>>,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(HashSet::new()),
        }
    }

    pub async fn begin(&self, key: &str) -> Result<(), AppError> {
        let mut guard = self.active.lock().await;
        if !guard.insert(key.to_string()) {
            return Err(AppError::InFlight(key.to_string()));
        }
        Ok(())
    }

    pub async fn finish(&self, key: &str) {
        let mut guard = self.active.lock().await;
        guard.remove(key);
    }

    pub async fn is_active(&self, key: &str) -> bool {
        let guard = self.active.lock().await;
        guard.contains(key)
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}
