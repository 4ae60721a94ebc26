use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Lifetime token for a view-owned service instance.
///
/// When the owning view unmounts it revokes the token; settles from
/// remote calls still in flight are then discarded instead of applied,
/// so state updates never leak onto a discarded view.
#[derive(Clone, Debug)]
pub struct ScopeToken {
    active: Arc<AtomicBool>,
}

impl ScopeToken {
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn revoke(&self) {
        self.active.store(false, Ordering::Release);
    }
}

impl Default for ScopeToken {
    fn default() -> Self {
        Self::new()
    }
}
