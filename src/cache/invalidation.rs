//! Invalidation signalling for cached contexts.

use std::sync::Arc;
use tokio::sync::watch;

/// The sink a cached context uses to signal it can no longer be used.
///
/// Clones share the same signal. Invalidation is one-way and idempotent;
/// the supervisor that owns the context's handle observes the signal and
/// evicts.
#[derive(Clone)]
pub struct InvalidationToken {
    signal: Arc<watch::Sender<bool>>,
}

impl InvalidationToken {
    /// Creates a fresh, valid token.
    #[must_use]
    pub fn new() -> Self {
        let (signal, _) = watch::channel(false);
        Self {
            signal: Arc::new(signal),
        }
    }

    /// Marks the context invalid. Repeated calls are no-ops.
    pub fn invalidate(&self) {
        // send_replace updates the value even with no receivers yet
        self.signal.send_replace(true);
    }

    /// Returns true once the context has been marked invalid.
    #[must_use]
    pub fn is_invalidated(&self) -> bool {
        *self.signal.borrow()
    }

    /// Completes once the context has been marked invalid.
    pub async fn invalidated(&self) {
        let mut rx = self.signal.subscribe();
        let _ = rx.wait_for(|invalid| *invalid).await;
    }
}

impl Default for InvalidationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InvalidationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvalidationToken")
            .field("invalidated", &self.is_invalidated())
            .finish()
    }
}
