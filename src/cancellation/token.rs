//! Cancellation token for cooperative cancellation.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

/// A callback type for cancellation notifications.
pub type CancelCallback = Box<dyn Fn() + Send + Sync>;

struct Shared {
    /// Whether cancellation has been requested.
    cancelled: AtomicBool,
    /// The reason for cancellation (first one wins).
    reason: RwLock<Option<String>>,
    /// Callbacks to invoke on cancellation.
    callbacks: RwLock<Vec<CancelCallback>>,
    /// Signal for async waiters.
    signal: watch::Sender<bool>,
}

/// A token for cooperative cancellation.
///
/// Clones share the same cancellation state. Cancellation is idempotent;
/// only the first cancellation reason is kept. Async consumers wait on
/// [`CancellationToken::cancelled`], synchronous consumers poll
/// [`CancellationToken::is_cancelled`] or register a callback.
#[derive(Clone)]
pub struct CancellationToken {
    shared: Arc<Shared>,
}

impl CancellationToken {
    /// Creates a new cancellation token.
    #[must_use]
    pub fn new() -> Self {
        let (signal, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                cancelled: AtomicBool::new(false),
                reason: RwLock::new(None),
                callbacks: RwLock::new(Vec::new()),
                signal,
            }),
        }
    }

    /// Requests cancellation with a reason.
    ///
    /// This is idempotent; only the first reason is kept. Callbacks are
    /// invoked immediately, and panics in callbacks are logged and
    /// suppressed.
    pub fn cancel(&self, reason: impl Into<String>) {
        if self
            .shared
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            *self.shared.reason.write() = Some(reason.into());
            // send_replace updates the value even with no receivers yet
            self.shared.signal.send_replace(true);

            let callbacks = self.shared.callbacks.read();
            for callback in callbacks.iter() {
                if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    callback();
                })) {
                    warn!("cancellation callback panicked: {:?}", e);
                }
            }
        }
    }

    /// Registers a callback to be invoked on cancellation.
    ///
    /// If already cancelled, the callback is invoked immediately.
    pub fn on_cancel<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        if self.is_cancelled() {
            if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                callback();
            })) {
                warn!("cancellation callback panicked: {:?}", e);
            }
        } else {
            self.shared.callbacks.write().push(Box::new(callback));
        }
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the cancellation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.shared.reason.read().clone()
    }

    /// Completes when cancellation has been requested.
    ///
    /// Returns immediately if the token is already cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.shared.signal.subscribe();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Creates a token that is cancelled whenever this token is cancelled.
    ///
    /// The child can also be cancelled independently without affecting the
    /// parent.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        let child = CancellationToken::new();
        let linked = child.clone();
        self.on_cancel(move || linked.cancel("parent token cancelled"));
        child
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}
