//! Slot-arena registry for connected handlers.

use crate::errors::{AggregateError, BoxError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// A thread-safe set of connected handlers.
///
/// Handlers occupy slots keyed by a monotonic id; disconnecting clears
/// exactly one slot. Broadcasts iterate a snapshot taken at entry, so
/// concurrent connects and disconnects never disturb an in-flight
/// iteration.
pub struct Connectable<T: ?Sized> {
    slots: Arc<RwLock<HashMap<u64, Arc<T>>>>,
    next_id: AtomicU64,
}

impl<T: ?Sized> Connectable<T> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Connects a handler, returning the handle that disconnects it.
    pub fn connect(&self, handler: Arc<T>) -> ConnectHandle
    where
        T: Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.slots.write().insert(id, handler);

        let slots = Arc::downgrade(&self.slots);
        ConnectHandle {
            id,
            disconnected: AtomicBool::new(false),
            clear: Box::new(move |id| {
                if let Some(slots) = Weak::upgrade(&slots) {
                    slots.write().remove(&id);
                }
            }),
        }
    }

    /// Returns the connected handlers, ascending by connection id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        let slots = self.slots.read();
        let mut entries: Vec<_> = slots.iter().map(|(id, h)| (*id, h.clone())).collect();
        entries.sort_by_key(|(id, _)| *id);
        entries.into_iter().map(|(_, h)| h).collect()
    }

    /// Invokes `action` for every handler in the current snapshot.
    ///
    /// Every handler runs regardless of earlier failures; the failures are
    /// collected and returned together.
    ///
    /// # Errors
    ///
    /// Returns an [`AggregateError`] carrying each handler failure.
    pub async fn for_each<F, Fut>(&self, mut action: F) -> Result<(), AggregateError>
    where
        F: FnMut(Arc<T>) -> Fut,
        Fut: Future<Output = Result<(), BoxError>>,
    {
        let mut causes = Vec::new();
        for handler in self.snapshot() {
            if let Err(cause) = action(handler).await {
                causes.push(cause.into());
            }
        }

        if causes.is_empty() {
            Ok(())
        } else {
            Err(AggregateError::new(causes))
        }
    }

    /// Returns the number of connected handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Returns true if no handlers are connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}

impl<T: ?Sized> Default for Connectable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> std::fmt::Debug for Connectable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connectable").field("len", &self.len()).finish()
    }
}

/// Ownership token for one registration in a [`Connectable`].
///
/// Dropping the handle does not disconnect; disconnection is explicit and
/// idempotent.
pub struct ConnectHandle {
    id: u64,
    disconnected: AtomicBool,
    clear: Box<dyn Fn(u64) + Send + Sync>,
}

impl ConnectHandle {
    /// The registration id this handle owns.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Removes the registration. Subsequent calls are no-ops.
    pub fn disconnect(&self) {
        if self
            .disconnected
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            (self.clear)(self.id);
        }
    }

    /// Returns true once [`ConnectHandle::disconnect`] has run.
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ConnectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectHandle")
            .field("id", &self.id)
            .field("disconnected", &self.is_disconnected())
            .finish()
    }
}
