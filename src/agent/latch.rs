//! One-shot lifecycle event latches.

use crate::errors::{DynError, LifecycleError};
use tokio::sync::watch;

/// The resolution of a latch.
#[derive(Debug, Clone)]
enum LatchState {
    Pending,
    Set,
    Faulted(DynError),
    Cancelled(String),
}

/// A one-shot event latch consumable by any number of awaiters.
///
/// A latch starts pending and resolves exactly once to set, faulted, or
/// cancelled; the first resolution wins and later calls are no-ops.
/// Awaiters that arrive after resolution observe the result immediately.
pub struct EventLatch {
    name: &'static str,
    state: watch::Sender<LatchState>,
}

impl EventLatch {
    /// Creates a pending latch with a diagnostic name.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        let (state, _) = watch::channel(LatchState::Pending);
        Self { name, state }
    }

    /// The diagnostic name of this latch.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    fn resolve(&self, next: LatchState) -> bool {
        let mut transitioned = false;
        self.state.send_if_modified(|state| {
            if matches!(state, LatchState::Pending) {
                *state = next;
                transitioned = true;
            }
            transitioned
        });
        transitioned
    }

    /// Resolves the latch as succeeded. Returns whether it transitioned.
    pub fn set(&self) -> bool {
        self.resolve(LatchState::Set)
    }

    /// Resolves the latch as faulted. Returns whether it transitioned.
    pub fn fault(&self, cause: DynError) -> bool {
        self.resolve(LatchState::Faulted(cause))
    }

    /// Resolves the latch as cancelled. Returns whether it transitioned.
    pub fn cancel(&self, reason: impl Into<String>) -> bool {
        self.resolve(LatchState::Cancelled(reason.into()))
    }

    /// Returns true once the latch has resolved in any way.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(*self.state.borrow(), LatchState::Pending)
    }

    /// Returns true if the latch resolved as succeeded.
    #[must_use]
    pub fn is_set(&self) -> bool {
        matches!(*self.state.borrow(), LatchState::Set)
    }

    /// Returns true if the latch resolved as faulted.
    #[must_use]
    pub fn is_faulted(&self) -> bool {
        matches!(*self.state.borrow(), LatchState::Faulted(_))
    }

    /// The resolution, if any, without waiting.
    #[must_use]
    pub fn try_result(&self) -> Option<Result<(), LifecycleError>> {
        match &*self.state.borrow() {
            LatchState::Pending => None,
            LatchState::Set => Some(Ok(())),
            LatchState::Faulted(cause) => Some(Err(LifecycleError::Faulted(cause.clone()))),
            LatchState::Cancelled(reason) => Some(Err(LifecycleError::Cancelled(reason.clone()))),
        }
    }

    /// Waits for the latch to resolve.
    ///
    /// # Errors
    ///
    /// Returns the fault or cancellation the latch resolved with.
    pub async fn wait(&self) -> Result<(), LifecycleError> {
        let mut rx = self.state.subscribe();
        let resolved = rx
            .wait_for(|state| !matches!(state, LatchState::Pending))
            .await;

        match resolved.as_deref() {
            Ok(LatchState::Set) => Ok(()),
            Ok(LatchState::Faulted(cause)) => Err(LifecycleError::Faulted(cause.clone())),
            Ok(LatchState::Cancelled(reason)) => Err(LifecycleError::Cancelled(reason.clone())),
            // The sender lives as long as &self, so these cannot be reached
            Ok(LatchState::Pending) | Err(_) => {
                Err(LifecycleError::Cancelled("latch dropped".to_string()))
            }
        }
    }
}

impl std::fmt::Debug for EventLatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &*self.state.borrow() {
            LatchState::Pending => "pending",
            LatchState::Set => "set",
            LatchState::Faulted(_) => "faulted",
            LatchState::Cancelled(_) => "cancelled",
        };
        f.debug_struct("EventLatch")
            .field("name", &self.name)
            .field("state", &state)
            .finish()
    }
}
