//! The three-latch agent lifecycle.

use super::EventLatch;
use crate::errors::{DynError, LifecycleError};

/// A long-lived resource with Ready, Stopped, and Completed latches.
///
/// Ready resolves when the resource becomes usable (or faults when it
/// cannot); Stopped resolves when a stop is requested; Completed resolves
/// once the resource has fully drained, and only ever after Stopped.
#[derive(Debug)]
pub struct Agent {
    name: String,
    ready: EventLatch,
    stopped: EventLatch,
    completed: EventLatch,
}

impl Agent {
    /// Creates an agent with all latches pending.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ready: EventLatch::new("ready"),
            stopped: EventLatch::new("stopped"),
            completed: EventLatch::new("completed"),
        }
    }

    /// The agent's diagnostic name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The Ready latch.
    #[must_use]
    pub fn ready(&self) -> &EventLatch {
        &self.ready
    }

    /// The Stopped latch.
    #[must_use]
    pub fn stopped(&self) -> &EventLatch {
        &self.stopped
    }

    /// The Completed latch.
    #[must_use]
    pub fn completed(&self) -> &EventLatch {
        &self.completed
    }

    /// Resolves Ready as succeeded. No-op if Ready already resolved.
    pub fn set_ready(&self) -> bool {
        self.ready.set()
    }

    /// Resolves Ready as faulted with `cause`. No-op if already resolved.
    pub fn set_not_ready(&self, cause: DynError) -> bool {
        self.ready.fault(cause)
    }

    /// Returns true if Ready resolved as faulted.
    #[must_use]
    pub fn is_faulted(&self) -> bool {
        self.ready.is_faulted()
    }

    /// Resolves Stopped; a still-pending Ready becomes observable as
    /// cancelled. Idempotent.
    pub fn begin_stop(&self, reason: &str) {
        self.ready.cancel(reason);
        self.stopped.set();
    }

    /// Resolves Completed. Must follow [`Agent::begin_stop`].
    pub fn finish_stop(&self) {
        debug_assert!(self.stopped.is_resolved(), "completed requires stopped");
        self.completed.set();
    }

    /// Stops the agent: resolves Stopped, then Completed.
    ///
    /// The base agent has no drain of its own, so completion is
    /// immediate; composed lifecycles interleave their drain between
    /// [`Agent::begin_stop`] and [`Agent::finish_stop`].
    pub async fn stop(&self, reason: &str) {
        self.begin_stop(reason);
        self.finish_stop();
    }

    /// Waits for Ready.
    ///
    /// # Errors
    ///
    /// Returns the fault or cancellation Ready resolved with.
    pub async fn await_ready(&self) -> Result<(), LifecycleError> {
        self.ready.wait().await
    }

    /// Waits for Stopped.
    ///
    /// # Errors
    ///
    /// Returns the fault or cancellation Stopped resolved with.
    pub async fn await_stopped(&self) -> Result<(), LifecycleError> {
        self.stopped.wait().await
    }

    /// Waits for Completed.
    ///
    /// # Errors
    ///
    /// Returns the fault or cancellation Completed resolved with.
    pub async fn await_completed(&self) -> Result<(), LifecycleError> {
        self.completed.wait().await
    }
}
