//! Filter observers and their dispatch set.

use crate::context::PipeContext;
use crate::errors::{BoxError, DynError, PipeError};
use crate::registry::{Connectable, ConnectHandle};
use async_trait::async_trait;
use std::sync::Arc;

/// Side-channel notification sink for filter execution.
///
/// Observers attach to a built pipe and are invoked around every filter:
/// all `pre_send` callbacks before the filter runs, `post_send` after a
/// successful run, `send_fault` after a failed one. Callbacks default to
/// no-ops so implementors override only what they need.
#[async_trait]
pub trait FilterObserver<C: PipeContext>: Send + Sync {
    /// Called before the filter executes.
    async fn pre_send(&self, _ctx: &C) -> Result<(), BoxError> {
        Ok(())
    }

    /// Called after the filter executed successfully.
    async fn post_send(&self, _ctx: &C) -> Result<(), BoxError> {
        Ok(())
    }

    /// Called after the filter failed with `error`.
    async fn send_fault(&self, _ctx: &C, _error: &PipeError) -> Result<(), BoxError> {
        Ok(())
    }
}

/// The set of observers attached to one pipe.
///
/// Dispatch collects callback failures instead of short-circuiting: every
/// observer is notified regardless of how the others fared.
pub struct ObserverSet<C: PipeContext> {
    observers: Connectable<dyn FilterObserver<C>>,
}

impl<C: PipeContext> ObserverSet<C> {
    /// Creates an empty observer set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            observers: Connectable::new(),
        }
    }

    /// Attaches an observer, returning its disconnect handle.
    pub fn connect(&self, observer: Arc<dyn FilterObserver<C>>) -> ConnectHandle {
        self.observers.connect(observer)
    }

    /// Returns true if no observers are attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Notifies every observer that a filter is about to run.
    pub async fn pre_send(&self, ctx: &C) -> Vec<DynError> {
        match self.observers.for_each(|o| async move { o.pre_send(ctx).await }).await {
            Ok(()) => Vec::new(),
            Err(agg) => agg.causes,
        }
    }

    /// Notifies every observer that a filter completed successfully.
    pub async fn post_send(&self, ctx: &C) -> Vec<DynError> {
        match self.observers.for_each(|o| async move { o.post_send(ctx).await }).await {
            Ok(()) => Vec::new(),
            Err(agg) => agg.causes,
        }
    }

    /// Notifies every observer that a filter failed.
    pub async fn send_fault(&self, ctx: &C, error: &PipeError) -> Vec<DynError> {
        match self
            .observers
            .for_each(|o| async move { o.send_fault(ctx, error).await })
            .await
        {
            Ok(()) => Vec::new(),
            Err(agg) => agg.causes,
        }
    }
}

impl<C: PipeContext> Default for ObserverSet<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: PipeContext> std::fmt::Debug for ObserverSet<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverSet")
            .field("observers", &self.observers)
            .finish()
    }
}
