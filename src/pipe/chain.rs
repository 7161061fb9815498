//! Compiled pipes: linked filter nodes with observer dispatch.

use super::{Filter, ProbeContext};
use crate::context::PipeContext;
use crate::errors::{AggregateError, PipeError};
use crate::observe::{FilterObserver, ObserverSet};
use crate::registry::ConnectHandle;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// A compiled, immutable, ordered filter chain over a context type.
#[async_trait]
pub trait Pipe<C: PipeContext>: Send + Sync {
    /// Drives the context through the remaining filters.
    async fn send(&self, ctx: &C) -> Result<(), PipeError>;

    /// Contributes hierarchical diagnostic metadata.
    fn probe(&self, probe: &mut ProbeContext);
}

/// The terminal no-op pipe ending every chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct EndPipe;

#[async_trait]
impl<C: PipeContext> Pipe<C> for EndPipe {
    async fn send(&self, _ctx: &C) -> Result<(), PipeError> {
        Ok(())
    }

    fn probe(&self, _probe: &mut ProbeContext) {}
}

/// One link in a compiled chain: a filter plus the rest of the pipe.
pub(crate) struct FilterNode<C: PipeContext> {
    filter: Arc<dyn Filter<C>>,
    next: Arc<dyn Pipe<C>>,
    observers: Arc<ObserverSet<C>>,
}

impl<C: PipeContext> FilterNode<C> {
    pub(crate) fn new(
        filter: Arc<dyn Filter<C>>,
        next: Arc<dyn Pipe<C>>,
        observers: Arc<ObserverSet<C>>,
    ) -> Self {
        Self {
            filter,
            next,
            observers,
        }
    }
}

#[async_trait]
impl<C: PipeContext> Pipe<C> for FilterNode<C> {
    async fn send(&self, ctx: &C) -> Result<(), PipeError> {
        if self.observers.is_empty() {
            return self.filter.send(ctx, self.next.as_ref()).await;
        }

        let mut faults = self.observers.pre_send(ctx).await;

        match self.filter.send(ctx, self.next.as_ref()).await {
            Ok(()) => {
                faults.extend(self.observers.post_send(ctx).await);
                if faults.is_empty() {
                    Ok(())
                } else {
                    let aggregate = AggregateError::new(faults);
                    warn!(faults = aggregate.len(), "observer callbacks failed on successful send");
                    Err(PipeError::Observers(aggregate))
                }
            }
            Err(error) => {
                faults.extend(self.observers.send_fault(ctx, &error).await);
                // The primary failure is never masked by observer faults
                if !faults.is_empty() {
                    warn!(
                        faults = faults.len(),
                        primary = %error,
                        "observer callbacks failed on faulted send"
                    );
                }
                Err(error)
            }
        }
    }

    fn probe(&self, probe: &mut ProbeContext) {
        probe.section("filters", |p| self.filter.probe(p));
        self.next.probe(probe);
    }
}

/// A built pipe: the head of the chain plus its observer set.
///
/// Cheap to clone; clones share the chain and the observers.
pub struct BuiltPipe<C: PipeContext> {
    head: Arc<dyn Pipe<C>>,
    observers: Arc<ObserverSet<C>>,
}

impl<C: PipeContext> BuiltPipe<C> {
    pub(crate) fn new(head: Arc<dyn Pipe<C>>, observers: Arc<ObserverSet<C>>) -> Self {
        Self { head, observers }
    }

    /// Attaches an observer to every filter of this pipe.
    pub fn connect_observer(&self, observer: Arc<dyn FilterObserver<C>>) -> ConnectHandle {
        self.observers.connect(observer)
    }

    /// Probes the whole pipe and returns the diagnostic tree.
    #[must_use]
    pub fn probe_tree(&self) -> serde_json::Value {
        let mut probe = ProbeContext::new();
        self.head.probe(&mut probe);
        probe.finish()
    }
}

impl<C: PipeContext> Clone for BuiltPipe<C> {
    fn clone(&self) -> Self {
        Self {
            head: self.head.clone(),
            observers: self.observers.clone(),
        }
    }
}

impl<C: PipeContext> std::fmt::Debug for BuiltPipe<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltPipe")
            .field("observers", &self.observers)
            .finish()
    }
}

#[async_trait]
impl<C: PipeContext> Pipe<C> for BuiltPipe<C> {
    async fn send(&self, ctx: &C) -> Result<(), PipeError> {
        self.head.send(ctx).await
    }

    fn probe(&self, probe: &mut ProbeContext) {
        self.head.probe(probe);
    }
}
