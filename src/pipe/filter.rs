//! The filter trait, pipeflow's unit of processing.

use super::{Pipe, ProbeContext};
use crate::context::PipeContext;
use crate::errors::PipeError;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;

/// The future type returned by inline filter handlers.
pub type FilterFuture<'a> = Pin<Box<dyn Future<Output = Result<(), PipeError>> + Send + 'a>>;

type InlineHandler<C> = Box<dyn for<'a> Fn(&'a C) -> FilterFuture<'a> + Send + Sync>;

/// A unit of processing in a pipe chain.
///
/// Given a context and the remainder of the chain, a filter forwards,
/// short-circuits, transforms, or fails. Filters are invoked concurrently
/// across independent sends, so they hold no per-send mutable state.
#[async_trait]
pub trait Filter<C: PipeContext>: Send + Sync {
    /// Processes `ctx`, calling `next.send(ctx)` to advance the chain.
    async fn send(&self, ctx: &C, next: &dyn Pipe<C>) -> Result<(), PipeError>;

    /// Contributes structured metadata describing this filter.
    fn probe(&self, probe: &mut ProbeContext);
}

/// A filter built from a closure; it runs the handler and then forwards.
///
/// Convenient for the common do-something-then-continue shape:
///
/// ```rust,ignore
/// let filter = InlineFilter::new("audit", |ctx| {
///     Box::pin(async move {
///         // inspect ctx
///         Ok(())
///     })
/// });
/// ```
pub struct InlineFilter<C: PipeContext> {
    name: &'static str,
    handler: InlineHandler<C>,
}

impl<C: PipeContext> InlineFilter<C> {
    /// Creates an inline filter with a diagnostic name.
    pub fn new<F>(name: &'static str, handler: F) -> Self
    where
        F: for<'a> Fn(&'a C) -> FilterFuture<'a> + Send + Sync + 'static,
    {
        Self {
            name,
            handler: Box::new(handler),
        }
    }
}

#[async_trait]
impl<C: PipeContext> Filter<C> for InlineFilter<C> {
    async fn send(&self, ctx: &C, next: &dyn Pipe<C>) -> Result<(), PipeError> {
        (self.handler)(ctx).await?;
        next.send(ctx).await
    }

    fn probe(&self, probe: &mut ProbeContext) {
        probe.add("filter", self.name);
    }
}
