//! Mock filters and observers.

use crate::context::PipeContext;
use crate::errors::{BoxError, PipeError};
use crate::observe::FilterObserver;
use crate::pipe::{Filter, Pipe, ProbeContext};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

/// The failure raised by mock filters.
#[derive(Debug, Error)]
#[error("intentional failure")]
pub struct IntentionalFailure;

/// A filter that counts its invocations and forwards.
#[derive(Debug, Default)]
pub struct CountingFilter {
    count: AtomicUsize,
}

impl CountingFilter {
    /// Creates a filter with a zeroed counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times the filter has been invoked.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<C: PipeContext> Filter<C> for CountingFilter {
    async fn send(&self, ctx: &C, next: &dyn Pipe<C>) -> Result<(), PipeError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        next.send(ctx).await
    }

    fn probe(&self, probe: &mut ProbeContext) {
        probe.add("filter", "counting");
    }
}

/// A filter that fails on chosen invocations with [`IntentionalFailure`].
#[derive(Debug)]
pub struct FlakyFilter {
    calls: AtomicUsize,
    fail_first: usize,
    fail_on: Option<usize>,
}

impl FlakyFilter {
    /// Fails the first `n` invocations, then succeeds.
    #[must_use]
    pub fn failing_first(n: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_first: n,
            fail_on: None,
        }
    }

    /// Fails exactly the `nth` invocation (1-based), succeeding otherwise.
    #[must_use]
    pub fn failing_on(nth: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_first: 0,
            fail_on: Some(nth),
        }
    }

    /// How many times the filter has been invoked.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<C: PipeContext> Filter<C> for FlakyFilter {
    async fn send(&self, ctx: &C, next: &dyn Pipe<C>) -> Result<(), PipeError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.fail_first || self.fail_on == Some(call) {
            return Err(PipeError::application(IntentionalFailure));
        }
        next.send(ctx).await
    }

    fn probe(&self, probe: &mut ProbeContext) {
        probe.add("filter", "flaky");
    }
}

/// An observer that counts pre, post, and fault callbacks.
#[derive(Debug, Default)]
pub struct CountingObserver {
    pre: AtomicUsize,
    post: AtomicUsize,
    fault: AtomicUsize,
}

impl CountingObserver {
    /// Creates an observer with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `pre_send` callbacks received.
    #[must_use]
    pub fn pre_count(&self) -> usize {
        self.pre.load(Ordering::SeqCst)
    }

    /// Number of `post_send` callbacks received.
    #[must_use]
    pub fn post_count(&self) -> usize {
        self.post.load(Ordering::SeqCst)
    }

    /// Number of `send_fault` callbacks received.
    #[must_use]
    pub fn fault_count(&self) -> usize {
        self.fault.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<C: PipeContext> FilterObserver<C> for CountingObserver {
    async fn pre_send(&self, _ctx: &C) -> Result<(), BoxError> {
        self.pre.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn post_send(&self, _ctx: &C) -> Result<(), BoxError> {
        self.post.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send_fault(&self, _ctx: &C, _error: &PipeError) -> Result<(), BoxError> {
        self.fault.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::BasicPipeContext;
    use crate::pipe::PipeBuilder;

    #[tokio::test]
    async fn test_flaky_fails_first_then_succeeds() {
        let pipe = PipeBuilder::<BasicPipeContext>::new()
            .filter(FlakyFilter::failing_first(2))
            .build()
            .unwrap();

        let ctx = BasicPipeContext::default();
        assert!(pipe.send(&ctx).await.is_err());
        assert!(pipe.send(&ctx).await.is_err());
        assert!(pipe.send(&ctx).await.is_ok());
    }

    #[tokio::test]
    async fn test_flaky_fails_on_nth() {
        let pipe = PipeBuilder::<BasicPipeContext>::new()
            .filter(FlakyFilter::failing_on(2))
            .build()
            .unwrap();

        let ctx = BasicPipeContext::default();
        assert!(pipe.send(&ctx).await.is_ok());
        assert!(pipe.send(&ctx).await.is_err());
        assert!(pipe.send(&ctx).await.is_ok());
    }

    #[tokio::test]
    async fn test_counting_filter() {
        let filter = std::sync::Arc::new(CountingFilter::new());
        let pipe = PipeBuilder::<BasicPipeContext>::new()
            .add(crate::pipe::FilterSpecification::new(filter.clone()))
            .build()
            .unwrap();

        let ctx = BasicPipeContext::default();
        pipe.send(&ctx).await.unwrap();
        pipe.send(&ctx).await.unwrap();

        assert_eq!(filter.count(), 2);
        assert_eq!(pipe.probe_tree()["filters"]["filter"], "counting");
    }
}
