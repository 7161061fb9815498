//! The retry filter: re-invokes the downstream pipe until success,
//! exhaustion, or cancellation.

use super::RetryPolicy;
use crate::context::PipeContext;
use crate::errors::{PipeError, RetryExhausted};
use crate::pipe::{Filter, Pipe, ProbeContext};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Applies a [`RetryPolicy`] around the remainder of the pipe.
///
/// The only component that catches and suppresses downstream failures;
/// everything it cannot retry is rethrown untouched.
pub struct RetryFilter {
    policy: Arc<RetryPolicy>,
}

impl RetryFilter {
    /// Creates a retry filter from a policy.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }

    /// The policy this filter applies.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<C: PipeContext> Filter<C> for RetryFilter {
    async fn send(&self, ctx: &C, next: &dyn Pipe<C>) -> Result<(), PipeError> {
        let first = match next.send(ctx).await {
            Ok(()) => return Ok(()),
            Err(error) => error,
        };

        if ctx.cancellation().is_cancelled() {
            return Err(first);
        }
        let Some(mut retry_ctx) = self.policy.on_failure(&first) else {
            return Err(first);
        };

        loop {
            if !retry_ctx.can_retry() {
                return Err(RetryExhausted {
                    attempts: retry_ctx.attempt(),
                    source_error: retry_ctx.error().clone(),
                    prior: retry_ctx.prior().to_vec(),
                }
                .into());
            }

            let delay = retry_ctx.delay();
            debug!(
                attempt = retry_ctx.attempt(),
                delay_ms = delay.as_millis() as u64,
                error = %retry_ctx.error(),
                "retrying after failure"
            );

            let token = ctx.cancellation();
            tokio::select! {
                () = token.cancelled() => {
                    return Err(PipeError::Cancelled(
                        token.reason().unwrap_or_else(|| "cancelled during retry delay".to_string()),
                    ));
                }
                () = tokio::time::sleep(delay) => {}
            }

            match next.send(ctx).await {
                Ok(()) => return Ok(()),
                Err(error) => {
                    if error.is_cancelled() {
                        return Err(error);
                    }
                    let PipeError::Pipeline(source) = &error else {
                        return Err(error);
                    };
                    if !self.policy.filter().matches(&**source) {
                        return Err(error);
                    }
                    retry_ctx = retry_ctx.next(source.clone());
                }
            }
        }
    }

    fn probe(&self, probe: &mut ProbeContext) {
        probe.add("filter", "retry");
        probe.section("retry_policy", |p| self.policy.probe(p));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;
    use crate::context::BasicPipeContext;
    use crate::pipe::{InlineFilter, PipeBuilder};
    use crate::retry::{ErrorFilter, ErrorTypeMatcher};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("transient")]
    struct Transient;

    #[derive(Debug, Error)]
    #[error("fatal")]
    struct Fatal;

    fn failing_pipe(
        policy: RetryPolicy,
        failures: usize,
        attempts: Arc<AtomicUsize>,
    ) -> crate::pipe::BuiltPipe<BasicPipeContext> {
        PipeBuilder::<BasicPipeContext>::new()
            .add(crate::pipe::FilterSpecification::new(Arc::new(RetryFilter::new(policy))))
            .filter(InlineFilter::new("flaky", move |_ctx| {
                let attempts = attempts.clone();
                Box::pin(async move {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    if n < failures {
                        Err(PipeError::application(Transient))
                    } else {
                        Ok(())
                    }
                })
            }))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_success_needs_no_retry() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let pipe = failing_pipe(RetryPolicy::immediate(3), 0, attempts.clone());

        pipe.send(&BasicPipeContext::default()).await.unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let pipe = failing_pipe(RetryPolicy::immediate(5), 2, attempts.clone());

        pipe.send(&BasicPipeContext::default()).await.unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_raises_composite() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let pipe = failing_pipe(RetryPolicy::immediate(2), usize::MAX, attempts.clone());

        let err = pipe.send(&BasicPipeContext::default()).await.unwrap_err();
        let PipeError::RetryExhausted(exhausted) = err else {
            panic!("expected retry exhausted, got {err}");
        };

        assert_eq!(exhausted.attempts, 2);
        assert_eq!(exhausted.prior.len(), 2);
        // 1 initial call + 2 retries
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unmatched_error_rethrown_without_retry() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();
        let policy = RetryPolicy::immediate(3)
            .with_filter(ErrorFilter::selected(vec![ErrorTypeMatcher::of::<Transient>()]));

        let pipe = PipeBuilder::<BasicPipeContext>::new()
            .add(crate::pipe::FilterSpecification::new(Arc::new(RetryFilter::new(policy))))
            .filter(InlineFilter::new("fatal", move |_ctx| {
                let attempts = attempts_clone.clone();
                Box::pin(async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(PipeError::application(Fatal))
                })
            }))
            .build()
            .unwrap();

        let err = pipe.send(&BasicPipeContext::default()).await.unwrap_err();

        assert!(err.application_source().unwrap().downcast_ref::<Fatal>().is_some());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancellation_aborts_delay() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let pipe = failing_pipe(
            RetryPolicy::interval(vec![Duration::from_secs(30)]),
            usize::MAX,
            attempts.clone(),
        );

        let token = CancellationToken::new();
        let ctx = BasicPipeContext::new(token.clone());

        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel("shutting down");
        });

        let started = std::time::Instant::now();
        let err = pipe.send(&ctx).await.unwrap_err();

        assert!(err.is_cancelled());
        // The 30s delay was abandoned early
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_probe_exposes_policy() {
        let pipe = PipeBuilder::<BasicPipeContext>::new()
            .add(crate::pipe::FilterSpecification::new(Arc::new(RetryFilter::new(
                RetryPolicy::immediate(4),
            ))))
            .build()
            .unwrap();

        let tree = pipe.probe_tree();
        assert_eq!(tree["filters"]["filter"], "retry");
        assert_eq!(tree["filters"]["retry_policy"]["policy"], "Immediate");
        assert_eq!(tree["filters"]["retry_policy"]["limit"], 4);
    }
}
