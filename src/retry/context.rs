//! Per-attempt retry snapshots.

use super::RetryKind;
use crate::errors::DynError;
use std::sync::Arc;
use std::time::Duration;

/// An immutable snapshot of one retry attempt.
///
/// Each failed attempt yields the next context through
/// [`RetryContext::next`]; the attempt index is monotonically
/// non-decreasing across one send and `prior().len()` always equals
/// [`RetryContext::attempt`].
#[derive(Debug, Clone)]
pub struct RetryContext {
    kind: Arc<RetryKind>,
    attempt: usize,
    error: DynError,
    prior: Vec<DynError>,
}

impl RetryContext {
    pub(crate) fn initial(kind: Arc<RetryKind>, error: DynError) -> Self {
        Self {
            kind,
            attempt: 0,
            error,
            prior: Vec::new(),
        }
    }

    /// The 0-based retry attempt this context describes.
    #[must_use]
    pub fn attempt(&self) -> usize {
        self.attempt
    }

    /// The delay to observe before this attempt.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.kind.delay(self.attempt)
    }

    /// The failure that produced this context.
    #[must_use]
    pub fn error(&self) -> &DynError {
        &self.error
    }

    /// Failures from earlier attempts, oldest first.
    #[must_use]
    pub fn prior(&self) -> &[DynError] {
        &self.prior
    }

    /// Whether the policy permits this attempt.
    #[must_use]
    pub fn can_retry(&self) -> bool {
        self.attempt < self.kind.limit()
    }

    /// Produces the context for the following attempt.
    ///
    /// The current error joins the prior list and the delay is recomputed
    /// for the incremented attempt index.
    #[must_use]
    pub fn next(&self, error: DynError) -> Self {
        let mut prior = self.prior.clone();
        prior.push(self.error.clone());
        Self {
            kind: self.kind.clone(),
            attempt: self.attempt + 1,
            error,
            prior,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("attempt {0}")]
    struct Numbered(usize);

    fn cause(n: usize) -> DynError {
        Arc::new(Numbered(n))
    }

    fn interval_kind() -> Arc<RetryKind> {
        Arc::new(RetryKind::Interval {
            intervals: vec![
                Duration::from_millis(10),
                Duration::from_millis(20),
                Duration::from_millis(30),
            ],
        })
    }

    #[test]
    fn test_initial_context() {
        let ctx = RetryContext::initial(interval_kind(), cause(0));

        assert_eq!(ctx.attempt(), 0);
        assert!(ctx.prior().is_empty());
        assert_eq!(ctx.delay(), Duration::from_millis(10));
        assert!(ctx.can_retry());
    }

    #[test]
    fn test_next_advances_attempt_and_prior() {
        let ctx0 = RetryContext::initial(interval_kind(), cause(0));
        let ctx1 = ctx0.next(cause(1));
        let ctx2 = ctx1.next(cause(2));

        assert_eq!(ctx1.attempt(), 1);
        assert_eq!(ctx1.prior().len(), 1);
        assert_eq!(ctx1.delay(), Duration::from_millis(20));

        assert_eq!(ctx2.attempt(), 2);
        assert_eq!(ctx2.prior().len(), 2);
        assert_eq!(ctx2.prior()[0].to_string(), "attempt 0");
        assert_eq!(ctx2.prior()[1].to_string(), "attempt 1");
        assert_eq!(ctx2.error().to_string(), "attempt 2");
    }

    #[test]
    fn test_prior_length_equals_attempt() {
        let mut ctx = RetryContext::initial(interval_kind(), cause(0));
        for n in 1..=5 {
            ctx = ctx.next(cause(n));
            assert_eq!(ctx.prior().len(), ctx.attempt());
        }
    }

    #[test]
    fn test_can_retry_bounds() {
        let ctx0 = RetryContext::initial(interval_kind(), cause(0));
        let ctx3 = ctx0.next(cause(1)).next(cause(2)).next(cause(3));

        assert!(ctx0.can_retry());
        assert_eq!(ctx3.attempt(), 3);
        assert!(!ctx3.can_retry());
    }
}
