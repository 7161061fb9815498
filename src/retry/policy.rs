//! Retry policies: attempt budgets and delay schedules.

use super::{ErrorFilter, RetryContext};
use crate::errors::PipeError;
use crate::pipe::ProbeContext;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// The delay schedule of a retry policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum RetryKind {
    /// Never retries.
    #[default]
    None,
    /// Up to `limit` retries with zero delay.
    Immediate {
        /// Maximum number of retries.
        limit: usize,
    },
    /// One retry per interval, delayed by that interval.
    Interval {
        /// The per-attempt delays; the limit is the list length.
        intervals: Vec<Duration>,
    },
    /// Delay grows by a fixed step each attempt.
    Incremental {
        /// Maximum number of retries.
        limit: usize,
        /// Delay before the first retry.
        initial: Duration,
        /// Added to the delay on every further attempt.
        step: Duration,
    },
    /// Delay doubles in (2^n − 1) steps of `delta`, clamped to [min, max].
    Exponential {
        /// Maximum number of retries.
        limit: usize,
        /// Lower delay bound.
        min: Duration,
        /// Upper delay bound.
        max: Duration,
        /// The doubling unit.
        delta: Duration,
    },
}

impl RetryKind {
    /// The maximum number of retries this schedule permits.
    #[must_use]
    pub fn limit(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Immediate { limit }
            | Self::Incremental { limit, .. }
            | Self::Exponential { limit, .. } => *limit,
            Self::Interval { intervals } => intervals.len(),
        }
    }

    /// The delay before retry number `attempt` (0-based).
    ///
    /// All arithmetic saturates; the exponential schedule clamps into its
    /// [min, max] band.
    #[must_use]
    pub fn delay(&self, attempt: usize) -> Duration {
        match self {
            Self::None | Self::Immediate { .. } => Duration::ZERO,
            Self::Interval { intervals } => intervals
                .get(attempt)
                .or_else(|| intervals.last())
                .copied()
                .unwrap_or(Duration::ZERO),
            Self::Incremental { initial, step, .. } => {
                let factor = u32::try_from(attempt).unwrap_or(u32::MAX);
                initial.saturating_add(step.saturating_mul(factor))
            }
            Self::Exponential { min, max, delta, .. } => {
                let factor = if attempt >= 32 {
                    u32::MAX
                } else {
                    // 2^attempt − 1 fits in u64 for attempt < 32
                    u32::try_from((1_u64 << attempt) - 1).unwrap_or(u32::MAX)
                };
                delta.saturating_mul(factor).min(*max).max(*min)
            }
        }
    }

    /// The diagnostic name of this schedule.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Immediate { .. } => "Immediate",
            Self::Interval { .. } => "Interval",
            Self::Incremental { .. } => "Incremental",
            Self::Exponential { .. } => "Exponential",
        }
    }
}

/// A retry policy: a delay schedule plus the exception filter deciding
/// which failures are retryable.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    kind: Arc<RetryKind>,
    filter: ErrorFilter,
}

impl RetryPolicy {
    /// Creates a policy from a schedule and a filter.
    #[must_use]
    pub fn new(kind: RetryKind, filter: ErrorFilter) -> Self {
        Self {
            kind: Arc::new(kind),
            filter,
        }
    }

    /// The never-retry policy.
    #[must_use]
    pub fn none() -> Self {
        Self::new(RetryKind::None, ErrorFilter::All)
    }

    /// Immediate retries, matching every failure.
    #[must_use]
    pub fn immediate(limit: usize) -> Self {
        Self::new(RetryKind::Immediate { limit }, ErrorFilter::All)
    }

    /// Interval retries, matching every failure.
    #[must_use]
    pub fn interval(intervals: Vec<Duration>) -> Self {
        Self::new(RetryKind::Interval { intervals }, ErrorFilter::All)
    }

    /// Incremental retries, matching every failure.
    #[must_use]
    pub fn incremental(limit: usize, initial: Duration, step: Duration) -> Self {
        Self::new(RetryKind::Incremental { limit, initial, step }, ErrorFilter::All)
    }

    /// Exponential retries, matching every failure.
    #[must_use]
    pub fn exponential(limit: usize, min: Duration, max: Duration, delta: Duration) -> Self {
        Self::new(
            RetryKind::Exponential { limit, min, max, delta },
            ErrorFilter::All,
        )
    }

    /// Replaces the exception filter.
    #[must_use]
    pub fn with_filter(mut self, filter: ErrorFilter) -> Self {
        self.filter = filter;
        self
    }

    /// The maximum number of retries.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.kind.limit()
    }

    /// The delay before retry number `attempt`.
    #[must_use]
    pub fn delay(&self, attempt: usize) -> Duration {
        self.kind.delay(attempt)
    }

    /// The exception filter held by this policy.
    #[must_use]
    pub fn filter(&self) -> &ErrorFilter {
        &self.filter
    }

    /// Classifies the first failure of a send.
    ///
    /// Returns the attempt-0 retry context when the failure is a pipeline
    /// fault matched by the filter and the schedule permits retries at
    /// all; `None` means the caller rethrows the original error.
    #[must_use]
    pub fn on_failure(&self, error: &PipeError) -> Option<RetryContext> {
        if matches!(*self.kind, RetryKind::None) {
            return None;
        }
        let PipeError::Pipeline(source) = error else {
            return None;
        };
        if !self.filter.matches(&**source) {
            return None;
        }
        Some(RetryContext::initial(self.kind.clone(), source.clone()))
    }

    /// Contributes `{ policy, limit, … }` diagnostic metadata.
    pub fn probe(&self, probe: &mut ProbeContext) {
        probe.add("policy", self.kind.name());
        probe.add("limit", self.kind.limit() as u64);
        probe.add("exception_filter", self.filter.describe());

        match &*self.kind {
            RetryKind::None | RetryKind::Immediate { .. } => {}
            RetryKind::Interval { intervals } => {
                let ms: Vec<u64> = intervals.iter().map(|d| d.as_millis() as u64).collect();
                probe.add("intervals_ms", ms);
            }
            RetryKind::Incremental { initial, step, .. } => {
                probe.add("initial_ms", initial.as_millis() as u64);
                probe.add("step_ms", step.as_millis() as u64);
            }
            RetryKind::Exponential { min, max, delta, .. } => {
                probe.add("min_ms", min.as_millis() as u64);
                probe.add("max_ms", max.as_millis() as u64);
                probe.add("delta_ms", delta.as_millis() as u64);
            }
        }
    }
}
