//! Fluent configuration of retry behavior on a pipe.

use super::{ErrorFilter, ErrorPredicate, ErrorTypeMatcher, RetryFilter, RetryKind, RetryPolicy};
use crate::context::PipeContext;
use crate::errors::SpecificationIssue;
use crate::pipe::{PipeAssembly, PipeBuilder, PipeSpecification};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// Collects retry options before they become a validated [`RetryPolicy`].
///
/// Exactly one schedule option must be chosen; at most one exception
/// filter option may be. Integer-valued interval overloads interpret
/// their arguments as milliseconds.
#[derive(Debug, Clone, Default)]
pub struct RetryConfigurator {
    kind: Option<RetryKind>,
    selected: Vec<ErrorTypeMatcher>,
    except: Vec<ErrorTypeMatcher>,
    predicate: Option<ErrorPredicate>,
}

impl RetryConfigurator {
    /// Creates an unconfigured configurator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the never-retry policy.
    pub fn none(&mut self) -> &mut Self {
        self.kind = Some(RetryKind::None);
        self
    }

    /// Up to `limit` retries with zero delay.
    pub fn immediate(&mut self, limit: usize) -> &mut Self {
        self.kind = Some(RetryKind::Immediate { limit });
        self
    }

    /// One retry per listed interval.
    pub fn intervals(&mut self, intervals: impl IntoIterator<Item = Duration>) -> &mut Self {
        self.kind = Some(RetryKind::Interval {
            intervals: intervals.into_iter().collect(),
        });
        self
    }

    /// `count` retries, each delayed by `interval`.
    pub fn interval(&mut self, count: usize, interval: Duration) -> &mut Self {
        self.intervals(std::iter::repeat(interval).take(count))
    }

    /// One retry per listed interval, in milliseconds.
    pub fn intervals_ms(&mut self, intervals_ms: impl IntoIterator<Item = u64>) -> &mut Self {
        self.intervals(intervals_ms.into_iter().map(Duration::from_millis))
    }

    /// `count` retries, each delayed by `interval_ms` milliseconds.
    pub fn interval_ms(&mut self, count: usize, interval_ms: u64) -> &mut Self {
        self.interval(count, Duration::from_millis(interval_ms))
    }

    /// Delay grows from `initial` by `step` per attempt, `limit` times.
    pub fn incremental(&mut self, limit: usize, initial: Duration, step: Duration) -> &mut Self {
        self.kind = Some(RetryKind::Incremental { limit, initial, step });
        self
    }

    /// Exponential delays clamped to [min, max], `limit` times.
    pub fn exponential(
        &mut self,
        limit: usize,
        min: Duration,
        max: Duration,
        delta: Duration,
    ) -> &mut Self {
        self.kind = Some(RetryKind::Exponential { limit, min, max, delta });
        self
    }

    /// Every failure is retryable (the default).
    pub fn all(&mut self) -> &mut Self {
        self.selected.clear();
        self.except.clear();
        self.predicate = None;
        self
    }

    /// Only failures of type `E` are retryable; callable repeatedly to
    /// widen the set.
    pub fn selected<E: std::error::Error + Send + Sync + 'static>(&mut self) -> &mut Self {
        self.selected.push(ErrorTypeMatcher::of::<E>());
        self
    }

    /// Failures of type `E` are not retryable; callable repeatedly to
    /// widen the set.
    pub fn except<E: std::error::Error + Send + Sync + 'static>(&mut self) -> &mut Self {
        self.except.push(ErrorTypeMatcher::of::<E>());
        self
    }

    /// A typed predicate over `E` decides retryability.
    pub fn filter<E, P>(&mut self, predicate: P) -> &mut Self
    where
        E: std::error::Error + Send + Sync + 'static,
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(ErrorPredicate::of(predicate));
        self
    }

    /// Reports configuration issues.
    #[must_use]
    pub fn validate(&self) -> Vec<SpecificationIssue> {
        let mut issues = Vec::new();

        match &self.kind {
            None => issues.push(
                SpecificationIssue::failure(
                    "no retry schedule configured; choose none/immediate/intervals/incremental/exponential",
                )
                .with_scope("retry"),
            ),
            Some(RetryKind::Interval { intervals }) if intervals.is_empty() => issues.push(
                SpecificationIssue::failure("interval retry requires at least one interval")
                    .with_scope("retry"),
            ),
            Some(RetryKind::Exponential { min, max, .. }) if min > max => issues.push(
                SpecificationIssue::failure("exponential retry requires min <= max")
                    .with_scope("retry"),
            ),
            Some(RetryKind::Immediate { limit: 0 })
            | Some(RetryKind::Incremental { limit: 0, .. })
            | Some(RetryKind::Exponential { limit: 0, .. }) => issues.push(
                SpecificationIssue::warning("a retry limit of zero never retries")
                    .with_scope("retry"),
            ),
            Some(_) => {}
        }

        let filter_options = usize::from(!self.selected.is_empty())
            + usize::from(!self.except.is_empty())
            + usize::from(self.predicate.is_some());
        if filter_options > 1 {
            issues.push(
                SpecificationIssue::failure(
                    "selected, except, and filter are mutually exclusive",
                )
                .with_scope("retry"),
            );
        }

        issues
    }

    fn error_filter(&self) -> ErrorFilter {
        if let Some(predicate) = &self.predicate {
            ErrorFilter::Predicate(predicate.clone())
        } else if !self.selected.is_empty() {
            ErrorFilter::Selected(self.selected.clone())
        } else if !self.except.is_empty() {
            ErrorFilter::Except(self.except.clone())
        } else {
            ErrorFilter::All
        }
    }

    /// Builds the configured policy.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.kind.clone().unwrap_or_default(), self.error_filter())
    }
}

/// A pipe specification installing a retry filter.
pub struct RetrySpecification<C: PipeContext> {
    configurator: RetryConfigurator,
    _context: PhantomData<fn(C)>,
}

impl<C: PipeContext> RetrySpecification<C> {
    /// Wraps a configurator as a specification.
    #[must_use]
    pub fn new(configurator: RetryConfigurator) -> Self {
        Self {
            configurator,
            _context: PhantomData,
        }
    }
}

impl<C: PipeContext> PipeSpecification<C> for RetrySpecification<C> {
    fn validate(&self) -> Vec<SpecificationIssue> {
        self.configurator.validate()
    }

    fn apply(&self, assembly: &mut PipeAssembly<C>) {
        assembly.append(Arc::new(RetryFilter::new(self.configurator.policy())));
    }
}

impl<C: PipeContext> PipeBuilder<C> {
    /// Adds a retry filter configured through the closure.
    ///
    /// ```rust,ignore
    /// let pipe = PipeBuilder::new()
    ///     .retry(|r| {
    ///         r.interval(3, Duration::from_millis(100)).selected::<IoFault>();
    ///     })
    ///     .filter(work)
    ///     .build()?;
    /// ```
    #[must_use]
    pub fn retry(self, configure: impl FnOnce(&mut RetryConfigurator)) -> Self {
        let mut configurator = RetryConfigurator::new();
        configure(&mut configurator);
        self.add(RetrySpecification::new(configurator))
    }
}
