//! Error types for the pipeflow framework.
//!
//! Every subsystem reports failures through [`PipeError`]; the per-kind
//! payloads live in their own structs so callers can match on exactly the
//! information they need.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A shareable, type-erased error cause.
///
/// Errors recorded across retry attempts and lifecycle latches are observed
/// by multiple parties, so causes are reference-counted rather than boxed.
pub type DynError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// An owned, type-erased error, used at API boundaries that accept failures
/// from user code (payload factories, context factories).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for pipeflow send operations.
#[derive(Debug, Clone, Error)]
pub enum PipeError {
    /// A downstream filter failed. This is the only kind the retry filter
    /// will consider for reattempts.
    #[error("pipeline fault: {0}")]
    Pipeline(DynError),

    /// The send was cancelled through its cancellation token.
    #[error("send cancelled: {0}")]
    Cancelled(String),

    /// A retry policy ran out of attempts.
    #[error(transparent)]
    RetryExhausted(#[from] RetryExhausted),

    /// A payload bag operation failed.
    #[error(transparent)]
    Payload(#[from] PayloadError),

    /// Pipe construction failed validation.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// An agent or supervisor lifecycle latch resolved unsuccessfully.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// The filter itself succeeded but one or more observers faulted.
    #[error("observer fault: {0}")]
    Observers(AggregateError),
}

impl PipeError {
    /// Wraps an application-level failure raised by a filter.
    pub fn application(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Pipeline(Arc::new(err))
    }

    /// Returns the application-level cause when this is a pipeline fault.
    #[must_use]
    pub fn application_source(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Pipeline(source) => Some(&**source),
            _ => None,
        }
    }

    /// Returns true if this error is a cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

/// Error raised when a retry policy runs out of attempts.
///
/// `source_error` is the most recent failure; `prior` holds the earlier
/// failures oldest-first, so `prior.len()` equals the number of retries
/// that were attempted.
#[derive(Debug, Clone, Error)]
#[error("retry exhausted after {attempts} attempt(s): {source_error}")]
pub struct RetryExhausted {
    /// Number of retry attempts that were made.
    pub attempts: usize,
    /// The failure that ended the retry loop.
    pub source_error: DynError,
    /// Failures from earlier attempts, oldest first.
    pub prior: Vec<DynError>,
}

/// Errors raised by payload bag operations.
#[derive(Debug, Clone, Error)]
pub enum PayloadError {
    /// A payload value factory failed.
    #[error("payload factory failed for {type_name}: {cause}")]
    Factory {
        /// The payload type whose factory was invoked.
        type_name: &'static str,
        /// The underlying cause.
        cause: DynError,
    },
}

/// Errors surfaced by lifecycle latches.
#[derive(Debug, Clone, Error)]
pub enum LifecycleError {
    /// The latch resolved as faulted.
    #[error("lifecycle faulted: {0}")]
    Faulted(DynError),

    /// The latch was cancelled, typically because the owner stopped.
    #[error("lifecycle cancelled: {0}")]
    Cancelled(String),

    /// One or more lifecycles in a supervision tree faulted.
    #[error("child lifecycle fault: {0}")]
    ChildFaulted(AggregateError),
}

/// Severity of a pipe specification issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueSeverity {
    /// Advisory only; the build proceeds.
    Warning,
    /// The build is aborted.
    Failure,
}

/// A single finding reported by a pipe specification during validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecificationIssue {
    /// How serious the issue is.
    pub severity: IssueSeverity,
    /// The configuration scope the issue belongs to, if any.
    pub scope: Option<String>,
    /// Human-readable description.
    pub message: String,
}

impl SpecificationIssue {
    /// Creates a warning-severity issue.
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Warning,
            scope: None,
            message: message.into(),
        }
    }

    /// Creates a failure-severity issue.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Failure,
            scope: None,
            message: message.into(),
        }
    }

    /// Attaches a configuration scope to the issue.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Returns true if this issue aborts the build.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.severity == IssueSeverity::Failure
    }
}

impl fmt::Display for SpecificationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            IssueSeverity::Warning => "warning",
            IssueSeverity::Failure => "failure",
        };
        match &self.scope {
            Some(scope) => write!(f, "{label} [{scope}]: {}", self.message),
            None => write!(f, "{label}: {}", self.message),
        }
    }
}

/// Error raised when building a pipe fails validation.
///
/// Carries every issue the specifications reported, not just the failures.
#[derive(Debug, Clone)]
pub struct ConfigurationError {
    /// All issues reported during validation.
    pub issues: Vec<SpecificationIssue>,
}

impl ConfigurationError {
    /// Creates a configuration error from the reported issues.
    #[must_use]
    pub fn new(issues: Vec<SpecificationIssue>) -> Self {
        Self { issues }
    }

    /// Returns only the failure-severity issues.
    #[must_use]
    pub fn failures(&self) -> Vec<&SpecificationIssue> {
        self.issues.iter().filter(|i| i.is_failure()).collect()
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pipe configuration invalid ({} issue(s))", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "; {issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigurationError {}

/// A collection of failures that occurred during one broadcast or drain.
///
/// Used wherever every participant must run regardless of individual
/// failures: registry broadcasts, observer dispatch, child lifecycles.
#[derive(Debug, Clone, Default)]
pub struct AggregateError {
    /// The individual causes, in the order they were observed.
    pub causes: Vec<DynError>,
}

impl AggregateError {
    /// Creates an aggregate from the collected causes.
    #[must_use]
    pub fn new(causes: Vec<DynError>) -> Self {
        Self { causes }
    }

    /// Returns true if no causes were collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.causes.is_empty()
    }

    /// Returns the number of causes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.causes.len()
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failure(s)", self.causes.len())?;
        for cause in &self.causes {
            write!(f, "; {cause}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn test_application_source() {
        let err = PipeError::application(Boom);
        assert!(err.application_source().is_some());
        assert!(!err.is_cancelled());

        let cancelled = PipeError::Cancelled("stop".to_string());
        assert!(cancelled.application_source().is_none());
        assert!(cancelled.is_cancelled());
    }

    #[test]
    fn test_retry_exhausted_display() {
        let err = RetryExhausted {
            attempts: 3,
            source_error: Arc::new(Boom),
            prior: vec![Arc::new(Boom), Arc::new(Boom)],
        };
        let rendered = err.to_string();
        assert!(rendered.contains("3 attempt(s)"));
        assert!(rendered.contains("boom"));
    }

    #[test]
    fn test_specification_issue_display() {
        let warning = SpecificationIssue::warning("interval list is empty");
        assert!(warning.to_string().starts_with("warning:"));
        assert!(!warning.is_failure());

        let failure = SpecificationIssue::failure("limit must be positive").with_scope("retry");
        assert_eq!(failure.to_string(), "failure [retry]: limit must be positive");
        assert!(failure.is_failure());
    }

    #[test]
    fn test_configuration_error_filters_failures() {
        let err = ConfigurationError::new(vec![
            SpecificationIssue::warning("w"),
            SpecificationIssue::failure("f"),
        ]);
        assert_eq!(err.failures().len(), 1);
        assert!(err.to_string().contains("2 issue(s)"));
    }

    #[test]
    fn test_aggregate_error_display() {
        let agg = AggregateError::new(vec![Arc::new(Boom), Arc::new(Boom)]);
        assert_eq!(agg.len(), 2);
        assert!(agg.to_string().starts_with("2 failure(s)"));
    }
}
