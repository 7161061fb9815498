//! Pipe builder with up-front specification validation.

use super::chain::{BuiltPipe, EndPipe, FilterNode};
use super::{Filter, FilterSpecification, PipeAssembly, PipeSpecification};
use crate::context::PipeContext;
use crate::errors::ConfigurationError;
use crate::observe::ObserverSet;
use std::sync::Arc;
use tracing::warn;

/// Builder assembling an immutable pipe from specifications.
///
/// Specifications are validated together before any of them applies a
/// filter, so a build either produces a complete pipe or fails with every
/// reported issue.
pub struct PipeBuilder<C: PipeContext> {
    specs: Vec<Arc<dyn PipeSpecification<C>>>,
}

impl<C: PipeContext> PipeBuilder<C> {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self { specs: Vec::new() }
    }

    /// Adds a specification.
    #[must_use]
    pub fn add(mut self, spec: impl PipeSpecification<C> + 'static) -> Self {
        self.specs.push(Arc::new(spec));
        self
    }

    /// Adds a single filter (shorthand for a [`FilterSpecification`]).
    #[must_use]
    pub fn filter(self, filter: impl Filter<C> + 'static) -> Self {
        self.add(FilterSpecification::new(Arc::new(filter)))
    }

    /// Returns the number of specifications added so far.
    #[must_use]
    pub fn spec_count(&self) -> usize {
        self.specs.len()
    }

    /// Validates every specification and compiles the pipe.
    ///
    /// Warnings are logged; any failure-severity issue aborts the build.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] aggregating all reported issues
    /// when at least one specification fails validation.
    pub fn build(self) -> Result<BuiltPipe<C>, ConfigurationError> {
        let issues: Vec<_> = self.specs.iter().flat_map(|s| s.validate()).collect();

        for issue in issues.iter().filter(|i| !i.is_failure()) {
            warn!(%issue, "pipe specification warning");
        }
        if issues.iter().any(|i| i.is_failure()) {
            return Err(ConfigurationError::new(issues));
        }

        let mut assembly = PipeAssembly::new();
        for spec in &self.specs {
            spec.apply(&mut assembly);
        }

        let observers = Arc::new(ObserverSet::new());
        let mut head: Arc<dyn super::Pipe<C>> = Arc::new(EndPipe);
        for filter in assembly.into_filters().into_iter().rev() {
            head = Arc::new(FilterNode::new(filter, head, observers.clone()));
        }

        Ok(BuiltPipe::new(head, observers))
    }
}

impl<C: PipeContext> Default for PipeBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}
