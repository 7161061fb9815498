//! Pipe specifications: build-time fragments that contribute filters.

use super::Filter;
use crate::context::PipeContext;
use crate::errors::SpecificationIssue;
use std::sync::Arc;

/// The mutable filter sequence a specification applies itself to.
///
/// Specifications may contribute zero or more filters at either end of the
/// sequence; the builder compiles the final order into the linked chain.
pub struct PipeAssembly<C: PipeContext> {
    filters: Vec<Arc<dyn Filter<C>>>,
}

impl<C: PipeContext> PipeAssembly<C> {
    /// Creates an empty assembly.
    #[must_use]
    pub fn new() -> Self {
        Self { filters: Vec::new() }
    }

    /// Appends a filter to the end of the sequence.
    pub fn append(&mut self, filter: Arc<dyn Filter<C>>) {
        self.filters.push(filter);
    }

    /// Prepends a filter to the front of the sequence.
    pub fn prepend(&mut self, filter: Arc<dyn Filter<C>>) {
        self.filters.insert(0, filter);
    }

    /// Returns the number of filters contributed so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Returns true if no filters have been contributed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub(crate) fn into_filters(self) -> Vec<Arc<dyn Filter<C>>> {
        self.filters
    }
}

impl<C: PipeContext> Default for PipeAssembly<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// A build-time fragment contributing filters to a pipe.
///
/// Specifications validate before any filter is applied; a
/// failure-severity issue from any specification aborts the build.
pub trait PipeSpecification<C: PipeContext>: Send + Sync {
    /// Reports issues with this specification's configuration.
    fn validate(&self) -> Vec<SpecificationIssue> {
        Vec::new()
    }

    /// Applies this specification's filters to the assembly.
    fn apply(&self, assembly: &mut PipeAssembly<C>);
}

/// The simplest specification: appends one pre-built filter.
pub struct FilterSpecification<C: PipeContext> {
    filter: Arc<dyn Filter<C>>,
}

impl<C: PipeContext> FilterSpecification<C> {
    /// Wraps a filter as a specification.
    #[must_use]
    pub fn new(filter: Arc<dyn Filter<C>>) -> Self {
        Self { filter }
    }
}

impl<C: PipeContext> PipeSpecification<C> for FilterSpecification<C> {
    fn apply(&self, assembly: &mut PipeAssembly<C>) {
        assembly.append(self.filter.clone());
    }
}
