//! Testing utilities for pipeflow pipelines.
//!
//! This module provides:
//! - Mock filters and observers with invocation counters
//! - A cached-context fixture and factory for exercising the context
//!   supervisor

mod fixtures;
mod mocks;

pub use fixtures::{CachedTestContext, SequentialContextFactory};
pub use mocks::{CountingFilter, CountingObserver, FlakyFilter, IntentionalFailure};
