//! # Pipeflow
//!
//! A middleware pipeline framework: typed contexts flow through ordered
//! filter chains with retry, observation, and supervised context caching
//! layered around the business payload.
//!
//! Pipeflow provides:
//!
//! - **Pipe/filter composition**: specifications build immutable filter
//!   chains; observers attach non-intrusively; probes expose structure
//! - **Retry**: immediate, interval, incremental, and exponential
//!   policies with composable exception classification
//! - **Agent lifecycles**: Ready/Stopped/Completed latches with
//!   hierarchical supervision
//! - **Context caching**: a supervisor that lazily creates, multiplexes,
//!   invalidates, and disposes long-lived pipe contexts
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pipeflow::prelude::*;
//!
//! // Build a pipe with retry around the work filter
//! let pipe = PipeBuilder::new()
//!     .retry(|r| { r.interval(3, Duration::from_millis(100)); })
//!     .filter(work_filter)
//!     .build()?;
//!
//! // Send a context through it
//! pipe.send(&ctx).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod agent;
pub mod cache;
pub mod cancellation;
pub mod context;
pub mod errors;
pub mod observe;
pub mod pipe;
pub mod registry;
pub mod retry;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::agent::{Agent, EventLatch, Supervised, Supervisor, SupervisorPhase};
    pub use crate::cache::{ContextFactory, ContextHandle, ContextSupervisor, InvalidationToken};
    pub use crate::cancellation::CancellationToken;
    pub use crate::context::{BasicPipeContext, PayloadBag, PipeContext};
    pub use crate::errors::{
        AggregateError, BoxError, ConfigurationError, DynError, IssueSeverity, LifecycleError,
        PayloadError, PipeError, RetryExhausted, SpecificationIssue,
    };
    pub use crate::observe::{FilterObserver, ObserverSet};
    pub use crate::pipe::{
        BuiltPipe, Filter, FilterFuture, FilterSpecification, InlineFilter, Pipe, PipeAssembly,
        PipeBuilder, PipeSpecification, ProbeContext,
    };
    pub use crate::registry::{ConnectHandle, Connectable};
    pub use crate::retry::{
        ErrorFilter, ErrorPredicate, ErrorTypeMatcher, RetryConfigurator, RetryContext,
        RetryFilter, RetryKind, RetryPolicy,
    };
}

#[cfg(test)]
mod integration_tests;
