//! The pipe/filter execution model.
//!
//! Contexts flow through an ordered chain of filters compiled by
//! [`PipeBuilder`] from [`PipeSpecification`] fragments. Observers attach
//! non-intrusively to a [`BuiltPipe`]; diagnostics are collected through
//! the probe surface.

mod builder;
mod chain;
mod filter;
mod probe;
mod spec;

pub use builder::PipeBuilder;
pub use chain::{BuiltPipe, EndPipe, Pipe};
pub use filter::{Filter, FilterFuture, InlineFilter};
pub use probe::ProbeContext;
pub use spec::{FilterSpecification, PipeAssembly, PipeSpecification};
