//! Supervised caching of long-lived pipe contexts.
//!
//! A [`ContextSupervisor`] lazily creates one shared context through a
//! [`ContextFactory`], wraps it per send in an active context, and
//! replaces it when the context signals invalidation.

mod active;
mod factory;
mod handle;
mod invalidation;
mod supervisor;

pub use factory::ContextFactory;
pub use handle::ContextHandle;
pub use invalidation::InvalidationToken;
pub use supervisor::ContextSupervisor;
