//! The factory interface consumed by the context supervisor.

use super::InvalidationToken;
use crate::cancellation::CancellationToken;
use crate::context::PipeContext;
use crate::errors::BoxError;
use async_trait::async_trait;
use std::sync::Arc;

/// Produces shared contexts and their per-send active wrappers.
///
/// The supervisor hands `create_context` the invalidation token it will
/// watch; the factory stores the token wherever the context can reach it
/// to signal that it must be replaced. `create_active_context` wraps the
/// shared context for the duration of exactly one send, carrying the
/// send-scoped cancellation token.
#[async_trait]
pub trait ContextFactory<C: PipeContext>: Send + Sync {
    /// Creates a fresh shared context.
    async fn create_context(&self, invalidation: InvalidationToken) -> Result<C, BoxError>;

    /// Wraps the shared context for one send.
    async fn create_active_context(
        &self,
        shared: Arc<C>,
        cancellation: CancellationToken,
    ) -> Result<C, BoxError>;
}
