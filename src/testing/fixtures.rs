//! Context fixtures for cache and pipeline tests.

use crate::cache::{ContextFactory, InvalidationToken};
use crate::cancellation::CancellationToken;
use crate::context::{PayloadBag, PipeContext};
use crate::errors::BoxError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A cacheable test context carrying a sequential string id.
///
/// Shared instances are produced by [`SequentialContextFactory`]; active
/// instances wrap a shared one, exposing the same id and invalidation
/// signal with a send-scoped cancellation token.
pub struct CachedTestContext {
    id: String,
    payloads: PayloadBag,
    cancellation: CancellationToken,
    invalidation: InvalidationToken,
    shared: Option<Arc<CachedTestContext>>,
}

impl CachedTestContext {
    /// The id of the underlying shared context ("1", "2", ...).
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Marks the underlying shared context invalid.
    pub fn invalidate(&self) {
        self.invalidation.invalidate();
    }

    /// Returns true for an active (per-send) instance.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.shared.is_some()
    }
}

impl PipeContext for CachedTestContext {
    fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    fn payloads(&self) -> &PayloadBag {
        match &self.shared {
            Some(shared) => shared.payloads(),
            None => &self.payloads,
        }
    }
}

/// A context factory yielding ids "1", "2", "3", ...
#[derive(Debug, Default)]
pub struct SequentialContextFactory {
    created: AtomicUsize,
}

impl SequentialContextFactory {
    /// Creates a factory starting at id "1".
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// How many shared contexts have been created.
    #[must_use]
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContextFactory<CachedTestContext> for SequentialContextFactory {
    async fn create_context(
        &self,
        invalidation: InvalidationToken,
    ) -> Result<CachedTestContext, BoxError> {
        let serial = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(CachedTestContext {
            id: serial.to_string(),
            payloads: PayloadBag::new(),
            cancellation: CancellationToken::new(),
            invalidation,
            shared: None,
        })
    }

    async fn create_active_context(
        &self,
        shared: Arc<CachedTestContext>,
        cancellation: CancellationToken,
    ) -> Result<CachedTestContext, BoxError> {
        Ok(CachedTestContext {
            id: shared.id.clone(),
            payloads: PayloadBag::new(),
            cancellation,
            invalidation: shared.invalidation.clone(),
            shared: Some(shared),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sequential_ids() {
        let factory = SequentialContextFactory::new();

        let first = factory.create_context(InvalidationToken::new()).await.unwrap();
        let second = factory.create_context(InvalidationToken::new()).await.unwrap();

        assert_eq!(first.id(), "1");
        assert_eq!(second.id(), "2");
        assert_eq!(factory.created_count(), 2);
    }

    #[tokio::test]
    async fn test_active_wraps_shared() {
        let factory = SequentialContextFactory::new();
        let shared = Arc::new(factory.create_context(InvalidationToken::new()).await.unwrap());

        let active = factory
            .create_active_context(shared.clone(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(active.id(), shared.id());
        assert!(active.is_active());
        assert!(!shared.is_active());

        // The active context shares the shared context's payload bag
        active.payloads().add_or_update::<u32, _, _>(|| 1, |n| n + 1);
        assert!(shared.payloads().has::<u32>());
    }

    #[tokio::test]
    async fn test_invalidate_through_active() {
        let factory = SequentialContextFactory::new();
        let invalidation = InvalidationToken::new();
        let shared = Arc::new(factory.create_context(invalidation.clone()).await.unwrap());

        let active = factory
            .create_active_context(shared, CancellationToken::new())
            .await
            .unwrap();
        active.invalidate();

        assert!(invalidation.is_invalidated());
    }
}
