//! The context types that flow through pipes.

use super::PayloadBag;
use crate::cancellation::CancellationToken;
use crate::errors::{BoxError, PayloadError};
use std::any::Any;
use std::sync::Arc;

/// A request-scoped carrier flowing through a filter chain.
///
/// Every context exposes a cancellation token and a typed payload bag.
/// The generic helpers delegate to the bag so filters can attach and read
/// payloads without caring about the concrete context type.
pub trait PipeContext: Send + Sync + 'static {
    /// The cancellation signal for this send.
    fn cancellation(&self) -> &CancellationToken;

    /// The payload bag attached to this context.
    fn payloads(&self) -> &PayloadBag;

    /// Checks whether a payload of type `P` is present.
    fn has_payload<P: Any + Send + Sync>(&self) -> bool
    where
        Self: Sized,
    {
        self.payloads().has::<P>()
    }

    /// Returns the payload of type `P`, if present.
    fn try_get_payload<P: Any + Send + Sync>(&self) -> Option<Arc<P>>
    where
        Self: Sized,
    {
        self.payloads().try_get::<P>()
    }

    /// Returns the payload of type `P`, creating it with `factory` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Factory`] when the factory fails.
    fn get_or_add_payload<P, F>(&self, factory: F) -> Result<Arc<P>, PayloadError>
    where
        Self: Sized,
        P: Any + Send + Sync,
        F: FnOnce() -> Result<P, BoxError>,
    {
        self.payloads().get_or_add(factory)
    }

    /// Adds a payload of type `P`, or updates the existing one.
    fn add_or_update_payload<P, A, U>(&self, add: A, update: U) -> Arc<P>
    where
        Self: Sized,
        P: Any + Send + Sync,
        A: FnOnce() -> P,
        U: FnOnce(&P) -> P,
    {
        self.payloads().add_or_update(add, update)
    }
}

/// A minimal standalone context: a payload bag plus a cancellation token.
///
/// Useful directly for simple pipes, and as the delegate inside richer
/// domain contexts.
#[derive(Debug, Default)]
pub struct BasicPipeContext {
    payloads: PayloadBag,
    cancellation: CancellationToken,
}

impl BasicPipeContext {
    /// Creates a context with a fresh payload bag and the given token.
    #[must_use]
    pub fn new(cancellation: CancellationToken) -> Self {
        Self {
            payloads: PayloadBag::new(),
            cancellation,
        }
    }
}

impl PipeContext for BasicPipeContext {
    fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    fn payloads(&self) -> &PayloadBag {
        &self.payloads
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct SessionId(&'static str);

    #[test]
    fn test_basic_context_payloads() {
        let ctx = BasicPipeContext::default();
        assert!(!ctx.has_payload::<SessionId>());

        let id = ctx
            .get_or_add_payload::<SessionId, _>(|| Ok(SessionId("s-1")))
            .unwrap();
        assert_eq!(*id, SessionId("s-1"));
        assert!(ctx.has_payload::<SessionId>());
        assert_eq!(*ctx.try_get_payload::<SessionId>().unwrap(), SessionId("s-1"));
    }

    #[test]
    fn test_basic_context_cancellation() {
        let token = CancellationToken::new();
        let ctx = BasicPipeContext::new(token.clone());

        assert!(!ctx.cancellation().is_cancelled());
        token.cancel("done");
        assert!(ctx.cancellation().is_cancelled());
    }
}
