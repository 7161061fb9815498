//! Ownership handles for cached contexts.

use super::InvalidationToken;
use crate::agent::Agent;
use crate::context::PipeContext;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use uuid::Uuid;

const ACTIVE: u8 = 0;
const DISPOSING: u8 = 1;
const DISPOSED: u8 = 2;

/// The ownership token for one cached context.
///
/// A handle moves through `active → disposing → disposed` exactly once;
/// disposal stops the handle's lifecycle agent and is idempotent.
pub struct ContextHandle<C: PipeContext> {
    id: Uuid,
    context: Arc<C>,
    agent: Agent,
    invalidation: InvalidationToken,
    state: AtomicU8,
    created_at: String,
}

impl<C: PipeContext> ContextHandle<C> {
    pub(crate) fn new(context: Arc<C>, invalidation: InvalidationToken) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            context,
            agent: Agent::new(format!("context-{id}")),
            invalidation,
            state: AtomicU8::new(ACTIVE),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// The unique id of this handle.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The cached context.
    #[must_use]
    pub fn context(&self) -> &Arc<C> {
        &self.context
    }

    /// The handle's lifecycle agent.
    #[must_use]
    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// The invalidation signal paired with this context.
    #[must_use]
    pub fn invalidation(&self) -> &InvalidationToken {
        &self.invalidation
    }

    /// When the handle was created, RFC 3339.
    #[must_use]
    pub fn created_at(&self) -> &str {
        &self.created_at
    }

    /// Returns true while the handle has not started disposal.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.load(Ordering::SeqCst) == ACTIVE
    }

    /// Returns true once disposal has finished.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.state.load(Ordering::SeqCst) == DISPOSED
    }

    /// Claims the right to dispose. True for exactly one caller.
    pub(crate) fn begin_dispose(&self) -> bool {
        self.state
            .compare_exchange(ACTIVE, DISPOSING, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) async fn finish_dispose(&self, reason: &str) {
        self.agent.stop(reason).await;
        self.state.store(DISPOSED, Ordering::SeqCst);
    }

    /// Disposes the handle, stopping its lifecycle agent.
    ///
    /// Idempotent; late callers wait for the first disposal to finish.
    pub async fn dispose(&self, reason: &str) {
        if self.begin_dispose() {
            self.finish_dispose(reason).await;
        } else {
            let _ = self.agent.await_completed().await;
        }
    }
}

impl<C: PipeContext> std::fmt::Debug for ContextHandle<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state.load(Ordering::SeqCst) {
            ACTIVE => "active",
            DISPOSING => "disposing",
            _ => "disposed",
        };
        f.debug_struct("ContextHandle")
            .field("id", &self.id)
            .field("state", &state)
            .field("created_at", &self.created_at)
            .finish()
    }
}
