//! The context supervisor: routes pipes through a cached shared context.

use super::active::ActiveSendAgent;
use super::{ContextFactory, ContextHandle, InvalidationToken};
use crate::agent::{Agent, Supervised, Supervisor, SupervisorPhase};
use crate::cancellation::CancellationToken;
use crate::context::PipeContext;
use crate::errors::PipeError;
use crate::pipe::Pipe;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

type SharedCell<C> = Arc<OnceCell<Arc<ContextHandle<C>>>>;

/// Serves sends through a lazily created, cached shared context.
///
/// At most one shared context exists at any moment, and at most one
/// creation is in flight; concurrent first senders share the same
/// creation. Each send wraps the shared context in a per-send active
/// context and is tracked as a supervised child, so stopping waits for
/// every outstanding send before the shared context is disposed.
pub struct ContextSupervisor<C: PipeContext> {
    supervisor: Supervisor,
    factory: Arc<dyn ContextFactory<C>>,
    slot: Arc<Mutex<SharedCell<C>>>,
}

impl<C: PipeContext> ContextSupervisor<C> {
    /// Creates a supervisor around a context factory.
    #[must_use]
    pub fn new(name: impl Into<String>, factory: Arc<dyn ContextFactory<C>>) -> Self {
        Self {
            supervisor: Supervisor::new(name),
            factory,
            slot: Arc::new(Mutex::new(Arc::new(OnceCell::new()))),
        }
    }

    /// The underlying supervisor and its lifecycle latches.
    #[must_use]
    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Returns true while the shared context slot holds a live handle.
    #[must_use]
    pub fn has_shared_context(&self) -> bool {
        self.slot.lock().get().is_some()
    }

    /// Initiates disposal, swaps the slot out, and finishes disposal.
    ///
    /// Replacement only becomes visible after disposal has been
    /// initiated; late callers wait for the winning disposer.
    async fn evict_and_dispose(
        slot: &Mutex<SharedCell<C>>,
        cell: &SharedCell<C>,
        handle: &Arc<ContextHandle<C>>,
        reason: &str,
    ) {
        let claimed = handle.begin_dispose();
        {
            let mut current = slot.lock();
            if Arc::ptr_eq(&*current, cell) {
                *current = Arc::new(OnceCell::new());
            }
        }
        if claimed {
            debug!(context_id = %handle.id(), reason, "disposing shared context");
            handle.finish_dispose(reason).await;
        } else {
            let _ = handle.agent().await_completed().await;
        }
    }

    /// Resolves the current shared handle, creating it if necessary.
    async fn resolve_shared(&self) -> Result<Arc<ContextHandle<C>>, PipeError> {
        loop {
            let cell = self.slot.lock().clone();

            let handle = cell
                .get_or_try_init(|| async {
                    if self.supervisor.phase() != SupervisorPhase::Running {
                        return Err(PipeError::Cancelled(
                            "context supervisor stopped".to_string(),
                        ));
                    }

                    let invalidation = InvalidationToken::new();
                    let context = self
                        .factory
                        .create_context(invalidation.clone())
                        .await
                        .map_err(|cause| PipeError::Pipeline(cause.into()))?;

                    let handle = Arc::new(ContextHandle::new(Arc::new(context), invalidation));
                    handle.agent().set_ready();
                    self.supervisor.set_ready();
                    debug!(context_id = %handle.id(), "created shared context");

                    self.watch_invalidation(cell.clone(), handle.clone());
                    Ok(handle)
                })
                .await?
                .clone();

            if handle.invalidation().is_invalidated() {
                Self::evict_and_dispose(&self.slot, &cell, &handle, "shared context invalidated")
                    .await;
                continue;
            }
            return Ok(handle);
        }
    }

    /// Watches the handle's invalidation signal and evicts eagerly.
    fn watch_invalidation(&self, cell: SharedCell<C>, handle: Arc<ContextHandle<C>>) {
        let slot = self.slot.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = handle.invalidation().invalidated() => {
                    Self::evict_and_dispose(&slot, &cell, &handle, "shared context invalidated")
                        .await;
                }
                // Disposal through stop; nothing left to watch
                _ = handle.agent().await_completed() => {}
            }
        });
    }

    /// Sends a pipe through a fresh active context over the shared one.
    ///
    /// # Errors
    ///
    /// Returns [`PipeError::Cancelled`] when the supervisor is stopping,
    /// a [`PipeError::Pipeline`] fault when context creation fails, or
    /// whatever the pipe itself produced.
    pub async fn send(
        &self,
        pipe: &dyn Pipe<C>,
        cancellation: CancellationToken,
    ) -> Result<(), PipeError> {
        if self.supervisor.phase() != SupervisorPhase::Running {
            return Err(PipeError::Cancelled(
                "context supervisor stopped".to_string(),
            ));
        }

        let shared = self.resolve_shared().await?;

        let send_token = cancellation.child_token();
        let active_ctx = self
            .factory
            .create_active_context(shared.context().clone(), send_token.clone())
            .await
            .map_err(|cause| PipeError::Pipeline(cause.into()))?;

        let active = Arc::new(ActiveSendAgent::new(send_token));
        let Some(child_id) = self.supervisor.add(active.clone()).await else {
            return Err(PipeError::Cancelled(
                "context supervisor stopped".to_string(),
            ));
        };

        let result = pipe.send(&active_ctx).await;

        active.finish();
        self.supervisor.remove(child_id);
        result
    }

    /// Stops the supervisor: refuses new sends, cancels and awaits every
    /// outstanding send, disposes the shared context, then resolves the
    /// supervisor's own completion.
    pub async fn stop(&self, reason: &str) {
        if !self.supervisor.begin_stop() {
            let _ = self.supervisor.await_completed().await;
            return;
        }

        debug!(supervisor = self.supervisor.agent().name(), reason, "stopping context supervisor");
        self.supervisor.stop_children(reason).await;

        let cell = self.slot.lock().clone();
        if let Some(handle) = cell.get() {
            Self::evict_and_dispose(&self.slot, &cell, handle, reason).await;
        }

        self.supervisor.finish_stop(reason);
    }
}

impl<C: PipeContext> std::fmt::Debug for ContextSupervisor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextSupervisor")
            .field("supervisor", &self.supervisor)
            .field("has_shared_context", &self.has_shared_context())
            .finish()
    }
}

#[async_trait]
impl<C: PipeContext> Supervised for ContextSupervisor<C> {
    fn lifecycle(&self) -> &Agent {
        self.supervisor.agent()
    }

    async fn await_ready(&self) -> Result<(), crate::errors::LifecycleError> {
        self.supervisor.await_ready().await
    }

    async fn stop(&self, reason: &str) {
        ContextSupervisor::stop(self, reason).await;
    }
}
