//! Supervisors: agents that own and drain child lifecycles.

use super::{Agent, Supervised};
use crate::errors::{AggregateError, DynError, LifecycleError};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// The coarse lifecycle phase of a supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorPhase {
    /// Accepting children and work.
    Running,
    /// Stop requested; children are being drained.
    Stopping,
    /// Fully drained.
    Stopped,
}

struct Inner {
    phase: SupervisorPhase,
    next_id: u64,
    children: BTreeMap<u64, Arc<dyn Supervised>>,
}

/// An agent owning a set of child lifecycles.
///
/// Readiness aggregates across the supervisor's own latch and every
/// child; stopping drains children (ascending registration order) before
/// the supervisor's own completion resolves.
pub struct Supervisor {
    agent: Agent,
    inner: RwLock<Inner>,
}

impl Supervisor {
    /// Creates a running supervisor with no children.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            agent: Agent::new(name),
            inner: RwLock::new(Inner {
                phase: SupervisorPhase::Running,
                next_id: 1,
                children: BTreeMap::new(),
            }),
        }
    }

    /// The supervisor's own lifecycle latches.
    #[must_use]
    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// The current phase.
    #[must_use]
    pub fn phase(&self) -> SupervisorPhase {
        self.inner.read().phase
    }

    /// Resolves the supervisor's own Ready latch.
    pub fn set_ready(&self) -> bool {
        self.agent.set_ready()
    }

    /// Faults the supervisor's own Ready latch.
    pub fn set_not_ready(&self, cause: DynError) -> bool {
        self.agent.set_not_ready(cause)
    }

    /// Registers a child, returning its registration id.
    ///
    /// A supervisor that is already stopping does not retain the child;
    /// the child is stopped immediately and `None` is returned.
    pub async fn add(&self, child: Arc<dyn Supervised>) -> Option<u64> {
        {
            let mut inner = self.inner.write();
            if inner.phase == SupervisorPhase::Running {
                let id = inner.next_id;
                inner.next_id += 1;
                inner.children.insert(id, child);
                return Some(id);
            }
        }

        debug!(supervisor = self.agent.name(), "stopping incoming child of a stopping supervisor");
        child.stop("supervisor stopping").await;
        None
    }

    /// Removes a child registration without stopping it.
    pub fn remove(&self, id: u64) -> Option<Arc<dyn Supervised>> {
        self.inner.write().children.remove(&id)
    }

    /// Returns the number of registered children.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.inner.read().children.len()
    }

    fn snapshot(&self) -> Vec<Arc<dyn Supervised>> {
        self.inner.read().children.values().cloned().collect()
    }

    /// Waits for aggregated readiness: the supervisor's own Ready and
    /// every child's Ready, over a snapshot of the current children.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::ChildFaulted`] aggregating every fault
    /// when any lifecycle in the tree resolves unsuccessfully.
    pub async fn await_ready(&self) -> Result<(), LifecycleError> {
        let mut causes: Vec<DynError> = Vec::new();

        if let Err(cause) = self.agent.await_ready().await {
            causes.push(Arc::new(cause));
        }
        for child in self.snapshot() {
            if let Err(cause) = child.await_ready().await {
                causes.push(Arc::new(cause));
            }
        }

        if causes.is_empty() {
            Ok(())
        } else {
            Err(LifecycleError::ChildFaulted(AggregateError::new(causes)))
        }
    }

    /// Waits for the supervisor's Completed latch.
    ///
    /// # Errors
    ///
    /// Returns the fault or cancellation Completed resolved with.
    pub async fn await_completed(&self) -> Result<(), LifecycleError> {
        self.agent.await_completed().await
    }

    /// Flips the phase to Stopping so new children are refused.
    ///
    /// Returns false if a stop was already in progress.
    pub fn begin_stop(&self) -> bool {
        let mut inner = self.inner.write();
        if inner.phase == SupervisorPhase::Running {
            inner.phase = SupervisorPhase::Stopping;
            true
        } else {
            false
        }
    }

    /// Stops every child and waits for each to complete, in ascending
    /// registration order.
    pub async fn stop_children(&self, reason: &str) {
        for child in self.snapshot() {
            child.stop(reason).await;
            let _ = child.lifecycle().await_completed().await;
        }
        self.inner.write().children.clear();
    }

    /// Resolves the supervisor's own Stopped and Completed latches.
    pub fn finish_stop(&self, reason: &str) {
        self.agent.begin_stop(reason);
        self.agent.finish_stop();
        self.inner.write().phase = SupervisorPhase::Stopped;
    }

    /// Stops the supervisor: refuse new children, drain existing ones,
    /// then resolve own completion.
    pub async fn stop(&self, reason: &str) {
        self.begin_stop();
        debug!(supervisor = self.agent.name(), reason, "stopping supervisor");
        self.stop_children(reason).await;
        self.finish_stop(reason);
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("agent", &self.agent)
            .field("phase", &self.phase())
            .field("children", &self.child_count())
            .finish()
    }
}

#[async_trait]
impl Supervised for Supervisor {
    fn lifecycle(&self) -> &Agent {
        &self.agent
    }

    async fn await_ready(&self) -> Result<(), LifecycleError> {
        Supervisor::await_ready(self).await
    }

    async fn stop(&self, reason: &str) {
        Supervisor::stop(self, reason).await;
    }
}
