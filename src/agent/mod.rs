//! Agent lifecycles and hierarchical supervision.

#[allow(clippy::module_inception)]
mod agent;
mod latch;
mod supervisor;

pub use agent::Agent;
pub use latch::EventLatch;
pub use supervisor::{Supervisor, SupervisorPhase};

use crate::errors::LifecycleError;
use async_trait::async_trait;

/// A lifecycle a supervisor can own.
///
/// Implementations expose their latches through [`Supervised::lifecycle`]
/// and drive themselves to completion when stopped.
#[async_trait]
pub trait Supervised: Send + Sync {
    /// The member's lifecycle latches.
    fn lifecycle(&self) -> &Agent;

    /// Waits for readiness. Supervisors override this to aggregate over
    /// their children, so faults propagate through nesting.
    async fn await_ready(&self) -> Result<(), LifecycleError> {
        self.lifecycle().await_ready().await
    }

    /// Stops the member and drives it to completion.
    async fn stop(&self, reason: &str);
}

#[async_trait]
impl Supervised for Agent {
    fn lifecycle(&self) -> &Agent {
        self
    }

    async fn stop(&self, reason: &str) {
        Agent::stop(self, reason).await;
    }
}
