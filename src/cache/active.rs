//! The lifecycle of one in-flight send.

use crate::agent::{Agent, Supervised};
use crate::cancellation::CancellationToken;
use async_trait::async_trait;

/// Tracks one outstanding send as a supervised child.
///
/// Stopping cancels the send's token and resolves Stopped; completion is
/// resolved by the send path through [`ActiveSendAgent::finish`] when the
/// pipe returns, which is what a draining supervisor awaits.
pub(crate) struct ActiveSendAgent {
    agent: Agent,
    token: CancellationToken,
}

impl ActiveSendAgent {
    pub(crate) fn new(token: CancellationToken) -> Self {
        let agent = Agent::new("active-send");
        agent.set_ready();
        Self { agent, token }
    }

    /// Marks the send finished, resolving the lifecycle.
    pub(crate) fn finish(&self) {
        self.agent.begin_stop("send complete");
        self.agent.finish_stop();
    }
}

#[async_trait]
impl Supervised for ActiveSendAgent {
    fn lifecycle(&self) -> &Agent {
        &self.agent
    }

    async fn stop(&self, reason: &str) {
        self.token.cancel(reason);
        // Completion arrives when the send path calls finish(); the
        // draining supervisor awaits it, stop itself must not block
        self.agent.begin_stop(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_finish_resolves_lifecycle() {
        let active = ActiveSendAgent::new(CancellationToken::new());
        active.finish();

        assert!(active.lifecycle().completed().is_set());
    }

    #[tokio::test]
    async fn test_stop_cancels_token_without_blocking() {
        let token = CancellationToken::new();
        let active = Arc::new(ActiveSendAgent::new(token.clone()));

        active.stop("supervisor stopping").await;

        assert!(token.is_cancelled());
        assert!(active.lifecycle().stopped().is_set());
        // Completion is still owned by the send path
        assert!(!active.lifecycle().completed().is_resolved());

        active.finish();
        tokio::time::timeout(Duration::from_secs(1), active.lifecycle().await_completed())
            .await
            .expect("completion resolves once the send finished")
            .unwrap();
    }
}
