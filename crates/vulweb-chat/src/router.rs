//! Intent routing over the capability agents.

use tracing::debug;
use vulweb_core::platform::PlatformQuery;
use vulweb_core::types::AgentReply;

use crate::agents::{
    AnalysisAgent, CapabilityAgent, DatasetAgent, ModelAgent, SystemHelpAgent, TrainingAgent,
};
use crate::context::ConversationContext;
use crate::error::ChatError;

/// Dispatches a message to the first agent whose keywords match.
///
/// Agents are tried from most to least specific. The help agent is last
/// because its keywords ("help", "how to", ...) would otherwise shadow the
/// others, and it also answers anything nobody else claims.
pub struct AgentRouter {
    agents: Vec<Box<dyn CapabilityAgent>>,
    fallback: Box<dyn CapabilityAgent>,
}

impl AgentRouter {
    pub fn new() -> Self {
        Self {
            agents: vec![
                Box::new(AnalysisAgent),
                Box::new(ModelAgent),
                Box::new(DatasetAgent),
                Box::new(TrainingAgent),
                Box::new(SystemHelpAgent),
            ],
            fallback: Box::new(SystemHelpAgent),
        }
    }

    /// The agent that will handle `message`.
    pub fn select(&self, message: &str) -> &dyn CapabilityAgent {
        self.agents
            .iter()
            .find(|agent| agent.can_handle(message))
            .unwrap_or(&self.fallback)
            .as_ref()
    }

    pub async fn route(
        &self,
        message: &str,
        context: &ConversationContext,
        platform: &dyn PlatformQuery,
    ) -> Result<AgentReply, ChatError> {
        let agent = self.select(message);
        debug!(agent = agent.name(), "Routing message");
        agent.handle(message, context, platform).await
    }

    /// Agent names in routing order.
    pub fn agent_names(&self) -> Vec<&'static str> {
        self.agents.iter().map(|a| a.name()).collect()
    }
}

impl Default for AgentRouter {
    fn default() -> Self {
        Self::new()
    }
}
