//! Conversational assistant for the VulWeb platform.
//!
//! Routes messages to capability agents, composes retrieval-augmented
//! answers, and talks to external LLM providers.

pub mod agents;
pub mod composer;
pub mod context;
pub mod error;
pub mod filters;
pub mod llm;
pub mod router;
pub mod service;

pub use agents::CapabilityAgent;
pub use composer::ResponseComposer;
pub use context::{ConversationContext, SessionRegistry};
pub use error::{ChatError, GatewayError};
pub use llm::{LlmGateway, Provider};
pub use router::AgentRouter;
pub use service::{ChatOutcome, ChatRequest, ChatService};
