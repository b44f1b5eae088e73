//! Chat service: the transport-facing entry point.
//!
//! Wires sessions, the agent router and the response composer together.
//! Internal failures are logged and replaced by a generic apology; only
//! input validation and explicit LLM tests return errors to the caller.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use vulweb_core::config::{ChatSettings, LlmSettings, VulwebConfig};
use vulweb_core::platform::PlatformQuery;
use vulweb_core::types::{AgentReply, Message, Role};
use vulweb_knowledge::{KnowledgeStore, StoreStatus};

use crate::composer::ResponseComposer;
use crate::context::SessionRegistry;
use crate::error::ChatError;
use crate::llm::LlmGateway;
use crate::router::AgentRouter;

const ERROR_REPLY: &str = "Sorry, I encountered an error processing your request. Please try again.";

/// A RAG question.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatRequest {
    pub message: String,
    /// Falls back to the configured default session.
    pub session_id: Option<String>,
    pub use_llm: bool,
    /// Per-request provider settings; the configured defaults are used
    /// when `use_llm` is set and this is `None`.
    #[serde(skip_serializing)]
    pub llm_config: Option<LlmSettings>,
}

/// Result of one exchange.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatOutcome {
    pub success: bool,
    pub reply: AgentReply,
    /// Messages in the session after this exchange.
    pub context_size: usize,
}

pub struct ChatService {
    router: AgentRouter,
    composer: ResponseComposer,
    platform: Arc<dyn PlatformQuery>,
    sessions: SessionRegistry,
    settings: ChatSettings,
    default_llm: LlmSettings,
}

impl ChatService {
    pub fn new(
        store: Arc<KnowledgeStore>,
        platform: Arc<dyn PlatformQuery>,
        config: &VulwebConfig,
    ) -> Result<Self, ChatError> {
        let gateway = LlmGateway::new()?;
        Ok(Self {
            router: AgentRouter::new(),
            composer: ResponseComposer::new(store, gateway, config.knowledge.retrieval_top_k),
            platform,
            sessions: SessionRegistry::new(),
            settings: config.chat.clone(),
            default_llm: config.llm.clone(),
        })
    }

    /// Build the knowledge store from `config` and the service around it.
    pub async fn from_config(
        config: &VulwebConfig,
        platform: Arc<dyn PlatformQuery>,
    ) -> Result<Self, ChatError> {
        let store = Arc::new(KnowledgeStore::from_config(&config.knowledge).await);
        Self::new(store, platform, config)
    }

    /// Route `text` to a capability agent and record both turns.
    pub async fn process_message(
        &self,
        text: &str,
        session_id: &str,
    ) -> Result<ChatOutcome, ChatError> {
        self.validate(text)?;
        let session_id = self.session_or_default(Some(session_id));

        let handle = self.sessions.get_or_create(session_id)?;
        let mut ctx = handle.lock().await;
        ctx.add_message(Role::User, text);

        let agent = self.router.select(text).name();
        ctx.set_metadata("last_agent", serde_json::Value::from(agent));

        let (success, reply) = match self.router.route(text, &ctx, self.platform.as_ref()).await {
            Ok(reply) => (true, reply),
            Err(e) => {
                error!(session = %session_id, agent, error = %e, "Agent failed to handle message");
                (false, AgentReply::text(ERROR_REPLY))
            }
        };
        ctx.add_message(Role::Assistant, reply.content.clone());

        Ok(ChatOutcome {
            success,
            reply,
            context_size: ctx.len(),
        })
    }

    /// Answer a question from the knowledge base and live platform state.
    pub async fn ask(&self, request: ChatRequest) -> Result<ChatOutcome, ChatError> {
        self.validate(&request.message)?;
        let session_id = self.session_or_default(request.session_id.as_deref());

        let live = match self.platform.live_context() {
            Ok(live) => Some(live),
            Err(e) => {
                warn!(session = %session_id, error = %e, "Live platform state unavailable");
                None
            }
        };
        let llm_config = if request.use_llm {
            request.llm_config.clone().or_else(|| {
                self.default_llm
                    .is_enabled()
                    .then(|| self.default_llm.clone())
            })
        } else {
            None
        };

        let handle = self.sessions.get_or_create(session_id)?;
        let mut ctx = handle.lock().await;
        ctx.add_message(Role::User, request.message.as_str());

        let answer = self
            .composer
            .generate(
                &request.message,
                live.as_ref(),
                request.use_llm,
                llm_config.as_ref(),
            )
            .await;
        ctx.add_message(Role::Assistant, answer.as_str());

        Ok(ChatOutcome {
            success: true,
            reply: AgentReply::text(answer),
            context_size: ctx.len(),
        })
    }

    /// The last `limit` messages of a session; unknown sessions are empty.
    pub async fn history(&self, session_id: &str, limit: Option<usize>) -> Vec<Message> {
        match self.sessions.get(session_id) {
            Some(handle) => handle.lock().await.messages(limit).to_vec(),
            None => Vec::new(),
        }
    }

    /// Empty one session's log and metadata.
    pub async fn clear(&self, session_id: &str) {
        if let Some(handle) = self.sessions.get(session_id) {
            handle.lock().await.clear();
            info!(session = %session_id, "Conversation cleared");
        }
    }

    pub fn sessions(&self) -> Vec<String> {
        self.sessions.session_ids()
    }

    pub async fn reload_knowledge(&self) -> StoreStatus {
        self.composer.store().reload().await
    }

    pub fn knowledge_status(&self) -> StoreStatus {
        self.composer.store().status()
    }

    /// Probe an LLM configuration; unlike answering, failures propagate.
    pub async fn test_llm(&self, config: &LlmSettings) -> Result<String, ChatError> {
        Ok(self.composer.validate_llm(config).await?)
    }

    /// Provider settings used when a request carries none.
    pub fn default_llm(&self) -> &LlmSettings {
        &self.default_llm
    }

    fn validate(&self, text: &str) -> Result<(), ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let max = self.settings.max_message_length;
        if text.chars().count() > max {
            return Err(ChatError::MessageTooLong(max));
        }
        Ok(())
    }

    fn session_or_default<'a>(&'a self, session_id: Option<&'a str>) -> &'a str {
        match session_id.map(str::trim) {
            Some(id) if !id.is_empty() => id,
            _ => &self.settings.default_session,
        }
    }
}
