//! Capability agents and the trait they implement.
//!
//! Each agent declares a keyword set; [`CapabilityAgent::can_handle`] is a
//! case-insensitive substring match over it. Handlers read live platform
//! state through [`PlatformQuery`] and format a listing, an aggregate, or a
//! capability menu.

pub mod analysis;
pub mod dataset;
pub mod model;
pub mod system_help;
pub mod training;

pub use analysis::AnalysisAgent;
pub use dataset::DatasetAgent;
pub use model::ModelAgent;
pub use system_help::SystemHelpAgent;
pub use training::TrainingAgent;

use async_trait::async_trait;
use serde::Serialize;
use vulweb_core::platform::PlatformQuery;
use vulweb_core::types::AgentReply;

use crate::context::ConversationContext;
use crate::error::ChatError;

/// Phrases asking for a full listing, shared by the entity agents.
pub(crate) const LIST_ALL: &[&str] = &["show all", "list all", "get all"];

/// A handler for one family of user intents.
#[async_trait]
pub trait CapabilityAgent: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn keywords(&self) -> &'static [&'static str];

    /// True if any keyword occurs in `message`, ignoring case.
    fn can_handle(&self, message: &str) -> bool {
        let lower = message.to_lowercase();
        self.keywords().iter().any(|k| lower.contains(k))
    }

    /// Produce a reply. `context` already holds the user's message.
    async fn handle(
        &self,
        message: &str,
        context: &ConversationContext,
        platform: &dyn PlatformQuery,
    ) -> Result<AgentReply, ChatError>;
}

/// `{ key: value }` attachment for a structured reply.
pub(crate) fn attachment<T: Serialize>(key: &str, value: &T) -> Result<serde_json::Value, ChatError> {
    let value = serde_json::to_value(value)
        .map_err(|e| ChatError::Platform(format!("serialize {}: {}", key, e)))?;
    let mut map = serde_json::Map::new();
    map.insert(key.to_string(), value);
    Ok(serde_json::Value::Object(map))
}

/// `0.9234` -> `"92.34%"`.
pub(crate) fn percent(fraction: f64, decimals: usize) -> String {
    format!("{:.*}%", decimals, fraction * 100.0)
}

/// Bullet list, one line per item.
pub(crate) fn bullets<T>(items: &[T], line: impl Fn(&T) -> String) -> String {
    items
        .iter()
        .map(|item| format!("- {}", line(item)))
        .collect::<Vec<_>>()
        .join("\n")
}
