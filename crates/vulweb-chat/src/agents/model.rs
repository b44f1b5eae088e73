//! Model listing and accuracy filtering.

use async_trait::async_trait;
use tracing::debug;
use vulweb_core::platform::PlatformQuery;
use vulweb_core::types::AgentReply;

use super::{attachment, bullets, percent, CapabilityAgent, LIST_ALL};
use crate::context::ConversationContext;
use crate::error::ChatError;
use crate::filters::{contains_any, has_comparator, parse_threshold};

const KEYWORDS: &[&str] = &[
    "model",
    "models",
    "upload model",
    "delete model",
    "show models",
    "compare models",
    "accuracy",
    "performance",
];

const LIST_MODELS: &[&str] = &["show models", "list models"];

const MENU: &str = "I can help you with:\n\
- Listing all models\n\
- Filtering models by accuracy\n\
- Uploading new models\n\
- Comparing model performance\n\n\
What would you like to do?";

/// Lists models and filters them by accuracy.
pub struct ModelAgent;

#[async_trait]
impl CapabilityAgent for ModelAgent {
    fn name(&self) -> &'static str {
        "Model Management Agent"
    }

    fn description(&self) -> &'static str {
        "I help you manage machine learning models - upload, view, update, delete, and compare models."
    }

    fn keywords(&self) -> &'static [&'static str] {
        KEYWORDS
    }

    async fn handle(
        &self,
        message: &str,
        _context: &ConversationContext,
        platform: &dyn PlatformQuery,
    ) -> Result<AgentReply, ChatError> {
        let lower = message.to_lowercase();

        // Threshold filter is checked first; it is the more specific intent.
        if lower.contains("accuracy") && has_comparator(&lower) {
            let Some(threshold) = parse_threshold(message) else {
                return Ok(AgentReply::text(
                    "I had trouble understanding the accuracy threshold. Could you rephrase?",
                ));
            };
            debug!(threshold, "Filtering models by accuracy");

            let models = platform.models_with_min_accuracy(threshold)?;
            if models.is_empty() {
                return Ok(AgentReply::text(format!(
                    "No models found with accuracy >= {}.",
                    percent(threshold, 0)
                )));
            }
            let list = bullets(&models, |m| {
                format!("{} (Accuracy: {})", m.name, percent(m.accuracy.unwrap_or_default(), 2))
            });
            return Ok(AgentReply::with_data(
                format!("Models with accuracy >= {}:\n{}", percent(threshold, 0), list),
                attachment("models", &models)?,
            ));
        }

        if contains_any(&lower, LIST_ALL) || contains_any(&lower, LIST_MODELS) {
            let models = platform.models()?;
            if models.is_empty() {
                return Ok(AgentReply::text(
                    "No models found. Would you like to upload a model?",
                ));
            }
            let list = bullets(&models, |m| {
                format!(
                    "{} (Type: {}, Accuracy: {})",
                    m.name,
                    m.model_type.as_deref().unwrap_or("N/A"),
                    m.accuracy.map_or_else(|| "N/A".to_string(), |a| a.to_string())
                )
            });
            return Ok(AgentReply::with_data(
                format!("Here are all the models:\n{}", list),
                attachment("models", &models)?,
            ));
        }

        Ok(AgentReply::text(MENU))
    }
}
