//! Platform-wide statistics and comparisons.

use async_trait::async_trait;
use vulweb_core::platform::PlatformQuery;
use vulweb_core::types::AgentReply;

use super::{attachment, percent, CapabilityAgent};
use crate::context::ConversationContext;
use crate::error::ChatError;
use crate::filters::contains_any;

const KEYWORDS: &[&str] = &[
    "analyze",
    "analysis",
    "report",
    "statistics",
    "stats",
    "trends",
    "visualization",
    "chart",
    "graph",
    "compare",
    "platform",
    "overview",
];

const STATISTICS: &[&str] = &["statistics", "stats", "overview"];

const MENU: &str = "I can help you with:\n\
- Platform statistics\n\
- Model performance analysis\n\
- Training trend analysis\n\
- Generating comparison reports\n\n\
What would you like to analyze?";

/// Aggregates across models, datasets and tasks. Routed first so that
/// "statistics" is not claimed by the dataset agent.
pub struct AnalysisAgent;

#[async_trait]
impl CapabilityAgent for AnalysisAgent {
    fn name(&self) -> &'static str {
        "Data Analysis Agent"
    }

    fn description(&self) -> &'static str {
        "I help you analyze data, generate reports, and create visualizations."
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

        if contains_any(&lower, STATISTICS) {
            let counts = platform.counts()?;
            let content = format!(
                "Platform Statistics:\n\
                 - Total Models: {}\n\
                 - Total Datasets: {}\n\
                 - Total Training Tasks: {}\n\
                 - Running Tasks: {}",
                counts.models, counts.datasets, counts.tasks, counts.running_tasks
            );
            let data = serde_json::to_value(counts)
                .map_err(|e| ChatError::Platform(format!("serialize counts: {}", e)))?;
            return Ok(AgentReply::with_data(content, data));
        }

        if lower.contains("best") && lower.contains("model") {
            return Ok(match platform.best_model()? {
                Some(model) => AgentReply::with_data(
                    format!(
                        "The best performing model is '{}' with {} accuracy.",
                        model.name,
                        percent(model.accuracy.unwrap_or_default(), 2)
                    ),
                    attachment("model", &model)?,
                ),
                None => AgentReply::text("No models with accuracy metrics found."),
            });
        }

        Ok(AgentReply::text(MENU))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::{empty_platform, platform};

    async fn ask(message: &str) -> AgentReply {
        AnalysisAgent
            .handle(message, &ConversationContext::new(), &platform())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_platform_statistics() {
        let reply = ask("platform statistics").await;
        assert_eq!(
            reply.content,
            "Platform Statistics:\n\
             - Total Models: 3\n\
             - Total Datasets: 3\n\
             - Total Training Tasks: 2\n\
             - Running Tasks: 1"
        );
        assert_eq!(
            reply.data.unwrap(),
            serde_json::json!({"models": 3, "datasets": 3, "tasks": 2, "running_tasks": 1})
        );
    }

    #[tokio::test]
    async fn test_best_model() {
        let reply = ask("compare and find the best model").await;
        assert_eq!(
            reply.content,
            "The best performing model is 'VulBERTa' with 92.00% accuracy."
        );
        assert_eq!(reply.data.unwrap()["model"]["name"], "VulBERTa");
    }

    #[tokio::test]
    async fn test_best_model_without_metrics() {
        let reply = AnalysisAgent
            .handle("best model report", &ConversationContext::new(), &empty_platform())
            .await
            .unwrap();
        assert_eq!(reply.content, "No models with accuracy metrics found.");
    }

    #[tokio::test]
    async fn test_menu_by_default() {
        assert_eq!(ask("show me a chart").await.content, MENU);
    }
}
