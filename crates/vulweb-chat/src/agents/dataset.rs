//! Dataset listing and sample-count queries.

use async_trait::async_trait;
use vulweb_core::platform::PlatformQuery;
use vulweb_core::types::AgentReply;

use super::{attachment, bullets, CapabilityAgent, LIST_ALL};
use crate::context::ConversationContext;
use crate::error::ChatError;
use crate::filters::contains_any;

const KEYWORDS: &[&str] = &[
    "dataset",
    "datasets",
    "data",
    "upload dataset",
    "show datasets",
    "statistics",
    "preprocess",
];

const LIST_DATASETS: &[&str] = &["show datasets", "list datasets"];

const MOST_OF: &[&str] = &["samples", "vulnerable", "data"];

const MENU: &str = "I can help you with:\n\
- Listing all datasets\n\
- Viewing dataset statistics\n\
- Finding datasets with specific criteria\n\
- Analyzing dataset contents\n\n\
What would you like to do?";

pub struct DatasetAgent;

#[async_trait]
impl CapabilityAgent for DatasetAgent {
    fn name(&self) -> &'static str {
        "Dataset Management Agent"
    }

    fn description(&self) -> &'static str {
        "I help you manage datasets - upload, view statistics, analyze, and preprocess datasets."
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

        if contains_any(&lower, LIST_ALL) || contains_any(&lower, LIST_DATASETS) {
            let datasets = platform.datasets()?;
            if datasets.is_empty() {
                return Ok(AgentReply::text(
                    "No datasets found. Would you like to upload a dataset?",
                ));
            }
            let list = bullets(&datasets, |d| {
                format!(
                    "{} (Format: {}, Samples: {})",
                    d.name,
                    d.format.as_deref().unwrap_or("N/A"),
                    d.num_samples
                        .map_or_else(|| "N/A".to_string(), |n| n.to_string())
                )
            });
            return Ok(AgentReply::with_data(
                format!("Here are all the datasets:\n{}", list),
                attachment("datasets", &datasets)?,
            ));
        }

        if lower.contains("most") && contains_any(&lower, MOST_OF) {
            return Ok(match platform.dataset_with_most_samples()? {
                Some(d) => AgentReply::text(format!(
                    "The dataset with the most samples is '{}' with {} samples.",
                    d.name,
                    d.num_samples.unwrap_or_default()
                )),
                None => AgentReply::text("No datasets with sample information found."),
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
        DatasetAgent
            .handle(message, &ConversationContext::new(), &platform())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_list_datasets() {
        let reply = ask("show datasets").await;
        assert_eq!(
            reply.content,
            "Here are all the datasets:\n\
             - Juliet (Format: json, Samples: 1200)\n\
             - BigVul (Format: json, Samples: 5000)\n\
             - Scratch (Format: json, Samples: N/A)"
        );
        assert_eq!(reply.data.unwrap()["datasets"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_most_samples() {
        let reply = ask("which dataset has the most samples?").await;
        assert_eq!(
            reply.content,
            "The dataset with the most samples is 'BigVul' with 5000 samples."
        );
    }

    #[tokio::test]
    async fn test_most_samples_without_counts() {
        let reply = DatasetAgent
            .handle("most data", &ConversationContext::new(), &empty_platform())
            .await
            .unwrap();
        assert_eq!(reply.content, "No datasets with sample information found.");
    }

    #[tokio::test]
    async fn test_empty_listing() {
        let reply = DatasetAgent
            .handle("list all datasets", &ConversationContext::new(), &empty_platform())
            .await
            .unwrap();
        assert!(reply.content.starts_with("No datasets found."));
    }

    #[tokio::test]
    async fn test_menu_by_default() {
        assert_eq!(ask("preprocess my dataset").await.content, MENU);
    }
}
