//! Training task listing and progress.

use async_trait::async_trait;
use vulweb_core::platform::PlatformQuery;
use vulweb_core::types::{AgentReply, TaskStatus};

use super::{attachment, bullets, CapabilityAgent, LIST_ALL};
use crate::context::ConversationContext;
use crate::error::ChatError;
use crate::filters::contains_any;

const KEYWORDS: &[&str] = &[
    "train",
    "training",
    "start training",
    "stop training",
    "training progress",
    "training status",
    "metrics",
    "loss",
    "epoch",
];

const LIST_TASKS: &[&str] = &["show tasks", "list tasks", "training tasks"];

const MENU: &str = "I can help you with:\n\
- Starting new training tasks\n\
- Monitoring training progress\n\
- Viewing training metrics\n\
- Stopping running tasks\n\n\
What would you like to do?";

pub struct TrainingAgent;

#[async_trait]
impl CapabilityAgent for TrainingAgent {
    fn name(&self) -> &'static str {
        "Training Agent"
    }

    fn description(&self) -> &'static str {
        "I help you manage training tasks - start, stop, monitor progress, and view training metrics."
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

        if contains_any(&lower, LIST_ALL) || contains_any(&lower, LIST_TASKS) {
            let tasks = platform.training_tasks()?;
            if tasks.is_empty() {
                return Ok(AgentReply::text(
                    "No training tasks found. Would you like to start a new training task?",
                ));
            }
            let list = bullets(&tasks, |t| {
                format!("{} (Status: {}, Progress: {}%)", t.name, t.status, t.progress)
            });
            return Ok(AgentReply::with_data(
                format!("Here are all the training tasks:\n{}", list),
                attachment("tasks", &tasks)?,
            ));
        }

        if lower.contains("running") || lower.contains("active") {
            let tasks = platform.tasks_with_status(TaskStatus::Running)?;
            if tasks.is_empty() {
                return Ok(AgentReply::text("No running training tasks."));
            }
            let list = bullets(&tasks, |t| format!("{} (Progress: {}%)", t.name, t.progress));
            return Ok(AgentReply::with_data(
                format!("Running training tasks:\n{}", list),
                attachment("tasks", &tasks)?,
            ));
        }

        Ok(AgentReply::text(MENU))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::{empty_platform, platform};

    async fn ask(message: &str) -> AgentReply {
        TrainingAgent
            .handle(message, &ConversationContext::new(), &platform())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_list_tasks() {
        let reply = ask("show training tasks").await;
        assert_eq!(
            reply.content,
            "Here are all the training tasks:\n\
             - bert-run (Status: running, Progress: 45%)\n\
             - devign-run (Status: completed, Progress: 100%)"
        );
    }

    #[tokio::test]
    async fn test_running_tasks() {
        let reply = ask("which training is running?").await;
        assert_eq!(reply.content, "Running training tasks:\n- bert-run (Progress: 45%)");
        assert_eq!(reply.data.unwrap()["tasks"][0]["name"], "bert-run");
    }

    #[tokio::test]
    async fn test_no_running_tasks() {
        let reply = TrainingAgent
            .handle("active training", &ConversationContext::new(), &empty_platform())
            .await
            .unwrap();
        assert_eq!(reply.content, "No running training tasks.");
    }

    #[tokio::test]
    async fn test_menu_by_default() {
        assert_eq!(ask("what is the loss?").await.content, MENU);
    }
}
