//! Retrieval-augmented answer composition.
//!
//! Degrades in three steps: external LLM (when requested and configured),
//! retrieved knowledge with a templated frame, then canned replies. Every
//! step yields a non-empty answer.

use std::sync::Arc;

use tracing::{debug, warn};
use vulweb_core::config::LlmSettings;
use vulweb_core::types::{LiveContext, RetrievalResult, TaskStatus};
use vulweb_knowledge::KnowledgeStore;

use crate::error::GatewayError;
use crate::llm::{LlmGateway, Provider};

const SYSTEM_PROMPT: &str = "你是VulWeb代码漏洞检测模型管理系统的AI助手。
你的任务是根据提供的知识库信息和系统状态，回答用户关于系统使用的问题。
请用简洁、准确、友好的方式回答，必要时提供步骤说明。";

const PROBE_PROMPT: &str = "请回复“连接成功”。";

const KNOWLEDGE_HEADING: &str = "根据系统知识库，我为您找到以下相关信息：\n\n";

const GUIDANCE_FOOTER: &str = "\n\n如需更详细的帮助，您可以：\n\
- 在\"系统设置\"中配置AI服务以获得更智能的回答\n\
- 查看相关页面进行实际操作\n\
- 点击快捷问题了解更多功能";

const GREETING_REPLY: &str =
    "您好！我是VulWeb AI助手。我可以帮您了解系统功能、指导操作流程、查询系统状态。请随时向我提问！";

const HELP_REPLY: &str = "我可以帮您：
1. 了解如何上传和管理模型
2. 了解如何上传和管理数据集
3. 指导创建和监控训练任务
4. 查询系统状态和统计信息
5. 解答使用过程中的问题

请告诉我您需要哪方面的帮助？";

const NOT_UNDERSTOOD_REPLY: &str = "抱歉，我暂时无法理解您的问题。建议您：\n\
1. 在\"系统设置\"中配置AI服务以获得更智能的对话体验\n\
2. 尝试使用快捷问题\n\
3. 查看系统帮助文档";

const LLM_FAILURE_NOTICE: &str = "调用LLM服务失败，请稍后重试。您可以在\"系统设置\"中检查API配置。";

const GREETINGS: &[&str] = &["你好", "您好", "hello"];
const HELP_WORDS: &[&str] = &["帮助", "help"];

/// Builds answers from retrieved knowledge, live platform state and,
/// optionally, an external LLM.
pub struct ResponseComposer {
    store: Arc<KnowledgeStore>,
    gateway: LlmGateway,
    top_k: usize,
}

impl ResponseComposer {
    pub fn new(store: Arc<KnowledgeStore>, gateway: LlmGateway, top_k: usize) -> Self {
        Self {
            store,
            gateway,
            top_k,
        }
    }

    pub fn store(&self) -> &Arc<KnowledgeStore> {
        &self.store
    }

    /// Answer `query`. Never fails and never returns an empty string.
    ///
    /// The LLM is only used when `use_llm` is set and `llm_config` is
    /// given; any LLM failure becomes a short notice, with the cause logged.
    pub async fn generate(
        &self,
        query: &str,
        live: Option<&LiveContext>,
        use_llm: bool,
        llm_config: Option<&LlmSettings>,
    ) -> String {
        let results = self.store.search(query, self.top_k).await;
        let references = reference_block(&results);
        let summary = live_summary(live);
        debug!(results = results.len(), has_summary = !summary.is_empty(), "Composing answer");

        match llm_config {
            Some(config) if use_llm => {
                self.generate_with_llm(query, &references, &summary, config)
                    .await
            }
            _ => compose_locally(query, &references, &summary),
        }
    }

    /// Send a short probe through the gateway; errors propagate.
    pub async fn validate_llm(&self, config: &LlmSettings) -> Result<String, GatewayError> {
        let reply = self
            .gateway
            .complete(config, SYSTEM_PROMPT, PROBE_PROMPT)
            .await?;
        if reply.trim().is_empty() {
            return Err(GatewayError::Provider("empty reply to probe".to_string()));
        }
        Ok(reply)
    }

    async fn generate_with_llm(
        &self,
        query: &str,
        references: &str,
        summary: &str,
        config: &LlmSettings,
    ) -> String {
        if Provider::parse(&config.provider).is_none() {
            warn!(provider = %config.provider, "Unsupported LLM provider requested");
            return format!("不支持的LLM提供商: {}", config.provider);
        }

        let user_prompt = build_user_prompt(query, references, summary);
        match self
            .gateway
            .complete(config, SYSTEM_PROMPT, &user_prompt)
            .await
        {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!(provider = %config.provider, "LLM returned an empty answer");
                LLM_FAILURE_NOTICE.to_string()
            }
            Err(e) => {
                warn!(provider = %config.provider, error = %e, "LLM generation failed");
                LLM_FAILURE_NOTICE.to_string()
            }
        }
    }
}

/// `参考资料 {i}：\n{content}` per result, separated by blank lines.
fn reference_block(results: &[RetrievalResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("参考资料 {}：\n{}", i + 1, r.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Live-state sentence prefixed by a blank line, or `""` when there is
/// nothing to report.
fn live_summary(live: Option<&LiveContext>) -> String {
    let Some(live) = live else {
        return String::new();
    };

    let mut stats = Vec::new();
    if let Some(models) = &live.models {
        stats.push(format!("当前有 {} 个模型", models.len()));
    }
    if let Some(datasets) = &live.datasets {
        stats.push(format!("{} 个数据集", datasets.len()));
    }
    if let Some(tasks) = &live.tasks {
        let count = |status: TaskStatus| tasks.iter().filter(|t| t.status == status).count();
        stats.push(format!(
            "{} 个训练任务正在运行，{} 个已完成",
            count(TaskStatus::Running),
            count(TaskStatus::Completed)
        ));
    }

    if stats.is_empty() {
        String::new()
    } else {
        format!("\n\n当前系统状态：{}", stats.join(", "))
    }
}

fn build_user_prompt(query: &str, references: &str, summary: &str) -> String {
    let mut prompt = format!("用户问题：{}\n\n", query);
    if !references.is_empty() {
        prompt.push_str(&format!("知识库相关内容：\n{}\n\n", references));
    }
    if !summary.is_empty() {
        prompt.push_str(&format!("{}\n\n", summary));
    }
    prompt.push_str("请根据以上信息回答用户问题。");
    prompt
}

fn compose_locally(query: &str, references: &str, summary: &str) -> String {
    if !references.is_empty() {
        let mut answer = format!("{}{}", KNOWLEDGE_HEADING, references);
        if !summary.is_empty() {
            answer.push('\n');
            answer.push_str(summary);
        }
        answer.push_str(GUIDANCE_FOOTER);
        return answer;
    }

    let lower = query.to_lowercase();
    if GREETINGS.iter().any(|g| lower.contains(g)) {
        GREETING_REPLY.to_string()
    } else if HELP_WORDS.iter().any(|h| lower.contains(h)) {
        HELP_REPLY.to_string()
    } else {
        NOT_UNDERSTOOD_REPLY.to_string()
    }
}
