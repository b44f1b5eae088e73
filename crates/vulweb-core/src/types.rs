use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Conversation
// =============================================================================

/// Author of a conversation message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single message in a conversation log. Immutable once appended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a message stamped with the current time.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Shape of an agent or composer reply.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    #[default]
    Text,
    Structured,
}

/// Reply produced by a capability agent or the response composer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentReply {
    #[serde(rename = "type")]
    pub kind: ReplyKind,
    pub content: String,
    /// Optional structured attachment, e.g. the list of matching entities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl AgentReply {
    /// Plain text reply without attachment.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: ReplyKind::Text,
            content: content.into(),
            data: None,
        }
    }

    /// Text reply carrying a structured attachment.
    pub fn with_data(content: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            kind: ReplyKind::Structured,
            content: content.into(),
            data: Some(data),
        }
    }
}

// =============================================================================
// Knowledge base
// =============================================================================

/// Metadata block of an on-disk knowledge document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub difficulty: String,
}

/// A document of the knowledge corpus.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

impl KnowledgeDocument {
    /// Text used for both embedding and answer composition.
    pub fn searchable_text(&self) -> String {
        format!("{}\n\n{}", self.title, self.content)
    }

    pub fn difficulty(&self) -> &str {
        &self.metadata.difficulty
    }
}

/// Subset of document fields attached to a retrieval result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalMetadata {
    pub id: String,
    pub title: String,
    pub category: String,
    /// Comma-joined tag list.
    pub tags: String,
    pub difficulty: String,
}

impl From<&KnowledgeDocument> for RetrievalMetadata {
    fn from(doc: &KnowledgeDocument) -> Self {
        Self {
            id: doc.id.clone(),
            title: doc.title.clone(),
            category: doc.category.clone(),
            tags: doc.tags.join(","),
            difficulty: doc.metadata.difficulty.clone(),
        }
    }
}

/// How a retrieval result was ranked.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relevance {
    /// Keyword tier: higher is better.
    Score(u32),
    /// Vector tier: cosine distance, lower is better.
    Distance(f64),
}

/// A single knowledge retrieval hit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub content: String,
    pub metadata: RetrievalMetadata,
    pub relevance: Relevance,
}

// =============================================================================
// Platform records
// =============================================================================

/// A registered machine-learning model.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelRecord {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub model_type: Option<String>,
    /// Fraction in `[0, 1]`.
    pub accuracy: Option<f64>,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1_score: Option<f64>,
}

/// A registered dataset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetRecord {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    pub format: Option<String>,
    /// Size in bytes.
    pub size: Option<u64>,
    pub num_samples: Option<u64>,
    pub num_vulnerable: Option<u64>,
    pub num_safe: Option<u64>,
    pub preprocessing_status: Option<String>,
}

/// Lifecycle state of a training task.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A model training task.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingTaskRecord {
    pub id: u64,
    pub name: String,
    pub model_id: Option<u64>,
    pub dataset_id: Option<u64>,
    pub status: TaskStatus,
    /// Percentage in `[0, 100]`.
    pub progress: f64,
    pub current_epoch: u32,
    pub total_epochs: Option<u32>,
    pub loss: Option<f64>,
    pub accuracy: Option<f64>,
}

/// Live platform state handed to the response composer.
///
/// Each list is optional: an absent list contributes nothing to the
/// live-state summary.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveContext {
    pub models: Option<Vec<ModelRecord>>,
    pub datasets: Option<Vec<DatasetRecord>>,
    pub tasks: Option<Vec<TrainingTaskRecord>>,
}

impl LiveContext {
    pub fn is_empty(&self) -> bool {
        self.models.is_none() && self.datasets.is_none() && self.tasks.is_none()
    }
}
