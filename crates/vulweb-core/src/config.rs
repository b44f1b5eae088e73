use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, VulwebError};

/// Top-level configuration for the VulWeb assistant.
///
/// Loaded from `~/.vulweb/config.toml` by default. Each section corresponds
/// to one subsystem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VulwebConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub chat: ChatSettings,
}

impl VulwebConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: VulwebConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| VulwebError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Apply the `AI_*` environment variables on top of the `[llm]` section.
    ///
    /// Empty variables are ignored.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(provider) = get("AI_PROVIDER") {
            self.llm.provider = provider;
        }
        if let Some(key) = get("AI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(secret) = get("AI_SECRET_KEY") {
            self.llm.secret_key = Some(secret);
        }
        if let Some(endpoint) = get("AI_ENDPOINT") {
            self.llm.endpoint = Some(endpoint);
        }
        if let Some(model) = get("AI_MODEL") {
            self.llm.model = Some(model);
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the vector index and other runtime files.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.vulweb/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Knowledge base configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Directory holding one JSON file per knowledge document.
    pub corpus_dir: String,
    /// Attempt to bring up the vector tier at startup.
    pub vector_enabled: bool,
    /// Directory containing `model.onnx` and `tokenizer.json`.
    pub model_dir: String,
    /// Directory holding the persisted vector index snapshot.
    pub index_dir: String,
    /// Number of documents retrieved per RAG answer.
    pub retrieval_top_k: usize,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            corpus_dir: "knowledge_base".to_string(),
            vector_enabled: true,
            model_dir: "~/.vulweb/models/paraphrase-multilingual-MiniLM-L12-v2".to_string(),
            index_dir: "~/.vulweb/data/vector_index".to_string(),
            retrieval_top_k: 2,
        }
    }
}

/// Default external LLM settings, used when a request asks for LLM
/// generation without carrying its own provider configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Provider id: qwen, ernie, zhipu, openai, or none.
    pub provider: String,
    pub api_key: Option<String>,
    /// Secondary credential (ERNIE token exchange).
    pub secret_key: Option<String>,
    pub endpoint: Option<String>,
    /// Model id; `None` uses the provider's own default model.
    pub model: Option<String>,
    /// Upper bound for a single provider round trip.
    pub timeout_secs: u64,
}

impl LlmSettings {
    /// True when a provider other than `none` is configured.
    pub fn is_enabled(&self) -> bool {
        let provider = self.provider.trim();
        !provider.is_empty() && !provider.eq_ignore_ascii_case("none")
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "none".to_string(),
            api_key: None,
            secret_key: None,
            endpoint: None,
            model: None,
            timeout_secs: 30,
        }
    }
}

impl std::fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSettings")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Chat service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// Maximum accepted message length in characters.
    pub max_message_length: usize,
    /// Session id used when the caller does not supply one.
    pub default_session: String,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            max_message_length: 2000,
            default_session: "default".to_string(),
        }
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn resolve_path(path: &str) -> PathBuf {
    if path.starts_with("~/") || path.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&path[2..])
    } else {
        PathBuf::from(path)
    }
}
