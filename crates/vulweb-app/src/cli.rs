//! CLI argument definitions for the `vulweb` terminal driver.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// VulWeb assistant: platform Q&A and knowledge-base answers from the terminal.
#[derive(Parser, Debug)]
#[command(name = "vulweb", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// JSON snapshot of platform models, datasets and training tasks.
    #[arg(short = 'p', long = "platform", global = true)]
    pub platform: Option<PathBuf>,

    /// Conversation session id (defaults to the configured session).
    #[arg(short = 's', long = "session", global = true)]
    pub session: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Interactive session reading one message per line from stdin.
    Chat {
        /// Answer plain lines from the knowledge base instead of the agents.
        #[arg(long)]
        rag: bool,
        /// Use the configured LLM provider for knowledge answers.
        #[arg(long)]
        llm: bool,
    },
    /// Answer one question from the knowledge base.
    Ask {
        message: String,
        /// Generate the answer with the configured LLM provider.
        #[arg(long)]
        llm: bool,
    },
    /// Route one message to a capability agent.
    Route {
        message: String,
        /// Print the full outcome as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Search the knowledge base and print the raw hits.
    Search {
        query: String,
        #[arg(short = 'k', long = "top-k", default_value_t = 5)]
        top_k: usize,
    },
    /// Rebuild the knowledge store from the corpus directory.
    Reload,
    /// Send a probe prompt to an LLM provider.
    TestLlm {
        /// Provider id overriding the configured one.
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        endpoint: Option<String>,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > VULWEB_CONFIG env var > ~/.vulweb/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("VULWEB_CONFIG") {
            if !p.trim().is_empty() {
                return PathBuf::from(p);
            }
        }
        default_config_path()
    }

    /// Log filter given explicitly: --log-level flag > RUST_LOG env var.
    ///
    /// `None` means the config file's `log_level` applies.
    pub fn explicit_log_filter(&self) -> Option<String> {
        if let Some(ref level) = self.log_level {
            return Some(level.clone());
        }
        std::env::var("RUST_LOG")
            .ok()
            .filter(|filter| !filter.trim().is_empty())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".vulweb").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".vulweb").join("config.toml");
    }
    PathBuf::from("config.toml")
}
