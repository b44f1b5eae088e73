//! `vulweb` terminal driver.
//!
//! Composition root: resolves configuration, initialises logging, builds the
//! knowledge store and platform view, and drives [`ChatService`] from the
//! command line.

mod cli;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter};

use cli::{CliArgs, Command};
use vulweb_chat::{ChatError, ChatOutcome, ChatRequest, ChatService};
use vulweb_core::config::VulwebConfig;
use vulweb_core::platform::InMemoryPlatform;
use vulweb_core::types::{Message, Relevance};
use vulweb_knowledge::{KnowledgeStore, StoreStatus};

type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> AppResult<()> {
    let args = CliArgs::parse();

    // Tracing goes to stderr so replies stay clean on stdout. It starts
    // before the config is read so config loading is logged; the filter is
    // narrowed to the configured level afterwards unless set explicitly.
    let explicit_filter = args.explicit_log_filter();
    let (filter, filter_handle) = reload::Layer::new(env_filter(
        explicit_filter.as_deref().unwrap_or("info"),
    ));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = if config_file.exists() {
        VulwebConfig::load(&config_file)?
    } else {
        VulwebConfig::default()
    };
    config.apply_env_overrides();

    if explicit_filter.is_none() {
        let level = &config.general.log_level;
        if let Err(e) = filter_handle.reload(env_filter(level)) {
            tracing::warn!(level = %level, error = %e, "Failed to apply configured log level");
        }
    }

    tracing::info!("Starting VulWeb assistant v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        path = %config_file.display(),
        found = config_file.exists(),
        provider = %config.llm.provider,
        "Configuration resolved"
    );

    // Platform view.
    let platform = match args.platform.as_deref() {
        Some(path) => load_platform(path)?,
        None => {
            tracing::warn!("No --platform snapshot given; platform queries will see no records");
            Arc::new(InMemoryPlatform::default())
        }
    };

    // Knowledge store (single shared instance).
    let store = Arc::new(KnowledgeStore::from_config(&config.knowledge).await);
    let status = store.status();
    tracing::info!(tier = ?status.tier, documents = status.documents, "Knowledge store ready");

    let service = ChatService::new(Arc::clone(&store), platform, &config)?;
    let session = args
        .session
        .clone()
        .unwrap_or_else(|| config.chat.default_session.clone());

    match args.command {
        Command::Chat { rag, llm } => run_chat(&service, &session, rag, llm).await?,
        Command::Ask { message, llm } => {
            warn_if_llm_disabled(&service, llm);
            let outcome = service.ask(rag_request(message, &session, llm)).await?;
            println!("{}", outcome.reply.content);
        }
        Command::Route { message, json } => {
            let outcome = service.process_message(&message, &session).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_outcome(&outcome);
            }
        }
        Command::Search { query, top_k } => {
            let results = store.search(&query, top_k).await;
            print_status(&store.status());
            if results.is_empty() {
                println!("No matching documents.");
            }
            for (rank, hit) in results.iter().enumerate() {
                let relevance = match hit.relevance {
                    Relevance::Score(score) => format!("score {}", score),
                    Relevance::Distance(d) => format!("distance {:.4}", d),
                };
                println!(
                    "{}. [{}] {} ({}, {})",
                    rank + 1,
                    hit.metadata.id,
                    hit.metadata.title,
                    hit.metadata.category,
                    relevance
                );
            }
        }
        Command::Reload => {
            let status = service.reload_knowledge().await;
            print_status(&status);
        }
        Command::TestLlm {
            provider,
            model,
            endpoint,
        } => {
            let mut settings = service.default_llm().clone();
            if let Some(provider) = provider {
                settings.provider = provider;
            }
            if model.is_some() {
                settings.model = model;
            }
            if endpoint.is_some() {
                settings.endpoint = endpoint;
            }
            match service.test_llm(&settings).await {
                Ok(reply) => println!("{} connection OK: {}", settings.provider, reply),
                Err(e) => {
                    tracing::error!(provider = %settings.provider, error = %e, "LLM test failed");
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}

fn env_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn load_platform(path: &Path) -> AppResult<Arc<InMemoryPlatform>> {
    match InMemoryPlatform::load(path) {
        Ok(platform) => Ok(Arc::new(platform)),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to load platform snapshot");
            Err(e.into())
        }
    }
}

fn rag_request(message: String, session: &str, use_llm: bool) -> ChatRequest {
    ChatRequest {
        message,
        session_id: Some(session.to_string()),
        use_llm,
        llm_config: None,
    }
}

fn warn_if_llm_disabled(service: &ChatService, use_llm: bool) {
    if use_llm && !service.default_llm().is_enabled() {
        tracing::warn!("--llm requested but no provider is configured; answering locally");
    }
}

// =============================================================================
// Interactive session
// =============================================================================

const CHAT_HELP: &str = "Commands:
  /ask <question>   answer from the knowledge base
  /agent <message>  route to a capability agent
  /history [n]      show the last n messages
  /clear            clear this session
  /reload           rebuild the knowledge store
  /status           show the knowledge store status
  /quit             leave";

async fn run_chat(service: &ChatService, session: &str, rag: bool, llm: bool) -> AppResult<()> {
    warn_if_llm_disabled(service, llm);
    println!("VulWeb assistant (session \"{}\"). Type /help for commands.", session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        let result = match command {
            "/quit" | "/exit" => break,
            "/help" => {
                println!("{}", CHAT_HELP);
                continue;
            }
            "/clear" => {
                service.clear(session).await;
                println!("Conversation cleared.");
                continue;
            }
            "/history" => {
                let limit = rest.parse::<usize>().ok();
                print_history(&service.history(session, limit).await);
                continue;
            }
            "/reload" => {
                print_status(&service.reload_knowledge().await);
                continue;
            }
            "/status" => {
                print_status(&service.knowledge_status());
                continue;
            }
            "/ask" => service.ask(rag_request(rest.to_string(), session, llm)).await,
            "/agent" => service.process_message(rest, session).await,
            _ if rag => service.ask(rag_request(line.to_string(), session, llm)).await,
            _ => service.process_message(line, session).await,
        };

        match result {
            Ok(outcome) => print_outcome(&outcome),
            Err(e @ (ChatError::EmptyMessage | ChatError::MessageTooLong(_))) => {
                println!("{}", e);
            }
            Err(e) => {
                tracing::error!(session = %session, error = %e, "Message failed");
                println!("{}", e);
            }
        }
    }

    Ok(())
}

// =============================================================================
// Output
// =============================================================================

fn print_outcome(outcome: &ChatOutcome) {
    println!("{}", outcome.reply.content);
    if let Some(ref data) = outcome.reply.data {
        tracing::debug!(data = %data, "Structured reply attachment");
    }
    println!();
}

fn print_history(messages: &[Message]) {
    if messages.is_empty() {
        println!("(no messages)");
    }
    for msg in messages {
        println!(
            "[{}] {}: {}",
            msg.timestamp.format("%H:%M:%S"),
            msg.role.as_str(),
            msg.content
        );
    }
}

fn print_status(status: &StoreStatus) {
    println!(
        "Knowledge store: {:?} tier, {} documents",
        status.tier, status.documents
    );
}
