//! Error types for the chat service and the LLM gateway.

use vulweb_core::error::VulwebError;

/// Errors from an external LLM provider call.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Network, HTTP status, authentication or response-shape failure.
    #[error("provider error: {0}")]
    Provider(String),
    /// Unknown provider id or missing credentials.
    #[error("LLM configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        // The URL may carry credentials in its query string.
        let err = err.without_url();
        if err.is_timeout() {
            GatewayError::Provider(format!("request timed out: {}", err))
        } else {
            GatewayError::Provider(err.to_string())
        }
    }
}

/// Errors from the chat service.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("platform error: {0}")]
    Platform(String),
    #[error("knowledge error: {0}")]
    Knowledge(String),
    #[error("LLM error: {0}")]
    Llm(#[from] GatewayError),
    #[error("session error: {0}")]
    Session(String),
}

impl From<VulwebError> for ChatError {
    fn from(err: VulwebError) -> Self {
        match err {
            VulwebError::Platform(msg) => ChatError::Platform(msg),
            VulwebError::Search(msg) | VulwebError::Retrieval(msg) => ChatError::Knowledge(msg),
            other => ChatError::Platform(other.to_string()),
        }
    }
}
