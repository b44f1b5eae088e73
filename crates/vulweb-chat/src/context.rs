//! Conversation context and the per-session registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::debug;
use vulweb_core::types::{Message, Role};

use crate::error::ChatError;

// =============================================================================
// ConversationContext
// =============================================================================

/// Message log and free-form metadata of one session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    messages: Vec<Message>,
    metadata: HashMap<String, serde_json::Value>,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message stamped with the current time.
    pub fn add_message(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(Message::new(role, content));
    }

    /// The last `limit` messages, or all of them when `limit` is `None`.
    /// `Some(0)` is an empty slice.
    pub fn messages(&self, limit: Option<usize>) -> &[Message] {
        match limit {
            Some(n) => &self.messages[self.messages.len().saturating_sub(n)..],
            None => &self.messages,
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn metadata(&self) -> &HashMap<String, serde_json::Value> {
        &self.metadata
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata.insert(key.into(), value);
    }

    /// Drop every message and all metadata.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.metadata.clear();
    }
}

// =============================================================================
// SessionRegistry
// =============================================================================

/// Handle to one session's context. Holding the lock serialises that
/// session; other sessions proceed independently.
pub type SessionHandle = Arc<tokio::sync::Mutex<ConversationContext>>;

/// Process-wide map from session id to context, created lazily.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The context for `session_id`, creating an empty one on first access.
    pub fn get_or_create(&self, session_id: &str) -> Result<SessionHandle, ChatError> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|e| ChatError::Session(format!("session lock poisoned: {}", e)))?;
        let handle = sessions.entry(session_id.to_string()).or_insert_with(|| {
            debug!(session = %session_id, "Creating conversation context");
            Arc::new(tokio::sync::Mutex::new(ConversationContext::new()))
        });
        Ok(Arc::clone(handle))
    }

    /// Existing context for `session_id`, without creating one.
    pub fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions
            .lock()
            .ok()
            .and_then(|s| s.get(session_id).cloned())
    }

    /// Ids of every known session, sorted.
    pub fn session_ids(&self) -> Vec<String> {
        let sessions = match self.sessions.lock() {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        let mut ids: Vec<String> = sessions.keys().cloned().collect();
        ids.sort();
        ids
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_limit_messages() {
        let mut ctx = ConversationContext::new();
        ctx.add_message(Role::User, "one");
        ctx.add_message(Role::Assistant, "two");
        ctx.add_message(Role::User, "three");

        assert_eq!(ctx.len(), 3);
        let last_two: Vec<&str> = ctx
            .messages(Some(2))
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(last_two, vec!["two", "three"]);
        assert_eq!(ctx.messages(None).len(), 3);
        assert_eq!(ctx.messages(Some(10)).len(), 3);
        assert!(ctx.messages(Some(0)).is_empty());
    }

    #[test]
    fn test_messages_keep_insertion_order_and_role() {
        let mut ctx = ConversationContext::new();
        ctx.add_message(Role::User, "question");
        ctx.add_message(Role::Assistant, "answer");
        let msgs = ctx.messages(None);
        assert_eq!(msgs[0].role, Role::User);
        assert_eq!(msgs[1].role, Role::Assistant);
        assert!(msgs[0].timestamp <= msgs[1].timestamp);
    }

    #[test]
    fn test_clear_drops_messages_and_metadata() {
        let mut ctx = ConversationContext::new();
        ctx.add_message(Role::User, "hi");
        ctx.set_metadata("last_agent", serde_json::json!("help"));
        ctx.clear();
        assert!(ctx.is_empty());
        assert!(ctx.metadata().is_empty());
    }

    #[tokio::test]
    async fn test_registry_creates_lazily_and_reuses() {
        let registry = SessionRegistry::new();
        assert!(registry.get("a").is_none());

        let first = registry.get_or_create("a").unwrap();
        first.lock().await.add_message(Role::User, "hello");

        let second = registry.get_or_create("a").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_registry_sessions_are_isolated() {
        let registry = SessionRegistry::new();
        registry
            .get_or_create("a")
            .unwrap()
            .lock()
            .await
            .add_message(Role::User, "for a");
        let b = registry.get_or_create("b").unwrap();
        assert!(b.lock().await.is_empty());
        assert_eq!(registry.session_ids(), vec!["a", "b"]);
    }
}
