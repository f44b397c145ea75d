//! ConversationStore: in-memory conversation history with a windowed view.
//!
//! Responsibilities:
//! - Create and end conversations
//! - Append messages, serialized per conversation
//! - Return the most recent `N` messages as the model's context window
//! - Build `Vec<ChatMessage>` for the inference client
//!
//! Full history is always retained; the window is a read-only slice of it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use uuid::Uuid;

use crate::inference::types::ChatMessage;

use super::errors::AgentError;
use super::types::{ConversationId, Message};

/// Default number of messages in the context window.
pub const DEFAULT_CONTEXT_WINDOW: usize = 10;

type History = Arc<Mutex<Vec<Message>>>;

// ─── ConversationStore ──────────────────────────────────────────────────────

/// Owns every live conversation's history.
///
/// The id → history map sits behind a `RwLock` so lookups in different
/// conversations run in parallel; each history has its own `Mutex` so appends
/// to one conversation are serialized.
#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: RwLock<HashMap<ConversationId, History>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an empty conversation and return its id.
    ///
    /// Ids look like `conv_20240101120000_1a2b3c4d`: start time plus a random
    /// suffix.
    pub fn new_conversation(&self) -> ConversationId {
        let mut map = self
            .conversations
            .write()
            .unwrap_or_else(|p| p.into_inner());

        let id = loop {
            let candidate = generate_conversation_id();
            if !map.contains_key(&candidate) {
                break candidate;
            }
        };

        map.insert(id.clone(), Arc::new(Mutex::new(Vec::new())));
        tracing::debug!(conversation_id = %id, "conversation started");
        id
    }

    /// Drop a conversation and its history. Returns whether it existed.
    pub fn end_conversation(&self, id: &str) -> bool {
        let removed = self
            .conversations
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .remove(id)
            .is_some();
        if removed {
            tracing::debug!(conversation_id = %id, "conversation ended");
        }
        removed
    }

    pub fn contains(&self, id: &str) -> bool {
        self.conversations
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .contains_key(id)
    }

    /// Ids of all live conversations, sorted.
    pub fn conversation_ids(&self) -> Vec<ConversationId> {
        let mut ids: Vec<ConversationId> = self
            .conversations
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    // ─── Message Operations ─────────────────────────────────────────────

    /// Append a message and return the new history length.
    pub fn append(&self, id: &str, message: Message) -> Result<usize, AgentError> {
        let history = self.history_handle(id)?;
        let mut messages = history.lock().map_err(|_| AgentError::LockPoisoned {
            conversation_id: id.to_string(),
        })?;
        messages.push(message);
        Ok(messages.len())
    }

    /// The most recent `window_size` messages (or fewer), oldest first.
    pub fn get_context(&self, id: &str, window_size: usize) -> Result<Vec<Message>, AgentError> {
        self.with_history(id, |messages| {
            let start = messages.len().saturating_sub(window_size);
            messages[start..].to_vec()
        })
    }

    /// The full history, oldest first.
    pub fn get_history(&self, id: &str) -> Result<Vec<Message>, AgentError> {
        self.with_history(id, |messages| messages.to_vec())
    }

    /// Number of messages in the history.
    pub fn len(&self, id: &str) -> Result<usize, AgentError> {
        self.with_history(id, |messages| messages.len())
    }

    pub fn is_empty(&self, id: &str) -> Result<bool, AgentError> {
        self.len(id).map(|n| n == 0)
    }

    // ─── Internals ──────────────────────────────────────────────────────

    fn history_handle(&self, id: &str) -> Result<History, AgentError> {
        self.conversations
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(id)
            .cloned()
            .ok_or_else(|| AgentError::ConversationNotFound {
                conversation_id: id.to_string(),
            })
    }

    fn with_history<T>(&self, id: &str, f: impl FnOnce(&[Message]) -> T) -> Result<T, AgentError> {
        let history = self.history_handle(id)?;
        let messages = history.lock().map_err(|_| AgentError::LockPoisoned {
            conversation_id: id.to_string(),
        })?;
        Ok(f(&messages))
    }
}

/// Convert stored messages to provider wire messages.
pub fn to_chat_messages(messages: &[Message]) -> Vec<ChatMessage> {
    messages.iter().map(Message::to_chat_message).collect()
}

fn generate_conversation_id() -> ConversationId {
    let started = chrono::Local::now().format("%Y%m%d%H%M%S");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("conv_{started}_{}", &suffix[..8])
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::types::Role;

    #[test]
    fn test_conversation_id_format() {
        let store = ConversationStore::new();
        let id = store.new_conversation();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "conv");
        assert_eq!(parts[1].len(), 14);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_ids_are_unique() {
        let store = ConversationStore::new();
        let a = store.new_conversation();
        let b = store.new_conversation();
        assert_ne!(a, b);
        assert_eq!(store.conversation_ids().len(), 2);
    }

    #[test]
    fn test_append_returns_new_length() {
        let store = ConversationStore::new();
        let id = store.new_conversation();
        assert_eq!(store.append(&id, Message::user("a")).unwrap(), 1);
        assert_eq!(store.append(&id, Message::user("b")).unwrap(), 2);
        assert_eq!(store.len(&id).unwrap(), 2);
    }

    #[test]
    fn test_window_of_ten_over_fifteen() {
        let store = ConversationStore::new();
        let id = store.new_conversation();
        for i in 1..=15 {
            store.append(&id, Message::user(format!("m{i}"))).unwrap();
        }

        let context = store.get_context(&id, 10).unwrap();
        assert_eq!(context.len(), 10);
        assert_eq!(context[0].content.as_deref(), Some("m6"));
        assert_eq!(context[9].content.as_deref(), Some("m15"));

        assert_eq!(store.len(&id).unwrap(), 15);
        assert_eq!(store.get_history(&id).unwrap().len(), 15);
    }

    #[test]
    fn test_window_larger_than_history() {
        let store = ConversationStore::new();
        let id = store.new_conversation();
        store.append(&id, Message::user("only")).unwrap();
        assert_eq!(store.get_context(&id, 10).unwrap().len(), 1);
        assert!(store.get_context(&id, 0).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_conversation() {
        let store = ConversationStore::new();
        let err = store.append("conv_missing", Message::user("x")).unwrap_err();
        assert!(matches!(err, AgentError::ConversationNotFound { .. }));
        assert!(store.get_context("conv_missing", 10).is_err());
        assert!(store.len("conv_missing").is_err());
    }

    #[test]
    fn test_end_conversation() {
        let store = ConversationStore::new();
        let id = store.new_conversation();
        store.append(&id, Message::user("x")).unwrap();
        assert!(store.end_conversation(&id));
        assert!(!store.contains(&id));
        assert!(!store.end_conversation(&id));
        assert!(store.get_history(&id).is_err());
    }

    #[test]
    fn test_conversations_are_independent() {
        let store = ConversationStore::new();
        let a = store.new_conversation();
        let b = store.new_conversation();
        store.append(&a, Message::user("a1")).unwrap();
        store.append(&a, Message::user("a2")).unwrap();
        store.append(&b, Message::user("b1")).unwrap();
        assert_eq!(store.len(&a).unwrap(), 2);
        assert_eq!(store.len(&b).unwrap(), 1);
    }

    #[test]
    fn test_concurrent_appends_are_all_kept() {
        let store = Arc::new(ConversationStore::new());
        let id = store.new_conversation();

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                let id = id.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        store.append(&id, Message::user(format!("{t}-{i}"))).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.len(&id).unwrap(), 200);
    }

    #[test]
    fn test_to_chat_messages() {
        let messages = vec![Message::user("hi"), Message::assistant(Some("hello".into()), vec![])];
        let chat = to_chat_messages(&messages);
        assert_eq!(chat.len(), 2);
        assert_eq!(chat[0].role, Role::User);
        assert_eq!(chat[1].content.as_deref(), Some("hello"));
    }
}
