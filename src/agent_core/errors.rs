//! Agent Core error types.

use thiserror::Error;

use crate::inference::InferenceError;
use crate::mcp_client::McpError;

/// Errors that can occur while handling a conversation turn.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No conversation with this id exists in the store.
    #[error("conversation not found: '{conversation_id}'")]
    ConversationNotFound { conversation_id: String },

    /// The tool server could not be reached.
    #[error("tool server connection failed: {0}")]
    Connection(McpError),

    /// Any other tool server failure that escaped the dispatcher.
    #[error("tool server error: {0}")]
    Tool(McpError),

    /// The completion provider failed; the turn is aborted.
    #[error("completion provider error: {0}")]
    CompletionProvider(#[from] InferenceError),

    /// The caller's deadline elapsed before the turn finished.
    #[error("turn exceeded its deadline of {timeout_ms}ms")]
    DeadlineExceeded { timeout_ms: u64 },

    /// A conversation lock was poisoned by a panicking writer.
    #[error("conversation lock poisoned: '{conversation_id}'")]
    LockPoisoned { conversation_id: String },
}

impl From<McpError> for AgentError {
    fn from(e: McpError) -> Self {
        match e {
            McpError::Connection { .. } => AgentError::Connection(e),
            other => AgentError::Tool(other),
        }
    }
}
