//! Agent Core: conversation state and turn orchestration.
//!
//! Submodules:
//! - `conversation`: In-memory conversation history and context windows
//! - `tool_router`: Dispatches model tool calls to the tool server
//! - `orchestrator`: Two-phase completion protocol (model → tools → model)
//! - `types`: Shared types across the agent core
//! - `errors`: Agent-level error types

pub mod conversation;
pub mod errors;
pub mod orchestrator;
pub mod tool_router;
pub mod types;

// Re-exports for convenience
pub use conversation::ConversationStore;
pub use errors::AgentError;
pub use orchestrator::Orchestrator;
pub use tool_router::{DispatchMode, ToolRouter};
pub use types::{ConversationId, Message, TurnEvent, TurnReply, TurnState};
