//! Inference Client: OpenAI-compatible completion provider.
//!
//! This module handles all communication with the language model:
//! - Non-streaming chat completions with optional tool definitions
//! - Parsing tool calls out of the assistant message
//! - The `CompletionProvider` seam the orchestrator depends on
//!
//! The client speaks the OpenAI Chat Completions API, so switching providers
//! is a config change, not a code change.

pub mod client;
pub mod errors;
pub mod types;

// Re-exports for convenience
pub use client::{CompletionProvider, InferenceClient};
pub use errors::InferenceError;
pub use types::{
    ChatMessage, CompletionRequest, CompletionResponse, RawArguments, Role, ToolCall,
    ToolDefinition,
};
