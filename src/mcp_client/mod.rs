//! MCP Client: HTTP access to the remote tool server.
//!
//! This module handles:
//! - Tool discovery with retry, backoff and a built-in fallback tool set
//! - Category inference and the in-memory tool registry
//! - Single tool invocation, with local handlers when the server is down
//!
//! The MCP Client is used by the ToolRouter to execute tool calls requested
//! by the model.

pub mod client;
pub mod discovery;
pub mod errors;
pub mod fallback;
pub mod registry;
pub mod types;

// Re-exports for convenience
pub use client::McpClient;
pub use errors::McpError;
pub use registry::{Tool, ToolCategory, ToolRegistry, ToolsSummary};
pub use types::{ConnectionStatus, ToolDescriptor, ToolOutcome, ToolResult};
