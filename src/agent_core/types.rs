//! Shared types for the agent core.
//!
//! Conversation messages and the turn state machine's states, progress
//! events and replies.

use serde::{Deserialize, Serialize};

use crate::inference::types::{ChatMessage, Role, ToolCall};
use crate::mcp_client::types::ToolResult;

/// Identifier of a conversation in the store.
pub type ConversationId = String;

// ─── Conversation Messages ──────────────────────────────────────────────────

/// A single message stored in conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    /// Text content. Assistant messages carrying tool calls may have none.
    pub content: Option<String>,
    /// Tool calls made by the assistant in this message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// For `tool` role: the id of the tool call this result answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// For `tool` role: the tool's name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// RFC 3339 creation time.
    pub timestamp: String,
}

impl Message {
    fn with_role(role: Role, content: Option<String>) -> Self {
        Self {
            role,
            content,
            tool_calls: None,
            tool_call_id: None,
            name: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, Some(content.into()))
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, Some(content.into()))
    }

    /// Assistant message; `tool_calls` is stored only when non-empty.
    pub fn assistant(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        let mut msg = Self::with_role(Role::Assistant, content);
        if !tool_calls.is_empty() {
            msg.tool_calls = Some(tool_calls);
        }
        msg
    }

    /// Tool-role message recording one dispatched call's outcome.
    pub fn tool(result: &ToolResult) -> Self {
        let mut msg = Self::with_role(Role::Tool, Some(result.message_content()));
        msg.tool_call_id = Some(result.tool_call_id.clone());
        msg.name = Some(result.name.clone());
        msg
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|tc| !tc.is_empty())
    }

    /// Convert to the provider wire message.
    pub fn to_chat_message(&self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content.clone(),
            tool_call_id: self.tool_call_id.clone(),
            name: self.name.clone(),
            tool_calls: self
                .tool_calls
                .as_ref()
                .map(|calls| calls.iter().map(ToolCall::to_response).collect()),
        }
    }
}

// ─── Turn State Machine ─────────────────────────────────────────────────────

/// Where a turn currently is in the two-phase completion protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    AwaitingInput,
    RequestingCompletion,
    ToolsRequested,
    ExecutingTools,
    RequestingFinalCompletion,
    Done,
}

/// Progress emitted while a turn runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    StateChanged {
        conversation_id: ConversationId,
        from: TurnState,
        to: TurnState,
    },
    ToolsRequested {
        conversation_id: ConversationId,
        tool_names: Vec<String>,
    },
    ToolResults {
        conversation_id: ConversationId,
        results: Vec<ToolResult>,
    },
}

/// Outcome of one handled turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnReply {
    pub conversation_id: ConversationId,
    /// Final assistant text shown to the user.
    pub content: String,
    /// Every tool result produced during the turn, in dispatch order.
    pub tool_results: Vec<ToolResult>,
    /// Tool rounds executed.
    pub tool_rounds: usize,
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::types::RawArguments;

    #[test]
    fn test_assistant_without_calls_has_none() {
        let msg = Message::assistant(Some("hi".into()), Vec::new());
        assert!(msg.tool_calls.is_none());
        assert!(!msg.has_tool_calls());
        assert!(chrono::DateTime::parse_from_rfc3339(&msg.timestamp).is_ok());
    }

    #[test]
    fn test_tool_message_from_result() {
        let ok = ToolResult::success("call_1", "get_current_time", serde_json::json!("2024-01-01T00:00:00"));
        let msg = Message::tool(&ok);
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.content.as_deref(), Some("\"2024-01-01T00:00:00\""));
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(msg.name.as_deref(), Some("get_current_time"));

        let err = ToolResult::failure("call_2", "unknown_tool", "tool not found");
        assert_eq!(Message::tool(&err).content.as_deref(), Some("tool not found"));
    }

    #[test]
    fn test_to_chat_message_carries_tool_calls() {
        let call = ToolCall {
            id: "call_1".into(),
            name: "echo".into(),
            arguments: RawArguments::Encoded(r#"{"message":"x"}"#.into()),
        };
        let chat = Message::assistant(None, vec![call]).to_chat_message();
        let calls = chat.tool_calls.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "echo");
        assert!(chat.content.is_none());
    }

    #[test]
    fn test_turn_event_serializes_tagged() {
        let event = TurnEvent::ToolsRequested {
            conversation_id: "conv_1".into(),
            tool_names: vec!["echo".into()],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "tools_requested");
        assert_eq!(json["tool_names"][0], "echo");
    }
}
