//! Shared types for the inference client.
//!
//! These mirror the OpenAI Chat Completions API types, used for both
//! request building and response parsing, plus the provider-neutral
//! `CompletionRequest` / `CompletionResponse` pair the orchestrator speaks.

use serde::{Deserialize, Serialize};

// ─── Request Types ───────────────────────────────────────────────────────────

/// A single message in the conversation.
///
/// Serialization notes for OpenAI-compatible providers:
/// - `content` is sent as `""` (not `null`) for assistant messages with tool
///   calls; several providers reject `null` content.
/// - `tool_call_id`, `name` and `tool_calls` are skipped when `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(serialize_with = "serialize_content")]
    pub content: Option<String>,
    /// Tool call results are sent back as `tool` role messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Name of the tool that produced a `tool` role message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Assistant messages may contain tool calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallResponse>>,
}

/// Emit `""` instead of `null` when `content` is `None`.
fn serialize_content<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(s) => serializer.serialize_str(s),
        None => serializer.serialize_str(""),
    }
}

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Tool definition sent in the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub r#type: String,
    pub function: FunctionDefinition,
}

/// Function definition within a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Request body for `POST {base_url}/chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub stream: bool,
}

// ─── Tool Calls ──────────────────────────────────────────────────────────────

/// Arguments of a tool call as the model produced them.
///
/// Providers normally send a JSON-encoded string, but some send an object
/// directly. Neither form is trusted until [`RawArguments::normalize`] runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawArguments {
    Encoded(String),
    Structured(serde_json::Value),
}

impl RawArguments {
    /// Normalize to an argument map.
    ///
    /// Undecodable text, and any value that is not a JSON object (including
    /// `null`), becomes an empty map. Never fails.
    pub fn normalize(&self) -> serde_json::Map<String, serde_json::Value> {
        let value = match self {
            RawArguments::Encoded(text) => {
                if text.trim().is_empty() {
                    return serde_json::Map::new();
                }
                match serde_json::from_str::<serde_json::Value>(text) {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::debug!(
                            raw = %text,
                            error = %e,
                            "tool arguments are not valid JSON, using empty arguments"
                        );
                        return serde_json::Map::new();
                    }
                }
            }
            RawArguments::Structured(v) => v.clone(),
        };

        match value {
            serde_json::Value::Object(map) => map,
            other => {
                tracing::debug!(
                    value = %other,
                    "tool arguments are not an object, using empty arguments"
                );
                serde_json::Map::new()
            }
        }
    }

    /// Wire form: the JSON-encoded argument string.
    pub fn to_encoded(&self) -> String {
        match self {
            RawArguments::Encoded(text) => text.clone(),
            RawArguments::Structured(v) => v.to_string(),
        }
    }
}

impl Default for RawArguments {
    fn default() -> Self {
        RawArguments::Encoded(String::new())
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned id (generated if the model doesn't provide one).
    pub id: String,
    pub name: String,
    pub arguments: RawArguments,
}

impl ToolCall {
    /// Render in the OpenAI response format, for replaying history.
    ///
    /// Arguments are always sent back as a JSON-encoded string.
    pub fn to_response(&self) -> ToolCallResponse {
        ToolCallResponse {
            id: self.id.clone(),
            r#type: "function".to_string(),
            function: FunctionCallResponse {
                name: self.name.clone(),
                arguments: RawArguments::Encoded(self.arguments.to_encoded()),
            },
        }
    }
}

/// Tool call as returned in the OpenAI response format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_tool_type")]
    pub r#type: String,
    pub function: FunctionCallResponse,
}

fn default_tool_type() -> String {
    "function".to_string()
}

/// Function call details in a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallResponse {
    pub name: String,
    #[serde(default)]
    pub arguments: RawArguments,
}

// ─── Provider-Neutral Types ─────────────────────────────────────────────────

/// What the orchestrator asks a completion provider for.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    /// Tools the model may call. `None` means no tools are offered.
    pub tools: Option<Vec<ToolDefinition>>,
    pub tool_choice: Option<String>,
}

/// One assistant message returned by a completion provider.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompletionResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl CompletionResponse {
    /// A plain text answer with no tool calls.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
