//! Shared types for the tool server client.
//!
//! Wire structures for the tool server's HTTP API and the structured result
//! produced for every dispatched tool call.

use serde::{Deserialize, Serialize};

// ─── Tool Server Wire Types ─────────────────────────────────────────────────

/// One entry of the `GET /tools` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Parameter name → JSON-schema-like type descriptor.
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
    /// Names of required parameters.
    #[serde(default, alias = "required_parameters")]
    pub required: Vec<String>,
}

/// Body of a `POST /tools/{name}` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolInvocationResponse {
    #[serde(default)]
    pub result: serde_json::Value,
}

// ─── Connection Status ──────────────────────────────────────────────────────

/// How the client's current registry was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Discovery has not run yet.
    Disconnected,
    /// The registry came from the remote server.
    Connected,
    /// The server was unreachable and the built-in fallback tools are in use.
    Fallback,
}

// ─── Tool Results ───────────────────────────────────────────────────────────

/// Outcome of one dispatched tool call: exactly one of a result or an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ToolOutcome {
    #[serde(rename = "result")]
    Success(serde_json::Value),
    #[serde(rename = "error")]
    Failure(String),
}

/// Structured result of a dispatched tool call.
///
/// Serializes flat: `{"tool_call_id", "name", "result"}` or
/// `{"tool_call_id", "name", "error"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub name: String,
    #[serde(flatten)]
    pub outcome: ToolOutcome,
}

impl ToolResult {
    pub fn success(tool_call_id: &str, name: &str, value: serde_json::Value) -> Self {
        Self {
            tool_call_id: tool_call_id.to_string(),
            name: name.to_string(),
            outcome: ToolOutcome::Success(value),
        }
    }

    pub fn failure(tool_call_id: &str, name: &str, error: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.to_string(),
            name: name.to_string(),
            outcome: ToolOutcome::Failure(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Failure(_))
    }

    pub fn result(&self) -> Option<&serde_json::Value> {
        match &self.outcome {
            ToolOutcome::Success(v) => Some(v),
            ToolOutcome::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            ToolOutcome::Success(_) => None,
            ToolOutcome::Failure(e) => Some(e),
        }
    }

    /// Content of the tool-role message recorded for this result: the JSON
    /// serialization of the result, or the error string verbatim.
    pub fn message_content(&self) -> String {
        match &self.outcome {
            ToolOutcome::Success(v) => {
                serde_json::to_string(v).unwrap_or_else(|_| "null".to_string())
            }
            ToolOutcome::Failure(e) => e.clone(),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_defaults() {
        let json = r#"{"name": "get_current_time"}"#;
        let d: ToolDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(d.name, "get_current_time");
        assert!(d.description.is_empty());
        assert!(d.parameters.is_empty());
        assert!(d.required.is_empty());
    }

    #[test]
    fn test_descriptor_full() {
        let json = r#"{
            "name": "weather_info",
            "description": "Get weather",
            "parameters": {"city": {"type": "string"}},
            "required": ["city"]
        }"#;
        let d: ToolDescriptor = serde_json::from_str(json).unwrap();
        assert!(d.parameters.contains_key("city"));
        assert_eq!(d.required, vec!["city"]);
    }

    #[test]
    fn test_tool_result_serializes_flat() {
        let ok = ToolResult::success("call_1", "echo", serde_json::json!("hi"));
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["tool_call_id"], "call_1");
        assert_eq!(json["result"], "hi");
        assert!(json.get("error").is_none());

        let err = ToolResult::failure("call_2", "nope", "tool not found");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["error"], "tool not found");
        assert!(json.get("result").is_none());
    }

    #[test]
    fn test_message_content() {
        let ok = ToolResult::success("c", "t", serde_json::json!({"temp": 21}));
        assert_eq!(ok.message_content(), r#"{"temp":21}"#);

        let err = ToolResult::failure("c", "t", "boom");
        assert_eq!(err.message_content(), "boom");
    }

    #[test]
    fn test_invocation_response_missing_result_is_null() {
        let resp: ToolInvocationResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.result.is_null());
    }
}
