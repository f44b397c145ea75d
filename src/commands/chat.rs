//! Chat session bridge for front-ends.
//!
//! A `ChatSession` wires the tool client, completion provider, conversation
//! store and orchestrator together, and turns every turn outcome into a
//! displayable reply string. The line-based binary in `main.rs` is one
//! front-end; anything that can send text and show text can be another.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::agent_core::{
    AgentError, ConversationId, ConversationStore, Orchestrator, ToolRouter, TurnEvent,
};
use crate::config::{AppConfig, McpConfig};
use crate::inference::InferenceClient;
use crate::mcp_client::McpClient;
use crate::mcp_client::registry::ToolsSummary;
use crate::mcp_client::types::ConnectionStatus;

// ─── Response Types ─────────────────────────────────────────────────────────

/// Session start response.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub conversation_id: ConversationId,
    pub status: ConnectionStatus,
    pub tool_count: usize,
}

// ─── ChatSession ────────────────────────────────────────────────────────────

/// One user's chat: a conversation plus everything needed to run its turns.
pub struct ChatSession {
    orchestrator: Orchestrator,
    mcp: McpConfig,
    conversation_id: Option<ConversationId>,
    turn_deadline: Option<Duration>,
}

impl ChatSession {
    pub fn new(orchestrator: Orchestrator, mcp: McpConfig) -> Self {
        Self {
            orchestrator,
            mcp,
            conversation_id: None,
            turn_deadline: None,
        }
    }

    /// Build the full stack from configuration. Does not touch the network.
    pub fn from_config(config: &AppConfig) -> Result<Self, AgentError> {
        Self::from_config_with_events(config, None)
    }

    /// Like [`ChatSession::from_config`], forwarding turn progress to `events`.
    pub fn from_config_with_events(
        config: &AppConfig,
        events: Option<mpsc::UnboundedSender<TurnEvent>>,
    ) -> Result<Self, AgentError> {
        let client = Arc::new(McpClient::from_config(&config.mcp)?);
        let provider = Arc::new(InferenceClient::from_config(&config.inference)?);
        let router = ToolRouter::from_config(client, &config.mcp);
        let store = Arc::new(ConversationStore::new());
        let mut orchestrator = Orchestrator::from_config(store, router, provider, &config.agent);
        if let Some(tx) = events {
            orchestrator = orchestrator.with_events(tx);
        }
        Ok(Self::new(orchestrator, config.mcp.clone()))
    }

    /// Bound every turn by `deadline`.
    pub fn with_turn_deadline(mut self, deadline: Duration) -> Self {
        self.turn_deadline = Some(deadline);
        self
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.orchestrator.router().client().status()
    }

    /// Categorized listing of the tools currently available.
    pub fn tools_summary(&self) -> ToolsSummary {
        self.orchestrator.router().registry().summary()
    }

    /// Discover tools and open a fresh conversation.
    ///
    /// Any previous conversation of this session is ended.
    pub async fn start(&mut self) -> Result<SessionInfo, AgentError> {
        let client = self.orchestrator.router().client();
        let status = client
            .initialize(self.mcp.retry_count, self.mcp.use_fallback)
            .await?;
        let tool_count = client.tool_count();

        self.end();
        let conversation_id = self.orchestrator.store().new_conversation();
        self.conversation_id = Some(conversation_id.clone());

        tracing::info!(
            conversation_id = %conversation_id,
            status = ?status,
            tool_count,
            "chat session started"
        );

        Ok(SessionInfo {
            conversation_id,
            status,
            tool_count,
        })
    }

    /// Send a user message and get the reply to display.
    ///
    /// Never fails: errors are rendered as `"An error occurred: …"`.
    pub async fn send_message(&mut self, content: &str) -> String {
        match self.try_send_message(content).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(
                    conversation_id = ?self.conversation_id,
                    error = %e,
                    "chat turn failed"
                );
                format!("An error occurred: {e}")
            }
        }
    }

    async fn try_send_message(&mut self, content: &str) -> Result<String, AgentError> {
        let conversation_id = match &self.conversation_id {
            Some(id) => id.clone(),
            None => self.start().await?.conversation_id,
        };

        let reply = match self.turn_deadline {
            Some(deadline) => {
                self.orchestrator
                    .handle_turn_with_deadline(&conversation_id, content, deadline)
                    .await?
            }
            None => self.orchestrator.handle_turn(&conversation_id, content).await?,
        };
        Ok(reply.content)
    }

    /// End the current conversation, discarding its history.
    pub fn end(&mut self) {
        if let Some(id) = self.conversation_id.take() {
            self.orchestrator.store().end_conversation(&id);
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(tool_server: &str, provider: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.mcp.server_url = tool_server.to_string();
        config.mcp.retry_count = 1;
        config.mcp.retry_backoff_ms = 5;
        config.inference.base_url = provider.to_string();
        config.inference.timeout_secs = 5;
        config
    }

    async fn mount_completion(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_start_connects_and_opens_conversation() {
        let tools = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tools"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "get_current_time"},
                {"name": "weather_info"}
            ])))
            .mount(&tools)
            .await;

        let mut session = ChatSession::from_config(&config(&tools.uri(), "http://127.0.0.1:1")).unwrap();
        let info = session.start().await.unwrap();

        assert_eq!(info.status, ConnectionStatus::Connected);
        assert_eq!(info.tool_count, 2);
        assert!(info.conversation_id.starts_with("conv_"));
        assert_eq!(session.conversation_id(), Some(info.conversation_id.as_str()));
        assert_eq!(session.tools_summary().total_tools, 2);
    }

    #[tokio::test]
    async fn test_restart_ends_previous_conversation() {
        let mut session =
            ChatSession::from_config(&config("http://127.0.0.1:1", "http://127.0.0.1:1")).unwrap();
        let first = session.start().await.unwrap().conversation_id;
        let second = session.start().await.unwrap().conversation_id;

        assert_ne!(first, second);
        assert_eq!(session.status(), ConnectionStatus::Fallback);
        assert!(!session.orchestrator.store().contains(&first));
    }

    #[tokio::test]
    async fn test_send_message_runs_tool_turn() {
        let provider = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": null, "tool_calls": [
                    {"id": "call_1", "type": "function",
                     "function": {"name": "calculate_expression", "arguments": "{\"expression\": \"6 * 7\"}"}}
                ]}}]
            })))
            .up_to_n_times(1)
            .mount(&provider)
            .await;
        mount_completion(
            &provider,
            serde_json::json!({"choices": [{"message": {"content": "The answer is 42."}}]}),
        )
        .await;

        // Unreachable tool server: fallback tools with local handlers.
        let mut session =
            ChatSession::from_config(&config("http://127.0.0.1:1", &provider.uri())).unwrap();
        let reply = session.send_message("what is 6 * 7?").await;
        assert_eq!(reply, "The answer is 42.");

        let id = session.conversation_id().unwrap().to_string();
        let history = session.orchestrator.store().get_history(&id).unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[2].content.as_deref(), Some("\"42\""));
    }

    #[tokio::test]
    async fn test_send_message_renders_errors() {
        let provider = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&provider)
            .await;

        let mut session =
            ChatSession::from_config(&config("http://127.0.0.1:1", &provider.uri())).unwrap();
        let reply = session.send_message("hi").await;
        assert_eq!(
            reply,
            "An error occurred: completion provider error: HTTP 500: boom"
        );
    }

    #[tokio::test]
    async fn test_start_without_fallback_reports_connection_error() {
        let mut cfg = config("http://127.0.0.1:1", "http://127.0.0.1:1");
        cfg.mcp.use_fallback = false;
        let mut session = ChatSession::from_config(&cfg).unwrap();

        let reply = session.send_message("hi").await;
        assert!(reply.starts_with("An error occurred: tool server connection failed"));
        assert!(session.conversation_id().is_none());
    }

    #[tokio::test]
    async fn test_events_are_forwarded() {
        let provider = MockServer::start().await;
        mount_completion(
            &provider,
            serde_json::json!({"choices": [{"message": {"content": "hi"}}]}),
        )
        .await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut session = ChatSession::from_config_with_events(
            &config("http://127.0.0.1:1", &provider.uri()),
            Some(tx),
        )
        .unwrap();
        assert_eq!(session.send_message("hello").await, "hi");
        assert!(matches!(rx.try_recv(), Ok(TurnEvent::StateChanged { .. })));
    }

    #[tokio::test]
    async fn test_end_discards_conversation() {
        let mut session =
            ChatSession::from_config(&config("http://127.0.0.1:1", "http://127.0.0.1:1")).unwrap();
        let id = session.start().await.unwrap().conversation_id;
        session.end();
        assert!(session.conversation_id().is_none());
        assert!(!session.orchestrator.store().contains(&id));
    }
}
