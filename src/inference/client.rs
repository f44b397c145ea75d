//! OpenAI-compatible inference client.
//!
//! Sends non-streaming chat completion requests to a hosted or local provider
//! and parses the single assistant message it returns. Tool call arguments are
//! kept exactly as the provider sent them; normalization happens at dispatch.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use uuid::Uuid;

use super::errors::InferenceError;
use super::types::{
    ChatCompletionRequest, CompletionRequest, CompletionResponse, RawArguments, ToolCall,
};
use crate::config::InferenceConfig;

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default total request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ─── CompletionProvider ──────────────────────────────────────────────────────

/// Anything that can turn a message list (plus optional tools) into one
/// assistant message.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest)
        -> Result<CompletionResponse, InferenceError>;
}

// ─── InferenceClient ─────────────────────────────────────────────────────────

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct InferenceClient {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: Option<f32>,
    timeout: Duration,
}

impl InferenceClient {
    /// Create a client. Does NOT check connectivity; that happens on the
    /// first request.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, InferenceError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .build()
            .map_err(|e| InferenceError::ConfigError {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base_url,
            api_key: api_key.filter(|k| !k.is_empty()),
            model: model.into(),
            temperature: None,
            timeout,
        })
    }

    /// Create a client from the `inference` config section.
    pub fn from_config(config: &InferenceConfig) -> Result<Self, InferenceError> {
        let mut client = Self::new(
            &config.base_url,
            config.api_key.clone(),
            &config.model,
            Duration::from_secs(config.timeout_secs),
        )?;
        client.temperature = config.temperature;
        Ok(client)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// Send a non-streaming chat completion request.
    pub async fn chat_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, InferenceError> {
        let url = format!("{}/chat/completions", self.base_url);
        let message_count = request.messages.len();
        let tool_count = request.tools.as_ref().map_or(0, Vec::len);

        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: request.messages,
            tools: request.tools,
            tool_choice: request.tool_choice,
            temperature: self.temperature,
            stream: false,
        };

        tracing::debug!(
            endpoint = %url,
            model = %self.model,
            messages = message_count,
            tools = tool_count,
            "requesting completion"
        );

        let mut builder = self.http.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| self.map_send_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            let err = InferenceError::HttpError {
                status: status.as_u16(),
                body: body_text,
            };
            tracing::warn!(
                endpoint = %url,
                status = status.as_u16(),
                body = err.error_body().unwrap_or_default(),
                "completion request rejected"
            );
            return Err(err);
        }

        let body_text = response
            .text()
            .await
            .map_err(|e| InferenceError::InvalidResponse {
                reason: format!("failed to read response body: {e}"),
            })?;

        parse_completion_response(&body_text)
    }

    fn map_send_error(&self, url: &str, err: reqwest::Error) -> InferenceError {
        if err.is_timeout() {
            InferenceError::Timeout {
                duration_secs: self.timeout.as_secs(),
            }
        } else {
            InferenceError::ConnectionFailed {
                endpoint: url.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl CompletionProvider for InferenceClient {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, InferenceError> {
        self.chat_completion(request).await
    }
}

// ─── Response Parsing ────────────────────────────────────────────────────────

/// Parse a `chat/completions` response body into the first choice's message.
pub fn parse_completion_response(body: &str) -> Result<CompletionResponse, InferenceError> {
    #[derive(Deserialize)]
    struct Response {
        choices: Vec<Choice>,
    }

    #[derive(Deserialize)]
    struct Choice {
        message: Message,
    }

    #[derive(Deserialize)]
    struct Message {
        content: Option<String>,
        tool_calls: Option<Vec<WireToolCall>>,
    }

    #[derive(Deserialize)]
    struct WireToolCall {
        id: Option<String>,
        function: WireFunction,
    }

    #[derive(Deserialize)]
    struct WireFunction {
        name: String,
        #[serde(default)]
        arguments: RawArguments,
    }

    let resp: Response = serde_json::from_str(body).map_err(|e| InferenceError::InvalidResponse {
        reason: format!("failed to parse completion response: {e}"),
    })?;

    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or(InferenceError::InvalidResponse {
            reason: "empty choices array".into(),
        })?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| ToolCall {
            id: tc
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("call_{}", Uuid::new_v4())),
            name: tc.function.name,
            arguments: tc.function.arguments,
        })
        .collect();

    Ok(CompletionResponse {
        content: choice.message.content,
        tool_calls,
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
