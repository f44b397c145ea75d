//! MCP Client: high-level interface for tool discovery and execution.
//!
//! Owns the HTTP connection to the tool server, the current tool registry and
//! the connection status. This is the primary API used by the ToolRouter.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use super::discovery::{self, DiscoveryOptions, DiscoverySource};
use super::errors::McpError;
use super::fallback;
use super::registry::ToolRegistry;
use super::types::{ConnectionStatus, ToolInvocationResponse};
use crate::config::McpConfig;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Default timeout for tool server requests.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// TCP connect timeout for the tool server.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// ─── McpClient ───────────────────────────────────────────────────────────────

/// HTTP client for a remote tool server.
pub struct McpClient {
    http: reqwest::Client,
    server_url: String,
    /// Current tool set. Readers clone the `Arc`; discovery swaps it.
    registry: RwLock<Arc<ToolRegistry>>,
    status: RwLock<ConnectionStatus>,
    call_timeout: Duration,
    retry_backoff: Duration,
}

impl McpClient {
    /// Create a client for `server_url` with the given per-request timeout.
    ///
    /// The registry starts empty until [`McpClient::initialize`] runs.
    pub fn new(server_url: impl Into<String>, call_timeout: Duration) -> Result<Self, McpError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(call_timeout))
            .timeout(call_timeout)
            .build()
            .map_err(|e| McpError::Config {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            server_url: server_url.into().trim_end_matches('/').to_string(),
            registry: RwLock::new(Arc::new(ToolRegistry::new())),
            status: RwLock::new(ConnectionStatus::Disconnected),
            call_timeout,
            retry_backoff: discovery::DEFAULT_RETRY_BACKOFF,
        })
    }

    /// Create a client from the `mcp` config section.
    pub fn from_config(config: &McpConfig) -> Result<Self, McpError> {
        Ok(Self::new(&config.server_url, Duration::from_secs(config.timeout_secs))?
            .with_retry_backoff(Duration::from_millis(config.retry_backoff_ms)))
    }

    /// Set the wait between discovery attempts.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    // ─── Discovery ───────────────────────────────────────────────────────

    /// Discover the server's tools and install them as the current registry.
    ///
    /// On failure the previous registry and status are left untouched.
    pub async fn initialize(
        &self,
        retry_count: u32,
        use_fallback: bool,
    ) -> Result<ConnectionStatus, McpError> {
        let options = DiscoveryOptions {
            server_url: self.server_url.clone(),
            retry_count,
            use_fallback,
            backoff: self.retry_backoff,
        };

        let outcome = discovery::discover(&self.http, &options).await?;
        let status = match outcome.source {
            DiscoverySource::Remote => ConnectionStatus::Connected,
            DiscoverySource::Fallback => ConnectionStatus::Fallback,
        };

        self.replace_registry(outcome.registry);
        *self.status.write().unwrap_or_else(|p| p.into_inner()) = status;

        tracing::info!(
            server_url = %self.server_url,
            status = ?status,
            tools = self.tool_count(),
            "tool client initialized"
        );
        Ok(status)
    }

    /// Swap in a new registry wholesale.
    pub fn replace_registry(&self, registry: ToolRegistry) {
        *self.registry.write().unwrap_or_else(|p| p.into_inner()) = Arc::new(registry);
    }

    /// Snapshot of the current registry.
    pub fn registry(&self) -> Arc<ToolRegistry> {
        Arc::clone(&self.registry.read().unwrap_or_else(|p| p.into_inner()))
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.read().unwrap_or_else(|p| p.into_inner())
    }

    pub fn tool_count(&self) -> usize {
        self.registry().len()
    }

    // ─── Tool Execution ──────────────────────────────────────────────────

    /// Execute a tool on the server and return its `result` value.
    ///
    /// When the server cannot be reached, the local fallback handler for the
    /// tool is used if one exists (a missing required argument is then a
    /// `ToolExecution` error); otherwise the call fails with
    /// `McpError::Connection`. Every other failure is a `ToolExecution` error.
    pub async fn call_tool(
        &self,
        tool_name: &str,
        arguments: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<serde_json::Value, McpError> {
        if !self.registry().contains(tool_name) {
            return Err(McpError::UnknownTool {
                name: tool_name.to_string(),
            });
        }

        let start = Instant::now();
        let url = self.tool_url(tool_name)?;

        match self.post_tool(url.as_str(), arguments).await {
            Ok(value) => {
                tracing::debug!(
                    tool = %tool_name,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "tool call succeeded"
                );
                Ok(value)
            }
            Err(e) if e.is_unreachable() => {
                if let Some(value) = fallback::invoke_local(tool_name, arguments) {
                    tracing::warn!(
                        tool = %tool_name,
                        error = %e,
                        "tool server unreachable, used local handler"
                    );
                    return Ok(value);
                }
                if fallback::has_local_handler(tool_name) {
                    return Err(McpError::ToolExecution {
                        tool: tool_name.to_string(),
                        reason: format!(
                            "tool server unreachable ({e}) and local handler is missing a required argument"
                        ),
                    });
                }
                Err(McpError::Connection {
                    url: url.to_string(),
                    attempts: 1,
                    reason: e.to_string(),
                })
            }
            Err(e) => Err(McpError::ToolExecution {
                tool: tool_name.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// `{server_url}/tools/{tool_name}`, with the name percent-encoded as a
    /// single path segment.
    fn tool_url(&self, tool_name: &str) -> Result<reqwest::Url, McpError> {
        let invalid = |reason: String| McpError::Config {
            reason: format!("invalid tool server URL '{}': {reason}", self.server_url),
        };
        let mut url = reqwest::Url::parse(&self.server_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("URL cannot have a path".to_string()))?
            .pop_if_empty()
            .push("tools")
            .push(tool_name);
        Ok(url)
    }

    /// `POST {url}` with the argument map, decoding `{result}`.
    async fn post_tool(
        &self,
        url: &str,
        arguments: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<serde_json::Value, McpError> {
        let response = self
            .http
            .post(url)
            .json(arguments)
            .send()
            .await
            .map_err(|e| McpError::from_reqwest(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| McpError::from_reqwest(url, &e))?;

        let decoded: ToolInvocationResponse =
            serde_json::from_str(&body).map_err(|e| McpError::InvalidResponse {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        Ok(decoded.result)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp_client::discovery::fallback_tools;
    use crate::mcp_client::types::ToolDescriptor;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const UNREACHABLE: &str = "http://127.0.0.1:1";

    fn client(url: &str) -> McpClient {
        McpClient::new(url, Duration::from_secs(5))
            .unwrap()
            .with_retry_backoff(Duration::from_millis(10))
    }

    fn args(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().cloned().unwrap()
    }

    fn registry_with(names: &[&str]) -> ToolRegistry {
        ToolRegistry::from_descriptors(
            names
                .iter()
                .map(|n| ToolDescriptor {
                    name: n.to_string(),
                    description: String::new(),
                    parameters: serde_json::Map::new(),
                    required: Vec::new(),
                })
                .collect(),
        )
    }

    #[test]
    fn test_new_client_empty() {
        let client = client("http://localhost:8000/");
        assert_eq!(client.status(), ConnectionStatus::Disconnected);
        assert_eq!(client.tool_count(), 0);
        assert_eq!(client.server_url(), "http://localhost:8000");
        assert_eq!(client.call_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_registry_snapshot_survives_swap() {
        let client = client(UNREACHABLE);
        client.replace_registry(registry_with(&["a"]));
        let before = client.registry();
        client.replace_registry(registry_with(&["b", "c"]));

        assert_eq!(before.tool_names(), vec!["a"]);
        assert_eq!(client.registry().tool_names(), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_initialize_connected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tools"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{"name": "weather_info"}])),
            )
            .mount(&server)
            .await;

        let client = client(&server.uri());
        let status = client.initialize(3, true).await.unwrap();
        assert_eq!(status, ConnectionStatus::Connected);
        assert_eq!(client.status(), ConnectionStatus::Connected);
        assert!(client.registry().contains("weather_info"));
    }

    #[tokio::test]
    async fn test_initialize_fallback() {
        let client = client(UNREACHABLE);
        let status = client.initialize(2, true).await.unwrap();
        assert_eq!(status, ConnectionStatus::Fallback);
        assert_eq!(client.tool_count(), 3);
    }

    #[tokio::test]
    async fn test_initialize_failure_keeps_previous_state() {
        let client = client(UNREACHABLE);
        client.replace_registry(registry_with(&["kept"]));
        let err = client.initialize(1, false).await.unwrap_err();
        assert!(matches!(err, McpError::Connection { .. }));
        assert_eq!(client.status(), ConnectionStatus::Disconnected);
        assert!(client.registry().contains("kept"));
    }

    #[tokio::test]
    async fn test_call_tool_returns_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tools/weather_info"))
            .and(body_json(serde_json::json!({"city": "Paris"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"result": {"temp": 21}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server.uri());
        client.replace_registry(registry_with(&["weather_info"]));
        let value = client
            .call_tool("weather_info", &args(serde_json::json!({"city": "Paris"})))
            .await
            .unwrap();
        assert_eq!(value, serde_json::json!({"temp": 21}));
    }

    #[tokio::test]
    async fn test_call_tool_missing_result_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tools/noop"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let client = client(&server.uri());
        client.replace_registry(registry_with(&["noop"]));
        let value = client.call_tool("noop", &serde_json::Map::new()).await.unwrap();
        assert!(value.is_null());
    }

    #[tokio::test]
    async fn test_call_tool_http_error_is_tool_execution() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tools/broken"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = client(&server.uri());
        client.replace_registry(registry_with(&["broken"]));
        let err = client.call_tool("broken", &serde_json::Map::new()).await.unwrap_err();
        match err {
            McpError::ToolExecution { tool, reason } => {
                assert_eq!(tool, "broken");
                assert!(reason.contains("500"));
            }
            other => panic!("expected ToolExecution, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_call_tool_unknown() {
        let client = client(UNREACHABLE);
        let err = client
            .call_tool("unknown_tool", &serde_json::Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::UnknownTool { .. }));
    }

    #[tokio::test]
    async fn test_call_tool_unreachable_uses_local_handler() {
        let client = client(UNREACHABLE);
        client.replace_registry(fallback_tools());
        let value = client
            .call_tool("echo", &args(serde_json::json!({"message": "hi"})))
            .await
            .unwrap();
        assert_eq!(value, serde_json::json!("hi"));
    }

    #[tokio::test]
    async fn test_call_tool_unreachable_without_handler_is_connection_error() {
        let client = client(UNREACHABLE);
        client.replace_registry(registry_with(&["weather_info"]));
        let err = client
            .call_tool("weather_info", &serde_json::Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::Connection { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_call_tool_unreachable_handler_missing_argument() {
        let client = client(UNREACHABLE);
        client.replace_registry(fallback_tools());
        let err = client.call_tool("echo", &serde_json::Map::new()).await.unwrap_err();
        match err {
            McpError::ToolExecution { tool, reason } => {
                assert_eq!(tool, "echo");
                assert!(reason.contains("missing a required argument"));
            }
            other => panic!("expected ToolExecution, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_call_tool_encodes_name_as_one_segment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/tools/weather%20info%2Fv2%3Fx"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"result": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&format!("{}/api/", server.uri()));
        client.replace_registry(registry_with(&["weather info/v2?x"]));
        let value = client
            .call_tool("weather info/v2?x", &serde_json::Map::new())
            .await
            .unwrap();
        assert_eq!(value, serde_json::json!("ok"));
    }
}
