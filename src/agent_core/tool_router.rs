//! ToolRouter: dispatches model tool calls to the tool server.
//!
//! The ToolRouter is the bridge between the model's tool call decisions and
//! the McpClient. It handles:
//! - Argument normalization (lenient: bad arguments become `{}`)
//! - Unknown tool rejection without a network call
//! - Execution via McpClient, sequentially or concurrently
//! - Optional retry with exponential backoff while the server is unreachable
//!
//! A batch never fails as a whole: every call yields exactly one `ToolResult`,
//! in request order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::config::McpConfig;
use crate::inference::types::ToolCall;
use crate::mcp_client::errors::McpError;
use crate::mcp_client::registry::ToolRegistry;
use crate::mcp_client::types::ToolResult;
use crate::mcp_client::McpClient;

// ─── Constants ──────────────────────────────────────────────────────────────

/// Base delay between retries (doubles each attempt).
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Upper bound on a single retry delay.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Largest accepted `invoke_retries` setting.
pub const MAX_INVOKE_RETRIES: u32 = 10;

/// Error recorded for calls naming a tool outside the registry.
pub const TOOL_NOT_FOUND: &str = "tool not found";

// ─── DispatchMode ───────────────────────────────────────────────────────────

/// How the calls of one batch are executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// One call at a time, in request order.
    #[default]
    Sequential,
    /// All calls at once; results still come back in request order.
    Concurrent,
}

// ─── ToolRouter ─────────────────────────────────────────────────────────────

/// Executes batches of tool calls against an `McpClient`.
pub struct ToolRouter {
    client: Arc<McpClient>,
    mode: DispatchMode,
    /// Extra attempts for an unreachable server. Zero means a single attempt.
    invoke_retries: u32,
    retry_base_delay: Duration,
}

impl ToolRouter {
    pub fn new(client: Arc<McpClient>) -> Self {
        Self {
            client,
            mode: DispatchMode::Sequential,
            invoke_retries: 0,
            retry_base_delay: RETRY_BASE_DELAY,
        }
    }

    /// Create a router using the `mcp` config section's dispatch settings.
    pub fn from_config(client: Arc<McpClient>, config: &McpConfig) -> Self {
        Self::new(client)
            .with_dispatch_mode(config.dispatch_mode)
            .with_invoke_retries(config.invoke_retries)
    }

    pub fn with_dispatch_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_invoke_retries(mut self, retries: u32) -> Self {
        self.invoke_retries = retries;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn client(&self) -> &Arc<McpClient> {
        &self.client
    }

    /// Snapshot of the client's current registry.
    pub fn registry(&self) -> Arc<ToolRegistry> {
        self.client.registry()
    }

    // ─── Dispatch ───────────────────────────────────────────────────────

    /// Execute a batch of tool calls from the model.
    ///
    /// Returns one result per call, in request order.
    pub async fn execute_batch(&self, tool_calls: &[ToolCall]) -> Vec<ToolResult> {
        let registry = self.client.registry();
        let start = Instant::now();

        let results = match self.mode {
            DispatchMode::Sequential => {
                let mut results = Vec::with_capacity(tool_calls.len());
                for tc in tool_calls {
                    results.push(self.dispatch_single(tc, &registry).await);
                }
                results
            }
            DispatchMode::Concurrent => {
                let futures = tool_calls
                    .iter()
                    .map(|tc| self.dispatch_single(tc, &registry));
                futures::future::join_all(futures).await
            }
        };

        tracing::info!(
            calls = tool_calls.len(),
            failed = results.iter().filter(|r| r.is_error()).count(),
            mode = ?self.mode,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "tool batch executed"
        );
        results
    }

    /// Dispatch one call: normalize → look up → execute.
    async fn dispatch_single(&self, tool_call: &ToolCall, registry: &ToolRegistry) -> ToolResult {
        let arguments = tool_call.arguments.normalize();

        if !registry.contains(&tool_call.name) {
            tracing::warn!(
                tool = %tool_call.name,
                tool_call_id = %tool_call.id,
                "model requested unknown tool"
            );
            return ToolResult::failure(&tool_call.id, &tool_call.name, TOOL_NOT_FOUND);
        }

        match self.call_with_retry(&tool_call.name, &arguments).await {
            Ok(value) => ToolResult::success(&tool_call.id, &tool_call.name, value),
            Err(e) => {
                tracing::warn!(
                    tool = %tool_call.name,
                    tool_call_id = %tool_call.id,
                    error = %e,
                    "tool call failed"
                );
                ToolResult::failure(&tool_call.id, &tool_call.name, e.to_string())
            }
        }
    }

    /// Call the tool, retrying while the server is unreachable.
    async fn call_with_retry(
        &self,
        tool_name: &str,
        arguments: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<serde_json::Value, McpError> {
        let mut attempt = 0;
        loop {
            match self.client.call_tool(tool_name, arguments).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_unreachable() && attempt < self.invoke_retries => {
                    attempt += 1;
                    let delay = backoff_delay(self.retry_base_delay, attempt);
                    tracing::debug!(
                        tool = %tool_name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying tool call"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`,
/// capped at `MAX_RETRY_DELAY`.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.checked_mul(factor)
        .unwrap_or(MAX_RETRY_DELAY)
        .min(MAX_RETRY_DELAY)
}

// ─── Tests ──────────────────────────────────────────────────────────────────
