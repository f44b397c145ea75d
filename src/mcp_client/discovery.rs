//! Tool discovery: fetch the tool server's catalogue with retry and fallback.
//!
//! `GET {server_url}/tools` is attempted up to `retry_count` times. Transient
//! failures (connect refused, timeout, gateway statuses) wait a fixed backoff
//! before the next attempt; anything else stops retrying at once. When every
//! attempt fails the caller either gets the built-in fallback tools or a
//! `McpError::Connection`.

use std::time::Duration;

use super::errors::McpError;
use super::registry::{Tool, ToolCategory, ToolRegistry};
use super::types::ToolDescriptor;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Default number of discovery attempts.
pub const DEFAULT_RETRY_COUNT: u32 = 3;

/// Default wait between discovery attempts.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

// ─── Options / Outcome ──────────────────────────────────────────────────────

/// Parameters for one discovery run.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub server_url: String,
    /// Maximum attempts. Zero is treated as one.
    pub retry_count: u32,
    pub use_fallback: bool,
    pub backoff: Duration,
}

impl DiscoveryOptions {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            retry_count: DEFAULT_RETRY_COUNT,
            use_fallback: true,
            backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

/// Where a discovered registry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoverySource {
    Remote,
    Fallback,
}

/// Result of a successful discovery run.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub registry: ToolRegistry,
    pub source: DiscoverySource,
    /// Attempts made against the server.
    pub attempts: u32,
}

// ─── Discovery ──────────────────────────────────────────────────────────────

/// Discover the server's tools, retrying transient failures.
///
/// Only fails when `use_fallback` is off and the server could not be read.
pub async fn discover(
    http: &reqwest::Client,
    options: &DiscoveryOptions,
) -> Result<Discovery, McpError> {
    let max_attempts = options.retry_count.max(1);
    let mut attempts = 0;
    let mut last_error: Option<McpError> = None;

    while attempts < max_attempts {
        attempts += 1;

        match fetch_tool_descriptors(http, &options.server_url).await {
            Ok(descriptors) => {
                let registry = ToolRegistry::from_descriptors(descriptors);
                tracing::info!(
                    server_url = %options.server_url,
                    tools = registry.len(),
                    categories = ?registry.available_categories(),
                    attempts,
                    "discovered tools"
                );
                return Ok(Discovery {
                    registry,
                    source: DiscoverySource::Remote,
                    attempts,
                });
            }
            Err(e) if e.is_transient() && attempts < max_attempts => {
                tracing::warn!(
                    server_url = %options.server_url,
                    attempt = attempts,
                    max_attempts,
                    backoff_ms = options.backoff.as_millis() as u64,
                    error = %e,
                    "tool discovery failed, retrying"
                );
                last_error = Some(e);
                tokio::time::sleep(options.backoff).await;
            }
            Err(e) => {
                if !e.is_transient() {
                    tracing::warn!(
                        server_url = %options.server_url,
                        attempt = attempts,
                        error = %e,
                        "tool discovery failed with non-retriable error"
                    );
                }
                last_error = Some(e);
                break;
            }
        }
    }

    let reason = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no attempts made".to_string());

    if options.use_fallback {
        let registry = fallback_tools();
        tracing::warn!(
            server_url = %options.server_url,
            attempts,
            reason = %reason,
            tools = ?registry.tool_names(),
            "tool server unreachable, using fallback tools"
        );
        return Ok(Discovery {
            registry,
            source: DiscoverySource::Fallback,
            attempts,
        });
    }

    Err(McpError::Connection {
        url: options.server_url.clone(),
        attempts,
        reason,
    })
}

/// One `GET {server_url}/tools` request, decoded into descriptors.
pub async fn fetch_tool_descriptors(
    http: &reqwest::Client,
    server_url: &str,
) -> Result<Vec<ToolDescriptor>, McpError> {
    let url = format!("{}/tools", server_url.trim_end_matches('/'));

    let response = http
        .get(&url)
        .send()
        .await
        .map_err(|e| McpError::from_reqwest(&url, &e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(McpError::HttpStatus {
            url,
            status: status.as_u16(),
            body,
        });
    }

    let body = response
        .text()
        .await
        .map_err(|e| McpError::from_reqwest(&url, &e))?;

    serde_json::from_str::<Vec<ToolDescriptor>>(&body).map_err(|e| McpError::InvalidResponse {
        url,
        reason: e.to_string(),
    })
}

// ─── Fallback Tools ─────────────────────────────────────────────────────────

/// The fixed tool set used when the server cannot be reached.
pub fn fallback_tools() -> ToolRegistry {
    ToolRegistry::from_tools([
        Tool::new(
            "echo",
            "Echo back the provided message",
            string_params(&[("message", "Message to echo back")]),
            vec!["message".to_string()],
            ToolCategory::Utility,
        ),
        Tool::new(
            "get_current_time",
            "Get the current date and time",
            serde_json::Map::new(),
            Vec::new(),
            ToolCategory::Time,
        ),
        Tool::new(
            "calculate_expression",
            "Evaluate a mathematical expression",
            string_params(&[("expression", "Mathematical expression to evaluate")]),
            vec!["expression".to_string()],
            ToolCategory::Calculation,
        ),
    ])
}

fn string_params(params: &[(&str, &str)]) -> serde_json::Map<String, serde_json::Value> {
    params
        .iter()
        .map(|(name, description)| {
            (
                name.to_string(),
                serde_json::json!({"type": "string", "description": description}),
            )
        })
        .collect()
}

// ─── Tests ──────────────────────────────────────────────────────────────────
