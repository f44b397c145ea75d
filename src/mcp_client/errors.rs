//! Tool server client error types.

use thiserror::Error;

/// Errors that can occur while talking to the remote tool server.
#[derive(Debug, Error)]
pub enum McpError {
    /// The server could not be reached (discovery exhausted its attempts, or a
    /// tool call found the server down and no local fallback handler exists).
    #[error("could not connect to tool server at {url} after {attempts} attempt(s): {reason}")]
    Connection {
        url: String,
        attempts: u32,
        reason: String,
    },

    /// A single request failed at the transport level (connect, timeout, I/O).
    #[error("transport error for {url}: {reason}")]
    Transport {
        url: String,
        reason: String,
        /// Whether the failure is worth retrying (connect refused, timeout).
        transient: bool,
    },

    /// The server answered with a non-2xx status.
    #[error("HTTP {status} from {url}: {body}")]
    HttpStatus {
        url: String,
        status: u16,
        body: String,
    },

    /// The server answered 2xx but the body did not have the expected shape.
    #[error("invalid response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },

    /// Tool not present in the current registry.
    #[error("tool not found: '{name}'")]
    UnknownTool { name: String },

    /// A tool call reached the server (or its fallback) and failed.
    #[error("tool '{tool}' failed: {reason}")]
    ToolExecution { tool: String, reason: String },

    /// The HTTP client could not be built.
    #[error("tool client configuration error: {reason}")]
    Config { reason: String },
}

impl McpError {
    /// Whether a failed request should be retried after a backoff.
    ///
    /// Connect failures and timeouts are transient, as are gateway-style
    /// statuses a restarting server typically emits.
    pub fn is_transient(&self) -> bool {
        match self {
            McpError::Transport { transient, .. } => *transient,
            McpError::HttpStatus { status, .. } => matches!(status, 502..=504),
            _ => false,
        }
    }

    /// Whether this error means the server itself is unreachable.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            McpError::Transport {
                transient: true,
                ..
            } | McpError::Connection { .. }
        )
    }

    /// Map a `reqwest` failure for `url` into a transport error.
    pub(crate) fn from_reqwest(url: &str, err: &reqwest::Error) -> Self {
        McpError::Transport {
            url: url.to_string(),
            reason: err.to_string(),
            transient: err.is_connect() || err.is_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let refused = McpError::Transport {
            url: "http://localhost:1".into(),
            reason: "connection refused".into(),
            transient: true,
        };
        assert!(refused.is_transient());
        assert!(refused.is_unreachable());

        let bad_gateway = McpError::HttpStatus {
            url: "http://x/tools".into(),
            status: 503,
            body: String::new(),
        };
        assert!(bad_gateway.is_transient());
        assert!(!bad_gateway.is_unreachable());

        let not_found = McpError::HttpStatus {
            url: "http://x/tools".into(),
            status: 404,
            body: String::new(),
        };
        assert!(!not_found.is_transient());

        let invalid = McpError::InvalidResponse {
            url: "http://x/tools".into(),
            reason: "expected array".into(),
        };
        assert!(!invalid.is_transient());
    }

    #[test]
    fn test_unknown_tool_message() {
        let err = McpError::UnknownTool {
            name: "unknown_tool".into(),
        };
        assert_eq!(err.to_string(), "tool not found: 'unknown_tool'");
    }
}
