//! Application configuration loading and validation.
//!
//! Reads a YAML file (see `mcp-orchestrator.example.yaml`), resolves
//! `${VAR}` / `${VAR:-default}` references, applies environment overrides and
//! validates the result. Every field has a default, so an absent file is not
//! an error.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::agent_core::tool_router::{DispatchMode, MAX_INVOKE_RETRIES};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Configuration loading or validation error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse config: {reason}")]
    Parse { reason: String },

    #[error("invalid config: {reason}")]
    Invalid { reason: String },
}

// ─── Public Types ────────────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mcp: McpConfig,
    pub inference: InferenceConfig,
    pub agent: AgentConfig,
    pub logging: LoggingConfig,
}

/// Tool server connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    pub server_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Discovery attempts (0 is treated as 1).
    pub retry_count: u32,
    /// Use the built-in fallback tools when discovery fails.
    pub use_fallback: bool,
    /// Wait between discovery attempts.
    pub retry_backoff_ms: u64,
    /// Extra attempts for a tool call whose server is unreachable.
    pub invoke_retries: u32,
    pub dispatch_mode: DispatchMode,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8000".to_string(),
            timeout_secs: 30,
            retry_count: 3,
            use_fallback: true,
            retry_backoff_ms: 1000,
            invoke_retries: 0,
            dispatch_mode: DispatchMode::Sequential,
        }
    }
}

/// Completion provider settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: Option<f32>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key: None,
            model: "mistralai/devstral-small:free".to_string(),
            timeout_secs: 30,
            temperature: None,
        }
    }
}

/// Turn-handling settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Messages sent with the first completion of a turn.
    pub context_window: usize,
    /// Tool rounds executed per turn.
    pub max_tool_rounds: usize,
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            context_window: 10,
            max_tool_rounds: 1,
            system_prompt: None,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
    /// Also write logs to this file (rotated on startup).
    pub file: Option<PathBuf>,
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Config file name looked up in the working directory.
const LOCAL_CONFIG_FILE: &str = "mcp-orchestrator.yaml";

/// Env var naming an explicit config path.
const CONFIG_PATH_ENV: &str = "MCP_ORCHESTRATOR_CONFIG";

/// Resolve which config file to read, if any.
///
/// Order: `explicit`, `$MCP_ORCHESTRATOR_CONFIG`, `./mcp-orchestrator.yaml`,
/// `{config_dir}/mcp-orchestrator/config.yaml`.
pub fn find_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.is_empty() {
            return Some(PathBuf::from(expand_tilde(&path)));
        }
    }

    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("mcp-orchestrator").join("config.yaml"))
        .filter(|p| p.exists())
}

/// Load, override and validate the configuration.
///
/// With no file found, starts from defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut config = match find_config_path(explicit) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config file");
            load_config_file(&path)?
        }
        None => AppConfig::default(),
    };

    config.apply_env_overrides(|name| std::env::var(name).ok());
    config.validate()?;
    Ok(config)
}

/// Read and parse one config file with env-var interpolation.
pub fn load_config_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    parse_config(&raw)
}

/// Parse YAML text with env-var interpolation.
pub fn parse_config(raw: &str) -> Result<AppConfig, ConfigError> {
    let interpolated = interpolate_env_vars(raw);
    if interpolated.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    let mut config: AppConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
    if let Some(file) = config.logging.file.take() {
        config.logging.file = Some(PathBuf::from(expand_tilde(&file.to_string_lossy())));
    }
    Ok(config)
}

impl AppConfig {
    /// Apply `MCP_SERVER_URL`, `BASE_URL`, `API_KEY` and `MODEL_NAME`.
    ///
    /// `lookup` resolves a variable name; empty values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(url) = get("MCP_SERVER_URL") {
            self.mcp.server_url = url;
        }
        if let Some(url) = get("BASE_URL") {
            self.inference.base_url = url;
        }
        if let Some(key) = get("API_KEY") {
            self.inference.api_key = Some(key);
        }
        if let Some(model) = get("MODEL_NAME") {
            self.inference.model = model;
        }
    }

    /// Reject settings the runtime cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mcp.server_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                reason: "mcp.server_url must not be empty".into(),
            });
        }
        if self.inference.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                reason: "inference.base_url must not be empty".into(),
            });
        }
        if self.mcp.invoke_retries > MAX_INVOKE_RETRIES {
            return Err(ConfigError::Invalid {
                reason: format!("mcp.invoke_retries must be at most {MAX_INVOKE_RETRIES}"),
            });
        }
        if self.agent.context_window == 0 {
            return Err(ConfigError::Invalid {
                reason: "agent.context_window must be at least 1".into(),
            });
        }
        if self.agent.max_tool_rounds == 0 {
            return Err(ConfigError::Invalid {
                reason: "agent.max_tool_rounds must be at least 1".into(),
            });
        }
        Ok(())
    }
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_expr.push(c);
            }
            result.push_str(&resolve_var_expr(&var_expr));
        } else {
            result.push(ch);
        }
    }

    result
}

/// Resolve a variable expression like `VAR` or `VAR:-default`.
fn resolve_var_expr(expr: &str) -> String {
    if let Some((var_name, default)) = expr.split_once(":-") {
        std::env::var(var_name).unwrap_or_else(|_| expand_tilde(default))
    } else {
        std::env::var(expr).unwrap_or_default()
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
