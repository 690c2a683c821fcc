//! Provider configuration loading and validation.
//!
//! Reads `nextstep.yaml` and resolves environment variables. Config is the
//! single source of truth for provider endpoints, credentials, the grounded
//! model fallback order, and retry timing. A missing file means defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::errors::InferenceError;

/// File name searched for by [`find_config_path`].
pub const CONFIG_FILE_NAME: &str = "nextstep.yaml";

/// Ordered Gemini model fallback list used when the config names none.
pub const DEFAULT_GEMINI_MODELS: &[&str] = &[
    "gemini-2.5-flash",
    "gemini-2.5-flash-exp",
    "gemini-2.5-latest",
    "gemini-2.5-lite",
    "gemini-2.5-lite-latest",
    "gemini-flash-latest",
    "gemini-flash-lite-latest",
    "gemini-2.0-flash",
    "gemini-2.0-flash-exp",
    "gemini-2.5-pro",
];

// ─── Public Types ────────────────────────────────────────────────────────────

/// Top-level configuration (mirrors `nextstep.yaml`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GuideConfig {
    /// Stored provider selection, e.g. `"Gemini"`.
    pub active_provider: String,
    pub providers: ProvidersConfig,
    pub retry: RetryPolicy,
    pub fallback: FallbackPolicy,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for GuideConfig {
    fn default() -> Self {
        Self {
            active_provider: "Gemini".to_string(),
            providers: ProvidersConfig::default(),
            retry: RetryPolicy::default(),
            fallback: FallbackPolicy::default(),
            request_timeout_secs: 30,
            connect_timeout_secs: 5,
        }
    }
}

impl GuideConfig {
    /// Stored credential for a provider display name (`Gemini`, `ChatGPT`, `Claude`).
    pub fn api_key_for(&self, provider: &str) -> Option<&str> {
        let key = match provider.to_ascii_lowercase().as_str() {
            "gemini" => self.providers.gemini.api_key.as_deref(),
            "chatgpt" | "openai" => self.providers.openai.api_key.as_deref(),
            "claude" | "anthropic" => self.providers.anthropic.api_key.as_deref(),
            _ => None,
        };
        key.filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub gemini: GeminiConfig,
    pub openai: OpenAiConfig,
    pub anthropic: AnthropicConfig,
}

/// Grounded provider: search-augmented, multi-model.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Fixed priority order walked by the fallback sequencer.
    pub models: Vec<String>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: None,
            models: DEFAULT_GEMINI_MODELS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnthropicConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub api_version: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com/v1".to_string(),
            api_key: None,
            model: "claude-3-5-sonnet-20241022".to_string(),
            api_version: "2023-06-01".to_string(),
        }
    }
}

/// Transport-level retry policy for the grounded provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before retry `n` is `backoff_base_ms × n`.
    pub backoff_base_ms: u64,
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 2000,
            retryable_statuses: vec![429, 500, 502, 503],
        }
    }
}

impl RetryPolicy {
    /// Backoff before the attempt following `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_base_ms.saturating_mul(u64::from(attempt)))
    }
}

/// Sequencer policy: outer attempts per model and candidate cap.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FallbackPolicy {
    pub attempts_per_model: u32,
    pub max_candidates: usize,
    pub inter_attempt_delay_ms: u64,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            attempts_per_model: 3,
            max_candidates: 3,
            inter_attempt_delay_ms: 1500,
        }
    }
}

impl FallbackPolicy {
    pub fn inter_attempt_delay(&self) -> Duration {
        Duration::from_millis(self.inter_attempt_delay_ms)
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Locate `nextstep.yaml`.
///
/// Checks `NEXTSTEP_CONFIG`, then searches upward from `start`, then the data
/// directory. Returns `None` when no file exists anywhere.
pub fn find_config_path(start: &Path) -> Option<PathBuf> {
    // 1. Check env var
    if let Ok(path) = std::env::var("NEXTSTEP_CONFIG") {
        let candidate = PathBuf::from(expand_tilde(&path));
        if candidate.exists() {
            return Some(candidate);
        }
    }

    // 2. Walk upward from `start`
    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.exists() {
            return Some(candidate);
        }
        if !dir.pop() {
            break;
        }
    }

    // 3. Platform data directory
    let candidate = crate::data_dir().join(CONFIG_FILE_NAME);
    candidate.exists().then_some(candidate)
}

/// Load and parse a configuration file.
///
/// Performs environment-variable interpolation on string values matching
/// `${VAR_NAME}` or `${VAR_NAME:-default}`.
pub fn load_config(path: &Path) -> Result<GuideConfig, InferenceError> {
    let raw = std::fs::read_to_string(path).map_err(|e| InferenceError::ConfigError {
        reason: format!("failed to read {}: {e}", path.display()),
    })?;

    parse_config(&raw)
}

/// Parse configuration YAML after env interpolation. Empty input yields defaults.
pub fn parse_config(raw: &str) -> Result<GuideConfig, InferenceError> {
    let interpolated = interpolate_env_vars(raw);
    if interpolated.trim().is_empty() {
        return Ok(GuideConfig::default());
    }

    let config: GuideConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| InferenceError::ConfigError {
            reason: format!("failed to parse config: {e}"),
        })?;

    validate(&config)?;
    Ok(config)
}

/// Load the config found by [`find_config_path`], or defaults if none exists.
pub fn load_or_default(start: &Path) -> Result<GuideConfig, InferenceError> {
    match find_config_path(start) {
        Some(path) => {
            let config = load_config(&path)?;
            tracing::info!(path = %path.display(), "loaded guide config");
            Ok(config)
        }
        None => {
            tracing::info!("no {CONFIG_FILE_NAME} found, using defaults");
            Ok(GuideConfig::default())
        }
    }
}

fn validate(config: &GuideConfig) -> Result<(), InferenceError> {
    if config.providers.gemini.models.is_empty() {
        return Err(InferenceError::ConfigError {
            reason: "providers.gemini.models must list at least one model".into(),
        });
    }
    if config.retry.max_attempts == 0 || config.fallback.attempts_per_model == 0 {
        return Err(InferenceError::ConfigError {
            reason: "attempt counts must be at least 1".into(),
        });
    }
    if config.fallback.max_candidates == 0 {
        return Err(InferenceError::ConfigError {
            reason: "fallback.max_candidates must be at least 1".into(),
        });
    }
    Ok(())
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
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
    if let Some(idx) = expr.find(":-") {
        let var_name = &expr[..idx];
        let default = &expr[idx + 2..];
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
