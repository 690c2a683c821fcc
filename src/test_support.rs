//! Helpers shared by the in-module test suites.

use tokio::sync::mpsc::UnboundedReceiver;

use crate::inference::config::GuideConfig;
use crate::status::StatusUpdate;

/// Config pointing every provider at `base_url` with zero retry delays.
pub(crate) fn fake_config(base_url: &str, models: &[&str]) -> GuideConfig {
    let mut config = GuideConfig::default();
    config.providers.gemini.base_url = base_url.to_string();
    config.providers.gemini.models = models.iter().map(|m| m.to_string()).collect();
    config.providers.openai.base_url = base_url.to_string();
    config.providers.anthropic.base_url = base_url.to_string();
    config.retry.backoff_base_ms = 0;
    config.fallback.inter_attempt_delay_ms = 0;
    config.request_timeout_secs = 5;
    config
}

/// Collect every status message emitted so far.
pub(crate) fn drain_status(rx: &mut UnboundedReceiver<StatusUpdate>) -> Vec<String> {
    let mut messages = Vec::new();
    while let Ok(update) = rx.try_recv() {
        messages.push(update.message);
    }
    messages
}

/// A `generateContent` body with one candidate per text.
pub(crate) fn gemini_body(texts: &[&str]) -> String {
    let candidates: Vec<serde_json::Value> = texts
        .iter()
        .map(|t| serde_json::json!({ "content": { "parts": [{ "text": t }] } }))
        .collect();
    serde_json::json!({ "candidates": candidates }).to_string()
}

/// Mock path for a Gemini model.
pub(crate) fn gemini_path(model: &str) -> String {
    format!("/models/{model}:generateContent")
}
