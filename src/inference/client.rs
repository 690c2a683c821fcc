//! Shared HTTP transport for the provider endpoints.
//!
//! Holds one `reqwest` client with fixed timeouts plus the provider endpoint
//! settings. Stateless across calls: credentials and model ids arrive per
//! request, so one transport can serve concurrent guide runs.

use std::time::Duration;

use reqwest::{Client as HttpClient, RequestBuilder};

use super::config::{GuideConfig, ProvidersConfig, RetryPolicy};
use super::errors::InferenceError;
use crate::status::StatusSink;

/// Client for the three provider endpoints.
pub struct ProviderTransport {
    http: HttpClient,
    providers: ProvidersConfig,
    retry: RetryPolicy,
    request_timeout_secs: u64,
}

impl ProviderTransport {
    /// Build the transport from config. Does NOT check connectivity.
    pub fn from_config(config: &GuideConfig) -> Result<Self, InferenceError> {
        let mut builder = HttpClient::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs));

        // Local fakes must not be routed through a system proxy.
        let providers = &config.providers;
        if [
            &providers.gemini.base_url,
            &providers.openai.base_url,
            &providers.anthropic.base_url,
        ]
        .iter()
        .all(|url| is_loopback_base_url(url))
        {
            builder = builder.no_proxy();
        }

        let http = builder
            .build()
            .map_err(|e| InferenceError::ConfigError {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            providers: config.providers.clone(),
            retry: config.retry.clone(),
            request_timeout_secs: config.request_timeout_secs,
        })
    }

    pub fn providers(&self) -> &ProvidersConfig {
        &self.providers
    }

    pub(crate) fn http(&self) -> &HttpClient {
        &self.http
    }

    /// Send one request and return the body of a 2xx response.
    ///
    /// Any non-success status becomes `HttpError { status, body }`.
    pub(crate) async fn send_once(
        &self,
        request: RequestBuilder,
        endpoint: &str,
    ) -> Result<String, InferenceError> {
        let response = request
            .send()
            .await
            .map_err(|e| InferenceError::from_send_error(&e, endpoint, self.request_timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::HttpError {
                status: status.as_u16(),
                body,
            });
        }

        response
            .text()
            .await
            .map_err(|e| InferenceError::from_send_error(&e, endpoint, self.request_timeout_secs))
    }

    /// Send with the configured retry policy.
    ///
    /// `build` is called once per attempt. Network failures and retryable
    /// statuses sleep `backoff_base × attempt` and try again; anything else
    /// fails immediately. After the last attempt the last error is returned.
    pub(crate) async fn send_with_retry<F>(
        &self,
        build: F,
        endpoint: &str,
        label: &str,
        status: &StatusSink,
    ) -> Result<String, InferenceError>
    where
        F: Fn() -> RequestBuilder,
    {
        let max_attempts = self.retry.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            status.emit(format!(
                "Sending request to '{label}' (attempt {attempt}/{max_attempts})..."
            ));

            let err = match self.send_once(build(), endpoint).await {
                Ok(body) => return Ok(body),
                Err(e) => e,
            };

            let is_last = attempt == max_attempts;
            if is_last || !err.is_retriable(&self.retry.retryable_statuses) {
                tracing::warn!(label, attempt, error = %err, "provider request failed");
                return Err(err);
            }

            match &err {
                InferenceError::HttpError { status: code, .. } => status.emit(format!(
                    "Received {code} from '{label}'. Retrying after backoff..."
                )),
                other => status.emit(format!("Request to '{label}' failed ({other}). Retrying...")),
            }

            let delay = self.retry.backoff_for(attempt);
            tracing::info!(
                label,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying provider request"
            );
            tokio::time::sleep(delay).await;
        }

        // max_attempts >= 1, so the loop always returns.
        Err(InferenceError::ConnectionFailed {
            endpoint: endpoint.to_string(),
            reason: "no attempts were made".into(),
        })
    }
}

fn is_loopback_base_url(base_url: &str) -> bool {
    let rest = base_url
        .strip_prefix("http://")
        .or_else(|| base_url.strip_prefix("https://"))
        .unwrap_or(base_url);
    rest.starts_with("127.0.0.1") || rest.starts_with("localhost") || rest.starts_with("[::1]")
}

/// Join a base URL and a path without doubling slashes.
pub(crate) fn endpoint_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
