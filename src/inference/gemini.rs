//! Grounded provider: Gemini `generateContent` with Google Search grounding.
//!
//! The only provider that takes a model id, cites web sources, and retries
//! transient failures inside the transport.

use std::collections::{BTreeSet, HashSet};

use super::client::{endpoint_url, ProviderTransport};
use super::errors::InferenceError;
use super::types::{
    Candidate, GeminiContent, GeminiTool, GenerateContentRequest, GenerateContentResponse,
    GenerationConfig, GroundingMetadata,
};
use crate::status::StatusSink;

impl ProviderTransport {
    /// Request one search-grounded generation from `model`.
    ///
    /// Returns every candidate with non-empty text. When none has text and
    /// `fallback_text` is given, returns a single candidate carrying it.
    pub async fn generate_grounded(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        credential: &str,
        model: &str,
        fallback_text: Option<&str>,
        status: &StatusSink,
    ) -> Result<Vec<Candidate>, InferenceError> {
        let url = endpoint_url(
            &self.providers().gemini.base_url,
            &format!("models/{model}:generateContent"),
        );

        let body = GenerateContentRequest {
            contents: vec![GeminiContent::text(user_prompt)],
            tools: vec![GeminiTool::default()],
            system_instruction: GeminiContent::text(system_prompt),
            generation_config: GenerationConfig::default(),
        };

        // Log the request metadata, never the key
        tracing::info!(
            url = %url,
            model,
            user_prompt_chars = user_prompt.len(),
            "=== GROUNDED REQUEST ==="
        );

        let raw = self
            .send_with_retry(
                || {
                    self.http()
                        .post(&url)
                        .query(&[("key", credential)])
                        .json(&body)
                },
                &url,
                model,
                status,
            )
            .await?;

        parse_generate_content(&raw, fallback_text)
    }
}

/// Parse a `generateContent` response body into candidates.
pub fn parse_generate_content(
    body: &str,
    fallback_text: Option<&str>,
) -> Result<Vec<Candidate>, InferenceError> {
    let response: GenerateContentResponse =
        serde_json::from_str(body).map_err(|e| InferenceError::MalformedResponse {
            reason: format!("failed to parse generateContent response: {e}"),
        })?;

    let mut candidates = Vec::new();
    for candidate in &response.candidates {
        let text = candidate
            .content
            .parts
            .first()
            .and_then(|p| p.text.as_deref())
            .unwrap_or_default()
            .trim();
        if text.is_empty() {
            continue;
        }

        candidates.push(Candidate {
            text: text.to_string(),
            sources: collect_sources(&candidate.grounding_metadata),
        });
    }

    if candidates.is_empty() {
        if let Some(fallback) = fallback_text {
            candidates.push(Candidate::new(fallback));
        }
    }

    Ok(candidates)
}

/// Distinct cited sources, keyed by URI. Entries without a URI are dropped.
fn collect_sources(metadata: &GroundingMetadata) -> BTreeSet<String> {
    let mut sources = BTreeSet::new();
    let mut seen_uris = HashSet::new();

    let records = metadata
        .grounding_attributions
        .iter()
        .chain(metadata.grounding_chunks.iter());

    for record in records {
        let uri = record.web.uri.as_deref().unwrap_or_default().trim();
        if uri.is_empty() || !seen_uris.insert(uri.to_string()) {
            continue;
        }
        let title = record.web.title.as_deref().unwrap_or_default().trim();
        if title.is_empty() {
            sources.insert(uri.to_string());
        } else {
            sources.insert(format!("{title} — {uri}"));
        }
    }

    sources
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{drain_status, fake_config, gemini_body, gemini_path};
    use mockito::Matcher;

    const FALLBACK: &str = "No reliable hint could be confirmed from the available guides.";

    #[test]
    fn test_parse_extracts_text_and_sources() {
        let body = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "  Go to the castle.  "}]},
                "groundingMetadata": {
                    "groundingAttributions": [
                        {"web": {"title": "Wiki", "uri": "https://wiki.example/castle"}},
                        {"web": {"title": "Dup", "uri": "https://wiki.example/castle"}},
                        {"web": {"title": "No uri", "uri": ""}},
                        {"web": {"uri": "https://guide.example/"}}
                    ],
                    "groundingChunks": [
                        {"web": {"title": "Chunk", "uri": "https://chunk.example/"}}
                    ]
                }
            }]
        }"#;

        let candidates = parse_generate_content(body, None).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].text, "Go to the castle.");
        let sources: Vec<_> = candidates[0].sources.iter().cloned().collect();
        assert_eq!(
            sources,
            vec![
                "Chunk — https://chunk.example/".to_string(),
                "Wiki — https://wiki.example/castle".to_string(),
                "https://guide.example/".to_string(),
            ]
        );
    }

    #[test]
    fn test_parse_empty_uses_fallback_when_given() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"   "}]}}]}"#;
        let with = parse_generate_content(body, Some(FALLBACK)).unwrap();
        assert_eq!(with, vec![Candidate::new(FALLBACK)]);

        let without = parse_generate_content(body, None).unwrap();
        assert!(without.is_empty());
    }

    #[test]
    fn test_parse_malformed_body_errors() {
        let result = parse_generate_content("<html>oops</html>", None);
        assert!(matches!(result, Err(InferenceError::MalformedResponse { .. })));
    }

    #[tokio::test]
    async fn test_retries_503_then_succeeds() {
        let mut server = mockito::Server::new_async().await;
        let busy = server
            .mock("POST", gemini_path("m1").as_str())
            .match_query(Matcher::UrlEncoded("key".into(), "secret".into()))
            .with_status(503)
            .with_body("busy")
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("POST", gemini_path("m1").as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(gemini_body(&["Talk to the elder."]))
            .expect(1)
            .create_async()
            .await;

        let mut config = fake_config(&server.url(), &["m1"]);
        config.retry.backoff_base_ms = 100;
        let transport = ProviderTransport::from_config(&config).unwrap();
        let (sink, mut rx) = StatusSink::channel();

        let started = std::time::Instant::now();
        let candidates = transport
            .generate_grounded("sys", "user", "secret", "m1", None, &sink)
            .await
            .unwrap();
        let elapsed = started.elapsed();

        busy.assert_async().await;
        ok.assert_async().await;
        assert_eq!(candidates, vec![Candidate::new("Talk to the elder.")]);

        // One backoff of base × 1; a second would add base × 2 on top.
        assert!(elapsed >= std::time::Duration::from_millis(100), "elapsed {elapsed:?}");
        assert!(elapsed < std::time::Duration::from_millis(300), "elapsed {elapsed:?}");

        let messages = drain_status(&mut rx);
        let retries = messages.iter().filter(|m| m.contains("Retrying")).count();
        assert_eq!(retries, 1, "exactly one inter-attempt delay: {messages:?}");
        assert!(messages.iter().any(|m| m.contains("Received 503 from 'm1'")));
    }

    #[tokio::test]
    async fn test_non_retryable_status_fails_immediately() {
        let mut server = mockito::Server::new_async().await;
        let bad = server
            .mock("POST", gemini_path("m1").as_str())
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body("bad request")
            .expect(1)
            .create_async()
            .await;

        let transport = ProviderTransport::from_config(&fake_config(&server.url(), &["m1"])).unwrap();
        let err = transport
            .generate_grounded("sys", "user", "k", "m1", None, &StatusSink::disabled())
            .await
            .unwrap_err();

        bad.assert_async().await;
        match err {
            InferenceError::HttpError { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "bad request");
            }
            other => panic!("expected HttpError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_exhausted_retries_return_last_status() {
        let mut server = mockito::Server::new_async().await;
        let limited = server
            .mock("POST", gemini_path("m1").as_str())
            .match_query(Matcher::Any)
            .with_status(429)
            .with_body("slow down")
            .expect(3)
            .create_async()
            .await;

        let transport = ProviderTransport::from_config(&fake_config(&server.url(), &["m1"])).unwrap();
        let err = transport
            .generate_grounded("sys", "user", "k", "m1", None, &StatusSink::disabled())
            .await
            .unwrap_err();

        limited.assert_async().await;
        assert!(matches!(err, InferenceError::HttpError { status: 429, .. }));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Port 1 on loopback: nothing listens there.
        let transport =
            ProviderTransport::from_config(&fake_config("http://127.0.0.1:1", &["m1"])).unwrap();
        let (sink, mut rx) = StatusSink::channel();
        let err = transport
            .generate_grounded("sys", "user", "k", "m1", None, &sink)
            .await
            .unwrap_err();

        assert!(matches!(err, InferenceError::ConnectionFailed { .. }));
        let attempts = drain_status(&mut rx)
            .iter()
            .filter(|m| m.starts_with("Sending request"))
            .count();
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_request_body_enables_search_grounding() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", gemini_path("m1").as_str())
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(serde_json::json!({
                "tools": [{"google_search": {}}],
                "systemInstruction": {"parts": [{"text": "sys"}]},
                "contents": [{"parts": [{"text": "user"}]}],
                "generationConfig": {"candidateCount": 1}
            })))
            .with_status(200)
            .with_body(gemini_body(&["ok"]))
            .create_async()
            .await;

        let transport = ProviderTransport::from_config(&fake_config(&server.url(), &["m1"])).unwrap();
        transport
            .generate_grounded("sys", "user", "k", "m1", None, &StatusSink::disabled())
            .await
            .unwrap();
        mock.assert_async().await;
    }
}
