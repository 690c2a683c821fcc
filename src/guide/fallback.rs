//! Model Fallback Sequencer for the grounded provider.
//!
//! Walks the configured model list in priority order. Each model gets up to
//! `attempts_per_model` single-candidate calls (on top of the transport's own
//! retries); the first model that yields anything usable wins and the walk
//! stops. The fixed "no reliable hint" sentence counts as usable only when a
//! model produced nothing else, and then only once.

use crate::inference::{Candidate, FallbackPolicy, InferenceError, ProviderTransport};
use crate::status::StatusSink;

/// Fixed sentence meaning "no reliable hint". Kept out of trust scoring
/// unless it is the only answer a model gave.
pub const NO_RELIABLE_HINT: &str = "No reliable hint could be confirmed from the available guides.";

/// Result of a fallback walk.
///
/// `candidates` is never empty and `model_used` is always set on success;
/// `last_error` keeps the most recent failure of an earlier model, if any.
#[derive(Debug)]
pub struct FallbackOutcome {
    pub candidates: Vec<Candidate>,
    pub model_used: Option<String>,
    pub last_error: Option<InferenceError>,
}

/// Prompt pair and credential for one generation.
#[derive(Debug, Clone, Copy)]
pub struct GenerationInput<'a> {
    pub system_prompt: &'a str,
    pub user_prompt: &'a str,
    pub credential: &'a str,
}

/// Run the fallback walk over `models`.
///
/// Fails with the last recorded model error, or `AllModelsUnavailable` when
/// no model raised but none produced anything either.
pub async fn sequence_models(
    transport: &ProviderTransport,
    input: GenerationInput<'_>,
    models: &[String],
    fallback_text: &str,
    policy: &FallbackPolicy,
    status: &StatusSink,
) -> Result<FallbackOutcome, InferenceError> {
    let mut last_error: Option<InferenceError> = None;
    let mut attempted: Vec<String> = Vec::new();

    for model in models {
        status.emit(format!("Trying model '{model}'..."));
        attempted.push(model.clone());

        match collect_from_model(transport, input, model, fallback_text, policy, status).await {
            Ok(candidates) if !candidates.is_empty() => {
                status.emit(format!(
                    "Model '{model}' succeeded with {} guide(s).",
                    candidates.len()
                ));
                tracing::info!(model = %model, count = candidates.len(), "fallback: model accepted");
                return Ok(FallbackOutcome {
                    candidates,
                    model_used: Some(model.clone()),
                    last_error,
                });
            }
            Ok(_) => {
                status.emit(format!("Model '{model}' returned no guidance."));
                tracing::warn!(model = %model, "fallback: model returned nothing");
            }
            Err(e) => {
                status.emit(format!("Model '{model}' failed: {e}"));
                tracing::warn!(model = %model, error = %e, "fallback: model failed");
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or(InferenceError::AllModelsUnavailable { attempted }))
}

/// Up to `attempts_per_model` calls against one model.
///
/// Any transport error abandons the model, discarding what it produced so far.
async fn collect_from_model(
    transport: &ProviderTransport,
    input: GenerationInput<'_>,
    model: &str,
    fallback_text: &str,
    policy: &FallbackPolicy,
    status: &StatusSink,
) -> Result<Vec<Candidate>, InferenceError> {
    let attempts = policy.attempts_per_model.max(1);
    let max_candidates = policy.max_candidates.max(1);

    let mut usable: Vec<Candidate> = Vec::new();
    let mut fallback: Option<Candidate> = None;

    for attempt in 1..=attempts {
        let batch = transport
            .generate_grounded(
                input.system_prompt,
                input.user_prompt,
                input.credential,
                model,
                Some(fallback_text),
                status,
            )
            .await?;

        for candidate in batch {
            let text = candidate.trimmed_text();
            if text.is_empty() {
                continue;
            }
            if text == fallback_text {
                fallback.get_or_insert(candidate);
                continue;
            }
            usable.push(candidate);
            if usable.len() >= max_candidates {
                break;
            }
        }

        if usable.len() >= max_candidates {
            break;
        }

        if attempt < attempts {
            tokio::time::sleep(policy.inter_attempt_delay()).await;
        }
    }

    if usable.is_empty() {
        if let Some(candidate) = fallback {
            usable.push(candidate);
        }
    }

    usable.truncate(max_candidates);
    Ok(usable)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{drain_status, fake_config, gemini_body, gemini_path};
    use mockito::Matcher;

    const INPUT: GenerationInput<'static> = GenerationInput {
        system_prompt: "sys",
        user_prompt: "user",
        credential: "key",
    };

    fn models(names: &[&str]) -> Vec<String> {
        names.iter().map(|m| m.to_string()).collect()
    }

    async fn mock_model(
        server: &mut mockito::ServerGuard,
        model: &str,
        status: usize,
        body: String,
        hits: usize,
    ) -> mockito::Mock {
        server
            .mock("POST", gemini_path(model).as_str())
            .match_query(Matcher::Any)
            .with_status(status)
            .with_body(body)
            .expect(hits)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_failing_model_then_fallback_only_model_stops_walk() {
        let mut server = mockito::Server::new_async().await;
        let a = mock_model(&mut server, "A", 400, "bad model".into(), 1).await;
        let b = mock_model(&mut server, "B", 200, r#"{"candidates":[]}"#.into(), 3).await;
        let c = mock_model(&mut server, "C", 200, gemini_body(&["never"]), 0).await;

        let config = fake_config(&server.url(), &["A", "B", "C"]);
        let transport = ProviderTransport::from_config(&config).unwrap();
        let (sink, mut rx) = StatusSink::channel();

        let outcome = sequence_models(
            &transport,
            INPUT,
            &models(&["A", "B", "C"]),
            NO_RELIABLE_HINT,
            &config.fallback,
            &sink,
        )
        .await
        .unwrap();

        a.assert_async().await;
        b.assert_async().await;
        c.assert_async().await;
        assert_eq!(outcome.model_used.as_deref(), Some("B"));
        assert_eq!(outcome.candidates, vec![Candidate::new(NO_RELIABLE_HINT)]);
        assert!(matches!(
            outcome.last_error,
            Some(InferenceError::HttpError { status: 400, .. })
        ));

        let messages = drain_status(&mut rx);
        assert!(messages.iter().any(|m| m.starts_with("Model 'A' failed")));
        assert!(messages.contains(&"Model 'B' succeeded with 1 guide(s).".to_string()));
        assert!(!messages.iter().any(|m| m.contains("'C'")));
    }

    #[tokio::test]
    async fn test_collects_up_to_max_candidates() {
        let mut server = mockito::Server::new_async().await;
        let a = mock_model(&mut server, "A", 200, gemini_body(&["Go to the castle."]), 3).await;

        let config = fake_config(&server.url(), &["A"]);
        let transport = ProviderTransport::from_config(&config).unwrap();
        let outcome = sequence_models(
            &transport,
            INPUT,
            &models(&["A"]),
            NO_RELIABLE_HINT,
            &config.fallback,
            &StatusSink::disabled(),
        )
        .await
        .unwrap();

        a.assert_async().await;
        assert_eq!(outcome.candidates.len(), 3);
        assert!(outcome.last_error.is_none());
    }

    #[tokio::test]
    async fn test_sleeps_between_attempts_only() {
        let mut server = mockito::Server::new_async().await;
        let a = mock_model(&mut server, "A", 200, gemini_body(&["Go to the castle."]), 3).await;

        let mut config = fake_config(&server.url(), &["A"]);
        config.fallback.inter_attempt_delay_ms = 100;
        let transport = ProviderTransport::from_config(&config).unwrap();

        let started = std::time::Instant::now();
        let outcome = sequence_models(
            &transport,
            INPUT,
            &models(&["A"]),
            NO_RELIABLE_HINT,
            &config.fallback,
            &StatusSink::disabled(),
        )
        .await
        .unwrap();
        let elapsed = started.elapsed();

        a.assert_async().await;
        assert_eq!(outcome.candidates.len(), 3);
        // Three attempts, two gaps; no sleep after the last attempt.
        assert!(elapsed >= std::time::Duration::from_millis(200), "elapsed {elapsed:?}");
        assert!(elapsed < std::time::Duration::from_millis(300), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn test_stops_calling_once_cap_reached() {
        let mut server = mockito::Server::new_async().await;
        let a = mock_model(&mut server, "A", 200, gemini_body(&["x"]), 2).await;

        let mut config = fake_config(&server.url(), &["A"]);
        config.fallback.max_candidates = 2;
        let transport = ProviderTransport::from_config(&config).unwrap();
        let outcome = sequence_models(
            &transport,
            INPUT,
            &models(&["A"]),
            NO_RELIABLE_HINT,
            &config.fallback,
            &StatusSink::disabled(),
        )
        .await
        .unwrap();

        a.assert_async().await;
        assert_eq!(outcome.candidates.len(), 2);
    }

    #[tokio::test]
    async fn test_usable_answer_beats_fallback_sentence() {
        let mut server = mockito::Server::new_async().await;
        let _first = mock_model(&mut server, "A", 200, r#"{"candidates":[]}"#.into(), 1).await;
        let _rest = mock_model(&mut server, "A", 200, gemini_body(&["Ring the bell."]), 2).await;

        let config = fake_config(&server.url(), &["A"]);
        let transport = ProviderTransport::from_config(&config).unwrap();
        let outcome = sequence_models(
            &transport,
            INPUT,
            &models(&["A"]),
            NO_RELIABLE_HINT,
            &config.fallback,
            &StatusSink::disabled(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.candidates.len(), 2);
        assert!(outcome.candidates.iter().all(|c| c.text == "Ring the bell."));
    }

    #[tokio::test]
    async fn test_error_mid_model_abandons_it() {
        let mut server = mockito::Server::new_async().await;
        let _ok = mock_model(&mut server, "A", 200, gemini_body(&["partial"]), 1).await;
        let _bad = mock_model(&mut server, "A", 404, "gone".into(), 1).await;
        let b = mock_model(&mut server, "B", 200, gemini_body(&["from B"]), 3).await;

        let config = fake_config(&server.url(), &["A", "B"]);
        let transport = ProviderTransport::from_config(&config).unwrap();
        let outcome = sequence_models(
            &transport,
            INPUT,
            &models(&["A", "B"]),
            NO_RELIABLE_HINT,
            &config.fallback,
            &StatusSink::disabled(),
        )
        .await
        .unwrap();

        b.assert_async().await;
        assert_eq!(outcome.model_used.as_deref(), Some("B"));
        assert!(outcome.candidates.iter().all(|c| c.text == "from B"));
    }

    #[tokio::test]
    async fn test_all_models_failing_raises_last_error() {
        let mut server = mockito::Server::new_async().await;
        let _a = mock_model(&mut server, "A", 400, "first".into(), 1).await;
        let _b = mock_model(&mut server, "B", 403, "second".into(), 1).await;

        let config = fake_config(&server.url(), &["A", "B"]);
        let transport = ProviderTransport::from_config(&config).unwrap();
        let err = sequence_models(
            &transport,
            INPUT,
            &models(&["A", "B"]),
            NO_RELIABLE_HINT,
            &config.fallback,
            &StatusSink::disabled(),
        )
        .await
        .unwrap_err();

        match err {
            InferenceError::HttpError { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "second");
            }
            other => panic!("expected last HttpError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_model_list_is_all_models_unavailable() {
        let config = fake_config("http://127.0.0.1:1", &["unused"]);
        let transport = ProviderTransport::from_config(&config).unwrap();
        let err = sequence_models(
            &transport,
            INPUT,
            &[],
            NO_RELIABLE_HINT,
            &config.fallback,
            &StatusSink::disabled(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, InferenceError::AllModelsUnavailable { .. }));
    }
}
