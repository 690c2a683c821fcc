//! Guide run: validate → [refine] → generate → [evaluate] → result.
//!
//! A run is a single sequential pass with no shared state. The caller owns
//! the transport, the status receiver, and whatever task the run executes on.

use tracing::Instrument;
use uuid::Uuid;

use super::errors::GuideError;
use super::evaluator::evaluate_candidates;
use super::fallback::{sequence_models, GenerationInput, NO_RELIABLE_HINT};
use super::prompts::{build_system_prompt, build_user_prompt};
use super::refine::refine_context;
use super::types::{Evaluation, GuideRequest, GuideResult, Provider};
use crate::inference::{Candidate, FallbackPolicy, ProviderTransport};
use crate::status::StatusSink;

/// Run one guide request to completion.
///
/// Fails only on validation errors or when the backend never produced a
/// candidate. Refinement and evaluation failures degrade to empty fields.
pub async fn run(
    transport: &ProviderTransport,
    request: &GuideRequest,
    policy: &FallbackPolicy,
    status: &StatusSink,
) -> Result<GuideResult, GuideError> {
    request.validate()?;

    let span = tracing::info_span!(
        "guide_run",
        run_id = %Uuid::new_v4(),
        provider = %request.provider,
    );

    async move {
        tracing::info!(game = %request.game_title, "orchestrator: run started");
        let result = match &request.provider {
            Provider::Gemini => run_grounded(transport, request, policy, status).await,
            Provider::ChatGpt | Provider::Claude => {
                run_single_message(transport, request, status).await
            }
            Provider::Unsupported(name) => Err(GuideError::validation(format!(
                "Unsupported AI provider '{name}'. Please select a supported AI provider (Gemini, ChatGPT, or Claude)."
            ))),
        };
        match &result {
            Ok(r) => tracing::info!(
                guides = r.guides.len(),
                model = ?r.model_used,
                evaluated = r.evaluation.is_some(),
                "orchestrator: run finished"
            ),
            Err(e) => tracing::error!(error = %e, "orchestrator: run failed"),
        }
        result
    }
    .instrument(span)
    .await
}

async fn run_grounded(
    transport: &ProviderTransport,
    request: &GuideRequest,
    policy: &FallbackPolicy,
    status: &StatusSink,
) -> Result<GuideResult, GuideError> {
    let models = &transport.providers().gemini.models;

    let refined_context = match models.first() {
        Some(primary) => refine_context(transport, request, primary, status).await,
        None => String::new(),
    };

    let system_prompt = build_system_prompt(request);
    let user_prompt = build_user_prompt(request, &refined_context);
    let input = GenerationInput {
        system_prompt: &system_prompt,
        user_prompt: &user_prompt,
        credential: &request.credential,
    };

    status.emit("Starting Gemini guide generation with fallback models...");
    let outcome =
        sequence_models(transport, input, models, NO_RELIABLE_HINT, policy, status).await?;

    let evaluation = match outcome.model_used.as_deref() {
        Some(model) if !outcome.candidates.is_empty() => {
            status.emit("Running reliability evaluation...");
            evaluate_or_degrade(transport, request, &outcome.candidates, model, status).await
        }
        _ => None,
    };

    Ok(GuideResult {
        guides: outcome.candidates,
        provider: request.provider.display_name().to_string(),
        evaluation,
        model_used: outcome.model_used,
        refined_context,
    })
}

async fn evaluate_or_degrade(
    transport: &ProviderTransport,
    request: &GuideRequest,
    candidates: &[Candidate],
    model: &str,
    status: &StatusSink,
) -> Option<Evaluation> {
    match evaluate_candidates(transport, request, candidates, model, status).await {
        Ok(evaluation) => evaluation,
        Err(e) => {
            status.emit(format!("Evaluation step failed: {e}"));
            tracing::warn!(error = %e, "evaluator: degraded to no verdict");
            None
        }
    }
}

async fn run_single_message(
    transport: &ProviderTransport,
    request: &GuideRequest,
    status: &StatusSink,
) -> Result<GuideResult, GuideError> {
    let system_prompt = build_system_prompt(request);
    let user_prompt = build_user_prompt(request, "");
    let name = request.provider.display_name();

    status.emit(format!("Sending request to {name}..."));
    let candidate = match request.provider {
        Provider::Claude => {
            transport
                .complete_anthropic(&system_prompt, &user_prompt, &request.credential)
                .await?
        }
        _ => {
            transport
                .complete_openai(&system_prompt, &user_prompt, &request.credential)
                .await?
        }
    };
    status.emit(format!("Received response from {name}."));

    Ok(GuideResult {
        guides: vec![candidate],
        provider: name.to_string(),
        evaluation: None,
        model_used: None,
        refined_context: String::new(),
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
