//! Reliability Evaluator: asks the grounded backend to pick the most
//! trustworthy candidate and parses its JSON verdict defensively.
//!
//! The verdict parser is lossy on purpose. Fallback ladder:
//! strip code fence → slice outermost braces → parse → else degrade to
//! "no recommendation" carrying the raw text as reasoning.

use super::types::{Evaluation, GuideRequest};
use crate::inference::{Candidate, InferenceError, ProviderTransport};
use crate::status::StatusSink;

const EVALUATOR_SYSTEM_PROMPT: &str = "You are a quality assurance expert for video game walkthroughs.
Cross-check hints with known guides and select the most reliable immediate action.
Return only valid JSON that matches the requested schema.";

/// Build the evaluation prompt enumerating every candidate and its sources.
pub fn build_evaluation_prompt(request: &GuideRequest, candidates: &[Candidate]) -> String {
    let objective = request.objective.as_deref().unwrap_or("Not specified.");
    let behavior = request
        .behavior
        .as_deref()
        .unwrap_or("No special behavior requests.");

    let guides_block = candidates
        .iter()
        .enumerate()
        .map(|(i, candidate)| {
            let text = candidate.trimmed_text().replace('\n', " ");
            let sources = if candidate.sources.is_empty() {
                "No sources provided.".to_string()
            } else {
                candidate
                    .sources
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join("; ")
            };
            format!("Guide {}:\nHint: {text}\nSources: {sources}", i + 1)
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let count = candidates.len();
    format!(
        "You are verifying hints for the game '{game}'.
Current situation: {situation}
Immediate objective: {objective}
Special behavior requests: {behavior}

{count} candidate hint(s) were gathered from web searches:

{guides_block}

Determine which hint is the most reliable immediate next step. If none of the hints look trustworthy, indicate that.
Respond STRICTLY with JSON matching this schema:
{{
  \"recommended_index\": <integer from 1 to {count} indicating which hint to follow, or 0 if none>,
  \"confidence\": <integer 0-100 indicating certainty>,
  \"reasoning\": \"<brief justification in one or two sentences>\"
}}
Do not wrap the JSON with additional commentary.",
        game = request.game_title,
        situation = request.situation,
    )
}

/// Ask `model` for a verdict over `candidates`.
///
/// `Ok(None)` when there is nothing to evaluate or the backend returned no
/// text. Transport failures are returned; the orchestrator degrades them.
pub async fn evaluate_candidates(
    transport: &ProviderTransport,
    request: &GuideRequest,
    candidates: &[Candidate],
    model: &str,
    status: &StatusSink,
) -> Result<Option<Evaluation>, InferenceError> {
    if candidates.is_empty() {
        return Ok(None);
    }

    let user_prompt = build_evaluation_prompt(request, candidates);
    let results = transport
        .generate_grounded(
            EVALUATOR_SYSTEM_PROMPT,
            &user_prompt,
            &request.credential,
            model,
            None,
            status,
        )
        .await?;

    let Some(raw) = results.first().map(|c| c.trimmed_text()).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };

    let evaluation = parse_verdict(raw);
    tracing::info!(
        recommended_index = evaluation.recommended_index,
        confidence = ?evaluation.confidence,
        "evaluator: verdict parsed"
    );
    Ok(Some(evaluation))
}

/// Parse a verdict. Never fails: malformed text degrades to index 0,
/// confidence 0, and the raw text as reasoning.
pub fn parse_verdict(raw: &str) -> Evaluation {
    let cleaned = extract_verdict_json(raw);
    match serde_json::from_str::<serde_json::Value>(cleaned) {
        Ok(value) if value.is_object() => Evaluation::from_value(&value),
        Ok(_) | Err(_) => {
            tracing::warn!("evaluator: verdict was not a JSON object, degrading");
            Evaluation {
                recommended_index: 0,
                confidence: Some(0.0),
                reasoning: Some(raw.to_string()),
            }
        }
    }
}

/// Strip a code fence (with optional `json` tag), then, if the remainder
/// does not open with `{`, slice from the first `{` to the last `}`.
fn extract_verdict_json(raw: &str) -> &str {
    let mut cleaned = raw.trim();

    if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
        if cleaned
            .get(..4)
            .is_some_and(|tag| tag.eq_ignore_ascii_case("json"))
        {
            cleaned = &cleaned[4..];
        }
        cleaned = cleaned.trim();
        if let Some(rest) = cleaned.strip_suffix("```") {
            cleaned = rest.trim();
        }
    }

    if !cleaned.starts_with('{') {
        if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
            if end > start {
                cleaned = &cleaned[start..=end];
            }
        }
    }

    cleaned
}

// ─── Tests ───────────────────────────────────────────────────────────────────
