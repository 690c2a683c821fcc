//! Context Refinement Stage: a research pre-pass for the grounded provider.
//!
//! Asks the backend which part of the game the player's notes describe,
//! without giving the answer. A failure here only means "no refined context".

use super::prompts::search_query;
use super::types::GuideRequest;
use crate::inference::ProviderTransport;
use crate::status::StatusSink;

const REFINE_SYSTEM_PROMPT: &str = "You are an assistant verifying the player's description before offering help. \
Use Google Search to cross-check reliable game guides. \
Return concise bullet points that clarify what part of the game the player is referencing. \
Do not invent new information and do not provide the next action.";

fn build_refine_prompt(request: &GuideRequest, query: &str) -> String {
    let objective = request.objective.as_deref().unwrap_or("Not specified");
    let behavior = request
        .behavior
        .as_deref()
        .unwrap_or("No special behavior requests");

    format!(
        "The player supplied the following notes while playing '{game}':\n\
         • Situation: {situation}\n\
         • Immediate objective: {objective}\n\
         • Special behavior: {behavior}\n\n\
         Search trusted walkthroughs for '{query}' and summarise what section of the game these notes describe. \
         Identify the named locations, quest or chapter titles, key NPCs, and any critical items already involved. \
         Provide the summary as 2-4 bullet points. Do NOT describe the next step or solution yet; focus only on clarifying the context.",
        game = request.game_title,
        situation = request.situation,
    )
}

/// Run the refinement call against `model`. Returns `""` on any failure.
pub async fn refine_context(
    transport: &ProviderTransport,
    request: &GuideRequest,
    model: &str,
    status: &StatusSink,
) -> String {
    status.emit("Refining player request using walkthrough research...");

    let query = search_query(request);
    let user_prompt = build_refine_prompt(request, &query);

    let candidates = match transport
        .generate_grounded(
            REFINE_SYSTEM_PROMPT,
            &user_prompt,
            &request.credential,
            model,
            None,
            status,
        )
        .await
    {
        Ok(candidates) => candidates,
        Err(e) => {
            status.emit(format!("Context refinement skipped: {e}"));
            tracing::warn!(error = %e, "refine: degraded to no context");
            return String::new();
        }
    };

    candidates
        .iter()
        .map(|c| c.trimmed_text())
        .find(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_default()
}
