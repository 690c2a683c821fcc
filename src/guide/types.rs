//! Shared types across the guide orchestrator.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::GuideError;
use crate::inference::Candidate;

// ─── Provider ───────────────────────────────────────────────────────────────

/// Backend selected for a guide run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provider {
    /// Search-grounded, multi-model, multi-candidate.
    Gemini,
    ChatGpt,
    Claude,
    /// Any other stored selection; rejected before network activity.
    Unsupported(String),
}

impl Provider {
    /// Parse a stored selection. Matching is case-insensitive and accepts the
    /// vendor names as aliases; anything else becomes `Unsupported`.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Provider::Gemini,
            "chatgpt" | "openai" => Provider::ChatGpt,
            "claude" | "anthropic" => Provider::Claude,
            _ => Provider::Unsupported(name.trim().to_string()),
        }
    }

    /// Name shown in reports and status lines.
    pub fn display_name(&self) -> &str {
        match self {
            Provider::Gemini => "Gemini",
            Provider::ChatGpt => "ChatGPT",
            Provider::Claude => "Claude",
            Provider::Unsupported(name) => name,
        }
    }

    /// Whether the refine / sequence / evaluate pipeline applies.
    pub fn is_grounded(&self) -> bool {
        matches!(self, Provider::Gemini)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

// ─── GuideRequest ───────────────────────────────────────────────────────────

/// Input to one guide run. Immutable for the duration of the run.
#[derive(Clone)]
pub struct GuideRequest {
    pub game_title: String,
    pub situation: String,
    pub objective: Option<String>,
    /// Free-text directive altering tone or structure.
    pub behavior: Option<String>,
    pub provider: Provider,
    pub credential: String,
}

impl GuideRequest {
    pub fn new(
        game_title: impl Into<String>,
        situation: impl Into<String>,
        provider: Provider,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            game_title: game_title.into().trim().to_string(),
            situation: situation.into().trim().to_string(),
            objective: None,
            behavior: None,
            provider,
            credential: credential.into().trim().to_string(),
        }
    }

    /// Set the objective; blank text means none.
    pub fn with_objective(mut self, objective: Option<impl Into<String>>) -> Self {
        self.objective = non_blank(objective);
        self
    }

    /// Set the behavior directive; blank text means none.
    pub fn with_behavior(mut self, behavior: Option<impl Into<String>>) -> Self {
        self.behavior = non_blank(behavior);
        self
    }

    /// Reject inputs that must never reach the network.
    pub fn validate(&self) -> Result<(), GuideError> {
        if let Provider::Unsupported(name) = &self.provider {
            return Err(GuideError::validation(format!(
                "Unsupported AI provider '{name}'. Please select a supported AI provider (Gemini, ChatGPT, or Claude)."
            )));
        }
        if self.situation.trim().is_empty() {
            return Err(GuideError::validation(
                "Please fill in the 'Current Situation' field first!",
            ));
        }
        if self.credential.trim().is_empty() {
            return Err(GuideError::validation(format!(
                "No API key configured for {}.",
                self.provider
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for GuideRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuideRequest")
            .field("game_title", &self.game_title)
            .field("situation", &self.situation)
            .field("objective", &self.objective)
            .field("behavior", &self.behavior)
            .field("provider", &self.provider)
            .field("credential", &"<redacted>")
            .finish()
    }
}

fn non_blank(value: Option<impl Into<String>>) -> Option<String> {
    value
        .map(|v| v.into().trim().to_string())
        .filter(|v| !v.is_empty())
}

// ─── Evaluation ─────────────────────────────────────────────────────────────

/// Reliability verdict over the candidate list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// 1-based index into the evaluated candidates; 0 means no recommendation.
    pub recommended_index: usize,
    pub confidence: Option<f64>,
    pub reasoning: Option<String>,
}

impl Evaluation {
    /// Read a verdict from loosely-typed JSON.
    ///
    /// Numbers may arrive as integers, floats, or numeric strings. An index
    /// that is not a whole number of at least 1 reads as 0; a confidence
    /// outside 0..=100 reads as absent.
    pub fn from_value(value: &serde_json::Value) -> Self {
        let recommended_index = value
            .get("recommended_index")
            .and_then(json_index)
            .unwrap_or(0);

        let confidence = value
            .get("confidence")
            .and_then(json_number)
            .filter(|c| (0.0..=100.0).contains(c));

        let reasoning = value.get("reasoning").and_then(|r| match r {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        });

        Self {
            recommended_index,
            confidence,
            reasoning,
        }
    }

    /// The recommendation, if it points inside a list of `candidate_count`.
    pub fn recommendation_within(&self, candidate_count: usize) -> Option<usize> {
        (1..=candidate_count)
            .contains(&self.recommended_index)
            .then_some(self.recommended_index)
    }
}

/// A 1-based index: a whole JSON number, or a string holding an integer.
fn json_index(value: &serde_json::Value) -> Option<usize> {
    let n = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok()? as f64,
        _ => return None,
    };
    (n.is_finite() && n.fract() == 0.0 && n >= 1.0).then_some(n as usize)
}

fn json_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

// ─── GuideResult ────────────────────────────────────────────────────────────

/// Final output of a guide run. Persisting it is the caller's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideResult {
    /// Raw candidates, before aggregation.
    pub guides: Vec<Candidate>,
    pub provider: String,
    pub evaluation: Option<Evaluation>,
    pub model_used: Option<String>,
    /// Empty when refinement was skipped or failed.
    pub refined_context: String,
}

impl GuideResult {
    /// Render the human-readable report for display and storage.
    pub fn report(&self) -> String {
        super::report::format_report(
            &self.guides,
            &self.provider,
            self.evaluation.as_ref(),
            self.model_used.as_deref(),
            Some(self.refined_context.as_str()),
        )
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
