//! Aggregator / Report Formatter.
//!
//! Clusters candidates by normalized text, scores each cluster by how many
//! raw candidates agreed with it, applies the evaluator's recommendation, and
//! renders the report stored and shown to the player. Output is a pure
//! function of its inputs.

use std::collections::{BTreeSet, HashMap};

use super::types::Evaluation;
use crate::inference::Candidate;

/// One cluster of candidates sharing the same normalized text.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedAnswer {
    /// 1-based, in order of first appearance.
    pub display_index: usize,
    /// Trimmed text of the first member.
    pub text: String,
    /// Union of member sources, sorted.
    pub sources: Vec<String>,
    pub occurrence_count: usize,
    /// 1-based indices into the pre-aggregation candidate list.
    pub original_indices: Vec<usize>,
}

/// Clusters plus the number of non-empty candidates they were built from.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub answers: Vec<AggregatedAnswer>,
    pub total: usize,
}

impl Aggregation {
    /// Occurrence share in percent. A zero total reads as 100.
    pub fn trust(&self, answer: &AggregatedAnswer) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            answer.occurrence_count as f64 / self.total as f64 * 100.0
        }
    }

    /// Display index of the cluster holding the given original index.
    pub fn cluster_containing(&self, original_index: usize) -> Option<usize> {
        self.answers
            .iter()
            .find(|a| a.original_indices.contains(&original_index))
            .map(|a| a.display_index)
    }
}

/// Lower-case and collapse whitespace runs.
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Cluster `candidates`. Empty texts are skipped but still consume an index.
pub fn aggregate(candidates: &[Candidate]) -> Aggregation {
    struct Cluster {
        text: String,
        sources: BTreeSet<String>,
        indices: Vec<usize>,
    }

    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut clusters: Vec<Cluster> = Vec::new();
    let mut total = 0;

    for (i, candidate) in candidates.iter().enumerate() {
        let text = candidate.trimmed_text();
        if text.is_empty() {
            continue;
        }

        let position = *positions.entry(normalize(text)).or_insert_with(|| {
            clusters.push(Cluster {
                text: text.to_string(),
                sources: BTreeSet::new(),
                indices: Vec::new(),
            });
            clusters.len() - 1
        });

        let cluster = &mut clusters[position];
        cluster.indices.push(i + 1);
        cluster
            .sources
            .extend(candidate.sources.iter().filter(|s| !s.is_empty()).cloned());
        total += 1;
    }

    let answers = clusters
        .into_iter()
        .enumerate()
        .map(|(i, cluster)| AggregatedAnswer {
            display_index: i + 1,
            text: cluster.text,
            sources: cluster.sources.into_iter().collect(),
            occurrence_count: cluster.indices.len(),
            original_indices: cluster.indices,
        })
        .collect();

    Aggregation { answers, total }
}

/// `66.7%` for fractional values, `50%` for whole ones.
pub fn trust_display(value: f64) -> String {
    if value.fract() != 0.0 {
        format!("{value:.1}%")
    } else {
        format!("{value:.0}%")
    }
}

/// Render the guide report.
pub fn format_report(
    candidates: &[Candidate],
    provider: &str,
    evaluation: Option<&Evaluation>,
    model_used: Option<&str>,
    refined_context: Option<&str>,
) -> String {
    if candidates.is_empty() {
        return "No guide suggestions available.".to_string();
    }

    let aggregation = aggregate(candidates);

    let recommended = evaluation
        .and_then(|e| e.recommendation_within(candidates.len()))
        .and_then(|index| aggregation.cluster_containing(index));
    let confidence = evaluation
        .and_then(|e| e.confidence)
        .filter(|c| (0.0..=100.0).contains(c))
        .map(|c| format!("{c:.0}%"));
    let reasoning = evaluation
        .and_then(|e| e.reasoning.as_deref())
        .map(str::trim)
        .filter(|r| !r.is_empty());

    let mut provider_line = format!("Provider: {provider}");
    if let Some(model) = model_used.filter(|m| !m.is_empty()) {
        provider_line.push_str(&format!(" (model: {model})"));
    }

    let mut lines = vec!["Guide Hint Suggestions".to_string(), provider_line];

    let context = refined_context.map(str::trim).unwrap_or_default();
    if !context.is_empty() {
        lines.push(String::new());
        lines.push("Context Clarification".to_string());
        lines.push(context.to_string());
    }
    lines.push(String::new());

    let trust_for = |answer: &AggregatedAnswer| -> String {
        match (&confidence, recommended) {
            (Some(c), Some(r)) if r == answer.display_index => c.clone(),
            _ => trust_display(aggregation.trust(answer)),
        }
    };

    if aggregation.answers.len() > 1 {
        if let Some(answer) = recommended.and_then(|r| aggregation.answers.get(r - 1)) {
            lines.push(format!(
                "Recommended Guide: #{} — Trust Score: {}",
                answer.display_index,
                trust_for(answer)
            ));
            if let Some(reasoning) = reasoning {
                lines.push(format!("Why: {reasoning}"));
            }
            lines.push(String::new());
        }
    }

    for answer in &aggregation.answers {
        let marker = if recommended == Some(answer.display_index) {
            "★"
        } else {
            " "
        };
        lines.push(format!(
            "{}. {marker} {} [Trust Score: {}]",
            answer.display_index,
            answer.text,
            trust_for(answer)
        ));
        if !answer.sources.is_empty() {
            lines.push("   Sources:".to_string());
            for source in &answer.sources {
                lines.push(format!("     • {source}"));
            }
        }
        lines.push(String::new());
    }

    lines.join("\n").trim().to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
