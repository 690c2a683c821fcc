//! Prompt construction for the main generation call.
//!
//! The system prompt is picked by keyword in the behavior directive; the user
//! prompt carries the player's notes and, when available, the refined
//! context from the research pre-pass.

use super::types::GuideRequest;

/// Search phrase embedded in the prompts and the refinement request.
pub fn search_query(request: &GuideRequest) -> String {
    match &request.objective {
        Some(objective) => format!(
            "{} walkthrough guide {} {}",
            request.game_title, request.situation, objective
        ),
        None => format!("{} walkthrough guide {}", request.game_title, request.situation),
    }
}

/// The user prompt, optionally enriched with refined context.
pub fn build_user_prompt(request: &GuideRequest, refined_context: &str) -> String {
    let mut main_question = format!(
        "In the game '{}', the player's current situation is: {}.",
        request.game_title, request.situation
    );
    if let Some(objective) = &request.objective {
        main_question.push_str(&format!(" Their immediate objective is: {objective}."));
    }

    let mut parts = vec![main_question];

    let refined_context = refined_context.trim();
    if !refined_context.is_empty() {
        parts.push(format!(
            "Verified context from walkthrough research: {refined_context}"
        ));
        parts.push(
            "Cross-check this researched context against the player's own words before making your response."
                .to_string(),
        );
    }

    match &request.behavior {
        Some(behavior) => parts.push(behavior.clone()),
        None => {
            parts.push("Search online game guides and walkthroughs to find: What is the EXACT next step the player should take right now?".to_string());
            parts.push("Provide ONLY the immediate, actionable next step. Be specific and concise.".to_string());
            parts.push("If you find conflicting information, provide the most commonly recommended solution.".to_string());
        }
    }

    parts.join(" ")
}

/// Which system prompt variant the behavior directive selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStyle {
    Strategic,
    Contextual,
    Tips,
    NextStep,
}

impl PromptStyle {
    pub fn for_behavior(behavior: Option<&str>) -> Self {
        let Some(behavior) = behavior else {
            return PromptStyle::NextStep;
        };
        let lower = behavior.to_lowercase();
        if lower.contains("strategic") {
            PromptStyle::Strategic
        } else if lower.contains("context") {
            PromptStyle::Contextual
        } else if lower.contains("tips") || lower.contains("tricks") {
            PromptStyle::Tips
        } else {
            PromptStyle::NextStep
        }
    }
}

/// The system prompt for the main generation call.
pub fn build_system_prompt(request: &GuideRequest) -> String {
    let query = search_query(request);
    match PromptStyle::for_behavior(request.behavior.as_deref()) {
        PromptStyle::Strategic => format!(
            "You are an expert video game guide assistant. Provide comprehensive strategic guidance based on REAL game walkthroughs and guides found online.

IMPORTANT INSTRUCTIONS:
1. Search the internet for \"{query}\" to find accurate walkthrough information
2. Use ONLY information from actual game guides, walkthroughs, and wikis
3. Provide strategic breakdown with context and planning
4. Be specific with locations, items, or actions
5. Structure your response according to the user's request
6. Do NOT make up information - only use what you find in guides

Focus on accuracy and helpful structure."
        ),
        PromptStyle::Contextual => format!(
            "You are an expert video game guide assistant. Analyze the player's position in the game based on REAL walkthroughs and guides found online.

IMPORTANT INSTRUCTIONS:
1. Search the internet for \"{query}\" to find accurate walkthrough information
2. Use ONLY information from actual game guides, walkthroughs, and wikis
3. Focus on explaining WHERE they are in the game's progression
4. Provide context about what comes before and after
5. Do NOT just tell them what to do next - explain their situation
6. Do NOT make up information - only use what you find in guides

Focus on contextual understanding over direction."
        ),
        PromptStyle::Tips => format!(
            "You are an expert video game guide assistant specializing in tips, tricks, and optimization. Provide helpful secrets and strategies based on REAL game guides and community knowledge.

IMPORTANT INSTRUCTIONS:
1. Search the internet for \"{query}\" along with terms like \"tips\", \"tricks\", \"secrets\", \"exploits\"
2. Use information from game guides, wikis, and community resources
3. Focus on optimization, shortcuts, and advantages
4. Include hidden content and secret techniques
5. Provide practical tips the player can use immediately
6. Do NOT make up information - only use what you find

Focus on giving them an edge."
        ),
        PromptStyle::NextStep => format!(
            "You are an expert video game guide assistant. Your task is to provide accurate, actionable guidance based on REAL game walkthroughs and guides found online.

IMPORTANT INSTRUCTIONS:
1. Search the internet for \"{query}\" to find accurate walkthrough information
2. Use ONLY information from actual game guides, walkthroughs, and wikis
3. Provide the IMMEDIATE next step - not general advice
4. Be specific with locations, items, or actions
5. If multiple solutions exist, mention the most common one
6. Do NOT make up information - only use what you find in guides
7. Keep your response concise (2-3 sentences max)

Focus on accuracy over creativity. The player needs reliable information."
        ),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
