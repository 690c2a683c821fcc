//! Provider Transport — HTTP clients for the three guide backends.
//!
//! This module handles all communication with the provider endpoints:
//! - Gemini `generateContent` with search grounding, cited sources, and
//!   transient-failure retry with linear backoff
//! - OpenAI chat completions and Anthropic messages (single attempt)
//! - Provider configuration loading from `nextstep.yaml`
//!
//! Each call translates a (system prompt, user prompt, credential) triple
//! into a request and normalizes the reply into [`Candidate`]s.

pub mod anthropic;
pub mod client;
pub mod config;
pub mod errors;
pub mod gemini;
pub mod openai;
pub mod types;

// Re-exports for convenience
pub use client::ProviderTransport;
pub use config::{FallbackPolicy, GuideConfig, RetryPolicy};
pub use errors::InferenceError;
pub use openai::NO_HINT_PLACEHOLDER;
pub use types::Candidate;
