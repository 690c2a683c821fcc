//! Guide orchestrator — turns a player's progress note into a guide report.
//!
//! Pipeline for the grounded provider:
//! 1. Context refinement (best effort)
//! 2. Model fallback sequencing (hard failure only when every model fails)
//! 3. Reliability evaluation (best effort)
//! 4. Aggregation into the formatted report
//!
//! The single-message providers skip straight to one transport call.

pub mod errors;
pub mod evaluator;
pub mod fallback;
pub mod orchestrator;
pub mod prompts;
pub mod refine;
pub mod report;
pub mod types;

pub use errors::GuideError;
pub use fallback::{FallbackOutcome, NO_RELIABLE_HINT};
pub use orchestrator::run;
pub use report::{aggregate, format_report, AggregatedAnswer, Aggregation};
pub use types::{Evaluation, GuideRequest, GuideResult, Provider};
