//! # docloops-eval
//!
//! Everything that turns a document into a score and a score into
//! directives:
//!
//! - [`ScoreCard`] normalizes raw backend payloads into [`EvaluationResult`]
//! - [`FocusAreaSelector`] picks what the next rewrite should address
//! - [`Evaluator`] and [`Improver`] are the seams the cycle controller drives
//! - [`AgentEvaluator`] and [`AgentImprover`] implement them on top of a
//!   command line agent, and [`CachingEvaluator`] memoizes any evaluator

mod agent_backed;
mod cache;
mod fingerprint;
mod focus;
mod model;
mod prompts;
mod response;
mod scorecard;
mod traits;

pub use agent_backed::{AgentEvaluator, AgentImprover};
pub use cache::CachingEvaluator;
pub use fingerprint::{fingerprint, short_fingerprint};
pub use focus::{FocusAreaSelector, FOCUS_THRESHOLD_PERCENT, GENERIC_FOCUS_AREAS, MAX_CATEGORY_FOCUS};
pub use model::{display_name, CategoryScore, EvaluationResult, Grade, Metadata, DEFAULT_MAX_SCORE};
pub use prompts::{EvaluationPrompts, MAX_PROMPT_CONTENT_CHARS};
pub use response::{clean_rewrite, extract_json, ResponseParseError};
pub use scorecard::{
    ScoreCard, DEFAULT_CATEGORY_MAX, GENERIC_CATEGORIES, README_CATEGORIES, WIKI_CATEGORIES,
};
pub use traits::{EvaluationError, Evaluator, ImproveError, Improver};
