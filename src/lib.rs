//! Contrastive evaluation engine for machine-generated papers and reviews
//!
//! Candidates are never scored on an absolute scale. Each one is judged
//! against populations of deliberately degraded reference variants and
//! scored by its strict percentile rank within them:
//! - Pairwise and absolute judging behind an async `Judge` seam
//! - Word and reference budgets with sentence-level truncation
//! - Bounded JSON repair for malformed judge output
//! - A meta-review track blended with the numeric ranks

pub mod compare;
pub mod config;
pub mod corpus;
pub mod criteria;
pub mod document;
pub mod error;
pub mod evaluator;
pub mod judge;
pub mod score;

// Re-exports for convenience
pub use config::EvalConfig;
pub use error::{Result, ScoreError};
pub use evaluator::{PaperEvaluator, ReviewEvaluator};
pub use judge::{Judge, MetaJudge};
