//! Judge seams: the external scoring oracles the engine consumes.
//!
//! The engine never calls a model directly. A [`Judge`] compares or scores
//! documents for one criterion; a [`MetaJudge`] grades whether a review's
//! free-text comment is consistent with its own numeric score along five
//! fixed meta-criteria. Implementations live outside the crate (LLM call,
//! heuristic, human); tests use deterministic stubs.

pub mod repair;
pub mod retry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::criteria::CriterionPath;
use crate::document::Document;

pub use retry::{with_policy, RetryPolicy};

/// The five meta-review axes, in vector order.
pub const META_CRITERIA: [&str; 5] = [
    "rating",
    "precision",
    "correctness",
    "recommendation",
    "respectfulness",
];

/// One judged data point. For pairwise judgments the score is the binary
/// "candidate is better" indicator, already normalized for order flips; for
/// absolute judgments it is a direct score in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    pub score: f64,
    pub comment: Option<String>,
}

impl Judgment {
    pub fn score(score: f64) -> Self {
        Self {
            score,
            comment: None,
        }
    }

    pub fn with_comment(score: f64, comment: impl Into<String>) -> Self {
        Self {
            score,
            comment: Some(comment.into()),
        }
    }

    /// Complements a pairwise indicator after a swapped presentation order.
    pub fn flipped(mut self) -> Self {
        self.score = 1.0 - self.score;
        self
    }
}

/// External comparison/scoring oracle for one criterion.
#[async_trait]
pub trait Judge: Send + Sync {
    /// Judges `(doc_a, doc_b)` in the order given and returns the indicator
    /// that the second document is better.
    async fn judge_pair(
        &self,
        criterion: &CriterionPath,
        doc_a: &Document,
        doc_b: &Document,
        temperature: f32,
    ) -> anyhow::Result<Judgment>;

    /// Scores a single document directly.
    async fn judge_single(
        &self,
        criterion: &CriterionPath,
        doc: &Document,
        temperature: f32,
    ) -> anyhow::Result<Judgment>;
}

/// External oracle grading a review's self-consistency along the five
/// [`META_CRITERIA`].
#[async_trait]
pub trait MetaJudge: Send + Sync {
    async fn meta_judge(
        &self,
        criterion: &str,
        score: f64,
        comment: &str,
    ) -> anyhow::Result<[f64; 5]>;

    /// Free-text reasons parallel to a previously returned score vector.
    async fn meta_reason(
        &self,
        criterion: &str,
        score: f64,
        comment: &str,
        scores: &[f64; 5],
    ) -> anyhow::Result<[String; 5]>;
}
