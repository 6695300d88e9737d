//! Error taxonomy for the scoring engine.
//!
//! Document- and pair-level failures are isolated and recorded by the
//! pipelines; run-level precondition failures abort the whole pass.

use std::fmt;

use thiserror::Error;

/// Which budget a prediction blew through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetKind {
    Words,
    References,
    Comment,
}

impl fmt::Display for BudgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetKind::Words => write!(f, "word"),
            BudgetKind::References => write!(f, "reference"),
            BudgetKind::Comment => write!(f, "comment length"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ScoreError {
    /// A serialized document could not be decoded even after the bounded
    /// repair loop ran out of fix-up attempts.
    #[error("document could not be parsed after {attempts} repair attempts: {detail}")]
    Format { attempts: usize, detail: String },

    /// A prediction exceeded a hard budget. Fatal for that prediction.
    #[error("{kind} budget exceeded: {count} over hard limit {limit}")]
    BudgetExceeded {
        kind: BudgetKind,
        count: usize,
        limit: usize,
    },

    /// A judge call exhausted its retry budget for one (reference, criterion)
    /// pair. The pass continues with that data point absent.
    #[error("judgment failed for criterion '{criterion}' after {attempts} attempts: {detail}")]
    JudgmentFailed {
        criterion: String,
        attempts: u32,
        detail: String,
    },

    /// Loaded reference sets and supplied predictions disagree in count.
    /// Fatal for the whole run.
    #[error("number of reference sets ({solutions}) does not match number of predictions ({predictions})")]
    SolutionMismatch {
        solutions: usize,
        predictions: usize,
    },

    /// A bad-paper group is keyed by a criterion path that does not exist in
    /// the task's criterion tree.
    #[error("bad-paper group keyed by unknown criterion path '{path}'")]
    UnknownCriterion { path: String },
}

pub type Result<T> = std::result::Result<T, ScoreError>;
