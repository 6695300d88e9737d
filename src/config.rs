//! Engine configuration.
//!
//! Everything is serde-deserializable so a harness can load it from JSON
//! alongside the corpus; defaults mirror the contest settings (2000/2500
//! word budget, 5 judge attempts, k = 3 extremes).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::judge::RetryPolicy;

/// A soft (truncate) and hard (reject) threshold pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftHard {
    pub soft: usize,
    pub hard: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Word budget for ingested predictions, references excluded.
    pub word_budget: SoftHard,
    /// Record-count budget for a prediction's references block.
    pub reference_budget: SoftHard,
    /// Soft word cap applied to trusted good/bad reference documents.
    pub reference_document_max_words: usize,
    /// Retry attempts per judge call.
    pub max_judge_attempts: u32,
    /// Base delay for judge-call backoff, in milliseconds.
    pub retry_initial_delay_ms: u64,
    /// Temperature added per retry attempt.
    pub temperature_step: f32,
    /// Concurrent in-flight judge calls.
    pub judge_concurrency: usize,
    /// Slots kept per side by the extremes tracker.
    pub extremes_k: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            word_budget: SoftHard {
                soft: 2000,
                hard: 2500,
            },
            reference_budget: SoftHard {
                soft: 40,
                hard: 80,
            },
            reference_document_max_words: 2000,
            max_judge_attempts: 5,
            retry_initial_delay_ms: 200,
            temperature_step: 0.2,
            judge_concurrency: 8,
            extremes_k: 3,
        }
    }
}

impl EvalConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_judge_attempts,
            initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
            ..RetryPolicy::default()
        }
    }
}

/// Installs the default tracing subscriber with env-filter support.
/// For harnesses and examples; tests that want logs call it too.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
