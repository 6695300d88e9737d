//! Contrastive comparator.
//!
//! Runs one candidate against a reference set: pairwise contrasts against
//! every good document, plus one contrast per bad variant restricted to the
//! single criterion that variant degrades. Judge calls are independent and
//! I/O-bound, so they fan out through a bounded worker pool; results land in
//! disjoint per-criterion slots.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use rand::Rng;

use crate::config::EvalConfig;
use crate::corpus::ReferenceSet;
use crate::criteria::{CriterionPath, CriterionTree, EvalMode};
use crate::document::Document;
use crate::error::{Result, ScoreError};
use crate::judge::{with_policy, Judge, Judgment, RetryPolicy};

/// Raw judgments collected for one criterion within one reference set.
///
/// `candidate` holds the candidate's own score samples (one per good-document
/// contrast, or one absolute score); `bad_population` holds one score per bad
/// variant, oriented so that a higher value means the bad variant stands
/// better against the candidate.
#[derive(Debug, Clone, Default)]
pub struct CriterionJudgments {
    pub candidate: Vec<f64>,
    pub bad_population: Vec<f64>,
    pub comments: Vec<String>,
    pub failed: usize,
}

/// All judgments for one (candidate, reference set) pass.
#[derive(Debug, Clone, Default)]
pub struct SetJudgments {
    pub by_criterion: BTreeMap<CriterionPath, CriterionJudgments>,
}

enum Call<'a> {
    PairGood {
        path: CriterionPath,
        good: &'a Document,
    },
    PairBad {
        path: CriterionPath,
        bad: &'a Document,
    },
    SingleCandidate {
        path: CriterionPath,
    },
    SingleBad {
        path: CriterionPath,
        bad: &'a Document,
    },
}

impl Call<'_> {
    fn path(&self) -> &CriterionPath {
        match self {
            Call::PairGood { path, .. }
            | Call::PairBad { path, .. }
            | Call::SingleCandidate { path }
            | Call::SingleBad { path, .. } => path,
        }
    }

    fn is_candidate_sample(&self) -> bool {
        matches!(self, Call::PairGood { .. } | Call::SingleCandidate { .. })
    }
}

pub struct Comparator {
    judge: Arc<dyn Judge>,
    policy: RetryPolicy,
    concurrency: usize,
    temperature_step: f32,
}

impl Comparator {
    pub fn new(judge: Arc<dyn Judge>, config: &EvalConfig) -> Self {
        Self {
            judge,
            policy: config.retry_policy(),
            concurrency: config.judge_concurrency.max(1),
            temperature_step: config.temperature_step,
        }
    }

    /// Collects one judgment per (reference document, criterion) pair.
    /// A pair that exhausts its retries is logged and recorded absent; the
    /// rest of the pass continues.
    pub async fn contrast(
        &self,
        candidate: &Document,
        set: &ReferenceSet,
        criteria: &CriterionTree,
    ) -> SetJudgments {
        let stripped = candidate.without_references();

        let mut calls: Vec<Call> = Vec::new();
        for path in criteria.leaf_paths() {
            match criteria.get(&path).copied() {
                Some(EvalMode::Pairwise) => {
                    for good in &set.good {
                        calls.push(Call::PairGood {
                            path: path.clone(),
                            good,
                        });
                    }
                }
                Some(EvalMode::Absolute) => calls.push(Call::SingleCandidate { path }),
                None => {}
            }
        }
        // bad variants are judged only on the criterion they degrade
        for (path, docs) in &set.bad {
            let mode = criteria.get(path).copied().unwrap_or(EvalMode::Pairwise);
            for bad in docs {
                calls.push(match mode {
                    EvalMode::Pairwise => Call::PairBad {
                        path: path.clone(),
                        bad,
                    },
                    EvalMode::Absolute => Call::SingleBad {
                        path: path.clone(),
                        bad,
                    },
                });
            }
        }

        let stripped = &stripped;
        let results: Vec<(CriterionPath, bool, Result<Judgment>)> = stream::iter(calls)
            .map(|call| async move {
                let path = call.path().clone();
                let sample = call.is_candidate_sample();
                let outcome = self.dispatch(&call, candidate, stripped).await;
                (path, sample, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut judgments = SetJudgments::default();
        for (path, is_sample, outcome) in results {
            let entry = judgments.by_criterion.entry(path.clone()).or_default();
            match outcome {
                Ok(judgment) => {
                    if is_sample {
                        entry.candidate.push(judgment.score);
                        if let Some(comment) = judgment.comment {
                            entry.comments.push(comment);
                        }
                    } else {
                        entry.bad_population.push(judgment.score);
                    }
                }
                Err(err) => {
                    tracing::warn!(criterion = %path, error = %err, "judgment recorded absent");
                    entry.failed += 1;
                }
            }
        }
        judgments
    }

    async fn dispatch(
        &self,
        call: &Call<'_>,
        candidate: &Document,
        stripped: &Document,
    ) -> Result<Judgment> {
        match call {
            Call::PairGood { path, good } => self.pair_indicator(path, good, stripped).await,
            Call::PairBad { path, bad } => self
                .pair_indicator(path, bad, stripped)
                .await
                // the bad variant's population score is its standing against
                // the candidate, the complement of "candidate is better"
                .map(Judgment::flipped),
            Call::SingleCandidate { path } => self.single(path, candidate).await,
            Call::SingleBad { path, bad } => self.single(path, bad).await,
        }
    }

    /// Pairwise contrast with the presentation order randomized 50/50; a
    /// swapped order complements the indicator, so the returned judgment
    /// always means "candidate is better".
    async fn pair_indicator(
        &self,
        path: &CriterionPath,
        reference: &Document,
        candidate: &Document,
    ) -> Result<Judgment> {
        let reference = reference.without_references();
        let reference = &reference;
        let swapped = rand::thread_rng().gen_bool(0.5);
        let judge = &self.judge;
        let step = self.temperature_step;

        with_policy(
            &self.policy,
            |attempt| {
                let temperature = step * attempt as f32;
                async move {
                    if swapped {
                        Ok(judge
                            .judge_pair(path, candidate, reference, temperature)
                            .await?
                            .flipped())
                    } else {
                        judge.judge_pair(path, reference, candidate, temperature).await
                    }
                }
            },
            |_| true,
        )
        .await
        .map_err(|err| self.exhausted(path, err))
    }

    async fn single(&self, path: &CriterionPath, doc: &Document) -> Result<Judgment> {
        let judge = &self.judge;
        let step = self.temperature_step;
        with_policy(
            &self.policy,
            |attempt| {
                let temperature = step * attempt as f32;
                async move { judge.judge_single(path, doc, temperature).await }
            },
            |_| true,
        )
        .await
        .map_err(|err| self.exhausted(path, err))
    }

    fn exhausted(&self, path: &CriterionPath, err: anyhow::Error) -> ScoreError {
        ScoreError::JudgmentFailed {
            criterion: path.to_string(),
            attempts: self.policy.max_attempts,
            detail: err.to_string(),
        }
    }
}
