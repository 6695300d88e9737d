//! Scoring pipelines.
//!
//! [`PaperEvaluator`] scores generated papers: budget the prediction, run the
//! contrastive comparator over every reference set, aggregate percentile
//! ranks, average across tasks. [`ReviewEvaluator`] scores generated peer
//! reviews: the numeric-rank track and the two meta-review tracks are
//! independent given the inputs and run as three concurrent tasks, each
//! owning its accumulators, joined before combination.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::compare::{Comparator, CriterionJudgments, SetJudgments};
use crate::config::EvalConfig;
use crate::corpus::{check_alignment, ReviewSet, Task};
use crate::criteria::{CriterionPath, ReasonTree, ScoreTree};
use crate::document::budget::apply_prediction_budgets;
use crate::document::{Document, Review};
use crate::error::Result;
use crate::judge::{Judge, MetaJudge};
use crate::score::combine::{average_meta_matrices, meta_track_scalars};
use crate::score::{blend, grand_overall, ExtremesTracker, MetaMatrix, MetaReviewer};
use crate::score::rank;

/// Outcome for one task: a score tree with its justifications, or the
/// document-level error that rejected the prediction.
#[derive(Debug, Clone, Serialize)]
pub enum TaskOutcome {
    Scored {
        scores: ScoreTree,
        reasons: ReasonTree,
    },
    Rejected {
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub id: String,
    pub outcome: TaskOutcome,
}

/// Everything the paper workflow emits for one run.
#[derive(Debug, Clone, Serialize)]
pub struct PaperRunReport {
    pub tasks: Vec<TaskReport>,
    /// Leaf-wise average over the scored tasks.
    pub overall: ScoreTree,
    pub grand_overall: f64,
}

pub struct PaperEvaluator {
    comparator: Comparator,
    config: EvalConfig,
}

impl PaperEvaluator {
    pub fn new(judge: Arc<dyn Judge>, config: EvalConfig) -> Self {
        Self {
            comparator: Comparator::new(judge, &config),
            config,
        }
    }

    /// Scores one prediction per task. Count mismatch and corpus invariant
    /// violations abort the run; a rejected or unparseable prediction only
    /// loses its own task.
    pub async fn score_run(&self, tasks: &[Task], predictions: &[String]) -> Result<PaperRunReport> {
        check_alignment(tasks.len(), predictions.len())?;
        for task in tasks {
            task.validate()?;
        }

        let mut reports = Vec::with_capacity(tasks.len());
        let mut scored = Vec::new();
        for (task, raw) in tasks.iter().zip(predictions) {
            tracing::info!(task = %task.id, "scoring prediction");
            match self.score_task(task, raw).await {
                Ok((scores, reasons)) => {
                    scored.push(scores.clone());
                    reports.push(TaskReport {
                        id: task.id.clone(),
                        outcome: TaskOutcome::Scored { scores, reasons },
                    });
                }
                Err(err) => {
                    tracing::error!(task = %task.id, error = %err, "prediction rejected");
                    reports.push(TaskReport {
                        id: task.id.clone(),
                        outcome: TaskOutcome::Rejected {
                            reason: err.to_string(),
                        },
                    });
                }
            }
        }

        let overall = ScoreTree::merge_average(&scored);
        let grand_overall = grand_overall(&overall);
        Ok(PaperRunReport {
            tasks: reports,
            overall,
            grand_overall,
        })
    }

    async fn score_task(&self, task: &Task, raw: &str) -> Result<(ScoreTree, ReasonTree)> {
        let doc = Document::parse(raw)?;
        let doc = apply_prediction_budgets(
            doc,
            self.config.word_budget,
            self.config.reference_budget,
        )?;

        let mut judgments = Vec::with_capacity(task.sets.len());
        for set in &task.sets {
            judgments.push(self.comparator.contrast(&doc, set, &task.criteria).await);
        }

        let scores = rank::aggregate(&judgments);
        Ok((scores, collect_reasons(&judgments)))
    }
}

/// Joins the judge comments gathered for each criterion into one
/// justification per leaf.
fn collect_reasons(judgments: &[SetJudgments]) -> ReasonTree {
    let mut per_path: BTreeMap<CriterionPath, Vec<String>> = BTreeMap::new();
    for set in judgments {
        for (path, entry) in &set.by_criterion {
            per_path
                .entry(path.clone())
                .or_default()
                .extend(entry.comments.iter().cloned());
        }
    }
    let mut reasons = ReasonTree::new();
    for (path, comments) in per_path {
        if !comments.is_empty() {
            reasons.insert(&path, comments.join(" || "));
        }
    }
    reasons
}

/// One review kept by the extremes tracker, with the detail reporting needs.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewRecord {
    pub id: String,
    pub review: Review,
    pub meta_scores: MetaMatrix,
    /// Fetched on demand, only for kept records.
    pub meta_reasons: Option<BTreeMap<String, [String; 5]>>,
}

/// Everything the reviewer workflow emits for one run.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewRunReport {
    pub numeric: ScoreTree,
    pub meta_good: MetaMatrix,
    pub meta_bad: MetaMatrix,
    pub overall: ScoreTree,
    pub grand_overall: f64,
    pub highest: Vec<Option<(f64, ReviewRecord)>>,
    pub lowest: Vec<Option<(f64, ReviewRecord)>>,
}

#[derive(Clone, Copy)]
enum Population {
    Good,
    Bad,
}

pub struct ReviewEvaluator {
    meta: MetaReviewer,
    config: EvalConfig,
}

impl ReviewEvaluator {
    pub fn new(meta_judge: Arc<dyn MetaJudge>, config: EvalConfig) -> Self {
        let policy = config.retry_policy();
        Self {
            meta: MetaReviewer::new(meta_judge, policy),
            config,
        }
    }

    pub async fn score_run(&self, sets: &[ReviewSet], criteria: &[String]) -> Result<ReviewRunReport> {
        let k = self.config.extremes_k;
        let (numeric, (good_matrices, good_tracker), (bad_matrices, bad_tracker)) = tokio::join!(
            async { numeric_track(sets) },
            self.meta_track(sets, criteria, Population::Good, k),
            self.meta_track(sets, criteria, Population::Bad, k),
        );

        let meta_good = average_meta_matrices(&good_matrices, criteria);
        let meta_bad = average_meta_matrices(&bad_matrices, criteria);
        let scalars = meta_track_scalars(&meta_good, &meta_bad, criteria);
        let overall = blend(&numeric, &scalars);
        let grand = grand_overall(&overall);

        let mut tracker = good_tracker;
        tracker.merge(&bad_tracker);
        let highest = self.with_reasons(tracker.highest()).await;
        let lowest = self.with_reasons(tracker.lowest()).await;

        Ok(ReviewRunReport {
            numeric,
            meta_good,
            meta_bad,
            overall,
            grand_overall: grand,
            highest,
            lowest,
        })
    }

    /// Meta-judges one population across all sets, feeding a tracker with
    /// each review's mean meta score as it streams past.
    async fn meta_track(
        &self,
        sets: &[ReviewSet],
        criteria: &[String],
        population: Population,
        k: usize,
    ) -> (Vec<MetaMatrix>, ExtremesTracker<ReviewRecord>) {
        let mut matrices = Vec::new();
        let mut tracker = ExtremesTracker::new(k);
        for set in sets {
            let reviews: Vec<&crate::corpus::ScoredReview> = match population {
                Population::Good => set.good.iter().collect(),
                Population::Bad => set.bad.values().flatten().collect(),
            };
            for scored in reviews {
                let matrix = self.meta.review_matrix(&scored.review, criteria).await;
                let mean_score = crate::score::combine::meta_matrix_mean(&matrix);
                tracker.observe(
                    mean_score,
                    ReviewRecord {
                        id: scored.id.clone(),
                        review: scored.review.clone(),
                        meta_scores: matrix.clone(),
                        meta_reasons: None,
                    },
                );
                matrices.push(matrix);
            }
        }
        (matrices, tracker)
    }

    async fn with_reasons(
        &self,
        slots: &[Option<(f64, ReviewRecord)>],
    ) -> Vec<Option<(f64, ReviewRecord)>> {
        let mut out = Vec::with_capacity(slots.len());
        for slot in slots {
            match slot {
                Some((score, record)) => {
                    let mut record = record.clone();
                    record.meta_reasons = Some(
                        self.meta
                            .review_reasons(&record.review, &record.meta_scores)
                            .await,
                    );
                    out.push(Some((*score, record)));
                }
                None => out.push(None),
            }
        }
        out
    }
}

/// The numeric-rank track: for each degraded criterion in each set, every
/// good review's score is ranked within that set's bad-review scores.
/// Ranks never cross set boundaries.
fn numeric_track(sets: &[ReviewSet]) -> ScoreTree {
    let mut judgment_sets = Vec::with_capacity(sets.len());
    for set in sets {
        let mut judgments = SetJudgments::default();
        for (criterion, bad_reviews) in &set.bad {
            let entry = judgments
                .by_criterion
                .entry(CriterionPath::top(criterion.clone()))
                .or_insert_with(CriterionJudgments::default);
            entry.candidate = set
                .good
                .iter()
                .filter_map(|r| r.review.score_of(criterion))
                .collect();
            entry.bad_population = bad_reviews
                .iter()
                .filter_map(|r| r.review.score_of(criterion))
                .collect();
        }
        judgment_sets.push(judgments);
    }
    rank::aggregate(&judgment_sets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::ScoredReview;
    use crate::document::ReviewItem;

    fn review(id: &str, scores: &[(&str, f64)]) -> ScoredReview {
        let mut items = BTreeMap::new();
        for (criterion, score) in scores {
            items.insert(
                criterion.to_string(),
                ReviewItem {
                    score: *score,
                    comment: format!("comment on {criterion}"),
                },
            );
        }
        ScoredReview {
            id: id.to_string(),
            review: Review { items },
        }
    }

    #[test]
    fn numeric_track_ranks_within_each_set() {
        let mut set = ReviewSet::default();
        set.good = vec![review("g", &[("clarity", 0.8)])];
        set.bad.insert(
            "clarity".to_string(),
            vec![
                review("b1", &[("clarity", 0.3)]),
                review("b2", &[("clarity", 0.5)]),
                review("b3", &[("clarity", 0.2)]),
            ],
        );
        let tree = numeric_track(&[set]);
        assert_eq!(tree.get(&CriterionPath::top("clarity")), Some(&1.0));
    }

    #[test]
    fn numeric_track_skips_criteria_nobody_scored() {
        let mut set = ReviewSet::default();
        set.good = vec![review("g", &[("clarity", 0.8)])];
        set.bad.insert(
            "soundness".to_string(),
            vec![review("b", &[("soundness", 0.4)])],
        );
        let tree = numeric_track(&[set]);
        assert!(tree.is_empty());
    }
}
