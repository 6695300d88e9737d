//! Composite score combination.
//!
//! Two tracks feed the final score: the numeric percentile-rank tree and,
//! for the reviewer workflow, the meta-review track grading whether each
//! review's comment is consistent with its own score. The grand overall
//! treats `relevance` as a multiplicative gate: an irrelevant document
//! cannot earn a high score whatever its other qualities.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::criteria::{mean, CriterionPath, ScoreTree};
use crate::document::Review;
use crate::judge::{with_policy, MetaJudge, RetryPolicy};

/// Name of the gating criterion.
pub const RELEVANCE: &str = "relevance";

/// Five meta-review scores in [`crate::judge::META_CRITERIA`] order.
pub type MetaVector = [f64; 5];

/// Per-criterion meta-review scores for one review.
pub type MetaMatrix = BTreeMap<String, MetaVector>;

/// Mean over every component of every criterion's vector.
pub fn meta_matrix_mean(matrix: &MetaMatrix) -> f64 {
    let values: Vec<f64> = matrix.values().flatten().copied().collect();
    mean(&values)
}

/// Element-wise average of a population of meta matrices, per criterion.
pub fn average_meta_matrices(matrices: &[MetaMatrix], criteria: &[String]) -> MetaMatrix {
    let mut averaged = MetaMatrix::new();
    for criterion in criteria {
        let vectors: Vec<&MetaVector> =
            matrices.iter().filter_map(|m| m.get(criterion)).collect();
        if vectors.is_empty() {
            continue;
        }
        let mut sum = [0.0; 5];
        for vector in &vectors {
            for (slot, value) in sum.iter_mut().zip(vector.iter()) {
                *slot += value;
            }
        }
        sum.iter_mut().for_each(|v| *v /= vectors.len() as f64);
        averaged.insert(criterion.clone(), sum);
    }
    averaged
}

/// Reduces the good- and bad-population meta averages to one scalar per
/// criterion: the two averages are averaged, then the five components
/// collapsed by their plain mean.
pub fn meta_track_scalars(good: &MetaMatrix, bad: &MetaMatrix, criteria: &[String]) -> BTreeMap<String, f64> {
    let mut scalars = BTreeMap::new();
    for criterion in criteria {
        let (g, b) = match (good.get(criterion), bad.get(criterion)) {
            (Some(g), Some(b)) => (*g, *b),
            (Some(g), None) => (*g, *g),
            (None, Some(b)) => (*b, *b),
            (None, None) => continue,
        };
        let combined: Vec<f64> = g.iter().zip(b.iter()).map(|(x, y)| (x + y) / 2.0).collect();
        scalars.insert(criterion.clone(), mean(&combined));
    }
    scalars
}

/// Blends the numeric track with the meta track:
/// `(numeric + meta) / 2` where a meta value exists, the numeric value alone
/// otherwise, and the meta value alone where the numeric track has a gap.
pub fn blend(numeric: &ScoreTree, meta: &BTreeMap<String, f64>) -> ScoreTree {
    let mut overall = numeric.clone();
    for (criterion, meta_value) in meta {
        let path = CriterionPath::top(criterion.clone());
        let blended = match numeric.get(&path) {
            Some(numeric_value) => (numeric_value + meta_value) / 2.0,
            None => *meta_value,
        };
        overall.insert(&path, blended);
    }
    overall
}

/// Grand overall scalar. With a `relevance` criterion present the result is
/// `relevance * mean(all other criteria)`; otherwise the plain mean of the
/// super-criterion means.
pub fn grand_overall(tree: &ScoreTree) -> f64 {
    let means = tree.category_means();
    if means.is_empty() {
        return 0.0;
    }
    match means.get(RELEVANCE) {
        Some(relevance) => {
            let others: Vec<f64> = means
                .iter()
                .filter(|(name, _)| name.as_str() != RELEVANCE)
                .map(|(_, v)| *v)
                .collect();
            if others.is_empty() {
                *relevance
            } else {
                relevance * mean(&others)
            }
        }
        None => mean(&means.values().copied().collect::<Vec<f64>>()),
    }
}

/// Runs the meta judge over reviews, one call per (review, criterion) pair,
/// with the shared retry policy. A pair that exhausts its retries is
/// recorded absent from that review's matrix.
pub struct MetaReviewer {
    meta_judge: Arc<dyn MetaJudge>,
    policy: RetryPolicy,
}

impl MetaReviewer {
    pub fn new(meta_judge: Arc<dyn MetaJudge>, policy: RetryPolicy) -> Self {
        Self { meta_judge, policy }
    }

    pub async fn review_matrix(&self, review: &Review, criteria: &[String]) -> MetaMatrix {
        let mut matrix = MetaMatrix::new();
        for criterion in criteria {
            let Some(item) = review.item(criterion) else {
                continue;
            };
            let judge = &self.meta_judge;
            let outcome = with_policy(
                &self.policy,
                |_attempt| async move {
                    judge.meta_judge(criterion, item.score, &item.comment).await
                },
                |_| true,
            )
            .await;
            match outcome {
                Ok(vector) => {
                    matrix.insert(criterion.clone(), vector);
                }
                Err(err) => {
                    tracing::warn!(criterion, error = %err, "meta judgment recorded absent");
                }
            }
        }
        matrix
    }

    /// Free-text reasons for an already-scored review; fetched on demand,
    /// only for the records kept by the extremes tracker.
    pub async fn review_reasons(
        &self,
        review: &Review,
        matrix: &MetaMatrix,
    ) -> BTreeMap<String, [String; 5]> {
        let mut reasons = BTreeMap::new();
        for (criterion, scores) in matrix {
            let Some(item) = review.item(criterion) else {
                continue;
            };
            let judge = &self.meta_judge;
            let outcome = with_policy(
                &self.policy,
                |_attempt| async move {
                    judge
                        .meta_reason(criterion, item.score, &item.comment, scores)
                        .await
                },
                |_| true,
            )
            .await;
            match outcome {
                Ok(texts) => {
                    reasons.insert(criterion.clone(), texts);
                }
                Err(err) => {
                    tracing::warn!(criterion, error = %err, "meta reasons unavailable");
                }
            }
        }
        reasons
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with(entries: &[(&str, f64)]) -> ScoreTree {
        let mut tree = ScoreTree::new();
        for (path, value) in entries {
            tree.insert(&CriterionPath::parse(path), *value);
        }
        tree
    }

    #[test]
    fn relevance_gates_the_grand_overall() {
        let tree = tree_with(&[("relevance", 0.0), ("clarity", 0.9), ("soundness", 1.0)]);
        assert_eq!(grand_overall(&tree), 0.0);

        let tree = tree_with(&[("relevance", 0.5), ("clarity", 0.6), ("soundness", 0.8)]);
        assert!((grand_overall(&tree) - 0.5 * 0.7).abs() < 1e-9);
    }

    #[test]
    fn without_relevance_the_overall_is_a_plain_mean() {
        let tree = tree_with(&[("clarity", 0.6), ("soundness", 0.8)]);
        assert!((grand_overall(&tree) - 0.7).abs() < 1e-9);
    }

    #[test]
    fn sub_criteria_average_into_their_category_first() {
        let tree = tree_with(&[
            ("relevance", 1.0),
            ("clarity:organization", 0.2),
            ("clarity:explanations", 0.8),
        ]);
        assert!((grand_overall(&tree) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn blend_averages_where_both_tracks_exist() {
        let numeric = tree_with(&[("clarity", 0.4), ("soundness", 0.6)]);
        let meta = BTreeMap::from([("clarity".to_string(), 0.8)]);
        let overall = blend(&numeric, &meta);
        assert!((overall.get(&CriterionPath::top("clarity")).unwrap() - 0.6).abs() < 1e-9);
        assert!((overall.get(&CriterionPath::top("soundness")).unwrap() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn meta_scalars_average_populations_then_components() {
        let criteria = vec!["clarity".to_string()];
        let good = MetaMatrix::from([("clarity".to_string(), [1.0, 1.0, 1.0, 1.0, 1.0])]);
        let bad = MetaMatrix::from([("clarity".to_string(), [0.0, 0.0, 0.0, 0.0, 0.0])]);
        let scalars = meta_track_scalars(&good, &bad, &criteria);
        assert!((scalars["clarity"] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn matrix_averaging_is_elementwise() {
        let criteria = vec!["clarity".to_string()];
        let a = MetaMatrix::from([("clarity".to_string(), [0.0, 0.2, 0.4, 0.6, 0.8])]);
        let b = MetaMatrix::from([("clarity".to_string(), [1.0, 0.8, 0.6, 0.4, 0.2])]);
        let averaged = average_meta_matrices(&[a, b], &criteria);
        assert_eq!(averaged["clarity"], [0.5; 5]);
    }
}
