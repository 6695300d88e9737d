//! Percentile rank aggregation.
//!
//! Raw judgments become calibrated scores by ranking the candidate within
//! the population of deliberately degraded variants: the fraction of bad
//! scores strictly below the candidate's. Relative ranking is used instead
//! of the raw judge score because absolute judge calibration drifts across
//! criteria and models.

use std::collections::BTreeMap;

use crate::compare::SetJudgments;
use crate::criteria::{mean, CriterionPath, ScoreTree};

/// Fraction of `population` strictly below `value`, in [0, 1].
pub fn strict_percentile_rank(population: &[f64], value: f64) -> f64 {
    if population.is_empty() {
        return 0.0;
    }
    let below = population.iter().filter(|&&b| b < value).count();
    below as f64 / population.len() as f64
}

/// Converts per-set judgments into one calibrated score per criterion.
///
/// Ranks never mix sets: each candidate sample is ranked within its own
/// set's bad population, the ranks averaged within the set, then averaged
/// across the sets that produced data. Criteria with an empty candidate or
/// bad population everywhere are skipped, not zeroed.
pub fn aggregate(sets: &[SetJudgments]) -> ScoreTree {
    let mut per_path: BTreeMap<CriterionPath, Vec<f64>> = BTreeMap::new();

    for set in sets {
        for (path, judgments) in &set.by_criterion {
            if judgments.candidate.is_empty() || judgments.bad_population.is_empty() {
                tracing::warn!(criterion = %path, "no contrastive data in this set, skipping");
                continue;
            }
            let ranks: Vec<f64> = judgments
                .candidate
                .iter()
                .map(|&score| strict_percentile_rank(&judgments.bad_population, score))
                .collect();
            per_path.entry(path.clone()).or_default().push(mean(&ranks));
        }
    }

    let mut tree = ScoreTree::new();
    for (path, set_means) in per_path {
        tree.insert(&path, mean(&set_means));
    }
    tree
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::CriterionJudgments;

    fn set_with(path: CriterionPath, candidate: Vec<f64>, bad: Vec<f64>) -> SetJudgments {
        let mut set = SetJudgments::default();
        set.by_criterion.insert(
            path,
            CriterionJudgments {
                candidate,
                bad_population: bad,
                comments: Vec::new(),
                failed: 0,
            },
        );
        set
    }

    #[test]
    fn rank_is_bounded_and_strict() {
        let population = [0.3, 0.5, 0.2];
        assert_eq!(strict_percentile_rank(&population, 0.8), 1.0);
        assert_eq!(strict_percentile_rank(&population, 0.1), 0.0);
        // ties are not "strictly below"
        assert!((strict_percentile_rank(&population, 0.3) - 1.0 / 3.0).abs() < 1e-9);
        for value in [-1.0, 0.0, 0.4, 2.0] {
            let rank = strict_percentile_rank(&population, value);
            assert!((0.0..=1.0).contains(&rank));
        }
    }

    #[test]
    fn candidate_dominating_all_bad_variants_ranks_one() {
        let path = CriterionPath::top("clarity");
        let sets = [set_with(path.clone(), vec![0.8], vec![0.3, 0.5, 0.2])];
        let tree = aggregate(&sets);
        assert_eq!(tree.get(&path), Some(&1.0));
    }

    #[test]
    fn sets_are_ranked_independently_then_averaged() {
        let path = CriterionPath::top("clarity");
        // set 1: rank 1.0; set 2: 0.6 beats one of two bad scores -> 0.5
        let sets = [
            set_with(path.clone(), vec![0.8], vec![0.3, 0.5]),
            set_with(path.clone(), vec![0.6], vec![0.4, 0.9]),
        ];
        let tree = aggregate(&sets);
        assert!((tree.get(&path).unwrap() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn criteria_without_data_are_skipped() {
        let path = CriterionPath::top("clarity");
        let sets = [set_with(path.clone(), vec![0.8], Vec::new())];
        let tree = aggregate(&sets);
        assert!(tree.is_empty());
        assert_eq!(tree.get(&path), None);
    }
}
