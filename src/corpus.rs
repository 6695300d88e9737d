//! Reference sets, tasks and prediction-feed alignment.
//!
//! Loading metadata/CSV from disk is the harness's job; this module owns the
//! in-memory shapes, the corpus invariants, and the feed format the
//! prediction files use.

use std::collections::BTreeMap;

use crate::config::EvalConfig;
use crate::criteria::{CriterionPath, CriterionTree};
use crate::document::budget::truncate_reference_document;
use crate::document::{Document, Review};
use crate::error::{Result, ScoreError};

/// Delimiter between serialized documents in a prediction feed.
pub const FEED_DELIMITER: &str = "\n\n\n\n";

/// The good/bad reference variants for one prompt. Every bad group is keyed
/// by the single criterion path its variants were degraded along.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    pub good: Vec<Document>,
    pub bad: BTreeMap<CriterionPath, Vec<Document>>,
}

impl ReferenceSet {
    /// Checks the corpus invariant: every bad-group key names a leaf of the
    /// task's criterion tree.
    pub fn validate(&self, criteria: &CriterionTree) -> Result<()> {
        for path in self.bad.keys() {
            if !criteria.contains_path(path) {
                return Err(ScoreError::UnknownCriterion {
                    path: path.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Soft-truncates every reference document to the trusted-input word cap.
    pub fn truncate_documents(&mut self, max_words: usize) {
        let truncate = |doc: &mut Document| {
            let taken = std::mem::replace(doc, Document::new(Vec::new()));
            *doc = truncate_reference_document(taken, max_words);
        };
        self.good.iter_mut().for_each(truncate);
        for docs in self.bad.values_mut() {
            docs.iter_mut().for_each(truncate);
        }
    }
}

/// One paper-generation task: a prompt, its criterion tree, and one or more
/// reference sets to contrast a prediction against.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: String,
    pub prompt: String,
    pub criteria: CriterionTree,
    pub sets: Vec<ReferenceSet>,
}

impl Task {
    pub fn validate(&self) -> Result<()> {
        for set in &self.sets {
            set.validate(&self.criteria)?;
        }
        Ok(())
    }

    pub fn prepare(&mut self, config: &EvalConfig) -> Result<()> {
        self.validate()?;
        for set in &mut self.sets {
            set.truncate_documents(config.reference_document_max_words);
        }
        Ok(())
    }
}

/// A review with the corpus identity it was filed under.
#[derive(Debug, Clone)]
pub struct ScoredReview {
    pub id: String,
    pub review: Review,
}

/// One paper's worth of reviews for the reviewer workflow: reviews of the
/// good variants plus, per degraded criterion, reviews of the bad variants.
#[derive(Debug, Clone, Default)]
pub struct ReviewSet {
    pub good: Vec<ScoredReview>,
    pub bad: BTreeMap<String, Vec<ScoredReview>>,
}

/// Splits a prediction feed into serialized chunks. The feed ends with a
/// trailing delimiter, so empty tail chunks are dropped.
pub fn split_feed(raw: &str) -> Vec<&str> {
    let mut chunks: Vec<&str> = raw.split(FEED_DELIMITER).collect();
    while matches!(chunks.last(), Some(c) if c.trim().is_empty()) {
        chunks.pop();
    }
    chunks
}

/// Parses a review feed. A chunk may carry an `ID: n` first line naming the
/// corpus id it reviews; chunks without one are numbered by position.
pub fn parse_review_feed(raw: &str) -> Result<Vec<ScoredReview>> {
    let mut reviews = Vec::new();
    for (index, chunk) in split_feed(raw).iter().enumerate() {
        let (id, body) = match chunk.trim_start().strip_prefix("ID: ") {
            Some(rest) => {
                let (id_line, body) = rest.split_once('\n').unwrap_or((rest, ""));
                (id_line.trim().to_string(), body)
            }
            None => (index.to_string(), *chunk),
        };
        reviews.push(ScoredReview {
            id,
            review: Review::parse(body)?,
        });
    }
    Ok(reviews)
}

/// Batch-level precondition: one prediction per loaded task.
pub fn check_alignment(solutions: usize, predictions: usize) -> Result<()> {
    if solutions != predictions {
        return Err(ScoreError::SolutionMismatch {
            solutions,
            predictions,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::EvalMode;

    #[test]
    fn bad_group_keys_must_exist_in_the_tree() {
        let mut criteria = CriterionTree::new();
        criteria.insert(&CriterionPath::parse("clarity:organization"), EvalMode::Pairwise);
        let mut set = ReferenceSet::default();
        set.bad
            .insert(CriterionPath::parse("clarity:organization"), Vec::new());
        assert!(set.validate(&criteria).is_ok());

        set.bad.insert(CriterionPath::parse("soundness"), Vec::new());
        assert!(matches!(
            set.validate(&criteria),
            Err(ScoreError::UnknownCriterion { .. })
        ));
    }

    #[test]
    fn feed_split_drops_the_trailing_chunk() {
        let raw = "one\n\n\n\ntwo\n\n\n\n";
        assert_eq!(split_feed(raw), vec!["one", "two"]);
    }

    #[test]
    fn review_feed_ids_are_read_or_assigned() {
        let raw = concat!(
            "ID: 7\n{\"clarity\": {\"score\": 0.5, \"comment\": \"ok\"}}",
            "\n\n\n\n",
            "{\"clarity\": {\"score\": 0.9, \"comment\": \"good\"}}",
            "\n\n\n\n",
        );
        let reviews = parse_review_feed(raw).unwrap();
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].id, "7");
        assert_eq!(reviews[1].id, "1");
        assert_eq!(reviews[1].review.score_of("clarity"), Some(0.9));
    }

    #[test]
    fn alignment_mismatch_is_fatal() {
        assert!(check_alignment(3, 3).is_ok());
        assert!(matches!(
            check_alignment(3, 2),
            Err(ScoreError::SolutionMismatch {
                solutions: 3,
                predictions: 2,
            })
        ));
    }
}
