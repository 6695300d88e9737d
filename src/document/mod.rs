//! Document model: papers as ordered titled sections, reviews as per-criterion
//! score/comment pairs.
//!
//! Section order is preserved everywhere and headings are case-sensitive
//! identifiers; the `"References"` heading is structurally special and
//! matched exactly.

pub mod budget;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{BudgetKind, Result, ScoreError};
use crate::judge::repair;

/// Exact heading of the references block.
pub const REFERENCES_HEADING: &str = "References";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    pub text: String,
}

impl Section {
    pub fn new(heading: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            text: text.into(),
        }
    }

    pub fn is_references(&self) -> bool {
        self.heading == REFERENCES_HEADING
    }
}

/// A paper: an ordered sequence of titled sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    pub sections: Vec<Section>,
}

impl Document {
    pub fn new(sections: Vec<Section>) -> Self {
        Self { sections }
    }

    /// Decodes a serialized section list, running the bounded JSON repair
    /// loop before giving up with [`ScoreError::Format`].
    pub fn parse(raw: &str) -> Result<Self> {
        let value = repair::parse_lenient(raw)?;
        serde_json::from_value(value).map_err(|err| ScoreError::Format {
            attempts: 0,
            detail: format!("decoded JSON is not a section list: {err}"),
        })
    }

    /// Word count over heading and text of every section, optionally
    /// excluding the references block.
    pub fn word_count(&self, exclude_references: bool) -> usize {
        self.sections
            .iter()
            .filter(|s| !(exclude_references && s.is_references()))
            .map(|s| word_tokens(&s.heading) + word_tokens(&s.text))
            .sum()
    }

    /// The references block, if present. The last matching section wins.
    pub fn references(&self) -> Option<&Section> {
        self.sections.iter().rev().find(|s| s.is_references())
    }

    pub fn references_mut(&mut self) -> Option<&mut Section> {
        self.sections.iter_mut().rev().find(|s| s.is_references())
    }

    /// A copy with the references block removed, for pairwise judging where
    /// the citation list would only pad the prompt.
    pub fn without_references(&self) -> Document {
        Document {
            sections: self
                .sections
                .iter()
                .filter(|s| !s.is_references())
                .cloned()
                .collect(),
        }
    }
}

/// Whitespace word tokenization shared by counting and budgeting.
pub fn word_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

/// One criterion entry of a review: a numeric score and its justification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub score: f64,
    pub comment: String,
}

/// A peer review: per-criterion score/comment pairs keyed by criterion name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Review {
    pub items: BTreeMap<String, ReviewItem>,
}

impl Review {
    /// Hard budget on a single comment's length, in characters.
    pub const MAX_COMMENT_CHARS: usize = 2000;

    /// Decodes a serialized review leniently. Criterion keys are normalized
    /// (lowercased, spaces stripped) and each comment is checked against the
    /// comment-length budget.
    pub fn parse(raw: &str) -> Result<Self> {
        let value = repair::parse_lenient(raw)?;
        let decoded: BTreeMap<String, ReviewItem> =
            serde_json::from_value(value).map_err(|err| ScoreError::Format {
                attempts: 0,
                detail: format!("decoded JSON is not a review: {err}"),
            })?;

        let mut items = BTreeMap::new();
        for (key, item) in decoded {
            if item.comment.chars().count() >= Self::MAX_COMMENT_CHARS {
                return Err(ScoreError::BudgetExceeded {
                    kind: BudgetKind::Comment,
                    count: item.comment.chars().count(),
                    limit: Self::MAX_COMMENT_CHARS,
                });
            }
            items.insert(normalize_key(&key), item);
        }
        Ok(Self { items })
    }

    pub fn item(&self, criterion: &str) -> Option<&ReviewItem> {
        self.items.get(criterion)
    }

    pub fn score_of(&self, criterion: &str) -> Option<f64> {
        self.items.get(criterion).map(|i| i.score)
    }
}

fn normalize_key(key: &str) -> String {
    key.to_lowercase().replace(' ', "")
}
