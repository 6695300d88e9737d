//! Criterion taxonomy and score trees.
//!
//! Criteria form a two-level tree: a super-criterion is either a leaf (judged
//! as a whole, e.g. `responsibility`) or a branch of named sub-criteria
//! (e.g. `clarity -> {organization, explanations}`). Score trees share the
//! same shape with `f64` leaves, justification trees with `String` leaves,
//! so the tree is generic over its leaf payload.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Path to a leaf criterion: a super-criterion plus an optional sub-criterion.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CriterionPath {
    pub category: String,
    pub sub: Option<String>,
}

impl CriterionPath {
    pub fn top(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            sub: None,
        }
    }

    pub fn nested(category: impl Into<String>, sub: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            sub: Some(sub.into()),
        }
    }

    /// Parses `"clarity"` or `"clarity:organization"`.
    pub fn parse(s: &str) -> Self {
        match s.split_once(':') {
            Some((category, sub)) => Self::nested(category, sub),
            None => Self::top(s),
        }
    }
}

impl fmt::Display for CriterionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sub {
            Some(sub) => write!(f, "{}:{}", self.category, sub),
            None => write!(f, "{}", self.category),
        }
    }
}

/// How a leaf criterion is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvalMode {
    /// Candidate is judged against a reference document, order randomized.
    Pairwise,
    /// Candidate is judged alone and scored directly.
    Absolute,
}

/// One node of a criterion-shaped tree: a leaf payload or a branch of
/// named children. A key always maps to exactly one of the two.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node<T> {
    Leaf(T),
    Branch(BTreeMap<String, Node<T>>),
}

/// A two-level tree keyed by super-criterion name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tree<T>(pub BTreeMap<String, Node<T>>);

pub type CriterionTree = Tree<EvalMode>;
pub type ScoreTree = Tree<f64>;
pub type ReasonTree = Tree<String>;

impl<T> Default for Tree<T> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<T> Tree<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Inserts a leaf payload at `path`. A conflicting shape at the same key
    /// is replaced: the taxonomy never mixes leaf and branch under one key.
    pub fn insert(&mut self, path: &CriterionPath, value: T) {
        match &path.sub {
            None => {
                self.0.insert(path.category.clone(), Node::Leaf(value));
            }
            Some(sub) => {
                let node = self
                    .0
                    .entry(path.category.clone())
                    .or_insert_with(|| Node::Branch(BTreeMap::new()));
                if !matches!(node, Node::Branch(_)) {
                    *node = Node::Branch(BTreeMap::new());
                }
                if let Node::Branch(children) = node {
                    children.insert(sub.clone(), Node::Leaf(value));
                }
            }
        }
    }

    /// Returns the leaf payload at `path`, if that exact leaf exists.
    pub fn get(&self, path: &CriterionPath) -> Option<&T> {
        match (self.0.get(&path.category), &path.sub) {
            (Some(Node::Leaf(v)), None) => Some(v),
            (Some(Node::Branch(children)), Some(sub)) => match children.get(sub) {
                Some(Node::Leaf(v)) => Some(v),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn contains_path(&self, path: &CriterionPath) -> bool {
        self.get(path).is_some()
    }

    /// All leaf paths in key order.
    pub fn leaf_paths(&self) -> Vec<CriterionPath> {
        let mut paths = Vec::new();
        for (category, node) in &self.0 {
            match node {
                Node::Leaf(_) => paths.push(CriterionPath::top(category.clone())),
                Node::Branch(children) => {
                    for (sub, child) in children {
                        if matches!(child, Node::Leaf(_)) {
                            paths.push(CriterionPath::nested(category.clone(), sub.clone()));
                        }
                    }
                }
            }
        }
        paths
    }
}

impl Tree<f64> {
    /// Mean of each super-criterion: a leaf contributes its value, a branch
    /// the mean of its leaves.
    pub fn category_means(&self) -> BTreeMap<String, f64> {
        let mut means = BTreeMap::new();
        for (category, node) in &self.0 {
            match node {
                Node::Leaf(v) => {
                    means.insert(category.clone(), *v);
                }
                Node::Branch(children) => {
                    let leaves: Vec<f64> = children
                        .values()
                        .filter_map(|c| match c {
                            Node::Leaf(v) => Some(*v),
                            Node::Branch(_) => None,
                        })
                        .collect();
                    if !leaves.is_empty() {
                        means.insert(category.clone(), mean(&leaves));
                    }
                }
            }
        }
        means
    }

    /// Averages a list of score trees leaf-by-leaf. A leaf missing from some
    /// trees is averaged over the trees that do carry it.
    pub fn merge_average(trees: &[ScoreTree]) -> ScoreTree {
        let mut samples: BTreeMap<CriterionPath, Vec<f64>> = BTreeMap::new();
        for tree in trees {
            for path in tree.leaf_paths() {
                if let Some(v) = tree.get(&path) {
                    samples.entry(path).or_default().push(*v);
                }
            }
        }
        let mut merged = ScoreTree::new();
        for (path, values) in samples {
            merged.insert(&path, mean(&values));
        }
        merged
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> ScoreTree {
        let mut tree = ScoreTree::new();
        tree.insert(&CriterionPath::nested("clarity", "organization"), 0.4);
        tree.insert(&CriterionPath::nested("clarity", "explanations"), 0.6);
        tree.insert(&CriterionPath::top("responsibility"), 0.8);
        tree
    }

    #[test]
    fn leaf_paths_cover_both_levels() {
        let tree = sample_tree();
        let paths = tree.leaf_paths();
        assert_eq!(paths.len(), 3);
        assert!(tree.contains_path(&CriterionPath::parse("clarity:organization")));
        assert!(tree.contains_path(&CriterionPath::parse("responsibility")));
        assert!(!tree.contains_path(&CriterionPath::parse("clarity")));
    }

    #[test]
    fn category_means_average_branch_leaves() {
        let means = sample_tree().category_means();
        assert!((means["clarity"] - 0.5).abs() < 1e-9);
        assert!((means["responsibility"] - 0.8).abs() < 1e-9);
    }

    #[test]
    fn merge_average_tolerates_missing_leaves() {
        let mut other = ScoreTree::new();
        other.insert(&CriterionPath::nested("clarity", "organization"), 0.6);
        let merged = ScoreTree::merge_average(&[sample_tree(), other]);
        assert!((merged.get(&CriterionPath::parse("clarity:organization")).unwrap() - 0.5).abs() < 1e-9);
        // present in only one tree, averaged over that one
        assert!((merged.get(&CriterionPath::parse("responsibility")).unwrap() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn serializes_like_the_wire_format() {
        let tree = sample_tree();
        let json = serde_json::to_string(&tree).unwrap();
        let back: ScoreTree = serde_json::from_str(&json).unwrap();
        assert_eq!(tree, back);
    }
}
