//! Text budgeting engine.
//!
//! Two independent budgets apply to an ingested prediction: a word budget
//! over the prose sections and a record-count budget over the references
//! block. Each has a soft threshold (truncate) and a hard threshold (reject).
//! Trusted reference documents get only the soft sentence-dropping pass.

use std::sync::OnceLock;

use regex::Regex;

use crate::config::SoftHard;
use crate::document::Document;
use crate::error::{BudgetKind, Result, ScoreError};

/// Blank-line delimiter between citation records in the references block.
pub const REFERENCE_DELIMITER: &str = "\n\n";

fn sentence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // a sentence: text up to a terminator run, or a trailing fragment
    RE.get_or_init(|| Regex::new(r"[^.!?]*[.!?]+(?:\s+|$)|[^.!?]+$").expect("valid regex"))
}

fn split_sentences(text: &str) -> Vec<&str> {
    sentence_regex()
        .find_iter(text)
        .map(|m| m.as_str())
        .collect()
}

fn drop_last_sentence(text: &str) -> String {
    let sentences = split_sentences(text);
    if sentences.len() <= 1 {
        return String::new();
    }
    sentences[..sentences.len() - 1]
        .concat()
        .trim_end()
        .to_string()
}

/// One full pass dropping the last sentence of every non-references section.
/// Returns whether any section shrank. Emptied sections are retained with
/// their heading so structural positions survive.
fn sentence_drop_pass(doc: &mut Document) -> bool {
    let mut changed = false;
    for section in &mut doc.sections {
        if section.is_references() || section.text.is_empty() {
            continue;
        }
        let shorter = drop_last_sentence(&section.text);
        if shorter.len() < section.text.len() {
            changed = true;
        }
        section.text = shorter;
    }
    changed
}

/// Enforces the word budget on a prediction. Over the hard limit the
/// candidate is rejected; over the soft limit sentences are dropped from the
/// end of each prose section, a full pass at a time, until the count fits.
pub fn truncate_to_word_budget(mut doc: Document, budget: SoftHard) -> Result<Document> {
    let count = doc.word_count(true);
    if count > budget.hard {
        return Err(ScoreError::BudgetExceeded {
            kind: BudgetKind::Words,
            count,
            limit: budget.hard,
        });
    }
    if count <= budget.soft {
        return Ok(doc);
    }

    tracing::warn!(count, soft = budget.soft, "prediction over soft word budget, truncating");
    loop {
        let changed = sentence_drop_pass(&mut doc);
        if doc.word_count(true) <= budget.soft || !changed {
            // headings alone can hold the count above the soft limit
            break;
        }
    }
    Ok(doc)
}

/// Enforces the reference-count budget on a prediction's references block.
pub fn truncate_to_reference_budget(mut doc: Document, budget: SoftHard) -> Result<Document> {
    let Some(refs) = doc.references_mut() else {
        return Ok(doc);
    };
    let records: Vec<&str> = refs.text.split(REFERENCE_DELIMITER).collect();
    let count = records.len();
    if count > budget.hard {
        return Err(ScoreError::BudgetExceeded {
            kind: BudgetKind::References,
            count,
            limit: budget.hard,
        });
    }
    if count > budget.soft {
        tracing::warn!(count, soft = budget.soft, "too many references, keeping the first {}", budget.soft);
        refs.text = records[..budget.soft].join(REFERENCE_DELIMITER);
    }
    Ok(doc)
}

/// Applies both prediction budgets in order: words first, then references.
pub fn apply_prediction_budgets(
    doc: Document,
    words: SoftHard,
    references: SoftHard,
) -> Result<Document> {
    let doc = truncate_to_word_budget(doc, words)?;
    truncate_to_reference_budget(doc, references)
}

/// Soft truncation for trusted good/bad reference documents: sentence-drop
/// passes until the word count fits, never a hard failure.
pub fn truncate_reference_document(mut doc: Document, max_words: usize) -> Document {
    while doc.word_count(true) > max_words {
        if !sentence_drop_pass(&mut doc) {
            break;
        }
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Section;

    fn doc_with(body: &str) -> Document {
        Document::new(vec![
            Section::new("Introduction", body),
            Section::new("References", "Smith 2020\n\nJones 2021\n\nDoe 2019"),
        ])
    }

    fn budget(soft: usize, hard: usize) -> SoftHard {
        SoftHard { soft, hard }
    }

    #[test]
    fn under_soft_budget_is_untouched() {
        let doc = doc_with("Short body. Nothing to drop here.");
        let out = truncate_to_word_budget(doc.clone(), budget(100, 200)).unwrap();
        assert_eq!(out, doc);
    }

    #[test]
    fn over_soft_budget_drops_trailing_sentences() {
        let doc = doc_with("First sentence here. Second sentence follows. Third one closes.");
        let out = truncate_to_word_budget(doc, budget(7, 100)).unwrap();
        assert!(out.word_count(true) <= 7);
        // references untouched by the word budget
        assert_eq!(out.references().unwrap().text, "Smith 2020\n\nJones 2021\n\nDoe 2019");
    }

    #[test]
    fn truncation_is_idempotent() {
        let doc = doc_with("One sentence. Two sentences. Three sentences. Four sentences.");
        let once = truncate_to_word_budget(doc, budget(6, 100)).unwrap();
        let twice = truncate_to_word_budget(once.clone(), budget(6, 100)).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn hard_boundary_is_exact() {
        let doc = doc_with("a b c d e f g");
        // heading "Introduction" counts too: 8 words total
        assert_eq!(doc.word_count(true), 8);
        assert!(truncate_to_word_budget(doc.clone(), budget(4, 8)).is_ok());
        assert!(matches!(
            truncate_to_word_budget(doc, budget(4, 7)),
            Err(ScoreError::BudgetExceeded {
                kind: BudgetKind::Words,
                count: 8,
                limit: 7,
            })
        ));
    }

    #[test]
    fn emptied_sections_keep_their_position() {
        let doc = Document::new(vec![
            Section::new("A", "Only sentence."),
            Section::new("B", "Another only sentence."),
        ]);
        let out = truncate_to_word_budget(doc, budget(2, 100)).unwrap();
        let headings: Vec<&str> = out.sections.iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(headings, vec!["A", "B"]);
        assert!(out.sections.iter().all(|s| s.text.is_empty()));
    }

    #[test]
    fn reference_budget_keeps_the_first_records() {
        let doc = doc_with("body");
        let out = truncate_to_reference_budget(doc, budget(2, 10)).unwrap();
        assert_eq!(out.references().unwrap().text, "Smith 2020\n\nJones 2021");
    }

    #[test]
    fn reference_budget_hard_limit_rejects() {
        let doc = doc_with("body");
        assert!(matches!(
            truncate_to_reference_budget(doc, budget(1, 2)),
            Err(ScoreError::BudgetExceeded {
                kind: BudgetKind::References,
                count: 3,
                limit: 2,
            })
        ));
    }

    #[test]
    fn reference_document_truncation_never_fails() {
        let doc = doc_with("First sentence here. Second sentence follows. Third one closes.");
        let out = truncate_reference_document(doc, 7);
        assert!(out.word_count(true) <= 7);
    }
}
