//! Flat export rows for the spreadsheet collaborator.
//!
//! The core builds one flat row per ledger entry (or judgment record) with
//! a fixed column set; turning rows into an actual spreadsheet artifact is
//! the [`SpreadsheetWriter`]'s business, outside this crate.

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::Result;

/// Placeholder for columns with no applicable value.
const NA: &str = "NA";

/// One row of the NER review export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRow {
    /// Source file name.
    pub file: String,
    /// Original sentence.
    pub sentence: String,
    /// Sentence with inline tag markup.
    pub tagged: String,
    /// English translation.
    pub english: String,
    /// Entity surface text.
    pub entity: String,
    /// Original LLM tag, or `"NA"` for reviewer-added entities.
    pub llm_tag: String,
    /// Whether the line has been reviewed.
    pub reviewed: bool,
    /// Reviewed and the original tag stood uncorrected.
    pub correct: bool,
    /// Reviewer's corrected tag, or `"NA"`.
    pub user_corrected: String,
}

/// One row of the judgment export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgmentRow {
    /// Source file name.
    pub file: String,
    /// Judge model identifier.
    pub llm: String,
    /// Entity surface text.
    pub entity: String,
    /// The tag that was judged.
    pub original_tag: String,
    /// Whether the judge agreed with the tag.
    pub correct: bool,
    /// The judge's suggested tag when it disagreed, else `"NA"`.
    pub alternative: String,
}

/// External exporter: turns flat rows into a binary spreadsheet artifact.
pub trait SpreadsheetWriter {
    /// Encode the NER review sheet.
    fn write_review(&self, rows: &[ReviewRow]) -> Result<Vec<u8>>;

    /// Encode the judgment sheet.
    fn write_judgments(&self, rows: &[JudgmentRow]) -> Result<Vec<u8>>;
}

/// Build the review export: one row per ledger entry, across all lines.
#[must_use]
pub fn review_rows(document: &Document) -> Vec<ReviewRow> {
    let mut rows = Vec::new();
    for line in &document.lines {
        let Some(ledger) = line.ledger() else {
            continue;
        };
        for entry in &ledger.entries {
            rows.push(ReviewRow {
                file: document.filename.clone(),
                sentence: line.original.clone(),
                tagged: line.tagged.clone(),
                english: line.english.clone(),
                entity: entry.entity.clone(),
                llm_tag: entry
                    .tag
                    .map_or_else(|| NA.to_string(), |t| t.to_string()),
                reviewed: ledger.verified,
                correct: ledger.verified && entry.user_updated.is_none(),
                user_corrected: entry
                    .user_updated
                    .map_or_else(|| NA.to_string(), |t| t.to_string()),
            });
        }
    }
    rows
}

/// Build the judgment export: one row per judgment record.
#[must_use]
pub fn judgment_rows(document: &Document) -> Vec<JudgmentRow> {
    document
        .judgments
        .iter()
        .map(|record| JudgmentRow {
            file: document.filename.clone(),
            llm: record.model.clone(),
            entity: record.entity.clone(),
            original_tag: record.original_tag.to_string(),
            correct: record.correct,
            alternative: if record.correct {
                NA.to_string()
            } else {
                record.alternative_tag.to_string()
            },
        })
        .collect()
}
