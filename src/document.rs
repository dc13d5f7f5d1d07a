//! Document records.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::line::Line;
use crate::Tag;

/// One judge model's verdict on one entity occurrence.
///
/// Records are an append-only log in evaluation-run order; they carry no
/// positional identity, only the entity's surface string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgmentRecord {
    /// Judge model identifier, e.g. `openai/gpt-4o-mini`.
    pub model: String,
    /// Entity surface text.
    pub entity: String,
    /// Whether the judge considered the original tag correct.
    pub correct: bool,
    /// The tag under judgment.
    pub original_tag: Tag,
    /// The judge's suggested tag when it disagreed.
    pub alternative_tag: Tag,
}

/// One source text with its per-line annotations and judgment log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Raw source text; its content hash is the document's identity.
    pub text: String,
    /// Source file name.
    #[serde(default)]
    pub filename: String,
    /// Ordered verse units, present once tagging has run.
    #[serde(default)]
    pub lines: Vec<Line>,
    /// Append-only judgment log, possibly empty.
    #[serde(default)]
    pub judgments: Vec<JudgmentRecord>,
}

impl Document {
    /// Create an untagged document from raw text.
    #[must_use]
    pub fn new(text: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            filename: filename.into(),
            lines: Vec::new(),
            judgments: Vec::new(),
        }
    }

    /// Content hash identifying this document.
    #[must_use]
    pub fn hash(&self) -> String {
        content_hash(&self.text)
    }

    /// Whether tagging has produced lines yet.
    #[must_use]
    pub fn is_tagged(&self) -> bool {
        !self.lines.is_empty()
    }

    /// Build ledgers for every line that does not have one yet.
    ///
    /// Safe to call repeatedly: existing ledgers, and the reviewer edits
    /// they hold, are left alone.
    pub fn ensure_ledgers(&mut self) {
        for line in &mut self.lines {
            line.ensure_ledger();
        }
    }

    /// Total ledger entries across all lines.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.lines
            .iter()
            .filter_map(Line::ledger)
            .map(|l| l.len())
            .sum()
    }
}

/// Stable content hash of a text: SHA-256 over UTF-8 bytes, hex-encoded
/// and truncated to 128 bits. Deterministic across runs and platforms.
#[must_use]
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(32);
    for byte in &digest[..16] {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
