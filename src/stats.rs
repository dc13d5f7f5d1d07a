//! Review statistics over verified annotations.
//!
//! Counts entities and verification progress over a document's lines, and
//! scores the original LLM tags against the reviewer's verdicts as a
//! multiclass classification problem: predicted label = original tag, true
//! label = corrected tag where one exists. Only entries on verified lines
//! enter the comparison, and reviewer-added entities are excluded from it
//! (they have no prediction to score).
//!
//! Zero verified entries or an empty label space yield `None` scores, not
//! zero: absence of evidence is reported as absence.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::line::Line;
use crate::Tag;

/// Precision/recall/F1 triple.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PrfScores {
    /// Precision.
    pub precision: f64,
    /// Recall.
    pub recall: f64,
    /// F1 score.
    pub f1: f64,
}

/// Scores and support for one label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelScores {
    /// The label.
    pub label: Tag,
    /// Precision for this label.
    pub precision: f64,
    /// Recall for this label.
    pub recall: f64,
    /// F1 for this label.
    pub f1: f64,
    /// Number of true instances of this label.
    pub support: usize,
}

/// Per-label true/false positive/negative counts.
#[derive(Debug, Clone, Copy, Default)]
struct LabelCounts {
    tp: usize,
    fp: usize,
    fn_: usize,
}

impl LabelCounts {
    fn precision(&self) -> f64 {
        let denom = self.tp + self.fp;
        if denom == 0 {
            return 0.0;
        }
        self.tp as f64 / denom as f64
    }

    fn recall(&self) -> f64 {
        let denom = self.tp + self.fn_;
        if denom == 0 {
            return 0.0;
        }
        self.tp as f64 / denom as f64
    }

    fn f1(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            return 0.0;
        }
        2.0 * p * r / (p + r)
    }
}

/// Classification scores comparing original LLM tags to reviewer verdicts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Micro-averaged scores (pooled counts).
    pub micro: PrfScores,
    /// Macro-averaged scores (unweighted mean over labels).
    #[serde(rename = "macro")]
    pub macro_: PrfScores,
    /// Support-weighted mean over labels.
    pub weighted: PrfScores,
    /// Per-label breakdown with support counts.
    pub per_label: Vec<LabelScores>,
}

/// Per-document or corpus-wide review statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    /// Ledger entries across all lines.
    pub total_entities: usize,
    /// Histogram over effective tags.
    pub per_category_count: BTreeMap<Tag, usize>,
    /// Ledger entries belonging to verified lines.
    pub total_verified: usize,
    /// Classification scores over verified entries; `None` when there is
    /// nothing to score.
    pub classification: Option<ClassificationReport>,
}

/// Intermediate accumulation, mergeable across documents.
#[derive(Debug, Clone, Default)]
struct StatsAccum {
    total_entities: usize,
    per_category_count: BTreeMap<Tag, usize>,
    total_verified: usize,
    /// (predicted original tag, true effective tag) pairs from verified
    /// entries that carry both.
    pairs: Vec<(Tag, Tag)>,
}

impl StatsAccum {
    fn add_lines<'a>(&mut self, lines: impl IntoIterator<Item = &'a Line>) {
        for line in lines {
            let Some(ledger) = line.ledger() else {
                continue;
            };
            self.total_entities += ledger.len();
            for entry in &ledger.entries {
                if let Some(tag) = entry.effective() {
                    *self.per_category_count.entry(tag).or_default() += 1;
                }
            }
            if ledger.verified {
                self.total_verified += ledger.len();
                for entry in &ledger.entries {
                    if let (Some(predicted), Some(truth)) = (entry.tag, entry.effective()) {
                        self.pairs.push((predicted, truth));
                    }
                }
            }
        }
    }

    fn merge(mut self, other: StatsAccum) -> StatsAccum {
        self.total_entities += other.total_entities;
        self.total_verified += other.total_verified;
        for (tag, count) in other.per_category_count {
            *self.per_category_count.entry(tag).or_default() += count;
        }
        self.pairs.extend(other.pairs);
        self
    }

    fn finalize(self) -> Stats {
        Stats {
            total_entities: self.total_entities,
            per_category_count: self.per_category_count,
            total_verified: self.total_verified,
            classification: classification_report(&self.pairs),
        }
    }
}

/// Compute review statistics over a document's lines.
#[must_use]
pub fn compute_stats<'a>(lines: impl IntoIterator<Item = &'a Line>) -> Stats {
    let mut accum = StatsAccum::default();
    accum.add_lines(lines);
    accum.finalize()
}

/// Corpus-wide statistics across many documents.
///
/// Per-document accumulation is independent and read-only, so documents
/// are processed in parallel and folded.
#[must_use]
pub fn corpus_stats(documents: &[Document]) -> Stats {
    documents
        .par_iter()
        .map(|doc| {
            let mut accum = StatsAccum::default();
            accum.add_lines(&doc.lines);
            accum
        })
        .reduce(StatsAccum::default, StatsAccum::merge)
        .finalize()
}

/// Multiclass classification report from (predicted, true) pairs.
///
/// The label space is the distinct tags appearing on either side of the
/// comparison. `None` for an empty pair set.
#[must_use]
pub fn classification_report(pairs: &[(Tag, Tag)]) -> Option<ClassificationReport> {
    if pairs.is_empty() {
        return None;
    }

    let labels: Vec<Tag> = {
        let mut labels: Vec<Tag> = pairs
            .iter()
            .flat_map(|(p, t)| [*p, *t])
            .collect();
        labels.sort_unstable();
        labels.dedup();
        labels
    };
    if labels.is_empty() {
        return None;
    }

    let mut counts: BTreeMap<Tag, LabelCounts> = BTreeMap::new();
    let mut support: BTreeMap<Tag, usize> = BTreeMap::new();
    for (predicted, truth) in pairs {
        *support.entry(*truth).or_default() += 1;
        if predicted == truth {
            counts.entry(*truth).or_default().tp += 1;
        } else {
            counts.entry(*predicted).or_default().fp += 1;
            counts.entry(*truth).or_default().fn_ += 1;
        }
    }

    let per_label: Vec<LabelScores> = labels
        .iter()
        .map(|label| {
            let c = counts.get(label).copied().unwrap_or_default();
            LabelScores {
                label: *label,
                precision: c.precision(),
                recall: c.recall(),
                f1: c.f1(),
                support: support.get(label).copied().unwrap_or(0),
            }
        })
        .collect();

    // Micro: pool counts across labels. For single-label multiclass tasks
    // every error is one fp and one fn, so micro P = R = F1 = accuracy.
    let pooled = labels.iter().fold(LabelCounts::default(), |mut acc, label| {
        let c = counts.get(label).copied().unwrap_or_default();
        acc.tp += c.tp;
        acc.fp += c.fp;
        acc.fn_ += c.fn_;
        acc
    });
    let micro = PrfScores {
        precision: pooled.precision(),
        recall: pooled.recall(),
        f1: pooled.f1(),
    };

    let n = per_label.len() as f64;
    let macro_ = PrfScores {
        precision: per_label.iter().map(|l| l.precision).sum::<f64>() / n,
        recall: per_label.iter().map(|l| l.recall).sum::<f64>() / n,
        f1: per_label.iter().map(|l| l.f1).sum::<f64>() / n,
    };

    let total_support = pairs.len() as f64;
    let weighted = PrfScores {
        precision: per_label
            .iter()
            .map(|l| l.precision * l.support as f64)
            .sum::<f64>()
            / total_support,
        recall: per_label
            .iter()
            .map(|l| l.recall * l.support as f64)
            .sum::<f64>()
            / total_support,
        f1: per_label.iter().map(|l| l.f1 * l.support as f64).sum::<f64>() / total_support,
    };

    Some(ClassificationReport {
        micro,
        macro_,
        weighted,
        per_label,
    })
}
