//! Aggregation of multi-model judgment records into agreement statistics.
//!
//! Judgment rows are grouped strictly by entity surface string: the rows
//! carry no positional identity, so two occurrences of the same proper
//! noun anywhere in the corpus fall into one group. Per-group correctness
//! rates are then averaged over entities, optionally filtered to a single
//! model and/or tag, and optionally thresholded into pass/fail.
//!
//! Entities with no matching rows after filtering are excluded from the
//! corresponding mean, never counted as zero, and an empty record set
//! yields all-`None` statistics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::document::JudgmentRecord;
use crate::Tag;

/// Agreement/accuracy statistics over a judgment log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateStats {
    /// Mean per-entity correctness over all judged entities.
    pub overall_accuracy: Option<f64>,
    /// Overall accuracy restricted to each judge model.
    pub model_accuracy: BTreeMap<String, Option<f64>>,
    /// Overall accuracy restricted to each original tag.
    pub tag_accuracy: BTreeMap<Tag, Option<f64>>,
    /// Both restrictions combined: tag, then model.
    pub model_tag_accuracy: BTreeMap<Tag, BTreeMap<String, Option<f64>>>,
}

impl AggregateStats {
    /// The all-`None` statistics for an empty judgment log.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Per-model agreement scores against the all-correct reference.
///
/// Treats "the original tag was correct" as the positive class: recall and
/// accuracy are the model's raw agreement rate, precision is 1 whenever
/// the model agreed at least once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgreementScores {
    /// Fraction of rows marked correct.
    pub accuracy: f64,
    /// Precision of the correct-class predictions.
    pub precision: f64,
    /// Recall of the correct class.
    pub recall: f64,
    /// Harmonic mean of precision and recall.
    pub f1: f64,
}

/// Compute agreement statistics over a judgment log.
///
/// `threshold`, when given, is clamped to `[0, 1]` and turns each entity's
/// correctness rate into pass (rate ≥ threshold) or fail before averaging.
#[must_use]
pub fn aggregate(records: &[JudgmentRecord], threshold: Option<f64>) -> AggregateStats {
    if records.is_empty() {
        return AggregateStats::empty();
    }
    let threshold = threshold.map(|t| t.clamp(0.0, 1.0));
    let groups = group_by_entity(records);

    let models: Vec<&str> = {
        let mut models: Vec<&str> = records.iter().map(|r| r.model.as_str()).collect();
        models.sort_unstable();
        models.dedup();
        models
    };
    let tags: Vec<Tag> = {
        let mut tags: Vec<Tag> = records.iter().map(|r| r.original_tag).collect();
        tags.sort_unstable();
        tags.dedup();
        tags
    };

    let model_accuracy = models
        .iter()
        .map(|m| {
            (
                (*m).to_string(),
                mean_over_entities(&groups, threshold, Some(*m), None),
            )
        })
        .collect();

    let tag_accuracy = tags
        .iter()
        .map(|t| (*t, mean_over_entities(&groups, threshold, None, Some(*t))))
        .collect();

    let model_tag_accuracy = tags
        .iter()
        .map(|t| {
            let per_model = models
                .iter()
                .map(|m| {
                    (
                        (*m).to_string(),
                        mean_over_entities(&groups, threshold, Some(*m), Some(*t)),
                    )
                })
                .collect();
            (*t, per_model)
        })
        .collect();

    AggregateStats {
        overall_accuracy: mean_over_entities(&groups, threshold, None, None),
        model_accuracy,
        tag_accuracy,
        model_tag_accuracy,
    }
}

/// Per-model agreement scores: accuracy, precision, recall, F1 with the
/// correct verdict as the positive class.
#[must_use]
pub fn model_agreement(records: &[JudgmentRecord]) -> BTreeMap<String, AgreementScores> {
    let mut per_model: BTreeMap<String, Vec<bool>> = BTreeMap::new();
    for record in records {
        per_model
            .entry(record.model.clone())
            .or_default()
            .push(record.correct);
    }

    per_model
        .into_iter()
        .map(|(model, verdicts)| {
            let total = verdicts.len() as f64;
            let agreed = verdicts.iter().filter(|v| **v).count() as f64;
            let accuracy = agreed / total;
            // Reference labels are all-correct, so every agreement is a
            // true positive and there are no false positives.
            let precision = if agreed > 0.0 { 1.0 } else { 0.0 };
            let recall = accuracy;
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            (
                model,
                AgreementScores {
                    accuracy,
                    precision,
                    recall,
                    f1,
                },
            )
        })
        .collect()
}

/// Leniently parse judgment rows from JSON values, skipping malformed rows.
#[must_use]
pub fn lenient_rows(values: &[serde_json::Value]) -> Vec<JudgmentRecord> {
    values
        .iter()
        .filter_map(|value| match serde_json::from_value(value.clone()) {
            Ok(record) => Some(record),
            Err(err) => {
                log::warn!("skipping malformed judgment row: {err}");
                None
            }
        })
        .collect()
}

fn group_by_entity(records: &[JudgmentRecord]) -> BTreeMap<&str, Vec<&JudgmentRecord>> {
    let mut groups: BTreeMap<&str, Vec<&JudgmentRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.entity.as_str()).or_default().push(record);
    }
    groups
}

/// One entity's correctness rate under the given filters, thresholded into
/// 1.0/0.0 when a threshold is set. `None` when no rows match.
fn entity_value(
    rows: &[&JudgmentRecord],
    threshold: Option<f64>,
    model: Option<&str>,
    tag: Option<Tag>,
) -> Option<f64> {
    let matching: Vec<&&JudgmentRecord> = rows
        .iter()
        .filter(|r| model.map_or(true, |m| r.model == m))
        .filter(|r| tag.map_or(true, |t| r.original_tag == t))
        .collect();
    if matching.is_empty() {
        return None;
    }
    let rate =
        matching.iter().filter(|r| r.correct).count() as f64 / matching.len() as f64;
    match threshold {
        Some(t) => Some(if rate >= t { 1.0 } else { 0.0 }),
        None => Some(rate),
    }
}

fn mean_over_entities(
    groups: &BTreeMap<&str, Vec<&JudgmentRecord>>,
    threshold: Option<f64>,
    model: Option<&str>,
    tag: Option<Tag>,
) -> Option<f64> {
    let values: Vec<f64> = groups
        .values()
        .filter_map(|rows| entity_value(rows, threshold, model, tag))
        .collect();
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}
