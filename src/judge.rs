//! LLM-as-a-judge workflow: prompt batches and concurrent fan-out.
//!
//! The judging flow takes a tagged document, renders its entities into
//! chunked prompt batches, and hands each (batch, model) unit to an
//! external [`JudgeClient`]. Units run on a bounded pool of worker
//! threads; results are collected by submission index so document order is
//! preserved regardless of completion order, and a failed unit is dropped
//! and counted, never fatal to the run.
//!
//! The mechanics of talking to any particular LLM live behind the
//! [`JudgeClient`] trait; this module owns only batching, scheduling, and
//! reassembly.

use crossbeam_channel::unbounded;
use serde::{Deserialize, Serialize};

use crate::document::{Document, JudgmentRecord};
use crate::{Result, Tag};

/// Configuration for a judging run.
#[derive(Debug, Clone)]
pub struct JudgeConfig {
    /// Sentences per prompt batch.
    pub chunk_size: usize,
    /// Neighbouring lines included as context on each side of a sentence.
    pub context_size: usize,
    /// Concurrency ceiling for in-flight judge calls.
    pub max_in_flight: usize,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            chunk_size: 10,
            context_size: 3,
            max_in_flight: 5,
        }
    }
}

/// One sentence of a prompt batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSentence {
    /// The line with its inline tag markup.
    pub tagged: String,
    /// Neighbouring original lines, joined with newlines.
    pub context: String,
    /// `(entity, tag)` pairs under judgment, in document order.
    pub entities: Vec<(String, Tag)>,
}

/// A chunk of sentences sent to each judge model as one prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptBatch {
    /// Position of this batch in the run, for ordered reassembly.
    pub index: usize,
    /// Sentences in this batch.
    pub sentences: Vec<BatchSentence>,
}

/// System prompt framing the judging task.
pub const JUDGE_SYSTEM_PROMPT: &str = "\
You are an expert in Urdu Named Entity Recognition (NER). Your task is to \
evaluate named entities for accuracy.\n\n\
For each listed entity, report: the entity text, whether its predicted tag \
is correct (true/false), and the correct tag if it is not. Tags MUST be one \
of: PERSON, LOCATION, DATE, TIME, ORGANIZATION, DESIGNATION, NUMBER.";

impl PromptBatch {
    /// Render the user prompt: each sentence with its context and a
    /// numbered entity list, numbering running on across sentences.
    #[must_use]
    pub fn render_user_prompt(&self) -> String {
        let mut prompt = String::from("---BEGINNING OF SENTENCES---\n\n");
        let mut count = 0;
        for sentence in &self.sentences {
            prompt.push_str("Original Urdu Text, with tags:\n");
            prompt.push_str(&sentence.tagged);
            prompt.push_str("\nContext:\n");
            prompt.push_str(&sentence.context);
            prompt.push_str("\n\nExtracted Entities:\n");
            for (entity, tag) in &sentence.entities {
                count += 1;
                prompt.push_str(&format!("{count}. Entity: {entity}\n"));
                prompt.push_str(&format!("Predicted NER Tag: {tag}\n"));
            }
            prompt.push('\n');
        }
        prompt.push_str("---END OF SENTENCES---\n");
        prompt
    }

    /// Total entities listed in this batch.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.sentences.iter().map(|s| s.entities.len()).sum()
    }
}

/// One entity verdict as returned by a judge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityJudgment {
    /// Entity surface text.
    pub entity: String,
    /// The tag that was judged.
    pub tag: Tag,
    /// Whether the judge agreed with the tag.
    pub correct: bool,
    /// The judge's preferred tag: same as `tag` when it agreed.
    pub alternative: Tag,
}

/// External judging collaborator: one LLM behind a structured interface.
///
/// Implementations are expected to apply their own upstream timeout; a
/// hung call surfaces here as an error and the affected unit is dropped.
pub trait JudgeClient: Send + Sync {
    /// Model identifier recorded on every judgment row.
    fn model_name(&self) -> &str;

    /// Judge one prompt batch.
    fn judge(&self, batch: &PromptBatch) -> Result<Vec<EntityJudgment>>;
}

/// Summary of a judging run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JudgingOutcome {
    /// Judgment rows appended to the document.
    pub records_added: usize,
    /// (batch, model) units total.
    pub total_units: usize,
    /// Units dropped after an upstream failure.
    pub dropped_units: usize,
}

/// Build prompt batches from a document's tagged lines.
///
/// Each sentence carries a window of neighbouring original lines as
/// context (`context_size` before it, and up to `context_size` after,
/// exclusive). Lines without ledger entries carrying an effective tag are
/// skipped.
#[must_use]
pub fn build_batches(document: &Document, config: &JudgeConfig) -> Vec<PromptBatch> {
    let lines = &document.lines;
    let mut sentences = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let Some(ledger) = line.ledger() else {
            continue;
        };
        let entities: Vec<(String, Tag)> = ledger
            .entries
            .iter()
            .filter_map(|e| e.effective().map(|tag| (e.entity.clone(), tag)))
            .collect();
        if entities.is_empty() {
            continue;
        }

        let lo = i.saturating_sub(config.context_size);
        let hi = (i + config.context_size).min(lines.len());
        let context: Vec<&str> = lines[lo..hi].iter().map(|l| l.original.as_str()).collect();

        sentences.push(BatchSentence {
            tagged: line.tagged.clone(),
            context: context.join("\n"),
            entities,
        });
    }

    let chunk_size = config.chunk_size.max(1);
    sentences
        .chunks(chunk_size)
        .enumerate()
        .map(|(index, chunk)| PromptBatch {
            index,
            sentences: chunk.to_vec(),
        })
        .collect()
}

/// Run the judging fan-out and append the results to the document.
///
/// Every (batch, client) pair is one unit of work. Units run on at most
/// `max_in_flight` worker threads; failed units are dropped and counted.
pub fn run_judging(
    document: &mut Document,
    clients: &[Box<dyn JudgeClient>],
    config: &JudgeConfig,
) -> JudgingOutcome {
    let batches = build_batches(document, config);
    let total_units = batches.len() * clients.len();
    if total_units == 0 {
        return JudgingOutcome::default();
    }
    log::info!(
        "judging {} batches with {} models ({} units)",
        batches.len(),
        clients.len(),
        total_units
    );

    let (task_tx, task_rx) = unbounded::<usize>();
    let (result_tx, result_rx) = unbounded::<(usize, Result<Vec<JudgmentRecord>>)>();
    for unit in 0..total_units {
        task_tx.send(unit).expect("task channel open");
    }
    drop(task_tx);

    let workers = config.max_in_flight.max(1).min(total_units);
    let mut slots: Vec<Option<Vec<JudgmentRecord>>> = vec![None; total_units];
    let mut dropped_units = 0;

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            let batches = &batches;
            scope.spawn(move || {
                while let Ok(unit) = task_rx.recv() {
                    let batch = &batches[unit / clients.len()];
                    let client = &clients[unit % clients.len()];
                    let result = client.judge(batch).map(|judgments| {
                        judgments
                            .into_iter()
                            .map(|j| JudgmentRecord {
                                model: client.model_name().to_string(),
                                entity: j.entity,
                                correct: j.correct,
                                original_tag: j.tag,
                                alternative_tag: j.alternative,
                            })
                            .collect()
                    });
                    let _ = result_tx.send((unit, result));
                }
            });
        }
        drop(result_tx);

        for (unit, result) in result_rx.iter() {
            match result {
                Ok(records) => slots[unit] = Some(records),
                Err(err) => {
                    dropped_units += 1;
                    log::warn!("judging unit {unit} dropped: {err}");
                }
            }
        }
    });

    let mut records_added = 0;
    for slot in slots.into_iter().flatten() {
        records_added += slot.len();
        document.judgments.extend(slot);
    }

    log::info!(
        "judging finished: {records_added} records, {dropped_units}/{total_units} units dropped"
    );
    JudgingOutcome {
        records_added,
        total_units,
        dropped_units,
    }
}

/// A scripted judge for tests: agrees or disagrees per a fixed policy.
#[derive(Debug, Clone)]
pub struct MockJudge {
    name: String,
    /// Entities this judge marks incorrect, suggesting `alternative`.
    disagreements: Vec<(String, Tag)>,
    /// When set, every call fails with an upstream error.
    failing: bool,
}

impl MockJudge {
    /// Create a mock judge that agrees with every tag.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            disagreements: Vec::new(),
            failing: false,
        }
    }

    /// Mark an entity as incorrectly tagged, with the suggested tag.
    #[must_use]
    pub fn with_disagreement(mut self, entity: impl Into<String>, alternative: Tag) -> Self {
        self.disagreements.push((entity.into(), alternative));
        self
    }

    /// Make every call fail, to exercise the drop path.
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }
}

impl JudgeClient for MockJudge {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn judge(&self, batch: &PromptBatch) -> Result<Vec<EntityJudgment>> {
        if self.failing {
            return Err(crate::Error::upstream(format!(
                "{} unavailable",
                self.name
            )));
        }
        let mut judgments = Vec::new();
        for sentence in &batch.sentences {
            for (entity, tag) in &sentence.entities {
                let disagreement = self
                    .disagreements
                    .iter()
                    .find(|(e, _)| e == entity)
                    .map(|(_, alt)| *alt);
                judgments.push(EntityJudgment {
                    entity: entity.clone(),
                    tag: *tag,
                    correct: disagreement.is_none(),
                    alternative: disagreement.unwrap_or(*tag),
                });
            }
        }
        Ok(judgments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::Line;

    fn tagged_document() -> Document {
        let mut doc = Document::new("t", "t.txt");
        doc.lines.push(Line::new(
            "احمد نے کہا",
            "<PERSON>احمد</PERSON> نے کہا",
            "Ahmad said",
        ));
        doc.lines.push(Line::new("خالی سطر", "خالی سطر", ""));
        doc.lines.push(Line::new(
            "کربلا میں",
            "<LOCATION>کربلا</LOCATION> میں",
            "In Karbala",
        ));
        doc.ensure_ledgers();
        doc
    }

    #[test]
    fn test_build_batches_skips_empty_lines() {
        let doc = tagged_document();
        let batches = build_batches(&doc, &JudgeConfig::default());
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].sentences.len(), 2);
        assert_eq!(batches[0].entity_count(), 2);
    }

    #[test]
    fn test_build_batches_chunking() {
        let doc = tagged_document();
        let config = JudgeConfig {
            chunk_size: 1,
            ..JudgeConfig::default()
        };
        let batches = build_batches(&doc, &config);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].index, 0);
        assert_eq!(batches[1].index, 1);
    }

    #[test]
    fn test_context_window_bounds() {
        let doc = tagged_document();
        let config = JudgeConfig {
            context_size: 1,
            ..JudgeConfig::default()
        };
        let batches = build_batches(&doc, &config);
        // First sentence is line 0: window is lines 0..1, the line itself.
        assert_eq!(batches[0].sentences[0].context, "احمد نے کہا");
        // Second sentence is line 2: window is lines 1..3.
        assert_eq!(batches[0].sentences[1].context, "خالی سطر\nکربلا میں");
    }

    #[test]
    fn test_render_prompt_numbering() {
        let doc = tagged_document();
        let batches = build_batches(&doc, &JudgeConfig::default());
        let prompt = batches[0].render_user_prompt();
        assert!(prompt.contains("1. Entity: احمد"));
        assert!(prompt.contains("2. Entity: کربلا"));
        assert!(prompt.contains("Predicted NER Tag: PERSON"));
    }

    #[test]
    fn test_run_judging_appends_records() {
        let mut doc = tagged_document();
        let clients: Vec<Box<dyn JudgeClient>> = vec![
            Box::new(MockJudge::new("model-a")),
            Box::new(MockJudge::new("model-b").with_disagreement("احمد", Tag::Designation)),
        ];
        let outcome = run_judging(&mut doc, &clients, &JudgeConfig::default());

        assert_eq!(outcome.total_units, 2);
        assert_eq!(outcome.dropped_units, 0);
        assert_eq!(outcome.records_added, 4);
        assert_eq!(doc.judgments.len(), 4);

        let disagreed = doc
            .judgments
            .iter()
            .find(|r| r.model == "model-b" && r.entity == "احمد")
            .unwrap();
        assert!(!disagreed.correct);
        assert_eq!(disagreed.alternative_tag, Tag::Designation);
    }

    #[test]
    fn test_failed_unit_dropped_not_fatal() {
        let mut doc = tagged_document();
        let clients: Vec<Box<dyn JudgeClient>> = vec![
            Box::new(MockJudge::new("good")),
            Box::new(MockJudge::new("bad").failing()),
        ];
        let outcome = run_judging(&mut doc, &clients, &JudgeConfig::default());

        assert_eq!(outcome.total_units, 2);
        assert_eq!(outcome.dropped_units, 1);
        assert_eq!(outcome.records_added, 2);
        assert!(doc.judgments.iter().all(|r| r.model == "good"));
    }

    #[test]
    fn test_no_entities_no_units() {
        let mut doc = Document::new("x", "x.txt");
        doc.lines.push(Line::new("خالی", "خالی", ""));
        doc.ensure_ledgers();

        let clients: Vec<Box<dyn JudgeClient>> = vec![Box::new(MockJudge::new("m"))];
        let outcome = run_judging(&mut doc, &clients, &JudgeConfig::default());
        assert_eq!(outcome.total_units, 0);
        assert_eq!(outcome.records_added, 0);
    }

    #[test]
    fn test_order_preserved_across_completion_order() {
        // Many single-sentence batches against one model; records must come
        // back in batch order even with several workers racing.
        let mut doc = Document::new("t", "t.txt");
        for i in 0..8 {
            let word = format!("lafz{i}");
            doc.lines.push(Line::new(
                format!("{word} x"),
                format!("<PERSON>{word}</PERSON> x"),
                "",
            ));
        }
        doc.ensure_ledgers();

        let clients: Vec<Box<dyn JudgeClient>> = vec![Box::new(MockJudge::new("m"))];
        let config = JudgeConfig {
            chunk_size: 1,
            max_in_flight: 4,
            ..JudgeConfig::default()
        };
        run_judging(&mut doc, &clients, &config);

        let entities: Vec<&str> = doc.judgments.iter().map(|r| r.entity.as_str()).collect();
        let expected: Vec<String> = (0..8).map(|i| format!("lafz{i}")).collect();
        assert_eq!(entities, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }
}
