//! # marsiya-review
//!
//! Human-in-the-loop review of LLM-generated named-entity annotations over
//! Urdu marsiya text, with multi-model LLM-as-a-judge scoring.
//!
//! The crate is the bookkeeping core of an annotation review tool: it does
//! no tagging of its own. LLM output arrives as lines with inline
//! `<TAG>span</TAG>` markup; from there this crate
//!
//! - derives a mutable per-line entity status [`Ledger`] from the markup,
//! - keeps ledger and tagged text consistent while a reviewer adds,
//!   corrects, or removes entity spans ([`Line`]),
//! - fans batches of entities out to external judge models behind the
//!   [`JudgeClient`] trait and collects their verdicts,
//! - aggregates judgments into agreement statistics sliceable by model and
//!   tag ([`aggregate`]), and
//! - scores original tags against reviewer verdicts as multiclass
//!   precision/recall/F1 ([`stats`]).
//!
//! ## Quick start
//!
//! ```rust
//! use marsiya_review::{Line, Tag};
//!
//! let mut line = Line::new("احمد نے کہا", "احمد نے کہا", "Ahmad said");
//! line.add_tag("احمد", Tag::Person)?;
//! assert_eq!(line.tagged, "<PERSON>احمد</PERSON> نے کہا");
//!
//! line.mark_verified();
//! let stats = marsiya_review::stats::compute_stats([&line]);
//! assert_eq!(stats.total_verified, 1);
//! # Ok::<(), marsiya_review::Error>(())
//! ```
//!
//! ## Design notes
//!
//! - Tagged text is never patched by raw string substitution: mutations go
//!   through a parsed segment sequence, so entities whose text occurs inside
//!   other entities' markup cannot corrupt unrelated spans.
//! - Line verification is an explicit ledger field, not a sentinel key in
//!   the entity mapping.
//! - Judgments are grouped by entity surface string only; repeated mentions
//!   of the same proper noun are indistinguishable to the aggregator.

#![warn(missing_docs)]

pub mod aggregate;
pub mod document;
mod error;
pub mod export;
pub mod extract;
pub mod judge;
pub mod ledger;
pub mod line;
pub mod stats;
pub mod store;
pub mod tag;

pub use aggregate::{aggregate, AggregateStats};
pub use document::{content_hash, Document, JudgmentRecord};
pub use error::{Error, Result};
pub use export::{judgment_rows, review_rows, JudgmentRow, ReviewRow, SpreadsheetWriter};
pub use extract::{extract_entities, strip_tags};
pub use judge::{
    build_batches, run_judging, EntityJudgment, JudgeClient, JudgeConfig, JudgingOutcome,
    MockJudge, PromptBatch,
};
pub use ledger::{EntityStatus, Ledger};
pub use line::Line;
pub use stats::{compute_stats, corpus_stats, ClassificationReport, Stats};
pub use store::{DocumentStore, JsonStore};
pub use tag::{Tag, ALL_TAGS};
