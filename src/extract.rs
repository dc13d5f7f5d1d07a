//! Inline tag-markup extraction.
//!
//! Tagged lines carry entity membership as inline spans of the form
//! `<TAG>span</TAG>`. This module is the only place that markup is parsed:
//! everything downstream (ledger construction, mutation, rendering) works
//! on the `(tag, content)` pairs or [`Segment`] sequences produced here.
//!
//! Extraction is a pure, total function: malformed or mismatched spans are
//! simply not extracted, never an error, and empty input yields empty output.

use once_cell::sync::Lazy;
use regex::Regex;

/// Matches a candidate markup span. Open and close labels are captured
/// separately and compared afterwards; the regex crate has no
/// backreferences, so mismatched pairs are filtered in code.
static SPAN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([^<>/\s]+)>([^<>]*)</([^<>/\s]+)>").expect("valid span regex"));

/// Matches any markup bracket, for stripping.
static MARKUP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?[^<>/\s]+>").expect("valid markup regex"));

/// One piece of a tagged line: either bare text or a well-formed tagged span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Untagged text (may contain malformed markup left as-is).
    Text(String),
    /// A well-formed `<tag>content</tag>` span.
    Span {
        /// Tag label exactly as written in the markup.
        tag: String,
        /// Entity surface text between the markers.
        content: String,
    },
}

impl Segment {
    /// Render the segment back to its markup form.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Segment::Text(t) => t.clone(),
            Segment::Span { tag, content } => format!("<{tag}>{content}</{tag}>"),
        }
    }
}

/// Parse a tagged line into an alternating sequence of text and span segments.
///
/// Only spans whose open and close labels match exactly become
/// [`Segment::Span`]; anything else, including unbalanced markup, stays in
/// the surrounding [`Segment::Text`]. Concatenating `render()` over the
/// result reproduces the input exactly.
#[must_use]
pub fn parse_segments(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut cursor = 0;
    let mut pending = String::new();

    for caps in SPAN_RE.captures_iter(text) {
        let whole = caps.get(0).expect("group 0 always present");
        pending.push_str(&text[cursor..whole.start()]);
        cursor = whole.end();

        if caps[1] == caps[3] {
            if !pending.is_empty() {
                segments.push(Segment::Text(std::mem::take(&mut pending)));
            }
            segments.push(Segment::Span {
                tag: caps[1].to_string(),
                content: caps[2].to_string(),
            });
        } else {
            // Mismatched open/close: not a span, keep the raw text.
            pending.push_str(whole.as_str());
        }
    }

    pending.push_str(&text[cursor..]);
    if !pending.is_empty() {
        segments.push(Segment::Text(pending));
    }

    segments
}

/// Extract `(tag, entity)` pairs in left-to-right order of appearance.
#[must_use]
pub fn extract_entities(text: &str) -> Vec<(String, String)> {
    parse_segments(text)
        .into_iter()
        .filter_map(|seg| match seg {
            Segment::Span { tag, content } => Some((tag, content)),
            Segment::Text(_) => None,
        })
        .collect()
}

/// Strip all markup brackets, leaving the bare text.
#[must_use]
pub fn strip_tags(text: &str) -> String {
    MARKUP_RE.replace_all(text, "").into_owned()
}

/// Render a segment sequence back into a tagged string.
#[must_use]
pub fn render_segments(segments: &[Segment]) -> String {
    segments.iter().map(Segment::render).collect()
}

/// Whitespace-insensitive text equality, for the tagged/original invariant.
#[must_use]
pub fn text_equivalent(a: &str, b: &str) -> bool {
    a.split_whitespace().eq(b.split_whitespace())
}
