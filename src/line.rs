//! Line records and the tag mutator.
//!
//! A [`Line`] holds one verse unit: the untagged original, the tagged
//! rendition, an English translation, and (once review starts) the entity
//! status [`Ledger`]. The three mutation operations here are the only way
//! tagged text changes after ingestion, and each keeps the tagged string
//! and the ledger consistent with each other.
//!
//! Mutations never patch by raw string substitution. The tagged text is
//! parsed into [`Segment`]s, the edit is applied to every matching
//! segment, and the string is re-rendered, so an entity whose text happens
//! to occur inside another entity's markup can never corrupt an unrelated
//! span. Because the ledger is keyed by surface string, an edit to an
//! entity that appears more than once rewrites all of its spans.

use serde::{Deserialize, Serialize};

use crate::extract::{parse_segments, render_segments, strip_tags, text_equivalent, Segment};
use crate::ledger::{EntityStatus, Ledger};
use crate::{Error, Result, Tag};

/// One sentence/verse unit of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    /// Untagged source string.
    pub original: String,
    /// String with inline tag markup.
    pub tagged: String,
    /// English translation, opaque passthrough.
    #[serde(default)]
    pub english: String,
    /// Entity status ledger. Built once on first access, then only mutated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger: Option<Ledger>,
}

impl Line {
    /// Create a line from its original, tagged, and translated forms.
    #[must_use]
    pub fn new(
        original: impl Into<String>,
        tagged: impl Into<String>,
        english: impl Into<String>,
    ) -> Self {
        Self {
            original: original.into(),
            tagged: tagged.into(),
            english: english.into(),
            ledger: None,
        }
    }

    /// Build the ledger from the tagged text if it does not exist yet.
    ///
    /// Once present the ledger is never rebuilt, so reviewer edits are
    /// never discarded by a re-parse.
    pub fn ensure_ledger(&mut self) -> &mut Ledger {
        if self.ledger.is_none() {
            self.ledger = Some(Ledger::from_tagged(&self.tagged));
        }
        self.ledger.as_mut().expect("ledger just ensured")
    }

    /// The ledger, if review has started on this line.
    #[must_use]
    pub fn ledger(&self) -> Option<&Ledger> {
        self.ledger.as_ref()
    }

    /// Whether the reviewer has explicitly confirmed this line.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.ledger.as_ref().is_some_and(|l| l.verified)
    }

    /// Mark this line's ledger as reviewed.
    pub fn mark_verified(&mut self) {
        self.ensure_ledger().verified = true;
    }

    /// Tag an untagged span of the original text.
    ///
    /// Refuses with [`Error::AlreadyTagged`] when an existing span's text
    /// already contains `entity`, and with [`Error::InvalidInput`] when
    /// `entity` is not available as a bare contiguous substring.
    pub fn add_tag(&mut self, entity: &str, new_tag: Tag) -> Result<()> {
        if entity.trim().is_empty() {
            return Err(Error::invalid_input("entity text is empty"));
        }

        let mut segments = parse_segments(&self.tagged);

        if segments.iter().any(|seg| {
            matches!(seg, Segment::Span { content, .. } if content.contains(entity))
        }) {
            return Err(Error::already_tagged(format!(
                "'{entity}' is already covered by a tagged span"
            )));
        }

        let position = segments.iter().position(
            |seg| matches!(seg, Segment::Text(text) if text.contains(entity)),
        );
        let Some(idx) = position else {
            // Distinguish a phrase that straddles an existing span boundary
            // from one that simply is not in the line.
            let message = if self.original.contains(entity) {
                format!(
                    "'{entity}' crosses an existing tagged span; correct or remove that span first"
                )
            } else {
                format!("'{entity}' does not occur untagged in the line")
            };
            return Err(Error::invalid_input(message));
        };

        let Segment::Text(text) = segments[idx].clone() else {
            unreachable!("position matched a text segment");
        };
        let at = text.find(entity).expect("segment contains entity");
        let (before, rest) = text.split_at(at);
        let after = &rest[entity.len()..];

        let mut patched = Vec::with_capacity(segments.len() + 2);
        patched.extend(segments.drain(..idx));
        if !before.is_empty() {
            patched.push(Segment::Text(before.to_string()));
        }
        patched.push(Segment::Span {
            tag: new_tag.as_label().to_string(),
            content: entity.to_string(),
        });
        if !after.is_empty() {
            patched.push(Segment::Text(after.to_string()));
        }
        patched.extend(segments.into_iter().skip(1));

        let tagged = render_segments(&patched);
        self.check_invariant(&tagged)?;

        self.tagged = tagged;
        self.ensure_ledger().insert(EntityStatus {
            entity: entity.to_string(),
            tag: None,
            user_updated: Some(new_tag),
        });
        Ok(())
    }

    /// Correct the tag of an existing span.
    ///
    /// Every span carrying `(old_tag, entity)` is rewritten, since the
    /// ledger holds one entry per surface string. The original LLM tag in
    /// the ledger stays untouched; only `user_updated` records the
    /// correction, preserving the audit trail.
    pub fn retag(&mut self, entity: &str, old_tag: Tag, new_tag: Tag) -> Result<()> {
        let mut segments = parse_segments(&self.tagged);

        let mut rewritten = 0usize;
        for seg in &mut segments {
            if let Segment::Span { tag, content } = seg {
                if content.as_str() == entity && tag.as_str() == old_tag.as_label() {
                    *tag = new_tag.as_label().to_string();
                    rewritten += 1;
                }
            }
        }
        if rewritten == 0 {
            return Err(Error::missing_state(format!(
                "no span <{old_tag}>{entity}</{old_tag}> in the tagged line"
            )));
        }

        let tagged = render_segments(&segments);
        self.check_invariant(&tagged)?;

        let ledger = self.ensure_ledger();
        let Some(status) = ledger.get_mut(entity) else {
            return Err(Error::missing_state(format!(
                "entity '{entity}' not found in the ledger"
            )));
        };
        status.user_updated = Some(new_tag);
        self.tagged = tagged;
        Ok(())
    }

    /// Remove a reviewer-added tag, restoring the bare text for every
    /// span of the entity.
    ///
    /// Only entries without an original LLM tag can be removed; LLM-sourced
    /// spans are corrected with [`Line::retag`], not deleted.
    pub fn remove_tag(&mut self, entity: &str) -> Result<()> {
        let ledger = self.ensure_ledger();
        let Some(status) = ledger.get(entity) else {
            return Err(Error::missing_state(format!(
                "entity '{entity}' not found in the ledger"
            )));
        };
        if !status.is_manual() {
            return Err(Error::invalid_input(format!(
                "'{entity}' was tagged by the LLM; only reviewer-added tags can be removed"
            )));
        }

        let mut segments = parse_segments(&self.tagged);
        let mut removed = 0usize;
        for seg in &mut segments {
            if matches!(seg, Segment::Span { content, .. } if content.as_str() == entity) {
                *seg = Segment::Text(entity.to_string());
                removed += 1;
            }
        }
        if removed == 0 {
            return Err(Error::missing_state(format!(
                "no tagged span for '{entity}' in the line"
            )));
        }

        let tagged = render_segments(&segments);
        self.check_invariant(&tagged)?;

        self.tagged = tagged;
        self.ensure_ledger().remove(entity);
        Ok(())
    }

    /// Words of the original text not inside any tagged span, in order.
    ///
    /// Feeds manual tagging: these are the candidates for a new tag.
    #[must_use]
    pub fn untagged_words(&self) -> Vec<String> {
        parse_segments(&self.tagged)
            .iter()
            .filter_map(|seg| match seg {
                Segment::Text(text) => Some(text.split_whitespace()),
                Segment::Span { .. } => None,
            })
            .flatten()
            .map(str::to_string)
            .collect()
    }

    /// Verify that a candidate tagged string still strips back to the
    /// original, whitespace-insensitively. Called before every commit.
    fn check_invariant(&self, candidate: &str) -> Result<()> {
        let stripped = strip_tags(candidate);
        if text_equivalent(&stripped, &self.original) {
            Ok(())
        } else {
            Err(Error::invariant(format!(
                "tagged text no longer matches the original line: {stripped:?} vs {:?}",
                self.original
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> Line {
        Line::new(
            "احمد نے کہا",
            "احمد نے کہا",
            "Ahmad said",
        )
    }

    #[test]
    fn test_add_tag_end_to_end() {
        let mut line = line();
        line.add_tag("احمد", Tag::Person).unwrap();
        assert_eq!(line.tagged, "<PERSON>احمد</PERSON> نے کہا");

        let status = line.ledger().unwrap().get("احمد").unwrap();
        assert_eq!(status.tag, None);
        assert_eq!(status.user_updated, Some(Tag::Person));
    }

    #[test]
    fn test_add_tag_twice_rejected_without_state_change() {
        let mut line = line();
        line.add_tag("احمد", Tag::Person).unwrap();
        let before = line.clone();

        let err = line.add_tag("احمد", Tag::Designation).unwrap_err();
        assert!(matches!(err, Error::AlreadyTagged(_)));
        assert_eq!(line, before);
    }

    #[test]
    fn test_add_tag_unknown_substring_rejected() {
        let mut line = line();
        let err = line.add_tag("حسین", Tag::Person).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(line.tagged, "احمد نے کہا");
    }

    #[test]
    fn test_remove_restores_original() {
        let mut line = line();
        line.add_tag("احمد", Tag::Person).unwrap();
        line.remove_tag("احمد").unwrap();

        assert_eq!(line.tagged, "احمد نے کہا");
        assert!(line.ledger().unwrap().is_empty());
    }

    #[test]
    fn test_remove_llm_tag_rejected() {
        let mut line = Line::new("احمد نے کہا", "<PERSON>احمد</PERSON> نے کہا", "");
        line.ensure_ledger();

        let err = line.remove_tag("احمد").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(line.tagged, "<PERSON>احمد</PERSON> نے کہا");
    }

    #[test]
    fn test_retag_preserves_original_tag() {
        let mut line = Line::new("احمد نے کہا", "<PERSON>احمد</PERSON> نے کہا", "");
        line.ensure_ledger();
        line.retag("احمد", Tag::Person, Tag::Designation).unwrap();

        assert_eq!(line.tagged, "<DESIGNATION>احمد</DESIGNATION> نے کہا");
        let status = line.ledger().unwrap().get("احمد").unwrap();
        assert_eq!(status.tag, Some(Tag::Person));
        assert_eq!(status.user_updated, Some(Tag::Designation));
    }

    #[test]
    fn test_retag_rewrites_every_duplicate_span() {
        let mut line = Line::new(
            "علی آئے اور علی گئے",
            "<PERSON>علی</PERSON> آئے اور <PERSON>علی</PERSON> گئے",
            "",
        );
        line.ensure_ledger();
        line.retag("علی", Tag::Person, Tag::Designation).unwrap();

        // One ledger entry covers both spans, so both must change together.
        assert_eq!(
            line.tagged,
            "<DESIGNATION>علی</DESIGNATION> آئے اور <DESIGNATION>علی</DESIGNATION> گئے"
        );
        assert!(!line.tagged.contains("<PERSON>"));
        let status = line.ledger().unwrap().get("علی").unwrap();
        assert_eq!(status.user_updated, Some(Tag::Designation));
    }

    #[test]
    fn test_remove_clears_every_duplicate_span() {
        let mut line = Line::new(
            "علی آئے اور علی گئے",
            "<PERSON>علی</PERSON> آئے اور <PERSON>علی</PERSON> گئے",
            "",
        );
        line.ensure_ledger();
        {
            let status = line.ledger.as_mut().unwrap().get_mut("علی").unwrap();
            status.tag = None;
            status.user_updated = Some(Tag::Person);
        }

        line.remove_tag("علی").unwrap();
        assert_eq!(line.tagged, "علی آئے اور علی گئے");
        assert!(line.ledger().unwrap().is_empty());
    }

    #[test]
    fn test_add_tag_across_span_boundary_names_the_overlap() {
        let mut line = Line::new(
            "عباس علی آئے",
            "<PERSON>عباس</PERSON> علی آئے",
            "",
        );
        line.ensure_ledger();

        let err = line.add_tag("عباس علی", Tag::Person).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(err.to_string().contains("crosses an existing tagged span"));
        assert_eq!(line.tagged, "<PERSON>عباس</PERSON> علی آئے");
    }

    #[test]
    fn test_retag_missing_span_rejected() {
        let mut line = line();
        let err = line.retag("احمد", Tag::Person, Tag::Location).unwrap_err();
        assert!(matches!(err, Error::MissingState(_)));
    }

    #[test]
    fn test_entity_substring_of_other_span_untouched() {
        // "علی" occurs inside the tagged "عباس علی"; tagging the free-standing
        // "علی" must not touch the existing span.
        let mut line = Line::new(
            "عباس علی اور علی",
            "<PERSON>عباس علی</PERSON> اور علی",
            "",
        );
        line.ensure_ledger();

        // The bare "علی" is a substring of the tagged span text, so adding is
        // refused rather than risking a corrupting patch.
        let err = line.add_tag("علی", Tag::Person).unwrap_err();
        assert!(matches!(err, Error::AlreadyTagged(_)));
        assert_eq!(line.tagged, "<PERSON>عباس علی</PERSON> اور علی");
    }

    #[test]
    fn test_untagged_words() {
        let line = Line::new("احمد نے کہا", "<PERSON>احمد</PERSON> نے کہا", "");
        assert_eq!(line.untagged_words(), vec!["نے", "کہا"]);
    }

    #[test]
    fn test_mark_verified() {
        let mut line = line();
        assert!(!line.is_verified());
        line.mark_verified();
        assert!(line.is_verified());
    }

    #[test]
    fn test_ledger_built_once() {
        let mut line = Line::new("احمد نے کہا", "<PERSON>احمد</PERSON> نے کہا", "");
        line.ensure_ledger();
        line.ledger.as_mut().unwrap().get_mut("احمد").unwrap().user_updated =
            Some(Tag::Designation);

        // A second ensure call must not rebuild and discard the edit.
        line.ensure_ledger();
        assert_eq!(
            line.ledger().unwrap().get("احمد").unwrap().user_updated,
            Some(Tag::Designation)
        );
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn mutations_preserve_strip_invariant(
            word_count in 2usize..6,
            tag_idx in 0usize..7,
            seed in any::<u64>(),
        ) {
            let words: Vec<String> = (0..word_count).map(|i| format!("lafz{i}")).collect();
            let original = words.join(" ");
            let mut line = Line::new(original.clone(), original.clone(), "");

            let tag = crate::tag::ALL_TAGS[tag_idx];
            let target = &words[(seed as usize) % words.len()];

            // Add, then remove; the invariant must hold at every step.
            if line.add_tag(target, tag).is_ok() {
                prop_assert!(text_equivalent(&strip_tags(&line.tagged), &line.original));
                line.remove_tag(target).unwrap();
            }
            prop_assert!(text_equivalent(&strip_tags(&line.tagged), &line.original));
        }
    }
}
