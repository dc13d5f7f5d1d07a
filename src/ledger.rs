//! Per-line entity status ledger.
//!
//! The ledger is the canonical, mutable record of what the reviewer has
//! decided about each entity in a line: the tag the LLM originally gave it,
//! any correction, and whether the line as a whole has been reviewed.
//!
//! It is built exactly once from the line's tagged text and then only
//! mutated, so a re-parse never silently discards reviewer edits.

use serde::{Deserialize, Serialize};

use crate::extract::extract_entities;
use crate::Tag;

/// Review status of one entity in a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStatus {
    /// Entity surface text, the natural key within a line.
    pub entity: String,
    /// Original LLM tag. `None` for entities the reviewer added manually.
    pub tag: Option<Tag>,
    /// Reviewer's corrected tag, or the tag chosen for a manually added
    /// entity. `None` means the original tag stands.
    pub user_updated: Option<Tag>,
}

impl EntityStatus {
    /// The tag that currently applies: the correction if one was made,
    /// otherwise the original LLM tag.
    #[must_use]
    pub fn effective(&self) -> Option<Tag> {
        self.user_updated.or(self.tag)
    }

    /// Whether the reviewer added this entity by hand (no LLM tag).
    #[must_use]
    pub fn is_manual(&self) -> bool {
        self.tag.is_none()
    }
}

/// Entity status ledger for one line.
///
/// Verification is an explicit field rather than a reserved key mixed into
/// the entity mapping, so consumers never have to filter a sentinel out.
/// Entries keep document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    /// Whether the reviewer has explicitly confirmed this line.
    pub verified: bool,
    /// Entity statuses in first-appearance order.
    pub entries: Vec<EntityStatus>,
}

impl Ledger {
    /// Build a ledger from a line's tagged text.
    ///
    /// Spans whose label is not one of the known tags are skipped with a
    /// warning. When the same entity string appears more than once with
    /// different tags, the last occurrence wins: the ledger is keyed by
    /// surface string, not position, and cannot hold both. Known limitation.
    #[must_use]
    pub fn from_tagged(tagged: &str) -> Self {
        let mut ledger = Ledger::default();
        for (label, entity) in extract_entities(tagged) {
            let tag = match Tag::from_label(&label) {
                Ok(tag) => tag,
                Err(_) => {
                    log::warn!("skipping span with unknown tag label {label:?}");
                    continue;
                }
            };
            if let Some(idx) = ledger.entries.iter().position(|e| e.entity == entity) {
                ledger.entries[idx].tag = Some(tag);
            } else {
                ledger.entries.push(EntityStatus {
                    entity,
                    tag: Some(tag),
                    user_updated: None,
                });
            }
        }
        ledger
    }

    /// Look up an entity's status.
    #[must_use]
    pub fn get(&self, entity: &str) -> Option<&EntityStatus> {
        self.entries.iter().find(|e| e.entity == entity)
    }

    /// Look up an entity's status mutably.
    pub fn get_mut(&mut self, entity: &str) -> Option<&mut EntityStatus> {
        self.entries.iter_mut().find(|e| e.entity == entity)
    }

    /// Whether the ledger holds an entry for this entity.
    #[must_use]
    pub fn contains(&self, entity: &str) -> bool {
        self.get(entity).is_some()
    }

    /// Insert a new entry, replacing any existing entry for the same entity.
    pub fn insert(&mut self, status: EntityStatus) {
        if let Some(idx) = self.entries.iter().position(|e| e.entity == status.entity) {
            self.entries[idx] = status;
        } else {
            self.entries.push(status);
        }
    }

    /// Remove an entity's entry, returning it if present.
    pub fn remove(&mut self, entity: &str) -> Option<EntityStatus> {
        let idx = self.entries.iter().position(|e| e.entity == entity)?;
        Some(self.entries.remove(idx))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_from_tagged() {
        let tagged = "<PERSON>امام حسینؑ</PERSON> <LOCATION>کربلا</LOCATION> میں";
        let ledger = Ledger::from_tagged(tagged);
        assert_eq!(ledger.len(), 2);
        assert!(!ledger.verified);

        let first = ledger.get("امام حسینؑ").unwrap();
        assert_eq!(first.tag, Some(Tag::Person));
        assert_eq!(first.user_updated, None);
        assert!(!first.is_manual());
    }

    #[test]
    fn test_duplicate_entity_last_tag_wins() {
        let tagged = "<PERSON>علی</PERSON> x <DESIGNATION>علی</DESIGNATION>";
        let ledger = Ledger::from_tagged(tagged);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get("علی").unwrap().tag, Some(Tag::Designation));
    }

    #[test]
    fn test_unknown_label_skipped() {
        let tagged = "<ANIMAL>گھوڑا</ANIMAL> <PERSON>علی</PERSON>";
        let ledger = Ledger::from_tagged(tagged);
        assert_eq!(ledger.len(), 1);
        assert!(ledger.contains("علی"));
    }

    #[test]
    fn test_effective_tag_override() {
        let status = EntityStatus {
            entity: "x".into(),
            tag: Some(Tag::Location),
            user_updated: Some(Tag::Person),
        };
        assert_eq!(status.effective(), Some(Tag::Person));

        let untouched = EntityStatus {
            entity: "y".into(),
            tag: Some(Tag::Location),
            user_updated: None,
        };
        assert_eq!(untouched.effective(), Some(Tag::Location));
    }

    #[test]
    fn test_entities_are_substrings_of_stripped_text() {
        let tagged = "<PERSON>امام حسینؑ</PERSON> <LOCATION>کربلا</LOCATION> میں <DATE>10 محرم</DATE>";
        let original = crate::extract::strip_tags(tagged);
        let ledger = Ledger::from_tagged(tagged);
        assert_eq!(ledger.len(), 3);
        for entry in &ledger.entries {
            assert!(original.contains(&entry.entity));
        }
    }

    #[test]
    fn test_remove() {
        let mut ledger = Ledger::from_tagged("<PERSON>علی</PERSON>");
        assert!(ledger.remove("علی").is_some());
        assert!(ledger.is_empty());
        assert!(ledger.remove("علی").is_none());
    }
}
