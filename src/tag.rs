//! Entity category labels for Urdu NER review.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Entity category label.
///
/// The seven-category tag set used for marsiya annotation. Tags are
/// serialized as their uppercase label string so stored documents stay
/// readable next to the inline `<TAG>...</TAG>` markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Tag {
    /// Person name, including titles attached to the name
    Person,
    /// City, country, landmark, geographical feature
    Location,
    /// Specific date, year, or named day
    Date,
    /// Specific time or period
    Time,
    /// Company, institution, government body
    Organization,
    /// Job title or honorific
    Designation,
    /// Significant numerical value
    Number,
}

/// All tags, in display order.
pub const ALL_TAGS: [Tag; 7] = [
    Tag::Person,
    Tag::Location,
    Tag::Date,
    Tag::Time,
    Tag::Organization,
    Tag::Designation,
    Tag::Number,
];

impl Tag {
    /// Convert to the label string used in inline markup.
    #[must_use]
    pub fn as_label(&self) -> &'static str {
        match self {
            Tag::Person => "PERSON",
            Tag::Location => "LOCATION",
            Tag::Date => "DATE",
            Tag::Time => "TIME",
            Tag::Organization => "ORGANIZATION",
            Tag::Designation => "DESIGNATION",
            Tag::Number => "NUMBER",
        }
    }

    /// Parse from a label string (case-insensitive).
    ///
    /// Unknown labels are an error: judgment rows arrive with free-form
    /// label strings and the caller decides whether to skip them.
    pub fn from_label(label: &str) -> Result<Self> {
        match label.trim().to_uppercase().as_str() {
            "PERSON" | "PER" => Ok(Tag::Person),
            "LOCATION" | "LOC" | "GPE" => Ok(Tag::Location),
            "DATE" => Ok(Tag::Date),
            "TIME" => Ok(Tag::Time),
            "ORGANIZATION" | "ORG" => Ok(Tag::Organization),
            "DESIGNATION" => Ok(Tag::Designation),
            "NUMBER" | "NUM" => Ok(Tag::Number),
            other => Err(Error::invalid_input(format!("unknown tag label: {other}"))),
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_label())
    }
}

impl std::str::FromStr for Tag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Tag::from_label(s)
    }
}

impl TryFrom<String> for Tag {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Tag::from_label(&s)
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> String {
        tag.as_label().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_roundtrip() {
        for tag in ALL_TAGS {
            let parsed = Tag::from_label(tag.as_label()).unwrap();
            assert_eq!(tag, parsed);
        }
    }

    #[test]
    fn test_case_insensitive_parse() {
        assert_eq!(Tag::from_label("person").unwrap(), Tag::Person);
        assert_eq!(Tag::from_label(" Location ").unwrap(), Tag::Location);
    }

    #[test]
    fn test_unknown_label_rejected() {
        assert!(Tag::from_label("ANIMAL").is_err());
        assert!(Tag::from_label("").is_err());
    }

    #[test]
    fn test_serde_as_label_string() {
        let json = serde_json::to_string(&Tag::Designation).unwrap();
        assert_eq!(json, "\"DESIGNATION\"");
        let back: Tag = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Tag::Designation);
    }
}
