//! Parsed field tags.
//!
//! A raw tag such as `"name,omitempty"` is split on `,` into positional
//! segments. Segment 0 is the label, the rest are modifiers. Nothing is
//! trimmed: `"a, b"` yields `"a"` and `" b"`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Segment delimiter inside a raw tag string.
pub const TAG_DELIMITER: char = ',';

/// Label marking a field as excluded from its record's descriptor.
pub const EXCLUDE_LABEL: &str = "-";

/// Tag of a single field under one namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagMetadata {
    segments: Vec<String>,
}

impl TagMetadata {
    /// Split `raw` into segments. An empty string yields no segments at all.
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return Self::default();
        }

        Self {
            segments: raw.split(TAG_DELIMITER).map(String::from).collect(),
        }
    }

    /// Segment at `position`.
    #[inline]
    pub fn get(&self, position: usize) -> Option<&str> {
        self.segments.get(position).map(String::as_str)
    }

    /// Segment 0, conventionally the field's external name.
    ///
    /// `Some("")` for tags like `",omitempty"`; `None` only when the tag is empty.
    #[inline]
    pub fn label(&self) -> Option<&str> {
        self.get(0)
    }

    /// All segments after the label, in split order.
    #[inline]
    pub fn modifiers(&self) -> &[String] {
        self.segments.get(1..).unwrap_or_default()
    }

    /// First position whose segment equals `segment`.
    pub fn position_of(&self, segment: &str) -> Option<usize> {
        self.segments.iter().position(|s| s == segment)
    }

    /// Whether `modifier` appears after the label.
    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers().iter().any(|m| m == modifier)
    }

    /// Whether the label is the exclusion marker `-`.
    #[inline]
    pub fn is_excluded(&self) -> bool {
        self.label() == Some(EXCLUDE_LABEL)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Iterate `(position, segment)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.segments.iter().map(String::as_str).enumerate()
    }
}

impl fmt::Display for TagMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for seg in &self.segments {
            if !first {
                write!(f, "{TAG_DELIMITER}")?;
            }
            f.write_str(seg)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tag_has_no_segments() {
        let tag = TagMetadata::parse("");
        assert!(tag.is_empty());
        assert_eq!(tag.label(), None);
        assert!(tag.modifiers().is_empty());
        assert_eq!(tag.position_of(""), None);
        assert!(!tag.has_modifier("omitempty"));
    }

    #[test]
    fn label_only() {
        let tag = TagMetadata::parse("name");
        assert_eq!(tag.label(), Some("name"));
        assert!(tag.modifiers().is_empty());
        assert_eq!(tag.len(), 1);
    }

    #[test]
    fn modifiers_only() {
        let tag = TagMetadata::parse(",omitempty");
        assert_eq!(tag.label(), Some(""));
        assert_eq!(tag.modifiers(), ["omitempty"]);
        assert!(tag.has_modifier("omitempty"));
    }

    #[test]
    fn label_and_modifiers() {
        let tag = TagMetadata::parse("name,omitempty,string");
        assert_eq!(tag.label(), Some("name"));
        assert_eq!(tag.modifiers(), ["omitempty", "string"]);
        assert_eq!(tag.get(2), Some("string"));
        assert_eq!(tag.get(3), None);
    }

    #[test]
    fn segments_are_not_trimmed() {
        let tag = TagMetadata::parse("a, b");
        assert_eq!(tag.get(1), Some(" b"));
        assert!(!tag.has_modifier("b"));
    }

    #[test]
    fn position_of_returns_first_match() {
        let tag = TagMetadata::parse("x,y,x");
        assert_eq!(tag.position_of("x"), Some(0));
        assert_eq!(tag.position_of("y"), Some(1));
        assert_eq!(tag.position_of("z"), None);
    }

    #[test]
    fn has_modifier_ignores_label() {
        let tag = TagMetadata::parse("omitempty");
        assert!(!tag.has_modifier("omitempty"));
        assert_eq!(tag.position_of("omitempty"), Some(0));
    }

    #[test]
    fn exclusion_marker() {
        assert!(TagMetadata::parse("-").is_excluded());
        assert!(TagMetadata::parse("-,omitempty").is_excluded());
        assert!(!TagMetadata::parse("-x").is_excluded());
        assert!(!TagMetadata::parse("").is_excluded());
    }

    #[test]
    fn display_rejoins_segments() {
        assert_eq!(TagMetadata::parse("a,,b").to_string(), "a,,b");
        assert_eq!(TagMetadata::parse("").to_string(), "");
    }
}
