use serde::{Deserialize, Serialize};
use std::fmt;

/// A half-open byte range within the query text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    #[must_use]
    pub const fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.end
    }
}

/// One placeholder as it appears in a single parse of the query.
///
/// Produced fresh on every extraction pass and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderOccurrence {
    /// Identifier with the marker stripped (`?code` → `code`)
    pub name: String,

    /// Span of the placeholder including its marker
    pub range: TextRange,

    /// Declared type name of the compared attribute, if the parse resolved one
    pub declared_kind: Option<String>,
}

impl PlaceholderOccurrence {
    pub fn new(name: impl Into<String>, range: TextRange, declared_kind: Option<String>) -> Self {
        Self {
            name: name.into(),
            range,
            declared_kind,
        }
    }
}

/// Semantic value category of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Integer,
    Boolean,
    Temporal,
    Text,
    Unknown,
}

impl ValueKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Temporal => "temporal",
            Self::Text => "text",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deduplicated, typed query parameter.
///
/// Only `value` survives between extraction passes; `kind` is recomputed
/// from the first occurrence's declared kind every time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,

    /// Canonical string form
    pub value: String,

    pub kind: ValueKind,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            kind,
        }
    }

    /// Human readable form of the canonical value
    #[must_use]
    pub fn presentation_value(&self) -> String {
        crate::codec::presentation(self.kind, &self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_range_bounds() {
        let range = TextRange::new(4, 9);
        assert_eq!(range.len(), 5);
        assert!(range.contains(4));
        assert!(!range.contains(9));
        assert!(TextRange::new(3, 3).is_empty());
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ValueKind::Temporal).unwrap();
        assert_eq!(json, "\"temporal\"");
        assert_eq!(ValueKind::Boolean.to_string(), "boolean");
    }

    #[test]
    fn presentation_unquotes_text() {
        let param = Parameter::new("code", "'abc'", ValueKind::Text);
        assert_eq!(param.presentation_value(), "abc");
    }
}
