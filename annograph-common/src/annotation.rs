//! Annotation units
//!
//! A [`Segment`] is an atomic labeled span on a base tier (a phone, a tone mark).
//! An [`Annotation`] is a composite unit (a word, an utterance) that points into
//! other tiers through half-open interval [`Reference`]s and carries token-level
//! and type-level property bags.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Atomic labeled span
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Segment {
    pub label: String,
    /// Start position; present only for time-aligned data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stress: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    /// Index of the morpheme this segment was tokenized from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<usize>,
}

impl Segment {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    /// Create a time-aligned segment
    pub fn timed(label: impl Into<String>, begin: f64, end: f64) -> Self {
        Self {
            label: label.into(),
            begin: Some(begin),
            end: Some(end),
            ..Default::default()
        }
    }

    pub fn is_timed(&self) -> bool {
        self.begin.is_some() && self.end.is_some()
    }
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label && self.begin == other.begin && self.end == other.end
    }
}

impl PartialEq<str> for Segment {
    fn eq(&self, other: &str) -> bool {
        self.label == other
    }
}

impl PartialEq<&str> for Segment {
    fn eq(&self, other: &&str) -> bool {
        self.label == *other
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Half-open interval `[begin, end)` into another tier's entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub tier: String,
    pub begin: usize,
    pub end: usize,
}

impl Reference {
    pub fn new(tier: impl Into<String>, begin: usize, end: usize) -> Self {
        Self {
            tier: tier.into(),
            begin,
            end,
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.begin)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.begin
    }

    /// Move the interval forward by `offset` entries
    pub fn shifted(&self, tier: impl Into<String>, offset: usize) -> Self {
        Self {
            tier: tier.into(),
            begin: self.begin + offset,
            end: self.end + offset,
        }
    }
}

/// Closed set of property kinds an annotation can carry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    Numeric(f64),
    Text(String),
    Segments(Vec<Segment>),
    Interval { begin: usize, end: usize },
}

impl PropertyValue {
    /// Short name of the variant, used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            PropertyValue::Numeric(_) => "numeric",
            PropertyValue::Text(_) => "text",
            PropertyValue::Segments(_) => "segments",
            PropertyValue::Interval { .. } => "interval",
        }
    }

    /// Flatten to the string stored in relational property tables.
    /// Segment sequences are joined with `.`.
    pub fn render(&self) -> String {
        match self {
            PropertyValue::Numeric(v) => v.to_string(),
            PropertyValue::Text(s) => s.clone(),
            PropertyValue::Segments(segs) => segs
                .iter()
                .map(|s| s.label.as_str())
                .collect::<Vec<_>>()
                .join("."),
            PropertyValue::Interval { begin, end } => format!("{}-{}", begin, end),
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Numeric(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Text(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Text(v)
    }
}

impl From<Vec<Segment>> for PropertyValue {
    fn from(v: Vec<Segment>) -> Self {
        PropertyValue::Segments(v)
    }
}

/// Composite annotation unit (e.g. a word)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Annotation {
    pub label: String,
    #[serde(default)]
    pub references: Vec<Reference>,
    /// Per-occurrence properties
    #[serde(default)]
    pub token_properties: BTreeMap<String, PropertyValue>,
    /// Per-type properties, attached to the lexical entry
    #[serde(default)]
    pub type_properties: BTreeMap<String, PropertyValue>,
}

impl Annotation {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn with_reference(mut self, tier: impl Into<String>, begin: usize, end: usize) -> Self {
        self.references.push(Reference::new(tier, begin, end));
        self
    }

    pub fn with_token_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.token_properties.insert(name.into(), value.into());
        self
    }

    pub fn with_type_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.type_properties.insert(name.into(), value.into());
        self
    }

    /// Interval recorded for `tier`, if any
    pub fn reference(&self, tier: &str) -> Option<(usize, usize)> {
        self.references
            .iter()
            .find(|r| r.tier == tier)
            .map(|r| (r.begin, r.end))
    }
}

impl PartialEq for Annotation {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label && self.references == other.references
    }
}

/// One entry stored on a tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierEntry {
    Segment(Segment),
    Annotation(Annotation),
}

impl TierEntry {
    pub fn label(&self) -> &str {
        match self {
            TierEntry::Segment(s) => &s.label,
            TierEntry::Annotation(a) => &a.label,
        }
    }

    pub fn begin(&self) -> Option<f64> {
        match self {
            TierEntry::Segment(s) => s.begin,
            TierEntry::Annotation(_) => None,
        }
    }

    pub fn end(&self) -> Option<f64> {
        match self {
            TierEntry::Segment(s) => s.end,
            TierEntry::Annotation(_) => None,
        }
    }

    pub fn as_segment(&self) -> Option<&Segment> {
        match self {
            TierEntry::Segment(s) => Some(s),
            TierEntry::Annotation(_) => None,
        }
    }

    pub fn as_annotation(&self) -> Option<&Annotation> {
        match self {
            TierEntry::Annotation(a) => Some(a),
            TierEntry::Segment(_) => None,
        }
    }

    /// Segment view of this entry; annotations become label-only segments
    pub fn to_segment(&self) -> Segment {
        match self {
            TierEntry::Segment(s) => s.clone(),
            TierEntry::Annotation(a) => Segment::new(a.label.clone()),
        }
    }
}

impl From<Segment> for TierEntry {
    fn from(s: Segment) -> Self {
        TierEntry::Segment(s)
    }
}

impl From<Annotation> for TierEntry {
    fn from(a: Annotation) -> Self {
        TierEntry::Annotation(a)
    }
}
