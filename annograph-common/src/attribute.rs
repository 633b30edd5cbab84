//! Typed schema attributes
//!
//! An [`Attribute`] collects summary information about one property of words or
//! word tokens (a tier, a frequency column, a part-of-speech column). Its kind is
//! usually inferred from a small sample with [`Attribute::guess_type`], and every
//! observed value widens its running range.
//!
//! The only kind transition is [`Attribute::downgrade`], numeric → spelling. It
//! happens when a value contradicts an earlier numeric guess and cannot be undone.

use crate::annotation::PropertyValue;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W").expect("static pattern is valid"));

/// Delimiters that mark a value as a multi-segment transcription when guessing types
pub const DEFAULT_TRANSCRIPTION_DELIMITERS: [&str; 4] = [".", " ", ";", ","];

/// Attribute type tag, in tie-breaking order for [`Attribute::guess_type`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    Spelling,
    Tier,
    Numeric,
    Factor,
}

impl AttributeType {
    pub const ALL: [AttributeType; 4] = [
        AttributeType::Spelling,
        AttributeType::Tier,
        AttributeType::Numeric,
        AttributeType::Factor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeType::Spelling => "spelling",
            AttributeType::Tier => "tier",
            AttributeType::Numeric => "numeric",
            AttributeType::Factor => "factor",
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of an attribute together with its running range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttributeKind {
    /// Free text; no range is kept
    Spelling,
    /// Segment sequences; the range is every segment label seen
    Tier {
        segments: BTreeSet<String>,
        #[serde(default)]
        delimiter: Option<String>,
    },
    /// Numbers; `None` until the first value is observed
    Numeric { range: Option<(f64, f64)> },
    /// Categorical strings; the range is the set of levels
    Factor { levels: BTreeSet<String> },
}

impl AttributeKind {
    fn empty(att_type: AttributeType) -> Self {
        match att_type {
            AttributeType::Spelling => AttributeKind::Spelling,
            AttributeType::Tier => AttributeKind::Tier {
                segments: BTreeSet::new(),
                delimiter: None,
            },
            AttributeType::Numeric => AttributeKind::Numeric { range: None },
            AttributeType::Factor => AttributeKind::Factor {
                levels: BTreeSet::new(),
            },
        }
    }

    pub fn att_type(&self) -> AttributeType {
        match self {
            AttributeKind::Spelling => AttributeType::Spelling,
            AttributeKind::Tier { .. } => AttributeType::Tier,
            AttributeKind::Numeric { .. } => AttributeType::Numeric,
            AttributeKind::Factor { .. } => AttributeType::Factor,
        }
    }
}

/// Summary information about one word or word-token property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Storage-safe symbolic name
    pub name: String,
    #[serde(default)]
    display_name: Option<String>,
    kind: AttributeKind,
    default_value: PropertyValue,
}

impl Attribute {
    pub fn new(
        name: impl Into<String>,
        att_type: AttributeType,
        display_name: Option<String>,
        default_value: Option<PropertyValue>,
    ) -> Self {
        let mut kind = AttributeKind::empty(att_type);
        let default_value = match (att_type, default_value) {
            (AttributeType::Numeric, Some(PropertyValue::Numeric(v))) => PropertyValue::Numeric(v),
            (AttributeType::Numeric, _) => PropertyValue::Numeric(0.0),
            (AttributeType::Factor, Some(PropertyValue::Text(v))) => {
                if let AttributeKind::Factor { levels } = &mut kind {
                    if !v.is_empty() {
                        levels.insert(v.clone());
                    }
                }
                PropertyValue::Text(v)
            }
            (AttributeType::Spelling, Some(PropertyValue::Text(v))) => PropertyValue::Text(v),
            (AttributeType::Spelling | AttributeType::Factor, _) => PropertyValue::Text(String::new()),
            (AttributeType::Tier, Some(v)) => v,
            (AttributeType::Tier, None) => PropertyValue::Segments(Vec::new()),
        };

        Self {
            name: name.into(),
            display_name,
            kind,
            default_value,
        }
    }

    /// Classify a sample of raw values into the most probable attribute type.
    ///
    /// Each value votes for exactly one type: numeric if it parses as a number,
    /// tier if it contains one of `delimiters`, factor if it occurs elsewhere in
    /// the sample, spelling otherwise. Ties go to the earlier type in
    /// [`AttributeType::ALL`].
    pub fn guess_type<S: AsRef<str>>(values: &[S], delimiters: Option<&[&str]>) -> AttributeType {
        let delimiters = delimiters.unwrap_or(&DEFAULT_TRANSCRIPTION_DELIMITERS[..]);
        let mut counts = [0usize; 4];

        for (i, value) in values.iter().enumerate() {
            let v = value.as_ref();
            let guess = if parse_number(v).is_some() {
                AttributeType::Numeric
            } else if delimiters.iter().any(|d| !d.is_empty() && v.contains(d)) {
                AttributeType::Tier
            } else if values
                .iter()
                .enumerate()
                .any(|(j, other)| i != j && other.as_ref() == v)
            {
                AttributeType::Factor
            } else {
                AttributeType::Spelling
            };
            counts[guess as usize] += 1;
        }

        let mut best = AttributeType::Spelling;
        for t in AttributeType::ALL {
            if counts[t as usize] > counts[best as usize] {
                best = t;
            }
        }
        best
    }

    /// Lower-case a display name and strip every non-word character.
    ///
    /// Distinct names can sanitize to the same identifier; callers check uniqueness.
    pub fn sanitize_name(name: &str) -> String {
        NON_WORD.replace_all(&name.to_lowercase(), "").into_owned()
    }

    pub fn att_type(&self) -> AttributeType {
        self.kind.att_type()
    }

    pub fn kind(&self) -> &AttributeKind {
        &self.kind
    }

    pub fn display_name(&self) -> String {
        match &self.display_name {
            Some(d) => d.clone(),
            None => title_case(&self.name),
        }
    }

    pub fn default_value(&self) -> &PropertyValue {
        &self.default_value
    }

    /// Replace the default value; set-ranged kinds restart their range from it
    pub fn set_default_value(&mut self, value: PropertyValue) {
        match &mut self.kind {
            AttributeKind::Factor { levels } => {
                levels.clear();
                levels.insert(value.render());
            }
            AttributeKind::Tier { segments, .. } => {
                segments.clear();
                if let PropertyValue::Segments(segs) = &value {
                    segments.extend(segs.iter().map(|s| s.label.clone()));
                }
            }
            AttributeKind::Numeric { range } => {
                if let PropertyValue::Numeric(v) = value {
                    *range = Some((v, v));
                }
            }
            AttributeKind::Spelling => {}
        }
        self.default_value = value;
    }

    /// Transcription delimiter; only tier attributes have one
    pub fn delimiter(&self) -> Option<&str> {
        match &self.kind {
            AttributeKind::Tier { delimiter, .. } => delimiter.as_deref(),
            _ => None,
        }
    }

    pub fn set_delimiter(&mut self, value: Option<String>) {
        if let AttributeKind::Tier { delimiter, .. } = &mut self.kind {
            *delimiter = value;
        }
    }

    /// `(min, max)` of a numeric attribute that has seen at least one value
    pub fn numeric_range(&self) -> Option<(f64, f64)> {
        match &self.kind {
            AttributeKind::Numeric { range } => *range,
            _ => None,
        }
    }

    /// Observed levels (factor) or segment labels (tier)
    pub fn levels(&self) -> Option<&BTreeSet<String>> {
        match &self.kind {
            AttributeKind::Factor { levels } => Some(levels),
            AttributeKind::Tier { segments, .. } => Some(segments),
            _ => None,
        }
    }

    /// Numeric → spelling. Returns whether the kind changed.
    pub fn downgrade(&mut self) -> bool {
        if matches!(self.kind, AttributeKind::Numeric { .. }) {
            self.kind = AttributeKind::Spelling;
            self.default_value = PropertyValue::Text(String::new());
            true
        } else {
            false
        }
    }

    /// Widen the range with an observed value. Never fails: a value that
    /// contradicts a numeric kind downgrades the attribute instead.
    pub fn update_range(&mut self, value: Option<&PropertyValue>) {
        let Some(value) = value else {
            return;
        };

        let contradicts_numeric = match &mut self.kind {
            AttributeKind::Spelling => false,
            AttributeKind::Numeric { range } => {
                let number = match value {
                    PropertyValue::Numeric(v) => Some(*v),
                    PropertyValue::Text(s) => parse_number(s),
                    _ => None,
                };
                match number {
                    Some(v) if v.is_nan() => {}
                    Some(v) => match range {
                        None => *range = Some((v, v)),
                        Some((min, max)) => {
                            if v < *min {
                                *min = v;
                            }
                            if v > *max {
                                *max = v;
                            }
                        }
                    },
                    None => {}
                }
                number.is_none()
            }
            AttributeKind::Factor { levels } => {
                if !matches!(value, PropertyValue::Interval { .. }) {
                    levels.insert(value.render());
                }
                false
            }
            AttributeKind::Tier { segments, delimiter } => {
                match value {
                    PropertyValue::Segments(segs) => {
                        segments.extend(segs.iter().map(|s| s.label.clone()));
                    }
                    PropertyValue::Text(s) => match delimiter.as_deref() {
                        Some(d) if !d.is_empty() => {
                            segments.extend(s.split(d).filter(|x| !x.is_empty()).map(str::to_string));
                        }
                        _ => segments.extend(s.chars().map(|c| c.to_string())),
                    },
                    _ => {}
                }
                false
            }
        };

        if contradicts_numeric {
            warn!(
                "Attribute '{}' saw non-numeric value '{}'; treating it as spelling from now on",
                self.name,
                value.render()
            );
            self.downgrade();
        }
    }

    /// Check that `value` can be stored under this attribute's kind.
    ///
    /// Text on a numeric attribute is accepted; [`update_range`](Self::update_range)
    /// decides whether it downgrades the attribute.
    pub fn check_value(&self, property: &str, value: &PropertyValue) -> Result<()> {
        let ok = match (&self.kind, value) {
            (_, PropertyValue::Interval { .. }) => false,
            (AttributeKind::Numeric { .. }, PropertyValue::Segments(_)) => false,
            (AttributeKind::Numeric { .. }, _) => true,
            (AttributeKind::Spelling | AttributeKind::Factor { .. }, PropertyValue::Segments(_)) => false,
            (AttributeKind::Spelling | AttributeKind::Factor { .. }, _) => true,
            (AttributeKind::Tier { .. }, PropertyValue::Segments(_)) => true,
            (AttributeKind::Tier { .. }, PropertyValue::Text(_)) => true,
            (AttributeKind::Tier { .. }, PropertyValue::Numeric(_)) => false,
        };

        if ok {
            Ok(())
        } else {
            Err(Error::PropertyMismatch {
                property: property.to_string(),
                expected: self.att_type().to_string(),
                found: value.kind_name().to_string(),
            })
        }
    }
}

impl PartialEq<str> for Attribute {
    fn eq(&self, other: &str) -> bool {
        self.name == other
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

/// Parse a raw value as a number, tolerating surrounding whitespace
pub fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok()
}

fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_alpha = false;
    for c in name.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Segment;

    fn num(v: f64) -> PropertyValue {
        PropertyValue::Numeric(v)
    }

    #[test]
    fn test_guess_type_numeric() {
        assert_eq!(Attribute::guess_type(&["1", "2.5", " 3 "], None), AttributeType::Numeric);
    }

    #[test]
    fn test_guess_type_tier_and_factor() {
        assert_eq!(Attribute::guess_type(&["k.a.t", "d.o.g", "cat"], None), AttributeType::Tier);
        assert_eq!(Attribute::guess_type(&["N", "V", "N", "V", "Adj"], None), AttributeType::Factor);
        assert_eq!(Attribute::guess_type(&["cat", "dog", "fish"], None), AttributeType::Spelling);
    }

    #[test]
    fn test_guess_type_tie_prefers_enumeration_order() {
        // one spelling vote, one numeric vote
        assert_eq!(Attribute::guess_type(&["cat", "1"], None), AttributeType::Spelling);
        // one tier vote, one numeric vote
        assert_eq!(Attribute::guess_type(&["a b", "1"], None), AttributeType::Tier);
        let empty: [&str; 0] = [];
        assert_eq!(Attribute::guess_type(&empty, None), AttributeType::Spelling);
    }

    #[test]
    fn test_guess_type_custom_delimiters() {
        assert_eq!(Attribute::guess_type(&["a-b", "c-d"], Some(&["-"][..])), AttributeType::Tier);
        assert_eq!(Attribute::guess_type(&["a-b", "c-d"], Some(&["."][..])), AttributeType::Spelling);
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(Attribute::sanitize_name("Word Frequency (log)"), "wordfrequencylog");
        assert_eq!(Attribute::sanitize_name("part_of_speech"), "part_of_speech");
    }

    #[test]
    fn test_display_name_defaults_to_title_case() {
        let att = Attribute::new("part_of_speech", AttributeType::Factor, None, None);
        assert_eq!(att.display_name(), "Part_Of_Speech");
        let att = Attribute::new("pos", AttributeType::Factor, Some("POS".to_string()), None);
        assert_eq!(att.display_name(), "POS");
    }

    #[test]
    fn test_numeric_range_tracks_min_max() {
        let mut att = Attribute::new("freq", AttributeType::Numeric, None, None);
        for v in [3.0, 7.5, -1.0, 4.0, 7.5] {
            att.update_range(Some(&num(v)));
        }
        assert_eq!(att.numeric_range(), Some((-1.0, 7.5)));

        att.update_range(None);
        att.update_range(Some(&PropertyValue::Text("10".to_string())));
        assert_eq!(att.numeric_range(), Some((-1.0, 10.0)));
    }

    #[test]
    fn test_downgrade_is_one_way() {
        let mut att = Attribute::new("freq", AttributeType::Numeric, None, None);
        att.update_range(Some(&num(1.0)));
        att.update_range(Some(&num(2.0)));
        att.update_range(Some(&PropertyValue::Text("lots".to_string())));

        assert_eq!(att.att_type(), AttributeType::Spelling);
        assert_eq!(att.numeric_range(), None);

        for v in [5.0, 6.0] {
            att.update_range(Some(&num(v)));
        }
        assert_eq!(att.att_type(), AttributeType::Spelling);
        assert_eq!(att.numeric_range(), None);
        assert!(!att.downgrade());
    }

    #[test]
    fn test_factor_and_tier_ranges_grow() {
        let mut factor = Attribute::new("pos", AttributeType::Factor, None, None);
        factor.update_range(Some(&PropertyValue::Text("N".to_string())));
        factor.update_range(Some(&PropertyValue::Text("V".to_string())));
        factor.update_range(Some(&PropertyValue::Text("N".to_string())));
        assert_eq!(factor.levels().map(|l| l.len()), Some(2));

        let mut tier = Attribute::new("phone", AttributeType::Tier, None, None);
        tier.update_range(Some(&PropertyValue::Segments(vec![Segment::new("k"), Segment::new("a")])));
        tier.set_delimiter(Some(".".to_string()));
        tier.update_range(Some(&PropertyValue::Text("a.t".to_string())));
        let levels: Vec<_> = tier.levels().unwrap().iter().cloned().collect();
        assert_eq!(levels, vec!["a", "k", "t"]);
    }

    #[test]
    fn test_set_default_value_resets_factor_range() {
        let mut factor = Attribute::new("pos", AttributeType::Factor, None, Some("N".into()));
        factor.update_range(Some(&PropertyValue::Text("V".to_string())));
        factor.set_default_value(PropertyValue::Text("X".to_string()));
        let levels: Vec<_> = factor.levels().unwrap().iter().cloned().collect();
        assert_eq!(levels, vec!["X"]);
    }

    #[test]
    fn test_check_value_rejects_mismatched_kinds() {
        let numeric = Attribute::new("freq", AttributeType::Numeric, None, None);
        assert!(numeric.check_value("freq", &num(1.0)).is_ok());
        assert!(numeric.check_value("freq", &PropertyValue::Text("x".to_string())).is_ok());
        assert!(matches!(
            numeric.check_value("freq", &PropertyValue::Segments(vec![])),
            Err(Error::PropertyMismatch { .. })
        ));

        let tier = Attribute::new("phone", AttributeType::Tier, None, None);
        assert!(tier.check_value("phone", &PropertyValue::Segments(vec![])).is_ok());
        assert!(tier
            .check_value("phone", &PropertyValue::Interval { begin: 0, end: 1 })
            .is_err());
    }
}
