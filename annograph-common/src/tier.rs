//! Tier configuration and storage
//!
//! An [`AnnotationType`] describes one tier of a discourse: where it sits in the
//! hierarchy, how raw strings on it are segmented, and the entries realized on it.

use crate::annotation::TierEntry;
use crate::attribute::{Attribute, AttributeType};
use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

/// Number of entries kept when a tier is filled in preview mode
pub const PREVIEW_LIMIT: usize = 10;

/// What to do with digits embedded in transcription tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberBehavior {
    Stress,
    Tone,
}

impl NumberBehavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            NumberBehavior::Stress => "stress",
            NumberBehavior::Tone => "tone",
        }
    }
}

/// One tier of annotation across a discourse
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationType {
    pub name: String,
    #[serde(default)]
    pub subtype: Option<String>,
    /// Parent tier; `None` marks a root
    #[serde(default)]
    pub supertype: Option<String>,
    /// Per-occurrence (token) rather than per-type
    #[serde(default)]
    pub token: bool,
    /// Terminal tier; defines the index space other tiers reference into
    #[serde(default)]
    pub base: bool,
    /// Participates in word-level indexing
    #[serde(default)]
    pub anchor: bool,
    #[serde(default)]
    pub speaker: Option<String>,
    /// Excluded from the attribute mapping
    #[serde(default)]
    pub ignored: bool,
    pub attribute: Attribute,
    #[serde(default)]
    pub delimiter: Option<String>,
    #[serde(default)]
    pub digraphs: BTreeSet<String>,
    #[serde(default)]
    pub morph_delimiters: BTreeSet<String>,
    #[serde(default)]
    pub ignored_characters: BTreeSet<char>,
    #[serde(default)]
    pub number_behavior: Option<NumberBehavior>,
    /// Every character seen in an entry label
    #[serde(default)]
    pub characters: BTreeSet<char>,
    #[serde(default)]
    entries: Vec<TierEntry>,
}

impl AnnotationType {
    /// Create a tier whose attribute is derived from its name: tier-typed for
    /// base tiers, spelling otherwise. Set `base` with [`Self::base`] before
    /// relying on that distinction.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let attribute = Attribute::new(
            Attribute::sanitize_name(&name),
            AttributeType::Spelling,
            Some(name.clone()),
            None,
        );
        Self {
            name,
            subtype: None,
            supertype: None,
            token: false,
            base: false,
            anchor: false,
            speaker: None,
            ignored: false,
            attribute,
            delimiter: None,
            digraphs: BTreeSet::new(),
            morph_delimiters: BTreeSet::new(),
            ignored_characters: BTreeSet::new(),
            number_behavior: None,
            characters: BTreeSet::new(),
            entries: Vec::new(),
        }
    }

    pub fn with_supertype(mut self, supertype: impl Into<String>) -> Self {
        self.supertype = Some(supertype.into());
        self
    }

    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    /// Mark as a base tier; its attribute becomes tier-typed
    pub fn base(mut self) -> Self {
        self.base = true;
        if self.attribute.att_type() != AttributeType::Tier {
            self.attribute = Attribute::new(
                self.attribute.name.clone(),
                AttributeType::Tier,
                Some(self.name.clone()),
                None,
            );
            self.attribute.set_delimiter(self.delimiter.clone());
        }
        self
    }

    pub fn anchor(mut self) -> Self {
        self.anchor = true;
        self
    }

    pub fn token(mut self) -> Self {
        self.token = true;
        self
    }

    pub fn with_speaker(mut self, speaker: impl Into<String>) -> Self {
        self.speaker = Some(speaker.into());
        self
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attribute = attribute;
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        let delimiter = delimiter.into();
        self.attribute.set_delimiter(Some(delimiter.clone()));
        self.delimiter = Some(delimiter);
        self
    }

    pub fn with_digraphs<I, S>(mut self, digraphs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.digraphs.extend(digraphs.into_iter().map(Into::into));
        self
    }

    pub fn with_morph_delimiters<I, S>(mut self, delimiters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.morph_delimiters.extend(delimiters.into_iter().map(Into::into));
        self
    }

    pub fn with_ignored_characters(mut self, chars: impl IntoIterator<Item = char>) -> Self {
        self.ignored_characters.extend(chars);
        self
    }

    pub fn with_number_behavior(mut self, behavior: NumberBehavior) -> Self {
        self.number_behavior = Some(behavior);
        self
    }

    /// Name with the speaker prefix removed; merged tiers are keyed by it
    pub fn output_name(&self) -> String {
        match &self.speaker {
            Some(speaker) if !speaker.is_empty() => {
                let pattern = format!(r"{}\W*", regex::escape(speaker));
                match Regex::new(&pattern) {
                    Ok(re) => re.replace_all(&self.name, "").into_owned(),
                    Err(_) => self.name.clone(),
                }
            }
            _ => self.name.clone(),
        }
    }

    pub fn is_word_anchor(&self) -> bool {
        !self.token && self.anchor
    }

    pub fn is_token_base(&self) -> bool {
        self.token && self.base
    }

    pub fn is_type_base(&self) -> bool {
        !self.token && self.base
    }

    /// True when tokens are separated by an explicit delimiter or digraph set
    pub fn delimited(&self) -> bool {
        self.delimiter.is_some() || !self.digraphs.is_empty()
    }

    /// Digraphs longest-first as one alternation, then ASCII digit runs, then any
    /// non-space character. `None` when no digraphs are configured.
    pub fn digraph_pattern(&self) -> Result<Option<Regex>> {
        if self.digraphs.is_empty() {
            return Ok(None);
        }
        let mut digraphs: Vec<&String> = self.digraphs.iter().collect();
        digraphs.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
        let mut pattern = digraphs
            .iter()
            .map(|d| regex::escape(d))
            .collect::<Vec<_>>()
            .join("|");
        pattern.push_str(r"|[0-9]+|\S");
        Regex::new(&pattern)
            .map(Some)
            .map_err(|e| Error::Config(format!("Tier '{}' has an invalid digraph set: {}", self.name, e)))
    }

    /// Reject configurations that cannot segment anything
    pub fn validate(&self) -> Result<()> {
        if matches!(self.delimiter.as_deref(), Some("")) {
            return Err(Error::Config(format!("Tier '{}' has an empty delimiter", self.name)));
        }
        if self.digraphs.iter().any(|d| d.is_empty()) {
            return Err(Error::Config(format!("Tier '{}' has an empty digraph", self.name)));
        }
        if self.morph_delimiters.iter().any(|d| d.is_empty()) {
            return Err(Error::Config(format!(
                "Tier '{}' has an empty morpheme delimiter",
                self.name
            )));
        }
        Ok(())
    }

    /// Observed characters that are ASCII punctuation
    pub fn punctuation(&self) -> BTreeSet<char> {
        self.characters
            .iter()
            .copied()
            .filter(|c| c.is_ascii_punctuation())
            .collect()
    }

    /// Append entries. With `save == false` only the first [`PREVIEW_LIMIT`]
    /// entries are stored, but the character set still sees every entry.
    pub fn add<I, E>(&mut self, entries: I, save: bool)
    where
        I: IntoIterator<Item = E>,
        E: Into<TierEntry>,
    {
        for entry in entries {
            let entry = entry.into();
            self.characters.extend(entry.label().chars());
            if save || self.entries.len() < PREVIEW_LIMIT {
                self.entries.push(entry);
            }
        }
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[TierEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&TierEntry> {
        self.entries.get(index)
    }

    /// Entries in `[begin, end)`, or `None` when the interval is out of bounds
    pub fn slice(&self, begin: usize, end: usize) -> Option<&[TierEntry]> {
        if begin > end || end > self.entries.len() {
            return None;
        }
        Some(&self.entries[begin..end])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TierEntry> {
        self.entries.iter()
    }

    /// Human-readable summary of the segmentation settings
    pub fn pretty_print(&self) -> String {
        let join = |set: &BTreeSet<String>| set.iter().cloned().collect::<Vec<_>>().join(", ");
        format!(
            "{}:\n    Ignored characters: {}\n    Digraphs: {}\n    Transcription delimiter: {}\n    Morpheme delimiters: {}\n    Number behavior: {}\n",
            self.name,
            self.ignored_characters
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            join(&self.digraphs),
            self.delimiter.as_deref().unwrap_or("None"),
            join(&self.morph_delimiters),
            self.number_behavior.map(|b| b.as_str()).unwrap_or("None"),
        )
    }
}

/// Log the segmentation settings of every tier
pub fn log_annotation_types<'a>(annotation_types: impl IntoIterator<Item = &'a AnnotationType>) {
    info!("Annotation type info");
    info!("--------------------");
    for a in annotation_types {
        info!("{}", a.pretty_print());
    }
}
