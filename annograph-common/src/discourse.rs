//! Per-discourse tier hierarchy
//!
//! [`DiscourseData`] owns every tier of one discourse for the duration of an
//! import. It derives the dependency order used by projection and merges
//! per-speaker tiers into speaker-independent ones.

use crate::annotation::{Annotation, PropertyValue, Reference, TierEntry};
use crate::attribute::{parse_number, Attribute, AttributeType, DEFAULT_TRANSCRIPTION_DELIMITERS};
use crate::tier::AnnotationType;
use crate::transcription::parse_transcription;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use tracing::debug;

/// All tiers of one discourse
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscourseData {
    pub name: String,
    /// Insertion-ordered tiers
    tiers: Vec<AnnotationType>,
    #[serde(default)]
    pub wav_path: Option<PathBuf>,
}

impl DiscourseData {
    /// Build from tiers; a later tier replaces an earlier one of the same name
    pub fn new(name: impl Into<String>, levels: impl IntoIterator<Item = AnnotationType>) -> Self {
        let mut data = Self {
            name: name.into(),
            tiers: Vec::new(),
            wav_path: None,
        };
        for level in levels {
            data.insert(level);
        }
        data
    }

    pub fn insert(&mut self, tier: AnnotationType) {
        match self.tiers.iter_mut().find(|t| t.name == tier.name) {
            Some(existing) => *existing = tier,
            None => self.tiers.push(tier),
        }
    }

    pub fn get(&self, name: &str) -> Option<&AnnotationType> {
        self.tiers.iter().find(|t| t.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut AnnotationType> {
        self.tiers.iter_mut().find(|t| t.name == name)
    }

    /// Tier by name, or a not-found error
    pub fn tier(&self, name: &str) -> Result<&AnnotationType> {
        self.get(name)
            .ok_or_else(|| Error::NotFound(format!("Tier '{}' in discourse '{}'", name, self.name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn tiers(&self) -> &[AnnotationType] {
        &self.tiers
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tiers.iter().map(|t| t.name.as_str())
    }

    /// Tier name → attribute, for tiers that are not ignored
    pub fn mapping(&self) -> BTreeMap<String, Attribute> {
        self.tiers
            .iter()
            .filter(|t| !t.ignored)
            .map(|t| (t.name.clone(), t.attribute.clone()))
            .collect()
    }

    pub fn add_annotations<I, E>(&mut self, tier: &str, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = E>,
        E: Into<TierEntry>,
    {
        let discourse = self.name.clone();
        let target = self
            .get_mut(tier)
            .ok_or_else(|| Error::NotFound(format!("Tier '{}' in discourse '{}'", tier, discourse)))?;
        target.add(entries, true);
        Ok(())
    }

    /// Turn raw text property values into typed ones.
    ///
    /// A property named after one of `tokenizers` is segmented by that tier's
    /// tokenizer. Any other property is classified from all of its text values
    /// with [`Attribute::guess_type`]: numeric properties become numbers when
    /// every value parses, tier properties are split on their most frequent
    /// default delimiter, the rest stay text. Returns the number of values
    /// converted.
    pub fn tokenize_text_properties(&mut self, tokenizers: &BTreeMap<String, AnnotationType>) -> Result<usize> {
        let mut samples: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for annotation in self.tiers.iter().flat_map(|t| t.iter()).filter_map(TierEntry::as_annotation) {
            for (name, value) in annotation.token_properties.iter().chain(&annotation.type_properties) {
                if let PropertyValue::Text(text) = value {
                    samples.entry(name.clone()).or_default().push(text.clone());
                }
            }
        }

        let mut converters: BTreeMap<String, AnnotationType> = BTreeMap::new();
        let mut numeric: BTreeSet<String> = BTreeSet::new();
        for (name, values) in &samples {
            if let Some(tier) = tokenizers.get(name) {
                tier.validate()?;
                converters.insert(name.clone(), tier.clone());
                continue;
            }
            match Attribute::guess_type(values.as_slice(), None) {
                AttributeType::Numeric if values.iter().all(|v| parse_number(v).is_some()) => {
                    numeric.insert(name.clone());
                }
                AttributeType::Tier => {
                    let delimiter = DEFAULT_TRANSCRIPTION_DELIMITERS
                        .iter()
                        .max_by_key(|d| values.iter().filter(|v| v.contains(*d)).count())
                        .copied()
                        .unwrap_or(".");
                    converters.insert(name.clone(), AnnotationType::new(name.clone()).base().with_delimiter(delimiter));
                }
                _ => {}
            }
        }
        if converters.is_empty() && numeric.is_empty() {
            return Ok(0);
        }

        let mut converted = 0;
        for tier in &mut self.tiers {
            if !tier.iter().any(|e| e.as_annotation().is_some()) {
                continue;
            }
            let mut entries = tier.entries().to_vec();
            for entry in &mut entries {
                let TierEntry::Annotation(annotation) = entry else {
                    continue;
                };
                for (name, value) in annotation
                    .token_properties
                    .iter_mut()
                    .chain(annotation.type_properties.iter_mut())
                {
                    let PropertyValue::Text(text) = value else {
                        continue;
                    };
                    if let Some(tokenizer) = converters.get(name) {
                        *value = PropertyValue::Segments(parse_transcription(text, tokenizer)?);
                        converted += 1;
                    } else if numeric.contains(name) {
                        if let Some(number) = parse_number(text) {
                            *value = PropertyValue::Numeric(number);
                            converted += 1;
                        }
                    }
                }
            }
            tier.reset();
            tier.add(entries, true);
        }
        debug!("Typed {} text property values in discourse '{}'", converted, self.name);
        Ok(converted)
    }

    pub fn level_length(&self, tier: &str) -> Result<usize> {
        Ok(self.tier(tier)?.len())
    }

    /// Tiers whose entries define word boundaries
    pub fn word_levels(&self) -> Vec<String> {
        self.tiers
            .iter()
            .filter(|t| t.is_word_anchor())
            .map(|t| t.name.clone())
            .collect()
    }

    pub fn base_levels(&self) -> Vec<String> {
        self.tiers
            .iter()
            .filter(|t| t.base)
            .map(|t| t.name.clone())
            .collect()
    }

    /// True when any base tier carries time-aligned segments
    pub fn is_timed(&self) -> bool {
        self.tiers
            .iter()
            .filter(|t| t.base)
            .any(|t| t.iter().any(|e| e.begin().is_some()))
    }

    pub fn has_speakers(&self) -> bool {
        self.tiers.iter().any(|t| t.speaker.is_some())
    }

    /// Every supertype/subtype must name a tier of this discourse
    pub fn validate_hierarchy(&self) -> Result<()> {
        for tier in &self.tiers {
            for (relation, target) in [("supertype", &tier.supertype), ("subtype", &tier.subtype)] {
                if let Some(target) = target {
                    if !self.contains(target) {
                        return Err(Error::Hierarchy(format!(
                            "Tier '{}' has {} '{}', which is not a tier of discourse '{}'",
                            tier.name, relation, target, self.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Word levels first, then every other non-base tier once its supertype is
    /// placed (or is a root or a base tier).
    ///
    /// Fails when a pass places nothing while tiers remain: the supertype graph
    /// has a cycle or a dangling reference.
    pub fn process_order(&self) -> Result<Vec<String>> {
        let mut order = self.word_levels();

        loop {
            let remaining: Vec<&AnnotationType> = self
                .tiers
                .iter()
                .filter(|t| !t.base && !order.contains(&t.name))
                .collect();
            if remaining.is_empty() {
                break;
            }

            let mut placed = false;
            for tier in remaining.iter() {
                let ready = match &tier.supertype {
                    None => true,
                    Some(sup) => order.contains(sup) || self.get(sup).is_some_and(|s| s.base),
                };
                if ready {
                    order.push(tier.name.clone());
                    placed = true;
                }
            }

            if !placed {
                let names: Vec<&str> = remaining.iter().map(|t| t.name.as_str()).collect();
                return Err(Error::Hierarchy(format!(
                    "Cannot order tiers [{}] of discourse '{}': cyclic or dangling supertype",
                    names.join(", "),
                    self.name
                )));
            }
        }

        Ok(order)
    }

    /// Merge per-speaker tiers into one tier per output name.
    ///
    /// Speakers are visited in sorted order (tiers without a speaker last); within
    /// a speaker non-base tiers precede base tiers. Each source base tier gets the
    /// offset at which its entries land in the merged tier, and a reference into
    /// it is shifted by that offset whichever speaker group the referring tier
    /// belongs to. Only base tiers advance the shift counters.
    pub fn collapse_speakers(&mut self) -> Result<()> {
        self.validate_hierarchy()?;

        let output_names: HashMap<String, String> = self
            .tiers
            .iter()
            .map(|t| (t.name.clone(), t.output_name()))
            .collect();
        let speakers: BTreeSet<&str> = self
            .tiers
            .iter()
            .filter_map(|t| t.speaker.as_deref())
            .collect();
        let mut groups: Vec<Option<&str>> = speakers.into_iter().map(Some).collect();
        if self.tiers.iter().any(|t| t.speaker.is_none()) {
            groups.push(None);
        }

        let mut keys: Vec<usize> = Vec::with_capacity(self.tiers.len());
        for speaker in &groups {
            let mut base = Vec::new();
            for (i, tier) in self.tiers.iter().enumerate() {
                if tier.speaker.as_deref() != *speaker {
                    continue;
                }
                if tier.base {
                    base.push(i);
                } else {
                    keys.push(i);
                }
            }
            keys.extend(base);
        }

        let mut shifts: HashMap<String, usize> = HashMap::new();
        let mut offsets: HashMap<String, usize> = HashMap::new();
        for &i in &keys {
            let source = &self.tiers[i];
            if source.base {
                let shift = shifts.entry(output_names[&source.name].clone()).or_insert(0);
                offsets.insert(source.name.clone(), *shift);
                *shift += source.len();
            }
        }

        let mut merged: Vec<AnnotationType> = Vec::new();
        let mut merged_index: HashMap<String, usize> = HashMap::new();

        for i in keys {
            let source = &self.tiers[i];
            let name = output_names[&source.name].clone();

            let dest = match merged_index.get(&name) {
                Some(&d) => d,
                None => {
                    merged.push(empty_like(source, &name, &output_names));
                    merged_index.insert(name.clone(), merged.len() - 1);
                    merged.len() - 1
                }
            };

            let entries: Vec<TierEntry> = source
                .iter()
                .map(|entry| match entry {
                    TierEntry::Segment(s) => TierEntry::Segment(s.clone()),
                    TierEntry::Annotation(a) => {
                        TierEntry::Annotation(translate_annotation(a, &output_names, &offsets))
                    }
                })
                .collect();
            merged[dest].add(entries, true);

            debug!(
                "Merged tier '{}' into '{}' ({} entries)",
                source.name,
                name,
                merged[dest].len()
            );
        }

        self.tiers = merged;
        Ok(())
    }
}

/// Empty destination tier for a merge, with hierarchy names translated
fn empty_like(source: &AnnotationType, name: &str, output_names: &HashMap<String, String>) -> AnnotationType {
    let translate = |n: &Option<String>| {
        n.as_ref()
            .map(|n| output_names.get(n).cloned().unwrap_or_else(|| n.clone()))
    };

    let mut attribute = Attribute::new(
        Attribute::sanitize_name(name),
        source.attribute.att_type(),
        Some(name.to_string()),
        None,
    );
    attribute.set_delimiter(source.attribute.delimiter().map(str::to_string));

    let mut tier = AnnotationType::new(name).with_attribute(attribute);
    tier.subtype = translate(&source.subtype);
    tier.supertype = translate(&source.supertype);
    tier.token = source.token;
    tier.base = source.base;
    tier.anchor = source.anchor;
    tier.ignored = source.ignored;
    tier.delimiter = source.delimiter.clone();
    tier.digraphs = source.digraphs.clone();
    tier.morph_delimiters = source.morph_delimiters.clone();
    tier.ignored_characters = source.ignored_characters.clone();
    tier.number_behavior = source.number_behavior;
    tier
}

fn translate_annotation(
    annotation: &Annotation,
    output_names: &HashMap<String, String>,
    offsets: &HashMap<String, usize>,
) -> Annotation {
    let rename = |key: &String| output_names.get(key).cloned().unwrap_or_else(|| key.clone());

    let references: Vec<Reference> = annotation
        .references
        .iter()
        .map(|r| match output_names.get(&r.tier) {
            Some(merged) => r.shifted(merged.clone(), offsets.get(&r.tier).copied().unwrap_or(0)),
            None => r.clone(),
        })
        .collect();

    Annotation {
        label: annotation.label.clone(),
        references,
        token_properties: annotation
            .token_properties
            .iter()
            .map(|(k, v)| (rename(k), v.clone()))
            .collect(),
        type_properties: annotation
            .type_properties
            .iter()
            .map(|(k, v)| (rename(k), v.clone()))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Segment;

    fn word_phone(name: &str) -> DiscourseData {
        let word = AnnotationType::new("word").anchor();
        let phone = AnnotationType::new("phone").base().token().with_supertype("word");
        DiscourseData::new(name, [word, phone])
    }

    #[test]
    fn test_word_and_base_levels() {
        let data = word_phone("d");
        assert_eq!(data.word_levels(), vec!["word"]);
        assert_eq!(data.base_levels(), vec!["phone"]);
        assert!(!data.is_timed());
    }

    #[test]
    fn test_insert_replaces_same_name() {
        let mut data = word_phone("d");
        data.insert(AnnotationType::new("word").anchor().token());
        assert_eq!(data.tiers().len(), 2);
        assert!(data.get("word").unwrap().token);
    }

    #[test]
    fn test_process_order_places_supertypes_first() {
        let line = AnnotationType::new("line");
        let morph = AnnotationType::new("morpheme").with_supertype("word");
        let word = AnnotationType::new("word").anchor().with_supertype("line");
        let phone = AnnotationType::new("phone").base().with_supertype("morpheme");
        let data = DiscourseData::new("d", [morph, line, word, phone]);

        let order = data.process_order().unwrap();
        assert_eq!(order, vec!["word", "morpheme", "line"]);
    }

    #[test]
    fn test_process_order_detects_two_cycle() {
        let a = AnnotationType::new("a").with_supertype("b");
        let b = AnnotationType::new("b").with_supertype("a");
        let data = DiscourseData::new("d", [a, b]);
        assert!(matches!(data.process_order(), Err(Error::Hierarchy(_))));
    }

    #[test]
    fn test_dangling_supertype_is_a_hierarchy_error() {
        let a = AnnotationType::new("a").with_supertype("missing");
        let data = DiscourseData::new("d", [a]);
        assert!(matches!(data.validate_hierarchy(), Err(Error::Hierarchy(_))));
        assert!(matches!(data.process_order(), Err(Error::Hierarchy(_))));
    }

    #[test]
    fn test_collapse_shifts_speakerless_reference_by_source_offset() {
        let mut tiers = Vec::new();
        for speaker in ["A", "B"] {
            let mut phone = AnnotationType::new(format!("{speaker} - phone")).base().with_speaker(speaker);
            phone.add(["p", "a", "t"].map(Segment::new), true);
            tiers.push(phone);
        }
        let mut note = AnnotationType::new("note");
        note.add(
            [
                Annotation::new("a-side").with_reference("A - phone", 0, 2),
                Annotation::new("b-side").with_reference("B - phone", 1, 3),
            ],
            true,
        );
        tiers.push(note);
        let mut data = DiscourseData::new("d", tiers);

        data.collapse_speakers().unwrap();
        assert_eq!(data.level_length("phone").unwrap(), 6);
        let references: Vec<(usize, usize)> = data
            .get("note")
            .unwrap()
            .iter()
            .filter_map(TierEntry::as_annotation)
            .map(|a| a.reference("phone").unwrap())
            .collect();
        assert_eq!(references, vec![(0, 2), (4, 6)]);
    }

    #[test]
    fn test_text_properties_are_typed_by_guessed_kind() {
        let mut word = AnnotationType::new("word").anchor();
        word.add(
            [
                Annotation::new("cat")
                    .with_type_property("freq", "12")
                    .with_type_property("sampa", "k.{.t")
                    .with_token_property("pos", "noun"),
                Annotation::new("dog")
                    .with_type_property("freq", "7.5")
                    .with_type_property("sampa", "d.Q.g")
                    .with_token_property("pos", "noun"),
            ],
            true,
        );
        let mut data = DiscourseData::new("d", [word]);

        assert_eq!(data.tokenize_text_properties(&BTreeMap::new()).unwrap(), 4);
        let Some(TierEntry::Annotation(dog)) = data.get("word").unwrap().get(1) else {
            panic!("word entry is an annotation");
        };
        assert_eq!(dog.type_properties["freq"], PropertyValue::Numeric(7.5));
        assert_eq!(dog.type_properties["sampa"].render(), "d.Q.g");
        assert!(matches!(dog.type_properties["sampa"], PropertyValue::Segments(_)));
        assert_eq!(dog.token_properties["pos"], PropertyValue::from("noun"));
    }

    #[test]
    fn test_add_annotations_unknown_tier() {
        let mut data = word_phone("d");
        let err = data.add_annotations("tone", [Segment::new("H")]).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        data.add_annotations("phone", [Segment::new("k")]).unwrap();
        assert_eq!(data.level_length("phone").unwrap(), 1);
    }
}
