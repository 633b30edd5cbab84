//! Word tokens, lexicon updates and relational rows
//!
//! Each entry on a word level is one token. Its word type is keyed by
//! orthography and transcription. The transcription is the explicit
//! `transcription` type property when present, else the labels of the
//! referenced segments on the primary base tier when that tier is type-level.

use super::{property_name, WordRow};
use crate::error::ImportResult;
use crate::lexicon::{AttributeScope, Lexicon, WordKey, WordToken};
use annograph_common::{Annotation, DiscourseData, PropertyValue, Segment, TierEntry};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Name of the type property that overrides the derived transcription
pub const TRANSCRIPTION_PROPERTY: &str = "transcription";

#[derive(Debug, Clone, Default)]
pub struct TokenProjection {
    pub tokens: Vec<WordToken>,
    /// Distinct word types of this discourse with their occurrence counts
    pub words: Vec<WordRow>,
    /// Annotation type → distinct labels
    pub inventory: BTreeMap<String, BTreeSet<String>>,
}

/// Check a value against its registered attribute, then widen the range
fn observe(lexicon: &mut Lexicon, scope: AttributeScope, name: &str, value: &PropertyValue) -> ImportResult<()> {
    let attribute = lexicon.attribute_for_value(scope, name, value);
    attribute.check_value(name, value)?;
    attribute.update_range(Some(value));
    Ok(())
}

pub fn project_tokens(data: &DiscourseData, lexicon: &mut Lexicon) -> ImportResult<TokenProjection> {
    let base_levels = data.base_levels();
    let primary_base = base_levels.first().and_then(|b| data.get(b));

    let mut inventory: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for name in &base_levels {
        if let Some(tier) = data.get(name).filter(|t| !t.ignored) {
            inventory
                .entry(name.clone())
                .or_default()
                .extend(tier.iter().map(|e| e.label().to_string()));
        }
    }

    let mut tokens = Vec::new();
    let mut rows: BTreeMap<WordKey, WordRow> = BTreeMap::new();
    let mut counter = 0usize;

    for level in data.word_levels() {
        let tier = data.tier(&level)?;
        if tier.ignored {
            continue;
        }
        let spelling = tier.attribute.name.clone();

        for entry in tier.iter() {
            let owned;
            let annotation = match entry {
                TierEntry::Annotation(a) => a,
                TierEntry::Segment(s) => {
                    owned = Annotation::new(s.label.clone());
                    &owned
                }
            };
            observe(
                lexicon,
                AttributeScope::Type,
                &spelling,
                &PropertyValue::Text(annotation.label.clone()),
            )?;

            let mut token_properties = BTreeMap::new();
            let mut type_properties = BTreeMap::new();
            let mut explicit = BTreeMap::new();
            for (key, value) in &annotation.token_properties {
                let name = property_name(data, key);
                observe(lexicon, AttributeScope::Token, &name, value)?;
                token_properties.insert(name, value.clone());
            }
            for (key, value) in &annotation.type_properties {
                let name = property_name(data, key);
                observe(lexicon, AttributeScope::Type, &name, value)?;
                type_properties.insert(name.clone(), value.clone());
                if key != TRANSCRIPTION_PROPERTY {
                    explicit.insert(name, value.clone());
                }
            }

            let mut transcription: Option<String> = None;
            if let Some(value) = annotation.type_properties.get(TRANSCRIPTION_PROPERTY) {
                if let PropertyValue::Segments(segments) = value {
                    inventory
                        .entry(TRANSCRIPTION_PROPERTY.to_string())
                        .or_default()
                        .extend(segments.iter().map(|s| s.label.clone()));
                }
                transcription = Some(value.render());
            }

            let mut bounds: Option<(f64, f64)> = None;
            for reference in &annotation.references {
                let Some(target) = data.get(&reference.tier).filter(|t| t.base && !t.ignored) else {
                    continue;
                };
                let Some(slice) = target.slice(reference.begin, reference.end) else {
                    warn!(
                        "Word '{}' references {}..{} on tier '{}', which has {} entries",
                        annotation.label,
                        reference.begin,
                        reference.end,
                        target.name,
                        target.len()
                    );
                    continue;
                };
                let segments: Vec<Segment> = slice.iter().map(TierEntry::to_segment).collect();

                let begin = segments.iter().filter_map(|s| s.begin).reduce(f64::min);
                let end = segments.iter().filter_map(|s| s.end).reduce(f64::max);
                if let (Some(b), Some(e)) = (begin, end) {
                    bounds = Some(match bounds {
                        None => (b, e),
                        Some((pb, pe)) => (pb.min(b), pe.max(e)),
                    });
                }

                let is_primary = primary_base.is_some_and(|p| p.name == target.name);
                if transcription.is_none() && is_primary && !target.token {
                    let labels: Vec<String> = segments.iter().map(|s| s.label.clone()).collect();
                    inventory
                        .entry(TRANSCRIPTION_PROPERTY.to_string())
                        .or_default()
                        .extend(labels.iter().cloned());
                    transcription = Some(labels.join("."));
                }

                let name = target.attribute.name.clone();
                let value = PropertyValue::Segments(segments);
                if target.token {
                    observe(lexicon, AttributeScope::Token, &name, &value)?;
                    token_properties.insert(name, value);
                } else {
                    observe(lexicon, AttributeScope::Type, &name, &value)?;
                    type_properties.insert(name, value);
                }
            }

            let key = WordKey::new(annotation.label.clone(), transcription.unwrap_or_default());
            lexicon.get_or_create_word(key.clone(), &type_properties).frequency += 1;

            let (begin, end, timed) = match bounds {
                Some((b, e)) => (b, e, true),
                None => (counter as f64, (counter + 1) as f64, false),
            };
            tokens.push(WordToken {
                word: key.clone(),
                discourse: data.name.clone(),
                begin,
                end,
                timed,
                properties: token_properties,
            });
            counter += 1;

            rows.entry(key.clone())
                .or_insert_with(|| WordRow {
                    key,
                    frequency: 0,
                    properties: explicit,
                })
                .frequency += 1;
        }
    }

    Ok(TokenProjection {
        tokens,
        words: rows.into_values().collect(),
        inventory,
    })
}
