//! Transcription tokenizer
//!
//! Turns one raw tier string into [`Segment`]s according to the tier's
//! configuration. Segmentation priority:
//!
//! 1. morpheme delimiters (outermost; nothing crosses a morpheme boundary)
//! 2. ignored characters are stripped
//! 3. explicit delimiter, else digraph pattern, else digit runs / single characters
//! 4. stress or tone digits move off the label onto the segment

use crate::annotation::Segment;
use crate::tier::{AnnotationType, NumberBehavior};
use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static DEFAULT_TOKENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+|\S").expect("static pattern is valid"));

/// Tokenize `input` under `tier`'s segmentation settings.
///
/// Empty input yields no segments. Errors are limited to malformed tier
/// configuration and a digit-only token with no preceding segment to attach to
/// under a stress/tone policy.
pub fn parse_transcription(input: &str, tier: &AnnotationType) -> Result<Vec<Segment>> {
    tier.validate()?;

    let morph_delimiters: Vec<&String> = tier
        .morph_delimiters
        .iter()
        .filter(|d| input.contains(d.as_str()))
        .collect();
    if !morph_delimiters.is_empty() {
        let mut all: Vec<&String> = tier.morph_delimiters.iter().collect();
        all.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        let pattern = all
            .iter()
            .map(|d| regex::escape(d))
            .collect::<Vec<_>>()
            .join("|");
        let splitter = Regex::new(&pattern).map_err(|e| {
            Error::Config(format!("Tier '{}' has invalid morpheme delimiters: {}", tier.name, e))
        })?;

        let mut transcription = Vec::new();
        for (i, morph) in splitter.split(input).enumerate() {
            for mut segment in tokenize_morph(morph, tier)? {
                segment.group = Some(i);
                transcription.push(segment);
            }
        }
        return Ok(transcription);
    }

    tokenize_morph(input, tier)
}

fn tokenize_morph(input: &str, tier: &AnnotationType) -> Result<Vec<Segment>> {
    let stripped: String = if tier.ignored_characters.is_empty() {
        input.to_string()
    } else {
        input
            .chars()
            .filter(|c| !tier.ignored_characters.contains(c))
            .collect()
    };

    let tokens: Vec<&str> = if let Some(delimiter) = tier.delimiter.as_deref() {
        stripped.split(delimiter).collect()
    } else if let Some(pattern) = tier.digraph_pattern()? {
        pattern.find_iter(&stripped).map(|m| m.as_str()).collect()
    } else {
        DEFAULT_TOKENS.find_iter(&stripped).map(|m| m.as_str()).collect()
    };

    let mut segments: Vec<Segment> = Vec::with_capacity(tokens.len());
    for token in tokens {
        if token.is_empty() {
            continue;
        }

        let Some(behavior) = tier.number_behavior else {
            segments.push(Segment::new(token));
            continue;
        };

        let digits: String = token.chars().filter(|c| c.is_ascii_digit()).collect();
        let label: String = token.chars().filter(|c| !c.is_ascii_digit()).collect();
        let number = if digits.is_empty() { None } else { Some(digits) };

        if label.is_empty() {
            let Some(previous) = segments.last_mut() else {
                return Err(Error::Tokenization {
                    tier: tier.name.clone(),
                    reason: format!(
                        "'{}' is a bare {} marker with no preceding segment",
                        token,
                        behavior.as_str()
                    ),
                });
            };
            set_number(previous, behavior, number);
            continue;
        }

        let mut segment = Segment::new(label);
        if number.is_some() {
            set_number(&mut segment, behavior, number);
        }
        segments.push(segment);
    }

    Ok(segments)
}

fn set_number(segment: &mut Segment, behavior: NumberBehavior, number: Option<String>) {
    match behavior {
        NumberBehavior::Stress => segment.stress = number,
        NumberBehavior::Tone => segment.tone = number,
    }
}
