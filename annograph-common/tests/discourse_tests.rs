//! Discourse-level behavior: speaker merging and transcription parsing

use annograph_common::{parse_transcription, Annotation, AnnotationType, DiscourseData, NumberBehavior, Segment, TierEntry};

/// Two speakers, each with a word tier over a base phone tier
fn two_speakers() -> DiscourseData {
    let mut tiers = Vec::new();
    for (speaker, words) in [("A", vec![("cat", 3), ("dog", 3)]), ("B", vec![("a", 1), ("bee", 2)])] {
        let mut word = AnnotationType::new(format!("{} - word", speaker))
            .anchor()
            .with_speaker(speaker);
        let mut phone = AnnotationType::new(format!("{} - phone", speaker))
            .base()
            .with_supertype(format!("{} - word", speaker))
            .with_speaker(speaker);

        let mut at = 0;
        for (label, len) in words {
            word.add(
                [Annotation::new(label).with_reference(format!("{} - phone", speaker), at, at + len)],
                true,
            );
            phone.add(
                label.chars().take(len).map(|c| Segment::new(c.to_string())),
                true,
            );
            at += len;
        }
        tiers.push(word);
        tiers.push(phone);
    }
    DiscourseData::new("conversation", tiers)
}

#[test]
fn test_collapse_merges_by_output_name() {
    let mut data = two_speakers();
    data.collapse_speakers().unwrap();

    let names: Vec<&str> = data.names().collect();
    assert_eq!(names, vec!["word", "phone"]);
    assert_eq!(data.level_length("word").unwrap(), 4);
    assert_eq!(data.level_length("phone").unwrap(), 9);
    assert_eq!(data.get("phone").unwrap().supertype.as_deref(), Some("word"));
    assert!(!data.has_speakers());
}

#[test]
fn test_collapse_shifts_references_into_merged_base_tier() {
    let mut data = two_speakers();
    data.collapse_speakers().unwrap();

    let word = data.get("word").unwrap();
    let phone_len = data.level_length("phone").unwrap();
    let references: Vec<(usize, usize)> = word
        .iter()
        .filter_map(TierEntry::as_annotation)
        .map(|a| a.reference("phone").expect("renamed reference"))
        .collect();

    assert_eq!(references, vec![(0, 3), (3, 6), (6, 7), (7, 9)]);
    assert!(references.iter().all(|&(b, e)| b < e && e <= phone_len));

    // the shifted interval still covers the same segments
    let phone = data.get("phone").unwrap();
    let bee: Vec<&str> = phone.slice(7, 9).unwrap().iter().map(|e| e.label()).collect();
    assert_eq!(bee, vec!["b", "e"]);
}

#[test]
fn test_collapsed_discourse_orders_cleanly() {
    let mut data = two_speakers();
    data.collapse_speakers().unwrap();
    assert_eq!(data.process_order().unwrap(), vec!["word"]);
    assert_eq!(data.word_levels(), vec!["word"]);
    assert_eq!(data.base_levels(), vec!["phone"]);
}

/// Label, stress and tone of each segment
fn shape(segments: &[Segment]) -> Vec<(String, Option<String>, Option<String>)> {
    segments
        .iter()
        .map(|s| (s.label.clone(), s.stress.clone(), s.tone.clone()))
        .collect()
}

/// Segments written back out the way the tier expects to read them
fn render(segments: &[Segment], tier: &AnnotationType) -> String {
    segments
        .iter()
        .map(|s| {
            format!(
                "{}{}{}",
                s.label,
                s.stress.as_deref().unwrap_or(""),
                s.tone.as_deref().unwrap_or("")
            )
        })
        .collect::<Vec<_>>()
        .join(tier.delimiter.as_deref().unwrap_or(""))
}

#[test]
fn test_retokenizing_rendered_output_is_stable() {
    let cases = [
        (AnnotationType::new("phone").base().with_delimiter("."), "k..æ.t."),
        (AnnotationType::new("phone").base().with_delimiter("."), ".d.ɒ..g"),
        (AnnotationType::new("phone").base().with_digraphs(["ts", "t", "tʃ"]), "tsatʃt a"),
        (
            AnnotationType::new("phone")
                .base()
                .with_delimiter(".")
                .with_number_behavior(NumberBehavior::Stress),
            "K.AE1..T.",
        ),
        (
            AnnotationType::new("tone").base().with_number_behavior(NumberBehavior::Tone),
            "ma35 ta 2",
        ),
        (AnnotationType::new("phone").base(), "ka12 t"),
    ];

    for (tier, input) in &cases {
        let first = parse_transcription(input, tier).unwrap();
        assert!(!first.is_empty(), "{input}");
        let second = parse_transcription(&render(&first, tier), tier).unwrap();
        assert_eq!(shape(&second), shape(&first), "{input}");
    }
}

#[test]
fn test_parsed_segments_populate_a_tier() {
    let tier_config = AnnotationType::new("transcription").base().with_digraphs(["tʃ"]);
    let segments = parse_transcription("tʃɪp", &tier_config).unwrap();
    assert_eq!(segments, vec!["tʃ", "ɪ", "p"]);

    let mut data = DiscourseData::new("d", [tier_config]);
    data.add_annotations("transcription", segments).unwrap();
    assert_eq!(data.level_length("transcription").unwrap(), 3);
    assert!(!data.is_timed());
}
