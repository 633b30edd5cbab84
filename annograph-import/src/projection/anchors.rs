//! Anchor derivation
//!
//! Timed discourses get one anchor per distinct segment boundary across all
//! base tiers. Untimed discourses index positions on the primary base tier
//! (the first base level), or on the first word level when there is no base
//! tier at all.

use crate::graph::{AnchorKey, AnchorNode};
use annograph_common::DiscourseData;
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone)]
enum AnchorMode {
    Timed { times: Vec<f64> },
    Indexed { primary: Option<String> },
}

#[derive(Debug, Clone)]
pub struct AnchorIndex {
    nodes: Vec<AnchorNode>,
    mode: AnchorMode,
}

impl AnchorIndex {
    pub fn build(data: &DiscourseData) -> Self {
        if data.is_timed() {
            Self::timed(data)
        } else {
            Self::indexed(data)
        }
    }

    fn timed(data: &DiscourseData) -> Self {
        let base_levels = data.base_levels();
        let mut times: Vec<f64> = Vec::new();
        for level in &base_levels {
            if let Some(tier) = data.get(level) {
                for entry in tier.iter() {
                    times.extend(entry.begin().filter(|t| !t.is_nan()));
                    times.extend(entry.end().filter(|t| !t.is_nan()));
                }
            }
        }
        times.sort_by(|a, b| a.total_cmp(b));
        times.dedup();

        let mut starts: HashMap<u64, String> = HashMap::new();
        if let Some(primary) = base_levels.first().and_then(|l| data.get(l)) {
            for entry in primary.iter() {
                if let Some(begin) = entry.begin() {
                    starts
                        .entry(begin.to_bits())
                        .or_insert_with(|| entry.label().to_string());
                }
            }
        }

        let nodes = times
            .iter()
            .enumerate()
            .map(|(i, t)| AnchorNode {
                id: i as u64,
                key: AnchorKey::Time(*t),
                label: starts.get(&t.to_bits()).cloned().unwrap_or_default(),
            })
            .collect();

        Self {
            nodes,
            mode: AnchorMode::Timed { times },
        }
    }

    fn indexed(data: &DiscourseData) -> Self {
        let primary = data
            .base_levels()
            .into_iter()
            .next()
            .or_else(|| data.word_levels().into_iter().next());
        let labels: Vec<String> = primary
            .as_deref()
            .and_then(|p| data.get(p))
            .map(|t| t.iter().map(|e| e.label().to_string()).collect())
            .unwrap_or_default();

        let nodes = (0..=labels.len())
            .map(|i| AnchorNode {
                id: i as u64,
                key: AnchorKey::Index(i as u64),
                label: labels.get(i).cloned().unwrap_or_default(),
            })
            .collect();

        Self {
            nodes,
            mode: AnchorMode::Indexed { primary },
        }
    }

    pub fn is_timed(&self) -> bool {
        matches!(self.mode, AnchorMode::Timed { .. })
    }

    /// Tier whose positions are the anchors of an untimed discourse
    pub fn primary(&self) -> Option<&str> {
        match &self.mode {
            AnchorMode::Indexed { primary } => primary.as_deref(),
            AnchorMode::Timed { .. } => None,
        }
    }

    pub fn at_time(&self, time: f64) -> Option<u64> {
        let AnchorMode::Timed { times } = &self.mode else {
            return None;
        };
        times
            .binary_search_by(|t| t.partial_cmp(&time).unwrap_or(Ordering::Less))
            .ok()
            .map(|i| i as u64)
    }

    pub fn at_index(&self, index: usize) -> Option<u64> {
        match self.mode {
            AnchorMode::Indexed { .. } if index < self.nodes.len() => Some(index as u64),
            _ => None,
        }
    }

    pub fn nodes(&self) -> &[AnchorNode] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<AnchorNode> {
        self.nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annograph_common::{AnnotationType, Segment};

    #[test]
    fn test_untimed_anchors_follow_primary_base_tier() {
        let mut phone = AnnotationType::new("phone").base();
        phone.add(["k", "æ", "t"].map(Segment::new), true);
        let data = DiscourseData::new("d", [AnnotationType::new("word").anchor(), phone]);

        let anchors = AnchorIndex::build(&data);
        assert!(!anchors.is_timed());
        assert_eq!(anchors.primary(), Some("phone"));
        assert_eq!(anchors.nodes().len(), 4);
        assert_eq!(anchors.nodes()[0].label, "k");
        assert_eq!(anchors.nodes()[3].label, "");
        assert_eq!(anchors.at_index(3), Some(3));
        assert_eq!(anchors.at_index(4), None);
    }

    #[test]
    fn test_timed_anchors_merge_boundaries_across_base_tiers() {
        let mut phone = AnnotationType::new("phone").base();
        phone.add(
            [Segment::timed("k", 0.0, 0.1), Segment::timed("æ", 0.1, 0.25)],
            true,
        );
        let mut tone = AnnotationType::new("tone").base();
        tone.add([Segment::timed("H", 0.05, 0.25)], true);
        let data = DiscourseData::new("d", [phone, tone]);

        let anchors = AnchorIndex::build(&data);
        assert!(anchors.is_timed());
        let times: Vec<f64> = anchors.nodes().iter().map(|a| a.key.as_f64()).collect();
        assert_eq!(times, vec![0.0, 0.05, 0.1, 0.25]);
        assert_eq!(anchors.at_time(0.1), Some(2));
        assert_eq!(anchors.at_time(0.3), None);
        assert_eq!(anchors.nodes()[2].label, "æ");
        assert_eq!(anchors.nodes()[1].label, "");
    }

    #[test]
    fn test_no_base_tier_indexes_words() {
        let mut word = AnnotationType::new("word").anchor();
        word.add([Segment::new("cat"), Segment::new("dog")], true);
        let data = DiscourseData::new("d", [word]);

        let anchors = AnchorIndex::build(&data);
        assert_eq!(anchors.primary(), Some("word"));
        assert_eq!(anchors.nodes().len(), 3);
    }
}
