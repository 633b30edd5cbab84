//! Span construction
//!
//! Every tier entry becomes one span between two anchors. Extents resolve from:
//! - segment times, on timed discourses
//! - positions on the primary base tier, on untimed ones
//! - references into base tiers or into tiers already projected
//!
//! Tiers are visited in process order, then base tiers. Entries whose
//! references point at entries not yet placed are deferred and retried until a
//! pass places nothing more; what still cannot resolve is dropped with a
//! warning.

use super::{property_name, AnchorIndex};
use crate::graph::{property_to_json, SpanEdge, TypeKey, TypeNode, WORD_TYPE};
use annograph_common::{AnnotationType, DiscourseData, Reference, TierEntry};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};
use uuid::Uuid;

/// Begin and end anchor ids
type Extent = (u64, u64);

enum Resolution {
    Resolved(Extent),
    Pending,
    Unresolvable,
}

/// Output of the span pass
#[derive(Debug, Clone, Default)]
pub struct SpanProjection {
    pub spans: Vec<SpanEdge>,
    pub types: Vec<TypeNode>,
    pub hierarchy: BTreeMap<String, Option<String>>,
    pub token_properties: BTreeSet<String>,
    pub type_properties: BTreeSet<String>,
    /// Entries dropped per tier
    pub dropped: BTreeMap<String, usize>,
}

pub struct SpanBuilder<'a> {
    data: &'a DiscourseData,
    anchors: &'a AnchorIndex,
    word_level: Option<String>,
    /// Tier → extent of each entry, once projected
    placed: HashMap<String, Vec<Option<Extent>>>,
    /// Base tier → extent of the word containing each segment
    word_extents: HashMap<String, Vec<Option<Extent>>>,
    spans: Vec<SpanEdge>,
    /// Source tier of each span
    sources: Vec<String>,
    types: BTreeMap<TypeKey, TypeNode>,
    token_properties: BTreeSet<String>,
    type_properties: BTreeSet<String>,
}

impl<'a> SpanBuilder<'a> {
    pub fn new(data: &'a DiscourseData, anchors: &'a AnchorIndex) -> Self {
        Self {
            data,
            anchors,
            word_level: data.word_levels().into_iter().next(),
            placed: HashMap::new(),
            word_extents: HashMap::new(),
            spans: Vec::new(),
            sources: Vec::new(),
            types: BTreeMap::new(),
            token_properties: BTreeSet::new(),
            type_properties: BTreeSet::new(),
        }
    }

    /// Graph type name of a tier
    pub fn graph_type(&self, tier: &str) -> String {
        if self.word_level.as_deref() == Some(tier) {
            WORD_TYPE.to_string()
        } else {
            tier.to_string()
        }
    }

    fn supertype_type(&self, tier: &AnnotationType) -> Option<String> {
        let sup = tier.supertype.as_deref()?;
        match self.data.get(sup) {
            Some(s) if s.anchor => Some(WORD_TYPE.to_string()),
            _ => Some(self.graph_type(sup)),
        }
    }

    pub fn build(mut self, order: &[String]) -> SpanProjection {
        let data = self.data;
        let mut deferred: Vec<(String, usize)> = Vec::new();
        let mut dropped: BTreeMap<String, usize> = BTreeMap::new();
        let word_levels = data.word_levels();

        for name in order {
            let Some(tier) = data.get(name).filter(|t| !t.ignored) else {
                continue;
            };
            let mut extents = vec![None; tier.len()];
            for (i, entry) in tier.iter().enumerate() {
                match self.resolve_entry(tier, i, entry, false) {
                    Resolution::Resolved(extent) => {
                        self.push_span(tier, entry, extent);
                        extents[i] = Some(extent);
                    }
                    Resolution::Pending => deferred.push((name.clone(), i)),
                    Resolution::Unresolvable => *dropped.entry(name.clone()).or_insert(0) += 1,
                }
            }
            if word_levels.contains(name) {
                self.record_word_extents(tier, &extents);
            }
            self.placed.insert(name.clone(), extents);
        }

        for name in data.base_levels() {
            let Some(tier) = data.get(&name).filter(|t| !t.ignored) else {
                continue;
            };
            let mut extents = vec![None; tier.len()];
            for (i, entry) in tier.iter().enumerate() {
                match self.base_extent(tier, i) {
                    Some(extent) => {
                        self.push_span(tier, entry, extent);
                        extents[i] = Some(extent);
                    }
                    None => *dropped.entry(name.clone()).or_insert(0) += 1,
                }
            }
            self.placed.insert(name, extents);
        }

        // a deferred entry may wait on another deferred entry, so passes repeat
        // until one places nothing; the last pass treats pending as unresolvable
        let mut final_pass = false;
        while !deferred.is_empty() {
            let mut waiting = Vec::with_capacity(deferred.len());
            let mut progressed = false;
            for (name, i) in deferred {
                let Some(tier) = data.get(&name) else {
                    continue;
                };
                let Some(entry) = tier.get(i) else {
                    continue;
                };
                match self.resolve_entry(tier, i, entry, final_pass) {
                    Resolution::Resolved(extent) => {
                        self.push_span(tier, entry, extent);
                        if let Some(slot) = self.placed.get_mut(&name).and_then(|e| e.get_mut(i)) {
                            *slot = Some(extent);
                        }
                        progressed = true;
                    }
                    Resolution::Pending => waiting.push((name, i)),
                    Resolution::Unresolvable => *dropped.entry(name).or_insert(0) += 1,
                }
            }
            if final_pass {
                for (name, _) in waiting {
                    *dropped.entry(name).or_insert(0) += 1;
                }
                break;
            }
            final_pass = !progressed;
            deferred = waiting;
        }

        for (tier, count) in &dropped {
            warn!(
                "Dropped {} entries of tier '{}' in discourse '{}': no resolvable extent",
                count, tier, data.name
            );
        }

        self.link_parents();

        let mut hierarchy = BTreeMap::new();
        for tier in data.tiers() {
            if tier.ignored || (!tier.base && !order.contains(&tier.name)) {
                continue;
            }
            hierarchy.insert(self.graph_type(&tier.name), self.supertype_type(tier));
        }

        debug!(
            "Projected {} spans and {} type nodes for discourse '{}'",
            self.spans.len(),
            self.types.len(),
            data.name
        );

        SpanProjection {
            spans: self.spans,
            types: self.types.into_values().collect(),
            hierarchy,
            token_properties: self.token_properties,
            type_properties: self.type_properties,
            dropped,
        }
    }

    fn resolve_entry(&self, tier: &AnnotationType, index: usize, entry: &TierEntry, final_pass: bool) -> Resolution {
        let on_primary = self.anchors.primary() == Some(tier.name.as_str());
        let positional = || {
            if on_primary {
                self.anchors
                    .at_index(index)
                    .zip(self.anchors.at_index(index + 1))
                    .map_or(Resolution::Unresolvable, Resolution::Resolved)
            } else {
                Resolution::Unresolvable
            }
        };

        match entry {
            TierEntry::Segment(segment) => match (segment.begin, segment.end) {
                (Some(b), Some(e)) if self.anchors.is_timed() => self
                    .anchors
                    .at_time(b)
                    .zip(self.anchors.at_time(e))
                    .map_or(Resolution::Unresolvable, Resolution::Resolved),
                _ => positional(),
            },
            TierEntry::Annotation(annotation) if annotation.references.is_empty() => positional(),
            TierEntry::Annotation(annotation) => {
                let mut extent: Option<Extent> = None;
                let mut pending = false;
                for reference in &annotation.references {
                    match self.resolve_reference(reference, final_pass) {
                        Resolution::Resolved((b, e)) => {
                            extent = Some(match extent {
                                None => (b, e),
                                Some((pb, pe)) => (pb.min(b), pe.max(e)),
                            });
                        }
                        Resolution::Pending => pending = true,
                        Resolution::Unresolvable => {}
                    }
                }
                match (extent, pending) {
                    (Some(extent), _) => Resolution::Resolved(extent),
                    (None, true) => Resolution::Pending,
                    (None, false) => Resolution::Unresolvable,
                }
            }
        }
    }

    fn resolve_reference(&self, reference: &Reference, final_pass: bool) -> Resolution {
        let Some(target) = self.data.get(&reference.tier) else {
            return Resolution::Unresolvable;
        };
        if reference.is_empty() || reference.end > target.len() {
            return Resolution::Unresolvable;
        }

        if target.base {
            return match (
                self.base_extent(target, reference.begin),
                self.base_extent(target, reference.end - 1),
            ) {
                (Some((b, _)), Some((_, e))) => Resolution::Resolved((b, e)),
                _ => Resolution::Unresolvable,
            };
        }

        let Some(extents) = self.placed.get(&reference.tier) else {
            return if final_pass {
                Resolution::Unresolvable
            } else {
                Resolution::Pending
            };
        };
        let mut extent: Option<Extent> = None;
        for slot in &extents[reference.begin..reference.end] {
            match slot {
                Some((b, e)) => {
                    extent = Some(match extent {
                        None => (*b, *e),
                        Some((pb, pe)) => (pb.min(*b), pe.max(*e)),
                    });
                }
                None if final_pass => return Resolution::Unresolvable,
                None => return Resolution::Pending,
            }
        }
        extent.map_or(Resolution::Unresolvable, Resolution::Resolved)
    }

    fn base_extent(&self, tier: &AnnotationType, index: usize) -> Option<Extent> {
        let entry = tier.get(index)?;
        if self.anchors.is_timed() {
            if let (Some(b), Some(e)) = (entry.begin(), entry.end()) {
                return self.anchors.at_time(b).zip(self.anchors.at_time(e));
            }
        }
        if self.anchors.primary() == Some(tier.name.as_str()) {
            return self.anchors.at_index(index).zip(self.anchors.at_index(index + 1));
        }
        self.word_extents.get(&tier.name)?.get(index).copied().flatten()
    }

    /// Remember which word contains each base segment it references
    fn record_word_extents(&mut self, tier: &AnnotationType, extents: &[Option<Extent>]) {
        for (entry, extent) in tier.iter().zip(extents) {
            let (Some(annotation), Some(extent)) = (entry.as_annotation(), extent) else {
                continue;
            };
            for reference in &annotation.references {
                let Some(target) = self.data.get(&reference.tier) else {
                    continue;
                };
                if !target.base {
                    continue;
                }
                let slots = self
                    .word_extents
                    .entry(reference.tier.clone())
                    .or_insert_with(|| vec![None; target.len()]);
                for slot in slots.iter_mut().take(reference.end).skip(reference.begin) {
                    slot.get_or_insert(*extent);
                }
            }
        }
    }

    fn push_span(&mut self, tier: &AnnotationType, entry: &TierEntry, (begin, end): Extent) {
        let annotation_type = self.graph_type(&tier.name);
        let is_word = annotation_type == WORD_TYPE;

        let mut properties = BTreeMap::new();
        let mut type_properties = BTreeMap::new();
        match entry {
            TierEntry::Segment(segment) => {
                if let Some(stress) = &segment.stress {
                    properties.insert("stress".to_string(), serde_json::Value::String(stress.clone()));
                }
                if let Some(tone) = &segment.tone {
                    properties.insert("tone".to_string(), serde_json::Value::String(tone.clone()));
                }
            }
            TierEntry::Annotation(annotation) => {
                for (key, value) in &annotation.token_properties {
                    let name = property_name(self.data, key);
                    if is_word {
                        self.token_properties.insert(name.clone());
                    }
                    properties.insert(name, property_to_json(value));
                }
                for (key, value) in &annotation.type_properties {
                    let name = property_name(self.data, key);
                    if is_word {
                        self.type_properties.insert(name.clone());
                    }
                    type_properties.insert(name, property_to_json(value));
                }
            }
        }

        let type_node = TypeNode::new(annotation_type.clone(), entry.label(), type_properties);
        let type_key = type_node.key.clone();
        self.types.entry(type_key.clone()).or_insert(type_node);

        self.spans.push(SpanEdge {
            id: Uuid::new_v4(),
            annotation_type,
            label: entry.label().to_string(),
            begin,
            end,
            properties,
            type_key,
            parent: None,
        });
        self.sources.push(tier.name.clone());
    }

    /// Link each span to the first span of its supertype tier that contains it
    fn link_parents(&mut self) {
        let mut by_tier: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, source) in self.sources.iter().enumerate() {
            by_tier.entry(source.as_str()).or_default().push(i);
        }
        for indices in by_tier.values_mut() {
            indices.sort_by_key(|&i| (self.spans[i].begin, self.spans[i].end));
        }

        let mut links: Vec<(usize, Uuid)> = Vec::new();
        for (i, source) in self.sources.iter().enumerate() {
            let Some(sup) = self.data.get(source).and_then(|t| t.supertype.as_deref()) else {
                continue;
            };
            let Some(candidates) = by_tier.get(sup) else {
                continue;
            };
            let span = &self.spans[i];
            let upper = candidates.partition_point(|&p| self.spans[p].begin <= span.begin);
            let parent = candidates[..upper]
                .iter()
                .rev()
                .map(|&p| &self.spans[p])
                .find(|p| p.end >= span.end);
            if let Some(parent) = parent {
                links.push((i, parent.id));
            }
        }

        for (i, parent) in links {
            self.spans[i].parent = Some(parent);
        }
    }
}
