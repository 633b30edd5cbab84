//! Corpus lexicon: word types, frequencies and the attribute registry
//!
//! Projection works on a clone and the corpus context swaps it in only after
//! both stores accepted the discourse, so a failed import leaves no trace here.

use annograph_common::{Attribute, AttributeType, PropertyValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Natural key of a word type
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WordKey {
    pub orthography: String,
    pub transcription: String,
}

impl WordKey {
    pub fn new(orthography: impl Into<String>, transcription: impl Into<String>) -> Self {
        Self {
            orthography: orthography.into(),
            transcription: transcription.into(),
        }
    }
}

/// Lexicon entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexicalWord {
    pub key: WordKey,
    pub frequency: u64,
    /// Type properties, first value wins
    pub properties: BTreeMap<String, PropertyValue>,
}

/// One occurrence of a word in a discourse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordToken {
    pub word: WordKey,
    pub discourse: String,
    pub begin: f64,
    pub end: f64,
    /// True when `begin`/`end` are times rather than positions
    pub timed: bool,
    pub properties: BTreeMap<String, PropertyValue>,
}

/// Which registry an attribute lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeScope {
    /// Varies per occurrence; registered on the discourse side
    Token,
    /// Constant per word type; registered on the lexicon side
    Type,
}

/// Word types seen this session plus the token and type attribute registries
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    words: BTreeMap<WordKey, LexicalWord>,
    token_attributes: BTreeMap<String, Attribute>,
    type_attributes: BTreeMap<String, Attribute>,
}

impl Lexicon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up or insert a word; type properties fill in keys not seen before
    pub fn get_or_create_word(
        &mut self,
        key: WordKey,
        properties: &BTreeMap<String, PropertyValue>,
    ) -> &mut LexicalWord {
        let word = self.words.entry(key.clone()).or_insert_with(|| LexicalWord {
            key,
            frequency: 0,
            properties: BTreeMap::new(),
        });
        for (name, value) in properties {
            word.properties
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        word
    }

    pub fn get(&self, key: &WordKey) -> Option<&LexicalWord> {
        self.words.get(key)
    }

    pub fn find(&self, orthography: &str) -> Vec<&LexicalWord> {
        self.words
            .values()
            .filter(|w| w.key.orthography == orthography)
            .collect()
    }

    pub fn words(&self) -> impl Iterator<Item = &LexicalWord> {
        self.words.values()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    fn registry_mut(&mut self, scope: AttributeScope) -> &mut BTreeMap<String, Attribute> {
        match scope {
            AttributeScope::Token => &mut self.token_attributes,
            AttributeScope::Type => &mut self.type_attributes,
        }
    }

    /// Register an attribute unless one with that name already exists in scope
    pub fn register_attribute(&mut self, scope: AttributeScope, attribute: Attribute) {
        self.registry_mut(scope)
            .entry(attribute.name.clone())
            .or_insert(attribute);
    }

    pub fn attribute(&self, scope: AttributeScope, name: &str) -> Option<&Attribute> {
        match scope {
            AttributeScope::Token => self.token_attributes.get(name),
            AttributeScope::Type => self.type_attributes.get(name),
        }
    }

    /// Registered attribute, created from the first value seen when absent
    pub fn attribute_for_value(
        &mut self,
        scope: AttributeScope,
        name: &str,
        value: &PropertyValue,
    ) -> &mut Attribute {
        self.registry_mut(scope)
            .entry(name.to_string())
            .or_insert_with(|| {
                let att_type = match value {
                    PropertyValue::Numeric(_) => AttributeType::Numeric,
                    PropertyValue::Segments(_) => AttributeType::Tier,
                    PropertyValue::Text(_) | PropertyValue::Interval { .. } => AttributeType::Spelling,
                };
                Attribute::new(name, att_type, None, None)
            })
    }

    pub fn token_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.token_attributes.values()
    }

    pub fn type_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.type_attributes.values()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_word_keeps_first_property() {
        let mut lexicon = Lexicon::new();
        let mut props = BTreeMap::new();
        props.insert("freq".to_string(), PropertyValue::Numeric(3.0));

        lexicon.get_or_create_word(WordKey::new("cat", "k.æ.t"), &props).frequency += 1;
        props.insert("freq".to_string(), PropertyValue::Numeric(9.0));
        lexicon.get_or_create_word(WordKey::new("cat", "k.æ.t"), &props).frequency += 1;

        let word = lexicon.get(&WordKey::new("cat", "k.æ.t")).unwrap();
        assert_eq!(word.frequency, 2);
        assert_eq!(word.properties["freq"], PropertyValue::Numeric(3.0));
        assert_eq!(lexicon.len(), 1);
    }

    #[test]
    fn test_homographs_are_distinct_words() {
        let mut lexicon = Lexicon::new();
        lexicon.get_or_create_word(WordKey::new("read", "r.iː.d"), &BTreeMap::new());
        lexicon.get_or_create_word(WordKey::new("read", "r.ɛ.d"), &BTreeMap::new());
        assert_eq!(lexicon.find("read").len(), 2);
    }

    #[test]
    fn test_attribute_for_value_infers_kind_once() {
        let mut lexicon = Lexicon::new();
        let attr = lexicon.attribute_for_value(AttributeScope::Type, "freq", &PropertyValue::Numeric(1.0));
        assert_eq!(attr.att_type(), AttributeType::Numeric);

        let again = lexicon.attribute_for_value(AttributeScope::Type, "freq", &PropertyValue::from("x"));
        assert_eq!(again.att_type(), AttributeType::Numeric);
        assert!(lexicon.attribute(AttributeScope::Token, "freq").is_none());
    }
}
