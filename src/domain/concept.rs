// ============================================================
// Layer 3 - Concept Map
// ============================================================
// The global interpretation vocabulary: concept index → text.
// Loaded once and shared read-only by every interpretation call.
//
// On disk it is a JSON object with string keys:
//   { "0": "the cat", "1": "ran fast" }

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::DataError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct ConceptMap {
    concepts: BTreeMap<usize, String>,
}

impl ConceptMap {
    /// Build a dense map, indices 0..n in the given order.
    pub fn from_texts(texts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            concepts: texts.into_iter().map(Into::into).enumerate().collect(),
        }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.concepts.get(&index).map(String::as_str)
    }

    /// Like `get`, but a missing index is an error.
    pub fn lookup(&self, index: usize) -> Result<&str, DataError> {
        self.get(index).ok_or(DataError::UnknownConcept(index))
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.concepts.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Concept texts in index order. The model's concept store has one
    /// row per index, so the indices must be exactly 0..len.
    pub fn dense_texts(&self) -> Result<Vec<&str>, DataError> {
        for (expected, index) in self.concepts.keys().enumerate() {
            if *index != expected {
                return Err(DataError::UnknownConcept(expected));
            }
        }
        Ok(self.concepts.values().map(String::as_str).collect())
    }
}

impl FromIterator<(usize, String)> for ConceptMap {
    fn from_iter<I: IntoIterator<Item = (usize, String)>>(iter: I) -> Self {
        Self { concepts: iter.into_iter().collect() }
    }
}

impl TryFrom<BTreeMap<String, String>> for ConceptMap {
    type Error = DataError;

    fn try_from(raw: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        raw.into_iter()
            .map(|(key, text)| {
                key.trim()
                    .parse::<usize>()
                    .map(|index| (index, text))
                    .map_err(|_| DataError::Malformed {
                        source_name: "concept map".into(),
                        reason:      format!("key '{key}' is not a non-negative integer"),
                    })
            })
            .collect()
    }
}

impl From<ConceptMap> for BTreeMap<String, String> {
    fn from(map: ConceptMap) -> Self {
        map.concepts
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }
}
