// ============================================================
// Layer 3 - Labeled Samples and Class Buckets
// ============================================================
// A LabeledSample is one sentence with its integer class.
// ClassBuckets groups samples by class, in a fixed class order.
//
// Classes are declared up front. Pushing a sample for a label
// that was never declared is an error rather than a silent new
// bucket, so every importer produces the same class schema.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// One labeled sentence. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabeledSample {
    pub sentence: String,
    pub label:    i64,
}

impl LabeledSample {
    pub fn new(sentence: impl Into<String>, label: i64) -> Self {
        Self { sentence: sentence.into(), label }
    }
}

/// Ordered map from class label to that class's samples.
///
/// Iteration follows declaration order, which is also the order
/// classes are concatenated in every split.
#[derive(Debug, Clone, Default)]
pub struct ClassBuckets {
    buckets: IndexMap<i64, Vec<LabeledSample>>,
}

impl ClassBuckets {
    /// Create buckets for the given classes, all empty.
    pub fn with_classes(labels: impl IntoIterator<Item = i64>) -> Self {
        let mut buckets = IndexMap::new();
        for label in labels {
            buckets.entry(label).or_insert_with(Vec::new);
        }
        Self { buckets }
    }

    /// Declare one more class. Declaring an existing class is a no-op.
    pub fn declare(&mut self, label: i64) {
        self.buckets.entry(label).or_insert_with(Vec::new);
    }

    /// Append a sample to its class bucket.
    pub fn push(&mut self, sample: LabeledSample) -> Result<(), DataError> {
        match self.buckets.get_mut(&sample.label) {
            Some(bucket) => {
                bucket.push(sample);
                Ok(())
            }
            None => Err(DataError::UndeclaredClass(sample.label)),
        }
    }

    /// Append many samples; stops at the first undeclared label.
    pub fn extend(
        &mut self,
        samples: impl IntoIterator<Item = LabeledSample>,
    ) -> Result<(), DataError> {
        for sample in samples {
            self.push(sample)?;
        }
        Ok(())
    }

    pub fn get(&self, label: i64) -> Option<&[LabeledSample]> {
        self.buckets.get(&label).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &[LabeledSample])> {
        self.buckets.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (i64, &mut Vec<LabeledSample>)> {
        self.buckets.iter_mut().map(|(k, v)| (*k, v))
    }

    pub fn labels(&self) -> impl Iterator<Item = i64> + '_ {
        self.buckets.keys().copied()
    }

    pub fn num_classes(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Sample count per class, in class order.
    pub fn sizes(&self) -> IndexMap<i64, usize> {
        self.buckets.iter().map(|(k, v)| (*k, v.len())).collect()
    }

    pub fn total(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Classes that were declared but never received a sample.
    pub fn empty_classes(&self) -> Vec<i64> {
        self.buckets
            .iter()
            .filter(|(_, v)| v.is_empty())
            .map(|(k, _)| *k)
            .collect()
    }
}
