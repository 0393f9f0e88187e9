use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::domain::parse_tree::ParsedSample;
use crate::error::DataError;

/// One tokenised, padded sample with its phrase spans.
/// Sequence format: [CLS] tokens... [PAD]...
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeSample {
    pub input_ids: Vec<u32>,
    /// Half-open token ranges, root first, clipped to the sequence.
    pub phrases:   Vec<(usize, usize)>,
    pub label:     i64,
}

impl SeSample {
    /// Pad/truncate to `max_seq_len` and keep at most `max_phrases`
    /// phrases. A record without token ids cannot be fed to the model.
    pub fn from_parsed(
        parsed:      &ParsedSample,
        max_seq_len: usize,
        max_phrases: usize,
    ) -> Result<Self, DataError> {
        if parsed.input_ids.is_empty() {
            return Err(DataError::Malformed {
                source_name: format!("parsed sample '{}'", parsed.sentence),
                reason:      "no input_ids (re-run parse-trees)".to_string(),
            });
        }

        let mut input_ids = parsed.input_ids.clone();
        input_ids.truncate(max_seq_len);
        input_ids.resize(max_seq_len, 0);

        let phrases = parsed
            .parse_tree
            .iter()
            .take(max_phrases)
            .map(|node| (node.start.min(max_seq_len), node.end.min(max_seq_len)))
            .collect();

        Ok(Self { input_ids, phrases, label: parsed.label })
    }

    /// Index of the label as a class, checked against `num_classes`.
    pub fn class_index(&self, num_classes: usize) -> Result<usize, DataError> {
        usize::try_from(self.label)
            .ok()
            .filter(|&c| c < num_classes)
            .ok_or(DataError::LabelOutOfRange { label: self.label, num_classes })
    }
}

pub struct SeDataset {
    samples: Vec<SeSample>,
}

impl SeDataset {
    pub fn new(samples: Vec<SeSample>) -> Self { Self { samples } }

    /// Convert parsed records, failing on the first unusable one.
    pub fn from_parsed(
        parsed:      &[ParsedSample],
        max_seq_len: usize,
        max_phrases: usize,
    ) -> Result<Self, DataError> {
        let samples = parsed
            .iter()
            .map(|p| SeSample::from_parsed(p, max_seq_len, max_phrases))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(samples))
    }

    /// Every label must be a valid class index before training.
    pub fn check_labels(&self, num_classes: usize) -> Result<(), DataError> {
        self.samples
            .iter()
            .try_for_each(|s| s.class_index(num_classes).map(|_| ()))
    }
}

impl Dataset<SeSample> for SeDataset {
    fn get(&self, index: usize) -> Option<SeSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
