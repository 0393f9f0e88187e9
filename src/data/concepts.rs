// ============================================================
// Layer 4 - Concept Extraction and Concept Map Files
// ============================================================
// Concepts are the short sentences of the training split. Each
// training text is stripped of surrounding spaces and periods,
// segmented, and every sentence of at most `max_concept_len`
// words becomes a concept with the next dense index.
//
// The resulting ConceptMap is saved as `concept_idx.json`; the
// model encodes the same texts once to fill its concept store.

use std::{
    collections::HashSet,
    fs,
    path::Path,
};

use anyhow::{Context, Result};
use tokenizers::Tokenizer;

use crate::data::gz;
use crate::domain::concept::ConceptMap;
use crate::domain::sample::LabeledSample;
use crate::domain::traits::SentenceSegmenter;
use crate::error::DataError;
use crate::infra::tokenizer_store::{CLS_ID, PAD_ID};

pub const CONCEPT_FILE: &str = "concept_idx.json";

/// Collect concepts in corpus order. Repeated sentences get one index.
pub fn extract_concepts(
    samples:         &[LabeledSample],
    max_concept_len: usize,
    segmenter:       &dyn SentenceSegmenter,
) -> ConceptMap {
    let mut seen  = HashSet::new();
    let mut texts = Vec::new();

    for sample in samples {
        let text = sample.sentence.trim().trim_matches(|c: char| c == ' ' || c == '.');
        for sentence in segmenter.segment(text) {
            let words = sentence.split_whitespace().count();
            if words > 0 && words <= max_concept_len && seen.insert(sentence.clone()) {
                texts.push(sentence);
            }
        }
    }

    tracing::info!(
        "extracted {} concepts (max {} words) from {} samples",
        texts.len(), max_concept_len, samples.len()
    );
    ConceptMap::from_texts(texts)
}

pub fn save_concept_map(path: &Path, concepts: &ConceptMap) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create '{}'", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(concepts)?;
    fs::write(path, json).with_context(|| format!("Cannot write '{}'", path.display()))?;
    tracing::info!("saved {} concepts to {}", concepts.len(), path.display());
    Ok(())
}

/// Load a concept map: a JSON object with string-integer keys.
pub fn load_concept_map(path: &Path) -> Result<ConceptMap> {
    let reader = gz::open(path)?;
    let concepts: ConceptMap = serde_json::from_reader(reader).map_err(|e| DataError::Malformed {
        source_name: path.display().to_string(),
        reason:      e.to_string(),
    })?;
    tracing::debug!("loaded {} concepts from {}", concepts.len(), path.display());
    Ok(concepts)
}

/// `[CLS]` + token ids for every concept in index order, padded or
/// truncated to `max_seq_len`. Indices must be dense.
pub fn tokenize_concepts(
    tokenizer:   &Tokenizer,
    concepts:    &ConceptMap,
    max_seq_len: usize,
) -> Result<Vec<Vec<u32>>> {
    concepts
        .dense_texts()?
        .into_iter()
        .map(|text| {
            let encoding = tokenizer
                .encode(text, false)
                .map_err(|e| anyhow::anyhow!("Tokenization failed for concept '{}': {}", text, e))?;
            let mut ids = Vec::with_capacity(max_seq_len);
            ids.push(CLS_ID);
            ids.extend_from_slice(encoding.get_ids());
            ids.truncate(max_seq_len);
            ids.resize(max_seq_len, PAD_ID);
            Ok(ids)
        })
        .collect()
}
