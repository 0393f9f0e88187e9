// ============================================================
// Layer 2 - ConceptUseCase
// ============================================================
// Reads the training sentences (a split TSV or a parse-tree
// JSONL file), extracts short sentences as concepts and saves
// the concept map.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::data::{
    concepts::{extract_concepts, save_concept_map},
    parse_stage::load_parsed,
    segmenter::segmenter,
    split_store::read_samples,
};
use crate::domain::concept::ConceptMap;
use crate::domain::sample::LabeledSample;
use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptConfig {
    pub input:           PathBuf,
    pub output:          PathBuf,
    pub max_concept_len: usize,
    pub split_sentences: bool,
}

pub struct ConceptUseCase {
    config: ConceptConfig,
}

impl ConceptUseCase {
    pub fn new(config: ConceptConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<ConceptMap> {
        let cfg = &self.config;
        if !cfg.input.exists() {
            return Err(ConfigError::MissingFile {
                param: "input",
                path:  cfg.input.clone(),
            }
            .into());
        }
        if cfg.max_concept_len == 0 {
            return Err(ConfigError::InvalidValue {
                param:  "max_concept_len",
                reason: "must be at least 1".to_string(),
            }
            .into());
        }

        let samples = read_training_sentences(&cfg.input)?;
        tracing::info!("found {} lines in {}", samples.len(), cfg.input.display());

        let concepts = extract_concepts(&samples, cfg.max_concept_len, segmenter(cfg.split_sentences).as_ref());
        if concepts.is_empty() {
            tracing::warn!("no sentence of at most {} words found", cfg.max_concept_len);
        }
        save_concept_map(&cfg.output, &concepts)?;
        Ok(concepts)
    }
}

/// `.json`/`.json.gz` inputs are parse-tree files, anything else a split TSV.
fn read_training_sentences(path: &std::path::Path) -> Result<Vec<LabeledSample>> {
    let name = path.to_string_lossy();
    if name.ends_with(".json") || name.ends_with(".json.gz") {
        Ok(load_parsed(path)?
            .into_iter()
            .map(|p| LabeledSample::new(p.sentence, p.label))
            .collect())
    } else {
        read_samples(path)
    }
}
