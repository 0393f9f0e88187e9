// ============================================================
// Layer 2 - ImportUseCase
// ============================================================
// Builds balanced split files from a raw corpus:
//
//   Step 1: Read the source into class buckets  (Layer 4 - importer)
//   Step 2: Optionally shuffle each bucket      (Layer 4 - splitter)
//   Step 3: Build the splits                    (Layer 4 - splitter)
//   Step 4: Write one TSV per split             (Layer 4 - split_store)

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::data::{
    importer::{self, HsolSource, IsotSource, ScoredJsonSource, TsvSource, WsfOptions, WsfSource},
    segmenter::segmenter,
    split_store::save_splits,
    splitter::{build_splits, shuffle_buckets},
};
use crate::domain::split::{BalancePolicy, SplitSpec};
use crate::domain::traits::SampleSource;
use crate::error::ConfigError;

// ─── Source Configuration ────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Hsol       { path: PathBuf },
    Wsf        { annotations: PathBuf, subfolder: String, max_contexts: u32 },
    Isot       { folder: PathBuf },
    ScoredJson { paths: Vec<PathBuf>, use_text: bool, split_sentences: bool },
    Tsv        { path: PathBuf },
}

impl SourceConfig {
    /// Every named input must exist before anything is read.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let check = |param: &'static str, path: &PathBuf| {
            if path.exists() {
                Ok(())
            } else {
                Err(ConfigError::MissingFile { param, path: path.clone() })
            }
        };
        match self {
            Self::Hsol { path } | Self::Tsv { path } => check("input", path),
            Self::Wsf { annotations, .. }            => check("annotations", annotations),
            Self::Isot { folder }                    => check("folder", folder),
            Self::ScoredJson { paths, .. } => {
                if paths.is_empty() {
                    return Err(ConfigError::InvalidValue {
                        param:  "inputs",
                        reason: "at least one JSON file is required".to_string(),
                    });
                }
                paths.iter().try_for_each(|p| check("inputs", p))
            }
        }
    }

    pub fn into_source(self) -> Box<dyn SampleSource> {
        match self {
            Self::Hsol { path } => Box::new(HsolSource { path }),
            Self::Wsf { annotations, subfolder, max_contexts } => Box::new(WsfSource {
                annotations,
                options: WsfOptions { subfolder, max_contexts },
            }),
            Self::Isot { folder } => Box::new(IsotSource { folder }),
            Self::ScoredJson { paths, use_text, split_sentences } => Box::new(ScoredJsonSource {
                paths,
                use_text,
                segmenter: segmenter(split_sentences),
            }),
            Self::Tsv { path } => Box::new(TsvSource { path }),
        }
    }
}

// ─── Import Configuration ────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    pub source:       SourceConfig,
    pub output_dir:   PathBuf,
    pub splits:       SplitSpec,
    pub balance:      BalancePolicy,
    pub compress:     bool,
    pub shuffle_seed: Option<u64>,
}

// ─── ImportUseCase ────────────────────────────────────────────────────────────
pub struct ImportUseCase {
    config: ImportConfig,
}

impl ImportUseCase {
    pub fn new(config: ImportConfig) -> Self {
        Self { config }
    }

    /// Returns the written split files in split order.
    pub fn execute(self) -> Result<Vec<PathBuf>> {
        let ImportConfig { source, output_dir, splits, balance, compress, shuffle_seed } = self.config;
        source.validate()?;

        // ── Step 1: Read the corpus ───────────────────────────────────────────
        let mut buckets = source.into_source().load()?;
        if buckets.is_empty() {
            tracing::warn!("source declared no classes, every split will be empty");
        }
        tracing::info!(
            "imported {} samples in {} classes {:?}",
            buckets.total(), buckets.num_classes(), buckets.labels().collect::<Vec<_>>()
        );
        importer::log_positive_rate(&buckets);
        for label in buckets.empty_classes() {
            tracing::warn!("class {} has no samples", label);
        }

        // ── Step 2: Shuffle ───────────────────────────────────────────────────
        if let Some(seed) = shuffle_seed {
            tracing::info!("shuffling class buckets with seed {}", seed);
            shuffle_buckets(&mut buckets, seed);
        }

        // ── Step 3: Build splits ──────────────────────────────────────────────
        tracing::info!("building {} splits: {}", splits.len(), splits);
        let dataset = build_splits(&buckets, &splits, balance);
        for alloc in dataset.allocations() {
            tracing::debug!(
                "split '{}' class {}: window {}+{}, {} emitted ({} repeats)",
                alloc.split, alloc.label, alloc.start, alloc.available, alloc.emitted, alloc.repeats
            );
        }
        for alloc in dataset.degenerate() {
            tracing::warn!(
                "split '{}' class {}: needed {} samples but none were available",
                alloc.split, alloc.label, alloc.required.unwrap_or(0)
            );
        }
        for name in splits.names() {
            tracing::info!("split '{}': {:?}", name, dataset.label_counts(name));
        }

        // ── Step 4: Write ─────────────────────────────────────────────────────
        save_splits(&dataset, &output_dir, compress)
    }
}
