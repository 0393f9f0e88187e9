// ============================================================
// Layer 2 - TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Validate hyperparameters          (Layer 2)
//   Step 2: Load tokenizer + concept map      (Layer 6 / Layer 4)
//   Step 3: Load parsed train/dev records     (Layer 4 - data)
//   Step 4: Build datasets, check labels      (Layer 4 - data)
//   Step 5: Prepare the checkpoint directory  (Layer 6 - infra)
//   Step 6: Run training loop                 (Layer 5 - ml)
//
// The checkpoint directory ends up self-contained: weights,
// train_config.json, tokenizer.json, concept_idx.json and
// metrics.csv.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::data::{
    concepts::{load_concept_map, tokenize_concepts, CONCEPT_FILE},
    dataset::SeDataset,
    parse_stage::{load_parsed, parsed_filename},
};
use crate::error::ConfigError;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::MetricsLogger,
    tokenizer_store::{load_tokenizer, TOKENIZER_FILE},
};
use crate::ml::{model::SelfExplainConfig, trainer::run_training};

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run. Saved next to the
// weights so inference can rebuild the same architecture.
//
// vocab_size and num_concepts are filled in from the tokenizer
// and the concept map when training starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_dir:       PathBuf,
    /// Defaults to `<data_dir>/concept_idx.json`.
    pub concept_map:    Option<PathBuf>,
    pub checkpoint_dir: PathBuf,
    pub max_seq_len:    usize,
    pub max_phrases:    usize,
    pub batch_size:     usize,
    pub epochs:         usize,
    pub lr:             f64,
    pub d_model:        usize,
    pub num_heads:      usize,
    pub num_layers:     usize,
    pub d_ff:           usize,
    pub dropout:        f64,
    pub vocab_size:     usize,
    pub num_classes:    usize,
    pub num_concepts:   usize,
    pub gil_weight:     f64,
    pub lil_weight:     f64,
    pub seed:           u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir:       PathBuf::from("data"),
            concept_map:    None,
            checkpoint_dir: PathBuf::from("checkpoints"),
            max_seq_len:    128,
            max_phrases:    64,
            batch_size:     16,
            epochs:         5,
            lr:             2e-4,
            d_model:        256,
            num_heads:      8,
            num_layers:     4,
            d_ff:           1024,
            dropout:        0.1,
            vocab_size:     0,
            num_classes:    2,
            num_concepts:   0,
            gil_weight:     0.01,
            lil_weight:     0.01,
            seed:           42,
        }
    }
}

impl TrainConfig {
    pub fn model_config(&self) -> SelfExplainConfig {
        SelfExplainConfig::new(
            self.vocab_size, self.max_seq_len, self.d_model,
            self.num_heads, self.num_layers, self.d_ff, self.dropout,
            self.num_classes, self.num_concepts,
        )
        .with_gil_weight(self.gil_weight)
        .with_lil_weight(self.lil_weight)
    }

    pub fn concept_map_path(&self) -> PathBuf {
        self.concept_map
            .clone()
            .unwrap_or_else(|| self.data_dir.join(CONCEPT_FILE))
    }

    /// Reject settings the model cannot be built with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |param: &'static str, reason: &str| {
            Err(ConfigError::InvalidValue { param, reason: reason.to_string() })
        };
        if self.num_heads == 0 || self.d_model % self.num_heads != 0 {
            return invalid("num_heads", "d_model must be divisible by num_heads");
        }
        if self.max_seq_len < 2 {
            return invalid("max_seq_len", "must leave room for [CLS] and one token");
        }
        if self.batch_size == 0 {
            return invalid("batch_size", "must be at least 1");
        }
        if self.epochs == 0 {
            return invalid("epochs", "must be at least 1");
        }
        if self.num_classes < 2 {
            return invalid("num_classes", "a classifier needs at least two classes");
        }
        if self.max_phrases == 0 {
            return invalid("max_phrases", "must be at least 1 (the root phrase)");
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return invalid("dropout", "must be in [0, 1)");
        }
        Ok(())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<()> {
        let mut cfg = self.config.clone();

        // ── Step 1: Validate ──────────────────────────────────────────────────
        cfg.validate()?;
        let tokenizer_path = cfg.data_dir.join(TOKENIZER_FILE);
        let concept_path   = cfg.concept_map_path();
        let train_path     = cfg.data_dir.join(parsed_filename("train"));
        let dev_path       = cfg.data_dir.join(parsed_filename("dev"));
        for (param, path) in [
            ("tokenizer", &tokenizer_path),
            ("concept_map", &concept_path),
            ("train", &train_path),
            ("dev", &dev_path),
        ] {
            if !path.exists() {
                return Err(ConfigError::MissingFile { param, path: path.clone() }.into());
            }
        }

        // ── Step 2: Tokenizer and concepts ────────────────────────────────────
        // Embedding rows must cover the largest id, not just the vocab length.
        let tokenizer = load_tokenizer(&tokenizer_path)?;
        cfg.vocab_size = tokenizer
            .get_vocab(true)
            .values()
            .max()
            .map_or(0, |&id| id as usize + 1);

        let concepts = load_concept_map(&concept_path)?;
        if concepts.is_empty() {
            return Err(ConfigError::InvalidValue {
                param:  "concept_map",
                reason: format!("'{}' holds no concepts", concept_path.display()),
            }
            .into());
        }
        let concept_ids = tokenize_concepts(&tokenizer, &concepts, cfg.max_seq_len)?;
        cfg.num_concepts = concept_ids.len();
        tracing::info!("vocab_size={}, {} concepts", cfg.vocab_size, cfg.num_concepts);

        // ── Step 3: Parsed records ────────────────────────────────────────────
        let train_parsed = load_parsed(&train_path)?;
        let dev_parsed   = load_parsed(&dev_path)?;
        tracing::info!("Split: {} train, {} validation", train_parsed.len(), dev_parsed.len());

        // ── Step 4: Burn datasets ─────────────────────────────────────────────
        let train_dataset = SeDataset::from_parsed(&train_parsed, cfg.max_seq_len, cfg.max_phrases)?;
        let val_dataset   = SeDataset::from_parsed(&dev_parsed, cfg.max_seq_len, cfg.max_phrases)?;
        train_dataset.check_labels(cfg.num_classes)?;
        val_dataset.check_labels(cfg.num_classes)?;

        // ── Step 5: Checkpoint directory ──────────────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir);
        ckpt_manager.create_dir()?;
        ckpt_manager.store_file(&tokenizer_path, TOKENIZER_FILE)?;
        ckpt_manager.store_file(&concept_path, CONCEPT_FILE)?;
        ckpt_manager.save_config(&cfg)?;
        let metrics = MetricsLogger::new(&cfg.checkpoint_dir)?;

        // ── Step 6: Run training loop (Layer 5) ───────────────────────────────
        run_training(&cfg, train_dataset, val_dataset, &concept_ids, &ckpt_manager, &metrics)
    }
}
