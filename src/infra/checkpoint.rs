// ============================================================
// Layer 6 - Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// A checkpoint directory is self-contained; everything the
// characterizer and the exporter need is in it:
//
//   checkpoints/
//     model_epoch_1.mpk.gz   ← weights after epoch 1 (concept store included)
//     model_epoch_2.mpk.gz
//     latest_epoch.json      ← number of the latest epoch
//     train_config.json      ← model hyperparameters
//     tokenizer.json         ← copied from the data directory
//     concept_idx.json       ← copied concept map
//     metrics.csv            ← see metrics.rs
//
// Loading fails if the architecture in train_config.json does
// not match the stored weights.

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::application::train_use_case::TrainConfig;
use crate::data::concepts::CONCEPT_FILE;
use crate::infra::tokenizer_store::TOKENIZER_FILE;
use crate::ml::model::SelfExplainModel;

pub const CONFIG_FILE: &str = "train_config.json";
pub const LATEST_FILE: &str = "latest_epoch.json";
/// Extension CompactRecorder appends to the record path.
pub const WEIGHTS_EXTENSION: &str = "mpk.gz";

/// Manages saving and loading of model checkpoints.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Nothing is created on disk until `create_dir` or a save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn create_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create checkpoint dir '{}'", self.dir.display()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        self.dir.join(TOKENIZER_FILE)
    }

    pub fn concept_map_path(&self) -> PathBuf {
        self.dir.join(CONCEPT_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    /// Record path without extension, as the recorder expects it.
    fn record_path(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("model_epoch_{epoch}"))
    }

    /// The weights file actually written for `epoch`.
    pub fn weights_file(&self, epoch: usize) -> PathBuf {
        self.record_path(epoch).with_extension(WEIGHTS_EXTENSION)
    }

    /// Save model weights for a given epoch and move the latest pointer.
    pub fn save_model<B: Backend>(&self, model: &SelfExplainModel<B>, epoch: usize) -> Result<()> {
        let path = self.record_path(epoch);

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        let latest_path = self.dir.join(LATEST_FILE);
        fs::write(&latest_path, serde_json::to_string(&epoch)?)
            .with_context(|| format!("Failed to write '{}'", latest_path.display()))?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Load model weights from the latest saved checkpoint.
    pub fn load_model<B: Backend>(
        &self,
        model:  SelfExplainModel<B>,
        device: &B::Device,
    ) -> Result<SelfExplainModel<B>> {
        let epoch = self.latest_epoch()?;
        let path  = self.record_path(epoch);

        tracing::info!("Loading checkpoint from epoch {}", epoch);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?",
                    path.display())
            })?;

        Ok(model.load_record(record))
    }

    /// Save the training configuration to JSON.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.config_path();
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.config_path();
        let json = fs::read_to_string(&path)
            .with_context(|| {
                format!(
                    "Cannot read config from '{}'. \
                     Make sure you have run 'train' first.",
                    path.display()
                )
            })?;
        serde_json::from_str(&json)
            .with_context(|| format!("Invalid training config '{}'", path.display()))
    }

    /// Read latest_epoch.json. Fails if training hasn't been run yet.
    pub fn latest_epoch(&self) -> Result<usize> {
        let path = self.dir.join(LATEST_FILE);
        let s = fs::read_to_string(&path)
            .with_context(|| format!("Cannot find '{}'. Have you run 'train' first?", path.display()))?;
        Ok(serde_json::from_str::<usize>(&s)?)
    }

    pub fn latest_weights_file(&self) -> Result<PathBuf> {
        Ok(self.weights_file(self.latest_epoch()?))
    }

    /// Copy a file into the checkpoint directory under `name`.
    pub fn store_file(&self, src: &Path, name: &str) -> Result<PathBuf> {
        let dst = self.dir.join(name);
        fs::copy(src, &dst)
            .with_context(|| format!("Cannot copy '{}' to '{}'", src.display(), dst.display()))?;
        tracing::debug!("Stored {} in checkpoint dir", name);
        Ok(dst)
    }
}
