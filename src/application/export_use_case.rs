// ============================================================
// Layer 2 - ExportUseCase
// ============================================================
// Bundles a trained checkpoint into `<output>/<version>/`:
//
//   Step 1: copy the latest weights (kept if already exported)
//   Step 2: copy train_config.json, tokenizer.json, concept map
//   Step 3: write model.json with paths relative to the bundle
//   Step 4: read model.json back and check every path resolves

use std::{fs, path::Path, path::PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::infra::{
    checkpoint::CheckpointManager,
    manifest::{ModelManifest, MANIFEST_FILE},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub checkpoint_dir: PathBuf,
    pub output_dir:     PathBuf,
    pub version:        String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: PathBuf::from("checkpoints"),
            output_dir:     PathBuf::from("models/self_explain"),
            version:        "0.0.1".to_string(),
        }
    }
}

pub struct ExportUseCase {
    config: ExportConfig,
}

impl ExportUseCase {
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    /// Returns the path of the written manifest.
    pub fn execute(&self) -> Result<PathBuf> {
        let cfg = &self.config;
        if cfg.version.trim().is_empty() || cfg.version.contains(['/', '\\']) {
            return Err(ConfigError::InvalidValue {
                param:  "version",
                reason: format!("'{}' is not usable as a folder name", cfg.version),
            }
            .into());
        }

        let ckpt     = CheckpointManager::new(&cfg.checkpoint_dir);
        let weights  = ckpt.latest_weights_file()?;
        let save_dir = cfg.output_dir.join(&cfg.version);
        fs::create_dir_all(&save_dir)
            .with_context(|| format!("Cannot create '{}'", save_dir.display()))?;
        tracing::info!("exporting model to {}", save_dir.display());

        // ── Step 1: Weights ───────────────────────────────────────────────────
        let weights_name = file_name(&weights)?;
        let checkpoint_filename = save_dir.join(weights_name);
        if checkpoint_filename.exists() {
            tracing::warn!("not copying to {} (file exists)", checkpoint_filename.display());
        } else {
            copy(&weights, &checkpoint_filename)?;
        }

        // ── Step 2: Side files ────────────────────────────────────────────────
        let mut side_files = Vec::new();
        for src in [ckpt.config_path(), ckpt.tokenizer_path(), ckpt.concept_map_path()] {
            let dst = save_dir.join(file_name(&src)?);
            copy(&src, &dst)?;
            side_files.push(dst);
        }
        let [config_filename, tokenizer_filename, concept_map_filename]: [PathBuf; 3] =
            side_files.try_into().map_err(|_| anyhow::anyhow!("expected three side files"))?;

        // ── Step 3: Manifest ──────────────────────────────────────────────────
        let manifest = ModelManifest {
            version: cfg.version.clone(),
            checkpoint_filename,
            config_filename,
            tokenizer_filename,
            concept_map_filename,
        };
        let manifest_path = save_dir.join(MANIFEST_FILE);
        manifest.save(&manifest_path)?;

        // ── Step 4: Check ─────────────────────────────────────────────────────
        let loaded = ModelManifest::load(&manifest_path)?;
        for path in [
            &loaded.checkpoint_filename,
            &loaded.config_filename,
            &loaded.tokenizer_filename,
            &loaded.concept_map_filename,
        ] {
            if !path.exists() {
                bail!("exported manifest points at missing file '{}'", path.display());
            }
        }
        Ok(manifest_path)
    }
}

fn file_name(path: &Path) -> Result<&std::ffi::OsStr> {
    path.file_name()
        .with_context(|| format!("'{}' has no file name", path.display()))
}

fn copy(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst)
        .with_context(|| format!("Cannot copy '{}' to '{}'", src.display(), dst.display()))?;
    tracing::info!("- copied {}", dst.display());
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::concepts::CONCEPT_FILE;
    use crate::infra::checkpoint::{CONFIG_FILE, LATEST_FILE};
    use crate::infra::tokenizer_store::TOKENIZER_FILE;

    fn fake_checkpoint(dir: &Path) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("model_epoch_3.mpk.gz"), b"weights").unwrap();
        fs::write(dir.join(LATEST_FILE), "3").unwrap();
        fs::write(dir.join(CONFIG_FILE), "{}").unwrap();
        fs::write(dir.join(TOKENIZER_FILE), "{}").unwrap();
        fs::write(dir.join(CONCEPT_FILE), r#"{"0": "a"}"#).unwrap();
    }

    fn config(root: &Path) -> ExportConfig {
        ExportConfig {
            checkpoint_dir: root.join("ckpt"),
            output_dir:     root.join("models"),
            version:        "1.2.3".to_string(),
        }
    }

    #[test]
    fn test_export_bundle_is_relocatable() {
        let root = tempfile::tempdir().unwrap();
        fake_checkpoint(&root.path().join("ckpt"));

        let manifest_path = ExportUseCase::new(config(root.path())).execute().unwrap();
        let bundle = root.path().join("models").join("1.2.3");
        assert_eq!(manifest_path, bundle.join(MANIFEST_FILE));

        let text = fs::read_to_string(&manifest_path).unwrap();
        assert!(text.contains("\"checkpoint_filename\": \"model_epoch_3.mpk.gz\""));

        let moved = root.path().join("elsewhere");
        fs::rename(&bundle, &moved).unwrap();
        let loaded = ModelManifest::load(&moved.join(MANIFEST_FILE)).unwrap();
        assert!(loaded.concept_map_filename.exists());
        assert_eq!(loaded.version, "1.2.3");
    }

    #[test]
    fn test_existing_weights_are_kept() {
        let root = tempfile::tempdir().unwrap();
        fake_checkpoint(&root.path().join("ckpt"));
        let bundle = root.path().join("models").join("1.2.3");
        fs::create_dir_all(&bundle).unwrap();
        fs::write(bundle.join("model_epoch_3.mpk.gz"), b"older").unwrap();

        ExportUseCase::new(config(root.path())).execute().unwrap();
        assert_eq!(fs::read(bundle.join("model_epoch_3.mpk.gz")).unwrap(), b"older");
    }

    #[test]
    fn test_untrained_checkpoint_fails() {
        let root = tempfile::tempdir().unwrap();
        assert!(ExportUseCase::new(config(root.path())).execute().is_err());
    }

    #[test]
    fn test_version_with_separator_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let cfg  = ExportConfig { version: "a/b".to_string(), ..config(root.path()) };
        let err  = ExportUseCase::new(cfg).execute().unwrap_err();
        assert!(err.to_string().contains("version"));
    }
}
