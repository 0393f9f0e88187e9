// ============================================================
// Layer 2 - ParseUseCase
// ============================================================
// Stages parse trees for every split in a data directory:
//
//   Step 1: Build / load the tokenizer from the train split  (Layer 6)
//   Step 2: For each split, <split>.tsv[.gz] → <split>_with_parse.json
//           (skipped when the output exists, unless overwrite)

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::data::{
    parse_stage::{parsed_filename, store_parse_trees, ParseStage},
    split_store::{locate_split, read_samples},
};
use crate::error::ConfigError;
use crate::infra::tokenizer_store::TokenizerStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseConfig {
    pub data_dir:        PathBuf,
    pub splits:          Vec<String>,
    /// Split whose sentences define the vocabulary.
    pub vocab_split:     String,
    pub tokenizer_vocab: usize,
    pub overwrite:       bool,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            data_dir:        PathBuf::from("data"),
            splits:          vec!["train".into(), "dev".into(), "test".into()],
            vocab_split:     "train".to_string(),
            tokenizer_vocab: 30_000,
            overwrite:       false,
        }
    }
}

pub struct ParseUseCase {
    config: ParseConfig,
}

impl ParseUseCase {
    pub fn new(config: ParseConfig) -> Self {
        Self { config }
    }

    /// Returns the parse-tree files written by this run.
    pub fn execute(&self) -> Result<Vec<PathBuf>> {
        let cfg = &self.config;

        // ── Step 1: Tokenizer ─────────────────────────────────────────────────
        let store = TokenizerStore::new(&cfg.data_dir);
        let read_vocab = || -> Result<Vec<String>> {
            let vocab_file = locate_split(&cfg.data_dir, &cfg.vocab_split).ok_or_else(|| {
                ConfigError::MissingFile {
                    param: "vocab_split",
                    path:  cfg.data_dir.join(format!("{}.tsv", cfg.vocab_split)),
                }
            })?;
            Ok(read_samples(&vocab_file)?.into_iter().map(|s| s.sentence).collect())
        };
        let tokenizer = if cfg.overwrite {
            store.build_and_save(&read_vocab()?, cfg.tokenizer_vocab)?
        } else {
            store.load_or_build(read_vocab, cfg.tokenizer_vocab)?
        };
        let stage = ParseStage::new(tokenizer);

        // ── Step 2: Parse each split ──────────────────────────────────────────
        let mut written = Vec::new();
        for split in &cfg.splits {
            let output = cfg.data_dir.join(parsed_filename(split));
            if output.exists() && !cfg.overwrite {
                tracing::info!("{} exists, skipping (use --overwrite to redo)", output.display());
                continue;
            }
            let Some(input) = locate_split(&cfg.data_dir, split) else {
                tracing::warn!("no '{}' split in {}, skipping", split, cfg.data_dir.display());
                continue;
            };
            store_parse_trees(&stage, &input, &output)?;
            written.push(output);
        }
        Ok(written)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{parse_stage::load_parsed, split_store::write_samples};
    use crate::domain::sample::LabeledSample;

    fn config(dir: &std::path::Path) -> ParseConfig {
        ParseConfig { data_dir: dir.to_path_buf(), ..ParseConfig::default() }
    }

    #[test]
    fn test_parses_present_splits_and_skips_existing() {
        let dir = tempfile::tempdir().unwrap();
        write_samples(&dir.path().join("train.tsv"), &[LabeledSample::new("the cat sat", 1)]).unwrap();
        write_samples(&dir.path().join("dev.tsv.gz"), &[LabeledSample::new("a dog ran", 0)]).unwrap();

        let written = ParseUseCase::new(config(dir.path())).execute().unwrap();
        assert_eq!(written, vec![
            dir.path().join("train_with_parse.json"),
            dir.path().join("dev_with_parse.json"),
        ]);
        assert!(dir.path().join("tokenizer.json").exists());
        let dev = load_parsed(&written[1]).unwrap();
        assert_eq!(dev[0].sentence, "a dog ran");
        assert_eq!(dev[0].parse_tree[0].phrase_label, "ROOT");

        // second run leaves everything in place
        assert!(ParseUseCase::new(config(dir.path())).execute().unwrap().is_empty());
    }

    #[test]
    fn test_existing_tokenizer_is_reused_without_vocab_split() {
        let dir = tempfile::tempdir().unwrap();
        TokenizerStore::new(dir.path())
            .build_and_save(&["a dog ran".to_string()], 100)
            .unwrap();
        write_samples(&dir.path().join("dev.tsv"), &[LabeledSample::new("a dog ran", 0)]).unwrap();

        let written = ParseUseCase::new(config(dir.path())).execute().unwrap();
        assert_eq!(written, vec![dir.path().join("dev_with_parse.json")]);
    }

    #[test]
    fn test_missing_vocab_split_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ParseUseCase::new(config(dir.path())).execute().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingFile { param: "vocab_split", .. })
        ));
    }
}
