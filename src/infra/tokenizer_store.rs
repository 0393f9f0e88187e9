// ============================================================
// Layer 6 - Tokenizer Store
// ============================================================
// Builds, saves and loads the word-level tokenizer.
//
// In tokenizers 0.15, train_from_files requires Trainer::Model
// to equal ModelWrapper. Instead the tokenizer JSON is written
// by hand in HuggingFace format and loaded back, which avoids
// the trainer type mismatch entirely.
//
// The vocabulary is counted with the same token rule as the
// `Whitespace` pre-tokenizer (`\w+|[^\w\s]+`), so punctuation
// and apostrophe pieces produced by the sentence segmenter get
// ids of their own instead of falling back to [UNK].

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use anyhow::{Context, Result};
use regex::Regex;
use tokenizers::Tokenizer;

pub const TOKENIZER_FILE: &str = "tokenizer.json";

pub const PAD_ID: u32 = 0;
pub const UNK_ID: u32 = 1;
pub const CLS_ID: u32 = 101;
pub const SEP_ID: u32 = 102;
pub const MASK_ID: u32 = 103;

/// Special tokens reserve ids 0..=103; words start after them.
const FIRST_WORD_ID: usize = 104;
const NUM_SPECIAL: usize = 5;

static PRE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+|[^\w\s]+").expect("pre-token pattern is valid"));

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TOKENIZER_FILE)
    }

    /// Load the existing tokenizer, or build a new one from the texts
    /// `read_texts` returns. `read_texts` is only called when building.
    pub fn load_or_build(
        &self,
        read_texts: impl FnOnce() -> Result<Vec<String>>,
        vocab_size: usize,
    ) -> Result<Tokenizer> {
        if self.path().exists() {
            tracing::info!("Loading existing tokenizer from '{}'", self.path().display());
            self.load()
        } else {
            tracing::info!("Building new tokenizer (vocab_size={})", vocab_size);
            self.build_and_save(&read_texts()?, vocab_size)
        }
    }

    pub fn load(&self) -> Result<Tokenizer> {
        load_tokenizer(&self.path())
    }

    /// Count tokens, keep the most frequent and write the JSON.
    pub fn build_and_save(&self, texts: &[String], vocab_size: usize) -> Result<Tokenizer> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        // ── Step 1: Token frequencies ─────────────────────────────────────────
        let mut freq: HashMap<String, usize> = HashMap::new();
        for text in texts {
            for token in PRE_TOKEN.find_iter(&text.to_lowercase()) {
                *freq.entry(token.as_str().to_string()).or_insert(0) += 1;
            }
        }

        // Most frequent first; ties broken alphabetically so the same
        // corpus always yields the same ids.
        let mut words: Vec<(String, usize)> = freq.into_iter().collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        words.truncate(vocab_size.saturating_sub(NUM_SPECIAL));

        // ── Step 2: Vocab JSON ────────────────────────────────────────────────
        let mut vocab = serde_json::json!({
            "[PAD]":  PAD_ID,
            "[UNK]":  UNK_ID,
            "[CLS]":  CLS_ID,
            "[SEP]":  SEP_ID,
            "[MASK]": MASK_ID,
        });

        let mut next_id = FIRST_WORD_ID;
        for (word, _) in &words {
            if vocab.get(word).is_none() {
                vocab[word] = serde_json::json!(next_id);
                next_id += 1;
            }
        }

        // ── Step 3: HuggingFace tokenizer JSON ────────────────────────────────
        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [
                {"id": PAD_ID,  "content": "[PAD]",  "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
                {"id": UNK_ID,  "content": "[UNK]",  "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
                {"id": CLS_ID,  "content": "[CLS]",  "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
                {"id": SEP_ID,  "content": "[SEP]",  "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
                {"id": MASK_ID, "content": "[MASK]", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true}
            ],
            "normalizer": {
                "type": "BertNormalizer",
                "clean_text": true,
                "handle_chinese_chars": true,
                "strip_accents": null,
                "lowercase": true
            },
            "pre_tokenizer": {
                "type": "Whitespace"
            },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": "[UNK]"
            }
        });

        let path = self.path();
        std::fs::write(&path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| format!("Cannot write tokenizer JSON '{}'", path.display()))?;

        tracing::info!(
            "Tokenizer built with {} words, saved to '{}'",
            next_id - FIRST_WORD_ID,
            path.display()
        );

        load_tokenizer(&path)
    }
}

/// Load a tokenizer file from an explicit path.
pub fn load_tokenizer(path: &Path) -> Result<Tokenizer> {
    Tokenizer::from_file(path)
        .map_err(|e| anyhow::anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_then_reuse() {
        let dir   = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path());
        let texts = vec!["The cat ran .".to_string(), "the dog ran".to_string()];

        let tok = store.load_or_build(|| Ok(texts.clone()), 100).unwrap();
        assert!(store.path().exists());

        let enc = tok.encode("the cat flew", false).unwrap();
        let ids = enc.get_ids();
        assert_eq!(ids.len(), 3);
        assert!(ids[0] >= FIRST_WORD_ID as u32);
        assert_eq!(ids[2], UNK_ID);

        // second call loads the same file without reading any texts
        let again = store
            .load_or_build(|| anyhow::bail!("texts must not be read"), 100)
            .unwrap();
        assert_eq!(again.encode("the cat", false).unwrap().get_ids(), &ids[..2]);
    }

    #[test]
    fn test_punctuation_gets_an_id() {
        let dir = tempfile::tempdir().unwrap();
        let tok = TokenizerStore::new(dir.path())
            .build_and_save(&["don 't stop .".to_string()], 100)
            .unwrap();
        let ids = tok.encode("don 't stop .", false).unwrap().get_ids().to_vec();
        assert!(!ids.contains(&UNK_ID), "{ids:?}");
    }

    #[test]
    fn test_vocab_size_caps_words() {
        let dir = tempfile::tempdir().unwrap();
        let tok = TokenizerStore::new(dir.path())
            .build_and_save(&["a a a b b c".to_string()], NUM_SPECIAL + 2)
            .unwrap();
        let ids = tok.encode("a b c", false).unwrap().get_ids().to_vec();
        assert_eq!(ids[2], UNK_ID);
        assert_ne!(ids[0], UNK_ID);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TokenizerStore::new(dir.path()).load().is_err());
    }
}
