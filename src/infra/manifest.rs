// ============================================================
// Layer 6 - Model Manifest
// ============================================================
// `model.json` describes an exported model bundle. Every value
// under a key ending in "filename" is a path; on save it is made
// relative to the manifest's folder, on load it is joined back
// onto that folder. The bundle can then be moved as a whole.
//
//   {
//     "version": "0.0.1",
//     "checkpoint_filename": "model_epoch_3.mpk.gz",
//     "config_filename": "train_config.json",
//     "tokenizer_filename": "tokenizer.json",
//     "concept_map_filename": "concept_idx.json"
//   }

use std::{
    fs,
    path::{Component, Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MANIFEST_FILE: &str = "model.json";
const PATH_KEY_SUFFIX: &str = "filename";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub version:              String,
    pub checkpoint_filename:  PathBuf,
    pub config_filename:      PathBuf,
    pub tokenizer_filename:   PathBuf,
    pub concept_map_filename: PathBuf,
}

impl ModelManifest {
    /// Write as pretty JSON with paths relative to `path`'s folder.
    pub fn save(&self, path: &Path) -> Result<()> {
        let folder = path.parent().unwrap_or(Path::new(""));
        let mut value = serde_json::to_value(self)?;
        make_relative_paths(&mut value, folder);
        fs::write(path, serde_json::to_string_pretty(&value)?)
            .with_context(|| format!("Cannot write manifest '{}'", path.display()))?;
        tracing::info!("saved manifest {}", path.display());
        Ok(())
    }

    /// Read a manifest, resolving paths against its folder.
    pub fn load(path: &Path) -> Result<Self> {
        let folder = path.parent().unwrap_or(Path::new(""));
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read manifest '{}'", path.display()))?;
        let mut value: Value = serde_json::from_str(&text)
            .with_context(|| format!("Invalid manifest '{}'", path.display()))?;
        join_relative_paths(&mut value, folder);
        Ok(serde_json::from_value(value)?)
    }
}

fn is_path_key(key: &str) -> bool {
    key.ends_with(PATH_KEY_SUFFIX)
}

/// Rewrite path strings under matching keys, recursively.
fn rewrite_paths(value: &mut Value, rewrite: &dyn Fn(&str) -> String) {
    match value {
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                match v {
                    Value::String(s) if is_path_key(key) => *s = rewrite(s),
                    Value::Array(items) if is_path_key(key) => {
                        for item in items.iter_mut() {
                            if let Value::String(s) = item {
                                *s = rewrite(s);
                            }
                        }
                    }
                    _ => rewrite_paths(v, rewrite),
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|v| rewrite_paths(v, rewrite)),
        _ => {}
    }
}

pub fn make_relative_paths(value: &mut Value, folder: &Path) {
    rewrite_paths(value, &|s| relative_to(Path::new(s), folder).display().to_string());
}

pub fn join_relative_paths(value: &mut Value, folder: &Path) {
    rewrite_paths(value, &|s| folder.join(s).display().to_string());
}

/// `path` expressed relative to `base`, walking up with `..` where
/// needed. Both are compared component-wise as given.
pub fn relative_to(path: &Path, base: &Path) -> PathBuf {
    let path: Vec<Component> = path.components().collect();
    let base: Vec<Component> = base.components().collect();
    let common = path.iter().zip(&base).take_while(|(a, b)| a == b).count();

    let mut rel = PathBuf::new();
    for _ in common..base.len() {
        rel.push("..");
    }
    for part in &path[common..] {
        rel.push(part);
    }
    if rel.as_os_str().is_empty() {
        rel.push(".");
    }
    rel
}
