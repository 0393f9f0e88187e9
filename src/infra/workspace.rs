// ============================================================
// Layer 6 - Staging Workspace
// ============================================================
// Every characterizer call stages its sentences on disk before
// scoring, in a fresh numbered directory:
//
//   output/2026_10_17__142501/
//     000000/dev.tsv
//     000000/dev_with_parse.json
//     000001/...
//
// The counter only moves when something is staged.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::data::{parse_stage, split_store};
use crate::domain::parse_tree::ParsedSample;
use crate::domain::sample::LabeledSample;
use crate::domain::traits::TreeAnnotator;

pub const STAGED_TSV: &str = "dev.tsv";
pub const STAGED_PARSE: &str = "dev_with_parse.json";

/// `output/<YYYY_MM_DD__HHMMSS>` for the current local time.
pub fn default_save_dir() -> PathBuf {
    let stamp = chrono::Local::now().format("%Y_%m_%d__%H%M%S");
    Path::new("output").join(stamp.to_string())
}

pub struct Workspace {
    save_dir: PathBuf,
    count:    usize,
}

impl Workspace {
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        Self { save_dir: save_dir.into(), count: 0 }
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Number of directories handed out so far.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Create the next numbered directory.
    pub fn next_dir(&mut self) -> Result<PathBuf> {
        let dir = self.save_dir.join(format!("{:06}", self.count));
        self.count += 1;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create working dir '{}'", dir.display()))?;
        tracing::debug!("created working dir: {}", dir.display());
        Ok(dir)
    }

    /// Write `rows` as dev.tsv, annotate them and store the parse
    /// trees next to it. Returns the parsed samples.
    pub fn stage(
        &mut self,
        rows:      &[LabeledSample],
        annotator: &dyn TreeAnnotator,
    ) -> Result<Vec<ParsedSample>> {
        let dir = self.next_dir()?;
        let tsv = dir.join(STAGED_TSV);
        split_store::write_samples(&tsv, rows)?;

        let parsed = annotator.annotate(rows)?;
        parse_stage::write_parsed(&dir.join(STAGED_PARSE), &parsed)?;
        tracing::info!("staged {} sentences in {}", parsed.len(), dir.display());
        Ok(parsed)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parse_tree::PhraseNode;

    struct RootOnly;

    impl TreeAnnotator for RootOnly {
        fn annotate(&self, rows: &[LabeledSample]) -> Result<Vec<ParsedSample>> {
            Ok(rows
                .iter()
                .map(|r| ParsedSample {
                    sentence:   r.sentence.clone(),
                    label:      r.label,
                    input_ids:  vec![101],
                    parse_tree: vec![PhraseNode {
                        phrase_label: "ROOT".to_string(),
                        phrase:       r.sentence.clone(),
                        start:        1,
                        end:          1,
                    }],
                })
                .collect())
        }
    }

    #[test]
    fn test_default_save_dir_is_timestamped() {
        let dir = default_save_dir();
        assert!(dir.starts_with("output"));
        let stamp = dir.file_name().unwrap().to_str().unwrap();
        assert_eq!(stamp.len(), "2026_01_01__000000".len());
        assert_eq!(&stamp[10..12], "__");
    }

    #[test]
    fn test_dirs_are_numbered() {
        let root = tempfile::tempdir().unwrap();
        let mut ws = Workspace::new(root.path());
        assert_eq!(ws.next_dir().unwrap(), root.path().join("000000"));
        assert_eq!(ws.next_dir().unwrap(), root.path().join("000001"));
        assert_eq!(ws.count(), 2);
    }

    #[test]
    fn test_stage_writes_both_artifacts() {
        let root = tempfile::tempdir().unwrap();
        let mut ws = Workspace::new(root.path());
        let rows = vec![LabeledSample::new("the cat sat", 0), LabeledSample::new("it ran", 0)];

        let parsed = ws.stage(&rows, &RootOnly).unwrap();
        assert_eq!(parsed.len(), 2);

        let dir = root.path().join("000000");
        assert_eq!(split_store::read_samples(&dir.join(STAGED_TSV)).unwrap(), rows);
        assert_eq!(parse_stage::load_parsed(&dir.join(STAGED_PARSE)).unwrap(), parsed);
    }
}
