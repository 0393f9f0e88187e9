// ============================================================
// Layer 2 - EvaluateUseCase
// ============================================================
// Scores a parsed dev/test file in order and writes one TSV row
// per sentence:
//
//   predicted_label  true_label  lil_interpretations  gil_interpretations
//
// Interpretations are JSON arrays inside the TSV cells. Running
// accuracy is logged per batch, the final accuracy is returned.

use std::{fs, path::Path, path::PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::application::characterizer::score_samples;
use crate::data::{concepts::load_concept_map, parse_stage::load_parsed};
use crate::domain::concept::ConceptMap;
use crate::domain::interpretation::InterpretationResult;
use crate::domain::parse_tree::ParsedSample;
use crate::domain::traits::Classifier;
use crate::error::ConfigError;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{inferencer::Inferencer, InferBackend};

const HEADER: [&str; 4] = ["predicted_labels", "true_labels", "lil_interpretations", "gil_interpretations"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateConfig {
    pub checkpoint_dir: PathBuf,
    /// Parse-tree JSONL file, e.g. `data/dev_with_parse.json`.
    pub input:          PathBuf,
    pub output:         PathBuf,
    pub concept_map:    Option<PathBuf>,
    pub batch_size:     usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalSummary {
    pub evaluated: usize,
    pub correct:   usize,
}

impl EvalSummary {
    pub fn accuracy(&self) -> f64 {
        if self.evaluated == 0 { 0.0 } else { self.correct as f64 / self.evaluated as f64 }
    }
}

/// Score `samples` batch by batch, logging running accuracy.
pub fn evaluate(
    classifier:  &dyn Classifier,
    concept_map: &ConceptMap,
    samples:     &[ParsedSample],
    batch_size:  usize,
) -> Result<(Vec<InterpretationResult>, EvalSummary)> {
    let mut results = Vec::with_capacity(samples.len());
    let mut summary = EvalSummary { evaluated: 0, correct: 0 };

    for batch in samples.chunks(batch_size.max(1)) {
        let scored = score_samples(classifier, concept_map, batch, batch.len())?;
        let batch_correct = scored
            .iter()
            .zip(batch)
            .filter(|(r, s)| i64::try_from(r.predicted_label).ok() == Some(s.label))
            .count();

        summary.evaluated += batch.len();
        summary.correct   += batch_correct;
        tracing::info!(
            "Accuracy = {:.2}, Batch accuracy = {:.2}",
            summary.accuracy() * 100.0,
            batch_correct as f64 / batch.len() as f64,
        );
        results.extend(scored);
    }
    Ok((results, summary))
}

/// Write the per-sentence TSV.
pub fn write_evaluation(path: &Path, results: &[InterpretationResult], samples: &[ParsedSample]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create '{}'", parent.display()))?;
    }
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("Cannot create '{}'", path.display()))?;

    writer.write_record(HEADER)?;
    for (result, sample) in results.iter().zip(samples) {
        let local: Vec<(&str, f32)> = result
            .local_evidence
            .iter()
            .map(|p| (p.phrase.as_str(), p.relevance))
            .collect();
        writer.write_record([
            result.predicted_label.to_string(),
            sample.label.to_string(),
            serde_json::to_string(&local)?,
            serde_json::to_string(&result.global_evidence)?,
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub struct EvaluateUseCase {
    config: EvaluateConfig,
}

impl EvaluateUseCase {
    pub fn new(config: EvaluateConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<EvalSummary> {
        let cfg = &self.config;
        if !cfg.input.exists() {
            return Err(ConfigError::MissingFile { param: "input", path: cfg.input.clone() }.into());
        }

        let ckpt        = CheckpointManager::new(&cfg.checkpoint_dir);
        let classifier  = Inferencer::<InferBackend>::from_checkpoint(&ckpt, Default::default())?;
        let concept_map = load_concept_map(&cfg.concept_map.clone().unwrap_or_else(|| ckpt.concept_map_path()))?;
        let samples     = load_parsed(&cfg.input)?;

        let (results, summary) = evaluate(&classifier, &concept_map, &samples, cfg.batch_size)?;
        write_evaluation(&cfg.output, &results, &samples)?;
        tracing::info!(
            "Accuracy = {:.2} over {} samples, results in {}",
            summary.accuracy() * 100.0, summary.evaluated, cfg.output.display()
        );
        Ok(summary)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::interpretation::ModelOutput;
    use crate::domain::parse_tree::PhraseNode;

    /// Predicts class 1 for sentences containing "bad".
    struct KeywordClassifier;

    impl Classifier for KeywordClassifier {
        fn forward(&self, batch: &[ParsedSample]) -> Result<ModelOutput> {
            let class_probs: Vec<Vec<f32>> = batch
                .iter()
                .map(|s| if s.sentence.contains("bad") { vec![0.2, 0.8] } else { vec![0.9, 0.1] })
                .collect();
            Ok(ModelOutput {
                topk_indices: batch.iter().map(|_| vec![0]).collect(),
                phrase_probs: batch.iter().map(|_| vec![vec![0.5, 0.5], vec![0.6, 0.4]]).collect(),
                class_probs,
            })
        }
    }

    fn sample(sentence: &str, label: i64) -> ParsedSample {
        let node = |label: &str, phrase: &str| PhraseNode {
            phrase_label: label.to_string(),
            phrase:       phrase.to_string(),
            start:        1,
            end:          2,
        };
        ParsedSample {
            sentence:   sentence.to_string(),
            label,
            input_ids:  vec![101, 104],
            parse_tree: vec![node("ROOT", sentence), node("W", "word")],
        }
    }

    #[test]
    fn test_accuracy_counts_matches() {
        let samples = vec![sample("bad day", 1), sample("good day", 0), sample("bad cat", 0)];
        let map = ConceptMap::from_texts(["c0"]);
        let (results, summary) = evaluate(&KeywordClassifier, &map, &samples, 2).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(summary, EvalSummary { evaluated: 3, correct: 2 });
        assert!((summary.accuracy() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_input_has_zero_accuracy() {
        let map = ConceptMap::from_texts(["c0"]);
        let (_, summary) = evaluate(&KeywordClassifier, &map, &[], 4).unwrap();
        assert_eq!(summary.accuracy(), 0.0);
    }

    #[test]
    fn test_tsv_columns() {
        let dir     = tempfile::tempdir().unwrap();
        let path    = dir.path().join("out").join("eval.tsv");
        let samples = vec![sample("bad day", 1)];
        let map     = ConceptMap::from_texts(["c0"]);
        let (results, _) = evaluate(&KeywordClassifier, &map, &samples, 8).unwrap();

        write_evaluation(&path, &results, &samples).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("predicted_labels\ttrue_labels\tlil_interpretations\tgil_interpretations\n"));

        let mut reader = csv::ReaderBuilder::new().delimiter(b'\t').from_path(&path).unwrap();
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[0], "1");
        assert_eq!(&row[1], "1");
        let local: Vec<(String, f32)> = serde_json::from_str(&row[2]).unwrap();
        assert_eq!(local[0].0, "word");
        assert_eq!(&row[3], r#"["c0"]"#);
    }
}
