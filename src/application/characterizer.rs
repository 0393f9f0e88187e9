// ============================================================
// Layer 2 - Characterizer
// ============================================================
// Explains raw text with a trained model:
//
//   text ──segment──► sentences ──Workspace::stage──► parsed samples
//        (dev.tsv + dev_with_parse.json in save_dir/NNNNNN)
//                                     │
//        score_samples ◄──────────────┘
//        (batched Classifier::forward, then GIL + LIL per batch)
//                                     │
//        Characterization { score = max class-1 probability,
//                           evidence = one result per sentence }
//
// Every collaborator is injected, so the orchestration is tested
// with fakes; `Characterizer::load` wires the real ones from a
// checkpoint directory and fails at once if anything is missing.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::{concepts::load_concept_map, parse_stage::ParseStage, segmenter::segmenter};
use crate::domain::concept::ConceptMap;
use crate::domain::interpretation::{Characterization, ExportRecord, InterpretationResult};
use crate::domain::parse_tree::ParsedSample;
use crate::domain::traits::{Classifier, SentenceSegmenter, TreeAnnotator};
use crate::infra::{
    checkpoint::CheckpointManager,
    tokenizer_store::load_tokenizer,
    workspace::{default_save_dir, Workspace},
};
use crate::interpret::interpret_batch;
use crate::ml::{inferencer::Inferencer, InferBackend};

/// Upper bound on sentences per forward pass.
pub const MAX_BATCH_SIZE: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterizerConfig {
    pub checkpoint_dir:  PathBuf,
    /// Defaults to the concept map stored in the checkpoint dir.
    pub concept_map:     Option<PathBuf>,
    /// Defaults to `output/<timestamp>`.
    pub save_dir:        Option<PathBuf>,
    pub split_sentences: bool,
}

// ─── Pure scoring ─────────────────────────────────────────────────────────────
/// Run `samples` through the classifier in batches and interpret
/// each batch. Results keep sample order.
pub fn score_samples(
    classifier:  &dyn Classifier,
    concept_map: &ConceptMap,
    samples:     &[ParsedSample],
    batch_size:  usize,
) -> Result<Vec<InterpretationResult>> {
    let mut results = Vec::with_capacity(samples.len());
    for batch in samples.chunks(batch_size.max(1)) {
        let output = classifier.forward(batch)?;
        results.extend(interpret_batch(concept_map, batch, &output)?);
    }
    Ok(results)
}

// ─── Characterizer ────────────────────────────────────────────────────────────
pub struct Characterizer<C: Classifier, A: TreeAnnotator> {
    segmenter:   Box<dyn SentenceSegmenter>,
    workspace:   Workspace,
    annotator:   A,
    classifier:  C,
    concept_map: ConceptMap,
}

impl<C: Classifier, A: TreeAnnotator> Characterizer<C, A> {
    pub fn new(
        segmenter:   Box<dyn SentenceSegmenter>,
        workspace:   Workspace,
        annotator:   A,
        classifier:  C,
        concept_map: ConceptMap,
    ) -> Self {
        Self { segmenter, workspace, annotator, classifier, concept_map }
    }

    /// Score `text` and collect per-sentence evidence. `label` is
    /// only written to the staged TSV. Text without sentences gives
    /// an empty characterization and stages nothing.
    pub fn process(&mut self, text: &str, batch_size: usize, label: i64) -> Result<Characterization> {
        let rows = self.segmenter.to_samples(text, label);
        if rows.is_empty() {
            tracing::debug!("no sentences in input, nothing to score");
            return Ok(Characterization::empty());
        }

        let parsed     = self.workspace.stage(&rows, &self.annotator)?;
        let batch_size = batch_size.min(MAX_BATCH_SIZE).min(parsed.len()).max(1);
        let evidence   = score_samples(&self.classifier, &self.concept_map, &parsed, batch_size)?;

        let result = Characterization::from_results(evidence);
        tracing::info!("characterized {} sentences, score={:.4}", result.evidence.len(), result.score);
        Ok(result)
    }
}

impl Characterizer<Inferencer<InferBackend>, ParseStage> {
    /// Load model, tokenizer and concept map from a checkpoint dir.
    pub fn load(cfg: &CharacterizerConfig) -> Result<Self> {
        let ckpt = CheckpointManager::new(&cfg.checkpoint_dir);

        let classifier = Inferencer::from_checkpoint(&ckpt, Default::default())
            .with_context(|| format!("Cannot load model from '{}'", cfg.checkpoint_dir.display()))?;
        let tokenizer = load_tokenizer(&ckpt.tokenizer_path())?;

        let concept_path = cfg.concept_map.clone().unwrap_or_else(|| ckpt.concept_map_path());
        let concept_map  = load_concept_map(&concept_path)?;
        tracing::info!("loaded {} concepts from {}", concept_map.len(), concept_path.display());

        let save_dir = cfg.save_dir.clone().unwrap_or_else(default_save_dir);
        tracing::info!("save_dir: {}", save_dir.display());

        Ok(Self::new(
            segmenter(cfg.split_sentences),
            Workspace::new(save_dir),
            ParseStage::new(tokenizer),
            classifier,
            concept_map,
        ))
    }
}

/// Flatten characterizations into export records, sentence by sentence.
pub fn export_records(results: &[Characterization]) -> Vec<ExportRecord> {
    results
        .iter()
        .flat_map(|c| c.evidence.iter().map(ExportRecord::from))
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::data::segmenter::PunctuationSegmenter;
    use crate::domain::interpretation::ModelOutput;
    use crate::domain::parse_tree::PhraseNode;
    use crate::domain::sample::LabeledSample;

    /// Root plus one word phrase per sentence.
    struct FakeAnnotator;

    impl TreeAnnotator for FakeAnnotator {
        fn annotate(&self, rows: &[LabeledSample]) -> Result<Vec<ParsedSample>> {
            Ok(rows
                .iter()
                .map(|r| {
                    let first = r.sentence.split_whitespace().next().unwrap_or("").to_string();
                    let node = |label: &str, phrase: String| PhraseNode {
                        phrase_label: label.to_string(),
                        phrase,
                        start: 1,
                        end:   2,
                    };
                    ParsedSample {
                        sentence:   r.sentence.clone(),
                        label:      r.label,
                        input_ids:  vec![101, 104],
                        parse_tree: vec![node("ROOT", r.sentence.clone()), node("W", first)],
                    }
                })
                .collect())
        }
    }

    /// Class-1 probability grows with sentence length; records batch sizes.
    #[derive(Default)]
    struct FakeClassifier {
        batches: RefCell<Vec<usize>>,
    }

    impl Classifier for FakeClassifier {
        fn forward(&self, batch: &[ParsedSample]) -> Result<ModelOutput> {
            self.batches.borrow_mut().push(batch.len());
            let class_probs: Vec<Vec<f32>> = batch
                .iter()
                .map(|s| {
                    let p = (s.sentence.len() as f32 / 100.0).min(1.0);
                    vec![1.0 - p, p]
                })
                .collect();
            Ok(ModelOutput {
                topk_indices: batch.iter().map(|_| vec![1, 0]).collect(),
                phrase_probs: class_probs.iter().map(|p| vec![p.clone(), vec![0.5, 0.5]]).collect(),
                class_probs,
            })
        }
    }

    fn characterizer(dir: &std::path::Path) -> Characterizer<FakeClassifier, FakeAnnotator> {
        Characterizer::new(
            Box::new(PunctuationSegmenter),
            Workspace::new(dir),
            FakeAnnotator,
            FakeClassifier::default(),
            ConceptMap::from_texts(["first concept", "second concept"]),
        )
    }

    #[test]
    fn test_process_wires_evidence_and_max_score() {
        let dir = tempfile::tempdir().unwrap();
        let mut ch = characterizer(dir.path());

        let result = ch.process("Short one. This one is quite a bit longer!", 256, 0).unwrap();
        assert_eq!(result.evidence.len(), 2);
        assert_eq!(result.evidence[0].sentence, "Short one .");
        assert_eq!(result.evidence[0].global_evidence, vec!["second concept", "first concept"]);
        assert_eq!(result.evidence[1].local_evidence[0].phrase, "This");

        let longest = result.evidence.iter().map(|r| r.score).fold(0.0f32, f32::max);
        assert_eq!(result.score, longest);
        assert!(dir.path().join("000000").join("dev.tsv").exists());
    }

    #[test]
    fn test_batch_size_is_capped_by_sentence_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut ch = characterizer(dir.path());
        ch.process("a. b. c.", 256, 0).unwrap();
        ch.process("a. b. c.", 2, 0).unwrap();
        assert_eq!(*ch.classifier.batches.borrow(), vec![3, 2, 1]);
    }

    #[test]
    fn test_each_call_gets_a_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut ch = characterizer(dir.path());
        ch.process("one.", 256, 0).unwrap();
        ch.process("two.", 256, 1).unwrap();
        assert!(dir.path().join("000001").join("dev_with_parse.json").exists());
        assert_eq!(ch.workspace.count(), 2);
    }

    #[test]
    fn test_empty_text_stages_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut ch = characterizer(dir.path());
        let result = ch.process("   ", 256, 0).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.score, 0.0);
        assert_eq!(ch.workspace.count(), 0);
        assert!(ch.classifier.batches.borrow().is_empty());
    }

    #[test]
    fn test_score_samples_keeps_order_across_batches() {
        let annotated = FakeAnnotator
            .annotate(&[LabeledSample::new("x", 0), LabeledSample::new("yy", 0), LabeledSample::new("zzz", 0)])
            .unwrap();
        let map = ConceptMap::from_texts(["a", "b"]);
        let results = score_samples(&FakeClassifier::default(), &map, &annotated, 2).unwrap();
        let sentences: Vec<&str> = results.iter().map(|r| r.sentence.as_str()).collect();
        assert_eq!(sentences, vec!["x", "yy", "zzz"]);
    }

    #[test]
    fn test_load_fails_on_missing_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = CharacterizerConfig {
            checkpoint_dir:  dir.path().join("nope"),
            concept_map:     None,
            save_dir:        Some(dir.path().join("out")),
            split_sentences: true,
        };
        assert!(Characterizer::load(&cfg).is_err());
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_export_records_flatten_sentences() {
        let dir = tempfile::tempdir().unwrap();
        let mut ch = characterizer(dir.path());
        let a = ch.process("one. two.", 256, 0).unwrap();
        let b = ch.process("three.", 256, 0).unwrap();
        let records = export_records(&[a, b]);
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].sentence, "three .");
    }
}
