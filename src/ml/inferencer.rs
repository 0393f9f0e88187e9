// ============================================================
// Layer 5 - Inferencer
// ============================================================
// Wraps a trained SelfExplainModel behind the Classifier trait.
//
// One forward pass produces everything interpretation needs:
//   class_probs   softmax(logits)                  [N][K]
//   topk_indices  concepts by descending score     [N][≤ GIL_TOP_K]
//   phrase_probs  softmax(lil_logits) per phrase   [N][phrases][K]
//
// Tensors are pulled to the CPU once per batch; top-k is a sort
// over plain vectors.

use anyhow::Result;
use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::activation::softmax,
};

use crate::data::{batcher::SeBatcher, dataset::SeSample};
use crate::domain::interpretation::ModelOutput;
use crate::domain::parse_tree::ParsedSample;
use crate::domain::traits::Classifier;
use crate::infra::checkpoint::CheckpointManager;
use crate::interpret::GIL_TOP_K;
use crate::ml::model::SelfExplainModel;

pub struct Inferencer<B: Backend> {
    model:       SelfExplainModel<B>,
    max_seq_len: usize,
    max_phrases: usize,
    num_classes: usize,
    device:      B::Device,
}

impl<B: Backend> Inferencer<B> {
    pub fn new(
        model:       SelfExplainModel<B>,
        max_seq_len: usize,
        max_phrases: usize,
        num_classes: usize,
        device:      B::Device,
    ) -> Self {
        Self { model, max_seq_len, max_phrases, num_classes, device }
    }

    /// Rebuild the architecture from `train_config.json` and load
    /// the latest weights.
    pub fn from_checkpoint(ckpt_manager: &CheckpointManager, device: B::Device) -> Result<Self> {
        let cfg = ckpt_manager.load_config()?;
        let mut model_cfg = cfg.model_config();
        model_cfg.dropout = 0.0;
        let model: SelfExplainModel<B> = model_cfg.init(&device);
        let model = ckpt_manager.load_model(model, &device)?;
        tracing::info!(
            "Model loaded from checkpoint '{}' ({} concepts)",
            ckpt_manager.dir().display(), model.num_concepts()
        );
        Ok(Self::new(model, cfg.max_seq_len, cfg.max_phrases, cfg.num_classes, device))
    }
}

impl<B: Backend> Classifier for Inferencer<B> {
    fn forward(&self, batch: &[ParsedSample]) -> Result<ModelOutput> {
        if batch.is_empty() {
            return Ok(ModelOutput::default());
        }

        let samples = batch
            .iter()
            .map(|p| SeSample::from_parsed(p, self.max_seq_len, self.max_phrases))
            .collect::<Result<Vec<_>, _>>()?;
        let tensors = SeBatcher::<B>::new(self.device.clone()).batch(samples);
        let num_phrases = tensors.num_phrases.clone();

        let output = self.model.forward(tensors.input_ids, tensors.phrase_weights);
        let [_, max_phrases, _] = output.lil_logits.dims();
        let num_concepts = output.concept_scores.dims()[1];
        let k = self.num_classes;

        let class_probs   = to_vec(softmax(output.logits, 1))?;
        let concept_score = to_vec(output.concept_scores)?;
        let lil_probs     = to_vec(softmax(output.lil_logits, 2))?;

        let class_probs: Vec<Vec<f32>> = class_probs.chunks(k).map(<[f32]>::to_vec).collect();

        let topk_indices = concept_score
            .chunks(num_concepts.max(1))
            .map(|row| top_k(row, GIL_TOP_K))
            .collect();

        let phrase_probs = num_phrases
            .iter()
            .enumerate()
            .map(|(i, &n)| {
                let sample = &lil_probs[i * max_phrases * k..(i + 1) * max_phrases * k];
                sample.chunks(k).take(n).map(<[f32]>::to_vec).collect()
            })
            .collect();

        Ok(ModelOutput { class_probs, topk_indices, phrase_probs })
    }
}

fn to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("Cannot read tensor data: {e:?}"))
}

/// Indices of the `k` largest scores, best first; ties keep index order.
fn top_k(scores: &[f32], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order.truncate(k);
    order
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parse_tree::PhraseNode;
    use crate::ml::model::SelfExplainConfig;

    impl ModelOutput {
        fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    type TestBackend = burn::backend::NdArray;

    fn parsed(ids: &[u32], phrases: usize) -> ParsedSample {
        ParsedSample {
            sentence:   "the cat sat".to_string(),
            label:      0,
            input_ids:  ids.to_vec(),
            parse_tree: (0..phrases)
                .map(|i| PhraseNode {
                    phrase_label: "W".to_string(),
                    phrase:       format!("p{i}"),
                    start:        1,
                    end:          2 + i.min(ids.len() - 2),
                })
                .collect(),
        }
    }

    fn inferencer(num_concepts: usize) -> Inferencer<TestBackend> {
        let device = Default::default();
        let model = SelfExplainConfig::new(120, 8, 16, 2, 1, 32, 0.0, 2, num_concepts).init(&device);
        Inferencer::new(model, 8, 4, 2, device)
    }

    #[test]
    fn test_top_k_orders_by_score() {
        assert_eq!(top_k(&[0.1, 0.9, 0.5, 0.9], 3), vec![1, 3, 2]);
        assert_eq!(top_k(&[0.3], 10), vec![0]);
    }

    #[test]
    fn test_forward_shapes_follow_batch() {
        let inf = inferencer(12);
        let out = inf
            .forward(&[parsed(&[101, 104, 105, 106], 3), parsed(&[101, 107], 1)])
            .unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out.class_probs[0].len(), 2);
        let sum: f32 = out.class_probs[1].iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);

        assert_eq!(out.topk_indices[0].len(), GIL_TOP_K);
        assert!(out.topk_indices[0].iter().all(|&i| i < 12));

        assert_eq!(out.phrase_probs[0].len(), 3);
        assert_eq!(out.phrase_probs[1].len(), 1);
        assert_eq!(out.phrase_probs[0][2].len(), 2);
    }

    #[test]
    fn test_phrases_are_capped() {
        let inf = inferencer(3);
        let out = inf.forward(&[parsed(&[101, 104, 105, 106], 7)]).unwrap();
        assert_eq!(out.phrase_probs[0].len(), 4);
        assert_eq!(out.topk_indices[0].len(), 3);
    }

    #[test]
    fn test_empty_batch() {
        let out = inferencer(3).forward(&[]).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_missing_input_ids_is_an_error() {
        let mut sample = parsed(&[101, 104], 1);
        sample.input_ids.clear();
        assert!(inferencer(3).forward(&[sample]).is_err());
    }
}
