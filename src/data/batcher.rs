// ============================================================
// Layer 4 - Self-Explaining Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<SeSample> into
// tensors for the model forward pass.
//
// How batching works here:
//   Input:  N SeSamples, each padded to S tokens, with up to
//           P phrases (P = most phrases in this batch)
//   Output: SeBatch with
//             input_ids      [N, S]
//             phrase_weights [N, P, S]  row p averages phrase p's tokens
//             phrase_mask    [N, P]     1 = real phrase, 0 = padding
//             labels         [N]
//
// phrase_weights is the span-averaging matrix: multiplying it
// with the encoder states [N, S, D] gives phrase vectors [N, P, D].
// An empty span gives an all-zero row.

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::SeSample;

// ─── SeBatch ──────────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct SeBatch<B: Backend> {
    pub input_ids:      Tensor<B, 2, Int>,
    pub phrase_weights: Tensor<B, 3>,
    pub phrase_mask:    Tensor<B, 2>,
    pub labels:         Tensor<B, 1, Int>,
    /// Real phrase count per sample, root included.
    pub num_phrases:    Vec<usize>,
}

// ─── SeBatcher ────────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct SeBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> SeBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

/// Flat `[N * P * S]` span-averaging weights.
fn phrase_weight_matrix(items: &[SeSample], num_phrases: usize, seq_len: usize) -> Vec<f32> {
    let mut weights = vec![0.0f32; items.len() * num_phrases * seq_len];
    for (i, item) in items.iter().enumerate() {
        for (p, &(start, end)) in item.phrases.iter().enumerate() {
            let end = end.min(seq_len);
            if start >= end {
                continue;
            }
            let w   = 1.0 / (end - start) as f32;
            let row = (i * num_phrases + p) * seq_len;
            weights[row + start..row + end].fill(w);
        }
    }
    weights
}

impl<B: Backend> Batcher<SeSample, SeBatch<B>> for SeBatcher<B> {
    fn batch(&self, items: Vec<SeSample>) -> SeBatch<B> {
        let batch_size  = items.len();
        let seq_len     = items.first().map_or(0, |s| s.input_ids.len());
        let num_phrases = items.iter().map(|s| s.phrases.len()).max().unwrap_or(0).max(1);

        // ── Flatten input_ids ─────────────────────────────────────────────────
        let input_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.input_ids.iter().map(|&x| x as i32))
            .collect();

        // ── Phrase weights and mask ───────────────────────────────────────────
        let weights = phrase_weight_matrix(&items, num_phrases, seq_len);
        let mask_flat: Vec<f32> = items
            .iter()
            .flat_map(|s| (0..num_phrases).map(move |p| if p < s.phrases.len() { 1.0 } else { 0.0 }))
            .collect();

        let labels: Vec<i32> = items.iter().map(|s| s.label as i32).collect();

        // ── Create tensors ────────────────────────────────────────────────────
        let input_ids = Tensor::<B, 1, Int>::from_ints(input_flat.as_slice(), &self.device)
            .reshape([batch_size, seq_len]);

        let phrase_weights = Tensor::<B, 1>::from_floats(weights.as_slice(), &self.device)
            .reshape([batch_size, num_phrases, seq_len]);

        let phrase_mask = Tensor::<B, 1>::from_floats(mask_flat.as_slice(), &self.device)
            .reshape([batch_size, num_phrases]);

        let labels = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device);

        SeBatch {
            input_ids,
            phrase_weights,
            phrase_mask,
            labels,
            num_phrases: items.iter().map(|s| s.phrases.len()).collect(),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    fn sample(ids: Vec<u32>, phrases: Vec<(usize, usize)>) -> SeSample {
        SeSample { input_ids: ids, phrases, label: 1 }
    }

    #[test]
    fn test_weights_average_each_span() {
        let items = vec![sample(vec![101, 5, 6, 0], vec![(1, 3), (2, 3)])];
        let w = phrase_weight_matrix(&items, 2, 4);
        assert_eq!(w, vec![0.0, 0.5, 0.5, 0.0, 0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_empty_span_is_a_zero_row() {
        let items = vec![sample(vec![101, 0], vec![(1, 1)])];
        assert_eq!(phrase_weight_matrix(&items, 1, 2), vec![0.0, 0.0]);
    }

    #[test]
    fn test_batch_shapes_follow_longest_phrase_list() {
        let batcher = SeBatcher::<TestBackend>::new(Default::default());
        let batch = batcher.batch(vec![
            sample(vec![101, 5, 6], vec![(1, 3)]),
            sample(vec![101, 7, 0], vec![(1, 2), (1, 2), (1, 2)]),
        ]);
        assert_eq!(batch.input_ids.dims(), [2, 3]);
        assert_eq!(batch.phrase_weights.dims(), [2, 3, 3]);
        assert_eq!(batch.phrase_mask.dims(), [2, 3]);
        assert_eq!(batch.labels.dims(), [2]);
        assert_eq!(batch.num_phrases, vec![1, 3]);

        let mask = batch.phrase_mask.into_data().to_vec::<f32>().unwrap();
        assert_eq!(mask, vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
    }
}
