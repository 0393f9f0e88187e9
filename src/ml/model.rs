// ============================================================
// Layer 5 - Self-Explaining Transformer Classifier
// ============================================================
// A transformer encoder with a classification head and two
// interpretation heads:
//
//   input_ids ──► token + position embeddings ──► N encoder blocks
//                                                 │
//                         hidden [B, S, D] ◄──────┘
//                            │
//          ┌─────────────────┼──────────────────────────┐
//          ▼                 ▼                          ▼
//   pooled = hidden[:, 0]   GIL                        LIL
//   classifier(pooled)      scores = pooled·Cᵀ/√D      phrase = W·hidden   [B, P, D]
//      → logits [B, K]      attn = softmax(scores)     gil/lil heads read
//                           gil_logits =               (pooled - phrase)
//                           gil_head(attn·C)             → lil_logits [B, P, K]
//
// C is the concept store, one row per concept in the concept
// map. It is filled once by encoding the concept texts and is
// not updated by the optimiser.

use burn::{
    module::Param,
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        loss::CrossEntropyLossConfig,
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::{activation::softmax, Distribution},
};

use crate::data::batcher::SeBatch;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally - do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct SelfExplainConfig {
    pub vocab_size:   usize,
    pub max_seq_len:  usize,
    pub d_model:      usize,
    pub num_heads:    usize,
    pub num_layers:   usize,
    pub d_ff:         usize,
    pub dropout:      f64,
    pub num_classes:  usize,
    pub num_concepts: usize,
    #[config(default = 0.01)]
    pub gil_weight:   f64,
    #[config(default = 0.01)]
    pub lil_weight:   f64,
}

impl SelfExplainConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SelfExplainModel<B> {
        let token_embedding    = EmbeddingConfig::new(self.vocab_size, self.d_model).init(device);
        let position_embedding = EmbeddingConfig::new(self.max_seq_len, self.d_model).init(device);
        let layers: Vec<EncoderBlock<B>> = (0..self.num_layers)
            .map(|_| self.build_encoder_block(device))
            .collect();
        let final_norm = LayerNormConfig::new(self.d_model).init(device);
        let classifier = LinearConfig::new(self.d_model, self.num_classes).init(device);
        let gil_head   = LinearConfig::new(self.d_model, self.num_classes).init(device);
        let lil_head   = LinearConfig::new(self.d_model, self.num_classes).init(device);
        let dropout    = DropoutConfig::new(self.dropout).init();

        let concept_store = Param::from_tensor(Tensor::random(
            [self.num_concepts, self.d_model],
            Distribution::Normal(0.0, 0.02),
            device,
        ));

        SelfExplainModel {
            token_embedding, position_embedding, layers, final_norm,
            classifier, gil_head, lil_head, concept_store, dropout,
            d_model:    self.d_model,
            gil_weight: self.gil_weight,
            lil_weight: self.lil_weight,
        }
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        let self_attn   = MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
            .with_dropout(self.dropout)
            .init(device);
        let ffn_linear1 = LinearConfig::new(self.d_model, self.d_ff).init(device);
        let ffn_linear2 = LinearConfig::new(self.d_ff, self.d_model).init(device);
        let norm1   = LayerNormConfig::new(self.d_model).init(device);
        let norm2   = LayerNormConfig::new(self.d_model).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        EncoderBlock { self_attn, ffn_linear1, ffn_linear2, norm1, norm2, dropout }
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    /// `pad_mask` is true at [PAD] positions, which attention ignores.
    pub fn forward(&self, x: Tensor<B, 3>, pad_mask: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let attn_output = self
            .self_attn
            .forward(MhaInput::self_attn(x.clone()).mask_pad(pad_mask))
            .context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));
        let ffn_out = self.ffn_linear2.forward(
            burn::tensor::activation::gelu(self.ffn_linear1.forward(x.clone()))
        );
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }
}

#[derive(Module, Debug)]
pub struct SelfExplainModel<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub layers:             Vec<EncoderBlock<B>>,
    pub final_norm:         LayerNorm<B>,
    pub classifier:         Linear<B>,
    pub gil_head:           Linear<B>,
    pub lil_head:           Linear<B>,
    pub concept_store:      Param<Tensor<B, 2>>,
    pub dropout:            Dropout,
    pub d_model:            usize,
    pub gil_weight:         f64,
    pub lil_weight:         f64,
}

pub struct SelfExplainOutput<B: Backend> {
    /// `[batch, classes]`
    pub logits:         Tensor<B, 2>,
    /// `[batch, concepts]` scaled similarity to each stored concept.
    pub concept_scores: Tensor<B, 2>,
    /// `[batch, classes]`
    pub gil_logits:     Tensor<B, 2>,
    /// `[batch, phrases, classes]` with each phrase taken out.
    pub lil_logits:     Tensor<B, 3>,
}

impl<B: Backend> SelfExplainModel<B> {
    /// input_ids: [batch, seq_len] → hidden states [batch, seq_len, d_model]
    pub fn encode(&self, input_ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [batch_size, seq_len] = input_ids.dims();
        let pad_mask = input_ids.clone().equal_elem(0);

        let tok_emb = self.token_embedding.forward(input_ids);

        // Self-attention is permutation-invariant, so position must be injected explicitly.
        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &tok_emb.device())
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let pos_emb = self.position_embedding.forward(positions);

        let mut x = self.dropout.forward(tok_emb + pos_emb);
        for layer in &self.layers {
            x = layer.forward(x, pad_mask.clone());
        }
        self.final_norm.forward(x)
    }

    /// The [CLS] state: [batch, d_model].
    pub fn encode_pooled(&self, input_ids: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        pool_cls(self.encode(input_ids))
    }

    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        phrase_weights: Tensor<B, 3>,
    ) -> SelfExplainOutput<B> {
        let hidden = self.encode(input_ids);
        let [batch_size, _, d_model] = hidden.dims();
        let pooled = pool_cls(hidden.clone());
        let logits = self.classifier.forward(pooled.clone());

        // ── GIL: attention over the concept store ─────────────────────────────
        let store = self.concept_store.val().detach();
        let concept_scores = pooled
            .clone()
            .matmul(store.clone().transpose())
            .div_scalar((d_model as f64).sqrt());
        let concept_attn = softmax(concept_scores.clone(), 1);
        let gil_logits   = self.gil_head.forward(concept_attn.matmul(store));

        // ── LIL: classify the sentence with each phrase taken out ─────────────
        let phrase_reps = phrase_weights.matmul(hidden); // [batch, phrases, d_model]
        let [_, num_phrases, _] = phrase_reps.dims();
        let perturbed = pooled
            .unsqueeze_dim::<3>(1)
            .expand([batch_size, num_phrases, d_model])
            - phrase_reps;
        let lil_logits = self.lil_head.forward(perturbed);

        SelfExplainOutput { logits, concept_scores, gil_logits, lil_logits }
    }

    /// Loss = CE(logits) + gil_weight·CE(gil_logits) + lil_weight·CE(mean phrase logits)
    pub fn forward_loss(&self, batch: SeBatch<B>) -> (Tensor<B, 1>, SelfExplainOutput<B>) {
        let output = self.forward(batch.input_ids, batch.phrase_weights);
        let ce = CrossEntropyLossConfig::new().init(&output.logits.device());

        let lil_mean = masked_phrase_mean(output.lil_logits.clone(), batch.phrase_mask);

        let loss = ce.forward(output.logits.clone(), batch.labels.clone())
            + ce.forward(output.gil_logits.clone(), batch.labels.clone()).mul_scalar(self.gil_weight)
            + ce.forward(lil_mean, batch.labels).mul_scalar(self.lil_weight);
        (loss, output)
    }

    /// Replace the concept store with encoded concept vectors.
    pub fn with_concept_store(mut self, store: Tensor<B, 2>) -> Self {
        self.concept_store = Param::from_tensor(store.detach());
        self
    }

    pub fn num_concepts(&self) -> usize {
        self.concept_store.val().dims()[0]
    }
}

fn pool_cls<B: Backend>(hidden: Tensor<B, 3>) -> Tensor<B, 2> {
    let [batch_size, _, d_model] = hidden.dims();
    hidden
        .slice([0..batch_size, 0..1, 0..d_model])
        .reshape([batch_size, d_model])
}

/// Mean of `[batch, phrases, classes]` over real phrases only.
fn masked_phrase_mean<B: Backend>(logits: Tensor<B, 3>, mask: Tensor<B, 2>) -> Tensor<B, 2> {
    let [batch_size, num_phrases, num_classes] = logits.dims();
    let counts = mask.clone().sum_dim(1).clamp_min(1.0); // [batch, 1]
    let mask   = mask.unsqueeze_dim::<3>(2).expand([batch_size, num_phrases, num_classes]);
    (logits * mask)
        .sum_dim(1)
        .reshape([batch_size, num_classes])
        .div(counts.expand([batch_size, num_classes]))
}
