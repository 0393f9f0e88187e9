// ============================================================
// Layer 5 - Training Loop
// ============================================================
// Full train + validation loop using Burn's DataLoader and Adam.
//
// Order of work:
//   1. build the model from TrainConfig
//   2. encode every concept text once (no dropout) and install
//      the result as the concept store
//   3. per epoch: train, validate, log metrics, save checkpoint
//
// Backends:
//   - training runs on B (an AutodiffBackend)
//   - model.valid() returns the model on B::InnerBackend, so
//     the validation batcher uses the inner backend too
//   - argmax(1) returns [batch, 1] so we flatten before .equal()

use anyhow::Result;
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::{SeBatch, SeBatcher},
    dataset::SeDataset,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::model::SelfExplainModel;
use crate::ml::TrainBackend;

pub fn run_training(
    cfg:           &TrainConfig,
    train_dataset: SeDataset,
    val_dataset:   SeDataset,
    concept_ids:   &[Vec<u32>],
    ckpt_manager:  &CheckpointManager,
    metrics:       &MetricsLogger,
) -> Result<()> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);
    train_loop::<TrainBackend>(cfg, train_dataset, val_dataset, concept_ids, ckpt_manager, metrics, device)
}

pub fn train_loop<B: AutodiffBackend>(
    cfg:           &TrainConfig,
    train_dataset: SeDataset,
    val_dataset:   SeDataset,
    concept_ids:   &[Vec<u32>],
    ckpt_manager:  &CheckpointManager,
    metrics:       &MetricsLogger,
    device:        B::Device,
) -> Result<()> {
    B::seed(cfg.seed);

    // ── Build model ───────────────────────────────────────────────────────────
    let model: SelfExplainModel<B> = cfg.model_config().init(&device);
    let store = encode_concepts(&model.valid(), concept_ids, cfg.batch_size, &device);
    let mut model = model.with_concept_store(Tensor::from_inner(store));
    tracing::info!(
        "Model ready: {} layers, d_model={}, {} concepts",
        cfg.num_layers, cfg.d_model, model.num_concepts()
    );

    // ── Adam optimiser ────────────────────────────────────────────────────────
    let mut optim = AdamConfig::new().with_epsilon(1e-8).init();

    // ── Data loaders ──────────────────────────────────────────────────────────
    let train_loader = DataLoaderBuilder::new(SeBatcher::<B>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(1)
        .build(train_dataset);

    let val_loader = DataLoaderBuilder::new(SeBatcher::<B::InnerBackend>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .num_workers(1)
        .build(val_dataset);

    let mut best_val_loss = f64::INFINITY;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {

        // ── Training phase ────────────────────────────────────────────────────
        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;

        for batch in train_loader.iter() {
            let (loss, _) = model.forward_loss(batch);

            train_loss_sum += loss.clone().into_scalar().elem::<f64>();
            train_batches  += 1;

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.lr, model, grads);
        }

        let avg_train_loss = if train_batches > 0 {
            train_loss_sum / train_batches as f64
        } else { f64::NAN };

        // ── Validation phase ──────────────────────────────────────────────────
        let model_valid = model.valid();

        let mut val_loss_sum  = 0.0f64;
        let mut val_batches   = 0usize;
        let mut correct       = 0usize;
        let mut total_samples = 0usize;

        for batch in val_loader.iter() {
            let (loss, batch_correct, batch_size) = validate_batch(&model_valid, batch);
            val_loss_sum  += loss;
            val_batches   += 1;
            correct       += batch_correct;
            total_samples += batch_size;
        }

        let avg_val_loss = if val_batches   > 0 { val_loss_sum / val_batches as f64 } else { f64::NAN };
        let val_acc      = if total_samples > 0 { correct as f64 / total_samples as f64 } else { 0.0 };

        let row = EpochMetrics::new(epoch, avg_train_loss, avg_val_loss, val_acc);
        tracing::info!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4} | val_acc={:.1}%",
            epoch, cfg.epochs, avg_train_loss, avg_val_loss, val_acc * 100.0,
        );
        if row.is_improvement(best_val_loss) {
            best_val_loss = row.val_loss;
            tracing::debug!("New best val_loss at epoch {}", epoch);
        }
        metrics.log(&row)?;

        ckpt_manager.save_model(&model, epoch)?;
        tracing::info!("Checkpoint saved for epoch {}", epoch);
    }

    tracing::info!("Training complete! Metrics in {}", metrics.csv_path().display());
    Ok(())
}

/// Loss, correct predictions and sample count for one batch.
fn validate_batch<B: Backend>(model: &SelfExplainModel<B>, batch: SeBatch<B>) -> (f64, usize, usize) {
    let labels     = batch.labels.clone();
    let batch_size = labels.dims()[0];
    let (loss, output) = model.forward_loss(batch);

    let predicted = output.logits.argmax(1).flatten::<1>(0, 1);
    let correct: i64 = predicted.equal(labels).int().sum().into_scalar().elem::<i64>();

    (loss.into_scalar().elem::<f64>(), correct as usize, batch_size)
}

/// Pooled [CLS] vectors for padded concept token ids, `[concepts, d_model]`.
pub fn encode_concepts<B: Backend>(
    model:       &SelfExplainModel<B>,
    concept_ids: &[Vec<u32>],
    batch_size:  usize,
    device:      &B::Device,
) -> Tensor<B, 2> {
    let chunks: Vec<Tensor<B, 2>> = concept_ids
        .chunks(batch_size.max(1))
        .map(|chunk| {
            let seq_len = chunk[0].len();
            let flat: Vec<i32> = chunk.iter().flatten().map(|&id| id as i32).collect();
            let ids = Tensor::<B, 1, Int>::from_ints(flat.as_slice(), device)
                .reshape([chunk.len(), seq_len]);
            model.encode_pooled(ids).detach()
        })
        .collect();
    tracing::debug!("Encoded {} concepts in {} batches", concept_ids.len(), chunks.len());
    Tensor::cat(chunks, 0)
}
