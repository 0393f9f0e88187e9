// ============================================================
// Layer 5 - ML / Model Layer (Burn)
// ============================================================
// All Burn model code lives here. The data layer only builds
// tensors (batcher) and the interpretation layer only sees
// plain vectors (ModelOutput).
//
//   model.rs      - encoder + classifier, GIL head over the
//                   concept store, LIL head over phrases
//
//   trainer.rs    - concept store encoding, Adam epoch loop,
//                   validation, metrics and checkpoints
//
//   inferencer.rs - loads a checkpoint and implements the
//                   Classifier trait: softmax probabilities,
//                   top-k concept indices, per-phrase
//                   perturbed probabilities
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// Self-explaining transformer classifier
pub mod model;

/// Training loop with validation and checkpointing
pub mod trainer;

/// Checkpoint-backed Classifier implementation
pub mod inferencer;

/// Backend used for training (gradients enabled).
pub type TrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

/// Backend used for evaluation and characterization.
pub type InferBackend = burn::backend::Wgpu;
