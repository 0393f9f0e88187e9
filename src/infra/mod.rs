// ============================================================
// Layer 6 - Infrastructure Layer
// ============================================================
// Files on disk that several other layers share:
//
//   checkpoint.rs      - model weights (CompactRecorder), the
//                        latest-epoch pointer, train_config.json
//                        and the files copied next to them
//
//   tokenizer_store.rs - word-level tokenizer built from the
//                        training split, saved as tokenizer.json
//
//   metrics.rs         - per-epoch metrics CSV
//
//   workspace.rs       - numbered staging directories for the
//                        characterizer
//
//   manifest.rs        - model.json for exported bundles, with
//                        paths stored relative to the manifest

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Tokenizer building, saving, and loading
pub mod tokenizer_store;

/// Training metrics CSV logger
pub mod metrics;

/// Staging directories for characterizer calls
pub mod workspace;

/// Export manifest with relative paths
pub mod manifest;
