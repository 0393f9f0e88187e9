// ============================================================
// Layer 4 - Data Pipeline
// ============================================================
// Everything from a raw corpus to GPU-ready tensor batches.
//
//   raw corpus (csv / json / txt)
//       │
//       ▼
//   importer          → class buckets of cleaned sentences
//       │               (preprocessor, segmenter)
//       ▼
//   splitter          → balanced, ordered split windows
//       │
//       ▼
//   split_store       → train.tsv / dev.tsv / test.tsv (.gz)
//       │
//       ▼
//   parse_stage       → token ids + phrase spans, *_with_parse.json
//       │               concepts → concept_idx.json
//       ▼
//   SeDataset         → implements Burn's Dataset trait
//       │
//       ▼
//   SeBatcher         → pads ids and phrase masks into tensors
//
// Each module owns one step and is tested on its own.

/// Plain or gzip file handles chosen by extension
pub mod gz;

/// Whitespace and control-character cleanup
pub mod preprocessor;

/// Text → sentences
pub mod segmenter;

/// Corpus readers for each supported source
pub mod importer;

/// Balanced split builder
pub mod splitter;

/// Reading and writing split TSVs
pub mod split_store;

/// Phrase chunking, tokenization and parse-tree files
pub mod parse_stage;

/// Concept extraction and the concept map file
pub mod concepts;

/// Implements Burn's Dataset trait for parsed samples
pub mod dataset;

/// Implements Burn's Batcher trait for parsed samples
pub mod batcher;
