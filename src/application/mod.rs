// ============================================================
// Layer 2 - Application / Use Cases
// ============================================================
// Each use case takes a plain config struct (built from CLI
// arguments in Layer 1) and coordinates the other layers.
//
//   import     raw corpus      → balanced split TSVs
//   parse      split TSVs      → tokenizer + parse-tree JSONL
//   concepts   train split     → concept_idx.json
//   train      parsed splits   → checkpoint directory
//   evaluate   checkpoint      → accuracy + interpretation TSV
//   characterizer  raw text    → score + per-sentence evidence
//   export     checkpoint      → relocatable model bundle
//
// No model math here and no printing; only workflow.

pub mod import_use_case;

pub mod parse_use_case;

pub mod concept_use_case;

/// Training workflow and TrainConfig
pub mod train_use_case;

pub mod evaluate_use_case;

/// Scoring and explaining raw text
pub mod characterizer;

pub mod export_use_case;
