// ============================================================
// Layer 3 - Domain Layer
// ============================================================
// Plain structs, enums and traits describing what things ARE.
//
// Rules for this layer:
//   - NO burn types
//   - NO file I/O
//   - Only data, validation and abstractions

/// Labeled sentences and per-class buckets
pub mod sample;

/// Split specification, balance policy and the split dataset
pub mod split;

/// Concept index → concept text
pub mod concept;

/// Sentences with phrase structure and token ids
pub mod parse_tree;

/// Model outputs and interpretation results
pub mod interpretation;

/// Seams to external collaborators
pub mod traits;
