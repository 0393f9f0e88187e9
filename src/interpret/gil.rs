// Global interpretation: the model's top-k concept indices,
// most attended first, mapped to concept text.

use crate::domain::concept::ConceptMap;
use crate::error::DataError;

/// Concepts kept per sentence.
pub const GIL_TOP_K: usize = 10;

/// Map each sample's ranked indices through `concept_map` and keep
/// the first `GIL_TOP_K`. Every index is looked up, so a stale
/// concept store fails loudly even past the cut-off.
pub fn gil_interpret(
    concept_map:  &ConceptMap,
    topk_indices: &[Vec<usize>],
) -> Result<Vec<Vec<String>>, DataError> {
    topk_indices
        .iter()
        .map(|ranked| {
            let mut concepts = ranked
                .iter()
                .map(|&index| concept_map.lookup(index).map(str::to_string))
                .collect::<Result<Vec<_>, _>>()?;
            concepts.truncate(GIL_TOP_K);
            Ok(concepts)
        })
        .collect()
}
