// ============================================================
// Layer 5 - Interpretation Extraction
// ============================================================
// Turns one batch of model output into per-sentence evidence.
//
//   gil → global evidence: the concepts the model attended to,
//         looked up in the concept map (≤ 10 per sentence)
//   lil → local evidence: phrases ranked by how much perturbing
//         them moves the predicted class probability (≤ 5)
//
// Everything here is a pure function of its inputs. No tensors,
// no files, no model: ModelOutput is already plain vectors.

/// Concept index → concept text for the top-k attention indices
pub mod gil;

/// Phrase relevance from perturbed class probabilities
pub mod lil;

pub use gil::{gil_interpret, GIL_TOP_K};
pub use lil::{argmax, lil_interpret};

use crate::domain::concept::ConceptMap;
use crate::domain::interpretation::{InterpretationResult, ModelOutput};
use crate::domain::parse_tree::ParsedSample;
use crate::error::DataError;

/// Class-1 probability, the score reported for binary detectors.
pub fn positive_score(probs: &[f32]) -> f32 {
    probs.get(1).copied().unwrap_or(0.0)
}

/// Combine GIL and LIL for one batch, in batch order.
pub fn interpret_batch(
    concept_map: &ConceptMap,
    samples:     &[ParsedSample],
    output:      &ModelOutput,
) -> Result<Vec<InterpretationResult>, DataError> {
    if output.len() != samples.len() {
        return Err(DataError::Misaligned {
            what:     "class probabilities",
            expected: samples.len(),
            found:    output.len(),
        });
    }

    let phrases: Vec<Vec<String>> = samples.iter().map(ParsedSample::phrases).collect();
    let global = gil_interpret(concept_map, &output.topk_indices)?;
    let local  = lil_interpret(&output.class_probs, &output.phrase_probs, &phrases)?;

    // gil_interpret returns one entry per topk row; lil checked the rest
    if global.len() != samples.len() {
        return Err(DataError::Misaligned {
            what:     "top-k indices",
            expected: samples.len(),
            found:    global.len(),
        });
    }

    Ok(samples
        .iter()
        .zip(&output.class_probs)
        .zip(global.into_iter().zip(local))
        .map(|((sample, probs), (global_evidence, local_evidence))| InterpretationResult {
            sentence:        sample.sentence.clone(),
            predicted_label: argmax(probs).unwrap_or(0),
            score:           positive_score(probs),
            global_evidence,
            local_evidence,
        })
        .collect())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parse_tree::PhraseNode;

    fn parsed(sentence: &str, phrases: &[&str]) -> ParsedSample {
        let mut parse_tree = vec![PhraseNode {
            phrase_label: "ROOT".into(),
            phrase:       sentence.into(),
            start:        1,
            end:          1,
        }];
        parse_tree.extend(phrases.iter().map(|p| PhraseNode {
            phrase_label: "W".into(),
            phrase:       (*p).into(),
            start:        1,
            end:          2,
        }));
        ParsedSample { sentence: sentence.into(), label: 0, input_ids: vec![], parse_tree }
    }

    #[test]
    fn test_batch_results_carry_both_evidence_kinds() {
        let concepts = ConceptMap::from_texts(["the cat", "ran fast"]);
        let samples  = vec![parsed("the cat ran fast", &["cat", "fast"])];
        let output   = ModelOutput {
            class_probs:  vec![vec![0.3, 0.7]],
            topk_indices: vec![vec![1, 0]],
            phrase_probs: vec![vec![vec![0.3, 0.7], vec![0.6, 0.4], vec![0.2, 0.8]]],
        };

        let results = interpret_batch(&concepts, &samples, &output).unwrap();
        assert_eq!(results.len(), 1);
        let r = &results[0];
        assert_eq!(r.predicted_label, 1);
        assert_eq!(r.score, 0.7);
        assert_eq!(r.global_evidence, vec!["ran fast", "the cat"]);
        assert_eq!(r.local_evidence[0].phrase, "fast");
        assert_eq!(r.local_evidence[1].phrase, "cat");
    }

    #[test]
    fn test_sample_count_mismatch_is_an_error() {
        let concepts = ConceptMap::from_texts(["a"]);
        let samples  = vec![parsed("a", &[]), parsed("b", &[])];
        let output   = ModelOutput {
            class_probs:  vec![vec![0.5, 0.5]],
            topk_indices: vec![vec![0]],
            phrase_probs: vec![vec![]],
        };
        assert!(matches!(
            interpret_batch(&concepts, &samples, &output),
            Err(DataError::Misaligned { expected: 2, found: 1, .. })
        ));
    }

    #[test]
    fn test_single_class_scores_zero() {
        assert_eq!(positive_score(&[1.0]), 0.0);
        assert_eq!(positive_score(&[0.1, 0.9]), 0.9);
    }
}
