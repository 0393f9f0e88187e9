// ============================================================
// Layer 3 - Model Output and Interpretation Results
// ============================================================
// ModelOutput is what a classifier hands back for one batch,
// already converted to plain Rust vectors so the interpretation
// code never touches tensors.
//
// InterpretationResult is the per-sentence explanation:
//   - global evidence: concepts the model attended to most
//   - local evidence:  phrases ranked by perturbation relevance

use serde::{Deserialize, Serialize};

/// Probabilities and attention indices for one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelOutput {
    /// `[batch][class]` softmax over the classifier logits.
    pub class_probs:  Vec<Vec<f32>>,
    /// `[batch][rank]` concept indices, most attended first.
    pub topk_indices: Vec<Vec<usize>>,
    /// `[batch][phrase][class]` softmax with each phrase perturbed out.
    pub phrase_probs: Vec<Vec<Vec<f32>>>,
}

impl ModelOutput {
    pub fn len(&self) -> usize {
        self.class_probs.len()
    }
}

/// A phrase and how much it moved the predicted class probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseRelevance {
    pub phrase:    String,
    pub relevance: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpretationResult {
    pub sentence:        String,
    pub predicted_label: usize,
    /// Probability of class 1.
    pub score:           f32,
    pub global_evidence: Vec<String>,
    pub local_evidence:  Vec<PhraseRelevance>,
}

/// Result of characterising a whole text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Characterization {
    /// Highest class-1 probability over all sentences.
    pub score:    f32,
    /// One entry per sentence, in segmentation order.
    pub evidence: Vec<InterpretationResult>,
}

impl Characterization {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Max-pool sentence scores: the most alarming sentence decides.
    pub fn from_results(evidence: Vec<InterpretationResult>) -> Self {
        let score = evidence
            .iter()
            .map(|r| r.score)
            .fold(None, |acc: Option<f32>, s| Some(acc.map_or(s, |a| a.max(s))))
            .unwrap_or(0.0);
        Self { score, evidence }
    }

    pub fn is_empty(&self) -> bool {
        self.evidence.is_empty()
    }
}

/// One row of the JSON result export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub sentence: String,
    pub label:    usize,
    pub prob:     f32,
    pub evidence: ExportEvidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportEvidence {
    pub global: Vec<String>,
    pub local:  Vec<PhraseRelevance>,
}

impl From<&InterpretationResult> for ExportRecord {
    fn from(r: &InterpretationResult) -> Self {
        Self {
            sentence: r.sentence.clone(),
            label:    r.predicted_label,
            prob:     r.score,
            evidence: ExportEvidence {
                global: r.global_evidence.clone(),
                local:  r.local_evidence.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(score: f32) -> InterpretationResult {
        InterpretationResult {
            sentence:        format!("s{score}"),
            predicted_label: usize::from(score > 0.5),
            score,
            global_evidence: vec![],
            local_evidence:  vec![],
        }
    }

    #[test]
    fn test_score_is_max_over_sentences() {
        let c = Characterization::from_results(vec![result(0.2), result(0.9), result(0.4)]);
        assert_eq!(c.score, 0.9);
        assert_eq!(c.evidence.len(), 3);
    }

    #[test]
    fn test_empty_results_score_zero() {
        let c = Characterization::from_results(vec![]);
        assert_eq!(c, Characterization::empty());
    }
}
