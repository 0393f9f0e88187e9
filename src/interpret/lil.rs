// Local interpretation: rank phrases by how much perturbing
// them changes the probability of the predicted class.
//
//   relevance(p) = perturbed[p][argmax] - base[argmax]
//
// Index 0 of every phrase list is the whole sentence and is never
// ranked. A phrase text seen twice keeps its first position and
// its last score. Phrases past the end of the perturbed rows (the
// model caps phrases per sentence) are not scored.

use indexmap::IndexMap;

use crate::domain::interpretation::PhraseRelevance;
use crate::error::DataError;

/// Phrases kept per sentence.
pub const LIL_TOP_K: usize = 5;

/// Index of the largest value; the first one wins a tie.
pub fn argmax(values: &[f32]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

fn check_len(what: &'static str, expected: usize, found: usize) -> Result<(), DataError> {
    if expected == found {
        Ok(())
    } else {
        Err(DataError::Misaligned { what, expected, found })
    }
}

pub fn lil_interpret(
    class_probs:  &[Vec<f32>],
    phrase_probs: &[Vec<Vec<f32>>],
    phrases:      &[Vec<String>],
) -> Result<Vec<Vec<PhraseRelevance>>, DataError> {
    check_len("perturbed probabilities", class_probs.len(), phrase_probs.len())?;
    check_len("phrase sequences", class_probs.len(), phrases.len())?;

    class_probs
        .iter()
        .zip(phrase_probs)
        .zip(phrases)
        .map(|((base, perturbed), texts)| rank_phrases(base, perturbed, texts))
        .collect()
}

fn rank_phrases(
    base:      &[f32],
    perturbed: &[Vec<f32>],
    texts:     &[String],
) -> Result<Vec<PhraseRelevance>, DataError> {
    let Some(predicted) = argmax(base) else {
        return Ok(Vec::new());
    };
    let base_prob = base[predicted];

    let mut scores: IndexMap<&str, f32> = IndexMap::new();
    for (text, probs) in texts.iter().zip(perturbed).skip(1) {
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        let prob = probs.get(predicted).copied().ok_or(DataError::Misaligned {
            what:     "perturbed class probabilities",
            expected: base.len(),
            found:    probs.len(),
        })?;
        scores.insert(text, prob - base_prob);
    }

    let mut ranked: Vec<PhraseRelevance> = scores
        .into_iter()
        .map(|(phrase, relevance)| PhraseRelevance { phrase: phrase.to_string(), relevance })
        .collect();
    ranked.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
    ranked.truncate(LIL_TOP_K);
    Ok(ranked)
}
