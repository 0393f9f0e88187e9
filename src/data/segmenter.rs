// ============================================================
// Layer 4 - Sentence Segmenter
// ============================================================
// Two SentenceSegmenter implementations:
//
//   PunctuationSegmenter → breaks after `.` `?` `!` and pads
//                          punctuation and apostrophes with a
//                          leading space, so "don't stop." becomes
//                          the unit "don 't stop ."
//   WholeTextSegmenter   → the whole text is one unit
//
// Blank units are dropped by both, which is how text with no
// content ends up with zero sentences.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::domain::traits::SentenceSegmenter;

static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.?!']").expect("punctuation pattern is valid"));

// ─── PunctuationSegmenter ─────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, Default)]
pub struct PunctuationSegmenter;

impl SentenceSegmenter for PunctuationSegmenter {
    fn segment(&self, text: &str) -> Vec<String> {
        let marked = PUNCTUATION.replace_all(text, |caps: &Captures| {
            let mark = &caps[0];
            if mark == "'" {
                format!(" {mark}")
            } else {
                format!(" {mark}\n")
            }
        });

        marked
            .split('\n')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }
}

// ─── WholeTextSegmenter ───────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, Default)]
pub struct WholeTextSegmenter;

impl SentenceSegmenter for WholeTextSegmenter {
    fn segment(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            Vec::new()
        } else {
            vec![text.to_string()]
        }
    }
}

/// Pick a segmenter by whether punctuation splitting is wanted.
pub fn segmenter(split_sentences: bool) -> Box<dyn SentenceSegmenter> {
    if split_sentences {
        Box::new(PunctuationSegmenter)
    } else {
        Box::new(WholeTextSegmenter)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_on_terminal_punctuation() {
        let s = PunctuationSegmenter.segment("The cat sat. Did it run? Yes!");
        assert_eq!(s, vec!["The cat sat .", "Did it run ?", "Yes !"]);
    }

    #[test]
    fn test_apostrophe_is_padded_but_not_a_boundary() {
        let s = PunctuationSegmenter.segment("don't stop");
        assert_eq!(s, vec!["don 't stop"]);
    }

    #[test]
    fn test_text_without_punctuation_is_one_unit() {
        assert_eq!(PunctuationSegmenter.segment("no stop here"), vec!["no stop here"]);
    }

    #[test]
    fn test_blank_text_has_no_sentences() {
        assert!(PunctuationSegmenter.segment("   ").is_empty());
        assert!(PunctuationSegmenter.segment("").is_empty());
        assert!(WholeTextSegmenter.segment(" \n ").is_empty());
    }

    #[test]
    fn test_lone_punctuation_survives_as_a_unit() {
        // "..." yields three "." units, like any other boundary run
        assert_eq!(PunctuationSegmenter.segment("wait..."), vec!["wait .", ".", "."]);
    }

    #[test]
    fn test_to_samples_attaches_label() {
        let samples = PunctuationSegmenter.to_samples("A. B.", 3);
        assert_eq!(samples.len(), 2);
        assert!(samples.iter().all(|s| s.label == 3));
    }

    #[test]
    fn test_whole_text_passes_through() {
        assert_eq!(WholeTextSegmenter.segment("A. B."), vec!["A. B."]);
    }
}
