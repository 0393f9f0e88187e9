// ============================================================
// Layer 3 - Parsed Samples
// ============================================================
// A sentence annotated with phrase structure and token ids.
// This is the record format of the `*_with_parse.json` files
// (one JSON object per line):
//
//   { "sentence": "the cat ran", "label": 1,
//     "input_ids": [101, 7, 9, 12],
//     "parse_tree": [
//        { "phrase_label": "ROOT", "phrase": "the cat ran", "start": 1, "end": 4 },
//        { "phrase_label": "W",    "phrase": "cat",         "start": 2, "end": 3 } ] }
//
// `start..end` is a half-open range of token positions in
// `input_ids`. Entry 0 of `parse_tree` is always the root.

use serde::{Deserialize, Serialize};

/// A phrase proposed by a phrase parser, as a byte range of the sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseSpan {
    pub label: String,
    pub start: usize,
    pub end:   usize,
}

impl PhraseSpan {
    pub fn new(label: impl Into<String>, start: usize, end: usize) -> Self {
        Self { label: label.into(), start, end }
    }

    pub fn text<'a>(&self, sentence: &'a str) -> &'a str {
        sentence.get(self.start..self.end).unwrap_or("").trim()
    }
}

/// One node of the stored parse tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseNode {
    pub phrase_label: String,
    pub phrase:       String,
    #[serde(default)]
    pub start:        usize,
    #[serde(default)]
    pub end:          usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedSample {
    pub sentence:   String,
    pub label:      i64,
    #[serde(default)]
    pub input_ids:  Vec<u32>,
    pub parse_tree: Vec<PhraseNode>,
}

impl ParsedSample {
    /// Phrase texts in tree order, root included.
    pub fn phrases(&self) -> Vec<String> {
        self.parse_tree.iter().map(|n| n.phrase.clone()).collect()
    }
}
