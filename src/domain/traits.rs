// ============================================================
// Layer 3 - Core Traits (Abstractions)
// ============================================================
// The seams between the pipeline and its collaborators.
// Each external piece (sentence detection, phrase parsing,
// tokenization, the neural model) sits behind one of these,
// so the split builder and interpretation code can be tested
// without a parser, a tokenizer or a GPU.

use anyhow::Result;

use crate::domain::interpretation::ModelOutput;
use crate::domain::parse_tree::{ParsedSample, PhraseSpan};
use crate::domain::sample::{ClassBuckets, LabeledSample};

// ─── SampleSource ─────────────────────────────────────────────────────────────
/// A corpus that can be read into per-class buckets.
///
/// Implementations live in `data::importer` (hsol, wsf, isot,
/// scored JSON, TSV).
pub trait SampleSource {
    fn load(&self) -> Result<ClassBuckets>;
}

// ─── SentenceSegmenter ────────────────────────────────────────────────────────
/// Splits raw text into sentence-like units.
pub trait SentenceSegmenter {
    fn segment(&self, text: &str) -> Vec<String>;

    /// Segment and attach one label to every sentence.
    fn to_samples(&self, text: &str, label: i64) -> Vec<LabeledSample> {
        self.segment(text)
            .into_iter()
            .map(|s| LabeledSample::new(s, label))
            .collect()
    }
}

// ─── PhraseParser ─────────────────────────────────────────────────────────────
/// Proposes phrases for a sentence. The first span must cover the
/// whole sentence (the root).
pub trait PhraseParser {
    fn phrases(&self, sentence: &str) -> Vec<PhraseSpan>;
}

// ─── TreeAnnotator ────────────────────────────────────────────────────────────
/// Turns labeled rows into parsed, tokenized samples.
pub trait TreeAnnotator {
    fn annotate(&self, rows: &[LabeledSample]) -> Result<Vec<ParsedSample>>;
}

// ─── Classifier ───────────────────────────────────────────────────────────────
/// One forward pass over a batch of parsed samples.
///
/// Implementations:
///   - Inferencer  → the burn self-explaining model
///   - test fakes  → canned probabilities
pub trait Classifier {
    fn forward(&self, batch: &[ParsedSample]) -> Result<ModelOutput>;
}
