// ============================================================
// Layer 4 - Phrase Parsing and Parse-Tree Staging
// ============================================================
// Turns `sentence<TAB>label` rows into ParsedSample records:
//
//   sentence ──ChunkParser──► phrase spans (byte ranges)
//            ──Tokenizer────► token ids + byte offsets
//            ──align────────► phrase token ranges
//
// ChunkParser proposes three kinds of phrase:
//   ROOT - the whole sentence, always first
//   CL   - clauses between `, ; :` and coordinating conjunctions,
//          only when the sentence has more than one
//   W    - single words (punctuation-only tokens are left out)
//
// Token position 0 is always [CLS]; phrase ranges are shifted
// by one to account for it.

use std::{
    fs::{self, File},
    io::{BufRead, BufWriter, Write},
    path::Path,
    sync::LazyLock,
};

use anyhow::{Context, Result};
use regex::Regex;
use tokenizers::Tokenizer;

use crate::data::{gz, split_store};
use crate::domain::parse_tree::{ParsedSample, PhraseNode, PhraseSpan};
use crate::domain::sample::LabeledSample;
use crate::domain::traits::{PhraseParser, TreeAnnotator};
use crate::error::DataError;
use crate::infra::tokenizer_store::CLS_ID;

static CLAUSE_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[,;:]|\b(?:and|but|or|nor|yet|so)\b").expect("clause pattern is valid")
});

pub const ROOT_LABEL: &str = "ROOT";
pub const CLAUSE_LABEL: &str = "CL";
pub const WORD_LABEL: &str = "W";

fn has_content(text: &str) -> bool {
    text.chars().any(char::is_alphanumeric)
}

/// Shrink `start..end` so it starts and ends on non-whitespace.
fn trimmed(sentence: &str, start: usize, end: usize) -> (usize, usize) {
    let piece = &sentence[start..end];
    let lead  = piece.len() - piece.trim_start().len();
    let trail = piece.len() - piece.trim_end().len();
    (start + lead, end - trail)
}

// ─── ChunkParser ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkParser;

impl ChunkParser {
    fn clauses(&self, sentence: &str) -> Vec<PhraseSpan> {
        let mut clauses = Vec::new();
        let mut start   = 0;
        let bounds = CLAUSE_BREAK
            .find_iter(sentence)
            .map(|m| (m.start(), m.end()))
            .chain(std::iter::once((sentence.len(), sentence.len())));

        for (brk_start, brk_end) in bounds {
            let (s, e) = trimmed(sentence, start, brk_start);
            if s < e && has_content(&sentence[s..e]) {
                clauses.push(PhraseSpan::new(CLAUSE_LABEL, s, e));
            }
            start = brk_end;
        }

        if clauses.len() > 1 { clauses } else { Vec::new() }
    }

    fn words(&self, sentence: &str) -> Vec<PhraseSpan> {
        let mut words = Vec::new();
        let mut start = None;
        for (i, c) in sentence.char_indices().chain(std::iter::once((sentence.len(), ' '))) {
            match (c.is_whitespace(), start) {
                (true, Some(s)) => {
                    if has_content(&sentence[s..i]) {
                        words.push(PhraseSpan::new(WORD_LABEL, s, i));
                    }
                    start = None;
                }
                (false, None) => start = Some(i),
                _ => {}
            }
        }
        words
    }
}

impl PhraseParser for ChunkParser {
    fn phrases(&self, sentence: &str) -> Vec<PhraseSpan> {
        let (s, e) = trimmed(sentence, 0, sentence.len());
        let mut spans = vec![PhraseSpan::new(ROOT_LABEL, s, e)];
        spans.extend(self.clauses(sentence));
        spans.extend(self.words(sentence));
        spans
    }
}

// ─── ParseStage ───────────────────────────────────────────────────────────────
/// Parses and tokenizes rows with a phrase parser and a tokenizer.
pub struct ParseStage<P: PhraseParser = ChunkParser> {
    tokenizer: Tokenizer,
    parser:    P,
}

impl ParseStage<ChunkParser> {
    pub fn new(tokenizer: Tokenizer) -> Self {
        Self { tokenizer, parser: ChunkParser }
    }
}

impl<P: PhraseParser> ParseStage<P> {
    /// Annotate one sentence.
    pub fn parse_one(&self, row: &LabeledSample) -> Result<ParsedSample> {
        let sentence = row.sentence.as_str();
        let encoding = self
            .tokenizer
            .encode(sentence, false)
            .map_err(|e| anyhow::anyhow!("Tokenization failed for '{}': {}", sentence, e))?;

        let mut input_ids = Vec::with_capacity(encoding.len() + 1);
        input_ids.push(CLS_ID);
        input_ids.extend_from_slice(encoding.get_ids());
        let offsets = encoding.get_offsets();

        let mut parse_tree = Vec::new();
        for (i, span) in self.parser.phrases(sentence).into_iter().enumerate() {
            // tokens overlapping the phrase's byte range
            let mut covered = offsets
                .iter()
                .enumerate()
                .filter(|(_, &(ts, te))| ts < span.end && te > span.start)
                .map(|(t, _)| t + 1);

            let (start, end) = match covered.next() {
                Some(first) => (first, covered.last().unwrap_or(first) + 1),
                // keep an empty root so index 0 is always the sentence
                None if i == 0 => (1, 1),
                None => continue,
            };

            parse_tree.push(PhraseNode {
                phrase_label: span.label.clone(),
                phrase:       span.text(sentence).to_string(),
                start,
                end,
            });
        }

        Ok(ParsedSample {
            sentence: row.sentence.clone(),
            label:    row.label,
            input_ids,
            parse_tree,
        })
    }

    pub fn parse_and_tokenize(&self, rows: &[LabeledSample]) -> Result<Vec<ParsedSample>> {
        rows.iter().map(|row| self.parse_one(row)).collect()
    }
}

impl<P: PhraseParser> TreeAnnotator for ParseStage<P> {
    fn annotate(&self, rows: &[LabeledSample]) -> Result<Vec<ParsedSample>> {
        self.parse_and_tokenize(rows)
    }
}

// ─── JSONL store ──────────────────────────────────────────────────────────────
/// `train` → `train_with_parse.json`
pub fn parsed_filename(split: &str) -> String {
    format!("{split}_with_parse.json")
}

/// Write one JSON object per line.
pub fn write_parsed(path: &Path, samples: &[ParsedSample]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create '{}'", parent.display()))?;
    }
    let file = File::create(path)
        .with_context(|| format!("Cannot create '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);
    for sample in samples {
        serde_json::to_writer(&mut writer, sample)?;
        writer.write_all(b"\n")?;
    }
    writer.flush().with_context(|| format!("Cannot flush '{}'", path.display()))?;
    Ok(())
}

/// Read a JSONL parse-tree file. Blank lines are skipped; a record
/// that does not parse is a data error naming its line.
pub fn load_parsed(path: &Path) -> Result<Vec<ParsedSample>> {
    let reader = gz::open(path)?;
    let mut samples = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Cannot read '{}'", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let sample: ParsedSample = serde_json::from_str(&line).map_err(|e| DataError::Malformed {
            source_name: format!("{}:{}", path.display(), n + 1),
            reason:      e.to_string(),
        })?;
        samples.push(sample);
    }
    tracing::debug!("loaded {} parsed samples from {}", samples.len(), path.display());
    Ok(samples)
}

/// Parse a split file and store the result as JSONL.
/// Returns the number of records written.
pub fn store_parse_trees(
    annotator: &dyn TreeAnnotator,
    input:     &Path,
    output:    &Path,
) -> Result<usize> {
    let rows   = split_store::read_samples(input)?;
    let parsed = annotator.annotate(&rows)?;
    tracing::info!(
        "storing parsed trees {} -> {} ({} records)",
        input.display(), output.display(), parsed.len()
    );
    write_parsed(output, &parsed)?;
    Ok(parsed.len())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::tokenizer_store::TokenizerStore;

    fn texts(sentence: &str, spans: &[PhraseSpan]) -> Vec<(String, String)> {
        spans
            .iter()
            .map(|s| (s.label.clone(), s.text(sentence).to_string()))
            .collect()
    }

    fn stage(dir: &Path) -> ParseStage {
        let corpus = vec!["the cat sat , and the dog ran fast .".to_string()];
        ParseStage::new(TokenizerStore::new(dir).build_and_save(&corpus, 100).unwrap())
    }

    #[test]
    fn test_root_comes_first() {
        let s = "  the cat ran  ";
        let spans = ChunkParser.phrases(s);
        assert_eq!(texts(s, &spans)[0], ("ROOT".to_string(), "the cat ran".to_string()));
    }

    #[test]
    fn test_clauses_need_two_parts() {
        let s = "the cat sat , and the dog ran fast .";
        let clauses: Vec<String> = texts(s, &ChunkParser.phrases(s))
            .into_iter()
            .filter(|(l, _)| l == CLAUSE_LABEL)
            .map(|(_, t)| t)
            .collect();
        assert_eq!(clauses, vec!["the cat sat", "the dog ran fast ."]);

        let single = ChunkParser.phrases("the cat sat");
        assert!(single.iter().all(|s| s.label != CLAUSE_LABEL));
    }

    #[test]
    fn test_conjunction_inside_word_is_not_a_break() {
        // "sandy" and "order" contain "and" / "or"
        let s = "sandy order";
        assert!(ChunkParser.phrases(s).iter().all(|p| p.label != CLAUSE_LABEL));
    }

    #[test]
    fn test_punctuation_is_not_a_word() {
        let s = "hello world .";
        let words: Vec<String> = texts(s, &ChunkParser.phrases(s))
            .into_iter()
            .filter(|(l, _)| l == WORD_LABEL)
            .map(|(_, t)| t)
            .collect();
        assert_eq!(words, vec!["hello", "world"]);
    }

    #[test]
    fn test_phrase_ranges_skip_cls() {
        let dir    = tempfile::tempdir().unwrap();
        let parsed = stage(dir.path()).parse_one(&LabeledSample::new("the cat ran", 1)).unwrap();

        assert_eq!(parsed.input_ids[0], CLS_ID);
        assert_eq!(parsed.input_ids.len(), 4);
        assert_eq!(parsed.label, 1);

        let root = &parsed.parse_tree[0];
        assert_eq!((root.phrase_label.as_str(), root.start, root.end), ("ROOT", 1, 4));
        let cat = parsed.parse_tree.iter().find(|n| n.phrase == "cat").unwrap();
        assert_eq!((cat.start, cat.end), (2, 3));
    }

    #[test]
    fn test_jsonl_round_trip_and_bad_line() {
        let dir    = tempfile::tempdir().unwrap();
        let stage  = stage(dir.path());
        let input  = dir.path().join("dev.tsv");
        let output = dir.path().join("dev_with_parse.json");
        split_store::write_samples(
            &input,
            &[LabeledSample::new("the cat sat", 0), LabeledSample::new("the dog ran", 1)],
        )
        .unwrap();

        assert_eq!(store_parse_trees(&stage, &input, &output).unwrap(), 2);
        let loaded = load_parsed(&output).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].phrases()[0], "the dog ran");

        fs::write(&output, "{\"sentence\": \"x\"}\n").unwrap();
        let err = load_parsed(&output).unwrap_err();
        assert!(matches!(err.downcast_ref::<DataError>(), Some(DataError::Malformed { .. })));
    }

    #[test]
    fn test_minimal_records_still_load() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("min.json");
        fs::write(
            &path,
            "{\"sentence\":\"a b\",\"label\":0,\"parse_tree\":[{\"phrase_label\":\"ROOT\",\"phrase\":\"a b\"}]}\n\n",
        )
        .unwrap();
        let loaded = load_parsed(&path).unwrap();
        assert_eq!(loaded[0].parse_tree[0].end, 0);
        assert!(loaded[0].input_ids.is_empty());
    }
}
