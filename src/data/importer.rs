// ============================================================
// Layer 4 - Class-Bucketed Importers
// ============================================================
// Each importer reads one corpus format and groups its records
// into ClassBuckets. Every sentence passes through the
// Preprocessor so the split files stay one row per line.
//
//   hsol   → labeled_data.csv        (class, tweet)
//   wsf    → annotations_metadata.csv + all_files/<id>.txt
//   isot   → True.csv (0) / Fake.csv (1)
//   json   → [{score, title, text}] arrays, plain or .gz
//   tsv    → existing sentence<TAB>label files
//
// Binary corpora declare classes 0 and 1 up front. The JSON and
// TSV importers declare classes in order of first appearance.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;

use crate::data::{gz, preprocessor::Preprocessor, split_store};
use crate::domain::sample::{ClassBuckets, LabeledSample};
use crate::domain::traits::{SampleSource, SentenceSegmenter};
use crate::error::DataError;

type CsvRow = HashMap<String, String>;

/// Value → occurrence count for one CSV column.
type ValueCounter = BTreeMap<String, usize>;

fn read_csv_rows(path: &Path) -> Result<Vec<CsvRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(gz::open(path)?);

    let rows = rdr
        .deserialize::<CsvRow>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("Cannot read CSV '{}'", path.display()))?;
    tracing::info!("loaded data ({}) from {}", rows.len(), path.display());
    Ok(rows)
}

fn column<'a>(row: &'a CsvRow, name: &str, path: &Path) -> Result<&'a str, DataError> {
    row.get(name).map(String::as_str).ok_or_else(|| DataError::Malformed {
        source_name: path.display().to_string(),
        reason:      format!("missing '{name}' column"),
    })
}

fn parse_label(raw: &str, path: &Path) -> Result<i64, DataError> {
    raw.trim().parse::<i64>().map_err(|_| DataError::BadLabel {
        value:       raw.to_string(),
        source_name: path.display().to_string(),
    })
}

/// Clean `text` and push it unless nothing is left.
fn push_clean(buckets: &mut ClassBuckets, text: &str, label: i64) -> Result<bool, DataError> {
    let sentence = Preprocessor::new().clean(text);
    if sentence.is_empty() {
        return Ok(false);
    }
    buckets.push(LabeledSample::new(sentence, label))?;
    Ok(true)
}

/// Log `positives/total` for binary corpora.
pub fn log_positive_rate(buckets: &ClassBuckets) {
    let total     = buckets.total();
    let positives = buckets.get(1).map_or(0, <[_]>::len);
    if total == 0 {
        tracing::warn!("no samples imported");
    } else {
        tracing::info!(
            "positive samples: {}/{}={:.2}",
            positives, total, positives as f64 / total as f64
        );
    }
}

// ─── hsol ─────────────────────────────────────────────────────────────────────
const HSOL_COUNTED: [&str; 5] = ["count", "hate_speech", "offensive_language", "neither", "class"];

/// Hate speech and offensive language tweets. `class == 0` (hate
/// speech) is the positive class; offensive and neither are 0.
pub fn import_hsol(path: &Path) -> Result<ClassBuckets> {
    let rows = read_csv_rows(path)?;
    let mut buckets  = ClassBuckets::with_classes([0, 1]);
    let mut counters: IndexMap<&str, ValueCounter> = IndexMap::new();

    for row in &rows {
        let class = parse_label(column(row, "class", path)?, path)?;
        let label = i64::from(class == 0);
        push_clean(&mut buckets, column(row, "tweet", path)?, label)?;

        for key in HSOL_COUNTED {
            if let Some(value) = row.get(key) {
                *counters.entry(key).or_default().entry(value.clone()).or_default() += 1;
            }
        }
    }

    for (key, counter) in &counters {
        tracing::info!("{}: {:?}", key, counter);
    }
    log_positive_rate(&buckets);
    Ok(buckets)
}

// ─── wsf ──────────────────────────────────────────────────────────────────────
/// Options for the white-supremacist-forum corpus.
#[derive(Debug, Clone)]
pub struct WsfOptions {
    /// Folder next to the annotations file holding `<file_id>.txt`.
    pub subfolder:    String,
    /// Rows needing more context than this are skipped.
    pub max_contexts: u32,
}

impl Default for WsfOptions {
    fn default() -> Self {
        Self { subfolder: "all_files".to_string(), max_contexts: 0 }
    }
}

fn wsf_label(raw: &str) -> Option<i64> {
    match raw {
        "hate"   => Some(1),
        "noHate" => Some(0),
        _        => None,
    }
}

pub fn import_wsf(annotations: &Path, options: &WsfOptions) -> Result<ClassBuckets> {
    let rows      = read_csv_rows(annotations)?;
    let subfolder = annotations
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(&options.subfolder);

    let mut buckets  = ClassBuckets::with_classes([0, 1]);
    let mut counters: IndexMap<&str, ValueCounter> = IndexMap::new();

    for row in &rows {
        let file_id = column(row, "file_id", annotations)?;
        let text_path = subfolder.join(format!("{file_id}.txt"));
        let text = fs::read_to_string(&text_path)
            .with_context(|| format!("Cannot read '{}'", text_path.display()))?;

        let lines: Vec<&str> = text.lines().collect();
        if lines.len() != 1 {
            tracing::warn!("found {} lines in {}, skipping", lines.len(), text_path.display());
            continue;
        }

        let raw_label    = column(row, "label", annotations)?;
        let raw_contexts = column(row, "num_contexts", annotations)?;
        for (key, value) in [("label", raw_label), ("num_contexts", raw_contexts)] {
            *counters.entry(key).or_default().entry(value.to_string()).or_default() += 1;
        }

        let num_contexts: u32 = raw_contexts.trim().parse().map_err(|_| DataError::Malformed {
            source_name: annotations.display().to_string(),
            reason:      format!("num_contexts '{raw_contexts}' is not an integer"),
        })?;
        if num_contexts > options.max_contexts {
            continue;
        }

        match wsf_label(raw_label) {
            Some(label) => {
                push_clean(&mut buckets, lines[0], label)?;
            }
            None => tracing::debug!("skipping label {}", raw_label),
        }
    }

    for (key, counter) in &counters {
        tracing::info!("- {}: {:?}", key, counter);
    }
    log_positive_rate(&buckets);
    Ok(buckets)
}

// ─── isot ─────────────────────────────────────────────────────────────────────
/// Counts the news-agency prefixes stripped from isot articles
/// ("WASHINGTON (Reuters) - ..."). Owned by the caller so several
/// imports can share one tally.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceTally {
    counts: IndexMap<String, usize>,
}

impl SourceTally {
    pub fn record(&mut self, source: &str) {
        *self.counts.entry(source.trim().to_string()).or_default() += 1;
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Sources, most frequent first.
    pub fn most_common(&self) -> Vec<(&str, usize)> {
        let mut sources: Vec<(&str, usize)> =
            self.counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        sources.sort_by(|a, b| b.1.cmp(&a.1));
        sources
    }
}

const SOURCE_SEPARATOR: &str = " - ";
const MAX_SOURCE_WORDS: usize = 10;

/// Strip a short `"<source> - "` prefix, recording the source.
/// Text without the separator is returned unchanged.
pub fn strip_source_prefix(text: &str, tally: &mut SourceTally) -> String {
    match text.split_once(SOURCE_SEPARATOR) {
        Some((prefix, rest)) if prefix.split_whitespace().count() < MAX_SOURCE_WORDS => {
            tally.record(prefix);
            rest.to_string()
        }
        _ => text.to_string(),
    }
}

pub fn import_isot(folder: &Path, tally: &mut SourceTally) -> Result<ClassBuckets> {
    let mut buckets = ClassBuckets::with_classes([0, 1]);

    for (file, label) in [("True.csv", 0), ("Fake.csv", 1)] {
        let path = folder.join(file);
        for row in read_csv_rows(&path)? {
            let text = strip_source_prefix(column(&row, "text", &path)?, tally);
            push_clean(&mut buckets, &text, label)?;
        }
        tracing::info!("sources after {}: {} prefixes stripped", file, tally.total());
    }

    tracing::debug!("sources={:?}", tally.most_common());
    log_positive_rate(&buckets);
    Ok(buckets)
}

// ─── Scored JSON ──────────────────────────────────────────────────────────────
#[derive(Debug, Deserialize)]
struct ScoredRecord {
    score: serde_json::Value,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    text:  Option<String>,
}

fn score_label(score: &serde_json::Value, path: &Path) -> Result<i64, DataError> {
    let label = match score {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    label.ok_or_else(|| DataError::BadLabel {
        value:       score.to_string(),
        source_name: path.display().to_string(),
    })
}

/// Import `[{score, title, text}]` arrays. The integer score is the
/// label; the title (and the text when `use_text`) is segmented
/// into samples.
pub fn import_scored_json(
    paths:     &[PathBuf],
    use_text:  bool,
    segmenter: &dyn SentenceSegmenter,
) -> Result<ClassBuckets> {
    let mut buckets = ClassBuckets::default();

    for path in paths {
        let records: Vec<ScoredRecord> = serde_json::from_reader(gz::open(path)?)
            .with_context(|| format!("Cannot parse JSON records in '{}'", path.display()))?;
        tracing::info!("importing {}: {} records", path.display(), records.len());

        for record in &records {
            let label = score_label(&record.score, path)?;
            buckets.declare(label);

            let fields = [Some(&record.title), use_text.then_some(&record.text)];
            for text in fields.into_iter().flatten().flatten() {
                for sentence in segmenter.segment(text) {
                    push_clean(&mut buckets, &sentence, label)?;
                }
            }
        }
    }

    log_positive_rate(&buckets);
    Ok(buckets)
}

// ─── TSV ──────────────────────────────────────────────────────────────────────
pub fn import_tsv(path: &Path) -> Result<ClassBuckets> {
    let samples     = split_store::read_samples(path)?;
    let mut buckets = ClassBuckets::with_classes(samples.iter().map(|s| s.label));
    buckets.extend(samples)?;
    log_positive_rate(&buckets);
    Ok(buckets)
}

// ─── SampleSource implementations ─────────────────────────────────────────────
// The CLI picks one of these by name; each just forwards to the
// matching import function.

pub struct HsolSource {
    pub path: PathBuf,
}

impl SampleSource for HsolSource {
    fn load(&self) -> Result<ClassBuckets> {
        import_hsol(&self.path)
    }
}

pub struct WsfSource {
    pub annotations: PathBuf,
    pub options:     WsfOptions,
}

impl SampleSource for WsfSource {
    fn load(&self) -> Result<ClassBuckets> {
        import_wsf(&self.annotations, &self.options)
    }
}

pub struct IsotSource {
    pub folder: PathBuf,
}

impl SampleSource for IsotSource {
    fn load(&self) -> Result<ClassBuckets> {
        let mut tally = SourceTally::default();
        let buckets = import_isot(&self.folder, &mut tally)?;
        tracing::info!("stripped {} source prefixes", tally.total());
        Ok(buckets)
    }
}

pub struct ScoredJsonSource {
    pub paths:     Vec<PathBuf>,
    pub use_text:  bool,
    pub segmenter: Box<dyn SentenceSegmenter>,
}

impl SampleSource for ScoredJsonSource {
    fn load(&self) -> Result<ClassBuckets> {
        import_scored_json(&self.paths, self.use_text, self.segmenter.as_ref())
    }
}

pub struct TsvSource {
    pub path: PathBuf,
}

impl SampleSource for TsvSource {
    fn load(&self) -> Result<ClassBuckets> {
        import_tsv(&self.path)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::{write::GzEncoder, Compression};

    use super::*;
    use crate::data::segmenter::{PunctuationSegmenter, WholeTextSegmenter};

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_hsol_maps_hate_class_to_positive() {
        let dir  = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "labeled_data.csv",
            ",count,hate_speech,offensive_language,neither,class,tweet\n\
             0,3,3,0,0,0,hateful tweet\n\
             1,3,0,3,0,1,\"offensive,\ntweet\"\n\
             2,3,0,0,3,2,nice tweet\n",
        );

        let buckets = import_hsol(&path).unwrap();
        assert_eq!(buckets.get(1).unwrap(), &[LabeledSample::new("hateful tweet", 1)]);
        // embedded newline collapsed by the preprocessor
        assert_eq!(buckets.get(0).unwrap()[0].sentence, "offensive, tweet");
        assert_eq!(buckets.get(0).unwrap().len(), 2);
    }

    #[test]
    fn test_hsol_bad_class_is_reported() {
        let dir  = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "d.csv", "class,tweet\nhate,some tweet\n");
        let err  = import_hsol(&path).unwrap_err();
        assert!(matches!(err.downcast_ref::<DataError>(), Some(DataError::BadLabel { .. })));
    }

    #[test]
    fn test_wsf_filters_rows() {
        let dir  = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "annotations_metadata.csv",
            "file_id,user_id,subforum_id,num_contexts,label\n\
             a,1,1,0,hate\n\
             b,1,1,0,noHate\n\
             c,1,1,2,hate\n\
             d,1,1,0,relation\n\
             e,1,1,0,hate\n",
        );
        write(dir.path(), "all_files/a.txt", "hate line\n");
        write(dir.path(), "all_files/b.txt", "calm line");
        write(dir.path(), "all_files/c.txt", "needs context");
        write(dir.path(), "all_files/d.txt", "relation line");
        write(dir.path(), "all_files/e.txt", "two\nlines");

        let buckets = import_wsf(&path, &WsfOptions::default()).unwrap();
        assert_eq!(buckets.get(1).unwrap(), &[LabeledSample::new("hate line", 1)]);
        assert_eq!(buckets.get(0).unwrap(), &[LabeledSample::new("calm line", 0)]);

        let lenient = WsfOptions { max_contexts: 5, ..WsfOptions::default() };
        assert_eq!(import_wsf(&path, &lenient).unwrap().get(1).unwrap().len(), 2);
    }

    #[test]
    fn test_source_prefix_is_stripped_and_counted() {
        let mut tally = SourceTally::default();
        let text = strip_source_prefix("WASHINGTON (Reuters) - The vote passed.", &mut tally);
        assert_eq!(text, "The vote passed.");
        assert_eq!(tally.most_common(), vec![("WASHINGTON (Reuters)", 1)]);

        let long = "one two three four five six seven eight nine ten - rest";
        assert_eq!(strip_source_prefix(long, &mut tally), long);
        assert_eq!(strip_source_prefix("no separator", &mut tally), "no separator");
        assert_eq!(tally.total(), 1);
    }

    #[test]
    fn test_isot_labels_true_and_fake() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "True.csv", "title,text\nt,LONDON (Reuters) - Real news.\n");
        write(dir.path(), "Fake.csv", "title,text\nt,Made up story\nt,Another one\n");

        let mut tally = SourceTally::default();
        let buckets = import_isot(dir.path(), &mut tally).unwrap();
        assert_eq!(buckets.get(0).unwrap(), &[LabeledSample::new("Real news.", 0)]);
        assert_eq!(buckets.get(1).unwrap().len(), 2);
        assert_eq!(tally.most_common(), vec![("LONDON (Reuters)", 1)]);
    }

    #[test]
    fn test_scored_json_segments_titles() {
        let dir  = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "data.json",
            r#"[{"score": 1, "title": "Bad claim. Really bad!", "text": "ignored"},
                {"score": 0.0, "title": "Fine", "text": "Body text."},
                {"score": "2", "title": null}]"#,
        );

        let buckets = import_scored_json(&[path.clone()], false, &PunctuationSegmenter).unwrap();
        assert_eq!(buckets.labels().collect::<Vec<_>>(), vec![1, 0, 2]);
        assert_eq!(buckets.get(1).unwrap().len(), 2);
        assert_eq!(buckets.get(0).unwrap(), &[LabeledSample::new("Fine", 0)]);
        assert!(buckets.get(2).unwrap().is_empty());

        let with_text = import_scored_json(&[path], true, &PunctuationSegmenter).unwrap();
        assert_eq!(with_text.get(0).unwrap().len(), 2);
    }

    #[test]
    fn test_scored_json_reads_gzip() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("covid.json.gz");
        let mut enc = GzEncoder::new(fs::File::create(&path).unwrap(), Compression::default());
        enc.write_all(br#"[{"score": 1, "title": "A. B."}]"#).unwrap();
        enc.finish().unwrap();

        let buckets = import_scored_json(&[path], false, &WholeTextSegmenter).unwrap();
        assert_eq!(buckets.get(1).unwrap(), &[LabeledSample::new("A. B.", 1)]);
    }

    #[test]
    fn test_tsv_import_declares_seen_labels() {
        let dir  = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "train.tsv", "sentence\tlabel\na\t1\nb\t0\nc\t1\n");
        let buckets = TsvSource { path }.load().unwrap();
        assert_eq!(buckets.sizes().into_iter().collect::<Vec<_>>(), vec![(1, 2), (0, 1)]);
    }
}
