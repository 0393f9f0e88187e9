// ============================================================
// Layer 4 - Split File Store
// ============================================================
// Reads and writes `sentence<TAB>label` files.
//
//   out_dir/
//     train.tsv.gz   ← gzip when compress = true
//     dev.tsv.gz
//     test.tsv.gz
//
// Any path ending in `.gz` is compressed/decompressed
// transparently, so readers do not care how a split was saved.

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use flate2::{write::GzEncoder, Compression};

use crate::data::gz;
use crate::domain::sample::LabeledSample;
use crate::domain::split::SplitDataset;
use crate::error::DataError;

const HEADER: [&str; 2] = ["sentence", "label"];

/// File name for a split: `train.tsv` or `train.tsv.gz`.
pub fn split_filename(split: &str, compress: bool) -> String {
    if compress { format!("{split}.tsv.gz") } else { format!("{split}.tsv") }
}

/// The split file in `dir`, plain or gzip, if either exists.
pub fn locate_split(dir: &Path, split: &str) -> Option<PathBuf> {
    [false, true]
        .into_iter()
        .map(|compress| dir.join(split_filename(split, compress)))
        .find(|path| path.is_file())
}

/// Write every split into `dir`, creating it if needed.
/// Returns the written paths in split order.
pub fn save_splits(dataset: &SplitDataset, dir: &Path, compress: bool) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Cannot create split directory '{}'", dir.display()))?;

    let mut written = Vec::new();
    for (split, samples) in dataset.iter() {
        let path = dir.join(split_filename(split, compress));
        tracing::info!("writing to {}: {} samples", path.display(), samples.len());
        write_samples(&path, samples)?;
        written.push(path);
    }
    Ok(written)
}

/// Write samples to one TSV file (gzip if the name ends in `.gz`).
pub fn write_samples(path: &Path, samples: &[LabeledSample]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create '{}'", parent.display()))?;
    }
    let file = File::create(path)
        .with_context(|| format!("Cannot create '{}'", path.display()))?;

    if gz::is_gz(path) {
        let encoder = write_tsv(GzEncoder::new(file, Compression::default()), samples)?;
        encoder
            .finish()
            .with_context(|| format!("Cannot finish gzip stream '{}'", path.display()))?;
    } else {
        write_tsv(BufWriter::new(file), samples)?
            .flush()
            .with_context(|| format!("Cannot flush '{}'", path.display()))?;
    }
    Ok(())
}

/// Serialise samples with an explicit header (written even when
/// there are no rows) and hand the inner writer back.
fn write_tsv<W: Write>(inner: W, samples: &[LabeledSample]) -> Result<W> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(inner);

    writer.write_record(HEADER)?;
    for sample in samples {
        writer.serialize(sample)?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Cannot flush TSV writer: {}", e.error()))
}

/// Read a `sentence<TAB>label` file. Extra columns are ignored;
/// a label that is not an integer is a data error.
pub fn read_samples(path: &Path) -> Result<Vec<LabeledSample>> {
    let reader = gz::open(path)?;
    let source_name = path.display().to_string();
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let column = |name: &str| -> Result<usize> {
        headers.iter().position(|h| h == name).ok_or_else(|| {
            DataError::Malformed {
                source_name: source_name.clone(),
                reason:      format!("missing '{name}' column"),
            }
            .into()
        })
    };
    let sentence_col = column("sentence")?;
    let label_col    = column("label")?;

    let mut samples = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record   = record.with_context(|| format!("Bad TSV row in '{source_name}'"))?;
        let sentence = record.get(sentence_col).ok_or_else(|| DataError::Malformed {
            source_name: source_name.clone(),
            reason:      format!("row {} has no sentence cell", row + 1),
        })?;
        let raw      = record.get(label_col).unwrap_or_default();
        let label    = raw.trim().parse::<i64>().map_err(|_| DataError::BadLabel {
            value:       raw.to_string(),
            source_name: source_name.clone(),
        })?;
        samples.push(LabeledSample::new(sentence, label));
    }

    tracing::debug!("loaded {} samples from {}", samples.len(), source_name);
    Ok(samples)
}
