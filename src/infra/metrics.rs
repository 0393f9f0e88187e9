// ============================================================
// Layer 6 - Metrics Logger
// ============================================================
// Records training metrics to a CSV file after each epoch.
//
// Metrics recorded per epoch:
//   - epoch:      the epoch number (1, 2, 3, ...)
//   - train_loss: average combined loss on the training set
//   - val_loss:   average combined loss on the validation set
//   - val_acc:    fraction of validation labels predicted correctly
//
// Output file: <checkpoint_dir>/metrics.csv
//
//   epoch,train_loss,val_loss,val_acc
//   1,0.7123,0.6981,0.512
//   2,0.654,0.6602,0.604
//
// If val_loss rises while train_loss falls, the model is overfitting.

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

pub const METRICS_FILE: &str = "metrics.csv";

const HEADER: [&str; 4] = ["epoch", "train_loss", "val_loss", "val_acc"];

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:      usize,
    pub train_loss: f64,
    pub val_loss:   f64,
    /// Range [0.0, 1.0]
    pub val_acc:    f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, val_loss: f64, val_acc: f64) -> Self {
        Self { epoch, train_loss, val_loss, val_acc }
    }

    /// Returns true if this epoch improved over the previous best val_loss
    pub fn is_improvement(&self, best_val_loss: f64) -> bool {
        self.val_loss < best_val_loss
    }
}

/// Appends epoch metrics to a CSV file.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet, so
    /// resumed runs keep appending to the same log.
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;

        let csv_path = dir.join(METRICS_FILE);
        if !csv_path.exists() {
            let mut writer = csv::Writer::from_path(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writer.write_record(HEADER)?;
            writer.flush()?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let file = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        // header was written when the file was created
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        writer.serialize(m)?;
        writer.flush()?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:.4}",
            m.epoch, m.train_loss, m.val_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_improvement() {
        let m = EpochMetrics::new(2, 0.7, 0.6, 0.5);
        assert!(m.is_improvement(0.65));
        assert!(!m.is_improvement(0.6));
    }

    #[test]
    fn test_rows_are_appended() {
        let dir    = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log(&EpochMetrics::new(1, 0.7, 0.69, 0.5)).unwrap();

        // a second logger on the same dir keeps the existing rows
        let again = MetricsLogger::new(dir.path()).unwrap();
        again.log(&EpochMetrics::new(2, 0.6, 0.65, 0.625)).unwrap();

        let text = fs::read_to_string(again.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec![
            "epoch,train_loss,val_loss,val_acc",
            "1,0.7,0.69,0.5",
            "2,0.6,0.65,0.625",
        ]);
    }

    #[test]
    fn test_rows_read_back_as_metrics() {
        let dir    = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log(&EpochMetrics::new(1, 0.7123, f64::NAN, 0.25)).unwrap();

        let mut reader = csv::Reader::from_path(logger.csv_path()).unwrap();
        let rows: Vec<EpochMetrics> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].epoch, 1);
        assert_eq!(rows[0].train_loss, 0.7123);
        assert!(rows[0].val_loss.is_nan());
        assert_eq!(rows[0].val_acc, 0.25);
    }
}
