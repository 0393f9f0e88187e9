// ============================================================
// Error Taxonomy
// ============================================================
// The pure layers (domain, data, interpret) report typed errors
// so callers can tell a bad command line apart from bad data.
// Application and CLI code wraps both in anyhow with context.
//
//   ConfigError - detected before any processing starts
//   DataError   - surfaced while reading or interpreting data
//
// I/O and backend failures are not modelled here: they travel
// as anyhow errors and are fatal.

use std::path::PathBuf;

use thiserror::Error;

/// Invalid settings. The message always names the parameter.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("split '{name}': fraction {fraction} is outside [0, 1]")]
    FractionOutOfRange { name: String, fraction: f64 },

    #[error("split specification is empty")]
    EmptySplitSpec,

    #[error("split '{0}' is listed more than once")]
    DuplicateSplit(String),

    #[error("cannot parse split '{0}', expected name=fraction")]
    MalformedSplit(String),

    #[error("unknown {kind} '{name}'")]
    Unknown { kind: &'static str, name: String },

    #[error("required file '{}' does not exist ({param})", path.display())]
    MissingFile { param: &'static str, path: PathBuf },

    #[error("invalid value for '{param}': {reason}")]
    InvalidValue { param: &'static str, reason: String },
}

/// Problems found in the data itself. These are never dropped
/// silently because a skipped row would skew class balance.
#[derive(Debug, Error, PartialEq)]
pub enum DataError {
    #[error("concept index {0} is not in the concept map (stale concept store?)")]
    UnknownConcept(usize),

    #[error("class {0} was not declared before samples were added")]
    UndeclaredClass(i64),

    #[error("cannot parse label '{value}' in {source_name}")]
    BadLabel { value: String, source_name: String },

    #[error("label {label} is outside the classifier range 0..{num_classes}")]
    LabelOutOfRange { label: i64, num_classes: usize },

    #[error("misaligned inputs: {what} has {found} entries, expected {expected}")]
    Misaligned { what: &'static str, expected: usize, found: usize },

    #[error("malformed record in {source_name}: {reason}")]
    Malformed { source_name: String, reason: String },
}
