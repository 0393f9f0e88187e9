// ============================================================
// Layer 3 - Split Specification, Balance Policy, Split Dataset
// ============================================================
// A SplitSpec says which named partitions to build and what
// fraction of each class goes into each one, in order:
//
//   train=0.8, dev=0.1, test=0.1
//
// Fractions are checked when the spec is built, so the split
// builder itself never has to fail.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::domain::sample::LabeledSample;
use crate::error::ConfigError;

// ─── SplitSpec ────────────────────────────────────────────────────────────────
/// Ordered split name → fraction. Order decides which window of each
/// class a split receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitSpec {
    fractions: IndexMap<String, f64>,
}

impl SplitSpec {
    /// Validate and build a spec from (name, fraction) pairs.
    pub fn new<S: Into<String>>(
        splits: impl IntoIterator<Item = (S, f64)>,
    ) -> Result<Self, ConfigError> {
        let mut fractions = IndexMap::new();
        for (name, fraction) in splits {
            let name = name.into();
            if name.trim().is_empty() {
                return Err(ConfigError::MalformedSplit(format!("={fraction}")));
            }
            if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
                return Err(ConfigError::FractionOutOfRange { name, fraction });
            }
            if fractions.insert(name.clone(), fraction).is_some() {
                return Err(ConfigError::DuplicateSplit(name));
            }
        }
        if fractions.is_empty() {
            return Err(ConfigError::EmptySplitSpec);
        }
        Ok(Self { fractions })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.fractions.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fractions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fractions.len()
    }
}

impl Default for SplitSpec {
    /// train=0.8, dev=0.1, test=0.1
    fn default() -> Self {
        Self {
            fractions: IndexMap::from([
                ("train".to_string(), 0.8),
                ("dev".to_string(),   0.1),
                ("test".to_string(),  0.1),
            ]),
        }
    }
}

/// Parses `train=0.8,dev=0.1,test=0.1`.
impl FromStr for SplitSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut pairs = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, fraction) = part
                .split_once('=')
                .ok_or_else(|| ConfigError::MalformedSplit(part.to_string()))?;
            let fraction: f64 = fraction
                .trim()
                .parse()
                .map_err(|_| ConfigError::MalformedSplit(part.to_string()))?;
            pairs.push((name.trim().to_string(), fraction));
        }
        Self::new(pairs)
    }
}

impl fmt::Display for SplitSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fractions
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        write!(f, "{}", parts.join(","))
    }
}

// ─── BalancePolicy ────────────────────────────────────────────────────────────
/// How per-class counts are equalised.
///
///   balance=false           → classes keep their natural sizes
///   balance=true, pad=false → truncate every class to the smallest
///   balance=true, pad=true  → repeat small classes towards the largest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BalancePolicy {
    pub balance: bool,
    pub pad:     bool,
}

impl BalancePolicy {
    pub const UNBALANCED: Self = Self { balance: false, pad: false };
    pub const TRUNCATE:   Self = Self { balance: true,  pad: false };
    pub const PAD:        Self = Self { balance: true,  pad: true  };

    /// Per-class target size for the given class sizes, if balancing.
    pub fn target(&self, sizes: impl IntoIterator<Item = usize>) -> Option<usize> {
        if !self.balance {
            return None;
        }
        let sizes = sizes.into_iter();
        if self.pad { sizes.max() } else { sizes.min() }
    }
}

// ─── Allocation report ────────────────────────────────────────────────────────
/// What one class contributed to one split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub split: String,
    pub label: i64,
    /// Start of the nominal window inside the class bucket.
    pub start: usize,
    /// Nominal window length, `floor(fraction * class_size)`.
    pub available: usize,
    /// Balanced target for this split, `floor(fraction * target)`.
    pub required: Option<usize>,
    /// Times the window was emitted (1 unless padding repeated it).
    pub repeats: usize,
    /// Samples actually emitted.
    pub emitted: usize,
    /// Padding was needed but the window was empty.
    pub degenerate: bool,
}

// ─── SplitDataset ─────────────────────────────────────────────────────────────
/// Final output of the split builder.
#[derive(Debug, Clone, Default)]
pub struct SplitDataset {
    splits:      IndexMap<String, Vec<LabeledSample>>,
    allocations: Vec<Allocation>,
}

impl SplitDataset {
    pub(crate) fn with_splits<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            splits:      names.into_iter().map(|n| (n.to_string(), Vec::new())).collect(),
            allocations: Vec::new(),
        }
    }

    pub(crate) fn extend_split(&mut self, name: &str, samples: &[LabeledSample]) {
        if let Some(split) = self.splits.get_mut(name) {
            split.extend_from_slice(samples);
        }
    }

    pub(crate) fn record(&mut self, allocation: Allocation) {
        self.allocations.push(allocation);
    }

    pub fn get(&self, name: &str) -> Option<&[LabeledSample]> {
        self.splits.get(name).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[LabeledSample])> {
        self.splits.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn allocations(&self) -> &[Allocation] {
        &self.allocations
    }

    /// Allocations where padding had nothing to repeat.
    pub fn degenerate(&self) -> impl Iterator<Item = &Allocation> {
        self.allocations.iter().filter(|a| a.degenerate)
    }

    /// Per-label counts inside one split, labels in first-seen order.
    pub fn label_counts(&self, name: &str) -> IndexMap<i64, usize> {
        let mut counts = IndexMap::new();
        for s in self.get(name).unwrap_or_default() {
            *counts.entry(s.label).or_insert(0) += 1;
        }
        counts
    }
}
