// ============================================================
// Layer 4 - Balanced Split Builder
// ============================================================
// Turns per-class buckets into named splits (train/dev/test)
// with an optional class-balancing policy.
//
// For every class a cursor walks the bucket. Each split takes
// the next `floor(fraction * class_size)` samples (its nominal
// window), then one of three things happens:
//
//   A. no balancing      → emit the window as is
//   B. window >= target  → emit the first `target` samples
//   C. window <  target  → emit the whole window, repeated
//                          floor(target / window) times
//
// The cursor always advances by the nominal window, whatever
// was emitted, so a sample never lands in two different splits
// of the same class.
//
// Example (Scenario A): classes {0: 100, 1: 40}, train=0.8,
// pad=true → target 100, class 1 window 32, required 80,
// repeat 2 → 64 samples (never a partial third copy).

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::domain::sample::ClassBuckets;
use crate::domain::split::{Allocation, BalancePolicy, SplitDataset, SplitSpec};

/// `floor(fraction * n)`, the same truncation the split files have
/// always used.
fn portion(fraction: f64, n: usize) -> usize {
    (fraction * n as f64).floor() as usize
}

/// Build the split dataset. Never fails: fractions were validated
/// when `spec` was built, and empty windows are reported instead.
pub fn build_splits(
    buckets: &ClassBuckets,
    spec:    &SplitSpec,
    policy:  BalancePolicy,
) -> SplitDataset {
    let mut dataset = SplitDataset::with_splits(spec.names());

    let sizes = buckets.sizes();
    let target = policy.target(sizes.values().copied());
    tracing::info!(
        "found {} labels: {:?} (target per class: {:?})",
        sizes.len(), sizes, target
    );

    for (label, samples) in buckets.iter() {
        let class_size = samples.len();
        let mut start  = 0usize;
        tracing::debug!("class '{}': {} samples", label, class_size);

        for (split, fraction) in spec.iter() {
            let available = portion(fraction, class_size);
            let required  = target.map(|t| portion(fraction, t));

            // Fractions may sum past 1; the window then runs off the end
            // of the bucket and is clipped.
            let lo     = start.min(class_size);
            let hi     = (start + available).min(class_size);
            let window = &samples[lo..hi];

            let (emitted, repeats, degenerate) = match required {
                // ── Case A: keep natural class sizes ─────────────────────────
                None => {
                    dataset.extend_split(split, window);
                    (window.len(), 1, false)
                }
                // ── Case B: truncate to the balanced target ──────────────────
                Some(required) if available >= required => {
                    let taken = &window[..required.min(window.len())];
                    dataset.extend_split(split, taken);
                    (taken.len(), 1, false)
                }
                // ── Case C with nothing to repeat ────────────────────────────
                Some(required) if window.is_empty() => {
                    tracing::warn!(
                        "split '{}', class '{}': need {} samples but the window is empty, \
                         contributing 0",
                        split, label, required
                    );
                    (0, 0, true)
                }
                // ── Case C: pad by whole-window repetition ───────────────────
                Some(required) => {
                    let repeats = required / window.len();
                    for _ in 0..repeats {
                        dataset.extend_split(split, window);
                    }
                    (window.len() * repeats, repeats, false)
                }
            };

            tracing::debug!(
                "  {} <- {}:{} x {} ({:?} from {} available)",
                split, lo, hi, repeats, required, available
            );

            dataset.record(Allocation {
                split: split.to_string(),
                label,
                start,
                available,
                required,
                repeats,
                emitted,
                degenerate,
            });

            start += available;
        }
    }

    for (split, samples) in dataset.iter() {
        tracing::info!("{}: {} samples {:?}", split, samples.len(), dataset.label_counts(split));
    }

    dataset
}

/// Shuffle every class bucket in place with a seeded RNG, so a
/// shuffled split is still reproducible.
pub fn shuffle_buckets(buckets: &mut ClassBuckets, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    for (label, samples) in buckets.iter_mut() {
        samples.shuffle(&mut rng);
        tracing::debug!("shuffled class '{}' ({} samples, seed {})", label, samples.len(), seed);
    }
}
