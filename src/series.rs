//! Time-series value type and alignment primitives
//!
//! This module defines the canonical [`Series`] type and the pure operations
//! the evaluator builds on:
//!
//! - **`align`**: reconcile two series onto the coarser of their steps over
//!   their overlapping range
//! - **`normalize`**: n-ary generalization of `align` used by combining
//!   functions
//! - **`merge`**: stitch same-step partials (storage tiers/shards) into one
//!   contiguous series with explicit precedence
//!
//! All operations allocate fresh output and never mutate their inputs, so a
//! single evaluation needs no synchronization.
//!
//! # Gaps
//!
//! A missing sample is `None`, which represents a storage gap and is distinct
//! from zero. Arithmetic with a gap operand produces a gap; gap filling is
//! opt-in per function, never a default.

use std::fmt;

/// Rendering hints attached by display-only functions
///
/// These flags never influence sample values; they are carried through for
/// the response assembly layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderMeta {
    /// Draw this series stacked on its predecessors
    pub stacked: bool,
    /// Draw this series with a dashed line
    pub dashed: bool,
    /// Plot this series against the secondary Y axis
    pub second_y_axis: bool,
}

/// A named, uniformly stepped series of optional samples
///
/// Covers the half-open range `[start, end)`; sample `i` is the value at
/// `start + i * step`. The constructor enforces the structural invariant
/// `values.len() * step == end - start`, so every constructed series is
/// well-formed by the time evaluation sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    /// Display label; encodes the originating expression for function output
    pub name: String,
    /// Range start, epoch seconds, inclusive
    pub start: i64,
    /// Range end, epoch seconds, exclusive
    pub end: i64,
    /// Sampling interval in seconds, always positive
    pub step: i64,
    /// Samples; `None` is a storage gap, not zero
    pub values: Vec<Option<f64>>,
    /// Rendering hints set by display functions
    pub render: RenderMeta,
}

/// Errors from series construction and alignment
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SeriesError {
    /// Step was zero or negative
    #[error("series step must be positive, got {0}")]
    InvalidStep(i64),

    /// Sample count does not match the range/step
    #[error("series '{name}' has {actual} samples but its range and step imply {expected}")]
    LengthMismatch {
        /// Offending series name
        name: String,
        /// Samples supplied
        actual: usize,
        /// Samples the range implies
        expected: usize,
    },

    /// Two series share no time range at all
    #[error("time ranges do not overlap")]
    IncompatibleRange,

    /// Merge inputs disagree on step
    #[error("cannot merge series with steps {0} and {1}")]
    StepMismatch(i64, i64),

    /// Merge inputs do not share a sample grid
    #[error("partial series are not aligned to a common sample grid")]
    Misaligned,

    /// Merge called with nothing to merge
    #[error("merge requires at least one partial series")]
    EmptyMerge,
}

impl Series {
    /// Create a series, validating step and sample count
    pub fn new(
        name: impl Into<String>,
        start: i64,
        end: i64,
        step: i64,
        values: Vec<Option<f64>>,
    ) -> Result<Self, SeriesError> {
        if step <= 0 {
            return Err(SeriesError::InvalidStep(step));
        }
        let name = name.into();
        let expected = ((end - start) / step).max(0) as usize;
        if values.len() as i64 * step != end - start {
            return Err(SeriesError::LengthMismatch {
                name,
                actual: values.len(),
                expected,
            });
        }
        Ok(Self {
            name,
            start,
            end,
            step,
            values,
            render: RenderMeta::default(),
        })
    }

    /// Create a series from samples, deriving `end` from the sample count
    ///
    /// Convenient for fixtures and function output, where the sample vector
    /// is authoritative. Still rejects a non-positive step.
    pub fn from_values(
        name: impl Into<String>,
        start: i64,
        step: i64,
        values: Vec<Option<f64>>,
    ) -> Result<Self, SeriesError> {
        if step <= 0 {
            return Err(SeriesError::InvalidStep(step));
        }
        let end = start + values.len() as i64 * step;
        Self::new(name, start, end, step, values)
    }

    /// Timestamp of sample `i`
    pub fn timestamp(&self, i: usize) -> i64 {
        self.start + i as i64 * self.step
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the series has no samples
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Rename in place, returning self for chaining
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Resample this series onto a coarser step over its own range
    ///
    /// Used to reconcile storage tiers of differing resolution before a
    /// merge. The range is truncated to a whole number of target buckets.
    ///
    /// # Errors
    ///
    /// [`SeriesError::InvalidStep`] for a non-positive step and
    /// [`SeriesError::IncompatibleRange`] when not even one whole bucket fits.
    pub fn resample_to_step(&self, step: i64) -> Result<Series, SeriesError> {
        if step <= 0 {
            return Err(SeriesError::InvalidStep(step));
        }
        if step == self.step {
            return Ok(self.clone());
        }
        let buckets = ((self.end - self.start) / step) as usize;
        if buckets == 0 {
            return Err(SeriesError::IncompatibleRange);
        }
        Ok(self.resample(self.start, step, buckets))
    }

    /// Resample onto a new grid by arithmetic mean per bucket
    ///
    /// The target grid is anchored at `start` with the given `step` and
    /// `buckets` samples. Samples outside the target range are discarded; a
    /// bucket whose source samples are all gaps stays a gap.
    fn resample(&self, start: i64, step: i64, buckets: usize) -> Series {
        let end = start + buckets as i64 * step;
        let mut sums = vec![0.0f64; buckets];
        let mut counts = vec![0u32; buckets];

        for (i, value) in self.values.iter().enumerate() {
            let ts = self.timestamp(i);
            if ts < start || ts >= end {
                continue;
            }
            if let Some(v) = value {
                let bucket = ((ts - start) / step) as usize;
                sums[bucket] += v;
                counts[bucket] += 1;
            }
        }

        let values = sums
            .into_iter()
            .zip(counts)
            .map(|(sum, count)| {
                if count == 0 {
                    None
                } else {
                    Some(sum / count as f64)
                }
            })
            .collect();

        Series {
            name: self.name.clone(),
            start,
            end,
            step,
            values,
            render: self.render,
        }
    }
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}, {}) step {}s, {} samples",
            self.name,
            self.start,
            self.end,
            self.step,
            self.values.len()
        )
    }
}

/// Reconcile two series onto the coarser of their two steps
///
/// Both outputs share the coarser step over the overlapping time range,
/// truncated to a whole number of coarse buckets. The finer series is
/// downsampled by arithmetic mean per bucket, ignoring gaps; an all-gap
/// bucket stays a gap.
///
/// # Errors
///
/// [`SeriesError::IncompatibleRange`] when the ranges share no whole bucket.
pub fn align(a: &Series, b: &Series) -> Result<(Series, Series), SeriesError> {
    let mut pair = normalize(&[a.clone(), b.clone()])?;
    let second = pair.pop().expect("normalize preserves arity");
    let first = pair.pop().expect("normalize preserves arity");
    Ok((first, second))
}

/// Reconcile any number of series onto a common grid
///
/// The common grid uses the coarsest step among the inputs over the range
/// every input covers. Empty input yields empty output.
///
/// # Errors
///
/// [`SeriesError::IncompatibleRange`] when the inputs share no whole bucket.
pub fn normalize(list: &[Series]) -> Result<Vec<Series>, SeriesError> {
    if list.is_empty() {
        return Ok(Vec::new());
    }

    let mut start = list[0].start;
    let mut end = list[0].end;
    let mut step = list[0].step;
    for series in &list[1..] {
        start = start.max(series.start);
        end = end.min(series.end);
        step = step.max(series.step);
    }
    if start >= end {
        return Err(SeriesError::IncompatibleRange);
    }

    let buckets = ((end - start) / step) as usize;
    if buckets == 0 {
        return Err(SeriesError::IncompatibleRange);
    }

    Ok(list
        .iter()
        .map(|series| series.resample(start, step, buckets))
        .collect())
}

/// Stitch same-step partials into one contiguous series
///
/// `partials` must share one step and one sample grid; the output spans the
/// envelope of all input ranges. Slice order is ascending precedence: where
/// two partials both have a sample at a timestamp, the later one wins. A gap
/// never overwrites a value, and positions gapped in every partial stay gaps.
///
/// # Errors
///
/// - [`SeriesError::EmptyMerge`] on empty input
/// - [`SeriesError::StepMismatch`] when steps differ
/// - [`SeriesError::Misaligned`] when starts do not share a grid
pub fn merge(name: impl Into<String>, partials: &[Series]) -> Result<Series, SeriesError> {
    let first = partials.first().ok_or(SeriesError::EmptyMerge)?;
    let step = first.step;

    let mut start = first.start;
    let mut end = first.end;
    for partial in &partials[1..] {
        if partial.step != step {
            return Err(SeriesError::StepMismatch(step, partial.step));
        }
        start = start.min(partial.start);
        end = end.max(partial.end);
    }
    for partial in partials {
        if (partial.start - start) % step != 0 {
            return Err(SeriesError::Misaligned);
        }
    }

    let len = ((end - start) / step) as usize;
    let mut values: Vec<Option<f64>> = vec![None; len];
    for partial in partials {
        let offset = ((partial.start - start) / step) as usize;
        for (i, value) in partial.values.iter().enumerate() {
            if value.is_some() {
                values[offset + i] = *value;
            }
        }
    }

    Series::new(name, start, end, step, values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(name: &str, start: i64, step: i64, values: Vec<Option<f64>>) -> Series {
        Series::from_values(name, start, step, values).unwrap()
    }

    #[test]
    fn test_new_rejects_bad_step() {
        assert_eq!(
            Series::new("a", 0, 60, 0, vec![]).unwrap_err(),
            SeriesError::InvalidStep(0)
        );
        assert!(matches!(
            Series::new("a", 0, 60, -10, vec![]).unwrap_err(),
            SeriesError::InvalidStep(-10)
        ));
    }

    #[test]
    fn test_new_rejects_length_mismatch() {
        let err = Series::new("a", 0, 120, 60, vec![Some(1.0)]).unwrap_err();
        assert!(matches!(err, SeriesError::LengthMismatch { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn test_align_downsamples_finer_series() {
        // One hour at step 60 vs the same hour at step 300: both land on
        // step 300, the finer one's buckets averaging 5 samples each.
        let fine_values: Vec<Option<f64>> = (0..60).map(|i| Some(i as f64)).collect();
        let fine = series("fine", 0, 60, fine_values);
        let coarse_values: Vec<Option<f64>> = (0..12).map(|i| Some(i as f64 * 10.0)).collect();
        let coarse = series("coarse", 0, 300, coarse_values);

        let (a, b) = align(&fine, &coarse).unwrap();
        assert_eq!(a.step, 300);
        assert_eq!(b.step, 300);
        assert_eq!(a.len(), 12);
        assert_eq!(b.len(), 12);

        // First bucket of the fine series: mean of 0..5
        assert_eq!(a.values[0], Some(2.0));
        // Second bucket: mean of 5..10
        assert_eq!(a.values[1], Some(7.0));
        // Coarse series is untouched
        assert_eq!(b.values, coarse.values);
    }

    #[test]
    fn test_align_ignores_gaps_in_buckets() {
        let fine = series(
            "fine",
            0,
            60,
            vec![Some(1.0), None, Some(3.0), None, None],
        );
        let coarse = series("coarse", 0, 300, vec![Some(0.0)]);

        let (a, _) = align(&fine, &coarse).unwrap();
        assert_eq!(a.values[0], Some(2.0));
    }

    #[test]
    fn test_align_all_gap_bucket_stays_gap() {
        let fine = series("fine", 0, 60, vec![None; 5]);
        let coarse = series("coarse", 0, 300, vec![Some(1.0)]);

        let (a, _) = align(&fine, &coarse).unwrap();
        assert_eq!(a.values[0], None);
    }

    #[test]
    fn test_align_disjoint_ranges() {
        let a = series("a", 0, 60, vec![Some(1.0); 5]);
        let b = series("b", 3600, 60, vec![Some(1.0); 5]);
        assert_eq!(align(&a, &b).unwrap_err(), SeriesError::IncompatibleRange);
    }

    #[test]
    fn test_normalize_empty() {
        assert!(normalize(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_merge_concatenates_disjoint_partials() {
        let head: Vec<Option<f64>> = (0..30).map(|i| Some(i as f64)).collect();
        let tail: Vec<Option<f64>> = (30..60).map(|i| Some(i as f64)).collect();
        let a = series("a", 0, 1, head);
        let b = series("b", 30, 1, tail);

        let merged = merge("a", &[a, b]).unwrap();
        assert_eq!(merged.len(), 60);
        assert_eq!(merged.start, 0);
        assert_eq!(merged.end, 60);
        let expected: Vec<Option<f64>> = (0..60).map(|i| Some(i as f64)).collect();
        assert_eq!(merged.values, expected);
    }

    #[test]
    fn test_merge_later_partial_wins_on_overlap() {
        let low = series("low", 0, 60, vec![Some(1.0), Some(1.0), Some(1.0)]);
        let high = series("high", 60, 60, vec![Some(9.0), Some(9.0)]);

        let merged = merge("m", &[low, high]).unwrap();
        assert_eq!(merged.values, vec![Some(1.0), Some(9.0), Some(9.0)]);
    }

    #[test]
    fn test_merge_gap_never_overwrites_value() {
        let low = series("low", 0, 60, vec![Some(1.0), Some(2.0)]);
        let high = series("high", 0, 60, vec![None, Some(5.0)]);

        let merged = merge("m", &[low, high]).unwrap();
        assert_eq!(merged.values, vec![Some(1.0), Some(5.0)]);
    }

    #[test]
    fn test_merge_rejects_step_mismatch() {
        let a = series("a", 0, 60, vec![Some(1.0)]);
        let b = series("b", 0, 300, vec![Some(1.0)]);
        assert_eq!(
            merge("m", &[a, b]).unwrap_err(),
            SeriesError::StepMismatch(60, 300)
        );
    }

    #[test]
    fn test_merge_rejects_misaligned_grid() {
        let a = series("a", 0, 60, vec![Some(1.0)]);
        let b = series("b", 30, 60, vec![Some(1.0)]);
        assert_eq!(merge("m", &[a, b]).unwrap_err(), SeriesError::Misaligned);
    }

    #[test]
    fn test_merge_empty() {
        assert_eq!(merge("m", &[]).unwrap_err(), SeriesError::EmptyMerge);
    }
}
