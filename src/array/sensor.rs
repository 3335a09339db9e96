use std::fmt;
use std::sync::Arc;

use crate::error::{Result, WtdError};
use crate::signal::filter::FilterParams;

// ---------------------------------------------------------------------------
// Shared value objects
// ---------------------------------------------------------------------------

/// A channel's `(min, max)` pair.  NaN samples are ignored; an all-NaN
/// channel has NaN extrema.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extremum {
    pub min: f64,
    pub max: f64,
}

impl Extremum {
    pub fn of(values: &[f64]) -> Self {
        let mut finite = values.iter().copied().filter(|v| !v.is_nan()).peekable();
        if finite.peek().is_none() {
            return Self {
                min: f64::NAN,
                max: f64::NAN,
            };
        }
        let (min, max) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        Self { min, max }
    }
}

/// Sample-index window of the pre-exposure recording, `start..=end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Baseline {
    pub start: usize,
    pub end: usize,
}

impl Baseline {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// The window must lie within `[0, len)`.
    pub fn check(&self, len: usize) -> Result<()> {
        if self.start > self.end || self.end >= len {
            return Err(WtdError::Validation(format!(
                "baseline ({}, {}) outside series of length {len}",
                self.start, self.end
            )));
        }
        Ok(())
    }
}

/// Mean and sample variance (`n - 1` denominator), skipping NaN.
pub fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    let finite: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    let n = finite.len();
    if n == 0 {
        return (f64::NAN, f64::NAN);
    }
    let mean = finite.iter().sum::<f64>() / n as f64;
    if n < 2 {
        return (mean, f64::NAN);
    }
    let ss: f64 = finite.iter().map(|v| (v - mean).powi(2)).sum();
    (mean, ss / (n - 1) as f64)
}

// ---------------------------------------------------------------------------
// Sensor – one channel of a board
// ---------------------------------------------------------------------------

/// A single sensor's readout with statistics fixed at construction.
///
/// Sensors are never patched: when their board's data or baseline changes
/// the board builds new ones.  Only the filter can be replaced in place, and
/// only until the next cascade from above.
#[derive(Debug, Clone)]
pub struct Sensor {
    index: usize,
    time: Arc<[f64]>,
    readout: Vec<f64>,
    extremum: Extremum,
    mean: f64,
    var: f64,
    baseline: Baseline,
    filter: FilterParams,
    valid: bool,
}

impl Sensor {
    pub fn new(
        index: usize,
        time: Arc<[f64]>,
        readout: Vec<f64>,
        baseline: Baseline,
        extremum: Extremum,
        filter: FilterParams,
    ) -> Self {
        let (mean, var) = mean_and_variance(&readout);
        Self {
            index,
            time,
            readout,
            extremum,
            mean,
            var,
            baseline,
            filter,
            valid: true,
        }
    }

    /// Position on the board, 1..=8.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> String {
        format!("Sensor {}", self.index)
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn readout(&self) -> &[f64] {
        &self.readout
    }

    pub fn min(&self) -> f64 {
        self.extremum.min
    }

    pub fn max(&self) -> f64 {
        self.extremum.max
    }

    pub fn extremum(&self) -> Extremum {
        self.extremum
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn var(&self) -> f64 {
        self.var
    }

    /// Fano factor, variance over mean.
    pub fn fano(&self) -> f64 {
        self.var / self.mean
    }

    pub fn baseline(&self) -> Baseline {
        self.baseline
    }

    /// Readout during the baseline window.
    pub fn baseline_readout(&self) -> &[f64] {
        let end = self.baseline.end.min(self.readout.len().saturating_sub(1));
        let start = self.baseline.start.min(end);
        self.readout.get(start..=end).unwrap_or(&[])
    }

    pub fn filter(&self) -> &FilterParams {
        &self.filter
    }

    /// Override this sensor's filter.  A later cascade from the board or
    /// column replaces it again.
    pub fn set_filter(&mut self, filter: FilterParams) {
        self.filter = filter;
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub(crate) fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Zero-phase filtered readout.
    pub fn filtered(&self) -> Vec<f64> {
        self.filter.filtfilt(&self.readout)
    }

    /// Readout scaled to `[0, 1]` by this sensor's own extrema.
    pub fn normalized(&self) -> Vec<f64> {
        normalize(&self.readout, self.extremum.min, self.extremum.max)
    }
}

pub fn normalize(values: &[f64], min: f64, max: f64) -> Vec<f64> {
    let span = max - min;
    values.iter().map(|v| (v - min) / span).collect()
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "> {} | Mean: {:.0} | Var: {:.3} | Min: {:.0} | Max: {:.0}{}",
            self.name(),
            self.mean,
            self.var,
            self.extremum.min,
            self.extremum.max,
            if self.valid { "" } else { " -> Invalid!" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::filter::{butter, FilterKind};

    fn sensor(values: Vec<f64>) -> Sensor {
        let time: Arc<[f64]> = (0..values.len()).map(|i| i as f64 * 10.0).collect();
        let ex = Extremum::of(&values);
        let filter = butter(2, 0.2, FilterKind::Lowpass).unwrap();
        Sensor::new(3, time, values, Baseline::new(0, 1), ex, filter)
    }

    #[test]
    fn stats_are_fixed_at_construction() {
        let s = sensor(vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(s.min(), 2.0);
        assert_eq!(s.max(), 9.0);
        assert_eq!(s.mean(), 5.0);
        assert!((s.var() - 32.0 / 7.0).abs() < 1e-12);
        assert!((s.fano() - 32.0 / 35.0).abs() < 1e-12);
        assert!(s.is_valid());
        assert_eq!(s.name(), "Sensor 3");
    }

    #[test]
    fn nan_samples_are_skipped() {
        let s = sensor(vec![1.0, f64::NAN, 3.0]);
        assert_eq!(s.extremum(), Extremum { min: 1.0, max: 3.0 });
        assert_eq!(s.mean(), 2.0);
        assert!(Extremum::of(&[f64::NAN]).min.is_nan());
    }

    #[test]
    fn normalized_spans_unit_interval() {
        let s = sensor(vec![10.0, 15.0, 20.0]);
        assert_eq!(s.normalized(), vec![0.0, 0.5, 1.0]);
        assert_eq!(s.baseline_readout(), &[10.0, 15.0]);
    }

    #[test]
    fn filter_override_and_invalidation() {
        let mut s = sensor(vec![1.0; 20]);
        let other = butter(2, 0.5, FilterKind::Lowpass).unwrap();
        s.set_filter(other.clone());
        assert_eq!(s.filter(), &other);
        assert_eq!(s.filtered().len(), 20);
        s.invalidate();
        assert!(!s.is_valid());
        assert!(s.to_string().ends_with("-> Invalid!"));
    }

    #[test]
    fn baseline_bounds() {
        assert!(Baseline::new(0, 9).check(10).is_ok());
        assert!(matches!(Baseline::new(0, 10).check(10), Err(WtdError::Validation(_))));
        assert!(Baseline::new(5, 4).check(10).is_err());
    }
}
