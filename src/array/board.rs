use std::fmt;
use std::sync::Arc;

use super::sensor::{normalize, Baseline, Extremum, Sensor};
use super::validate::find_outliers;
use crate::data::model::SENSORS_PER_BOARD;
use crate::error::{Result, WtdError};
use crate::signal::filter::FilterParams;

// ---------------------------------------------------------------------------
// SensorBoard – eight sensors sharing baseline and filter
// ---------------------------------------------------------------------------

/// One board of a column: always exactly eight sensors.
///
/// Changing the board's data or baseline rebuilds all eight sensors and
/// re-runs outlier validation.  Changing its filter cascades to every sensor,
/// replacing any sensor-level override.
#[derive(Debug, Clone)]
pub struct SensorBoard {
    index: usize,
    time: Arc<[f64]>,
    readouts: Vec<Vec<f64>>,
    baseline: Baseline,
    filter: FilterParams,
    extrema: Vec<Extremum>,
    sensors: Vec<Sensor>,
}

impl SensorBoard {
    /// Build a board and its sensors, then validate them.
    pub fn new(
        index: usize,
        time: Arc<[f64]>,
        readouts: Vec<Vec<f64>>,
        baseline: Baseline,
        filter: FilterParams,
    ) -> Result<Self> {
        check_readouts(&time, &readouts)?;
        baseline.check(time.len())?;
        let extrema = readouts.iter().map(|r| Extremum::of(r)).collect();
        let mut board = Self {
            index,
            time,
            readouts,
            baseline,
            filter,
            extrema,
            sensors: Vec::new(),
        };
        board.rebuild();
        Ok(board)
    }

    /// Recreate every sensor from the board's current state and validate.
    pub fn rebuild(&mut self) {
        self.sensors = self
            .readouts
            .iter()
            .zip(&self.extrema)
            .enumerate()
            .map(|(i, (readout, extremum))| {
                Sensor::new(
                    i + 1,
                    Arc::clone(&self.time),
                    readout.clone(),
                    self.baseline,
                    *extremum,
                    self.filter.clone(),
                )
            })
            .collect();
        self.validate();
    }

    /// Flag outlier sensors invalid.  Returns the 1-based indices flagged.
    pub fn validate(&mut self) -> Vec<usize> {
        let flagged: Vec<usize> = find_outliers(&self.extrema);
        for &pos in &flagged {
            self.sensors[pos].invalidate();
        }
        if !flagged.is_empty() {
            log::debug!(
                "{}: invalid sensors {:?}",
                self.name(),
                flagged.iter().map(|p| p + 1).collect::<Vec<_>>()
            );
        }
        flagged.into_iter().map(|p| p + 1).collect()
    }

    // -- mutation ------------------------------------------------------------

    /// Replace the board's data; every sensor is rebuilt.
    pub fn set_data(&mut self, time: Arc<[f64]>, readouts: Vec<Vec<f64>>) -> Result<()> {
        check_readouts(&time, &readouts)?;
        self.baseline.check(time.len())?;
        self.time = time;
        self.readouts = readouts;
        self.extrema = self.readouts.iter().map(|r| Extremum::of(r)).collect();
        self.rebuild();
        Ok(())
    }

    /// Replace the baseline window; extrema are recomputed and every sensor rebuilt.
    pub fn set_baseline(&mut self, baseline: Baseline) -> Result<()> {
        baseline.check(self.time.len())?;
        self.baseline = baseline;
        self.extrema = self.readouts.iter().map(|r| Extremum::of(r)).collect();
        self.rebuild();
        Ok(())
    }

    /// Replace the filter here and on every sensor.
    pub fn set_filter(&mut self, filter: FilterParams) {
        for sensor in &mut self.sensors {
            sensor.set_filter(filter.clone());
        }
        self.filter = filter;
    }

    // -- access --------------------------------------------------------------

    /// Position in the column, 1..=9.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> String {
        format!("Board {}", self.index)
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn baseline(&self) -> Baseline {
        self.baseline
    }

    pub fn filter(&self) -> &FilterParams {
        &self.filter
    }

    pub fn extrema(&self) -> &[Extremum] {
        &self.extrema
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    /// Sensor by 1-based index.
    pub fn sensor(&self, index: usize) -> Option<&Sensor> {
        index.checked_sub(1).and_then(|i| self.sensors.get(i))
    }

    pub fn sensor_mut(&mut self, index: usize) -> Option<&mut Sensor> {
        index.checked_sub(1).and_then(|i| self.sensors.get_mut(i))
    }

    pub fn valid(&self) -> Vec<bool> {
        self.sensors.iter().map(Sensor::is_valid).collect()
    }

    pub fn readouts(&self) -> &[Vec<f64>] {
        &self.readouts
    }

    /// Every sensor's zero-phase filtered readout.
    pub fn filtered(&self) -> Vec<Vec<f64>> {
        self.sensors.iter().map(Sensor::filtered).collect()
    }

    /// Every readout scaled by the board-wide (valid) extrema.
    pub fn normalized(&self) -> Option<Vec<Vec<f64>>> {
        let (_, min) = self.min()?;
        let (_, max) = self.max()?;
        Some(self.readouts.iter().map(|r| normalize(r, min, max)).collect())
    }

    // -- aggregates over valid sensors, as (sensor index, value) -------------

    pub fn min(&self) -> Option<(usize, f64)> {
        self.best(Sensor::min, |a, b| a < b)
    }

    pub fn max(&self) -> Option<(usize, f64)> {
        self.best(Sensor::max, |a, b| a > b)
    }

    /// Largest sensor mean.
    pub fn mean(&self) -> Option<(usize, f64)> {
        self.best(Sensor::mean, |a, b| a > b)
    }

    /// Largest sensor variance.
    pub fn var(&self) -> Option<(usize, f64)> {
        self.best(Sensor::var, |a, b| a > b)
    }

    /// Largest sensor Fano factor.
    pub fn fano(&self) -> Option<(usize, f64)> {
        self.best(Sensor::fano, |a, b| a > b)
    }

    /// First valid sensor whose value no later valid sensor beats.  NaN
    /// values never win.  `None` when no valid sensor has a value.
    fn best(&self, value: impl Fn(&Sensor) -> f64, beats: impl Fn(f64, f64) -> bool) -> Option<(usize, f64)> {
        self.sensors
            .iter()
            .filter(|s| s.is_valid())
            .map(|s| (s.index(), value(s)))
            .filter(|(_, v)| !v.is_nan())
            .fold(None, |best, (idx, v)| match best {
                Some((_, b)) if !beats(v, b) => best,
                _ => Some((idx, v)),
            })
    }
}

fn check_readouts(time: &[f64], readouts: &[Vec<f64>]) -> Result<()> {
    if readouts.len() != SENSORS_PER_BOARD {
        return Err(WtdError::Format(format!(
            "a board needs {SENSORS_PER_BOARD} readouts, got {}",
            readouts.len()
        )));
    }
    if let Some(r) = readouts.iter().find(|r| r.len() != time.len()) {
        return Err(WtdError::Format(format!(
            "readout of length {} does not match time index of length {}",
            r.len(),
            time.len()
        )));
    }
    Ok(())
}

impl fmt::Display for SensorBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "#".repeat(60))?;
        writeln!(f, "  {}:", self.name())?;
        for s in &self.sensors {
            writeln!(f, "{s}")?;
        }
        match (self.min(), self.max(), self.var()) {
            (Some((smin, min)), Some((smax, max)), Some((svar, var))) => write!(
                f,
                "Min.: {min:.0} Ohm (Sensor {smin})\tMax.: {max:.0} Ohm (Sensor {smax})\t\
                 Max. Variance: {var:.0} (Sensor {svar})"
            ),
            _ => write!(f, "no valid sensors"),
        }
    }
}
