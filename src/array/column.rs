use std::fmt;
use std::sync::Arc;

use super::board::SensorBoard;
use super::sensor::Baseline;
use crate::config::Options;
use crate::data::cache::CacheStore;
use crate::data::ingest::{save_frame, DataSource, Ingestor};
use crate::data::locator::Locator;
use crate::data::model::{SensorFrame, BOARDS, MFC_READ_CHANNELS};
use crate::error::{Result, WtdError};
use crate::experiment::ExperimentKey;
use crate::signal::filter::{FilterDesign, FilterParams};
use crate::signal::reconstruct::{ReconstructParams, ReconstructReport, Reconstructor};

/// Baseline length assumed when no mass flow controller reports a gas release.
pub const DEFAULT_BASELINE_SAMPLES: usize = 1000;

/// First sample at which any mass flow controller reading exceeds half of
/// that controller's maximum.  `None` when no controller shows a release.
pub fn detect_baseline_end(frame: &SensorFrame) -> Option<usize> {
    MFC_READ_CHANNELS
        .iter()
        .filter_map(|name| frame.channel(name))
        .filter_map(|values| {
            let max = values
                .iter()
                .copied()
                .filter(|v| v.is_finite())
                .fold(f64::NEG_INFINITY, f64::max);
            if !max.is_finite() {
                return None;
            }
            values.iter().position(|&v| v > max / 2.0)
        })
        .min()
}

// ---------------------------------------------------------------------------
// SensorColumn – nine boards of one experiment trial
// ---------------------------------------------------------------------------

/// Top of the aggregate tree: owns the column table and exactly nine boards.
///
/// Every data or baseline change rebuilds all boards (and so all 72 sensors);
/// a filter change cascades to every board and sensor.  A column is either
/// fully built or not returned at all.
#[derive(Debug, Clone)]
pub struct SensorColumn {
    key: ExperimentKey,
    options: Options,
    frame: SensorFrame,
    time: Arc<[f64]>,
    baseline: Baseline,
    filter: FilterParams,
    boards: Vec<SensorBoard>,
    source: DataSource,
    report: ReconstructReport,
}

impl SensorColumn {
    /// Ingest, reconstruct and build the column for `key` from `locator`.
    ///
    /// With a cache store configured, a freshly parsed column is persisted
    /// (without overwriting) once it has been built.
    pub fn load(locator: &Locator, key: ExperimentKey, options: Options) -> Result<Self> {
        let mut ingestor = Ingestor::new(key.clone(), options.clone())?;
        ingestor.load(locator)?;
        let (raw, source) = ingestor.into_frame()?;
        if raw.is_empty() {
            return Err(WtdError::State(format!("{key}: {locator} holds no samples")));
        }

        // detected on the raw table, carried through reconstruction by time
        let end = match detect_baseline_end(&raw) {
            Some(end) => end,
            None => {
                log::warn!(
                    "{key}: no readings from mass flow controllers, don't expect useful data; \
                     assuming a {DEFAULT_BASELINE_SAMPLES}-sample baseline"
                );
                DEFAULT_BASELINE_SAMPLES.min(raw.len() - 1)
            }
        };
        let baseline_end_time = raw.time()[end];

        let params = ReconstructParams::from(&options);
        let (frame, report) = Reconstructor::new(params).run(raw)?;
        if frame.is_empty() {
            return Err(WtdError::State(format!("{key}: reconstruction left no samples")));
        }
        let end = frame.index_at_or_after(baseline_end_time).min(frame.len() - 1);

        let column = Self::build(key, options, frame, Baseline::new(0, end), source, report)?;

        if source == DataSource::Raw {
            if let Some(location) = column.options.cache_store() {
                let store = CacheStore::create(location)?;
                column.save(&store, false)?;
            }
        }
        Ok(column)
    }

    /// Build a column from an already-prepared table, detecting its baseline.
    pub fn from_frame(key: ExperimentKey, frame: SensorFrame, options: Options) -> Result<Self> {
        if frame.is_empty() {
            return Err(WtdError::State(format!("{key}: no data")));
        }
        let end = detect_baseline_end(&frame).unwrap_or(DEFAULT_BASELINE_SAMPLES.min(frame.len() - 1));
        Self::build(
            key,
            options,
            frame,
            Baseline::new(0, end),
            DataSource::Raw,
            ReconstructReport::default(),
        )
    }

    fn build(
        key: ExperimentKey,
        options: Options,
        frame: SensorFrame,
        baseline: Baseline,
        source: DataSource,
        report: ReconstructReport,
    ) -> Result<Self> {
        frame.check_layout()?;
        baseline.check(frame.len())?;
        let filter = FilterDesign::default().coefficients(frame.sample_rate())?;
        let time: Arc<[f64]> = frame.time().into();
        let mut column = Self {
            key,
            options,
            frame,
            time,
            baseline,
            filter,
            boards: Vec::with_capacity(BOARDS),
            source,
            report,
        };
        column.rebuild()?;
        log::debug!("{}: built from {}", column.key, column.source);
        Ok(column)
    }

    /// Recreate all nine boards (and their sensors) from the column's state.
    pub fn rebuild(&mut self) -> Result<()> {
        let mut boards = Vec::with_capacity(BOARDS);
        for b in 1..=BOARDS {
            boards.push(SensorBoard::new(
                b,
                Arc::clone(&self.time),
                self.frame.board_readouts(b)?,
                self.baseline,
                self.filter.clone(),
            )?);
        }
        self.boards = boards;
        Ok(())
    }

    // -- mutation ------------------------------------------------------------

    /// Replace the column table.  The current baseline must still fit; on any
    /// error the column is left unchanged.
    pub fn set_data(&mut self, frame: SensorFrame) -> Result<()> {
        frame.check_layout()?;
        self.baseline.check(frame.len())?;
        let previous = std::mem::replace(&mut self.frame, frame);
        let previous_time = std::mem::replace(&mut self.time, self.frame.time().into());
        if let Err(e) = self.rebuild() {
            self.frame = previous;
            self.time = previous_time;
            return Err(e);
        }
        Ok(())
    }

    /// Replace the baseline window on the column and every board and sensor.
    pub fn set_baseline(&mut self, baseline: Baseline) -> Result<()> {
        baseline.check(self.frame.len())?;
        for board in &mut self.boards {
            board.set_baseline(baseline)?;
        }
        self.baseline = baseline;
        Ok(())
    }

    /// Replace the filter on the column and every board and sensor.
    pub fn set_filter(&mut self, filter: FilterParams) {
        for board in &mut self.boards {
            board.set_filter(filter.clone());
        }
        self.filter = filter;
    }

    /// Design a filter for this column's sample rate and cascade it.
    pub fn set_filter_design(&mut self, design: FilterDesign) -> Result<()> {
        let filter = design.coefficients(self.sample_rate())?;
        self.set_filter(filter);
        Ok(())
    }

    /// Persist the column table under its key.
    pub fn save(&self, store: &CacheStore, overwrite: bool) -> Result<bool> {
        save_frame(store, &self.key, &self.frame, overwrite)
    }

    // -- access --------------------------------------------------------------

    pub fn key(&self) -> &ExperimentKey {
        &self.key
    }

    pub fn name(&self) -> String {
        format!("Column {}", self.key.location)
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn frame(&self) -> &SensorFrame {
        &self.frame
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

    /// Where the table came from.
    pub fn source(&self) -> DataSource {
        self.source
    }

    pub fn report(&self) -> ReconstructReport {
        self.report
    }

    /// Sample rate (Hz) implied by the time index.
    pub fn sample_rate(&self) -> Option<f64> {
        self.frame.sample_rate()
    }

    pub fn boards(&self) -> &[SensorBoard] {
        &self.boards
    }

    /// Board by 1-based index.
    pub fn board(&self, index: usize) -> Option<&SensorBoard> {
        index.checked_sub(1).and_then(|i| self.boards.get(i))
    }

    pub fn board_mut(&mut self, index: usize) -> Option<&mut SensorBoard> {
        index.checked_sub(1).and_then(|i| self.boards.get_mut(i))
    }

    /// All boards' readouts, `[board][sensor][sample]`.
    pub fn readouts(&self) -> Vec<&[Vec<f64>]> {
        self.boards.iter().map(SensorBoard::readouts).collect()
    }

    pub fn fan_setpoint(&self) -> Option<&[f64]> {
        self.frame.channel("FanSetPoint")
    }

    pub fn fan_reading(&self) -> Option<&[f64]> {
        self.frame.channel("FanReading")
    }

    /// Set point of mass flow controller 1..=3.
    pub fn mfc_setpoint(&self, mfc: usize) -> Option<&[f64]> {
        self.frame.channel(&format!("Mfc{mfc}_SetPoint"))
    }

    /// Reading of mass flow controller 1..=3.
    pub fn mfc_reading(&self, mfc: usize) -> Option<&[f64]> {
        self.frame.channel(&format!("Mfc{mfc}_Read"))
    }

    pub fn temperature(&self) -> Option<&[f64]> {
        self.frame.channel("Temp")
    }

    pub fn humidity(&self) -> Option<&[f64]> {
        self.frame.channel("RelHumid")
    }

    // -- aggregates over valid sensors, as (board, sensor, value) ------------

    pub fn min(&self) -> Option<(usize, usize, f64)> {
        self.best(SensorBoard::min, |a, b| a < b)
    }

    pub fn max(&self) -> Option<(usize, usize, f64)> {
        self.best(SensorBoard::max, |a, b| a > b)
    }

    pub fn mean(&self) -> Option<(usize, usize, f64)> {
        self.best(SensorBoard::mean, |a, b| a > b)
    }

    pub fn var(&self) -> Option<(usize, usize, f64)> {
        self.best(SensorBoard::var, |a, b| a > b)
    }

    pub fn fano(&self) -> Option<(usize, usize, f64)> {
        self.best(SensorBoard::fano, |a, b| a > b)
    }

    fn best(
        &self,
        value: impl Fn(&SensorBoard) -> Option<(usize, f64)>,
        beats: impl Fn(f64, f64) -> bool,
    ) -> Option<(usize, usize, f64)> {
        self.boards
            .iter()
            .filter_map(|b| value(b).map(|(s, v)| (b.index(), s, v)))
            .fold(None, |best, (b, s, v)| match best {
                Some((_, _, bv)) if !beats(v, bv) => best,
                _ => Some((b, s, v)),
            })
    }
}

impl fmt::Display for SensorColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  {} ({})", self.name(), self.key)?;
        for board in &self.boards {
            writeln!(f, "{board}")?;
        }
        writeln!(f)?;
        let line = |label: &str, agg: Option<(usize, usize, f64)>| match agg {
            Some((b, s, v)) => format!("{label}:\t{v:.0} Ohm (Sensor {s}, Board {b})"),
            None => format!("{label}:\tn/a"),
        };
        writeln!(f, "{}", line("Min. Resistance", self.min()))?;
        writeln!(f, "{}", line("Max. Resistance", self.max()))?;
        writeln!(f, "{}", line("Max. Variance", self.var()))?;
        writeln!(f, "{}", line("Max. Average", self.mean()))?;
        match self.sample_rate() {
            Some(sr) => write!(f, "Sampling Rate:\t{sr:.3} Hz"),
            None => write!(f, "Sampling Rate:\tn/a"),
        }
    }
}
