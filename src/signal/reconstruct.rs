use log::Level;

use super::interp::LinearSpline;
use crate::config::Options;
use crate::data::model::{Channel, SensorFrame};
use crate::error::{Result, WtdError};

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Which reconstruction stages run, and how.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructParams {
    pub drop_duplicates: bool,
    pub fill_gaps: bool,
    pub resample: bool,
    pub gap_threshold_ms: f64,
    pub fill_rate_hz: f64,
    pub fill_window: Option<usize>,
    pub resample_rate_hz: f64,
    pub horizon_ms: f64,
    pub verbose: bool,
}

impl From<&Options> for ReconstructParams {
    fn from(o: &Options) -> Self {
        Self {
            drop_duplicates: o.drop_duplicates,
            fill_gaps: o.fill_gaps,
            resample: o.resample,
            gap_threshold_ms: o.gap_threshold_ms,
            fill_rate_hz: o.fill_rate_hz,
            fill_window: o.fill_window,
            resample_rate_hz: o.resample_rate_hz,
            horizon_ms: o.horizon_ms,
            verbose: o.verbose,
        }
    }
}

impl Default for ReconstructParams {
    fn default() -> Self {
        Self::from(&Options::default())
    }
}

/// What a reconstruction run changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconstructReport {
    pub duplicates_removed: usize,
    pub gaps_filled: usize,
    pub samples_inserted: usize,
    /// Grid length, when resampling ran.
    pub resampled_rows: Option<usize>,
}

// ---------------------------------------------------------------------------
// Reconstructor – dedup → gap-fill → resample
// ---------------------------------------------------------------------------

/// Turns a raw, possibly duplicated and gapped table into one whose channels
/// all share a single clean time index.  A run either succeeds for every
/// channel or fails as a whole.
#[derive(Debug, Clone, Default)]
pub struct Reconstructor {
    params: ReconstructParams,
}

impl Reconstructor {
    pub fn new(params: ReconstructParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ReconstructParams {
        &self.params
    }

    pub fn run(&self, frame: SensorFrame) -> Result<(SensorFrame, ReconstructReport)> {
        let p = &self.params;
        let level = if p.verbose { Level::Info } else { Level::Debug };
        let mut report = ReconstructReport::default();
        let mut frame = frame;

        if p.drop_duplicates {
            let (deduped, removed) = drop_duplicates(&frame);
            if removed > 0 {
                log::log!(level, "removed {removed} duplicate timestamps");
            }
            report.duplicates_removed = removed;
            frame = deduped;
        }
        if p.fill_gaps {
            let gaps = find_gaps(frame.time(), p.gap_threshold_ms);
            if !gaps.is_empty() {
                let before = frame.len();
                frame = fill_gaps(&frame, &gaps, p.fill_rate_hz, p.fill_window)?;
                report.gaps_filled = gaps.len();
                report.samples_inserted = frame.len() + gaps.len() - before;
                log::log!(
                    level,
                    "reconstructed {} gaps ({} samples inserted)",
                    gaps.len(),
                    report.samples_inserted
                );
            }
        }
        if p.resample {
            frame = resample(&frame, p.resample_rate_hz, p.horizon_ms)?;
            report.resampled_rows = Some(frame.len());
            log::log!(
                level,
                "resampled to {} Hz, {} samples",
                p.resample_rate_hz,
                frame.len()
            );
        }
        Ok((frame, report))
    }
}

// ---------------------------------------------------------------------------
// Deduplication
// ---------------------------------------------------------------------------

/// Rows whose timestamp equals the previous row's.
pub fn find_duplicates(time: &[f64]) -> Vec<usize> {
    time.windows(2)
        .enumerate()
        .filter(|(_, w)| w[1] == w[0])
        .map(|(i, _)| i + 1)
        .collect()
}

/// Drop every later duplicate, keeping the first sample of each timestamp run.
/// Returns the new frame and the number of rows removed.
pub fn drop_duplicates(frame: &SensorFrame) -> (SensorFrame, usize) {
    let dupes = find_duplicates(frame.time());
    if dupes.is_empty() {
        return (frame.clone(), 0);
    }
    let mut drop = dupes.iter().peekable();
    let keep: Vec<usize> = (0..frame.len())
        .filter(|i| {
            if drop.peek() == Some(&i) {
                drop.next();
                false
            } else {
                true
            }
        })
        .collect();
    (frame.select_rows(&keep), dupes.len())
}

// ---------------------------------------------------------------------------
// Gap filling
// ---------------------------------------------------------------------------

/// A stretch of missing samples between `time[index]` and `time[index + 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gap {
    pub index: usize,
    pub start: f64,
    pub stop: f64,
}

impl Gap {
    pub fn duration(&self) -> f64 {
        self.stop - self.start
    }
}

/// Every timestamp delta greater than `threshold`.
pub fn find_gaps(time: &[f64], threshold: f64) -> Vec<Gap> {
    time.windows(2)
        .enumerate()
        .filter(|(_, w)| w[1] - w[0] > threshold)
        .map(|(i, w)| Gap {
            index: i,
            start: w[0],
            stop: w[1],
        })
        .collect()
}

/// Timestamps from `start` (inclusive) to `stop` (exclusive) at `step`.
pub fn gap_timestamps(start: f64, stop: f64, step: f64) -> Vec<f64> {
    let eps = step * 1e-9;
    (0..)
        .map(|k| start + k as f64 * step)
        .take_while(|&t| t < stop - eps)
        .collect()
}

/// Bridge every gap with synthetic samples at `rate_hz`.
///
/// Per gap and per channel, one degree-1 spline is fitted to the `window`
/// real samples just left of the gap and another to the `window` samples
/// just right of it.  The first half of the new timestamps is evaluated on
/// the left fit, the second half on the right fit.  The sample at the gap
/// start is replaced by the first synthetic sample.  `window` defaults to
/// the gap's own sample count.
pub fn fill_gaps(
    frame: &SensorFrame,
    gaps: &[Gap],
    rate_hz: f64,
    window: Option<usize>,
) -> Result<SensorFrame> {
    let step = 1000.0 / rate_hz;
    let time = frame.time();
    let n = time.len();

    struct Bridge {
        gap: Gap,
        new_x: Vec<f64>,
        left: std::ops::Range<usize>,
        right: std::ops::Range<usize>,
    }

    let mut bridges = Vec::with_capacity(gaps.len());
    for gap in gaps {
        let new_x = gap_timestamps(gap.start, gap.stop, step);
        let w = window.unwrap_or_else(|| ((gap.duration() / step).ceil() as usize).max(2));
        let i = gap.index;
        if i < w || i + 1 + w > n {
            return Err(WtdError::Reconstruction(format!(
                "gap {}..{} ms needs {w} samples on each side, found {} left and {} right",
                gap.start,
                gap.stop,
                i,
                n - i - 1
            )));
        }
        bridges.push(Bridge {
            gap: *gap,
            new_x,
            left: i - w..i,
            right: i + 1..i + 1 + w,
        });
    }

    let splice = |values: &[f64], fills: &[Vec<f64>]| -> Vec<f64> {
        let mut out = Vec::with_capacity(values.len() + fills.iter().map(Vec::len).sum::<usize>());
        let mut from = 0;
        for (bridge, fill) in bridges.iter().zip(fills) {
            out.extend_from_slice(&values[from..bridge.gap.index]);
            out.extend_from_slice(fill);
            from = bridge.gap.index + 1;
        }
        out.extend_from_slice(&values[from..]);
        out
    };

    let time_fills: Vec<Vec<f64>> = bridges.iter().map(|b| b.new_x.clone()).collect();
    let new_time = splice(time, &time_fills);

    let mut channels = Vec::with_capacity(frame.channels().len());
    for ch in frame.channels() {
        let mut fills = Vec::with_capacity(bridges.len());
        if ch.values.iter().all(|v| v.is_nan()) {
            fills.extend(bridges.iter().map(|b| vec![f64::NAN; b.new_x.len()]));
            channels.push(Channel::new(ch.name.clone(), splice(&ch.values, &fills)));
            continue;
        }
        for b in &bridges {
            let half = (b.new_x.len() + 1) / 2;
            let (x_left, x_right) = b.new_x.split_at(half);
            let fit = |r: &std::ops::Range<usize>| {
                LinearSpline::fit(&time[r.clone()], &ch.values[r.clone()]).map_err(|e| {
                    WtdError::Reconstruction(format!(
                        "channel {} around gap at {} ms: {e}",
                        ch.name, b.gap.start
                    ))
                })
            };
            let mut fill = fit(&b.left)?.eval_many(x_left);
            fill.extend(fit(&b.right)?.eval_many(x_right));
            fills.push(fill);
        }
        channels.push(Channel::new(ch.name.clone(), splice(&ch.values, &fills)));
    }

    SensorFrame::new(new_time, channels)
}

// ---------------------------------------------------------------------------
// Resampling
// ---------------------------------------------------------------------------

/// Uniform grid `step, 2·step, …` up to and including `horizon_ms`, with
/// `step = 1000 / rate_hz`.
pub fn uniform_grid(rate_hz: f64, horizon_ms: f64) -> Vec<f64> {
    let step = 1000.0 / rate_hz;
    let count = (horizon_ms / step + 1e-9).floor() as usize;
    (1..=count).map(|k| k as f64 * step).collect()
}

/// Evaluate one global degree-1 spline per channel on the uniform grid.
/// A channel with no finite samples stays all-NaN.
pub fn resample(frame: &SensorFrame, rate_hz: f64, horizon_ms: f64) -> Result<SensorFrame> {
    let grid = uniform_grid(rate_hz, horizon_ms);
    let mut channels = Vec::with_capacity(frame.channels().len());
    for ch in frame.channels() {
        let values = if ch.values.iter().all(|v| v.is_nan()) {
            vec![f64::NAN; grid.len()]
        } else {
            LinearSpline::fit(frame.time(), &ch.values)
                .map_err(|e| WtdError::Reconstruction(format!("resampling {}: {e}", ch.name)))?
                .eval_many(&grid)
        };
        channels.push(Channel::new(ch.name.clone(), values));
    }
    SensorFrame::new(grid, channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(time: Vec<f64>) -> SensorFrame {
        let a = time.iter().map(|t| t * 2.0).collect();
        let b = time.iter().map(|t| 100.0 - t).collect();
        SensorFrame::new(time, vec![Channel::new("a", a), Channel::new("b", b)]).unwrap()
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let f = SensorFrame::new(
            vec![0.0, 10.0, 10.0, 20.0, 20.0, 20.0, 30.0],
            vec![Channel::new("a", vec![1.0, 2.0, 9.0, 3.0, 9.0, 9.0, 4.0])],
        )
        .unwrap();
        assert_eq!(find_duplicates(f.time()), vec![2, 4, 5]);
        let (d, removed) = drop_duplicates(&f);
        assert_eq!(removed, 3);
        assert_eq!(d.time(), &[0.0, 10.0, 20.0, 30.0]);
        assert_eq!(d.channel("a").unwrap(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn deduplication_is_idempotent() {
        let f = frame(vec![0.0, 0.0, 10.0, 20.0, 20.0, 30.0]);
        let (once, _) = drop_duplicates(&f);
        let (twice, removed) = drop_duplicates(&once);
        assert_eq!(removed, 0);
        assert_eq!(once, twice);
    }

    #[test]
    fn gaps_above_threshold_only() {
        let gaps = find_gaps(&[0.0, 10.0, 110.0, 120.0, 370.0], 100.0);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0], Gap { index: 3, start: 120.0, stop: 370.0 });
    }

    #[test]
    fn gap_of_250_at_100_hz_bridges_exactly() {
        let mut time: Vec<f64> = (0..40).map(|i| i as f64 * 10.0).collect();
        let start = *time.last().unwrap();
        let stop = start + 250.0;
        time.extend((0..40).map(|i| stop + i as f64 * 10.0));
        let f = frame(time);

        let gaps = find_gaps(f.time(), 100.0);
        assert_eq!(gaps.len(), 1);
        let filled = fill_gaps(&f, &gaps, 100.0, None).unwrap();

        let t = filled.time();
        assert!(t.windows(2).all(|w| w[1] > w[0]), "not strictly increasing");
        let inserted = gap_timestamps(start, stop, 10.0);
        assert_eq!(inserted.len(), 25);
        assert_eq!(inserted[0], start);
        assert_eq!(*inserted.last().unwrap(), stop - 10.0);
        assert!(t.contains(&start) && t.contains(&stop));
        assert_eq!(filled.len(), f.len() - 1 + 25);
        assert!(find_gaps(t, 100.0).is_empty());

        // both sides of a linear ramp extrapolate back onto the ramp
        let a = filled.channel("a").unwrap();
        for (ti, ai) in t.iter().zip(a) {
            assert!((ai - ti * 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn two_sided_fit_follows_each_edge() {
        // flat at 1.0 left of the gap, flat at 5.0 right of it
        let mut time: Vec<f64> = (0..20).map(|i| i as f64 * 10.0).collect();
        time.extend((0..20).map(|i| 390.0 + i as f64 * 10.0));
        let values: Vec<f64> = time.iter().map(|&t| if t < 300.0 { 1.0 } else { 5.0 }).collect();
        let f = SensorFrame::new(time, vec![Channel::new("a", values)]).unwrap();
        let gaps = find_gaps(f.time(), 100.0);
        let filled = fill_gaps(&f, &gaps, 100.0, Some(5)).unwrap();

        let t = filled.time();
        let a = filled.channel("a").unwrap();
        let first = t.iter().position(|&x| x == 190.0).unwrap();
        let last = t.iter().position(|&x| x == 390.0).unwrap();
        let bridge = &a[first..last];
        assert_eq!(bridge.len(), 20);
        assert!(bridge[..10].iter().all(|&v| v == 1.0));
        assert!(bridge[10..].iter().all(|&v| v == 5.0));
    }

    #[test]
    fn too_few_samples_at_gap_edge_is_fatal() {
        let f = frame(vec![0.0, 10.0, 500.0, 510.0, 520.0]);
        let gaps = find_gaps(f.time(), 100.0);
        let err = fill_gaps(&f, &gaps, 100.0, None).unwrap_err();
        assert!(matches!(err, WtdError::Reconstruction(_)));
    }

    #[test]
    fn grid_spans_step_to_horizon() {
        let g = uniform_grid(100.0, 1000.0);
        assert_eq!(g.len(), 100);
        assert_eq!(g[0], 10.0);
        assert_eq!(*g.last().unwrap(), 1000.0);
    }

    #[test]
    fn resampling_is_idempotent() {
        let time: Vec<f64> = vec![0.0, 7.0, 15.0, 31.0, 44.0, 58.0, 71.0, 90.0, 104.0];
        let values: Vec<f64> = time.iter().map(|t: &f64| (t / 13.0).sin() * 50.0 + 200.0).collect();
        let f = SensorFrame::new(time, vec![Channel::new("a", values)]).unwrap();

        let once = resample(&f, 100.0, 100.0).unwrap();
        let twice = resample(&once, 100.0, 100.0).unwrap();
        assert_eq!(once.time(), twice.time());
        for (x, y) in once.channel("a").unwrap().iter().zip(twice.channel("a").unwrap()) {
            assert!((x - y).abs() < 1e-9);
        }
    }

    #[test]
    fn all_nan_channel_stays_nan() {
        let f = SensorFrame::new(
            vec![0.0, 10.0, 20.0],
            vec![Channel::new("a", vec![f64::NAN; 3]), Channel::new("b", vec![1.0, 2.0, 3.0])],
        )
        .unwrap();
        let r = resample(&f, 100.0, 20.0).unwrap();
        assert!(r.channel("a").unwrap().iter().all(|v| v.is_nan()));
        assert_eq!(r.channel("b").unwrap(), &[2.0, 3.0]);
    }

    #[test]
    fn all_nan_channel_is_bridged_with_nan() {
        let mut time: Vec<f64> = (0..20).map(|i| i as f64 * 10.0).collect();
        time.extend((0..20).map(|i| 390.0 + i as f64 * 10.0));
        let b: Vec<f64> = time.iter().map(|&t| 100.0 - t).collect();
        let f = SensorFrame::new(
            time,
            vec![Channel::new("a", vec![f64::NAN; 40]), Channel::new("b", b)],
        )
        .unwrap();
        let gaps = find_gaps(f.time(), 100.0);
        let filled = fill_gaps(&f, &gaps, 100.0, Some(5)).unwrap();

        assert_eq!(filled.len(), 59);
        assert!(filled.channel("a").unwrap().iter().all(|v| v.is_nan()));
        let t = filled.time();
        for (ti, bi) in t.iter().zip(filled.channel("b").unwrap()) {
            assert!((bi - (100.0 - ti)).abs() < 1e-9);
        }
    }

    #[test]
    fn pipeline_shares_one_index() {
        let mut time: Vec<f64> = (0..50).map(|i| i as f64 * 10.0).collect();
        time.insert(10, 90.0);
        time.extend((0..50).map(|i| 790.0 + i as f64 * 10.0));
        let f = frame(time);

        let params = ReconstructParams {
            horizon_ms: 1000.0,
            ..ReconstructParams::default()
        };
        let (out, report) = Reconstructor::new(params).run(f).unwrap();
        assert_eq!(report.duplicates_removed, 1);
        assert_eq!(report.gaps_filled, 1);
        assert_eq!(report.resampled_rows, Some(100));
        assert_eq!(out.time(), uniform_grid(100.0, 1000.0).as_slice());
        for ch in out.channels() {
            assert_eq!(ch.values.len(), out.len());
        }
    }
}
