use super::sensor::Extremum;

/// Ratio between a removed extreme and the trimmed mean of the rest beyond
/// which the owning sensor is flagged.
pub const OUTLIER_FACTOR: f64 = 3.0;

/// Find sensors whose extreme values are out of line with the rest of the board.
///
/// Two working sets start with every sensor's maximum (`hi`) and minimum
/// (`lo`).  Each round pops the largest `hi` and the smallest `lo` (first
/// occurrence on ties) and compares them with the mean of what is left:
/// a maximum at or above `3 × mean(hi)` flags its sensor, otherwise a
/// minimum at or below `mean(lo) / 3` flags its sensor.  Rounds continue until
/// one element is left in each set.
///
/// A sensor without finite extrema (a dead channel) is flagged before the
/// first round and takes no part in the rounds.
///
/// Returns 0-based positions of flagged sensors, each at most once, in the
/// order they were flagged.
pub fn find_outliers(extrema: &[Extremum]) -> Vec<usize> {
    let (live, dead): (Vec<_>, Vec<_>) = extrema
        .iter()
        .enumerate()
        .partition(|(_, e)| e.min.is_finite() && e.max.is_finite());
    let mut flagged: Vec<usize> = dead.into_iter().map(|(i, _)| i).collect();
    let mut hi: Vec<(usize, f64)> = live.iter().map(|&(i, e)| (i, e.max)).collect();
    let mut lo: Vec<(usize, f64)> = live.iter().map(|&(i, e)| (i, e.min)).collect();

    while hi.len() > 1 || lo.len() > 1 {
        let (hi_idx, hi_val) = hi.remove(first_best(&hi, |a, b| a > b));
        let (lo_idx, lo_val) = lo.remove(first_best(&lo, |a, b| a < b));
        let hi_mean = mean(&hi);
        let lo_mean = mean(&lo);

        let hit = if hi_val >= OUTLIER_FACTOR * hi_mean {
            Some(hi_idx)
        } else if lo_val <= lo_mean / OUTLIER_FACTOR {
            Some(lo_idx)
        } else {
            None
        };
        if let Some(idx) = hit {
            if !flagged.contains(&idx) {
                flagged.push(idx);
            }
        }
    }
    flagged
}

/// Position of the first element that no later element beats.
fn first_best(set: &[(usize, f64)], beats: impl Fn(f64, f64) -> bool) -> usize {
    let mut best = 0;
    for (pos, &(_, v)) in set.iter().enumerate().skip(1) {
        if beats(v, set[best].1) {
            best = pos;
        }
    }
    best
}

fn mean(set: &[(usize, f64)]) -> f64 {
    set.iter().map(|&(_, v)| v).sum::<f64>() / set.len() as f64
}
