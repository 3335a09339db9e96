use crate::error::{Result, WtdError};

// ---------------------------------------------------------------------------
// LinearSpline – degree-1 interpolating spline
// ---------------------------------------------------------------------------

/// Piecewise-linear interpolant through every knot, extended linearly past
/// both ends with the slope of the outermost segment.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSpline {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl LinearSpline {
    /// Fit through `(x, y)`.  NaN samples are skipped; at least two finite
    /// samples with strictly increasing `x` are required.
    pub fn fit(x: &[f64], y: &[f64]) -> Result<Self> {
        if x.len() != y.len() {
            return Err(WtdError::Reconstruction(format!(
                "cannot fit {} timestamps to {} values",
                x.len(),
                y.len()
            )));
        }
        let (x, y): (Vec<f64>, Vec<f64>) = x
            .iter()
            .zip(y)
            .filter(|(a, b)| a.is_finite() && b.is_finite())
            .map(|(a, b)| (*a, *b))
            .unzip();
        if x.len() < 2 {
            return Err(WtdError::Reconstruction(format!(
                "need at least 2 samples to interpolate, got {}",
                x.len()
            )));
        }
        if let Some(w) = x.windows(2).position(|w| w[1] <= w[0]) {
            return Err(WtdError::Reconstruction(format!(
                "timestamps not strictly increasing at {} -> {}",
                x[w],
                x[w + 1]
            )));
        }
        Ok(Self { x, y })
    }

    /// Value at `t`.
    pub fn eval(&self, t: f64) -> f64 {
        let n = self.x.len();
        let i = self.x.partition_point(|&k| k <= t).clamp(1, n - 1) - 1;
        let (x0, x1) = (self.x[i], self.x[i + 1]);
        let (y0, y1) = (self.y[i], self.y[i + 1]);
        y0 + (t - x0) * (y1 - y0) / (x1 - x0)
    }

    /// Values at every point of `ts`.
    pub fn eval_many(&self, ts: &[f64]) -> Vec<f64> {
        ts.iter().map(|&t| self.eval(t)).collect()
    }

    pub fn knots(&self) -> &[f64] {
        &self.x
    }
}
