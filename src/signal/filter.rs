use std::f64::consts::PI;

use num_complex::Complex64;

use crate::error::{Result, WtdError};

// ---------------------------------------------------------------------------
// FilterParams – transfer function coefficients
// ---------------------------------------------------------------------------

/// Numerator / denominator coefficients of an IIR filter, `a[0] == 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterParams {
    pub numerator: Vec<f64>,
    pub denominator: Vec<f64>,
}

impl FilterParams {
    pub fn new(numerator: Vec<f64>, denominator: Vec<f64>) -> Result<Self> {
        match denominator.first() {
            Some(&a0) if a0 != 0.0 && !numerator.is_empty() => {
                let numerator = numerator.iter().map(|b| b / a0).collect();
                let denominator = denominator.iter().map(|a| a / a0).collect();
                Ok(Self {
                    numerator,
                    denominator,
                })
            }
            _ => Err(WtdError::Configuration(
                "filter needs a numerator and a denominator with a[0] != 0".into(),
            )),
        }
    }

    /// Number of taps after zero-padding the shorter polynomial.
    fn taps(&self) -> usize {
        self.numerator.len().max(self.denominator.len())
    }

    fn padded(&self) -> (Vec<f64>, Vec<f64>) {
        let n = self.taps();
        let mut b = self.numerator.clone();
        let mut a = self.denominator.clone();
        b.resize(n, 0.0);
        a.resize(n, 0.0);
        (b, a)
    }

    /// Single forward pass (direct form II transposed) from initial state `zi`.
    pub fn lfilter(&self, x: &[f64], zi: Option<&[f64]>) -> Vec<f64> {
        let (b, a) = self.padded();
        let n = b.len();
        let mut z = match zi {
            Some(zi) => zi.to_vec(),
            None => vec![0.0; n - 1],
        };
        let mut y = Vec::with_capacity(x.len());
        for &xi in x {
            let yi = b[0] * xi + z.first().copied().unwrap_or(0.0);
            for i in 0..n.saturating_sub(2) {
                z[i] = b[i + 1] * xi + z[i + 1] - a[i + 1] * yi;
            }
            if n > 1 {
                z[n - 2] = b[n - 1] * xi - a[n - 1] * yi;
            }
            y.push(yi);
        }
        y
    }

    /// Steady-state initial conditions for a unit step input.
    pub fn lfilter_zi(&self) -> Vec<f64> {
        let (b, a) = self.padded();
        let m = b.len() - 1;
        if m == 0 {
            return Vec::new();
        }
        // (I - companion(a)^T) zi = b[1..] - a[1..] * b[0]
        let mut lhs = vec![vec![0.0; m]; m];
        for (i, row) in lhs.iter_mut().enumerate() {
            row[i] = 1.0;
            row[0] += a[i + 1];
            if i + 1 < m {
                row[i + 1] -= 1.0;
            }
        }
        let rhs: Vec<f64> = (0..m).map(|i| b[i + 1] - a[i + 1] * b[0]).collect();
        solve(lhs, rhs)
    }

    /// Zero-phase filtering: forward, then backward, with odd-extension
    /// padding of `3 * taps` samples (shortened for short inputs).
    pub fn filtfilt(&self, x: &[f64]) -> Vec<f64> {
        if x.len() < 2 {
            return x.to_vec();
        }
        let pad = (3 * self.taps()).min(x.len() - 1);
        let n = x.len();
        let (first, last) = (x[0], x[n - 1]);

        let mut ext = Vec::with_capacity(n + 2 * pad);
        ext.extend((1..=pad).rev().map(|i| 2.0 * first - x[i]));
        ext.extend_from_slice(x);
        ext.extend((1..=pad).map(|i| 2.0 * last - x[n - 1 - i]));

        let zi = self.lfilter_zi();
        let scaled = |v: f64| zi.iter().map(|z| z * v).collect::<Vec<f64>>();

        let forward = self.lfilter(&ext, Some(&scaled(ext[0])));
        let reversed: Vec<f64> = forward.into_iter().rev().collect();
        let backward = self.lfilter(&reversed, Some(&scaled(reversed[0])));

        backward.into_iter().rev().skip(pad).take(n).collect()
    }
}

/// Gaussian elimination with partial pivoting; singular systems yield zeros.
fn solve(mut m: Vec<Vec<f64>>, mut v: Vec<f64>) -> Vec<f64> {
    let n = v.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| m[i][col].abs().total_cmp(&m[j][col].abs()))
            .unwrap_or(col);
        if m[pivot][col] == 0.0 {
            return vec![0.0; n];
        }
        m.swap(col, pivot);
        v.swap(col, pivot);
        for row in col + 1..n {
            let f = m[row][col] / m[col][col];
            for k in col..n {
                m[row][k] -= f * m[col][k];
            }
            v[row] -= f * v[col];
        }
    }
    let mut out = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| m[row][k] * out[k]).sum();
        out[row] = (v[row] - tail) / m[row][row];
    }
    out
}

// ---------------------------------------------------------------------------
// FilterDesign – Butterworth parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Lowpass,
    Highpass,
}

/// Digital Butterworth design.  `cutoff` is normalised to the Nyquist
/// frequency; `None` means `1 / (sample_rate / 2)`, i.e. 1 Hz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterDesign {
    pub order: usize,
    pub cutoff: Option<f64>,
    pub kind: FilterKind,
}

impl Default for FilterDesign {
    fn default() -> Self {
        Self {
            order: 2,
            cutoff: None,
            kind: FilterKind::Lowpass,
        }
    }
}

impl FilterDesign {
    /// Coefficients for a series sampled at `sample_rate` Hz.
    pub fn coefficients(&self, sample_rate: Option<f64>) -> Result<FilterParams> {
        let cutoff = match (self.cutoff, sample_rate) {
            (Some(c), _) => c,
            (None, Some(sr)) if sr > 0.0 => 1.0 / (sr / 2.0),
            (None, _) => {
                return Err(WtdError::Configuration(
                    "no cutoff given and no sample rate to derive one from".into(),
                ))
            }
        };
        butter(self.order, cutoff, self.kind)
    }
}

/// Butterworth filter of `order` with normalised cutoff `wn` in (0, 1).
pub fn butter(order: usize, wn: f64, kind: FilterKind) -> Result<FilterParams> {
    if order == 0 {
        return Err(WtdError::Configuration("filter order must be at least 1".into()));
    }
    if !(wn > 0.0 && wn < 1.0) {
        return Err(WtdError::Configuration(format!(
            "normalised cutoff must be in (0, 1), got {wn}"
        )));
    }
    let n = order as i32;
    // analog prototype, unit cutoff
    let proto: Vec<Complex64> = (0..n)
        .map(|k| {
            let m = (-n + 1 + 2 * k) as f64;
            -Complex64::from_polar(1.0, PI * m / (2.0 * n as f64))
        })
        .collect();

    // pre-warp for the bilinear transform at fs = 2
    let fs2 = 4.0;
    let warped = fs2 * (PI * wn / 2.0).tan();

    let (zeros, poles, gain) = match kind {
        FilterKind::Lowpass => {
            let poles: Vec<Complex64> = proto.iter().map(|&p| p * warped).collect();
            (Vec::new(), poles, warped.powi(n))
        }
        FilterKind::Highpass => {
            let poles: Vec<Complex64> = proto.iter().map(|&p| warped / p).collect();
            let gain = proto.iter().map(|&p| -p).product::<Complex64>().inv().re;
            (vec![Complex64::new(0.0, 0.0); order], poles, gain)
        }
    };

    // bilinear transform
    let fs2c = Complex64::new(fs2, 0.0);
    let mut dz: Vec<Complex64> = zeros.iter().map(|&z| (fs2c + z) / (fs2c - z)).collect();
    let dp: Vec<Complex64> = poles.iter().map(|&p| (fs2c + p) / (fs2c - p)).collect();
    dz.resize(dp.len(), Complex64::new(-1.0, 0.0));
    let dk = gain
        * (zeros.iter().map(|&z| fs2c - z).product::<Complex64>()
            / poles.iter().map(|&p| fs2c - p).product::<Complex64>())
        .re;

    let b = poly(&dz).into_iter().map(|c| c.re * dk).collect();
    let a = poly(&dp).into_iter().map(|c| c.re).collect();
    FilterParams::new(b, a)
}

/// Monic polynomial coefficients (highest power first) from its roots.
fn poly(roots: &[Complex64]) -> Vec<Complex64> {
    let mut coeffs = vec![Complex64::new(1.0, 0.0)];
    for &r in roots {
        let mut next = coeffs.clone();
        next.push(Complex64::new(0.0, 0.0));
        for i in 1..next.len() {
            next[i] = next[i] - r * coeffs[i - 1];
        }
        coeffs = next;
    }
    coeffs
}
