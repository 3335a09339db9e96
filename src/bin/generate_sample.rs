use std::path::PathBuf;

use anyhow::{Context, Result};

use wtd_tools::data::loader::{EXCLUDED_COLUMNS, RAW_COLUMN_COUNT};
use wtd_tools::data::model::{channel_names, TIME};

/// Step response of a metal-oxide sensor: resistance falls towards
/// `floor` once gas arrives at `onset` (ms), with time constant `tau` (ms).
fn response(t: f64, onset: f64, r0: f64, floor: f64, tau: f64) -> f64 {
    if t < onset {
        r0
    } else {
        floor + (r0 - floor) * (-(t - onset) / tau).exp()
    }
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Timestamps at ~100 Hz with jitter, a few repeated timestamps and one
/// 400 ms acquisition gap.
fn timestamps(rng: &mut SimpleRng, duration_ms: f64) -> Vec<f64> {
    let mut time = Vec::new();
    let mut t = 0.0;
    while t < duration_ms {
        time.push((t * 10.0_f64).round() / 10.0);
        if time.len() % 5000 == 0 {
            // repeated sample, as the logger occasionally writes
            time.push(*time.last().unwrap_or(&t));
        }
        t += if time.len() == 12_000 { 400.0 } else { 10.0 + rng.gauss(0.0, 0.3) };
    }
    time
}

fn main() -> Result<()> {
    let output: PathBuf = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "sample_recording.txt".to_string())
        .into();
    let mut rng = SimpleRng::new(42);

    let duration_ms = 260_000.0;
    let release_ms = 60_000.0;
    let time = timestamps(&mut rng, duration_ms);

    // header: Time, environment, then a spacer before each board's eight sensors
    let names = channel_names();
    let mut header = Vec::with_capacity(RAW_COLUMN_COUNT);
    let mut named = names.iter();
    header.push(TIME.to_string());
    for pos in 1..RAW_COLUMN_COUNT {
        if EXCLUDED_COLUMNS.contains(&pos) {
            header.push(format!("Board{}", EXCLUDED_COLUMNS.iter().position(|&p| p == pos).unwrap_or(0) + 1));
        } else if let Some(name) = named.next() {
            header.push(name.clone());
        }
    }

    // per-sensor resting resistance and sensitivity
    let sensors: Vec<(f64, f64, f64)> = (0..72)
        .map(|i| {
            let r0 = 20_000.0 + 2_000.0 * (i % 8) as f64 + rng.gauss(0.0, 500.0);
            let floor = r0 * (0.3 + 0.4 * rng.next_f64());
            let tau = 5_000.0 + 10_000.0 * rng.next_f64();
            (r0, floor, tau)
        })
        .collect();

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(&output)
        .with_context(|| format!("creating {}", output.display()))?;
    writer.write_record(&header)?;

    for &t in &time {
        let gas_on = t >= release_ms;
        let mfc1 = if gas_on { 50.0 + rng.gauss(0.0, 0.2) } else { rng.gauss(0.0, 0.05).abs() };
        let mut row = Vec::with_capacity(RAW_COLUMN_COUNT);
        row.push(format!("{t:.1}"));
        let environment = [
            1500.0,
            1500.0 + rng.gauss(0.0, 5.0),
            if gas_on { 50.0 } else { 0.0 },
            0.0,
            0.0,
            mfc1,
            0.0,
            0.0,
            24.0 + rng.gauss(0.0, 0.05),
            45.0 + rng.gauss(0.0, 0.2),
        ];
        row.extend(environment.iter().map(|v| format!("{v:.3}")));

        let mut sensor = sensors.iter();
        for pos in 11..RAW_COLUMN_COUNT {
            if EXCLUDED_COLUMNS.contains(&pos) {
                row.push(String::new());
            } else if let Some(&(r0, floor, tau)) = sensor.next() {
                let r = response(t, release_ms, r0, floor, tau) + rng.gauss(0.0, 50.0);
                row.push(format!("{r:.1}"));
            }
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;

    println!(
        "Wrote {} samples ({} columns each) to {}",
        time.len(),
        RAW_COLUMN_COUNT,
        output.display()
    );
    Ok(())
}
