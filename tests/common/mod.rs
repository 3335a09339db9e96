//! Synthetic raw recordings shared by the integration tests

#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use wtd_tools::data::loader::{EXCLUDED_COLUMNS, RAW_COLUMN_COUNT};
use wtd_tools::{ExperimentKey, Options};

/// Rows of the recording before the duplicate is inserted.
pub const ROWS: usize = 300;
/// Row at which mass flow controller 1 opens.
pub const RELEASE_ROW: usize = 100;
/// Row after which the time index jumps by an extra 250 ms.
pub const GAP_ROW: usize = 150;
/// Row written twice.
pub const DUPLICATE_ROW: usize = 50;

pub fn key() -> ExperimentKey {
    ExperimentKey::new("CO_1000", "L4", "500V", "3900rpm", 7)
}

/// Default reconstruction, with a horizon that fits the short recording.
pub fn options() -> Options {
    Options {
        horizon_ms: 3000.0,
        ..Options::default()
    }
}

fn time_of(row: usize) -> f64 {
    let t = row as f64 * 10.0;
    if row >= GAP_ROW {
        t + 250.0
    } else {
        t
    }
}

/// Tab-delimited raw recording: ~100 Hz with one repeated row, one 260 ms
/// gap and a gas release on MFC 1.  Sensor `BbSs` reads around `b * 100 + s`.
pub fn raw_recording() -> String {
    let mut out = String::new();
    let header: Vec<String> = (0..RAW_COLUMN_COUNT).map(|i| format!("col{i}")).collect();
    out.push_str(&header.join("\t"));
    out.push('\n');

    for row in 0..ROWS {
        let line = raw_row(row);
        out.push_str(&line);
        out.push('\n');
        if row == DUPLICATE_ROW {
            out.push_str(&line);
            out.push('\n');
        }
    }
    out
}

fn raw_row(row: usize) -> String {
    let mfc = if row >= RELEASE_ROW { 100.0 } else { 0.0 };
    let environment = [1500.0, 1498.0, mfc, 0.0, 0.0, mfc, 0.0, 0.0, 24.5, 45.0];
    let mut cells = vec![format!("{}", time_of(row))];
    cells.extend(environment.iter().map(|v| format!("{v}")));
    for pos in 11..RAW_COLUMN_COUNT {
        if EXCLUDED_COLUMNS.contains(&pos) {
            cells.push(String::new());
        } else {
            let board = (pos - 12) / 9 + 1;
            let sensor = (pos - 12) % 9 + 1;
            let level = (board * 100 + sensor) as f64;
            cells.push(format!("{}", level + (row % 5) as f64));
        }
    }
    cells.join("\t")
}

/// Write the recording into `dir` and return its path.
pub fn write_raw(dir: &Path) -> PathBuf {
    let path = dir.join("L4_trial7.txt");
    fs::write(&path, raw_recording()).unwrap();
    path
}

/// Store the recording as `entry` in a new zip archive under `dir`.
pub fn write_archive(dir: &Path, entry: &str) -> PathBuf {
    let path = dir.join("recordings.zip");
    let file = fs::File::create(&path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    zip.start_file(entry, zip::write::SimpleFileOptions::default())
        .unwrap();
    zip.write_all(raw_recording().as_bytes()).unwrap();
    zip.finish().unwrap();
    path
}
