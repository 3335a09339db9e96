use std::fs::File;
use std::io::Read;
use std::path::Path;

use zip::result::ZipError;
use zip::ZipArchive;

use super::locator::Locator;
use super::model::{channel_names, Channel, SensorFrame, TIME};
use crate::error::{Result, WtdError};

/// Raw recordings carry at least this many tab-separated columns.
pub const RAW_COLUMN_COUNT: usize = 92;

/// Positions of the per-board spacer columns that are never parsed.
pub const EXCLUDED_COLUMNS: [usize; 9] = [11, 20, 29, 38, 47, 56, 65, 74, 83];

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Parse a raw recording from a raw locator.  Dispatch by backend.
///
/// Supported backends:
/// * `direct-file://`   – tab-delimited file on disk
/// * `archive-entry://` – the same, stored in a zip archive
///
/// A `cache-store://` locator has no raw form and is rejected.
pub fn load_raw(locator: &Locator) -> Result<SensorFrame> {
    match locator {
        Locator::DirectFile(path) => load_file(path),
        Locator::ArchiveEntry { archive, entry } => load_archive_entry(archive, entry),
        Locator::CacheStore(path) => Err(WtdError::Configuration(format!(
            "{} is a cache store, not a raw recording",
            path.display()
        ))),
    }
}

/// Parse a raw recording file.
pub fn load_file(path: &Path) -> Result<SensorFrame> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            WtdError::NotFound(format!("file {} not found", path.display()))
        }
        _ => WtdError::Io(e),
    })?;
    log::debug!("parsing raw recording {}", path.display());
    parse_table(file)
}

/// Parse a raw recording stored as `entry` inside the zip `archive`.
pub fn load_archive_entry(archive: &Path, entry: &str) -> Result<SensorFrame> {
    let file = File::open(archive).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            WtdError::NotFound(format!("archive {} not found", archive.display()))
        }
        _ => WtdError::Io(e),
    })?;
    let mut zip = ZipArchive::new(file)?;
    let mut entry_reader = match zip.by_name(entry) {
        Ok(f) => f,
        Err(ZipError::FileNotFound) => {
            return Err(WtdError::NotFound(format!(
                "entry {entry} not found in archive {}",
                archive.display()
            )))
        }
        Err(e) => return Err(e.into()),
    };
    log::debug!("parsing raw recording {entry} from {}", archive.display());
    parse_table(&mut entry_reader)
}

// ---------------------------------------------------------------------------
// Table parser
// ---------------------------------------------------------------------------

/// Tab-delimited layout: one header row (names are ignored, columns are
/// positional), then one row per sample.  Column 0 is `Time`, columns 1..=10
/// are the environmental channels, then nine blocks of eight sensor channels,
/// each preceded by a spacer column listed in [`EXCLUDED_COLUMNS`].
///
/// Empty cells become NaN; any other unparseable cell is a format error.
pub fn parse_table<R: Read>(reader: R) -> Result<SensorFrame> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let header_len = rdr.headers()?.len();
    if header_len < RAW_COLUMN_COUNT {
        return Err(WtdError::Format(format!(
            "raw table has {header_len} columns, expected at least {RAW_COLUMN_COUNT}"
        )));
    }

    let used: Vec<usize> = (0..RAW_COLUMN_COUNT)
        .filter(|i| !EXCLUDED_COLUMNS.contains(i))
        .collect();
    let names = channel_names();
    debug_assert_eq!(used.len(), names.len() + 1);

    let mut time = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];

    for (row_no, result) in rdr.records().enumerate() {
        let record = result?;
        if record.len() < RAW_COLUMN_COUNT {
            return Err(WtdError::Format(format!(
                "row {row_no} has {} columns, expected at least {RAW_COLUMN_COUNT}",
                record.len()
            )));
        }
        let t = parse_cell(&record[used[0]], row_no, TIME)?;
        if t.is_nan() {
            return Err(WtdError::Format(format!("row {row_no}: empty '{TIME}' cell")));
        }
        time.push(t);
        for (col, &pos) in used[1..].iter().enumerate() {
            columns[col].push(parse_cell(&record[pos], row_no, &names[col])?);
        }
    }

    let channels = names
        .into_iter()
        .zip(columns)
        .map(|(name, values)| Channel::new(name, values))
        .collect();
    SensorFrame::new(time, channels)
}

fn parse_cell(s: &str, row: usize, col: &str) -> Result<f64> {
    let tok = s.trim();
    if tok.is_empty() {
        return Ok(f64::NAN);
    }
    tok.parse::<f64>().map_err(|_| {
        WtdError::Format(format!("row {row}, column {col}: '{tok}' is not a number"))
    })
}
