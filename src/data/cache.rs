use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use super::model::{Channel, SensorFrame, TIME};
use crate::error::{Result, WtdError};
use crate::experiment::ExperimentKey;

/// File extension of a stored table.
pub const TABLE_EXTENSION: &str = "parquet";
const PARTIAL_SUFFIX: &str = "partial";

// ---------------------------------------------------------------------------
// CacheStore – key-addressed parquet tables under one directory
// ---------------------------------------------------------------------------

/// Persisted table store.  Every [`ExperimentKey`] maps to one parquet file
/// at `<root>/<gas>/<location>/Fan<speed>_<voltage>_trial<trial>.parquet`, so
/// the hierarchical cache key doubles as the on-disk namespace.
///
/// Writes go to a `.partial` sibling and are renamed into place only once the
/// parquet footer has been flushed; a failed write never leaves a readable
/// half-table behind.  Concurrent writers to one key are not coordinated.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    /// Open an existing store.  A missing store is a not-found error.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(WtdError::NotFound(format!(
                "no cache store at {}",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    /// Create an empty store (no-op for the directory if it already exists).
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn table_path(&self, key: &ExperimentKey) -> PathBuf {
        self.root
            .join(format!("{}.{TABLE_EXTENSION}", key.cache_key()))
    }

    pub fn contains(&self, key: &ExperimentKey) -> bool {
        self.table_path(key).is_file()
    }

    /// Read the table stored under `key`.
    pub fn get(&self, key: &ExperimentKey) -> Result<SensorFrame> {
        let path = self.table_path(key);
        let file = File::open(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => WtdError::NotFound(format!(
                "key {key} not found in cache store {}",
                self.root.display()
            )),
            _ => WtdError::Io(e),
        })?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut names: Vec<String> = Vec::new();
        let mut columns: Vec<Vec<f64>> = Vec::new();

        for batch in reader {
            let batch = batch?;
            let schema = batch.schema();
            if names.is_empty() {
                names = schema.fields().iter().map(|f| f.name().clone()).collect();
                columns = vec![Vec::new(); names.len()];
            }
            for (i, name) in names.iter().enumerate() {
                let idx = schema.index_of(name).map_err(|_| {
                    WtdError::Format(format!("cached table {key} lost column '{name}'"))
                })?;
                let arr = batch
                    .column(idx)
                    .as_any()
                    .downcast_ref::<Float64Array>()
                    .ok_or_else(|| {
                        WtdError::Format(format!(
                            "cached column '{name}' is {:?}, expected Float64",
                            batch.column(idx).data_type()
                        ))
                    })?;
                columns[i].extend(arr.iter().map(|v| v.unwrap_or(f64::NAN)));
            }
        }

        let time_idx = names
            .iter()
            .position(|n| n == TIME)
            .ok_or_else(|| WtdError::Format(format!("cached table {key} has no '{TIME}' column")))?;
        let time = columns.remove(time_idx);
        names.remove(time_idx);

        let channels = names
            .into_iter()
            .zip(columns)
            .map(|(name, values)| Channel::new(name, values))
            .collect();
        let frame = SensorFrame::new(time, channels)?;
        frame.check_layout()?;
        log::debug!("read {key} ({} rows) from {}", frame.len(), self.root.display());
        Ok(frame)
    }

    /// Store `frame` under `key`.  Returns `false` (and writes nothing) when the
    /// key already exists and `overwrite` is not set.
    pub fn put(&self, key: &ExperimentKey, frame: &SensorFrame, overwrite: bool) -> Result<bool> {
        let path = self.table_path(key);
        if !overwrite && path.is_file() {
            log::debug!("{key} already cached, not overwriting");
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let batch = to_record_batch(frame)?;
        let partial = PartialFile::new(path.with_extension(format!("{TABLE_EXTENSION}.{PARTIAL_SUFFIX}")));
        let file = File::create(partial.path())?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        writer.write(&batch)?;
        writer.close()?;
        partial.commit(&path)?;

        log::debug!("cached {key} ({} rows) in {}", frame.len(), self.root.display());
        Ok(true)
    }

    /// Delete the table under `key`.  Returns whether anything was removed.
    pub fn remove(&self, key: &ExperimentKey) -> Result<bool> {
        match fs::remove_file(self.table_path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Every key currently stored, sorted.
    pub fn keys(&self) -> Result<Vec<ExperimentKey>> {
        let mut keys = Vec::new();
        for gas in subdirs(&self.root)? {
            for location in subdirs(&gas)? {
                for entry in fs::read_dir(&location)? {
                    let path = entry?.path();
                    if path.extension().and_then(|e| e.to_str()) != Some(TABLE_EXTENSION) {
                        continue;
                    }
                    let Ok(rel) = path.with_extension("").strip_prefix(&self.root).map(Path::to_path_buf) else {
                        continue;
                    };
                    let rel = rel
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect::<Vec<_>>()
                        .join("/");
                    match ExperimentKey::parse_cache_key(&rel) {
                        Ok(key) => keys.push(key),
                        Err(_) => log::warn!("ignoring foreign table {}", path.display()),
                    }
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Copy every table into `target`, overwriting what is there.  Returns the
    /// number of tables copied.
    pub fn copy_into(&self, target: &CacheStore) -> Result<usize> {
        let keys = self.keys()?;
        for key in &keys {
            let frame = self.get(key)?;
            target.put(key, &frame, true)?;
            log::info!("copied {key}");
        }
        Ok(keys.len())
    }
}

fn subdirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            out.push(path);
        }
    }
    Ok(out)
}

fn to_record_batch(frame: &SensorFrame) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(frame.channels().len() + 1);
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(frame.channels().len() + 1);

    fields.push(Field::new(TIME, DataType::Float64, false));
    arrays.push(Arc::new(Float64Array::from(frame.time().to_vec())));
    for ch in frame.channels() {
        fields.push(Field::new(ch.name.as_str(), DataType::Float64, false));
        arrays.push(Arc::new(Float64Array::from(ch.values.clone())));
    }
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

// ---------------------------------------------------------------------------
// PartialFile – removes an uncommitted write on every exit path
// ---------------------------------------------------------------------------

struct PartialFile {
    path: PathBuf,
    committed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn commit(mut self, dest: &Path) -> Result<()> {
        fs::rename(&self.path, dest)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.path);
        }
    }
}
