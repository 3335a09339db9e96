use std::fmt;

use super::cache::CacheStore;
use super::loader;
use super::locator::Locator;
use super::model::SensorFrame;
use crate::config::Options;
use crate::error::{Result, WtdError};
use crate::experiment::ExperimentKey;

/// Where an ingested table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// Parsed from a raw recording (direct file or archive entry).
    Raw,
    /// Read from a cache store.
    Cache,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Raw => write!(f, "raw recording"),
            DataSource::Cache => write!(f, "cache store"),
        }
    }
}

// ---------------------------------------------------------------------------
// Ingestor – cache-aside loading of one column's table
// ---------------------------------------------------------------------------

/// Holds the table of one experiment while it is being ingested.
///
/// An ingestor is filled exactly once; reading into an ingestor that already
/// holds data is a state error, as is saving one that holds none.
#[derive(Debug)]
pub struct Ingestor {
    key: ExperimentKey,
    options: Options,
    frame: Option<SensorFrame>,
    source: Option<DataSource>,
}

impl Ingestor {
    pub fn new(key: ExperimentKey, options: Options) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            key,
            options,
            frame: None,
            source: None,
        })
    }

    pub fn key(&self) -> &ExperimentKey {
        &self.key
    }

    pub fn frame(&self) -> Option<&SensorFrame> {
        self.frame.as_ref()
    }

    pub fn source(&self) -> Option<DataSource> {
        self.source
    }

    /// Fetch the table for this experiment from `locator`.
    ///
    /// * `cache-store://` reads the key from that store; nothing else is tried.
    /// * Raw locators try the configured cache store first.  A missing store is
    ///   created empty, a missing key is logged, and both fall through to the
    ///   raw parser.  A raw parse failure is fatal.
    pub fn load(&mut self, locator: &Locator) -> Result<DataSource> {
        self.ensure_empty()?;

        if let Locator::CacheStore(path) = locator {
            let frame = CacheStore::open(path)?.get(&self.key)?;
            return Ok(self.fill(frame, DataSource::Cache));
        }

        if let Some(location) = self.options.cache_store() {
            match CacheStore::open(location) {
                Ok(store) => match store.get(&self.key) {
                    Ok(frame) => return Ok(self.fill(frame, DataSource::Cache)),
                    Err(e) if e.is_not_found() => {
                        log::info!("{} not in cache store, parsing {locator}", self.key);
                    }
                    Err(e) => return Err(e),
                },
                Err(e) if e.is_not_found() => {
                    log::warn!(
                        "no cache store at {}, creating one; parsing {locator}",
                        location.display()
                    );
                    CacheStore::create(location)?;
                }
                Err(e) => return Err(e),
            }
        }

        let frame = loader::load_raw(locator)?;
        frame.check_layout()?;
        Ok(self.fill(frame, DataSource::Raw))
    }

    /// Read this experiment straight from `store`.
    pub fn load_from_store(&mut self, store: &CacheStore) -> Result<()> {
        self.ensure_empty()?;
        let frame = store.get(&self.key)?;
        self.fill(frame, DataSource::Cache);
        Ok(())
    }

    /// Persist the held table under this experiment's key.
    pub fn save(&self, store: &CacheStore, overwrite: bool) -> Result<bool> {
        let frame = self.frame.as_ref().ok_or_else(|| {
            WtdError::State(format!("no data to save for {}, load it first", self.key))
        })?;
        save_frame(store, &self.key, frame, overwrite)
    }

    /// Hand the table over, e.g. to signal reconstruction.
    pub fn into_frame(self) -> Result<(SensorFrame, DataSource)> {
        match (self.frame, self.source) {
            (Some(frame), Some(source)) => Ok((frame, source)),
            _ => Err(WtdError::State(format!("{} holds no data", self.key))),
        }
    }

    fn ensure_empty(&self) -> Result<()> {
        if self.frame.is_some() {
            return Err(WtdError::State(format!(
                "{} already holds data, refusing to overwrite it",
                self.key
            )));
        }
        Ok(())
    }

    fn fill(&mut self, frame: SensorFrame, source: DataSource) -> DataSource {
        log::debug!("{}: {} rows from {source}", self.key, frame.len());
        self.frame = Some(frame);
        self.source = Some(source);
        source
    }
}

/// Persist a table, refusing empty ones.
pub fn save_frame(
    store: &CacheStore,
    key: &ExperimentKey,
    frame: &SensorFrame,
    overwrite: bool,
) -> Result<bool> {
    if frame.is_empty() {
        return Err(WtdError::State(format!("no data to save for {key}")));
    }
    store.put(key, frame, overwrite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{channel_names, Channel};

    fn key() -> ExperimentKey {
        ExperimentKey::new("CO_1000", "L1", "400V", "1500rpm", 2)
    }

    fn frame() -> SensorFrame {
        let channels = channel_names()
            .into_iter()
            .map(|n| Channel::new(n, vec![1.0, 2.0]))
            .collect();
        SensorFrame::new(vec![0.0, 10.0], channels).unwrap()
    }

    #[test]
    fn cache_locator_without_key_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        CacheStore::create(dir.path()).unwrap();
        let mut ing = Ingestor::new(key(), Options::raw()).unwrap();
        let loc = Locator::CacheStore(dir.path().to_path_buf());
        assert!(matches!(ing.load(&loc), Err(WtdError::NotFound(_))));
    }

    #[test]
    fn second_load_is_a_state_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::create(dir.path()).unwrap();
        store.put(&key(), &frame(), false).unwrap();

        let mut ing = Ingestor::new(key(), Options::raw()).unwrap();
        let loc = Locator::CacheStore(dir.path().to_path_buf());
        assert_eq!(ing.load(&loc).unwrap(), DataSource::Cache);
        assert!(matches!(ing.load(&loc), Err(WtdError::State(_))));
        assert!(matches!(ing.load_from_store(&store), Err(WtdError::State(_))));
    }

    #[test]
    fn saving_without_data_is_a_state_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::create(dir.path()).unwrap();
        let ing = Ingestor::new(key(), Options::raw()).unwrap();
        assert!(matches!(ing.save(&store, false), Err(WtdError::State(_))));
        assert!(matches!(
            save_frame(&store, &key(), &SensorFrame::default(), false),
            Err(WtdError::State(_))
        ));
    }

    #[test]
    fn missing_raw_file_is_fatal_even_with_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache");
        let mut ing = Ingestor::new(key(), Options::raw().with_cache(&cache)).unwrap();
        let loc = Locator::DirectFile(dir.path().join("missing.txt"));
        assert!(matches!(ing.load(&loc), Err(WtdError::NotFound(_))));
        // the store was still created on the way through
        assert!(cache.is_dir());
    }

    #[test]
    fn invalid_options_are_rejected_up_front() {
        let options = Options {
            use_cache: true,
            ..Options::raw()
        };
        assert!(matches!(
            Ingestor::new(key(), options),
            Err(WtdError::Configuration(_))
        ));
    }
}
