use std::collections::BTreeSet;

use super::cache::CacheStore;
use super::locator::Locator;
use crate::array::column::SensorColumn;
use crate::config::Options;
use crate::error::{Result, WtdError};
use crate::experiment::{ExperimentKey, FAN_SPEEDS, GAS_NAMES, LOCATIONS, MAX_TRIAL, SENSOR_VOLTAGES};

// ---------------------------------------------------------------------------
// Selection – which experiments, as 1-based indices per dimension
// ---------------------------------------------------------------------------

/// Per-dimension selection of experiments.  Each list holds 1-based indices
/// into the matching metadata table; the default selects everything.
///
/// A dimension with an empty list selects nothing, so the whole selection is
/// empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub gases: BTreeSet<usize>,
    pub locations: BTreeSet<usize>,
    pub voltages: BTreeSet<usize>,
    pub speeds: BTreeSet<usize>,
    pub trials: BTreeSet<usize>,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            gases: (1..=GAS_NAMES.len()).collect(),
            locations: (1..=LOCATIONS.len()).collect(),
            voltages: (1..=SENSOR_VOLTAGES.len()).collect(),
            speeds: (1..=FAN_SPEEDS.len()).collect(),
            trials: (1..=MAX_TRIAL as usize).collect(),
        }
    }
}

impl Selection {
    /// Check every index against its table.
    pub fn validate(&self) -> Result<()> {
        check("gas", &self.gases, GAS_NAMES.len())?;
        check("location", &self.locations, LOCATIONS.len())?;
        check("voltage", &self.voltages, SENSOR_VOLTAGES.len())?;
        check("fan speed", &self.speeds, FAN_SPEEDS.len())?;
        check("trial", &self.trials, MAX_TRIAL as usize)
    }

    /// Number of selected experiments.
    pub fn len(&self) -> usize {
        self.gases.len() * self.locations.len() * self.voltages.len() * self.speeds.len() * self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every selected key, gas-major, trial-minor.
    pub fn keys(&self) -> Result<Vec<ExperimentKey>> {
        self.validate()?;
        let mut keys = Vec::with_capacity(self.len());
        for &g in &self.gases {
            for &l in &self.locations {
                for &v in &self.voltages {
                    for &s in &self.speeds {
                        for &t in &self.trials {
                            keys.push(ExperimentKey::from_indices(g, l, v, s, t as u32)?);
                        }
                    }
                }
            }
        }
        Ok(keys)
    }
}

fn check(what: &str, selected: &BTreeSet<usize>, size: usize) -> Result<()> {
    match selected.iter().find(|&&i| i == 0 || i > size) {
        Some(i) => Err(WtdError::Validation(format!(
            "{what} index {i} out of range, must be in [1, {size}]"
        ))),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// CacheSelector – load selected columns from one store
// ---------------------------------------------------------------------------

/// Loads the columns of a [`Selection`] out of a cache store.
#[derive(Debug, Clone)]
pub struct CacheSelector {
    store: CacheStore,
    options: Options,
    skip_missing: bool,
}

impl CacheSelector {
    /// Cached tables are already reconstructed, so no stage runs by default.
    pub fn new(store: CacheStore) -> Self {
        Self {
            store,
            options: Options::raw(),
            skip_missing: false,
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Skip keys the store does not hold instead of failing on them.
    pub fn skip_missing(mut self, skip: bool) -> Self {
        self.skip_missing = skip;
        self
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Build every selected column, in [`Selection::keys`] order.
    pub fn load(&self, selection: &Selection) -> Result<Vec<SensorColumn>> {
        let locator = Locator::CacheStore(self.store.root().to_path_buf());
        let mut columns = Vec::new();
        for key in selection.keys()? {
            if self.skip_missing && !self.store.contains(&key) {
                log::debug!("{key} not cached, skipping");
                continue;
            }
            columns.push(SensorColumn::load(&locator, key, self.options.clone())?);
        }
        log::info!(
            "loaded {} of {} selected columns from {}",
            columns.len(),
            selection.len(),
            self.store.root().display()
        );
        Ok(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one() -> Selection {
        Selection {
            gases: [2].into(),
            locations: [1, 6].into(),
            voltages: [5].into(),
            speeds: [3].into(),
            trials: [1, 20].into(),
        }
    }

    #[test]
    fn default_selects_everything() {
        let s = Selection::default();
        assert_eq!(s.len(), 11 * 6 * 5 * 3 * 20);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn keys_are_the_cartesian_product() {
        let keys = one().keys().unwrap();
        assert_eq!(keys.len(), 4);
        assert_eq!(keys[0], ExperimentKey::new(GAS_NAMES[1], "L1", "600V", "5500rpm", 1));
        assert_eq!(keys[3].location, "L6");
        assert_eq!(keys[3].trial, 20);
    }

    #[test]
    fn out_of_range_indices_are_rejected() {
        let mut s = one();
        s.trials.insert(21);
        assert!(matches!(s.validate(), Err(WtdError::Validation(_))));
        let mut s = one();
        s.locations.insert(0);
        assert!(matches!(s.keys(), Err(WtdError::Validation(_))));
    }

    #[test]
    fn empty_dimension_selects_nothing() {
        let mut s = one();
        s.speeds.clear();
        assert!(s.is_empty());
        assert!(s.keys().unwrap().is_empty());
    }

    #[test]
    fn missing_keys_fail_unless_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::create(dir.path()).unwrap();
        let selector = CacheSelector::new(store);
        assert!(selector.load(&one()).unwrap_err().is_not_found());
        assert!(selector.skip_missing(true).load(&one()).unwrap().is_empty());
    }
}
