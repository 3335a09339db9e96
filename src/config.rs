use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WtdError};

// ---------------------------------------------------------------------------
// Options – everything a column load can be told
// ---------------------------------------------------------------------------

/// Ingestion and reconstruction options shared by every column in a batch.
///
/// Missing keys in a JSON options file fall back to [`Options::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Promote per-stage progress messages from `debug` to `info`.
    pub verbose: bool,
    pub drop_duplicates: bool,
    pub fill_gaps: bool,
    pub resample: bool,
    /// Try the cache store before parsing, and persist after parsing.
    pub use_cache: bool,
    /// Cache store root. Required iff `use_cache` is set.
    pub cache_location: Option<PathBuf>,

    /// Timestamp delta (ms) above which a gap is filled.
    pub gap_threshold_ms: f64,
    /// Sample rate (Hz) of the timestamps inserted into a gap.
    pub fill_rate_hz: f64,
    /// Samples fitted on each side of a gap; `None` uses the gap's own sample count.
    pub fill_window: Option<usize>,
    /// Target rate (Hz) of the uniform grid.
    pub resample_rate_hz: f64,
    /// Last timestamp (ms) of the uniform grid.
    pub horizon_ms: f64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            verbose: false,
            drop_duplicates: true,
            fill_gaps: true,
            resample: true,
            use_cache: false,
            cache_location: None,
            gap_threshold_ms: 100.0,
            fill_rate_hz: 100.0,
            fill_window: None,
            resample_rate_hz: 100.0,
            horizon_ms: 260_000.0,
        }
    }
}

impl Options {
    /// Options with every reconstruction stage switched off.
    pub fn raw() -> Self {
        Self {
            drop_duplicates: false,
            fill_gaps: false,
            resample: false,
            ..Self::default()
        }
    }

    /// Enable the cache store at `location`.
    pub fn with_cache(mut self, location: impl Into<PathBuf>) -> Self {
        self.use_cache = true;
        self.cache_location = Some(location.into());
        self
    }

    /// Load options from a JSON file and validate them.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            WtdError::Configuration(format!("reading options file {}: {e}", path.display()))
        })?;
        let options: Options = serde_json::from_str(&text).map_err(|e| {
            WtdError::Configuration(format!("parsing options file {}: {e}", path.display()))
        })?;
        options.validate()?;
        Ok(options)
    }

    /// Check option consistency.
    pub fn validate(&self) -> Result<()> {
        if self.use_cache && self.cache_location.is_none() {
            return Err(WtdError::Configuration(
                "use_cache is set but no cache_location was given".into(),
            ));
        }
        let positive = [
            ("gap_threshold_ms", self.gap_threshold_ms),
            ("fill_rate_hz", self.fill_rate_hz),
            ("resample_rate_hz", self.resample_rate_hz),
            ("horizon_ms", self.horizon_ms),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(WtdError::Configuration(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        if self.fill_window == Some(0) {
            return Err(WtdError::Configuration("fill_window must be at least 1".into()));
        }
        Ok(())
    }

    /// The cache store location, if caching is enabled.
    pub fn cache_store(&self) -> Option<&Path> {
        if self.use_cache {
            self.cache_location.as_deref()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_every_stage() {
        let o = Options::default();
        assert!(o.drop_duplicates && o.fill_gaps && o.resample);
        assert!(!o.use_cache);
        assert!(o.validate().is_ok());
    }

    #[test]
    fn cache_without_location_is_rejected() {
        let o = Options {
            use_cache: true,
            ..Options::default()
        };
        assert!(matches!(o.validate(), Err(WtdError::Configuration(_))));
        assert!(Options::default().with_cache("/tmp/store").validate().is_ok());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let o: Options = serde_json::from_str(r#"{ "resample": false, "verbose": true }"#).unwrap();
        assert!(!o.resample);
        assert!(o.verbose);
        assert!(o.drop_duplicates);
        assert_eq!(o.horizon_ms, 260_000.0);
    }

    #[test]
    fn non_positive_rate_is_rejected() {
        let o = Options {
            resample_rate_hz: 0.0,
            ..Options::default()
        };
        assert!(matches!(o.validate(), Err(WtdError::Configuration(_))));
    }

    #[test]
    fn cache_store_only_when_enabled() {
        let mut o = Options::default().with_cache("/tmp/store");
        assert!(o.cache_store().is_some());
        o.use_cache = false;
        assert!(o.cache_store().is_none());
    }
}
