//! Tools for the wind-tunnel gas-sensor dataset: ingest a column recording
//! (raw file, zip entry or cache store), reconstruct a clean time index, and
//! expose it as a column of nine boards of eight sensors.

pub mod array;
pub mod config;
pub mod data;
pub mod error;
pub mod experiment;
pub mod signal;

pub use array::{Baseline, Sensor, SensorBoard, SensorColumn};
pub use config::Options;
pub use data::cache::CacheStore;
pub use data::ingest::{DataSource, Ingestor};
pub use data::locator::Locator;
pub use data::model::SensorFrame;
pub use data::select::{CacheSelector, Selection};
pub use error::{Result, WtdError};
pub use experiment::ExperimentKey;
pub use signal::filter::{FilterDesign, FilterKind, FilterParams};
pub use signal::reconstruct::{ReconstructReport, Reconstructor};
