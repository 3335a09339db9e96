//! The sensor hierarchy: a column owns nine boards, a board owns eight sensors.
//!
//! Changes flow downward only.  New data or a new baseline rebuilds the
//! children; a new filter is pushed onto every child.

pub mod board;
pub mod column;
pub mod sensor;
pub mod validate;

pub use board::SensorBoard;
pub use column::SensorColumn;
pub use sensor::{Baseline, Extremum, Sensor};
