use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WtdError};

// ---------------------------------------------------------------------------
// Experiment metadata tables (1-based, as used in selections)
// ---------------------------------------------------------------------------

/// Gas name and concentration (ppm).
pub const GAS_NAMES: [&str; 11] = [
    "Acetaldehyde_500",
    "Acetone_2500",
    "Ammonia_10000",
    "Benzene_200",
    "Butanol_100",
    "CO_1000",
    "CO_4000",
    "Ethylene_500",
    "Methane_1000",
    "Methanol_200",
    "Toluene_200",
];

/// Sensor array column positions, closest to the gas source first
/// (0.25 m, 0.50 m, 0.98 m, 1.18 m, 1.40 m, 1.45 m).
pub const LOCATIONS: [&str; 6] = ["L1", "L2", "L3", "L4", "L5", "L6"];

/// Sensor heater voltages (4.0 V .. 6.0 V).
pub const SENSOR_VOLTAGES: [&str; 5] = ["400V", "450V", "500V", "550V", "600V"];

/// Exhaust fan speeds.
pub const FAN_SPEEDS: [&str; 3] = ["1500rpm", "3900rpm", "5500rpm"];

/// Repetitions per experiment configuration.
pub const MAX_TRIAL: u32 = 20;

/// Look up a 1-based index in one of the metadata tables.
pub fn lookup(table: &'static [&'static str], what: &str, index: usize) -> Result<&'static str> {
    if index == 0 || index > table.len() {
        return Err(WtdError::Validation(format!(
            "{what} index {index} out of range, must be in [1, {}]",
            table.len()
        )));
    }
    Ok(table[index - 1])
}

// ---------------------------------------------------------------------------
// ExperimentKey – identifies one column recording
// ---------------------------------------------------------------------------

/// Composite identity of one sensor-column trial, also its cache address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExperimentKey {
    pub gas: String,
    pub location: String,
    pub voltage: String,
    pub fan_speed: String,
    pub trial: u32,
}

impl ExperimentKey {
    pub fn new(
        gas: impl Into<String>,
        location: impl Into<String>,
        voltage: impl Into<String>,
        fan_speed: impl Into<String>,
        trial: u32,
    ) -> Self {
        Self {
            gas: gas.into(),
            location: location.into(),
            voltage: voltage.into(),
            fan_speed: fan_speed.into(),
            trial,
        }
    }

    /// Build a key from 1-based metadata table indices.
    pub fn from_indices(gas: usize, location: usize, voltage: usize, speed: usize, trial: u32) -> Result<Self> {
        if trial == 0 || trial > MAX_TRIAL {
            return Err(WtdError::Validation(format!(
                "trial {trial} out of range, must be in [1, {MAX_TRIAL}]"
            )));
        }
        Ok(Self::new(
            lookup(&GAS_NAMES, "gas", gas)?,
            lookup(&LOCATIONS, "location", location)?,
            lookup(&SENSOR_VOLTAGES, "voltage", voltage)?,
            lookup(&FAN_SPEEDS, "fan speed", speed)?,
            trial,
        ))
    }

    /// Hierarchical cache key: `<gas>/<location>/Fan<speed>_<voltage>_trial<trial>`.
    pub fn cache_key(&self) -> String {
        format!(
            "{}/{}/Fan{}_{}_trial{}",
            self.gas, self.location, self.fan_speed, self.voltage, self.trial
        )
    }

    /// Inverse of [`ExperimentKey::cache_key`].
    pub fn parse_cache_key(key: &str) -> Result<Self> {
        let malformed = || WtdError::Format(format!("malformed cache key '{key}'"));
        let mut parts = key.trim_matches('/').splitn(3, '/');
        let gas = parts.next().filter(|s| !s.is_empty()).ok_or_else(malformed)?;
        let location = parts.next().filter(|s| !s.is_empty()).ok_or_else(malformed)?;
        let leaf = parts.next().ok_or_else(malformed)?;

        let leaf = leaf.strip_prefix("Fan").ok_or_else(malformed)?;
        let (speed, rest) = leaf.split_once('_').ok_or_else(malformed)?;
        let (voltage, trial) = rest.split_once("_trial").ok_or_else(malformed)?;
        let trial: u32 = trial.parse().map_err(|_| malformed())?;
        Ok(Self::new(gas, location, voltage, speed, trial))
    }
}

impl fmt::Display for ExperimentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cache_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_layout() {
        let key = ExperimentKey::new("CO_1000", "L2", "500V", "1500rpm", 3);
        assert_eq!(key.cache_key(), "CO_1000/L2/Fan1500rpm_500V_trial3");
    }

    #[test]
    fn cache_key_parses_back() {
        let key = ExperimentKey::new("Methane_1000", "L6", "600V", "5500rpm", 20);
        assert_eq!(ExperimentKey::parse_cache_key(&key.cache_key()).unwrap(), key);
        assert!(ExperimentKey::parse_cache_key("CO_1000/L2").is_err());
        assert!(ExperimentKey::parse_cache_key("CO_1000/L2/Fan1500rpm_500V_trialx").is_err());
    }

    #[test]
    fn from_indices_uses_tables() {
        let key = ExperimentKey::from_indices(6, 2, 3, 1, 1).unwrap();
        assert_eq!(key.gas, "CO_1000");
        assert_eq!(key.location, "L2");
        assert_eq!(key.voltage, "500V");
        assert_eq!(key.fan_speed, "1500rpm");
    }

    #[test]
    fn from_indices_rejects_out_of_range() {
        assert!(matches!(
            ExperimentKey::from_indices(12, 1, 1, 1, 1),
            Err(WtdError::Validation(_))
        ));
        assert!(matches!(
            ExperimentKey::from_indices(1, 0, 1, 1, 1),
            Err(WtdError::Validation(_))
        ));
        assert!(matches!(
            ExperimentKey::from_indices(1, 1, 1, 1, 21),
            Err(WtdError::Validation(_))
        ));
    }
}
