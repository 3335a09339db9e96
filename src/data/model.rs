use crate::error::{Result, WtdError};

// ---------------------------------------------------------------------------
// Channel naming convention
// ---------------------------------------------------------------------------

/// Name of the timestamp index column (milliseconds since recording start).
pub const TIME: &str = "Time";

/// Environmental channels, in raw-file order.
pub const ENVIRONMENT_CHANNELS: [&str; 10] = [
    "FanSetPoint",
    "FanReading",
    "Mfc1_SetPoint",
    "Mfc2_SetPoint",
    "Mfc3_SetPoint",
    "Mfc1_Read",
    "Mfc2_Read",
    "Mfc3_Read",
    "Temp",
    "RelHumid",
];

/// Mass flow controller readings used for baseline detection.
pub const MFC_READ_CHANNELS: [&str; 3] = ["Mfc1_Read", "Mfc2_Read", "Mfc3_Read"];

pub const BOARDS: usize = 9;
pub const SENSORS_PER_BOARD: usize = 8;

/// `B{board}S{sensor}`, both 1-based.
pub fn sensor_channel(board: usize, sensor: usize) -> String {
    format!("B{board}S{sensor}")
}

/// Every channel of a column table in canonical order: environment first,
/// then `B1S1 .. B9S8`.
pub fn channel_names() -> Vec<String> {
    ENVIRONMENT_CHANNELS
        .iter()
        .map(|s| s.to_string())
        .chain(sensor_channel_names())
        .collect()
}

/// The 72 sensor channel names, board-major.
pub fn sensor_channel_names() -> impl Iterator<Item = String> {
    (1..=BOARDS).flat_map(|b| (1..=SENSORS_PER_BOARD).map(move |s| sensor_channel(b, s)))
}

// ---------------------------------------------------------------------------
// Channel – one named column of values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub name: String,
    pub values: Vec<f64>,
}

impl Channel {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

// ---------------------------------------------------------------------------
// SensorFrame – a timestamp-indexed wide table
// ---------------------------------------------------------------------------

/// A column recording: one shared timestamp index and any number of named
/// channels of the same length.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SensorFrame {
    time: Vec<f64>,
    channels: Vec<Channel>,
}

impl SensorFrame {
    /// Build a frame, checking that every channel matches the index length.
    pub fn new(time: Vec<f64>, channels: Vec<Channel>) -> Result<Self> {
        for ch in &channels {
            if ch.values.len() != time.len() {
                return Err(WtdError::Format(format!(
                    "channel {} has {} values but the time index has {}",
                    ch.name,
                    ch.values.len(),
                    time.len()
                )));
            }
        }
        Ok(Self { time, channels })
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn channel(&self, name: &str) -> Option<&[f64]> {
        self.channels
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Like [`SensorFrame::channel`], but a missing channel is a format error.
    pub fn require(&self, name: &str) -> Result<&[f64]> {
        self.channel(name)
            .ok_or_else(|| WtdError::Format(format!("table has no '{name}' column")))
    }

    /// Check that the table carries the full column layout.
    pub fn check_layout(&self) -> Result<()> {
        let missing: Vec<String> = channel_names()
            .into_iter()
            .filter(|n| self.channel(n).is_none())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(WtdError::Format(format!(
                "table is missing expected columns: {}",
                missing.join(", ")
            )))
        }
    }

    /// The eight sensor readouts of a board (1-based), in sensor order.
    pub fn board_readouts(&self, board: usize) -> Result<Vec<Vec<f64>>> {
        (1..=SENSORS_PER_BOARD)
            .map(|s| self.require(&sensor_channel(board, s)).map(<[f64]>::to_vec))
            .collect()
    }

    /// Keep only the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> SensorFrame {
        let pick = |v: &[f64]| rows.iter().map(|&r| v[r]).collect::<Vec<f64>>();
        SensorFrame {
            time: pick(&self.time),
            channels: self
                .channels
                .iter()
                .map(|c| Channel::new(c.name.clone(), pick(&c.values)))
                .collect(),
        }
    }

    pub fn into_parts(self) -> (Vec<f64>, Vec<Channel>) {
        (self.time, self.channels)
    }

    /// Row index of the first timestamp `>= t` (`len()` if none).
    pub fn index_at_or_after(&self, t: f64) -> usize {
        self.time.partition_point(|&x| x < t)
    }

    /// Sample rate in Hz implied by the index: `n / t_last * 1000`.
    pub fn sample_rate(&self) -> Option<f64> {
        let last = *self.time.last()?;
        if last > 0.0 {
            Some(self.time.len() as f64 / last * 1000.0)
        } else {
            None
        }
    }
}
