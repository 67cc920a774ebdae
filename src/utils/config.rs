use crate::core::constants::{
    DEFAULT_ANTENNA_SETTLING_MS, DEFAULT_MAXIMUM_FIX_TIME_SECS, DEFAULT_POLL_INTERVAL_MS,
};
use crate::hardware::Constellation;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Upper bound of the HDOP threshold
pub const MAX_HDOP_THRESHOLD: u8 = 100;

/// Acquisition policy, copied into the engine by `begin`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfiguration {
    /// Constellation selection pushed to the modem
    constellation: Constellation,
    /// Pin switching GNSS antenna power, if any
    antenna_pin: Option<u16>,
    /// HDOP at or below which a fix is considered stable (0 to 100)
    hdop_threshold: u8,
    /// Horizontal accuracy at or below which a fix is considered stable (meters)
    hacc_threshold_m: f32,
    /// Time allowed for a fix (milliseconds)
    maximum_fix_time_ms: u64,
    /// Interval between position queries (milliseconds)
    poll_interval_ms: u32,
    /// Delay after switching on antenna power (milliseconds)
    antenna_settling_ms: u32,
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Invalid parameter value
    #[error("invalid {parameter} = {value}: {reason}")]
    InvalidParameter { parameter: String, value: String, reason: String },
    /// Configuration file I/O error
    #[error("configuration I/O error: {message}")]
    IoError { message: String },
    /// JSON serialization/deserialization error
    #[error("configuration format error: {message}")]
    SerializationError { message: String },
}

impl Default for LocationConfiguration {
    fn default() -> Self {
        Self {
            constellation: Constellation::GpsOnly,
            antenna_pin: None,
            hdop_threshold: MAX_HDOP_THRESHOLD,
            hacc_threshold_m: 50.0,
            maximum_fix_time_ms: DEFAULT_MAXIMUM_FIX_TIME_SECS as u64 * 1000,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            antenna_settling_ms: DEFAULT_ANTENNA_SETTLING_MS,
        }
    }
}

impl LocationConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate a JSON configuration file
    ///
    /// Fields missing from the file keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::IoError {
            message: format!("{}: {}", path.as_ref().display(), e),
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content).map_err(|e| ConfigError::SerializationError {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializationError {
            message: e.to_string(),
        })?;
        fs::write(path.as_ref(), content).map_err(|e| ConfigError::IoError {
            message: format!("{}: {}", path.as_ref().display(), e),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hdop_threshold > MAX_HDOP_THRESHOLD {
            return Err(ConfigError::InvalidParameter {
                parameter: "hdop_threshold".to_string(),
                value: self.hdop_threshold.to_string(),
                reason: format!("must be between 0 and {}", MAX_HDOP_THRESHOLD),
            });
        }
        if !self.hacc_threshold_m.is_finite() || self.hacc_threshold_m <= 0.0 {
            return Err(ConfigError::InvalidParameter {
                parameter: "hacc_threshold_m".to_string(),
                value: self.hacc_threshold_m.to_string(),
                reason: "must be a positive distance".to_string(),
            });
        }
        if self.maximum_fix_time_ms == 0 {
            return Err(ConfigError::InvalidParameter {
                parameter: "maximum_fix_time_ms".to_string(),
                value: "0".to_string(),
                reason: "a fix needs a non-zero time window".to_string(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidParameter {
                parameter: "poll_interval_ms".to_string(),
                value: "0".to_string(),
                reason: "polling needs a non-zero interval".to_string(),
            });
        }
        Ok(())
    }

    /// Select the GNSS constellations
    pub fn with_constellation(mut self, constellation: Constellation) -> Self {
        self.constellation = constellation;
        self
    }

    /// Assign the pin that enables GNSS antenna power
    pub fn with_antenna_power(mut self, pin: u16) -> Self {
        self.antenna_pin = Some(pin);
        self
    }

    /// HDOP threshold for a stable fix, clamped to 0..=100
    pub fn with_hdop_threshold(mut self, hdop: i32) -> Self {
        self.hdop_threshold = hdop.clamp(0, MAX_HDOP_THRESHOLD as i32) as u8;
        self
    }

    /// Horizontal accuracy threshold in meters for a stable fix
    pub fn with_hacc_threshold(mut self, meters: f32) -> Self {
        self.hacc_threshold_m = meters;
        self
    }

    /// Maximum time to wait for a fix, in seconds
    pub fn with_maximum_fix_time(mut self, seconds: u32) -> Self {
        self.maximum_fix_time_ms = seconds as u64 * 1000;
        self
    }

    pub fn with_maximum_fix_time_millis(mut self, millis: u64) -> Self {
        self.maximum_fix_time_ms = millis;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis().min(u32::MAX as u128) as u32;
        self
    }

    pub fn with_antenna_settling(mut self, settling: Duration) -> Self {
        self.antenna_settling_ms = settling.as_millis().min(u32::MAX as u128) as u32;
        self
    }

    pub fn constellation(&self) -> Constellation {
        self.constellation
    }

    pub fn antenna_pin(&self) -> Option<u16> {
        self.antenna_pin
    }

    pub fn hdop_threshold(&self) -> u8 {
        self.hdop_threshold
    }

    pub fn hacc_threshold(&self) -> f32 {
        self.hacc_threshold_m
    }

    pub fn maximum_fix_time(&self) -> Duration {
        Duration::from_millis(self.maximum_fix_time_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms as u64)
    }

    pub fn antenna_settling(&self) -> Duration {
        Duration::from_millis(self.antenna_settling_ms as u64)
    }

    /// How long a synchronous caller waits for the worker
    ///
    /// One poll period of slack so the caller does not race the worker's own deadline.
    pub fn response_wait(&self) -> Duration {
        self.maximum_fix_time() + self.poll_interval()
    }
}
