//! Acquisition timing parameters and AT command vocabulary

use std::time::Duration;

/// Idle tick of the worker loop while waiting for requests
pub const WORKER_IDLE_PERIOD: Duration = Duration::from_millis(1000);

/// Default interval between two position queries
pub const DEFAULT_POLL_INTERVAL_MS: u32 = 1000;

/// Default delay after switching on antenna power
pub const DEFAULT_ANTENNA_SETTLING_MS: u32 = 100;

/// Default maximum time allowed for a fix (seconds)
pub const DEFAULT_MAXIMUM_FIX_TIME_SECS: u32 = 90;

/// Number of fixes required before a position is considered stable
pub const REQUIRED_SETTLING_COUNT: u32 = 2;

/// Response timeout for configuration and session commands
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Response timeout for position and accuracy queries
pub const QUERY_COMMAND_TIMEOUT: Duration = Duration::from_millis(1000);

/// Device model identification
pub const CMD_MODEL_ID: &str = "AT+CGMM";
/// Turn on the GNSS engine
pub const CMD_GNSS_START: &str = "AT+QGPS=1";
/// Turn off the GNSS engine
pub const CMD_GNSS_END: &str = "AT+QGPSEND";
/// Enable estimated position error reporting
pub const CMD_ENABLE_EPE: &str = "AT+QGPSCFG=\"nmea_epe\",1";
/// Query position, `(-)dd.ddddd` coordinate format
pub const CMD_QUERY_LOCATION: &str = "AT+QGPSLOC=2";
/// Query estimated position error
pub const CMD_QUERY_EPE: &str = "AT+QGPSCFG=\"estimation_error\"";

/// Build the constellation selection command for a modem specific configuration number
pub fn gnss_config_command(config_number: u8) -> String {
    format!("AT+QGPSCFG=\"gnssconfig\",{}", config_number)
}

/// Kilometers per hour to meters per second
pub const KMH_TO_MPS: f32 = 1000.0 / 3600.0;
