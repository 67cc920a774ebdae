//! GNSS Location Acquisition for Cellular Modems
//!
//! Drives the integrated GNSS receiver of Quectel BG95 and EG91 modems over
//! their AT command channel: starts a GNSS session, polls position reports
//! until a fix settles within the configured quality thresholds and exposes
//! the result to blocking and callback based callers.

pub mod core;
pub mod processing;
pub mod utils;
pub mod hardware;
pub mod api;

// Re-export commonly used types
pub use core::{LocationFix, LocationPoint};
pub use hardware::{
    CommError, CommResult, Constellation, GpioControl, ModemInterface, ModemResponse, ModemType,
    PinLevel, SerialModem,
};
pub use processing::{CmeError, PositionOutcome};
pub use utils::{ConfigError, LocationConfiguration};
pub use api::{
    ApiError, ApiResult, LocationDoneCallback, LocationEngine, LocationEvent, LocationPublisher,
    LocationResults, LocationSnapshot,
};
