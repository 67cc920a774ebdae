//! Hardware abstraction layer for the modem command channel
//!
//! This module provides the AT command interface consumed by the acquisition
//! engine, the modem family table, antenna GPIO control and transports.

pub mod modem;
pub mod gpio;
pub mod serial;
pub mod mock;
pub mod error;

pub use modem::{
    lock_modem, Constellation, FinalResult, ModemContext, ModemInterface, ModemResponse, ModemType,
    SharedModem,
};
pub use gpio::{GpioControl, NoGpio, PinLevel};
pub use serial::{AtChannel, SerialModem};
pub use mock::{MockGpio, MockModem};
pub use error::{CommError, CommResult, RecoveryStrategy};
