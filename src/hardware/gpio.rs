//! Digital output control for the GNSS antenna power pin

use crate::hardware::CommResult;

/// Output level of a digital pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinLevel {
    Low,
    High,
}

/// Board GPIO used to switch antenna power
pub trait GpioControl {
    /// Configure a pin as a push-pull output
    fn configure_output(&mut self, pin: u16) -> CommResult<()>;

    /// Drive an output pin
    fn write(&mut self, pin: u16, level: PinLevel) -> CommResult<()>;
}

/// GPIO for boards without a switchable antenna
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGpio;

impl GpioControl for NoGpio {
    fn configure_output(&mut self, _pin: u16) -> CommResult<()> {
        Ok(())
    }

    fn write(&mut self, _pin: u16, _level: PinLevel) -> CommResult<()> {
        Ok(())
    }
}
