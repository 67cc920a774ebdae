//! Modem command interface, modem families and constellation selection

use crate::core::constants::{gnss_config_command, CMD_MODEL_ID, DEFAULT_COMMAND_TIMEOUT};
use crate::hardware::{CommResult, GpioControl, PinLevel};
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Line oriented AT command channel to a cellular modem
pub trait ModemInterface {
    /// Send one command and collect the response lines up to the final result code
    fn command(&mut self, command: &str, timeout: Duration) -> CommResult<ModemResponse>;

    /// Check whether the modem is currently switched on
    fn is_powered(&mut self) -> bool;
}

/// Final result code terminating an AT response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalResult {
    Ok,
    Error,
}

impl FinalResult {
    /// Recognize a final result line
    pub fn from_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line == "OK" {
            Some(FinalResult::Ok)
        } else if line == "ERROR" || line.starts_with("+CME ERROR") || line.starts_with("+CMS ERROR") {
            Some(FinalResult::Error)
        } else {
            None
        }
    }
}

/// Response collected for a single command
#[derive(Debug, Clone, PartialEq)]
pub struct ModemResponse {
    /// Information lines, including a terminating `+CME ERROR` line
    pub lines: Vec<String>,
    pub result: FinalResult,
}

impl ModemResponse {
    pub fn ok(lines: Vec<String>) -> Self {
        Self { lines, result: FinalResult::Ok }
    }

    pub fn error(lines: Vec<String>) -> Self {
        Self { lines, result: FinalResult::Error }
    }

    pub fn is_ok(&self) -> bool {
        self.result == FinalResult::Ok
    }

    /// Line handed to the response parsers
    ///
    /// The first `+` prefixed line, else `ERROR` for a bare error result, else empty.
    pub fn payload_line(&self) -> &str {
        if let Some(line) = self.lines.iter().find(|l| l.trim_start().starts_with('+')) {
            return line.as_str();
        }
        match self.result {
            FinalResult::Error => "ERROR",
            FinalResult::Ok => "",
        }
    }

    /// First non-empty information line
    pub fn first_line(&self) -> Option<&str> {
        self.lines.iter().map(|l| l.trim()).find(|l| !l.is_empty())
    }
}

/// GNSS constellation selection
///
/// Only single values are meaningful; they cannot be combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Constellation {
    #[default]
    GpsOnly,
    GpsGlonass,
    GpsBeidou,
    GpsGalileo,
    GpsQzss,
}

/// Modem family, detected once from the model identification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModemType {
    /// Not read yet, typically because the modem is off
    #[default]
    Undetected,
    /// Not supported by this library
    Unsupported,
    /// BG95-M5 or BG95-S5
    Bg95,
    /// EG91-EX or EG91-NAX
    Eg91,
}

impl ModemType {
    /// Classify the answer to a model identification query
    pub fn from_model(model: &str) -> Self {
        let model = model.trim().to_ascii_uppercase();
        if model.is_empty() {
            return ModemType::Undetected;
        }
        if model.starts_with("BG95-M5") || model.starts_with("BG95-S5") {
            ModemType::Bg95
        } else if model.starts_with("EG91-EX") || model.starts_with("EG91-NAX") {
            ModemType::Eg91
        } else {
            ModemType::Unsupported
        }
    }

    pub fn is_detected(&self) -> bool {
        !matches!(self, ModemType::Undetected)
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, ModemType::Bg95 | ModemType::Eg91)
    }

    /// Whether GNSS and a cellular session can run at the same time
    ///
    /// The BG95 shares radio components between GNSS and cellular, so a long
    /// acquisition can keep the modem from connecting.
    pub fn supports_concurrent_cellular(&self) -> bool {
        !matches!(self, ModemType::Bg95)
    }

    /// Whether the modem reports an estimated position error
    pub fn supports_accuracy_estimate(&self) -> bool {
        matches!(self, ModemType::Bg95)
    }

    /// Modem specific `gnssconfig` value for a constellation selection
    pub fn constellation_config(&self, constellation: Constellation) -> Option<u8> {
        match self {
            ModemType::Bg95 => Some(match constellation {
                Constellation::GpsOnly | Constellation::GpsGlonass => 1,
                Constellation::GpsBeidou => 2,
                Constellation::GpsGalileo => 3,
                Constellation::GpsQzss => 4,
            }),
            ModemType::Eg91 => match constellation {
                Constellation::GpsOnly => Some(0),
                Constellation::GpsGlonass => Some(4),
                Constellation::GpsBeidou => Some(7),
                Constellation::GpsGalileo => Some(6),
                Constellation::GpsQzss => None,
            },
            ModemType::Undetected | ModemType::Unsupported => None,
        }
    }
}

/// Modem, antenna GPIO and cached modem family behind one lock
pub struct ModemContext {
    modem: Box<dyn ModemInterface + Send>,
    gpio: Box<dyn GpioControl + Send>,
    modem_type: ModemType,
}

/// Handle shared by the facade and the worker
pub type SharedModem = Arc<Mutex<ModemContext>>;

/// Lock the shared modem, recovering the state if a holder panicked
pub fn lock_modem(shared: &SharedModem) -> MutexGuard<'_, ModemContext> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ModemContext {
    pub fn new(modem: Box<dyn ModemInterface + Send>, gpio: Box<dyn GpioControl + Send>) -> Self {
        Self {
            modem,
            gpio,
            modem_type: ModemType::Undetected,
        }
    }

    pub fn into_shared(self) -> SharedModem {
        Arc::new(Mutex::new(self))
    }

    pub fn modem_type(&self) -> ModemType {
        self.modem_type
    }

    pub fn is_powered(&mut self) -> bool {
        self.modem.is_powered()
    }

    pub fn command(&mut self, command: &str, timeout: Duration) -> CommResult<ModemResponse> {
        trace!("-> {}", command);
        let response = self.modem.command(command, timeout);
        match &response {
            Ok(r) => trace!("<- {:?} {:?}", r.result, r.lines),
            Err(e) => debug!("{} failed: {}", command, e),
        }
        response
    }

    /// Detect the modem family if not known yet
    ///
    /// Returns true when a supported family is known. An empty or failed model
    /// answer leaves the family undetected so detection is retried later.
    pub fn detect(&mut self) -> bool {
        if self.modem_type.is_detected() {
            return self.modem_type.is_supported();
        }
        if !self.modem.is_powered() {
            return false;
        }

        let response = match self.command(CMD_MODEL_ID, DEFAULT_COMMAND_TIMEOUT) {
            Ok(response) => response,
            Err(e) => {
                warn!("Modem identification failed: {}", e);
                return false;
            }
        };
        if !response.is_ok() {
            warn!("Modem identification rejected: {}", response.payload_line());
            return false;
        }

        let model = response.first_line().unwrap_or("");
        self.modem_type = ModemType::from_model(model);
        match self.modem_type {
            ModemType::Undetected => debug!("Modem model not available yet"),
            ModemType::Unsupported => info!("Modem type {} not supported", model),
            detected => info!("{} detected ({:?})", model, detected),
        }
        self.modem_type.is_supported()
    }

    /// Push the constellation selection for the detected family
    pub fn set_constellation(&mut self, constellation: Constellation) {
        match self.modem_type.constellation_config(constellation) {
            Some(number) => {
                debug!("Set constellations {}", number);
                if let Err(e) = self.command(&gnss_config_command(number), DEFAULT_COMMAND_TIMEOUT) {
                    warn!("Constellation selection failed: {}", e);
                }
            }
            None if self.modem_type.is_supported() => {
                warn!("{:?} not supported on {:?}", constellation, self.modem_type);
            }
            None => {}
        }
    }

    pub fn configure_antenna(&mut self, pin: u16) {
        if let Err(e) = self.gpio.configure_output(pin) {
            warn!("Antenna pin setup failed: {}", e);
        }
    }

    pub fn set_antenna(&mut self, pin: u16, level: PinLevel) {
        trace!("Antenna pin {} {:?}", pin, level);
        if let Err(e) = self.gpio.write(pin, level) {
            warn!("Antenna power change failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{MockGpio, MockModem};
    use rstest::rstest;

    #[rstest]
    #[case("BG95-M5", ModemType::Bg95)]
    #[case("BG95-S5", ModemType::Bg95)]
    #[case("EG91-EX", ModemType::Eg91)]
    #[case("eg91-nax", ModemType::Eg91)]
    #[case("BG77", ModemType::Unsupported)]
    #[case("", ModemType::Undetected)]
    fn test_model_classification(#[case] model: &str, #[case] expected: ModemType) {
        assert_eq!(ModemType::from_model(model), expected);
    }

    #[rstest]
    #[case(Constellation::GpsOnly, Some(1), Some(0))]
    #[case(Constellation::GpsGlonass, Some(1), Some(4))]
    #[case(Constellation::GpsBeidou, Some(2), Some(7))]
    #[case(Constellation::GpsGalileo, Some(3), Some(6))]
    #[case(Constellation::GpsQzss, Some(4), None)]
    fn test_constellation_table(
        #[case] constellation: Constellation,
        #[case] bg95: Option<u8>,
        #[case] eg91: Option<u8>,
    ) {
        assert_eq!(ModemType::Bg95.constellation_config(constellation), bg95);
        assert_eq!(ModemType::Eg91.constellation_config(constellation), eg91);
        assert_eq!(ModemType::Unsupported.constellation_config(constellation), None);
    }

    #[test]
    fn test_family_capabilities() {
        assert!(!ModemType::Bg95.supports_concurrent_cellular());
        assert!(ModemType::Bg95.supports_accuracy_estimate());
        assert!(ModemType::Eg91.supports_concurrent_cellular());
        assert!(!ModemType::Eg91.supports_accuracy_estimate());
    }

    #[test]
    fn test_payload_line_selection() {
        let response = ModemResponse::ok(vec!["".to_string(), "+QGPSLOC: 1,2".to_string()]);
        assert_eq!(response.payload_line(), "+QGPSLOC: 1,2");

        let response = ModemResponse::error(vec!["+CME ERROR: 516".to_string()]);
        assert_eq!(response.payload_line(), "+CME ERROR: 516");

        assert_eq!(ModemResponse::error(vec![]).payload_line(), "ERROR");
        assert_eq!(ModemResponse::ok(vec![]).payload_line(), "");
    }

    #[test]
    fn test_final_result_lines() {
        assert_eq!(FinalResult::from_line("OK\r"), Some(FinalResult::Ok));
        assert_eq!(FinalResult::from_line("ERROR"), Some(FinalResult::Error));
        assert_eq!(FinalResult::from_line("+CME ERROR: 505"), Some(FinalResult::Error));
        assert_eq!(FinalResult::from_line("+QGPSLOC: 1"), None);
    }

    #[test]
    fn test_detection_is_cached() {
        let modem = MockModem::new("EG91-EX");
        let mut context = ModemContext::new(Box::new(modem.clone()), Box::new(MockGpio::new()));

        assert!(context.detect());
        assert!(context.detect());
        assert_eq!(context.modem_type(), ModemType::Eg91);
        assert_eq!(modem.count_sent(CMD_MODEL_ID), 1);
    }

    #[test]
    fn test_detection_skipped_when_powered_off() {
        let modem = MockModem::new("BG95-M5");
        modem.set_powered(false);
        let mut context = ModemContext::new(Box::new(modem.clone()), Box::new(MockGpio::new()));

        assert!(!context.detect());
        assert_eq!(context.modem_type(), ModemType::Undetected);
        assert!(modem.sent_commands().is_empty());
    }

    #[test]
    fn test_detection_retried_after_error_reply() {
        let modem = MockModem::new("BG95-M5");
        modem.respond_with(
            CMD_MODEL_ID,
            ModemResponse::error(vec!["+CME ERROR: 3".to_string()]),
        );
        let mut context = ModemContext::new(Box::new(modem.clone()), Box::new(MockGpio::new()));

        assert!(!context.detect());
        assert_eq!(context.modem_type(), ModemType::Undetected);

        modem.respond_with(CMD_MODEL_ID, ModemResponse::ok(vec!["BG95-M5".to_string()]));
        assert!(context.detect());
        assert_eq!(context.modem_type(), ModemType::Bg95);
        assert_eq!(modem.count_sent(CMD_MODEL_ID), 2);
    }

    #[test]
    fn test_unsupported_modem() {
        let modem = MockModem::new("SARA-R510");
        let mut context = ModemContext::new(Box::new(modem), Box::new(MockGpio::new()));
        assert!(!context.detect());
        assert_eq!(context.modem_type(), ModemType::Unsupported);
    }

    #[test]
    fn test_constellation_command() {
        let modem = MockModem::new("BG95-M5");
        let mut context = ModemContext::new(Box::new(modem.clone()), Box::new(MockGpio::new()));
        context.detect();
        context.set_constellation(Constellation::GpsGalileo);
        assert_eq!(modem.count_sent("AT+QGPSCFG=\"gnssconfig\",3"), 1);
    }
}
