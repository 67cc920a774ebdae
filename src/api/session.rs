//! One GNSS acquisition: preflight, session start, settling poll loop and teardown

use crate::api::types::LocationResults;
use crate::core::constants::{
    CMD_ENABLE_EPE, CMD_GNSS_END, CMD_GNSS_START, CMD_QUERY_EPE, CMD_QUERY_LOCATION,
    DEFAULT_COMMAND_TIMEOUT, QUERY_COMMAND_TIMEOUT, REQUIRED_SETTLING_COUNT,
};
use crate::core::LocationPoint;
use crate::hardware::{lock_modem, PinLevel, SharedModem};
use crate::processing::{parse_accuracy_response, parse_position_response, PositionOutcome};
use crate::utils::LocationConfiguration;
use chrono::Utc;
use log::{debug, info, trace, warn};
use std::thread;
use std::time::{Duration, Instant};

/// GNSS session state kept by the worker between requests
///
/// On modems that support concurrent GNSS and cellular operation the
/// session stays started across requests.
#[derive(Debug, Default)]
pub struct AcquisitionSession {
    gnss_started: bool,
    time_to_first_fix: Option<Duration>,
}

impl AcquisitionSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_started(&self) -> bool {
        self.gnss_started
    }

    /// Time to first fix since the GNSS session was started, if a fix was seen
    pub fn time_to_first_fix(&self) -> Option<Duration> {
        self.time_to_first_fix
    }

    /// Run one acquisition to completion
    pub fn acquire(
        &mut self,
        modem: &SharedModem,
        config: &LocationConfiguration,
    ) -> (LocationResults, LocationPoint) {
        {
            let mut hardware = lock_modem(modem);
            if !hardware.is_powered() {
                debug!("Modem is not on");
                self.gnss_started = false;
                return (LocationResults::Unavailable, LocationPoint::default());
            }
            if !hardware.detect() {
                debug!("Modem is not supported");
                return (LocationResults::Unsupported, LocationPoint::default());
            }
        }

        self.start(modem, config);
        let (result, point) = self.poll(modem, config);
        self.teardown(modem, config);
        (result, point)
    }

    /// Start the GNSS session unless it is already running
    ///
    /// Returns true when the start sequence was issued.
    pub fn start(&mut self, modem: &SharedModem, config: &LocationConfiguration) -> bool {
        if self.gnss_started {
            trace!("GNSS session already started");
            return false;
        }

        if let Some(pin) = config.antenna_pin() {
            lock_modem(modem).set_antenna(pin, PinLevel::High);
            thread::sleep(config.antenna_settling());
        }

        let mut hardware = lock_modem(modem);
        info!("Starting GNSS session");
        if let Err(e) = hardware.command(CMD_GNSS_START, DEFAULT_COMMAND_TIMEOUT) {
            warn!("GNSS start failed: {}", e);
        }
        if hardware.modem_type().supports_accuracy_estimate() {
            if let Err(e) = hardware.command(CMD_ENABLE_EPE, DEFAULT_COMMAND_TIMEOUT) {
                warn!("Accuracy estimation not enabled: {}", e);
            }
        }
        hardware.set_constellation(config.constellation());

        self.gnss_started = true;
        self.time_to_first_fix = None;
        true
    }

    fn poll(
        &mut self,
        modem: &SharedModem,
        config: &LocationConfiguration,
    ) -> (LocationResults, LocationPoint) {
        let maximum = config.maximum_fix_time();
        let start = Instant::now();
        let mut point = LocationPoint::default();
        let mut fix_count = 0u32;
        let mut result = LocationResults::TimedOut;
        let mut powered = true;

        loop {
            let response = {
                let mut hardware = lock_modem(modem);
                if !hardware.is_powered() {
                    powered = false;
                    break;
                }
                if start.elapsed() >= maximum {
                    break;
                }
                hardware.command(CMD_QUERY_LOCATION, QUERY_COMMAND_TIMEOUT)
            };

            match response {
                Ok(response) => match parse_position_response(response.payload_line(), &mut point) {
                    PositionOutcome::Fixed => {
                        // Misses in between do not reset the count
                        fix_count += 1;
                        point.system_time = Utc::now().timestamp();

                        if self.time_to_first_fix.is_none() {
                            let ttff = start.elapsed();
                            info!("Time to first fix {} ms", ttff.as_millis());
                            self.time_to_first_fix = Some(ttff);
                        }

                        self.read_accuracy(modem, &mut point);

                        if fix_count >= REQUIRED_SETTLING_COUNT && is_settled(&point, config) {
                            result = LocationResults::Fixed;
                            break;
                        }
                        trace!(
                            "Fix {} hdop={} hacc={}",
                            fix_count,
                            point.horizontal_dop,
                            point.horizontal_accuracy
                        );
                    }
                    PositionOutcome::NoFix => trace!("No fix yet"),
                    PositionOutcome::Retry(error) if error.is_recognized() => {
                        trace!("GNSS not ready: {:?}", error)
                    }
                    PositionOutcome::Retry(error) => match error.code() {
                        Some(code) => warn!("Unexpected GNSS error {}", code),
                        None => warn!("Unreadable GNSS error report"),
                    },
                    PositionOutcome::ParseError(e) => debug!("Unparsed position response: {}", e),
                },
                Err(e) if e.is_recoverable() => debug!("Position query failed: {}", e),
                Err(e) => warn!("Position query failed: {}", e),
            }

            thread::sleep(config.poll_interval());
        }

        if point.is_fixed() {
            if let Some(ttff) = self.time_to_first_fix {
                point.time_to_first_fix = ttff.as_secs_f32();
            }
        }

        if !powered {
            self.gnss_started = false;
            if result != LocationResults::Fixed {
                result = LocationResults::Unavailable;
            }
        }

        (result, point)
    }

    fn read_accuracy(&self, modem: &SharedModem, point: &mut LocationPoint) {
        let mut hardware = lock_modem(modem);
        if !hardware.modem_type().supports_accuracy_estimate() {
            return;
        }
        match hardware.command(CMD_QUERY_EPE, QUERY_COMMAND_TIMEOUT) {
            Ok(response) => {
                if !parse_accuracy_response(response.payload_line(), point) {
                    trace!("No accuracy estimate");
                }
            }
            Err(e) => debug!("Accuracy query failed: {}", e),
        }
    }

    /// End the session when GNSS would block cellular use
    fn teardown(&mut self, modem: &SharedModem, config: &LocationConfiguration) {
        let mut hardware = lock_modem(modem);
        if hardware.modem_type().supports_concurrent_cellular() {
            return;
        }

        if hardware.is_powered() {
            if let Err(e) = hardware.command(CMD_GNSS_END, DEFAULT_COMMAND_TIMEOUT) {
                warn!("GNSS end failed: {}", e);
            }
        }
        if let Some(pin) = config.antenna_pin() {
            hardware.set_antenna(pin, PinLevel::Low);
        }
        self.gnss_started = false;
        debug!("GNSS session ended");
    }
}

/// Whether a fix satisfies the HDOP and horizontal accuracy thresholds
///
/// An unknown accuracy does not hold back a fix.
pub fn is_settled(point: &LocationPoint, config: &LocationConfiguration) -> bool {
    let hdop_ok = point.horizontal_dop <= config.hdop_threshold() as f32;
    let hacc_ok = !point.has_horizontal_accuracy() || point.horizontal_accuracy <= config.hacc_threshold();
    hdop_ok && hacc_ok
}
