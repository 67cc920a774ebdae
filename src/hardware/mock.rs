//! Scripted modem and GPIO for testing and development

use crate::core::constants::{CMD_MODEL_ID, CMD_QUERY_EPE, CMD_QUERY_LOCATION};
use crate::hardware::{
    CommError, CommResult, FinalResult, GpioControl, ModemInterface, ModemResponse, PinLevel,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Answer to a position query while no scripted response is queued
const DEFAULT_LOCATION_RESPONSE: &str = "+CME ERROR: 516";

#[derive(Debug)]
struct MockState {
    model: String,
    powered: bool,
    sent: Vec<String>,
    location_responses: VecDeque<String>,
    accuracy_response: Option<String>,
    overrides: HashMap<String, ModemResponse>,
    power_off_after: Option<usize>,
    location_queries: usize,
}

/// Mock modem answering AT commands from a script
///
/// Clones share state, so a test keeps one clone to script responses and
/// inspect sent commands while the engine owns the other.
#[derive(Debug, Clone)]
pub struct MockModem {
    state: Arc<Mutex<MockState>>,
}

impl MockModem {
    /// Create a powered mock reporting the given model identification
    pub fn new(model: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                model: model.to_string(),
                powered: true,
                sent: Vec::new(),
                location_responses: VecDeque::new(),
                accuracy_response: None,
                overrides: HashMap::new(),
                power_off_after: None,
                location_queries: 0,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue the line returned by the next position query
    pub fn push_location_response(&self, line: &str) {
        self.state().location_responses.push_back(line.to_string());
    }

    /// Line returned by every accuracy query
    pub fn set_accuracy_response(&self, line: &str) {
        self.state().accuracy_response = Some(line.to_string());
    }

    /// Fixed response for a specific command
    pub fn respond_with(&self, command: &str, response: ModemResponse) {
        self.state().overrides.insert(command.to_string(), response);
    }

    /// Switch the modem off after the given number of position queries
    pub fn power_off_after_queries(&self, queries: usize) {
        self.state().power_off_after = Some(queries);
    }

    pub fn set_powered(&self, powered: bool) {
        self.state().powered = powered;
    }

    /// All commands sent so far
    pub fn sent_commands(&self) -> Vec<String> {
        self.state().sent.clone()
    }

    pub fn count_sent(&self, command: &str) -> usize {
        self.state().sent.iter().filter(|c| c.as_str() == command).count()
    }

    pub fn location_queries(&self) -> usize {
        self.state().location_queries
    }

    pub fn clear_sent_commands(&self) {
        self.state().sent.clear();
    }
}

fn response_for_line(line: String) -> ModemResponse {
    match FinalResult::from_line(&line) {
        Some(FinalResult::Error) => ModemResponse::error(vec![line]),
        _ => ModemResponse::ok(vec![line]),
    }
}

impl ModemInterface for MockModem {
    fn command(&mut self, command: &str, _timeout: Duration) -> CommResult<ModemResponse> {
        let mut state = self.state();
        if !state.powered {
            return Err(CommError::PoweredOff);
        }
        state.sent.push(command.to_string());

        if let Some(response) = state.overrides.get(command) {
            return Ok(response.clone());
        }

        let response = match command {
            CMD_MODEL_ID => ModemResponse::ok(vec![state.model.clone()]),
            CMD_QUERY_LOCATION => {
                state.location_queries += 1;
                if state.power_off_after == Some(state.location_queries) {
                    state.powered = false;
                }
                let line = state
                    .location_responses
                    .pop_front()
                    .unwrap_or_else(|| DEFAULT_LOCATION_RESPONSE.to_string());
                response_for_line(line)
            }
            CMD_QUERY_EPE => match state.accuracy_response.clone() {
                Some(line) => response_for_line(line),
                None => ModemResponse::error(vec!["+CME ERROR: 501".to_string()]),
            },
            _ => ModemResponse::ok(Vec::new()),
        };
        Ok(response)
    }

    fn is_powered(&mut self) -> bool {
        self.state().powered
    }
}

/// GPIO mock recording every pin operation
#[derive(Debug, Clone, Default)]
pub struct MockGpio {
    outputs: Arc<Mutex<Vec<u16>>>,
    writes: Arc<Mutex<Vec<(u16, PinLevel)>>>,
}

impl MockGpio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins configured as outputs
    pub fn outputs(&self) -> Vec<u16> {
        self.outputs.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Pin writes in order
    pub fn writes(&self) -> Vec<(u16, PinLevel)> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn level(&self, pin: u16) -> Option<PinLevel> {
        self.writes().into_iter().rev().find(|(p, _)| *p == pin).map(|(_, level)| level)
    }
}

impl GpioControl for MockGpio {
    fn configure_output(&mut self, pin: u16) -> CommResult<()> {
        self.outputs.lock().unwrap_or_else(PoisonError::into_inner).push(pin);
        Ok(())
    }

    fn write(&mut self, pin: u16, level: PinLevel) -> CommResult<()> {
        if !self.outputs().contains(&pin) {
            return Err(CommError::PinError {
                pin,
                description: "pin not configured as output".to_string(),
            });
        }
        self.writes.lock().unwrap_or_else(PoisonError::into_inner).push((pin, level));
        Ok(())
    }
}
