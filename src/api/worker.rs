//! Worker loop owning the acquisition session
//!
//! All GNSS modem I/O of an acquisition happens on this thread. Requests
//! arrive on a single-slot channel; the facade rejects a second request
//! while one is in flight, so requests never queue up here.

use crate::api::session::AcquisitionSession;
use crate::api::types::{
    Delivery, LocationCommand, LocationCommandContext, LocationCompletion, LocationResponse,
    LocationResults,
};
use crate::core::constants::WORKER_IDLE_PERIOD;
use crate::core::LocationPoint;
use crate::hardware::SharedModem;
use crate::utils::LocationConfiguration;
use log::{debug, info, trace, warn};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

/// Last acquisition outcome, swapped as one unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LastFix {
    pub result: LocationResults,
    pub point: LocationPoint,
}

impl Default for LastFix {
    fn default() -> Self {
        Self {
            result: LocationResults::Idle,
            point: LocationPoint::default(),
        }
    }
}

/// State shared between the facade and the worker
pub(crate) struct EngineState {
    pub modem: SharedModem,
    config: RwLock<LocationConfiguration>,
    last: Mutex<LastFix>,
    acquiring: AtomicBool,
}

impl EngineState {
    pub fn new(modem: SharedModem) -> Self {
        Self {
            modem,
            config: RwLock::new(LocationConfiguration::default()),
            last: Mutex::new(LastFix::default()),
            acquiring: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> LocationConfiguration {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_config(&self, config: LocationConfiguration) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    pub fn last(&self) -> LastFix {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn store_last(&self, result: LocationResults, point: LocationPoint) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = LastFix { result, point };
    }

    /// Claim the acquiring flag; false if an acquisition is already in flight
    pub fn try_claim(&self) -> bool {
        self.acquiring
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn release(&self) {
        self.acquiring.store(false, Ordering::Release);
    }

    pub fn is_acquiring(&self) -> bool {
        self.acquiring.load(Ordering::Acquire)
    }
}

pub(crate) struct LocationWorker {
    state: Arc<EngineState>,
    requests: Receiver<LocationCommandContext>,
    completions: Sender<LocationCompletion>,
    session: AcquisitionSession,
}

impl LocationWorker {
    pub fn new(
        state: Arc<EngineState>,
        requests: Receiver<LocationCommandContext>,
        completions: Sender<LocationCompletion>,
    ) -> Self {
        Self {
            state,
            requests,
            completions,
            session: AcquisitionSession::new(),
        }
    }

    /// Run the worker on its own thread
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("location-worker".to_string())
            .spawn(move || self.run())
    }

    fn run(mut self) {
        debug!("Location worker started");
        loop {
            match self.requests.recv_timeout(WORKER_IDLE_PERIOD) {
                Ok(context) => {
                    if !self.handle(context) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!("Location worker stopped");
    }

    /// Handle one request; false ends the loop
    fn handle(&mut self, context: LocationCommandContext) -> bool {
        match context.command {
            LocationCommand::None => true,
            LocationCommand::Exit => false,
            LocationCommand::Acquire => {
                let config = self.state.config();
                let (result, point) = self.session.acquire(&self.state.modem, &config);
                info!("Location request completed: {:?}", result);

                self.state.store_last(result, point);
                self.state.release();
                self.deliver(context, result, point);
                true
            }
        }
    }

    fn deliver(&self, context: LocationCommandContext, result: LocationResults, point: LocationPoint) {
        match context.delivery {
            Delivery::Respond(reply) => {
                let response = LocationResponse {
                    result,
                    point,
                    publish: context.publish,
                };
                match reply.try_send(response) {
                    Ok(()) => trace!("Response posted"),
                    Err(TrySendError::Disconnected(_)) => debug!("Caller stopped waiting, response dropped"),
                    Err(TrySendError::Full(_)) => warn!("Response slot already filled"),
                }
            }
            Delivery::Callback(callback) => {
                let completion = LocationCompletion { result, point, callback };
                if self.completions.send(completion).is_err() {
                    warn!("Completion dropped, engine is gone");
                }
            }
            Delivery::Discard => {}
        }
    }
}
