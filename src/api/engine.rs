//! Location engine facade
//!
//! The engine owns the worker thread and the shared modem. One engine per
//! modem; the application constructs it and hands it to whoever needs it.

use crate::api::formatting::{LocationEvent, LocationPublisher, LOCATION_EVENT_NAME};
use crate::api::types::{
    ApiError, ApiResult, LocationCommandContext, LocationCompletion, LocationResults,
};
use crate::api::worker::{EngineState, LocationWorker};
use crate::core::LocationPoint;
use crate::hardware::{
    lock_modem, GpioControl, ModemContext, ModemInterface, ModemType, NoGpio, SharedModem,
};
use crate::utils::LocationConfiguration;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

/// GNSS location engine
pub struct LocationEngine {
    pub(super) state: Arc<EngineState>,
    requests: SyncSender<LocationCommandContext>,
    pub(super) completions: Mutex<Receiver<LocationCompletion>>,
    publisher: Mutex<Option<Box<dyn LocationPublisher + Send>>>,
    req_id: AtomicU32,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl LocationEngine {
    /// Create an engine for a modem without antenna power control
    pub fn new(modem: Box<dyn ModemInterface + Send>) -> ApiResult<Self> {
        Self::with_gpio(modem, Box::new(NoGpio))
    }

    /// Create an engine and start its worker thread
    pub fn with_gpio(
        modem: Box<dyn ModemInterface + Send>,
        gpio: Box<dyn GpioControl + Send>,
    ) -> ApiResult<Self> {
        Self::from_shared(ModemContext::new(modem, gpio).into_shared())
    }

    /// Create an engine on a modem shared with other users of the AT channel
    pub fn from_shared(modem: SharedModem) -> ApiResult<Self> {
        let state = Arc::new(EngineState::new(modem));
        let (requests, request_rx) = mpsc::sync_channel(1);
        let (completion_tx, completions) = mpsc::channel();

        let worker = LocationWorker::new(state.clone(), request_rx, completion_tx)
            .spawn()
            .map_err(|e| ApiError::WorkerSpawn { details: e.to_string() })?;

        Ok(Self {
            state,
            requests,
            completions: Mutex::new(completions),
            publisher: Mutex::new(None),
            req_id: AtomicU32::new(1),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Apply a configuration
    ///
    /// Configures the antenna pin and, when the modem is already on, detects
    /// the modem and pushes the constellation selection. Detection is retried
    /// on the first acquisition otherwise. May be called again to replace the
    /// configuration for later acquisitions.
    pub fn begin(&self, config: LocationConfiguration) -> ApiResult<()> {
        config.validate()?;
        info!(
            "Location engine begin: {:?}, max fix time {:?}",
            config.constellation(),
            config.maximum_fix_time()
        );

        {
            let mut hardware = lock_modem(&self.state.modem);
            if let Some(pin) = config.antenna_pin() {
                hardware.configure_antenna(pin);
            }
            if hardware.is_powered() && hardware.detect() {
                hardware.set_constellation(config.constellation());
            }
        }

        self.state.set_config(config);
        Ok(())
    }

    /// Checks shared by both request conventions; `Some` rejects the request
    pub(super) fn preflight(&self) -> Option<LocationResults> {
        {
            let mut hardware = lock_modem(&self.state.modem);
            if !hardware.is_powered() {
                debug!("Location request rejected, modem is off");
                return Some(LocationResults::Unavailable);
            }
            if !hardware.detect() {
                debug!("Location request rejected, modem not supported");
                return Some(LocationResults::Unsupported);
            }
        }

        if !self.state.try_claim() {
            debug!("Location request rejected, acquisition in progress");
            return Some(LocationResults::Pending);
        }
        None
    }

    /// Hand a request to the worker after a successful preflight
    pub(super) fn submit(&self, context: LocationCommandContext) -> Result<(), LocationResults> {
        match self.requests.try_send(context) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.state.release();
                Err(LocationResults::Pending)
            }
            Err(TrySendError::Disconnected(_)) => {
                self.state.release();
                warn!("Location worker is not running");
                Err(LocationResults::Unavailable)
            }
        }
    }

    /// `Acquiring` while an acquisition is in flight, else `Idle`
    pub fn get_status(&self) -> LocationResults {
        if self.state.is_acquiring() {
            LocationResults::Acquiring
        } else {
            LocationResults::Idle
        }
    }

    /// Point of the last completed acquisition
    pub fn last_location_point(&self) -> LocationPoint {
        self.state.last().point
    }

    /// Result of the last completed acquisition, `Idle` before the first one
    pub fn last_results(&self) -> LocationResults {
        self.state.last().result
    }

    pub fn has_fix(&self) -> bool {
        self.state.last().point.is_fixed()
    }

    pub fn modem_type(&self) -> ModemType {
        lock_modem(&self.state.modem).modem_type()
    }

    /// Whether GNSS can stay on while the modem uses cellular
    ///
    /// False until a supported modem has been detected.
    pub fn concurrent_gnss_and_cellular_supported(&self) -> bool {
        let modem_type = self.modem_type();
        modem_type.is_supported() && modem_type.supports_concurrent_cellular()
    }

    /// Install the collaborator receiving location events
    pub fn set_publisher(&self, publisher: Box<dyn LocationPublisher + Send>) {
        *self.publisher() = Some(publisher);
    }

    fn publisher(&self) -> MutexGuard<'_, Option<Box<dyn LocationPublisher + Send>>> {
        self.publisher.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Event snapshot of a point, or of the last point, with the current request number
    pub fn location_event(&self, point: Option<&LocationPoint>) -> LocationEvent {
        let point = point.copied().unwrap_or_else(|| self.last_location_point());
        LocationEvent::new(&point, self.req_id.load(Ordering::Relaxed))
    }

    /// Publish a point, or the last point, when the publisher is connected
    ///
    /// The request number advances with every accepted event.
    pub fn publish_location_event(&self, point: Option<&LocationPoint>) -> bool {
        let event = self.location_event(point);
        let mut publisher = self.publisher();
        let Some(publisher) = publisher.as_mut() else {
            debug!("No location publisher installed");
            return false;
        };
        if !publisher.is_connected() {
            debug!("Location publisher not connected");
            return false;
        }

        let payload = match event.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Location event not serialized: {}", e);
                return false;
            }
        };
        if !publisher.publish(LOCATION_EVENT_NAME, &payload) {
            warn!("Location event {} not accepted", event.req_id);
            return false;
        }

        self.req_id.fetch_add(1, Ordering::Relaxed);
        info!("Published location event {}", event.req_id);
        true
    }

    /// Stop the worker, waiting for a running acquisition to finish
    pub fn shutdown(&self) {
        let handle = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(handle) = handle else {
            return;
        };

        if self.requests.send(LocationCommandContext::exit()).is_err() {
            debug!("Location worker already stopped");
        }
        if handle.join().is_err() {
            warn!("Location worker panicked");
        }
    }
}

impl Drop for LocationEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
