//! Common API types and data structures

use crate::core::LocationPoint;
use crate::hardware::CommError;
use crate::utils::ConfigError;
use std::fmt;
use std::sync::mpsc::SyncSender;
use thiserror::Error;

/// Outcome of an acquisition request, also cached as the last result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationResults {
    /// GNSS is not available, typically the modem is off
    Unavailable,
    /// GNSS is not supported on this modem
    Unsupported,
    /// No acquisition pending or in progress
    Idle,
    /// An acquisition has been accepted or is running
    Acquiring,
    /// A previous acquisition is still in progress
    Pending,
    /// A stable position was acquired
    Fixed,
    /// No stable position before the deadline
    TimedOut,
}

/// Command requests from callers to the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationCommand {
    /// Do nothing
    None,
    /// Perform a GNSS acquisition
    Acquire,
    /// Leave the worker loop
    Exit,
}

/// Completion callback for asynchronous requests
///
/// Runs in the context that calls
/// [`LocationEngine::dispatch_completions`](crate::api::LocationEngine::dispatch_completions).
pub type LocationDoneCallback = Box<dyn FnOnce(LocationResults, &LocationPoint) + Send>;

/// How the worker reports a finished acquisition
pub enum Delivery {
    /// Post the outcome on the blocked caller's single-slot response channel
    Respond(SyncSender<LocationResponse>),
    /// Post the outcome with this callback on the completion channel
    Callback(LocationDoneCallback),
    /// Only update the last-fix cache
    Discard,
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delivery::Respond(_) => write!(f, "Respond"),
            Delivery::Callback(_) => write!(f, "Callback"),
            Delivery::Discard => write!(f, "Discard"),
        }
    }
}

/// One request handed to the worker, consumed exactly once
#[derive(Debug)]
pub struct LocationCommandContext {
    pub command: LocationCommand,
    pub delivery: Delivery,
    /// Publish a location event if a fix is obtained
    pub publish: bool,
}

impl LocationCommandContext {
    pub fn acquire_blocking(publish: bool, response: SyncSender<LocationResponse>) -> Self {
        Self {
            command: LocationCommand::Acquire,
            delivery: Delivery::Respond(response),
            publish,
        }
    }

    pub fn acquire_async(callback: LocationDoneCallback) -> Self {
        Self {
            command: LocationCommand::Acquire,
            delivery: Delivery::Callback(callback),
            publish: false,
        }
    }

    pub fn exit() -> Self {
        Self {
            command: LocationCommand::Exit,
            delivery: Delivery::Discard,
            publish: false,
        }
    }
}

/// Outcome posted back to a synchronous caller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationResponse {
    pub result: LocationResults,
    pub point: LocationPoint,
    /// Publish flag of the request this answers
    pub publish: bool,
}

/// Outcome of an asynchronous request waiting to be dispatched
pub struct LocationCompletion {
    pub result: LocationResults,
    pub point: LocationPoint,
    pub callback: LocationDoneCallback,
}

impl fmt::Debug for LocationCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationCompletion")
            .field("result", &self.result)
            .field("point", &self.point)
            .finish()
    }
}

/// Engine lifecycle errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to start acquisition worker: {details}")]
    WorkerSpawn { details: String },
    #[error("acquisition worker is not running")]
    WorkerStopped,
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error(transparent)]
    Hardware(#[from] CommError),
}

/// Result type for engine lifecycle operations
pub type ApiResult<T> = Result<T, ApiError>;
