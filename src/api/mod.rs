//! Location engine API
//!
//! The engine accepts one acquisition at a time, either blocking the caller
//! ([`LocationEngine::get_location`]) or completing later through a callback
//! ([`LocationEngine::get_location_async`]).

pub mod blocking;
pub mod callback;
pub mod engine;
pub mod formatting;
pub mod session;
pub mod types;
mod worker;

// Re-export commonly used API types
pub use engine::LocationEngine;
pub use formatting::{LocationEvent, LocationPublisher, LocationSnapshot, LOCATION_EVENT_NAME};
pub use session::AcquisitionSession;
pub use types::{
    ApiError, ApiResult, Delivery, LocationCommand, LocationCommandContext, LocationCompletion,
    LocationDoneCallback, LocationResponse, LocationResults,
};
