//! Synchronous location requests

use crate::api::engine::LocationEngine;
use crate::api::types::{LocationCommandContext, LocationResults};
use crate::core::LocationPoint;
use log::{debug, warn};
use std::sync::mpsc::{self, RecvTimeoutError};

impl LocationEngine {
    /// Acquire a location, blocking the calling thread until the acquisition ends
    ///
    /// The wait is bounded by the maximum fix time plus one poll interval; if
    /// it expires the result is `Idle` and the acquisition still completes in
    /// the background. With `publish` set, a fixed location is published when
    /// the publisher is connected.
    pub fn get_location(&self, point: &mut LocationPoint, publish: bool) -> LocationResults {
        point.clear();

        if let Some(rejected) = self.preflight() {
            return rejected;
        }

        let (reply, response) = mpsc::sync_channel(1);
        if let Err(rejected) = self.submit(LocationCommandContext::acquire_blocking(publish, reply)) {
            return rejected;
        }

        let wait = self.state.config().response_wait();
        match response.recv_timeout(wait) {
            Ok(response) => {
                *point = response.point;
                if response.result == LocationResults::Fixed && response.publish {
                    self.publish_location_event(Some(&response.point));
                }
                response.result
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("No location response within {:?}", wait);
                LocationResults::Idle
            }
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Location worker stopped before answering");
                LocationResults::Unavailable
            }
        }
    }
}
