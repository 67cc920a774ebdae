//! Location event snapshot for telemetry
//!
//! The snapshot rounds each field to the precision a backend needs and omits
//! fields that carry no information (everything but `lck` without a fix,
//! accuracy values that are unknown).

use crate::core::LocationPoint;
use serde::{Deserialize, Serialize};

/// Event name and `cmd` value of a location event
pub const LOCATION_EVENT_NAME: &str = "loc";

/// Collaborator that forwards location events to a backend
pub trait LocationPublisher {
    /// Whether the backend connection is up
    fn is_connected(&self) -> bool;

    /// Publish one event payload; true when accepted
    fn publish(&mut self, event_name: &str, payload: &str) -> bool;
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Readout of a location point
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LocationSnapshot {
    /// 1 when locked on a fix
    pub lck: u8,
    /// GNSS epoch time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<f64>,
    /// Heading in degrees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hd: Option<f64>,
    /// Speed in m/s
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hdop: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h_acc: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v_acc: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nsat: Option<u32>,
    /// Time to first fix in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttff: Option<f64>,
}

impl LocationSnapshot {
    pub fn from_point(point: &LocationPoint) -> Self {
        if !point.is_fixed() {
            return Self::default();
        }

        Self {
            lck: 1,
            time: Some(point.epoch_time),
            lat: Some(round_to(point.latitude, 8)),
            lon: Some(round_to(point.longitude, 8)),
            alt: Some(round_to(point.altitude as f64, 3)),
            hd: Some(round_to(point.heading as f64, 2)),
            spd: Some(round_to(point.speed as f64, 2)),
            hdop: Some(round_to(point.horizontal_dop as f64, 1)),
            h_acc: point
                .has_horizontal_accuracy()
                .then(|| round_to(point.horizontal_accuracy as f64, 3)),
            v_acc: point
                .has_vertical_accuracy()
                .then(|| round_to(point.vertical_accuracy as f64, 3)),
            nsat: Some(point.sats_in_use),
            ttff: Some(round_to(point.time_to_first_fix as f64, 1)),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.lck == 1
    }
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

/// Location event handed to a [`LocationPublisher`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationEvent {
    pub cmd: String,
    /// Device time of capture
    #[serde(default, skip_serializing_if = "is_zero")]
    pub time: i64,
    pub loc: LocationSnapshot,
    /// Request sequence number
    pub req_id: u32,
}

impl LocationEvent {
    pub fn new(point: &LocationPoint, req_id: u32) -> Self {
        Self {
            cmd: LOCATION_EVENT_NAME.to_string(),
            time: point.system_time,
            loc: LocationSnapshot::from_point(point),
            req_id,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
