//! Core data types for GNSS acquisition

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type of location fix reported by the GNSS engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationFix {
    /// No position solution
    #[default]
    None,
    /// Two dimensional solution (no usable altitude)
    TwoD,
    /// Three dimensional solution
    ThreeD,
}

impl LocationFix {
    /// Map the `<fix>` field of a position report
    pub fn from_report(value: u32) -> Option<Self> {
        match value {
            2 => Some(LocationFix::TwoD),
            3 => Some(LocationFix::ThreeD),
            _ => None,
        }
    }
}

/// Snapshot of one fix attempt
///
/// When `fix` is [`LocationFix::None`] every other field is zero. Use
/// [`LocationPoint::clear`] rather than resetting `fix` alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationPoint {
    /// GNSS lock status
    pub fix: LocationFix,
    /// UTC epoch time reported by the GNSS engine (seconds)
    pub epoch_time: i64,
    /// Device epoch time when the sample was captured (seconds)
    pub system_time: i64,
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Altitude in meters
    pub altitude: f32,
    /// Speed over ground in meters per second
    pub speed: f32,
    /// Course over ground in degrees
    pub heading: f32,
    /// Horizontal accuracy in meters, zero when unknown
    pub horizontal_accuracy: f32,
    /// Horizontal dilution of precision
    pub horizontal_dop: f32,
    /// Vertical accuracy in meters, zero when unknown
    pub vertical_accuracy: f32,
    /// Vertical dilution of precision
    pub vertical_dop: f32,
    /// Time to first fix in seconds
    pub time_to_first_fix: f32,
    /// Satellites used in the solution
    pub sats_in_use: u32,
}

impl LocationPoint {
    pub fn is_fixed(&self) -> bool {
        self.fix != LocationFix::None
    }

    /// Reset to the "no fix" state with all numeric fields zeroed
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn has_horizontal_accuracy(&self) -> bool {
        self.horizontal_accuracy > 0.0
    }

    pub fn has_vertical_accuracy(&self) -> bool {
        self.vertical_accuracy > 0.0
    }
}

impl fmt::Display for LocationPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lat={:.5}, lon={:.5}, alt={:.1} m, speed={:.1} m/s, heading={:.1} deg, ttff={:.2}",
            self.latitude, self.longitude, self.altitude, self.speed, self.heading, self.time_to_first_fix
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_point_is_unfixed_and_zeroed() {
        let point = LocationPoint::default();
        assert!(!point.is_fixed());
        assert_eq!(point.latitude, 0.0);
        assert_eq!(point.sats_in_use, 0);
        assert!(!point.has_horizontal_accuracy());
    }

    #[test]
    fn test_clear_drops_stale_fields() {
        let mut point = LocationPoint {
            fix: LocationFix::ThreeD,
            latitude: 41.02,
            longitude: -75.17,
            horizontal_accuracy: 3.5,
            sats_in_use: 7,
            ..Default::default()
        };
        point.clear();
        assert_eq!(point, LocationPoint::default());
    }

    #[test]
    fn test_fix_from_report() {
        assert_eq!(LocationFix::from_report(2), Some(LocationFix::TwoD));
        assert_eq!(LocationFix::from_report(3), Some(LocationFix::ThreeD));
        assert_eq!(LocationFix::from_report(0), None);
        assert_eq!(LocationFix::from_report(7), None);
    }

    #[test]
    fn test_display_summary() {
        let point = LocationPoint {
            fix: LocationFix::ThreeD,
            latitude: 41.020440,
            longitude: -75.170220,
            altitude: 285.94,
            speed: 1.26,
            heading: 90.5,
            time_to_first_fix: 12.5,
            ..Default::default()
        };
        assert_eq!(
            point.to_string(),
            "lat=41.02044, lon=-75.17022, alt=285.9 m, speed=1.3 m/s, heading=90.5 deg, ttff=12.50"
        );
    }
}
