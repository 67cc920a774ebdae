//! Parsers for GNSS related AT responses
//!
//! Each parser turns a single response line into a tagged result. A line is
//! either matched completely or rejected; partially decoded lines are never
//! written into a [`LocationPoint`].

use crate::core::constants::KMH_TO_MPS;
use crate::core::{LocationFix, LocationPoint};
use chrono::NaiveDate;
use thiserror::Error;

const CME_ERROR_PREFIX: &str = "+CME ERROR:";
const POSITION_PREFIX: &str = "+QGPSLOC:";
const ACCURACY_PREFIX: &str = "+QGPSCFG:";
const ACCURACY_TAG: &str = "\"estimation_error\"";

/// Number of comma separated fields in a position report
const POSITION_FIELD_COUNT: usize = 11;

/// Error report returned by the modem as `+CME ERROR: <n>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmeError {
    /// 504, a session is already running
    SessionIsOngoing,
    /// 505, GNSS is not enabled
    SessionNotActive,
    /// 506
    OperationTimeout,
    /// 516, acquiring without a fix yet
    NoFix,
    /// 522
    GnssIsWorking,
    /// 549, the modem's own "unknown error"
    UnknownError,
    /// Numeric code outside the known set
    Unrecognized(u32),
    /// Error prefix without a readable code
    Malformed,
}

impl CmeError {
    pub fn from_code(code: u32) -> Self {
        match code {
            504 => CmeError::SessionIsOngoing,
            505 => CmeError::SessionNotActive,
            506 => CmeError::OperationTimeout,
            516 => CmeError::NoFix,
            522 => CmeError::GnssIsWorking,
            549 => CmeError::UnknownError,
            other => CmeError::Unrecognized(other),
        }
    }

    pub fn code(&self) -> Option<u32> {
        match self {
            CmeError::SessionIsOngoing => Some(504),
            CmeError::SessionNotActive => Some(505),
            CmeError::OperationTimeout => Some(506),
            CmeError::NoFix => Some(516),
            CmeError::GnssIsWorking => Some(522),
            CmeError::UnknownError => Some(549),
            CmeError::Unrecognized(code) => Some(*code),
            CmeError::Malformed => None,
        }
    }

    /// Whether the code belongs to the documented GNSS error set
    pub fn is_recognized(&self) -> bool {
        !matches!(self, CmeError::Unrecognized(_) | CmeError::Malformed)
    }

    /// Whether the error means "no position yet" rather than a fault
    pub fn is_no_fix(&self) -> bool {
        matches!(self, CmeError::NoFix | CmeError::SessionNotActive)
    }
}

/// Reasons a response line was rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("line does not start with {expected}")]
    MissingPrefix { expected: &'static str },
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },
    #[error("invalid {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },
    #[error("invalid date/time {date} {time}")]
    InvalidTimestamp { date: String, time: String },
}

fn invalid(field: &'static str, value: &str) -> ParseError {
    ParseError::InvalidField {
        field,
        value: value.to_string(),
    }
}

/// Scan a line for a `+CME ERROR` report
///
/// Returns `None` when the line carries no error report.
pub fn parse_cme_error(line: &str) -> Option<CmeError> {
    let rest = line.trim_start().strip_prefix(CME_ERROR_PREFIX)?;
    let digits: String = rest.trim_start().chars().take_while(|c| c.is_ascii_digit()).collect();
    match digits.parse::<u32>() {
        Ok(code) => Some(CmeError::from_code(code)),
        Err(_) => Some(CmeError::Malformed),
    }
}

/// Fully matched `+QGPSLOC` report
#[derive(Debug, Clone, PartialEq)]
pub struct PositionReport {
    /// UTC epoch seconds from the report's date and time of day
    pub epoch_time: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub hdop: f32,
    pub altitude: f32,
    pub fix: LocationFix,
    pub cog_degrees: u32,
    pub cog_minutes: u32,
    pub speed_kmh: f32,
    pub speed_knots: f32,
    pub satellites: u32,
}

impl PositionReport {
    /// Course over ground in degrees
    pub fn heading(&self) -> f32 {
        self.cog_degrees as f32 + self.cog_minutes as f32 / 60.0
    }

    /// Speed over ground in meters per second
    pub fn speed_mps(&self) -> f32 {
        self.speed_kmh * KMH_TO_MPS
    }

    /// Copy the report into a location point, leaving accuracy and timing fields untouched
    pub fn apply(&self, point: &mut LocationPoint) {
        point.fix = self.fix;
        point.epoch_time = self.epoch_time;
        point.latitude = self.latitude;
        point.longitude = self.longitude;
        point.altitude = self.altitude;
        point.speed = self.speed_mps();
        point.heading = self.heading();
        point.horizontal_dop = self.hdop;
        point.sats_in_use = self.satellites;
    }
}

fn parse_number<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, ParseError> {
    value.parse::<T>().map_err(|_| invalid(field, value))
}

fn parse_float(field: &'static str, value: &str) -> Result<f64, ParseError> {
    let number: f64 = parse_number(field, value)?;
    if number.is_finite() {
        Ok(number)
    } else {
        Err(invalid(field, value))
    }
}

/// Split a fixed width run of ASCII digits into two digit groups
fn digit_pairs(field: &'static str, value: &str) -> Result<[u32; 3], ParseError> {
    if value.len() != 6 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(field, value));
    }
    let pair = |i: usize| parse_number::<u32>(field, &value[i..i + 2]);
    Ok([pair(0)?, pair(2)?, pair(4)?])
}

fn parse_utc_time(value: &str) -> Result<[u32; 3], ParseError> {
    let (whole, fraction) = match value.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (value, None),
    };
    if let Some(fraction) = fraction {
        if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("utc", value));
        }
    }
    digit_pairs("utc", whole).map_err(|_| invalid("utc", value))
}

fn parse_course(value: &str) -> Result<(u32, u32), ParseError> {
    let (degrees, minutes) = value.split_once('.').ok_or_else(|| invalid("cog", value))?;
    let degrees: u32 = parse_number("cog", degrees)?;
    let minutes: u32 = parse_number("cog", minutes)?;
    if degrees >= 360 || minutes >= 60 {
        return Err(invalid("cog", value));
    }
    Ok((degrees, minutes))
}

fn epoch_from(date: &str, time: &str) -> Result<i64, ParseError> {
    let [day, month, year] = digit_pairs("date", date)?;
    let [hour, minute, second] = parse_utc_time(time)?;

    NaiveDate::from_ymd_opt(2000 + year as i32, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .map(|dt| dt.and_utc().timestamp())
        .ok_or_else(|| ParseError::InvalidTimestamp {
            date: date.to_string(),
            time: time.to_string(),
        })
}

/// Parse a position report
///
/// `+QGPSLOC: <hhmmss.sss>,<lat>,<lon>,<hdop>,<alt>,<fix>,<ddd.mm>,<spkm>,<spkn>,<ddmmyy>,<nsat>`
pub fn parse_position_report(line: &str) -> Result<PositionReport, ParseError> {
    let body = line
        .trim()
        .strip_prefix(POSITION_PREFIX)
        .ok_or(ParseError::MissingPrefix { expected: POSITION_PREFIX })?;

    let fields: Vec<&str> = body.split(',').map(str::trim).collect();
    if fields.len() != POSITION_FIELD_COUNT {
        return Err(ParseError::FieldCount {
            expected: POSITION_FIELD_COUNT,
            found: fields.len(),
        });
    }

    let latitude = parse_float("latitude", fields[1])?;
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(invalid("latitude", fields[1]));
    }
    let longitude = parse_float("longitude", fields[2])?;
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(invalid("longitude", fields[2]));
    }

    let fix_value: u32 = parse_number("fix", fields[5])?;
    let fix = LocationFix::from_report(fix_value).ok_or_else(|| invalid("fix", fields[5]))?;
    let (cog_degrees, cog_minutes) = parse_course(fields[6])?;

    Ok(PositionReport {
        epoch_time: epoch_from(fields[9], fields[0])?,
        latitude,
        longitude,
        hdop: parse_float("hdop", fields[3])? as f32,
        altitude: parse_float("altitude", fields[4])? as f32,
        fix,
        cog_degrees,
        cog_minutes,
        speed_kmh: parse_float("speed_kmh", fields[7])? as f32,
        speed_knots: parse_float("speed_knots", fields[8])? as f32,
        satellites: parse_number("nsat", fields[10])?,
    })
}

/// Outcome of a position query
#[derive(Debug, Clone, PartialEq)]
pub enum PositionOutcome {
    /// A complete report was applied to the point
    Fixed,
    /// The modem explicitly reported no fix; the point was cleared
    NoFix,
    /// Any other error report; keep polling
    Retry(CmeError),
    /// The line matched no known shape
    ParseError(ParseError),
}

/// Interpret the response line of a position query
pub fn parse_position_response(line: &str, point: &mut LocationPoint) -> PositionOutcome {
    if let Some(error) = parse_cme_error(line) {
        if error.is_no_fix() {
            point.clear();
            return PositionOutcome::NoFix;
        }
        return PositionOutcome::Retry(error);
    }

    match parse_position_report(line) {
        Ok(report) => {
            report.apply(point);
            PositionOutcome::Fixed
        }
        Err(e) => PositionOutcome::ParseError(e),
    }
}

/// Estimated position error report
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccuracyReport {
    pub horizontal: f32,
    pub vertical: f32,
    pub speed: f32,
    pub heading: f32,
}

/// Parse `+QGPSCFG: "estimation_error",<h_acc>,<v_acc>,<speed_acc>,<head_acc>`
pub fn parse_accuracy_report(line: &str) -> Result<AccuracyReport, ParseError> {
    let body = line
        .trim()
        .strip_prefix(ACCURACY_PREFIX)
        .ok_or(ParseError::MissingPrefix { expected: ACCURACY_PREFIX })?;

    let fields: Vec<&str> = body.split(',').map(str::trim).collect();
    if fields.first() != Some(&ACCURACY_TAG) {
        return Err(invalid("tag", fields.first().copied().unwrap_or("")));
    }
    if fields.len() != 5 {
        return Err(ParseError::FieldCount { expected: 5, found: fields.len() });
    }

    Ok(AccuracyReport {
        horizontal: parse_float("h_acc", fields[1])? as f32,
        vertical: parse_float("v_acc", fields[2])? as f32,
        speed: parse_float("speed_acc", fields[3])? as f32,
        heading: parse_float("head_acc", fields[4])? as f32,
    })
}

/// Apply an accuracy response to a point
///
/// Returns true when a report was applied. Non-positive values are stored as
/// zero, which means "unknown".
pub fn parse_accuracy_response(line: &str, point: &mut LocationPoint) -> bool {
    if parse_cme_error(line).is_some() {
        return false;
    }
    match parse_accuracy_report(line) {
        Ok(report) => {
            point.horizontal_accuracy = report.horizontal.max(0.0);
            point.vertical_accuracy = report.vertical.max(0.0);
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const REPORT: &str =
        "+QGPSLOC: 061951.000,41.02044,-75.17022,1.3,285.9,3,123.30,3.6,1.9,110324,06";

    #[rstest]
    #[case("+CME ERROR: 504", Some(CmeError::SessionIsOngoing))]
    #[case("+CME ERROR: 505", Some(CmeError::SessionNotActive))]
    #[case("+CME ERROR: 506", Some(CmeError::OperationTimeout))]
    #[case("  +CME ERROR: 516", Some(CmeError::NoFix))]
    #[case("+CME ERROR: 522", Some(CmeError::GnssIsWorking))]
    #[case("+CME ERROR: 549", Some(CmeError::UnknownError))]
    #[case("+CME ERROR: 123", Some(CmeError::Unrecognized(123)))]
    #[case("+CME ERROR: busy", Some(CmeError::Malformed))]
    #[case("+CME ERROR:", Some(CmeError::Malformed))]
    #[case(REPORT, None)]
    #[case("", None)]
    #[case("ERROR", None)]
    fn test_cme_error_parsing(#[case] line: &str, #[case] expected: Option<CmeError>) {
        assert_eq!(parse_cme_error(line), expected);
    }

    #[test]
    fn test_cme_error_codes() {
        assert_eq!(CmeError::NoFix.code(), Some(516));
        assert_eq!(CmeError::Unrecognized(42).code(), Some(42));
        assert_eq!(CmeError::Malformed.code(), None);
        assert!(CmeError::UnknownError.is_recognized());
        assert!(!CmeError::Unrecognized(42).is_recognized());
    }

    #[test]
    fn test_position_report_fields() {
        let report = parse_position_report(REPORT).unwrap();
        assert_eq!(report.latitude, 41.02044);
        assert_eq!(report.longitude, -75.17022);
        assert_eq!(report.altitude, 285.9);
        assert_eq!(report.hdop, 1.3);
        assert_eq!(report.fix, LocationFix::ThreeD);
        assert_eq!(report.satellites, 6);
        assert_eq!(report.epoch_time, 1_710_137_991);
        assert!((report.heading() - 123.5).abs() < 1e-4);
        assert!((report.speed_mps() - 1.0).abs() < 1e-4);
    }

    #[rstest]
    #[case("000.00", 0, 0)]
    #[case("090.15", 90, 15)]
    #[case("359.59", 359, 59)]
    fn test_heading_combines_degrees_and_minutes(
        #[case] cog: &str,
        #[case] degrees: u32,
        #[case] minutes: u32,
    ) {
        let line = format!(
            "+QGPSLOC: 120000.000,-33.86785,151.20732,0.9,58.0,2,{},0.0,0.0,010125,11",
            cog
        );
        let report = parse_position_report(&line).unwrap();
        assert_eq!(report.fix, LocationFix::TwoD);
        assert_eq!(report.heading(), degrees as f32 + minutes as f32 / 60.0);
    }

    #[rstest]
    #[case("+QGPSLOC: 061951.000,41.02044,-75.17022,1.3,285.9,3,123.30,3.6,1.9,1103")]
    #[case("+QGPSLOC: 061951.000,41.02044,-75.17022,1.3,285.9,3,123.30,3.6,1.9,110324,06,7")]
    #[case("+QGPSLOC: 061951.000,41.02044,-75.17022")]
    #[case("+QGPSLOC: 06195X.000,41.02044,-75.17022,1.3,285.9,3,123.30,3.6,1.9,110324,06")]
    #[case("+QGPSLOC: 061951.000,91.5,-75.17022,1.3,285.9,3,123.30,3.6,1.9,110324,06")]
    #[case("+QGPSLOC: 061951.000,41.02044,-75.17022,1.3,285.9,1,123.30,3.6,1.9,110324,06")]
    #[case("+QGPSLOC: 061951.000,41.02044,-75.17022,1.3,285.9,3,123.75,3.6,1.9,110324,06")]
    #[case("+QGPSLOC: 061951.000,41.02044,-75.17022,1.3,285.9,3,123.30,3.6,1.9,311324,06")]
    #[case("+QGPSLOC: 061951.000,41.02044,-75.17022,nan,285.9,3,123.30,3.6,1.9,110324,06")]
    #[case("+QGPSLOC: 256100.000,41.02044,-75.17022,1.3,285.9,3,123.30,3.6,1.9,110324,06")]
    #[case("QGPSLOC 061951.000,41.02044")]
    #[case("OK")]
    fn test_garbled_reports_rejected(#[case] line: &str) {
        assert!(parse_position_report(line).is_err());

        let mut point = LocationPoint::default();
        assert!(matches!(
            parse_position_response(line, &mut point),
            PositionOutcome::ParseError(_)
        ));
        assert_eq!(point, LocationPoint::default());
    }

    #[test]
    fn test_response_fixed() {
        let mut point = LocationPoint {
            horizontal_accuracy: 4.0,
            ..Default::default()
        };
        assert_eq!(parse_position_response(REPORT, &mut point), PositionOutcome::Fixed);
        assert!(point.is_fixed());
        assert_eq!(point.latitude, 41.02044);
        assert_eq!(point.sats_in_use, 6);
        assert_eq!(point.horizontal_accuracy, 4.0);
    }

    #[rstest]
    #[case("+CME ERROR: 516")]
    #[case("+CME ERROR: 505")]
    fn test_response_no_fix_clears_point(#[case] line: &str) {
        let mut point = LocationPoint::default();
        parse_position_response(REPORT, &mut point);
        point.horizontal_accuracy = 2.5;

        assert_eq!(parse_position_response(line, &mut point), PositionOutcome::NoFix);
        assert!(!point.is_fixed());
        assert_eq!(point, LocationPoint::default());
    }

    #[rstest]
    #[case("+CME ERROR: 504", CmeError::SessionIsOngoing)]
    #[case("+CME ERROR: 522", CmeError::GnssIsWorking)]
    #[case("+CME ERROR: 549", CmeError::UnknownError)]
    fn test_response_retry_on_other_errors(#[case] line: &str, #[case] error: CmeError) {
        let mut point = LocationPoint::default();
        assert_eq!(parse_position_response(line, &mut point), PositionOutcome::Retry(error));
    }

    #[test]
    fn test_response_unrecognized_code_is_not_no_fix() {
        let mut point = LocationPoint::default();
        parse_position_response(REPORT, &mut point);
        let before = point;

        let outcome = parse_position_response("+CME ERROR: 777", &mut point);
        assert_eq!(outcome, PositionOutcome::Retry(CmeError::Unrecognized(777)));
        assert_ne!(outcome, PositionOutcome::Fixed);
        assert_ne!(outcome, PositionOutcome::NoFix);
        assert_eq!(point, before);
    }

    #[test]
    fn test_accuracy_report() {
        let report = parse_accuracy_report("+QGPSCFG: \"estimation_error\",3.2,5.1,0.4,12.0").unwrap();
        assert_eq!(report.horizontal, 3.2);
        assert_eq!(report.vertical, 5.1);
        assert_eq!(report.speed, 0.4);
        assert_eq!(report.heading, 12.0);
    }

    #[test]
    fn test_accuracy_response_applied() {
        let mut point = LocationPoint::default();
        assert!(parse_accuracy_response(
            "+QGPSCFG: \"estimation_error\",3.2,0.0,0.4,12.0",
            &mut point
        ));
        assert_eq!(point.horizontal_accuracy, 3.2);
        assert!(!point.has_vertical_accuracy());

        assert!(parse_accuracy_response(
            "+QGPSCFG: \"estimation_error\",-1.0,-2.5,0.4,12.0",
            &mut point
        ));
        assert_eq!(point.horizontal_accuracy, 0.0);
        assert_eq!(point.vertical_accuracy, 0.0);
        assert!(!point.has_horizontal_accuracy());
    }

    #[rstest]
    #[case("+CME ERROR: 516")]
    #[case("+QGPSCFG: \"estimation_error\",3.2,5.1")]
    #[case("+QGPSCFG: \"nmea_epe\",1")]
    #[case("+QGPSCFG: \"estimation_error\",abc,5.1,0.4,12.0")]
    #[case("")]
    fn test_accuracy_response_ignored(#[case] line: &str) {
        let mut point = LocationPoint {
            horizontal_accuracy: 7.0,
            ..Default::default()
        };
        assert!(!parse_accuracy_response(line, &mut point));
        assert_eq!(point.horizontal_accuracy, 7.0);
    }
}
