//! Modem response processing

pub mod parser;

pub use parser::{
    parse_accuracy_report, parse_accuracy_response, parse_cme_error, parse_position_report,
    parse_position_response, AccuracyReport, CmeError, ParseError, PositionOutcome, PositionReport,
};
