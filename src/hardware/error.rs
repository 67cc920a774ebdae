//! Communication error types and handling

use thiserror::Error;

/// Communication error types for the modem command channel
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommError {
    /// The modem stopped answering or the port was closed
    #[error("connection to modem lost")]
    ConnectionLost,
    /// No final result line before the response timeout
    #[error("no response to {command} after {timeout_ms}ms")]
    Timeout { command: String, timeout_ms: u64 },
    /// The modem is switched off
    #[error("modem is powered off")]
    PoweredOff,
    /// Serial port or stream failure
    #[error("I/O error during {operation}: {details}")]
    Io { operation: String, details: String },
    /// Command exceeds the transmit buffer
    #[error("command of {length} bytes exceeds the {limit} byte limit")]
    BufferError { length: usize, limit: usize },
    /// GPIO or other board level failure
    #[error("hardware error on pin {pin}: {description}")]
    PinError { pin: u16, description: String },
}

impl CommError {
    pub(crate) fn io(operation: &str, error: std::io::Error) -> Self {
        CommError::Io {
            operation: operation.to_string(),
            details: error.to_string(),
        }
    }
}

/// Result type for communication operations
pub type CommResult<T> = Result<T, CommError>;

/// Error recovery strategy for communication failures
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecoveryStrategy {
    /// Retry the operation on the next poll
    Retry,
    /// Skip this response and continue
    Skip,
    /// Give up on the current session
    Fail,
}

impl CommError {
    /// Get the recommended recovery strategy for this error
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            CommError::Timeout { .. } => RecoveryStrategy::Retry,
            CommError::Io { .. } => RecoveryStrategy::Retry,
            CommError::ConnectionLost => RecoveryStrategy::Fail,
            CommError::PoweredOff => RecoveryStrategy::Fail,
            CommError::BufferError { .. } => RecoveryStrategy::Fail,
            CommError::PinError { .. } => RecoveryStrategy::Skip,
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.recovery_strategy(), RecoveryStrategy::Fail)
    }
}
