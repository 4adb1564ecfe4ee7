//! OBD-II Error Types

use thiserror::Error;

/// Errors that can occur during OBD-II communication
///
/// "No data" outcomes (empty replies, unmatched frames, short payloads) are
/// not errors; they surface as empty line lists or `None` values.
#[derive(Debug, Error)]
pub enum ObdError {
    /// Serial port connection error
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// Every candidate configuration failed the smoke test
    #[error("Protocol negotiation failed after {attempts} smoke tests")]
    NegotiationFailed { attempts: usize },

    /// The engine has not negotiated a protocol or the channel is closed
    #[error("OBD adapter not connected")]
    NotConnected,
}

impl From<std::io::Error> for ObdError {
    fn from(err: std::io::Error) -> Self {
        ObdError::SerialError(err.to_string())
    }
}

impl From<tokio_serial::Error> for ObdError {
    fn from(err: tokio_serial::Error) -> Self {
        ObdError::SerialError(err.to_string())
    }
}
