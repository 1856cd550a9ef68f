//! Error types for vendor SDK drivers.
//!
//! Drivers wrap blocking vendor libraries. Their failures are reported with
//! [`DriverError`] and translated into the reader error taxonomy by the
//! adapter that called them.

use tagwire_core::{ReaderError, ReaderErrorKind};

/// Result type alias for driver operations.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Errors raised by a vendor driver.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    /// The reader could not be reached.
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    /// The driver has no open session with the reader.
    #[error("Not connected")]
    NotConnected,

    /// The reader refused a command.
    #[error("{operation} rejected: {message}")]
    Rejected { operation: String, message: String },

    /// Unknown antenna source or similar addressing error.
    #[error("Invalid source: {name}")]
    InvalidSource { name: String },

    /// The blocking call panicked or was cancelled.
    #[error("Driver task failed: {message}")]
    TaskFailed { message: String },
}

impl DriverError {
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
        }
    }

    pub fn rejected(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn invalid_source(name: impl Into<String>) -> Self {
        Self::InvalidSource { name: name.into() }
    }

    /// Reader error kind this failure is reported as.
    pub fn kind(&self) -> ReaderErrorKind {
        match self {
            Self::ConnectionFailed { .. } | Self::NotConnected => ReaderErrorKind::ConnectionFailed,
            Self::InvalidSource { .. } => ReaderErrorKind::ConfigurationError,
            Self::Rejected { .. } | Self::TaskFailed { .. } => ReaderErrorKind::ProtocolError,
        }
    }
}

impl From<&DriverError> for ReaderError {
    fn from(error: &DriverError) -> Self {
        ReaderError::new(error.kind(), error.to_string())
    }
}

impl From<tokio::task::JoinError> for DriverError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::TaskFailed {
            message: error.to_string(),
        }
    }
}
