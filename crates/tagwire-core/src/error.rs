use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification of every failure a reader can surface to its owner.
///
/// Consumers switch on the kind to decide how to present the failure:
/// lost and failed connections become operator alerts, configuration
/// errors keep a logical reader from ever starting, protocol errors are
/// logged and drop the offending message only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReaderErrorKind {
    /// Transport open failed, or required settings for connecting are missing.
    ConnectionFailed,

    /// Keepalive timeout or I/O failure in the middle of a session.
    ReaderLost,

    /// Malformed or unencodable message.
    ProtocolError,

    /// Missing or invalid required setting at initialization.
    ConfigurationError,
}

impl fmt::Display for ReaderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed => write!(f, "connection failed"),
            Self::ReaderLost => write!(f, "reader lost"),
            Self::ProtocolError => write!(f, "protocol error"),
            Self::ConfigurationError => write!(f, "configuration error"),
        }
    }
}

/// Structured error value handed to the owning collaborator and listeners.
///
/// This is what `report_error` hooks deliver; it is cheap to clone so it can
/// be fanned out to any number of listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct ReaderError {
    /// Error classification.
    pub kind: ReaderErrorKind,

    /// Human readable description.
    pub message: String,
}

impl ReaderError {
    pub fn new(kind: ReaderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(ReaderErrorKind::ConnectionFailed, message)
    }

    pub fn reader_lost(message: impl Into<String>) -> Self {
        Self::new(ReaderErrorKind::ReaderLost, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ReaderErrorKind::ProtocolError, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ReaderErrorKind::ConfigurationError, message)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    // Protocol errors
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    #[error("Frame too large: {size} bytes exceeds maximum of {max_size} bytes")]
    FrameTooLarge { size: usize, max_size: usize },

    #[error("Invalid message type: {0}")]
    InvalidMessageType(u16),

    #[error("Invalid hex identifier: {0}")]
    InvalidHex(String),

    // Connection errors
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Reader lost: {0}")]
    ReaderLost(String),

    #[error("Reader {0} is not connected")]
    NotConnected(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing configuration key: {0}")]
    MissingConfig(String),

    #[error("Endpoint {address}:{port} is already assigned to reader {owner}")]
    DuplicateEndpoint {
        address: String,
        port: u16,
        owner: String,
    },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Map this error onto the reader error taxonomy.
    pub fn kind(&self) -> ReaderErrorKind {
        match self {
            Self::InvalidFrame(_)
            | Self::UnsupportedVersion(_)
            | Self::FrameTooLarge { .. }
            | Self::InvalidMessageType(_)
            | Self::InvalidHex(_) => ReaderErrorKind::ProtocolError,
            Self::ConnectionFailed(_) | Self::NotConnected(_) => {
                ReaderErrorKind::ConnectionFailed
            }
            Self::ReaderLost(_) | Self::Io(_) => ReaderErrorKind::ReaderLost,
            Self::Config(_) | Self::MissingConfig(_) | Self::DuplicateEndpoint { .. } => {
                ReaderErrorKind::ConfigurationError
            }
        }
    }

    /// Whether this error is a transport failure rather than a bad message.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

impl From<&Error> for ReaderError {
    fn from(error: &Error) -> Self {
        ReaderError::new(error.kind(), error.to_string())
    }
}

impl From<Error> for ReaderError {
    fn from(error: Error) -> Self {
        ReaderError::from(&error)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Error::InvalidFrame("short".into()), ReaderErrorKind::ProtocolError)]
    #[case(Error::FrameTooLarge { size: 10, max_size: 5 }, ReaderErrorKind::ProtocolError)]
    #[case(Error::ConnectionFailed("refused".into()), ReaderErrorKind::ConnectionFailed)]
    #[case(Error::NotConnected("r1".into()), ReaderErrorKind::ConnectionFailed)]
    #[case(Error::ReaderLost("timeout".into()), ReaderErrorKind::ReaderLost)]
    #[case(Error::MissingConfig("IP".into()), ReaderErrorKind::ConfigurationError)]
    #[case(
        Error::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe")),
        ReaderErrorKind::ReaderLost
    )]
    fn test_error_kind_mapping(#[case] error: Error, #[case] expected: ReaderErrorKind) {
        assert_eq!(error.kind(), expected);
    }

    #[test]
    fn test_reader_error_from_error_keeps_message() {
        let error = Error::MissingConfig("IP".into());
        let reported = ReaderError::from(&error);

        assert_eq!(reported.kind, ReaderErrorKind::ConfigurationError);
        assert_eq!(reported.message, "Missing configuration key: IP");
    }

    #[test]
    fn test_reader_error_display() {
        let error = ReaderError::reader_lost("Connection timed out");
        assert_eq!(error.to_string(), "reader lost: Connection timed out");
    }

    #[test]
    fn test_duplicate_endpoint_display() {
        let error = Error::DuplicateEndpoint {
            address: "10.0.0.5".into(),
            port: 5084,
            owner: "DOCK-1".into(),
        };
        assert_eq!(
            error.to_string(),
            "Endpoint 10.0.0.5:5084 is already assigned to reader DOCK-1"
        );
    }
}
