//! Core constants for reader connections and the framed reader protocol.
//!
//! These values are shared by the protocol codec, the connection state
//! machine and the adapters, so that defaults stay consistent across the
//! workspace.
//!
//! # Framed Protocol Header
//!
//! Every framed message starts with a fixed 10 byte header:
//!
//! ```text
//! +-----+-----+--------+-----------+--------------+
//! | rsv | ver |  type  |  length   |  message id  |
//! | 3b  | 3b  |  10b   |  u32 BE   |    u32 BE    |
//! +-----+-----+--------+-----------+--------------+
//! ```
//!
//! The length counts the header itself, so the smallest valid frame is
//! [`FRAME_HEADER_LEN`] bytes long.
//!
//! # Usage
//!
//! ```
//! use tagwire_core::constants::*;
//! use std::time::Duration;
//!
//! let window = Duration::from_millis(DEFAULT_KEEPALIVE_PERIOD_MS)
//!     * DEFAULT_ALLOWED_KEEPALIVE_MISSES;
//! assert_eq!(window.as_secs(), 30);
//! ```

// ============================================================================
// Network Defaults
// ============================================================================

/// Default TCP port of framed-protocol readers (IANA port for LLRP).
pub const DEFAULT_READER_PORT: u16 = 5084;

/// Default TCP port for Impinj Speedway readers driven through the vendor SDK.
pub const DEFAULT_SPEEDWAY_PORT: u16 = 5084;

/// Default timeout for establishing a client-initiated connection (milliseconds).
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3000;

/// Upper bound for flushing and shutting down a transport on disconnect (milliseconds).
pub const TRANSPORT_CLOSE_TIMEOUT_MS: u64 = 500;

// ============================================================================
// Keepalive Supervision
// ============================================================================

/// Default period between keepalives emitted by the reader (milliseconds).
///
/// # Value: 10000ms (10 seconds)
pub const DEFAULT_KEEPALIVE_PERIOD_MS: u64 = 10_000;

/// Default number of keepalives that may be missed before the connection
/// is considered lost.
///
/// The watchdog window is `period * misses`.
pub const DEFAULT_ALLOWED_KEEPALIVE_MISSES: u32 = 3;

// ============================================================================
// Framed Protocol
// ============================================================================

/// Protocol version carried in every frame header.
pub const PROTOCOL_VERSION: u8 = 1;

/// Size of the fixed frame header in bytes.
pub const FRAME_HEADER_LEN: usize = 10;

/// Default maximum frame size accepted or produced by the codec (64 KB).
///
/// A tag report with a few thousand 96-bit EPCs fits comfortably; anything
/// larger is treated as a framing error.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// Largest message type number representable in the 10-bit type field.
pub const MAX_MESSAGE_TYPE: u16 = 0x03FF;

// ============================================================================
// Adapters
// ============================================================================

/// Logical source used by CAEN Proton readers when none is configured.
pub const DEFAULT_PROTON_SOURCE: &str = "Source_0";

/// RF mode requested from Speedway readers (AutoSet Dense Reader Deep Scan).
pub const SPEEDWAY_RF_MODE: u16 = 1002;

/// Clock format accepted by SensX readers when setting their date and time.
pub const SENSX_CLOCK_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_fits_minimum_frame() {
        assert!(FRAME_HEADER_LEN < DEFAULT_MAX_FRAME_SIZE);
    }

    #[test]
    fn test_message_type_is_ten_bits() {
        assert_eq!(MAX_MESSAGE_TYPE, (1 << 10) - 1);
    }
}
