//! Per-connection settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tagwire_core::constants::*;

/// Settings of one [`ReaderConnection`](crate::ReaderConnection).
///
/// # Example
///
/// ```
/// use tagwire_network::ConnectionConfig;
/// use std::time::Duration;
///
/// let config = ConnectionConfig {
///     address: Some("192.168.0.50".into()),
///     keepalive_period_ms: 1000,
///     ..Default::default()
/// };
/// assert_eq!(config.watchdog_window(), Duration::from_secs(3));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Reader host name or IP. Required for client-initiated connections.
    pub address: Option<String>,

    /// Reader port. Set to the default on connect when absent.
    pub port: Option<u16>,

    /// Period at which the reader is asked to emit keepalives.
    pub keepalive_period_ms: u64,

    /// Keepalives that may be missed before the connection is lost.
    pub allowed_misses: u32,

    /// Deliver keepalive frames to listeners as well.
    pub report_keepalive: bool,

    pub connect_timeout_ms: u64,

    pub max_frame_size: usize,
}

impl ConnectionConfig {
    pub fn keepalive_period(&self) -> Duration {
        Duration::from_millis(self.keepalive_period_ms)
    }

    /// Time the watchdog waits for a keepalive: `period * allowed_misses`.
    pub fn watchdog_window(&self) -> Duration {
        self.keepalive_period() * self.allowed_misses
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: None,
            port: None,
            keepalive_period_ms: DEFAULT_KEEPALIVE_PERIOD_MS,
            allowed_misses: DEFAULT_ALLOWED_KEEPALIVE_MISSES,
            report_keepalive: false,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}
