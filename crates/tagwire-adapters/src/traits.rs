//! Reader adapter trait definitions.
//!
//! A reader adapter turns one logical reader, whatever its vendor, into a
//! source of canonical [`Tag`] batches with a uniform lifecycle. The
//! middleware drives every adapter through the same operations and learns
//! about reads and failures through registered [`TagListener`]s.
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024 RPITIT).
//! Heterogeneous adapters are held through the
//! [`AnyReaderAdapter`](crate::AnyReaderAdapter) enum.

#![allow(async_fn_in_trait)]

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::AdapterConfig;
use tagwire_core::{ReaderError, Result, Tag};

/// Lifecycle state of an adapter.
///
/// ```text
/// Disconnected ──connect──> Connected ──start──> Started ──stop──> Stopped
///      ^                                            │                │
///      └───────────────── disconnect ───────────────┴────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AdapterState {
    Disconnected,
    /// Session with the reader open, not reading.
    Connected,
    /// Reading continuously and reporting tags.
    Started,
    /// Session open, reading stopped or failed to start.
    Stopped,
}

impl AdapterState {
    pub fn is_connected(self) -> bool {
        !matches!(self, Self::Disconnected)
    }

    pub fn is_started(self) -> bool {
        matches!(self, Self::Started)
    }
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connected => write!(f, "connected"),
            Self::Started => write!(f, "started"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Receiver of an adapter's tag batches and errors.
///
/// Called from the adapter's report task; implementations should hand the
/// batch off rather than block.
pub trait TagListener: Send + Sync {
    fn on_tags(&self, reader: &str, tags: &[Tag]);

    fn on_error(&self, reader: &str, error: &ReaderError) {
        let _ = (reader, error);
    }
}

/// Uniform lifecycle of one logical reader.
///
/// Adapters never retry on their own. A failed `start` leaves the adapter in
/// a state from which the owner can call `start` again.
pub trait ReaderAdapter {
    /// Read and validate the reader properties.
    ///
    /// # Errors
    ///
    /// Returns an error of kind `ConfigurationError` when a required key is
    /// missing or a value is invalid. The adapter then refuses to connect.
    async fn initialize(&mut self, name: &str, config: &AdapterConfig) -> Result<()>;

    /// Connect if needed, then start continuous reading.
    ///
    /// A no-op when already started. Connection and vendor failures are
    /// logged and reported to listeners instead of being returned.
    async fn start(&mut self);

    /// Stop continuous reading. A no-op when not started.
    async fn stop(&mut self);

    /// Open the session with the reader.
    ///
    /// # Errors
    ///
    /// Returns an error of kind `ConnectionFailed` when the reader cannot be
    /// reached or the adapter was not configured.
    async fn connect_reader(&mut self) -> Result<()>;

    async fn disconnect_reader(&mut self);

    /// Re-validate properties and apply the ones that can change at runtime.
    async fn update(&mut self, config: &AdapterConfig) -> Result<()>;

    /// Poll the given read points once.
    ///
    /// None of the supported reader families support polled reads, so this
    /// returns no observations.
    async fn identify(&mut self, read_points: &[String]) -> Vec<Tag>;

    fn register(&self, listener: Arc<dyn TagListener>) -> bool;

    fn deregister(&self, listener: &Arc<dyn TagListener>) -> bool;

    fn name(&self) -> String;

    fn state(&self) -> AdapterState;
}
