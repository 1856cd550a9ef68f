use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Read-only snapshot of a connection's state and counters.
///
/// Obtained from [`ReaderConnection::metadata`](crate::ReaderConnection::metadata).
/// Counters and the session fields are reset every time the connection is
/// established.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReaderMetadata {
    pub name: String,
    pub address: Option<String>,
    pub port: Option<u16>,
    pub connected: bool,
    pub client_initiated: bool,
    pub keepalive_period_ms: u64,
    pub allowed_misses: u32,
    /// A keepalive arrived since the last watchdog cycle.
    pub alive: bool,
    pub report_keepalive: bool,
    pub packets_sent: u64,
    pub packets_received: u64,
    /// Identifier of the current or last session, absent before the first connect.
    pub session_id: Option<Uuid>,
    pub session_started: Option<DateTime<Utc>>,
}
