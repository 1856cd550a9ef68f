//! Per-reader connection state machine.
//!
//! A [`ReaderConnection`] owns one physical link to a framed-protocol
//! reader. While connected it runs up to four tasks:
//!
//! ```text
//!             send() ──> outbound queue ──> outbound worker ──> FramedWrite ──> reader
//! reader ──> FramedRead ──> transport reader ──> on_wire_message_received()
//!                                                  │        └─ keepalive: alive + ACK
//!                                                  └─> inbound queue ──> inbound worker ──> listeners
//!                                         watchdog: every misses*period, alive? else ReaderLost
//! ```
//!
//! All tasks share one `CancellationToken` per session. The connection
//! state is a single atomic value: every path that ends a session, whether
//! an explicit `disconnect()`, the watchdog, or a transport failure, goes
//! through one compare-and-swap and only the winner cancels the session
//! and reports the error.
//!
//! Nothing is retried. A lost connection stays disconnected until the owner
//! calls [`ReaderConnection::reconnect`].

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::{
    BoxedTransport, ConnectionConfig, ConnectionListener, ReaderMetadata, Transport, WorkQueue,
};
use tagwire_core::constants::{DEFAULT_READER_PORT, TRANSPORT_CLOSE_TIMEOUT_MS};
use tagwire_core::{Error, ListenerSet, ReaderError, ReaderErrorKind, Result};
use tagwire_protocol::{FrameCodec, KeepaliveSpec, Message, ReaderConfig};

const DISCONNECTED: u8 = 0;
const CONNECTED: u8 = 1;

/// Externally observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ConnectionState {
    Disconnected,
    /// Transport open and workers running.
    Connected,
}

struct Session {
    id: Uuid,
    cancel: CancellationToken,
    watchdog: bool,
}

#[derive(Default)]
struct SessionInfo {
    id: Option<Uuid>,
    started: Option<DateTime<Utc>>,
    client_initiated: bool,
}

struct Inner {
    name: String,
    state: AtomicU8,
    config: Mutex<ConnectionConfig>,
    info: Mutex<SessionInfo>,
    alive: AtomicBool,
    packets_sent: AtomicU64,
    packets_received: AtomicU64,
    next_message_id: AtomicU32,
    outbound: WorkQueue<Message>,
    inbound: WorkQueue<Bytes>,
    listeners: ListenerSet<dyn ConnectionListener>,
    session: Mutex<Option<Session>>,
    pending: Mutex<Option<BoxedTransport>>,
    connect_lock: tokio::sync::Mutex<()>,
}

/// Handle to one reader connection.
///
/// Cloning the handle is cheap; all clones drive the same connection.
///
/// # Example
///
/// ```no_run
/// use tagwire_network::{ConnectionState, ReaderConnection};
///
/// # async fn example() {
/// let reader = ReaderConnection::new("DOCK-1");
/// reader.set_address("192.168.0.50");
///
/// if reader.connect(true).await.is_ok() {
///     assert_eq!(reader.state(), ConnectionState::Connected);
/// }
///
/// reader.disconnect();
/// reader.disconnect(); // no-op
/// assert_eq!(reader.state(), ConnectionState::Disconnected);
/// # }
/// ```
#[derive(Clone)]
pub struct ReaderConnection {
    inner: Arc<Inner>,
}

impl ReaderConnection {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, ConnectionConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: ConnectionConfig) -> Self {
        let name = name.into();
        debug!(reader = %name, "Creating reader connection");

        Self {
            inner: Arc::new(Inner {
                name,
                state: AtomicU8::new(DISCONNECTED),
                config: Mutex::new(config),
                info: Mutex::new(SessionInfo::default()),
                alive: AtomicBool::new(false),
                packets_sent: AtomicU64::new(0),
                packets_received: AtomicU64::new(0),
                next_message_id: AtomicU32::new(1),
                outbound: WorkQueue::new(),
                inbound: WorkQueue::new(),
                listeners: ListenerSet::new(),
                session: Mutex::new(None),
                pending: Mutex::new(None),
                connect_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn state(&self) -> ConnectionState {
        if self.inner.is_connected() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    /// Snapshot of settings, session and counters.
    pub fn metadata(&self) -> ReaderMetadata {
        let config = self.inner.config.lock().clone();
        let info = self.inner.info.lock();

        ReaderMetadata {
            name: self.inner.name.clone(),
            address: config.address,
            port: config.port,
            connected: self.inner.is_connected(),
            client_initiated: info.client_initiated,
            keepalive_period_ms: config.keepalive_period_ms,
            allowed_misses: config.allowed_misses,
            alive: self.inner.alive.load(Ordering::Acquire),
            report_keepalive: config.report_keepalive,
            packets_sent: self.inner.packets_sent.load(Ordering::Relaxed),
            packets_received: self.inner.packets_received.load(Ordering::Relaxed),
            session_id: info.id,
            session_started: info.started,
        }
    }

    pub fn config(&self) -> ConnectionConfig {
        self.inner.config.lock().clone()
    }

    pub fn set_address(&self, address: impl Into<String>) {
        self.inner.config.lock().address = Some(address.into());
    }

    pub fn set_port(&self, port: u16) {
        self.inner.config.lock().port = Some(port);
    }

    /// Keepalive settings. Take effect at the next watchdog cycle.
    pub fn set_keepalive(&self, period: Duration, allowed_misses: u32, report_keepalive: bool) {
        let mut config = self.inner.config.lock();
        config.keepalive_period_ms = period.as_millis() as u64;
        config.allowed_misses = allowed_misses;
        config.report_keepalive = report_keepalive;
    }

    pub fn set_report_keepalive(&self, report_keepalive: bool) {
        self.inner.config.lock().report_keepalive = report_keepalive;
    }

    /// Hand over a transport opened by the reader, for `connect(false)`.
    pub fn attach<T: Transport>(&self, transport: T) {
        let previous = self.inner.pending.lock().replace(Box::new(transport));
        if previous.is_some() {
            debug!(reader = %self.inner.name, "Replacing unused attached transport");
        }
    }

    pub fn register(&self, listener: Arc<dyn ConnectionListener>) -> bool {
        self.inner.listeners.register(listener)
    }

    pub fn deregister(&self, listener: &Arc<dyn ConnectionListener>) -> bool {
        self.inner.listeners.deregister(listener)
    }

    /// Messages waiting for the outbound worker.
    pub fn queued_outbound(&self) -> usize {
        self.inner.outbound.len()
    }

    /// Open the connection and start its workers.
    ///
    /// With `client_initiated` the configured address is dialled; otherwise
    /// the transport previously passed to [`attach`](Self::attach) is used.
    /// Client-initiated connections also enable the reader heartbeat and the
    /// watchdog. Connecting an already connected reader does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionFailed`] when no address is configured, the
    /// dial fails or times out, or no transport is attached. The error is
    /// also reported to listeners and the state stays disconnected.
    pub async fn connect(&self, client_initiated: bool) -> Result<()> {
        let _guard = self.inner.connect_lock.lock().await;

        if self.inner.is_connected() {
            debug!(reader = %self.inner.name, "Already connected");
            return Ok(());
        }

        match self.inner.open(client_initiated).await {
            Ok(transport) => {
                self.inner.start_session(transport, client_initiated);
                if client_initiated {
                    self.enable_heartbeat();
                }
                Ok(())
            }
            Err(e) => {
                self.inner.report_error(ReaderError::connection_failed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Stop all workers and close the transport. Idempotent.
    pub fn disconnect(&self) {
        if self.inner.teardown() {
            info!(reader = %self.inner.name, "Disconnected");
        } else {
            debug!(reader = %self.inner.name, "Disconnect on idle connection");
        }

        if self.inner.pending.lock().take().is_some() {
            debug!(reader = %self.inner.name, "Dropped attached transport");
        }
    }

    /// Disconnect, then connect once in the previously used mode.
    ///
    /// Reader-initiated connections need a freshly attached transport.
    pub async fn reconnect(&self) -> Result<()> {
        let client_initiated = self.inner.info.lock().client_initiated;
        info!(reader = %self.inner.name, client_initiated, "Reconnecting");

        if self.inner.teardown() {
            debug!(reader = %self.inner.name, "Previous session closed");
        }
        self.connect(client_initiated).await
    }

    /// Queue a message for transmission.
    ///
    /// Returns the message id assigned to it, or `None` when the message was
    /// rejected. A rejection is reported to listeners: `ConnectionFailed`
    /// when not connected, `ProtocolError` when the message cannot be framed.
    pub fn send(&self, message: Message) -> Option<u32> {
        self.inner.send(message)
    }

    /// Queue a pre-encoded frame for transmission.
    ///
    /// The frame is decoded first; a frame that does not decode is reported
    /// as `ProtocolError` and dropped.
    pub fn send_raw(&self, frame: &[u8]) -> Option<u32> {
        match Message::decode(frame) {
            Ok(message) => self.inner.send(message),
            Err(e) => {
                self.inner.report_error(ReaderError::from(&e));
                None
            }
        }
    }

    /// Entry point for frames read from the transport.
    pub fn on_wire_message_received(&self, frame: Bytes) {
        self.inner.on_wire_message_received(frame);
    }

    /// Ask the reader for periodic keepalives and start the watchdog.
    ///
    /// Called by `connect(true)`. At most one watchdog runs per session.
    /// Must be called from within a Tokio runtime.
    pub fn enable_heartbeat(&self) {
        let period_ms = self.inner.config.lock().keepalive_period_ms;
        let spec = KeepaliveSpec::periodic(u32::try_from(period_ms).unwrap_or(u32::MAX));

        self.inner.send(Message::set_reader_config(ReaderConfig {
            reset_to_factory_default: false,
            keepalive: Some(spec),
        }));

        let cancel = {
            let mut session = self.inner.session.lock();
            match session.as_mut() {
                Some(session) if !session.watchdog => {
                    session.watchdog = true;
                    session.cancel.clone()
                }
                Some(_) => {
                    debug!(reader = %self.inner.name, "Watchdog already running");
                    return;
                }
                None => return,
            }
        };

        tokio::spawn(watchdog(self.inner.clone(), cancel));
    }
}

impl std::fmt::Debug for ReaderConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderConnection")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish()
    }
}

impl Inner {
    fn is_connected(&self) -> bool {
        self.state.load(Ordering::Acquire) == CONNECTED
    }

    /// Move Connected -> Disconnected and cancel the session.
    ///
    /// Returns `true` only for the caller that performed the transition.
    /// The state only changes while the session slot is locked, so the
    /// session taken here is always the one the transition ended.
    fn teardown(&self) -> bool {
        let session = {
            let mut slot = self.session.lock();
            if self
                .state
                .compare_exchange(CONNECTED, DISCONNECTED, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return false;
            }
            slot.take()
        };

        if let Some(session) = session {
            debug!(reader = %self.name, session = %session.id, "Cancelling session");
            session.cancel.cancel();
        }
        true
    }

    /// End the session because of `error`, reporting it if this call won.
    fn fail(&self, error: ReaderError) {
        if self.teardown() {
            self.report_error(error);
        }
    }

    fn report_error(&self, error: ReaderError) {
        match error.kind {
            ReaderErrorKind::ProtocolError => warn!(reader = %self.name, "{}", error),
            _ => error!(reader = %self.name, "{}", error),
        }
        self.listeners.notify(|l| l.on_error(&self.name, &error));
    }

    async fn open(&self, client_initiated: bool) -> Result<BoxedTransport> {
        let config = {
            let mut config = self.config.lock();
            if config.port.is_none() {
                warn!(reader = %self.name, port = DEFAULT_READER_PORT, "No port configured, using default");
                config.port = Some(DEFAULT_READER_PORT);
            }
            config.clone()
        };

        if !client_initiated {
            return self.pending.lock().take().ok_or_else(|| {
                Error::ConnectionFailed(format!("{}: no reader-initiated transport attached", self.name))
            });
        }

        let address = config
            .address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| Error::ConnectionFailed(format!("{}: no address configured", self.name)))?;
        let port = config.port.unwrap_or(DEFAULT_READER_PORT);
        let timeout = config.connect_timeout();

        info!(reader = %self.name, address, port, "Connecting to reader");

        let stream = match tokio::time::timeout(timeout, TcpStream::connect((address, port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(Error::ConnectionFailed(format!("{address}:{port}: {e}")));
            }
            Err(_) => {
                return Err(Error::ConnectionFailed(format!(
                    "{address}:{port}: timed out after {}ms",
                    timeout.as_millis()
                )));
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            warn!(reader = %self.name, "Failed to set TCP_NODELAY: {}", e);
        }

        Ok(Box::new(stream))
    }

    fn start_session(self: &Arc<Self>, transport: BoxedTransport, client_initiated: bool) {
        let max_frame_size = self.config.lock().max_frame_size;
        let (read_half, write_half) = tokio::io::split(transport);
        let cancel = CancellationToken::new();
        let id = Uuid::new_v4();

        self.outbound.clear();
        self.inbound.clear();
        self.alive.store(false, Ordering::Release);
        self.packets_sent.store(0, Ordering::Relaxed);
        self.packets_received.store(0, Ordering::Relaxed);
        *self.info.lock() = SessionInfo {
            id: Some(id),
            started: Some(Utc::now()),
            client_initiated,
        };
        {
            let mut slot = self.session.lock();
            *slot = Some(Session {
                id,
                cancel: cancel.clone(),
                watchdog: false,
            });
            self.state.store(CONNECTED, Ordering::Release);
        }

        tokio::spawn(outbound_worker(
            self.clone(),
            FramedWrite::new(write_half, FrameCodec::with_max_frame_size(max_frame_size)),
            cancel.clone(),
        ));
        tokio::spawn(inbound_worker(self.clone(), cancel.clone()));
        tokio::spawn(transport_reader(
            self.clone(),
            FramedRead::new(read_half, FrameCodec::with_max_frame_size(max_frame_size)),
            cancel,
        ));

        info!(reader = %self.name, session = %id, client_initiated, "Connected");
    }

    fn send(&self, message: Message) -> Option<u32> {
        if !self.is_connected() {
            self.report_error(ReaderError::connection_failed(format!(
                "{}: cannot send message type {} while disconnected",
                self.name,
                message.message_type()
            )));
            return None;
        }

        let max_frame_size = self.config.lock().max_frame_size;
        if let Err(e) = message.validate(max_frame_size) {
            self.report_error(ReaderError::from(&e));
            return None;
        }

        let id = self.next_message_id.fetch_add(1, Ordering::Relaxed);
        trace!(reader = %self.name, id, message_type = message.message_type(), "Queueing message");
        self.outbound.push(message.with_id(id));
        Some(id)
    }

    fn on_wire_message_received(&self, frame: Bytes) {
        let message = match Message::decode(&frame) {
            Ok(message) => message,
            Err(e) => {
                self.report_error(ReaderError::from(&e));
                return;
            }
        };

        self.packets_received.fetch_add(1, Ordering::Relaxed);

        if message.is_keepalive() {
            trace!(reader = %self.name, id = message.id, "Keepalive");
            self.alive.store(true, Ordering::Release);
            self.send(Message::keepalive_ack());

            if !self.config.lock().report_keepalive {
                return;
            }
        }

        self.inbound.push(frame);
    }
}

type FrameSink = FramedWrite<WriteHalf<BoxedTransport>, FrameCodec>;
type FrameSource = FramedRead<ReadHalf<BoxedTransport>, FrameCodec>;

async fn outbound_worker(inner: Arc<Inner>, mut sink: FrameSink, cancel: CancellationToken) {
    while let Some(message) = inner.outbound.pop(&cancel).await {
        let id = message.id;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = sink.send(message) => result,
        };

        match result {
            Ok(()) => {
                inner.packets_sent.fetch_add(1, Ordering::Relaxed);
                trace!(reader = %inner.name, id, "Message written");
            }
            Err(e) if e.is_io() => {
                if !cancel.is_cancelled() {
                    inner.fail(ReaderError::reader_lost(format!("write failed: {e}")));
                }
                break;
            }
            Err(e) => inner.report_error(ReaderError::from(&e)),
        }
    }

    let close = Duration::from_millis(TRANSPORT_CLOSE_TIMEOUT_MS);
    match tokio::time::timeout(close, sink.close()).await {
        Ok(Ok(())) => debug!(reader = %inner.name, "Transport write half closed"),
        Ok(Err(e)) => debug!(reader = %inner.name, "Error closing transport: {}", e),
        Err(_) => debug!(reader = %inner.name, "Transport close timed out"),
    }
}

async fn inbound_worker(inner: Arc<Inner>, cancel: CancellationToken) {
    while let Some(frame) = inner.inbound.pop(&cancel).await {
        let delivered = inner.listeners.notify(|l| l.on_message(&inner.name, &frame));
        trace!(reader = %inner.name, bytes = frame.len(), delivered, "Frame delivered");
    }
    debug!(reader = %inner.name, "Inbound worker stopped");
}

async fn transport_reader(inner: Arc<Inner>, mut source: FrameSource, cancel: CancellationToken) {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = source.next() => next,
        };

        match next {
            Some(Ok(frame)) => inner.on_wire_message_received(frame),
            Some(Err(e)) => {
                if !cancel.is_cancelled() {
                    inner.fail(ReaderError::reader_lost(format!("read failed: {e}")));
                }
                break;
            }
            None => {
                if !cancel.is_cancelled() {
                    inner.fail(ReaderError::reader_lost("Connection closed by reader"));
                }
                break;
            }
        }
    }
    debug!(reader = %inner.name, "Transport reader stopped");
}

async fn watchdog(inner: Arc<Inner>, cancel: CancellationToken) {
    debug!(reader = %inner.name, "Watchdog started");

    loop {
        let window = inner.config.lock().watchdog_window();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(window) => {}
        }

        if !inner.is_connected() {
            break;
        }

        // Cleared every cycle; only a keepalive inside the next window sets it again.
        if !inner.alive.swap(false, Ordering::AcqRel) {
            warn!(reader = %inner.name, window_ms = window.as_millis() as u64, "No keepalive within window");
            inner.fail(ReaderError::reader_lost("Connection timed out"));
            break;
        }
    }

    debug!(reader = %inner.name, "Watchdog stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_connection_is_disconnected() {
        let reader = ReaderConnection::new("r1");
        assert_eq!(reader.state(), ConnectionState::Disconnected);
        assert_eq!(reader.name(), "r1");
        assert_eq!(reader.queued_outbound(), 0);

        let meta = reader.metadata();
        assert!(!meta.connected);
        assert_eq!(meta.session_id, None);
        assert_eq!(meta.packets_sent, 0);
    }

    #[test]
    fn test_disconnect_without_session() {
        let reader = ReaderConnection::new("r1");
        reader.disconnect();
        reader.disconnect();
        assert_eq!(reader.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_teardown_has_single_winner() {
        let reader = ReaderConnection::new("r1");
        reader.inner.state.store(CONNECTED, Ordering::Release);

        assert!(reader.inner.teardown());
        assert!(!reader.inner.teardown());
        assert!(!reader.is_connected());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_disconnect_racing_connect_keeps_session_consistent() {
        let reader = ReaderConnection::new("r1");
        let mut devices = Vec::new();

        for _ in 0..200 {
            if !reader.is_connected() {
                let (host, device) = tokio::io::duplex(1024);
                devices.push(device);
                reader.attach(host);
                reader.connect(false).await.unwrap();
            }
            let old = match reader.inner.session.lock().as_ref() {
                Some(session) => session.cancel.clone(),
                None => panic!("connected without a session"),
            };

            let (host, device) = tokio::io::duplex(1024);
            devices.push(device);
            reader.attach(host);

            let disconnecting = {
                let reader = reader.clone();
                tokio::spawn(async move { reader.disconnect() })
            };
            let connecting = {
                let reader = reader.clone();
                tokio::spawn(async move { reader.connect(false).await.is_ok() })
            };
            disconnecting.await.unwrap();
            connecting.await.unwrap();

            assert!(old.is_cancelled());
            let slot = reader.inner.session.lock();
            match slot.as_ref() {
                Some(session) => {
                    assert!(reader.is_connected());
                    assert!(!session.cancel.is_cancelled());
                }
                None => assert!(!reader.is_connected()),
            }
        }

        reader.disconnect();
    }

    #[test]
    fn test_setters_reach_metadata() {
        let reader = ReaderConnection::new("r1");
        reader.set_address("10.0.0.5");
        reader.set_port(6000);
        reader.set_keepalive(Duration::from_millis(1500), 4, true);

        let meta = reader.metadata();
        assert_eq!(meta.address.as_deref(), Some("10.0.0.5"));
        assert_eq!(meta.port, Some(6000));
        assert_eq!(meta.keepalive_period_ms, 1500);
        assert_eq!(meta.allowed_misses, 4);
        assert!(meta.report_keepalive);
    }

    #[test]
    fn test_send_while_disconnected_is_rejected() {
        let reader = ReaderConnection::new("r1");
        assert_eq!(reader.send(Message::keepalive_ack()), None);
        assert_eq!(reader.queued_outbound(), 0);
    }
}
