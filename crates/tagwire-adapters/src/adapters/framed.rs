//! Adapter for readers speaking the framed reader protocol directly.
//!
//! The adapter owns a [`ReaderConnection`], registers it in the reader
//! registry so that reader-initiated sockets can find it, and turns every
//! TAG_REPORT frame the connection delivers while started into a batch of
//! tags.
//!
//! Properties:
//!
//! | Key                | Default      |
//! |--------------------|--------------|
//! | `IP` / `ip`        | required     |
//! | `Port` / `port`    | 5084         |
//! | `ClientInitiated`  | true         |
//! | `KeepalivePeriod`  | 10000 ms     |
//! | `KeepaliveMisses`  | 3            |
//! | `ReportKeepalive`  | false        |
//! | `Source`           | reader name  |

use bytes::Bytes;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace};

use crate::lifecycle::AdapterCore;
use crate::{AdapterConfig, AdapterState, ReaderAdapter, TagListener};
use tagwire_core::constants::{
    DEFAULT_ALLOWED_KEEPALIVE_MISSES, DEFAULT_KEEPALIVE_PERIOD_MS, DEFAULT_READER_PORT,
};
use tagwire_core::{ReaderError, ReaderErrorKind, Result, Tag};
use tagwire_network::{ConnectionListener, ReaderConnection, ReaderRegistry};
use tagwire_protocol::{Message, MessageBody, TagReportEntry};

#[derive(Debug, Clone, PartialEq, Eq)]
struct FramedSettings {
    address: String,
    port: u16,
    client_initiated: bool,
    keepalive_period_ms: u64,
    keepalive_misses: u32,
    report_keepalive: bool,
    source: String,
}

impl FramedSettings {
    fn parse(name: &str, config: &AdapterConfig) -> Result<Self> {
        let misses = config.u64_or(
            &["KeepaliveMisses"],
            u64::from(DEFAULT_ALLOWED_KEEPALIVE_MISSES),
        );

        Ok(Self {
            address: config.require(&["IP", "ip"])?.to_string(),
            port: config.port(&["Port", "port"], DEFAULT_READER_PORT)?,
            client_initiated: config.bool_or(&["ClientInitiated"], true),
            keepalive_period_ms: config.u64_or(&["KeepalivePeriod"], DEFAULT_KEEPALIVE_PERIOD_MS),
            keepalive_misses: u32::try_from(misses).unwrap_or(u32::MAX),
            report_keepalive: config.bool_or(&["ReportKeepalive"], false),
            source: config.get(&["Source"]).unwrap_or(name).to_string(),
        })
    }
}

/// Connection listener converting tag reports.
struct ReportListener {
    core: Arc<AdapterCore>,
    source: Arc<RwLock<String>>,
}

impl ReportListener {
    fn convert(&self, entry: TagReportEntry) -> Tag {
        let source = self.source.read().clone();
        let mut builder = Tag::builder(entry.epc)
            .origin(source.clone())
            .trace(source)
            .trace(format!("Antenna-{}", entry.antenna_id));

        if let Ok(timestamp) = i64::try_from(entry.timestamp_ms)
            && timestamp > 0
        {
            builder = builder.timestamp(timestamp);
        }
        if let Some(tid) = entry.tid {
            builder = builder.tid_bank(tagwire_core::ident::to_hex(&tid));
        }

        self.core.finish(builder)
    }
}

impl ConnectionListener for ReportListener {
    fn on_message(&self, _reader: &str, frame: &Bytes) {
        let message = match Message::decode(frame) {
            Ok(message) => message,
            Err(e) => {
                debug!(reader = %self.core.name(), "Undecodable frame: {}", e);
                return;
            }
        };

        match message.body {
            MessageBody::TagReport(entries) if !self.core.state().is_started() => {
                trace!(reader = %self.core.name(), count = entries.len(), "Dropping report while not started");
            }
            MessageBody::TagReport(entries) => {
                let tags = entries.into_iter().map(|e| self.convert(e)).collect();
                self.core.emit(tags);
            }
            other => trace!(reader = %self.core.name(), "Ignoring {:?}", other),
        }
    }

    fn on_error(&self, _reader: &str, error: &ReaderError) {
        if error.kind == ReaderErrorKind::ReaderLost {
            self.core.set_state(AdapterState::Disconnected);
        }
        self.core.report_error(error.clone());
    }
}

/// Framed-protocol reader adapter.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use tagwire_adapters::{AdapterConfig, AdapterState, FramedAdapter, ReaderAdapter};
/// use tagwire_network::ReaderRegistry;
///
/// # #[tokio::main]
/// # async fn main() -> tagwire_core::Result<()> {
/// let registry = Arc::new(ReaderRegistry::new());
/// let mut adapter = FramedAdapter::new(registry.clone());
///
/// let config = AdapterConfig::new().with("IP", "10.0.0.5");
/// adapter.initialize("Dock-1", &config).await?;
///
/// assert!(registry.contains("DOCK-1"));
/// assert_eq!(adapter.state(), AdapterState::Disconnected);
/// # Ok(())
/// # }
/// ```
pub struct FramedAdapter {
    core: Arc<AdapterCore>,
    registry: Arc<ReaderRegistry>,
    connection: Option<ReaderConnection>,
    settings: Option<FramedSettings>,
    source: Arc<RwLock<String>>,
}

impl FramedAdapter {
    pub fn new(registry: Arc<ReaderRegistry>) -> Self {
        Self {
            core: Arc::new(AdapterCore::new()),
            registry,
            connection: None,
            settings: None,
            source: Arc::new(RwLock::new(String::new())),
        }
    }

    pub fn core(&self) -> &Arc<AdapterCore> {
        &self.core
    }

    /// The underlying connection, once initialized.
    pub fn connection(&self) -> Option<&ReaderConnection> {
        self.connection.as_ref()
    }

    fn apply(&self, connection: &ReaderConnection, settings: &FramedSettings) {
        connection.set_address(settings.address.clone());
        connection.set_port(settings.port);
        connection.set_keepalive(
            Duration::from_millis(settings.keepalive_period_ms),
            settings.keepalive_misses,
            settings.report_keepalive,
        );
        *self.source.write() = settings.source.clone();
    }
}

impl ReaderAdapter for FramedAdapter {
    async fn initialize(&mut self, name: &str, config: &AdapterConfig) -> Result<()> {
        self.core.set_name(name);

        let settings = FramedSettings::parse(name, config).map_err(|e| self.core.reject_config(e))?;

        let connection = match self.connection.take() {
            Some(connection) if connection.name() == name => connection,
            previous => {
                if let Some(previous) = previous {
                    previous.disconnect();
                    self.registry.remove(previous.name());
                }
                let connection = ReaderConnection::new(name);
                connection.register(Arc::new(ReportListener {
                    core: self.core.clone(),
                    source: self.source.clone(),
                }));
                connection
            }
        };
        self.apply(&connection, &settings);

        let registered =
            self.registry
                .insert(name, &settings.address, settings.port, connection.clone());
        self.connection = Some(connection);
        registered.map_err(|e| self.core.reject_config(e))?;

        debug!(reader = %name, "Configured {}:{}", settings.address, settings.port);
        self.settings = Some(settings);
        self.core.set_configured(true);
        Ok(())
    }

    async fn start(&mut self) {
        if self.core.state().is_started() {
            info!(reader = %self.core.name(), "Reader is already started");
            return;
        }

        if !self.core.state().is_connected() && self.connect_reader().await.is_err() {
            return;
        }

        self.core.set_state(AdapterState::Started);
        info!(reader = %self.core.name(), "Reader started");
    }

    async fn stop(&mut self) {
        if !self.core.state().is_started() {
            info!(reader = %self.core.name(), "Reader is already stopped");
            return;
        }
        self.core.set_state(AdapterState::Stopped);
        info!(reader = %self.core.name(), "Reader stopped");
    }

    async fn connect_reader(&mut self) -> Result<()> {
        let (Some(connection), Some(settings), true) =
            (&self.connection, &self.settings, self.core.is_configured())
        else {
            return Err(self.core.not_configured());
        };

        info!(
            reader = %self.core.name(),
            "Connecting to {}:{}", settings.address, settings.port
        );
        connection.connect(settings.client_initiated).await?;
        self.core.set_state(AdapterState::Connected);
        Ok(())
    }

    async fn disconnect_reader(&mut self) {
        if let Some(connection) = &self.connection {
            connection.disconnect();
        }
        self.core.set_state(AdapterState::Disconnected);
    }

    async fn update(&mut self, config: &AdapterConfig) -> Result<()> {
        let name = self.core.name();
        let settings = match FramedSettings::parse(&name, config) {
            Ok(settings) => settings,
            Err(e) => {
                error!(reader = %name, "Rejected update: {}", e);
                return Err(e);
            }
        };

        if let Some(connection) = &self.connection {
            if let Err(e) =
                self.registry
                    .insert(&name, &settings.address, settings.port, connection.clone())
            {
                error!(reader = %name, "Rejected update: {}", e);
                return Err(e);
            }
            self.apply(connection, &settings);
        }
        self.settings = Some(settings);
        Ok(())
    }

    async fn identify(&mut self, _read_points: &[String]) -> Vec<Tag> {
        debug!(reader = %self.core.name(), "Polled identify is not supported");
        Vec::new()
    }

    fn register(&self, listener: Arc<dyn TagListener>) -> bool {
        self.core.register(listener)
    }

    fn deregister(&self, listener: &Arc<dyn TagListener>) -> bool {
        self.core.deregister(listener)
    }

    fn name(&self) -> String {
        self.core.name()
    }

    fn state(&self) -> AdapterState {
        self.core.state()
    }
}
