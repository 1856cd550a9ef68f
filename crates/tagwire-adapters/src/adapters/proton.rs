//! Adapter for CAEN RFID Proton readers.
//!
//! Properties: `IP` and `Port` (both required), `Sources` (comma list of
//! logical sources, default `Source_0`). Connecting asks for the reader
//! info and firmware release before the reader counts as connected.
//! Starting runs a continuous framed inventory with RSSI on every source.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::drivers::{DriverCell, InventoryFlags, ProtonDriver, ProtonReport, Pump};
use crate::lifecycle::AdapterCore;
use crate::{AdapterConfig, AdapterState, ReaderAdapter, TagListener};
use tagwire_core::constants::DEFAULT_PROTON_SOURCE;
use tagwire_core::{Error, ReaderError, Result, Tag, ident};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    address: String,
    port: u16,
    sources: Vec<String>,
}

impl Endpoint {
    fn parse(config: &AdapterConfig) -> Result<Self> {
        let mut sources = config.list(&["Sources"]);
        if sources.is_empty() {
            sources.push(DEFAULT_PROTON_SOURCE.to_string());
        }

        Ok(Self {
            address: config.require(&["IP", "ip"])?.to_string(),
            port: config.require_port(&["Port", "port"])?,
            sources,
        })
    }
}

/// CAEN-style reader adapter.
pub struct ProtonAdapter {
    core: Arc<AdapterCore>,
    driver: DriverCell<dyn ProtonDriver>,
    endpoint: Option<Endpoint>,
    pump: Pump,
}

impl ProtonAdapter {
    pub fn new(driver: Box<dyn ProtonDriver>) -> Self {
        Self {
            core: Arc::new(AdapterCore::new()),
            driver: DriverCell::new(driver),
            endpoint: None,
            pump: Pump::default(),
        }
    }

    pub fn core(&self) -> &Arc<AdapterCore> {
        &self.core
    }

    /// Unknown sources are logged only; the reader reports them at start.
    async fn check_sources(&self, sources: &[String]) {
        for source in sources {
            let name = source.clone();
            if let Err(e) = self.driver.call(move |driver| driver.check_source(&name)).await {
                error!(reader = %self.core.name(), "Invalid source ({}): {}", source, e);
            }
        }
    }

    async fn start_reading(&mut self, sources: Vec<String>) -> std::result::Result<(), ReaderError> {
        let reports = self
            .driver
            .call(|driver| driver.subscribe())
            .await
            .map_err(|e| ReaderError::from(&e))?;

        let core = self.core.clone();
        self.pump.start(reports, move |report: ProtonReport| {
            let tag = convert(&core, report);
            core.emit(vec![tag]);
        });

        let name = self.core.name();
        let result = self
            .driver
            .call(move |driver| {
                for source in &sources {
                    driver.start_inventory(source, InventoryFlags::CONTINUOUS_RSSI)?;
                    debug!(reader = %name, "Continuous read on {}", source);
                }
                Ok(())
            })
            .await;

        if let Err(e) = result {
            self.pump.stop();
            let cleanup = self
                .driver
                .call(|driver| {
                    driver.unsubscribe();
                    driver.abort_inventory()
                })
                .await;
            if let Err(abort) = cleanup {
                warn!(reader = %self.core.name(), "Failed to abort inventory: {}", abort);
            }
            return Err(ReaderError::from(&e));
        }
        Ok(())
    }
}

fn convert(core: &AdapterCore, report: ProtonReport) -> Tag {
    let mut builder = Tag::builder(report.epc)
        .origin(report.source)
        .trace(report.read_point)
        .timestamp(report.timestamp_ms);

    if let Some(tid) = report.tid {
        builder = builder.tid_bank(ident::to_hex(&tid));
    }

    core.finish(builder)
}

impl ReaderAdapter for ProtonAdapter {
    async fn initialize(&mut self, name: &str, config: &AdapterConfig) -> Result<()> {
        self.core.set_name(name);
        let endpoint = Endpoint::parse(config).map_err(|e| self.core.reject_config(e))?;

        self.check_sources(&endpoint.sources).await;
        debug!(
            reader = %name,
            "Proton at {}:{}, sources {:?}", endpoint.address, endpoint.port, endpoint.sources
        );

        self.endpoint = Some(endpoint);
        self.core.set_configured(true);
        Ok(())
    }

    async fn start(&mut self) {
        let name = self.core.name();
        debug!(reader = %name, "Starting Proton reader");

        if self.core.state().is_started() {
            info!(reader = %name, "Proton is already started");
            return;
        }

        if !self.core.state().is_connected() && self.connect_reader().await.is_err() {
            return;
        }

        let Some(endpoint) = self.endpoint.clone() else {
            return;
        };

        match self.start_reading(endpoint.sources).await {
            Ok(()) => {
                self.core.set_state(AdapterState::Started);
                info!(reader = %name, "Proton reader started");
            }
            Err(e) => {
                error!(reader = %name, "Failed to start continuous read: {}", e.message);
                self.core.set_state(AdapterState::Stopped);
                self.core.report_error(e);
            }
        }
    }

    async fn stop(&mut self) {
        let name = self.core.name();
        if !self.core.state().is_started() {
            info!(reader = %name, "Proton is already stopped");
            return;
        }

        self.pump.stop();
        let result = self
            .driver
            .call(|driver| {
                driver.unsubscribe();
                driver.abort_inventory()
            })
            .await;
        if let Err(e) = result {
            error!(reader = %name, "Failed to stop continuous read: {}", e);
        }

        self.core.set_state(AdapterState::Stopped);
        info!(reader = %name, "Proton reader stopped");
    }

    async fn connect_reader(&mut self) -> Result<()> {
        let Some(endpoint) = self.endpoint.clone().filter(|_| self.core.is_configured()) else {
            return Err(self.core.not_configured());
        };

        let name = self.core.name();
        info!(reader = %name, "Connecting to {} TCP port {}", endpoint.address, endpoint.port);
        let reader = name.clone();
        let result = self
            .driver
            .call(move |driver| {
                driver.connect(&endpoint.address, endpoint.port)?;
                let identity = driver
                    .reader_info()
                    .and_then(|info| Ok((info, driver.firmware_release()?)));
                if identity.is_err()
                    && let Err(e) = driver.disconnect()
                {
                    warn!(reader = %reader, "Failed to disconnect after identity query: {}", e);
                }
                identity
            })
            .await;

        match result {
            Ok((info, firmware)) => {
                info!(
                    reader = %name,
                    "Model {}, serial {}, firmware {}", info.model, info.serial_number, firmware
                );
                self.core.set_state(AdapterState::Connected);
                Ok(())
            }
            Err(e) => {
                error!(reader = %name, "Failed to connect: {}", e);
                self.core.set_state(AdapterState::Disconnected);
                self.core.report_error(ReaderError::connection_failed(e.to_string()));
                Err(Error::ConnectionFailed(e.to_string()))
            }
        }
    }

    async fn disconnect_reader(&mut self) {
        self.pump.stop();
        let result = self
            .driver
            .call(|driver| {
                driver.unsubscribe();
                driver.disconnect()
            })
            .await;
        if let Err(e) = result {
            error!(reader = %self.core.name(), "Failed to disconnect: {}", e);
        }

        info!(reader = %self.core.name(), "Disconnected");
        self.core.set_state(AdapterState::Disconnected);
    }

    async fn update(&mut self, config: &AdapterConfig) -> Result<()> {
        let endpoint = Endpoint::parse(config).inspect_err(|e| {
            error!(reader = %self.core.name(), "Rejected update: {}", e);
        })?;
        self.check_sources(&endpoint.sources).await;
        self.endpoint = Some(endpoint);
        Ok(())
    }

    async fn identify(&mut self, _read_points: &[String]) -> Vec<Tag> {
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
