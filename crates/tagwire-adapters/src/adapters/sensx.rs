//! Adapter for SensThys SensX readers.
//!
//! Properties: `IP`/`ip` and `Port`/`port`, both required. The SDK has no
//! connect call, so connecting runs the identity queries and the reader
//! counts as connected once all of them answered. Each start sets the
//! reader clock to the current UTC time first.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::drivers::{DriverCell, Pump, SensxDriver, SensxReport};
use crate::lifecycle::AdapterCore;
use crate::{AdapterConfig, AdapterState, ReaderAdapter, TagListener};
use tagwire_core::constants::SENSX_CLOCK_FORMAT;
use tagwire_core::{Error, ReaderError, Result, Tag, ident};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    address: String,
    port: u16,
}

#[derive(Debug)]
struct Identity {
    hardware_id: String,
    firmware_id: String,
    serial_number: String,
    reader_name: String,
}

/// SensX-style reader adapter.
pub struct SensxAdapter {
    core: Arc<AdapterCore>,
    driver: DriverCell<dyn SensxDriver>,
    endpoint: Option<Endpoint>,
    pump: Pump,
}

impl SensxAdapter {
    pub fn new(driver: Box<dyn SensxDriver>) -> Self {
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

    async fn configure(&self, endpoint: &Endpoint) {
        let (address, port) = (endpoint.address.clone(), endpoint.port);
        let result = self
            .driver
            .call(move |driver| {
                driver.configure(&address, port);
                Ok(())
            })
            .await;
        if let Err(e) = result {
            error!(reader = %self.core.name(), "Failed to configure endpoint: {}", e);
        }
    }

    async fn start_reading(&mut self) -> std::result::Result<(), ReaderError> {
        let timestamp = Utc::now().format(SENSX_CLOCK_FORMAT).to_string();
        debug!(reader = %self.core.name(), "Setting reader date-time to {}", timestamp);

        let reports = self
            .driver
            .call(move |driver| {
                driver.set_date_time(&timestamp)?;
                driver.subscribe()
            })
            .await
            .map_err(|e| ReaderError::from(&e))?;

        let core = self.core.clone();
        self.pump.start(reports, move |report: SensxReport| {
            if let Some(tag) = convert(&core, report) {
                core.emit(vec![tag]);
            }
        });

        if let Err(e) = self.driver.call(|driver| driver.start_continuous_read()).await {
            self.pump.stop();
            let cleanup = self
                .driver
                .call(|driver| {
                    driver.unsubscribe();
                    Ok(())
                })
                .await;
            if let Err(unsubscribe) = cleanup {
                warn!(reader = %self.core.name(), "Failed to unsubscribe: {}", unsubscribe);
            }
            return Err(ReaderError::from(&e));
        }
        Ok(())
    }
}

/// The EPC arrives as dashed hex, e.g. `30-08-33-B2`.
fn convert(core: &AdapterCore, report: SensxReport) -> Option<Tag> {
    let epc = match ident::parse_hex(&report.epc) {
        Ok(epc) => epc,
        Err(e) => {
            debug!(reader = %core.name(), "Dropping read: {}", e);
            return None;
        }
    };

    let name = core.name();
    let builder = Tag::builder(epc)
        .origin(name)
        .trace(format!("Antenna {}", report.antenna))
        .timestamp(report.timestamp_ms);

    Some(core.finish(builder))
}

impl ReaderAdapter for SensxAdapter {
    async fn initialize(&mut self, name: &str, config: &AdapterConfig) -> Result<()> {
        self.core.set_name(name);

        let parsed = config
            .require(&["IP", "ip"])
            .and_then(|address| {
                Ok(Endpoint {
                    address: address.to_string(),
                    port: config.require_port(&["Port", "port"])?,
                })
            })
            .map_err(|e| self.core.reject_config(e))?;

        debug!(reader = %name, "SensX at {}:{}", parsed.address, parsed.port);
        self.configure(&parsed).await;

        self.endpoint = Some(parsed);
        self.core.set_configured(true);
        Ok(())
    }

    async fn start(&mut self) {
        let name = self.core.name();
        debug!(reader = %name, "Starting SensX reader");

        if self.core.state().is_started() {
            info!(reader = %name, "SensX is already started");
            return;
        }

        if !self.core.state().is_connected() && self.connect_reader().await.is_err() {
            return;
        }

        match self.start_reading().await {
            Ok(()) => {
                self.core.set_state(AdapterState::Started);
                info!(reader = %name, "SensX reader started");
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
            info!(reader = %name, "SensX is already stopped");
            return;
        }

        self.pump.stop();
        let result = self
            .driver
            .call(|driver| {
                driver.unsubscribe();
                driver.stop_continuous_read()
            })
            .await;
        if let Err(e) = result {
            error!(reader = %name, "Failed to stop continuous read: {}", e);
        }

        self.core.set_state(AdapterState::Stopped);
        info!(reader = %name, "SensX reader stopped");
    }

    async fn connect_reader(&mut self) -> Result<()> {
        if self.endpoint.is_none() || !self.core.is_configured() {
            return Err(self.core.not_configured());
        }

        let result = self
            .driver
            .call(|driver| {
                Ok(Identity {
                    hardware_id: driver.hardware_id()?,
                    firmware_id: driver.firmware_id()?,
                    serial_number: driver.serial_number()?,
                    reader_name: driver.reader_name()?,
                })
            })
            .await;

        match result {
            Ok(identity) => {
                info!(
                    reader = %self.core.name(),
                    hardware_id = %identity.hardware_id,
                    firmware_id = %identity.firmware_id,
                    serial = %identity.serial_number,
                    "Connected to SensX reader {}", identity.reader_name
                );
                self.core.set_state(AdapterState::Connected);
                Ok(())
            }
            Err(e) => {
                self.core.set_state(AdapterState::Disconnected);
                self.core.report_error(ReaderError::connection_failed(e.to_string()));
                Err(Error::ConnectionFailed(e.to_string()))
            }
        }
    }

    /// Stops reading first when started.
    async fn disconnect_reader(&mut self) {
        if self.core.state().is_started() {
            self.stop().await;
        }

        let result = self
            .driver
            .call(|driver| {
                driver.shutdown();
                Ok(())
            })
            .await;
        if let Err(e) = result {
            error!(reader = %self.core.name(), "Failed to shut down reader: {}", e);
        }
        self.core.set_state(AdapterState::Disconnected);
    }

    async fn update(&mut self, config: &AdapterConfig) -> Result<()> {
        let address = config.require(&["IP", "ip"])?.to_string();
        let port = config.require_port(&["Port", "port"])?;
        if self.endpoint.as_ref().is_some_and(|e| e.address == address && e.port == port) {
            return Ok(());
        }

        // takes effect at the next connect
        let endpoint = Endpoint { address, port };
        self.configure(&endpoint).await;
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
