//! Adapter for Impinj Speedway readers driven through an Octane-style SDK.
//!
//! Properties: `IP` (required), `Port` (default 5084), `ReadTID` (default
//! false). Connecting queries the reader's feature set; a reader that does
//! not answer is disconnected again. Every start re-applies the reader settings: antenna port in
//! reports, FastId when TIDs are wanted, one report per tag and RF mode
//! 1002 (autoset dense reader).

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::drivers::{
    DriverCell, Pump, ReportMode, SpeedwayDriver, SpeedwayReport, SpeedwaySettings,
};
use crate::lifecycle::AdapterCore;
use crate::{AdapterConfig, AdapterState, ReaderAdapter, TagListener};
use tagwire_core::constants::{DEFAULT_SPEEDWAY_PORT, SPEEDWAY_RF_MODE};
use tagwire_core::{Error, ReaderError, Result, Tag, ident};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    address: String,
    port: u16,
    read_tid: bool,
}

impl Endpoint {
    fn parse(config: &AdapterConfig) -> Result<Self> {
        Ok(Self {
            address: config.require(&["IP", "ip"])?.to_string(),
            port: config.port(&["Port", "port"], DEFAULT_SPEEDWAY_PORT)?,
            read_tid: config.bool_or(&["ReadTID"], false),
        })
    }

    fn settings(&self) -> SpeedwaySettings {
        SpeedwaySettings {
            include_antenna_port: true,
            fast_id: self.read_tid,
            report_mode: ReportMode::Individual,
            rf_mode: SPEEDWAY_RF_MODE,
        }
    }
}

/// Octane-style reader adapter.
pub struct SpeedwayAdapter {
    core: Arc<AdapterCore>,
    driver: DriverCell<dyn SpeedwayDriver>,
    endpoint: Option<Endpoint>,
    pump: Pump,
}

impl SpeedwayAdapter {
    pub fn new(driver: Box<dyn SpeedwayDriver>) -> Self {
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

    async fn start_reading(&mut self, endpoint: Endpoint) -> std::result::Result<(), ReaderError> {
        let settings = endpoint.settings();
        let (reader_name, reports) = self
            .driver
            .call(move |driver| {
                driver.apply_settings(&settings)?;
                let reports = driver.subscribe()?;
                Ok((driver.reader_name(), reports))
            })
            .await
            .map_err(|e| ReaderError::from(&e))?;

        let core = self.core.clone();
        let read_tid = endpoint.read_tid;
        self.pump.start(reports, move |report: SpeedwayReport| {
            let tag = convert(&core, &reader_name, read_tid, report);
            core.emit(vec![tag]);
        });

        if let Err(e) = self.driver.call(|driver| driver.start()).await {
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

fn convert(core: &AdapterCore, reader_name: &str, read_tid: bool, report: SpeedwayReport) -> Tag {
    let mut builder = Tag::builder(report.epc)
        .origin(reader_name)
        .trace(reader_name)
        .trace(format!("Antenna-{}", report.antenna_port));

    if let Some(timestamp) = report.first_seen_ms {
        builder = builder.timestamp(timestamp);
    }
    if read_tid && let Some(tid) = report.tid {
        builder = builder.tid_bank(ident::to_hex(&tid));
    }

    core.finish(builder)
}

impl ReaderAdapter for SpeedwayAdapter {
    async fn initialize(&mut self, name: &str, config: &AdapterConfig) -> Result<()> {
        self.core.set_name(name);
        let endpoint = Endpoint::parse(config).map_err(|e| self.core.reject_config(e))?;

        debug!(
            reader = %name,
            "Speedway at {}:{}, ReadTID={}", endpoint.address, endpoint.port, endpoint.read_tid
        );
        self.endpoint = Some(endpoint);
        self.core.set_configured(true);
        Ok(())
    }

    async fn start(&mut self) {
        let name = self.core.name();
        debug!(reader = %name, "Starting Speedway reader");

        if self.core.state().is_started() {
            info!(reader = %name, "Speedway is already started");
            return;
        }

        if !self.core.state().is_connected() && self.connect_reader().await.is_err() {
            return;
        }

        let Some(endpoint) = self.endpoint.clone() else {
            return;
        };

        match self.start_reading(endpoint).await {
            Ok(()) => {
                self.core.set_state(AdapterState::Started);
                info!(reader = %name, "Speedway reader started");
            }
            Err(e) => {
                error!(reader = %name, "Failed to start reader: {}", e.message);
                self.core.set_state(AdapterState::Stopped);
                self.core.report_error(e);
            }
        }
    }

    async fn stop(&mut self) {
        let name = self.core.name();
        if !self.core.state().is_started() {
            info!(reader = %name, "Speedway is already stopped");
            return;
        }

        self.pump.stop();
        let result = self
            .driver
            .call(|driver| {
                driver.unsubscribe();
                driver.stop()
            })
            .await;
        if let Err(e) = result {
            error!(reader = %name, "Failed to stop reader: {}", e);
        }

        self.core.set_state(AdapterState::Stopped);
        info!(reader = %name, "Speedway reader stopped");
    }

    async fn connect_reader(&mut self) -> Result<()> {
        let Some(endpoint) = self.endpoint.clone().filter(|_| self.core.is_configured()) else {
            return Err(self.core.not_configured());
        };

        let name = self.core.name();
        info!(reader = %name, "Connecting to {}:{}", endpoint.address, endpoint.port);
        let result = self
            .driver
            .call(move |driver| {
                driver.connect(&endpoint.address, endpoint.port)?;
                driver.query_feature_set().inspect_err(|_| driver.disconnect())
            })
            .await;

        match result {
            Ok(features) => {
                info!(
                    reader = %name,
                    antennas = features.antenna_count,
                    "Model {}, serial {}, firmware {}",
                    features.model_name, features.serial_number, features.firmware_version
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
                driver.disconnect();
                Ok(())
            })
            .await;
        if let Err(e) = result {
            error!(reader = %self.core.name(), "Failed to disconnect: {}", e);
        }
        self.core.set_state(AdapterState::Disconnected);
    }

    async fn update(&mut self, config: &AdapterConfig) -> Result<()> {
        let endpoint = Endpoint::parse(config).inspect_err(|e| {
            error!(reader = %self.core.name(), "Rejected update: {}", e);
        })?;
        // settings are re-applied at the next start
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
