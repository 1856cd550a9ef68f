//! Mock Octane-style reader.

use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

use super::{MockControl, MockHandle};
use crate::drivers::{FeatureSet, SpeedwayDriver, SpeedwayReport, SpeedwaySettings};
use crate::error::DriverResult;

/// Simulated Impinj Speedway reader.
pub struct MockSpeedway {
    control: Arc<MockControl<SpeedwayReport>>,
    name: String,
}

impl MockSpeedway {
    /// Create a mock reporting `name` as its reader name.
    pub fn new(name: impl Into<String>) -> (Self, MockHandle<SpeedwayReport>) {
        let control = MockControl::new();
        let handle = MockHandle {
            control: control.clone(),
        };
        (
            Self {
                control,
                name: name.into(),
            },
            handle,
        )
    }
}

impl SpeedwayDriver for MockSpeedway {
    fn connect(&mut self, address: &str, port: u16) -> DriverResult<()> {
        self.control.connect(format!("connect {address}:{port}"))
    }

    fn disconnect(&mut self) {
        self.control.disconnect();
    }

    fn query_feature_set(&mut self) -> DriverResult<FeatureSet> {
        self.control.query("query_feature_set")?;
        Ok(FeatureSet {
            model_name: "Speedway R420".into(),
            serial_number: "37017090614".into(),
            firmware_version: "5.12.3.240".into(),
            antenna_count: 4,
        })
    }

    fn reader_name(&self) -> String {
        self.name.clone()
    }

    fn apply_settings(&mut self, settings: &SpeedwaySettings) -> DriverResult<()> {
        self.control.ensure_connected()?;
        self.control.record(format!(
            "apply_settings antenna_port={} fast_id={} mode={:?} rf_mode={}",
            settings.include_antenna_port, settings.fast_id, settings.report_mode, settings.rf_mode
        ));
        Ok(())
    }

    fn subscribe(&mut self) -> DriverResult<UnboundedReceiver<SpeedwayReport>> {
        self.control.subscribe()
    }

    fn unsubscribe(&mut self) {
        self.control.unsubscribe();
    }

    fn start(&mut self) -> DriverResult<()> {
        self.control.start("start")
    }

    fn stop(&mut self) -> DriverResult<()> {
        self.control.stop("stop")
    }
}
