//! Mock CAEN-style reader.

use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

use super::{MockControl, MockHandle};
use crate::drivers::{InventoryFlags, ProtonDriver, ProtonReaderInfo, ProtonReport};
use crate::error::{DriverError, DriverResult};

/// Simulated CAEN Proton reader exposing a fixed set of logical sources.
pub struct MockProton {
    control: Arc<MockControl<ProtonReport>>,
    sources: Vec<String>,
}

impl MockProton {
    pub fn new<S: Into<String>>(
        sources: impl IntoIterator<Item = S>,
    ) -> (Self, MockHandle<ProtonReport>) {
        let control = MockControl::new();
        let handle = MockHandle {
            control: control.clone(),
        };
        (
            Self {
                control,
                sources: sources.into_iter().map(Into::into).collect(),
            },
            handle,
        )
    }
}

impl ProtonDriver for MockProton {
    fn connect(&mut self, address: &str, port: u16) -> DriverResult<()> {
        self.control.connect(format!("connect {address}:{port}"))
    }

    fn disconnect(&mut self) -> DriverResult<()> {
        self.control.disconnect();
        Ok(())
    }

    fn reader_info(&mut self) -> DriverResult<ProtonReaderInfo> {
        self.control.query("reader_info")?;
        Ok(ProtonReaderInfo {
            model: "R4300P".into(),
            serial_number: "1044".into(),
        })
    }

    fn firmware_release(&mut self) -> DriverResult<String> {
        self.control.query("firmware_release")?;
        Ok("4.3.3".into())
    }

    fn check_source(&self, source: &str) -> DriverResult<()> {
        if self.sources.iter().any(|s| s == source) {
            Ok(())
        } else {
            Err(DriverError::invalid_source(source))
        }
    }

    fn subscribe(&mut self) -> DriverResult<UnboundedReceiver<ProtonReport>> {
        self.control.subscribe()
    }

    fn unsubscribe(&mut self) {
        self.control.unsubscribe();
    }

    fn start_inventory(&mut self, source: &str, flags: InventoryFlags) -> DriverResult<()> {
        self.check_source(source)?;
        self.control.start(format!(
            "inventory {source} rssi={} framed={} continuous={}",
            flags.rssi, flags.framed, flags.continuous
        ))
    }

    fn abort_inventory(&mut self) -> DriverResult<()> {
        self.control.stop("abort_inventory")
    }
}
