//! Mock SensX-style reader.

use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

use super::{MockControl, MockHandle};
use crate::drivers::{SensxDriver, SensxReport};
use crate::error::DriverResult;

/// Simulated SensThys SensX reader.
///
/// The first identity query opens the session; `fail_connect` makes it fail.
pub struct MockSensx {
    control: Arc<MockControl<SensxReport>>,
    endpoint: String,
}

impl MockSensx {
    pub fn new() -> (Self, MockHandle<SensxReport>) {
        let control = MockControl::new();
        let handle = MockHandle {
            control: control.clone(),
        };
        (
            Self {
                control,
                endpoint: String::new(),
            },
            handle,
        )
    }
}

impl Default for MockSensx {
    fn default() -> Self {
        Self::new().0
    }
}

impl SensxDriver for MockSensx {
    fn configure(&mut self, address: &str, port: u16) {
        self.endpoint = format!("{address}:{port}");
        self.control.record(format!("configure {}", self.endpoint));
    }

    fn hardware_id(&mut self) -> DriverResult<String> {
        self.control.connect("hardware_id".into())?;
        Ok("SX-HW-2".into())
    }

    fn firmware_id(&mut self) -> DriverResult<String> {
        self.control.ensure_connected()?;
        self.control.record("firmware_id");
        Ok("4.1.7".into())
    }

    fn serial_number(&mut self) -> DriverResult<String> {
        self.control.ensure_connected()?;
        self.control.record("serial_number");
        Ok("000123".into())
    }

    fn reader_name(&mut self) -> DriverResult<String> {
        self.control.ensure_connected()?;
        self.control.record("reader_name");
        Ok("SensX EXTREME".into())
    }

    fn set_date_time(&mut self, timestamp: &str) -> DriverResult<()> {
        self.control.ensure_connected()?;
        self.control.record(format!("set_date_time {timestamp}"));
        Ok(())
    }

    fn subscribe(&mut self) -> DriverResult<UnboundedReceiver<SensxReport>> {
        self.control.subscribe()
    }

    fn unsubscribe(&mut self) {
        self.control.unsubscribe();
    }

    fn start_continuous_read(&mut self) -> DriverResult<()> {
        self.control.start("start_continuous_read")
    }

    fn stop_continuous_read(&mut self) -> DriverResult<()> {
        self.control.stop("stop_continuous_read")
    }

    fn shutdown(&mut self) {
        self.control.disconnect();
    }
}
