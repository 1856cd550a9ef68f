//! Mock vendor drivers for testing and development.
//!
//! Each mock is created together with a [`MockHandle`] that lets a test
//! inject reports, force failures and inspect the calls the adapter made.
//!
//! ```
//! use tagwire_adapters::mock::MockSpeedway;
//! use tagwire_adapters::drivers::SpeedwayDriver;
//!
//! let (mut driver, handle) = MockSpeedway::new("SpeedwayR-11-22-33");
//! driver.connect("10.0.0.5", 5084).unwrap();
//!
//! assert!(handle.is_connected());
//! assert_eq!(handle.calls(), vec!["connect 10.0.0.5:5084"]);
//! ```

mod proton;
mod sensx;
mod speedway;

pub use proton::MockProton;
pub use sensx::MockSensx;
pub use speedway::MockSpeedway;

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::mpsc;

use crate::error::{DriverError, DriverResult};

/// State shared between a mock driver and its handle.
struct MockControl<R> {
    connected: AtomicBool,
    reading: AtomicBool,
    fail_connect: AtomicBool,
    fail_start: AtomicBool,
    fail_identify: AtomicBool,
    subscribe_calls: AtomicUsize,
    sink: Mutex<Option<mpsc::UnboundedSender<R>>>,
    calls: Mutex<Vec<String>>,
}

impl<R> MockControl<R> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            connected: AtomicBool::new(false),
            reading: AtomicBool::new(false),
            fail_connect: AtomicBool::new(false),
            fail_start: AtomicBool::new(false),
            fail_identify: AtomicBool::new(false),
            subscribe_calls: AtomicUsize::new(0),
            sink: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    fn connect(&self, call: String) -> DriverResult<()> {
        self.record(call);
        if self.fail_connect.load(Ordering::Acquire) {
            return Err(DriverError::connection_failed("connection refused"));
        }
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    fn disconnect(&self) {
        self.record("disconnect");
        self.connected.store(false, Ordering::Release);
        self.reading.store(false, Ordering::Release);
    }

    fn ensure_connected(&self) -> DriverResult<()> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(DriverError::NotConnected)
        }
    }

    /// Identity query against a connected reader.
    fn query(&self, call: &str) -> DriverResult<()> {
        self.record(call);
        self.ensure_connected()?;
        if self.fail_identify.load(Ordering::Acquire) {
            return Err(DriverError::rejected(call, "no response"));
        }
        Ok(())
    }

    fn subscribe(&self) -> DriverResult<mpsc::UnboundedReceiver<R>> {
        self.ensure_connected()?;
        self.record("subscribe");
        self.subscribe_calls.fetch_add(1, Ordering::AcqRel);
        let (tx, rx) = mpsc::unbounded_channel();
        *self.sink.lock() = Some(tx);
        Ok(rx)
    }

    fn unsubscribe(&self) {
        self.record("unsubscribe");
        self.sink.lock().take();
    }

    fn start(&self, call: impl Into<String>) -> DriverResult<()> {
        let call = call.into();
        self.record(call.clone());
        self.ensure_connected()?;
        if self.fail_start.load(Ordering::Acquire) {
            return Err(DriverError::rejected(call, "reader busy"));
        }
        self.reading.store(true, Ordering::Release);
        Ok(())
    }

    fn stop(&self, call: impl Into<String>) -> DriverResult<()> {
        self.record(call);
        self.ensure_connected()?;
        self.reading.store(false, Ordering::Release);
        Ok(())
    }
}

/// Test-side control of a mock driver.
pub struct MockHandle<R> {
    control: Arc<MockControl<R>>,
}

impl<R> Clone for MockHandle<R> {
    fn clone(&self) -> Self {
        Self {
            control: self.control.clone(),
        }
    }
}

impl<R> MockHandle<R> {
    /// Deliver a report as the SDK callback thread would.
    ///
    /// Returns `false` when nothing is subscribed.
    pub fn emit(&self, report: R) -> bool {
        match self.control.sink.lock().as_ref() {
            Some(sink) => sink.send(report).is_ok(),
            None => false,
        }
    }

    pub fn fail_connect(&self, fail: bool) {
        self.control.fail_connect.store(fail, Ordering::Release);
    }

    pub fn fail_start(&self, fail: bool) {
        self.control.fail_start.store(fail, Ordering::Release);
    }

    /// Make identity queries after connect fail.
    pub fn fail_identify(&self, fail: bool) {
        self.control.fail_identify.store(fail, Ordering::Release);
    }

    pub fn is_connected(&self) -> bool {
        self.control.connected.load(Ordering::Acquire)
    }

    pub fn is_reading(&self) -> bool {
        self.control.reading.load(Ordering::Acquire)
    }

    /// Whether a report subscription is currently open.
    pub fn is_subscribed(&self) -> bool {
        self.control.sink.lock().is_some()
    }

    /// Number of subscriptions taken over the driver's lifetime.
    pub fn subscribe_calls(&self) -> usize {
        self.control.subscribe_calls.load(Ordering::Acquire)
    }

    /// Driver calls in order, e.g. `"connect 10.0.0.5:5084"`.
    pub fn calls(&self) -> Vec<String> {
        self.control.calls.lock().clone()
    }

    /// Whether any recorded call starts with `prefix`.
    pub fn called(&self, prefix: &str) -> bool {
        self.control.calls.lock().iter().any(|c| c.starts_with(prefix))
    }
}

impl<R> std::fmt::Debug for MockHandle<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockHandle")
            .field("connected", &self.is_connected())
            .field("reading", &self.is_reading())
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}
