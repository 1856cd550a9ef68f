//! Vendor SDK driver interfaces.
//!
//! Each vendor ships a blocking client library. A driver trait captures the
//! calls an adapter needs from it, so that a binding to the real SDK and the
//! in-process mocks are interchangeable. Drivers are synchronous and object
//! safe; adapters keep them behind a mutex and call them on the blocking
//! thread pool through [`DriverCell`].
//!
//! Reports flow the other way: `subscribe` hands out a channel the SDK's
//! callback thread feeds, and a [`Pump`] task drains it into the adapter's
//! tag conversion while the adapter is started.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::error::DriverResult;

/// Report mode of an Octane-style reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    /// One report per tag read.
    Individual,
    /// Reports batched until the reader is stopped.
    BatchAfterStop,
}

/// Settings applied before every start of an Octane-style reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeedwaySettings {
    pub include_antenna_port: bool,
    /// Read the TID bank along with the EPC.
    pub fast_id: bool,
    pub report_mode: ReportMode,
    pub rf_mode: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeedwayReport {
    pub epc: Vec<u8>,
    pub antenna_port: u16,
    /// Present when FastId was enabled.
    pub tid: Option<Vec<u8>>,
    pub first_seen_ms: Option<i64>,
}

/// What an Octane-style reader reports about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSet {
    pub model_name: String,
    pub serial_number: String,
    pub firmware_version: String,
    pub antenna_count: u16,
}

/// Impinj Octane-style client.
pub trait SpeedwayDriver: Send {
    fn connect(&mut self, address: &str, port: u16) -> DriverResult<()>;
    fn disconnect(&mut self);
    fn query_feature_set(&mut self) -> DriverResult<FeatureSet>;
    /// Name the reader reports for itself.
    fn reader_name(&self) -> String;
    fn apply_settings(&mut self, settings: &SpeedwaySettings) -> DriverResult<()>;
    fn subscribe(&mut self) -> DriverResult<UnboundedReceiver<SpeedwayReport>>;
    fn unsubscribe(&mut self);
    fn start(&mut self) -> DriverResult<()>;
    fn stop(&mut self) -> DriverResult<()>;
}

/// Inventory options of a CAEN-style logical source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventoryFlags {
    pub rssi: bool,
    pub framed: bool,
    pub continuous: bool,
}

impl InventoryFlags {
    pub const CONTINUOUS_RSSI: Self = Self {
        rssi: true,
        framed: true,
        continuous: true,
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtonReport {
    pub epc: Vec<u8>,
    /// Logical source that ran the inventory.
    pub source: String,
    /// Antenna the tag was seen on.
    pub read_point: String,
    pub rssi: i16,
    pub tid: Option<Vec<u8>>,
    /// Reader clock at the time of the read.
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtonReaderInfo {
    pub model: String,
    pub serial_number: String,
}

/// CAEN RFID-style client.
pub trait ProtonDriver: Send {
    fn connect(&mut self, address: &str, port: u16) -> DriverResult<()>;
    fn disconnect(&mut self) -> DriverResult<()>;
    fn reader_info(&mut self) -> DriverResult<ProtonReaderInfo>;
    fn firmware_release(&mut self) -> DriverResult<String>;
    /// Check that the reader exposes the named logical source.
    fn check_source(&self, source: &str) -> DriverResult<()>;
    fn subscribe(&mut self) -> DriverResult<UnboundedReceiver<ProtonReport>>;
    fn unsubscribe(&mut self);
    fn start_inventory(&mut self, source: &str, flags: InventoryFlags) -> DriverResult<()>;
    fn abort_inventory(&mut self) -> DriverResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensxReport {
    /// EPC as the reader prints it, e.g. `30-08-33-B2`.
    pub epc: String,
    pub antenna: u16,
    pub timestamp_ms: i64,
}

/// SensThys SensX-style client.
///
/// The SDK has no explicit connect call; the session is opened by the first
/// query against the configured endpoint.
pub trait SensxDriver: Send {
    fn configure(&mut self, address: &str, port: u16);
    fn hardware_id(&mut self) -> DriverResult<String>;
    fn firmware_id(&mut self) -> DriverResult<String>;
    fn serial_number(&mut self) -> DriverResult<String>;
    fn reader_name(&mut self) -> DriverResult<String>;
    /// Set the reader clock; `timestamp` is UTC in `%Y-%m-%dT%H:%M:%S`.
    fn set_date_time(&mut self, timestamp: &str) -> DriverResult<()>;
    fn subscribe(&mut self) -> DriverResult<UnboundedReceiver<SensxReport>>;
    fn unsubscribe(&mut self);
    fn start_continuous_read(&mut self) -> DriverResult<()>;
    fn stop_continuous_read(&mut self) -> DriverResult<()>;
    fn shutdown(&mut self);
}

/// Shared, mutex-guarded driver handle.
pub(crate) struct DriverCell<D: ?Sized> {
    inner: Arc<Mutex<Box<D>>>,
}

impl<D: ?Sized + Send + 'static> DriverCell<D> {
    pub fn new(driver: Box<D>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(driver)),
        }
    }

    /// Run `f` against the driver on the blocking thread pool.
    pub async fn call<R, F>(&self, f: F) -> DriverResult<R>
    where
        F: FnOnce(&mut D) -> DriverResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let mut driver = inner.lock();
            f(&mut **driver)
        })
        .await?
    }
}

/// Task forwarding one subscription's reports to a handler.
#[derive(Debug, Default)]
pub(crate) struct Pump {
    task: Option<JoinHandle<()>>,
}

impl Pump {
    pub fn start<R, F>(&mut self, mut reports: UnboundedReceiver<R>, mut handle: F)
    where
        R: Send + 'static,
        F: FnMut(R) + Send + 'static,
    {
        self.stop();
        self.task = Some(tokio::spawn(async move {
            while let Some(report) = reports.recv().await {
                handle(report);
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for Pump {
    fn drop(&mut self) {
        self.stop();
    }
}

type Make<D> = Box<dyn Fn() -> Box<D> + Send + Sync>;

/// Constructors for vendor drivers, keyed by family.
///
/// Deployments register the SDK bindings they link against; a family
/// without a registered driver cannot be instantiated.
#[derive(Default)]
pub struct DriverFactory {
    speedway: Option<Make<dyn SpeedwayDriver>>,
    proton: Option<Make<dyn ProtonDriver>>,
    sensx: Option<Make<dyn SensxDriver>>,
}

impl DriverFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_speedway(
        mut self,
        make: impl Fn() -> Box<dyn SpeedwayDriver> + Send + Sync + 'static,
    ) -> Self {
        self.speedway = Some(Box::new(make));
        self
    }

    pub fn with_proton(
        mut self,
        make: impl Fn() -> Box<dyn ProtonDriver> + Send + Sync + 'static,
    ) -> Self {
        self.proton = Some(Box::new(make));
        self
    }

    pub fn with_sensx(
        mut self,
        make: impl Fn() -> Box<dyn SensxDriver> + Send + Sync + 'static,
    ) -> Self {
        self.sensx = Some(Box::new(make));
        self
    }

    pub fn speedway(&self) -> Option<Box<dyn SpeedwayDriver>> {
        self.speedway.as_ref().map(|make| make())
    }

    pub fn proton(&self) -> Option<Box<dyn ProtonDriver>> {
        self.proton.as_ref().map(|make| make())
    }

    pub fn sensx(&self) -> Option<Box<dyn SensxDriver>> {
        self.sensx.as_ref().map(|make| make())
    }
}

impl std::fmt::Debug for DriverFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverFactory")
            .field("speedway", &self.speedway.is_some())
            .field("proton", &self.proton.is_some())
            .field("sensx", &self.sensx.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriverError;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct Counter(u32);

    #[tokio::test]
    async fn test_driver_cell_runs_on_blocking_pool() {
        let cell: DriverCell<Counter> = DriverCell::new(Box::new(Counter(0)));

        for _ in 0..3 {
            cell.call(|c| {
                c.0 += 1;
                Ok(())
            })
            .await
            .unwrap();
        }

        assert_eq!(cell.call(|c| Ok(c.0)).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_driver_cell_propagates_errors() {
        let cell: DriverCell<Counter> = DriverCell::new(Box::new(Counter(0)));
        let result: DriverResult<()> = cell.call(|_| Err(DriverError::NotConnected)).await;
        assert_eq!(result, Err(DriverError::NotConnected));
    }

    #[tokio::test]
    async fn test_driver_panic_becomes_task_failed() {
        let cell: DriverCell<Counter> = DriverCell::new(Box::new(Counter(0)));

        let result: DriverResult<()> = cell.call(|_| panic!("sdk crashed")).await;
        assert!(matches!(result, Err(DriverError::TaskFailed { .. })));

        // the driver stays usable after a crashed call
        assert_eq!(cell.call(|c| Ok(c.0)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_pump_forwards_until_stopped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let mut pump = Pump::default();

        pump.start(rx, move |n: u32| {
            let _ = out_tx.send(n * 2);
        });
        tx.send(21).unwrap();

        let doubled = tokio::time::timeout(Duration::from_secs(1), out_rx.recv())
            .await
            .unwrap();
        assert_eq!(doubled, Some(42));
        assert!(pump.is_running());

        pump.stop();
        tokio::task::yield_now().await;
        assert!(!pump.is_running());
    }

    #[test]
    fn test_factory_without_drivers() {
        let factory = DriverFactory::new();
        assert!(factory.speedway().is_none());
        assert!(factory.proton().is_none());
        assert!(factory.sensx().is_none());
    }
}
