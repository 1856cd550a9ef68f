//! Enum wrapper for reader adapter dispatch.
//!
//! Native `async fn` in traits is not object safe, so adapters of different
//! families cannot be kept as `Box<dyn ReaderAdapter>`. [`AnyReaderAdapter`]
//! gives the middleware one concrete type for any configured reader, chosen
//! at runtime from the reader's [`ReaderKind`].
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use tagwire_adapters::{AnyReaderAdapter, DriverFactory, ReaderKind};
//! use tagwire_network::ReaderRegistry;
//!
//! let kind: ReaderKind = "llrp".parse().unwrap();
//! let adapter = AnyReaderAdapter::create(
//!     kind,
//!     &DriverFactory::new(),
//!     Arc::new(ReaderRegistry::new()),
//! )
//! .unwrap();
//!
//! assert_eq!(adapter.kind(), ReaderKind::Framed);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::adapters::{FramedAdapter, ProtonAdapter, SensxAdapter, SpeedwayAdapter};
use crate::identity::IdentityResolver;
use crate::lifecycle::AdapterCore;
use crate::{AdapterConfig, AdapterState, DriverFactory, ReaderAdapter, TagListener};
use tagwire_core::{Error, Result, Tag};
use tagwire_network::ReaderRegistry;

/// Reader family, as named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ReaderKind {
    /// Framed reader protocol over TCP.
    Framed,
    /// Impinj Speedway through an Octane-style SDK.
    Speedway,
    /// CAEN RFID Proton.
    Proton,
    /// SensThys SensX.
    Sensx,
}

impl FromStr for ReaderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "framed" | "llrp" => Ok(Self::Framed),
            "speedway" | "impinj" => Ok(Self::Speedway),
            "proton" | "caen" => Ok(Self::Proton),
            "sensx" | "sensthys" => Ok(Self::Sensx),
            other => Err(Error::Config(format!("Unknown reader kind: {other}"))),
        }
    }
}

impl fmt::Display for ReaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Framed => write!(f, "framed"),
            Self::Speedway => write!(f, "speedway"),
            Self::Proton => write!(f, "proton"),
            Self::Sensx => write!(f, "sensx"),
        }
    }
}

/// Any supported reader adapter.
#[non_exhaustive]
pub enum AnyReaderAdapter {
    Framed(FramedAdapter),
    Speedway(SpeedwayAdapter),
    Proton(ProtonAdapter),
    Sensx(SensxAdapter),
}

impl AnyReaderAdapter {
    /// Instantiate an adapter of the given family.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when `drivers` has no driver for a vendor
    /// family.
    pub fn create(
        kind: ReaderKind,
        drivers: &DriverFactory,
        registry: Arc<ReaderRegistry>,
    ) -> Result<Self> {
        let missing = || Error::Config(format!("No driver available for {kind} readers"));

        Ok(match kind {
            ReaderKind::Framed => Self::Framed(FramedAdapter::new(registry)),
            ReaderKind::Speedway => {
                Self::Speedway(SpeedwayAdapter::new(drivers.speedway().ok_or_else(missing)?))
            }
            ReaderKind::Proton => {
                Self::Proton(ProtonAdapter::new(drivers.proton().ok_or_else(missing)?))
            }
            ReaderKind::Sensx => {
                Self::Sensx(SensxAdapter::new(drivers.sensx().ok_or_else(missing)?))
            }
        })
    }

    pub fn kind(&self) -> ReaderKind {
        match self {
            Self::Framed(_) => ReaderKind::Framed,
            Self::Speedway(_) => ReaderKind::Speedway,
            Self::Proton(_) => ReaderKind::Proton,
            Self::Sensx(_) => ReaderKind::Sensx,
        }
    }

    fn core(&self) -> &Arc<AdapterCore> {
        match self {
            Self::Framed(adapter) => adapter.core(),
            Self::Speedway(adapter) => adapter.core(),
            Self::Proton(adapter) => adapter.core(),
            Self::Sensx(adapter) => adapter.core(),
        }
    }

    /// Replace the EPC to URI resolver used for new tags.
    pub fn set_resolver(&self, resolver: Arc<dyn IdentityResolver>) {
        self.core().set_resolver(resolver);
    }
}

impl fmt::Debug for AnyReaderAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyReaderAdapter")
            .field("kind", &self.kind())
            .field("core", self.core())
            .finish()
    }
}

impl ReaderAdapter for AnyReaderAdapter {
    async fn initialize(&mut self, name: &str, config: &AdapterConfig) -> Result<()> {
        match self {
            Self::Framed(adapter) => adapter.initialize(name, config).await,
            Self::Speedway(adapter) => adapter.initialize(name, config).await,
            Self::Proton(adapter) => adapter.initialize(name, config).await,
            Self::Sensx(adapter) => adapter.initialize(name, config).await,
        }
    }

    async fn start(&mut self) {
        match self {
            Self::Framed(adapter) => adapter.start().await,
            Self::Speedway(adapter) => adapter.start().await,
            Self::Proton(adapter) => adapter.start().await,
            Self::Sensx(adapter) => adapter.start().await,
        }
    }

    async fn stop(&mut self) {
        match self {
            Self::Framed(adapter) => adapter.stop().await,
            Self::Speedway(adapter) => adapter.stop().await,
            Self::Proton(adapter) => adapter.stop().await,
            Self::Sensx(adapter) => adapter.stop().await,
        }
    }

    async fn connect_reader(&mut self) -> Result<()> {
        match self {
            Self::Framed(adapter) => adapter.connect_reader().await,
            Self::Speedway(adapter) => adapter.connect_reader().await,
            Self::Proton(adapter) => adapter.connect_reader().await,
            Self::Sensx(adapter) => adapter.connect_reader().await,
        }
    }

    async fn disconnect_reader(&mut self) {
        match self {
            Self::Framed(adapter) => adapter.disconnect_reader().await,
            Self::Speedway(adapter) => adapter.disconnect_reader().await,
            Self::Proton(adapter) => adapter.disconnect_reader().await,
            Self::Sensx(adapter) => adapter.disconnect_reader().await,
        }
    }

    async fn update(&mut self, config: &AdapterConfig) -> Result<()> {
        match self {
            Self::Framed(adapter) => adapter.update(config).await,
            Self::Speedway(adapter) => adapter.update(config).await,
            Self::Proton(adapter) => adapter.update(config).await,
            Self::Sensx(adapter) => adapter.update(config).await,
        }
    }

    async fn identify(&mut self, read_points: &[String]) -> Vec<Tag> {
        match self {
            Self::Framed(adapter) => adapter.identify(read_points).await,
            Self::Speedway(adapter) => adapter.identify(read_points).await,
            Self::Proton(adapter) => adapter.identify(read_points).await,
            Self::Sensx(adapter) => adapter.identify(read_points).await,
        }
    }

    fn register(&self, listener: Arc<dyn TagListener>) -> bool {
        self.core().register(listener)
    }

    fn deregister(&self, listener: &Arc<dyn TagListener>) -> bool {
        self.core().deregister(listener)
    }

    fn name(&self) -> String {
        self.core().name()
    }

    fn state(&self) -> AdapterState {
        self.core().state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("framed", ReaderKind::Framed)]
    #[case("LLRP", ReaderKind::Framed)]
    #[case(" Speedway ", ReaderKind::Speedway)]
    #[case("impinj", ReaderKind::Speedway)]
    #[case("CAEN", ReaderKind::Proton)]
    #[case("sensthys", ReaderKind::Sensx)]
    fn test_kind_parsing(#[case] text: &str, #[case] expected: ReaderKind) {
        assert_eq!(text.parse::<ReaderKind>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_kind() {
        let err = "alien".parse::<ReaderKind>().unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: Unknown reader kind: alien");
    }

    #[test]
    fn test_vendor_kind_needs_driver() {
        let registry = Arc::new(ReaderRegistry::new());
        let err = AnyReaderAdapter::create(ReaderKind::Proton, &DriverFactory::new(), registry)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: No driver available for proton readers"
        );
    }

    #[cfg(feature = "mock")]
    #[test]
    fn test_vendor_kind_with_driver() {
        use crate::mock::MockSpeedway;

        let drivers = DriverFactory::new().with_speedway(|| Box::new(MockSpeedway::new("R1").0));
        let adapter =
            AnyReaderAdapter::create(ReaderKind::Speedway, &drivers, Arc::new(ReaderRegistry::new()))
                .unwrap();

        assert_eq!(adapter.kind(), ReaderKind::Speedway);
        assert_eq!(adapter.state(), AdapterState::Disconnected);
    }
}
