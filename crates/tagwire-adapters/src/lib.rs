//! Reader adapters for the tagwire middleware.
//!
//! Every supported reader family is wrapped in an adapter implementing
//! [`ReaderAdapter`]: configure it from string properties, start and stop
//! continuous reading, and receive canonical [`Tag`](tagwire_core::Tag)
//! batches through registered [`TagListener`]s.
//!
//! - [`FramedAdapter`]: readers speaking the framed protocol, through
//!   [`tagwire_network::ReaderConnection`]
//! - [`SpeedwayAdapter`], [`ProtonAdapter`], [`SensxAdapter`]: vendor SDKs,
//!   through the driver traits in [`drivers`]
//!
//! [`AnyReaderAdapter`] dispatches over all of them.

pub mod adapters;
pub mod config;
pub mod devices;
pub mod drivers;
pub mod error;
pub mod events;
pub mod identity;
pub mod lifecycle;
#[cfg(feature = "mock")]
pub mod mock;
pub mod traits;

pub use adapters::{FramedAdapter, ProtonAdapter, SensxAdapter, SpeedwayAdapter};
pub use config::AdapterConfig;
pub use devices::{AnyReaderAdapter, ReaderKind};
pub use drivers::DriverFactory;
pub use error::{DriverError, DriverResult};
pub use events::{EventChannel, ReaderEvent};
pub use identity::{IdentityResolver, ResolvedIdentity, Unresolved};
pub use traits::{AdapterState, ReaderAdapter, TagListener};
