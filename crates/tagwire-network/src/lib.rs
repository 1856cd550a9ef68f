//! Reader connection layer for tagwire.
//!
//! This crate owns the physical side of a framed-protocol reader: one
//! [`ReaderConnection`] per logical reader, with its transport tasks, the
//! outbound and inbound work queues and the keepalive watchdog, plus the
//! process-wide [`ReaderRegistry`] and the [`ReaderAcceptor`] used when
//! readers dial in.
//!
//! # Components
//!
//! - **ReaderConnection**: connection state machine (client or reader initiated)
//! - **ReaderRegistry**: case-insensitive id lookup and (address, port) index
//! - **ReaderAcceptor**: matches inbound sockets to configured readers
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use tagwire_network::ReaderConnection;
//! use tagwire_protocol::Message;
//!
//! # async fn example() -> tagwire_core::Result<()> {
//! let reader = ReaderConnection::new("DOCK-1");
//! reader.set_address("192.168.0.50");
//! reader.set_keepalive(Duration::from_secs(10), 3, false);
//!
//! reader.connect(true).await?;
//! reader.send(Message::keepalive_ack());
//! reader.disconnect();
//! # Ok(())
//! # }
//! ```

mod acceptor;
mod config;
mod connection;
mod listener;
mod metadata;
mod queue;
mod registry;
mod transport;

pub use acceptor::ReaderAcceptor;
pub use config::ConnectionConfig;
pub use connection::{ConnectionState, ReaderConnection};
pub use listener::ConnectionListener;
pub use metadata::ReaderMetadata;
pub use queue::WorkQueue;
pub use registry::{ReaderRegistry, RegistryEntry, normalize_id};
pub use transport::{BoxedTransport, Transport};
