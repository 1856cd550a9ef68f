//! Listener-to-channel bridge.
//!
//! Listeners are plain callbacks invoked on connection and adapter tasks.
//! Consumers that prefer a single async stream register an [`EventChannel`]
//! with any number of connections and adapters and read [`ReaderEvent`]s
//! from the receiver.
//!
//! ```text
//! ReaderConnection ──on_message / on_error──┐
//!                                           ├──> EventChannel ──> mpsc ──> consumer
//! ReaderAdapter ─────on_tags / on_error─────┘
//! ```

use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;

use crate::TagListener;
use tagwire_core::{ReaderError, Tag};
use tagwire_network::ConnectionListener;

/// Event emitted by a connection or adapter.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum ReaderEvent {
    /// A batch of tags from an adapter.
    Tags { reader: String, tags: Vec<Tag> },

    /// A raw inbound frame from a connection.
    Frame { reader: String, frame: Bytes },

    /// An error from either.
    Error { reader: String, error: ReaderError },
}

impl ReaderEvent {
    pub fn reader(&self) -> &str {
        match self {
            Self::Tags { reader, .. } | Self::Frame { reader, .. } | Self::Error { reader, .. } => {
                reader
            }
        }
    }
}

/// Listener forwarding everything into an unbounded channel.
#[derive(Debug)]
pub struct EventChannel {
    tx: mpsc::UnboundedSender<ReaderEvent>,
}

impl EventChannel {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ReaderEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }

    fn forward(&self, event: ReaderEvent) {
        if self.tx.send(event).is_err() {
            trace!("Event receiver dropped");
        }
    }
}

impl TagListener for EventChannel {
    fn on_tags(&self, reader: &str, tags: &[Tag]) {
        self.forward(ReaderEvent::Tags {
            reader: reader.to_string(),
            tags: tags.to_vec(),
        });
    }

    fn on_error(&self, reader: &str, error: &ReaderError) {
        self.forward(ReaderEvent::Error {
            reader: reader.to_string(),
            error: error.clone(),
        });
    }
}

impl ConnectionListener for EventChannel {
    fn on_message(&self, reader: &str, frame: &Bytes) {
        self.forward(ReaderEvent::Frame {
            reader: reader.to_string(),
            frame: frame.clone(),
        });
    }

    fn on_error(&self, reader: &str, error: &ReaderError) {
        TagListener::on_error(self, reader, error);
    }
}
