//! Shared helpers for reader connection integration tests.

#![allow(dead_code)]

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tagwire_core::{ReaderError, ReaderErrorKind};
use tagwire_network::{ConnectionListener, ReaderConnection};
use tagwire_protocol::{FrameCodec, Message};
use tokio::io::DuplexStream;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio_util::codec::Framed;

/// Listener forwarding everything it sees into channels.
pub struct Recorder {
    frames: UnboundedSender<Bytes>,
    errors: UnboundedSender<ReaderError>,
}

impl ConnectionListener for Recorder {
    fn on_message(&self, _reader: &str, frame: &Bytes) {
        let _ = self.frames.send(frame.clone());
    }

    fn on_error(&self, _reader: &str, error: &ReaderError) {
        let _ = self.errors.send(error.clone());
    }
}

pub struct Recorded {
    pub frames: UnboundedReceiver<Bytes>,
    pub errors: UnboundedReceiver<ReaderError>,
}

impl Recorded {
    pub async fn next_frame(&mut self) -> Message {
        let frame = tokio::time::timeout(Duration::from_secs(2), self.frames.recv())
            .await
            .expect("timed out waiting for frame")
            .expect("listener dropped");
        Message::decode(&frame).unwrap()
    }

    pub async fn next_error(&mut self, within: Duration) -> ReaderError {
        tokio::time::timeout(within, self.errors.recv())
            .await
            .expect("timed out waiting for error")
            .expect("listener dropped")
    }

    pub fn drain_errors(&mut self, kind: ReaderErrorKind) -> usize {
        let mut count = 0;
        while let Ok(error) = self.errors.try_recv() {
            if error.kind == kind {
                count += 1;
            }
        }
        count
    }
}

pub fn record(reader: &ReaderConnection) -> Recorded {
    let (frames_tx, frames) = unbounded_channel();
    let (errors_tx, errors) = unbounded_channel();
    reader.register(Arc::new(Recorder {
        frames: frames_tx,
        errors: errors_tx,
    }));
    Recorded { frames, errors }
}

/// Reader-initiated connection over an in-memory pipe.
///
/// Returns the connected reader and the device side of the pipe.
pub async fn connect_over_duplex(name: &str) -> (ReaderConnection, Framed<DuplexStream, FrameCodec>) {
    let (host, device) = tokio::io::duplex(64 * 1024);
    let reader = ReaderConnection::new(name);
    reader.attach(host);
    reader.connect(false).await.unwrap();
    (reader, Framed::new(device, FrameCodec::new()))
}
