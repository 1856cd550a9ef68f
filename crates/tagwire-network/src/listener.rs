use bytes::Bytes;
use tagwire_core::ReaderError;

/// Receiver of a connection's inbound frames and errors.
///
/// Registered with [`ReaderConnection::register`](crate::ReaderConnection::register).
/// Frames are delivered from the connection's inbound worker in wire order;
/// a slow listener delays only that connection's delivery.
pub trait ConnectionListener: Send + Sync {
    /// A complete inbound frame, header included.
    fn on_message(&self, reader: &str, frame: &Bytes);

    fn on_error(&self, reader: &str, error: &ReaderError) {
        let _ = (reader, error);
    }
}
