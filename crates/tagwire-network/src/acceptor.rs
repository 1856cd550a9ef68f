//! Listener for reader-initiated connections.
//!
//! Some readers open the TCP connection themselves and never announce a
//! logical name. The acceptor matches each inbound socket to a configured
//! reader by its source (address, port) through the [`ReaderRegistry`],
//! attaches the socket to that reader's connection and connects it.
//!
//! ```text
//! Reader 10.0.0.5:40001 ┐
//!                       ├──> ReaderAcceptor ──> registry lookup ──> attach + connect(false)
//! Reader 10.0.0.6:40001 ┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ReaderRegistry;
use tagwire_core::Result;

pub struct ReaderAcceptor {
    listener: TcpListener,
    registry: Arc<ReaderRegistry>,
}

impl ReaderAcceptor {
    /// Bind the listening socket.
    ///
    /// # Errors
    ///
    /// Returns [`tagwire_core::Error::Io`] if the address cannot be bound.
    pub async fn bind(addr: impl ToSocketAddrs, registry: Arc<ReaderRegistry>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Accepting reader connections on {}", listener.local_addr()?);
        Ok(Self { listener, registry })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept one socket and hand it to its reader.
    ///
    /// Returns the id of the reader that was connected, or `None` when the
    /// peer does not match any configured reader; such sockets are closed.
    pub async fn accept_one(&self) -> Result<Option<String>> {
        let (stream, peer) = self.listener.accept().await?;
        let address = peer.ip().to_string();

        let Some(id) = self.registry.find_by_endpoint(&address, peer.port()) else {
            warn!("Rejecting connection from unknown reader {}", peer);
            return Ok(None);
        };
        let Some(entry) = self.registry.get(&id) else {
            warn!(reader = %id, "Reader removed while accepting {}", peer);
            return Ok(None);
        };

        if let Err(e) = stream.set_nodelay(true) {
            warn!(reader = %id, "Failed to set TCP_NODELAY: {}", e);
        }

        debug!(reader = %id, "Accepted connection from {}", peer);
        entry.connection.attach(stream);
        entry.connection.connect(false).await?;
        Ok(Some(id))
    }

    /// Accept sockets until `cancel` fires. Per-socket failures are logged.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.accept_one() => result,
            };

            if let Err(e) = result {
                warn!("Failed to accept reader connection: {}", e);
            }
        }
        info!("Reader acceptor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReaderConnection;
    use std::time::Duration;
    use tokio::net::TcpSocket;

    #[tokio::test]
    async fn test_unknown_peer_is_dropped() {
        let registry = Arc::new(ReaderRegistry::new());
        let acceptor = ReaderAcceptor::bind("127.0.0.1:0", registry).await.unwrap();
        let addr = acceptor.local_addr().unwrap();

        let _client = tokio::net::TcpStream::connect(addr).await.unwrap();
        assert_eq!(acceptor.accept_one().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_known_peer_is_connected() {
        let registry = Arc::new(ReaderRegistry::new());
        let acceptor = ReaderAcceptor::bind("127.0.0.1:0", registry.clone())
            .await
            .unwrap();
        let addr = acceptor.local_addr().unwrap();

        // Bind the client first to learn its source port.
        let socket = TcpSocket::new_v4().unwrap();
        socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let source = socket.local_addr().unwrap();

        let reader = ReaderConnection::new("Dock-1");
        registry
            .insert("Dock-1", "127.0.0.1", source.port(), reader.clone())
            .unwrap();

        let _client = socket.connect(addr).await.unwrap();
        let id = tokio::time::timeout(Duration::from_secs(2), acceptor.accept_one())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(id.as_deref(), Some("DOCK-1"));
        assert!(reader.is_connected());
        assert!(!reader.metadata().client_initiated);
        reader.disconnect();
    }
}
