use tokio::io::{AsyncRead, AsyncWrite};

/// Byte stream a connection can run over.
///
/// Implemented for every `AsyncRead + AsyncWrite` type, so a `TcpStream`
/// and an in-memory `tokio::io::duplex` half both qualify.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

pub type BoxedTransport = Box<dyn Transport>;
