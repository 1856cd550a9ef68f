//! Tokio codec for the framed reader protocol.
//!
//! The decoder splits a byte stream into complete frames using the length
//! field of the fixed header and yields each frame as raw [`Bytes`]. Message
//! level decoding is left to the receiver so that a frame with a valid
//! header but a malformed body only costs that one message, not the stream.
//!
//! ```text
//! TCP Stream -> Decoder -> Bytes (one full frame, header included)
//! Message -> Encoder -> TCP Stream
//! ```
//!
//! # Usage with Tokio Framed
//!
//! ```rust,no_run
//! use futures::{SinkExt, StreamExt};
//! use tokio::net::TcpStream;
//! use tokio_util::codec::Framed;
//! use tagwire_protocol::{FrameCodec, Message};
//!
//! # async fn example() -> tagwire_core::Result<()> {
//! let stream = TcpStream::connect("127.0.0.1:5084").await?;
//! let mut framed = Framed::new(stream, FrameCodec::new());
//!
//! framed.send(Message::keepalive_ack().with_id(1)).await?;
//!
//! if let Some(Ok(frame)) = framed.next().await {
//!     let message = Message::decode(&frame)?;
//!     println!("Received: {:?}", message);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Errors
//!
//! Decoding fails on an unsupported version, a declared length shorter
//! than the header, or a declared length above the configured maximum.
//! These leave the stream out of sync and are fatal to the connection.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::{FrameHeader, Message};
use tagwire_core::{
    Error, Result,
    constants::{DEFAULT_MAX_FRAME_SIZE, FRAME_HEADER_LEN},
};

/// Length-delimited codec for framed protocol messages.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    /// Frames declaring a larger length are rejected.
    max_frame_size: usize,
}

impl FrameCodec {
    /// Create a codec with the default 64 KB frame limit.
    ///
    /// ```
    /// use tagwire_protocol::FrameCodec;
    ///
    /// let codec = FrameCodec::new();
    /// assert_eq!(codec.max_frame_size(), 64 * 1024);
    /// ```
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }

        let header = FrameHeader::parse(src)?;
        let length = header.length as usize;
        if length > self.max_frame_size {
            return Err(Error::FrameTooLarge {
                size: length,
                max_size: self.max_frame_size,
            });
        }

        if src.len() < length {
            src.reserve(length - src.len());
            return Ok(None);
        }

        Ok(Some(src.split_to(length).freeze()))
    }
}

impl Encoder<Message> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<()> {
        item.validate(self.max_frame_size)?;
        item.encode(dst)
    }
}
