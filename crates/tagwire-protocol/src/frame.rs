use bytes::{BufMut, BytesMut};
use std::fmt;
use tagwire_core::{Error, Result, constants::*};

/// Fixed 10 byte header at the start of every framed message.
///
/// # Wire Format
///
/// ```text
/// byte 0..2   rsv(3) | version(3) | message type(10)   big endian
/// byte 2..6   total frame length, header included       u32 BE
/// byte 6..10  message id                                u32 BE
/// ```
///
/// Reserved bits are written as zero and ignored on read.
///
/// # Example
///
/// ```
/// use bytes::BytesMut;
/// use tagwire_protocol::FrameHeader;
///
/// let header = FrameHeader::new(62, 10, 7);
/// let mut buf = BytesMut::new();
/// header.write(&mut buf);
///
/// assert_eq!(&buf[..], &[0x04, 0x3E, 0, 0, 0, 10, 0, 0, 0, 7]);
/// assert_eq!(FrameHeader::parse(&buf).unwrap(), header);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: u8,
    pub message_type: u16,
    pub length: u32,
    pub message_id: u32,
}

impl FrameHeader {
    /// Header for the current protocol version.
    pub fn new(message_type: u16, length: u32, message_id: u32) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            message_type,
            length,
            message_id,
        }
    }

    /// Parse a header from the start of `buf`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidFrame`] if fewer than [`FRAME_HEADER_LEN`] bytes are
    ///   available or the declared length is shorter than the header
    /// - [`Error::UnsupportedVersion`] if the version field is not
    ///   [`PROTOCOL_VERSION`]
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < FRAME_HEADER_LEN {
            return Err(Error::InvalidFrame(format!(
                "header needs {FRAME_HEADER_LEN} bytes, got {}",
                buf.len()
            )));
        }

        let word = u16::from_be_bytes([buf[0], buf[1]]);
        let version = ((word >> 10) & 0x07) as u8;
        if version != PROTOCOL_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        let length = u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]);
        if (length as usize) < FRAME_HEADER_LEN {
            return Err(Error::InvalidFrame(format!(
                "declared length {length} is shorter than the header"
            )));
        }

        Ok(Self {
            version,
            message_type: word & MAX_MESSAGE_TYPE,
            length,
            message_id: u32::from_be_bytes([buf[6], buf[7], buf[8], buf[9]]),
        })
    }

    pub fn write(&self, dst: &mut BytesMut) {
        let word = ((u16::from(self.version) & 0x07) << 10) | (self.message_type & MAX_MESSAGE_TYPE);
        dst.reserve(FRAME_HEADER_LEN);
        dst.put_u16(word);
        dst.put_u32(self.length);
        dst.put_u32(self.message_id);
    }

    /// Number of body bytes following the header.
    pub fn body_len(&self) -> usize {
        (self.length as usize).saturating_sub(FRAME_HEADER_LEN)
    }
}

impl fmt::Display for FrameHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "v{} type={} len={} id={}",
            self.version, self.message_type, self.length, self.message_id
        )
    }
}
