//! Framed protocol messages.
//!
//! A small LLRP-shaped subset: reader configuration with a keepalive
//! specification, keepalive and its acknowledgement, and tag reports.
//! Every other message type is carried opaquely so that inbound frames of
//! unknown kind still reach the connection's listeners untouched.

use crate::frame::FrameHeader;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tagwire_core::{Error, Result, constants::*};

/// Message types understood by the framed protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    SetReaderConfig,
    SetReaderConfigResponse,
    TagReport,
    Keepalive,
    KeepaliveAck,
}

impl MessageType {
    pub const fn code(self) -> u16 {
        match self {
            Self::SetReaderConfig => 3,
            Self::SetReaderConfigResponse => 13,
            Self::TagReport => 61,
            Self::Keepalive => 62,
            Self::KeepaliveAck => 72,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            3 => Some(Self::SetReaderConfig),
            13 => Some(Self::SetReaderConfigResponse),
            61 => Some(Self::TagReport),
            62 => Some(Self::Keepalive),
            72 => Some(Self::KeepaliveAck),
            _ => None,
        }
    }
}

/// When the reader emits keepalives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeepaliveTrigger {
    Null,
    Periodic,
}

impl KeepaliveTrigger {
    fn as_u8(self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Periodic => 1,
        }
    }

    fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Null),
            1 => Ok(Self::Periodic),
            other => Err(Error::InvalidFrame(format!(
                "unknown keepalive trigger {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeepaliveSpec {
    pub trigger: KeepaliveTrigger,
    pub period_ms: u32,
}

impl KeepaliveSpec {
    pub fn periodic(period_ms: u32) -> Self {
        Self {
            trigger: KeepaliveTrigger::Periodic,
            period_ms,
        }
    }
}

/// Body of a SET_READER_CONFIG command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReaderConfig {
    pub reset_to_factory_default: bool,
    pub keepalive: Option<KeepaliveSpec>,
}

/// One tag observation inside a TAG_REPORT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagReportEntry {
    pub epc: Vec<u8>,
    pub antenna_id: u16,
    pub timestamp_ms: u64,
    pub tid: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    SetReaderConfig(ReaderConfig),
    SetReaderConfigResponse { status: u16 },
    TagReport(Vec<TagReportEntry>),
    Keepalive,
    KeepaliveAck,
    /// Any other message type; the payload is the raw body.
    Other { message_type: u16, payload: Bytes },
}

/// A framed protocol message: message id plus typed body.
///
/// # Example
///
/// ```
/// use tagwire_protocol::{KeepaliveSpec, Message, MessageType, ReaderConfig};
///
/// let msg = Message::set_reader_config(ReaderConfig {
///     reset_to_factory_default: false,
///     keepalive: Some(KeepaliveSpec::periodic(10_000)),
/// })
/// .with_id(1);
///
/// let wire = msg.to_bytes().unwrap();
/// assert_eq!(wire.len(), msg.encoded_len());
///
/// let decoded = Message::decode(&wire).unwrap();
/// assert_eq!(decoded, msg);
/// assert_eq!(decoded.message_type(), MessageType::SetReaderConfig.code());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: u32,
    pub body: MessageBody,
}

impl Message {
    pub fn new(body: MessageBody) -> Self {
        Self { id: 0, body }
    }

    pub fn with_id(mut self, id: u32) -> Self {
        self.id = id;
        self
    }

    pub fn keepalive() -> Self {
        Self::new(MessageBody::Keepalive)
    }

    pub fn keepalive_ack() -> Self {
        Self::new(MessageBody::KeepaliveAck)
    }

    pub fn set_reader_config(config: ReaderConfig) -> Self {
        Self::new(MessageBody::SetReaderConfig(config))
    }

    pub fn tag_report(entries: Vec<TagReportEntry>) -> Self {
        Self::new(MessageBody::TagReport(entries))
    }

    pub fn is_keepalive(&self) -> bool {
        matches!(self.body, MessageBody::Keepalive)
    }

    /// Numeric message type carried in the header.
    pub fn message_type(&self) -> u16 {
        match &self.body {
            MessageBody::SetReaderConfig(_) => MessageType::SetReaderConfig.code(),
            MessageBody::SetReaderConfigResponse { .. } => {
                MessageType::SetReaderConfigResponse.code()
            }
            MessageBody::TagReport(_) => MessageType::TagReport.code(),
            MessageBody::Keepalive => MessageType::Keepalive.code(),
            MessageBody::KeepaliveAck => MessageType::KeepaliveAck.code(),
            MessageBody::Other { message_type, .. } => *message_type,
        }
    }

    /// Size of the encoded frame, header included.
    pub fn encoded_len(&self) -> usize {
        FRAME_HEADER_LEN + self.body_len()
    }

    fn body_len(&self) -> usize {
        match &self.body {
            MessageBody::SetReaderConfig(config) => {
                2 + if config.keepalive.is_some() { 5 } else { 0 }
            }
            MessageBody::SetReaderConfigResponse { .. } => 2,
            MessageBody::TagReport(entries) => {
                2 + entries
                    .iter()
                    .map(|e| 2 + e.epc.len() + 2 + 8 + 2 + e.tid.as_ref().map_or(0, Vec::len))
                    .sum::<usize>()
            }
            MessageBody::Keepalive | MessageBody::KeepaliveAck => 0,
            MessageBody::Other { payload, .. } => payload.len(),
        }
    }

    /// Check that this message can be encoded within `max_frame_size`.
    ///
    /// # Errors
    ///
    /// - [`Error::FrameTooLarge`] when the encoded frame would exceed the limit
    /// - [`Error::InvalidMessageType`] when an opaque type does not fit the
    ///   10-bit type field
    /// - [`Error::InvalidFrame`] when a tag report has more entries, or an
    ///   identifier more bytes, than its 16-bit length prefix can express
    pub fn validate(&self, max_frame_size: usize) -> Result<()> {
        if self.message_type() > MAX_MESSAGE_TYPE {
            return Err(Error::InvalidMessageType(self.message_type()));
        }

        if let MessageBody::TagReport(entries) = &self.body {
            if entries.len() > usize::from(u16::MAX) {
                return Err(Error::InvalidFrame(format!(
                    "tag report with {} entries",
                    entries.len()
                )));
            }
            let oversized = entries.iter().any(|e| {
                e.epc.len() > usize::from(u16::MAX)
                    || e.tid.as_ref().is_some_and(|t| t.len() > usize::from(u16::MAX))
            });
            if oversized {
                return Err(Error::InvalidFrame(
                    "tag identifier exceeds 65535 bytes".to_string(),
                ));
            }
        }

        let size = self.encoded_len();
        if size > max_frame_size {
            return Err(Error::FrameTooLarge {
                size,
                max_size: max_frame_size,
            });
        }

        Ok(())
    }

    /// Append the full frame to `dst`.
    ///
    /// Validates against `u32::MAX` only; callers enforcing a frame limit
    /// call [`Message::validate`] first.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        self.validate(u32::MAX as usize)?;

        let length = self.encoded_len();
        dst.reserve(length);
        FrameHeader::new(self.message_type(), length as u32, self.id).write(dst);

        match &self.body {
            MessageBody::SetReaderConfig(config) => {
                let flags = if config.reset_to_factory_default { 0x80 } else { 0x00 };
                dst.put_u8(flags);
                match config.keepalive {
                    Some(spec) => {
                        dst.put_u8(1);
                        dst.put_u8(spec.trigger.as_u8());
                        dst.put_u32(spec.period_ms);
                    }
                    None => dst.put_u8(0),
                }
            }
            MessageBody::SetReaderConfigResponse { status } => dst.put_u16(*status),
            MessageBody::TagReport(entries) => {
                dst.put_u16(entries.len() as u16);
                for entry in entries {
                    dst.put_u16(entry.epc.len() as u16);
                    dst.put_slice(&entry.epc);
                    dst.put_u16(entry.antenna_id);
                    dst.put_u64(entry.timestamp_ms);
                    let tid = entry.tid.as_deref().unwrap_or_default();
                    dst.put_u16(tid.len() as u16);
                    dst.put_slice(tid);
                }
            }
            MessageBody::Keepalive | MessageBody::KeepaliveAck => {}
            MessageBody::Other { payload, .. } => dst.put_slice(payload),
        }

        Ok(())
    }

    /// Encode into a freshly allocated frame.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Decode one complete frame.
    ///
    /// The declared length must match `frame.len()` exactly and the body
    /// must be consumed entirely.
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let header = FrameHeader::parse(frame)?;
        if header.length as usize != frame.len() {
            return Err(Error::InvalidFrame(format!(
                "declared length {} but frame has {} bytes",
                header.length,
                frame.len()
            )));
        }

        let mut body = &frame[FRAME_HEADER_LEN..];
        let decoded = match MessageType::from_code(header.message_type) {
            Some(MessageType::SetReaderConfig) => {
                let flags = take_u8(&mut body)?;
                let keepalive = match take_u8(&mut body)? {
                    0 => None,
                    1 => {
                        let trigger = KeepaliveTrigger::from_u8(take_u8(&mut body)?)?;
                        Some(KeepaliveSpec {
                            trigger,
                            period_ms: take_u32(&mut body)?,
                        })
                    }
                    other => {
                        return Err(Error::InvalidFrame(format!(
                            "invalid keepalive presence flag {other}"
                        )));
                    }
                };
                MessageBody::SetReaderConfig(ReaderConfig {
                    reset_to_factory_default: flags & 0x80 != 0,
                    keepalive,
                })
            }
            Some(MessageType::SetReaderConfigResponse) => MessageBody::SetReaderConfigResponse {
                status: take_u16(&mut body)?,
            },
            Some(MessageType::TagReport) => {
                let count = take_u16(&mut body)?;
                let mut entries = Vec::with_capacity(usize::from(count));
                for _ in 0..count {
                    let epc_len = take_u16(&mut body)?;
                    let epc = take_slice(&mut body, usize::from(epc_len))?.to_vec();
                    let antenna_id = take_u16(&mut body)?;
                    let timestamp_ms = take_u64(&mut body)?;
                    let tid_len = take_u16(&mut body)?;
                    let tid = take_slice(&mut body, usize::from(tid_len))?;
                    entries.push(TagReportEntry {
                        epc,
                        antenna_id,
                        timestamp_ms,
                        tid: (!tid.is_empty()).then(|| tid.to_vec()),
                    });
                }
                MessageBody::TagReport(entries)
            }
            Some(MessageType::Keepalive) => MessageBody::Keepalive,
            Some(MessageType::KeepaliveAck) => MessageBody::KeepaliveAck,
            None => {
                let payload = Bytes::copy_from_slice(body);
                body = &[];
                MessageBody::Other {
                    message_type: header.message_type,
                    payload,
                }
            }
        };

        if !body.is_empty() {
            return Err(Error::InvalidFrame(format!(
                "{} trailing bytes after message type {}",
                body.len(),
                header.message_type
            )));
        }

        Ok(Self {
            id: header.message_id,
            body: decoded,
        })
    }
}

fn need(buf: &[u8], n: usize) -> Result<()> {
    if buf.len() < n {
        return Err(Error::InvalidFrame(format!(
            "truncated body: need {n} bytes, have {}",
            buf.len()
        )));
    }
    Ok(())
}

fn take_u8(buf: &mut &[u8]) -> Result<u8> {
    need(*buf, 1)?;
    Ok(buf.get_u8())
}

fn take_u16(buf: &mut &[u8]) -> Result<u16> {
    need(*buf, 2)?;
    Ok(buf.get_u16())
}

fn take_u32(buf: &mut &[u8]) -> Result<u32> {
    need(*buf, 4)?;
    Ok(buf.get_u32())
}

fn take_u64(buf: &mut &[u8]) -> Result<u64> {
    need(*buf, 8)?;
    Ok(buf.get_u64())
}

fn take_slice<'a>(buf: &mut &'a [u8], n: usize) -> Result<&'a [u8]> {
    need(*buf, n)?;
    let (head, tail) = buf.split_at(n);
    *buf = tail;
    Ok(head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn entry(epc: &[u8], antenna_id: u16) -> TagReportEntry {
        TagReportEntry {
            epc: epc.to_vec(),
            antenna_id,
            timestamp_ms: 1_700_000_000_000,
            tid: None,
        }
    }

    #[rstest]
    #[case(Message::keepalive(), 62)]
    #[case(Message::keepalive_ack(), 72)]
    #[case(Message::set_reader_config(ReaderConfig::default()), 3)]
    #[case(Message::new(MessageBody::SetReaderConfigResponse { status: 0 }), 13)]
    #[case(Message::tag_report(vec![]), 61)]
    fn test_message_type_codes(#[case] msg: Message, #[case] code: u16) {
        assert_eq!(msg.message_type(), code);
    }

    #[test]
    fn test_keepalive_is_header_only() {
        let wire = Message::keepalive().with_id(9).to_bytes().unwrap();
        assert_eq!(&wire[..], &[0x04, 0x3E, 0, 0, 0, 10, 0, 0, 0, 9]);
        assert!(Message::decode(&wire).unwrap().is_keepalive());
    }

    #[test]
    fn test_set_reader_config_body_layout() {
        let msg = Message::set_reader_config(ReaderConfig {
            reset_to_factory_default: true,
            keepalive: Some(KeepaliveSpec::periodic(1000)),
        });
        let wire = msg.to_bytes().unwrap();

        assert_eq!(wire.len(), 17);
        assert_eq!(&wire[10..], &[0x80, 1, 1, 0, 0, 0x03, 0xE8]);
    }

    #[test]
    fn test_tag_report_decodes_entries() {
        let mut with_tid = entry(&[0xE2, 0x00], 2);
        with_tid.tid = Some(vec![0xE2, 0x80, 0x11, 0x05]);
        let msg = Message::tag_report(vec![entry(&[0x30, 0x08, 0x33], 1), with_tid]).with_id(5);

        let decoded = Message::decode(&msg.to_bytes().unwrap()).unwrap();
        let MessageBody::TagReport(entries) = decoded.body else {
            panic!("expected tag report");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].epc, vec![0x30, 0x08, 0x33]);
        assert_eq!(entries[0].tid, None);
        assert_eq!(entries[1].antenna_id, 2);
        assert_eq!(entries[1].tid.as_deref(), Some(&[0xE2, 0x80, 0x11, 0x05][..]));
    }

    #[test]
    fn test_unknown_type_is_carried_opaquely() {
        let msg = Message::new(MessageBody::Other {
            message_type: 1023,
            payload: Bytes::from_static(b"vendor"),
        });
        let decoded = Message::decode(&msg.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_validate_rejects_oversized_frame() {
        let msg = Message::new(MessageBody::Other {
            message_type: 500,
            payload: Bytes::from(vec![0u8; 100]),
        });
        assert!(matches!(
            msg.validate(64),
            Err(Error::FrameTooLarge { size: 110, max_size: 64 })
        ));
        assert!(msg.validate(110).is_ok());
    }

    #[test]
    fn test_validate_rejects_wide_message_type() {
        let msg = Message::new(MessageBody::Other {
            message_type: 1024,
            payload: Bytes::new(),
        });
        assert!(matches!(
            msg.validate(DEFAULT_MAX_FRAME_SIZE),
            Err(Error::InvalidMessageType(1024))
        ));
        assert!(msg.to_bytes().is_err());
    }

    #[test]
    fn test_decode_rejects_length_mismatch() {
        let mut wire = BytesMut::from(&Message::keepalive().to_bytes().unwrap()[..]);
        wire.put_u8(0);
        assert!(matches!(
            Message::decode(&wire),
            Err(Error::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_decode_rejects_truncated_tag_report() {
        let mut wire = BytesMut::new();
        FrameHeader::new(61, 14, 1).write(&mut wire);
        wire.put_u16(1); // one entry
        wire.put_u16(8); // epc length larger than what follows

        assert!(matches!(
            Message::decode(&wire),
            Err(Error::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_decode_rejects_unknown_trigger() {
        let mut wire = BytesMut::new();
        FrameHeader::new(3, 17, 1).write(&mut wire);
        wire.put_u8(0);
        wire.put_u8(1);
        wire.put_u8(7);
        wire.put_u32(1000);

        assert!(Message::decode(&wire).is_err());
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let mut wire = BytesMut::new();
        FrameHeader::new(13, 13, 1).write(&mut wire);
        wire.put_u16(0);
        wire.put_u8(0xFF);

        assert!(matches!(
            Message::decode(&wire),
            Err(Error::InvalidFrame(_))
        ));
    }
}
