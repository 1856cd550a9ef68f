//! Canonical, vendor-independent tag read event.

use crate::ident;
use serde::Serialize;

/// One normalized RFID tag read.
///
/// A `Tag` is created by an adapter's read callback through [`TagBuilder`]
/// and is immutable afterwards. The hex and binary forms are always derived
/// from the raw identifier bytes; the URI fields are best-effort and may be
/// absent without making the tag invalid.
///
/// # Examples
///
/// ```
/// use tagwire_core::Tag;
///
/// let tag = Tag::builder(vec![0x1A, 0x2B])
///     .reader("DOCK-1")
///     .origin("speedway-1")
///     .trace("speedway-1")
///     .trace("Antenna-2")
///     .timestamp(1_700_000_000_000)
///     .build();
///
/// assert_eq!(tag.hex(), "1a2b");
/// assert_eq!(tag.binary(), "0001101000101011");
/// assert_eq!(tag.trace(), ["speedway-1", "Antenna-2"]);
/// assert!(tag.pure_identity_uri().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    id: Vec<u8>,
    hex: String,
    binary: String,
    pure_identity_uri: Option<String>,
    tag_encoding_uri: Option<String>,
    tid_bank: Option<String>,
    reader: String,
    origin: String,
    trace: Vec<String>,
    timestamp_ms: i64,
}

impl Tag {
    /// Start building a tag from its raw identifier bytes.
    pub fn builder(id: impl Into<Vec<u8>>) -> TagBuilder {
        TagBuilder::new(id.into())
    }

    /// Raw identifier bytes.
    pub fn id(&self) -> &[u8] {
        &self.id
    }

    /// Identifier as lowercase hex, two digits per byte.
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Identifier as a binary string, eight digits per byte.
    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub fn pure_identity_uri(&self) -> Option<&str> {
        self.pure_identity_uri.as_deref()
    }

    pub fn tag_encoding_uri(&self) -> Option<&str> {
        self.tag_encoding_uri.as_deref()
    }

    /// TID memory bank as hex, when the reader was asked to read it.
    pub fn tid_bank(&self) -> Option<&str> {
        self.tid_bank.as_deref()
    }

    /// Logical reader that produced this read.
    pub fn reader(&self) -> &str {
        &self.reader
    }

    /// Physical source (reader, logical source or antenna group) of the read.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Ordered antenna/hop labels the read passed through.
    pub fn trace(&self) -> &[String] {
        &self.trace
    }

    /// Capture time in milliseconds since the Unix epoch.
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }
}

/// Builder for [`Tag`].
///
/// The timestamp defaults to the time `build()` is called.
#[derive(Debug, Clone)]
pub struct TagBuilder {
    id: Vec<u8>,
    pure_identity_uri: Option<String>,
    tag_encoding_uri: Option<String>,
    tid_bank: Option<String>,
    reader: String,
    origin: String,
    trace: Vec<String>,
    timestamp_ms: Option<i64>,
}

impl TagBuilder {
    fn new(id: Vec<u8>) -> Self {
        Self {
            id,
            pure_identity_uri: None,
            tag_encoding_uri: None,
            tid_bank: None,
            reader: String::new(),
            origin: String::new(),
            trace: Vec::new(),
            timestamp_ms: None,
        }
    }

    pub fn reader(mut self, reader: impl Into<String>) -> Self {
        self.reader = reader.into();
        self
    }

    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Append one label to the trace.
    pub fn trace(mut self, label: impl Into<String>) -> Self {
        self.trace.push(label.into());
        self
    }

    pub fn timestamp(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    pub fn tid_bank(mut self, tid_hex: impl Into<String>) -> Self {
        self.tid_bank = Some(tid_hex.into());
        self
    }

    pub fn pure_identity_uri(mut self, uri: impl Into<String>) -> Self {
        self.pure_identity_uri = Some(uri.into());
        self
    }

    pub fn tag_encoding_uri(mut self, uri: impl Into<String>) -> Self {
        self.tag_encoding_uri = Some(uri.into());
        self
    }

    /// Binary form of the identifier, for identity resolution before `build()`.
    pub fn binary(&self) -> String {
        ident::to_binary(&self.id)
    }

    pub fn build(self) -> Tag {
        let hex = ident::to_hex(&self.id);
        let binary = ident::to_binary(&self.id);

        Tag {
            id: self.id,
            hex,
            binary,
            pure_identity_uri: self.pure_identity_uri,
            tag_encoding_uri: self.tag_encoding_uri,
            tid_bank: self.tid_bank,
            reader: self.reader,
            origin: self.origin,
            trace: self.trace,
            timestamp_ms: self
                .timestamp_ms
                .unwrap_or_else(|| chrono::Utc::now().timestamp_millis()),
        }
    }
}
