//! # Message Model
//!
//! A [`Message`] pairs a [`PacketKind`] with the body bytes that kind describes.
//!
//! Construction validates the body against the kind's framing policy, so a
//! `Message` that exists is always encodable: bodiless kinds carry no bytes,
//! fixed kinds carry exactly their length and variable kinds at most 255
//! bytes. Nothing is truncated or padded.
//!
//! Bodies are held as [`Bytes`], which lets the decoder hand out slices of
//! its read buffer without copying.

use bytes::Bytes;
use std::borrow::Cow;
use std::fmt;

use crate::core::packet::{
    ClientTypeBody, FramingPolicy, PacketKind, Uid, VerificationBody, FILE_HASH_LENGTH,
};
use crate::error::{ProtocolError, Result};

/// One typed message exchanged between the puncher and its peers.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Message {
    kind: PacketKind,
    body: Bytes,
}

impl Message {
    /// Build a message from a kind and a raw body.
    ///
    /// # Errors
    /// - `Construction` when a fixed-length body has the wrong size or a
    ///   bodiless kind is given any bytes
    /// - `Framing` when a variable-length body exceeds 255 bytes
    pub fn new(kind: PacketKind, body: impl Into<Bytes>) -> Result<Self> {
        let body = body.into();
        check_body(kind, body.len())?;
        Ok(Self { kind, body })
    }

    /// Build a message for a bodiless kind.
    ///
    /// # Errors
    /// `Construction` if `kind` is not bodiless.
    pub fn bodiless(kind: PacketKind) -> Result<Self> {
        Self::new(kind, Bytes::new())
    }

    /// Build a message whose body is a single byte.
    pub fn with_byte(kind: PacketKind, body: u8) -> Result<Self> {
        Self::new(kind, vec![body])
    }

    pub fn client_type(role: ClientTypeBody) -> Self {
        Self::trusted(PacketKind::ClientType, Bytes::copy_from_slice(&[role as u8]))
    }

    pub fn uid_assignment(uid: Uid) -> Self {
        Self::trusted(PacketKind::UidAssignment, Bytes::copy_from_slice(&uid))
    }

    pub fn uid_request(uid: Uid) -> Self {
        Self::trusted(PacketKind::UidRequest, Bytes::copy_from_slice(&uid))
    }

    pub fn peer_not_found() -> Self {
        Self::trusted(PacketKind::PeerNotFound, Bytes::new())
    }

    pub fn uploader_ready() -> Self {
        Self::trusted(PacketKind::UploaderReady, Bytes::new())
    }

    /// # Errors
    /// `Framing` if the name is longer than 255 bytes.
    pub fn file_name(name: impl Into<Bytes>) -> Result<Self> {
        Self::new(PacketKind::FileName, name)
    }

    /// Encodes the size big-endian. The wire format does not fix a byte order
    /// for this body, so both ends must use this helper (or agree otherwise).
    pub fn file_size(size: u64) -> Self {
        Self::trusted(
            PacketKind::FileSize,
            Bytes::copy_from_slice(&size.to_be_bytes()),
        )
    }

    pub fn file_hash(digest: [u8; FILE_HASH_LENGTH]) -> Self {
        Self::trusted(PacketKind::FileHash, Bytes::copy_from_slice(&digest))
    }

    pub fn verification(result: VerificationBody) -> Self {
        Self::trusted(
            PacketKind::Verification,
            Bytes::copy_from_slice(&[result as u8]),
        )
    }

    pub fn protocol_error(text: impl Into<Bytes>) -> Result<Self> {
        Self::new(PacketKind::ProtocolError, text)
    }

    pub fn internal_error(text: impl Into<Bytes>) -> Result<Self> {
        Self::new(PacketKind::InternalError, text)
    }

    pub fn halt(reason: impl Into<Bytes>) -> Result<Self> {
        Self::new(PacketKind::Halt, reason)
    }

    /// Used by the typed constructors whose body size is fixed by the type.
    fn trusted(kind: PacketKind, body: Bytes) -> Self {
        debug_assert!(check_body(kind, body.len()).is_ok());
        Self { kind, body }
    }

    /// Build a message the decoder already sized according to the registry.
    pub(crate) fn from_wire(kind: PacketKind, body: Bytes) -> Self {
        Self { kind, body }
    }

    #[inline]
    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    #[inline]
    pub fn framing(&self) -> FramingPolicy {
        self.kind.framing()
    }

    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// Number of bytes this message occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        self.framing().header_len() + self.body.len()
    }

    /// Body of a text kind (file name, error text, halt reason) as UTF-8.
    ///
    /// Returns `None` for kinds that do not carry text.
    pub fn body_text(&self) -> Option<Cow<'_, str>> {
        self.kind
            .is_text()
            .then(|| String::from_utf8_lossy(&self.body))
    }

    /// Size carried by a `FileSize` message, read big-endian.
    pub fn file_size_value(&self) -> Option<u64> {
        if self.kind != PacketKind::FileSize {
            return None;
        }
        let bytes: [u8; 8] = self.body.as_ref().try_into().ok()?;
        Some(u64::from_be_bytes(bytes))
    }

    /// UID carried by a `UidAssignment` or `UidRequest` message.
    pub fn uid(&self) -> Option<Uid> {
        match self.kind {
            PacketKind::UidAssignment | PacketKind::UidRequest => {
                self.body.as_ref().try_into().ok()
            }
            _ => None,
        }
    }
}

/// Check a body length against the kind's framing policy.
pub(crate) fn check_body(kind: PacketKind, len: usize) -> Result<()> {
    let policy = kind.framing();
    let max = policy.max_body_len();
    match policy {
        FramingPolicy::Variable if len > max => Err(ProtocolError::Framing { kind, len }),
        FramingPolicy::Bodiless | FramingPolicy::Fixed(_) if len != max => {
            Err(ProtocolError::Construction {
                kind,
                expected: max,
                actual: len,
            })
        }
        _ => Ok(()),
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Message");
        s.field("kind", &self.kind);
        match self.body_text() {
            Some(text) => s.field("body", &text),
            None => s.field("body", &self.body.as_ref()),
        };
        s.finish()
    }
}
