//! # Packet Registry
//!
//! The closed catalog of packet kinds and the framing policy of each.
//!
//! Every frame starts with a one-byte [`PacketKind`]. The kind alone decides how
//! the body is laid out on the wire, so the policy is a pure function of the
//! kind and is never stored alongside a message.
//!
//! ```text
//! bodiless:  [kind]
//! fixed(N):  [kind] [N body bytes]
//! variable:  [kind] [len] [len body bytes]   (len <= 255)
//! ```

use std::fmt;

/// Length of the peer identifier issued by the puncher server.
pub const UID_LENGTH: usize = 16;

/// Length of the `FileSize` body (a 64-bit size).
pub const FILE_SIZE_LENGTH: usize = 8;

/// Length of the `FileHash` body (a SHA-256 digest).
pub const FILE_HASH_LENGTH: usize = 32;

/// Largest body a variable-length kind can carry behind its length byte.
pub const MAX_VARIABLE_BODY: usize = u8::MAX as usize;

/// Peer identifier assigned by the puncher to a downloader.
pub type Uid = [u8; UID_LENGTH];

/// Semantic tag carried in the first byte of every frame.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PacketKind {
    /// Uploader or downloader announcing its role to the puncher.
    ClientType = 0x00,
    /// Puncher telling a downloader its UID.
    UidAssignment = 0x01,
    /// Uploader asking the puncher for the downloader with this UID.
    UidRequest = 0x02,
    /// Puncher telling an uploader the requested UID is unknown.
    PeerNotFound = 0x03,
    /// Puncher telling a downloader that an uploader is ready to send.
    UploaderReady = 0x04,
    /// Name of the file about to be sent.
    FileName = 0x05,
    /// Size of the file about to be sent.
    FileSize = 0x06,
    /// Digest of the file about to be sent.
    FileHash = 0x07,
    /// Downloader reporting whether the received file matched its hash.
    Verification = 0x08,
    /// Sender received unexpected or invalid data.
    ProtocolError = 0x09,
    /// Sender hit an internal failure.
    InternalError = 0x0A,
    /// All connections should close; no further communication follows.
    Halt = 0x0B,
}

impl PacketKind {
    /// Every declared kind, in tag order.
    pub const ALL: [PacketKind; 12] = [
        PacketKind::ClientType,
        PacketKind::UidAssignment,
        PacketKind::UidRequest,
        PacketKind::PeerNotFound,
        PacketKind::UploaderReady,
        PacketKind::FileName,
        PacketKind::FileSize,
        PacketKind::FileHash,
        PacketKind::Verification,
        PacketKind::ProtocolError,
        PacketKind::InternalError,
        PacketKind::Halt,
    ];

    /// Look up a kind by its wire tag.
    #[inline]
    pub const fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0x00 => Some(PacketKind::ClientType),
            0x01 => Some(PacketKind::UidAssignment),
            0x02 => Some(PacketKind::UidRequest),
            0x03 => Some(PacketKind::PeerNotFound),
            0x04 => Some(PacketKind::UploaderReady),
            0x05 => Some(PacketKind::FileName),
            0x06 => Some(PacketKind::FileSize),
            0x07 => Some(PacketKind::FileHash),
            0x08 => Some(PacketKind::Verification),
            0x09 => Some(PacketKind::ProtocolError),
            0x0A => Some(PacketKind::InternalError),
            0x0B => Some(PacketKind::Halt),
            _ => None,
        }
    }

    /// The wire tag of this kind.
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// How this kind's body is framed.
    #[inline]
    pub const fn framing(self) -> FramingPolicy {
        match self {
            PacketKind::PeerNotFound | PacketKind::UploaderReady => FramingPolicy::Bodiless,
            PacketKind::ClientType | PacketKind::Verification => FramingPolicy::Fixed(1),
            PacketKind::UidAssignment | PacketKind::UidRequest => {
                FramingPolicy::Fixed(UID_LENGTH as u8)
            }
            PacketKind::FileSize => FramingPolicy::Fixed(FILE_SIZE_LENGTH as u8),
            PacketKind::FileHash => FramingPolicy::Fixed(FILE_HASH_LENGTH as u8),
            PacketKind::FileName
            | PacketKind::ProtocolError
            | PacketKind::InternalError
            | PacketKind::Halt => FramingPolicy::Variable,
        }
    }

    /// Stable name used in logs and error messages.
    pub const fn name(self) -> &'static str {
        match self {
            PacketKind::ClientType => "ClientType",
            PacketKind::UidAssignment => "UidAssignment",
            PacketKind::UidRequest => "UidRequest",
            PacketKind::PeerNotFound => "PeerNotFound",
            PacketKind::UploaderReady => "UploaderReady",
            PacketKind::FileName => "FileName",
            PacketKind::FileSize => "FileSize",
            PacketKind::FileHash => "FileHash",
            PacketKind::Verification => "Verification",
            PacketKind::ProtocolError => "ProtocolError",
            PacketKind::InternalError => "InternalError",
            PacketKind::Halt => "Halt",
        }
    }

    /// True for the kinds whose body is free-form text.
    pub const fn is_text(self) -> bool {
        matches!(
            self,
            PacketKind::FileName
                | PacketKind::ProtocolError
                | PacketKind::InternalError
                | PacketKind::Halt
        )
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<PacketKind> for u8 {
    fn from(kind: PacketKind) -> Self {
        kind.as_u8()
    }
}

impl TryFrom<u8> for PacketKind {
    type Error = crate::error::ProtocolError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        PacketKind::from_u8(tag).ok_or(crate::error::ProtocolError::UnknownPacketKind(tag))
    }
}

/// Wire layout of a packet kind's body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingPolicy {
    /// No body at all.
    Bodiless,
    /// Exactly this many body bytes, no length prefix.
    Fixed(u8),
    /// A one-byte length followed by that many body bytes.
    Variable,
}

impl FramingPolicy {
    /// Whether the encoder must emit a length byte after the tag.
    #[inline]
    pub const fn has_length_prefix(self) -> bool {
        matches!(self, FramingPolicy::Variable)
    }

    /// Upper bound on the body length under this policy.
    #[inline]
    pub const fn max_body_len(self) -> usize {
        match self {
            FramingPolicy::Bodiless => 0,
            FramingPolicy::Fixed(n) => n as usize,
            FramingPolicy::Variable => MAX_VARIABLE_BODY,
        }
    }

    /// Bytes on the wire before the body starts.
    #[inline]
    pub const fn header_len(self) -> usize {
        if self.has_length_prefix() {
            2
        } else {
            1
        }
    }
}

/// Role announced in a `ClientType` body.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientTypeBody {
    Downloader = 0x00,
    Uploader = 0x01,
}

impl TryFrom<u8> for ClientTypeBody {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(ClientTypeBody::Downloader),
            0x01 => Ok(ClientTypeBody::Uploader),
            other => Err(other),
        }
    }
}

/// Outcome carried in a `Verification` body.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationBody {
    Good = 0x00,
    Bad = 0x01,
}

impl TryFrom<u8> for VerificationBody {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(VerificationBody::Good),
            0x01 => Ok(VerificationBody::Bad),
            other => Err(other),
        }
    }
}
