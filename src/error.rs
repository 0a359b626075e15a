//! # Error Types
//!
//! Error handling for message framing and the duplex pump.
//!
//! This module defines every failure the core can report, from a message
//! built with the wrong body size up to a connection dropping mid-frame.
//!
//! ## Error Categories
//! - **Construction**: a body that violates its kind's framing policy
//! - **Framing**: an oversized variable body, or an undeclared packet kind
//! - **Transport**: read or write failures, tagged with the peer identity
//! - **Queue**: enqueueing onto a pump that has already torn down
//! - **Configuration**: invalid or unreadable configuration
//!
//! Construction and framing errors are local: they abort one operation and
//! never touch a connection unless raised inside a pump loop. Transport errors
//! always end the pump that observed them.
//!
//! ## Example Usage
//! ```rust
//! use puncher_protocol::core::message::Message;
//! use puncher_protocol::core::packet::PacketKind;
//! use puncher_protocol::error::ProtocolError;
//!
//! let err = Message::new(PacketKind::FileHash, vec![0u8; 31]).unwrap_err();
//! assert!(matches!(err, ProtocolError::Construction { expected: 32, actual: 31, .. }));
//! ```

use std::io;
use thiserror::Error;

use crate::core::packet::PacketKind;

/// Error message constants shared by log lines and error payloads.
pub mod constants {
    pub const ERR_CONNECTION_CLOSED: &str = "Connection closed by peer";
    pub const ERR_INCOMPLETE_FRAME: &str = "Incomplete frame";
}

// ProtocolError is the error type for every operation in the crate
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A fixed-length or bodiless kind was given a body of the wrong size.
    #[error("{kind} body must be exactly {expected} bytes (got {actual})")]
    Construction {
        kind: PacketKind,
        expected: usize,
        actual: usize,
    },

    /// A variable-length body does not fit behind a one-byte length prefix.
    #[error("length of {kind} body cannot fit in 1 byte (got {len} bytes)")]
    Framing { kind: PacketKind, len: usize },

    #[error("Unknown packet kind: 0x{0:02X}")]
    UnknownPacketKind(u8),

    #[error("{peer} -- Read error: {source}")]
    Read {
        peer: String,
        #[source]
        source: io::Error,
    },

    #[error("{peer} -- Write error: {source}")]
    Write {
        peer: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Message channel closed")]
    ChannelClosed,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProtocolError {
    /// Wrap an error raised while reading from `peer`.
    ///
    /// Codec errors surfaced through the `Io` variant are unwrapped so the
    /// peer label is attached to the underlying transport failure; framing
    /// errors keep their own variant.
    pub fn read(peer: impl Into<String>, err: ProtocolError) -> Self {
        match err {
            ProtocolError::Io(source) => ProtocolError::Read {
                peer: peer.into(),
                source,
            },
            other => other,
        }
    }

    /// Wrap an error raised while writing to `peer`.
    pub fn write(peer: impl Into<String>, err: ProtocolError) -> Self {
        match err {
            ProtocolError::Io(source) => ProtocolError::Write {
                peer: peer.into(),
                source,
            },
            other => other,
        }
    }

    /// True for failures of the underlying connection.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ProtocolError::Read { .. } | ProtocolError::Write { .. } | ProtocolError::Io(_)
        )
    }

    /// True for violations of a packet kind's framing policy.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            ProtocolError::Framing { .. }
                | ProtocolError::Construction { .. }
                | ProtocolError::UnknownPacketKind(_)
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
