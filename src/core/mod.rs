//! # Core Protocol Components
//!
//! Packet registry, message model and the codec between them and the wire.
//!
//! ## Components
//! - **Packet**: the closed set of packet kinds and each kind's framing policy
//! - **Message**: a packet kind plus a body validated against that policy
//! - **Codec**: encode/decode functions and a tokio-util codec for streams
//!
//! ## Wire Format
//! ```text
//! [Kind(1)] [Length(1), variable kinds only] [Body(0-255)]
//! ```
//!
//! There is no magic, version or checksum: the connection is assumed to be
//! ordered and reliable, and an undeclared kind byte fails the decode.

pub mod codec;
pub mod message;
pub mod packet;
