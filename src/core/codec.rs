//! # Message Codec
//!
//! Translation between [`Message`] values and their wire bytes.
//!
//! Three entry points share one framing rule set:
//! - [`encode`] / [`encode_into`] and [`decode_from_slice`] for in-memory buffers
//! - [`read_message`] / [`write_message`] for any tokio `AsyncRead` / `AsyncWrite`
//! - [`MessageCodec`] for `tokio_util::codec::{FramedRead, FramedWrite}`
//!
//! Decoding never yields a partial message. An undeclared packet tag is a
//! hard error; it is never guessed to be variable-length.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::message::{check_body, Message};
use crate::core::packet::{FramingPolicy, PacketKind};
use crate::error::{constants, ProtocolError, Result};

/// Encode a message into a freshly allocated buffer.
///
/// # Errors
/// `Framing` if a variable-length body exceeds 255 bytes. Nothing is written
/// in that case.
pub fn encode(msg: &Message) -> Result<Vec<u8>> {
    let mut buf = BytesMut::with_capacity(msg.encoded_len());
    encode_into(msg, &mut buf)?;
    Ok(buf.to_vec())
}

/// Append the wire form of `msg` to `dst`.
///
/// The body length is checked again before anything is appended, so an
/// error leaves `dst` exactly as it was.
pub fn encode_into(msg: &Message, dst: &mut BytesMut) -> Result<()> {
    let kind = msg.kind();
    let body = msg.body();
    check_body(kind, body.len())?;

    dst.reserve(msg.encoded_len());
    dst.put_u8(kind.as_u8());
    if kind.framing().has_length_prefix() {
        dst.put_u8(body.len() as u8);
    }
    dst.extend_from_slice(body);
    Ok(())
}

/// Decode the first frame in `src`.
///
/// Returns the message and the number of bytes it occupied; trailing bytes are
/// left for the caller.
///
/// # Errors
/// - `UnknownPacketKind` for an undeclared tag
/// - `Io` with `UnexpectedEof` when `src` ends before the frame does
pub fn decode_from_slice(src: &[u8]) -> Result<(Message, usize)> {
    let mut buf = BytesMut::from(src);
    match MessageCodec.decode(&mut buf)? {
        Some(msg) => Ok((msg, src.len() - buf.len())),
        None => Err(ProtocolError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            constants::ERR_INCOMPLETE_FRAME,
        ))),
    }
}

/// Read exactly one frame from `reader`.
///
/// Follows the frame layout step by step: tag, then the length byte for
/// variable kinds, then the body. A short read at any step fails the whole
/// call with a `Read` error naming `peer`.
pub async fn read_message<R>(reader: &mut R, peer: &str) -> Result<Message>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let tag = reader
        .read_u8()
        .await
        .map_err(|source| read_error(peer, source))?;
    let kind = PacketKind::try_from(tag)?;

    let len = match kind.framing() {
        FramingPolicy::Bodiless => 0,
        FramingPolicy::Fixed(n) => n as usize,
        FramingPolicy::Variable => reader
            .read_u8()
            .await
            .map_err(|source| read_error(peer, source))? as usize,
    };

    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|source| read_error(peer, source))?;

    Ok(Message::from_wire(kind, Bytes::from(body)))
}

/// Encode `msg` and write it to `writer` in one call.
pub async fn write_message<W>(writer: &mut W, msg: &Message, peer: &str) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let data = encode(msg)?;
    writer
        .write_all(&data)
        .await
        .map_err(|source| ProtocolError::Write {
            peer: peer.to_string(),
            source,
        })
}

fn read_error(peer: &str, source: io::Error) -> ProtocolError {
    ProtocolError::Read {
        peer: peer.to_string(),
        source,
    }
}

/// Stateless tokio-util codec for [`Message`] frames.
///
/// Every frame is self-describing from its first one or two bytes, so the
/// decoder keeps no state between calls: it waits until the whole frame is
/// buffered, then splits it off without copying the body.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageCodec;

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>> {
        let Some(&tag) = src.first() else {
            return Ok(None);
        };
        let kind = PacketKind::try_from(tag)?;
        let policy = kind.framing();

        let body_len = match policy {
            FramingPolicy::Bodiless => 0,
            FramingPolicy::Fixed(n) => n as usize,
            FramingPolicy::Variable => match src.get(1) {
                Some(&len) => len as usize,
                None => {
                    src.reserve(1);
                    return Ok(None);
                }
            },
        };

        let frame_len = policy.header_len() + body_len;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        src.advance(policy.header_len());
        let body = src.split_to(body_len).freeze();
        Ok(Some(Message::from_wire(kind, body)))
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = ProtocolError;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> Result<()> {
        encode_into(&msg, dst)
    }
}

impl Encoder<&Message> for MessageCodec {
    type Error = ProtocolError;

    fn encode(&mut self, msg: &Message, dst: &mut BytesMut) -> Result<()> {
        encode_into(msg, dst)
    }
}
