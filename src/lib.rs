//! # puncher-protocol
//!
//! Message framing and a full-duplex message pump for the puncher
//! rendezvous and file-transfer protocol.
//!
//! A puncher server and two peers (an uploader and a downloader) exchange
//! small typed control messages: role negotiation, UID assignment and lookup,
//! file metadata, verification results and error or halt signals. This crate
//! turns an ordered byte stream into two queues of those messages.
//!
//! ## Example
//! ```rust,no_run
//! use puncher_protocol::{Message, MessagePump, PumpConfig};
//! use puncher_protocol::core::packet::ClientTypeBody;
//! use tokio::net::TcpStream;
//!
//! # async fn run() -> puncher_protocol::Result<()> {
//! let stream = TcpStream::connect("127.0.0.1:7000").await?;
//! let (mut inbound, outbound, pump) = MessagePump::from_tcp(stream, &PumpConfig::default());
//!
//! outbound.send(Message::client_type(ClientTypeBody::Downloader)).await?;
//! while let Some(msg) = inbound.recv().await {
//!     println!("{msg:?}");
//! }
//! if let Some(err) = pump.join().await {
//!     eprintln!("connection ended: {err}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod transport;
pub mod utils;

pub use crate::config::{LoggingConfig, ProtocolConfig, PumpConfig};
pub use crate::core::codec::{decode_from_slice, encode, MessageCodec};
pub use crate::core::message::Message;
pub use crate::core::packet::{FramingPolicy, PacketKind};
pub use crate::error::{ProtocolError, Result};
pub use crate::transport::{Inbound, MessagePump, Outbound, PumpState};
