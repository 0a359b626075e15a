//! # Transport
//!
//! The duplex pump that couples one connection to an inbound and an outbound
//! message queue. Establishing connections (listening, dialing, hole punching)
//! is left to the caller; anything `AsyncRead + AsyncWrite` can be pumped.

pub mod pump;
mod teardown;

pub use pump::{Inbound, MessagePump, Outbound, PumpState};
