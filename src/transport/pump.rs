//! # Duplex Message Pump
//!
//! Binds one connection to two message queues and keeps them in step with
//! the wire until something fails.
//!
//! ```text
//!              +-------------+   decode   +---------+
//!  connection  | reader loop | ---------> | Inbound |  -> application
//!   read half  +-------------+            +---------+
//!
//!              +-------------+   encode   +----------+
//!  connection  | writer loop | <--------- | Outbound |  <- application
//!  write half  +-------------+            +----------+
//! ```
//!
//! The two loops run as separate tokio tasks and touch disjoint halves of the
//! connection, so they share nothing but the teardown signal. The first read,
//! write, encode or decode failure closes both queues together:
//! - [`Inbound::recv`] returns `None` once buffered messages are drained
//! - [`Outbound::send`] fails with [`ProtocolError::ChannelClosed`]
//!
//! A pump is single-use. Reconnecting means a new connection and a new pump.

use futures::{SinkExt, Stream, StreamExt};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::config::{PumpConfig, MAX_QUEUE_CAPACITY};
use crate::core::codec::MessageCodec;
use crate::core::message::Message;
use crate::error::{constants, ProtocolError, Result};
use crate::transport::teardown::Teardown;
use crate::utils::metrics::{global_metrics, Metrics};

/// Lifecycle of a pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    /// Both loops are running.
    Open,
    /// Teardown has started; at least one loop is still winding down.
    Closing,
    /// Both queues are closed and both loops have exited.
    Closed,
}

/// Receiving end of the inbound queue.
///
/// Yields decoded messages in wire order. `None` means the connection is no
/// longer usable and must be treated as a hard disconnect.
#[derive(Debug)]
pub struct Inbound {
    rx: mpsc::Receiver<Message>,
}

impl Inbound {
    /// Wait for the next message.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Take a message if one is already buffered.
    ///
    /// `Ok(None)` means the queue is momentarily empty.
    ///
    /// # Errors
    /// `ChannelClosed` once the pump has torn down and every buffered message
    /// has been taken.
    pub fn try_recv(&mut self) -> Result<Option<Message>> {
        match self.rx.try_recv() {
            Ok(msg) => Ok(Some(msg)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(ProtocolError::ChannelClosed),
        }
    }
}

impl Stream for Inbound {
    type Item = Message;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Message>> {
        self.rx.poll_recv(cx)
    }
}

/// Sending end of the outbound queue.
///
/// Cloning gives another producer on the same FIFO queue.
#[derive(Debug, Clone)]
pub struct Outbound {
    tx: mpsc::Sender<Message>,
    teardown: Arc<Teardown>,
}

impl Outbound {
    /// Queue a message for the writer loop, waiting while the queue is full.
    ///
    /// # Errors
    /// `ChannelClosed` once the pump has started tearing down. The message is
    /// dropped and nothing more is written to the connection.
    pub async fn send(&self, msg: Message) -> Result<()> {
        if self.teardown.is_closed() {
            return Err(ProtocolError::ChannelClosed);
        }
        self.tx
            .send(msg)
            .await
            .map_err(|_| ProtocolError::ChannelClosed)
    }

    /// Queue a message without waiting.
    ///
    /// # Errors
    /// `ChannelClosed` after teardown, `Io` with `WouldBlock` when the queue is
    /// full.
    pub fn try_send(&self, msg: Message) -> Result<()> {
        if self.teardown.is_closed() {
            return Err(ProtocolError::ChannelClosed);
        }
        self.tx.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ProtocolError::Io(io::Error::new(
                io::ErrorKind::WouldBlock,
                "outbound queue full",
            )),
            mpsc::error::TrySendError::Closed(_) => ProtocolError::ChannelClosed,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.teardown.is_closed() || self.tx.is_closed()
    }
}

/// Handle on the two loops serving one connection.
#[derive(Debug)]
pub struct MessagePump {
    peer: String,
    teardown: Arc<Teardown>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl MessagePump {
    /// Start pumping `io`, labelling log lines and errors with `peer`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<T>(
        io: T,
        peer: impl Into<String>,
        config: &PumpConfig,
    ) -> (Inbound, Outbound, MessagePump)
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(io);
        Self::spawn_split(read_half, write_half, peer, config)
    }

    /// Start pumping a TCP connection, labelled with its remote address.
    pub fn from_tcp(stream: TcpStream, config: &PumpConfig) -> (Inbound, Outbound, MessagePump) {
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| String::from("unknown"));
        let (read_half, write_half) = stream.into_split();
        Self::spawn_split(read_half, write_half, peer, config)
    }

    /// Start pumping a connection that is already split into halves.
    ///
    /// Queue capacities are clamped to `1..=MAX_QUEUE_CAPACITY`.
    pub fn spawn_split<R, W>(
        read_half: R,
        write_half: W,
        peer: impl Into<String>,
        config: &PumpConfig,
    ) -> (Inbound, Outbound, MessagePump)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let peer = peer.into();
        let teardown = Arc::new(Teardown::new());
        let (inbound_tx, inbound_rx) = mpsc::channel(queue_capacity(config.inbound_capacity));
        let (outbound_tx, outbound_rx) = mpsc::channel(queue_capacity(config.outbound_capacity));

        let active = ActiveGuard::new(global_metrics());
        info!(peer = %peer, "Message pump started");

        let reader = tokio::spawn(read_loop(
            FramedRead::new(read_half, MessageCodec),
            inbound_tx,
            teardown.clone(),
            peer.clone(),
            active.clone(),
        ));
        let writer = tokio::spawn(write_loop(
            FramedWrite::new(write_half, MessageCodec),
            outbound_rx,
            teardown.clone(),
            peer.clone(),
            active,
        ));

        let inbound = Inbound { rx: inbound_rx };
        let outbound = Outbound {
            tx: outbound_tx,
            teardown: teardown.clone(),
        };
        let pump = MessagePump {
            peer,
            teardown,
            reader,
            writer,
        };

        (inbound, outbound, pump)
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn state(&self) -> PumpState {
        if !self.teardown.is_closed() {
            PumpState::Open
        } else if self.reader.is_finished() && self.writer.is_finished() {
            PumpState::Closed
        } else {
            PumpState::Closing
        }
    }

    /// Tear the pump down without a failure. Idempotent.
    pub fn close(&self) {
        if self.teardown.trigger(None) {
            info!(peer = %self.peer, "Message pump closed by caller");
        }
    }

    /// Wait for both loops to exit.
    ///
    /// Returns the failure that started teardown, or `None` if it was
    /// requested through [`MessagePump::close`] or by dropping [`Inbound`].
    pub async fn join(self) -> Option<ProtocolError> {
        for (name, handle) in [("reader", self.reader), ("writer", self.writer)] {
            if let Err(e) = handle.await {
                error!(peer = %self.peer, task = name, error = %e, "Pump task aborted");
                self.teardown.trigger(None);
            }
        }
        global_metrics().log_metrics();
        self.teardown.take_cause()
    }
}

fn queue_capacity(requested: usize) -> usize {
    requested.clamp(1, MAX_QUEUE_CAPACITY)
}

/// Counts a pump as active until both of its loops have let go of it.
#[derive(Debug)]
struct ActiveGuard(&'static Metrics);

impl ActiveGuard {
    fn new(metrics: &'static Metrics) -> Arc<Self> {
        metrics.pump_started();
        Arc::new(Self(metrics))
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.pump_stopped();
    }
}

/// Record and log a failure, then start teardown.
fn fail(teardown: &Teardown, peer: &str, err: ProtocolError) {
    let metrics = global_metrics();
    match &err {
        ProtocolError::Read { source, .. } if source.kind() == io::ErrorKind::UnexpectedEof => {
            metrics.read_error();
            info!(peer = %peer, "{}", constants::ERR_CONNECTION_CLOSED);
        }
        ProtocolError::Read { .. } => {
            metrics.read_error();
            error!(peer = %peer, error = %err, "Read error");
        }
        ProtocolError::Write { .. } => {
            metrics.write_error();
            error!(peer = %peer, error = %err, "Write error");
        }
        _ => {
            metrics.framing_error();
            warn!(peer = %peer, error = %err, "Framing error");
        }
    }

    if teardown.trigger(Some(err)) {
        debug!(peer = %peer, "Pump teardown started");
    }
}

#[instrument(name = "pump_reader", skip_all, fields(peer = %peer))]
async fn read_loop<R>(
    mut frames: FramedRead<R, MessageCodec>,
    inbound: mpsc::Sender<Message>,
    teardown: Arc<Teardown>,
    peer: String,
    _active: Arc<ActiveGuard>,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = teardown.cancelled() => break,
            next = frames.next() => next,
        };

        let msg = match next {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                fail(&teardown, &peer, ProtocolError::read(peer.as_str(), e));
                break;
            }
            None => {
                let eof = io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    constants::ERR_CONNECTION_CLOSED,
                );
                fail(&teardown, &peer, ProtocolError::read(peer.as_str(), eof.into()));
                break;
            }
        };

        global_metrics().message_received(msg.encoded_len() as u64);
        trace!(kind = %msg.kind(), len = msg.body().len(), "Frame received");

        tokio::select! {
            biased;
            _ = teardown.cancelled() => break,
            sent = inbound.send(msg) => {
                if sent.is_err() {
                    debug!("Inbound queue dropped by application");
                    teardown.trigger(None);
                    break;
                }
            }
        }
    }

    // `inbound` drops here, which closes the inbound queue.
    debug!("Reader stopped");
}

#[instrument(name = "pump_writer", skip_all, fields(peer = %peer))]
async fn write_loop<W>(
    mut sink: FramedWrite<W, MessageCodec>,
    mut outbound: mpsc::Receiver<Message>,
    teardown: Arc<Teardown>,
    peer: String,
    _active: Arc<ActiveGuard>,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = teardown.cancelled() => break,
            next = outbound.recv() => next,
        };

        let Some(msg) = next else {
            // Every Outbound handle is gone; keep the read side serving
            // until the pump tears down for some other reason.
            debug!("Outbound queue dropped by application");
            teardown.cancelled().await;
            break;
        };

        let kind = msg.kind();
        let len = msg.encoded_len() as u64;
        let written = tokio::select! {
            biased;
            _ = teardown.cancelled() => break,
            written = sink.send(msg) => written,
        };

        match written {
            Ok(()) => {
                global_metrics().message_sent(len);
                trace!(kind = %kind, len, "Frame written");
            }
            Err(e) => {
                fail(&teardown, &peer, ProtocolError::write(peer.as_str(), e));
                break;
            }
        }
    }

    outbound.close();
    debug!("Writer stopped");
}
