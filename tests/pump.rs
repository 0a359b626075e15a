//! Integration tests for the duplex message pump
//!
//! Uses in-memory duplex streams and deliberately broken connections to
//! exercise ordering and joint teardown.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::StreamExt;
use puncher_protocol::core::codec::encode;
use puncher_protocol::core::message::Message;
use puncher_protocol::core::packet::{ClientTypeBody, PacketKind, VerificationBody};
use puncher_protocol::error::ProtocolError;
use puncher_protocol::transport::{MessagePump, PumpState};
use puncher_protocol::utils::metrics::global_metrics;
use puncher_protocol::PumpConfig;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

/// Read half that fails on first use.
struct BrokenRead;

impl AsyncRead for BrokenRead {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "connection reset",
        )))
    }
}

/// Write half that fails on first use.
struct BrokenWrite;

impl AsyncWrite for BrokenWrite {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe")))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[tokio::test]
async fn test_outbound_bytes_follow_enqueue_order() {
    let (local, mut remote) = tokio::io::duplex(4096);
    let (_inbound, outbound, _pump) = MessagePump::spawn(local, "remote", &PumpConfig::default());

    let msgs: Vec<Message> = vec![
        Message::client_type(ClientTypeBody::Uploader),
        Message::uid_request([9u8; 16]),
        Message::file_name("photo.jpg").unwrap(),
        Message::file_size(1 << 20),
        Message::file_hash([0xCD; 32]),
        Message::halt("done").unwrap(),
    ];
    let expected: Vec<u8> = msgs.iter().flat_map(|m| encode(m).unwrap()).collect();

    for msg in msgs {
        outbound.send(msg).await.unwrap();
    }

    let mut got = vec![0u8; expected.len()];
    timeout(WAIT, remote.read_exact(&mut got))
        .await
        .expect("timed out")
        .unwrap();
    assert_eq!(got, expected);
}

#[tokio::test]
async fn test_inbound_with_small_queue_keeps_order() {
    let (local, mut remote) = tokio::io::duplex(4096);
    let config = PumpConfig {
        inbound_capacity: 1,
        outbound_capacity: 1,
    };
    let (inbound, _outbound, _pump) = MessagePump::spawn(local, "remote", &config);

    let mut wire = Vec::new();
    for i in 0..20u8 {
        wire.extend(encode(&Message::protocol_error(vec![i; i as usize]).unwrap()).unwrap());
    }
    remote.write_all(&wire).await.unwrap();

    let received: Vec<Message> = timeout(WAIT, inbound.take(20).collect())
        .await
        .expect("timed out");
    for (i, msg) in received.iter().enumerate() {
        assert_eq!(msg.kind(), PacketKind::ProtocolError);
        assert_eq!(msg.body(), vec![i as u8; i].as_slice());
    }
}

#[tokio::test]
async fn test_remote_close_tears_down_both_queues() {
    let (conn_read, remote_write) = tokio::io::duplex(256);
    let (conn_write, mut remote_read) = tokio::io::duplex(256);
    let (mut inbound, outbound, pump) =
        MessagePump::spawn_split(conn_read, conn_write, "10.0.0.7:5000", &PumpConfig::default());

    outbound.send(Message::uploader_ready()).await.unwrap();
    let mut first = [0u8; 1];
    remote_read.read_exact(&mut first).await.unwrap();
    assert_eq!(first, [0x04]);

    drop(remote_write);

    assert!(timeout(WAIT, inbound.recv()).await.expect("timed out").is_none());
    assert!(matches!(
        outbound.send(Message::peer_not_found()).await,
        Err(ProtocolError::ChannelClosed)
    ));
    assert!(outbound.is_closed());

    let cause = timeout(WAIT, pump.join()).await.expect("timed out");
    match cause {
        Some(ProtocolError::Read { peer, source }) => {
            assert_eq!(peer, "10.0.0.7:5000");
            assert_eq!(source.kind(), io::ErrorKind::UnexpectedEof);
        }
        other => panic!("Unexpected: {other:?}"),
    }

    // Nothing was written after teardown and the write half is gone
    let mut rest = Vec::new();
    remote_read.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_read_failure_closes_outbound() {
    let (conn_write, mut remote_read) = tokio::io::duplex(256);
    let (mut inbound, outbound, pump) =
        MessagePump::spawn_split(BrokenRead, conn_write, "peer", &PumpConfig::default());

    assert!(timeout(WAIT, inbound.recv()).await.expect("timed out").is_none());
    assert!(outbound
        .try_send(Message::verification(VerificationBody::Good))
        .is_err());

    let cause = timeout(WAIT, pump.join()).await.expect("timed out");
    assert!(matches!(
        cause,
        Some(ProtocolError::Read { ref source, .. }) if source.kind() == io::ErrorKind::ConnectionReset
    ));

    let mut rest = Vec::new();
    remote_read.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_write_failure_closes_inbound() {
    let (conn_read, _remote_write) = tokio::io::duplex(256);
    let (mut inbound, outbound, pump) =
        MessagePump::spawn_split(conn_read, BrokenWrite, "peer", &PumpConfig::default());

    outbound.send(Message::uploader_ready()).await.unwrap();

    assert!(timeout(WAIT, inbound.recv()).await.expect("timed out").is_none());
    let cause = timeout(WAIT, pump.join()).await.expect("timed out");
    let err = cause.expect("write failure recorded");
    assert!(err.is_transport());
    assert!(matches!(err, ProtocolError::Write { .. }));
    assert!(matches!(
        outbound.send(Message::uploader_ready()).await,
        Err(ProtocolError::ChannelClosed)
    ));
}

#[tokio::test]
async fn test_unknown_kind_tears_down() {
    let (local, mut remote) = tokio::io::duplex(256);
    let (mut inbound, outbound, pump) = MessagePump::spawn(local, "peer", &PumpConfig::default());

    remote.write_all(&[0x04, 0xEE, 0x01, 0x02]).await.unwrap();

    let first = timeout(WAIT, inbound.recv()).await.expect("timed out");
    assert_eq!(first.map(|m| m.kind()), Some(PacketKind::UploaderReady));
    assert!(timeout(WAIT, inbound.recv()).await.expect("timed out").is_none());

    let cause = timeout(WAIT, pump.join()).await.expect("timed out");
    assert!(matches!(cause, Some(ProtocolError::UnknownPacketKind(0xEE))));
    assert!(outbound.is_closed());
}

#[tokio::test]
async fn test_truncated_frame_is_never_delivered() {
    let (local, mut remote) = tokio::io::duplex(256);
    let (mut inbound, _outbound, pump) = MessagePump::spawn(local, "peer", &PumpConfig::default());

    // FileHash needs 32 body bytes; send 3 and hang up
    remote.write_all(&[0x07, 1, 2, 3]).await.unwrap();
    drop(remote);

    assert!(timeout(WAIT, inbound.recv()).await.expect("timed out").is_none());
    let cause = timeout(WAIT, pump.join()).await.expect("timed out");
    assert!(cause.expect("read failure recorded").is_transport());
}

#[tokio::test]
async fn test_buffered_messages_survive_teardown() {
    let (local, mut remote) = tokio::io::duplex(256);
    let (mut inbound, _outbound, pump) = MessagePump::spawn(local, "peer", &PumpConfig::default());

    remote.write_all(&[0x03, 0x08, 0x01]).await.unwrap();
    drop(remote);

    let pump_done = timeout(WAIT, pump.join()).await.expect("timed out");
    assert!(pump_done.is_some());

    assert_eq!(inbound.recv().await.unwrap().kind(), PacketKind::PeerNotFound);
    let verdict = inbound.recv().await.unwrap();
    assert_eq!(
        VerificationBody::try_from(verdict.body()[0]),
        Ok(VerificationBody::Bad)
    );
    assert!(inbound.recv().await.is_none());
}

#[tokio::test]
async fn test_state_moves_from_open_to_closed() {
    let (local, _remote) = tokio::io::duplex(64);
    let (_inbound, _outbound, pump) = MessagePump::spawn(local, "peer", &PumpConfig::default());
    assert_eq!(pump.state(), PumpState::Open);

    pump.close();
    assert_ne!(pump.state(), PumpState::Open);

    timeout(WAIT, async {
        while pump.state() != PumpState::Closed {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("pump never closed");
}

#[tokio::test]
async fn test_back_to_back_pumps_exchange_handshake() {
    let (a, b) = tokio::io::duplex(1024);
    let config = PumpConfig::default();
    let (mut server_in, server_out, server) = MessagePump::spawn(a, "downloader", &config);
    let (mut client_in, client_out, client) = MessagePump::spawn(b, "puncher", &config);

    client_out
        .send(Message::client_type(ClientTypeBody::Downloader))
        .await
        .unwrap();

    let hello = timeout(WAIT, server_in.recv()).await.expect("timed out").unwrap();
    assert_eq!(hello.kind(), PacketKind::ClientType);
    assert_eq!(
        ClientTypeBody::try_from(hello.body()[0]),
        Ok(ClientTypeBody::Downloader)
    );

    let uid = [0x11u8; 16];
    server_out.send(Message::uid_assignment(uid)).await.unwrap();
    let assigned = timeout(WAIT, client_in.recv()).await.expect("timed out").unwrap();
    assert_eq!(assigned.uid(), Some(uid));

    server_out.send(Message::halt("shutting down").unwrap()).await.unwrap();
    let halt = timeout(WAIT, client_in.recv()).await.expect("timed out").unwrap();
    assert_eq!(halt.body_text().as_deref(), Some("shutting down"));

    client.close();
    assert!(timeout(WAIT, client.join()).await.expect("timed out").is_none());

    // Closing one side looks like a hang-up to the other
    assert!(timeout(WAIT, server_in.recv()).await.expect("timed out").is_none());
    assert!(timeout(WAIT, server.join()).await.expect("timed out").is_some());
}

#[tokio::test]
async fn test_tcp_pump_labels_peer_address() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });
    let stream = TcpStream::connect(addr).await.unwrap();
    let mut server_side = accept.await.unwrap();

    let (_inbound, outbound, pump) = MessagePump::from_tcp(stream, &PumpConfig::default());
    assert_eq!(pump.peer(), addr.to_string());

    outbound.send(Message::peer_not_found()).await.unwrap();
    let mut byte = [0u8; 1];
    timeout(WAIT, server_side.read_exact(&mut byte))
        .await
        .expect("timed out")
        .unwrap();
    assert_eq!(byte, [0x03]);
}

#[tokio::test]
async fn test_pump_records_global_metrics() {
    let before = global_metrics().snapshot();

    let (local, mut remote) = tokio::io::duplex(256);
    let (mut inbound, outbound, pump) = MessagePump::spawn(local, "peer", &PumpConfig::default());

    outbound.send(Message::file_size(7)).await.unwrap();
    let mut frame = [0u8; 9];
    timeout(WAIT, remote.read_exact(&mut frame))
        .await
        .expect("timed out")
        .unwrap();

    remote.write_all(&[0x04]).await.unwrap();
    assert!(timeout(WAIT, inbound.recv()).await.expect("timed out").is_some());
    drop(remote);
    assert!(timeout(WAIT, pump.join()).await.expect("timed out").is_some());

    // Other tests share the global counters, so only check for growth
    let after = global_metrics().snapshot();
    assert!(after.pumps_total > before.pumps_total);
    assert!(after.messages_sent > before.messages_sent);
    assert!(after.bytes_sent >= before.bytes_sent + 9);
    assert!(after.messages_received > before.messages_received);
    assert!(after.read_errors > before.read_errors);
}
