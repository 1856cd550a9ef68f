//! Integration tests for ReaderConnection.
//!
//! Reader-initiated sessions run over an in-memory duplex pipe; the device
//! end is a plain `Framed` stream so the tests see exactly what the
//! connection puts on the wire.

mod common;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tagwire_core::ReaderErrorKind;
use tagwire_network::{ConnectionState, ReaderConnection};
use tagwire_protocol::{Message, MessageBody, MessageType, TagReportEntry};
use tokio::io::AsyncWriteExt;

fn opaque(message_type: u16, payload: &[u8]) -> Message {
    Message::new(MessageBody::Other {
        message_type,
        payload: Bytes::copy_from_slice(payload),
    })
}

#[tokio::test]
async fn test_sent_messages_reach_transport_in_order() {
    let (reader, mut device) = common::connect_over_duplex("fifo").await;

    let mut ids = Vec::new();
    for i in 0..50u8 {
        ids.push(reader.send(opaque(100, &[i])).unwrap());
    }

    for (i, id) in ids.iter().enumerate() {
        let frame = device.next().await.unwrap().unwrap();
        let message = Message::decode(&frame).unwrap();
        assert_eq!(message.id, *id);
        assert_eq!(
            message.body,
            MessageBody::Other {
                message_type: 100,
                payload: Bytes::copy_from_slice(&[i as u8]),
            }
        );
    }

    assert!(ids.windows(2).all(|w| w[0] < w[1]));
    reader.disconnect();
}

#[tokio::test]
async fn test_disconnect_is_idempotent() {
    let (reader, _device) = common::connect_over_duplex("idem").await;
    assert_eq!(reader.state(), ConnectionState::Connected);

    reader.disconnect();
    assert_eq!(reader.state(), ConnectionState::Disconnected);

    reader.disconnect();
    assert_eq!(reader.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_disconnect_closes_transport() {
    let (reader, mut device) = common::connect_over_duplex("close").await;

    reader.disconnect();

    let next = tokio::time::timeout(Duration::from_secs(2), device.next())
        .await
        .unwrap();
    assert!(next.is_none());
}

#[tokio::test]
async fn test_send_while_disconnected_reports_connection_failed() {
    let reader = ReaderConnection::new("idle");
    let mut recorded = common::record(&reader);

    assert_eq!(reader.send(Message::keepalive_ack()), None);

    let error = recorded.next_error(Duration::from_secs(1)).await;
    assert_eq!(error.kind, ReaderErrorKind::ConnectionFailed);
}

#[tokio::test]
async fn test_oversized_message_dropped_connection_kept() {
    let (reader, mut device) = common::connect_over_duplex("big").await;
    let mut recorded = common::record(&reader);

    let too_big = opaque(100, &vec![0u8; 70 * 1024]);
    assert_eq!(reader.send(too_big), None);

    let error = recorded.next_error(Duration::from_secs(1)).await;
    assert_eq!(error.kind, ReaderErrorKind::ProtocolError);
    assert!(reader.is_connected());

    let id = reader.send(opaque(100, b"ok")).unwrap();
    let frame = device.next().await.unwrap().unwrap();
    assert_eq!(Message::decode(&frame).unwrap().id, id);
    reader.disconnect();
}

#[tokio::test]
async fn test_send_raw_decodes_frame() {
    let (reader, mut device) = common::connect_over_duplex("raw").await;
    let mut recorded = common::record(&reader);

    let wire = opaque(120, b"cfg").with_id(999).to_bytes().unwrap();
    let id = reader.send_raw(&wire).unwrap();

    let frame = device.next().await.unwrap().unwrap();
    let message = Message::decode(&frame).unwrap();
    assert_eq!(message.id, id);
    assert_eq!(message.message_type(), 120);

    assert_eq!(reader.send_raw(b"\x04\x3e\x00"), None);
    let error = recorded.next_error(Duration::from_secs(1)).await;
    assert_eq!(error.kind, ReaderErrorKind::ProtocolError);
    reader.disconnect();
}

#[tokio::test]
async fn test_inbound_frames_reach_listener_in_order() {
    let (reader, mut device) = common::connect_over_duplex("inbound").await;
    let mut recorded = common::record(&reader);

    for n in 0..10u16 {
        let report = Message::tag_report(vec![TagReportEntry {
            epc: vec![0x30, n as u8],
            antenna_id: n,
            timestamp_ms: 0,
            tid: None,
        }])
        .with_id(u32::from(n));
        device.send(report).await.unwrap();
    }

    for n in 0..10u32 {
        assert_eq!(recorded.next_frame().await.id, n);
    }
    assert_eq!(reader.metadata().packets_received, 10);
    reader.disconnect();
}

#[tokio::test]
async fn test_keepalive_is_acknowledged_not_delivered() {
    let (reader, mut device) = common::connect_over_duplex("ka").await;
    let mut recorded = common::record(&reader);

    device.send(Message::keepalive().with_id(5)).await.unwrap();

    let frame = device.next().await.unwrap().unwrap();
    let ack = Message::decode(&frame).unwrap();
    assert_eq!(ack.message_type(), MessageType::KeepaliveAck.code());

    // A following report is the first thing the listener sees.
    device.send(Message::tag_report(vec![]).with_id(6)).await.unwrap();
    assert_eq!(recorded.next_frame().await.id, 6);

    let meta = reader.metadata();
    assert!(meta.alive);
    assert_eq!(meta.packets_received, 2);
    reader.disconnect();
}

#[tokio::test]
async fn test_keepalive_delivered_when_reporting_enabled() {
    let (reader, mut device) = common::connect_over_duplex("ka-report").await;
    reader.set_report_keepalive(true);
    let mut recorded = common::record(&reader);

    device.send(Message::keepalive().with_id(8)).await.unwrap();

    let delivered = recorded.next_frame().await;
    assert!(delivered.is_keepalive());
    reader.disconnect();
}

#[tokio::test]
async fn test_malformed_body_drops_only_that_frame() {
    let (reader, mut device) = common::connect_over_duplex("bad-body").await;
    let mut recorded = common::record(&reader);

    // SET_READER_CONFIG_RESPONSE needs a two byte status; send one byte.
    device
        .get_mut()
        .write_all(&[0x04, 0x0D, 0, 0, 0, 11, 0, 0, 0, 1, 0xFF])
        .await
        .unwrap();
    device.send(Message::tag_report(vec![]).with_id(2)).await.unwrap();

    let error = recorded.next_error(Duration::from_secs(1)).await;
    assert_eq!(error.kind, ReaderErrorKind::ProtocolError);
    assert_eq!(recorded.next_frame().await.id, 2);
    assert!(reader.is_connected());
    reader.disconnect();
}

#[tokio::test]
async fn test_peer_close_reports_reader_lost_once() {
    let (reader, device) = common::connect_over_duplex("eof").await;
    let mut recorded = common::record(&reader);

    drop(device);

    let error = recorded.next_error(Duration::from_secs(2)).await;
    assert_eq!(error.kind, ReaderErrorKind::ReaderLost);
    assert_eq!(reader.state(), ConnectionState::Disconnected);

    reader.disconnect();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(recorded.drain_errors(ReaderErrorKind::ReaderLost), 0);
}

#[tokio::test]
async fn test_connect_without_transport_fails() {
    let reader = ReaderConnection::new("no-transport");
    let mut recorded = common::record(&reader);

    assert!(reader.connect(false).await.is_err());
    assert_eq!(reader.state(), ConnectionState::Disconnected);
    assert_eq!(
        recorded.next_error(Duration::from_secs(1)).await.kind,
        ReaderErrorKind::ConnectionFailed
    );
}

#[tokio::test]
async fn test_client_connect_without_address_fails() {
    let reader = ReaderConnection::new("no-address");
    let mut recorded = common::record(&reader);

    let error = reader.connect(true).await.unwrap_err();
    assert_eq!(error.kind(), ReaderErrorKind::ConnectionFailed);
    assert_eq!(reader.state(), ConnectionState::Disconnected);
    assert_eq!(
        recorded.next_error(Duration::from_secs(1)).await.kind,
        ReaderErrorKind::ConnectionFailed
    );
}

#[tokio::test]
async fn test_connect_twice_keeps_session() {
    let (reader, _device) = common::connect_over_duplex("twice").await;
    let session = reader.metadata().session_id;

    reader.connect(false).await.unwrap();

    assert!(reader.is_connected());
    assert_eq!(reader.metadata().session_id, session);
    reader.disconnect();
}

#[tokio::test]
async fn test_reconnect_starts_new_session() {
    let (reader, _device) = common::connect_over_duplex("again").await;
    let first = reader.metadata().session_id.unwrap();

    let (host, _device2) = tokio::io::duplex(1024);
    reader.attach(host);
    reader.reconnect().await.unwrap();

    let meta = reader.metadata();
    assert!(meta.connected);
    assert_ne!(meta.session_id.unwrap(), first);
    assert_eq!(meta.packets_received, 0);
    reader.disconnect();
}
