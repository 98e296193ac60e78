mod common;

use std::time::Duration;

use camera_streaming_daemon::protocol::{
    encode, MavCmd, MavHeader, MavMessage, MavResult, MavlinkParser, MAV_COMP_ID_CAMERA,
};
use camera_streaming_daemon::server::{ComponentRegistry, MavlinkServer, ServerConfig, SystemId};
use common::*;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::time::timeout;

const HEARTBEAT_V2: &str = "fd09000000016400000000000000000800040373f3";

async fn recv_message(socket: &UdpSocket, parser: &mut MavlinkParser) -> (MavHeader, MavMessage) {
    let mut buf = [0u8; 512];
    loop {
        let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
            .await
            .expect("timed out waiting for a reply")
            .unwrap();
        if let Some(result) = parser.parse(&buf[..len]).into_iter().next() {
            return result.unwrap();
        }
    }
}

#[tokio::test]
async fn test_command_round_trip_over_udp() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = ComponentRegistry::new();
    registry.add(Box::new(custom_camera(&dir))).unwrap();

    let gcs = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let config = ServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        // heartbeats land on the test socket too
        broadcast_addr: gcs.local_addr().unwrap(),
        heartbeat_interval: Duration::from_secs(3600),
    };
    let server = MavlinkServer::bind(&config, registry, SystemId::fixed(1))
        .await
        .unwrap();
    let server_addr = server.local_addr().unwrap();
    let stats = server.stats();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.run(async move {
        stop_rx.await.ok();
    }));

    let mut parser = MavlinkParser::new();

    // first interval tick fires immediately
    let (header, msg) = recv_message(&gcs, &mut parser).await;
    assert_eq!(header.component_id, MAV_COMP_ID_CAMERA);
    assert!(matches!(msg, MavMessage::HEARTBEAT(_)));

    let request = command(
        MavCmd::MAV_CMD_REQUEST_CAMERA_INFORMATION,
        1,
        MAV_COMP_ID_CAMERA,
        with_param(1, 1.0),
    );
    let header = MavHeader {
        system_id: GCS_SYSTEM,
        component_id: GCS_COMPONENT,
        sequence: 0,
    };
    let frame = encode(header, &request).unwrap();
    gcs.send_to(&frame, server_addr).await.unwrap();

    let (_, info) = recv_message(&gcs, &mut parser).await;
    assert!(matches!(info, MavMessage::CAMERA_INFORMATION(_)));
    let (_, ack) = recv_message(&gcs, &mut parser).await;
    match ack {
        MavMessage::COMMAND_ACK(ack) => {
            assert_eq!(ack.command, MavCmd::MAV_CMD_REQUEST_CAMERA_INFORMATION);
            assert_eq!(ack.result, MavResult::MAV_RESULT_ACCEPTED);
        }
        other => panic!("expected COMMAND_ACK, got {other:?}"),
    }

    stop_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.messages_received, 1);
    assert_eq!(snapshot.acks_sent, 1);
    assert_eq!(snapshot.heartbeats_sent, 1);
}

#[tokio::test]
async fn test_garbage_datagram_is_counted_not_fatal() {
    let registry = ComponentRegistry::new();
    let config = ServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        broadcast_addr: "127.0.0.1:9".parse().unwrap(),
        heartbeat_interval: Duration::from_secs(3600),
    };
    let server = MavlinkServer::bind(&config, registry, SystemId::fixed(1))
        .await
        .unwrap();
    let server_addr = server.local_addr().unwrap();
    let stats = server.stats();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.run(async move {
        stop_rx.await.ok();
    }));

    let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    // a v2 heartbeat with its checksum corrupted
    let mut frame: Vec<u8> = (0..HEARTBEAT_V2.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&HEARTBEAT_V2[i..i + 2], 16).unwrap())
        .collect();
    frame[19] ^= 0xff;
    peer.send_to(&frame, server_addr).await.unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while stats.snapshot().parse_errors == 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(stats.snapshot().parse_errors, 1);
    assert_eq!(stats.snapshot().messages_received, 0);

    stop_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}
