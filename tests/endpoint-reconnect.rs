// MIT License
//
// Copyright (c) 2025 Takatoshi Kondo
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Reconnection tests for the MQTT endpoint.
//!
//! Covers every path that tears the transport down (peer close, transport
//! error, connection-establish timeout) and verifies the endpoint accepts a
//! fresh transport afterwards, including QoS 1 session resumption with DUP
//! redelivery.

use mqtt_engine_tokio::mqtt_ep;
use mqtt_ep::packet::GenericPacketTrait;
use std::time::Duration;

mod common;

use stub_transport::{StubTransport, TransportResponse};

type ClientEndpoint = mqtt_ep::Endpoint<mqtt_ep::role::Client>;

fn create_connack_v311_bytes(session_present: bool) -> Vec<u8> {
    mqtt_ep::packet::v3_1_1::Connack::builder()
        .session_present(session_present)
        .return_code(mqtt_ep::result_code::ConnectReturnCode::Accepted)
        .build()
        .unwrap()
        .to_continuous_buffer()
}

fn create_connect_v311(client_id: &str, clean_session: bool) -> mqtt_ep::packet::v3_1_1::Connect {
    mqtt_ep::packet::v3_1_1::Connect::builder()
        .client_id(client_id)
        .unwrap()
        .keep_alive(0)
        .clean_session(clean_session)
        .build()
        .unwrap()
}

async fn establish(endpoint: &ClientEndpoint, stub: &StubTransport, clean_session: bool) {
    endpoint
        .attach(stub.clone(), mqtt_ep::Mode::Client)
        .await
        .expect("attach should succeed");
    endpoint
        .send(create_connect_v311("test_client", clean_session))
        .await
        .expect("CONNECT send should succeed");
    let connack = tokio::time::timeout(Duration::from_millis(1000), endpoint.recv())
        .await
        .expect("CONNACK should arrive")
        .expect("CONNACK should decode");
    assert_eq!(
        connack.packet_type(),
        mqtt_ep::packet::PacketType::Connack
    );
}

#[tokio::test]
async fn test_reconnect_after_connection_close_recv_zero() {
    common::init_tracing();

    let endpoint = ClientEndpoint::new(mqtt_ep::Version::V3_1_1);

    // First connection: establish, then the peer closes (recv returns 0)
    {
        let mut stub = StubTransport::new();
        stub.add_response(TransportResponse::SendOk);
        stub.add_response(TransportResponse::RecvOk(create_connack_v311_bytes(false)));
        stub.add_response(TransportResponse::RecvOk(vec![]));

        establish(&endpoint, &stub, true).await;

        let recv_result =
            tokio::time::timeout(Duration::from_millis(1000), endpoint.recv()).await;
        match recv_result.expect("recv should complete") {
            Err(_) => {}
            Ok(packet) => panic!("Expected error after connection close, got packet: {packet:?}"),
        }
    }

    // Second connection: reconnect with a new transport
    {
        let mut stub = StubTransport::new();
        stub.add_response(TransportResponse::SendOk);
        stub.add_response(TransportResponse::RecvOk(create_connack_v311_bytes(false)));

        establish(&endpoint, &stub, true).await;
    }
}

#[tokio::test]
async fn test_reconnect_after_recv_error() {
    common::init_tracing();

    let endpoint = ClientEndpoint::new(mqtt_ep::Version::V3_1_1);

    {
        let mut stub = StubTransport::new();
        stub.add_response(TransportResponse::SendOk);
        stub.add_response(TransportResponse::RecvOk(create_connack_v311_bytes(false)));
        stub.add_response(TransportResponse::RecvErr(
            mqtt_ep::TransportError::NotConnected,
        ));

        establish(&endpoint, &stub, true).await;

        let recv_result =
            tokio::time::timeout(Duration::from_millis(1000), endpoint.recv()).await;
        match recv_result.expect("recv should complete with error") {
            Err(_) => {}
            Ok(packet) => panic!("Expected error after recv error, got packet: {packet:?}"),
        }
    }

    {
        let mut stub = StubTransport::new();
        stub.add_response(TransportResponse::SendOk);
        stub.add_response(TransportResponse::RecvOk(create_connack_v311_bytes(false)));

        establish(&endpoint, &stub, true).await;
    }
}

#[tokio::test]
async fn test_reconnect_after_connection_timeout() {
    common::init_tracing();

    let endpoint = ClientEndpoint::new(mqtt_ep::Version::V3_1_1);

    {
        let mut stub = StubTransport::new();
        stub.add_response(TransportResponse::SendOk);
        stub.add_response(TransportResponse::DelayMs(2000));
        stub.add_response(TransportResponse::RecvOk(create_connack_v311_bytes(false)));
        stub.add_response(TransportResponse::Shutdown);

        let option = mqtt_ep::ConnectionOption::builder()
            .connection_establish_timeout_ms(100u64)
            .build()
            .unwrap();
        endpoint
            .attach_with_options(stub.clone(), mqtt_ep::Mode::Client, option)
            .await
            .expect("attach should succeed");

        endpoint
            .send(create_connect_v311("test_client", true))
            .await
            .expect("CONNECT send should succeed");

        let recv_result =
            tokio::time::timeout(Duration::from_millis(1000), endpoint.recv()).await;
        match recv_result.expect("recv should complete") {
            Err(mqtt_ep::ConnectionError::Transport(mqtt_ep::TransportError::Timeout)) => {}
            Err(e) => eprintln!("Got error after connection timeout: {e:?}"),
            Ok(packet) => panic!("Expected timeout error, got packet: {packet:?}"),
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    {
        let mut stub = StubTransport::new();
        stub.add_response(TransportResponse::SendOk);
        stub.add_response(TransportResponse::RecvOk(create_connack_v311_bytes(false)));

        establish(&endpoint, &stub, true).await;
    }
}

/// Two in-flight QoS 1 PUBLISHes survive a drop and go out again with DUP
/// set, in packet-id order, when the broker resumes the session.
#[tokio::test]
async fn test_session_resumption_resends_inflight_publishes() {
    common::init_tracing();

    let endpoint = ClientEndpoint::new(mqtt_ep::Version::V3_1_1);

    // First connection: two QoS 1 publishes, no PUBACK, then the peer drops
    {
        let mut stub = StubTransport::new();
        stub.add_response(TransportResponse::SendOk); // CONNECT
        stub.add_response(TransportResponse::RecvOk(create_connack_v311_bytes(false)));
        stub.add_response(TransportResponse::SendOk); // PUBLISH 1
        stub.add_response(TransportResponse::SendOk); // PUBLISH 2
        stub.add_response(TransportResponse::RecvOk(vec![])); // drop

        establish(&endpoint, &stub, true).await;

        for payload in ["Hello World 1", "Hello World 2"] {
            let packet_id = endpoint.acquire_packet_id().await.unwrap();
            let publish = mqtt_ep::packet::v3_1_1::Publish::builder()
                .topic_name("test/topic")
                .unwrap()
                .packet_id(packet_id)
                .qos(mqtt_ep::packet::Qos::AtLeastOnce)
                .payload(payload)
                .build()
                .unwrap();
            endpoint.send(publish).await.expect("publish should send");
        }

        let stored = endpoint.get_stored_packets().await.unwrap();
        assert_eq!(stored.len(), 2, "both publishes should be stored");

        let _ = tokio::time::timeout(Duration::from_millis(1000), endpoint.recv()).await;
    }

    // Reconnect with clean_session=false; CONNACK carries session_present
    {
        let mut stub = StubTransport::new();
        stub.add_response(TransportResponse::SendOk); // CONNECT
        stub.add_response(TransportResponse::RecvOk(create_connack_v311_bytes(true)));
        stub.add_response(TransportResponse::SendOk); // resent PUBLISH 1
        stub.add_response(TransportResponse::SendOk); // resent PUBLISH 2

        establish(&endpoint, &stub, false).await;
        // give the event loop time to flush the resends
        tokio::time::sleep(Duration::from_millis(100)).await;

        let frames = stub.sent_frames();
        // CONNECT plus the two redeliveries
        assert_eq!(frames.len(), 3, "expected CONNECT + 2 resends: {frames:?}");
        for (idx, frame) in frames[1..].iter().enumerate() {
            assert_eq!(frame[0] & 0xf0, 0x30, "resend must be a PUBLISH");
            assert_ne!(frame[0] & 0x08, 0, "resend must have DUP set");
            // topic length 10, "test/topic", then the packet id
            let pid = u16::from_be_bytes([frame[14], frame[15]]);
            assert_eq!(pid as usize, idx + 1, "resends keep packet-id order");
        }
    }
}
