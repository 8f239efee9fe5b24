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

use mqtt_engine_tokio::mqtt_ep;
use mqtt_ep::packet::GenericPacketTrait;

mod common;

use stub_transport::{StubTransport, TransportResponse};

#[tokio::test]
async fn test_send_concrete_packet() {
    common::init_tracing();

    let endpoint: mqtt_ep::Endpoint<mqtt_ep::role::Client> =
        mqtt_ep::Endpoint::new(mqtt_ep::Version::V3_1_1);

    let pingreq = mqtt_ep::packet::v3_1_1::Pingreq::new();

    // Without a transport the send fails, but the Sendable bound compiles
    let result = endpoint.send(pingreq).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_send_enum_packet() {
    common::init_tracing();

    let endpoint: mqtt_ep::Endpoint<mqtt_ep::role::Client> =
        mqtt_ep::Endpoint::new(mqtt_ep::Version::V3_1_1);

    let pingreq = mqtt_ep::packet::v3_1_1::Pingreq::new();
    let enum_packet: mqtt_ep::packet::Packet = pingreq.into();

    let _result = endpoint.send(enum_packet).await;
}

#[tokio::test]
async fn test_send_with_different_roles() {
    common::init_tracing();
    {
        let endpoint: mqtt_ep::Endpoint<mqtt_ep::role::Server> =
            mqtt_ep::Endpoint::new(mqtt_ep::Version::V3_1_1);

        let pingresp = mqtt_ep::packet::v3_1_1::Pingresp::new();
        let _result = endpoint.send(pingresp).await;
    }
    {
        let endpoint: mqtt_ep::Endpoint<mqtt_ep::role::Any> =
            mqtt_ep::Endpoint::new(mqtt_ep::Version::V3_1_1);

        let pingreq = mqtt_ep::packet::v3_1_1::Pingreq::new();
        let enum_packet: mqtt_ep::packet::Packet = pingreq.into();
        let _result = endpoint.send(enum_packet).await;
    }
}

#[tokio::test]
async fn test_packet_id_management() {
    common::init_tracing();

    let endpoint: mqtt_ep::Endpoint<mqtt_ep::role::Client> =
        mqtt_ep::Endpoint::new(mqtt_ep::Version::V3_1_1);

    let packet_id = endpoint.acquire_packet_id().await.unwrap();
    assert_eq!(packet_id, 1);
    assert!(endpoint.register_packet_id(2).await.is_ok());
    assert!(endpoint.register_packet_id(2).await.is_err());
    assert!(endpoint.release_packet_id(1).await.is_ok());
    assert!(endpoint.release_packet_id(2).await.is_ok());
}

#[tokio::test]
async fn test_send_with_u32_packet_id() {
    common::init_tracing();

    let endpoint: mqtt_ep::GenericEndpoint<mqtt_ep::role::Client, u32> =
        mqtt_ep::GenericEndpoint::new(mqtt_ep::Version::V3_1_1);

    let pingreq = mqtt_ep::packet::v3_1_1::Pingreq::new();
    let _result = endpoint.send(pingreq).await;

    let pingreq2 = mqtt_ep::packet::v3_1_1::Pingreq::new();
    let enum_packet: mqtt_ep::packet::GenericPacket<u32> = pingreq2.into();
    let _result2 = endpoint.send(enum_packet).await;

    let packet_id = endpoint.acquire_packet_id().await.unwrap();
    assert_eq!(packet_id, 1u32);
    let _register_result = endpoint.register_packet_id(100u32).await;
    let _release_result = endpoint.release_packet_id(100u32).await;
}

#[tokio::test]
async fn test_send_acquired_packet_and_error() {
    common::init_tracing();

    let mut stub = StubTransport::new();
    let endpoint: mqtt_ep::Endpoint<mqtt_ep::role::Client> =
        mqtt_ep::Endpoint::new(mqtt_ep::Version::V5_0);

    let connack_packet = mqtt_ep::packet::v5_0::Connack::builder()
        .session_present(false)
        .reason_code(mqtt_ep::result_code::ConnectReasonCode::Success)
        .build()
        .unwrap();
    let connack_bytes = connack_packet.to_continuous_buffer();

    stub.add_response(TransportResponse::SendOk); // For CONNECT
    stub.add_response(TransportResponse::RecvOk(connack_bytes)); // CONNACK response
                                                                 // No response for the SUBSCRIBE send, so it fails and releases its id

    let attach_result = endpoint.attach(stub.clone(), mqtt_ep::Mode::Client).await;
    assert!(
        attach_result.is_ok(),
        "Attach should succeed: {attach_result:?}"
    );

    let connect_packet = mqtt_ep::packet::v5_0::Connect::builder()
        .client_id("test_client")
        .unwrap()
        .clean_start(true)
        .build()
        .unwrap();

    let send_result = endpoint.send(connect_packet).await;
    assert!(send_result.is_ok(), "CONNECT should be sent successfully");

    let connack_result = endpoint.recv().await;
    assert!(
        connack_result.is_ok(),
        "CONNACK should be received successfully"
    );

    let packet_id_1 = endpoint.acquire_packet_id().await.unwrap();
    assert_eq!(packet_id_1, 1, "First acquired packet ID should be 1");

    let sub_opts = mqtt_ep::packet::SubOpts::new().set_qos(mqtt_ep::packet::Qos::AtLeastOnce);
    let sub_entry = mqtt_ep::packet::SubEntry::new("test/topic", sub_opts)
        .expect("Failed to create subscription entry");

    let subscribe_packet = mqtt_ep::packet::v5_0::Subscribe::builder()
        .packet_id(packet_id_1)
        .entries(vec![sub_entry])
        .build()
        .unwrap();

    let subscribe_send_result = endpoint.send(subscribe_packet).await;
    assert!(
        subscribe_send_result.is_err(),
        "SUBSCRIBE send should fail with no scripted response"
    );
    match subscribe_send_result.unwrap_err() {
        mqtt_ep::ConnectionError::Transport(_) | mqtt_ep::ConnectionError::NotConnected => {}
        other => panic!("Unexpected error type: {other:?}"),
    }

    // The failed send released the packet ID, so 1 comes back again
    let reused_packet_id = endpoint.acquire_packet_id().await.unwrap();
    assert_eq!(
        reused_packet_id, 1,
        "Reused packet ID should also be 1 (packet ID was properly released)"
    );
}
