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

//! Offline publish: a detached client-role endpoint stores QoS≥1 PUBLISHes
//! instead of failing them, and replays them on session resumption.

use mqtt_engine_tokio::mqtt_ep;
use mqtt_ep::packet::GenericPacketTrait;
use std::time::Duration;

mod common;

use stub_transport::{StubTransport, TransportResponse};

type ClientEndpoint = mqtt_ep::Endpoint<mqtt_ep::role::Client>;

#[tokio::test]
async fn test_offline_publish_stored_and_replayed() {
    common::init_tracing();

    let endpoint = ClientEndpoint::new(mqtt_ep::Version::V5_0);
    endpoint.set_offline_publish(true).await.unwrap();

    let packet_id_1 = endpoint.acquire_packet_id().await.unwrap();
    assert_eq!(packet_id_1, 1, "First packet ID should be 1");

    let publish1 = mqtt_ep::packet::v5_0::GenericPublish::builder()
        .topic_name("test/topic")
        .unwrap()
        .payload("payload1")
        .packet_id(packet_id_1)
        .qos(mqtt_ep::packet::Qos::AtLeastOnce)
        .build()
        .unwrap();

    // No transport attached: the publish is stored, not transmitted
    let send_result = endpoint.send(publish1).await;
    assert!(
        send_result.is_ok(),
        "offline publish should be accepted: {send_result:?}"
    );

    let stored = endpoint.get_stored_packets().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].packet_id(), 1);

    // Attach and resume: the stored publish goes out with DUP set
    let mut stub = StubTransport::new();
    let connack = mqtt_ep::packet::v5_0::Connack::builder()
        .session_present(true)
        .reason_code(mqtt_ep::result_code::ConnectReasonCode::Success)
        .build()
        .unwrap();
    stub.add_response(TransportResponse::SendOk); // CONNECT
    stub.add_response(TransportResponse::RecvOk(connack.to_continuous_buffer()));
    stub.add_response(TransportResponse::SendOk); // replayed PUBLISH

    endpoint
        .attach(stub.clone(), mqtt_ep::Mode::Client)
        .await
        .unwrap();
    let connect = mqtt_ep::packet::v5_0::Connect::builder()
        .client_id("test_client")
        .unwrap()
        .clean_start(false)
        .build()
        .unwrap();
    endpoint.send(connect).await.unwrap();
    endpoint.recv().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let frames = stub.sent_frames();
    assert_eq!(frames.len(), 2, "CONNECT + replayed publish: {frames:?}");
    assert_eq!(frames[1][0] & 0xf0, 0x30);
    assert_ne!(frames[1][0] & 0x08, 0, "replayed publish carries DUP");
}

#[tokio::test]
async fn test_detached_publish_rejected_without_offline_mode() {
    common::init_tracing();

    let endpoint = ClientEndpoint::new(mqtt_ep::Version::V5_0);
    let packet_id = endpoint.acquire_packet_id().await.unwrap();
    let publish = mqtt_ep::packet::v5_0::GenericPublish::builder()
        .topic_name("test/topic")
        .unwrap()
        .payload("data")
        .packet_id(packet_id)
        .qos(mqtt_ep::packet::Qos::AtLeastOnce)
        .build()
        .unwrap();

    let send_result = endpoint.send(publish).await;
    assert!(send_result.is_err(), "publish without transport must fail");
    assert!(endpoint.get_stored_packets().await.unwrap().is_empty());
}
