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

//! Receive-maximum admission: a QoS 1 PUBLISH beyond the broker's quota
//! waits behind earlier pending PUBLISHes until an acknowledgement frees a
//! slot. This is the default behavior and needs no configuration.

use std::sync::Arc;
use std::time::Duration;

use mqtt_engine_tokio::mqtt_ep;
use mqtt_ep::packet::GenericPacketTrait;

mod common;

use stub_transport::{StubTransport, TransportResponse};

type ClientEndpoint = mqtt_ep::Endpoint<mqtt_ep::role::Client>;

fn publish_qos1(packet_id: u16, payload: &str) -> mqtt_ep::packet::v5_0::Publish {
    mqtt_ep::packet::v5_0::GenericPublish::builder()
        .topic_name("test/topic")
        .unwrap()
        .payload(payload)
        .packet_id(packet_id)
        .qos(mqtt_ep::packet::Qos::AtLeastOnce)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_publish_queued_until_receive_maximum_vacancy() {
    common::init_tracing();

    let mut stub = StubTransport::new();
    let endpoint = Arc::new(ClientEndpoint::new(mqtt_ep::Version::V5_0));

    // Broker grants a receive maximum of exactly one in-flight publish
    let connack = mqtt_ep::packet::v5_0::Connack::builder()
        .session_present(false)
        .reason_code(mqtt_ep::result_code::ConnectReasonCode::Success)
        .props(vec![mqtt_ep::packet::ReceiveMaximum::new(1).unwrap().into()])
        .build()
        .unwrap();

    stub.add_response(TransportResponse::SendOk); // CONNECT
    stub.add_response(TransportResponse::RecvOk(connack.to_continuous_buffer()));
    stub.add_response(TransportResponse::SendOk); // first PUBLISH

    endpoint
        .attach(stub.clone(), mqtt_ep::Mode::Client)
        .await
        .unwrap();

    let connect = mqtt_ep::packet::v5_0::Connect::builder()
        .client_id("test_client")
        .unwrap()
        .clean_start(true)
        .build()
        .unwrap();
    endpoint.send(connect).await.unwrap();
    endpoint.recv().await.unwrap();

    assert_eq!(
        endpoint.get_receive_maximum_vacancy_for_send().await.unwrap(),
        Some(1)
    );

    let packet_id_1 = endpoint.acquire_packet_id().await.unwrap();
    let packet_id_2 = endpoint.acquire_packet_id().await.unwrap();
    assert_eq!(packet_id_1, 1, "First packet ID should be 1");
    assert_eq!(packet_id_2, 2, "Second packet ID should be 2");

    endpoint
        .send(publish_qos1(packet_id_1, "payload1"))
        .await
        .expect("first publish fits in the window");
    assert_eq!(
        endpoint.get_receive_maximum_vacancy_for_send().await.unwrap(),
        Some(0)
    );

    // The second publish must wait for the PUBACK of the first
    let second_send = tokio::spawn({
        let endpoint = endpoint.clone();
        async move { endpoint.send(publish_qos1(packet_id_2, "payload2")).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(
        !second_send.is_finished(),
        "second publish must be queued while the window is full"
    );
    // Only CONNECT and the first PUBLISH reached the wire so far
    assert_eq!(stub.sent_frames().len(), 2);

    // PUBACK for the first publish opens the window
    let puback = mqtt_ep::packet::v5_0::Puback::new(packet_id_1).unwrap();
    stub.add_response(TransportResponse::RecvOk(puback.to_continuous_buffer()));
    stub.add_response(TransportResponse::SendOk); // queued PUBLISH goes out

    let received = endpoint.recv().await.unwrap();
    assert_eq!(received.packet_type(), mqtt_ep::packet::PacketType::Puback);

    let second_result = tokio::time::timeout(Duration::from_millis(1000), second_send)
        .await
        .expect("queued publish should complete after PUBACK")
        .unwrap();
    assert!(second_result.is_ok(), "queued publish should succeed");

    let frames = stub.sent_frames();
    assert_eq!(frames.len(), 3, "CONNECT + two publishes: {frames:?}");
    assert_eq!(frames[2][0] & 0xf0, 0x30, "last frame is the queued PUBLISH");
}
