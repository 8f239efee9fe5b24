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

//! In-flight store management: snapshot, restore, erase, regulation, and
//! the QoS 2 handled-id set.

use mqtt_engine_tokio::mqtt_ep;
use mqtt_ep::packet::GenericPacketTrait;

mod common;

use stub_transport::{StubTransport, TransportResponse};

type ClientEndpoint = mqtt_ep::Endpoint<mqtt_ep::role::Client>;

async fn connected_endpoint(stub: &mut StubTransport) -> ClientEndpoint {
    let endpoint = ClientEndpoint::new(mqtt_ep::Version::V5_0);
    let connack = mqtt_ep::packet::v5_0::Connack::builder()
        .session_present(false)
        .reason_code(mqtt_ep::result_code::ConnectReasonCode::Success)
        .build()
        .unwrap();
    stub.add_response(TransportResponse::SendOk);
    stub.add_response(TransportResponse::RecvOk(connack.to_continuous_buffer()));
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
    endpoint
}

fn publish_qos1(packet_id: u16, payload: &str) -> mqtt_ep::packet::v5_0::Publish {
    mqtt_ep::packet::v5_0::GenericPublish::builder()
        .topic_name("sensor/temperature")
        .unwrap()
        .payload(payload)
        .packet_id(packet_id)
        .qos(mqtt_ep::packet::Qos::AtLeastOnce)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_get_stored_packets_tracks_inflight_publishes() {
    common::init_tracing();
    let mut stub = StubTransport::new();
    let endpoint = connected_endpoint(&mut stub).await;

    stub.add_response(TransportResponse::SendOk);
    stub.add_response(TransportResponse::SendOk);

    let pid1 = endpoint.acquire_packet_id().await.unwrap();
    let pid2 = endpoint.acquire_packet_id().await.unwrap();
    endpoint.send(publish_qos1(pid1, "25.5")).await.unwrap();
    endpoint.send(publish_qos1(pid2, "26.0")).await.unwrap();

    let stored = endpoint.get_stored_packets().await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].packet_id(), pid1);
    assert_eq!(stored[1].packet_id(), pid2);
    assert!(stored.iter().all(|p| p.is_publish()));

    assert!(endpoint.is_publish_processing(pid1).await.unwrap());
    assert!(!endpoint.is_publish_processing(99).await.unwrap());

    // PUBACK for the first erases it from the store
    let puback = mqtt_ep::packet::v5_0::Puback::new(pid1).unwrap();
    stub.add_response(TransportResponse::RecvOk(puback.to_continuous_buffer()));
    endpoint.recv().await.unwrap();

    let stored = endpoint.get_stored_packets().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].packet_id(), pid2);
}

#[tokio::test]
async fn test_erase_stored_publish() {
    common::init_tracing();
    let mut stub = StubTransport::new();
    let endpoint = connected_endpoint(&mut stub).await;

    stub.add_response(TransportResponse::SendOk);
    let pid = endpoint.acquire_packet_id().await.unwrap();
    endpoint.send(publish_qos1(pid, "data")).await.unwrap();

    assert!(endpoint.erase_stored_publish(pid).await.unwrap());
    assert!(!endpoint.erase_stored_publish(pid).await.unwrap());
    assert!(endpoint.get_stored_packets().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_restore_stored_packets_into_fresh_endpoint() {
    common::init_tracing();
    let endpoint = ClientEndpoint::new(mqtt_ep::Version::V5_0);

    let restored = vec![mqtt_ep::packet::GenericStorePacket::V5_0Publish(
        publish_qos1(5, "restored"),
    )];
    endpoint.restore_stored_packets(restored).await.unwrap();

    let stored = endpoint.get_stored_packets().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].packet_id(), 5);

    // the restored id is registered, so fresh acquisition skips it
    assert_eq!(endpoint.acquire_packet_id().await.unwrap(), 1);
    assert!(endpoint.register_packet_id(5).await.is_err());
}

#[tokio::test]
async fn test_restore_via_connection_options() {
    common::init_tracing();
    let endpoint = ClientEndpoint::new(mqtt_ep::Version::V5_0);

    let mut stub = StubTransport::new();
    let options = mqtt_ep::ConnectionOption::builder()
        .restore_packets(vec![mqtt_ep::packet::GenericStorePacket::V5_0Publish(
            publish_qos1(7, "x"),
        )])
        .restore_qos2_publish_handled(
            [3u16].into_iter().collect::<std::collections::HashSet<_>>(),
        )
        .build()
        .unwrap();
    endpoint
        .attach_with_options(stub.clone(), mqtt_ep::Mode::Client, options)
        .await
        .unwrap();

    assert_eq!(
        endpoint.get_stored_packets().await.unwrap()[0].packet_id(),
        7
    );
    let handled = endpoint.get_qos2_publish_handled_pids().await.unwrap();
    assert!(handled.contains(&3));
    let _ = stub;
}

#[tokio::test]
async fn test_regulate_for_store_restores_topic() {
    common::init_tracing();
    let mut stub = StubTransport::new();
    let endpoint = connected_endpoint(&mut stub).await;

    // a publish that still carries a topic plus alias is stored alias-free
    let mut publish = mqtt_ep::packet::v5_0::GenericPublish::builder()
        .topic_name("sensor/temperature")
        .unwrap()
        .payload("x")
        .build()
        .unwrap();
    publish.add_topic_alias(3).unwrap();

    let regulated = endpoint.regulate_for_store(publish).await.unwrap();
    assert_eq!(regulated.topic_name(), "sensor/temperature");
    assert_eq!(regulated.topic_alias(), None);
}

#[tokio::test]
async fn test_qos2_publish_handled_pids() {
    common::init_tracing();
    let mut stub = StubTransport::new();
    let endpoint = connected_endpoint(&mut stub).await;
    endpoint.set_auto_pub_response(false).await.unwrap();

    let inbound = mqtt_ep::packet::v5_0::GenericPublish::builder()
        .topic_name("a")
        .unwrap()
        .packet_id(11u16)
        .qos(mqtt_ep::packet::Qos::ExactlyOnce)
        .payload("b")
        .build()
        .unwrap();
    stub.add_response(TransportResponse::RecvOk(inbound.to_continuous_buffer()));
    endpoint.recv().await.unwrap();

    let handled = endpoint.get_qos2_publish_handled_pids().await.unwrap();
    assert!(handled.contains(&11), "inbound QoS 2 id is tracked: {handled:?}");
}
