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

//! Client facade delivery of unsolicited packets: broker-initiated PUBLISH
//! and DISCONNECT arrive through `recv`, in order, while acknowledgements
//! keep flowing to their own calls.

use mqtt_engine_tokio::mqtt_ep;
use mqtt_ep::packet::GenericPacketTrait;
use std::time::Duration;

mod common;

use stub_transport::{StubTransport, TransportResponse};

fn connack_bytes() -> Vec<u8> {
    mqtt_ep::packet::v5_0::Connack::builder()
        .session_present(false)
        .reason_code(mqtt_ep::result_code::ConnectReasonCode::Success)
        .build()
        .unwrap()
        .to_continuous_buffer()
}

async fn started_client(stub: &mut StubTransport) -> mqtt_ep::Client {
    let client = mqtt_ep::Client::new(mqtt_ep::Version::V5_0);
    stub.add_response(TransportResponse::SendOk);
    stub.add_response(TransportResponse::RecvOk(connack_bytes()));
    client.attach(stub.clone()).await.unwrap();
    client
        .start(mqtt_ep::ConnectSettings {
            client_id: "recv_client".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    client
}

#[tokio::test]
async fn test_unsolicited_publish_delivered_in_order() {
    common::init_tracing();
    let mut stub = StubTransport::new();
    let client = started_client(&mut stub).await;

    let p1 = mqtt_ep::packet::v5_0::Publish::builder()
        .topic_name("news/a")
        .unwrap()
        .payload("first")
        .build()
        .unwrap();
    let p2 = mqtt_ep::packet::v5_0::Publish::builder()
        .topic_name("news/b")
        .unwrap()
        .payload("second")
        .build()
        .unwrap();
    stub.add_response(TransportResponse::RecvOk(p1.to_continuous_buffer()));
    stub.add_response(TransportResponse::RecvOk(p2.to_continuous_buffer()));

    for expected in ["first", "second"] {
        let incoming = tokio::time::timeout(Duration::from_millis(1000), client.recv())
            .await
            .unwrap()
            .unwrap();
        match incoming {
            mqtt_ep::Incoming::Publish(mqtt_ep::packet::Packet::V5_0Publish(p)) => {
                assert_eq!(p.payload().as_slice(), expected.as_bytes());
            }
            other => panic!("unexpected incoming: {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_inbound_qos1_publish_is_acked_and_delivered() {
    common::init_tracing();
    let mut stub = StubTransport::new();
    let client = started_client(&mut stub).await;

    let publish = mqtt_ep::packet::v5_0::Publish::builder()
        .topic_name("cmd")
        .unwrap()
        .packet_id(4u16)
        .qos(mqtt_ep::packet::Qos::AtLeastOnce)
        .payload("go")
        .build()
        .unwrap();
    stub.add_response(TransportResponse::RecvOk(publish.to_continuous_buffer()));
    stub.add_response(TransportResponse::SendOk); // auto PUBACK

    let incoming = tokio::time::timeout(Duration::from_millis(1000), client.recv())
        .await
        .unwrap()
        .unwrap();
    match incoming {
        mqtt_ep::Incoming::Publish(p) => assert_eq!(p.packet_id(), Some(4)),
        other => panic!("unexpected incoming: {other:?}"),
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    let frames = stub.sent_frames();
    assert_eq!(frames.last().unwrap()[0], 0x40, "auto PUBACK was sent");
}

#[tokio::test]
async fn test_broker_disconnect_surfaces_through_recv() {
    common::init_tracing();
    let mut stub = StubTransport::new();
    let client = started_client(&mut stub).await;

    let disconnect = mqtt_ep::packet::v5_0::Disconnect::builder()
        .reason_code(mqtt_ep::result_code::DisconnectReasonCode::ServerShuttingDown)
        .build()
        .unwrap();
    stub.add_response(TransportResponse::RecvOk(disconnect.to_continuous_buffer()));
    stub.add_response(TransportResponse::Shutdown);

    let incoming = tokio::time::timeout(Duration::from_millis(1000), client.recv())
        .await
        .unwrap()
        .unwrap();
    match incoming {
        mqtt_ep::Incoming::Disconnect(mqtt_ep::packet::Packet::V5_0Disconnect(d)) => {
            assert_eq!(
                d.reason_code(),
                mqtt_ep::result_code::DisconnectReasonCode::ServerShuttingDown
            );
        }
        other => panic!("unexpected incoming: {other:?}"),
    }
}
