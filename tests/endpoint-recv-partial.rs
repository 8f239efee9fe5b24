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

//! Partial-frame reassembly: packets fragmented across transport reads, and
//! multiple packets arriving in one read.

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

#[tokio::test]
async fn test_publish_reassembled_across_recv_calls() {
    common::init_tracing();
    let mut stub = StubTransport::new();
    let endpoint = connected_endpoint(&mut stub).await;
    endpoint.set_auto_pub_response(false).await.unwrap();

    let publish = mqtt_ep::packet::v5_0::GenericPublish::builder()
        .topic_name("test/partial")
        .unwrap()
        .packet_id(1u16)
        .qos(mqtt_ep::packet::Qos::AtLeastOnce)
        .payload(b"This is a test payload for partial reception across multiple recv calls")
        .build()
        .unwrap();
    let bytes = publish.to_continuous_buffer();

    // deliver the frame in three fragments, the first a single byte
    stub.add_response(TransportResponse::RecvOk(bytes[..1].to_vec()));
    stub.add_response(TransportResponse::RecvOk(bytes[1..7].to_vec()));
    stub.add_response(TransportResponse::RecvOk(bytes[7..].to_vec()));

    let received = endpoint.recv().await.unwrap();
    match received {
        mqtt_ep::packet::Packet::V5_0Publish(p) => {
            assert_eq!(p.packet_id(), Some(1));
            assert_eq!(
                p.payload().as_slice(),
                &b"This is a test payload for partial reception across multiple recv calls"[..]
            );
        }
        other => panic!("unexpected packet: {other:?}"),
    }
}

#[tokio::test]
async fn test_two_packets_in_one_read() {
    common::init_tracing();
    let mut stub = StubTransport::new();
    let endpoint = connected_endpoint(&mut stub).await;
    endpoint.set_auto_pub_response(false).await.unwrap();

    let p1 = mqtt_ep::packet::v5_0::GenericPublish::<u16>::builder()
        .topic_name("test/multi")
        .unwrap()
        .payload(b"packetA")
        .build()
        .unwrap();
    let p2 = mqtt_ep::packet::v5_0::GenericPublish::<u16>::builder()
        .topic_name("test/multi")
        .unwrap()
        .payload(b"packetB")
        .build()
        .unwrap();
    let mut bytes = p1.to_continuous_buffer();
    bytes.extend(p2.to_continuous_buffer());
    stub.add_response(TransportResponse::RecvOk(bytes));

    let first = endpoint.recv().await.unwrap();
    let second = endpoint.recv().await.unwrap();
    match (first, second) {
        (
            mqtt_ep::packet::Packet::V5_0Publish(a),
            mqtt_ep::packet::Packet::V5_0Publish(b),
        ) => {
            assert_eq!(a.payload().as_slice(), b"packetA");
            assert_eq!(b.payload().as_slice(), b"packetB");
        }
        other => panic!("unexpected packets: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_remaining_length_fails_recv() {
    common::init_tracing();
    let mut stub = StubTransport::new();
    let endpoint = connected_endpoint(&mut stub).await;

    stub.add_response(TransportResponse::RecvOk(vec![
        0x30, 0xff, 0xff, 0xff, 0xff, 0xff,
    ]));
    // the v5 endpoint sends DISCONNECT(malformed_packet) before closing
    stub.add_response(TransportResponse::SendOk);

    let result = endpoint.recv().await;
    assert!(result.is_err(), "malformed length must fail the recv");
}
