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
use mqtt_ep::packet::PacketType;

mod common;

use stub_transport::{StubTransport, TransportResponse};

#[test]
fn test_filter_matching() {
    let publish: mqtt_ep::packet::Packet = mqtt_ep::packet::v5_0::Publish::builder()
        .topic_name("t")
        .unwrap()
        .payload("p")
        .build()
        .unwrap()
        .into();
    let pingresp: mqtt_ep::packet::Packet = mqtt_ep::packet::v5_0::Pingresp::new().into();

    let include = mqtt_ep::PacketFilter::include(vec![PacketType::Publish]);
    assert!(include.matches(&publish));
    assert!(!include.matches(&pingresp));

    let exclude = mqtt_ep::PacketFilter::exclude(vec![PacketType::Pingresp]);
    assert!(exclude.matches(&publish));
    assert!(!exclude.matches(&pingresp));

    assert!(mqtt_ep::PacketFilter::Any.matches(&publish));
    assert!(mqtt_ep::PacketFilter::Any.matches(&pingresp));
}

#[tokio::test]
async fn test_recv_filtered_skips_non_matching_packets() {
    common::init_tracing();

    let mut stub = StubTransport::new();
    let endpoint: mqtt_ep::Endpoint<mqtt_ep::role::Client> =
        mqtt_ep::Endpoint::new(mqtt_ep::Version::V5_0);

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

    // a PINGRESP arrives first; the filtered recv must skip it and deliver
    // the following PUBLISH
    let pingresp = mqtt_ep::packet::v5_0::Pingresp::new();
    let publish = mqtt_ep::packet::v5_0::Publish::builder()
        .topic_name("test/topic")
        .unwrap()
        .payload("data")
        .build()
        .unwrap();
    stub.add_response(TransportResponse::RecvOk(pingresp.to_continuous_buffer()));
    stub.add_response(TransportResponse::RecvOk(publish.to_continuous_buffer()));

    let filter = mqtt_ep::PacketFilter::include(vec![PacketType::Publish]);
    let received = endpoint.recv_filtered(filter).await.unwrap();
    assert_eq!(received.packet_type(), PacketType::Publish);
}
