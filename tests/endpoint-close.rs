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
use std::time::Duration;

mod common;

use stub_transport::{StubTransport, TransportCall, TransportResponse};

type ClientEndpoint = mqtt_ep::Endpoint<mqtt_ep::role::Client>;

#[tokio::test]
async fn test_close_without_transport_succeeds() {
    common::init_tracing();
    let endpoint = ClientEndpoint::new(mqtt_ep::Version::V5_0);
    assert!(endpoint.close().await.is_ok());
}

#[tokio::test]
async fn test_close_shuts_down_transport_and_releases_ids() {
    common::init_tracing();

    let mut stub = StubTransport::new();
    let endpoint = ClientEndpoint::new(mqtt_ep::Version::V5_0);

    let connack = mqtt_ep::packet::v5_0::Connack::builder()
        .session_present(false)
        .reason_code(mqtt_ep::result_code::ConnectReasonCode::Success)
        .build()
        .unwrap();
    stub.add_response(TransportResponse::SendOk);
    stub.add_response(TransportResponse::RecvOk(connack.to_continuous_buffer()));
    stub.add_response(TransportResponse::Shutdown);

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

    // an id with no stored packet is released by the close
    let packet_id = endpoint.acquire_packet_id().await.unwrap();
    assert_eq!(packet_id, 1);

    endpoint.close().await.unwrap();

    let calls = stub.get_calls();
    assert!(
        calls
            .iter()
            .any(|c| matches!(c, TransportCall::Shutdown { .. })),
        "close must shut the transport down: {calls:?}"
    );

    assert_eq!(
        endpoint.acquire_packet_id().await.unwrap(),
        1,
        "close releases ids that no stored packet references"
    );

    // operations needing a transport now fail
    let result = endpoint.recv().await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_close_is_idempotent() {
    common::init_tracing();

    let mut stub = StubTransport::new();
    let endpoint = ClientEndpoint::new(mqtt_ep::Version::V5_0);
    stub.add_response(TransportResponse::Shutdown);

    endpoint
        .attach(stub.clone(), mqtt_ep::Mode::Client)
        .await
        .unwrap();
    assert!(endpoint.close().await.is_ok());
    assert!(endpoint.close().await.is_ok());
    tokio::time::sleep(Duration::from_millis(10)).await;
}
