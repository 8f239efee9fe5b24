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

//! # MQTT Engine Tokio
//!
//! An async MQTT protocol engine for Rust with tokio, supporting MQTT
//! v5.0 and v3.1.1 over any byte-stream transport.
//!
//! The crate layers a complete wire codec, a sans-I/O connection state
//! machine, a tokio endpoint that drives one connection from a single
//! event-loop task, and a client facade that arbitrates broker responses by
//! packet identifier.
//!
//! ## Features
//!
//! - **MQTT Protocol Support**: Both MQTT v3.1.1 and v5.0, every control
//!   packet, v5 properties, topic aliases, session resumption
//! - **Transport Agnostic**: Any object implementing
//!   [`mqtt_ep::transport::TransportOps`] carries the connection
//! - **Generic Packet ID Types**: u16 on the wire, u32 for broker
//!   clustering extensions
//! - **Client and Server Roles**: Direction rules enforced at compile time
//! - **QoS 1/2 Bookkeeping**: Packet-id allocation, in-flight stores with
//!   DUP resend on reconnect, receive-maximum admission
//!
//! ## Quick Start
//!
//! ```ignore
//! use mqtt_engine_tokio::mqtt_ep;
//!
//! // Create a client endpoint
//! let endpoint: mqtt_ep::Endpoint<mqtt_ep::role::Client> =
//!     mqtt_ep::Endpoint::new(mqtt_ep::Version::V5_0);
//!
//! // Attach a connected transport (anything implementing TransportOps)
//! endpoint.attach(transport, mqtt_ep::Mode::Client).await?;
//!
//! // Send CONNECT
//! let connect = mqtt_ep::packet::v5_0::Connect::builder()
//!     .client_id("my-client")?
//!     .build()?;
//! endpoint.send(connect).await?;
//!
//! // Receive CONNACK
//! let packet = endpoint.recv().await?;
//! println!("Received: {packet:?}");
//! ```
//!
//! ## Main Components
//!
//! - [`mqtt_ep::packet`]: MQTT packet types with builders and a zero-copy
//!   gather-list wire form
//! - [`mqtt_ep::connection`]: sans-I/O protocol state machine
//! - [`mqtt_ep::endpoint`]: tokio endpoint for both roles
//! - [`mqtt_ep::client`]: client facade (start/publish/subscribe/recv)
//! - [`mqtt_ep::transport`]: the transport contract
//! - [`mqtt_ep::connection_option`]: per-attachment configuration

pub mod mqtt_ep;
