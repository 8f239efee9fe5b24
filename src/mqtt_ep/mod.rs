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

//! MQTT protocol engine: packets, sans-I/O connection, tokio endpoint, and
//! the client facade.

pub mod common;
pub mod packet;
pub mod role;
pub mod version;

pub use version::Version;

pub mod result_code;

pub mod connection;

pub mod client;
pub mod connection_error;
pub mod connection_option;
pub mod endpoint;
pub mod packet_filter;
pub mod request_response;
pub mod transport;

pub use client::{Client, ConnectSettings, GenericClient, GenericIncoming, GenericPublishResult,
    Incoming, PublishOptions, PublishResult};
pub use connection_error::ConnectionError;
pub use connection_option::{ConnectionOption, GenericConnectionOption};
pub use endpoint::{Endpoint, GenericEndpoint, Mode};
pub use packet_filter::PacketFilter;
pub use transport::{TransportError, TransportOps};
