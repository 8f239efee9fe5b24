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

//! Endpoint role markers.
//!
//! The role decides which packet kinds an endpoint is allowed to send.
//! `Client` and `Server` enforce the MQTT direction rules; `Any` accepts
//! both directions (useful for tools and tests).

use crate::mqtt_ep::packet::PacketType;

/// Runtime view of an endpoint role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
    Any,
}

impl Role {
    /// Direction rule: may this role put the given packet kind on the wire?
    pub fn can_send(&self, packet_type: PacketType) -> bool {
        use PacketType::*;
        match self {
            Role::Any => true,
            Role::Client => matches!(
                packet_type,
                Connect
                    | Publish
                    | Puback
                    | Pubrec
                    | Pubrel
                    | Pubcomp
                    | Subscribe
                    | Unsubscribe
                    | Pingreq
                    | Disconnect
                    | Auth
            ),
            Role::Server => matches!(
                packet_type,
                Connack
                    | Publish
                    | Puback
                    | Pubrec
                    | Pubrel
                    | Pubcomp
                    | Suback
                    | Unsuback
                    | Pingresp
                    | Disconnect
                    | Auth
            ),
        }
    }
}

/// Compile-time role marker implemented by [`Client`], [`Server`] and [`Any`].
pub trait RoleType: Send + Sync + 'static {
    fn role() -> Role;
}

/// Client role marker.
#[derive(Debug, Clone, Copy)]
pub struct Client;

/// Server (broker side) role marker.
#[derive(Debug, Clone, Copy)]
pub struct Server;

/// Role accepting both directions.
#[derive(Debug, Clone, Copy)]
pub struct Any;

impl RoleType for Client {
    fn role() -> Role {
        Role::Client
    }
}

impl RoleType for Server {
    fn role() -> Role {
        Role::Server
    }
}

impl RoleType for Any {
    fn role() -> Role {
        Role::Any
    }
}
