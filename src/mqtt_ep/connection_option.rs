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

use crate::mqtt_ep::common::HashSet;
use crate::mqtt_ep::packet::{GenericStorePacket, IsPacketId};
use derive_builder::Builder;
use getset::Getters;

/// Per-attachment connection configuration.
///
/// Options are applied when a transport is attached, so each reconnection
/// attempt can tune behavior and restore session state saved from a
/// previous connection.
#[derive(Debug, Clone, Builder, Getters)]
#[builder(derive(Debug), pattern = "owned", setter(into))]
pub struct GenericConnectionOption<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    /// PINGREQ send interval in milliseconds. `None` derives the interval
    /// from the CONNECT keep-alive; 0 disables automatic pings.
    #[builder(default = "None", setter(into, strip_option))]
    #[getset(get = "pub")]
    pingreq_send_interval_ms: Option<u64>,

    /// Automatically answer PUBLISH with PUBACK/PUBREC and PUBREL with
    /// PUBCOMP according to QoS.
    #[builder(default = "true", setter(into, strip_option))]
    #[getset(get = "pub")]
    auto_pub_response: bool,

    /// Automatically answer PINGREQ with PINGRESP (server role).
    #[builder(default = "true", setter(into, strip_option))]
    #[getset(get = "pub")]
    auto_ping_response: bool,

    /// Assign topic aliases to outgoing topics and elide repeated topics
    /// (MQTT v5.0 only).
    #[builder(default = "false", setter(into, strip_option))]
    #[getset(get = "pub")]
    auto_map_topic_alias_send: bool,

    /// Elide outgoing topics that already have an alias binding, without
    /// creating new bindings (MQTT v5.0 only).
    #[builder(default = "false", setter(into, strip_option))]
    #[getset(get = "pub")]
    auto_replace_topic_alias_send: bool,

    /// PINGRESP receive timeout in milliseconds; 0 disables the watchdog.
    #[builder(default = "0", setter(into, strip_option))]
    #[getset(get = "pub")]
    pingresp_recv_timeout_ms: u64,

    /// Connection establishment timeout (attach to CONNACK/CONNECT) in
    /// milliseconds; 0 disables it.
    #[builder(default = "0", setter(into, strip_option))]
    #[getset(get = "pub")]
    connection_establish_timeout_ms: u64,

    /// Graceful shutdown timeout in milliseconds.
    #[builder(default = "5000", setter(into, strip_option))]
    #[getset(get = "pub")]
    shutdown_timeout_ms: u64,

    /// Network read buffer size in bytes. `None` keeps the current size
    /// (initially 4096).
    #[builder(setter(into, strip_option), default)]
    #[getset(get = "pub")]
    recv_buffer_size: Option<usize>,

    /// In-flight packets to restore for session resumption.
    #[builder(default, setter(into, strip_option))]
    #[getset(get = "pub")]
    restore_packets: Vec<GenericStorePacket<PacketIdType>>,

    /// QoS 2 PUBLISH packet ids already handled before the reconnect, to
    /// suppress duplicate delivery.
    #[builder(default, setter(into, strip_option))]
    #[getset(get = "pub")]
    restore_qos2_publish_handled: HashSet<PacketIdType>,

    /// Coalesce packets queued while a write is in flight into a single
    /// scatter write.
    #[builder(default = "false", setter(into, strip_option))]
    #[getset(get = "pub")]
    bulk_write: bool,
}

/// Connection options with the standard u16 packet-id width.
pub type ConnectionOption = GenericConnectionOption<u16>;

impl<PacketIdType> Default for GenericConnectionOption<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    fn default() -> Self {
        Self::builder()
            .build()
            .expect("all options have defaults")
    }
}

impl<PacketIdType> GenericConnectionOption<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    pub fn builder() -> GenericConnectionOptionBuilder<PacketIdType> {
        GenericConnectionOptionBuilder::<PacketIdType>::default()
    }

    /// Move the session-restoration data out, consuming the options.
    pub fn into_restore_data(
        self,
    ) -> (Vec<GenericStorePacket<PacketIdType>>, HashSet<PacketIdType>) {
        (self.restore_packets, self.restore_qos2_publish_handled)
    }
}
