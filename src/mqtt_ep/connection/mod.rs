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

//! Sans-I/O MQTT connection state machine.
//!
//! [`GenericConnection`] owns every piece of per-connection protocol state
//! and performs no I/O itself: each operation returns the list of
//! [`GenericEvent`]s the caller must act on (write these bytes, arm this
//! timer, close, a packet arrived, a packet id was released). The tokio
//! endpoint drives it from its event loop; tests can drive it directly.

mod packet_id;
mod store;
mod topic_alias;

use std::collections::VecDeque;
use std::marker::PhantomData;

use bytes::Bytes;

use crate::mqtt_ep::common::{Cursor, HashSet};
use crate::mqtt_ep::packet::{
    v3_1_1, v5_0, GenericPacket, GenericStorePacket, IsPacketId, PacketType, Qos,
};
use crate::mqtt_ep::result_code::{DisconnectReasonCode, MqttError};
use crate::mqtt_ep::role::{Role as RoleValue, RoleType};
use crate::mqtt_ep::version::Version;

pub(crate) use packet_id::PacketIdManager;
pub(crate) use store::Store;
pub(crate) use topic_alias::{TopicAliasRecv, TopicAliasSend};

/// Timers the connection asks its driver to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Client-side keep-alive: send a PINGREQ when it fires.
    PingreqSend,
    /// Server-side idle limit (1.5 × keep-alive): the peer went silent.
    PingreqRecv,
    /// PINGRESP watchdog armed after a PINGREQ goes out.
    PingrespRecv,
}

/// Effect requested from (or notification to) the connection driver.
#[derive(Debug, Clone)]
pub enum GenericEvent<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    /// Put this packet on the wire. When the write fails, the listed packet
    /// id must be released again.
    RequestSendPacket {
        packet: GenericPacket<PacketIdType>,
        release_packet_id_if_send_error: Option<PacketIdType>,
    },
    /// A complete inbound packet, after state updates and auto responses.
    NotifyPacketReceived(GenericPacket<PacketIdType>),
    /// A packet id returned to the free pool; a waiter may resume.
    NotifyPacketIdReleased(PacketIdType),
    RequestTimerReset {
        kind: TimerKind,
        duration_ms: u64,
    },
    RequestTimerCancel(TimerKind),
    /// Close the transport.
    RequestClose,
    NotifyError(MqttError),
}

/// Standard-width event.
pub type Event = GenericEvent<u16>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

enum ReadState {
    FixedHeader,
    RemainingLength,
    Payload { remaining: usize },
}

/// Incremental packet framer: fixed header byte, up to four remaining-length
/// bytes, then the payload. Tolerates arbitrarily fragmented input.
struct PacketReader {
    state: ReadState,
    frame: Vec<u8>,
    rl_value: u32,
    rl_multiplier: u32,
}

enum ReadResult {
    NeedMore,
    Complete(Bytes),
    Malformed,
}

impl PacketReader {
    fn new() -> Self {
        Self {
            state: ReadState::FixedHeader,
            frame: Vec::new(),
            rl_value: 0,
            rl_multiplier: 1,
        }
    }

    fn reset(&mut self) {
        *self = Self::new();
    }

    fn feed(&mut self, cursor: &mut Cursor<&[u8]>) -> ReadResult {
        loop {
            let data = *cursor.get_ref();
            let pos = cursor.position() as usize;
            if pos >= data.len() {
                return ReadResult::NeedMore;
            }
            match self.state {
                ReadState::FixedHeader => {
                    self.frame.push(data[pos]);
                    cursor.set_position(pos as u64 + 1);
                    self.state = ReadState::RemainingLength;
                }
                ReadState::RemainingLength => {
                    let byte = data[pos];
                    cursor.set_position(pos as u64 + 1);
                    if self.frame.len() > 4 {
                        // a fifth continuation byte
                        return ReadResult::Malformed;
                    }
                    self.frame.push(byte);
                    self.rl_value += u32::from(byte & 0x7f) * self.rl_multiplier;
                    if byte & 0x80 == 0 {
                        if self.rl_value == 0 {
                            let frame = Bytes::from(std::mem::take(&mut self.frame));
                            self.reset();
                            return ReadResult::Complete(frame);
                        }
                        self.state = ReadState::Payload {
                            remaining: self.rl_value as usize,
                        };
                    } else if self.rl_multiplier == 128 * 128 * 128 {
                        return ReadResult::Malformed;
                    } else {
                        self.rl_multiplier *= 128;
                    }
                }
                ReadState::Payload { remaining } => {
                    let available = data.len() - pos;
                    let take = available.min(remaining);
                    self.frame.extend_from_slice(&data[pos..pos + take]);
                    cursor.set_position((pos + take) as u64);
                    if take == remaining {
                        let frame = Bytes::from(std::mem::take(&mut self.frame));
                        self.reset();
                        return ReadResult::Complete(frame);
                    }
                    self.state = ReadState::Payload {
                        remaining: remaining - take,
                    };
                    return ReadResult::NeedMore;
                }
            }
        }
    }
}

/// Protocol state machine for one MQTT connection.
pub struct GenericConnection<Role, PacketIdType>
where
    Role: RoleType,
    PacketIdType: IsPacketId,
{
    version: Version,
    status: ConnectionStatus,
    pid_man: PacketIdManager<PacketIdType>,
    store: Store<PacketIdType>,
    reader: PacketReader,

    // receive-maximum admission
    publish_send_max: Option<u16>,
    publish_send_count: u16,
    // QoS≥1 PUBLISHes waiting for send-side vacancy, FIFO
    publish_queue: VecDeque<v5_0::GenericPublish<PacketIdType>>,
    publish_recv_max: Option<u16>,
    publish_recv: HashSet<PacketIdType>,

    // inbound QoS 2 ids acknowledged with PUBREC but not yet released
    qos2_publish_handled: HashSet<PacketIdType>,

    topic_alias_send: Option<TopicAliasSend>,
    topic_alias_recv: Option<TopicAliasRecv>,

    keep_alive_secs: u16,
    pingreq_send_interval_ms: Option<u64>,
    pingresp_recv_timeout_ms: u64,

    auto_pub_response: bool,
    auto_ping_response: bool,
    auto_map_topic_alias_send: bool,
    auto_replace_topic_alias_send: bool,
    offline_publish: bool,

    _marker: PhantomData<Role>,
}

/// Standard-width connection.
pub type Connection<Role> = GenericConnection<Role, u16>;

impl<Role, PacketIdType> GenericConnection<Role, PacketIdType>
where
    Role: RoleType,
    PacketIdType: IsPacketId,
{
    pub fn new(version: Version) -> Self {
        Self {
            version,
            status: ConnectionStatus::Disconnected,
            pid_man: PacketIdManager::new(),
            store: Store::new(),
            reader: PacketReader::new(),
            publish_send_max: None,
            publish_send_count: 0,
            publish_queue: VecDeque::new(),
            publish_recv_max: None,
            publish_recv: HashSet::new(),
            qos2_publish_handled: HashSet::new(),
            topic_alias_send: None,
            topic_alias_recv: None,
            keep_alive_secs: 0,
            pingreq_send_interval_ms: None,
            pingresp_recv_timeout_ms: 0,
            auto_pub_response: true,
            auto_ping_response: true,
            auto_map_topic_alias_send: false,
            auto_replace_topic_alias_send: false,
            offline_publish: false,
            _marker: PhantomData,
        }
    }

    // ---- configuration ----------------------------------------------------

    pub fn set_pingreq_send_interval(&mut self, interval_ms: Option<u64>) {
        self.pingreq_send_interval_ms = interval_ms;
    }

    pub fn set_pingresp_recv_timeout(&mut self, timeout_ms: u64) {
        self.pingresp_recv_timeout_ms = timeout_ms;
    }

    pub fn set_auto_pub_response(&mut self, on: bool) {
        self.auto_pub_response = on;
    }

    pub fn set_auto_ping_response(&mut self, on: bool) {
        self.auto_ping_response = on;
    }

    pub fn set_auto_map_topic_alias_send(&mut self, on: bool) {
        self.auto_map_topic_alias_send = on;
    }

    pub fn set_auto_replace_topic_alias_send(&mut self, on: bool) {
        self.auto_replace_topic_alias_send = on;
    }

    pub fn set_offline_publish(&mut self, on: bool) {
        self.offline_publish = on;
    }

    // ---- accessors --------------------------------------------------------

    pub fn get_protocol_version(&self) -> Version {
        self.version
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// How many more QoS≥1 PUBLISHes may go out before the peer's receive
    /// maximum is hit. `None` means no limit was negotiated.
    pub fn get_receive_maximum_vacancy_for_send(&self) -> Option<u16> {
        self.publish_send_max
            .map(|max| max.saturating_sub(self.publish_send_count))
    }

    pub fn is_publish_processing(&self, packet_id: PacketIdType) -> bool {
        self.store.contains_id(packet_id)
    }

    // ---- packet-id management ---------------------------------------------

    pub fn acquire_packet_id(&mut self) -> Result<PacketIdType, MqttError> {
        self.pid_man
            .acquire_unique()
            .ok_or(MqttError::PacketIdentifierFullyUsed)
    }

    pub fn register_packet_id(&mut self, packet_id: PacketIdType) -> Result<(), MqttError> {
        if self.pid_man.register(packet_id) {
            Ok(())
        } else {
            Err(MqttError::PacketIdentifierConflict)
        }
    }

    pub fn release_packet_id(&mut self, packet_id: PacketIdType) -> Vec<GenericEvent<PacketIdType>> {
        let mut events = Vec::new();
        if self.pid_man.release(packet_id) {
            self.store.erase(PacketType::Publish, packet_id);
            self.store.erase(PacketType::Pubrel, packet_id);
            events.push(GenericEvent::NotifyPacketIdReleased(packet_id));
        }
        events
    }

    // ---- store management -------------------------------------------------

    pub fn get_stored_packets(&self) -> Vec<GenericStorePacket<PacketIdType>> {
        self.store.get_all()
    }

    pub fn restore_packets(&mut self, packets: Vec<GenericStorePacket<PacketIdType>>) {
        for p in &packets {
            let _ = self.pid_man.register(p.packet_id());
        }
        self.store.restore(packets);
    }

    pub fn erase_stored_publish(&mut self, packet_id: PacketIdType) -> bool {
        self.store.erase_publish(packet_id)
    }

    pub fn get_qos2_publish_handled(&self) -> HashSet<PacketIdType> {
        self.qos2_publish_handled.clone()
    }

    pub fn restore_qos2_publish_handled(&mut self, pids: HashSet<PacketIdType>) {
        self.qos2_publish_handled = pids;
    }

    /// Normalize a PUBLISH so it can sit in the store across reconnects:
    /// restore the full topic and drop any topic alias.
    pub fn regulate_for_store(
        &self,
        mut packet: v5_0::GenericPublish<PacketIdType>,
    ) -> Result<v5_0::GenericPublish<PacketIdType>, MqttError> {
        if packet.topic_name().is_empty() {
            let alias = packet.topic_alias().ok_or(MqttError::PacketNotRegulated)?;
            let topic = self
                .topic_alias_send
                .as_ref()
                .and_then(|m| m.find_by_alias(alias))
                .ok_or(MqttError::PacketNotRegulated)?
                .to_owned();
            packet.remove_topic_alias_add_topic(topic)?;
        } else if packet.topic_alias().is_some() {
            let topic = packet.topic_name().to_owned();
            packet.remove_topic_alias_add_topic(topic)?;
        }
        Ok(packet)
    }

    // ---- send path --------------------------------------------------------

    pub fn send(&mut self, packet: GenericPacket<PacketIdType>) -> Vec<GenericEvent<PacketIdType>> {
        let mut events = Vec::new();
        let packet_type = packet.packet_type();

        if !Role::role().can_send(packet_type) {
            events.push(GenericEvent::NotifyError(MqttError::PacketNotAllowedToSend));
            return events;
        }
        match self.version {
            Version::Undetermined => {
                if packet_type == PacketType::Connect {
                    self.version = packet.version();
                } else {
                    events.push(GenericEvent::NotifyError(MqttError::VersionMismatch));
                    return events;
                }
            }
            v if v != packet.version() => {
                events.push(GenericEvent::NotifyError(MqttError::VersionMismatch));
                return events;
            }
            _ => {}
        }

        match packet {
            GenericPacket::V3_1_1Connect(p) => self.send_connect_v3(p, &mut events),
            GenericPacket::V5_0Connect(p) => self.send_connect_v5(p, &mut events),
            GenericPacket::V3_1_1Connack(p) => self.send_connack_v3(p, &mut events),
            GenericPacket::V5_0Connack(p) => self.send_connack_v5(p, &mut events),
            GenericPacket::V3_1_1Publish(p) => self.send_publish_v3(p, &mut events),
            GenericPacket::V5_0Publish(p) => self.send_publish_v5(p, &mut events),
            GenericPacket::V3_1_1Puback(p) => {
                self.publish_recv.remove(&p.packet_id());
                self.request_send(p.into(), None, &mut events);
            }
            GenericPacket::V5_0Puback(p) => {
                self.publish_recv.remove(&p.packet_id());
                self.request_send(p.into(), None, &mut events);
            }
            GenericPacket::V3_1_1Pubrec(p) => {
                self.request_send(p.into(), None, &mut events);
            }
            GenericPacket::V5_0Pubrec(p) => {
                if p.reason_code().is_failure() {
                    self.publish_recv.remove(&p.packet_id());
                    self.qos2_publish_handled.remove(&p.packet_id());
                }
                self.request_send(p.into(), None, &mut events);
            }
            GenericPacket::V3_1_1Pubrel(p) => {
                let pid = p.packet_id();
                self.store.erase_publish(pid);
                self.store
                    .add(GenericStorePacket::V3_1_1Pubrel(p.clone()));
                self.request_send(p.into(), None, &mut events);
            }
            GenericPacket::V5_0Pubrel(p) => {
                let pid = p.packet_id();
                self.store.erase_publish(pid);
                self.store.add(GenericStorePacket::V5_0Pubrel(p.clone()));
                self.request_send(p.into(), None, &mut events);
            }
            GenericPacket::V3_1_1Pubcomp(p) => {
                self.publish_recv.remove(&p.packet_id());
                self.qos2_publish_handled.remove(&p.packet_id());
                self.request_send(p.into(), None, &mut events);
            }
            GenericPacket::V5_0Pubcomp(p) => {
                self.publish_recv.remove(&p.packet_id());
                self.qos2_publish_handled.remove(&p.packet_id());
                self.request_send(p.into(), None, &mut events);
            }
            GenericPacket::V3_1_1Subscribe(p) => {
                let pid = p.packet_id();
                self.send_with_registered_pid(p.into(), pid, &mut events);
            }
            GenericPacket::V5_0Subscribe(p) => {
                let pid = p.packet_id();
                self.send_with_registered_pid(p.into(), pid, &mut events);
            }
            GenericPacket::V3_1_1Unsubscribe(p) => {
                let pid = p.packet_id();
                self.send_with_registered_pid(p.into(), pid, &mut events);
            }
            GenericPacket::V5_0Unsubscribe(p) => {
                let pid = p.packet_id();
                self.send_with_registered_pid(p.into(), pid, &mut events);
            }
            GenericPacket::V3_1_1Suback(p) => self.request_send(p.into(), None, &mut events),
            GenericPacket::V5_0Suback(p) => self.request_send(p.into(), None, &mut events),
            GenericPacket::V3_1_1Unsuback(p) => self.request_send(p.into(), None, &mut events),
            GenericPacket::V5_0Unsuback(p) => self.request_send(p.into(), None, &mut events),
            GenericPacket::V3_1_1Pingreq(p) => self.send_pingreq(p.into(), &mut events),
            GenericPacket::V5_0Pingreq(p) => self.send_pingreq(p.into(), &mut events),
            GenericPacket::V3_1_1Pingresp(p) => self.request_send(p.into(), None, &mut events),
            GenericPacket::V5_0Pingresp(p) => self.request_send(p.into(), None, &mut events),
            GenericPacket::V3_1_1Disconnect(p) => self.send_disconnect(p.into(), &mut events),
            GenericPacket::V5_0Disconnect(p) => self.send_disconnect(p.into(), &mut events),
            GenericPacket::V5_0Auth(p) => self.request_send(p.into(), None, &mut events),
        }
        events
    }

    fn send_connect_v3(
        &mut self,
        packet: v3_1_1::Connect,
        events: &mut Vec<GenericEvent<PacketIdType>>,
    ) {
        if self.status != ConnectionStatus::Disconnected {
            events.push(GenericEvent::NotifyError(MqttError::PacketNotAllowedToSend));
            return;
        }
        self.status = ConnectionStatus::Connecting;
        self.keep_alive_secs = packet.keep_alive();
        if packet.clean_session() {
            self.clear_session_state(events);
        }
        self.request_send(packet.into(), None, events);
    }

    fn send_connect_v5(
        &mut self,
        packet: v5_0::Connect,
        events: &mut Vec<GenericEvent<PacketIdType>>,
    ) {
        if self.status != ConnectionStatus::Disconnected {
            events.push(GenericEvent::NotifyError(MqttError::PacketNotAllowedToSend));
            return;
        }
        self.status = ConnectionStatus::Connecting;
        self.keep_alive_secs = packet.keep_alive();
        if packet.clean_start() {
            self.clear_session_state(events);
        }
        // what we are willing to receive
        self.publish_recv_max = packet.props().receive_maximum();
        if let Some(max) = packet.props().topic_alias_maximum() {
            if max > 0 {
                self.topic_alias_recv = Some(TopicAliasRecv::new(max));
            }
        }
        self.request_send(packet.into(), None, events);
    }

    fn send_connack_v3(
        &mut self,
        packet: v3_1_1::Connack,
        events: &mut Vec<GenericEvent<PacketIdType>>,
    ) {
        if packet.return_code().is_success() {
            self.status = ConnectionStatus::Connected;
        } else {
            self.status = ConnectionStatus::Disconnected;
        }
        self.request_send(packet.into(), None, events);
    }

    fn send_connack_v5(
        &mut self,
        packet: v5_0::Connack,
        events: &mut Vec<GenericEvent<PacketIdType>>,
    ) {
        if packet.reason_code().is_success() {
            self.status = ConnectionStatus::Connected;
        } else {
            self.status = ConnectionStatus::Disconnected;
        }
        self.publish_recv_max = Some(packet.props().receive_maximum().unwrap_or(u16::MAX));
        if let Some(max) = packet.props().topic_alias_maximum() {
            if max > 0 {
                self.topic_alias_recv = Some(TopicAliasRecv::new(max));
            }
        }
        self.request_send(packet.into(), None, events);
    }

    fn send_publish_v3(
        &mut self,
        packet: v3_1_1::GenericPublish<PacketIdType>,
        events: &mut Vec<GenericEvent<PacketIdType>>,
    ) {
        let qos = packet.qos();
        if self.status != ConnectionStatus::Connected {
            if self.offline_publish && qos != Qos::AtMostOnce {
                self.store
                    .add(GenericStorePacket::V3_1_1Publish(packet));
                return;
            }
            events.push(GenericEvent::NotifyError(MqttError::PacketNotAllowedToSend));
            return;
        }
        let release_pid = if qos != Qos::AtMostOnce {
            let pid = packet.packet_id().unwrap_or_else(PacketIdType::zero);
            if !self.pid_man.is_used(pid) {
                events.push(GenericEvent::NotifyError(MqttError::PacketIdentifierInvalid));
                return;
            }
            self.store
                .add(GenericStorePacket::V3_1_1Publish(packet.clone()));
            Some(pid)
        } else {
            None
        };
        self.request_send(packet.into(), release_pid, events);
    }

    fn send_publish_v5(
        &mut self,
        packet: v5_0::GenericPublish<PacketIdType>,
        events: &mut Vec<GenericEvent<PacketIdType>>,
    ) {
        let qos = packet.qos();
        if self.status != ConnectionStatus::Connected {
            if self.offline_publish && qos != Qos::AtMostOnce {
                match self.regulate_for_store(packet) {
                    Ok(p) => self.store.add(GenericStorePacket::V5_0Publish(p)),
                    Err(e) => events.push(GenericEvent::NotifyError(e)),
                }
                return;
            }
            events.push(GenericEvent::NotifyError(MqttError::PacketNotAllowedToSend));
            return;
        }
        if qos != Qos::AtMostOnce {
            let pid = packet.packet_id().unwrap_or_else(PacketIdType::zero);
            if !self.pid_man.is_used(pid) {
                events.push(GenericEvent::NotifyError(MqttError::PacketIdentifierInvalid));
                return;
            }
            // sends beyond the peer's receive maximum queue behind earlier
            // pending PUBLISHes until an acknowledgement opens the window
            if self.get_receive_maximum_vacancy_for_send() == Some(0)
                || !self.publish_queue.is_empty()
            {
                self.publish_queue.push_back(packet);
                return;
            }
        }

        self.transmit_publish_v5(packet, events);
    }

    /// Put a v5 PUBLISH on the wire once admission has been granted.
    fn transmit_publish_v5(
        &mut self,
        mut packet: v5_0::GenericPublish<PacketIdType>,
        events: &mut Vec<GenericEvent<PacketIdType>>,
    ) {
        let qos = packet.qos();

        // validate a caller-supplied alias before any rewriting
        if let Some(alias) = packet.topic_alias() {
            let max = self.topic_alias_send.as_ref().map_or(0, TopicAliasSend::max);
            if alias > max {
                events.push(GenericEvent::NotifyError(MqttError::TopicAliasInvalid));
                return;
            }
        }

        // store a regulated copy before the alias rewriting below
        let release_pid = if qos != Qos::AtMostOnce {
            let pid = packet.packet_id().unwrap_or_else(PacketIdType::zero);
            if !self.pid_man.is_used(pid) {
                // the id was released while the packet waited in the queue
                events.push(GenericEvent::NotifyError(MqttError::PacketIdentifierInvalid));
                return;
            }
            match self.regulate_for_store(packet.clone()) {
                Ok(p) => self.store.add(GenericStorePacket::V5_0Publish(p)),
                Err(e) => {
                    events.push(GenericEvent::NotifyError(e));
                    return;
                }
            }
            self.publish_send_count += 1;
            packet.packet_id()
        } else {
            None
        };

        if let Some(alias) = packet.topic_alias() {
            // caller managed the alias; learn the binding when it carries one
            if !packet.topic_name().is_empty() {
                if let Some(map) = self.topic_alias_send.as_mut() {
                    map.insert_or_update(&packet.topic_name().to_owned(), alias);
                }
            }
        } else if !packet.topic_name().is_empty() {
            if let Some(map) = self.topic_alias_send.as_mut() {
                let topic = packet.topic_name().to_owned();
                if let Some(alias) = map.find_by_topic(&topic) {
                    if self.auto_map_topic_alias_send || self.auto_replace_topic_alias_send {
                        if packet.remove_topic_add_topic_alias(alias).is_err() {
                            events.push(GenericEvent::NotifyError(MqttError::TopicAliasInvalid));
                            return;
                        }
                    }
                } else if self.auto_map_topic_alias_send {
                    if let Some(alias) = map.next_alias() {
                        map.insert_or_update(&topic, alias);
                        if packet.add_topic_alias(alias).is_err() {
                            events.push(GenericEvent::NotifyError(MqttError::TopicAliasInvalid));
                            return;
                        }
                    }
                }
            }
        }

        self.request_send(packet.into(), release_pid, events);
    }

    fn send_with_registered_pid(
        &mut self,
        packet: GenericPacket<PacketIdType>,
        pid: PacketIdType,
        events: &mut Vec<GenericEvent<PacketIdType>>,
    ) {
        if self.status != ConnectionStatus::Connected {
            events.push(GenericEvent::NotifyError(MqttError::PacketNotAllowedToSend));
            return;
        }
        if !self.pid_man.is_used(pid) {
            events.push(GenericEvent::NotifyError(MqttError::PacketIdentifierInvalid));
            return;
        }
        self.request_send(packet, Some(pid), events);
    }

    fn send_pingreq(
        &mut self,
        packet: GenericPacket<PacketIdType>,
        events: &mut Vec<GenericEvent<PacketIdType>>,
    ) {
        self.request_send(packet, None, events);
        if self.pingresp_recv_timeout_ms > 0 {
            events.push(GenericEvent::RequestTimerReset {
                kind: TimerKind::PingrespRecv,
                duration_ms: self.pingresp_recv_timeout_ms,
            });
        }
    }

    fn send_disconnect(
        &mut self,
        packet: GenericPacket<PacketIdType>,
        events: &mut Vec<GenericEvent<PacketIdType>>,
    ) {
        self.status = ConnectionStatus::Disconnecting;
        self.request_send(packet, None, events);
        events.push(GenericEvent::RequestClose);
    }

    /// Emit a send request and maintain the client keep-alive timer.
    fn request_send(
        &mut self,
        packet: GenericPacket<PacketIdType>,
        release_packet_id_if_send_error: Option<PacketIdType>,
        events: &mut Vec<GenericEvent<PacketIdType>>,
    ) {
        events.push(GenericEvent::RequestSendPacket {
            packet,
            release_packet_id_if_send_error,
        });
        if Role::role() != RoleValue::Server {
            if let Some(interval) = self.pingreq_send_interval() {
                events.push(GenericEvent::RequestTimerReset {
                    kind: TimerKind::PingreqSend,
                    duration_ms: interval,
                });
            }
        }
    }

    fn pingreq_send_interval(&self) -> Option<u64> {
        match self.pingreq_send_interval_ms {
            Some(0) => None,
            Some(ms) => Some(ms),
            None if self.keep_alive_secs > 0 => Some(u64::from(self.keep_alive_secs) * 1000),
            None => None,
        }
    }

    fn clear_session_state(&mut self, events: &mut Vec<GenericEvent<PacketIdType>>) {
        let stored: Vec<PacketIdType> = self.store.iter().map(|p| p.packet_id()).collect();
        self.store.clear();
        self.qos2_publish_handled.clear();
        for pid in stored {
            if self.pid_man.release(pid) {
                events.push(GenericEvent::NotifyPacketIdReleased(pid));
            }
        }
    }

    // ---- receive path -----------------------------------------------------

    /// Consume bytes from `cursor` until one complete packet is processed or
    /// the data runs out. At most one packet is handled per call so the
    /// driver can interleave state observation between packets.
    pub fn recv(&mut self, cursor: &mut Cursor<&[u8]>) -> Vec<GenericEvent<PacketIdType>> {
        match self.reader.feed(cursor) {
            ReadResult::NeedMore => Vec::new(),
            ReadResult::Malformed => {
                self.reader.reset();
                self.protocol_failure(MqttError::MalformedPacket)
            }
            ReadResult::Complete(frame) => self.process_frame(frame),
        }
    }

    fn process_frame(&mut self, frame: Bytes) -> Vec<GenericEvent<PacketIdType>> {
        if self.version == Version::Undetermined {
            match Self::sniff_connect_version(&frame) {
                Some(version) => self.version = version,
                None => return self.protocol_failure(MqttError::MalformedPacket),
            }
        }
        match GenericPacket::<PacketIdType>::decode(self.version, frame) {
            Ok(packet) => self.process_recv_packet(packet),
            Err(e) => self.protocol_failure(e),
        }
    }

    /// Extract the protocol level from a CONNECT frame before the version is
    /// known (server role).
    fn sniff_connect_version(frame: &[u8]) -> Option<Version> {
        if frame.first()? >> 4 != 1 {
            return None;
        }
        // skip the remaining-length bytes
        let mut idx = 1;
        while *frame.get(idx)? & 0x80 != 0 {
            idx += 1;
        }
        idx += 1;
        if frame.get(idx..idx + 6)? != [0x00, 0x04, b'M', b'Q', b'T', b'T'] {
            return None;
        }
        Version::from_protocol_level(*frame.get(idx + 6)?)
    }

    fn process_recv_packet(
        &mut self,
        packet: GenericPacket<PacketIdType>,
    ) -> Vec<GenericEvent<PacketIdType>> {
        let mut events = Vec::new();

        // any traffic proves the peer is alive
        if Role::role() == RoleValue::Server && self.keep_alive_secs > 0 {
            events.push(GenericEvent::RequestTimerReset {
                kind: TimerKind::PingreqRecv,
                duration_ms: u64::from(self.keep_alive_secs) * 1500,
            });
        }

        match packet {
            GenericPacket::V3_1_1Connect(p) => {
                self.status = ConnectionStatus::Connecting;
                self.keep_alive_secs = p.keep_alive();
                if p.clean_session() {
                    self.clear_session_state(&mut events);
                }
                if self.keep_alive_secs > 0 {
                    events.push(GenericEvent::RequestTimerReset {
                        kind: TimerKind::PingreqRecv,
                        duration_ms: u64::from(self.keep_alive_secs) * 1500,
                    });
                }
                events.push(GenericEvent::NotifyPacketReceived(p.into()));
            }
            GenericPacket::V5_0Connect(p) => {
                self.status = ConnectionStatus::Connecting;
                self.keep_alive_secs = p.keep_alive();
                if p.clean_start() {
                    self.clear_session_state(&mut events);
                }
                // what the peer is willing to receive
                self.publish_send_max = Some(p.props().receive_maximum().unwrap_or(u16::MAX));
                if let Some(max) = p.props().topic_alias_maximum() {
                    if max > 0 {
                        self.topic_alias_send = Some(TopicAliasSend::new(max));
                    }
                }
                if self.keep_alive_secs > 0 {
                    events.push(GenericEvent::RequestTimerReset {
                        kind: TimerKind::PingreqRecv,
                        duration_ms: u64::from(self.keep_alive_secs) * 1500,
                    });
                }
                events.push(GenericEvent::NotifyPacketReceived(p.into()));
            }
            GenericPacket::V3_1_1Connack(p) => {
                if p.return_code().is_success() {
                    self.status = ConnectionStatus::Connected;
                    self.handle_session_presence(p.session_present(), &mut events);
                    self.arm_pingreq_send_timer(&mut events);
                } else {
                    self.status = ConnectionStatus::Disconnected;
                }
                events.push(GenericEvent::NotifyPacketReceived(p.into()));
            }
            GenericPacket::V5_0Connack(p) => {
                if p.reason_code().is_success() {
                    self.status = ConnectionStatus::Connected;
                    self.publish_send_max =
                        Some(p.props().receive_maximum().unwrap_or(u16::MAX));
                    if let Some(max) = p.props().topic_alias_maximum() {
                        if max > 0 {
                            self.topic_alias_send = Some(TopicAliasSend::new(max));
                        }
                    }
                    if let Some(server_keep_alive) = p.props().server_keep_alive() {
                        self.keep_alive_secs = server_keep_alive;
                    }
                    self.handle_session_presence(p.session_present(), &mut events);
                    self.arm_pingreq_send_timer(&mut events);
                } else {
                    self.status = ConnectionStatus::Disconnected;
                }
                events.push(GenericEvent::NotifyPacketReceived(p.into()));
            }
            GenericPacket::V3_1_1Publish(p) => self.recv_publish_v3(p, &mut events),
            GenericPacket::V5_0Publish(p) => self.recv_publish_v5(p, &mut events),
            GenericPacket::V3_1_1Puback(p) => {
                self.recv_puback(p.packet_id(), &mut events);
                events.push(GenericEvent::NotifyPacketReceived(p.into()));
            }
            GenericPacket::V5_0Puback(p) => {
                self.recv_puback(p.packet_id(), &mut events);
                events.push(GenericEvent::NotifyPacketReceived(p.into()));
            }
            GenericPacket::V3_1_1Pubrec(p) => {
                let pid = p.packet_id();
                self.store.erase_publish(pid);
                if self.auto_pub_response && self.status == ConnectionStatus::Connected {
                    if let Ok(pubrel) = v3_1_1::GenericPubrel::new(pid) {
                        let send_events = self.send(pubrel.into());
                        events.extend(send_events);
                    }
                }
                events.push(GenericEvent::NotifyPacketReceived(p.into()));
            }
            GenericPacket::V5_0Pubrec(p) => {
                let pid = p.packet_id();
                self.store.erase_publish(pid);
                if p.reason_code().is_failure() {
                    self.publish_send_count = self.publish_send_count.saturating_sub(1);
                    let release_events = self.release_packet_id(pid);
                    events.extend(release_events);
                    self.drain_publish_queue(&mut events);
                } else if self.auto_pub_response && self.status == ConnectionStatus::Connected {
                    if let Ok(pubrel) = v5_0::GenericPubrel::new(pid) {
                        let send_events = self.send(pubrel.into());
                        events.extend(send_events);
                    }
                }
                events.push(GenericEvent::NotifyPacketReceived(p.into()));
            }
            GenericPacket::V3_1_1Pubrel(p) => {
                let pid = p.packet_id();
                if self.auto_pub_response && self.status == ConnectionStatus::Connected {
                    if let Ok(pubcomp) = v3_1_1::GenericPubcomp::new(pid) {
                        let send_events = self.send(pubcomp.into());
                        events.extend(send_events);
                    }
                } else {
                    self.qos2_publish_handled.remove(&pid);
                }
                events.push(GenericEvent::NotifyPacketReceived(p.into()));
            }
            GenericPacket::V5_0Pubrel(p) => {
                let pid = p.packet_id();
                if self.auto_pub_response && self.status == ConnectionStatus::Connected {
                    if let Ok(pubcomp) = v5_0::GenericPubcomp::new(pid) {
                        let send_events = self.send(pubcomp.into());
                        events.extend(send_events);
                    }
                } else {
                    self.qos2_publish_handled.remove(&pid);
                }
                events.push(GenericEvent::NotifyPacketReceived(p.into()));
            }
            GenericPacket::V3_1_1Pubcomp(p) => {
                self.recv_pubcomp(p.packet_id(), &mut events);
                events.push(GenericEvent::NotifyPacketReceived(p.into()));
            }
            GenericPacket::V5_0Pubcomp(p) => {
                self.recv_pubcomp(p.packet_id(), &mut events);
                events.push(GenericEvent::NotifyPacketReceived(p.into()));
            }
            GenericPacket::V3_1_1Subscribe(p) => {
                events.push(GenericEvent::NotifyPacketReceived(p.into()));
            }
            GenericPacket::V5_0Subscribe(p) => {
                events.push(GenericEvent::NotifyPacketReceived(p.into()));
            }
            GenericPacket::V3_1_1Suback(p) => {
                let release_events = self.release_packet_id(p.packet_id());
                events.extend(release_events);
                events.push(GenericEvent::NotifyPacketReceived(p.into()));
            }
            GenericPacket::V5_0Suback(p) => {
                let release_events = self.release_packet_id(p.packet_id());
                events.extend(release_events);
                events.push(GenericEvent::NotifyPacketReceived(p.into()));
            }
            GenericPacket::V3_1_1Unsubscribe(p) => {
                events.push(GenericEvent::NotifyPacketReceived(p.into()));
            }
            GenericPacket::V5_0Unsubscribe(p) => {
                events.push(GenericEvent::NotifyPacketReceived(p.into()));
            }
            GenericPacket::V3_1_1Unsuback(p) => {
                let release_events = self.release_packet_id(p.packet_id());
                events.extend(release_events);
                events.push(GenericEvent::NotifyPacketReceived(p.into()));
            }
            GenericPacket::V5_0Unsuback(p) => {
                let release_events = self.release_packet_id(p.packet_id());
                events.extend(release_events);
                events.push(GenericEvent::NotifyPacketReceived(p.into()));
            }
            GenericPacket::V3_1_1Pingreq(p) => {
                if Role::role() != RoleValue::Client
                    && self.auto_ping_response
                    && self.status == ConnectionStatus::Connected
                {
                    let send_events = self.send(v3_1_1::Pingresp::new().into());
                    events.extend(send_events);
                }
                events.push(GenericEvent::NotifyPacketReceived(p.into()));
            }
            GenericPacket::V5_0Pingreq(p) => {
                if Role::role() != RoleValue::Client
                    && self.auto_ping_response
                    && self.status == ConnectionStatus::Connected
                {
                    let send_events = self.send(v5_0::Pingresp::new().into());
                    events.extend(send_events);
                }
                events.push(GenericEvent::NotifyPacketReceived(p.into()));
            }
            GenericPacket::V3_1_1Pingresp(p) => {
                events.push(GenericEvent::RequestTimerCancel(TimerKind::PingrespRecv));
                events.push(GenericEvent::NotifyPacketReceived(p.into()));
            }
            GenericPacket::V5_0Pingresp(p) => {
                events.push(GenericEvent::RequestTimerCancel(TimerKind::PingrespRecv));
                events.push(GenericEvent::NotifyPacketReceived(p.into()));
            }
            GenericPacket::V3_1_1Disconnect(p) => {
                self.status = ConnectionStatus::Disconnected;
                events.push(GenericEvent::NotifyPacketReceived(p.into()));
                events.push(GenericEvent::RequestClose);
            }
            GenericPacket::V5_0Disconnect(p) => {
                self.status = ConnectionStatus::Disconnected;
                events.push(GenericEvent::NotifyPacketReceived(p.into()));
                events.push(GenericEvent::RequestClose);
            }
            GenericPacket::V5_0Auth(p) => {
                events.push(GenericEvent::NotifyPacketReceived(p.into()));
            }
        }
        events
    }

    fn recv_publish_v3(
        &mut self,
        packet: v3_1_1::GenericPublish<PacketIdType>,
        events: &mut Vec<GenericEvent<PacketIdType>>,
    ) {
        let qos = packet.qos();
        let pid = packet.packet_id();
        let mut suppress = false;
        if let Some(pid) = pid {
            match qos {
                Qos::AtLeastOnce => {
                    self.publish_recv.insert(pid);
                    if self.auto_pub_response && self.status == ConnectionStatus::Connected {
                        if let Ok(puback) = v3_1_1::GenericPuback::new(pid) {
                            let send_events = self.send(puback.into());
                            events.extend(send_events);
                        }
                    }
                }
                Qos::ExactlyOnce => {
                    self.publish_recv.insert(pid);
                    suppress = !self.qos2_publish_handled.insert(pid);
                    if self.auto_pub_response && self.status == ConnectionStatus::Connected {
                        if let Ok(pubrec) = v3_1_1::GenericPubrec::new(pid) {
                            let send_events = self.send(pubrec.into());
                            events.extend(send_events);
                        }
                    }
                }
                Qos::AtMostOnce => {}
            }
        }
        if !suppress {
            events.push(GenericEvent::NotifyPacketReceived(packet.into()));
        }
    }

    fn recv_publish_v5(
        &mut self,
        mut packet: v5_0::GenericPublish<PacketIdType>,
        events: &mut Vec<GenericEvent<PacketIdType>>,
    ) {
        let qos = packet.qos();
        let pid = packet.packet_id();

        if qos != Qos::AtMostOnce {
            if let (Some(pid), Some(max)) = (pid, self.publish_recv_max) {
                self.publish_recv.insert(pid);
                if self.publish_recv.len() > usize::from(max) {
                    events.extend(self.protocol_failure(MqttError::ReceiveMaximumExceeded));
                    return;
                }
            } else if let Some(pid) = pid {
                self.publish_recv.insert(pid);
            }
        }

        // topic alias resolution and binding
        if let Some(alias) = packet.topic_alias() {
            enum AliasAction {
                Rewrite(String),
                Bound,
                Invalid,
            }
            let action = {
                let topic = packet.topic_name().to_owned();
                match self.topic_alias_recv.as_mut() {
                    Some(map) if alias <= map.max() => {
                        if topic.is_empty() {
                            match map.find(alias) {
                                Some(resolved) => AliasAction::Rewrite(resolved.to_owned()),
                                None => AliasAction::Invalid,
                            }
                        } else {
                            map.insert_or_update(&topic, alias);
                            AliasAction::Bound
                        }
                    }
                    _ => AliasAction::Invalid,
                }
            };
            match action {
                AliasAction::Rewrite(topic) => {
                    if packet.set_topic_name(&topic).is_err() {
                        events.extend(self.protocol_failure(MqttError::TopicNameInvalid));
                        return;
                    }
                }
                AliasAction::Bound => {}
                AliasAction::Invalid => {
                    events.extend(self.protocol_failure(MqttError::TopicAliasInvalid));
                    return;
                }
            }
        }

        let mut suppress = false;
        if let Some(pid) = pid {
            match qos {
                Qos::AtLeastOnce => {
                    if self.auto_pub_response && self.status == ConnectionStatus::Connected {
                        if let Ok(puback) = v5_0::GenericPuback::new(pid) {
                            let send_events = self.send(puback.into());
                            events.extend(send_events);
                        }
                    }
                }
                Qos::ExactlyOnce => {
                    suppress = !self.qos2_publish_handled.insert(pid);
                    if self.auto_pub_response && self.status == ConnectionStatus::Connected {
                        if let Ok(pubrec) = v5_0::GenericPubrec::new(pid) {
                            let send_events = self.send(pubrec.into());
                            events.extend(send_events);
                        }
                    }
                }
                Qos::AtMostOnce => {}
            }
        }
        if !suppress {
            events.push(GenericEvent::NotifyPacketReceived(packet.into()));
        }
    }

    fn recv_puback(
        &mut self,
        pid: PacketIdType,
        events: &mut Vec<GenericEvent<PacketIdType>>,
    ) {
        if self.store.erase_publish(pid) {
            self.publish_send_count = self.publish_send_count.saturating_sub(1);
            let release_events = self.release_packet_id(pid);
            events.extend(release_events);
        }
        self.drain_publish_queue(events);
    }

    fn recv_pubcomp(
        &mut self,
        pid: PacketIdType,
        events: &mut Vec<GenericEvent<PacketIdType>>,
    ) {
        if self.store.erase(PacketType::Pubrel, pid) {
            self.publish_send_count = self.publish_send_count.saturating_sub(1);
        }
        let release_events = self.release_packet_id(pid);
        events.extend(release_events);
        self.drain_publish_queue(events);
    }

    /// Transmit queued PUBLISHes in FIFO order while the send window has
    /// vacancy.
    fn drain_publish_queue(&mut self, events: &mut Vec<GenericEvent<PacketIdType>>) {
        loop {
            if self.status != ConnectionStatus::Connected
                || self.get_receive_maximum_vacancy_for_send() == Some(0)
            {
                break;
            }
            let Some(packet) = self.publish_queue.pop_front() else {
                break;
            };
            self.transmit_publish_v5(packet, events);
        }
    }

    fn handle_session_presence(
        &mut self,
        session_present: bool,
        events: &mut Vec<GenericEvent<PacketIdType>>,
    ) {
        if session_present {
            // replay PUBLISHes in store order with DUP, then PUBRELs
            let stored = self.store.get_all();
            for p in stored.iter().filter(|p| p.is_publish()) {
                let packet = match p.clone() {
                    GenericStorePacket::V3_1_1Publish(mut pub_packet) => {
                        pub_packet.set_dup(true);
                        GenericPacket::V3_1_1Publish(pub_packet)
                    }
                    GenericStorePacket::V5_0Publish(mut pub_packet) => {
                        pub_packet.set_dup(true);
                        GenericPacket::V5_0Publish(pub_packet)
                    }
                    other => other.into(),
                };
                self.publish_send_count += 1;
                events.push(GenericEvent::RequestSendPacket {
                    packet,
                    release_packet_id_if_send_error: None,
                });
            }
            for p in stored.iter().filter(|p| !p.is_publish()) {
                self.publish_send_count += 1;
                events.push(GenericEvent::RequestSendPacket {
                    packet: p.clone().into(),
                    release_packet_id_if_send_error: None,
                });
            }
        } else {
            self.clear_session_state(events);
        }
    }

    fn arm_pingreq_send_timer(&mut self, events: &mut Vec<GenericEvent<PacketIdType>>) {
        if Role::role() != RoleValue::Server {
            if let Some(interval) = self.pingreq_send_interval() {
                events.push(GenericEvent::RequestTimerReset {
                    kind: TimerKind::PingreqSend,
                    duration_ms: interval,
                });
            }
        }
    }

    /// Fatal protocol failure on the receive path: report, tell the peer
    /// (v5), and close.
    fn protocol_failure(&mut self, error: MqttError) -> Vec<GenericEvent<PacketIdType>> {
        let mut events = vec![GenericEvent::NotifyError(error)];
        if self.version == Version::V5_0
            && matches!(
                self.status,
                ConnectionStatus::Connecting | ConnectionStatus::Connected
            )
        {
            let reason = error.disconnect_reason_code();
            if let Ok(disconnect) = v5_0::Disconnect::builder().reason_code(reason).build() {
                self.status = ConnectionStatus::Disconnecting;
                events.push(GenericEvent::RequestSendPacket {
                    packet: disconnect.into(),
                    release_packet_id_if_send_error: None,
                });
            }
        }
        self.status = ConnectionStatus::Disconnecting;
        events.push(GenericEvent::RequestClose);
        events
    }

    // ---- timers and lifecycle ---------------------------------------------

    pub fn notify_timer_fired(&mut self, kind: TimerKind) -> Vec<GenericEvent<PacketIdType>> {
        match kind {
            TimerKind::PingreqSend => {
                if self.status != ConnectionStatus::Connected {
                    return Vec::new();
                }
                let packet: GenericPacket<PacketIdType> = match self.version {
                    Version::V5_0 => v5_0::Pingreq::new().into(),
                    _ => v3_1_1::Pingreq::new().into(),
                };
                self.send(packet)
            }
            TimerKind::PingreqRecv | TimerKind::PingrespRecv => {
                let mut events = vec![GenericEvent::NotifyError(MqttError::KeepAliveTimeout)];
                if self.version == Version::V5_0 && self.status == ConnectionStatus::Connected {
                    if let Ok(disconnect) = v5_0::Disconnect::builder()
                        .reason_code(DisconnectReasonCode::KeepAliveTimeout)
                        .build()
                    {
                        events.push(GenericEvent::RequestSendPacket {
                            packet: disconnect.into(),
                            release_packet_id_if_send_error: None,
                        });
                    }
                }
                self.status = ConnectionStatus::Disconnecting;
                events.push(GenericEvent::RequestClose);
                events
            }
        }
    }

    /// The transport is gone. Per-connection wire state is reset; the store
    /// and packet-id allocator survive for session resumption, except ids
    /// that no stored packet references.
    pub fn notify_closed(&mut self) -> Vec<GenericEvent<PacketIdType>> {
        let mut events = vec![
            GenericEvent::RequestTimerCancel(TimerKind::PingreqSend),
            GenericEvent::RequestTimerCancel(TimerKind::PingreqRecv),
            GenericEvent::RequestTimerCancel(TimerKind::PingrespRecv),
        ];
        self.status = ConnectionStatus::Disconnected;
        self.reader.reset();
        self.publish_send_max = None;
        self.publish_send_count = 0;
        self.publish_queue.clear();
        self.publish_recv_max = None;
        self.publish_recv.clear();
        self.topic_alias_send = None;
        self.topic_alias_recv = None;
        self.keep_alive_secs = 0;

        let dangling: Vec<PacketIdType> = self
            .pid_man
            .used_ids()
            .filter(|pid| !self.store.contains_id(*pid))
            .collect();
        for pid in dangling {
            self.pid_man.release(pid);
            events.push(GenericEvent::NotifyPacketIdReleased(pid));
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mqtt_ep::packet::GenericPacketTrait;
    use crate::mqtt_ep::result_code::{ConnectReasonCode, PubrecReasonCode};
    use crate::mqtt_ep::role;

    type ClientConnection = Connection<role::Client>;

    fn connect_client(conn: &mut ClientConnection) {
        let connect = v5_0::Connect::builder()
            .client_id("c")
            .unwrap()
            .clean_start(true)
            .build()
            .unwrap();
        conn.send(connect.into());
        let connack = v5_0::Connack::builder()
            .session_present(false)
            .reason_code(ConnectReasonCode::Success)
            .build()
            .unwrap();
        feed(conn, &connack.to_continuous_buffer());
    }

    fn feed(conn: &mut ClientConnection, bytes: &[u8]) -> Vec<Event> {
        let mut cursor = Cursor::new(bytes);
        let mut events = Vec::new();
        loop {
            let before = cursor.position();
            let mut evs = conn.recv(&mut cursor);
            events.append(&mut evs);
            if cursor.position() as usize >= bytes.len() || cursor.position() == before {
                break;
            }
        }
        events
    }

    fn sent_packets(events: &[Event]) -> Vec<&Packet> {
        events
            .iter()
            .filter_map(|e| match e {
                GenericEvent::RequestSendPacket { packet, .. } => Some(packet),
                _ => None,
            })
            .collect()
    }

    use crate::mqtt_ep::packet::Packet;

    #[test]
    fn qos1_publish_flow_releases_id_on_puback() {
        let mut conn = ClientConnection::new(Version::V5_0);
        connect_client(&mut conn);

        let pid = conn.acquire_packet_id().unwrap();
        assert_eq!(pid, 1);
        let publish = v5_0::Publish::builder()
            .topic_name("t")
            .unwrap()
            .packet_id(pid)
            .qos(Qos::AtLeastOnce)
            .payload("x")
            .build()
            .unwrap();
        let events = conn.send(publish.into());
        assert_eq!(sent_packets(&events).len(), 1);
        assert!(conn.is_publish_processing(pid));

        let puback = v5_0::Puback::new(pid).unwrap();
        let events = feed(&mut conn, &puback.to_continuous_buffer());
        assert!(events
            .iter()
            .any(|e| matches!(e, GenericEvent::NotifyPacketIdReleased(1))));
        assert!(!conn.is_publish_processing(pid));
        assert_eq!(conn.acquire_packet_id().unwrap(), 1);
    }

    #[test]
    fn qos2_flow_migrates_publish_to_pubrel() {
        let mut conn = ClientConnection::new(Version::V5_0);
        connect_client(&mut conn);

        let pid = conn.acquire_packet_id().unwrap();
        let publish = v5_0::Publish::builder()
            .topic_name("t")
            .unwrap()
            .packet_id(pid)
            .qos(Qos::ExactlyOnce)
            .payload("x")
            .build()
            .unwrap();
        conn.send(publish.into());

        let pubrec = v5_0::Pubrec::new(pid).unwrap();
        let events = feed(&mut conn, &pubrec.to_continuous_buffer());
        let sent = sent_packets(&events);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].packet_type(), PacketType::Pubrel);
        let stored = conn.get_stored_packets();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].packet_type(), PacketType::Pubrel);

        let pubcomp = v5_0::Pubcomp::new(pid).unwrap();
        let events = feed(&mut conn, &pubcomp.to_continuous_buffer());
        assert!(events
            .iter()
            .any(|e| matches!(e, GenericEvent::NotifyPacketIdReleased(p) if *p == pid)));
        assert!(conn.get_stored_packets().is_empty());
    }

    #[test]
    fn inbound_qos1_auto_puback() {
        let mut conn = ClientConnection::new(Version::V5_0);
        connect_client(&mut conn);

        let publish = v5_0::Publish::builder()
            .topic_name("t")
            .unwrap()
            .packet_id(9u16)
            .qos(Qos::AtLeastOnce)
            .payload("x")
            .build()
            .unwrap();
        let events = feed(&mut conn, &publish.to_continuous_buffer());
        let sent = sent_packets(&events);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].packet_type(), PacketType::Puback);
        assert_eq!(sent[0].packet_id(), Some(9));
        assert!(events
            .iter()
            .any(|e| matches!(e, GenericEvent::NotifyPacketReceived(p) if p.packet_type() == PacketType::Publish)));
    }

    #[test]
    fn inbound_qos2_duplicate_suppressed() {
        let mut conn = ClientConnection::new(Version::V5_0);
        connect_client(&mut conn);
        conn.set_auto_pub_response(false);

        let publish = v5_0::Publish::builder()
            .topic_name("t")
            .unwrap()
            .packet_id(5u16)
            .qos(Qos::ExactlyOnce)
            .payload("x")
            .build()
            .unwrap();
        let events = feed(&mut conn, &publish.to_continuous_buffer());
        assert!(events
            .iter()
            .any(|e| matches!(e, GenericEvent::NotifyPacketReceived(_))));

        let mut dup = publish.clone();
        dup.set_dup(true);
        let events = feed(&mut conn, &dup.to_continuous_buffer());
        assert!(!events
            .iter()
            .any(|e| matches!(e, GenericEvent::NotifyPacketReceived(_))));
    }

    #[test]
    fn receive_maximum_violation_disconnects() {
        let mut conn = ClientConnection::new(Version::V5_0);
        use crate::mqtt_ep::packet::ReceiveMaximum;
        let connect = v5_0::Connect::builder()
            .client_id("c")
            .unwrap()
            .props(vec![ReceiveMaximum::new(1).unwrap().into()])
            .build()
            .unwrap();
        conn.send(connect.into());
        let connack = v5_0::Connack::builder()
            .session_present(false)
            .reason_code(ConnectReasonCode::Success)
            .build()
            .unwrap();
        feed(&mut conn, &connack.to_continuous_buffer());
        conn.set_auto_pub_response(false);

        let p1 = v5_0::Publish::builder()
            .topic_name("t")
            .unwrap()
            .packet_id(1u16)
            .qos(Qos::AtLeastOnce)
            .payload("a")
            .build()
            .unwrap();
        let events = feed(&mut conn, &p1.to_continuous_buffer());
        assert!(events
            .iter()
            .any(|e| matches!(e, GenericEvent::NotifyPacketReceived(_))));

        let p2 = v5_0::Publish::builder()
            .topic_name("t")
            .unwrap()
            .packet_id(2u16)
            .qos(Qos::AtLeastOnce)
            .payload("b")
            .build()
            .unwrap();
        let events = feed(&mut conn, &p2.to_continuous_buffer());
        assert!(events.iter().any(|e| matches!(
            e,
            GenericEvent::NotifyError(MqttError::ReceiveMaximumExceeded)
        )));
        let sent = sent_packets(&events);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].packet_type(), PacketType::Disconnect);
        assert!(events
            .iter()
            .any(|e| matches!(e, GenericEvent::RequestClose)));
    }

    #[test]
    fn outbound_publish_queued_until_vacancy() {
        let mut conn = ClientConnection::new(Version::V5_0);
        use crate::mqtt_ep::packet::ReceiveMaximum;
        let connect = v5_0::Connect::builder()
            .client_id("c")
            .unwrap()
            .clean_start(true)
            .build()
            .unwrap();
        conn.send(connect.into());
        // broker grants a single in-flight QoS≥1 publish
        let connack = v5_0::Connack::builder()
            .session_present(false)
            .reason_code(ConnectReasonCode::Success)
            .props(vec![ReceiveMaximum::new(1).unwrap().into()])
            .build()
            .unwrap();
        feed(&mut conn, &connack.to_continuous_buffer());

        let pid1 = conn.acquire_packet_id().unwrap();
        let pid2 = conn.acquire_packet_id().unwrap();
        let publish = |pid: u16, payload: &str| {
            v5_0::Publish::builder()
                .topic_name("t")
                .unwrap()
                .packet_id(pid)
                .qos(Qos::AtLeastOnce)
                .payload(payload)
                .build()
                .unwrap()
        };

        let events = conn.send(publish(pid1, "a").into());
        assert_eq!(sent_packets(&events).len(), 1, "first publish goes out");
        assert_eq!(conn.get_receive_maximum_vacancy_for_send(), Some(0));

        // the second publish waits; no error, nothing on the wire
        let events = conn.send(publish(pid2, "b").into());
        assert!(sent_packets(&events).is_empty(), "second publish must wait");
        assert!(!events
            .iter()
            .any(|e| matches!(e, GenericEvent::NotifyError(_))));

        // PUBACK for the first opens the window and flushes the queue
        let puback = v5_0::Puback::new(pid1).unwrap();
        let events = feed(&mut conn, &puback.to_continuous_buffer());
        let sent = sent_packets(&events);
        assert_eq!(sent.len(), 1);
        match sent[0] {
            Packet::V5_0Publish(p) => assert_eq!(p.packet_id(), Some(pid2)),
            other => panic!("unexpected packet: {other:?}"),
        }
        assert_eq!(conn.get_receive_maximum_vacancy_for_send(), Some(0));
    }

    #[test]
    fn session_resumption_resends_with_dup() {
        let mut conn = ClientConnection::new(Version::V5_0);
        connect_client(&mut conn);

        for _ in 0..2 {
            let pid = conn.acquire_packet_id().unwrap();
            let publish = v5_0::Publish::builder()
                .topic_name("t")
                .unwrap()
                .packet_id(pid)
                .qos(Qos::AtLeastOnce)
                .payload("x")
                .build()
                .unwrap();
            conn.send(publish.into());
        }

        conn.notify_closed();

        let connect = v5_0::Connect::builder()
            .client_id("c")
            .unwrap()
            .clean_start(false)
            .build()
            .unwrap();
        conn.send(connect.into());
        let connack = v5_0::Connack::builder()
            .session_present(true)
            .reason_code(ConnectReasonCode::Success)
            .build()
            .unwrap();
        let events = feed(&mut conn, &connack.to_continuous_buffer());
        let sent = sent_packets(&events);
        assert_eq!(sent.len(), 2);
        for (idx, packet) in sent.iter().enumerate() {
            match packet {
                Packet::V5_0Publish(p) => {
                    assert!(p.dup());
                    assert_eq!(p.packet_id(), Some(idx as u16 + 1));
                }
                other => panic!("unexpected resend: {other:?}"),
            }
        }
    }

    #[test]
    fn clean_session_clears_store() {
        let mut conn = ClientConnection::new(Version::V5_0);
        connect_client(&mut conn);
        let pid = conn.acquire_packet_id().unwrap();
        let publish = v5_0::Publish::builder()
            .topic_name("t")
            .unwrap()
            .packet_id(pid)
            .qos(Qos::AtLeastOnce)
            .payload("x")
            .build()
            .unwrap();
        conn.send(publish.into());
        conn.notify_closed();

        let connect = v5_0::Connect::builder()
            .client_id("c")
            .unwrap()
            .clean_start(false)
            .build()
            .unwrap();
        conn.send(connect.into());
        let connack = v5_0::Connack::builder()
            .session_present(false)
            .reason_code(ConnectReasonCode::Success)
            .build()
            .unwrap();
        let events = feed(&mut conn, &connack.to_continuous_buffer());
        assert!(sent_packets(&events).is_empty());
        assert!(conn.get_stored_packets().is_empty());
        assert!(events
            .iter()
            .any(|e| matches!(e, GenericEvent::NotifyPacketIdReleased(p) if *p == pid)));
    }

    #[test]
    fn pubrec_error_releases_id() {
        let mut conn = ClientConnection::new(Version::V5_0);
        connect_client(&mut conn);
        let pid = conn.acquire_packet_id().unwrap();
        let publish = v5_0::Publish::builder()
            .topic_name("t")
            .unwrap()
            .packet_id(pid)
            .qos(Qos::ExactlyOnce)
            .payload("x")
            .build()
            .unwrap();
        conn.send(publish.into());

        let pubrec = v5_0::Pubrec::builder()
            .packet_id(pid)
            .reason_code(PubrecReasonCode::NotAuthorized)
            .build()
            .unwrap();
        let events = feed(&mut conn, &pubrec.to_continuous_buffer());
        assert!(sent_packets(&events).is_empty());
        assert!(events
            .iter()
            .any(|e| matches!(e, GenericEvent::NotifyPacketIdReleased(p) if *p == pid)));
        assert!(conn.get_stored_packets().is_empty());
    }

    #[test]
    fn partial_frames_reassemble() {
        let mut conn = ClientConnection::new(Version::V5_0);
        connect_client(&mut conn);
        conn.set_auto_pub_response(false);

        let publish = v5_0::Publish::builder()
            .topic_name("test/partial")
            .unwrap()
            .packet_id(3u16)
            .qos(Qos::AtLeastOnce)
            .payload("fragmented payload")
            .build()
            .unwrap();
        let bytes = publish.to_continuous_buffer();

        let mut received = Vec::new();
        for chunk in bytes.chunks(3) {
            let mut cursor = Cursor::new(chunk);
            loop {
                let before = cursor.position();
                let events = conn.recv(&mut cursor);
                for e in events {
                    if let GenericEvent::NotifyPacketReceived(p) = e {
                        received.push(p);
                    }
                }
                if cursor.position() as usize >= chunk.len() || cursor.position() == before {
                    break;
                }
            }
        }
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].packet_id(), Some(3));
    }

    #[test]
    fn malformed_remaining_length_is_fatal() {
        let mut conn = ClientConnection::new(Version::V5_0);
        connect_client(&mut conn);
        let events = feed(&mut conn, &[0x30, 0xff, 0xff, 0xff, 0xff, 0xff]);
        assert!(events
            .iter()
            .any(|e| matches!(e, GenericEvent::NotifyError(MqttError::MalformedPacket))));
        assert!(events
            .iter()
            .any(|e| matches!(e, GenericEvent::RequestClose)));
    }

    #[test]
    fn keep_alive_timer_armed_on_connack() {
        let mut conn = ClientConnection::new(Version::V3_1_1);
        let connect = v3_1_1::Connect::builder()
            .client_id("c")
            .unwrap()
            .keep_alive(10)
            .clean_session(true)
            .build()
            .unwrap();
        let events = conn.send(connect.into());
        // CONNECT itself already schedules the keep-alive timer
        assert!(events.iter().any(|e| matches!(
            e,
            GenericEvent::RequestTimerReset {
                kind: TimerKind::PingreqSend,
                duration_ms: 10_000,
            }
        )));

        let connack = v3_1_1::Connack::builder()
            .session_present(false)
            .return_code(crate::mqtt_ep::result_code::ConnectReturnCode::Accepted)
            .build()
            .unwrap();
        let events = feed(&mut conn, &connack.to_continuous_buffer());
        assert!(events.iter().any(|e| matches!(
            e,
            GenericEvent::RequestTimerReset {
                kind: TimerKind::PingreqSend,
                ..
            }
        )));

        // firing the timer sends a PINGREQ
        let events = conn.notify_timer_fired(TimerKind::PingreqSend);
        let sent = sent_packets(&events);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].packet_type(), PacketType::Pingreq);
    }

    #[test]
    fn pingresp_timeout_closes() {
        let mut conn = ClientConnection::new(Version::V5_0);
        connect_client(&mut conn);
        conn.set_pingresp_recv_timeout(100);
        let events = conn.send(v5_0::Pingreq::new().into());
        assert!(events.iter().any(|e| matches!(
            e,
            GenericEvent::RequestTimerReset {
                kind: TimerKind::PingrespRecv,
                duration_ms: 100,
            }
        )));
        let events = conn.notify_timer_fired(TimerKind::PingrespRecv);
        assert!(events
            .iter()
            .any(|e| matches!(e, GenericEvent::NotifyError(MqttError::KeepAliveTimeout))));
        assert!(events
            .iter()
            .any(|e| matches!(e, GenericEvent::RequestClose)));
    }

    #[test]
    fn auto_map_topic_alias_elides_repeated_topic() {
        let mut conn = ClientConnection::new(Version::V5_0);
        use crate::mqtt_ep::packet::TopicAliasMaximum;
        let connect = v5_0::Connect::builder()
            .client_id("c")
            .unwrap()
            .clean_start(true)
            .build()
            .unwrap();
        conn.send(connect.into());
        let connack = v5_0::Connack::builder()
            .session_present(false)
            .reason_code(ConnectReasonCode::Success)
            .props(vec![TopicAliasMaximum::new(5).unwrap().into()])
            .build()
            .unwrap();
        feed(&mut conn, &connack.to_continuous_buffer());
        conn.set_auto_map_topic_alias_send(true);

        let first = v5_0::Publish::builder()
            .topic_name("room/1")
            .unwrap()
            .payload("a")
            .build()
            .unwrap();
        let events = conn.send(first.into());
        match sent_packets(&events)[0] {
            Packet::V5_0Publish(p) => {
                assert_eq!(p.topic_name(), "room/1");
                assert_eq!(p.topic_alias(), Some(1));
            }
            other => panic!("unexpected packet: {other:?}"),
        }

        let second = v5_0::Publish::builder()
            .topic_name("room/1")
            .unwrap()
            .payload("b")
            .build()
            .unwrap();
        let events = conn.send(second.into());
        match sent_packets(&events)[0] {
            Packet::V5_0Publish(p) => {
                assert_eq!(p.topic_name(), "");
                assert_eq!(p.topic_alias(), Some(1));
            }
            other => panic!("unexpected packet: {other:?}"),
        }
    }

    #[test]
    fn inbound_topic_alias_resolved() {
        let mut conn = ClientConnection::new(Version::V5_0);
        use crate::mqtt_ep::packet::TopicAliasMaximum;
        let connect = v5_0::Connect::builder()
            .client_id("c")
            .unwrap()
            .props(vec![TopicAliasMaximum::new(3).unwrap().into()])
            .build()
            .unwrap();
        conn.send(connect.into());
        let connack = v5_0::Connack::builder()
            .session_present(false)
            .reason_code(ConnectReasonCode::Success)
            .build()
            .unwrap();
        feed(&mut conn, &connack.to_continuous_buffer());

        // binding form: topic plus alias
        let mut bind = v5_0::Publish::builder()
            .topic_name("sensors/1")
            .unwrap()
            .payload("a")
            .build()
            .unwrap();
        bind.add_topic_alias(2).unwrap();
        feed(&mut conn, &bind.to_continuous_buffer());

        // lookup form: alias only
        let mut lookup = v5_0::Publish::builder()
            .topic_name("sensors/1")
            .unwrap()
            .payload("b")
            .build()
            .unwrap();
        lookup.remove_topic_add_topic_alias(2).unwrap();
        let events = feed(&mut conn, &lookup.to_continuous_buffer());
        let received: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                GenericEvent::NotifyPacketReceived(Packet::V5_0Publish(p)) => Some(p),
                _ => None,
            })
            .collect();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].topic_name(), "sensors/1");
    }

    #[test]
    fn unknown_inbound_alias_is_protocol_failure() {
        let mut conn = ClientConnection::new(Version::V5_0);
        use crate::mqtt_ep::packet::TopicAliasMaximum;
        let connect = v5_0::Connect::builder()
            .client_id("c")
            .unwrap()
            .props(vec![TopicAliasMaximum::new(3).unwrap().into()])
            .build()
            .unwrap();
        conn.send(connect.into());
        let connack = v5_0::Connack::builder()
            .session_present(false)
            .reason_code(ConnectReasonCode::Success)
            .build()
            .unwrap();
        feed(&mut conn, &connack.to_continuous_buffer());

        let mut lookup = v5_0::Publish::builder()
            .topic_name("x")
            .unwrap()
            .payload("b")
            .build()
            .unwrap();
        lookup.remove_topic_add_topic_alias(2).unwrap();
        let events = feed(&mut conn, &lookup.to_continuous_buffer());
        assert!(events
            .iter()
            .any(|e| matches!(e, GenericEvent::NotifyError(MqttError::TopicAliasInvalid))));
    }
}
