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

//! MQTT packet types for both protocol versions.
//!
//! Every packet keeps its fields in wire form and can produce a gather list
//! of byte slices whose concatenation is the exact wire image
//! ([`GenericPacketTrait::to_buffers`]). [`GenericPacket`] is the tagged
//! union over all kinds of both versions used by the connection and the
//! endpoint.

pub(crate) mod codec;
pub mod property;
mod qos;
pub mod v3_1_1;
pub mod v5_0;
mod will;

use std::io::IoSlice;

use bytes::{Buf, Bytes};

use crate::mqtt_ep::packet::codec::VariableByteInteger;
use crate::mqtt_ep::result_code::MqttError;
use crate::mqtt_ep::role;
use crate::mqtt_ep::version::Version;

pub use property::{
    AssignedClientIdentifier, AuthenticationData, AuthenticationMethod, ContentType,
    CorrelationData, MaximumPacketSize, MaximumQos, MessageExpiryInterval, PayloadFormatIndicator,
    Properties, Property, ReasonString, ReceiveMaximum, RequestProblemInformation,
    RequestResponseInformation, ResponseInformation, ResponseTopic, RetainAvailable,
    ServerKeepAlive, ServerReference, SessionExpiryInterval, SharedSubscriptionAvailable,
    SubscriptionIdentifier, SubscriptionIdentifierAvailable, TopicAlias, TopicAliasMaximum,
    UserProperty, WildcardSubscriptionAvailable,
};
pub use qos::{Payload, Qos, RetainHandling, SubEntry, SubOpts};
pub use will::Will;

/// Control packet kind, the upper nibble of the fixed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    Connect,
    Connack,
    Publish,
    Puback,
    Pubrec,
    Pubrel,
    Pubcomp,
    Subscribe,
    Suback,
    Unsubscribe,
    Unsuback,
    Pingreq,
    Pingresp,
    Disconnect,
    Auth,
}

impl PacketType {
    pub(crate) fn from_fixed_header(byte: u8) -> Result<Self, MqttError> {
        match byte >> 4 {
            1 => Ok(PacketType::Connect),
            2 => Ok(PacketType::Connack),
            3 => Ok(PacketType::Publish),
            4 => Ok(PacketType::Puback),
            5 => Ok(PacketType::Pubrec),
            6 => Ok(PacketType::Pubrel),
            7 => Ok(PacketType::Pubcomp),
            8 => Ok(PacketType::Subscribe),
            9 => Ok(PacketType::Suback),
            10 => Ok(PacketType::Unsubscribe),
            11 => Ok(PacketType::Unsuback),
            12 => Ok(PacketType::Pingreq),
            13 => Ok(PacketType::Pingresp),
            14 => Ok(PacketType::Disconnect),
            15 => Ok(PacketType::Auth),
            _ => Err(MqttError::MalformedPacket),
        }
    }
}

/// Packet identifier of configurable byte width. `u16` is the MQTT wire
/// width; `u32` supports proprietary broker-cluster extensions.
pub trait IsPacketId:
    Copy
    + Clone
    + PartialEq
    + Eq
    + PartialOrd
    + Ord
    + std::hash::Hash
    + std::fmt::Debug
    + std::fmt::Display
    + Send
    + Sync
    + 'static
{
    type Buffer: AsRef<[u8]> + Copy + Send + Sync + std::fmt::Debug + PartialEq + Eq + 'static;

    const WIRE_SIZE: usize;

    fn zero() -> Self;
    fn is_zero(&self) -> bool;
    fn to_buffer(&self) -> Self::Buffer;
    fn decode(src: &mut Bytes) -> Result<Self, MqttError>;
    fn to_u64(&self) -> u64;
    fn from_u64(v: u64) -> Option<Self>;
    fn max_value() -> Self;
}

impl IsPacketId for u16 {
    type Buffer = [u8; 2];

    const WIRE_SIZE: usize = 2;

    fn zero() -> Self {
        0
    }

    fn is_zero(&self) -> bool {
        *self == 0
    }

    fn to_buffer(&self) -> Self::Buffer {
        self.to_be_bytes()
    }

    fn decode(src: &mut Bytes) -> Result<Self, MqttError> {
        if src.remaining() < 2 {
            return Err(MqttError::MalformedPacket);
        }
        Ok(src.get_u16())
    }

    fn to_u64(&self) -> u64 {
        *self as u64
    }

    fn from_u64(v: u64) -> Option<Self> {
        u16::try_from(v).ok()
    }

    fn max_value() -> Self {
        u16::MAX
    }
}

impl IsPacketId for u32 {
    type Buffer = [u8; 4];

    const WIRE_SIZE: usize = 4;

    fn zero() -> Self {
        0
    }

    fn is_zero(&self) -> bool {
        *self == 0
    }

    fn to_buffer(&self) -> Self::Buffer {
        self.to_be_bytes()
    }

    fn decode(src: &mut Bytes) -> Result<Self, MqttError> {
        if src.remaining() < 4 {
            return Err(MqttError::MalformedPacket);
        }
        Ok(src.get_u32())
    }

    fn to_u64(&self) -> u64 {
        *self as u64
    }

    fn from_u64(v: u64) -> Option<Self> {
        u32::try_from(v).ok()
    }

    fn max_value() -> Self {
        u32::MAX
    }
}

/// Wire image access shared by every packet type.
pub trait GenericPacketTrait {
    /// Total wire size in bytes, fixed header included.
    fn size(&self) -> usize;

    /// Number of slices [`Self::to_buffers`] produces.
    fn num_of_const_buffer_sequence(&self) -> usize;

    /// Gather list of byte slices; their concatenation is the wire image.
    fn to_buffers(&self) -> Vec<IoSlice<'_>>;

    /// The wire image as one owned buffer.
    fn to_continuous_buffer(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size());
        for buf in self.to_buffers() {
            out.extend_from_slice(&buf);
        }
        out
    }
}

/// Marker for packets a given role may send; gives `Endpoint::send` its
/// compile-time direction check.
pub trait Sendable<Role, PacketIdType>
where
    Role: role::RoleType,
    PacketIdType: IsPacketId,
    Self: Into<GenericPacket<PacketIdType>>,
{
}

/// Tagged union over every control packet of both protocol versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenericPacket<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    V3_1_1Connect(v3_1_1::Connect),
    V3_1_1Connack(v3_1_1::Connack),
    V3_1_1Publish(v3_1_1::GenericPublish<PacketIdType>),
    V3_1_1Puback(v3_1_1::GenericPuback<PacketIdType>),
    V3_1_1Pubrec(v3_1_1::GenericPubrec<PacketIdType>),
    V3_1_1Pubrel(v3_1_1::GenericPubrel<PacketIdType>),
    V3_1_1Pubcomp(v3_1_1::GenericPubcomp<PacketIdType>),
    V3_1_1Subscribe(v3_1_1::GenericSubscribe<PacketIdType>),
    V3_1_1Suback(v3_1_1::GenericSuback<PacketIdType>),
    V3_1_1Unsubscribe(v3_1_1::GenericUnsubscribe<PacketIdType>),
    V3_1_1Unsuback(v3_1_1::GenericUnsuback<PacketIdType>),
    V3_1_1Pingreq(v3_1_1::Pingreq),
    V3_1_1Pingresp(v3_1_1::Pingresp),
    V3_1_1Disconnect(v3_1_1::Disconnect),
    V5_0Connect(v5_0::Connect),
    V5_0Connack(v5_0::Connack),
    V5_0Publish(v5_0::GenericPublish<PacketIdType>),
    V5_0Puback(v5_0::GenericPuback<PacketIdType>),
    V5_0Pubrec(v5_0::GenericPubrec<PacketIdType>),
    V5_0Pubrel(v5_0::GenericPubrel<PacketIdType>),
    V5_0Pubcomp(v5_0::GenericPubcomp<PacketIdType>),
    V5_0Subscribe(v5_0::GenericSubscribe<PacketIdType>),
    V5_0Suback(v5_0::GenericSuback<PacketIdType>),
    V5_0Unsubscribe(v5_0::GenericUnsubscribe<PacketIdType>),
    V5_0Unsuback(v5_0::GenericUnsuback<PacketIdType>),
    V5_0Pingreq(v5_0::Pingreq),
    V5_0Pingresp(v5_0::Pingresp),
    V5_0Disconnect(v5_0::Disconnect),
    V5_0Auth(v5_0::Auth),
}

/// Standard-width packet union.
pub type Packet = GenericPacket<u16>;

macro_rules! for_each_packet {
    ($self:ident, $p:ident => $body:expr) => {
        match $self {
            GenericPacket::V3_1_1Connect($p) => $body,
            GenericPacket::V3_1_1Connack($p) => $body,
            GenericPacket::V3_1_1Publish($p) => $body,
            GenericPacket::V3_1_1Puback($p) => $body,
            GenericPacket::V3_1_1Pubrec($p) => $body,
            GenericPacket::V3_1_1Pubrel($p) => $body,
            GenericPacket::V3_1_1Pubcomp($p) => $body,
            GenericPacket::V3_1_1Subscribe($p) => $body,
            GenericPacket::V3_1_1Suback($p) => $body,
            GenericPacket::V3_1_1Unsubscribe($p) => $body,
            GenericPacket::V3_1_1Unsuback($p) => $body,
            GenericPacket::V3_1_1Pingreq($p) => $body,
            GenericPacket::V3_1_1Pingresp($p) => $body,
            GenericPacket::V3_1_1Disconnect($p) => $body,
            GenericPacket::V5_0Connect($p) => $body,
            GenericPacket::V5_0Connack($p) => $body,
            GenericPacket::V5_0Publish($p) => $body,
            GenericPacket::V5_0Puback($p) => $body,
            GenericPacket::V5_0Pubrec($p) => $body,
            GenericPacket::V5_0Pubrel($p) => $body,
            GenericPacket::V5_0Pubcomp($p) => $body,
            GenericPacket::V5_0Subscribe($p) => $body,
            GenericPacket::V5_0Suback($p) => $body,
            GenericPacket::V5_0Unsubscribe($p) => $body,
            GenericPacket::V5_0Unsuback($p) => $body,
            GenericPacket::V5_0Pingreq($p) => $body,
            GenericPacket::V5_0Pingresp($p) => $body,
            GenericPacket::V5_0Disconnect($p) => $body,
            GenericPacket::V5_0Auth($p) => $body,
        }
    };
}

impl<PacketIdType> GenericPacket<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    pub fn packet_type(&self) -> PacketType {
        match self {
            GenericPacket::V3_1_1Connect(_) | GenericPacket::V5_0Connect(_) => PacketType::Connect,
            GenericPacket::V3_1_1Connack(_) | GenericPacket::V5_0Connack(_) => PacketType::Connack,
            GenericPacket::V3_1_1Publish(_) | GenericPacket::V5_0Publish(_) => PacketType::Publish,
            GenericPacket::V3_1_1Puback(_) | GenericPacket::V5_0Puback(_) => PacketType::Puback,
            GenericPacket::V3_1_1Pubrec(_) | GenericPacket::V5_0Pubrec(_) => PacketType::Pubrec,
            GenericPacket::V3_1_1Pubrel(_) | GenericPacket::V5_0Pubrel(_) => PacketType::Pubrel,
            GenericPacket::V3_1_1Pubcomp(_) | GenericPacket::V5_0Pubcomp(_) => PacketType::Pubcomp,
            GenericPacket::V3_1_1Subscribe(_) | GenericPacket::V5_0Subscribe(_) => {
                PacketType::Subscribe
            }
            GenericPacket::V3_1_1Suback(_) | GenericPacket::V5_0Suback(_) => PacketType::Suback,
            GenericPacket::V3_1_1Unsubscribe(_) | GenericPacket::V5_0Unsubscribe(_) => {
                PacketType::Unsubscribe
            }
            GenericPacket::V3_1_1Unsuback(_) | GenericPacket::V5_0Unsuback(_) => {
                PacketType::Unsuback
            }
            GenericPacket::V3_1_1Pingreq(_) | GenericPacket::V5_0Pingreq(_) => PacketType::Pingreq,
            GenericPacket::V3_1_1Pingresp(_) | GenericPacket::V5_0Pingresp(_) => {
                PacketType::Pingresp
            }
            GenericPacket::V3_1_1Disconnect(_) | GenericPacket::V5_0Disconnect(_) => {
                PacketType::Disconnect
            }
            GenericPacket::V5_0Auth(_) => PacketType::Auth,
        }
    }

    /// The protocol version this packet was built for.
    pub fn version(&self) -> Version {
        match self {
            GenericPacket::V3_1_1Connect(_)
            | GenericPacket::V3_1_1Connack(_)
            | GenericPacket::V3_1_1Publish(_)
            | GenericPacket::V3_1_1Puback(_)
            | GenericPacket::V3_1_1Pubrec(_)
            | GenericPacket::V3_1_1Pubrel(_)
            | GenericPacket::V3_1_1Pubcomp(_)
            | GenericPacket::V3_1_1Subscribe(_)
            | GenericPacket::V3_1_1Suback(_)
            | GenericPacket::V3_1_1Unsubscribe(_)
            | GenericPacket::V3_1_1Unsuback(_)
            | GenericPacket::V3_1_1Pingreq(_)
            | GenericPacket::V3_1_1Pingresp(_)
            | GenericPacket::V3_1_1Disconnect(_) => Version::V3_1_1,
            _ => Version::V5_0,
        }
    }

    /// Packet identifier, for the kinds that carry one.
    pub fn packet_id(&self) -> Option<PacketIdType> {
        match self {
            GenericPacket::V3_1_1Publish(p) => p.packet_id(),
            GenericPacket::V5_0Publish(p) => p.packet_id(),
            GenericPacket::V3_1_1Puback(p) => Some(p.packet_id()),
            GenericPacket::V3_1_1Pubrec(p) => Some(p.packet_id()),
            GenericPacket::V3_1_1Pubrel(p) => Some(p.packet_id()),
            GenericPacket::V3_1_1Pubcomp(p) => Some(p.packet_id()),
            GenericPacket::V5_0Puback(p) => Some(p.packet_id()),
            GenericPacket::V5_0Pubrec(p) => Some(p.packet_id()),
            GenericPacket::V5_0Pubrel(p) => Some(p.packet_id()),
            GenericPacket::V5_0Pubcomp(p) => Some(p.packet_id()),
            GenericPacket::V3_1_1Subscribe(p) => Some(p.packet_id()),
            GenericPacket::V3_1_1Suback(p) => Some(p.packet_id()),
            GenericPacket::V3_1_1Unsubscribe(p) => Some(p.packet_id()),
            GenericPacket::V3_1_1Unsuback(p) => Some(p.packet_id()),
            GenericPacket::V5_0Subscribe(p) => Some(p.packet_id()),
            GenericPacket::V5_0Suback(p) => Some(p.packet_id()),
            GenericPacket::V5_0Unsubscribe(p) => Some(p.packet_id()),
            GenericPacket::V5_0Unsuback(p) => Some(p.packet_id()),
            _ => None,
        }
    }

    /// Decode one complete framed packet (fixed header included).
    pub(crate) fn decode(version: Version, mut raw: Bytes) -> Result<Self, MqttError> {
        if raw.is_empty() {
            return Err(MqttError::MalformedPacket);
        }
        let fixed_header = raw[0];
        let packet_type = PacketType::from_fixed_header(fixed_header)?;
        let flags = fixed_header & 0x0f;
        raw.advance(1);
        let remaining_length = VariableByteInteger::decode(&mut raw)?;
        if raw.remaining() != remaining_length.value() as usize {
            return Err(MqttError::MalformedPacket);
        }
        let payload = raw;

        match (version, packet_type) {
            (Version::V3_1_1, PacketType::Connect) => {
                v3_1_1::Connect::parse(flags, payload).map(Into::into)
            }
            (Version::V3_1_1, PacketType::Connack) => {
                v3_1_1::Connack::parse(flags, payload).map(Into::into)
            }
            (Version::V3_1_1, PacketType::Publish) => {
                v3_1_1::GenericPublish::<PacketIdType>::parse(flags, payload).map(Into::into)
            }
            (Version::V3_1_1, PacketType::Puback) => {
                v3_1_1::GenericPuback::<PacketIdType>::parse(flags, payload).map(Into::into)
            }
            (Version::V3_1_1, PacketType::Pubrec) => {
                v3_1_1::GenericPubrec::<PacketIdType>::parse(flags, payload).map(Into::into)
            }
            (Version::V3_1_1, PacketType::Pubrel) => {
                v3_1_1::GenericPubrel::<PacketIdType>::parse(flags, payload).map(Into::into)
            }
            (Version::V3_1_1, PacketType::Pubcomp) => {
                v3_1_1::GenericPubcomp::<PacketIdType>::parse(flags, payload).map(Into::into)
            }
            (Version::V3_1_1, PacketType::Subscribe) => {
                v3_1_1::GenericSubscribe::<PacketIdType>::parse(flags, payload).map(Into::into)
            }
            (Version::V3_1_1, PacketType::Suback) => {
                v3_1_1::GenericSuback::<PacketIdType>::parse(flags, payload).map(Into::into)
            }
            (Version::V3_1_1, PacketType::Unsubscribe) => {
                v3_1_1::GenericUnsubscribe::<PacketIdType>::parse(flags, payload).map(Into::into)
            }
            (Version::V3_1_1, PacketType::Unsuback) => {
                v3_1_1::GenericUnsuback::<PacketIdType>::parse(flags, payload).map(Into::into)
            }
            (Version::V3_1_1, PacketType::Pingreq) => {
                v3_1_1::Pingreq::parse(flags, payload).map(Into::into)
            }
            (Version::V3_1_1, PacketType::Pingresp) => {
                v3_1_1::Pingresp::parse(flags, payload).map(Into::into)
            }
            (Version::V3_1_1, PacketType::Disconnect) => {
                v3_1_1::Disconnect::parse(flags, payload).map(Into::into)
            }
            (Version::V5_0, PacketType::Connect) => {
                v5_0::Connect::parse(flags, payload).map(Into::into)
            }
            (Version::V5_0, PacketType::Connack) => {
                v5_0::Connack::parse(flags, payload).map(Into::into)
            }
            (Version::V5_0, PacketType::Publish) => {
                v5_0::GenericPublish::<PacketIdType>::parse(flags, payload).map(Into::into)
            }
            (Version::V5_0, PacketType::Puback) => {
                v5_0::GenericPuback::<PacketIdType>::parse(flags, payload).map(Into::into)
            }
            (Version::V5_0, PacketType::Pubrec) => {
                v5_0::GenericPubrec::<PacketIdType>::parse(flags, payload).map(Into::into)
            }
            (Version::V5_0, PacketType::Pubrel) => {
                v5_0::GenericPubrel::<PacketIdType>::parse(flags, payload).map(Into::into)
            }
            (Version::V5_0, PacketType::Pubcomp) => {
                v5_0::GenericPubcomp::<PacketIdType>::parse(flags, payload).map(Into::into)
            }
            (Version::V5_0, PacketType::Subscribe) => {
                v5_0::GenericSubscribe::<PacketIdType>::parse(flags, payload).map(Into::into)
            }
            (Version::V5_0, PacketType::Suback) => {
                v5_0::GenericSuback::<PacketIdType>::parse(flags, payload).map(Into::into)
            }
            (Version::V5_0, PacketType::Unsubscribe) => {
                v5_0::GenericUnsubscribe::<PacketIdType>::parse(flags, payload).map(Into::into)
            }
            (Version::V5_0, PacketType::Unsuback) => {
                v5_0::GenericUnsuback::<PacketIdType>::parse(flags, payload).map(Into::into)
            }
            (Version::V5_0, PacketType::Pingreq) => {
                v5_0::Pingreq::parse(flags, payload).map(Into::into)
            }
            (Version::V5_0, PacketType::Pingresp) => {
                v5_0::Pingresp::parse(flags, payload).map(Into::into)
            }
            (Version::V5_0, PacketType::Disconnect) => {
                v5_0::Disconnect::parse(flags, payload).map(Into::into)
            }
            (Version::V5_0, PacketType::Auth) => v5_0::Auth::parse(flags, payload).map(Into::into),
            _ => Err(MqttError::MalformedPacket),
        }
    }
}

impl<PacketIdType> GenericPacketTrait for GenericPacket<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    fn size(&self) -> usize {
        for_each_packet!(self, p => p.size())
    }

    fn num_of_const_buffer_sequence(&self) -> usize {
        for_each_packet!(self, p => p.num_of_const_buffer_sequence())
    }

    fn to_buffers(&self) -> Vec<IoSlice<'_>> {
        for_each_packet!(self, p => p.to_buffers())
    }
}

macro_rules! impl_from_packet {
    ($variant:ident, $ty:ty) => {
        impl<PacketIdType> From<$ty> for GenericPacket<PacketIdType>
        where
            PacketIdType: IsPacketId,
        {
            fn from(p: $ty) -> Self {
                GenericPacket::$variant(p)
            }
        }
    };
    (generic $variant:ident, $ty:ident, $m:ident) => {
        impl<PacketIdType> From<$m::$ty<PacketIdType>> for GenericPacket<PacketIdType>
        where
            PacketIdType: IsPacketId,
        {
            fn from(p: $m::$ty<PacketIdType>) -> Self {
                GenericPacket::$variant(p)
            }
        }
    };
}

impl_from_packet!(V3_1_1Connect, v3_1_1::Connect);
impl_from_packet!(V3_1_1Connack, v3_1_1::Connack);
impl_from_packet!(generic V3_1_1Publish, GenericPublish, v3_1_1);
impl_from_packet!(generic V3_1_1Puback, GenericPuback, v3_1_1);
impl_from_packet!(generic V3_1_1Pubrec, GenericPubrec, v3_1_1);
impl_from_packet!(generic V3_1_1Pubrel, GenericPubrel, v3_1_1);
impl_from_packet!(generic V3_1_1Pubcomp, GenericPubcomp, v3_1_1);
impl_from_packet!(generic V3_1_1Subscribe, GenericSubscribe, v3_1_1);
impl_from_packet!(generic V3_1_1Suback, GenericSuback, v3_1_1);
impl_from_packet!(generic V3_1_1Unsubscribe, GenericUnsubscribe, v3_1_1);
impl_from_packet!(generic V3_1_1Unsuback, GenericUnsuback, v3_1_1);
impl_from_packet!(V3_1_1Pingreq, v3_1_1::Pingreq);
impl_from_packet!(V3_1_1Pingresp, v3_1_1::Pingresp);
impl_from_packet!(V3_1_1Disconnect, v3_1_1::Disconnect);
impl_from_packet!(V5_0Connect, v5_0::Connect);
impl_from_packet!(V5_0Connack, v5_0::Connack);
impl_from_packet!(generic V5_0Publish, GenericPublish, v5_0);
impl_from_packet!(generic V5_0Puback, GenericPuback, v5_0);
impl_from_packet!(generic V5_0Pubrec, GenericPubrec, v5_0);
impl_from_packet!(generic V5_0Pubrel, GenericPubrel, v5_0);
impl_from_packet!(generic V5_0Pubcomp, GenericPubcomp, v5_0);
impl_from_packet!(generic V5_0Subscribe, GenericSubscribe, v5_0);
impl_from_packet!(generic V5_0Suback, GenericSuback, v5_0);
impl_from_packet!(generic V5_0Unsubscribe, GenericUnsubscribe, v5_0);
impl_from_packet!(generic V5_0Unsuback, GenericUnsuback, v5_0);
impl_from_packet!(V5_0Pingreq, v5_0::Pingreq);
impl_from_packet!(V5_0Pingresp, v5_0::Pingresp);
impl_from_packet!(V5_0Disconnect, v5_0::Disconnect);
impl_from_packet!(V5_0Auth, v5_0::Auth);

macro_rules! impl_sendable {
    ($ty:ty: $($role:ty),+) => {
        $(
            impl<PacketIdType> Sendable<$role, PacketIdType> for $ty
            where
                PacketIdType: IsPacketId,
            {
            }
        )+
    };
    (generic $ty:ident in $m:ident: $($role:ty),+) => {
        $(
            impl<PacketIdType> Sendable<$role, PacketIdType> for $m::$ty<PacketIdType>
            where
                PacketIdType: IsPacketId,
            {
            }
        )+
    };
}

impl_sendable!(v3_1_1::Connect: role::Client, role::Any);
impl_sendable!(v3_1_1::Connack: role::Server, role::Any);
impl_sendable!(generic GenericPublish in v3_1_1: role::Client, role::Server, role::Any);
impl_sendable!(generic GenericPuback in v3_1_1: role::Client, role::Server, role::Any);
impl_sendable!(generic GenericPubrec in v3_1_1: role::Client, role::Server, role::Any);
impl_sendable!(generic GenericPubrel in v3_1_1: role::Client, role::Server, role::Any);
impl_sendable!(generic GenericPubcomp in v3_1_1: role::Client, role::Server, role::Any);
impl_sendable!(generic GenericSubscribe in v3_1_1: role::Client, role::Any);
impl_sendable!(generic GenericSuback in v3_1_1: role::Server, role::Any);
impl_sendable!(generic GenericUnsubscribe in v3_1_1: role::Client, role::Any);
impl_sendable!(generic GenericUnsuback in v3_1_1: role::Server, role::Any);
impl_sendable!(v3_1_1::Pingreq: role::Client, role::Any);
impl_sendable!(v3_1_1::Pingresp: role::Server, role::Any);
impl_sendable!(v3_1_1::Disconnect: role::Client, role::Server, role::Any);
impl_sendable!(v5_0::Connect: role::Client, role::Any);
impl_sendable!(v5_0::Connack: role::Server, role::Any);
impl_sendable!(generic GenericPublish in v5_0: role::Client, role::Server, role::Any);
impl_sendable!(generic GenericPuback in v5_0: role::Client, role::Server, role::Any);
impl_sendable!(generic GenericPubrec in v5_0: role::Client, role::Server, role::Any);
impl_sendable!(generic GenericPubrel in v5_0: role::Client, role::Server, role::Any);
impl_sendable!(generic GenericPubcomp in v5_0: role::Client, role::Server, role::Any);
impl_sendable!(generic GenericSubscribe in v5_0: role::Client, role::Any);
impl_sendable!(generic GenericSuback in v5_0: role::Server, role::Any);
impl_sendable!(generic GenericUnsubscribe in v5_0: role::Client, role::Any);
impl_sendable!(generic GenericUnsuback in v5_0: role::Server, role::Any);
impl_sendable!(v5_0::Pingreq: role::Client, role::Any);
impl_sendable!(v5_0::Pingresp: role::Server, role::Any);
impl_sendable!(v5_0::Disconnect: role::Client, role::Server, role::Any);
impl_sendable!(v5_0::Auth: role::Client, role::Server, role::Any);

impl<Role, PacketIdType> Sendable<Role, PacketIdType> for GenericPacket<PacketIdType>
where
    Role: role::RoleType,
    PacketIdType: IsPacketId,
{
}

/// Packet kinds kept in the in-flight store: PUBLISH (QoS≥1) and PUBREL.
///
/// Stored packets survive a reconnect and are resent in packet-id order when
/// the broker confirms session presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenericStorePacket<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    V3_1_1Publish(v3_1_1::GenericPublish<PacketIdType>),
    V3_1_1Pubrel(v3_1_1::GenericPubrel<PacketIdType>),
    V5_0Publish(v5_0::GenericPublish<PacketIdType>),
    V5_0Pubrel(v5_0::GenericPubrel<PacketIdType>),
}

/// Standard-width store packet.
pub type StorePacket = GenericStorePacket<u16>;

impl<PacketIdType> GenericStorePacket<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    pub fn packet_id(&self) -> PacketIdType {
        match self {
            GenericStorePacket::V3_1_1Publish(p) => {
                p.packet_id().unwrap_or_else(PacketIdType::zero)
            }
            GenericStorePacket::V5_0Publish(p) => p.packet_id().unwrap_or_else(PacketIdType::zero),
            GenericStorePacket::V3_1_1Pubrel(p) => p.packet_id(),
            GenericStorePacket::V5_0Pubrel(p) => p.packet_id(),
        }
    }

    pub fn packet_type(&self) -> PacketType {
        match self {
            GenericStorePacket::V3_1_1Publish(_) | GenericStorePacket::V5_0Publish(_) => {
                PacketType::Publish
            }
            GenericStorePacket::V3_1_1Pubrel(_) | GenericStorePacket::V5_0Pubrel(_) => {
                PacketType::Pubrel
            }
        }
    }

    pub fn is_publish(&self) -> bool {
        self.packet_type() == PacketType::Publish
    }
}

impl<PacketIdType> From<GenericStorePacket<PacketIdType>> for GenericPacket<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    fn from(p: GenericStorePacket<PacketIdType>) -> Self {
        match p {
            GenericStorePacket::V3_1_1Publish(p) => GenericPacket::V3_1_1Publish(p),
            GenericStorePacket::V3_1_1Pubrel(p) => GenericPacket::V3_1_1Pubrel(p),
            GenericStorePacket::V5_0Publish(p) => GenericPacket::V5_0Publish(p),
            GenericStorePacket::V5_0Pubrel(p) => GenericPacket::V5_0Pubrel(p),
        }
    }
}
