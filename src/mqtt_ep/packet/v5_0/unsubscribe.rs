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

use std::io::IoSlice;

use bytes::{Buf, Bytes};

use crate::mqtt_ep::packet::codec::{validate_topic_filter, MqttString, VariableByteInteger};
use crate::mqtt_ep::packet::property::PropertyLocation;
use crate::mqtt_ep::packet::{GenericPacketTrait, IsPacketId, Properties, Property};
use crate::mqtt_ep::result_code::{MqttError, UnsubackReasonCode};

/// MQTT 5.0 UNSUBSCRIBE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericUnsubscribe<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    fixed_header: [u8; 1],
    remaining_length: VariableByteInteger,
    packet_id_buf: PacketIdType::Buffer,
    props: Properties,
    topics: Vec<MqttString>,
}

/// Standard-width UNSUBSCRIBE.
pub type Unsubscribe = GenericUnsubscribe<u16>;

impl<PacketIdType> GenericUnsubscribe<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    pub fn builder() -> GenericUnsubscribeBuilder<PacketIdType> {
        GenericUnsubscribeBuilder {
            packet_id: None,
            props: Vec::new(),
            topics: Vec::new(),
        }
    }

    pub fn packet_id(&self) -> PacketIdType {
        let mut b = Bytes::copy_from_slice(self.packet_id_buf.as_ref());
        PacketIdType::decode(&mut b).expect("buffer width matches the id width")
    }

    pub fn props(&self) -> &Properties {
        &self.props
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.topics.iter().map(MqttString::as_str)
    }

    pub(crate) fn parse(flags: u8, mut payload: Bytes) -> Result<Self, MqttError> {
        if flags != 0x02 {
            return Err(MqttError::MalformedPacket);
        }
        let packet_id = PacketIdType::decode(&mut payload)?;
        if packet_id.is_zero() {
            return Err(MqttError::ProtocolError);
        }
        let props = Properties::decode(&mut payload, PropertyLocation::Unsubscribe)?;
        let mut topics = Vec::new();
        while payload.has_remaining() {
            let topic = MqttString::decode(&mut payload)?;
            validate_topic_filter(topic.as_str())?;
            topics.push(topic);
        }
        Self::assemble(packet_id, props, topics)
    }

    fn assemble(
        packet_id: PacketIdType,
        props: Properties,
        topics: Vec<MqttString>,
    ) -> Result<Self, MqttError> {
        if topics.is_empty() {
            return Err(MqttError::ProtocolError);
        }
        let remaining = PacketIdType::WIRE_SIZE
            + props.size()
            + topics.iter().map(MqttString::size).sum::<usize>();
        Ok(Self {
            fixed_header: [0xa2],
            remaining_length: VariableByteInteger::new(remaining as u32)?,
            packet_id_buf: packet_id.to_buffer(),
            props,
            topics,
        })
    }
}

impl<PacketIdType> GenericPacketTrait for GenericUnsubscribe<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    fn size(&self) -> usize {
        1 + self.remaining_length.size() + self.remaining_length.value() as usize
    }

    fn num_of_const_buffer_sequence(&self) -> usize {
        3 + self.props.num_buffers()
            + self.topics.iter().map(MqttString::num_buffers).sum::<usize>()
    }

    fn to_buffers(&self) -> Vec<IoSlice<'_>> {
        let mut out = Vec::with_capacity(self.num_of_const_buffer_sequence());
        out.push(IoSlice::new(&self.fixed_header));
        out.push(IoSlice::new(self.remaining_length.as_slice()));
        out.push(IoSlice::new(self.packet_id_buf.as_ref()));
        self.props.push_buffers(&mut out);
        for t in &self.topics {
            t.push_buffers(&mut out);
        }
        out
    }
}

/// Builder for [`GenericUnsubscribe`].
#[derive(Debug)]
pub struct GenericUnsubscribeBuilder<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    packet_id: Option<PacketIdType>,
    props: Vec<Property>,
    topics: Vec<MqttString>,
}

impl<PacketIdType> GenericUnsubscribeBuilder<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    pub fn packet_id(mut self, packet_id: PacketIdType) -> Self {
        self.packet_id = Some(packet_id);
        self
    }

    pub fn props(mut self, props: impl Into<Vec<Property>>) -> Self {
        self.props = props.into();
        self
    }

    pub fn topics<I, S>(mut self, topics: I) -> Result<Self, MqttError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = Vec::new();
        for t in topics {
            validate_topic_filter(t.as_ref())?;
            out.push(MqttString::new(t.as_ref().to_owned())?);
        }
        self.topics = out;
        Ok(self)
    }

    pub fn build(self) -> Result<GenericUnsubscribe<PacketIdType>, MqttError> {
        let packet_id = self.packet_id.ok_or(MqttError::InvalidArgument)?;
        if packet_id.is_zero() {
            return Err(MqttError::ProtocolError);
        }
        let props = Properties::new(self.props, PropertyLocation::Unsubscribe)?;
        GenericUnsubscribe::assemble(packet_id, props, self.topics)
    }
}

/// MQTT 5.0 UNSUBACK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericUnsuback<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    fixed_header: [u8; 1],
    remaining_length: VariableByteInteger,
    packet_id_buf: PacketIdType::Buffer,
    props: Properties,
    reason_codes: Vec<UnsubackReasonCode>,
    codes_buf: Vec<u8>,
}

/// Standard-width UNSUBACK.
pub type Unsuback = GenericUnsuback<u16>;

impl<PacketIdType> GenericUnsuback<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    pub fn builder() -> GenericUnsubackBuilder<PacketIdType> {
        GenericUnsubackBuilder {
            packet_id: None,
            props: Vec::new(),
            reason_codes: Vec::new(),
        }
    }

    pub fn packet_id(&self) -> PacketIdType {
        let mut b = Bytes::copy_from_slice(self.packet_id_buf.as_ref());
        PacketIdType::decode(&mut b).expect("buffer width matches the id width")
    }

    pub fn props(&self) -> &Properties {
        &self.props
    }

    pub fn reason_codes(&self) -> &[UnsubackReasonCode] {
        &self.reason_codes
    }

    pub(crate) fn parse(flags: u8, mut payload: Bytes) -> Result<Self, MqttError> {
        if flags != 0 {
            return Err(MqttError::MalformedPacket);
        }
        let packet_id = PacketIdType::decode(&mut payload)?;
        if packet_id.is_zero() {
            return Err(MqttError::ProtocolError);
        }
        let props = Properties::decode(&mut payload, PropertyLocation::Unsuback)?;
        let mut reason_codes = Vec::with_capacity(payload.remaining());
        while payload.has_remaining() {
            reason_codes.push(UnsubackReasonCode::try_from(payload.get_u8())?);
        }
        Self::assemble(packet_id, props, reason_codes)
    }

    fn assemble(
        packet_id: PacketIdType,
        props: Properties,
        reason_codes: Vec<UnsubackReasonCode>,
    ) -> Result<Self, MqttError> {
        if reason_codes.is_empty() {
            return Err(MqttError::ProtocolError);
        }
        let codes_buf: Vec<u8> = reason_codes.iter().map(|c| c.to_u8()).collect();
        let remaining = PacketIdType::WIRE_SIZE + props.size() + codes_buf.len();
        Ok(Self {
            fixed_header: [0xb0],
            remaining_length: VariableByteInteger::new(remaining as u32)?,
            packet_id_buf: packet_id.to_buffer(),
            props,
            reason_codes,
            codes_buf,
        })
    }
}

impl<PacketIdType> GenericPacketTrait for GenericUnsuback<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    fn size(&self) -> usize {
        1 + self.remaining_length.size() + self.remaining_length.value() as usize
    }

    fn num_of_const_buffer_sequence(&self) -> usize {
        4 + self.props.num_buffers()
    }

    fn to_buffers(&self) -> Vec<IoSlice<'_>> {
        let mut out = Vec::with_capacity(self.num_of_const_buffer_sequence());
        out.push(IoSlice::new(&self.fixed_header));
        out.push(IoSlice::new(self.remaining_length.as_slice()));
        out.push(IoSlice::new(self.packet_id_buf.as_ref()));
        self.props.push_buffers(&mut out);
        out.push(IoSlice::new(&self.codes_buf));
        out
    }
}

/// Builder for [`GenericUnsuback`].
#[derive(Debug)]
pub struct GenericUnsubackBuilder<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    packet_id: Option<PacketIdType>,
    props: Vec<Property>,
    reason_codes: Vec<UnsubackReasonCode>,
}

impl<PacketIdType> GenericUnsubackBuilder<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    pub fn packet_id(mut self, packet_id: PacketIdType) -> Self {
        self.packet_id = Some(packet_id);
        self
    }

    pub fn props(mut self, props: impl Into<Vec<Property>>) -> Self {
        self.props = props.into();
        self
    }

    pub fn reason_codes(mut self, reason_codes: impl Into<Vec<UnsubackReasonCode>>) -> Self {
        self.reason_codes = reason_codes.into();
        self
    }

    pub fn build(self) -> Result<GenericUnsuback<PacketIdType>, MqttError> {
        let packet_id = self.packet_id.ok_or(MqttError::InvalidArgument)?;
        let props = Properties::new(self.props, PropertyLocation::Unsuback)?;
        GenericUnsuback::assemble(packet_id, props, self.reason_codes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mqtt_ep::packet::GenericPacket;
    use crate::mqtt_ep::version::Version;

    #[test]
    fn unsubscribe_round_trip() {
        let unsubscribe = Unsubscribe::builder()
            .packet_id(5)
            .topics(["a/b"])
            .unwrap()
            .build()
            .unwrap();
        let decoded = GenericPacket::<u16>::decode(
            Version::V5_0,
            Bytes::from(unsubscribe.to_continuous_buffer()),
        )
        .unwrap();
        assert_eq!(decoded, GenericPacket::V5_0Unsubscribe(unsubscribe));
    }

    #[test]
    fn unsuback_round_trip() {
        let unsuback = Unsuback::builder()
            .packet_id(5)
            .reason_codes(vec![
                UnsubackReasonCode::Success,
                UnsubackReasonCode::NoSubscriptionExisted,
            ])
            .build()
            .unwrap();
        let decoded = GenericPacket::<u16>::decode(
            Version::V5_0,
            Bytes::from(unsuback.to_continuous_buffer()),
        )
        .unwrap();
        match decoded {
            GenericPacket::V5_0Unsuback(u) => {
                assert_eq!(u, unsuback);
                assert_eq!(u.reason_codes().len(), 2);
            }
            other => panic!("unexpected packet: {other:?}"),
        }
    }
}
