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
use crate::mqtt_ep::packet::{GenericPacketTrait, IsPacketId};
use crate::mqtt_ep::result_code::MqttError;

/// MQTT 3.1.1 UNSUBSCRIBE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericUnsubscribe<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    fixed_header: [u8; 1],
    remaining_length: VariableByteInteger,
    packet_id_buf: PacketIdType::Buffer,
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
            topics: Vec::new(),
        }
    }

    pub fn packet_id(&self) -> PacketIdType {
        let mut b = Bytes::copy_from_slice(self.packet_id_buf.as_ref());
        PacketIdType::decode(&mut b).expect("buffer width matches the id width")
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
        let mut topics = Vec::new();
        while payload.has_remaining() {
            let topic = MqttString::decode(&mut payload)?;
            validate_topic_filter(topic.as_str())?;
            topics.push(topic);
        }
        Self::assemble(packet_id, topics)
    }

    fn assemble(packet_id: PacketIdType, topics: Vec<MqttString>) -> Result<Self, MqttError> {
        if topics.is_empty() {
            return Err(MqttError::ProtocolError);
        }
        let remaining =
            PacketIdType::WIRE_SIZE + topics.iter().map(MqttString::size).sum::<usize>();
        Ok(Self {
            fixed_header: [0xa2],
            remaining_length: VariableByteInteger::new(remaining as u32)?,
            packet_id_buf: packet_id.to_buffer(),
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
        3 + self.topics.iter().map(MqttString::num_buffers).sum::<usize>()
    }

    fn to_buffers(&self) -> Vec<IoSlice<'_>> {
        let mut out = Vec::with_capacity(self.num_of_const_buffer_sequence());
        out.push(IoSlice::new(&self.fixed_header));
        out.push(IoSlice::new(self.remaining_length.as_slice()));
        out.push(IoSlice::new(self.packet_id_buf.as_ref()));
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
        GenericUnsubscribe::assemble(packet_id, self.topics)
    }
}

/// MQTT 3.1.1 UNSUBACK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericUnsuback<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    fixed_header: [u8; 1],
    remaining_length: VariableByteInteger,
    packet_id_buf: PacketIdType::Buffer,
}

/// Standard-width UNSUBACK.
pub type Unsuback = GenericUnsuback<u16>;

impl<PacketIdType> GenericUnsuback<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    pub fn new(packet_id: PacketIdType) -> Result<Self, MqttError> {
        if packet_id.is_zero() {
            return Err(MqttError::ProtocolError);
        }
        Ok(Self {
            fixed_header: [0xb0],
            remaining_length: VariableByteInteger::new(PacketIdType::WIRE_SIZE as u32)?,
            packet_id_buf: packet_id.to_buffer(),
        })
    }

    pub fn packet_id(&self) -> PacketIdType {
        let mut b = Bytes::copy_from_slice(self.packet_id_buf.as_ref());
        PacketIdType::decode(&mut b).expect("buffer width matches the id width")
    }

    pub(crate) fn parse(flags: u8, mut payload: Bytes) -> Result<Self, MqttError> {
        if flags != 0 {
            return Err(MqttError::MalformedPacket);
        }
        let packet_id = PacketIdType::decode(&mut payload)?;
        if !payload.is_empty() {
            return Err(MqttError::MalformedPacket);
        }
        Self::new(packet_id)
    }
}

impl<PacketIdType> GenericPacketTrait for GenericUnsuback<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    fn size(&self) -> usize {
        1 + self.remaining_length.size() + PacketIdType::WIRE_SIZE
    }

    fn num_of_const_buffer_sequence(&self) -> usize {
        3
    }

    fn to_buffers(&self) -> Vec<IoSlice<'_>> {
        vec![
            IoSlice::new(&self.fixed_header),
            IoSlice::new(self.remaining_length.as_slice()),
            IoSlice::new(self.packet_id_buf.as_ref()),
        ]
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
            .packet_id(3)
            .topics(["a/b", "c/#"])
            .unwrap()
            .build()
            .unwrap();
        let decoded = GenericPacket::<u16>::decode(
            Version::V3_1_1,
            Bytes::from(unsubscribe.to_continuous_buffer()),
        )
        .unwrap();
        match decoded {
            GenericPacket::V3_1_1Unsubscribe(u) => {
                assert_eq!(u, unsubscribe);
                assert_eq!(u.packet_id(), 3);
                assert_eq!(u.topics().collect::<Vec<_>>(), ["a/b", "c/#"]);
            }
            other => panic!("unexpected packet: {other:?}"),
        }
    }

    #[test]
    fn unsuback_wire_bytes() {
        let unsuback = Unsuback::new(3).unwrap();
        assert_eq!(unsuback.to_continuous_buffer(), [0xb0, 0x02, 0x00, 0x03]);
    }
}
