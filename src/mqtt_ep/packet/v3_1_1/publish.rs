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

use crate::mqtt_ep::packet::codec::{validate_topic_name, MqttString, VariableByteInteger};
use crate::mqtt_ep::packet::{GenericPacketTrait, IsPacketId, Payload, Qos};
use crate::mqtt_ep::result_code::MqttError;

const DUP_BIT: u8 = 0b0000_1000;
const RETAIN_BIT: u8 = 0b0000_0001;

/// MQTT 3.1.1 PUBLISH with a generic packet-id width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericPublish<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    fixed_header: [u8; 1],
    remaining_length: VariableByteInteger,
    topic_name: MqttString,
    packet_id_buf: Option<PacketIdType::Buffer>,
    payload: Payload,
}

/// Standard-width PUBLISH.
pub type Publish = GenericPublish<u16>;

impl<PacketIdType> GenericPublish<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    pub fn builder() -> GenericPublishBuilder<PacketIdType> {
        GenericPublishBuilder::default()
    }

    pub fn topic_name(&self) -> &str {
        self.topic_name.as_str()
    }

    pub fn qos(&self) -> Qos {
        Qos::try_from((self.fixed_header[0] >> 1) & 0b11).expect("validated on construction")
    }

    pub fn dup(&self) -> bool {
        self.fixed_header[0] & DUP_BIT != 0
    }

    pub fn retain(&self) -> bool {
        self.fixed_header[0] & RETAIN_BIT != 0
    }

    pub fn packet_id(&self) -> Option<PacketIdType> {
        self.packet_id_buf.as_ref().map(|buf| {
            let mut b = Bytes::copy_from_slice(buf.as_ref());
            PacketIdType::decode(&mut b).expect("buffer width matches the id width")
        })
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Mark (or clear) the duplicate-delivery flag in place.
    pub fn set_dup(&mut self, dup: bool) {
        if dup {
            self.fixed_header[0] |= DUP_BIT;
        } else {
            self.fixed_header[0] &= !DUP_BIT;
        }
    }

    pub(crate) fn parse(flags: u8, mut payload: Bytes) -> Result<Self, MqttError> {
        let qos = Qos::try_from((flags >> 1) & 0b11)?;
        let topic_name = MqttString::decode(&mut payload)?;
        validate_topic_name(topic_name.as_str())?;
        if topic_name.is_empty() {
            return Err(MqttError::TopicNameInvalid);
        }
        let packet_id = if qos == Qos::AtMostOnce {
            None
        } else {
            let id = PacketIdType::decode(&mut payload)?;
            if id.is_zero() {
                return Err(MqttError::ProtocolError);
            }
            Some(id)
        };
        if qos == Qos::AtMostOnce && flags & DUP_BIT != 0 {
            // DUP must be zero for QoS 0
            return Err(MqttError::ProtocolError);
        }
        let body = Payload::from_chunks(vec![payload]);
        Self::assemble(
            topic_name,
            packet_id,
            qos,
            flags & RETAIN_BIT != 0,
            flags & DUP_BIT != 0,
            body,
        )
    }

    fn assemble(
        topic_name: MqttString,
        packet_id: Option<PacketIdType>,
        qos: Qos,
        retain: bool,
        dup: bool,
        payload: Payload,
    ) -> Result<Self, MqttError> {
        let mut fixed_header = 0x30 | (qos.to_u8() << 1);
        if retain {
            fixed_header |= RETAIN_BIT;
        }
        if dup {
            fixed_header |= DUP_BIT;
        }
        let pid_size = if packet_id.is_some() {
            PacketIdType::WIRE_SIZE
        } else {
            0
        };
        let remaining = topic_name.size() + pid_size + payload.len();
        Ok(Self {
            fixed_header: [fixed_header],
            remaining_length: VariableByteInteger::new(remaining as u32)?,
            topic_name,
            packet_id_buf: packet_id.map(|id| id.to_buffer()),
            payload,
        })
    }
}

impl<PacketIdType> GenericPacketTrait for GenericPublish<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    fn size(&self) -> usize {
        1 + self.remaining_length.size() + self.remaining_length.value() as usize
    }

    fn num_of_const_buffer_sequence(&self) -> usize {
        2 + self.topic_name.num_buffers()
            + usize::from(self.packet_id_buf.is_some())
            + self.payload.num_buffers()
    }

    fn to_buffers(&self) -> Vec<IoSlice<'_>> {
        let mut out = Vec::with_capacity(self.num_of_const_buffer_sequence());
        out.push(IoSlice::new(&self.fixed_header));
        out.push(IoSlice::new(self.remaining_length.as_slice()));
        self.topic_name.push_buffers(&mut out);
        if let Some(buf) = &self.packet_id_buf {
            out.push(IoSlice::new(buf.as_ref()));
        }
        self.payload.push_buffers(&mut out);
        out
    }
}

/// Builder for [`GenericPublish`].
#[derive(Debug)]
pub struct GenericPublishBuilder<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    topic_name: Option<MqttString>,
    packet_id: Option<PacketIdType>,
    qos: Qos,
    retain: bool,
    dup: bool,
    payload: Payload,
}

/// Standard-width PUBLISH builder.
pub type PublishBuilder = GenericPublishBuilder<u16>;

impl<PacketIdType> Default for GenericPublishBuilder<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    fn default() -> Self {
        Self {
            topic_name: None,
            packet_id: None,
            qos: Qos::AtMostOnce,
            retain: false,
            dup: false,
            payload: Payload::new(),
        }
    }
}

impl<PacketIdType> GenericPublishBuilder<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    pub fn topic_name(mut self, topic_name: impl AsRef<str>) -> Result<Self, MqttError> {
        let topic_name = topic_name.as_ref();
        validate_topic_name(topic_name)?;
        self.topic_name = Some(MqttString::new(topic_name.to_owned())?);
        Ok(self)
    }

    pub fn packet_id(mut self, packet_id: impl Into<Option<PacketIdType>>) -> Self {
        self.packet_id = packet_id.into();
        self
    }

    pub fn qos(mut self, qos: Qos) -> Self {
        self.qos = qos;
        self
    }

    pub fn retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }

    pub fn dup(mut self, dup: bool) -> Self {
        self.dup = dup;
        self
    }

    pub fn payload(mut self, payload: impl Into<Payload>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn build(self) -> Result<GenericPublish<PacketIdType>, MqttError> {
        let topic_name = self.topic_name.ok_or(MqttError::InvalidArgument)?;
        if topic_name.is_empty() {
            return Err(MqttError::TopicNameInvalid);
        }
        match self.qos {
            Qos::AtMostOnce => {
                if self.packet_id.is_some() {
                    return Err(MqttError::ProtocolError);
                }
            }
            _ => match self.packet_id {
                None => return Err(MqttError::ProtocolError),
                Some(id) if id.is_zero() => return Err(MqttError::ProtocolError),
                Some(_) => {}
            },
        }
        GenericPublish::assemble(
            topic_name,
            self.packet_id,
            self.qos,
            self.retain,
            self.dup,
            self.payload,
        )
    }
}
