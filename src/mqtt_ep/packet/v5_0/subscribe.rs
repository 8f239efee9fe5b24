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

use crate::mqtt_ep::packet::codec::{MqttString, VariableByteInteger};
use crate::mqtt_ep::packet::property::PropertyLocation;
use crate::mqtt_ep::packet::{
    GenericPacketTrait, IsPacketId, Properties, Property, SubEntry, SubOpts,
};
use crate::mqtt_ep::result_code::{MqttError, SubackReasonCode};

/// MQTT 5.0 SUBSCRIBE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericSubscribe<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    fixed_header: [u8; 1],
    remaining_length: VariableByteInteger,
    packet_id_buf: PacketIdType::Buffer,
    props: Properties,
    entries: Vec<SubEntry>,
    opts_bufs: Vec<[u8; 1]>,
}

/// Standard-width SUBSCRIBE.
pub type Subscribe = GenericSubscribe<u16>;

impl<PacketIdType> GenericSubscribe<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    pub fn builder() -> GenericSubscribeBuilder<PacketIdType> {
        GenericSubscribeBuilder {
            packet_id: None,
            props: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub fn packet_id(&self) -> PacketIdType {
        let mut b = Bytes::copy_from_slice(self.packet_id_buf.as_ref());
        PacketIdType::decode(&mut b).expect("buffer width matches the id width")
    }

    pub fn props(&self) -> &Properties {
        &self.props
    }

    pub fn entries(&self) -> &[SubEntry] {
        &self.entries
    }

    pub(crate) fn parse(flags: u8, mut payload: Bytes) -> Result<Self, MqttError> {
        if flags != 0x02 {
            return Err(MqttError::MalformedPacket);
        }
        let packet_id = PacketIdType::decode(&mut payload)?;
        if packet_id.is_zero() {
            return Err(MqttError::ProtocolError);
        }
        let props = Properties::decode(&mut payload, PropertyLocation::Subscribe)?;
        let mut entries = Vec::new();
        while payload.has_remaining() {
            let topic = MqttString::decode(&mut payload)?;
            if !payload.has_remaining() {
                return Err(MqttError::MalformedPacket);
            }
            let opts = SubOpts::from_u8(payload.get_u8())?;
            entries.push(SubEntry::from_parts(topic, opts)?);
        }
        Self::assemble(packet_id, props, entries)
    }

    fn assemble(
        packet_id: PacketIdType,
        props: Properties,
        entries: Vec<SubEntry>,
    ) -> Result<Self, MqttError> {
        if entries.is_empty() {
            return Err(MqttError::ProtocolError);
        }
        let remaining = PacketIdType::WIRE_SIZE
            + props.size()
            + entries.iter().map(|e| e.topic().size() + 1).sum::<usize>();
        let opts_bufs = entries.iter().map(|e| [e.opts().to_u8()]).collect();
        Ok(Self {
            fixed_header: [0x82],
            remaining_length: VariableByteInteger::new(remaining as u32)?,
            packet_id_buf: packet_id.to_buffer(),
            props,
            entries,
            opts_bufs,
        })
    }
}

impl<PacketIdType> GenericPacketTrait for GenericSubscribe<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    fn size(&self) -> usize {
        1 + self.remaining_length.size() + self.remaining_length.value() as usize
    }

    fn num_of_const_buffer_sequence(&self) -> usize {
        3 + self.props.num_buffers()
            + self
                .entries
                .iter()
                .map(|e| e.topic().num_buffers() + 1)
                .sum::<usize>()
    }

    fn to_buffers(&self) -> Vec<IoSlice<'_>> {
        let mut out = Vec::with_capacity(self.num_of_const_buffer_sequence());
        out.push(IoSlice::new(&self.fixed_header));
        out.push(IoSlice::new(self.remaining_length.as_slice()));
        out.push(IoSlice::new(self.packet_id_buf.as_ref()));
        self.props.push_buffers(&mut out);
        for (entry, opts) in self.entries.iter().zip(&self.opts_bufs) {
            entry.topic().push_buffers(&mut out);
            out.push(IoSlice::new(opts));
        }
        out
    }
}

/// Builder for [`GenericSubscribe`].
#[derive(Debug)]
pub struct GenericSubscribeBuilder<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    packet_id: Option<PacketIdType>,
    props: Vec<Property>,
    entries: Vec<SubEntry>,
}

impl<PacketIdType> GenericSubscribeBuilder<PacketIdType>
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

    pub fn entries(mut self, entries: impl Into<Vec<SubEntry>>) -> Self {
        self.entries = entries.into();
        self
    }

    pub fn build(self) -> Result<GenericSubscribe<PacketIdType>, MqttError> {
        let packet_id = self.packet_id.ok_or(MqttError::InvalidArgument)?;
        if packet_id.is_zero() {
            return Err(MqttError::ProtocolError);
        }
        let props = Properties::new(self.props, PropertyLocation::Subscribe)?;
        GenericSubscribe::assemble(packet_id, props, self.entries)
    }
}

/// MQTT 5.0 SUBACK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericSuback<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    fixed_header: [u8; 1],
    remaining_length: VariableByteInteger,
    packet_id_buf: PacketIdType::Buffer,
    props: Properties,
    reason_codes: Vec<SubackReasonCode>,
    codes_buf: Vec<u8>,
}

/// Standard-width SUBACK.
pub type Suback = GenericSuback<u16>;

impl<PacketIdType> GenericSuback<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    pub fn builder() -> GenericSubackBuilder<PacketIdType> {
        GenericSubackBuilder {
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

    pub fn reason_codes(&self) -> &[SubackReasonCode] {
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
        let props = Properties::decode(&mut payload, PropertyLocation::Suback)?;
        let mut reason_codes = Vec::with_capacity(payload.remaining());
        while payload.has_remaining() {
            reason_codes.push(SubackReasonCode::try_from(payload.get_u8())?);
        }
        Self::assemble(packet_id, props, reason_codes)
    }

    fn assemble(
        packet_id: PacketIdType,
        props: Properties,
        reason_codes: Vec<SubackReasonCode>,
    ) -> Result<Self, MqttError> {
        if reason_codes.is_empty() {
            return Err(MqttError::ProtocolError);
        }
        let codes_buf: Vec<u8> = reason_codes.iter().map(|c| c.to_u8()).collect();
        let remaining = PacketIdType::WIRE_SIZE + props.size() + codes_buf.len();
        Ok(Self {
            fixed_header: [0x90],
            remaining_length: VariableByteInteger::new(remaining as u32)?,
            packet_id_buf: packet_id.to_buffer(),
            props,
            reason_codes,
            codes_buf,
        })
    }
}

impl<PacketIdType> GenericPacketTrait for GenericSuback<PacketIdType>
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

/// Builder for [`GenericSuback`].
#[derive(Debug)]
pub struct GenericSubackBuilder<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    packet_id: Option<PacketIdType>,
    props: Vec<Property>,
    reason_codes: Vec<SubackReasonCode>,
}

impl<PacketIdType> GenericSubackBuilder<PacketIdType>
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

    pub fn reason_codes(mut self, reason_codes: impl Into<Vec<SubackReasonCode>>) -> Self {
        self.reason_codes = reason_codes.into();
        self
    }

    pub fn build(self) -> Result<GenericSuback<PacketIdType>, MqttError> {
        let packet_id = self.packet_id.ok_or(MqttError::InvalidArgument)?;
        let props = Properties::new(self.props, PropertyLocation::Suback)?;
        GenericSuback::assemble(packet_id, props, self.reason_codes)
    }
}
