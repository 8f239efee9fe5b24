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
use crate::mqtt_ep::packet::{GenericPacketTrait, IsPacketId, SubEntry, SubOpts};
use crate::mqtt_ep::result_code::{MqttError, SubackReturnCode};

/// MQTT 3.1.1 SUBSCRIBE. Entries carry the requested QoS only; the other
/// subscription-option bits are v5 and must be zero here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericSubscribe<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    fixed_header: [u8; 1],
    remaining_length: VariableByteInteger,
    packet_id_buf: PacketIdType::Buffer,
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
            entries: Vec::new(),
        }
    }

    pub fn packet_id(&self) -> PacketIdType {
        let mut b = Bytes::copy_from_slice(self.packet_id_buf.as_ref());
        PacketIdType::decode(&mut b).expect("buffer width matches the id width")
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
        let mut entries = Vec::new();
        while payload.has_remaining() {
            let topic = MqttString::decode(&mut payload)?;
            if !payload.has_remaining() {
                return Err(MqttError::MalformedPacket);
            }
            let opts_byte = payload.get_u8();
            // v3.1.1 admits only the QoS bits
            if opts_byte & 0b1111_1100 != 0 {
                return Err(MqttError::ProtocolError);
            }
            let opts = SubOpts::from_u8(opts_byte)?;
            entries.push(SubEntry::from_parts(topic, opts)?);
        }
        Self::assemble(packet_id, entries)
    }

    fn assemble(packet_id: PacketIdType, entries: Vec<SubEntry>) -> Result<Self, MqttError> {
        if entries.is_empty() {
            return Err(MqttError::ProtocolError);
        }
        let remaining = PacketIdType::WIRE_SIZE
            + entries
                .iter()
                .map(|e| e.topic().size() + 1)
                .sum::<usize>();
        let opts_bufs = entries.iter().map(|e| [e.opts().to_u8()]).collect();
        Ok(Self {
            fixed_header: [0x82],
            remaining_length: VariableByteInteger::new(remaining as u32)?,
            packet_id_buf: packet_id.to_buffer(),
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
        3 + self
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

    pub fn entries(mut self, entries: impl Into<Vec<SubEntry>>) -> Self {
        self.entries = entries.into();
        self
    }

    pub fn build(self) -> Result<GenericSubscribe<PacketIdType>, MqttError> {
        let packet_id = self.packet_id.ok_or(MqttError::InvalidArgument)?;
        if packet_id.is_zero() {
            return Err(MqttError::ProtocolError);
        }
        GenericSubscribe::assemble(packet_id, self.entries)
    }
}

/// MQTT 3.1.1 SUBACK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericSuback<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    fixed_header: [u8; 1],
    remaining_length: VariableByteInteger,
    packet_id_buf: PacketIdType::Buffer,
    return_codes: Vec<SubackReturnCode>,
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
            return_codes: Vec::new(),
        }
    }

    pub fn packet_id(&self) -> PacketIdType {
        let mut b = Bytes::copy_from_slice(self.packet_id_buf.as_ref());
        PacketIdType::decode(&mut b).expect("buffer width matches the id width")
    }

    pub fn return_codes(&self) -> &[SubackReturnCode] {
        &self.return_codes
    }

    pub(crate) fn parse(flags: u8, mut payload: Bytes) -> Result<Self, MqttError> {
        if flags != 0 {
            return Err(MqttError::MalformedPacket);
        }
        let packet_id = PacketIdType::decode(&mut payload)?;
        if packet_id.is_zero() {
            return Err(MqttError::ProtocolError);
        }
        let mut return_codes = Vec::with_capacity(payload.remaining());
        while payload.has_remaining() {
            return_codes.push(SubackReturnCode::try_from(payload.get_u8())?);
        }
        Self::assemble(packet_id, return_codes)
    }

    fn assemble(
        packet_id: PacketIdType,
        return_codes: Vec<SubackReturnCode>,
    ) -> Result<Self, MqttError> {
        if return_codes.is_empty() {
            return Err(MqttError::ProtocolError);
        }
        let codes_buf: Vec<u8> = return_codes.iter().map(|c| c.to_u8()).collect();
        let remaining = PacketIdType::WIRE_SIZE + codes_buf.len();
        Ok(Self {
            fixed_header: [0x90],
            remaining_length: VariableByteInteger::new(remaining as u32)?,
            packet_id_buf: packet_id.to_buffer(),
            return_codes,
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
        4
    }

    fn to_buffers(&self) -> Vec<IoSlice<'_>> {
        vec![
            IoSlice::new(&self.fixed_header),
            IoSlice::new(self.remaining_length.as_slice()),
            IoSlice::new(self.packet_id_buf.as_ref()),
            IoSlice::new(&self.codes_buf),
        ]
    }
}

/// Builder for [`GenericSuback`].
#[derive(Debug)]
pub struct GenericSubackBuilder<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    packet_id: Option<PacketIdType>,
    return_codes: Vec<SubackReturnCode>,
}

impl<PacketIdType> GenericSubackBuilder<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    pub fn packet_id(mut self, packet_id: PacketIdType) -> Self {
        self.packet_id = Some(packet_id);
        self
    }

    pub fn return_codes(mut self, return_codes: impl Into<Vec<SubackReturnCode>>) -> Self {
        self.return_codes = return_codes.into();
        self
    }

    pub fn build(self) -> Result<GenericSuback<PacketIdType>, MqttError> {
        let packet_id = self.packet_id.ok_or(MqttError::InvalidArgument)?;
        GenericSuback::assemble(packet_id, self.return_codes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mqtt_ep::packet::{GenericPacket, Qos};
    use crate::mqtt_ep::version::Version;

    #[test]
    fn subscribe_round_trip() {
        let entry = SubEntry::new("a/+", SubOpts::new().set_qos(Qos::AtLeastOnce)).unwrap();
        let subscribe = Subscribe::builder()
            .packet_id(7)
            .entries(vec![entry])
            .build()
            .unwrap();
        assert_eq!(
            subscribe.to_continuous_buffer(),
            [0x82, 0x08, 0x00, 0x07, 0x00, 0x03, b'a', b'/', b'+', 0x01]
        );

        let decoded = GenericPacket::<u16>::decode(
            Version::V3_1_1,
            Bytes::from(subscribe.to_continuous_buffer()),
        )
        .unwrap();
        match decoded {
            GenericPacket::V3_1_1Subscribe(s) => {
                assert_eq!(s, subscribe);
                assert_eq!(s.packet_id(), 7);
                assert_eq!(s.entries()[0].topic_filter(), "a/+");
                assert_eq!(s.entries()[0].opts().qos(), Qos::AtLeastOnce);
            }
            other => panic!("unexpected packet: {other:?}"),
        }
    }

    #[test]
    fn subscribe_bad_fixed_flags() {
        let err = GenericPacket::<u16>::decode(
            Version::V3_1_1,
            Bytes::from_static(&[0x80, 0x06, 0x00, 0x07, 0x00, 0x01, b'a', 0x00]),
        );
        assert_eq!(err.unwrap_err(), MqttError::MalformedPacket);
    }

    #[test]
    fn subscribe_reserved_option_bits_rejected() {
        let err = GenericPacket::<u16>::decode(
            Version::V3_1_1,
            Bytes::from_static(&[0x82, 0x06, 0x00, 0x07, 0x00, 0x01, b'a', 0x04]),
        );
        assert_eq!(err.unwrap_err(), MqttError::ProtocolError);
    }

    #[test]
    fn suback_round_trip() {
        let suback = Suback::builder()
            .packet_id(7)
            .return_codes(vec![
                SubackReturnCode::SuccessMaximumQos1,
                SubackReturnCode::Failure,
            ])
            .build()
            .unwrap();
        assert_eq!(
            suback.to_continuous_buffer(),
            [0x90, 0x04, 0x00, 0x07, 0x01, 0x80]
        );
        let decoded = GenericPacket::<u16>::decode(
            Version::V3_1_1,
            Bytes::from(suback.to_continuous_buffer()),
        )
        .unwrap();
        assert_eq!(
            decoded,
            GenericPacket::V3_1_1Suback(suback)
        );
    }
}
