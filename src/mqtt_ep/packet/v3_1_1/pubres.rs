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

//! PUBACK / PUBREC / PUBREL / PUBCOMP for MQTT 3.1.1.
//!
//! All four share the same two-byte body (the packet identifier); only the
//! fixed header differs. PUBREL carries the mandated 0b0010 flag bits.

use std::io::IoSlice;

use bytes::Bytes;

use crate::mqtt_ep::packet::codec::VariableByteInteger;
use crate::mqtt_ep::packet::{GenericPacketTrait, IsPacketId};
use crate::mqtt_ep::result_code::MqttError;

macro_rules! pubres_packet {
    (
        $( #[$meta:meta] )*
        $Name:ident, $Builder:ident, $Alias:ident, $fixed:expr, $flags:expr
    ) => {
        $( #[$meta] )*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $Name<PacketIdType>
        where
            PacketIdType: IsPacketId,
        {
            fixed_header: [u8; 1],
            remaining_length: VariableByteInteger,
            packet_id_buf: PacketIdType::Buffer,
        }

        /// Standard-width alias.
        pub type $Alias = $Name<u16>;

        impl<PacketIdType> $Name<PacketIdType>
        where
            PacketIdType: IsPacketId,
        {
            pub fn builder() -> $Builder<PacketIdType> {
                $Builder { packet_id: None }
            }

            pub fn new(packet_id: PacketIdType) -> Result<Self, MqttError> {
                if packet_id.is_zero() {
                    return Err(MqttError::ProtocolError);
                }
                Ok(Self {
                    fixed_header: [$fixed | $flags],
                    remaining_length: VariableByteInteger::new(
                        PacketIdType::WIRE_SIZE as u32,
                    )?,
                    packet_id_buf: packet_id.to_buffer(),
                })
            }

            pub fn packet_id(&self) -> PacketIdType {
                let mut b = Bytes::copy_from_slice(self.packet_id_buf.as_ref());
                PacketIdType::decode(&mut b).expect("buffer width matches the id width")
            }

            pub(crate) fn parse(flags: u8, mut payload: Bytes) -> Result<Self, MqttError> {
                if flags != $flags {
                    return Err(MqttError::MalformedPacket);
                }
                let packet_id = PacketIdType::decode(&mut payload)?;
                if !payload.is_empty() {
                    return Err(MqttError::MalformedPacket);
                }
                if packet_id.is_zero() {
                    return Err(MqttError::ProtocolError);
                }
                Self::new(packet_id)
            }
        }

        impl<PacketIdType> GenericPacketTrait for $Name<PacketIdType>
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

        #[derive(Debug)]
        pub struct $Builder<PacketIdType>
        where
            PacketIdType: IsPacketId,
        {
            packet_id: Option<PacketIdType>,
        }

        impl<PacketIdType> $Builder<PacketIdType>
        where
            PacketIdType: IsPacketId,
        {
            pub fn packet_id(mut self, packet_id: PacketIdType) -> Self {
                self.packet_id = Some(packet_id);
                self
            }

            pub fn build(self) -> Result<$Name<PacketIdType>, MqttError> {
                let packet_id = self.packet_id.ok_or(MqttError::InvalidArgument)?;
                $Name::new(packet_id)
            }
        }
    };
}

pubres_packet!(
    /// MQTT 3.1.1 PUBACK: terminal acknowledgement of a QoS 1 PUBLISH.
    GenericPuback, GenericPubackBuilder, Puback, 0x40, 0x00
);
pubres_packet!(
    /// MQTT 3.1.1 PUBREC: first acknowledgement of a QoS 2 PUBLISH.
    GenericPubrec, GenericPubrecBuilder, Pubrec, 0x50, 0x00
);
pubres_packet!(
    /// MQTT 3.1.1 PUBREL: release of a QoS 2 exchange; flag bits are 0b0010.
    GenericPubrel, GenericPubrelBuilder, Pubrel, 0x60, 0x02
);
pubres_packet!(
    /// MQTT 3.1.1 PUBCOMP: terminal acknowledgement of a QoS 2 PUBLISH.
    GenericPubcomp, GenericPubcompBuilder, Pubcomp, 0x70, 0x00
);
