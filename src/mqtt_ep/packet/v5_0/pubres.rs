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

//! PUBACK / PUBREC / PUBREL / PUBCOMP for MQTT 5.0.
//!
//! The v5 acknowledgements allow two truncated tails: with remaining length
//! equal to the id width, the reason code is Success and there are no
//! properties; with one extra byte, the reason code is present but the
//! property length is omitted.

use std::io::IoSlice;

use bytes::{Buf, Bytes};

use crate::mqtt_ep::packet::codec::VariableByteInteger;
use crate::mqtt_ep::packet::property::PropertyLocation;
use crate::mqtt_ep::packet::{GenericPacketTrait, IsPacketId, Properties, Property};
use crate::mqtt_ep::result_code::MqttError;

macro_rules! pubres_packet {
    (
        $( #[$meta:meta] )*
        $Name:ident, $Builder:ident, $Alias:ident, $fixed:expr, $flags:expr,
        $ReasonCode:ty, $loc:expr, $default_reason:expr
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
            reason_code_buf: Option<[u8; 1]>,
            props: Option<Properties>,
        }

        /// Standard-width alias.
        pub type $Alias = $Name<u16>;

        impl<PacketIdType> $Name<PacketIdType>
        where
            PacketIdType: IsPacketId,
        {
            pub fn builder() -> $Builder<PacketIdType> {
                $Builder {
                    packet_id: None,
                    reason_code: None,
                    props: None,
                }
            }

            pub fn new(packet_id: PacketIdType) -> Result<Self, MqttError> {
                Self::assemble(packet_id, None, None)
            }

            pub fn packet_id(&self) -> PacketIdType {
                let mut b = Bytes::copy_from_slice(self.packet_id_buf.as_ref());
                PacketIdType::decode(&mut b).expect("buffer width matches the id width")
            }

            /// Reason code, with the omitted tail reading as success.
            pub fn reason_code(&self) -> $ReasonCode {
                self.reason_code_buf
                    .map(|b| <$ReasonCode>::try_from(b[0]).expect("validated on construction"))
                    .unwrap_or($default_reason)
            }

            pub fn props(&self) -> Option<&Properties> {
                self.props.as_ref()
            }

            pub(crate) fn parse(flags: u8, mut payload: Bytes) -> Result<Self, MqttError> {
                if flags != $flags {
                    return Err(MqttError::MalformedPacket);
                }
                let packet_id = PacketIdType::decode(&mut payload)?;
                let reason_code = if payload.has_remaining() {
                    Some(<$ReasonCode>::try_from(payload.get_u8())?)
                } else {
                    None
                };
                let props = if payload.has_remaining() {
                    Some(Properties::decode(&mut payload, $loc)?)
                } else {
                    None
                };
                if payload.has_remaining() {
                    return Err(MqttError::MalformedPacket);
                }
                Self::assemble(packet_id, reason_code, props)
            }

            fn assemble(
                packet_id: PacketIdType,
                reason_code: Option<$ReasonCode>,
                props: Option<Properties>,
            ) -> Result<Self, MqttError> {
                if packet_id.is_zero() {
                    return Err(MqttError::ProtocolError);
                }
                // a property block requires the reason code byte before it
                let reason_code = match (&props, reason_code) {
                    (Some(_), None) => Some($default_reason),
                    (_, rc) => rc,
                };
                let remaining = PacketIdType::WIRE_SIZE
                    + usize::from(reason_code.is_some())
                    + props.as_ref().map_or(0, Properties::size);
                Ok(Self {
                    fixed_header: [$fixed | $flags],
                    remaining_length: VariableByteInteger::new(remaining as u32)?,
                    packet_id_buf: packet_id.to_buffer(),
                    reason_code_buf: reason_code.map(|rc| [rc.to_u8()]),
                    props,
                })
            }
        }

        impl<PacketIdType> GenericPacketTrait for $Name<PacketIdType>
        where
            PacketIdType: IsPacketId,
        {
            fn size(&self) -> usize {
                1 + self.remaining_length.size() + self.remaining_length.value() as usize
            }

            fn num_of_const_buffer_sequence(&self) -> usize {
                3 + usize::from(self.reason_code_buf.is_some())
                    + self.props.as_ref().map_or(0, Properties::num_buffers)
            }

            fn to_buffers(&self) -> Vec<IoSlice<'_>> {
                let mut out = Vec::with_capacity(self.num_of_const_buffer_sequence());
                out.push(IoSlice::new(&self.fixed_header));
                out.push(IoSlice::new(self.remaining_length.as_slice()));
                out.push(IoSlice::new(self.packet_id_buf.as_ref()));
                if let Some(rc) = &self.reason_code_buf {
                    out.push(IoSlice::new(rc));
                }
                if let Some(props) = &self.props {
                    props.push_buffers(&mut out);
                }
                out
            }
        }

        #[derive(Debug)]
        pub struct $Builder<PacketIdType>
        where
            PacketIdType: IsPacketId,
        {
            packet_id: Option<PacketIdType>,
            reason_code: Option<$ReasonCode>,
            props: Option<Vec<Property>>,
        }

        impl<PacketIdType> $Builder<PacketIdType>
        where
            PacketIdType: IsPacketId,
        {
            pub fn packet_id(mut self, packet_id: PacketIdType) -> Self {
                self.packet_id = Some(packet_id);
                self
            }

            pub fn reason_code(mut self, reason_code: $ReasonCode) -> Self {
                self.reason_code = Some(reason_code);
                self
            }

            pub fn props(mut self, props: impl Into<Vec<Property>>) -> Self {
                self.props = Some(props.into());
                self
            }

            pub fn build(self) -> Result<$Name<PacketIdType>, MqttError> {
                let packet_id = self.packet_id.ok_or(MqttError::InvalidArgument)?;
                let props = self
                    .props
                    .map(|p| Properties::new(p, $loc))
                    .transpose()?;
                $Name::assemble(packet_id, self.reason_code, props)
            }
        }
    };
}

use crate::mqtt_ep::result_code::{
    PubackReasonCode, PubcompReasonCode, PubrecReasonCode, PubrelReasonCode,
};

pubres_packet!(
    /// MQTT 5.0 PUBACK: terminal acknowledgement of a QoS 1 PUBLISH.
    GenericPuback, GenericPubackBuilder, Puback, 0x40, 0x00,
    PubackReasonCode, PropertyLocation::Puback, PubackReasonCode::Success
);
pubres_packet!(
    /// MQTT 5.0 PUBREC: first acknowledgement of a QoS 2 PUBLISH.
    GenericPubrec, GenericPubrecBuilder, Pubrec, 0x50, 0x00,
    PubrecReasonCode, PropertyLocation::Pubrec, PubrecReasonCode::Success
);
pubres_packet!(
    /// MQTT 5.0 PUBREL: release of a QoS 2 exchange; flag bits are 0b0010.
    GenericPubrel, GenericPubrelBuilder, Pubrel, 0x60, 0x02,
    PubrelReasonCode, PropertyLocation::Pubrel, PubrelReasonCode::Success
);
pubres_packet!(
    /// MQTT 5.0 PUBCOMP: terminal acknowledgement of a QoS 2 PUBLISH.
    GenericPubcomp, GenericPubcompBuilder, Pubcomp, 0x70, 0x00,
    PubcompReasonCode, PropertyLocation::Pubcomp, PubcompReasonCode::Success
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mqtt_ep::packet::property::ReasonString;
    use crate::mqtt_ep::packet::GenericPacket;
    use crate::mqtt_ep::version::Version;

    #[test]
    fn short_form_puback() {
        let puback = Puback::new(1).unwrap();
        assert_eq!(puback.to_continuous_buffer(), [0x40, 0x02, 0x00, 0x01]);
        assert_eq!(puback.reason_code(), PubackReasonCode::Success);
    }

    #[test]
    fn reason_code_form() {
        let puback = Puback::builder()
            .packet_id(1)
            .reason_code(PubackReasonCode::NoMatchingSubscribers)
            .build()
            .unwrap();
        assert_eq!(
            puback.to_continuous_buffer(),
            [0x40, 0x03, 0x00, 0x01, 0x10]
        );
    }

    #[test]
    fn props_imply_reason_code() {
        let pubrec = Pubrec::builder()
            .packet_id(2)
            .props(vec![ReasonString::new("dup").unwrap().into()])
            .build()
            .unwrap();
        let bytes = pubrec.to_continuous_buffer();
        // fixed, rem, id(2), reason, prop len, prop...
        assert_eq!(bytes[4], 0x00);
        let decoded =
            GenericPacket::<u16>::decode(Version::V5_0, Bytes::from(bytes)).unwrap();
        assert_eq!(decoded, GenericPacket::V5_0Pubrec(pubrec));
    }

    #[test]
    fn short_form_decode() {
        for (raw, expect_rel) in [
            (vec![0x40u8, 0x02, 0x12, 0x34], false),
            (vec![0x62u8, 0x02, 0x12, 0x34], true),
        ] {
            let decoded =
                GenericPacket::<u16>::decode(Version::V5_0, Bytes::from(raw.clone())).unwrap();
            assert_eq!(decoded.packet_id(), Some(0x1234));
            assert_eq!(
                matches!(decoded, GenericPacket::V5_0Pubrel(_)),
                expect_rel
            );
            assert_eq!(decoded.to_continuous_buffer(), raw);
        }
    }

    #[test]
    fn pubcomp_packet_identifier_not_found() {
        let pubcomp = Pubcomp::builder()
            .packet_id(9)
            .reason_code(PubcompReasonCode::PacketIdentifierNotFound)
            .build()
            .unwrap();
        let decoded = GenericPacket::<u16>::decode(
            Version::V5_0,
            Bytes::from(pubcomp.to_continuous_buffer()),
        )
        .unwrap();
        match decoded {
            GenericPacket::V5_0Pubcomp(p) => {
                assert_eq!(p.reason_code(), PubcompReasonCode::PacketIdentifierNotFound);
            }
            other => panic!("unexpected packet: {other:?}"),
        }
    }
}
