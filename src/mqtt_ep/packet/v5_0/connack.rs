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

use crate::mqtt_ep::packet::codec::VariableByteInteger;
use crate::mqtt_ep::packet::property::PropertyLocation;
use crate::mqtt_ep::packet::{GenericPacketTrait, Properties, Property};
use crate::mqtt_ep::result_code::{ConnectReasonCode, MqttError};

/// MQTT 5.0 CONNACK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connack {
    fixed_header: [u8; 1],
    remaining_length: VariableByteInteger,
    // acknowledge flags byte followed by the reason code byte
    variable: [u8; 2],
    props: Properties,
}

impl Connack {
    pub fn builder() -> ConnackBuilder {
        ConnackBuilder::default()
    }

    pub fn session_present(&self) -> bool {
        self.variable[0] & 0x01 != 0
    }

    pub fn reason_code(&self) -> ConnectReasonCode {
        ConnectReasonCode::try_from(self.variable[1]).expect("validated on construction")
    }

    pub fn props(&self) -> &Properties {
        &self.props
    }

    pub(crate) fn parse(flags: u8, mut payload: Bytes) -> Result<Self, MqttError> {
        if flags != 0 {
            return Err(MqttError::MalformedPacket);
        }
        if payload.remaining() < 2 {
            return Err(MqttError::MalformedPacket);
        }
        let ack_flags = payload.get_u8();
        if ack_flags & 0b1111_1110 != 0 {
            return Err(MqttError::MalformedPacket);
        }
        let reason_code = ConnectReasonCode::try_from(payload.get_u8())?;
        let props = if payload.has_remaining() {
            Properties::decode(&mut payload, PropertyLocation::Connack)?
        } else {
            Properties::empty()
        };
        if payload.has_remaining() {
            return Err(MqttError::MalformedPacket);
        }
        Self::assemble(ack_flags & 0x01 != 0, reason_code, props)
    }

    fn assemble(
        session_present: bool,
        reason_code: ConnectReasonCode,
        props: Properties,
    ) -> Result<Self, MqttError> {
        let remaining = 2 + props.size();
        Ok(Self {
            fixed_header: [0x20],
            remaining_length: VariableByteInteger::new(remaining as u32)?,
            variable: [session_present as u8, reason_code.to_u8()],
            props,
        })
    }
}

impl GenericPacketTrait for Connack {
    fn size(&self) -> usize {
        1 + self.remaining_length.size() + self.remaining_length.value() as usize
    }

    fn num_of_const_buffer_sequence(&self) -> usize {
        3 + self.props.num_buffers()
    }

    fn to_buffers(&self) -> Vec<IoSlice<'_>> {
        let mut out = Vec::with_capacity(self.num_of_const_buffer_sequence());
        out.push(IoSlice::new(&self.fixed_header));
        out.push(IoSlice::new(self.remaining_length.as_slice()));
        out.push(IoSlice::new(&self.variable));
        self.props.push_buffers(&mut out);
        out
    }
}

/// Builder for [`Connack`].
#[derive(Debug, Default)]
pub struct ConnackBuilder {
    session_present: bool,
    reason_code: Option<ConnectReasonCode>,
    props: Vec<Property>,
}

impl ConnackBuilder {
    pub fn session_present(mut self, session_present: bool) -> Self {
        self.session_present = session_present;
        self
    }

    pub fn reason_code(mut self, reason_code: ConnectReasonCode) -> Self {
        self.reason_code = Some(reason_code);
        self
    }

    pub fn props(mut self, props: impl Into<Vec<Property>>) -> Self {
        self.props = props.into();
        self
    }

    pub fn build(self) -> Result<Connack, MqttError> {
        let reason_code = self.reason_code.ok_or(MqttError::InvalidArgument)?;
        if self.session_present && !reason_code.is_success() {
            return Err(MqttError::InvalidArgument);
        }
        let props = Properties::new(self.props, PropertyLocation::Connack)?;
        Connack::assemble(self.session_present, reason_code, props)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mqtt_ep::packet::property::ReceiveMaximum;
    use crate::mqtt_ep::packet::GenericPacket;
    use crate::mqtt_ep::version::Version;

    #[test]
    fn connack_round_trip() {
        let connack = Connack::builder()
            .session_present(true)
            .reason_code(ConnectReasonCode::Success)
            .props(vec![ReceiveMaximum::new(1).unwrap().into()])
            .build()
            .unwrap();
        let decoded = GenericPacket::<u16>::decode(
            Version::V5_0,
            Bytes::from(connack.to_continuous_buffer()),
        )
        .unwrap();
        match decoded {
            GenericPacket::V5_0Connack(c) => {
                assert_eq!(c, connack);
                assert!(c.session_present());
                assert_eq!(c.props().receive_maximum(), Some(1));
            }
            other => panic!("unexpected packet: {other:?}"),
        }
    }

    #[test]
    fn connack_empty_props() {
        let connack = Connack::builder()
            .session_present(false)
            .reason_code(ConnectReasonCode::Success)
            .build()
            .unwrap();
        assert_eq!(
            connack.to_continuous_buffer(),
            [0x20, 0x03, 0x00, 0x00, 0x00]
        );
    }
}
