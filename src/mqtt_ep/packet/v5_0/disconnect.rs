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
use crate::mqtt_ep::result_code::{DisconnectReasonCode, MqttError};

/// MQTT 5.0 DISCONNECT.
///
/// The shortest form (remaining length 0) reads as NormalDisconnection with
/// no properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnect {
    fixed_header: [u8; 1],
    remaining_length: VariableByteInteger,
    reason_code_buf: Option<[u8; 1]>,
    props: Option<Properties>,
}

impl Disconnect {
    pub fn builder() -> DisconnectBuilder {
        DisconnectBuilder::default()
    }

    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            fixed_header: [0xe0],
            remaining_length: VariableByteInteger::new(0).expect("zero fits in one byte"),
            reason_code_buf: None,
            props: None,
        }
    }

    pub fn reason_code(&self) -> DisconnectReasonCode {
        self.reason_code_buf
            .map(|b| DisconnectReasonCode::try_from(b[0]).expect("validated on construction"))
            .unwrap_or(DisconnectReasonCode::NormalDisconnection)
    }

    pub fn props(&self) -> Option<&Properties> {
        self.props.as_ref()
    }

    pub(crate) fn parse(flags: u8, mut payload: Bytes) -> Result<Self, MqttError> {
        if flags != 0 {
            return Err(MqttError::MalformedPacket);
        }
        let reason_code = if payload.has_remaining() {
            Some(DisconnectReasonCode::try_from(payload.get_u8())?)
        } else {
            None
        };
        let props = if payload.has_remaining() {
            Some(Properties::decode(&mut payload, PropertyLocation::Disconnect)?)
        } else {
            None
        };
        if payload.has_remaining() {
            return Err(MqttError::MalformedPacket);
        }
        Self::assemble(reason_code, props)
    }

    fn assemble(
        reason_code: Option<DisconnectReasonCode>,
        props: Option<Properties>,
    ) -> Result<Self, MqttError> {
        let reason_code = match (&props, reason_code) {
            (Some(_), None) => Some(DisconnectReasonCode::NormalDisconnection),
            (_, rc) => rc,
        };
        let remaining =
            usize::from(reason_code.is_some()) + props.as_ref().map_or(0, Properties::size);
        Ok(Self {
            fixed_header: [0xe0],
            remaining_length: VariableByteInteger::new(remaining as u32)?,
            reason_code_buf: reason_code.map(|rc| [rc.to_u8()]),
            props,
        })
    }
}

impl GenericPacketTrait for Disconnect {
    fn size(&self) -> usize {
        1 + self.remaining_length.size() + self.remaining_length.value() as usize
    }

    fn num_of_const_buffer_sequence(&self) -> usize {
        2 + usize::from(self.reason_code_buf.is_some())
            + self.props.as_ref().map_or(0, Properties::num_buffers)
    }

    fn to_buffers(&self) -> Vec<IoSlice<'_>> {
        let mut out = Vec::with_capacity(self.num_of_const_buffer_sequence());
        out.push(IoSlice::new(&self.fixed_header));
        out.push(IoSlice::new(self.remaining_length.as_slice()));
        if let Some(rc) = &self.reason_code_buf {
            out.push(IoSlice::new(rc));
        }
        if let Some(props) = &self.props {
            props.push_buffers(&mut out);
        }
        out
    }
}

/// Builder for [`Disconnect`].
#[derive(Debug, Default)]
pub struct DisconnectBuilder {
    reason_code: Option<DisconnectReasonCode>,
    props: Option<Vec<Property>>,
}

impl DisconnectBuilder {
    pub fn reason_code(mut self, reason_code: DisconnectReasonCode) -> Self {
        self.reason_code = Some(reason_code);
        self
    }

    pub fn props(mut self, props: impl Into<Vec<Property>>) -> Self {
        self.props = Some(props.into());
        self
    }

    pub fn build(self) -> Result<Disconnect, MqttError> {
        let props = self
            .props
            .map(|p| Properties::new(p, PropertyLocation::Disconnect))
            .transpose()?;
        Disconnect::assemble(self.reason_code, props)
    }
}
