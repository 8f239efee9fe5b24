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
use crate::mqtt_ep::packet::GenericPacketTrait;
use crate::mqtt_ep::result_code::{ConnectReturnCode, MqttError};

const FIXED_HEADER: u8 = 0x20;

/// MQTT 3.1.1 CONNACK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connack {
    fixed_header: [u8; 1],
    remaining_length: VariableByteInteger,
    // acknowledge flags byte followed by the return code byte
    variable: [u8; 2],
}

impl Connack {
    pub fn builder() -> ConnackBuilder {
        ConnackBuilder::default()
    }

    pub fn session_present(&self) -> bool {
        self.variable[0] & 0x01 != 0
    }

    pub fn return_code(&self) -> ConnectReturnCode {
        ConnectReturnCode::try_from(self.variable[1]).expect("validated on construction")
    }

    pub(crate) fn parse(flags: u8, mut payload: Bytes) -> Result<Self, MqttError> {
        if flags != 0 {
            return Err(MqttError::MalformedPacket);
        }
        if payload.remaining() != 2 {
            return Err(MqttError::MalformedPacket);
        }
        let ack_flags = payload.get_u8();
        if ack_flags & 0b1111_1110 != 0 {
            return Err(MqttError::MalformedPacket);
        }
        let return_code = ConnectReturnCode::try_from(payload.get_u8())?;
        Ok(Self::assemble(ack_flags & 0x01 != 0, return_code))
    }

    fn assemble(session_present: bool, return_code: ConnectReturnCode) -> Self {
        Self {
            fixed_header: [FIXED_HEADER],
            remaining_length: VariableByteInteger::new(2).expect("two fits in one byte"),
            variable: [session_present as u8, return_code.to_u8()],
        }
    }
}

impl GenericPacketTrait for Connack {
    fn size(&self) -> usize {
        4
    }

    fn num_of_const_buffer_sequence(&self) -> usize {
        3
    }

    fn to_buffers(&self) -> Vec<IoSlice<'_>> {
        vec![
            IoSlice::new(&self.fixed_header),
            IoSlice::new(self.remaining_length.as_slice()),
            IoSlice::new(&self.variable),
        ]
    }
}

/// Builder for [`Connack`].
#[derive(Debug, Default)]
pub struct ConnackBuilder {
    session_present: bool,
    return_code: Option<ConnectReturnCode>,
}

impl ConnackBuilder {
    pub fn session_present(mut self, session_present: bool) -> Self {
        self.session_present = session_present;
        self
    }

    pub fn return_code(mut self, return_code: ConnectReturnCode) -> Self {
        self.return_code = Some(return_code);
        self
    }

    pub fn build(self) -> Result<Connack, MqttError> {
        let return_code = self.return_code.ok_or(MqttError::InvalidArgument)?;
        if self.session_present && !return_code.is_success() {
            // a refused connection never resumes a session
            return Err(MqttError::InvalidArgument);
        }
        Ok(Connack::assemble(self.session_present, return_code))
    }
}
