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

use bytes::Bytes;

use crate::mqtt_ep::packet::GenericPacketTrait;
use crate::mqtt_ep::result_code::MqttError;

/// MQTT 3.1.1 DISCONNECT. Carries no body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disconnect {
    wire: [u8; 2],
}

impl Disconnect {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self { wire: [0xe0, 0x00] }
    }

    pub fn builder() -> DisconnectBuilder {
        DisconnectBuilder
    }

    pub(crate) fn parse(flags: u8, payload: Bytes) -> Result<Self, MqttError> {
        if flags != 0 || !payload.is_empty() {
            return Err(MqttError::MalformedPacket);
        }
        Ok(Self::new())
    }
}

impl GenericPacketTrait for Disconnect {
    fn size(&self) -> usize {
        2
    }

    fn num_of_const_buffer_sequence(&self) -> usize {
        1
    }

    fn to_buffers(&self) -> Vec<IoSlice<'_>> {
        vec![IoSlice::new(&self.wire)]
    }
}

/// Builder for [`Disconnect`], for symmetry with the v5 packet.
#[derive(Debug)]
pub struct DisconnectBuilder;

impl DisconnectBuilder {
    pub fn build(self) -> Result<Disconnect, MqttError> {
        Ok(Disconnect::new())
    }
}
