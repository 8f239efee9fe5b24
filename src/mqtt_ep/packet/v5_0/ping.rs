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

macro_rules! ping_packet {
    (
        $( #[$meta:meta] )*
        $Name:ident, $Builder:ident, $fixed:expr
    ) => {
        $( #[$meta] )*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $Name {
            wire: [u8; 2],
        }

        impl $Name {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self {
                    wire: [$fixed, 0x00],
                }
            }

            pub fn builder() -> $Builder {
                $Builder
            }

            pub(crate) fn parse(flags: u8, payload: Bytes) -> Result<Self, MqttError> {
                if flags != 0 || !payload.is_empty() {
                    return Err(MqttError::MalformedPacket);
                }
                Ok(Self::new())
            }
        }

        impl GenericPacketTrait for $Name {
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

        #[derive(Debug)]
        pub struct $Builder;

        impl $Builder {
            pub fn build(self) -> Result<$Name, MqttError> {
                Ok($Name::new())
            }
        }
    };
}

ping_packet!(
    /// MQTT 5.0 PINGREQ.
    Pingreq, PingreqBuilder, 0xc0
);
ping_packet!(
    /// MQTT 5.0 PINGRESP.
    Pingresp, PingrespBuilder, 0xd0
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_wire_bytes() {
        assert_eq!(Pingreq::new().to_continuous_buffer(), [0xc0, 0x00]);
        assert_eq!(
            Pingresp::builder().build().unwrap().to_continuous_buffer(),
            [0xd0, 0x00]
        );
    }
}
