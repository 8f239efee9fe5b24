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

//! Wire-format primitives shared by every packet kind.
//!
//! Fields are kept in wire-ready form so packets can hand out a gather list
//! of `IoSlice`s that borrows directly from their storage: a length-prefixed
//! string keeps its 2-byte prefix next to the validated UTF-8 bytes, a
//! variable-byte integer keeps its encoded bytes.

use std::io::IoSlice;

use bytes::{Buf, Bytes};
use bytestring::ByteString;

use crate::mqtt_ep::result_code::MqttError;

/// Largest value representable by a 4-byte variable-byte integer.
pub(crate) const VARIABLE_BYTE_INTEGER_MAX: u32 = 268_435_455;

pub(crate) fn decode_u8(src: &mut Bytes) -> Result<u8, MqttError> {
    if !src.has_remaining() {
        return Err(MqttError::MalformedPacket);
    }
    Ok(src.get_u8())
}

pub(crate) fn decode_u16(src: &mut Bytes) -> Result<u16, MqttError> {
    if src.remaining() < 2 {
        return Err(MqttError::MalformedPacket);
    }
    Ok(src.get_u16())
}

pub(crate) fn decode_u32(src: &mut Bytes) -> Result<u32, MqttError> {
    if src.remaining() < 4 {
        return Err(MqttError::MalformedPacket);
    }
    Ok(src.get_u32())
}

/// Variable-byte integer, stored in its encoded form (1 to 4 bytes).
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct VariableByteInteger {
    bytes: [u8; 4],
    len: u8,
}

impl VariableByteInteger {
    pub(crate) fn new(value: u32) -> Result<Self, MqttError> {
        if value > VARIABLE_BYTE_INTEGER_MAX {
            return Err(MqttError::MalformedPacket);
        }
        let mut bytes = [0u8; 4];
        let mut len = 0usize;
        let mut v = value;
        loop {
            let mut b = (v % 128) as u8;
            v /= 128;
            if v > 0 {
                b |= 0x80;
            }
            bytes[len] = b;
            len += 1;
            if v == 0 {
                break;
            }
        }
        Ok(Self {
            bytes,
            len: len as u8,
        })
    }

    /// Decode from a buffer. Fails with `malformed_packet` on a fifth
    /// continuation byte or on truncation.
    pub(crate) fn decode(src: &mut Bytes) -> Result<Self, MqttError> {
        let mut bytes = [0u8; 4];
        let mut len = 0usize;
        loop {
            if !src.has_remaining() {
                return Err(MqttError::MalformedPacket);
            }
            if len == 4 {
                return Err(MqttError::MalformedPacket);
            }
            let b = src.get_u8();
            bytes[len] = b;
            len += 1;
            if b & 0x80 == 0 {
                break;
            }
        }
        Ok(Self {
            bytes,
            len: len as u8,
        })
    }

    pub(crate) fn value(&self) -> u32 {
        let mut value = 0u32;
        let mut shift = 0u32;
        for b in &self.bytes[..self.len as usize] {
            value |= ((b & 0x7f) as u32) << shift;
            shift += 7;
        }
        value
    }

    pub(crate) fn size(&self) -> usize {
        self.len as usize
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

impl std::fmt::Debug for VariableByteInteger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VariableByteInteger({})", self.value())
    }
}

/// Length-prefixed MQTT UTF-8 string in wire form.
///
/// Construction validates UTF-8 and rejects U+0000; surrogates and overlong
/// sequences are already unrepresentable in a Rust string.
#[derive(Clone, PartialEq, Eq)]
pub struct MqttString {
    prefix: [u8; 2],
    s: ByteString,
}

impl MqttString {
    pub fn new(s: impl Into<ByteString>) -> Result<Self, MqttError> {
        let s = s.into();
        if s.len() > u16::MAX as usize {
            return Err(MqttError::MalformedPacket);
        }
        if s.contains('\u{0}') {
            return Err(MqttError::MalformedPacket);
        }
        Ok(Self {
            prefix: (s.len() as u16).to_be_bytes(),
            s,
        })
    }

    pub(crate) fn empty() -> Self {
        Self {
            prefix: [0, 0],
            s: ByteString::new(),
        }
    }

    pub(crate) fn decode(src: &mut Bytes) -> Result<Self, MqttError> {
        let len = decode_u16(src)? as usize;
        if src.remaining() < len {
            return Err(MqttError::MalformedPacket);
        }
        let raw = src.split_to(len);
        let s = ByteString::try_from(raw).map_err(|_| MqttError::MalformedPacket)?;
        if s.contains('\u{0}') {
            return Err(MqttError::MalformedPacket);
        }
        Ok(Self {
            prefix: (len as u16).to_be_bytes(),
            s,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.s
    }

    pub fn len(&self) -> usize {
        self.s.len()
    }

    pub fn is_empty(&self) -> bool {
        self.s.is_empty()
    }

    /// Wire size including the 2-byte length prefix.
    pub(crate) fn size(&self) -> usize {
        2 + self.s.len()
    }

    pub(crate) fn num_buffers(&self) -> usize {
        2
    }

    pub(crate) fn push_buffers<'a>(&'a self, out: &mut Vec<IoSlice<'a>>) {
        out.push(IoSlice::new(&self.prefix));
        out.push(IoSlice::new(self.s.as_bytes()));
    }

    pub(crate) fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.prefix);
        out.extend_from_slice(self.s.as_bytes());
    }
}

impl std::fmt::Debug for MqttString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

/// Length-prefixed binary blob in wire form.
#[derive(Clone, PartialEq, Eq)]
pub struct MqttBinary {
    prefix: [u8; 2],
    data: Bytes,
}

impl MqttBinary {
    pub fn new(data: impl Into<Bytes>) -> Result<Self, MqttError> {
        let data = data.into();
        if data.len() > u16::MAX as usize {
            return Err(MqttError::MalformedPacket);
        }
        Ok(Self {
            prefix: (data.len() as u16).to_be_bytes(),
            data,
        })
    }

    pub(crate) fn decode(src: &mut Bytes) -> Result<Self, MqttError> {
        let len = decode_u16(src)? as usize;
        if src.remaining() < len {
            return Err(MqttError::MalformedPacket);
        }
        let data = src.split_to(len);
        Ok(Self {
            prefix: (len as u16).to_be_bytes(),
            data,
        })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn size(&self) -> usize {
        2 + self.data.len()
    }

    pub(crate) fn num_buffers(&self) -> usize {
        2
    }

    pub(crate) fn push_buffers<'a>(&'a self, out: &mut Vec<IoSlice<'a>>) {
        out.push(IoSlice::new(&self.prefix));
        out.push(IoSlice::new(&self.data));
    }

    pub(crate) fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.prefix);
        out.extend_from_slice(&self.data);
    }
}

impl std::fmt::Debug for MqttBinary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MqttBinary(len={})", self.len())
    }
}

/// Topic name rules for PUBLISH: non-empty unless carried by a topic alias,
/// and wildcard characters are forbidden.
pub(crate) fn validate_topic_name(topic: &str) -> Result<(), MqttError> {
    if topic.contains(['#', '+']) {
        return Err(MqttError::TopicNameInvalid);
    }
    Ok(())
}

/// Topic filter rules for SUBSCRIBE/UNSUBSCRIBE: `#` only as the final
/// level, `+` only as a whole level.
pub(crate) fn validate_topic_filter(filter: &str) -> Result<(), MqttError> {
    if filter.is_empty() {
        return Err(MqttError::TopicFilterInvalid);
    }
    let levels: Vec<&str> = filter.split('/').collect();
    for (idx, level) in levels.iter().enumerate() {
        if level.contains('#') {
            if *level != "#" || idx != levels.len() - 1 {
                return Err(MqttError::TopicFilterInvalid);
            }
        }
        if level.contains('+') && *level != "+" {
            return Err(MqttError::TopicFilterInvalid);
        }
    }
    Ok(())
}
