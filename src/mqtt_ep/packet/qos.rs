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

//! Quality of service, subscription options, and the PUBLISH payload type.

use std::io::IoSlice;

use bytes::Bytes;

use crate::mqtt_ep::packet::codec::{validate_topic_filter, MqttString};
use crate::mqtt_ep::result_code::MqttError;

/// Delivery guarantee of a PUBLISH exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Qos {
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl Qos {
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Qos {
    type Error = MqttError;
    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Qos::AtMostOnce),
            1 => Ok(Qos::AtLeastOnce),
            2 => Ok(Qos::ExactlyOnce),
            _ => Err(MqttError::MalformedPacket),
        }
    }
}

/// v5 retain handling of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RetainHandling {
    SendRetained = 0,
    SendRetainedIfNotExists = 1,
    DoNotSendRetained = 2,
}

/// Subscription option byte.
///
/// v3.1.1 uses only the QoS bits; the no-local, retain-as-published, and
/// retain-handling bits are v5. Bits 6-7 are reserved and must be zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubOpts {
    bits: u8,
}

impl SubOpts {
    pub fn new() -> Self {
        Self { bits: 0 }
    }

    pub fn set_qos(mut self, qos: Qos) -> Self {
        self.bits = (self.bits & !0b0000_0011) | qos.to_u8();
        self
    }

    pub fn set_nl(mut self, nl: bool) -> Self {
        self.bits = (self.bits & !0b0000_0100) | ((nl as u8) << 2);
        self
    }

    pub fn set_rap(mut self, rap: bool) -> Self {
        self.bits = (self.bits & !0b0000_1000) | ((rap as u8) << 3);
        self
    }

    pub fn set_retain_handling(mut self, rh: RetainHandling) -> Self {
        self.bits = (self.bits & !0b0011_0000) | ((rh as u8) << 4);
        self
    }

    pub fn qos(&self) -> Qos {
        Qos::try_from(self.bits & 0b0000_0011).expect("two bits cannot exceed three")
    }

    pub fn nl(&self) -> bool {
        self.bits & 0b0000_0100 != 0
    }

    pub fn rap(&self) -> bool {
        self.bits & 0b0000_1000 != 0
    }

    pub fn retain_handling(&self) -> RetainHandling {
        match (self.bits >> 4) & 0b11 {
            0 => RetainHandling::SendRetained,
            1 => RetainHandling::SendRetainedIfNotExists,
            _ => RetainHandling::DoNotSendRetained,
        }
    }

    pub(crate) fn to_u8(self) -> u8 {
        self.bits
    }

    pub(crate) fn from_u8(bits: u8) -> Result<Self, MqttError> {
        if bits & 0b1100_0000 != 0 {
            return Err(MqttError::ProtocolError);
        }
        if bits & 0b0000_0011 == 0b11 {
            return Err(MqttError::ProtocolError);
        }
        if (bits >> 4) & 0b11 == 0b11 {
            return Err(MqttError::ProtocolError);
        }
        Ok(Self { bits })
    }
}

/// One SUBSCRIBE entry: topic filter plus options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubEntry {
    topic_filter: MqttString,
    opts: SubOpts,
}

impl SubEntry {
    pub fn new(topic_filter: impl AsRef<str>, opts: SubOpts) -> Result<Self, MqttError> {
        let topic_filter = topic_filter.as_ref();
        validate_topic_filter(topic_filter)?;
        Ok(Self {
            topic_filter: MqttString::new(topic_filter.to_owned())?,
            opts,
        })
    }

    pub(crate) fn from_parts(topic_filter: MqttString, opts: SubOpts) -> Result<Self, MqttError> {
        validate_topic_filter(topic_filter.as_str())?;
        Ok(Self { topic_filter, opts })
    }

    pub fn topic_filter(&self) -> &str {
        self.topic_filter.as_str()
    }

    pub fn opts(&self) -> SubOpts {
        self.opts
    }

    pub(crate) fn topic(&self) -> &MqttString {
        &self.topic_filter
    }
}

/// PUBLISH application payload.
///
/// Sent payloads keep the caller's chunking and are transmitted as-is in the
/// gather list; a decoded payload is always a single contiguous buffer.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Payload {
    chunks: Vec<Bytes>,
    // populated only when there is more than one chunk, so as_slice()
    // always has a contiguous view to hand out
    joined: Option<Bytes>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_chunks(chunks: Vec<Bytes>) -> Self {
        let chunks: Vec<Bytes> = chunks.into_iter().filter(|c| !c.is_empty()).collect();
        let joined = if chunks.len() > 1 {
            let mut all = Vec::with_capacity(chunks.iter().map(Bytes::len).sum());
            for c in &chunks {
                all.extend_from_slice(c);
            }
            Some(Bytes::from(all))
        } else {
            None
        };
        Self { chunks, joined }
    }

    pub fn len(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Contiguous view of the payload bytes.
    pub fn as_slice(&self) -> &[u8] {
        if let Some(joined) = &self.joined {
            joined
        } else if let Some(first) = self.chunks.first() {
            first
        } else {
            &[]
        }
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }

    pub(crate) fn num_buffers(&self) -> usize {
        self.chunks.len()
    }

    pub(crate) fn push_buffers<'a>(&'a self, out: &mut Vec<IoSlice<'a>>) {
        for c in &self.chunks {
            out.push(IoSlice::new(c));
        }
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Payload(len={})", self.len())
    }
}

impl From<Bytes> for Payload {
    fn from(b: Bytes) -> Self {
        Payload::from_chunks(vec![b])
    }
}

impl From<Vec<u8>> for Payload {
    fn from(v: Vec<u8>) -> Self {
        Payload::from_chunks(vec![Bytes::from(v)])
    }
}

impl From<&[u8]> for Payload {
    fn from(v: &[u8]) -> Self {
        Payload::from_chunks(vec![Bytes::copy_from_slice(v)])
    }
}

impl<const N: usize> From<&[u8; N]> for Payload {
    fn from(v: &[u8; N]) -> Self {
        Payload::from_chunks(vec![Bytes::copy_from_slice(v)])
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::from_chunks(vec![Bytes::copy_from_slice(s.as_bytes())])
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::from_chunks(vec![Bytes::from(s.into_bytes())])
    }
}

impl From<Vec<Bytes>> for Payload {
    fn from(chunks: Vec<Bytes>) -> Self {
        Payload::from_chunks(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_opts_bits() {
        let opts = SubOpts::new()
            .set_qos(Qos::AtLeastOnce)
            .set_nl(true)
            .set_retain_handling(RetainHandling::DoNotSendRetained);
        assert_eq!(opts.qos(), Qos::AtLeastOnce);
        assert!(opts.nl());
        assert!(!opts.rap());
        assert_eq!(opts.retain_handling(), RetainHandling::DoNotSendRetained);

        // reserved bits must be zero
        assert!(SubOpts::from_u8(0b0100_0000).is_err());
        // qos 3 invalid
        assert!(SubOpts::from_u8(0b0000_0011).is_err());
    }

    #[test]
    fn payload_chunking() {
        let p = Payload::from_chunks(vec![Bytes::from_static(b"ab"), Bytes::from_static(b"cd")]);
        assert_eq!(p.len(), 4);
        assert_eq!(p.as_slice(), b"abcd");
        assert_eq!(p.num_buffers(), 2);

        let single: Payload = "p1".into();
        assert_eq!(single.as_slice(), b"p1");
        assert_eq!(single.num_buffers(), 1);

        let empty = Payload::new();
        assert!(empty.is_empty());
        assert_eq!(empty.as_slice(), b"");
    }

    #[test]
    fn sub_entry_validates_filter() {
        assert!(SubEntry::new("a/+/b", SubOpts::new()).is_ok());
        assert!(SubEntry::new("a/#/b", SubOpts::new()).is_err());
    }
}
