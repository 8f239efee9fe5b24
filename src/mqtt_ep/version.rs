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

/// MQTT protocol version.
///
/// A server-role endpoint may start out `Undetermined`; the version is fixed
/// by the first CONNECT packet observed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    /// Version not yet negotiated (server side before CONNECT).
    Undetermined,
    /// MQTT 3.1.1 (protocol level 4).
    V3_1_1,
    /// MQTT 5.0 (protocol level 5).
    V5_0,
}

impl Version {
    /// Protocol level byte carried in the CONNECT variable header.
    pub fn protocol_level(&self) -> Option<u8> {
        match self {
            Version::Undetermined => None,
            Version::V3_1_1 => Some(4),
            Version::V5_0 => Some(5),
        }
    }

    pub fn from_protocol_level(level: u8) -> Option<Version> {
        match level {
            4 => Some(Version::V3_1_1),
            5 => Some(Version::V5_0),
            _ => None,
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Version::Undetermined => write!(f, "undetermined"),
            Version::V3_1_1 => write!(f, "v3.1.1"),
            Version::V5_0 => write!(f, "v5.0"),
        }
    }
}
