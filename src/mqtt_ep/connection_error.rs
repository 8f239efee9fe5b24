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

use crate::mqtt_ep::result_code::MqttError;
use crate::mqtt_ep::transport::TransportError;

/// Unified error for endpoint and client operations.
///
/// Protocol-level failures surface as [`ConnectionError::Mqtt`], transport
/// and I/O failures as [`ConnectionError::Transport`]; the remaining
/// variants report endpoint state (not attached, already attached) and the
/// internal channel to the event-loop task going away.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// MQTT protocol-level error.
    #[error("MQTT protocol error: {0}")]
    Mqtt(#[from] MqttError),

    /// I/O or transport-level error.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The endpoint's event-loop task is gone.
    #[error("Internal channel closed")]
    ChannelClosed,

    /// The operation requires an attached transport.
    #[error("Not connected")]
    NotConnected,

    /// A transport is already attached.
    #[error("Already connected")]
    AlreadyConnected,

    /// The connection is already closed.
    #[error("Already disconnected")]
    AlreadyDisconnected,
}
