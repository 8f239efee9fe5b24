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

use crate::mqtt_ep::packet::codec::{MqttBinary, MqttString, VariableByteInteger};
use crate::mqtt_ep::packet::{GenericPacketTrait, Qos, Will};
use crate::mqtt_ep::result_code::MqttError;

const FIXED_HEADER: u8 = 0x10;
// protocol name "MQTT" with its length prefix, followed by level 4
const PROTOCOL_HEADER: [u8; 7] = [0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04];

const FLAG_CLEAN_SESSION: u8 = 0b0000_0010;
const FLAG_WILL: u8 = 0b0000_0100;
const FLAG_WILL_RETAIN: u8 = 0b0010_0000;
const FLAG_PASSWORD: u8 = 0b0100_0000;
const FLAG_USER_NAME: u8 = 0b1000_0000;

/// MQTT 3.1.1 CONNECT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connect {
    fixed_header: [u8; 1],
    remaining_length: VariableByteInteger,
    protocol_header: [u8; 7],
    connect_flags: [u8; 1],
    keep_alive_buf: [u8; 2],
    client_id: MqttString,
    will: Option<Will>,
    user_name: Option<MqttString>,
    password: Option<MqttBinary>,
}

impl Connect {
    pub fn builder() -> ConnectBuilder {
        ConnectBuilder::default()
    }

    pub fn client_id(&self) -> &str {
        self.client_id.as_str()
    }

    pub fn clean_session(&self) -> bool {
        self.connect_flags[0] & FLAG_CLEAN_SESSION != 0
    }

    pub fn keep_alive(&self) -> u16 {
        u16::from_be_bytes(self.keep_alive_buf)
    }

    pub fn will(&self) -> Option<&Will> {
        self.will.as_ref()
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user_name.as_ref().map(MqttString::as_str)
    }

    pub fn password(&self) -> Option<&[u8]> {
        self.password.as_ref().map(MqttBinary::as_slice)
    }

    pub(crate) fn parse(flags: u8, mut payload: Bytes) -> Result<Self, MqttError> {
        if flags != 0 {
            return Err(MqttError::MalformedPacket);
        }
        if payload.remaining() < PROTOCOL_HEADER.len() {
            return Err(MqttError::MalformedPacket);
        }
        let mut protocol_header = [0u8; 7];
        payload.copy_to_slice(&mut protocol_header);
        if protocol_header != PROTOCOL_HEADER {
            return Err(MqttError::MalformedPacket);
        }
        if !payload.has_remaining() {
            return Err(MqttError::MalformedPacket);
        }
        let connect_flags = payload.get_u8();
        if connect_flags & 0x01 != 0 {
            // reserved bit must be zero
            return Err(MqttError::MalformedPacket);
        }
        if payload.remaining() < 2 {
            return Err(MqttError::MalformedPacket);
        }
        let keep_alive = payload.get_u16();
        let client_id = MqttString::decode(&mut payload)?;

        let will = if connect_flags & FLAG_WILL != 0 {
            let topic = MqttString::decode(&mut payload)?;
            let message = MqttBinary::decode(&mut payload)?;
            let qos = Qos::try_from((connect_flags >> 3) & 0b11)?;
            let retain = connect_flags & FLAG_WILL_RETAIN != 0;
            Some(Will::from_parts(
                topic,
                message,
                qos,
                retain,
                crate::mqtt_ep::packet::Properties::empty(),
            )?)
        } else {
            if (connect_flags >> 3) & 0b11 != 0 || connect_flags & FLAG_WILL_RETAIN != 0 {
                return Err(MqttError::MalformedPacket);
            }
            None
        };

        let user_name = if connect_flags & FLAG_USER_NAME != 0 {
            Some(MqttString::decode(&mut payload)?)
        } else {
            None
        };
        let password = if connect_flags & FLAG_PASSWORD != 0 {
            Some(MqttBinary::decode(&mut payload)?)
        } else {
            None
        };
        if payload.has_remaining() {
            return Err(MqttError::MalformedPacket);
        }

        Self::assemble(
            client_id,
            connect_flags & FLAG_CLEAN_SESSION != 0,
            keep_alive,
            will,
            user_name,
            password,
        )
    }

    fn assemble(
        client_id: MqttString,
        clean_session: bool,
        keep_alive: u16,
        will: Option<Will>,
        user_name: Option<MqttString>,
        password: Option<MqttBinary>,
    ) -> Result<Self, MqttError> {
        if let Some(w) = &will {
            if !w.props().is_empty() {
                // will properties are an MQTT 5.0 feature
                return Err(MqttError::InvalidArgument);
            }
        }
        let mut connect_flags = 0u8;
        if clean_session {
            connect_flags |= FLAG_CLEAN_SESSION;
        }
        if let Some(w) = &will {
            connect_flags |= FLAG_WILL;
            connect_flags |= w.qos().to_u8() << 3;
            if w.retain() {
                connect_flags |= FLAG_WILL_RETAIN;
            }
        }
        if user_name.is_some() {
            connect_flags |= FLAG_USER_NAME;
        }
        if password.is_some() {
            connect_flags |= FLAG_PASSWORD;
        }

        let mut remaining = PROTOCOL_HEADER.len() + 1 + 2 + client_id.size();
        if let Some(w) = &will {
            remaining += w.topic_string().size() + w.message_binary().size();
        }
        if let Some(u) = &user_name {
            remaining += u.size();
        }
        if let Some(p) = &password {
            remaining += p.size();
        }

        Ok(Self {
            fixed_header: [FIXED_HEADER],
            remaining_length: VariableByteInteger::new(remaining as u32)?,
            protocol_header: PROTOCOL_HEADER,
            connect_flags: [connect_flags],
            keep_alive_buf: keep_alive.to_be_bytes(),
            client_id,
            will,
            user_name,
            password,
        })
    }
}

impl GenericPacketTrait for Connect {
    fn size(&self) -> usize {
        1 + self.remaining_length.size() + self.remaining_length.value() as usize
    }

    fn num_of_const_buffer_sequence(&self) -> usize {
        5 + self.client_id.num_buffers()
            + self.will.as_ref().map_or(0, |w| {
                w.topic_string().num_buffers() + w.message_binary().num_buffers()
            })
            + self.user_name.as_ref().map_or(0, MqttString::num_buffers)
            + self.password.as_ref().map_or(0, MqttBinary::num_buffers)
    }

    fn to_buffers(&self) -> Vec<IoSlice<'_>> {
        let mut out = Vec::with_capacity(self.num_of_const_buffer_sequence());
        out.push(IoSlice::new(&self.fixed_header));
        out.push(IoSlice::new(self.remaining_length.as_slice()));
        out.push(IoSlice::new(&self.protocol_header));
        out.push(IoSlice::new(&self.connect_flags));
        out.push(IoSlice::new(&self.keep_alive_buf));
        self.client_id.push_buffers(&mut out);
        if let Some(w) = &self.will {
            w.topic_string().push_buffers(&mut out);
            w.message_binary().push_buffers(&mut out);
        }
        if let Some(u) = &self.user_name {
            u.push_buffers(&mut out);
        }
        if let Some(p) = &self.password {
            p.push_buffers(&mut out);
        }
        out
    }
}

/// Builder for [`Connect`].
#[derive(Debug, Default)]
pub struct ConnectBuilder {
    client_id: Option<MqttString>,
    clean_session: bool,
    keep_alive: u16,
    will: Option<Will>,
    user_name: Option<MqttString>,
    password: Option<MqttBinary>,
}

impl ConnectBuilder {
    pub fn client_id(mut self, client_id: impl AsRef<str>) -> Result<Self, MqttError> {
        self.client_id = Some(MqttString::new(client_id.as_ref().to_owned())?);
        Ok(self)
    }

    pub fn clean_session(mut self, clean_session: bool) -> Self {
        self.clean_session = clean_session;
        self
    }

    pub fn keep_alive(mut self, keep_alive: u16) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn will(mut self, will: Will) -> Self {
        self.will = Some(will);
        self
    }

    pub fn user_name(mut self, user_name: impl AsRef<str>) -> Result<Self, MqttError> {
        self.user_name = Some(MqttString::new(user_name.as_ref().to_owned())?);
        Ok(self)
    }

    pub fn password(mut self, password: impl Into<Bytes>) -> Result<Self, MqttError> {
        self.password = Some(MqttBinary::new(password)?);
        Ok(self)
    }

    pub fn build(self) -> Result<Connect, MqttError> {
        let client_id = self.client_id.ok_or(MqttError::InvalidArgument)?;
        if client_id.is_empty() && !self.clean_session {
            // a zero-length client id requires a clean session
            return Err(MqttError::InvalidArgument);
        }
        Connect::assemble(
            client_id,
            self.clean_session,
            self.keep_alive,
            self.will,
            self.user_name,
            self.password,
        )
    }
}
