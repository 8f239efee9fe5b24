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

use bytes::Bytes;

use crate::mqtt_ep::packet::codec::{validate_topic_name, MqttBinary, MqttString};
use crate::mqtt_ep::packet::property::Properties;
use crate::mqtt_ep::packet::qos::Qos;
use crate::mqtt_ep::result_code::MqttError;

/// Will message carried inside CONNECT.
///
/// The `props` block (will-delay, payload-format, …) is MQTT 5.0 only; the
/// v3.1.1 CONNECT builder rejects a will that carries properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Will {
    topic: MqttString,
    message: MqttBinary,
    qos: Qos,
    retain: bool,
    props: Properties,
}

impl Will {
    pub fn new(
        topic: impl AsRef<str>,
        message: impl Into<Bytes>,
        qos: Qos,
        retain: bool,
    ) -> Result<Self, MqttError> {
        let topic = topic.as_ref();
        if topic.is_empty() {
            return Err(MqttError::TopicNameInvalid);
        }
        validate_topic_name(topic)?;
        Ok(Self {
            topic: MqttString::new(topic.to_owned())?,
            message: MqttBinary::new(message)?,
            qos,
            retain,
            props: Properties::empty(),
        })
    }

    pub fn with_props(mut self, props: Properties) -> Self {
        self.props = props;
        self
    }

    pub fn topic(&self) -> &str {
        self.topic.as_str()
    }

    pub fn message(&self) -> &[u8] {
        self.message.as_slice()
    }

    pub fn qos(&self) -> Qos {
        self.qos
    }

    pub fn retain(&self) -> bool {
        self.retain
    }

    pub fn props(&self) -> &Properties {
        &self.props
    }

    pub(crate) fn topic_string(&self) -> &MqttString {
        &self.topic
    }

    pub(crate) fn message_binary(&self) -> &MqttBinary {
        &self.message
    }

    pub(crate) fn from_parts(
        topic: MqttString,
        message: MqttBinary,
        qos: Qos,
        retain: bool,
        props: Properties,
    ) -> Result<Self, MqttError> {
        validate_topic_name(topic.as_str())?;
        Ok(Self {
            topic,
            message,
            qos,
            retain,
            props,
        })
    }
}
