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

//! MQTT 5.0 properties.
//!
//! Each property is a small value type convertible into [`Property`]; a
//! packet carries a [`Properties`] list that validates which property ids
//! are legal for that packet kind and encodes the whole block once, so the
//! packet's gather list stays two slices (length prefix + block) regardless
//! of how many properties it holds.

use std::io::IoSlice;

use bytes::{Buf, Bytes};
use bytestring::ByteString;

use crate::mqtt_ep::packet::codec::{
    decode_u16, decode_u32, decode_u8, MqttBinary, MqttString, VariableByteInteger,
};
use crate::mqtt_ep::result_code::MqttError;

/// Property identifier bytes from the MQTT 5.0 table.
pub(crate) mod property_id {
    pub const PAYLOAD_FORMAT_INDICATOR: u8 = 0x01;
    pub const MESSAGE_EXPIRY_INTERVAL: u8 = 0x02;
    pub const CONTENT_TYPE: u8 = 0x03;
    pub const RESPONSE_TOPIC: u8 = 0x08;
    pub const CORRELATION_DATA: u8 = 0x09;
    pub const SUBSCRIPTION_IDENTIFIER: u8 = 0x0B;
    pub const SESSION_EXPIRY_INTERVAL: u8 = 0x11;
    pub const ASSIGNED_CLIENT_IDENTIFIER: u8 = 0x12;
    pub const SERVER_KEEP_ALIVE: u8 = 0x13;
    pub const AUTHENTICATION_METHOD: u8 = 0x15;
    pub const AUTHENTICATION_DATA: u8 = 0x16;
    pub const REQUEST_PROBLEM_INFORMATION: u8 = 0x17;
    pub const WILL_DELAY_INTERVAL: u8 = 0x18;
    pub const REQUEST_RESPONSE_INFORMATION: u8 = 0x19;
    pub const RESPONSE_INFORMATION: u8 = 0x1A;
    pub const SERVER_REFERENCE: u8 = 0x1C;
    pub const REASON_STRING: u8 = 0x1F;
    pub const RECEIVE_MAXIMUM: u8 = 0x21;
    pub const TOPIC_ALIAS_MAXIMUM: u8 = 0x22;
    pub const TOPIC_ALIAS: u8 = 0x23;
    pub const MAXIMUM_QOS: u8 = 0x24;
    pub const RETAIN_AVAILABLE: u8 = 0x25;
    pub const USER_PROPERTY: u8 = 0x26;
    pub const MAXIMUM_PACKET_SIZE: u8 = 0x27;
    pub const WILDCARD_SUBSCRIPTION_AVAILABLE: u8 = 0x28;
    pub const SUBSCRIPTION_IDENTIFIER_AVAILABLE: u8 = 0x29;
    pub const SHARED_SUBSCRIPTION_AVAILABLE: u8 = 0x2A;
}

use property_id as pid;

/// Which packet (or the will block) a property list belongs to. Drives the
/// legality table on construction and decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PropertyLocation {
    Connect,
    Will,
    Connack,
    Publish,
    Puback,
    Pubrec,
    Pubrel,
    Pubcomp,
    Subscribe,
    Suback,
    Unsubscribe,
    Unsuback,
    Disconnect,
    Auth,
}

macro_rules! scalar_property {
    (
        $( #[$meta:meta] )*
        $Name:ident, $ty:ty, $validate:expr
    ) => {
        $( #[$meta] )*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $Name {
            value: $ty,
        }

        impl $Name {
            pub fn new(value: $ty) -> Result<Self, MqttError> {
                let ok: fn($ty) -> bool = $validate;
                if !ok(value) {
                    return Err(MqttError::ProtocolError);
                }
                Ok(Self { value })
            }

            pub fn val(&self) -> $ty {
                self.value
            }
        }

        impl From<$Name> for Property {
            fn from(p: $Name) -> Property {
                Property::$Name(p)
            }
        }
    };
}

macro_rules! string_property {
    ( $( #[$meta:meta] )* $Name:ident ) => {
        $( #[$meta] )*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $Name {
            value: MqttString,
        }

        impl $Name {
            pub fn new(value: impl Into<ByteString>) -> Result<Self, MqttError> {
                Ok(Self {
                    value: MqttString::new(value)?,
                })
            }

            pub fn val(&self) -> &str {
                self.value.as_str()
            }
        }

        impl From<$Name> for Property {
            fn from(p: $Name) -> Property {
                Property::$Name(p)
            }
        }
    };
}

macro_rules! binary_property {
    ( $( #[$meta:meta] )* $Name:ident ) => {
        $( #[$meta] )*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $Name {
            value: MqttBinary,
        }

        impl $Name {
            pub fn new(value: impl Into<Bytes>) -> Result<Self, MqttError> {
                Ok(Self {
                    value: MqttBinary::new(value)?,
                })
            }

            pub fn val(&self) -> &[u8] {
                self.value.as_slice()
            }
        }

        impl From<$Name> for Property {
            fn from(p: $Name) -> Property {
                Property::$Name(p)
            }
        }
    };
}

scalar_property!(
    /// Payload format: 0 unspecified bytes, 1 UTF-8.
    PayloadFormatIndicator, u8, |v| v <= 1
);
scalar_property!(MessageExpiryInterval, u32, |_| true);
scalar_property!(SessionExpiryInterval, u32, |_| true);
scalar_property!(ServerKeepAlive, u16, |_| true);
scalar_property!(RequestProblemInformation, u8, |v| v <= 1);
scalar_property!(WillDelayInterval, u32, |_| true);
scalar_property!(RequestResponseInformation, u8, |v| v <= 1);
scalar_property!(
    /// Flow-control quota; zero is a protocol error.
    ReceiveMaximum, u16, |v| v != 0
);
scalar_property!(TopicAliasMaximum, u16, |_| true);
scalar_property!(
    /// Alias values are 1-based.
    TopicAlias, u16, |v| v != 0
);
scalar_property!(MaximumQos, u8, |v| v <= 1);
scalar_property!(RetainAvailable, u8, |v| v <= 1);
scalar_property!(MaximumPacketSize, u32, |v| v != 0);
scalar_property!(WildcardSubscriptionAvailable, u8, |v| v <= 1);
scalar_property!(SubscriptionIdentifierAvailable, u8, |v| v <= 1);
scalar_property!(SharedSubscriptionAvailable, u8, |v| v <= 1);

string_property!(ContentType);
string_property!(ResponseTopic);
string_property!(AssignedClientIdentifier);
string_property!(AuthenticationMethod);
string_property!(ResponseInformation);
string_property!(ServerReference);
string_property!(ReasonString);

binary_property!(CorrelationData);
binary_property!(AuthenticationData);

/// Subscription identifier, carried as a variable-byte integer (1..=268435455).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionIdentifier {
    value: VariableByteInteger,
}

impl SubscriptionIdentifier {
    pub fn new(value: u32) -> Result<Self, MqttError> {
        if value == 0 {
            return Err(MqttError::ProtocolError);
        }
        Ok(Self {
            value: VariableByteInteger::new(value)?,
        })
    }

    pub fn val(&self) -> u32 {
        self.value.value()
    }
}

impl From<SubscriptionIdentifier> for Property {
    fn from(p: SubscriptionIdentifier) -> Property {
        Property::SubscriptionIdentifier(p)
    }
}

/// Key/value pair; the only property allowed to repeat everywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProperty {
    key: MqttString,
    value: MqttString,
}

impl UserProperty {
    pub fn new(
        key: impl Into<ByteString>,
        value: impl Into<ByteString>,
    ) -> Result<Self, MqttError> {
        Ok(Self {
            key: MqttString::new(key)?,
            value: MqttString::new(value)?,
        })
    }

    pub fn key(&self) -> &str {
        self.key.as_str()
    }

    pub fn val(&self) -> &str {
        self.value.as_str()
    }
}

impl From<UserProperty> for Property {
    fn from(p: UserProperty) -> Property {
        Property::UserProperty(p)
    }
}

/// Tagged union over every MQTT 5.0 property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Property {
    PayloadFormatIndicator(PayloadFormatIndicator),
    MessageExpiryInterval(MessageExpiryInterval),
    ContentType(ContentType),
    ResponseTopic(ResponseTopic),
    CorrelationData(CorrelationData),
    SubscriptionIdentifier(SubscriptionIdentifier),
    SessionExpiryInterval(SessionExpiryInterval),
    AssignedClientIdentifier(AssignedClientIdentifier),
    ServerKeepAlive(ServerKeepAlive),
    AuthenticationMethod(AuthenticationMethod),
    AuthenticationData(AuthenticationData),
    RequestProblemInformation(RequestProblemInformation),
    WillDelayInterval(WillDelayInterval),
    RequestResponseInformation(RequestResponseInformation),
    ResponseInformation(ResponseInformation),
    ServerReference(ServerReference),
    ReasonString(ReasonString),
    ReceiveMaximum(ReceiveMaximum),
    TopicAliasMaximum(TopicAliasMaximum),
    TopicAlias(TopicAlias),
    MaximumQos(MaximumQos),
    RetainAvailable(RetainAvailable),
    UserProperty(UserProperty),
    MaximumPacketSize(MaximumPacketSize),
    WildcardSubscriptionAvailable(WildcardSubscriptionAvailable),
    SubscriptionIdentifierAvailable(SubscriptionIdentifierAvailable),
    SharedSubscriptionAvailable(SharedSubscriptionAvailable),
}

impl Property {
    pub fn id(&self) -> u8 {
        match self {
            Property::PayloadFormatIndicator(_) => pid::PAYLOAD_FORMAT_INDICATOR,
            Property::MessageExpiryInterval(_) => pid::MESSAGE_EXPIRY_INTERVAL,
            Property::ContentType(_) => pid::CONTENT_TYPE,
            Property::ResponseTopic(_) => pid::RESPONSE_TOPIC,
            Property::CorrelationData(_) => pid::CORRELATION_DATA,
            Property::SubscriptionIdentifier(_) => pid::SUBSCRIPTION_IDENTIFIER,
            Property::SessionExpiryInterval(_) => pid::SESSION_EXPIRY_INTERVAL,
            Property::AssignedClientIdentifier(_) => pid::ASSIGNED_CLIENT_IDENTIFIER,
            Property::ServerKeepAlive(_) => pid::SERVER_KEEP_ALIVE,
            Property::AuthenticationMethod(_) => pid::AUTHENTICATION_METHOD,
            Property::AuthenticationData(_) => pid::AUTHENTICATION_DATA,
            Property::RequestProblemInformation(_) => pid::REQUEST_PROBLEM_INFORMATION,
            Property::WillDelayInterval(_) => pid::WILL_DELAY_INTERVAL,
            Property::RequestResponseInformation(_) => pid::REQUEST_RESPONSE_INFORMATION,
            Property::ResponseInformation(_) => pid::RESPONSE_INFORMATION,
            Property::ServerReference(_) => pid::SERVER_REFERENCE,
            Property::ReasonString(_) => pid::REASON_STRING,
            Property::ReceiveMaximum(_) => pid::RECEIVE_MAXIMUM,
            Property::TopicAliasMaximum(_) => pid::TOPIC_ALIAS_MAXIMUM,
            Property::TopicAlias(_) => pid::TOPIC_ALIAS,
            Property::MaximumQos(_) => pid::MAXIMUM_QOS,
            Property::RetainAvailable(_) => pid::RETAIN_AVAILABLE,
            Property::UserProperty(_) => pid::USER_PROPERTY,
            Property::MaximumPacketSize(_) => pid::MAXIMUM_PACKET_SIZE,
            Property::WildcardSubscriptionAvailable(_) => pid::WILDCARD_SUBSCRIPTION_AVAILABLE,
            Property::SubscriptionIdentifierAvailable(_) => pid::SUBSCRIPTION_IDENTIFIER_AVAILABLE,
            Property::SharedSubscriptionAvailable(_) => pid::SHARED_SUBSCRIPTION_AVAILABLE,
        }
    }

    /// Wire size including the identifier byte.
    pub(crate) fn size(&self) -> usize {
        1 + match self {
            Property::PayloadFormatIndicator(_)
            | Property::RequestProblemInformation(_)
            | Property::RequestResponseInformation(_)
            | Property::MaximumQos(_)
            | Property::RetainAvailable(_)
            | Property::WildcardSubscriptionAvailable(_)
            | Property::SubscriptionIdentifierAvailable(_)
            | Property::SharedSubscriptionAvailable(_) => 1,
            Property::ServerKeepAlive(_)
            | Property::ReceiveMaximum(_)
            | Property::TopicAliasMaximum(_)
            | Property::TopicAlias(_) => 2,
            Property::MessageExpiryInterval(_)
            | Property::SessionExpiryInterval(_)
            | Property::WillDelayInterval(_)
            | Property::MaximumPacketSize(_) => 4,
            Property::SubscriptionIdentifier(p) => p.value.size(),
            Property::ContentType(p) => p.value.size(),
            Property::ResponseTopic(p) => p.value.size(),
            Property::AssignedClientIdentifier(p) => p.value.size(),
            Property::AuthenticationMethod(p) => p.value.size(),
            Property::ResponseInformation(p) => p.value.size(),
            Property::ServerReference(p) => p.value.size(),
            Property::ReasonString(p) => p.value.size(),
            Property::CorrelationData(p) => p.value.size(),
            Property::AuthenticationData(p) => p.value.size(),
            Property::UserProperty(p) => p.key.size() + p.value.size(),
        }
    }

    pub(crate) fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.id());
        match self {
            Property::PayloadFormatIndicator(p) => out.push(p.value),
            Property::RequestProblemInformation(p) => out.push(p.value),
            Property::RequestResponseInformation(p) => out.push(p.value),
            Property::MaximumQos(p) => out.push(p.value),
            Property::RetainAvailable(p) => out.push(p.value),
            Property::WildcardSubscriptionAvailable(p) => out.push(p.value),
            Property::SubscriptionIdentifierAvailable(p) => out.push(p.value),
            Property::SharedSubscriptionAvailable(p) => out.push(p.value),
            Property::ServerKeepAlive(p) => out.extend_from_slice(&p.value.to_be_bytes()),
            Property::ReceiveMaximum(p) => out.extend_from_slice(&p.value.to_be_bytes()),
            Property::TopicAliasMaximum(p) => out.extend_from_slice(&p.value.to_be_bytes()),
            Property::TopicAlias(p) => out.extend_from_slice(&p.value.to_be_bytes()),
            Property::MessageExpiryInterval(p) => out.extend_from_slice(&p.value.to_be_bytes()),
            Property::SessionExpiryInterval(p) => out.extend_from_slice(&p.value.to_be_bytes()),
            Property::WillDelayInterval(p) => out.extend_from_slice(&p.value.to_be_bytes()),
            Property::MaximumPacketSize(p) => out.extend_from_slice(&p.value.to_be_bytes()),
            Property::SubscriptionIdentifier(p) => out.extend_from_slice(p.value.as_slice()),
            Property::ContentType(p) => p.value.encode_into(out),
            Property::ResponseTopic(p) => p.value.encode_into(out),
            Property::AssignedClientIdentifier(p) => p.value.encode_into(out),
            Property::AuthenticationMethod(p) => p.value.encode_into(out),
            Property::ResponseInformation(p) => p.value.encode_into(out),
            Property::ServerReference(p) => p.value.encode_into(out),
            Property::ReasonString(p) => p.value.encode_into(out),
            Property::CorrelationData(p) => p.value.encode_into(out),
            Property::AuthenticationData(p) => p.value.encode_into(out),
            Property::UserProperty(p) => {
                p.key.encode_into(out);
                p.value.encode_into(out);
            }
        }
    }

    pub(crate) fn decode(src: &mut Bytes) -> Result<Property, MqttError> {
        let id = decode_u8(src)?;
        let prop = match id {
            pid::PAYLOAD_FORMAT_INDICATOR => {
                PayloadFormatIndicator::new(decode_u8(src)?)?.into()
            }
            pid::MESSAGE_EXPIRY_INTERVAL => MessageExpiryInterval::new(decode_u32(src)?)?.into(),
            pid::CONTENT_TYPE => Property::ContentType(ContentType {
                value: MqttString::decode(src)?,
            }),
            pid::RESPONSE_TOPIC => Property::ResponseTopic(ResponseTopic {
                value: MqttString::decode(src)?,
            }),
            pid::CORRELATION_DATA => Property::CorrelationData(CorrelationData {
                value: MqttBinary::decode(src)?,
            }),
            pid::SUBSCRIPTION_IDENTIFIER => {
                let v = VariableByteInteger::decode(src)?;
                if v.value() == 0 {
                    return Err(MqttError::ProtocolError);
                }
                Property::SubscriptionIdentifier(SubscriptionIdentifier { value: v })
            }
            pid::SESSION_EXPIRY_INTERVAL => SessionExpiryInterval::new(decode_u32(src)?)?.into(),
            pid::ASSIGNED_CLIENT_IDENTIFIER => {
                Property::AssignedClientIdentifier(AssignedClientIdentifier {
                    value: MqttString::decode(src)?,
                })
            }
            pid::SERVER_KEEP_ALIVE => ServerKeepAlive::new(decode_u16(src)?)?.into(),
            pid::AUTHENTICATION_METHOD => Property::AuthenticationMethod(AuthenticationMethod {
                value: MqttString::decode(src)?,
            }),
            pid::AUTHENTICATION_DATA => Property::AuthenticationData(AuthenticationData {
                value: MqttBinary::decode(src)?,
            }),
            pid::REQUEST_PROBLEM_INFORMATION => {
                RequestProblemInformation::new(decode_u8(src)?)?.into()
            }
            pid::WILL_DELAY_INTERVAL => WillDelayInterval::new(decode_u32(src)?)?.into(),
            pid::REQUEST_RESPONSE_INFORMATION => {
                RequestResponseInformation::new(decode_u8(src)?)?.into()
            }
            pid::RESPONSE_INFORMATION => Property::ResponseInformation(ResponseInformation {
                value: MqttString::decode(src)?,
            }),
            pid::SERVER_REFERENCE => Property::ServerReference(ServerReference {
                value: MqttString::decode(src)?,
            }),
            pid::REASON_STRING => Property::ReasonString(ReasonString {
                value: MqttString::decode(src)?,
            }),
            pid::RECEIVE_MAXIMUM => ReceiveMaximum::new(decode_u16(src)?)?.into(),
            pid::TOPIC_ALIAS_MAXIMUM => TopicAliasMaximum::new(decode_u16(src)?)?.into(),
            pid::TOPIC_ALIAS => TopicAlias::new(decode_u16(src)?)?.into(),
            pid::MAXIMUM_QOS => MaximumQos::new(decode_u8(src)?)?.into(),
            pid::RETAIN_AVAILABLE => RetainAvailable::new(decode_u8(src)?)?.into(),
            pid::USER_PROPERTY => Property::UserProperty(UserProperty {
                key: MqttString::decode(src)?,
                value: MqttString::decode(src)?,
            }),
            pid::MAXIMUM_PACKET_SIZE => MaximumPacketSize::new(decode_u32(src)?)?.into(),
            pid::WILDCARD_SUBSCRIPTION_AVAILABLE => {
                WildcardSubscriptionAvailable::new(decode_u8(src)?)?.into()
            }
            pid::SUBSCRIPTION_IDENTIFIER_AVAILABLE => {
                SubscriptionIdentifierAvailable::new(decode_u8(src)?)?.into()
            }
            pid::SHARED_SUBSCRIPTION_AVAILABLE => {
                SharedSubscriptionAvailable::new(decode_u8(src)?)?.into()
            }
            _ => return Err(MqttError::MalformedPacket),
        };
        Ok(prop)
    }

    /// The property↔packet legality table from the MQTT 5.0 specification.
    pub(crate) fn allowed_in(&self, loc: PropertyLocation) -> bool {
        use PropertyLocation::*;
        match self {
            Property::PayloadFormatIndicator(_)
            | Property::MessageExpiryInterval(_)
            | Property::ContentType(_)
            | Property::ResponseTopic(_)
            | Property::CorrelationData(_) => matches!(loc, Publish | Will),
            Property::SubscriptionIdentifier(_) => matches!(loc, Publish | Subscribe),
            Property::SessionExpiryInterval(_) => matches!(loc, Connect | Connack | Disconnect),
            Property::AssignedClientIdentifier(_) => matches!(loc, Connack),
            Property::ServerKeepAlive(_) => matches!(loc, Connack),
            Property::AuthenticationMethod(_) | Property::AuthenticationData(_) => {
                matches!(loc, Connect | Connack | Auth)
            }
            Property::RequestProblemInformation(_)
            | Property::RequestResponseInformation(_) => matches!(loc, Connect),
            Property::WillDelayInterval(_) => matches!(loc, Will),
            Property::ResponseInformation(_) => matches!(loc, Connack),
            Property::ServerReference(_) => matches!(loc, Connack | Disconnect),
            Property::ReasonString(_) => matches!(
                loc,
                Connack | Puback | Pubrec | Pubrel | Pubcomp | Suback | Unsuback | Disconnect
                    | Auth
            ),
            Property::ReceiveMaximum(_) | Property::TopicAliasMaximum(_) => {
                matches!(loc, Connect | Connack)
            }
            Property::TopicAlias(_) => matches!(loc, Publish),
            Property::MaximumQos(_) | Property::RetainAvailable(_) => matches!(loc, Connack),
            Property::UserProperty(_) => true,
            Property::MaximumPacketSize(_) => matches!(loc, Connect | Connack),
            Property::WildcardSubscriptionAvailable(_)
            | Property::SubscriptionIdentifierAvailable(_)
            | Property::SharedSubscriptionAvailable(_) => matches!(loc, Connack),
        }
    }

    fn dup_allowed(&self) -> bool {
        matches!(
            self,
            Property::UserProperty(_) | Property::SubscriptionIdentifier(_)
        )
    }
}

/// Validated, pre-encoded property block of one packet.
#[derive(Clone, PartialEq, Eq)]
pub struct Properties {
    entries: Vec<Property>,
    length: VariableByteInteger,
    encoded: Bytes,
}

impl Properties {
    pub(crate) fn new(
        entries: Vec<Property>,
        loc: PropertyLocation,
    ) -> Result<Self, MqttError> {
        for (idx, p) in entries.iter().enumerate() {
            if !p.allowed_in(loc) {
                return Err(MqttError::ProtocolError);
            }
            if !p.dup_allowed() && entries[..idx].iter().any(|q| q.id() == p.id()) {
                return Err(MqttError::ProtocolError);
            }
        }
        let mut encoded = Vec::new();
        for p in &entries {
            p.encode_into(&mut encoded);
        }
        Ok(Self {
            length: VariableByteInteger::new(encoded.len() as u32)?,
            encoded: Bytes::from(encoded),
            entries,
        })
    }

    pub(crate) fn empty() -> Self {
        Self {
            entries: Vec::new(),
            length: VariableByteInteger::new(0).expect("zero fits in one byte"),
            encoded: Bytes::new(),
        }
    }

    /// Decode a property block (length prefix included) from `src`.
    pub(crate) fn decode(src: &mut Bytes, loc: PropertyLocation) -> Result<Self, MqttError> {
        let length = VariableByteInteger::decode(src)?;
        let len = length.value() as usize;
        if src.remaining() < len {
            return Err(MqttError::MalformedPacket);
        }
        let mut block = src.split_to(len);
        let encoded = block.clone();
        let mut entries = Vec::new();
        while block.has_remaining() {
            entries.push(Property::decode(&mut block)?);
        }
        for (idx, p) in entries.iter().enumerate() {
            if !p.allowed_in(loc) {
                return Err(MqttError::ProtocolError);
            }
            if !p.dup_allowed() && entries[..idx].iter().any(|q| q.id() == p.id()) {
                return Err(MqttError::ProtocolError);
            }
        }
        Ok(Self {
            entries,
            length,
            encoded,
        })
    }

    pub fn entries(&self) -> &[Property] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Wire size including the length prefix.
    pub(crate) fn size(&self) -> usize {
        self.length.size() + self.encoded.len()
    }

    pub(crate) fn num_buffers(&self) -> usize {
        2
    }

    pub(crate) fn push_buffers<'a>(&'a self, out: &mut Vec<IoSlice<'a>>) {
        out.push(IoSlice::new(self.length.as_slice()));
        out.push(IoSlice::new(&self.encoded));
    }

    pub(crate) fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.length.as_slice());
        out.extend_from_slice(&self.encoded);
    }

    pub(crate) fn topic_alias(&self) -> Option<u16> {
        self.entries.iter().find_map(|p| match p {
            Property::TopicAlias(a) => Some(a.val()),
            _ => None,
        })
    }

    pub(crate) fn receive_maximum(&self) -> Option<u16> {
        self.entries.iter().find_map(|p| match p {
            Property::ReceiveMaximum(m) => Some(m.val()),
            _ => None,
        })
    }

    pub(crate) fn topic_alias_maximum(&self) -> Option<u16> {
        self.entries.iter().find_map(|p| match p {
            Property::TopicAliasMaximum(m) => Some(m.val()),
            _ => None,
        })
    }

    pub(crate) fn session_expiry_interval(&self) -> Option<u32> {
        self.entries.iter().find_map(|p| match p {
            Property::SessionExpiryInterval(i) => Some(i.val()),
            _ => None,
        })
    }

    pub(crate) fn server_keep_alive(&self) -> Option<u16> {
        self.entries.iter().find_map(|p| match p {
            Property::ServerKeepAlive(k) => Some(k.val()),
            _ => None,
        })
    }

    /// Rebuild the block without any TopicAlias entry.
    pub(crate) fn without_topic_alias(&self, loc: PropertyLocation) -> Result<Self, MqttError> {
        let entries: Vec<Property> = self
            .entries
            .iter()
            .filter(|p| !matches!(p, Property::TopicAlias(_)))
            .cloned()
            .collect();
        Properties::new(entries, loc)
    }

    /// Rebuild the block with the TopicAlias entry replaced (or added).
    pub(crate) fn with_topic_alias(
        &self,
        alias: u16,
        loc: PropertyLocation,
    ) -> Result<Self, MqttError> {
        let mut entries: Vec<Property> = self
            .entries
            .iter()
            .filter(|p| !matches!(p, Property::TopicAlias(_)))
            .cloned()
            .collect();
        entries.push(TopicAlias::new(alias)?.into());
        Properties::new(entries, loc)
    }
}

impl std::fmt::Debug for Properties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.iter()).finish()
    }
}

impl Default for Properties {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_block_round_trip() {
        let props = Properties::new(
            vec![
                SessionExpiryInterval::new(3600).unwrap().into(),
                ReceiveMaximum::new(10).unwrap().into(),
                UserProperty::new("k", "v").unwrap().into(),
                UserProperty::new("k", "v2").unwrap().into(),
            ],
            PropertyLocation::Connect,
        )
        .unwrap();

        let mut encoded = Vec::new();
        props.encode_into(&mut encoded);
        let mut src = Bytes::from(encoded);
        let decoded = Properties::decode(&mut src, PropertyLocation::Connect).unwrap();
        assert_eq!(decoded, props);
        assert_eq!(decoded.session_expiry_interval(), Some(3600));
        assert_eq!(decoded.receive_maximum(), Some(10));
    }

    #[test]
    fn property_not_allowed_in_packet() {
        let err = Properties::new(
            vec![TopicAlias::new(1).unwrap().into()],
            PropertyLocation::Connect,
        );
        assert_eq!(err.unwrap_err(), MqttError::ProtocolError);
    }

    #[test]
    fn duplicate_property_rejected() {
        let err = Properties::new(
            vec![
                SessionExpiryInterval::new(1).unwrap().into(),
                SessionExpiryInterval::new(2).unwrap().into(),
            ],
            PropertyLocation::Connect,
        );
        assert_eq!(err.unwrap_err(), MqttError::ProtocolError);
    }

    #[test]
    fn zero_receive_maximum_rejected() {
        assert!(ReceiveMaximum::new(0).is_err());
        assert!(TopicAlias::new(0).is_err());
        assert!(SubscriptionIdentifier::new(0).is_err());
    }

    #[test]
    fn topic_alias_rewrite() {
        let props = Properties::new(
            vec![
                TopicAlias::new(3).unwrap().into(),
                UserProperty::new("a", "b").unwrap().into(),
            ],
            PropertyLocation::Publish,
        )
        .unwrap();
        assert_eq!(props.topic_alias(), Some(3));

        let stripped = props.without_topic_alias(PropertyLocation::Publish).unwrap();
        assert_eq!(stripped.topic_alias(), None);
        assert_eq!(stripped.entries().len(), 1);

        let replaced = props.with_topic_alias(7, PropertyLocation::Publish).unwrap();
        assert_eq!(replaced.topic_alias(), Some(7));
    }
}
