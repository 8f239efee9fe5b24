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

//! MQTT result codes and the protocol error taxonomy.
//!
//! The reason-code enums mirror the tables in the MQTT 3.1.1 and 5.0
//! specifications. [`MqttError`] is the crate-wide protocol error type;
//! every decode or validation failure maps onto one of its variants, and
//! [`MqttError::disconnect_reason_code`] gives the v5 DISCONNECT reason a
//! peer should see for it.

/// Declares a `#[repr(u8)]` code enum with a fallible `u8` conversion.
macro_rules! result_code {
    (
        $( #[$enum_attr:meta] )*
        pub enum $name:ident {
            $(
                $( #[$item_attr:meta] )*
                $var:ident = $val:expr
            ),+ $(,)?
        }
    ) => {
        $( #[$enum_attr] )*
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $(
                $( #[$item_attr] )*
                $var = $val
            ),+
        }

        impl $name {
            pub fn to_u8(self) -> u8 {
                self as u8
            }
        }

        impl std::convert::TryFrom<u8> for $name {
            type Error = MqttError;
            fn try_from(v: u8) -> Result<Self, Self::Error> {
                match v {
                    $( $val => Ok($name::$var), )+
                    _ => Err(MqttError::MalformedPacket),
                }
            }
        }
    };
}

result_code! {
    /// CONNACK return code (MQTT 3.1.1).
    pub enum ConnectReturnCode {
        Accepted = 0,
        UnacceptableProtocolVersion = 1,
        IdentifierRejected = 2,
        ServerUnavailable = 3,
        BadUserNameOrPassword = 4,
        NotAuthorized = 5,
    }
}

impl ConnectReturnCode {
    pub fn is_success(self) -> bool {
        self == ConnectReturnCode::Accepted
    }
}

result_code! {
    /// SUBACK return code (MQTT 3.1.1).
    pub enum SubackReturnCode {
        SuccessMaximumQos0 = 0x00,
        SuccessMaximumQos1 = 0x01,
        SuccessMaximumQos2 = 0x02,
        Failure = 0x80,
    }
}

result_code! {
    /// CONNACK reason code (MQTT 5.0).
    pub enum ConnectReasonCode {
        Success = 0x00,
        UnspecifiedError = 0x80,
        MalformedPacket = 0x81,
        ProtocolError = 0x82,
        ImplementationSpecificError = 0x83,
        UnsupportedProtocolVersion = 0x84,
        ClientIdentifierNotValid = 0x85,
        BadUserNameOrPassword = 0x86,
        NotAuthorized = 0x87,
        ServerUnavailable = 0x88,
        ServerBusy = 0x89,
        Banned = 0x8A,
        BadAuthenticationMethod = 0x8C,
        TopicNameInvalid = 0x90,
        PacketTooLarge = 0x95,
        QuotaExceeded = 0x97,
        PayloadFormatInvalid = 0x99,
        RetainNotSupported = 0x9A,
        QosNotSupported = 0x9B,
        UseAnotherServer = 0x9C,
        ServerMoved = 0x9D,
        ConnectionRateExceeded = 0x9F,
    }
}

impl ConnectReasonCode {
    pub fn is_success(self) -> bool {
        self == ConnectReasonCode::Success
    }
}

result_code! {
    /// DISCONNECT reason code (MQTT 5.0).
    pub enum DisconnectReasonCode {
        NormalDisconnection = 0x00,
        DisconnectWithWillMessage = 0x04,
        UnspecifiedError = 0x80,
        MalformedPacket = 0x81,
        ProtocolError = 0x82,
        ImplementationSpecificError = 0x83,
        NotAuthorized = 0x87,
        ServerBusy = 0x89,
        ServerShuttingDown = 0x8B,
        KeepAliveTimeout = 0x8D,
        SessionTakenOver = 0x8E,
        TopicFilterInvalid = 0x8F,
        TopicNameInvalid = 0x90,
        ReceiveMaximumExceeded = 0x93,
        TopicAliasInvalid = 0x94,
        PacketTooLarge = 0x95,
        MessageRateTooHigh = 0x96,
        QuotaExceeded = 0x97,
        AdministrativeAction = 0x98,
        PayloadFormatInvalid = 0x99,
        RetainNotSupported = 0x9A,
        QosNotSupported = 0x9B,
        UseAnotherServer = 0x9C,
        ServerMoved = 0x9D,
        SharedSubscriptionsNotSupported = 0x9E,
        ConnectionRateExceeded = 0x9F,
        MaximumConnectTime = 0xA0,
        SubscriptionIdentifiersNotSupported = 0xA1,
        WildcardSubscriptionsNotSupported = 0xA2,
    }
}

result_code! {
    /// PUBACK reason code (MQTT 5.0).
    pub enum PubackReasonCode {
        Success = 0x00,
        NoMatchingSubscribers = 0x10,
        UnspecifiedError = 0x80,
        ImplementationSpecificError = 0x83,
        NotAuthorized = 0x87,
        TopicNameInvalid = 0x90,
        PacketIdentifierInUse = 0x91,
        QuotaExceeded = 0x97,
        PayloadFormatInvalid = 0x99,
    }
}

result_code! {
    /// PUBREC reason code (MQTT 5.0).
    pub enum PubrecReasonCode {
        Success = 0x00,
        NoMatchingSubscribers = 0x10,
        UnspecifiedError = 0x80,
        ImplementationSpecificError = 0x83,
        NotAuthorized = 0x87,
        TopicNameInvalid = 0x90,
        PacketIdentifierInUse = 0x91,
        QuotaExceeded = 0x97,
        PayloadFormatInvalid = 0x99,
    }
}

impl PubrecReasonCode {
    /// An error reason code terminates the QoS 2 exchange without PUBREL.
    pub fn is_failure(self) -> bool {
        self.to_u8() >= 0x80
    }
}

result_code! {
    /// PUBREL reason code (MQTT 5.0).
    pub enum PubrelReasonCode {
        Success = 0x00,
        PacketIdentifierNotFound = 0x92,
    }
}

result_code! {
    /// PUBCOMP reason code (MQTT 5.0).
    pub enum PubcompReasonCode {
        Success = 0x00,
        PacketIdentifierNotFound = 0x92,
    }
}

result_code! {
    /// SUBACK reason code (MQTT 5.0).
    pub enum SubackReasonCode {
        GrantedQos0 = 0x00,
        GrantedQos1 = 0x01,
        GrantedQos2 = 0x02,
        UnspecifiedError = 0x80,
        ImplementationSpecificError = 0x83,
        NotAuthorized = 0x87,
        TopicFilterInvalid = 0x8F,
        PacketIdentifierInUse = 0x91,
        QuotaExceeded = 0x97,
        SharedSubscriptionsNotSupported = 0x9E,
        SubscriptionIdentifiersNotSupported = 0xA1,
        WildcardSubscriptionsNotSupported = 0xA2,
    }
}

result_code! {
    /// UNSUBACK reason code (MQTT 5.0).
    pub enum UnsubackReasonCode {
        Success = 0x00,
        NoSubscriptionExisted = 0x11,
        UnspecifiedError = 0x80,
        ImplementationSpecificError = 0x83,
        NotAuthorized = 0x87,
        TopicFilterInvalid = 0x8F,
        PacketIdentifierInUse = 0x91,
    }
}

result_code! {
    /// AUTH reason code (MQTT 5.0).
    pub enum AuthReasonCode {
        Success = 0x00,
        ContinueAuthentication = 0x18,
        ReAuthenticate = 0x19,
    }
}

/// Protocol-level error raised by packet construction, decode, and the
/// connection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MqttError {
    #[error("malformed packet")]
    MalformedPacket,
    #[error("protocol error")]
    ProtocolError,
    #[error("topic name invalid")]
    TopicNameInvalid,
    #[error("topic filter invalid")]
    TopicFilterInvalid,
    #[error("topic alias invalid")]
    TopicAliasInvalid,
    #[error("receive maximum exceeded")]
    ReceiveMaximumExceeded,
    #[error("packet too large")]
    PacketTooLarge,
    #[error("all packet identifiers are in use")]
    PacketIdentifierFullyUsed,
    #[error("packet identifier conflict")]
    PacketIdentifierConflict,
    #[error("packet identifier invalid")]
    PacketIdentifierInvalid,
    #[error("packet not allowed to send in this role or state")]
    PacketNotAllowedToSend,
    #[error("packet could not be regulated for store")]
    PacketNotRegulated,
    #[error("packet version does not match the connection version")]
    VersionMismatch,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("keep alive timeout")]
    KeepAliveTimeout,
}

impl MqttError {
    /// The v5 DISCONNECT reason a peer should receive for this error.
    pub fn disconnect_reason_code(self) -> DisconnectReasonCode {
        match self {
            MqttError::MalformedPacket => DisconnectReasonCode::MalformedPacket,
            MqttError::TopicNameInvalid => DisconnectReasonCode::TopicNameInvalid,
            MqttError::TopicFilterInvalid => DisconnectReasonCode::TopicFilterInvalid,
            MqttError::TopicAliasInvalid => DisconnectReasonCode::TopicAliasInvalid,
            MqttError::ReceiveMaximumExceeded => DisconnectReasonCode::ReceiveMaximumExceeded,
            MqttError::PacketTooLarge => DisconnectReasonCode::PacketTooLarge,
            MqttError::KeepAliveTimeout => DisconnectReasonCode::KeepAliveTimeout,
            _ => DisconnectReasonCode::ProtocolError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_code_round_trip() {
        assert_eq!(
            ConnectReasonCode::try_from(0x87).unwrap(),
            ConnectReasonCode::NotAuthorized
        );
        assert_eq!(ConnectReasonCode::Success.to_u8(), 0);
        assert!(ConnectReasonCode::try_from(0x42).is_err());
    }

    #[test]
    fn v3_return_codes() {
        assert!(ConnectReturnCode::Accepted.is_success());
        assert!(!ConnectReturnCode::ServerUnavailable.is_success());
        assert_eq!(
            SubackReturnCode::try_from(0x80).unwrap(),
            SubackReturnCode::Failure
        );
    }

    #[test]
    fn error_to_disconnect_reason() {
        assert_eq!(
            MqttError::ReceiveMaximumExceeded.disconnect_reason_code(),
            DisconnectReasonCode::ReceiveMaximumExceeded
        );
        assert_eq!(
            MqttError::PacketIdentifierConflict.disconnect_reason_code(),
            DisconnectReasonCode::ProtocolError
        );
    }
}
