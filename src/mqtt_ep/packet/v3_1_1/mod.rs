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

//! MQTT 3.1.1 control packets.

mod connack;
mod connect;
mod disconnect;
mod ping;
mod publish;
mod pubres;
mod subscribe;
mod unsubscribe;

pub use connack::{Connack, ConnackBuilder};
pub use connect::{Connect, ConnectBuilder};
pub use disconnect::{Disconnect, DisconnectBuilder};
pub use ping::{Pingreq, Pingresp};
pub use publish::{GenericPublish, GenericPublishBuilder, Publish, PublishBuilder};
pub use pubres::{
    GenericPuback, GenericPubcomp, GenericPubrec, GenericPubrel, Puback, Pubcomp, Pubrec, Pubrel,
};
pub use subscribe::{
    GenericSuback, GenericSubackBuilder, GenericSubscribe, GenericSubscribeBuilder, Suback,
    Subscribe,
};
pub use unsubscribe::{
    GenericUnsuback, GenericUnsubscribe, GenericUnsubscribeBuilder, Unsuback, Unsubscribe,
};
