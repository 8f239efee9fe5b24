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

//! High-level MQTT client over a client-role endpoint.
//!
//! [`GenericClient`] hides packet-by-packet plumbing: it spawns a router
//! task that continuously receives from the endpoint and matches broker
//! responses (CONNACK, SUBACK, UNSUBACK, PUBACK, PUBREC, PUBCOMP, AUTH)
//! back to the operation that is waiting for them, keyed by packet id.
//! Unsolicited PUBLISH and DISCONNECT packets flow into a FIFO drained by
//! [`GenericClient::recv`]. Everything else is logged and dropped.

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};

use crate::mqtt_ep::common::HashMap;
use crate::mqtt_ep::connection_error::ConnectionError;
use crate::mqtt_ep::connection_option::GenericConnectionOption;
use crate::mqtt_ep::endpoint::{GenericEndpoint, Mode};
use crate::mqtt_ep::packet::{
    v3_1_1, v5_0, GenericPacket, IsPacketId, PacketType, Payload, Property, Qos, SubEntry, Will,
};
use crate::mqtt_ep::result_code::{AuthReasonCode, DisconnectReasonCode, MqttError};
use crate::mqtt_ep::role;
use crate::mqtt_ep::transport::TransportOps;
use crate::mqtt_ep::version::Version;

/// Fields for the CONNECT packet sent by [`GenericClient::start`].
#[derive(Debug, Clone)]
pub struct ConnectSettings {
    pub client_id: String,
    pub clean_start: bool,
    pub keep_alive: u16,
    pub will: Option<Will>,
    pub user_name: Option<String>,
    pub password: Option<Vec<u8>>,
    /// CONNECT properties (MQTT v5.0 only).
    pub props: Vec<Property>,
}

impl Default for ConnectSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            clean_start: true,
            keep_alive: 0,
            will: None,
            user_name: None,
            password: None,
            props: Vec::new(),
        }
    }
}

/// Optional PUBLISH fields beyond topic, payload, and QoS.
#[derive(Debug, Clone)]
pub struct PublishOptions<PacketIdType> {
    pub retain: bool,
    pub dup: bool,
    /// Use this packet id instead of acquiring one (QoS ≥ 1).
    pub packet_id: Option<PacketIdType>,
    /// PUBLISH properties (MQTT v5.0 only).
    pub props: Vec<Property>,
}

impl<PacketIdType> Default for PublishOptions<PacketIdType> {
    fn default() -> Self {
        Self {
            retain: false,
            dup: false,
            packet_id: None,
            props: Vec::new(),
        }
    }
}

/// Acknowledgements collected by a publish operation.
///
/// QoS 0 sets no slot, QoS 1 sets `puback`, QoS 2 sets `pubrec` and
/// `pubcomp` (or only `pubrec` when the broker rejects the first phase).
#[derive(Debug, Clone)]
pub struct GenericPublishResult<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    pub puback: Option<GenericPacket<PacketIdType>>,
    pub pubrec: Option<GenericPacket<PacketIdType>>,
    pub pubcomp: Option<GenericPacket<PacketIdType>>,
}

impl<PacketIdType> Default for GenericPublishResult<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    fn default() -> Self {
        Self {
            puback: None,
            pubrec: None,
            pubcomp: None,
        }
    }
}

/// Standard-width publish result.
pub type PublishResult = GenericPublishResult<u16>;

/// Packets delivered through [`GenericClient::recv`].
#[derive(Debug, Clone)]
pub enum GenericIncoming<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    Publish(GenericPacket<PacketIdType>),
    Disconnect(GenericPacket<PacketIdType>),
}

/// Standard-width incoming item.
pub type Incoming = GenericIncoming<u16>;

struct PendingPublish<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    qos: Qos,
    pubrec: Option<GenericPacket<PacketIdType>>,
    done_tx: oneshot::Sender<Result<GenericPublishResult<PacketIdType>, ConnectionError>>,
}

type PacketReplyTx<PacketIdType> =
    oneshot::Sender<Result<GenericPacket<PacketIdType>, ConnectionError>>;

struct RouterState<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    // set on attach; cleared when the router reports the transport gone,
    // so a never-attached client stays silent
    attached: bool,
    pending_connack: Option<PacketReplyTx<PacketIdType>>,
    pending_auth: Option<PacketReplyTx<PacketIdType>>,
    pending_publish: HashMap<PacketIdType, PendingPublish<PacketIdType>>,
    pending_subscribe: HashMap<PacketIdType, PacketReplyTx<PacketIdType>>,
    pending_unsubscribe: HashMap<PacketIdType, PacketReplyTx<PacketIdType>>,
}

impl<PacketIdType> RouterState<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    fn new() -> Self {
        Self {
            attached: false,
            pending_connack: None,
            pending_auth: None,
            pending_publish: HashMap::new(),
            pending_subscribe: HashMap::new(),
            pending_unsubscribe: HashMap::new(),
        }
    }

    fn fail_all(&mut self, make_error: impl Fn() -> ConnectionError) {
        if let Some(tx) = self.pending_connack.take() {
            let _ = tx.send(Err(make_error()));
        }
        if let Some(tx) = self.pending_auth.take() {
            let _ = tx.send(Err(make_error()));
        }
        for (_, pending) in self.pending_publish.drain() {
            let _ = pending.done_tx.send(Err(make_error()));
        }
        for (_, tx) in self.pending_subscribe.drain() {
            let _ = tx.send(Err(make_error()));
        }
        for (_, tx) in self.pending_unsubscribe.drain() {
            let _ = tx.send(Err(make_error()));
        }
    }
}

/// MQTT client facade, generic over the packet-id width.
pub struct GenericClient<PacketIdType>
where
    PacketIdType: IsPacketId + Send + Sync,
{
    endpoint: Arc<GenericEndpoint<role::Client, PacketIdType>>,
    version: Version,
    router: Arc<Mutex<RouterState<PacketIdType>>>,
    incoming_rx:
        tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<GenericIncoming<PacketIdType>, ConnectionError>>>,
}

/// Client with the standard u16 packet-id width.
pub type Client = GenericClient<u16>;

impl<PacketIdType> GenericClient<PacketIdType>
where
    PacketIdType: IsPacketId + Send + Sync,
{
    pub fn new(version: Version) -> Self {
        let endpoint = Arc::new(GenericEndpoint::<role::Client, PacketIdType>::new(version));
        let router = Arc::new(Mutex::new(RouterState::new()));
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        // the router holds the endpoint weakly so dropping the client tears
        // the whole stack down
        tokio::spawn(router_task(
            Arc::downgrade(&endpoint),
            Arc::clone(&router),
            incoming_tx,
        ));
        Self {
            endpoint,
            version,
            router,
            incoming_rx: tokio::sync::Mutex::new(incoming_rx),
        }
    }

    /// The underlying endpoint, for operations the facade does not cover.
    pub fn endpoint(&self) -> &GenericEndpoint<role::Client, PacketIdType> {
        &self.endpoint
    }

    /// Attach an established transport.
    pub async fn attach<T>(&self, transport: T) -> Result<(), ConnectionError>
    where
        T: TransportOps + Send + 'static,
    {
        self.endpoint.attach(transport, Mode::Client).await?;
        self.router.lock().expect("router mutex poisoned").attached = true;
        Ok(())
    }

    /// Attach an established transport with options.
    pub async fn attach_with_options<T>(
        &self,
        transport: T,
        options: GenericConnectionOption<PacketIdType>,
    ) -> Result<(), ConnectionError>
    where
        T: TransportOps + Send + 'static,
    {
        self.endpoint
            .attach_with_options(transport, Mode::Client, options)
            .await?;
        self.router.lock().expect("router mutex poisoned").attached = true;
        Ok(())
    }

    /// Send CONNECT and wait for the CONNACK.
    pub async fn start(
        &self,
        settings: ConnectSettings,
    ) -> Result<GenericPacket<PacketIdType>, ConnectionError> {
        let packet: GenericPacket<PacketIdType> = match self.version {
            Version::V5_0 => {
                let mut builder = v5_0::Connect::builder()
                    .client_id(&settings.client_id)
                    .map_err(ConnectionError::Mqtt)?
                    .clean_start(settings.clean_start)
                    .keep_alive(settings.keep_alive)
                    .props(settings.props);
                if let Some(will) = settings.will {
                    builder = builder.will(will);
                }
                if let Some(user_name) = &settings.user_name {
                    builder = builder.user_name(user_name).map_err(ConnectionError::Mqtt)?;
                }
                if let Some(password) = settings.password {
                    builder = builder.password(password).map_err(ConnectionError::Mqtt)?;
                }
                builder.build().map_err(ConnectionError::Mqtt)?.into()
            }
            _ => {
                if !settings.props.is_empty() {
                    return Err(ConnectionError::Mqtt(MqttError::InvalidArgument));
                }
                let mut builder = v3_1_1::Connect::builder()
                    .client_id(&settings.client_id)
                    .map_err(ConnectionError::Mqtt)?
                    .clean_session(settings.clean_start)
                    .keep_alive(settings.keep_alive);
                if let Some(will) = settings.will {
                    builder = builder.will(will);
                }
                if let Some(user_name) = &settings.user_name {
                    builder = builder.user_name(user_name).map_err(ConnectionError::Mqtt)?;
                }
                if let Some(password) = settings.password {
                    builder = builder.password(password).map_err(ConnectionError::Mqtt)?;
                }
                builder.build().map_err(ConnectionError::Mqtt)?.into()
            }
        };

        let (done_tx, done_rx) = oneshot::channel();
        {
            let mut router = self.router.lock().expect("router mutex poisoned");
            router.pending_connack = Some(done_tx);
        }
        if let Err(error) = self.endpoint.send(packet).await {
            self.router
                .lock()
                .expect("router mutex poisoned")
                .pending_connack = None;
            return Err(error);
        }
        done_rx.await.map_err(|_| ConnectionError::ChannelClosed)?
    }

    /// Publish with default options, acquiring a packet id as needed.
    pub async fn publish(
        &self,
        topic: impl AsRef<str>,
        payload: impl Into<Payload>,
        qos: Qos,
    ) -> Result<GenericPublishResult<PacketIdType>, ConnectionError> {
        self.publish_with_options(topic, payload, qos, PublishOptions::default())
            .await
    }

    /// Publish and collect the QoS acknowledgements.
    ///
    /// QoS 0 completes when the packet is written. QoS 1 completes on
    /// PUBACK. QoS 2 completes on PUBCOMP and also carries the intermediate
    /// PUBREC. With no packet id in `options`, one is acquired and released
    /// by the protocol flow.
    pub async fn publish_with_options(
        &self,
        topic: impl AsRef<str>,
        payload: impl Into<Payload>,
        qos: Qos,
        options: PublishOptions<PacketIdType>,
    ) -> Result<GenericPublishResult<PacketIdType>, ConnectionError> {
        let packet_id = match (qos, options.packet_id) {
            (Qos::AtMostOnce, _) => None,
            (_, Some(id)) if !id.is_zero() => Some(id),
            _ => Some(self.endpoint.acquire_packet_id().await?),
        };

        let packet: GenericPacket<PacketIdType> = match self.version {
            Version::V5_0 => {
                let mut builder = v5_0::GenericPublish::builder()
                    .topic_name(topic.as_ref())
                    .map_err(ConnectionError::Mqtt)?
                    .qos(qos)
                    .retain(options.retain)
                    .dup(options.dup)
                    .props(options.props)
                    .payload(payload.into());
                builder = builder.packet_id(packet_id);
                builder.build().map_err(ConnectionError::Mqtt)?.into()
            }
            _ => {
                if !options.props.is_empty() {
                    return Err(ConnectionError::Mqtt(MqttError::InvalidArgument));
                }
                let mut builder = v3_1_1::GenericPublish::builder()
                    .topic_name(topic.as_ref())
                    .map_err(ConnectionError::Mqtt)?
                    .qos(qos)
                    .retain(options.retain)
                    .dup(options.dup)
                    .payload(payload.into());
                builder = builder.packet_id(packet_id);
                builder.build().map_err(ConnectionError::Mqtt)?.into()
            }
        };

        if qos == Qos::AtMostOnce {
            self.endpoint.send(packet).await?;
            return Ok(GenericPublishResult::default());
        }

        let packet_id = packet_id.expect("qos >= 1 always has a packet id");
        let (done_tx, done_rx) = oneshot::channel();
        {
            let mut router = self.router.lock().expect("router mutex poisoned");
            router.pending_publish.insert(
                packet_id,
                PendingPublish {
                    qos,
                    pubrec: None,
                    done_tx,
                },
            );
        }
        if let Err(error) = self.endpoint.send(packet).await {
            self.router
                .lock()
                .expect("router mutex poisoned")
                .pending_publish
                .remove(&packet_id);
            return Err(error);
        }
        done_rx.await.map_err(|_| ConnectionError::ChannelClosed)?
    }

    /// Subscribe and wait for the SUBACK.
    pub async fn subscribe(
        &self,
        entries: impl Into<Vec<SubEntry>>,
        props: impl Into<Vec<Property>>,
    ) -> Result<GenericPacket<PacketIdType>, ConnectionError> {
        let packet_id = self.endpoint.acquire_packet_id().await?;
        let props = props.into();
        let packet: GenericPacket<PacketIdType> = match self.version {
            Version::V5_0 => v5_0::GenericSubscribe::builder()
                .packet_id(packet_id)
                .props(props)
                .entries(entries.into())
                .build()
                .map_err(ConnectionError::Mqtt)?
                .into(),
            _ => {
                if !props.is_empty() {
                    return Err(ConnectionError::Mqtt(MqttError::InvalidArgument));
                }
                v3_1_1::GenericSubscribe::builder()
                    .packet_id(packet_id)
                    .entries(entries.into())
                    .build()
                    .map_err(ConnectionError::Mqtt)?
                    .into()
            }
        };

        let (done_tx, done_rx) = oneshot::channel();
        {
            let mut router = self.router.lock().expect("router mutex poisoned");
            router.pending_subscribe.insert(packet_id, done_tx);
        }
        if let Err(error) = self.endpoint.send(packet).await {
            self.router
                .lock()
                .expect("router mutex poisoned")
                .pending_subscribe
                .remove(&packet_id);
            return Err(error);
        }
        done_rx.await.map_err(|_| ConnectionError::ChannelClosed)?
    }

    /// Unsubscribe and wait for the UNSUBACK.
    pub async fn unsubscribe<I, S>(
        &self,
        topics: I,
        props: impl Into<Vec<Property>>,
    ) -> Result<GenericPacket<PacketIdType>, ConnectionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let packet_id = self.endpoint.acquire_packet_id().await?;
        let props = props.into();
        let packet: GenericPacket<PacketIdType> = match self.version {
            Version::V5_0 => v5_0::GenericUnsubscribe::builder()
                .packet_id(packet_id)
                .props(props)
                .topics(topics)
                .map_err(ConnectionError::Mqtt)?
                .build()
                .map_err(ConnectionError::Mqtt)?
                .into(),
            _ => {
                if !props.is_empty() {
                    return Err(ConnectionError::Mqtt(MqttError::InvalidArgument));
                }
                v3_1_1::GenericUnsubscribe::builder()
                    .packet_id(packet_id)
                    .topics(topics)
                    .map_err(ConnectionError::Mqtt)?
                    .build()
                    .map_err(ConnectionError::Mqtt)?
                    .into()
            }
        };

        let (done_tx, done_rx) = oneshot::channel();
        {
            let mut router = self.router.lock().expect("router mutex poisoned");
            router.pending_unsubscribe.insert(packet_id, done_tx);
        }
        if let Err(error) = self.endpoint.send(packet).await {
            self.router
                .lock()
                .expect("router mutex poisoned")
                .pending_unsubscribe
                .remove(&packet_id);
            return Err(error);
        }
        done_rx.await.map_err(|_| ConnectionError::ChannelClosed)?
    }

    /// Send DISCONNECT (with an optional v5 reason) and close the transport.
    pub async fn disconnect(
        &self,
        reason: Option<DisconnectReasonCode>,
    ) -> Result<(), ConnectionError> {
        let packet: GenericPacket<PacketIdType> = match self.version {
            Version::V5_0 => {
                let mut builder = v5_0::Disconnect::builder();
                if let Some(reason) = reason {
                    builder = builder.reason_code(reason);
                }
                builder.build().map_err(ConnectionError::Mqtt)?.into()
            }
            _ => v3_1_1::Disconnect::new().into(),
        };
        let send_result = self.endpoint.send(packet).await;
        let close_result = self.endpoint.close().await;
        send_result.and(close_result)
    }

    /// v5 re-authentication: send AUTH and wait for the broker's AUTH.
    pub async fn auth(
        &self,
        reason: AuthReasonCode,
        props: impl Into<Vec<Property>>,
    ) -> Result<GenericPacket<PacketIdType>, ConnectionError> {
        if self.version != Version::V5_0 {
            return Err(ConnectionError::Mqtt(MqttError::VersionMismatch));
        }
        let packet: GenericPacket<PacketIdType> = v5_0::Auth::builder()
            .reason_code(reason)
            .props(props)
            .build()
            .map_err(ConnectionError::Mqtt)?
            .into();

        let (done_tx, done_rx) = oneshot::channel();
        {
            let mut router = self.router.lock().expect("router mutex poisoned");
            router.pending_auth = Some(done_tx);
        }
        if let Err(error) = self.endpoint.send(packet).await {
            self.router
                .lock()
                .expect("router mutex poisoned")
                .pending_auth = None;
            return Err(error);
        }
        done_rx.await.map_err(|_| ConnectionError::ChannelClosed)?
    }

    /// Next unsolicited PUBLISH or DISCONNECT, in arrival order.
    pub async fn recv(&self) -> Result<GenericIncoming<PacketIdType>, ConnectionError> {
        let mut rx = self.incoming_rx.lock().await;
        match rx.recv().await {
            Some(item) => item,
            None => Err(ConnectionError::ChannelClosed),
        }
    }

    pub async fn acquire_packet_id(&self) -> Result<PacketIdType, ConnectionError> {
        self.endpoint.acquire_packet_id().await
    }

    pub async fn close(&self) -> Result<(), ConnectionError> {
        self.endpoint.close().await
    }
}

/// Routes every packet the endpoint yields to its waiting operation.
async fn router_task<PacketIdType>(
    endpoint: std::sync::Weak<GenericEndpoint<role::Client, PacketIdType>>,
    router: Arc<Mutex<RouterState<PacketIdType>>>,
    incoming_tx: mpsc::UnboundedSender<Result<GenericIncoming<PacketIdType>, ConnectionError>>,
) where
    PacketIdType: IsPacketId + Send + Sync,
{
    loop {
        let Some(endpoint) = endpoint.upgrade() else {
            break;
        };
        match endpoint.recv().await {
            Ok(packet) => {
                route_packet(&router, &incoming_tx, packet);
            }
            Err(ConnectionError::ChannelClosed) => {
                router
                    .lock()
                    .expect("router mutex poisoned")
                    .fail_all(|| ConnectionError::ChannelClosed);
                break;
            }
            Err(error) => {
                // transport dropped: fail in-flight operations once, then
                // idle until the client attaches a new transport
                {
                    let mut router = router.lock().expect("router mutex poisoned");
                    if router.attached {
                        router.attached = false;
                        tracing::debug!("client router detached: {error}");
                        router.fail_all(|| ConnectionError::NotConnected);
                        let _ = incoming_tx.send(Err(ConnectionError::NotConnected));
                    }
                }
                drop(endpoint);
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
        }
    }
}

fn route_packet<PacketIdType>(
    router: &Mutex<RouterState<PacketIdType>>,
    incoming_tx: &mpsc::UnboundedSender<Result<GenericIncoming<PacketIdType>, ConnectionError>>,
    packet: GenericPacket<PacketIdType>,
) where
    PacketIdType: IsPacketId,
{
    let mut router = router.lock().expect("router mutex poisoned");
    match packet.packet_type() {
        PacketType::Connack => {
            if let Some(tx) = router.pending_connack.take() {
                let _ = tx.send(Ok(packet));
            } else {
                tracing::debug!("dropping CONNACK with no pending start");
            }
        }
        PacketType::Auth => {
            if let Some(tx) = router.pending_auth.take() {
                let _ = tx.send(Ok(packet));
            } else {
                tracing::debug!("dropping AUTH with no pending auth call");
            }
        }
        PacketType::Puback => {
            let Some(packet_id) = packet.packet_id() else { return };
            if let Some(pending) = router.pending_publish.remove(&packet_id) {
                let _ = pending.done_tx.send(Ok(GenericPublishResult {
                    puback: Some(packet),
                    pubrec: None,
                    pubcomp: None,
                }));
            } else {
                tracing::debug!("dropping PUBACK for unknown id {packet_id}");
            }
        }
        PacketType::Pubrec => {
            let Some(packet_id) = packet.packet_id() else { return };
            let failed = pubrec_is_failure(&packet);
            if let Some(mut pending) = router.pending_publish.remove(&packet_id) {
                if pending.qos != Qos::ExactlyOnce || failed {
                    let _ = pending.done_tx.send(Ok(GenericPublishResult {
                        puback: None,
                        pubrec: Some(packet),
                        pubcomp: None,
                    }));
                } else {
                    pending.pubrec = Some(packet);
                    router.pending_publish.insert(packet_id, pending);
                }
            } else {
                tracing::debug!("dropping PUBREC for unknown id {packet_id}");
            }
        }
        PacketType::Pubcomp => {
            let Some(packet_id) = packet.packet_id() else { return };
            if let Some(pending) = router.pending_publish.remove(&packet_id) {
                let _ = pending.done_tx.send(Ok(GenericPublishResult {
                    puback: None,
                    pubrec: pending.pubrec,
                    pubcomp: Some(packet),
                }));
            } else {
                tracing::debug!("dropping PUBCOMP for unknown id {packet_id}");
            }
        }
        PacketType::Suback => {
            let Some(packet_id) = packet.packet_id() else { return };
            if let Some(tx) = router.pending_subscribe.remove(&packet_id) {
                let _ = tx.send(Ok(packet));
            } else {
                tracing::debug!("dropping SUBACK for unknown id {packet_id}");
            }
        }
        PacketType::Unsuback => {
            let Some(packet_id) = packet.packet_id() else { return };
            if let Some(tx) = router.pending_unsubscribe.remove(&packet_id) {
                let _ = tx.send(Ok(packet));
            } else {
                tracing::debug!("dropping UNSUBACK for unknown id {packet_id}");
            }
        }
        PacketType::Publish => {
            let _ = incoming_tx.send(Ok(GenericIncoming::Publish(packet)));
        }
        PacketType::Disconnect => {
            let _ = incoming_tx.send(Ok(GenericIncoming::Disconnect(packet)));
        }
        other => {
            tracing::debug!("client router dropping {other:?} packet");
        }
    }
}

fn pubrec_is_failure<PacketIdType>(packet: &GenericPacket<PacketIdType>) -> bool
where
    PacketIdType: IsPacketId,
{
    match packet {
        GenericPacket::V5_0Pubrec(p) => p.reason_code().is_failure(),
        _ => false,
    }
}
