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

//! Tokio endpoint driving one MQTT connection.
//!
//! [`GenericEndpoint`] is a cheap handle: every public operation posts a
//! [`RequestResponse`] command to a single event-loop task and awaits a
//! oneshot reply. The task owns the sans-I/O
//! [`GenericConnection`](crate::mqtt_ep::connection::GenericConnection), the
//! attached transport, and the timers, so all protocol state stays confined
//! to one execution context while callers invoke from any task.

use std::future;
use std::marker::PhantomData;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;

use crate::mqtt_ep::common::{Cursor, HashSet};
use crate::mqtt_ep::connection::{GenericConnection, GenericEvent, TimerKind};
use crate::mqtt_ep::connection_error::ConnectionError;
use crate::mqtt_ep::connection_option::GenericConnectionOption;
use crate::mqtt_ep::packet::v5_0::GenericPublish;
use crate::mqtt_ep::packet::{
    GenericPacket, GenericPacketTrait, GenericStorePacket, IsPacketId, PacketType, Sendable,
};
use crate::mqtt_ep::packet_filter::PacketFilter;
use crate::mqtt_ep::request_response::RequestResponse;
use crate::mqtt_ep::role::RoleType;
use crate::mqtt_ep::transport::{TransportError, TransportOps};
use crate::mqtt_ep::version::Version;

/// What the endpoint expects to establish the connection: a client waits
/// for CONNACK, a server waits for CONNECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Client,
    Server,
}

type RecvRequestVec<PacketIdType> = Vec<(
    PacketFilter,
    oneshot::Sender<Result<GenericPacket<PacketIdType>, ConnectionError>>,
)>;

type SendRequestVec<PacketIdType> = Vec<(
    Box<GenericPacket<PacketIdType>>,
    oneshot::Sender<Result<(), ConnectionError>>,
)>;

type PacketIdRequestVec<PacketIdType> =
    Vec<oneshot::Sender<Result<PacketIdType, ConnectionError>>>;

type DynTransport = Option<Box<dyn TransportOps + Send>>;

/// MQTT endpoint handle, generic over role and packet-id width.
pub struct GenericEndpoint<Role, PacketIdType>
where
    Role: RoleType + Send + Sync,
    PacketIdType: IsPacketId + Send + Sync,
{
    version: Version,
    tx_send: mpsc::UnboundedSender<RequestResponse<PacketIdType>>,
    _marker: PhantomData<Role>,
}

/// Endpoint with the standard u16 packet-id width.
pub type Endpoint<Role> = GenericEndpoint<Role, u16>;

/// Builder for [`GenericEndpoint`], for parity with the packet builders.
pub struct GenericEndpointBuilder<Role, PacketIdType>
where
    Role: RoleType + Send + Sync,
    PacketIdType: IsPacketId + Send + Sync,
{
    version: Version,
    _marker: PhantomData<(Role, PacketIdType)>,
}

impl<Role, PacketIdType> GenericEndpointBuilder<Role, PacketIdType>
where
    Role: RoleType + Send + Sync,
    PacketIdType: IsPacketId + Send + Sync,
{
    pub fn new(version: Version) -> Self {
        Self {
            version,
            _marker: PhantomData,
        }
    }

    pub fn build(self) -> GenericEndpoint<Role, PacketIdType> {
        GenericEndpoint::new(self.version)
    }
}

macro_rules! request {
    ($self:ident, $variant:ident { $($field:ident : $value:expr),* $(,)? }) => {{
        let (response_tx, response_rx) = oneshot::channel();
        $self
            .tx_send
            .send(RequestResponse::$variant {
                $( $field: $value, )*
                response_tx,
            })
            .map_err(|_| ConnectionError::ChannelClosed)?;
        response_rx.await.map_err(|_| ConnectionError::ChannelClosed)?
    }};
}

impl<Role, PacketIdType> GenericEndpoint<Role, PacketIdType>
where
    Role: RoleType + Send + Sync,
    PacketIdType: IsPacketId + Send + Sync,
{
    pub fn builder(version: Version) -> GenericEndpointBuilder<Role, PacketIdType> {
        GenericEndpointBuilder::new(version)
    }

    /// Create an endpoint and spawn its event-loop task. The endpoint
    /// starts detached; [`Self::attach`] hands it a connected transport.
    pub fn new(version: Version) -> Self {
        let connection = GenericConnection::<Role, PacketIdType>::new(version);
        let (tx_send, rx_send) = mpsc::unbounded_channel();
        tokio::spawn(event_loop(connection, rx_send));
        Self {
            version,
            tx_send,
            _marker: PhantomData,
        }
    }

    /// The protocol version the endpoint was created with.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Attach an established transport with default options.
    pub async fn attach<T>(&self, transport: T, mode: Mode) -> Result<(), ConnectionError>
    where
        T: TransportOps + Send + 'static,
    {
        self.attach_with_options(transport, mode, GenericConnectionOption::default())
            .await
    }

    /// Attach an established transport, applying per-connection options and
    /// restoring any saved session state.
    pub async fn attach_with_options<T>(
        &self,
        transport: T,
        mode: Mode,
        options: GenericConnectionOption<PacketIdType>,
    ) -> Result<(), ConnectionError>
    where
        T: TransportOps + Send + 'static,
    {
        request!(self, Attach {
            transport: Box::new(transport),
            mode: mode,
            options: options,
        })
    }

    /// Gracefully close the attached transport.
    pub async fn close(&self) -> Result<(), ConnectionError> {
        request!(self, Close {})
    }

    /// Send a packet. The packet type must be sendable by this endpoint's
    /// role; protocol violations surface as `ConnectionError::Mqtt`.
    pub async fn send<T>(&self, packet: T) -> Result<(), ConnectionError>
    where
        T: Into<GenericPacket<PacketIdType>> + Sendable<Role, PacketIdType> + Send + 'static,
    {
        request!(self, Send {
            packet: Box::new(packet.into()),
        })
    }

    /// Receive the next packet.
    pub async fn recv(&self) -> Result<GenericPacket<PacketIdType>, ConnectionError> {
        self.recv_filtered(PacketFilter::Any).await
    }

    /// Receive the next packet matching `filter`; non-matching packets are
    /// discarded.
    pub async fn recv_filtered(
        &self,
        filter: PacketFilter,
    ) -> Result<GenericPacket<PacketIdType>, ConnectionError> {
        request!(self, Recv { filter: filter })
    }

    /// Acquire the smallest free packet id, failing when all are in use.
    pub async fn acquire_packet_id(&self) -> Result<PacketIdType, ConnectionError> {
        request!(self, AcquirePacketId {})
    }

    /// Acquire a packet id, suspending until one is released if none is
    /// free. Waiters are woken in FIFO order.
    pub async fn acquire_packet_id_when_available(
        &self,
    ) -> Result<PacketIdType, ConnectionError> {
        request!(self, AcquirePacketIdWhenAvailable {})
    }

    /// Claim a specific packet id.
    pub async fn register_packet_id(&self, packet_id: PacketIdType) -> Result<(), ConnectionError> {
        request!(self, RegisterPacketId {
            packet_id: packet_id,
        })
    }

    /// Return a packet id to the free pool.
    pub async fn release_packet_id(&self, packet_id: PacketIdType) -> Result<(), ConnectionError> {
        request!(self, ReleasePacketId {
            packet_id: packet_id,
        })
    }

    /// Snapshot the in-flight store, e.g. to persist session state.
    pub async fn get_stored_packets(
        &self,
    ) -> Result<Vec<GenericStorePacket<PacketIdType>>, ConnectionError> {
        request!(self, GetStoredPackets {})
    }

    /// Replace the in-flight store, e.g. after recreating an endpoint.
    pub async fn restore_stored_packets(
        &self,
        packets: Vec<GenericStorePacket<PacketIdType>>,
    ) -> Result<(), ConnectionError> {
        request!(self, RestoreStoredPackets { packets: packets })
    }

    /// Drop a stored PUBLISH by packet id, abandoning its redelivery.
    pub async fn erase_stored_publish(
        &self,
        packet_id: PacketIdType,
    ) -> Result<bool, ConnectionError> {
        request!(self, EraseStoredPublish {
            packet_id: packet_id,
        })
    }

    /// Store client-role QoS≥1 PUBLISHes sent while detached instead of
    /// failing them; they go out on session resumption.
    pub async fn set_offline_publish(&self, enabled: bool) -> Result<(), ConnectionError> {
        request!(self, SetOfflinePublish {
            offline_publish: enabled,
        })
    }

    pub async fn set_auto_pub_response(&self, enabled: bool) -> Result<(), ConnectionError> {
        request!(self, SetAutoPubResponse { enabled: enabled })
    }

    pub async fn set_auto_ping_response(&self, enabled: bool) -> Result<(), ConnectionError> {
        request!(self, SetAutoPingResponse { enabled: enabled })
    }

    pub async fn set_auto_map_topic_alias_send(
        &self,
        enabled: bool,
    ) -> Result<(), ConnectionError> {
        request!(self, SetAutoMapTopicAliasSend { enabled: enabled })
    }

    pub async fn set_auto_replace_topic_alias_send(
        &self,
        enabled: bool,
    ) -> Result<(), ConnectionError> {
        request!(self, SetAutoReplaceTopicAliasSend { enabled: enabled })
    }

    /// Packet ids of inbound QoS 2 PUBLISHes already answered with PUBREC.
    pub async fn get_qos2_publish_handled_pids(
        &self,
    ) -> Result<HashSet<PacketIdType>, ConnectionError> {
        request!(self, GetQos2PublishHandled {})
    }

    /// Remaining QoS≥1 sends before the peer's receive maximum is reached.
    pub async fn get_receive_maximum_vacancy_for_send(
        &self,
    ) -> Result<Option<u16>, ConnectionError> {
        request!(self, GetReceiveMaximumVacancyForSend {})
    }

    pub async fn get_protocol_version(&self) -> Result<Version, ConnectionError> {
        request!(self, GetProtocolVersion {})
    }

    /// Whether a QoS≥1 PUBLISH with this id is still in flight.
    pub async fn is_publish_processing(
        &self,
        packet_id: PacketIdType,
    ) -> Result<bool, ConnectionError> {
        request!(self, IsPublishProcessing {
            packet_id: packet_id,
        })
    }

    /// Normalize a PUBLISH for storage: full topic restored, alias dropped.
    pub async fn regulate_for_store(
        &self,
        packet: GenericPublish<PacketIdType>,
    ) -> Result<GenericPublish<PacketIdType>, ConnectionError> {
        request!(self, RegulateForStore { packet: packet })
    }
}

// ---- event loop -----------------------------------------------------------

/// Everything the event loop owns apart from the pieces the `select!` arms
/// must borrow independently (transport, read buffer, pending recv queue).
struct LoopState<Role, PacketIdType>
where
    Role: RoleType,
    PacketIdType: IsPacketId,
{
    connection: GenericConnection<Role, PacketIdType>,
    timer_tx: mpsc::UnboundedSender<TimerKind>,
    pingreq_send_timer: Option<tokio::task::JoinHandle<()>>,
    pingreq_recv_timer: Option<tokio::task::JoinHandle<()>>,
    pingresp_recv_timer: Option<tokio::task::JoinHandle<()>>,
    establish_timeout_tx: mpsc::UnboundedSender<()>,
    establish_timer: Option<tokio::task::JoinHandle<()>>,
    establish_mode: Option<Mode>,
    pending_packet_id_requests: PacketIdRequestVec<PacketIdType>,
    packet_queue: SendRequestVec<PacketIdType>,
    shutdown_timeout: Duration,
    bulk_write: bool,
}

async fn event_loop<Role, PacketIdType>(
    connection: GenericConnection<Role, PacketIdType>,
    mut rx_send: mpsc::UnboundedReceiver<RequestResponse<PacketIdType>>,
) where
    Role: RoleType + Send + Sync,
    PacketIdType: IsPacketId + Send + Sync,
{
    let (timer_tx, mut timer_rx) = mpsc::unbounded_channel();
    let (establish_timeout_tx, mut establish_timeout_rx) = mpsc::unbounded_channel();

    let mut state = LoopState {
        connection,
        timer_tx,
        pingreq_send_timer: None,
        pingreq_recv_timer: None,
        pingresp_recv_timer: None,
        establish_timeout_tx,
        establish_timer: None,
        establish_mode: None,
        pending_packet_id_requests: Vec::new(),
        packet_queue: Vec::new(),
        shutdown_timeout: Duration::from_secs(5),
        bulk_write: false,
    };

    let mut transport: DynTransport = None;
    let mut pending_recv_requests: RecvRequestVec<PacketIdType> = Vec::new();
    let mut recv_buffer_size = 4096usize;
    let mut read_buffer = vec![0u8; recv_buffer_size];
    let mut buffer_size = 0usize;
    let mut consumed_bytes = 0usize;

    loop {
        tokio::select! {
            request = rx_send.recv() => {
                let Some(request) = request else { break };
                match request {
                    RequestResponse::Send { packet, response_tx } if state.bulk_write => {
                        let mut batch = vec![(packet, response_tx)];
                        let mut followup = None;
                        while let Ok(next) = rx_send.try_recv() {
                            match next {
                                RequestResponse::Send { packet, response_tx } => {
                                    batch.push((packet, response_tx));
                                }
                                other => {
                                    followup = Some(other);
                                    break;
                                }
                            }
                        }
                        state
                            .handle_send_batch(batch, &mut transport, &mut pending_recv_requests)
                            .await;
                        if let Some(request) = followup {
                            state
                                .handle_request(
                                    request,
                                    &mut transport,
                                    &mut pending_recv_requests,
                                    (&mut recv_buffer_size, &mut read_buffer),
                                    (&mut buffer_size, &mut consumed_bytes),
                                )
                                .await;
                        }
                    }
                    request => {
                        state
                            .handle_request(
                                request,
                                &mut transport,
                                &mut pending_recv_requests,
                                (&mut recv_buffer_size, &mut read_buffer),
                                (&mut buffer_size, &mut consumed_bytes),
                            )
                            .await;
                    }
                }
            }

            timer_kind = timer_rx.recv() => {
                if let Some(kind) = timer_kind {
                    state.clear_timer_handle(kind);
                    let events = state.connection.notify_timer_fired(kind);
                    if state
                        .process_events(events, &mut transport, &mut pending_recv_requests)
                        .await
                        .is_err()
                    {
                        // keep-alive expiry is fatal for the connection
                        state
                            .handle_transport_gone(&mut transport, &mut pending_recv_requests)
                            .await;
                        buffer_size = 0;
                        consumed_bytes = 0;
                    }
                }
            }

            // read from the transport only while a recv is pending, so
            // back-pressure reaches the peer
            recv_result = async {
                if let Some(ref mut t) = transport {
                    if pending_recv_requests.is_empty() {
                        future::pending().await
                    } else if consumed_bytes < buffer_size {
                        // leftover bytes from the previous read
                        Some(Ok(0))
                    } else {
                        Some(t.recv(&mut read_buffer).await)
                    }
                } else {
                    future::pending().await
                }
            } => {
                match recv_result {
                    Some(Ok(n)) if n > 0 => {
                        buffer_size = n;
                        consumed_bytes = 0;
                        state
                            .process_read_buffer(
                                (&read_buffer[..buffer_size], &mut consumed_bytes),
                                &mut transport,
                                &mut pending_recv_requests,
                            )
                            .await;
                    }
                    Some(Ok(_)) => {
                        if consumed_bytes < buffer_size {
                            state
                                .process_read_buffer(
                                    (&read_buffer[..buffer_size], &mut consumed_bytes),
                                    &mut transport,
                                    &mut pending_recv_requests,
                                )
                                .await;
                        } else {
                            // the peer closed the connection
                            state
                                .handle_transport_gone(&mut transport, &mut pending_recv_requests)
                                .await;
                            buffer_size = 0;
                            consumed_bytes = 0;
                        }
                    }
                    Some(Err(error)) => {
                        tracing::debug!("transport recv failed: {error}");
                        state
                            .handle_transport_gone(&mut transport, &mut pending_recv_requests)
                            .await;
                        buffer_size = 0;
                        consumed_bytes = 0;
                    }
                    None => {}
                }
            }

            _ = establish_timeout_rx.recv() => {
                if state.establish_timer.take().is_some() {
                    state.establish_mode = None;
                    tracing::debug!("connection establish timeout expired");
                    for (_, tx) in pending_recv_requests.drain(..) {
                        let _ = tx.send(Err(ConnectionError::Transport(TransportError::Timeout)));
                    }
                    if let Some(ref mut t) = transport {
                        t.shutdown(state.shutdown_timeout).await;
                    }
                    let events = state.connection.notify_closed();
                    state.apply_quiet_events(events);
                    transport = None;
                    buffer_size = 0;
                    consumed_bytes = 0;
                }
            }
        }
    }

    for handle in [
        state.pingreq_send_timer.take(),
        state.pingreq_recv_timer.take(),
        state.pingresp_recv_timer.take(),
        state.establish_timer.take(),
    ]
    .into_iter()
    .flatten()
    {
        handle.abort();
    }
}

impl<Role, PacketIdType> LoopState<Role, PacketIdType>
where
    Role: RoleType + Send + Sync,
    PacketIdType: IsPacketId + Send + Sync,
{
    async fn handle_request(
        &mut self,
        request: RequestResponse<PacketIdType>,
        transport: &mut DynTransport,
        pending_recv_requests: &mut RecvRequestVec<PacketIdType>,
        buffer: (&mut usize, &mut Vec<u8>),
        buffer_pos: (&mut usize, &mut usize),
    ) {
        let (recv_buffer_size, read_buffer) = buffer;
        let (buffer_size, consumed_bytes) = buffer_pos;
        match request {
            RequestResponse::Send { packet, response_tx } => {
                self.handle_send_batch(vec![(packet, response_tx)], transport, pending_recv_requests)
                    .await;
            }
            RequestResponse::Recv { filter, response_tx } => {
                if transport.is_some() {
                    pending_recv_requests.push((filter, response_tx));
                } else {
                    let _ = response_tx.send(Err(ConnectionError::NotConnected));
                }
            }
            RequestResponse::AcquirePacketId { response_tx } => {
                let result = self
                    .connection
                    .acquire_packet_id()
                    .map_err(ConnectionError::Mqtt);
                let _ = response_tx.send(result);
            }
            RequestResponse::AcquirePacketIdWhenAvailable { response_tx } => {
                match self.connection.acquire_packet_id() {
                    Ok(packet_id) => {
                        let _ = response_tx.send(Ok(packet_id));
                    }
                    Err(_) => self.pending_packet_id_requests.push(response_tx),
                }
            }
            RequestResponse::RegisterPacketId { packet_id, response_tx } => {
                let result = self
                    .connection
                    .register_packet_id(packet_id)
                    .map_err(ConnectionError::Mqtt);
                let _ = response_tx.send(result);
            }
            RequestResponse::ReleasePacketId { packet_id, response_tx } => {
                let events = self.connection.release_packet_id(packet_id);
                let result = self
                    .process_events(events, transport, pending_recv_requests)
                    .await;
                let _ = response_tx.send(result);
            }
            RequestResponse::Attach { transport: new_transport, mode, options, response_tx } => {
                let establish_timeout_ms = *options.connection_establish_timeout_ms();
                self.apply_options(options, recv_buffer_size, read_buffer);
                *buffer_size = 0;
                *consumed_bytes = 0;
                if establish_timeout_ms > 0 {
                    self.establish_mode = Some(mode);
                    if let Some(handle) = self.establish_timer.take() {
                        handle.abort();
                    }
                    let tx = self.establish_timeout_tx.clone();
                    self.establish_timer = Some(tokio::spawn(async move {
                        sleep(Duration::from_millis(establish_timeout_ms)).await;
                        let _ = tx.send(());
                    }));
                }
                *transport = Some(new_transport);
                let _ = response_tx.send(Ok(()));
            }
            RequestResponse::Close { response_tx } => {
                self.handle_close(transport, pending_recv_requests).await;
                let _ = response_tx.send(Ok(()));
            }
            RequestResponse::GetStoredPackets { response_tx } => {
                let _ = response_tx.send(Ok(self.connection.get_stored_packets()));
            }
            RequestResponse::RestoreStoredPackets { packets, response_tx } => {
                self.connection.restore_packets(packets);
                let _ = response_tx.send(Ok(()));
            }
            RequestResponse::EraseStoredPublish { packet_id, response_tx } => {
                let _ = response_tx.send(Ok(self.connection.erase_stored_publish(packet_id)));
            }
            RequestResponse::SetOfflinePublish { offline_publish, response_tx } => {
                self.connection.set_offline_publish(offline_publish);
                let _ = response_tx.send(Ok(()));
            }
            RequestResponse::SetAutoPubResponse { enabled, response_tx } => {
                self.connection.set_auto_pub_response(enabled);
                let _ = response_tx.send(Ok(()));
            }
            RequestResponse::SetAutoPingResponse { enabled, response_tx } => {
                self.connection.set_auto_ping_response(enabled);
                let _ = response_tx.send(Ok(()));
            }
            RequestResponse::SetAutoMapTopicAliasSend { enabled, response_tx } => {
                self.connection.set_auto_map_topic_alias_send(enabled);
                let _ = response_tx.send(Ok(()));
            }
            RequestResponse::SetAutoReplaceTopicAliasSend { enabled, response_tx } => {
                self.connection.set_auto_replace_topic_alias_send(enabled);
                let _ = response_tx.send(Ok(()));
            }
            RequestResponse::GetQos2PublishHandled { response_tx } => {
                let _ = response_tx.send(Ok(self.connection.get_qos2_publish_handled()));
            }
            RequestResponse::GetReceiveMaximumVacancyForSend { response_tx } => {
                let _ =
                    response_tx.send(Ok(self.connection.get_receive_maximum_vacancy_for_send()));
            }
            RequestResponse::GetProtocolVersion { response_tx } => {
                let _ = response_tx.send(Ok(self.connection.get_protocol_version()));
            }
            RequestResponse::IsPublishProcessing { packet_id, response_tx } => {
                let _ = response_tx.send(Ok(self.connection.is_publish_processing(packet_id)));
            }
            RequestResponse::RegulateForStore { packet, response_tx } => {
                let result = self
                    .connection
                    .regulate_for_store(packet)
                    .map_err(ConnectionError::Mqtt);
                let _ = response_tx.send(result);
            }
        }
    }

    fn apply_options(
        &mut self,
        options: GenericConnectionOption<PacketIdType>,
        recv_buffer_size: &mut usize,
        read_buffer: &mut Vec<u8>,
    ) {
        self.connection
            .set_pingreq_send_interval(*options.pingreq_send_interval_ms());
        self.connection
            .set_auto_pub_response(*options.auto_pub_response());
        self.connection
            .set_auto_ping_response(*options.auto_ping_response());
        self.connection
            .set_auto_map_topic_alias_send(*options.auto_map_topic_alias_send());
        self.connection
            .set_auto_replace_topic_alias_send(*options.auto_replace_topic_alias_send());
        self.connection
            .set_pingresp_recv_timeout(*options.pingresp_recv_timeout_ms());
        self.shutdown_timeout = Duration::from_millis(*options.shutdown_timeout_ms());
        self.bulk_write = *options.bulk_write();
        if let Some(new_size) = *options.recv_buffer_size() {
            if new_size != *recv_buffer_size && new_size > 0 {
                *recv_buffer_size = new_size;
                *read_buffer = vec![0u8; new_size];
            }
        }
        let (restore_packets, restore_qos2) = options.into_restore_data();
        if !restore_packets.is_empty() {
            self.connection.restore_packets(restore_packets);
        }
        if !restore_qos2.is_empty() {
            self.connection.restore_qos2_publish_handled(restore_qos2);
        }
    }

    /// Whether this send must wait for receive-maximum vacancy. A QoS≥1
    /// PUBLISH beyond the peer's quota always queues behind earlier pending
    /// PUBLISHes; the caller's completion waits until the packet is written.
    fn should_queue(&self, packet: &GenericPacket<PacketIdType>) -> bool {
        packet.packet_type() == PacketType::Publish
            && packet.packet_id().is_some()
            && (self.connection.get_receive_maximum_vacancy_for_send() == Some(0)
                || !self.packet_queue.is_empty())
    }

    /// Run one or more Send commands through the connection. A batch of
    /// more than one command (bulk write) transmits every requested packet
    /// in a single scatter write.
    async fn handle_send_batch(
        &mut self,
        batch: SendRequestVec<PacketIdType>,
        transport: &mut DynTransport,
        pending_recv_requests: &mut RecvRequestVec<PacketIdType>,
    ) {
        if batch.len() == 1 {
            for (packet, response_tx) in batch {
                if transport.is_none() && !self.connection_accepts_detached_send(&packet) {
                    let _ = response_tx.send(Err(ConnectionError::NotConnected));
                    continue;
                }
                if self.should_queue(&packet) {
                    self.packet_queue.push((packet, response_tx));
                    continue;
                }
                let events = self.connection.send(*packet);
                let result = self
                    .process_events(events, transport, pending_recv_requests)
                    .await;
                let _ = response_tx.send(result);
            }
            return;
        }

        // bulk write: run every command through the connection first, then
        // one scatter write carrying all of the produced packets
        struct Entry<PacketIdType: IsPacketId> {
            response_tx: oneshot::Sender<Result<(), ConnectionError>>,
            error: Option<ConnectionError>,
            release_on_error: Vec<PacketIdType>,
        }
        let mut entries: Vec<Entry<PacketIdType>> = Vec::with_capacity(batch.len());
        let mut to_write: Vec<(usize, GenericPacket<PacketIdType>)> = Vec::new();

        for (packet, response_tx) in batch {
            let idx = entries.len();
            let mut entry = Entry {
                response_tx,
                error: None,
                release_on_error: Vec::new(),
            };
            if transport.is_none() && !self.connection_accepts_detached_send(&packet) {
                entry.error = Some(ConnectionError::NotConnected);
                entries.push(entry);
                continue;
            }
            if self.should_queue(&packet) {
                self.packet_queue.push((packet, entry.response_tx));
                continue;
            }
            for event in self.connection.send(*packet) {
                match event {
                    GenericEvent::RequestSendPacket {
                        packet,
                        release_packet_id_if_send_error,
                    } => {
                        if let Some(pid) = release_packet_id_if_send_error {
                            entry.release_on_error.push(pid);
                        }
                        to_write.push((idx, packet));
                    }
                    GenericEvent::RequestTimerReset { kind, duration_ms } => {
                        self.reset_timer(kind, duration_ms);
                    }
                    GenericEvent::RequestTimerCancel(kind) => self.cancel_timer(kind),
                    GenericEvent::NotifyError(error) => {
                        if entry.error.is_none() {
                            entry.error = Some(ConnectionError::Mqtt(error));
                        }
                    }
                    GenericEvent::NotifyPacketReceived(packet) => {
                        self.route_received(packet, pending_recv_requests);
                    }
                    GenericEvent::NotifyPacketIdReleased(_) => {
                        self.wake_packet_id_waiters();
                    }
                    GenericEvent::RequestClose => {
                        if let Some(ref mut t) = transport {
                            t.shutdown(self.shutdown_timeout).await;
                        }
                    }
                }
            }
            entries.push(entry);
        }

        let write_result = if to_write.is_empty() {
            Ok(())
        } else {
            match transport {
                Some(t) => {
                    let mut buffers = Vec::new();
                    for (_, packet) in &to_write {
                        buffers.extend(packet.to_buffers());
                    }
                    t.send(&buffers).await.map_err(ConnectionError::Transport)
                }
                None => Err(ConnectionError::NotConnected),
            }
        };

        if write_result.is_err() {
            tracing::debug!("bulk write failed");
            let mut release = Vec::new();
            for entry in &mut entries {
                if entry.error.is_none() {
                    entry.error = Some(ConnectionError::NotConnected);
                }
                release.append(&mut entry.release_on_error);
            }
            for pid in release {
                let events = self.connection.release_packet_id(pid);
                self.apply_quiet_events(events);
            }
            self.wake_packet_id_waiters();
        }
        for entry in entries {
            let result = match entry.error {
                Some(error) => Err(error),
                None => Ok(()),
            };
            let _ = entry.response_tx.send(result);
        }
    }

    /// Offline publish is the one send that works without a transport.
    fn connection_accepts_detached_send(&self, packet: &GenericPacket<PacketIdType>) -> bool {
        packet.packet_type() == PacketType::Publish
    }

    async fn handle_close(
        &mut self,
        transport: &mut DynTransport,
        pending_recv_requests: &mut RecvRequestVec<PacketIdType>,
    ) {
        if let Some(ref mut t) = transport {
            t.shutdown(self.shutdown_timeout).await;
        }
        self.handle_transport_gone(transport, pending_recv_requests)
            .await;
    }

    /// The transport is unusable: fail waiters, reset connection wire state.
    async fn handle_transport_gone(
        &mut self,
        transport: &mut DynTransport,
        pending_recv_requests: &mut RecvRequestVec<PacketIdType>,
    ) {
        for (_, tx) in pending_recv_requests.drain(..) {
            let _ = tx.send(Err(ConnectionError::NotConnected));
        }
        for (_, tx) in self.packet_queue.drain(..) {
            let _ = tx.send(Err(ConnectionError::NotConnected));
        }
        if let Some(handle) = self.establish_timer.take() {
            handle.abort();
        }
        self.establish_mode = None;
        let events = self.connection.notify_closed();
        self.apply_quiet_events(events);
        self.wake_packet_id_waiters();
        *transport = None;
    }

    /// Feed unconsumed read-buffer bytes to the connection (one packet per
    /// call) and act on the resulting events. A protocol failure on the
    /// inbound path fails every pending recv and drops the transport.
    async fn process_read_buffer(
        &mut self,
        buffer: (&[u8], &mut usize),
        transport: &mut DynTransport,
        pending_recv_requests: &mut RecvRequestVec<PacketIdType>,
    ) {
        let (data, consumed_bytes) = buffer;
        if *consumed_bytes >= data.len() {
            return;
        }
        let mut cursor = Cursor::new(&data[*consumed_bytes..]);
        let events = self.connection.recv(&mut cursor);
        *consumed_bytes += cursor.position() as usize;
        if let Err(error) = self
            .process_events(events, transport, pending_recv_requests)
            .await
        {
            let mqtt_error = match error {
                ConnectionError::Mqtt(e) => Some(e),
                _ => None,
            };
            for (_, tx) in pending_recv_requests.drain(..) {
                let _ = tx.send(Err(match mqtt_error {
                    Some(e) => ConnectionError::Mqtt(e),
                    None => ConnectionError::NotConnected,
                }));
            }
            self.handle_transport_gone(transport, pending_recv_requests)
                .await;
        }
    }

    /// Act on connection events: write packets, manage timers, route
    /// received packets, wake id waiters, close the transport.
    async fn process_events(
        &mut self,
        events: Vec<GenericEvent<PacketIdType>>,
        transport: &mut DynTransport,
        pending_recv_requests: &mut RecvRequestVec<PacketIdType>,
    ) -> Result<(), ConnectionError> {
        let mut first_error: Option<ConnectionError> = None;
        for event in events {
            match event {
                GenericEvent::RequestSendPacket {
                    packet,
                    release_packet_id_if_send_error,
                } => {
                    let result = match transport {
                        Some(t) => {
                            let buffers = packet.to_buffers();
                            t.send(&buffers).await.map_err(ConnectionError::Transport)
                        }
                        None => Err(ConnectionError::NotConnected),
                    };
                    if let Err(error) = result {
                        tracing::debug!("packet write failed: {error}");
                        if let Some(packet_id) = release_packet_id_if_send_error {
                            let release_events = self.connection.release_packet_id(packet_id);
                            self.apply_quiet_events(release_events);
                            self.wake_packet_id_waiters();
                        }
                        if first_error.is_none() {
                            first_error = Some(error);
                        }
                    }
                }
                GenericEvent::NotifyPacketReceived(packet) => {
                    self.cancel_establish_timer_on(&packet);
                    self.route_received(packet, pending_recv_requests);
                }
                GenericEvent::NotifyPacketIdReleased(_) => {
                    self.wake_packet_id_waiters();
                    self.drain_packet_queue(transport).await;
                }
                GenericEvent::RequestTimerReset { kind, duration_ms } => {
                    self.reset_timer(kind, duration_ms);
                }
                GenericEvent::RequestTimerCancel(kind) => {
                    self.cancel_timer(kind);
                }
                GenericEvent::RequestClose => {
                    if let Some(ref mut t) = transport {
                        t.shutdown(self.shutdown_timeout).await;
                    }
                }
                GenericEvent::NotifyError(error) => {
                    tracing::debug!("mqtt protocol error: {error}");
                    if first_error.is_none() {
                        first_error = Some(ConnectionError::Mqtt(error));
                    }
                }
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Apply events that need no transport access (timer cancels and id
    /// releases from a close path).
    fn apply_quiet_events(&mut self, events: Vec<GenericEvent<PacketIdType>>) {
        for event in events {
            match event {
                GenericEvent::RequestTimerCancel(kind) => self.cancel_timer(kind),
                GenericEvent::RequestTimerReset { kind, duration_ms } => {
                    self.reset_timer(kind, duration_ms)
                }
                GenericEvent::NotifyPacketIdReleased(_) => {}
                other => {
                    tracing::trace!("event ignored while closing: {other:?}");
                }
            }
        }
    }

    fn cancel_establish_timer_on(&mut self, packet: &GenericPacket<PacketIdType>) {
        let established = match self.establish_mode {
            Some(Mode::Client) => packet.packet_type() == PacketType::Connack,
            Some(Mode::Server) => packet.packet_type() == PacketType::Connect,
            None => false,
        };
        if established {
            if let Some(handle) = self.establish_timer.take() {
                handle.abort();
            }
            self.establish_mode = None;
        }
    }

    /// Deliver a packet to the oldest pending recv whose filter matches;
    /// otherwise the packet is discarded.
    fn route_received(
        &mut self,
        packet: GenericPacket<PacketIdType>,
        pending_recv_requests: &mut RecvRequestVec<PacketIdType>,
    ) {
        if let Some((filter, _)) = pending_recv_requests.first() {
            if filter.matches(&packet) {
                let (_, response_tx) = pending_recv_requests.remove(0);
                let _ = response_tx.send(Ok(packet));
                return;
            }
        }
        tracing::debug!(
            "discarding unclaimed {:?} packet",
            packet.packet_type()
        );
    }

    /// Hand released ids to FIFO waiters while ids are available.
    fn wake_packet_id_waiters(&mut self) {
        while !self.pending_packet_id_requests.is_empty() {
            match self.connection.acquire_packet_id() {
                Ok(packet_id) => {
                    let response_tx = self.pending_packet_id_requests.remove(0);
                    if response_tx.send(Ok(packet_id)).is_err() {
                        // the waiter was cancelled; return the id
                        let events = self.connection.release_packet_id(packet_id);
                        self.apply_quiet_events(events);
                    }
                }
                Err(_) => break,
            }
        }
    }

    /// Send queued PUBLISHes while receive-maximum vacancy allows.
    async fn drain_packet_queue(&mut self, transport: &mut DynTransport) {
        while !self.packet_queue.is_empty() {
            match self.connection.get_receive_maximum_vacancy_for_send() {
                Some(0) => break,
                _ => {}
            }
            let (packet, response_tx) = self.packet_queue.remove(0);
            let events = self.connection.send(*packet);
            let mut sent = true;
            for event in events {
                match event {
                    GenericEvent::RequestSendPacket { packet, .. } => {
                        let result = match transport {
                            Some(t) => {
                                let buffers = packet.to_buffers();
                                t.send(&buffers).await
                            }
                            None => Err(TransportError::NotConnected),
                        };
                        if result.is_err() {
                            sent = false;
                        }
                    }
                    GenericEvent::RequestTimerReset { kind, duration_ms } => {
                        self.reset_timer(kind, duration_ms);
                    }
                    GenericEvent::RequestTimerCancel(kind) => self.cancel_timer(kind),
                    GenericEvent::NotifyError(_) => sent = false,
                    _ => {}
                }
            }
            if sent {
                let _ = response_tx.send(Ok(()));
            } else {
                let _ = response_tx.send(Err(ConnectionError::NotConnected));
            }
        }
    }

    fn reset_timer(&mut self, kind: TimerKind, duration_ms: u64) {
        self.cancel_timer(kind);
        let timer_tx = self.timer_tx.clone();
        let handle = tokio::spawn(async move {
            sleep(Duration::from_millis(duration_ms)).await;
            let _ = timer_tx.send(kind);
        });
        match kind {
            TimerKind::PingreqSend => self.pingreq_send_timer = Some(handle),
            TimerKind::PingreqRecv => self.pingreq_recv_timer = Some(handle),
            TimerKind::PingrespRecv => self.pingresp_recv_timer = Some(handle),
        }
    }

    fn cancel_timer(&mut self, kind: TimerKind) {
        let slot = match kind {
            TimerKind::PingreqSend => &mut self.pingreq_send_timer,
            TimerKind::PingreqRecv => &mut self.pingreq_recv_timer,
            TimerKind::PingrespRecv => &mut self.pingresp_recv_timer,
        };
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }

    fn clear_timer_handle(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::PingreqSend => self.pingreq_send_timer = None,
            TimerKind::PingreqRecv => self.pingreq_recv_timer = None,
            TimerKind::PingrespRecv => self.pingresp_recv_timer = None,
        }
    }
}
