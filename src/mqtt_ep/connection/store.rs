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

use crate::mqtt_ep::packet::{GenericStorePacket, IsPacketId, PacketType};

/// In-flight store for QoS 1/2 exchanges.
///
/// Holds PUBLISH (QoS≥1) and PUBREL packets in insertion order, keyed by
/// packet id. The order is what session resumption replays.
#[derive(Debug)]
pub(crate) struct Store<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    packets: Vec<GenericStorePacket<PacketIdType>>,
}

impl<PacketIdType> Store<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    pub(crate) fn new() -> Self {
        Self {
            packets: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, packet: GenericStorePacket<PacketIdType>) {
        self.packets.push(packet);
    }

    /// Erase the entry of the given kind and id. Returns whether one existed.
    pub(crate) fn erase(&mut self, packet_type: PacketType, packet_id: PacketIdType) -> bool {
        let before = self.packets.len();
        self.packets
            .retain(|p| !(p.packet_type() == packet_type && p.packet_id() == packet_id));
        self.packets.len() != before
    }

    /// Erase a stored PUBLISH regardless of QoS stage.
    pub(crate) fn erase_publish(&mut self, packet_id: PacketIdType) -> bool {
        self.erase(PacketType::Publish, packet_id)
    }

    pub(crate) fn contains(&self, packet_type: PacketType, packet_id: PacketIdType) -> bool {
        self.packets
            .iter()
            .any(|p| p.packet_type() == packet_type && p.packet_id() == packet_id)
    }

    pub(crate) fn contains_id(&self, packet_id: PacketIdType) -> bool {
        self.packets.iter().any(|p| p.packet_id() == packet_id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &GenericStorePacket<PacketIdType>> {
        self.packets.iter()
    }

    pub(crate) fn get_all(&self) -> Vec<GenericStorePacket<PacketIdType>> {
        self.packets.clone()
    }

    pub(crate) fn restore(&mut self, packets: Vec<GenericStorePacket<PacketIdType>>) {
        self.packets = packets;
    }

    pub(crate) fn clear(&mut self) {
        self.packets.clear();
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mqtt_ep::packet::{v5_0, Qos};

    fn publish(id: u16) -> GenericStorePacket<u16> {
        GenericStorePacket::V5_0Publish(
            v5_0::Publish::builder()
                .topic_name("t")
                .unwrap()
                .packet_id(id)
                .qos(Qos::AtLeastOnce)
                .payload("p")
                .build()
                .unwrap(),
        )
    }

    fn pubrel(id: u16) -> GenericStorePacket<u16> {
        GenericStorePacket::V5_0Pubrel(v5_0::Pubrel::new(id).unwrap())
    }

    #[test]
    fn insertion_order_preserved() {
        let mut store = Store::new();
        store.add(publish(2));
        store.add(publish(1));
        store.add(pubrel(3));
        let ids: Vec<u16> = store.iter().map(|p| p.packet_id()).collect();
        assert_eq!(ids, [2, 1, 3]);
    }

    #[test]
    fn erase_is_kind_aware() {
        let mut store = Store::new();
        store.add(publish(1));
        store.add(pubrel(1));
        assert!(store.erase(PacketType::Pubrel, 1));
        assert!(store.contains(PacketType::Publish, 1));
        assert!(store.erase_publish(1));
        assert!(store.is_empty());
        assert!(!store.erase_publish(1));
    }
}
