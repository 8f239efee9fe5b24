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

use std::collections::BTreeSet;

use crate::mqtt_ep::packet::IsPacketId;

/// Packet identifier allocator.
///
/// Keeps the set of ids currently in use and hands out the numerically
/// smallest free id. Id zero is reserved "none" and never allocated.
#[derive(Debug, Default)]
pub(crate) struct PacketIdManager<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    used: BTreeSet<PacketIdType>,
}

impl<PacketIdType> PacketIdManager<PacketIdType>
where
    PacketIdType: IsPacketId,
{
    pub(crate) fn new() -> Self {
        Self {
            used: BTreeSet::new(),
        }
    }

    /// Smallest free id, or `None` when every id is taken.
    pub(crate) fn acquire_unique(&mut self) -> Option<PacketIdType> {
        let mut expect = 1u64;
        for id in &self.used {
            if id.to_u64() != expect {
                break;
            }
            expect += 1;
        }
        if expect > PacketIdType::max_value().to_u64() {
            return None;
        }
        let id = PacketIdType::from_u64(expect)?;
        self.used.insert(id);
        Some(id)
    }

    /// Force-claim a specific id. Fails when the id is zero or taken.
    pub(crate) fn register(&mut self, id: PacketIdType) -> bool {
        if id.is_zero() {
            return false;
        }
        self.used.insert(id)
    }

    /// Returns whether the id was actually in use.
    pub(crate) fn release(&mut self, id: PacketIdType) -> bool {
        self.used.remove(&id)
    }

    pub(crate) fn is_used(&self, id: PacketIdType) -> bool {
        self.used.contains(&id)
    }

    pub(crate) fn clear(&mut self) {
        self.used.clear();
    }

    pub(crate) fn used_ids(&self) -> impl Iterator<Item = PacketIdType> + '_ {
        self.used.iter().copied()
    }
}
