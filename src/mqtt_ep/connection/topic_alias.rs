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

//! Bounded topic-alias maps, one per direction.
//!
//! Aliases are 1-based. The send map tracks recency so a full map can
//! overwrite its least-recently-used binding.

use std::collections::VecDeque;

use crate::mqtt_ep::common::HashMap;

/// Outbound alias assignments.
#[derive(Debug)]
pub(crate) struct TopicAliasSend {
    max: u16,
    by_alias: HashMap<u16, String>,
    by_topic: HashMap<String, u16>,
    // front = least recently used
    lru: VecDeque<u16>,
}

impl TopicAliasSend {
    pub(crate) fn new(max: u16) -> Self {
        Self {
            max,
            by_alias: HashMap::new(),
            by_topic: HashMap::new(),
            lru: VecDeque::new(),
        }
    }

    pub(crate) fn max(&self) -> u16 {
        self.max
    }

    /// Bind `alias` to `topic`, replacing any previous binding of either.
    pub(crate) fn insert_or_update(&mut self, topic: &str, alias: u16) {
        if alias == 0 || alias > self.max {
            return;
        }
        if let Some(old_topic) = self.by_alias.insert(alias, topic.to_owned()) {
            self.by_topic.remove(&old_topic);
        }
        if let Some(old_alias) = self.by_topic.insert(topic.to_owned(), alias) {
            if old_alias != alias {
                self.by_alias.remove(&old_alias);
                self.lru.retain(|a| *a != old_alias);
            }
        }
        self.touch(alias);
    }

    pub(crate) fn find_by_topic(&mut self, topic: &str) -> Option<u16> {
        let alias = self.by_topic.get(topic).copied()?;
        self.touch(alias);
        Some(alias)
    }

    pub(crate) fn find_by_alias(&self, alias: u16) -> Option<&str> {
        self.by_alias.get(&alias).map(String::as_str)
    }

    /// Next alias to use for a new topic: the first unused value, or the
    /// least-recently-used binding when the map is full.
    pub(crate) fn next_alias(&self) -> Option<u16> {
        if self.max == 0 {
            return None;
        }
        if (self.by_alias.len() as u16) < self.max {
            (1..=self.max).find(|a| !self.by_alias.contains_key(a))
        } else {
            self.lru.front().copied()
        }
    }

    fn touch(&mut self, alias: u16) {
        self.lru.retain(|a| *a != alias);
        self.lru.push_back(alias);
    }
}

/// Inbound alias bindings.
#[derive(Debug)]
pub(crate) struct TopicAliasRecv {
    max: u16,
    by_alias: HashMap<u16, String>,
}

impl TopicAliasRecv {
    pub(crate) fn new(max: u16) -> Self {
        Self {
            max,
            by_alias: HashMap::new(),
        }
    }

    pub(crate) fn max(&self) -> u16 {
        self.max
    }

    pub(crate) fn insert_or_update(&mut self, topic: &str, alias: u16) -> bool {
        if alias == 0 || alias > self.max {
            return false;
        }
        self.by_alias.insert(alias, topic.to_owned());
        true
    }

    pub(crate) fn find(&self, alias: u16) -> Option<&str> {
        self.by_alias.get(&alias).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_map_assigns_and_reuses() {
        let mut m = TopicAliasSend::new(2);
        assert_eq!(m.next_alias(), Some(1));
        m.insert_or_update("a", 1);
        assert_eq!(m.find_by_topic("a"), Some(1));
        assert_eq!(m.next_alias(), Some(2));
        m.insert_or_update("b", 2);

        // full: LRU is "a" (touched longest ago after we touch "b")
        m.find_by_topic("b");
        assert_eq!(m.next_alias(), Some(1));
        m.insert_or_update("c", 1);
        assert_eq!(m.find_by_topic("a"), None);
        assert_eq!(m.find_by_alias(1), Some("c"));
    }

    #[test]
    fn send_map_rebinds_topic() {
        let mut m = TopicAliasSend::new(5);
        m.insert_or_update("a", 1);
        m.insert_or_update("a", 2);
        assert_eq!(m.find_by_topic("a"), Some(2));
        assert_eq!(m.find_by_alias(1), None);
    }

    #[test]
    fn recv_map_bounds() {
        let mut m = TopicAliasRecv::new(1);
        assert!(m.insert_or_update("t", 1));
        assert!(!m.insert_or_update("t", 2));
        assert!(!m.insert_or_update("t", 0));
        assert_eq!(m.find(1), Some("t"));
        assert_eq!(m.find(2), None);
    }
}
