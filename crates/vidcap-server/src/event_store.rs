use std::collections::VecDeque;

use parking_lot::Mutex;
use serde_json::Value;
use vidcap_core::EventId;

pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Bounded in-memory log of messages sent on one stream, used to replay
/// what a reconnecting client missed. Oldest events fall off first.
pub struct EventStore {
    events: Mutex<VecDeque<(EventId, Value)>>,
    capacity: usize,
}

impl EventStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Record a message and return its id.
    pub fn append(&self, message: Value) -> EventId {
        let id = EventId::new();
        let mut events = self.events.lock();
        if events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back((id.clone(), message));
        id
    }

    /// Events recorded after `last`, oldest first. `None` when `last` is not
    /// (or no longer) in the store.
    pub fn replay_after(&self, last: &EventId) -> Option<Vec<(EventId, Value)>> {
        let events = self.events.lock();
        let pos = events.iter().position(|(id, _)| id == last)?;
        Some(events.iter().skip(pos + 1).cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
