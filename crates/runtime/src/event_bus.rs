use std::collections::VecDeque;

use foundation::ids::SliceId;

/// Structured scene event, kept in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// 0-based emission sequence number.
    pub seq: u64,
    pub kind: &'static str,
    pub slice: Option<SliceId>,
    pub message: String,
}

/// Events kept before the oldest are dropped.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Bounded event ring. Once full, each emit evicts the oldest event.
#[derive(Debug)]
pub struct EventBus {
    next_seq: u64,
    capacity: usize,
    dropped: u64,
    events: VecDeque<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            next_seq: 0,
            capacity,
            dropped: 0,
            events: VecDeque::with_capacity(capacity.min(DEFAULT_EVENT_CAPACITY)),
        }
    }

    pub fn emit(&mut self, kind: &'static str, slice: Option<SliceId>, message: impl Into<String>) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(Event {
            seq: self.next_seq,
            kind,
            slice,
            message: message.into(),
        });
        self.next_seq += 1;
    }

    pub fn events(&self) -> &VecDeque<Event> {
        &self.events
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events evicted because the ring was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Events of one kind, in emission order.
    pub fn of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.events.iter().filter(move |e| e.kind == kind)
    }

    /// Removes and returns the buffered events; sequence numbers keep counting.
    pub fn drain(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }
}
