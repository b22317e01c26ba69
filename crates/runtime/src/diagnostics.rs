//! Observable channel for tolerated failures.
//!
//! Absorbed load errors, unparseable dates and unknown visualization types do
//! not change what the user sees, but each one lands here as a counter bump, a
//! structured event and a `tracing` record.

use std::collections::VecDeque;

use foundation::ids::SliceId;
use tracing::{debug, warn};

use crate::event_bus::{Event, EventBus};
use crate::metrics::Metrics;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Severity {
    Trace,
    Warn,
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    bus: EventBus,
    metrics: Metrics,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps at most `capacity` events; counters are unbounded.
    pub fn with_event_capacity(capacity: usize) -> Self {
        Self {
            bus: EventBus::with_capacity(capacity),
            metrics: Metrics::new(),
        }
    }

    pub fn record(
        &mut self,
        severity: Severity,
        kind: &'static str,
        slice: Option<SliceId>,
        message: impl Into<String>,
    ) {
        let message = message.into();
        match (severity, slice) {
            (Severity::Warn, Some(id)) => warn!(kind, slice = %id, "{message}"),
            (Severity::Warn, None) => warn!(kind, "{message}"),
            (Severity::Trace, Some(id)) => debug!(kind, slice = %id, "{message}"),
            (Severity::Trace, None) => debug!(kind, "{message}"),
        }
        self.metrics.inc_counter(kind, 1);
        self.bus.emit(kind, slice, message);
    }

    pub fn warn(&mut self, kind: &'static str, slice: Option<SliceId>, message: impl Into<String>) {
        self.record(Severity::Warn, kind, slice, message);
    }

    pub fn trace(&mut self, kind: &'static str, slice: Option<SliceId>, message: impl Into<String>) {
        self.record(Severity::Trace, kind, slice, message);
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.metrics.counter(name)
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn set_gauge(&mut self, name: &'static str, value: i64) {
        self.metrics.set_gauge(name, value);
    }

    pub fn events(&self) -> &VecDeque<Event> {
        self.bus.events()
    }

    /// Events evicted from the bounded buffer; counters still saw them.
    pub fn dropped_events(&self) -> u64 {
        self.bus.dropped()
    }

    pub fn events_of<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.bus.of_kind(kind)
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        self.bus.drain()
    }
}
