//! Rate limiting for values pushed outward at a fixed cadence.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

/// Coalesces rapid updates; only the latest value is released per tick, and
/// only if it differs from the last released value.
#[derive(Debug, Clone)]
pub struct Throttle<T> {
    pending: Option<T>,
    last_emitted: Option<T>,
}

impl<T> Default for Throttle<T> {
    fn default() -> Self {
        Self {
            pending: None,
            last_emitted: None,
        }
    }
}

impl<T: Clone + PartialEq> Throttle<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offer(&mut self, value: T) {
        self.pending = Some(value);
    }

    /// Records a value that reached the receiver by another route, so the
    /// next tick does not echo it back.
    pub fn mark_emitted(&mut self, value: T) {
        if self.pending.as_ref() == Some(&value) {
            self.pending = None;
        }
        self.last_emitted = Some(value);
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn tick(&mut self) -> Option<T> {
        let value = self.pending.take()?;
        if self.last_emitted.as_ref() == Some(&value) {
            return None;
        }
        self.last_emitted = Some(value.clone());
        Some(value)
    }
}

/// Periodic task driving a shared [`Throttle`]. Stopped on drop.
#[derive(Debug)]
pub struct Ticker {
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Spawns onto the current tokio runtime. `sink` receives each released value.
    pub fn spawn<T, F>(period: Duration, throttle: Arc<Mutex<Throttle<T>>>, mut sink: F) -> Self
    where
        T: Clone + PartialEq + Send + 'static,
        F: FnMut(T) + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let released = throttle.lock().tick();
                if let Some(value) = released {
                    sink(value);
                }
            }
        });
        Self {
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}
