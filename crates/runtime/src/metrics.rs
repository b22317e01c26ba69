use std::collections::BTreeMap;

/// Counter names used by the scene pipeline.
pub mod counters {
    pub const LOAD_FAILED: &str = "load.failed";
    pub const LOAD_SUCCEEDED: &str = "load.succeeded";
    pub const GEOMETRY_FAILED: &str = "geometry.failed";
    pub const GEOMETRY_FETCHED: &str = "geometry.fetched";
    pub const TEMPORAL_UNPARSEABLE: &str = "temporal.unparseable";
    pub const TEMPORAL_TRUNCATED: &str = "temporal.truncated";
    pub const UNKNOWN_VIZ: &str = "registry.unknown_viz";
    pub const COMPLETION_AFTER_TEARDOWN: &str = "completion.after_teardown";
    pub const COMPLETION_STALE: &str = "completion.stale";
    pub const LAYERS_REGENERATED: &str = "layers.regenerated";
    pub const LAYERS_REUSED: &str = "layers.reused";
    pub const SELECTION_CLEARED: &str = "selection.cleared";
}

/// Gauge names refreshed on every render.
pub mod gauges {
    pub const SCENE_LAYERS: &str = "scene.layers";
    pub const VISIBLE_SLICES: &str = "scene.visible_slices";
}

/// Deterministic counters and gauges.
///
/// Sorted maps keep snapshots stable for logs and assertions.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Metrics {
    counters: BTreeMap<String, u64>,
    gauges: BTreeMap<String, i64>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn inc_counter(&mut self, name: impl Into<String>, by: u64) {
        *self.counters.entry(name.into()).or_insert(0) += by;
    }

    pub fn gauge(&self, name: &str) -> Option<i64> {
        self.gauges.get(name).copied()
    }

    pub fn set_gauge(&mut self, name: impl Into<String>, value: i64) {
        self.gauges.insert(name.into(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::Metrics;

    #[test]
    fn counters_accumulate() {
        let mut m = Metrics::new();
        m.inc_counter("a", 1);
        m.inc_counter("a", 2);
        assert_eq!(m.counter("a"), 3);
        assert_eq!(m.counter("missing"), 0);
    }

    #[test]
    fn gauges_overwrite() {
        let mut m = Metrics::new();
        assert_eq!(m.gauge("layers"), None);
        m.set_gauge("layers", 4);
        m.set_gauge("layers", 2);
        assert_eq!(m.gauge("layers"), Some(2));
    }
}
