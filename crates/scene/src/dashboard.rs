//! The scene orchestrator.
//!
//! Recomputation is explicit: loads are issued as tagged requests, their
//! completions are applied one at a time, and `render` rebuilds only slices
//! whose memo key `(data revision, instant, opacity, selected region)` moved.

use std::collections::BTreeMap;
use std::sync::Arc;

use catalog::{
    DashboardConfig, Filter, InMemorySliceStore, Record, Slice, SliceStore, fingerprint, viz,
};
use foundation::ids::SliceId;
use foundation::time::{Granularity, Timestamp, local_now};
use layers::{
    FactoryRegistry, Layer, LayerOptions, LegendEngine, LegendEntry, SelectionContext,
    TemporalContext, Tooltip, feed_entries,
};
use runtime::{Diagnostics, Event, MountGuard, counters, gauges};
use serde_json::Value;
use streaming::{LoadError, RegionGeometry, TemporalSeries};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, info};

use crate::compositor::SceneCompositor;
use crate::events::{SceneEvent, channel_callbacks};
use crate::load::{Completion, LoadRequest, SceneLoader};
use crate::selection::{ChartModal, FeedPanel, SelectionStateManager};
use crate::settings::SceneSettings;
use crate::temporal::{Direction, TemporalIndex};
use crate::viewport::{ViewState, ViewportController};
use crate::visibility::{LayerOrder, VisibilityChange, VisibilitySet};

/// Last good data of one slice.
#[derive(Debug, Clone)]
pub struct SliceData {
    pub rows: Arc<Vec<Record>>,
    pub payload: Arc<Value>,
    pub series: Option<TemporalSeries>,
    pub geometry: Option<Arc<RegionGeometry>>,
    pub revision: u64,
}

#[derive(Debug, Clone, PartialEq)]
struct MemoKey {
    revision: u64,
    config: String,
    instant: Option<Timestamp>,
    granularity: Option<Granularity>,
    opacity_bits: u32,
    selected: Option<String>,
}

#[derive(Debug, Clone)]
struct Memo {
    key: MemoKey,
    layers: Vec<Layer>,
}

pub struct Dashboard {
    settings: SceneSettings,
    store: InMemorySliceStore,
    fingerprints: BTreeMap<SliceId, String>,
    filters: Vec<Filter>,
    registry: FactoryRegistry,
    loader: SceneLoader,
    data: BTreeMap<SliceId, SliceData>,
    order: LayerOrder,
    visibility: VisibilitySet,
    opacity: BTreeMap<SliceId, f32>,
    temporal: TemporalIndex,
    selection: SelectionStateManager,
    viewport: ViewportController,
    compositor: SceneCompositor,
    memo: BTreeMap<SliceId, Memo>,
    generations: BTreeMap<SliceId, u64>,
    next_generation: u64,
    next_revision: u64,
    needs_reload: bool,
    mount: MountGuard,
    diagnostics: Diagnostics,
    events_tx: UnboundedSender<SceneEvent>,
    events_rx: UnboundedReceiver<SceneEvent>,
    tooltip: Option<Tooltip>,
    clock: fn() -> Timestamp,
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("slices", &self.store.ids())
            .field("order", &self.order)
            .field("instant", &self.temporal.current_instant())
            .field("mounted", &self.mount.is_mounted())
            .finish()
    }
}

impl Dashboard {
    pub fn new(config: DashboardConfig, loader: SceneLoader, settings: SceneSettings) -> Self {
        let (events_tx, events_rx) = unbounded_channel();
        let mut dashboard = Self {
            viewport: ViewportController::new(
                settings.min_zoom,
                settings.max_zoom,
                settings.viewport_px,
            ),
            compositor: SceneCompositor::new(settings.elevation_scale, settings.max_pitch),
            settings,
            store: InMemorySliceStore::new(),
            fingerprints: BTreeMap::new(),
            filters: Vec::new(),
            registry: FactoryRegistry::with_defaults(),
            loader,
            data: BTreeMap::new(),
            order: LayerOrder::new(),
            visibility: VisibilitySet::new(),
            opacity: BTreeMap::new(),
            temporal: TemporalIndex::default(),
            selection: SelectionStateManager::new(),
            memo: BTreeMap::new(),
            generations: BTreeMap::new(),
            next_generation: 0,
            next_revision: 0,
            needs_reload: false,
            mount: MountGuard::new(),
            diagnostics: Diagnostics::new(),
            events_tx,
            events_rx,
            tooltip: None,
            clock: local_now,
        };
        dashboard.set_config(config);
        dashboard
    }

    pub fn with_registry(mut self, registry: FactoryRegistry) -> Self {
        self.registry = registry;
        self.memo.clear();
        self
    }

    /// Replaces the wall clock used to place the initial time cursor.
    pub fn with_clock(mut self, clock: fn() -> Timestamp) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &SceneSettings {
        &self.settings
    }

    pub fn slice(&self, id: SliceId) -> Option<&Slice> {
        self.store.get(id)
    }

    pub fn slices(&self) -> Vec<&Slice> {
        self.store.list()
    }

    /// Reconciles the slice set and filters. Removed slices lose all state;
    /// changed ones regenerate their layers on the next render and reload on
    /// the next `load_requests`.
    pub fn set_config(&mut self, config: DashboardConfig) {
        let keep: Vec<SliceId> = config.slices.iter().map(|s| s.id).collect();
        for id in self.store.ids() {
            if !keep.contains(&id) {
                self.remove_slice(id);
            }
        }
        for slice in config.slices {
            self.visibility
                .register(slice.id, slice.config.toggle_group.as_deref());
            self.opacity.entry(slice.id).or_insert(1.0);
            self.fingerprints.insert(slice.id, fingerprint(&slice));
            self.store.upsert(slice);
        }
        self.filters = config.filters;
        self.needs_reload = true;
    }

    fn remove_slice(&mut self, id: SliceId) {
        if self.selection.clear(id) {
            self.diagnostics
                .trace(counters::SELECTION_CLEARED, Some(id), "slice removed");
        }
        let _ = self.store.remove(id);
        self.fingerprints.remove(&id);
        self.visibility.unregister(id);
        self.order.remove(id);
        self.opacity.remove(&id);
        self.data.remove(&id);
        self.memo.remove(&id);
        self.generations.remove(&id);
        self.loader.data_loader().forget(id);
        self.rebuild_temporal();
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn set_filters(&mut self, filters: Vec<Filter>) {
        if self.filters != filters {
            self.filters = filters;
            self.needs_reload = true;
        }
    }

    pub fn needs_reload(&self) -> bool {
        self.needs_reload
    }

    pub fn loader(&self) -> &SceneLoader {
        &self.loader
    }

    /// One request per slice; earlier in-flight requests become stale.
    pub fn load_requests(&mut self) -> Vec<LoadRequest> {
        self.needs_reload = false;
        let slices: Vec<Slice> = self.store.list().into_iter().cloned().collect();
        slices
            .into_iter()
            .map(|slice| {
                self.next_generation += 1;
                self.generations.insert(slice.id, self.next_generation);
                LoadRequest {
                    slice,
                    filters: self.filters.clone(),
                    generation: self.next_generation,
                }
            })
            .collect()
    }

    /// Applies one completion. Returns whether scene state changed.
    ///
    /// Completions after teardown or superseded by a newer request are
    /// dropped. Failures keep the slice's previous data.
    pub fn apply_completion(&mut self, completion: Completion) -> bool {
        let Completion {
            slice_id,
            generation,
            result,
        } = completion;

        if !self.mount.is_mounted() {
            self.diagnostics.trace(
                counters::COMPLETION_AFTER_TEARDOWN,
                Some(slice_id),
                "completion after teardown ignored",
            );
            return false;
        }
        if self.generations.get(&slice_id) != Some(&generation) {
            self.diagnostics.trace(
                counters::COMPLETION_STALE,
                Some(slice_id),
                format!("stale completion (generation {generation})"),
            );
            return false;
        }

        let loaded = match result {
            Ok(r) => r,
            Err(e) => {
                let kind = match &e {
                    LoadError::Geometry(_) => counters::GEOMETRY_FAILED,
                    _ => counters::LOAD_FAILED,
                };
                self.diagnostics.warn(kind, Some(slice_id), e.to_string());
                return false;
            }
        };
        let Some(slice) = self.store.get(slice_id).cloned() else {
            return false;
        };

        if loaded.loaded.unparseable_dates > 0 {
            self.diagnostics.warn(
                counters::TEMPORAL_UNPARSEABLE,
                Some(slice_id),
                format!("{} rows with unparseable dates excluded", loaded.loaded.unparseable_dates),
            );
        }
        if !self.registry.contains(&slice.visualization_type) {
            self.diagnostics.warn(
                counters::UNKNOWN_VIZ,
                Some(slice_id),
                format!("no layer factory for {}", slice.visualization_type),
            );
        }
        if loaded.geometry.is_some() {
            self.diagnostics
                .trace(counters::GEOMETRY_FETCHED, Some(slice_id), "geometry ready");
        }

        self.next_revision += 1;
        let streaming::LoadedSlice {
            payload,
            records,
            series,
            ..
        } = loaded.loaded;
        self.data.insert(
            slice_id,
            SliceData {
                rows: Arc::new(records),
                payload: Arc::new(payload),
                series,
                geometry: loaded.geometry,
                revision: self.next_revision,
            },
        );
        self.order.append_if_absent(slice_id);
        self.diagnostics
            .trace(counters::LOAD_SUCCEEDED, Some(slice_id), "slice loaded");

        self.rebuild_temporal();
        self.refilter_selection();
        true
    }

    /// Issues every load, waits for all of them and applies the results.
    pub async fn refresh(&mut self) -> usize {
        let requests = self.load_requests();
        let loader = self.loader.clone();
        let completions = loader.run_all(requests).await;
        let mut applied = 0;
        for completion in completions {
            debug!(slice = %completion.slice_id, generation = completion.generation, "load completed");
            if self.apply_completion(completion) {
                applied += 1;
            }
        }
        applied
    }

    fn rebuild_temporal(&mut self) {
        let store = &self.store;
        let inputs: Vec<_> = self
            .data
            .iter()
            .filter_map(|(id, d)| {
                let slice = store.get(*id)?;
                Some((slice.config.granularity(), d.series.as_ref()?))
            })
            .collect();
        self.temporal.rebuild(inputs, (self.clock)());
        if self.temporal.is_truncated() {
            self.diagnostics.warn(
                counters::TEMPORAL_TRUNCATED,
                None,
                format!(
                    "time axis cut off after {} {:?} steps",
                    self.temporal.dates().len(),
                    self.temporal.granularity()
                ),
            );
        }
    }

    fn instant_for(&self, slice: &Slice) -> Option<Timestamp> {
        if slice.is_temporal() {
            self.temporal.current_instant()
        } else {
            None
        }
    }

    fn refilter_selection(&mut self) {
        let store = &self.store;
        let data = &self.data;
        let instant = self.temporal.current_instant();
        self.selection.refilter(|id, key| {
            match (store.get(id), data.get(&id)) {
                (Some(slice), Some(d)) => {
                    let at = instant.filter(|_| slice.is_temporal());
                    feed_entries(&d.rows, &slice.config, key, at)
                }
                _ => Vec::new(),
            }
        });
    }

    pub fn temporal(&self) -> &TemporalIndex {
        &self.temporal
    }

    pub fn current_instant(&self) -> Option<Timestamp> {
        self.temporal.current_instant()
    }

    pub fn step_time(&mut self, direction: Direction) -> bool {
        let moved = self.temporal.step(direction);
        if moved {
            self.refilter_selection();
        }
        moved
    }

    pub fn set_instant(&mut self, t: Timestamp) -> bool {
        let moved = self.temporal.set_current(t);
        if moved {
            self.refilter_selection();
        }
        moved
    }

    pub fn order(&self) -> &[SliceId] {
        self.order.as_slice()
    }

    pub fn is_visible(&self, id: SliceId) -> bool {
        self.visibility.is_visible(id)
    }

    /// Hidden slices have their selection cleared before anything else
    /// happens for this change.
    pub fn set_visible(&mut self, id: SliceId, visible: bool) -> VisibilityChange {
        let change = self.visibility.set_visible(id, visible);
        for hidden in &change.hidden {
            if self.selection.clear(*hidden) {
                self.diagnostics.trace(
                    counters::SELECTION_CLEARED,
                    Some(*hidden),
                    "selection cleared on hide",
                );
            }
        }
        change
    }

    pub fn toggle_visibility(&mut self, id: SliceId) -> VisibilityChange {
        let next = !self.visibility.is_visible(id);
        self.set_visible(id, next)
    }

    /// Moves a slice in the z-order. A hidden slice that moves loses its
    /// memoized layers so it is rebuilt when shown again.
    pub fn move_slice(&mut self, from: usize, to: usize) -> Option<SliceId> {
        let id = self.order.move_slice(from, to)?;
        if !self.visibility.is_visible(id) {
            self.memo.remove(&id);
        }
        Some(id)
    }

    pub fn set_opacity(&mut self, id: SliceId, opacity: f32) {
        if let Some(o) = self.opacity.get_mut(&id) {
            *o = opacity.clamp(0.0, 1.0);
        }
    }

    pub fn opacity(&self, id: SliceId) -> f32 {
        self.opacity.get(&id).copied().unwrap_or(1.0)
    }

    pub fn viewport(&self) -> &ViewportController {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut ViewportController {
        &mut self.viewport
    }

    /// Starts propagating viewport changes outward at the configured tick.
    pub fn start_viewport_sync<F>(&mut self, sink: F)
    where
        F: FnMut(ViewState) + Send + 'static,
    {
        let period = self.settings.viewport_tick();
        self.viewport.start(period, sink);
    }

    pub fn pan_to_region(&mut self, id: SliceId, region_key: &str) -> Option<ViewState> {
        let slice = self.store.get(id)?;
        let geometry = self.data.get(&id)?.geometry.clone()?;
        let feature = geometry.feature_by_key(slice.config.feature_key(), region_key)?;
        self.viewport.pan_to_feature(feature)
    }

    /// Drains pending interaction events. Returns how many were handled.
    pub fn handle_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            handled += 1;
            if !self.mount.is_mounted() {
                continue;
            }
            match event {
                SceneEvent::Tooltip(tip) => self.tooltip = tip,
                SceneEvent::AddFilter { slice_id, filter } => {
                    debug!(slice = %slice_id, column = %filter.col, "filter added from layer");
                    if !self.filters.contains(&filter) {
                        self.filters.push(filter);
                        self.needs_reload = true;
                    }
                }
                SceneEvent::RegionClicked(click) => {
                    let Some(slice) = self.store.get(click.slice_id).cloned() else {
                        continue;
                    };
                    let Some(data) = self.data.get(&click.slice_id) else {
                        continue;
                    };
                    if slice.visualization_type == viz::REGION_FEED {
                        let entries = feed_entries(
                            &data.rows,
                            &slice.config,
                            &click.region_key,
                            self.instant_for(&slice),
                        );
                        self.selection.click_region(
                            slice.id,
                            &click.region_key,
                            click.region_name,
                            entries,
                        );
                    } else {
                        let rows = data.rows.clone();
                        self.selection.open_chart(
                            &slice,
                            &click.region_key,
                            click.region_name.as_deref(),
                            &rows,
                        );
                    }
                }
            }
        }
        handled
    }

    fn memo_key(&self, slice: &Slice, data: &SliceData) -> MemoKey {
        MemoKey {
            revision: data.revision,
            config: self.fingerprints.get(&slice.id).cloned().unwrap_or_default(),
            instant: self.instant_for(slice),
            granularity: slice
                .is_temporal()
                .then(|| self.temporal.granularity()),
            opacity_bits: self.opacity(slice.id).to_bits(),
            selected: self.selection.selected_key(slice.id).map(str::to_string),
        }
    }

    fn layer_options(&self, slice: &Slice, data: &SliceData) -> LayerOptions {
        let temporal = slice.config.temporal_column.as_deref().and_then(|column| {
            Some(TemporalContext {
                column: column.to_string(),
                current_instant: self.temporal.current_instant()?,
                granularity: self.temporal.granularity(),
                full_rows: data.rows.clone(),
            })
        });
        let rows = match (
            slice.config.temporal_column.as_deref(),
            self.temporal.current_instant(),
        ) {
            (Some(column), Some(_)) => Arc::new(self.temporal.current_rows(&data.rows, column)),
            _ => data.rows.clone(),
        };
        let mut options = LayerOptions::new(slice.id, slice.config.clone(), data.payload.clone(), rows);
        options.callbacks = channel_callbacks(&self.events_tx);
        options.geometry = data.geometry.clone();
        options.temporal = temporal;
        options.viewport = Some(self.viewport.state().hint());
        options.selection = Some(SelectionContext {
            selected_region: self.selection.selected_key(slice.id).map(str::to_string),
        });
        options.opacity = self.opacity(slice.id);
        options.style = self.settings.layer_style();
        options
    }

    /// Regenerates stale visible slices and composes the render list.
    pub fn render(&mut self) -> Vec<Layer> {
        let visible = self.visibility.visible_in(&self.order);
        for id in &visible {
            let (Some(slice), Some(data)) = (self.store.get(*id), self.data.get(id)) else {
                continue;
            };
            let key = self.memo_key(slice, data);
            if self.memo.get(id).is_some_and(|m| m.key == key) {
                self.diagnostics
                    .trace(counters::LAYERS_REUSED, Some(*id), "layers reused");
                continue;
            }
            let options = self.layer_options(slice, data);
            let layers = self.registry.produce(&slice.visualization_type, &options);
            self.diagnostics.trace(
                counters::LAYERS_REGENERATED,
                Some(*id),
                format!("{} layers", layers.len()),
            );
            self.memo.insert(*id, Memo { key, layers });
        }

        let by_slice: BTreeMap<SliceId, Vec<Layer>> = visible
            .iter()
            .filter_map(|id| Some((*id, self.memo.get(id)?.layers.clone())))
            .collect();
        let layers = self
            .compositor
            .compose(&visible, &by_slice, self.viewport.state().pitch);
        self.diagnostics
            .set_gauge(gauges::VISIBLE_SLICES, visible.len() as i64);
        self.diagnostics
            .set_gauge(gauges::SCENE_LAYERS, layers.len() as i64);
        layers
    }

    /// Last produced layers of a slice, if any.
    pub fn layers_for(&self, id: SliceId) -> Option<&[Layer]> {
        self.memo.get(&id).map(|m| m.layers.as_slice())
    }

    pub fn legend(&self, id: SliceId) -> Vec<LegendEntry> {
        self.layers_for(id)
            .and_then(|layers| layers.first())
            .and_then(|l| l.metadata.as_ref())
            .map(|m| LegendEngine.build_legend(m))
            .unwrap_or_default()
    }

    pub fn data(&self, id: SliceId) -> Option<&SliceData> {
        self.data.get(&id)
    }

    pub fn selection(&self) -> &SelectionStateManager {
        &self.selection
    }

    pub fn side_panel(&self, id: SliceId) -> Option<FeedPanel> {
        let slice = self.store.get(id)?;
        self.selection
            .side_panel(slice, slice.config.granularity())
    }

    /// Closes the feed side panel of `id`.
    pub fn close_panel(&mut self, id: SliceId) -> bool {
        self.selection.clear(id)
    }

    pub fn chart(&self) -> Option<&ChartModal> {
        self.selection.chart()
    }

    pub fn close_chart(&mut self) -> bool {
        self.selection.close_chart()
    }

    pub fn tooltip(&self) -> Option<&Tooltip> {
        self.tooltip.as_ref()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn drain_diagnostics(&mut self) -> Vec<Event> {
        self.diagnostics.drain_events()
    }

    pub fn mount_guard(&self) -> MountGuard {
        self.mount.clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.mount.is_mounted()
    }

    /// Clears selections, stops the viewport tick and turns every later
    /// completion into a no-op. In-flight loads are left to finish.
    pub fn teardown(&mut self) {
        if !self.mount.unmount() {
            return;
        }
        self.selection.teardown();
        self.viewport.stop();
        self.tooltip = None;
        info!("scene torn down");
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.teardown();
    }
}
