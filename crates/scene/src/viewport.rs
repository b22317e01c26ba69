//! Camera state and its boundary with the external viewport collaborator.

use std::sync::Arc;
use std::time::Duration;

use foundation::bounds::Aabb2;
use layers::ViewportHint;
use parking_lot::Mutex;
use runtime::{Throttle, Ticker};
use serde::{Deserialize, Serialize};
use streaming::RegionFeature;

/// Web-mercator tile size the zoom levels refer to.
const TILE_PX: f64 = 512.0;

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub longitude: f64,
    pub latitude: f64,
    pub zoom: f64,
    pub bearing: f64,
    pub pitch: f64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            longitude: 0.0,
            latitude: 0.0,
            zoom: 2.0,
            bearing: 0.0,
            pitch: 0.0,
        }
    }
}

impl ViewState {
    pub fn hint(&self) -> ViewportHint {
        ViewportHint {
            center: foundation::math::Vec2::new(self.longitude, self.latitude),
            zoom: self.zoom,
            pitch: self.pitch,
        }
    }
}

/// Zoom at which `bounds` (degrees) fills `viewport_px` with 10% padding.
pub fn fit_zoom(bounds: &Aabb2, viewport_px: [f64; 2]) -> Option<f64> {
    let w = bounds.width().max(1e-9);
    let h = bounds.height().max(1e-9);
    let zx = (viewport_px[0] * 360.0 / (w * TILE_PX)).log2();
    let zy = (viewport_px[1] * 180.0 / (h * TILE_PX)).log2();
    let z = zx.min(zy) - 1.1f64.log2();
    z.is_finite().then_some(z)
}

pub struct ViewportController {
    state: ViewState,
    min_zoom: f64,
    max_zoom: f64,
    viewport_px: [f64; 2],
    throttle: Arc<Mutex<Throttle<ViewState>>>,
    ticker: Option<Ticker>,
}

impl std::fmt::Debug for ViewportController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewportController")
            .field("state", &self.state)
            .field("ticking", &self.is_ticking())
            .finish()
    }
}

impl ViewportController {
    pub fn new(min_zoom: f64, max_zoom: f64, viewport_px: [f64; 2]) -> Self {
        Self {
            state: ViewState::default(),
            min_zoom,
            max_zoom: max_zoom.max(min_zoom),
            viewport_px,
            throttle: Arc::new(Mutex::new(Throttle::new())),
            ticker: None,
        }
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    fn clamp(&self, mut vs: ViewState) -> ViewState {
        vs.zoom = vs.zoom.clamp(self.min_zoom, self.max_zoom);
        vs.pitch = vs.pitch.clamp(0.0, 85.0);
        vs.latitude = vs.latitude.clamp(-85.0, 85.0);
        vs
    }

    /// A camera change from user interaction; queued for the outward tick.
    pub fn on_interaction(&mut self, vs: ViewState) {
        self.state = self.clamp(vs);
        self.throttle.lock().offer(self.state);
    }

    /// A camera change pushed in by the external collaborator; not echoed back.
    pub fn apply_external(&mut self, vs: ViewState) {
        self.state = self.clamp(vs);
        self.throttle.lock().mark_emitted(self.state);
    }

    /// Centers on the feature's bounds at a fitting zoom. Bearing and pitch
    /// are kept.
    pub fn pan_to_feature(&mut self, feature: &RegionFeature) -> Option<ViewState> {
        let bounds = feature.shape.bounds()?;
        let center = bounds.center();
        let zoom = fit_zoom(&bounds, self.viewport_px)?;
        let next = ViewState {
            longitude: center.x,
            latitude: center.y,
            zoom,
            ..self.state
        };
        self.on_interaction(next);
        Some(self.state)
    }

    /// Starts the periodic outward propagation on the current tokio runtime.
    pub fn start<F>(&mut self, period: Duration, sink: F)
    where
        F: FnMut(ViewState) + Send + 'static,
    {
        self.stop();
        self.ticker = Some(Ticker::spawn(period, self.throttle.clone(), sink));
    }

    pub fn stop(&mut self) {
        if let Some(mut t) = self.ticker.take() {
            t.stop();
        }
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.as_ref().is_some_and(Ticker::is_running)
    }

    /// Releases the pending change now, outside the ticker.
    pub fn flush(&mut self) -> Option<ViewState> {
        self.throttle.lock().tick()
    }
}
