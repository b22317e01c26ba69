use std::env;
use std::time::Duration;

use layers::LayerStyle;
use serde::{Deserialize, Serialize};

/// Scene tuning knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSettings {
    /// Elevation per visible-order step at full tilt.
    pub elevation_scale: f64,
    /// Pitch (degrees) treated as full tilt.
    pub max_pitch: f64,
    pub viewport_tick_ms: u64,
    pub marker_radius_scale: f64,
    pub threshold_marker_radius: f64,
    pub label_lift_px: f32,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Viewport size used to fit features when panning.
    pub viewport_px: [f64; 2],
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            elevation_scale: 1000.0,
            max_pitch: 60.0,
            viewport_tick_ms: 250,
            marker_radius_scale: 6.0,
            threshold_marker_radius: 8.0,
            label_lift_px: 18.0,
            min_zoom: 0.0,
            max_zoom: 16.0,
            viewport_px: [1024.0, 768.0],
        }
    }
}

impl SceneSettings {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Defaults overridden by `SCENE_*` environment variables.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            elevation_scale: env_var_f64("SCENE_ELEVATION_SCALE", d.elevation_scale),
            max_pitch: env_var_f64("SCENE_MAX_PITCH", d.max_pitch),
            viewport_tick_ms: env_var_u64("SCENE_VIEWPORT_TICK_MS", d.viewport_tick_ms),
            marker_radius_scale: env_var_f64("SCENE_MARKER_RADIUS_SCALE", d.marker_radius_scale),
            threshold_marker_radius: env_var_f64(
                "SCENE_THRESHOLD_MARKER_RADIUS",
                d.threshold_marker_radius,
            ),
            label_lift_px: env_var_f64("SCENE_LABEL_LIFT_PX", d.label_lift_px as f64) as f32,
            min_zoom: env_var_f64("SCENE_MIN_ZOOM", d.min_zoom),
            max_zoom: env_var_f64("SCENE_MAX_ZOOM", d.max_zoom),
            viewport_px: d.viewport_px,
        }
    }

    pub fn viewport_tick(&self) -> Duration {
        Duration::from_millis(self.viewport_tick_ms.max(1))
    }

    pub fn layer_style(&self) -> LayerStyle {
        LayerStyle {
            marker_radius_scale: self.marker_radius_scale,
            threshold_marker_radius: self.threshold_marker_radius,
            label_lift_px: self.label_lift_px,
        }
    }
}

fn env_var_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_var_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::{SceneSettings, env_var_f64, env_var_u64};

    #[test]
    fn partial_json_keeps_defaults() {
        let s = SceneSettings::from_json(r#"{"max_pitch": 45.0, "viewport_tick_ms": 100}"#).unwrap();
        assert_eq!(s.max_pitch, 45.0);
        assert_eq!(s.viewport_tick_ms, 100);
        assert_eq!(s.elevation_scale, SceneSettings::default().elevation_scale);
    }

    #[test]
    fn layer_style_mirrors_settings() {
        let s = SceneSettings {
            marker_radius_scale: 2.0,
            ..SceneSettings::default()
        };
        assert_eq!(s.layer_style().marker_radius_scale, 2.0);
    }

    #[test]
    fn env_helpers_fall_back_on_missing_or_bad_values() {
        assert_eq!(env_var_f64("SCENE_TEST_SURELY_UNSET", 1.5), 1.5);
        assert_eq!(env_var_u64("SCENE_TEST_SURELY_UNSET", 7), 7);
        // PATH is set but never numeric.
        assert_eq!(env_var_u64("PATH", 3), 3);
        assert_eq!(SceneSettings::from_env().viewport_px, SceneSettings::default().viewport_px);
    }
}
