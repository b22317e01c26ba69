//! Merges every visible slice's layers into one ordered render list.

use std::collections::BTreeMap;

use catalog::viz;
use foundation::ids::SliceId;
use layers::{Layer, LayerData, LayerId, LayerKind, merge_labels};

#[derive(Debug, Clone, PartialEq)]
pub struct SceneCompositor {
    /// Elevation per visible-order step at full tilt.
    pub elevation_scale: f64,
    /// Pitch at which the tilt factor reaches 1.
    pub max_pitch: f64,
    /// Visualization type whose text layers are merged by region key.
    pub merged_text_type: String,
}

impl Default for SceneCompositor {
    fn default() -> Self {
        Self {
            elevation_scale: 1000.0,
            max_pitch: 60.0,
            merged_text_type: viz::REGION_CHOROPLETH.to_string(),
        }
    }
}

impl SceneCompositor {
    pub fn new(elevation_scale: f64, max_pitch: f64) -> Self {
        Self {
            elevation_scale,
            max_pitch,
            ..Self::default()
        }
    }

    /// Camera tilt scaled into `[0, 1]`.
    pub fn normalized_pitch(&self, pitch: f64) -> f64 {
        if self.max_pitch <= 0.0 || !pitch.is_finite() {
            return 0.0;
        }
        (pitch / self.max_pitch).clamp(0.0, 1.0)
    }

    /// Offset for the slice at `index` among `visible_count` visible slices.
    pub fn elevation(&self, pitch: f64, index: usize, visible_count: usize) -> f64 {
        let steps = visible_count.saturating_sub(index) as f64;
        self.normalized_pitch(pitch) * self.elevation_scale * steps
    }

    /// Render list for `ordered_visible` (ascending order index).
    ///
    /// Slices without layers are skipped but still hold their elevation
    /// step. Geometry layers come first, then markers, each band with slice
    /// groups reversed so order index 0 draws last; text comes last in
    /// insertion order, with the merged text type collapsed into one layer.
    pub fn compose(
        &self,
        ordered_visible: &[SliceId],
        layers_by_slice: &BTreeMap<SliceId, Vec<Layer>>,
        pitch: f64,
    ) -> Vec<Layer> {
        let count = ordered_visible.len();
        let mut geometry: Vec<Vec<Layer>> = Vec::new();
        let mut markers: Vec<Vec<Layer>> = Vec::new();
        let mut text: Vec<Layer> = Vec::new();
        let mut merged_labels = Vec::new();
        let mut merged_slot: Option<(usize, Layer)> = None;

        for (index, id) in ordered_visible.iter().enumerate() {
            let Some(layers) = layers_by_slice.get(id) else {
                continue;
            };
            let z = self.elevation(pitch, index, count);
            let mut slice_geometry = Vec::new();
            let mut slice_markers = Vec::new();
            for layer in layers {
                match layer.kind {
                    LayerKind::Geometry => slice_geometry.push(layer.with_elevation(z)),
                    LayerKind::Marker => slice_markers.push(layer.with_elevation(z)),
                    LayerKind::Text if layer.visualization_type == self.merged_text_type => {
                        merged_labels.extend(layer.text_labels().iter().cloned());
                        if merged_slot.is_none() {
                            merged_slot = Some((text.len(), layer.clone()));
                        }
                    }
                    LayerKind::Text => text.push(layer.clone()),
                }
            }
            geometry.push(slice_geometry);
            markers.push(slice_markers);
        }

        if let Some((slot, first)) = merged_slot {
            let merged = Layer::new(
                LayerId(format!("{}/labels", self.merged_text_type)),
                first.slice_id,
                LayerKind::Text,
                first.visualization_type.clone(),
                LayerData::Text(merge_labels(&merged_labels)),
            )
            .with_opacity(first.opacity);
            text.insert(slot, merged);
        }

        let mut out = Vec::new();
        out.extend(geometry.into_iter().rev().flatten());
        out.extend(markers.into_iter().rev().flatten());
        out.extend(text);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundation::math::Vec2;
    use layers::{Marker, Rgba, TextLabel};
    use pretty_assertions::assert_eq;

    fn layer(slice: u64, part: &str, kind: LayerKind, viz_type: &str) -> Layer {
        let data = match kind {
            LayerKind::Geometry => LayerData::Regions(Vec::new()),
            LayerKind::Marker => LayerData::Markers(vec![Marker {
                key: "A".into(),
                name: None,
                position: Vec2::ZERO,
                radius_px: 1.0,
                color: Rgba::THRESHOLD,
                value: 1.0,
            }]),
            LayerKind::Text => LayerData::Text(vec![TextLabel {
                key: "A".into(),
                text: format!("s{slice}"),
                position: Vec2::ZERO,
                pixel_offset: [0.0, 0.0],
            }]),
        };
        Layer::new(LayerId::new(SliceId(slice), part), SliceId(slice), kind, viz_type, data)
    }

    fn slice_layers(slice: u64, viz_type: &str) -> Vec<Layer> {
        vec![
            layer(slice, "regions", LayerKind::Geometry, viz_type),
            layer(slice, "markers", LayerKind::Marker, viz_type),
            layer(slice, "labels", LayerKind::Text, viz_type),
        ]
    }

    fn ids(layers: &[Layer]) -> Vec<String> {
        layers.iter().map(|l| l.id.0.clone()).collect()
    }

    #[test]
    fn bands_and_reverse_order() {
        let mut by_slice = BTreeMap::new();
        by_slice.insert(SliceId(1), slice_layers(1, "other"));
        by_slice.insert(SliceId(2), slice_layers(2, "other"));
        let c = SceneCompositor::default();
        let out = c.compose(&[SliceId(1), SliceId(2)], &by_slice, 0.0);
        assert_eq!(
            ids(&out),
            vec![
                "slice-2/regions",
                "slice-1/regions",
                "slice-2/markers",
                "slice-1/markers",
                "slice-1/labels",
                "slice-2/labels",
            ]
        );
        assert!(out.iter().all(|l| l.elevation == 0.0));
    }

    #[test]
    fn compose_is_deterministic() {
        let mut by_slice = BTreeMap::new();
        by_slice.insert(SliceId(4), slice_layers(4, viz::REGION_CHOROPLETH));
        by_slice.insert(SliceId(9), slice_layers(9, "other"));
        let c = SceneCompositor::default();
        let order = [SliceId(9), SliceId(4)];
        let a = ids(&c.compose(&order, &by_slice, 30.0));
        let b = ids(&c.compose(&order, &by_slice, 30.0));
        assert_eq!(a, b);
    }

    #[test]
    fn elevation_follows_visible_position_only() {
        let c = SceneCompositor::new(100.0, 60.0);
        let mut by_slice = BTreeMap::new();
        by_slice.insert(SliceId(1), slice_layers(1, "other"));
        by_slice.insert(SliceId(3), slice_layers(3, "other"));
        let out = c.compose(&[SliceId(1), SliceId(3)], &by_slice, 60.0);

        let regions: Vec<(String, f64)> = out
            .iter()
            .filter(|l| l.kind == LayerKind::Geometry)
            .map(|l| (l.id.0.clone(), l.elevation))
            .collect();
        assert_eq!(
            regions,
            vec![("slice-3/regions".to_string(), 100.0), ("slice-1/regions".to_string(), 200.0)]
        );
        let text: Vec<f64> = out
            .iter()
            .filter(|l| l.kind == LayerKind::Text)
            .map(|l| l.elevation)
            .collect();
        assert!(text.iter().all(|z| *z == 0.0));

        assert_eq!(c.elevation(30.0, 0, 2), 100.0);
        assert_eq!(c.elevation(90.0, 1, 2), 100.0);
    }

    #[test]
    fn zero_pitch_never_elevates() {
        let c = SceneCompositor::default();
        for count in 0..6 {
            for index in 0..count {
                assert_eq!(c.elevation(0.0, index, count), 0.0);
            }
        }
    }

    #[test]
    fn elevated_copies_share_original_data() {
        let mut by_slice = BTreeMap::new();
        by_slice.insert(SliceId(1), slice_layers(1, "other"));
        let out = SceneCompositor::default().compose(&[SliceId(1)], &by_slice, 45.0);
        let original = &by_slice[&SliceId(1)][0];
        assert_eq!(original.elevation, 0.0);
        assert!(out[0].shares_data_with(original));
        assert!(out[0].elevation > 0.0);
    }

    #[test]
    fn choropleth_labels_merge_by_region() {
        let mut by_slice = BTreeMap::new();
        by_slice.insert(SliceId(1), slice_layers(1, viz::REGION_CHOROPLETH));
        by_slice.insert(SliceId(2), slice_layers(2, viz::REGION_FEED));
        by_slice.insert(SliceId(3), slice_layers(3, viz::REGION_CHOROPLETH));
        let out = SceneCompositor::default().compose(
            &[SliceId(1), SliceId(2), SliceId(3)],
            &by_slice,
            0.0,
        );
        let text: Vec<&Layer> = out.iter().filter(|l| l.kind == LayerKind::Text).collect();
        assert_eq!(text.len(), 2);
        assert_eq!(text[0].id.0, "region_choropleth/labels");
        assert_eq!(text[0].text_labels().len(), 1);
        assert_eq!(text[0].text_labels()[0].text, "s1\ns3");
        assert_eq!(text[1].id.0, "slice-2/labels");
    }

    #[test]
    fn partially_loaded_scenes_compose() {
        let mut by_slice = BTreeMap::new();
        by_slice.insert(SliceId(2), slice_layers(2, "other"));
        let out = SceneCompositor::default().compose(&[SliceId(1), SliceId(2)], &by_slice, 0.0);
        assert_eq!(out.len(), 3);
    }
}
