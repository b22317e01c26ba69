//! Immutable renderable values handed to the rendering collaborator.

use std::sync::Arc;

use foundation::ids::SliceId;
use foundation::math::Vec2;
use streaming::RegionGeometry;

use crate::labels::TextLabel;
use crate::symbology::{ColorScale, Rgba};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub String);

impl LayerId {
    pub fn new(slice: SliceId, part: &str) -> Self {
        LayerId(format!("{slice}/{part}"))
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Draw band a layer is composited into.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Geometry,
    Marker,
    Text,
}

/// One filled region; `feature` indexes the layer's geometry document.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionFill {
    pub feature: usize,
    pub key: String,
    pub name: Option<String>,
    pub value: Option<f64>,
    pub category: Option<String>,
    pub fill: Rgba,
    pub stroke: Rgba,
    pub stroke_width: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub key: String,
    pub name: Option<String>,
    pub position: Vec2,
    pub radius_px: f64,
    pub color: Rgba,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayerData {
    Regions(Vec<RegionFill>),
    Markers(Vec<Marker>),
    Text(Vec<TextLabel>),
}

impl LayerData {
    pub fn len(&self) -> usize {
        match self {
            LayerData::Regions(v) => v.len(),
            LayerData::Markers(v) => v.len(),
            LayerData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Extent {
    Numeric { min: f64, max: f64 },
    Categorical(Vec<String>),
}

/// Auxiliary metadata carried by the first layer a factory produces.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerMetadata {
    pub color_scale: ColorScale,
    pub extent: Option<Extent>,
    /// Numeric values backing the extent (empty for categorical domains).
    pub values: Vec<f64>,
}

/// What a pick at one index resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct PickInfo {
    pub slice_id: SliceId,
    pub layer_id: LayerId,
    pub index: usize,
    pub region_key: String,
    pub region_name: Option<String>,
    pub value: Option<f64>,
}

pub type PickHandler = Arc<dyn Fn(&PickInfo) + Send + Sync>;

#[derive(Clone, Default)]
pub struct LayerHandlers {
    pub on_click: Option<PickHandler>,
    pub on_hover: Option<PickHandler>,
}

impl std::fmt::Debug for LayerHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerHandlers")
            .field("on_click", &self.on_click.is_some())
            .field("on_hover", &self.on_hover.is_some())
            .finish()
    }
}

/// A renderable. Never mutated after construction; `with_elevation` builds a
/// new value sharing data, metadata and handlers with the original.
#[derive(Debug, Clone)]
pub struct Layer {
    pub id: LayerId,
    pub slice_id: SliceId,
    pub kind: LayerKind,
    pub visualization_type: String,
    pub data: Arc<LayerData>,
    pub geometry: Option<Arc<RegionGeometry>>,
    pub pickable: bool,
    pub opacity: f32,
    /// Vertical offset added by the compositor.
    pub elevation: f64,
    pub metadata: Option<Arc<LayerMetadata>>,
    pub handlers: Arc<LayerHandlers>,
}

impl Layer {
    pub fn new(
        id: LayerId,
        slice_id: SliceId,
        kind: LayerKind,
        visualization_type: impl Into<String>,
        data: LayerData,
    ) -> Self {
        Self {
            id,
            slice_id,
            kind,
            visualization_type: visualization_type.into(),
            data: Arc::new(data),
            geometry: None,
            pickable: false,
            opacity: 1.0,
            elevation: 0.0,
            metadata: None,
            handlers: Arc::new(LayerHandlers::default()),
        }
    }

    pub fn with_geometry(mut self, geometry: Arc<RegionGeometry>) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_metadata(mut self, metadata: Arc<LayerMetadata>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_handlers(mut self, handlers: Arc<LayerHandlers>) -> Self {
        self.pickable = handlers.on_click.is_some() || handlers.on_hover.is_some();
        self.handlers = handlers;
        self
    }

    /// Copy with `elevation` set.
    pub fn with_elevation(&self, elevation: f64) -> Self {
        Self {
            elevation,
            ..self.clone()
        }
    }

    /// Whether `other` is this layer or an elevation copy of it.
    pub fn shares_data_with(&self, other: &Layer) -> bool {
        Arc::ptr_eq(&self.data, &other.data) && Arc::ptr_eq(&self.handlers, &other.handlers)
    }

    pub fn text_labels(&self) -> &[TextLabel] {
        match self.data.as_ref() {
            LayerData::Text(labels) => labels,
            _ => &[],
        }
    }

    pub fn pick(&self, index: usize) -> Option<PickInfo> {
        if !self.pickable {
            return None;
        }
        let (region_key, region_name, value) = match self.data.as_ref() {
            LayerData::Regions(v) => {
                let r = v.get(index)?;
                (r.key.clone(), r.name.clone(), r.value)
            }
            LayerData::Markers(v) => {
                let m = v.get(index)?;
                (m.key.clone(), m.name.clone(), Some(m.value))
            }
            LayerData::Text(v) => (v.get(index)?.key.clone(), None, None),
        };
        Some(PickInfo {
            slice_id: self.slice_id,
            layer_id: self.id.clone(),
            index,
            region_key,
            region_name,
            value,
        })
    }

    /// Resolves a pick and forwards it to the click handler.
    pub fn click(&self, index: usize) -> Option<PickInfo> {
        let info = self.pick(index)?;
        if let Some(h) = &self.handlers.on_click {
            h(&info);
        }
        Some(info)
    }

    pub fn hover(&self, index: usize) -> Option<PickInfo> {
        let info = self.pick(index)?;
        if let Some(h) = &self.handlers.on_hover {
            h(&info);
        }
        Some(info)
    }
}
