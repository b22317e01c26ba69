//! Region geometry documents.
//!
//! A region set (e.g. one country's administrative divisions) arrives as a
//! GeoJSON `FeatureCollection`. Only `Polygon` and `MultiPolygon` features with
//! a `properties` object are accepted.

use foundation::bounds::Aabb2;
use foundation::math::{Ring, Vec2, largest_ring_centroid};
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum RegionShape {
    /// Outer ring followed by holes.
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
}

impl RegionShape {
    /// Every ring of every part, holes included.
    pub fn rings(&self) -> Vec<&[Vec2]> {
        match self {
            RegionShape::Polygon(rings) => rings.iter().map(Vec::as_slice).collect(),
            RegionShape::MultiPolygon(parts) => parts
                .iter()
                .flat_map(|rings| rings.iter().map(Vec::as_slice))
                .collect(),
        }
    }

    /// Vertex-averaged centroid of the largest-area ring. A multipolygon
    /// yields the centroid of its largest part only.
    pub fn centroid(&self) -> Option<Vec2> {
        largest_ring_centroid(self.rings())
    }

    pub fn bounds(&self) -> Option<Aabb2> {
        Aabb2::from_points(self.rings().into_iter().flatten())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionFeature {
    pub id: Option<String>,
    pub properties: Map<String, Value>,
    pub shape: RegionShape,
}

impl RegionFeature {
    /// Region identifier: the `key` property, falling back to the feature id.
    pub fn key(&self, key_property: &str) -> Option<String> {
        match self.properties.get(key_property) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => self.id.clone(),
        }
    }

    pub fn name(&self, name_property: &str) -> Option<String> {
        match self.properties.get(name_property)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionGeometry {
    pub region_set: String,
    pub features: Vec<RegionFeature>,
}

impl RegionGeometry {
    pub fn feature_by_key(&self, key_property: &str, key: &str) -> Option<&RegionFeature> {
        self.features
            .iter()
            .find(|f| f.key(key_property).as_deref() == Some(key))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid region geometry: {}", self.message)
    }
}

impl std::error::Error for ValidationError {}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum RawDocument {
    FeatureCollection { features: Vec<RawFeature> },
}

#[derive(Deserialize)]
struct RawFeature {
    #[serde(default)]
    id: Option<Value>,
    properties: Map<String, Value>,
    geometry: RawGeometry,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum RawGeometry {
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
}

fn convert_ring(raw: Vec<Vec<f64>>) -> Result<Ring, ValidationError> {
    raw.into_iter()
        .map(|pos| match pos.as_slice() {
            [x, y, ..] => Ok(Vec2::new(*x, *y)),
            _ => Err(ValidationError::new("position needs at least two numbers")),
        })
        .collect()
}

fn convert_polygon(raw: Vec<Vec<Vec<f64>>>) -> Result<Vec<Ring>, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::new("polygon without rings"));
    }
    raw.into_iter().map(convert_ring).collect()
}

/// Validates and converts a fetched document.
pub fn parse_region_geometry(
    region_set: &str,
    raw: &Value,
) -> Result<RegionGeometry, ValidationError> {
    let doc = RawDocument::deserialize(raw).map_err(|e| ValidationError::new(e.to_string()))?;
    let RawDocument::FeatureCollection { features } = doc;

    let mut out = Vec::with_capacity(features.len());
    for (i, f) in features.into_iter().enumerate() {
        let shape = match f.geometry {
            RawGeometry::Polygon { coordinates } => RegionShape::Polygon(
                convert_polygon(coordinates)
                    .map_err(|e| ValidationError::new(format!("feature {i}: {}", e.message)))?,
            ),
            RawGeometry::MultiPolygon { coordinates } => RegionShape::MultiPolygon(
                coordinates
                    .into_iter()
                    .map(convert_polygon)
                    .collect::<Result<_, _>>()
                    .map_err(|e| ValidationError::new(format!("feature {i}: {}", e.message)))?,
            ),
        };
        let id = match f.id {
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        out.push(RegionFeature {
            id,
            properties: f.properties,
            shape,
        });
    }

    Ok(RegionGeometry {
        region_set: region_set.to_string(),
        features: out,
    })
}
