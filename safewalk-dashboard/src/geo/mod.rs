//! Map features from an Overpass-style element list
//!
//! - `classifier` : element partitioning and closed-ring detection
//! - `layer` : periodic refresh of the classified features

pub mod classifier;
pub mod layer;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Tags = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OsmNode {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    pub tags: Option<Tags>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OsmWay {
    pub id: i64,
    pub geometry: Vec<LatLon>,
    pub tags: Option<Tags>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Shape {
    Polygon,
    Polyline,
}

/// A way together with the shape derived from its geometry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderableWay {
    #[serde(flatten)]
    pub way: OsmWay,
    pub shape: Shape,
}

/// Classifier output, ready for rendering
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeoFeatures {
    pub nodes: Vec<OsmNode>,
    pub ways: Vec<RenderableWay>,
}

impl GeoFeatures {
    pub fn polygons(&self) -> impl Iterator<Item = &RenderableWay> {
        self.ways.iter().filter(|w| w.shape == Shape::Polygon)
    }

    pub fn polylines(&self) -> impl Iterator<Item = &RenderableWay> {
        self.ways.iter().filter(|w| w.shape == Shape::Polyline)
    }
}
