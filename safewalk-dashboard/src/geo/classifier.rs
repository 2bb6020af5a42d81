//! Geo feature classifier
//!
//! Pipeline, leaves first:
//! 1. [`normalize_geometry`] drops null vertices from a way's geometry
//! 2. [`is_closed_ring`] / [`shape_of`] decide polygon vs polyline
//! 3. [`classify`] partitions the raw element list into nodes and ways
//!
//! Elements that are neither a located node nor a way with geometry
//! (relations, nodes without coordinates, unknown kinds) are skipped.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{GeoFeatures, LatLon, OsmNode, OsmWay, RenderableWay, Shape, Tags};
use crate::fetch::{FetchError, HttpFetcher};

/// Maximum per-coordinate gap for first and last vertex to count as the same point
pub const RING_TOLERANCE: f64 = 1e-9;

/// Minimum vertex count of a renderable area
pub const MIN_RING_VERTICES: usize = 3;

/// Document served by `/api/osm`
#[derive(Debug, Clone, Deserialize)]
pub struct OsmDocument {
    pub elements: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawElement {
    Node {
        id: i64,
        lat: Option<f64>,
        lon: Option<f64>,
        #[serde(default)]
        tags: Option<Tags>,
    },
    Way {
        id: i64,
        #[serde(default)]
        geometry: Vec<Option<LatLon>>,
        #[serde(default)]
        tags: Option<Tags>,
    },
}

pub fn normalize_geometry(raw: Vec<Option<LatLon>>) -> Vec<LatLon> {
    raw.into_iter().flatten().collect()
}

pub fn is_closed_ring(geometry: &[LatLon]) -> bool {
    if geometry.len() < MIN_RING_VERTICES {
        return false;
    }
    match (geometry.first(), geometry.last()) {
        (Some(first), Some(last)) => {
            (first.lat - last.lat).abs() <= RING_TOLERANCE && (first.lon - last.lon).abs() <= RING_TOLERANCE
        }
        _ => false,
    }
}

pub fn shape_of(geometry: &[LatLon]) -> Shape {
    if is_closed_ring(geometry) {
        Shape::Polygon
    } else {
        Shape::Polyline
    }
}

enum Candidate {
    Node(OsmNode),
    Way(RenderableWay),
}

fn candidate(value: &Value) -> Option<Candidate> {
    match RawElement::deserialize(value).ok()? {
        RawElement::Node {
            id,
            lat: Some(lat),
            lon: Some(lon),
            tags,
        } => Some(Candidate::Node(OsmNode { id, lat, lon, tags })),
        RawElement::Node { .. } => None,
        RawElement::Way { id, geometry, tags } => {
            let geometry = normalize_geometry(geometry);
            if geometry.is_empty() {
                return None;
            }
            let shape = shape_of(&geometry);
            Some(Candidate::Way(RenderableWay {
                way: OsmWay { id, geometry, tags },
                shape,
            }))
        }
    }
}

/// Partition a document into nodes and shaped ways, keeping document order
pub fn classify(document: &OsmDocument) -> GeoFeatures {
    let mut features = GeoFeatures::default();
    let mut skipped = 0usize;

    for element in &document.elements {
        match candidate(element) {
            Some(Candidate::Node(node)) => features.nodes.push(node),
            Some(Candidate::Way(way)) => features.ways.push(way),
            None => skipped += 1,
        }
    }

    debug!(
        "[geo] classified {} nodes, {} ways ({} skipped)",
        features.nodes.len(),
        features.ways.len(),
        skipped
    );
    features
}

pub fn parse_document(text: &str) -> Result<OsmDocument, FetchError> {
    serde_json::from_str(text).map_err(|source| FetchError::Decode {
        what: "OSM document".to_string(),
        source,
    })
}

/// Fetch the element document at `source` (path or absolute URL) and classify it.
/// Any failure is returned whole; there is no partial result.
pub async fn fetch_and_classify(fetcher: &HttpFetcher, source: &str) -> Result<GeoFeatures, FetchError> {
    let text = fetcher.get_text(source).await?;
    let document = parse_document(&text)?;
    Ok(classify(&document))
}
