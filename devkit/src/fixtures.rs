/*!
Fixtures JSON pour tests

- `OsmDocBuilder` : documents `{elements: [...]}` façon Overpass
- `hazard` / `hazards` : payloads de `/telemetry/hazards`
- `key_values` : payload de `/telemetry`
*/

use serde_json::{json, Map, Value};

/// Construit un document d'éléments OSM
#[derive(Debug, Default, Clone)]
pub struct OsmDocBuilder {
    elements: Vec<Value>,
}

impl OsmDocBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(mut self, id: i64, lat: f64, lon: f64) -> Self {
        self.elements.push(json!({"type": "node", "id": id, "lat": lat, "lon": lon}));
        self
    }

    pub fn tagged_node(mut self, id: i64, lat: f64, lon: f64, tags: &[(&str, &str)]) -> Self {
        self.elements.push(json!({
            "type": "node", "id": id, "lat": lat, "lon": lon, "tags": tags_object(tags)
        }));
        self
    }

    /// Way avec géométrie `[(lat, lon), ...]`
    pub fn way(mut self, id: i64, points: &[(f64, f64)]) -> Self {
        let geometry: Vec<Value> = points
            .iter()
            .map(|(lat, lon)| json!({"lat": lat, "lon": lon}))
            .collect();
        self.elements.push(json!({"type": "way", "id": id, "geometry": geometry}));
        self
    }

    pub fn relation(mut self, id: i64) -> Self {
        self.elements.push(json!({"type": "relation", "id": id, "members": []}));
        self
    }

    /// Élément arbitraire (formes invalides, types inconnus)
    pub fn raw(mut self, element: Value) -> Self {
        self.elements.push(element);
        self
    }

    pub fn build(self) -> Value {
        json!({
            "version": 0.6,
            "generator": "safewalk-devkit",
            "elements": self.elements,
        })
    }
}

fn tags_object(tags: &[(&str, &str)]) -> Value {
    let map: Map<String, Value> = tags
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect();
    Value::Object(map)
}

pub fn hazard(id: &str, kind: &str, severity: &str, lat: f64, lon: f64) -> Value {
    json!({
        "id": id,
        "lat": lat,
        "lon": lon,
        "type": kind,
        "severity": severity,
        "description": format!("{kind} near {lat},{lon}"),
    })
}

pub fn hazards(items: Vec<Value>) -> Value {
    Value::Array(items)
}

/// Payload `[{key, value}, ...]` de `/telemetry`
pub fn key_values(pairs: &[(&str, &str)]) -> Value {
    Value::Array(
        pairs
            .iter()
            .map(|(k, v)| json!({"key": k, "value": v}))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_keeps_order() {
        let doc = OsmDocBuilder::new()
            .node(1, 1.0, 2.0)
            .way(2, &[(0.0, 0.0), (0.0, 1.0)])
            .relation(3)
            .build();
        let elements = doc["elements"].as_array().unwrap();
        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0]["type"], "node");
        assert_eq!(elements[1]["geometry"][1]["lon"], 1.0);
        assert_eq!(elements[2]["type"], "relation");
    }

    #[test]
    fn test_key_values_payload() {
        let payload = key_values(&[("latitude", "33.4")]);
        assert_eq!(payload[0]["key"], "latitude");
        assert_eq!(payload[0]["value"], "33.4");
    }
}
