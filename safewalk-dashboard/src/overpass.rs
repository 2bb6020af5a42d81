//! Overpass hazard query
//!
//! Builds the pedestrian-hazard query around a center point, runs it against
//! an Overpass interpreter and stores the raw answer as the `out.json`
//! document that `/api/osm` serves.

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::path::Path;
use tracing::info;

use crate::config::OverpassConf;
use crate::geo::LatLon;

/// South-west and north-east corners of `center ± delta`
pub fn bbox(center: LatLon, delta: f64) -> [LatLon; 2] {
    [
        LatLon { lat: center.lat - delta, lon: center.lon - delta },
        LatLon { lat: center.lat + delta, lon: center.lon + delta },
    ]
}

fn bbox_param(corners: &[LatLon; 2]) -> String {
    corners
        .iter()
        .map(|p| format!("{},{}", p.lat, p.lon))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn hazard_query(corners: &[LatLon; 2]) -> String {
    format!(
        r#"[out:json][timeout:25][bbox:{}];
(
  // crossings with signals but no audible/vibration aids
  node["highway"="traffic_signals"]
    (if:!t["traffic_signals:sound"] || t["traffic_signals:sound"] == "no")
    (if:!t["traffic_signals:vibration"] || t["traffic_signals:vibration"] == "no");

  // crossings missing tactile paving or with incorrect tactile paving
  node["highway"="crossing"]["tactile_paving"~"no|incorrect"];
  way["highway"="crossing"]["tactile_paving"~"no|incorrect"];

  // uncontrolled, unmarked or untyped crossings
  node["highway"="crossing"]["crossing"~"uncontrolled|unmarked"];
  node["highway"="crossing"][!"crossing"];

  // raised kerbs
  node["kerb"="raised"];
  way["kerb"="raised"];

  // missing kerb ramps
  node["kerb"="no"];
  node["kerb"="unknown"];
  node["highway"="crossing"][!"kerb"];

  // uneven or unpaved footpaths
  way["highway"~"footway|sidewalk|path|pedestrian"]["surface"~"unpaved|gravel|dirt|sand|ground|cobblestone|pebblestone|grass"];

  // roads without sidewalk
  way["highway"~"primary|secondary|tertiary|residential"]["sidewalk"="no"];
  way["highway"~"primary|secondary|tertiary|residential"][!"sidewalk"];

  // generic hazards
  node["hazard"];
  way["hazard"];

  // steps without tactile or handrail info
  way["highway"="steps"][!"tactile_paving"];
  way["highway"="steps"][!"handrail"];
);
out geom;
"#,
        bbox_param(corners)
    )
}

/// Run the hazard query and write the pretty-printed answer to `out`.
/// Returns the number of elements received.
pub async fn fetch_to_file(conf: &OverpassConf, out: &Path) -> Result<usize> {
    let center = LatLon { lat: conf.center_lat, lon: conf.center_lon };
    let query = hazard_query(&bbox(center, conf.delta));

    let client = reqwest::Client::builder()
        .user_agent(conf.user_agent.as_str())
        .build()
        .context("Failed to build Overpass client")?;

    info!("[overpass] querying {} around {},{}", conf.url, center.lat, center.lon);
    let response = client
        .post(&conf.url)
        .body(query)
        .send()
        .await
        .with_context(|| format!("Overpass request to {} failed", conf.url))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(anyhow!("Query failed with status: {}\n Response body: {}", status, body));
    }

    let data: Value = response.json().await.context("Overpass answer is not JSON")?;
    let count = data
        .get("elements")
        .and_then(Value::as_array)
        .map(Vec::len)
        .ok_or_else(|| anyhow!("Overpass answer has no elements array"))?;

    let pretty = serde_json::to_string_pretty(&data)?;
    tokio::fs::write(out, pretty)
        .await
        .with_context(|| format!("Failed to write {}", out.display()))?;

    info!("[overpass] fetched {} elements into {}", count, out.display());
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_corners() {
        let [sw, ne] = bbox(LatLon { lat: 33.475, lon: -111.875 }, 0.5);
        assert!((sw.lat - 32.975).abs() < 1e-12);
        assert!((sw.lon + 112.375).abs() < 1e-12);
        assert!((ne.lat - 33.975).abs() < 1e-12);
        assert!((ne.lon + 111.375).abs() < 1e-12);
    }

    #[test]
    fn test_query_embeds_bbox() {
        let corners = [LatLon { lat: 1.0, lon: 2.0 }, LatLon { lat: 3.0, lon: 4.0 }];
        let query = hazard_query(&corners);
        assert!(query.starts_with("[out:json][timeout:25][bbox:1,2,3,4];"));
        assert!(query.trim_end().ends_with("out geom;"));
        assert!(query.contains(r#"node["kerb"="raised"];"#));
    }
}
