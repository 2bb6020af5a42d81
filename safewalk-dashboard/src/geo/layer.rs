use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::classifier;
use super::GeoFeatures;
use crate::fetch::{FetchError, HttpFetcher};
use crate::state::SharedMapLayer;
use crate::telemetry::poller::CancelToken;

/// Map overlay state as served to the rendering layer
#[derive(Debug, Clone, Default, Serialize)]
pub struct MapLayer {
    /// Last complete classification, kept when a later refresh fails
    pub features: Option<GeoFeatures>,
    /// Error of the most recent refresh, cleared on success
    pub error: Option<String>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl MapLayer {
    pub fn record(&mut self, result: Result<GeoFeatures, FetchError>) {
        match result {
            Ok(features) => {
                self.features = Some(features);
                self.error = None;
            }
            Err(e) => self.error = Some(e.to_string()),
        }
        self.refreshed_at = Some(Utc::now());
    }
}

/// Re-classify the OSM document every `every` until `token` is cancelled
pub fn spawn_map_refresh(
    fetcher: HttpFetcher,
    source: String,
    every: Duration,
    layer: SharedMapLayer,
    token: CancelToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = interval.tick() => {}
            }

            let result = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                result = classifier::fetch_and_classify(&fetcher, &source) => result,
            };

            match &result {
                Ok(features) => info!(
                    "[geo] map layer refreshed: {} nodes, {} polygons, {} polylines",
                    features.nodes.len(),
                    features.polygons().count(),
                    features.polylines().count()
                ),
                Err(e) => warn!("[geo] map layer refresh failed: {}", e),
            }

            // verrou court, pas d'await pendant qu'il est tenu
            layer.lock().record(result);
        }
        info!("[geo] map refresh stopped");
    })
}
