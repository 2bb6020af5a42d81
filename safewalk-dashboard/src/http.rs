/**
 * API HTTP DASHBOARD - Flux de données en lecture seule pour la couche de rendu
 *
 * RÔLE :
 * Expose le dernier snapshot télémétrie, la couche carte classifiée et le
 * document OSM brut (`out.json`). Aucune route n'écrit dans l'état.
 *
 * ROUTES :
 * - GET /health        : "ok"
 * - GET /api/osm       : contenu de out.json, 500 {error, message} si illisible
 * - GET /api/snapshot  : dernier TelemetrySnapshot publié
 * - GET /api/features  : MapLayer (features + dernière erreur)
 */

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::geo::layer::MapLayer;
use crate::state::{SharedMapLayer, SnapshotFeed};
use crate::telemetry::TelemetrySnapshot;

#[derive(Clone)]
pub struct AppState {
    pub snapshots: SnapshotFeed,
    pub map_layer: SharedMapLayer,
    pub osm_file: PathBuf,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/osm", get(get_osm))
        .route("/api/snapshot", get(get_snapshot))
        .route("/api/features", get(get_features))
        .with_state(app_state)
}

async fn read_osm_file(path: &Path) -> anyhow::Result<Value> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&raw)?)
}

// GET /api/osm (proxy du fichier out.json)
async fn get_osm(State(app): State<AppState>) -> (StatusCode, Json<Value>) {
    match read_osm_file(&app.osm_file).await {
        Ok(document) => (StatusCode::OK, Json(document)),
        Err(e) => {
            warn!("[http] failed to read {}: {}", app.osm_file.display(), e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to read out.json",
                    "message": e.to_string(),
                })),
            )
        }
    }
}

// GET /api/snapshot
async fn get_snapshot(State(app): State<AppState>) -> Json<TelemetrySnapshot> {
    let snapshot = app.snapshots.borrow().clone();
    Json((*snapshot).clone())
}

// GET /api/features
async fn get_features(State(app): State<AppState>) -> Json<MapLayer> {
    Json(app.map_layer.lock().clone())
}
