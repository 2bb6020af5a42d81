use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

use crate::geo::layer::MapLayer;
use crate::telemetry::TelemetrySnapshot;

pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// Côté lecture du poller : chaque valeur est un snapshot immuable.
pub type SnapshotFeed = watch::Receiver<Arc<TelemetrySnapshot>>;

/// Couche carte partagée entre la tâche de rafraîchissement et l'API.
pub type SharedMapLayer = Shared<MapLayer>;
