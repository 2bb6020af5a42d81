/*!
Test Harness pour le dashboard SafeWalk

Facilite l'écriture de tests d'intégration avec:
- Backend stub démarré automatiquement
- Scripts par défaut pour tous les endpoints télémétrie
- Attente d'une valeur sur un canal `watch` avec timeout
*/

use crate::backend_stub::{StubBackend, StubResponse};
use anyhow::Result;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;

/// Endpoints télémétrie lus à chaque tick
pub const TELEMETRY_PATHS: [&str; 7] = [
    "/telemetry/latitude",
    "/telemetry/longitude",
    "/telemetry/heading",
    "/telemetry/speeds",
    "/telemetry/hazards",
    "/health",
    "/telemetry",
];

/// Harness de test : un backend stub prêt à scripter
pub struct TestHarness {
    pub backend: StubBackend,
}

impl TestHarness {
    /// Crée un harness dont toutes les routes répondent 404
    pub async fn new() -> Result<Self> {
        env_logger::try_init().ok(); // Init logging pour tests

        Ok(Self {
            backend: StubBackend::start().await?,
        })
    }

    /// Robot nominal : position, cap, vitesses, aucun hazard, santé OK
    pub async fn with_nominal_robot() -> Result<Self> {
        let harness = Self::new().await?;
        let backend = &harness.backend;
        backend.respond("/telemetry/latitude", StubResponse::text("33.423322"));
        backend.respond("/telemetry/longitude", StubResponse::text("-111.932648"));
        backend.respond("/telemetry/heading", StubResponse::text("1.5708"));
        backend.respond("/telemetry/speeds", StubResponse::text(r#"["0","0","0","0"]"#));
        backend.respond("/telemetry/hazards", StubResponse::text("[]"));
        backend.respond(
            "/health",
            StubResponse::text(r#"{"cpu_usage":12.5,"available_memory":1024}"#),
        );
        backend.respond("/telemetry", StubResponse::text("[]"));
        Ok(harness)
    }

    pub fn base_url(&self) -> String {
        self.backend.base_url()
    }

    /// Sert `document` sur `/api/osm`
    pub fn serve_osm(&self, document: Value) {
        self.backend.respond("/api/osm", StubResponse::json(document));
    }

    /// Toutes les routes télémétrie en erreur `status`
    pub fn fail_all_telemetry(&self, status: u16) {
        for path in TELEMETRY_PATHS {
            self.backend.respond(path, StubResponse::status(status));
        }
    }
}

/// Attend que la valeur courante de `rx` satisfasse `predicate`.
/// Retourne `None` après `timeout_ms`.
pub async fn wait_for<T, F>(rx: &mut watch::Receiver<T>, timeout_ms: u64, mut predicate: F) -> Option<T>
where
    T: Clone,
    F: FnMut(&T) -> bool,
{
    let wait = async {
        loop {
            {
                let current = rx.borrow_and_update();
                if predicate(&current) {
                    return Some(current.clone());
                }
            }
            if rx.changed().await.is_err() {
                return None;
            }
        }
    };
    timeout(Duration::from_millis(timeout_ms), wait).await.ok().flatten()
}

/// Collecte chaque valeur publiée sur `rx` pendant `duration`
pub async fn collect_for<T: Clone>(rx: &mut watch::Receiver<T>, duration: Duration) -> Vec<T> {
    let mut seen = Vec::new();
    let deadline = tokio::time::Instant::now() + duration;
    while let Ok(Ok(())) = tokio::time::timeout_at(deadline, rx.changed()).await {
        seen.push(rx.borrow_and_update().clone());
    }
    seen
}
