/*!
Backend stub HTTP pour développement sans robot

Sert des réponses scriptées par chemin (`/telemetry/latitude`, `/api/osm`...)
avec statut, corps et délai configurables. Compte les requêtes reçues.
Chemin inconnu = 404.
*/

use anyhow::Result;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Réponse scriptée d'une route
#[derive(Debug, Clone)]
pub struct StubResponse {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl StubResponse {
    /// 200 avec un corps texte
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    /// 200 avec un corps JSON
    pub fn json(value: Value) -> Self {
        Self::text(value.to_string())
    }

    /// Statut seul, corps vide
    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// File de réponses d'une route : la dernière reste en place
#[derive(Debug, Default)]
struct RouteScript {
    queue: VecDeque<StubResponse>,
}

impl RouteScript {
    fn next(&mut self) -> Option<StubResponse> {
        if self.queue.len() > 1 {
            self.queue.pop_front()
        } else {
            self.queue.front().cloned()
        }
    }
}

#[derive(Clone, Default)]
struct StubState {
    routes: Arc<Mutex<HashMap<String, RouteScript>>>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
}

/// Backend HTTP scripté, arrêté au drop
pub struct StubBackend {
    addr: SocketAddr,
    state: StubState,
    shutdown: Option<oneshot::Sender<()>>,
}

impl StubBackend {
    /// Démarre le stub sur un port libre de 127.0.0.1
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = StubState::default();

        let app = Router::new().fallback(serve).with_state(state.clone());
        let (tx, rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    rx.await.ok();
                })
                .await;
            if let Err(e) = result {
                log::error!("❌ [STUB] server error: {}", e);
            }
        });

        log::info!("🧪 [STUB] backend listening on http://{}", addr);
        Ok(Self {
            addr,
            state,
            shutdown: Some(tx),
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Réponse fixe pour `path`
    pub fn respond(&self, path: &str, response: StubResponse) {
        self.respond_sequence(path, vec![response]);
    }

    /// Réponses successives pour `path`; la dernière est rejouée ensuite
    pub fn respond_sequence(&self, path: &str, responses: Vec<StubResponse>) {
        self.state.routes.lock().insert(
            path.to_string(),
            RouteScript {
                queue: responses.into(),
            },
        );
    }

    /// Retire le script d'une route (elle répond 404)
    pub fn clear(&self, path: &str) {
        self.state.routes.lock().remove(path);
    }

    /// Nombre de requêtes reçues sur `path`
    pub fn hits(&self, path: &str) -> usize {
        self.state.hits.lock().get(path).copied().unwrap_or(0)
    }
}

impl Drop for StubBackend {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn serve(State(state): State<StubState>, uri: Uri) -> Response {
    let path = uri.path().to_string();
    *state.hits.lock().entry(path.clone()).or_insert(0) += 1;

    // verrou relâché avant le délai
    let scripted = state.routes.lock().get_mut(&path).and_then(RouteScript::next);

    let Some(response) = scripted else {
        log::debug!("🔍 [STUB] no script for {}", path);
        return StatusCode::NOT_FOUND.into_response();
    };

    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, response.body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn get(url: String) -> (u16, String) {
        let response = reqwest::get(url).await.unwrap();
        let status = response.status().as_u16();
        (status, response.text().await.unwrap())
    }

    #[tokio::test]
    async fn test_sequence_then_sticky() {
        let stub = StubBackend::start().await.unwrap();
        stub.respond_sequence(
            "/telemetry/latitude",
            vec![StubResponse::text("1.0"), StubResponse::status(404)],
        );

        let url = format!("{}/telemetry/latitude", stub.base_url());
        assert_eq!(get(url.clone()).await, (200, "1.0".to_string()));
        assert_eq!(get(url.clone()).await.0, 404);
        assert_eq!(get(url).await.0, 404);
        assert_eq!(stub.hits("/telemetry/latitude"), 3);
    }

    #[tokio::test]
    async fn test_cleared_route_falls_back_to_404() {
        let stub = StubBackend::start().await.unwrap();
        stub.respond("/health", StubResponse::text("{}"));

        let url = format!("{}/health", stub.base_url());
        assert_eq!(get(url.clone()).await, (200, "{}".to_string()));
        stub.clear("/health");
        assert_eq!(get(url).await.0, 404);
        assert_eq!(stub.hits("/health"), 2);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let stub = StubBackend::start().await.unwrap();
        let (status, _) = get(format!("{}/health", stub.base_url())).await;
        assert_eq!(status, 404);
        assert_eq!(stub.hits("/health"), 1);
    }
}
