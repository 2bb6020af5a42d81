/**
 * SAFEWALK DASHBOARD - Point d'entrée du dashboard opérateur
 *
 * RÔLE : Charge la config, démarre le poller télémétrie, le rafraîchissement
 * de la couche carte et l'API HTTP. Ctrl-C annule proprement les deux boucles.
 *
 * USAGE :
 *   safewalk-dashboard            # dashboard
 *   safewalk-dashboard fetch-osm  # requête Overpass -> out.json
 */

use anyhow::{Context, Result};
use safewalk_dashboard::config::{load_config, DashboardConfig};
use safewalk_dashboard::geo::layer::{spawn_map_refresh, MapLayer};
use safewalk_dashboard::http::{build_router, AppState};
use safewalk_dashboard::state::new_state;
use safewalk_dashboard::telemetry::poller;
use safewalk_dashboard::{overpass, HttpFetcher};
use tokio::net::TcpListener;
use tracing::{info, Level};

fn init_logging(config: &DashboardConfig) {
    let level = config.log_level.parse::<Level>().unwrap_or(Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();
}

async fn run_dashboard(config: DashboardConfig) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let telemetry_fetcher = HttpFetcher::new(&config.backend_url, config.field_timeout())
        .context("Failed to create telemetry client")?;
    let osm_fetcher = HttpFetcher::new(&config.backend_url, config.poll_interval().max(config.field_timeout()))
        .context("Failed to create OSM client")?;

    // poller télémétrie
    let handle = poller::start(telemetry_fetcher, config.poll_interval());

    // couche carte, même jeton d'annulation
    let map_layer = new_state(MapLayer::default());
    let refresh = spawn_map_refresh(
        osm_fetcher,
        config.osm_source().to_string(),
        config.osm_refresh(),
        map_layer.clone(),
        handle.token(),
    );

    let app_state = AppState {
        snapshots: handle.subscribe(),
        map_layer,
        osm_file: config.osm.file.clone(),
    };
    let app = build_router(app_state);

    let listener = TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;
    info!("[dashboard] listening on http://{}", config.listen);

    let token = handle.token();
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("[dashboard] failed to listen for Ctrl-C: {}", e);
        }
        info!("[dashboard] shutting down");
        token.cancel();
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")?;

    handle.cancel();
    handle.join().await;
    refresh.await.ok();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env optionnel
    dotenvy::dotenv().ok();

    let config = load_config().await;
    init_logging(&config);

    match std::env::args().nth(1).as_deref() {
        Some("fetch-osm") => {
            let count = overpass::fetch_to_file(&config.overpass, &config.osm.file).await?;
            println!("Fetched {} elements", count);
            Ok(())
        }
        Some(other) => anyhow::bail!("unknown command: {other} (expected: fetch-osm)"),
        None => run_dashboard(config).await,
    }
}
