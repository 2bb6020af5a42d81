use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("poll_interval_ms must be greater than zero")]
    ZeroInterval,
    #[error("invalid backend_url {0}")]
    BackendUrl(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub backend_url: String,
    pub poll_interval_ms: u64,
    /// Timeout of one field fetch; defaults to the poll interval
    pub field_timeout_ms: Option<u64>,
    pub listen: String,
    pub log_level: String,
    pub osm: OsmConf,
    pub overpass: OverpassConf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct OsmConf {
    /// Path or absolute URL of the element document; defaults to `/api/osm` on the backend
    pub source_url: Option<String>,
    pub refresh_secs: u64,
    /// `out.json` served by `/api/osm` and written by `fetch-osm`
    pub file: PathBuf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct OverpassConf {
    pub url: String,
    pub center_lat: f64,
    pub center_lon: f64,
    pub delta: f64,
    pub user_agent: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://10.0.0.1:8000".into(),
            poll_interval_ms: 1000,
            field_timeout_ms: None,
            listen: "0.0.0.0:3000".into(),
            log_level: "info".into(),
            osm: OsmConf::default(),
            overpass: OverpassConf::default(),
        }
    }
}

impl Default for OsmConf {
    fn default() -> Self {
        Self {
            source_url: None,
            refresh_secs: 30,
            file: PathBuf::from("../out.json"),
        }
    }
}

impl Default for OverpassConf {
    fn default() -> Self {
        Self {
            url: "https://overpass-api.de/api/interpreter".into(),
            center_lat: 33.423322,
            center_lon: -111.932648,
            delta: 0.015,
            user_agent: "safewalk/0.1.0".into(),
        }
    }
}

impl DashboardConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn field_timeout(&self) -> Duration {
        Duration::from_millis(self.field_timeout_ms.unwrap_or(self.poll_interval_ms))
    }

    pub fn osm_source(&self) -> &str {
        self.osm.source_url.as_deref().unwrap_or("/api/osm")
    }

    pub fn osm_refresh(&self) -> Duration {
        Duration::from_secs(self.osm.refresh_secs.max(1))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        reqwest::Url::parse(&self.backend_url).map_err(|_| ConfigError::BackendUrl(self.backend_url.clone()))?;
        Ok(())
    }

    pub fn parse(txt: &str) -> Result<Self, serde_yaml::Error> {
        if txt.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(txt)
    }
}

pub async fn load_config_from(path: &Path) -> DashboardConfig {
    if !path.exists() {
        // tracing pas encore initialisé
        eprintln!("[config] no {}, using default configuration", path.display());
        return DashboardConfig::default();
    }
    let txt = fs::read_to_string(path).await.unwrap_or_default();
    DashboardConfig::parse(&txt).unwrap_or_else(|e| {
        eprintln!("[config] invalid {}: {e}", path.display());
        DashboardConfig::default()
    })
}

pub async fn load_config() -> DashboardConfig {
    let path = std::env::var("SAFEWALK_DASHBOARD_CONFIG").unwrap_or_else(|_| "dashboard.yaml".into());
    load_config_from(Path::new(&path)).await
}
