//! Telemetry model and synchronization loop
//!
//! - `fields` : endpoints and per-field payload parsers
//! - `merge` : reconciliation of one tick's results into a snapshot
//! - `poller` : tick scheduling, publish ordering and cancellation

pub mod fields;
pub mod merge;
pub mod poller;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hazard severity as reported by the robot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Hazard entry of the `/telemetry/hazards` array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hazard {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: Severity,
    pub description: String,
}

/// Host health (`/health`)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HostHealth {
    pub cpu_usage: f64,
    pub available_memory: f64,
}

/// Reconciled view of one poll tick, never mutated once published
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    /// Tick that produced this snapshot (0 = nothing published yet)
    pub tick: u64,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub heading: Option<String>,
    /// Motor channels in order: front, right, back, left
    pub speeds: Option<Vec<String>>,
    pub hazards: Vec<Hazard>,
    pub health: Option<HostHealth>,
    pub all_fields: BTreeMap<String, String>,
    pub last_error: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}
