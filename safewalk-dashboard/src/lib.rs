//! SafeWalk operator dashboard
//!
//! Two independent read-only subsystems:
//! - [`telemetry`] polls the robot's telemetry endpoints and publishes
//!   reconciled snapshots
//! - [`geo`] classifies the Overpass element document into renderable
//!   nodes, polygons and polylines

pub mod config;
pub mod fetch;
pub mod geo;
pub mod http;
pub mod overpass;
pub mod state;
pub mod telemetry;

pub use fetch::{FetchError, HttpFetcher};
pub use geo::classifier::fetch_and_classify;
pub use telemetry::poller::{start, CancelToken, Cancellable};
pub use telemetry::TelemetrySnapshot;
