//! Snapshot merger
//!
//! Turns the raw bodies of one tick into the next snapshot. The fallback
//! policy differs per field:
//!
//! | field                        | fetch failed / non-2xx | payload malformed |
//! |------------------------------|------------------------|-------------------|
//! | latitude, longitude, heading | previous value         | n/a (verbatim)    |
//! | speeds                       | previous value         | previous value    |
//! | hazards                      | previous value         | empty             |
//!
//! A hazards array with some undecodable entries keeps the valid ones.
//! | health                       | absent                 | absent            |
//! | all                          | previous map           | previous map      |

use chrono::Utc;
use std::collections::BTreeMap;
use tracing::warn;

use super::fields::{self, Field};
use super::TelemetrySnapshot;
use crate::fetch::FetchError;

/// Raw result of one field fetch
pub type FieldBody = Result<String, FetchError>;

/// Bodies of every field of one tick, all resolved
#[derive(Debug)]
pub struct TickFetch {
    pub latitude: FieldBody,
    pub longitude: FieldBody,
    pub heading: FieldBody,
    pub speeds: FieldBody,
    pub hazards: FieldBody,
    pub health: FieldBody,
    pub all: FieldBody,
}

/// Problems of one tick, folded into `last_error`
#[derive(Default)]
struct TickErrors(Vec<String>);

impl TickErrors {
    fn note(&mut self, field: Field, error: impl std::fmt::Display) {
        warn!("[telemetry] {}: {}", field.name(), error);
        self.0.push(format!("{}: {}", field.name(), error));
    }

    fn into_message(self) -> Option<String> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0.join("; "))
        }
    }
}

fn scalar(field: Field, body: FieldBody, previous: &Option<String>, errors: &mut TickErrors) -> Option<String> {
    match body {
        Ok(text) => fields::decode_scalar(&text),
        Err(e) => {
            errors.note(field, e);
            previous.clone()
        }
    }
}

/// Build the snapshot of `tick` from its bodies and the currently published snapshot
pub fn merge(previous: &TelemetrySnapshot, tick: u64, fetch: TickFetch) -> TelemetrySnapshot {
    let mut errors = TickErrors::default();

    let latitude = scalar(Field::Latitude, fetch.latitude, &previous.latitude, &mut errors);
    let longitude = scalar(Field::Longitude, fetch.longitude, &previous.longitude, &mut errors);
    let heading = scalar(Field::Heading, fetch.heading, &previous.heading, &mut errors);

    let speeds = match fetch.speeds {
        Ok(text) => match fields::decode_speeds(&text) {
            Ok(speeds) => speeds,
            Err(e) => {
                errors.note(Field::Speeds, e);
                previous.speeds.clone()
            }
        },
        Err(e) => {
            errors.note(Field::Speeds, e);
            previous.speeds.clone()
        }
    };

    // un payload invalide vide la liste, il ne la fige pas
    let hazards = match fetch.hazards {
        Ok(text) => match fields::decode_hazards(&text) {
            Ok(decoded) => {
                for rejected in decoded.rejected {
                    errors.note(Field::Hazards, rejected);
                }
                decoded.hazards
            }
            Err(e) => {
                errors.note(Field::Hazards, e);
                Vec::new()
            }
        },
        Err(e) => {
            errors.note(Field::Hazards, e);
            previous.hazards.clone()
        }
    };

    // jamais de valeur périmée pour la santé
    let health = match fetch.health {
        Ok(text) => fields::decode_health(&text).unwrap_or_else(|e| {
            errors.note(Field::Health, e);
            None
        }),
        Err(e) => {
            errors.note(Field::Health, e);
            None
        }
    };

    let all_fields: BTreeMap<String, String> = match fetch.all {
        Ok(text) => match fields::decode_all_fields(&text) {
            Ok(map) => map,
            Err(e) => {
                errors.note(Field::All, e);
                previous.all_fields.clone()
            }
        },
        Err(e) => {
            errors.note(Field::All, e);
            previous.all_fields.clone()
        }
    };

    TelemetrySnapshot {
        tick,
        latitude,
        longitude,
        heading,
        speeds,
        hazards,
        health,
        all_fields,
        last_error: errors.into_message(),
        published_at: Some(Utc::now()),
    }
}

/// Snapshot for a tick that failed before any field was dispatched
pub fn failed_tick(previous: &TelemetrySnapshot, tick: u64, error: &FetchError) -> TelemetrySnapshot {
    TelemetrySnapshot {
        tick,
        last_error: Some(error.to_string()),
        published_at: Some(Utc::now()),
        ..previous.clone()
    }
}
