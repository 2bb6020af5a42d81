//! Telemetry endpoints and payload decoders
//!
//! Decoders only say what a payload contains. Which value a field falls back
//! to when a payload is missing or malformed is decided in `merge`.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::{Hazard, HostHealth};

/// One independently fetched telemetry field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Latitude,
    Longitude,
    Heading,
    Speeds,
    Hazards,
    Health,
    All,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Latitude,
        Field::Longitude,
        Field::Heading,
        Field::Speeds,
        Field::Hazards,
        Field::Health,
        Field::All,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Field::Latitude => "/telemetry/latitude",
            Field::Longitude => "/telemetry/longitude",
            Field::Heading => "/telemetry/heading",
            Field::Speeds => "/telemetry/speeds",
            Field::Hazards => "/telemetry/hazards",
            Field::Health => "/health",
            Field::All => "/telemetry",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Field::Latitude => "latitude",
            Field::Longitude => "longitude",
            Field::Heading => "heading",
            Field::Speeds => "speeds",
            Field::Hazards => "hazards",
            Field::Health => "health",
            Field::All => "all",
        }
    }
}

/// A payload that arrived but could not be decoded
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected {expected}, got {found}")]
    Shape { expected: &'static str, found: &'static str },
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Display text of a JSON value: strings unquoted, everything else as JSON
fn display_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Scalar text fields: the literal `null` means absent, anything else is kept verbatim
pub fn decode_scalar(text: &str) -> Option<String> {
    if text == "null" {
        None
    } else {
        Some(text.to_string())
    }
}

/// `/telemetry/speeds`: JSON `null` or an array kept in wire order
pub fn decode_speeds(text: &str) -> Result<Option<Vec<String>>, PayloadError> {
    match serde_json::from_str::<Value>(text)? {
        Value::Null => Ok(None),
        Value::Array(items) => Ok(Some(items.into_iter().map(display_text).collect())),
        other => Err(PayloadError::Shape {
            expected: "array",
            found: kind_of(&other),
        }),
    }
}

/// Hazards of one payload. Entries that do not decode are skipped and
/// described in `rejected`; the others are kept in wire order.
#[derive(Debug, Default)]
pub struct DecodedHazards {
    pub hazards: Vec<Hazard>,
    pub rejected: Vec<String>,
}

/// `/telemetry/hazards`: JSON `null` means no hazards
pub fn decode_hazards(text: &str) -> Result<DecodedHazards, PayloadError> {
    match serde_json::from_str::<Value>(text)? {
        Value::Null => Ok(DecodedHazards::default()),
        Value::Array(items) => {
            let mut decoded = DecodedHazards::default();
            for (index, item) in items.into_iter().enumerate() {
                match serde_json::from_value::<Hazard>(item) {
                    Ok(hazard) => decoded.hazards.push(hazard),
                    Err(e) => decoded.rejected.push(format!("entry {index} skipped: {e}")),
                }
            }
            Ok(decoded)
        }
        other => Err(PayloadError::Shape {
            expected: "array",
            found: kind_of(&other),
        }),
    }
}

pub fn decode_health(text: &str) -> Result<Option<HostHealth>, PayloadError> {
    Ok(serde_json::from_str::<Option<HostHealth>>(text)?)
}

#[derive(Debug, Deserialize)]
struct KeyValue {
    key: String,
    value: Value,
}

/// `/telemetry`: `[{key, value}, ...]` folded into a map, later keys win
pub fn decode_all_fields(text: &str) -> Result<BTreeMap<String, String>, PayloadError> {
    let records: Vec<KeyValue> = serde_json::from_str(text)?;
    Ok(records
        .into_iter()
        .map(|kv| (kv.key, display_text(kv.value)))
        .collect())
}
