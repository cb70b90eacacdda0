//! Raw payload extraction.
//!
//! Normalizes a facility's raw nested payload into a flat, ordered list of
//! records. Three container shapes are accepted: a direct array of records,
//! `{"records": [...]}`, and `{"sheets": {name: {"records": [...]}}}` with
//! sheets concatenated in name order so record order is reproducible.

use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::warn;

/// One flat source record: business field name -> scalar or list of scalars.
pub type Record = IndexMap<String, JsonValue>;

/// The extractor's output for one facility.
#[derive(Debug, Clone)]
pub struct FacilityPayload {
    pub facility_id: String,
    pub records: Vec<Record>,
}

impl FacilityPayload {
    /// An empty payload, produced for unreadable or absent sources.
    pub fn empty(facility_id: impl Into<String>) -> Self {
        Self {
            facility_id: facility_id.into(),
            records: Vec::new(),
        }
    }
}

/// Error type for payload extraction.
#[derive(Debug)]
pub enum ExtractionError {
    /// Source file could not be read.
    Io {
        path: String,
        source: std::io::Error,
    },
    /// Payload is not valid JSON.
    Parse(serde_json::Error),
    /// Payload parsed but matches none of the accepted container shapes.
    UnrecognizedShape(String),
}

impl fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionError::Io { path, source } => {
                write!(f, "Failed to read payload {}: {}", path, source)
            }
            ExtractionError::Parse(e) => write!(f, "Failed to parse payload JSON: {}", e),
            ExtractionError::UnrecognizedShape(detail) => {
                write!(f, "Unrecognized payload container shape: {}", detail)
            }
        }
    }
}

impl std::error::Error for ExtractionError {}

/// Extract the flat record list from a parsed payload.
///
/// # Arguments
/// * `facility_id` - Facility identifier owning the payload
/// * `payload` - Parsed JSON in one of the three container shapes
///
/// # Returns
/// Ordered records for the facility. Malformed elements (non-objects,
/// records with nested-object values) are logged and skipped rather than
/// failing the facility.
///
/// # Errors
/// Returns [`ExtractionError::UnrecognizedShape`] when the payload matches
/// none of the accepted containers.
pub fn extract_records(
    facility_id: &str,
    payload: &JsonValue,
) -> Result<FacilityPayload, ExtractionError> {
    let raw_records: Vec<&JsonValue> = match payload {
        JsonValue::Array(items) => items.iter().collect(),
        JsonValue::Object(map) => {
            if let Some(JsonValue::Array(items)) = map.get("records") {
                items.iter().collect()
            } else if let Some(JsonValue::Object(sheets)) = map.get("sheets") {
                // Sheet order is not guaranteed by the source; sort by name
                // so concatenation is reproducible.
                let mut names: Vec<&String> = sheets.keys().collect();
                names.sort();

                let mut collected = Vec::new();
                for name in names {
                    match sheets.get(name) {
                        Some(JsonValue::Object(sheet)) => {
                            if let Some(JsonValue::Array(items)) = sheet.get("records") {
                                collected.extend(items.iter());
                            } else {
                                warn!(facility = facility_id, sheet = %name,
                                      "sheet has no 'records' array, skipping");
                            }
                        }
                        _ => {
                            warn!(facility = facility_id, sheet = %name,
                                  "sheet is not an object, skipping");
                        }
                    }
                }
                collected
            } else {
                return Err(ExtractionError::UnrecognizedShape(
                    "object without 'records' or 'sheets'".to_string(),
                ));
            }
        }
        other => {
            return Err(ExtractionError::UnrecognizedShape(format!(
                "top-level {}",
                json_type_name(other)
            )));
        }
    };

    let mut records = Vec::new();
    for (index, raw) in raw_records.into_iter().enumerate() {
        match flatten_record(raw) {
            Some(record) => records.push(record),
            None => {
                warn!(
                    facility = facility_id,
                    record_index = index,
                    "skipping malformed record (not a flat field map)"
                );
            }
        }
    }

    Ok(FacilityPayload {
        facility_id: facility_id.to_string(),
        records,
    })
}

/// Read and extract a facility payload from a JSON file.
///
/// Unreadable or absent files never abort the run: they yield an empty
/// record set and a logged warning, per the partial-import operating mode.
pub fn read_payload<P: AsRef<Path>>(facility_id: &str, path: P) -> FacilityPayload {
    let path = path.as_ref();

    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            warn!(facility = facility_id, path = %path.display(),
                  error = %e, "payload unreadable, continuing with empty record set");
            return FacilityPayload::empty(facility_id);
        }
    };

    let payload: JsonValue = match serde_json::from_str(&contents) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(facility = facility_id, path = %path.display(),
                  error = %e, "payload is not valid JSON, continuing with empty record set");
            return FacilityPayload::empty(facility_id);
        }
    };

    match extract_records(facility_id, &payload) {
        Ok(extracted) => extracted,
        Err(e) => {
            warn!(facility = facility_id, path = %path.display(),
                  error = %e, "payload shape not recognized, continuing with empty record set");
            FacilityPayload::empty(facility_id)
        }
    }
}

/// Convert one raw record element into a flat field map.
///
/// Returns `None` for non-object elements and for records containing
/// nested objects (records must be flat per the input contract).
fn flatten_record(raw: &JsonValue) -> Option<Record> {
    let map = raw.as_object()?;

    let mut record = Record::new();
    for (field, value) in map {
        match value {
            JsonValue::Object(_) => return None,
            JsonValue::Array(items) if items.iter().any(|v| v.is_object() || v.is_array()) => {
                return None;
            }
            _ => {
                record.insert(field.clone(), value.clone());
            }
        }
    }
    Some(record)
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
