//! Field normalization and missing-data semantics.
//!
//! Converts raw source values into typed [`PropertyValue`]s: strings are
//! trimmed, boolean vocabulary is coerced, parseable dates become ISO
//! `YYYY-MM-DD`, and absent/empty/unknown values become the
//! field-appropriate missing-data sentinel.

use crate::entity::{MissingData, PropertyValue};
use chrono::NaiveDate;
use serde_json::Value as JsonValue;

/// Source vocabulary treated as generically missing.
const MISSING_VOCABULARY: [&str; 4] = ["unknown", "none", "null", "-"];

/// Source vocabulary meaning the field does not apply to this record.
const NOT_APPLICABLE_VOCABULARY: [&str; 3] = ["n/a", "na", "not applicable"];

/// Field-name fragments marking date/time fields.
const TEMPORAL_FRAGMENTS: [&str; 7] =
    ["date", "time", "deadline", "due", "completed", "closed", "when"];

/// Field-name fragments marking free-text fields.
const FREE_TEXT_FRAGMENTS: [&str; 11] = [
    "description",
    "comment",
    "note",
    "cause",
    "action",
    "happened",
    "result",
    "remark",
    "title",
    "text",
    "impact",
];

/// Date formats accepted for ISO coercion, tried in order.
const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%d-%b-%Y", "%Y/%m/%d"];

/// Pick the missing-data sentinel for a field by name heuristic.
///
/// Date/time fields get `DATA_NOT_AVAILABLE`, free-text fields get
/// `NOT_SPECIFIED`, everything else gets `DATA_NOT_AVAILABLE`.
pub fn sentinel_for_field(field: &str) -> MissingData {
    let lower = field.to_lowercase();
    if TEMPORAL_FRAGMENTS.iter().any(|f| lower.contains(f)) {
        MissingData::DataNotAvailable
    } else if FREE_TEXT_FRAGMENTS.iter().any(|f| lower.contains(f)) {
        MissingData::NotSpecified
    } else {
        MissingData::DataNotAvailable
    }
}

/// Classify a trimmed string as missing, if it is.
///
/// Explicit not-applicable vocabulary maps to `NOT_APPLICABLE`; the generic
/// missing vocabulary (and sentinel strings themselves) fall back to the
/// field-name heuristic.
fn classify_missing_text(field: &str, trimmed: &str) -> Option<MissingData> {
    if trimmed.is_empty() {
        return Some(sentinel_for_field(field));
    }
    let lower = trimmed.to_lowercase();
    if NOT_APPLICABLE_VOCABULARY.contains(&lower.as_str()) {
        return Some(MissingData::NotApplicable);
    }
    if MISSING_VOCABULARY.contains(&lower.as_str()) {
        return Some(sentinel_for_field(field));
    }
    if let Some(marker) = MissingData::from_sentinel(trimmed) {
        return Some(marker);
    }
    None
}

/// Whether a raw source value carries real data.
///
/// Drives both the conditional creation gate and the label cascade.
pub fn is_real_value(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(_) | JsonValue::Number(_) => true,
        JsonValue::String(s) => classify_missing_text("", s.trim()).is_none(),
        JsonValue::Array(items) => items.iter().any(is_real_value),
        JsonValue::Object(_) => false,
    }
}

/// Normalize one raw source value for a target field.
///
/// Absent values are passed as `None`; the result is always a concrete
/// [`PropertyValue`], never a hole.
pub fn normalize_value(field: &str, value: Option<&JsonValue>) -> PropertyValue {
    let Some(value) = value else {
        return PropertyValue::Missing(sentinel_for_field(field));
    };

    match value {
        JsonValue::Null => PropertyValue::Missing(sentinel_for_field(field)),
        JsonValue::Bool(b) => PropertyValue::Bool(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                PropertyValue::Int(i)
            } else if let Some(f) = n.as_f64() {
                PropertyValue::Float(f)
            } else {
                PropertyValue::Missing(sentinel_for_field(field))
            }
        }
        JsonValue::String(s) => normalize_text(field, s),
        JsonValue::Array(items) => {
            let normalized: Vec<PropertyValue> = items
                .iter()
                .filter(|v| is_real_value(v))
                .map(|v| normalize_value(field, Some(v)))
                .collect();
            if normalized.is_empty() {
                PropertyValue::Missing(sentinel_for_field(field))
            } else {
                PropertyValue::List(normalized)
            }
        }
        // Nested objects are rejected upstream; render as missing if one
        // slips through a hand-built record.
        JsonValue::Object(_) => PropertyValue::Missing(sentinel_for_field(field)),
    }
}

fn normalize_text(field: &str, raw: &str) -> PropertyValue {
    let trimmed = raw.trim();

    if let Some(marker) = classify_missing_text(field, trimmed) {
        return PropertyValue::Missing(marker);
    }

    match trimmed.to_lowercase().as_str() {
        "yes" | "y" | "true" => return PropertyValue::Bool(true),
        "no" | "n" | "false" => return PropertyValue::Bool(false),
        _ => {}
    }

    if let Some(iso) = normalize_date(trimmed) {
        return PropertyValue::Text(iso);
    }

    PropertyValue::Text(trimmed.to_string())
}

/// Coerce a date-like string to ISO `YYYY-MM-DD`, if it parses.
pub fn normalize_date(raw: &str) -> Option<String> {
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }
    // Timestamps keep only the date component.
    if raw.len() > 10 && raw.is_char_boundary(10) {
        let (head, rest) = raw.split_at(10);
        if rest.starts_with('T') || rest.starts_with(' ') {
            if let Ok(date) = NaiveDate::parse_from_str(head, "%Y-%m-%d") {
                return Some(date.format("%Y-%m-%d").to_string());
            }
        }
    }
    None
}

/// Ordered delimiter list for causal-tail extraction.
const TAIL_DELIMITERS: [&str; 8] = [";", ",", "|", "\n", " - ", " / ", " and ", " & "];

/// Derive the causal tail: the last delimiter-separated clause of the raw
/// cause text, used as a secondary, more specific causal signal.
///
/// The first delimiter that splits the text into two or more non-empty
/// parts wins; with no such delimiter the tail is the whole string.
/// Empty or sentinel input yields `NOT_SPECIFIED`.
///
/// # Example
/// ```
/// use causegraph::transform::causal_tail;
///
/// assert_eq!(causal_tail(Some("Worn seal; Contaminated lubricant")), "Contaminated lubricant");
/// assert_eq!(causal_tail(Some("single value")), "single value");
/// assert_eq!(causal_tail(None), "NOT_SPECIFIED");
/// ```
pub fn causal_tail(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return MissingData::NotSpecified.as_str().to_string();
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() || classify_missing_text("cause", trimmed).is_some() {
        return MissingData::NotSpecified.as_str().to_string();
    }

    for delimiter in TAIL_DELIMITERS {
        let parts: Vec<&str> = trimmed
            .split(delimiter)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if parts.len() >= 2 {
            return parts[parts.len() - 1].to_string();
        }
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sentinel_heuristic() {
        assert_eq!(sentinel_for_field("Due Date"), MissingData::DataNotAvailable);
        assert_eq!(sentinel_for_field("date_completed"), MissingData::DataNotAvailable);
        assert_eq!(sentinel_for_field("description"), MissingData::NotSpecified);
        assert_eq!(sentinel_for_field("Review Comments"), MissingData::NotSpecified);
        assert_eq!(sentinel_for_field("priority"), MissingData::DataNotAvailable);
    }

    #[test]
    fn test_temporal_wins_over_free_text() {
        // "Date Completed" matches both heuristics; temporal takes precedence.
        assert_eq!(sentinel_for_field("Action Completed Date"), MissingData::DataNotAvailable);
    }

    #[test]
    fn test_is_real_value() {
        assert!(is_real_value(&json!("Pump seal leak")));
        assert!(is_real_value(&json!(42)));
        assert!(is_real_value(&json!(false)));
        assert!(!is_real_value(&json!(null)));
        assert!(!is_real_value(&json!("")));
        assert!(!is_real_value(&json!("  ")));
        assert!(!is_real_value(&json!("unknown")));
        assert!(!is_real_value(&json!("N/A")));
        assert!(!is_real_value(&json!("DATA_NOT_AVAILABLE")));
        assert!(is_real_value(&json!(["", "seal"])));
        assert!(!is_real_value(&json!([""])));
    }

    #[test]
    fn test_normalize_trims_strings() {
        assert_eq!(
            normalize_value("title", Some(&json!("  Pump seal leak  "))),
            PropertyValue::Text("Pump seal leak".to_string())
        );
    }

    #[test]
    fn test_normalize_boolean_vocabulary() {
        assert_eq!(normalize_value("recurring", Some(&json!("Yes"))), PropertyValue::Bool(true));
        assert_eq!(normalize_value("recurring", Some(&json!("no"))), PropertyValue::Bool(false));
        assert_eq!(normalize_value("recurring", Some(&json!("TRUE"))), PropertyValue::Bool(true));
    }

    #[test]
    fn test_normalize_dates_to_iso() {
        assert_eq!(
            normalize_value("due_date", Some(&json!("15/03/2024"))),
            PropertyValue::Text("2024-03-15".to_string())
        );
        assert_eq!(
            normalize_value("due_date", Some(&json!("2024-03-15"))),
            PropertyValue::Text("2024-03-15".to_string())
        );
        assert_eq!(
            normalize_value("due_date", Some(&json!("03/25/2024"))),
            PropertyValue::Text("2024-03-25".to_string())
        );
        assert_eq!(
            normalize_value("due_date", Some(&json!("15-Mar-2024"))),
            PropertyValue::Text("2024-03-15".to_string())
        );
    }

    #[test]
    fn test_normalize_timestamp_keeps_date() {
        assert_eq!(normalize_date("2024-03-15T10:30:00"), Some("2024-03-15".to_string()));
        assert_eq!(normalize_date("not a date"), None);
    }

    #[test]
    fn test_normalize_missing_values() {
        assert_eq!(
            normalize_value("due_date", None),
            PropertyValue::Missing(MissingData::DataNotAvailable)
        );
        assert_eq!(
            normalize_value("description", Some(&json!(""))),
            PropertyValue::Missing(MissingData::NotSpecified)
        );
        assert_eq!(
            normalize_value("priority", Some(&json!("unknown"))),
            PropertyValue::Missing(MissingData::DataNotAvailable)
        );
        assert_eq!(
            normalize_value("amount", Some(&json!("N/A"))),
            PropertyValue::Missing(MissingData::NotApplicable)
        );
    }

    #[test]
    fn test_normalize_numbers() {
        assert_eq!(normalize_value("amount", Some(&json!(1200))), PropertyValue::Int(1200));
        assert_eq!(normalize_value("amount", Some(&json!(12.5))), PropertyValue::Float(12.5));
    }

    #[test]
    fn test_normalize_list_filters_empties() {
        let value = json!(["seal", "", "lubricant"]);
        assert_eq!(
            normalize_value("tags", Some(&value)),
            PropertyValue::List(vec![
                PropertyValue::Text("seal".to_string()),
                PropertyValue::Text("lubricant".to_string()),
            ])
        );
        assert_eq!(
            normalize_value("tags", Some(&json!(["", " "]))),
            PropertyValue::Missing(MissingData::DataNotAvailable)
        );
    }

    #[test]
    fn test_causal_tail_split() {
        assert_eq!(causal_tail(Some("A; B; C")), "C");
        assert_eq!(causal_tail(Some("Worn seal; Contaminated lubricant")), "Contaminated lubricant");
        assert_eq!(causal_tail(Some("heat, friction")), "friction");
        assert_eq!(causal_tail(Some("line one\nline two")), "line two");
        assert_eq!(causal_tail(Some("overload - fatigue")), "fatigue");
        assert_eq!(causal_tail(Some("misalignment and vibration")), "vibration");
    }

    #[test]
    fn test_causal_tail_delimiter_order() {
        // Semicolon outranks comma, so the comma stays inside the tail.
        assert_eq!(causal_tail(Some("heat, friction; wear")), "wear");
    }

    #[test]
    fn test_causal_tail_single_value() {
        assert_eq!(causal_tail(Some("single value")), "single value");
        assert_eq!(causal_tail(Some("  padded  ")), "padded");
    }

    #[test]
    fn test_causal_tail_missing() {
        assert_eq!(causal_tail(None), "NOT_SPECIFIED");
        assert_eq!(causal_tail(Some("")), "NOT_SPECIFIED");
        assert_eq!(causal_tail(Some("unknown")), "NOT_SPECIFIED");
        assert_eq!(causal_tail(Some("NOT_SPECIFIED")), "NOT_SPECIFIED");
    }

    #[test]
    fn test_causal_tail_trailing_delimiter() {
        // A trailing delimiter leaves only one non-empty part.
        assert_eq!(causal_tail(Some("worn seal;")), "worn seal");
    }
}
