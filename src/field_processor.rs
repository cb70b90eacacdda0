//! Advisory field analytics.
//!
//! Optional utilities consumed by the transformer and reporting layers:
//! temporal-sequence detection, cross-field relationship pairing, and
//! dependency-rule checks. Everything here is diagnostic; nothing in this
//! module gates entity creation, and failures are non-blocking.

use crate::extraction::Record;
use crate::transform::normalize::{is_real_value, normalize_date};
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Field-name vocabulary marking temporal fields.
const TEMPORAL_VOCABULARY: [&str; 8] = [
    "date", "time", "deadline", "due", "completed", "created", "closed", "when",
];

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{4}-\d{2}-\d{2}|\d{1,2}/\d{1,2}/\d{4}|\d{1,2}-[A-Za-z]{3}-\d{4})")
            .expect("date pattern is valid")
    })
}

/// One field recognized as temporal, with its canonical date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalField {
    pub field: String,
    pub raw: String,
    /// Canonical `YYYY-MM-DD` form.
    pub normalized: String,
}

/// Detect the temporal fields of a record and order them ascending by date.
///
/// A field participates when its name matches the temporal vocabulary or
/// its value matches a date-like pattern. Values that cannot be parsed to
/// a date are left out even when the name matches.
pub fn detect_temporal_sequence(record: &Record) -> Vec<TemporalField> {
    let mut found: Vec<(NaiveDate, TemporalField)> = Vec::new();

    for (field, value) in record {
        let JsonValue::String(raw) = value else {
            continue;
        };
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let name_matches = {
            let lower = field.to_lowercase();
            TEMPORAL_VOCABULARY.iter().any(|v| lower.contains(v))
        };
        if !name_matches && !date_pattern().is_match(raw) {
            continue;
        }

        let Some(normalized) = normalize_date(raw) else {
            continue;
        };
        let parsed = NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
            .expect("normalized date is ISO");

        found.push((
            parsed,
            TemporalField {
                field: field.clone(),
                raw: raw.to_string(),
                normalized,
            },
        ));
    }

    found.sort_by_key(|(date, _)| *date);
    found.into_iter().map(|(_, field)| field).collect()
}

/// The kind of cross-field link a fixed pair represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationshipHint {
    CauseEvidence,
    ActionOutcome,
    DepartmentFlow,
}

/// A detected cross-field relationship with a token-overlap confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRelationship {
    pub source_field: String,
    pub target_field: String,
    pub hint: RelationshipHint,
    /// Jaccard token overlap of the two values, in [0, 1].
    pub confidence: f64,
}

/// Fixed field pairs inspected for cross-field relationships.
const FIELD_PAIRS: [(&str, &str, RelationshipHint); 3] = [
    ("Root Cause", "Evidence", RelationshipHint::CauseEvidence),
    ("Corrective Action", "Outcome", RelationshipHint::ActionOutcome),
    ("Department", "Responsible Department", RelationshipHint::DepartmentFlow),
];

/// Extract relationship records for the fixed field pairs.
///
/// A pair is emitted only when both fields hold real values; the
/// confidence is the token overlap of the two values.
pub fn extract_field_relationships(record: &Record) -> Vec<FieldRelationship> {
    let mut relationships = Vec::new();

    for (source_field, target_field, hint) in FIELD_PAIRS {
        let (Some(source), Some(target)) = (record.get(source_field), record.get(target_field))
        else {
            continue;
        };
        if !is_real_value(source) || !is_real_value(target) {
            continue;
        }

        relationships.push(FieldRelationship {
            source_field: source_field.to_string(),
            target_field: target_field.to_string(),
            hint,
            confidence: token_overlap(&value_text(source), &value_text(target)),
        });
    }

    relationships
}

/// Jaccard overlap of the lowercase word tokens of two strings.
fn token_overlap(a: &str, b: &str) -> f64 {
    let tokens_a = tokenize(a);
    let tokens_b = tokenize(b);
    if tokens_a.is_empty() && tokens_b.is_empty() {
        return 0.0;
    }

    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();
    intersection as f64 / union as f64
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn value_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A conditional requirement between two fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyRule {
    /// Field whose value triggers the rule.
    pub trigger_field: String,
    /// Trigger value, compared case-insensitively.
    pub trigger_value: String,
    /// Field that must then hold real data.
    pub dependent_field: String,
    /// Human-readable statement of the requirement, for reports.
    pub requirement: String,
}

/// One reported rule violation. Diagnostic only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleViolation {
    pub trigger_field: String,
    pub dependent_field: String,
    pub requirement: String,
}

/// Check a record against a set of dependency rules.
///
/// A violation is reported when the trigger condition holds but the
/// dependent field is absent or empty.
pub fn check_dependency_rules(record: &Record, rules: &[DependencyRule]) -> Vec<RuleViolation> {
    let mut violations = Vec::new();

    for rule in rules {
        let triggered = record
            .get(&rule.trigger_field)
            .map(|v| value_text(v).trim().eq_ignore_ascii_case(&rule.trigger_value))
            .unwrap_or(false);
        if !triggered {
            continue;
        }

        let satisfied = record
            .get(&rule.dependent_field)
            .is_some_and(is_real_value);
        if !satisfied {
            violations.push(RuleViolation {
                trigger_field: rule.trigger_field.clone(),
                dependent_field: rule.dependent_field.clone(),
                requirement: rule.requirement.clone(),
            });
        }
    }

    violations
}

/// Built-in rules for the incident-record domain.
pub fn default_dependency_rules() -> Vec<DependencyRule> {
    vec![
        DependencyRule {
            trigger_field: "Recurring?".to_string(),
            trigger_value: "Yes".to_string(),
            dependent_field: "Recurrence Frequency".to_string(),
            requirement: "recurring incidents must state a recurrence frequency".to_string(),
        },
        DependencyRule {
            trigger_field: "Cause Confirmed?".to_string(),
            trigger_value: "Yes".to_string(),
            dependent_field: "Analysis Method".to_string(),
            requirement: "confirmed causes must state the analysis method".to_string(),
        },
        DependencyRule {
            trigger_field: "Status".to_string(),
            trigger_value: "Closed".to_string(),
            dependent_field: "Date Completed".to_string(),
            requirement: "closed requests must carry a completion date".to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(pairs: &[(&str, JsonValue)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_temporal_sequence_ordered_ascending() {
        let r = record(&[
            ("Date Completed", json!("2024-06-01")),
            ("Date Created", json!("15/03/2024")),
            ("Title", json!("Pump seal leak")),
            ("Due Date", json!("2024-04-20")),
        ]);

        let sequence = detect_temporal_sequence(&r);
        let fields: Vec<&str> = sequence.iter().map(|t| t.field.as_str()).collect();
        assert_eq!(fields, vec!["Date Created", "Due Date", "Date Completed"]);
        assert_eq!(sequence[0].normalized, "2024-03-15");
    }

    #[test]
    fn test_temporal_detection_by_value_pattern() {
        // Field name carries no temporal vocabulary; the value shape does.
        let r = record(&[("Follow-up", json!("01/02/2024"))]);

        let sequence = detect_temporal_sequence(&r);
        assert_eq!(sequence.len(), 1);
        assert_eq!(sequence[0].normalized, "2024-02-01");
    }

    #[test]
    fn test_temporal_skips_unparseable() {
        let r = record(&[("Due Date", json!("whenever")), ("Title", json!("x"))]);
        assert!(detect_temporal_sequence(&r).is_empty());
    }

    #[test]
    fn test_field_relationships_with_overlap() {
        let r = record(&[
            ("Root Cause", json!("worn seal")),
            ("Evidence", json!("seal inspection photos")),
        ]);

        let rels = extract_field_relationships(&r);
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].hint, RelationshipHint::CauseEvidence);
        // tokens: {worn, seal} vs {seal, inspection, photos} -> 1/4
        assert!((rels[0].confidence - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_field_relationships_require_both_sides() {
        let r = record(&[("Root Cause", json!("worn seal")), ("Evidence", json!(""))]);
        assert!(extract_field_relationships(&r).is_empty());
    }

    #[test]
    fn test_confidence_bounds() {
        let r = record(&[
            ("Root Cause", json!("worn seal")),
            ("Evidence", json!("worn seal")),
        ]);
        let rels = extract_field_relationships(&r);
        assert!((rels[0].confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_dependency_rule_violation() {
        let r = record(&[("Recurring?", json!("Yes"))]);

        let violations = check_dependency_rules(&r, &default_dependency_rules());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].dependent_field, "Recurrence Frequency");
    }

    #[test]
    fn test_dependency_rule_satisfied() {
        let r = record(&[
            ("Recurring?", json!("yes")),
            ("Recurrence Frequency", json!("Monthly")),
        ]);

        assert!(check_dependency_rules(&r, &default_dependency_rules()).is_empty());
    }

    #[test]
    fn test_dependency_rule_not_triggered() {
        let r = record(&[("Recurring?", json!("No"))]);
        assert!(check_dependency_rules(&r, &default_dependency_rules()).is_empty());
    }
}
