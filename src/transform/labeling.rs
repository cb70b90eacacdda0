//! Cascade labeling.
//!
//! Resolves a human-readable display label for each entity by trying the
//! kind's priority-ordered candidate fields and cleaning the first one that
//! holds real data. The label is for display and identification only; it is
//! never part of the primary id.

use crate::config::EntityMapping;
use crate::entity::EntityKind;
use crate::extraction::Record;
use crate::transform::normalize::is_real_value;

/// Maximum label length after cleaning.
const MAX_LABEL_LEN: usize = 64;

/// Resolve the display label for one entity.
///
/// Tries each field in the mapping's `label_priority` list; the first field
/// holding a real, non-sentinel value is cleaned and becomes the label. If
/// no candidate qualifies, the label falls back to the kind name.
pub fn resolve_label(kind: EntityKind, mapping: &EntityMapping, record: &Record) -> String {
    for field in &mapping.label_priority {
        if let Some(value) = record.get(field) {
            if is_real_value(value) {
                let raw = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                return clean_label(kind, &raw);
            }
        }
    }
    kind.name().to_string()
}

/// Clean a raw label candidate.
///
/// Whitespace and dashes become underscores, everything outside
/// `[A-Za-z0-9_]` is dropped, underscore runs collapse, and the result is
/// capped at 64 characters. A label must start with an ASCII letter; when
/// it does not (or cleaning leaves nothing), the kind name steps in.
pub fn clean_label(kind: EntityKind, raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    let mut last_was_underscore = false;

    for c in raw.trim().chars() {
        let mapped = if c.is_whitespace() || c == '-' {
            Some('_')
        } else if c.is_ascii_alphanumeric() || c == '_' {
            Some(c)
        } else {
            None
        };

        if let Some(c) = mapped {
            if c == '_' {
                if last_was_underscore {
                    continue;
                }
                last_was_underscore = true;
            } else {
                last_was_underscore = false;
            }
            cleaned.push(c);
        }
    }

    let cleaned = cleaned.trim_matches('_');

    let mut label = if cleaned.is_empty() {
        kind.name().to_string()
    } else if !cleaned.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
        format!("{}_{}", kind.name(), cleaned)
    } else {
        cleaned.to_string()
    };

    label.truncate(MAX_LABEL_LEN);
    label
}
