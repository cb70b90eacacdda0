//! Field-mapping configuration loader.
//!
//! Loads the externally-owned mapping that drives the transformer: which
//! source fields feed which target fields per entity kind, the label
//! priority cascade, and the required fields behind the conditional
//! creation gate.

use crate::entity::EntityKind;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Mapping for one entity kind.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EntityMapping {
    /// Target field -> source field name in the raw record.
    #[serde(default)]
    pub fields: IndexMap<String, String>,

    /// Source fields tried in order when resolving the display label.
    #[serde(default)]
    pub label_priority: Vec<String>,

    /// Source fields behind the conditional creation gate; at least one
    /// must hold a real value for the entity to materialize. An empty list
    /// means the gate passes trivially.
    #[serde(default)]
    pub required_fields: Vec<String>,
}

impl EntityMapping {
    fn with_fields(pairs: &[(&str, &str)], label_priority: &[&str], required: &[&str]) -> Self {
        Self {
            fields: pairs
                .iter()
                .map(|(target, source)| (target.to_string(), source.to_string()))
                .collect(),
            label_priority: label_priority.iter().map(|s| s.to_string()).collect(),
            required_fields: required.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Full mapping configuration: one [`EntityMapping`] per entity kind.
///
/// Constructed once and passed through the call chain; there is no global
/// configuration state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingConfig {
    pub entities: HashMap<EntityKind, EntityMapping>,
}

impl MappingConfig {
    /// Load mapping configuration from a YAML file.
    ///
    /// # Arguments
    /// * `path` - Path to the mapping YAML (kind name -> mapping block)
    ///
    /// # Errors
    /// Returns error if the file is unreadable, the YAML is invalid, a key
    /// does not name a known entity kind, or the mapping fails validation.
    ///
    /// # Example
    /// ```ignore
    /// use causegraph::config::MappingConfig;
    ///
    /// let config = MappingConfig::load_from_file("config/mapping.yaml")?;
    /// ```
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read mapping file {}: {}", path.display(), e))?;

        Self::from_yaml(&contents)
    }

    /// Parse mapping configuration from a YAML string.
    pub fn from_yaml(contents: &str) -> Result<Self, String> {
        let raw: HashMap<String, EntityMapping> = serde_yaml::from_str(contents)
            .map_err(|e| format!("Failed to parse mapping YAML: {}", e))?;

        let mut entities = HashMap::new();
        for (name, mapping) in raw {
            let kind: EntityKind = name
                .parse()
                .map_err(|e| format!("Invalid mapping key: {}", e))?;
            entities.insert(kind, mapping);
        }

        let config = Self { entities };
        config.validate()?;
        Ok(config)
    }

    /// Validate structural consistency of the mapping.
    ///
    /// Every label-priority and required field must appear among the source
    /// fields of its kind, otherwise the cascade or the gate would silently
    /// never match.
    pub fn validate(&self) -> Result<(), String> {
        for (kind, mapping) in &self.entities {
            let sources: Vec<&String> = mapping.fields.values().collect();
            for field in &mapping.label_priority {
                if !sources.contains(&field) {
                    return Err(format!(
                        "{}: label_priority field '{}' is not a mapped source field",
                        kind, field
                    ));
                }
            }
            for field in &mapping.required_fields {
                if !sources.contains(&field) {
                    return Err(format!(
                        "{}: required field '{}' is not a mapped source field",
                        kind, field
                    ));
                }
            }
        }
        Ok(())
    }

    /// Mapping for one kind; kinds absent from the configuration get an
    /// empty mapping whose gate never passes (no required fields mapped,
    /// no fields at all).
    pub fn mapping(&self, kind: EntityKind) -> Option<&EntityMapping> {
        self.entities.get(&kind)
    }

    /// The built-in incident-record mapping used when no YAML is supplied.
    ///
    /// Field names follow the source system's column headers, quirks
    /// included (the action-request number header carries a trailing colon).
    pub fn default_incident_mapping() -> Self {
        let mut entities = HashMap::new();

        entities.insert(
            EntityKind::Facility,
            EntityMapping::with_fields(&[("name", "Facility")], &["Facility"], &[]),
        );

        entities.insert(
            EntityKind::ActionRequest,
            EntityMapping::with_fields(
                &[
                    ("number", "Action Request Number:"),
                    ("title", "Title"),
                    ("priority", "Priority"),
                    ("status", "Status"),
                    ("date_created", "Date Created"),
                    ("due_date", "Due Date"),
                ],
                &["Title", "Action Request Number:"],
                &["Action Request Number:", "Title"],
            ),
        );

        entities.insert(
            EntityKind::Problem,
            EntityMapping::with_fields(
                &[
                    ("description", "What happened?"),
                    ("date_detected", "Date Detected"),
                    ("impact", "Impact"),
                ],
                &["What happened?"],
                &["What happened?"],
            ),
        );

        entities.insert(
            EntityKind::RootCause,
            EntityMapping::with_fields(
                &[
                    ("cause_text", "Root Cause"),
                    ("analysis_method", "Analysis Method"),
                    ("confirmed", "Cause Confirmed?"),
                ],
                &["Root Cause"],
                &["Root Cause"],
            ),
        );

        entities.insert(
            EntityKind::ActionPlan,
            EntityMapping::with_fields(
                &[
                    ("action", "Corrective Action"),
                    ("owner", "Action Owner"),
                    ("target_date", "Target Completion Date"),
                    ("date_completed", "Date Completed"),
                ],
                &["Corrective Action"],
                &["Corrective Action"],
            ),
        );

        entities.insert(
            EntityKind::Verification,
            EntityMapping::with_fields(
                &[
                    ("result", "Verification Result"),
                    ("verified_by", "Verified By"),
                    ("verification_date", "Verification Date"),
                ],
                &["Verification Result"],
                &["Verification Result"],
            ),
        );

        entities.insert(
            EntityKind::Review,
            EntityMapping::with_fields(
                &[
                    ("reviewed_by", "Reviewed By"),
                    ("review_comments", "Review Comments"),
                    ("review_date", "Review Date"),
                ],
                &["Reviewed By"],
                &["Reviewed By", "Review Comments"],
            ),
        );

        entities.insert(
            EntityKind::EquipmentStrategy,
            EntityMapping::with_fields(
                &[
                    ("strategy_change", "Equipment Strategy Change"),
                    ("strategy_owner", "Strategy Owner"),
                ],
                &["Equipment Strategy Change"],
                &["Equipment Strategy Change"],
            ),
        );

        entities.insert(
            EntityKind::Department,
            EntityMapping::with_fields(
                &[("name", "Department")],
                &["Department"],
                &["Department"],
            ),
        );

        entities.insert(
            EntityKind::Asset,
            EntityMapping::with_fields(
                &[("name", "Asset"), ("asset_number", "Asset Number")],
                &["Asset", "Asset Number"],
                &["Asset", "Asset Number"],
            ),
        );

        entities.insert(
            EntityKind::RecurringStatus,
            EntityMapping::with_fields(
                &[
                    ("recurring", "Recurring?"),
                    ("frequency", "Recurrence Frequency"),
                ],
                &["Recurring?"],
                &["Recurring?"],
            ),
        );

        entities.insert(
            EntityKind::AmountOfLoss,
            EntityMapping::with_fields(
                &[("amount", "Amount of Loss"), ("currency", "Currency")],
                &["Amount of Loss"],
                &["Amount of Loss"],
            ),
        );

        Self { entities }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mapping_validates() {
        let config = MappingConfig::default_incident_mapping();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_mapping_covers_all_kinds() {
        let config = MappingConfig::default_incident_mapping();
        for kind in EntityKind::ALL {
            assert!(config.mapping(kind).is_some(), "missing mapping for {}", kind);
        }
    }

    #[test]
    fn test_facility_gate_is_trivial() {
        let config = MappingConfig::default_incident_mapping();
        assert!(config
            .mapping(EntityKind::Facility)
            .unwrap()
            .required_fields
            .is_empty());
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
Problem:
  fields:
    description: "What happened?"
  label_priority: ["What happened?"]
  required_fields: ["What happened?"]
"#;
        let config = MappingConfig::from_yaml(yaml).unwrap();
        let mapping = config.mapping(EntityKind::Problem).unwrap();
        assert_eq!(
            mapping.fields.get("description"),
            Some(&"What happened?".to_string())
        );
    }

    #[test]
    fn test_from_yaml_rejects_unknown_kind() {
        let yaml = r#"
Widget:
  fields:
    name: "Name"
"#;
        let err = MappingConfig::from_yaml(yaml).unwrap_err();
        assert!(err.contains("Unknown entity kind"));
    }

    #[test]
    fn test_validate_rejects_unmapped_required_field() {
        let yaml = r#"
Problem:
  fields:
    description: "What happened?"
  required_fields: ["Severity"]
"#;
        let err = MappingConfig::from_yaml(yaml).unwrap_err();
        assert!(err.contains("required field 'Severity'"));
    }

    #[test]
    fn test_validate_rejects_unmapped_label_field() {
        let yaml = r#"
Problem:
  fields:
    description: "What happened?"
  label_priority: ["Title"]
"#;
        let err = MappingConfig::from_yaml(yaml).unwrap_err();
        assert!(err.contains("label_priority field 'Title'"));
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "ActionRequest:\n  fields:\n    title: Title\n  label_priority: [Title]\n  required_fields: [Title]"
        )
        .unwrap();

        let config = MappingConfig::load_from_file(file.path()).unwrap();
        assert!(config.mapping(EntityKind::ActionRequest).is_some());
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = MappingConfig::load_from_file("/no/such/mapping.yaml").unwrap_err();
        assert!(err.contains("Failed to read mapping file"));
    }
}
