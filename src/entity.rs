//! Core entity model for the causal incident graph.
//!
//! This module defines the closed set of entity kinds in the five-stage
//! causal workflow, the typed property values they carry, and the
//! missing-data sentinels rendered at the serialization boundary.

use convert_case::{Case, Casing};
use indexmap::IndexMap;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// The closed set of entity kinds, in hierarchical dependency order.
///
/// The first six kinds form the causal spine of the workflow; the rest are
/// peripheral kinds attached to spine entities. Using an enum (rather than
/// string-keyed dispatch) gives compile-time exhaustiveness over the fixed
/// entity set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Facility,
    ActionRequest,
    Problem,
    RootCause,
    ActionPlan,
    Verification,
    Department,
    Asset,
    RecurringStatus,
    AmountOfLoss,
    Review,
    EquipmentStrategy,
}

impl EntityKind {
    /// All kinds, in hierarchical creation order.
    pub const ALL: [EntityKind; 12] = [
        EntityKind::Facility,
        EntityKind::ActionRequest,
        EntityKind::Problem,
        EntityKind::RootCause,
        EntityKind::ActionPlan,
        EntityKind::Verification,
        EntityKind::Review,
        EntityKind::EquipmentStrategy,
        EntityKind::Department,
        EntityKind::AmountOfLoss,
        EntityKind::Asset,
        EntityKind::RecurringStatus,
    ];

    /// The kind name as used in mapping configuration keys and type labels.
    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Facility => "Facility",
            EntityKind::ActionRequest => "ActionRequest",
            EntityKind::Problem => "Problem",
            EntityKind::RootCause => "RootCause",
            EntityKind::ActionPlan => "ActionPlan",
            EntityKind::Verification => "Verification",
            EntityKind::Department => "Department",
            EntityKind::Asset => "Asset",
            EntityKind::RecurringStatus => "RecurringStatus",
            EntityKind::AmountOfLoss => "AmountOfLoss",
            EntityKind::Review => "Review",
            EntityKind::EquipmentStrategy => "EquipmentStrategy",
        }
    }

    /// Lowercase id prefix, e.g. `actionrequest` for [`EntityKind::ActionRequest`].
    ///
    /// Combined with a base id this forms the deterministic primary id:
    /// `actionrequest-SITE_A_AR-1`.
    pub fn id_prefix(&self) -> String {
        self.name().to_case(Case::Flat)
    }

    /// Build the deterministic primary id for an entity of this kind.
    pub fn entity_id(&self, base_id: &str) -> String {
        format!("{}-{}", self.id_prefix(), base_id)
    }

    /// The logical parent kind, `None` only for [`EntityKind::Facility`].
    pub fn parent(&self) -> Option<EntityKind> {
        match self {
            EntityKind::Facility => None,
            EntityKind::ActionRequest => Some(EntityKind::Facility),
            EntityKind::Problem => Some(EntityKind::ActionRequest),
            EntityKind::RootCause => Some(EntityKind::Problem),
            EntityKind::ActionPlan => Some(EntityKind::RootCause),
            EntityKind::Verification => Some(EntityKind::ActionPlan),
            EntityKind::Review => Some(EntityKind::ActionPlan),
            EntityKind::EquipmentStrategy => Some(EntityKind::ActionPlan),
            EntityKind::Department => Some(EntityKind::ActionRequest),
            EntityKind::AmountOfLoss => Some(EntityKind::ActionRequest),
            EntityKind::Asset => Some(EntityKind::Problem),
            EntityKind::RecurringStatus => Some(EntityKind::Problem),
        }
    }

    /// The relationship type linking this kind to its parent kind.
    ///
    /// Edges run child to parent, e.g. `Problem -IDENTIFIED_IN-> ActionRequest`.
    pub fn relationship(&self) -> Option<&'static str> {
        match self {
            EntityKind::Facility => None,
            EntityKind::ActionRequest => Some("REPORTED_AT"),
            EntityKind::Problem => Some("IDENTIFIED_IN"),
            EntityKind::RootCause => Some("EXPLAINS"),
            EntityKind::ActionPlan => Some("ADDRESSES"),
            EntityKind::Verification => Some("VERIFIES"),
            EntityKind::Review => Some("EVALUATES"),
            EntityKind::EquipmentStrategy => Some("DERIVED_FROM"),
            EntityKind::Department => Some("RESPONSIBLE_FOR"),
            EntityKind::AmountOfLoss => Some("QUANTIFIES"),
            EntityKind::Asset => Some("INVOLVED_IN"),
            EntityKind::RecurringStatus => Some("TRACKS"),
        }
    }

    /// Kinds the loader creates one at a time with a minimum-data re-check,
    /// rather than batch-creating.
    pub fn is_conditional(&self) -> bool {
        matches!(
            self,
            EntityKind::Problem
                | EntityKind::RootCause
                | EntityKind::ActionPlan
                | EntityKind::Verification
        )
    }

    /// Kinds on the causal spine, in chain order.
    pub fn causal_spine() -> [EntityKind; 4] {
        [
            EntityKind::ActionRequest,
            EntityKind::Problem,
            EntityKind::RootCause,
            EntityKind::ActionPlan,
        ]
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Error returned when a string does not name a known entity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKindError {
    pub name: String,
}

impl fmt::Display for UnknownKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown entity kind '{}'", self.name)
    }
}

impl std::error::Error for UnknownKindError {}

impl FromStr for EntityKind {
    type Err = UnknownKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .iter()
            .find(|k| k.name() == s)
            .copied()
            .ok_or_else(|| UnknownKindError {
                name: s.to_string(),
            })
    }
}

/// Three-value missing-data marker.
///
/// Internally typed; serialized as the exact sentinel strings the downstream
/// query layer expects (`DATA_NOT_AVAILABLE`, `NOT_SPECIFIED`,
/// `NOT_APPLICABLE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MissingData {
    DataNotAvailable,
    NotSpecified,
    NotApplicable,
}

impl MissingData {
    /// The sentinel string rendered at the serialization boundary.
    pub fn as_str(&self) -> &'static str {
        match self {
            MissingData::DataNotAvailable => "DATA_NOT_AVAILABLE",
            MissingData::NotSpecified => "NOT_SPECIFIED",
            MissingData::NotApplicable => "NOT_APPLICABLE",
        }
    }

    /// Parse a sentinel string back to its marker, if it is one.
    pub fn from_sentinel(s: &str) -> Option<MissingData> {
        match s {
            "DATA_NOT_AVAILABLE" => Some(MissingData::DataNotAvailable),
            "NOT_SPECIFIED" => Some(MissingData::NotSpecified),
            "NOT_APPLICABLE" => Some(MissingData::NotApplicable),
            _ => None,
        }
    }
}

impl fmt::Display for MissingData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for MissingData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MissingData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        MissingData::from_sentinel(&s)
            .ok_or_else(|| de::Error::custom(format!("not a missing-data sentinel: '{}'", s)))
    }
}

/// A normalized property value on an entity.
///
/// Every configured target field holds either a real value or a
/// [`MissingData`] marker; a property is never absent or null.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PropertyValue {
    Missing(MissingData),
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    /// Whether this value carries real data (not a sentinel).
    ///
    /// A list counts as real if any element does.
    pub fn is_real(&self) -> bool {
        match self {
            PropertyValue::Missing(_) => false,
            PropertyValue::List(items) => items.iter().any(|v| v.is_real()),
            _ => true,
        }
    }

    /// The text content of a real string value, if that is what this is.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Missing(m) => write!(f, "{}", m),
            PropertyValue::Text(s) => write!(f, "{}", s),
            PropertyValue::Int(i) => write!(f, "{}", i),
            PropertyValue::Float(fl) => write!(f, "{}", fl),
            PropertyValue::Bool(b) => write!(f, "{}", b),
            PropertyValue::List(l) => write!(f, "{:?}", l),
        }
    }
}

/// One materialized entity, ready for the loader.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphEntity {
    /// Entity kind (also the store type label).
    pub kind: EntityKind,

    /// Deterministic primary id, `{kind_prefix}-{base_id}`.
    pub id: String,

    /// Human-readable display label resolved via cascade labeling.
    pub label: String,

    /// Primary id of the logical parent; `None` only for the facility.
    pub parent_id: Option<String>,

    /// Normalized business fields; every configured target field is present.
    pub properties: IndexMap<String, PropertyValue>,
}

impl GraphEntity {
    pub fn new(kind: EntityKind, id: String, label: String, parent_id: Option<String>) -> Self {
        Self {
            kind,
            id,
            label,
            parent_id,
            properties: IndexMap::new(),
        }
    }

    /// Number of properties carrying real (non-sentinel) data.
    pub fn real_property_count(&self) -> usize {
        self.properties.values().filter(|v| v.is_real()).count()
    }

    /// Full property map for a store write: business fields plus the
    /// identity fields (`id`, `label`, `parent_id`) the store keys on.
    pub fn store_properties(&self) -> IndexMap<String, PropertyValue> {
        let mut props = IndexMap::new();
        props.insert("id".to_string(), PropertyValue::Text(self.id.clone()));
        props.insert("label".to_string(), PropertyValue::Text(self.label.clone()));
        if let Some(parent) = &self.parent_id {
            props.insert("parent_id".to_string(), PropertyValue::Text(parent.clone()));
        }
        for (name, value) in &self.properties {
            props.insert(name.clone(), value.clone());
        }
        props
    }
}

/// Build the deterministic base id for one source record.
///
/// The base id is a slug of the facility id and the action-request number;
/// when the same number repeats within a run, the record index is appended
/// to keep ids unique.
///
/// # Example
/// ```
/// use causegraph::entity::base_id;
///
/// assert_eq!(base_id("SITE_A", "AR-1", None), "SITE_A_AR-1");
/// assert_eq!(base_id("SITE_A", "AR-1", Some(4)), "SITE_A_AR-1_4");
/// ```
pub fn base_id(facility_id: &str, number: &str, disambiguator: Option<usize>) -> String {
    let base = format!("{}_{}", slug(facility_id), slug(number));
    match disambiguator {
        Some(index) => format!("{}_{}", base, index),
        None => base,
    }
}

/// Collapse whitespace runs to single underscores and trim the ends.
pub fn slug(raw: &str) -> String {
    raw.trim().split_whitespace().collect::<Vec<_>>().join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_id_prefix() {
        assert_eq!(EntityKind::ActionRequest.id_prefix(), "actionrequest");
        assert_eq!(EntityKind::RootCause.id_prefix(), "rootcause");
        assert_eq!(EntityKind::EquipmentStrategy.id_prefix(), "equipmentstrategy");
    }

    #[test]
    fn test_entity_id_composition() {
        let id = EntityKind::ActionRequest.entity_id("SITE_A_AR-1");
        assert_eq!(id, "actionrequest-SITE_A_AR-1");
    }

    #[test]
    fn test_parent_chain_reaches_facility() {
        for kind in EntityKind::ALL {
            let mut current = kind;
            let mut hops = 0;
            while let Some(parent) = current.parent() {
                current = parent;
                hops += 1;
                assert!(hops < EntityKind::ALL.len(), "parent cycle at {}", kind);
            }
            assert_eq!(current, EntityKind::Facility);
        }
    }

    #[test]
    fn test_every_non_facility_kind_has_relationship() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.relationship().is_some(), kind != EntityKind::Facility);
        }
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("Problem".parse::<EntityKind>().unwrap(), EntityKind::Problem);
        assert!("Widget".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_sentinel_round_trip() {
        for marker in [
            MissingData::DataNotAvailable,
            MissingData::NotSpecified,
            MissingData::NotApplicable,
        ] {
            assert_eq!(MissingData::from_sentinel(marker.as_str()), Some(marker));
        }
        assert_eq!(MissingData::from_sentinel("whatever"), None);
    }

    #[test]
    fn test_property_value_serializes_sentinel_string() {
        let value = PropertyValue::Missing(MissingData::NotSpecified);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "\"NOT_SPECIFIED\"");
    }

    #[test]
    fn test_property_value_is_real() {
        assert!(PropertyValue::Text("Pump".to_string()).is_real());
        assert!(PropertyValue::Bool(false).is_real());
        assert!(!PropertyValue::Missing(MissingData::DataNotAvailable).is_real());
        assert!(PropertyValue::List(vec![
            PropertyValue::Missing(MissingData::NotSpecified),
            PropertyValue::Text("x".to_string()),
        ])
        .is_real());
    }

    #[test]
    fn test_base_id_deterministic() {
        assert_eq!(base_id("SITE_A", "AR-1", None), base_id("SITE_A", "AR-1", None));
        assert_eq!(base_id(" SITE A ", "AR 1", None), "SITE_A_AR_1");
    }

    #[test]
    fn test_store_properties_include_identity() {
        let mut entity = GraphEntity::new(
            EntityKind::Problem,
            "problem-SITE_A_AR-1".to_string(),
            "Seal_leak".to_string(),
            Some("actionrequest-SITE_A_AR-1".to_string()),
        );
        entity.properties.insert(
            "description".to_string(),
            PropertyValue::Text("Seal leak".to_string()),
        );

        let props = entity.store_properties();
        assert_eq!(
            props.get("id"),
            Some(&PropertyValue::Text("problem-SITE_A_AR-1".to_string()))
        );
        assert_eq!(
            props.get("parent_id"),
            Some(&PropertyValue::Text("actionrequest-SITE_A_AR-1".to_string()))
        );
        assert_eq!(entity.real_property_count(), 1);
    }
}
