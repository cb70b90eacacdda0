//! Record-to-entity transformation engine.
//!
//! Synthesizes the full entity hierarchy for one source record: walks the
//! fixed workflow hierarchy, evaluates the conditional creation gate at
//! each node, prunes descendants of failed gates, normalizes fields,
//! derives the causal tail, and resolves cascade labels. One transformer
//! instance covers one facility's run; records feed a shared accumulator
//! strictly one at a time.

use crate::config::MappingConfig;
use crate::entity::{base_id, slug, EntityKind, GraphEntity, MissingData, PropertyValue};
use crate::extraction::Record;
use crate::transform::labeling::resolve_label;
use crate::transform::normalize::{causal_tail, is_real_value, normalize_value};
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, warn};

/// Error type for per-record synthesis failures.
///
/// A failed record is skipped by the batch driver; it never aborts the
/// batch. Gate failures are not errors (see [`EntityAccumulator::skip_count`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// The facility identifier was blank.
    MissingFacilityId,
    /// The record carried no fields at all.
    EmptyRecord { record_index: usize },
    /// A field value was not a scalar or list of scalars.
    InvalidFieldValue {
        record_index: usize,
        field: String,
    },
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::MissingFacilityId => {
                write!(f, "Facility identifier is missing or blank")
            }
            TransformError::EmptyRecord { record_index } => {
                write!(f, "Record {} carries no fields", record_index)
            }
            TransformError::InvalidFieldValue {
                record_index,
                field,
            } => {
                write!(
                    f,
                    "Record {} field '{}' is not a scalar or list of scalars",
                    record_index, field
                )
            }
        }
    }
}

impl std::error::Error for TransformError {}

/// Type-keyed accumulator for created entities, in creation order.
///
/// Also tracks per-kind gate skips: a failed conditional creation gate is
/// expected branch-pruning, surfaced only through these counters.
#[derive(Debug, Default)]
pub struct EntityAccumulator {
    by_kind: IndexMap<EntityKind, Vec<GraphEntity>>,
    gate_skips: IndexMap<EntityKind, usize>,
}

impl EntityAccumulator {
    pub fn push(&mut self, entity: GraphEntity) {
        self.by_kind.entry(entity.kind).or_default().push(entity);
    }

    pub fn record_skip(&mut self, kind: EntityKind) {
        *self.gate_skips.entry(kind).or_insert(0) += 1;
    }

    /// Entities of one kind, in creation order.
    pub fn entities(&self, kind: EntityKind) -> &[GraphEntity] {
        self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.entities(kind).len()
    }

    pub fn skip_count(&self, kind: EntityKind) -> usize {
        self.gate_skips.get(&kind).copied().unwrap_or(0)
    }

    pub fn gate_skips(&self) -> &IndexMap<EntityKind, usize> {
        &self.gate_skips
    }

    pub fn total(&self) -> usize {
        self.by_kind.values().map(Vec::len).sum()
    }

    /// All entities in hierarchical kind order, creation order within kind.
    pub fn iter_hierarchical(&self) -> impl Iterator<Item = &GraphEntity> {
        EntityKind::ALL
            .iter()
            .flat_map(move |kind| self.entities(*kind).iter())
    }
}

/// Batch result: per-record outcomes aggregated by the driver.
#[derive(Debug, Default)]
pub struct TransformReport {
    pub records_total: usize,
    pub records_transformed: usize,
    pub records_failed: usize,
    pub errors: Vec<(usize, TransformError)>,
}

/// The transformer's final output for one facility.
#[derive(Debug)]
pub struct TransformOutput {
    pub facility_id: String,
    pub accumulator: EntityAccumulator,
    pub report: TransformReport,
}

/// Transformation engine for one facility's records.
///
/// Holds the injected mapping configuration and the shared accumulator;
/// the facility entity is created exactly once at construction.
///
/// # Example
/// ```
/// use causegraph::config::MappingConfig;
/// use causegraph::transform::FacilityTransformer;
///
/// let config = MappingConfig::default_incident_mapping();
/// let transformer = FacilityTransformer::new(&config, "SITE_A").unwrap();
/// ```
#[derive(Debug)]
pub struct FacilityTransformer<'a> {
    config: &'a MappingConfig,
    facility_id: String,
    facility_entity_id: String,
    accumulator: EntityAccumulator,
    seen_base_ids: HashSet<String>,
    report: TransformReport,
}

impl<'a> FacilityTransformer<'a> {
    /// Create a transformer for one facility and materialize its facility
    /// entity.
    pub fn new(config: &'a MappingConfig, facility_id: &str) -> Result<Self, TransformError> {
        let facility_id = facility_id.trim();
        if facility_id.is_empty() {
            return Err(TransformError::MissingFacilityId);
        }

        let facility_base = slug(facility_id);

        // The facility entity is fed a synthetic one-field record holding
        // the facility id under the source field mapped to its name.
        let facility_source = config
            .mapping(EntityKind::Facility)
            .and_then(|m| m.fields.get("name").cloned())
            .unwrap_or_else(|| "Facility".to_string());
        let mut facility_record = Record::new();
        facility_record.insert(facility_source, JsonValue::String(facility_id.to_string()));

        let mut transformer = Self {
            config,
            facility_id: facility_id.to_string(),
            facility_entity_id: EntityKind::Facility.entity_id(&facility_base),
            accumulator: EntityAccumulator::default(),
            seen_base_ids: HashSet::new(),
            report: TransformReport::default(),
        };

        let facility =
            transformer.build_entity(EntityKind::Facility, &facility_base, None, &facility_record);
        transformer.accumulator.push(facility);

        Ok(transformer)
    }

    pub fn facility_id(&self) -> &str {
        &self.facility_id
    }

    pub fn facility_entity_id(&self) -> &str {
        &self.facility_entity_id
    }

    pub fn accumulator(&self) -> &EntityAccumulator {
        &self.accumulator
    }

    /// Transform a whole batch of records with per-record fault isolation.
    ///
    /// A record that fails synthesis is logged and skipped; every remaining
    /// record is still processed.
    pub fn transform_batch(&mut self, records: &[Record]) -> &TransformReport {
        for (index, record) in records.iter().enumerate() {
            self.report.records_total += 1;
            match self.transform_record(index, record) {
                Ok(()) => self.report.records_transformed += 1,
                Err(e) => {
                    warn!(
                        facility = %self.facility_id,
                        record_index = index,
                        error = %e,
                        "record synthesis failed, skipping record"
                    );
                    self.report.records_failed += 1;
                    self.report.errors.push((index, e));
                }
            }
        }
        &self.report
    }

    /// Synthesize the entity hierarchy for one record.
    ///
    /// Walks ActionRequest -> Problem -> RootCause -> ActionPlan ->
    /// {Verification, Review, EquipmentStrategy}, then the peripheral
    /// kinds. A failed gate skips the entity and every descendant on its
    /// branch.
    pub fn transform_record(
        &mut self,
        record_index: usize,
        record: &Record,
    ) -> Result<(), TransformError> {
        self.validate_record(record_index, record)?;

        let base = self.record_base_id(record_index, record);

        if !self.gate_passes(EntityKind::ActionRequest, record) {
            // The whole branch hangs off the action request.
            self.skip_branch(&[
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
            ]);
            debug!(
                facility = %self.facility_id,
                record_index,
                "action request gate failed, record produces no entities"
            );
            return Ok(());
        }

        let parent = Some(self.facility_entity_id.clone());
        let action_request =
            self.build_entity(EntityKind::ActionRequest, &base, parent, record);
        let action_request_id = action_request.id.clone();
        self.accumulator.push(action_request);

        let problem_id = if self.gate_passes(EntityKind::Problem, record) {
            let problem = self.build_entity(
                EntityKind::Problem,
                &base,
                Some(action_request_id.clone()),
                record,
            );
            let id = problem.id.clone();
            self.accumulator.push(problem);
            Some(id)
        } else {
            self.skip_branch(&[
                EntityKind::Problem,
                EntityKind::RootCause,
                EntityKind::ActionPlan,
                EntityKind::Verification,
                EntityKind::Review,
                EntityKind::EquipmentStrategy,
            ]);
            None
        };

        let root_cause_id = match &problem_id {
            Some(problem_id) if self.gate_passes(EntityKind::RootCause, record) => {
                let mut root_cause = self.build_entity(
                    EntityKind::RootCause,
                    &base,
                    Some(problem_id.clone()),
                    record,
                );
                self.attach_causal_tail(&mut root_cause, record);
                let id = root_cause.id.clone();
                self.accumulator.push(root_cause);
                Some(id)
            }
            Some(_) => {
                self.skip_branch(&[
                    EntityKind::RootCause,
                    EntityKind::ActionPlan,
                    EntityKind::Verification,
                    EntityKind::Review,
                    EntityKind::EquipmentStrategy,
                ]);
                None
            }
            None => None,
        };

        let action_plan_id = match &root_cause_id {
            Some(root_cause_id) if self.gate_passes(EntityKind::ActionPlan, record) => {
                let plan = self.build_entity(
                    EntityKind::ActionPlan,
                    &base,
                    Some(root_cause_id.clone()),
                    record,
                );
                let id = plan.id.clone();
                self.accumulator.push(plan);
                Some(id)
            }
            Some(_) => {
                self.skip_branch(&[
                    EntityKind::ActionPlan,
                    EntityKind::Verification,
                    EntityKind::Review,
                    EntityKind::EquipmentStrategy,
                ]);
                None
            }
            None => None,
        };

        if let Some(action_plan_id) = &action_plan_id {
            for kind in [
                EntityKind::Verification,
                EntityKind::Review,
                EntityKind::EquipmentStrategy,
            ] {
                self.build_if_gated(kind, &base, action_plan_id.clone(), record);
            }
        }

        // Peripheral kinds attach to whichever spine entity exists.
        for kind in [EntityKind::Department, EntityKind::AmountOfLoss] {
            self.build_if_gated(kind, &base, action_request_id.clone(), record);
        }
        if let Some(problem_id) = &problem_id {
            for kind in [EntityKind::Asset, EntityKind::RecurringStatus] {
                self.build_if_gated(kind, &base, problem_id.clone(), record);
            }
        } else {
            self.skip_branch(&[EntityKind::Asset, EntityKind::RecurringStatus]);
        }

        Ok(())
    }

    /// Finish the run and hand the accumulated entities to the loader.
    pub fn finish(self) -> TransformOutput {
        TransformOutput {
            facility_id: self.facility_id,
            accumulator: self.accumulator,
            report: self.report,
        }
    }

    fn validate_record(&self, record_index: usize, record: &Record) -> Result<(), TransformError> {
        if record.is_empty() {
            return Err(TransformError::EmptyRecord { record_index });
        }
        for (field, value) in record {
            let invalid = match value {
                JsonValue::Object(_) => true,
                JsonValue::Array(items) => {
                    items.iter().any(|v| v.is_object() || v.is_array())
                }
                _ => false,
            };
            if invalid {
                return Err(TransformError::InvalidFieldValue {
                    record_index,
                    field: field.clone(),
                });
            }
        }
        Ok(())
    }

    /// Deterministic base id for one record, disambiguated by record index
    /// when an action-request number repeats within the run.
    fn record_base_id(&mut self, record_index: usize, record: &Record) -> String {
        let number = self
            .number_source_field()
            .and_then(|source| record.get(&source))
            .filter(|v| is_real_value(v))
            .map(scalar_to_string)
            .unwrap_or_else(|| format!("record_{}", record_index));

        let candidate = base_id(&self.facility_id, &number, None);
        let base = if self.seen_base_ids.contains(&candidate) {
            base_id(&self.facility_id, &number, Some(record_index))
        } else {
            candidate
        };
        self.seen_base_ids.insert(base.clone());
        base
    }

    fn number_source_field(&self) -> Option<String> {
        self.config
            .mapping(EntityKind::ActionRequest)
            .and_then(|m| m.fields.get("number"))
            .cloned()
    }

    /// Conditional creation gate: at least one required source field must
    /// hold a real value. Kinds without configured required fields pass
    /// trivially; kinds absent from the configuration never pass.
    fn gate_passes(&self, kind: EntityKind, record: &Record) -> bool {
        let Some(mapping) = self.config.mapping(kind) else {
            return false;
        };
        if mapping.required_fields.is_empty() {
            return true;
        }
        mapping
            .required_fields
            .iter()
            .any(|field| record.get(field).is_some_and(is_real_value))
    }

    fn build_if_gated(&mut self, kind: EntityKind, base: &str, parent_id: String, record: &Record) {
        if self.gate_passes(kind, record) {
            let entity = self.build_entity(kind, base, Some(parent_id), record);
            self.accumulator.push(entity);
        } else {
            self.accumulator.record_skip(kind);
        }
    }

    fn skip_branch(&mut self, kinds: &[EntityKind]) {
        for kind in kinds {
            self.accumulator.record_skip(*kind);
        }
    }

    fn build_entity(
        &self,
        kind: EntityKind,
        base: &str,
        parent_id: Option<String>,
        record: &Record,
    ) -> GraphEntity {
        let mapping = self.config.mapping(kind).cloned().unwrap_or_default();
        let label = resolve_label(kind, &mapping, record);

        let mut entity = GraphEntity::new(kind, kind.entity_id(base), label, parent_id);
        for (target, source) in &mapping.fields {
            entity
                .properties
                .insert(target.clone(), normalize_value(target, record.get(source)));
        }
        entity
    }

    /// Attach the derived `root_cause_tail` field, independent of the full
    /// cause text.
    fn attach_causal_tail(&self, root_cause: &mut GraphEntity, record: &Record) {
        let raw = self
            .cause_source_field()
            .and_then(|source| record.get(&source))
            .filter(|v| is_real_value(v))
            .map(scalar_to_string);

        let tail = causal_tail(raw.as_deref());
        let value = match MissingData::from_sentinel(&tail) {
            Some(marker) => PropertyValue::Missing(marker),
            None => PropertyValue::Text(tail),
        };
        root_cause
            .properties
            .insert("root_cause_tail".to_string(), value);
    }

    /// Source field carrying the raw cause text: the one mapped to the
    /// `cause_text` target, else the kind's first required field.
    fn cause_source_field(&self) -> Option<String> {
        let mapping = self.config.mapping(EntityKind::RootCause)?;
        mapping
            .fields
            .get("cause_text")
            .cloned()
            .or_else(|| mapping.required_fields.first().cloned())
    }
}

fn scalar_to_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}
