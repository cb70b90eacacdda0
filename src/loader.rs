//! Graph loading and post-load validation.
//!
//! Materializes the transformer's output against a [`GraphStore`] in
//! hierarchical order, batches relationship creation with partial-failure
//! tolerance, and runs integrity validation queries afterwards. Validation
//! failures are warnings: partial imports are an accepted operating mode,
//! and nothing is rolled back.

use crate::entity::{EntityKind, GraphEntity};
use crate::store::{GraphStore, StoreError};
use crate::transform::TransformOutput;
use indexmap::IndexMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Minimum real (non-sentinel) properties a conditionally-created entity
/// must carry to be written. The transformer's gate already guarantees
/// this; the loader re-checks before each single-entity write.
const MIN_REAL_PROPERTIES: usize = 1;

/// Outcome of one facility load.
#[derive(Debug)]
pub struct LoadReport {
    /// Unique id of this load run, for log correlation.
    pub run_id: Uuid,
    pub facility_id: String,

    /// Per-kind successful entity writes.
    pub entities_created: IndexMap<EntityKind, usize>,
    /// Per-kind rejected entity writes.
    pub entities_failed: IndexMap<EntityKind, usize>,
    /// Conditional entities skipped by the minimum-data re-check.
    pub below_threshold: usize,

    /// Per-relationship-type successful edge writes.
    pub relationships_created: IndexMap<String, usize>,
    /// Per-relationship-type rejected edge writes.
    pub relationships_failed: IndexMap<String, usize>,
    /// Relationship types whose whole batch failed (every single creation
    /// was rejected on a non-empty input set).
    pub rejected_batches: Vec<String>,

    /// Post-load validation warnings; empty means a clean load.
    pub warnings: Vec<String>,
}

impl LoadReport {
    fn new(facility_id: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            facility_id: facility_id.to_string(),
            entities_created: IndexMap::new(),
            entities_failed: IndexMap::new(),
            below_threshold: 0,
            relationships_created: IndexMap::new(),
            relationships_failed: IndexMap::new(),
            rejected_batches: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn created(&self, kind: EntityKind) -> usize {
        self.entities_created.get(&kind).copied().unwrap_or(0)
    }

    pub fn total_created(&self) -> usize {
        self.entities_created.values().sum()
    }

    /// Whether the load finished without warnings or rejected batches.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.rejected_batches.is_empty()
    }
}

/// Loader for one facility's transformed output.
pub struct GraphLoader<'a, S: GraphStore> {
    store: &'a mut S,
}

impl<'a, S: GraphStore> GraphLoader<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    /// Write entities and relationships, then validate.
    ///
    /// Entities are written in hierarchical kind order: the facility
    /// first, conditionally-created kinds one at a time with a
    /// minimum-data re-check, the rest batched. Individual write failures
    /// are counted and logged; only a connection-level store failure
    /// aborts the load.
    pub fn load(&mut self, output: &TransformOutput) -> Result<LoadReport, StoreError> {
        let mut report = LoadReport::new(&output.facility_id);
        info!(
            facility = %output.facility_id,
            run_id = %report.run_id,
            entities = output.accumulator.total(),
            "starting graph load"
        );

        for kind in EntityKind::ALL {
            let entities = output.accumulator.entities(kind);
            if entities.is_empty() {
                continue;
            }
            if kind.is_conditional() {
                self.load_one_at_a_time(kind, entities, &mut report)?;
            } else {
                self.load_batch(kind, entities, &mut report)?;
            }
        }

        self.load_relationships(output, &mut report)?;
        self.validate(output, &mut report)?;

        info!(
            facility = %output.facility_id,
            run_id = %report.run_id,
            created = report.total_created(),
            warnings = report.warnings.len(),
            "graph load finished"
        );
        Ok(report)
    }

    /// Conditionally-created kinds: one write at a time, re-checking the
    /// minimum-data threshold even though the transformer already gated.
    fn load_one_at_a_time(
        &mut self,
        kind: EntityKind,
        entities: &[GraphEntity],
        report: &mut LoadReport,
    ) -> Result<(), StoreError> {
        for entity in entities {
            if entity.real_property_count() < MIN_REAL_PROPERTIES {
                debug!(kind = %kind, id = %entity.id, "below minimum-data threshold, skipping");
                report.below_threshold += 1;
                continue;
            }
            self.write_entity(entity, report)?;
        }
        Ok(())
    }

    fn load_batch(
        &mut self,
        kind: EntityKind,
        entities: &[GraphEntity],
        report: &mut LoadReport,
    ) -> Result<(), StoreError> {
        debug!(kind = %kind, count = entities.len(), "batch-creating entities");
        for entity in entities {
            self.write_entity(entity, report)?;
        }
        Ok(())
    }

    fn write_entity(
        &mut self,
        entity: &GraphEntity,
        report: &mut LoadReport,
    ) -> Result<(), StoreError> {
        let created = self.store.create_entity(
            entity.kind,
            entity.store_properties(),
            Some(&entity.label),
        )?;
        if created {
            *report.entities_created.entry(entity.kind).or_insert(0) += 1;
        } else {
            warn!(kind = %entity.kind, id = %entity.id, "entity write rejected");
            *report.entities_failed.entry(entity.kind).or_insert(0) += 1;
        }
        Ok(())
    }

    /// Create relationships per the fixed hierarchical edge set, one batch
    /// per relationship type.
    ///
    /// A batch is accepted when fewer than all of its creations failed;
    /// individual failures never block sibling batches. This permissive
    /// threshold is inherited behavior.
    fn load_relationships(
        &mut self,
        output: &TransformOutput,
        report: &mut LoadReport,
    ) -> Result<(), StoreError> {
        for kind in EntityKind::ALL {
            let (Some(parent_kind), Some(relationship)) = (kind.parent(), kind.relationship())
            else {
                continue;
            };

            let entities = output.accumulator.entities(kind);
            let mut attempted = 0usize;
            let mut succeeded = 0usize;

            for entity in entities {
                let Some(parent_id) = &entity.parent_id else {
                    continue;
                };
                attempted += 1;
                let created = self.store.create_relationship(
                    kind,
                    &entity.id,
                    relationship,
                    parent_kind,
                    parent_id,
                )?;
                if created {
                    succeeded += 1;
                } else {
                    warn!(
                        relationship,
                        from = %entity.id,
                        to = %parent_id,
                        "relationship write rejected"
                    );
                }
            }

            if attempted > 0 {
                *report
                    .relationships_created
                    .entry(relationship.to_string())
                    .or_insert(0) += succeeded;
                *report
                    .relationships_failed
                    .entry(relationship.to_string())
                    .or_insert(0) += attempted - succeeded;

                if succeeded == 0 {
                    warn!(relationship, attempted, "entire relationship batch failed");
                    report.rejected_batches.push(relationship.to_string());
                }
            }
        }
        Ok(())
    }

    /// Post-load integrity validation. Failures become warnings on the
    /// report; committed writes stay committed.
    fn validate(
        &mut self,
        output: &TransformOutput,
        report: &mut LoadReport,
    ) -> Result<(), StoreError> {
        let facility = output.accumulator.entities(EntityKind::Facility).first();
        match facility {
            Some(facility) => {
                if !self.store.entity_exists(EntityKind::Facility, &facility.id)? {
                    report
                        .warnings
                        .push(format!("facility node {} not found after load", facility.id));
                }
            }
            None => {
                report
                    .warnings
                    .push("no facility entity in transformer output".to_string());
            }
        }

        for kind in EntityKind::ALL {
            let loaded = report.created(kind);
            if loaded == 0 {
                continue;
            }
            let stored = self.store.count_entities(kind)?;
            if stored < loaded {
                report.warnings.push(format!(
                    "{} count mismatch: store has {}, load created {}",
                    kind, stored, loaded
                ));
            }
        }

        // A facility with data across the whole spine should produce at
        // least one complete causal chain.
        let spine_complete = EntityKind::causal_spine()
            .iter()
            .all(|kind| output.accumulator.count(*kind) > 0);
        if spine_complete {
            let chains = self.store.count_causal_chains()?;
            if chains == 0 {
                report
                    .warnings
                    .push("no complete causal chains despite full spine data".to_string());
            } else {
                debug!(chains, "causal-chain integrity confirmed");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MappingConfig;
    use crate::entity::PropertyValue;
    use crate::extraction::Record;
    use crate::store::MemoryGraph;
    use crate::transform::FacilityTransformer;
    use indexmap::IndexMap as Map;
    use serde_json::json;

    fn record(pairs: &[(&str, serde_json::Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn full_record(number: &str) -> Record {
        record(&[
            ("Action Request Number:", json!(number)),
            ("Title", json!("Pump seal leak")),
            ("What happened?", json!("Seal failed during startup")),
            ("Root Cause", json!("Worn seal; Contaminated lubricant")),
            ("Corrective Action", json!("Replace seal")),
            ("Verification Result", json!("Passed")),
        ])
    }

    fn transform(records: &[Record]) -> TransformOutput {
        let config = MappingConfig::default_incident_mapping();
        let mut transformer = FacilityTransformer::new(&config, "SITE_A").unwrap();
        transformer.transform_batch(records);
        transformer.finish()
    }

    #[test]
    fn test_load_full_hierarchy() {
        let output = transform(&[full_record("AR-1"), full_record("AR-2")]);
        let mut graph = MemoryGraph::new();
        let report = GraphLoader::new(&mut graph).load(&output).unwrap();

        assert!(report.is_clean(), "warnings: {:?}", report.warnings);
        assert_eq!(report.created(EntityKind::Facility), 1);
        assert_eq!(report.created(EntityKind::ActionRequest), 2);
        assert_eq!(report.created(EntityKind::Problem), 2);
        assert_eq!(graph.count_causal_chains().unwrap(), 2);
    }

    #[test]
    fn test_relationship_counts_match_entities() {
        let output = transform(&[
            full_record("AR-1"),
            // No problem data: only the action request materializes.
            record(&[
                ("Action Request Number:", json!("AR-2")),
                ("Title", json!("Valve stuck")),
            ]),
        ]);
        let mut graph = MemoryGraph::new();
        let report = GraphLoader::new(&mut graph).load(&output).unwrap();

        assert_eq!(graph.edge_count("REPORTED_AT"), 2);
        assert_eq!(graph.edge_count("IDENTIFIED_IN"), 1);
        assert_eq!(report.relationships_created.get("REPORTED_AT"), Some(&2));

        // Every edge target exists among the loaded nodes.
        for edge in graph.edges() {
            assert!(graph.node(&edge.to_id).is_some());
        }
    }

    #[test]
    fn test_clean_load_has_no_warnings() {
        let output = transform(&[full_record("AR-1")]);
        let mut graph = MemoryGraph::new();
        let report = GraphLoader::new(&mut graph).load(&output).unwrap();
        assert!(report.warnings.is_empty());
    }

    /// Store wrapper that rejects configured entity ids and all
    /// relationships of configured types.
    struct ScriptedStore {
        inner: MemoryGraph,
        reject_ids: Vec<String>,
        reject_relationships: Vec<String>,
    }

    impl ScriptedStore {
        fn new(reject_ids: &[&str], reject_relationships: &[&str]) -> Self {
            Self {
                inner: MemoryGraph::new(),
                reject_ids: reject_ids.iter().map(|s| s.to_string()).collect(),
                reject_relationships: reject_relationships
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            }
        }
    }

    impl GraphStore for ScriptedStore {
        fn create_entity(
            &mut self,
            kind: EntityKind,
            properties: Map<String, PropertyValue>,
            display_label: Option<&str>,
        ) -> Result<bool, StoreError> {
            if let Some(PropertyValue::Text(id)) = properties.get("id") {
                if self.reject_ids.contains(id) {
                    return Ok(false);
                }
            }
            self.inner.create_entity(kind, properties, display_label)
        }

        fn create_relationship(
            &mut self,
            from_kind: EntityKind,
            from_id: &str,
            relationship: &str,
            to_kind: EntityKind,
            to_id: &str,
        ) -> Result<bool, StoreError> {
            if self.reject_relationships.contains(&relationship.to_string()) {
                return Ok(false);
            }
            self.inner
                .create_relationship(from_kind, from_id, relationship, to_kind, to_id)
        }

        fn entity_exists(&self, kind: EntityKind, id: &str) -> Result<bool, StoreError> {
            self.inner.entity_exists(kind, id)
        }

        fn count_entities(&self, kind: EntityKind) -> Result<usize, StoreError> {
            self.inner.count_entities(kind)
        }

        fn count_causal_chains(&self) -> Result<usize, StoreError> {
            self.inner.count_causal_chains()
        }
    }

    #[test]
    fn test_individual_entity_failure_does_not_block_siblings() {
        let output = transform(&[full_record("AR-1"), full_record("AR-2")]);
        let mut store = ScriptedStore::new(&["actionrequest-SITE_A_AR-1"], &[]);
        let report = GraphLoader::new(&mut store).load(&output).unwrap();

        assert_eq!(report.created(EntityKind::ActionRequest), 1);
        assert_eq!(
            report.entities_failed.get(&EntityKind::ActionRequest),
            Some(&1)
        );
        // The sibling request and the rest of the hierarchy still loaded.
        assert_eq!(report.created(EntityKind::Problem), 2);
    }

    #[test]
    fn test_fully_failed_relationship_batch_rejected() {
        let output = transform(&[full_record("AR-1")]);
        let mut store = ScriptedStore::new(&[], &["EXPLAINS"]);
        let report = GraphLoader::new(&mut store).load(&output).unwrap();

        assert!(report.rejected_batches.contains(&"EXPLAINS".to_string()));
        assert_eq!(report.relationships_failed.get("EXPLAINS"), Some(&1));
        // Sibling relationship batches still ran.
        assert_eq!(report.relationships_created.get("REPORTED_AT"), Some(&1));
        // The broken chain surfaces as a validation warning.
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("causal chains")));
    }

    #[test]
    fn test_partial_relationship_batch_accepted() {
        let output = transform(&[full_record("AR-1"), full_record("AR-2")]);
        let mut store = ScriptedStore::new(&["problem-SITE_A_AR-2"], &[]);
        let report = GraphLoader::new(&mut store).load(&output).unwrap();

        // One IDENTIFIED_IN edge fails (missing endpoint), one succeeds:
        // the batch is accepted.
        assert!(!report.rejected_batches.contains(&"IDENTIFIED_IN".to_string()));
        assert_eq!(report.relationships_created.get("IDENTIFIED_IN"), Some(&1));
        assert_eq!(report.relationships_failed.get("IDENTIFIED_IN"), Some(&1));
    }

    #[test]
    fn test_rerun_is_idempotent_via_merge() {
        let output = transform(&[full_record("AR-1")]);
        let mut graph = MemoryGraph::new();

        GraphLoader::new(&mut graph).load(&output).unwrap();
        let first_nodes = graph.nodes().count();
        let first_edges = graph.edges().len();

        GraphLoader::new(&mut graph).load(&output).unwrap();
        assert_eq!(graph.nodes().count(), first_nodes);
        assert_eq!(graph.edges().len(), first_edges);
    }
}
