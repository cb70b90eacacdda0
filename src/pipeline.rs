//! Per-facility pipeline orchestration.
//!
//! Wires the extractor, transformer, and loader together for one facility:
//! extract a flat record list, transform records one at a time with
//! per-record fault isolation, load the result into the graph store, and
//! report. Facilities are independent; an external orchestrator may run
//! several in parallel since every id is prefixed by its facility.

use crate::config::MappingConfig;
use crate::entity::EntityKind;
use crate::extraction::{read_payload, FacilityPayload};
use crate::field_processor::{check_dependency_rules, default_dependency_rules, RuleViolation};
use crate::loader::{GraphLoader, LoadReport};
use crate::store::{GraphStore, StoreError};
use crate::transform::{FacilityTransformer, TransformError};
use indexmap::IndexMap;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

/// Error type for a facility pipeline run.
///
/// Extraction problems never reach this type (they degrade to an empty
/// record set); per-record transform failures are isolated inside the
/// batch. What remains fatal is a facility-level transform setup error or
/// a store connection failure.
#[derive(Debug)]
pub enum PipelineError {
    Transform(TransformError),
    Store(StoreError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Transform(e) => write!(f, "Transform error: {}", e),
            PipelineError::Store(e) => write!(f, "Store error: {}", e),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<TransformError> for PipelineError {
    fn from(err: TransformError) -> Self {
        PipelineError::Transform(err)
    }
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        PipelineError::Store(err)
    }
}

/// Outcome of one facility's pipeline run.
#[derive(Debug)]
pub struct PipelineReport {
    pub facility_id: String,
    pub records_total: usize,
    pub records_transformed: usize,
    pub records_failed: usize,
    /// Per-kind conditional-gate skips (expected branch pruning).
    pub gate_skips: IndexMap<EntityKind, usize>,
    /// Advisory dependency-rule violations, keyed by record index.
    pub rule_violations: Vec<(usize, RuleViolation)>,
    pub load: LoadReport,
}

impl PipelineReport {
    /// Whether the facility loaded without validation warnings.
    pub fn is_clean(&self) -> bool {
        self.records_failed == 0 && self.load.is_clean()
    }
}

/// Pipeline driver for facility imports.
///
/// Holds the injected mapping configuration; one driver can run any
/// number of facilities sequentially.
///
/// # Example
/// ```
/// use causegraph::config::MappingConfig;
/// use causegraph::pipeline::FacilityPipeline;
/// use causegraph::store::MemoryGraph;
/// use causegraph::extraction::FacilityPayload;
///
/// let config = MappingConfig::default_incident_mapping();
/// let pipeline = FacilityPipeline::new(&config);
/// let mut store = MemoryGraph::new();
///
/// let report = pipeline
///     .run(&FacilityPayload::empty("SITE_A"), &mut store)
///     .unwrap();
/// assert_eq!(report.records_total, 0);
/// ```
pub struct FacilityPipeline<'a> {
    config: &'a MappingConfig,
}

impl<'a> FacilityPipeline<'a> {
    pub fn new(config: &'a MappingConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline for one facility payload.
    ///
    /// # Errors
    /// Returns [`PipelineError::Transform`] when the facility itself is
    /// invalid (blank id), and [`PipelineError::Store`] on connection-level
    /// store failure. Everything else degrades to counters and warnings in
    /// the report.
    pub fn run<S: GraphStore>(
        &self,
        payload: &FacilityPayload,
        store: &mut S,
    ) -> Result<PipelineReport, PipelineError> {
        info!(
            facility = %payload.facility_id,
            records = payload.records.len(),
            "starting facility import"
        );

        let mut transformer = FacilityTransformer::new(self.config, &payload.facility_id)?;
        transformer.transform_batch(&payload.records);

        // Advisory diagnostics; never block the import.
        let rules = default_dependency_rules();
        let mut rule_violations = Vec::new();
        for (index, record) in payload.records.iter().enumerate() {
            for violation in check_dependency_rules(record, &rules) {
                rule_violations.push((index, violation));
            }
        }
        if !rule_violations.is_empty() {
            warn!(
                facility = %payload.facility_id,
                violations = rule_violations.len(),
                "dependency-rule violations detected (diagnostic only)"
            );
        }

        let output = transformer.finish();
        let gate_skips = output.accumulator.gate_skips().clone();

        let load = GraphLoader::new(store).load(&output)?;

        Ok(PipelineReport {
            facility_id: output.facility_id,
            records_total: output.report.records_total,
            records_transformed: output.report.records_transformed,
            records_failed: output.report.records_failed,
            gate_skips,
            rule_violations,
            load,
        })
    }

    /// Run the pipeline for a facility payload file.
    ///
    /// Unreadable or absent files degrade to an empty import (logged by
    /// the extractor), mirroring the skip-and-continue policy for bad
    /// facilities.
    pub fn run_from_file<S: GraphStore, P: AsRef<Path>>(
        &self,
        facility_id: &str,
        path: P,
        store: &mut S,
    ) -> Result<PipelineReport, PipelineError> {
        let payload = read_payload(facility_id, path);
        self.run(&payload, store)
    }
}
