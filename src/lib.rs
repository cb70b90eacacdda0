//! # Causegraph: Incident-Record Causal Graph Framework
//!
//! Causegraph ingests raw, loosely-structured per-facility incident records
//! and converts them into a normalized, causally-linked entity graph with
//! deterministic identity, human-readable dynamic labels, and explicit
//! missing-data semantics.
//!
//! ## Pipeline
//!
//! - **Extractor**: normalizes a facility's raw payload (direct array,
//!   `{records: [...]}`, or `{sheets: {...}}`) into a flat record list
//! - **FieldProcessor**: advisory analytics (temporal sequences,
//!   cross-field relationships, dependency rules)
//! - **Transformer**: walks the fixed workflow hierarchy per record,
//!   applying conditional creation gates, normalization, missing-data
//!   sentinels, causal-tail extraction, and cascade labeling
//! - **Loader**: writes entities and relationships to a graph store in
//!   hierarchical order and validates post-load integrity
//!
//! ## Example
//!
//! ```
//! use causegraph::config::MappingConfig;
//! use causegraph::extraction::extract_records;
//! use causegraph::pipeline::FacilityPipeline;
//! use causegraph::store::MemoryGraph;
//! use serde_json::json;
//!
//! let payload = json!([{
//!     "Action Request Number:": "AR-1",
//!     "Title": "Pump seal leak",
//!     "What happened?": "Seal failed during startup",
//!     "Root Cause": "Worn seal; Contaminated lubricant"
//! }]);
//!
//! let config = MappingConfig::default_incident_mapping();
//! let extracted = extract_records("SITE_A", &payload).unwrap();
//!
//! let mut store = MemoryGraph::new();
//! let report = FacilityPipeline::new(&config)
//!     .run(&extracted, &mut store)
//!     .unwrap();
//! assert_eq!(report.records_transformed, 1);
//! ```

// Core modules
pub mod entity;
pub mod extraction;
pub mod serialization;

// Configuration
pub mod config;

// Pipeline stages
pub mod field_processor;
pub mod loader;
pub mod pipeline;
pub mod store;
pub mod transform;

// Re-export key types
pub use entity::{base_id, EntityKind, GraphEntity, MissingData, PropertyValue};
pub use extraction::{extract_records, read_payload, ExtractionError, FacilityPayload, Record};

// Re-export pipeline types
pub use config::{EntityMapping, MappingConfig};
pub use loader::{GraphLoader, LoadReport};
pub use pipeline::{FacilityPipeline, PipelineError, PipelineReport};
pub use store::{GraphStore, MemoryGraph, StoreError};
pub use transform::{
    causal_tail, EntityAccumulator, FacilityTransformer, TransformError, TransformOutput,
};
