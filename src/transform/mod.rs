//! Record-to-entity transformation.
//!
//! The central engine of the pipeline: converts flat source records into a
//! hierarchy of typed entities with conditional creation gates, field
//! normalization, missing-data sentinels, causal-tail extraction, and
//! cascade labeling.

pub mod labeling;
pub mod normalize;
pub mod transformer;

// Re-export key types
pub use labeling::{clean_label, resolve_label};
pub use normalize::{
    causal_tail, is_real_value, normalize_date, normalize_value, sentinel_for_field,
};
pub use transformer::{
    EntityAccumulator, FacilityTransformer, TransformError, TransformOutput, TransformReport,
};
