//! Graph store boundary.
//!
//! Write primitives consumed by the loader, with create-or-merge semantics
//! keyed by the entity's primary id, plus the read primitives post-load
//! validation needs. [`MemoryGraph`] is the in-memory reference
//! implementation used by tests and the CLI; real adapters implement the
//! same trait against an external graph database.

use crate::entity::{EntityKind, PropertyValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// Error type for store operations.
///
/// Only connection-level failure is fatal to a run; an individual rejected
/// write is reported as `Ok(false)` by the primitives instead.
#[derive(Debug)]
pub enum StoreError {
    ConnectionFailed(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::ConnectionFailed(detail) => {
                write!(f, "Store connection failed: {}", detail)
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Write and validation primitives of the graph store.
pub trait GraphStore {
    /// Create or merge one entity node, keyed by the `id` property.
    ///
    /// Returns `Ok(false)` when the individual write is rejected (for
    /// example, no `id` property); `Err` only on connection-level failure.
    fn create_entity(
        &mut self,
        kind: EntityKind,
        properties: IndexMap<String, PropertyValue>,
        display_label: Option<&str>,
    ) -> Result<bool, StoreError>;

    /// Create one relationship between two existing nodes.
    ///
    /// Returns `Ok(false)` when either endpoint does not exist or the
    /// write is otherwise rejected.
    fn create_relationship(
        &mut self,
        from_kind: EntityKind,
        from_id: &str,
        relationship: &str,
        to_kind: EntityKind,
        to_id: &str,
    ) -> Result<bool, StoreError>;

    /// Whether a node of the given kind and id exists.
    fn entity_exists(&self, kind: EntityKind, id: &str) -> Result<bool, StoreError>;

    /// Number of nodes of one kind.
    fn count_entities(&self, kind: EntityKind) -> Result<usize, StoreError>;

    /// Number of complete ActionRequest -> Problem -> RootCause ->
    /// ActionPlan causal chains.
    fn count_causal_chains(&self) -> Result<usize, StoreError>;
}

/// One stored node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredNode {
    pub kind: EntityKind,
    pub id: String,
    pub display_label: Option<String>,
    pub properties: IndexMap<String, PropertyValue>,
}

/// One stored relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEdge {
    pub from_kind: EntityKind,
    pub from_id: String,
    pub relationship: String,
    pub to_kind: EntityKind,
    pub to_id: String,
}

/// In-memory graph store with create-or-merge semantics.
///
/// Node identity is the primary id; merging overwrites properties of an
/// existing node. Duplicate relationships collapse to one edge.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    nodes: IndexMap<String, StoredNode>,
    edges: Vec<StoredEdge>,
    edge_keys: HashSet<(String, String, String)>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// All nodes, in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &StoredNode> {
        self.nodes.values()
    }

    /// All edges, in insertion order.
    pub fn edges(&self) -> &[StoredEdge] {
        &self.edges
    }

    /// Look up one node by id.
    pub fn node(&self, id: &str) -> Option<&StoredNode> {
        self.nodes.get(id)
    }

    /// Number of edges of one relationship type.
    pub fn edge_count(&self, relationship: &str) -> usize {
        self.edges
            .iter()
            .filter(|e| e.relationship == relationship)
            .count()
    }

    /// The target node id of an edge from `from_id` with the given
    /// relationship type, if exactly such an edge exists.
    fn follow(&self, from_id: &str, relationship: &str, to_kind: EntityKind) -> Option<&str> {
        self.edges
            .iter()
            .find(|e| {
                e.from_id == from_id && e.relationship == relationship && e.to_kind == to_kind
            })
            .map(|e| e.to_id.as_str())
    }
}

impl GraphStore for MemoryGraph {
    fn create_entity(
        &mut self,
        kind: EntityKind,
        properties: IndexMap<String, PropertyValue>,
        display_label: Option<&str>,
    ) -> Result<bool, StoreError> {
        let Some(PropertyValue::Text(id)) = properties.get("id").cloned() else {
            debug!(kind = %kind, "rejecting entity write without id property");
            return Ok(false);
        };

        match self.nodes.get_mut(&id) {
            Some(existing) => {
                // Merge: same id, refresh properties and label.
                existing.properties = properties;
                if let Some(label) = display_label {
                    existing.display_label = Some(label.to_string());
                }
            }
            None => {
                self.nodes.insert(
                    id.clone(),
                    StoredNode {
                        kind,
                        id,
                        display_label: display_label.map(str::to_string),
                        properties,
                    },
                );
            }
        }
        Ok(true)
    }

    fn create_relationship(
        &mut self,
        from_kind: EntityKind,
        from_id: &str,
        relationship: &str,
        to_kind: EntityKind,
        to_id: &str,
    ) -> Result<bool, StoreError> {
        if !self.nodes.contains_key(from_id) || !self.nodes.contains_key(to_id) {
            debug!(
                relationship,
                from = from_id,
                to = to_id,
                "rejecting relationship with missing endpoint"
            );
            return Ok(false);
        }

        let key = (
            from_id.to_string(),
            relationship.to_string(),
            to_id.to_string(),
        );
        if self.edge_keys.insert(key) {
            self.edges.push(StoredEdge {
                from_kind,
                from_id: from_id.to_string(),
                relationship: relationship.to_string(),
                to_kind,
                to_id: to_id.to_string(),
            });
        }
        Ok(true)
    }

    fn entity_exists(&self, kind: EntityKind, id: &str) -> Result<bool, StoreError> {
        Ok(self.nodes.get(id).is_some_and(|n| n.kind == kind))
    }

    fn count_entities(&self, kind: EntityKind) -> Result<usize, StoreError> {
        Ok(self.nodes.values().filter(|n| n.kind == kind).count())
    }

    fn count_causal_chains(&self) -> Result<usize, StoreError> {
        let mut chains = 0;
        for node in self.nodes.values().filter(|n| n.kind == EntityKind::ActionPlan) {
            let Some(root_cause) = self.follow(&node.id, "ADDRESSES", EntityKind::RootCause)
            else {
                continue;
            };
            let Some(problem) = self.follow(root_cause, "EXPLAINS", EntityKind::Problem) else {
                continue;
            };
            if self
                .follow(problem, "IDENTIFIED_IN", EntityKind::ActionRequest)
                .is_some()
            {
                chains += 1;
            }
        }
        Ok(chains)
    }
}
