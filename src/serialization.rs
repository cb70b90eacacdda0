//! Serialization of entities and graph snapshots.
//!
//! Sentinel vocabulary is preserved on the wire: missing-data markers are
//! written as their exact sentinel strings, never as null.

use crate::store::{MemoryGraph, StoredEdge, StoredNode};
use serde::Serialize;
use std::io::Write;

/// Error type for serialization operations
#[derive(Debug)]
pub enum SerializationError {
    JsonError(serde_json::Error),
    IoError(std::io::Error),
}

impl From<serde_json::Error> for SerializationError {
    fn from(err: serde_json::Error) -> Self {
        SerializationError::JsonError(err)
    }
}

impl From<std::io::Error> for SerializationError {
    fn from(err: std::io::Error) -> Self {
        SerializationError::IoError(err)
    }
}

impl std::fmt::Display for SerializationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SerializationError::JsonError(e) => write!(f, "JSON error: {}", e),
            SerializationError::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for SerializationError {}

/// NDJSON (Newline Delimited JSON) writer
///
/// Writes entities as NDJSON, one JSON object per line.
pub struct NdjsonWriter<W: Write> {
    writer: W,
}

impl<W: Write> NdjsonWriter<W> {
    /// Create a new NDJSON writer
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write a single entity as an NDJSON line
    pub fn write<T: Serialize>(&mut self, entity: &T) -> Result<(), SerializationError> {
        let json = serde_json::to_string(entity)?;
        writeln!(self.writer, "{}", json)?;
        Ok(())
    }

    /// Write multiple entities
    pub fn write_all<T: Serialize>(&mut self, entities: &[T]) -> Result<(), SerializationError> {
        for entity in entities {
            self.write(entity)?;
        }
        Ok(())
    }

    /// Flush the underlying writer
    pub fn flush(&mut self) -> Result<(), SerializationError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Serializable snapshot of a loaded graph.
#[derive(Serialize)]
struct GraphSnapshot<'a> {
    nodes: Vec<&'a StoredNode>,
    edges: &'a [StoredEdge],
}

/// Export a full graph snapshot as pretty-printed JSON.
///
/// Used by the CLI `--export` flag and by downstream tooling that wants
/// the committed graph without querying the store.
pub fn export_graph<W: Write>(graph: &MemoryGraph, mut writer: W) -> Result<(), SerializationError> {
    let snapshot = GraphSnapshot {
        nodes: graph.nodes().collect(),
        edges: graph.edges(),
    };
    let json = serde_json::to_string_pretty(&snapshot)?;
    writeln!(writer, "{}", json)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityKind, MissingData, PropertyValue};
    use crate::store::GraphStore;
    use indexmap::IndexMap;

    #[test]
    fn test_ndjson_writer() {
        let mut buf = Vec::new();
        let mut writer = NdjsonWriter::new(&mut buf);

        let node = StoredNode {
            kind: EntityKind::Problem,
            id: "problem-SITE_A_AR-1".to_string(),
            display_label: Some("Seal_leak".to_string()),
            properties: IndexMap::new(),
        };

        writer.write(&node).unwrap();
        writer.flush().unwrap();

        let output = String::from_utf8(buf).unwrap();
        assert_eq!(output.lines().count(), 1);
        assert!(output.contains("problem-SITE_A_AR-1"));
    }

    #[test]
    fn test_export_graph_renders_sentinels() {
        let mut graph = MemoryGraph::new();
        let mut props = IndexMap::new();
        props.insert(
            "id".to_string(),
            PropertyValue::Text("actionrequest-A_1".to_string()),
        );
        props.insert(
            "due_date".to_string(),
            PropertyValue::Missing(MissingData::DataNotAvailable),
        );
        graph
            .create_entity(EntityKind::ActionRequest, props, Some("AR_1"))
            .unwrap();

        let mut buf = Vec::new();
        export_graph(&graph, &mut buf).unwrap();
        let output = String::from_utf8(buf).unwrap();

        assert!(output.contains("\"DATA_NOT_AVAILABLE\""));
        assert!(!output.contains("null"));
    }
}
