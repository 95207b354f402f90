//! Tree annotation: inject a unique id into every node of an Auspice tree.
//!
//! The document is duck-typed JSON produced upstream, so the expected shape
//! (`children` absent or an array, nodes are objects) is validated as the
//! traversal goes, and a malformed document fails fast instead of producing a
//! partially annotated tree.

use std::fmt;

use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;

/// Error raised when the document does not have the expected tree shape.
#[derive(Debug, PartialEq, Eq)]
pub enum AnnotateError {
    /// The document has no `tree` field (or is not a JSON object at all).
    MissingTree,
    /// A node (or its `branch_attrs`) was not a JSON object.
    NotAnObject { field: &'static str },
    /// A node's `children` field was present but not an array.
    ChildrenNotAnArray,
}

impl fmt::Display for AnnotateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnotateError::MissingTree => {
                write!(f, "document has no 'tree' field to annotate")
            }
            AnnotateError::NotAnObject { field } => {
                write!(f, "expected '{}' to be a JSON object", field)
            }
            AnnotateError::ChildrenNotAnArray => {
                write!(f, "expected 'children' to be an array of nodes")
            }
        }
    }
}

impl std::error::Error for AnnotateError {}

/// A freshly generated short node id: the first 8 hex characters of a v4 UUID.
///
/// Collision probability is negligible for trees in the tens of thousands of
/// nodes.
fn short_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Recursively assign a fresh id label to `node` and every node below it.
///
/// Sets `branch_attrs.labels` to `{"id": <fresh token>}`, creating
/// `branch_attrs` if the node does not carry one, then recurses into
/// `children`. All other node content is left untouched. The tree is assumed
/// finite and acyclic, as produced by the upstream phylogenetic tools.
pub fn annotate_node(node: &mut Value) -> Result<(), AnnotateError> {
    let obj = node
        .as_object_mut()
        .ok_or(AnnotateError::NotAnObject { field: "node" })?;

    let branch_attrs = obj
        .entry("branch_attrs")
        .or_insert_with(|| Value::Object(Map::new()));
    let branch_attrs = branch_attrs
        .as_object_mut()
        .ok_or(AnnotateError::NotAnObject {
            field: "branch_attrs",
        })?;
    branch_attrs.insert("labels".to_string(), json!({ "id": short_id() }));

    if let Some(children) = obj.get_mut("children") {
        let children = children
            .as_array_mut()
            .ok_or(AnnotateError::ChildrenNotAnArray)?;
        for child in children {
            annotate_node(child)?;
        }
    }
    Ok(())
}

/// Annotate a whole Auspice document in place, starting at its `tree` root.
pub fn annotate_document(doc: &mut Value) -> Result<(), AnnotateError> {
    let tree = doc.get_mut("tree").ok_or(AnnotateError::MissingTree)?;
    annotate_node(tree)?;
    debug!("annotated all tree nodes with fresh ids");
    Ok(())
}
