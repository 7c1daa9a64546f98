//! Fix proposals carried on diagnostics.
//!
//! Fixes are JSON-Patch-like edits over pointers. They are never applied
//! here; the transport layer materializes them into textual edits when the
//! user invokes a code action.

use serde::{Deserialize, Serialize};

/// A single patch operation over a JSON Pointer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    /// Insert a value at the pointer (array `-` appends).
    Add {
        /// Target pointer.
        path: String,
        /// Value to insert.
        value: serde_json::Value,
    },
    /// Remove the value at the pointer.
    Remove {
        /// Target pointer.
        path: String,
    },
    /// Replace the value at the pointer.
    Replace {
        /// Target pointer.
        path: String,
        /// Replacement value.
        value: serde_json::Value,
    },
}

/// A proposed edit to one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilePatch {
    /// Document to edit.
    pub uri: String,
    /// Ordered operations.
    pub ops: Vec<PatchOp>,
}

impl FilePatch {
    /// Wraps the patch for transport in `Diagnostic::data`.
    #[must_use]
    pub fn into_data(self) -> serde_json::Value {
        serde_json::json!({ "fix": self })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_serializes_with_op_tags() {
        let patch = FilePatch {
            uri: "file:///a.yaml".to_string(),
            ops: vec![PatchOp::Add {
                path: "#/paths/~1p/get/parameters/-".to_string(),
                value: serde_json::json!({"name": "petId", "in": "path"}),
            }],
        };
        let data = patch.into_data();
        assert_eq!(data["fix"]["ops"][0]["op"], "add");
        assert_eq!(data["fix"]["ops"][0]["value"]["name"], "petId");
    }
}
