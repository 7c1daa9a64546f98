//! `$ref` dereferencing across the document store.

use std::sync::Arc;

use thiserror::Error;
use url::Url;

use crate::store::{DocumentEntry, DocumentStore};
use crate::uri;

/// Why a reference failed to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The reference string is not a valid URI reference.
    #[error("invalid reference `{raw}`")]
    Invalid {
        /// The reference as written.
        raw: String,
    },
    /// The target is remote and is never loaded.
    #[error("remote reference `{uri}` is not evaluated")]
    Remote {
        /// The remote target.
        uri: Url,
    },
    /// The target document is not in the store.
    #[error("unresolved reference: document `{uri}` is not loaded")]
    MissingDocument {
        /// The missing document.
        uri: Url,
    },
    /// The target document exists but the pointer does not.
    #[error("unresolved reference: `{pointer}` does not exist in `{uri}`")]
    MissingPointer {
        /// The target document.
        uri: Url,
        /// The missing pointer.
        pointer: String,
    },
}

/// A successfully resolved reference.
#[derive(Debug, Clone)]
pub struct ResolvedRef {
    /// The target document's cache entry.
    pub entry: Arc<DocumentEntry>,
    /// The `#`-rooted pointer within the target (root when absent).
    pub pointer: String,
}

impl ResolvedRef {
    /// The resolved IR node.
    #[must_use]
    pub fn node(&self) -> Option<&telescope_syntax::IrNode> {
        self.entry.ir.find_by_pointer(&self.pointer).ok()
    }
}

/// Dereferences `raw` as written at `origin`.
///
/// The returned node view is the target's cached IR, not a copy.
///
/// # Errors
///
/// See [`ResolveError`]; remote targets always fail with
/// [`ResolveError::Remote`].
pub fn deref(
    store: &DocumentStore,
    origin: &Url,
    raw: &str,
    workspace_root: Option<&Url>,
) -> Result<ResolvedRef, ResolveError> {
    let target =
        uri::resolve_reference(origin, raw, workspace_root).ok_or_else(|| ResolveError::Invalid {
            raw: raw.to_string(),
        })?;
    if target.remote {
        return Err(ResolveError::Remote { uri: target.uri });
    }

    let entry = store
        .peek(&target.uri)
        .cloned()
        .ok_or_else(|| ResolveError::MissingDocument {
            uri: target.uri.clone(),
        })?;

    let pointer = target
        .pointer
        .unwrap_or_else(|| telescope_syntax::pointer::ROOT.to_string());
    if entry.ir.find_by_pointer(&pointer).is_err() {
        return Err(ResolveError::MissingPointer {
            uri: target.uri,
            pointer,
        });
    }

    Ok(ResolvedRef { entry, pointer })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::extract_atoms;
    use crate::classify::identify_type;
    use telescope_syntax::{build_yaml, LineIndex};

    fn store_with(docs: &[(&str, &str)]) -> DocumentStore {
        let mut store = DocumentStore::default();
        for (uri, text) in docs {
            let url = Url::parse(uri).unwrap();
            let ir = build_yaml(Arc::new(url.clone()), text).unwrap();
            let doc_type = identify_type(&ir.root);
            let atoms = extract_atoms(&ir, doc_type);
            let line_index = LineIndex::new(&ir.raw_text);
            store.insert(
                url,
                Arc::new(DocumentEntry {
                    ir: Arc::new(ir),
                    atoms: Arc::new(atoms),
                    doc_type,
                    line_index: Arc::new(line_index),
                    version: None,
                }),
            );
        }
        store
    }

    #[test]
    fn cross_file_deref_returns_target_node() {
        let store = store_with(&[
            ("file:///main.yaml", "paths: {}\n"),
            ("file:///sub.yaml", "x: 1\n"),
        ]);
        let main = Url::parse("file:///main.yaml").unwrap();

        let resolved = deref(&store, &main, "./sub.yaml#/x", None).unwrap();
        assert_eq!(resolved.node().and_then(|node| node.as_f64()), Some(1.0));
    }

    #[test]
    fn missing_document_and_pointer_are_distinguished() {
        let store = store_with(&[("file:///main.yaml", "x: 1\n")]);
        let main = Url::parse("file:///main.yaml").unwrap();

        let err = deref(&store, &main, "./gone.yaml#/x", None).unwrap_err();
        assert!(matches!(err, ResolveError::MissingDocument { .. }));

        let err = deref(&store, &main, "#/missing", None).unwrap_err();
        assert!(matches!(err, ResolveError::MissingPointer { .. }));
    }

    #[test]
    fn remote_refs_are_never_loaded() {
        let store = store_with(&[("file:///main.yaml", "x: 1\n")]);
        let main = Url::parse("file:///main.yaml").unwrap();
        let err = deref(&store, &main, "https://example.com/a.yaml#/x", None).unwrap_err();
        assert!(matches!(err, ResolveError::Remote { .. }));
    }
}
