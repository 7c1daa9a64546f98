//! The cross-file reference graph.
//!
//! One edge per `$ref` occurrence. Edges for a URI are replaced atomically on
//! every update, and the inverted index is maintained alongside so dependents
//! queries stay O(edges-in).

use std::collections::BTreeSet;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use url::Url;

use crate::atoms::AtomIndex;
use crate::uri;

/// A single `$ref` edge between two documents (possibly the same one).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefEdge {
    /// Referencing document.
    pub from_uri: Arc<Url>,
    /// Pointer of the `$ref` member in the referencing document.
    pub from_pointer: String,
    /// The reference exactly as written.
    pub raw_ref: String,
    /// Fragment-free target document URI.
    pub target_uri: Url,
    /// `#`-rooted target pointer, when the reference carried a fragment.
    pub target_pointer: Option<String>,
    /// True for `http(s)` targets; recorded but never loaded.
    pub remote: bool,
}

/// Discovers the outgoing edges of one document from its extracted atoms.
#[must_use]
pub fn collect_edges(atoms: &AtomIndex, workspace_root: Option<&Url>) -> Vec<RefEdge> {
    let mut edges = Vec::with_capacity(atoms.references.len());
    for reference in &atoms.references {
        let Some(target) = uri::resolve_reference(&reference.uri, &reference.raw, workspace_root)
        else {
            continue;
        };
        edges.push(RefEdge {
            from_uri: Arc::clone(&reference.uri),
            from_pointer: reference.pointer.clone(),
            raw_ref: reference.raw.clone(),
            target_uri: target.uri,
            target_pointer: target.pointer,
            remote: target.remote,
        });
    }
    edges
}

/// Dependency/dependent index over all known documents.
#[derive(Debug, Default)]
pub struct ReferenceGraph {
    outgoing: FxHashMap<Url, Vec<RefEdge>>,
    incoming: FxHashMap<Url, Vec<RefEdge>>,
}

impl ReferenceGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replaces all edges originating at `uri`.
    pub fn replace_edges_for(&mut self, uri: &Url, edges: Vec<RefEdge>) {
        self.drop_outgoing(uri);
        for edge in &edges {
            self.incoming
                .entry(edge.target_uri.clone())
                .or_default()
                .push(edge.clone());
        }
        if edges.is_empty() {
            self.outgoing.remove(uri);
        } else {
            self.outgoing.insert(uri.clone(), edges);
        }
    }

    /// Removes every edge originating at `uri`.
    pub fn remove(&mut self, uri: &Url) {
        self.drop_outgoing(uri);
        self.outgoing.remove(uri);
    }

    /// Drops all state.
    pub fn clear(&mut self) {
        self.outgoing.clear();
        self.incoming.clear();
    }

    fn drop_outgoing(&mut self, uri: &Url) {
        let Some(old) = self.outgoing.get(uri) else {
            return;
        };
        let targets: BTreeSet<&Url> = old.iter().map(|edge| &edge.target_uri).collect();
        for target in targets {
            if let Some(edges) = self.incoming.get_mut(target) {
                edges.retain(|edge| edge.from_uri.as_ref() != uri);
                if edges.is_empty() {
                    self.incoming.remove(target);
                }
            }
        }
    }

    /// Unique non-remote target URIs referenced from `uri`, self-loops excluded.
    #[must_use]
    pub fn dependencies_of(&self, uri: &Url) -> BTreeSet<Url> {
        self.edges_from(uri)
            .iter()
            .filter(|edge| !edge.remote && &edge.target_uri != uri)
            .map(|edge| edge.target_uri.clone())
            .collect()
    }

    /// Unique URIs that reference `uri`, self-loops excluded.
    #[must_use]
    pub fn dependents_of(&self, uri: &Url) -> BTreeSet<Url> {
        self.edges_to(uri)
            .iter()
            .filter(|edge| edge.from_uri.as_ref() != uri)
            .map(|edge| edge.from_uri.as_ref().clone())
            .collect()
    }

    /// All edges originating at `uri`, in document order.
    #[must_use]
    pub fn edges_from(&self, uri: &Url) -> &[RefEdge] {
        self.outgoing.get(uri).map_or(&[], Vec::as_slice)
    }

    /// All edges pointing at `uri`.
    #[must_use]
    pub fn edges_to(&self, uri: &Url) -> &[RefEdge] {
        self.incoming.get(uri).map_or(&[], Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::extract_atoms;
    use crate::classify::identify_type;
    use telescope_syntax::build_yaml;

    fn edges(uri: &str, text: &str) -> Vec<RefEdge> {
        let uri = Arc::new(Url::parse(uri).unwrap());
        let doc = build_yaml(uri, text).unwrap();
        let atoms = extract_atoms(&doc, identify_type(&doc.root));
        collect_edges(&atoms, None)
    }

    #[test]
    fn same_document_refs_point_at_self() {
        let edges = edges(
            "file:///a.yaml",
            "paths:\n  /p:\n    get:\n      responses:\n        \"200\":\n          $ref: '#/x'\n",
        );
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].target_uri.as_str(), "file:///a.yaml");
        assert_eq!(edges[0].target_pointer.as_deref(), Some("#/x"));
    }

    #[test]
    fn replace_maintains_inverse_index() {
        let a = Url::parse("file:///a.yaml").unwrap();
        let b = Url::parse("file:///b.yaml").unwrap();
        let mut graph = ReferenceGraph::new();

        let edge = RefEdge {
            from_uri: Arc::new(a.clone()),
            from_pointer: "#/x/$ref".to_string(),
            raw_ref: "./b.yaml".to_string(),
            target_uri: b.clone(),
            target_pointer: None,
            remote: false,
        };
        graph.replace_edges_for(&a, vec![edge]);

        assert_eq!(graph.dependencies_of(&a), BTreeSet::from([b.clone()]));
        assert_eq!(graph.dependents_of(&b), BTreeSet::from([a.clone()]));

        graph.replace_edges_for(&a, Vec::new());
        assert!(graph.dependencies_of(&a).is_empty());
        assert!(graph.dependents_of(&b).is_empty());
    }

    #[test]
    fn remote_edges_are_recorded_but_not_dependencies() {
        let edges = edges(
            "file:///a.yaml",
            "paths:\n  /p:\n    $ref: 'https://example.com/shared.yaml#/p'\n",
        );
        assert_eq!(edges.len(), 1);
        assert!(edges[0].remote);

        let a = Url::parse("file:///a.yaml").unwrap();
        let mut graph = ReferenceGraph::new();
        graph.replace_edges_for(&a, edges);
        assert!(graph.dependencies_of(&a).is_empty());
        assert_eq!(graph.edges_from(&a).len(), 1);
    }
}
