//! Root classification and reverse reachability.
//!
//! A *root* is a document classified as a full OpenAPI specification. A
//! fragment belongs to every root that reaches it through the reference
//! graph; the lexicographically smallest of those is its primary root, for
//! deterministic scheduling.

use std::collections::{BTreeSet, VecDeque};

use rustc_hash::FxHashSet;
use url::Url;

use crate::classify::DocumentType;
use crate::graph::ReferenceGraph;

/// Tracks which known documents are roots.
#[derive(Debug, Default)]
pub struct RootResolver {
    roots: FxHashSet<Url>,
}

impl RootResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the classification of a document.
    pub fn set_classification(&mut self, uri: &Url, doc_type: DocumentType) {
        if doc_type == DocumentType::Root {
            self.roots.insert(uri.clone());
        } else {
            self.roots.remove(uri);
        }
    }

    /// Forgets a document entirely.
    pub fn remove(&mut self, uri: &Url) {
        self.roots.remove(uri);
    }

    /// Drops all state.
    pub fn clear(&mut self) {
        self.roots.clear();
    }

    /// True when the document itself is a root.
    #[must_use]
    pub fn is_root(&self, uri: &Url) -> bool {
        self.roots.contains(uri)
    }

    /// All known roots, in deterministic order.
    #[must_use]
    pub fn all_roots(&self) -> BTreeSet<Url> {
        self.roots.iter().cloned().collect()
    }

    /// The set of roots that reach `uri` via reverse-edge traversal.
    ///
    /// Contains `uri` itself when it is a root. Reference cycles are
    /// tolerated via the visited set.
    #[must_use]
    pub fn roots_for(&self, uri: &Url, graph: &ReferenceGraph) -> BTreeSet<Url> {
        let mut found = BTreeSet::new();
        let mut visited: FxHashSet<Url> = FxHashSet::default();
        let mut queue: VecDeque<Url> = VecDeque::new();

        visited.insert(uri.clone());
        queue.push_back(uri.clone());

        while let Some(current) = queue.pop_front() {
            if self.roots.contains(&current) {
                found.insert(current.clone());
            }
            for dependent in graph.dependents_of(&current) {
                if visited.insert(dependent.clone()) {
                    queue.push_back(dependent);
                }
            }
        }
        found
    }

    /// The lexicographically smallest root reaching `uri`.
    #[must_use]
    pub fn primary_root(&self, uri: &Url, graph: &ReferenceGraph) -> Option<Url> {
        self.roots_for(uri, graph).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RefEdge;
    use std::sync::Arc;

    fn edge(from: &Url, to: &Url) -> RefEdge {
        RefEdge {
            from_uri: Arc::new(from.clone()),
            from_pointer: "#/x/$ref".to_string(),
            raw_ref: to.to_string(),
            target_uri: to.clone(),
            target_pointer: None,
            remote: false,
        }
    }

    #[test]
    fn fragments_find_their_roots_through_cycles() {
        let root = Url::parse("file:///root.yaml").unwrap();
        let a = Url::parse("file:///a.yaml").unwrap();
        let b = Url::parse("file:///b.yaml").unwrap();

        let mut graph = ReferenceGraph::new();
        graph.replace_edges_for(&root, vec![edge(&root, &a)]);
        // a <-> b cycle, both reachable from the root.
        graph.replace_edges_for(&a, vec![edge(&a, &b)]);
        graph.replace_edges_for(&b, vec![edge(&b, &a)]);

        let mut resolver = RootResolver::new();
        resolver.set_classification(&root, DocumentType::Root);
        resolver.set_classification(&a, DocumentType::Schema);
        resolver.set_classification(&b, DocumentType::Schema);

        assert_eq!(resolver.roots_for(&b, &graph), BTreeSet::from([root.clone()]));
        assert_eq!(resolver.primary_root(&b, &graph), Some(root.clone()));
        assert_eq!(resolver.roots_for(&root, &graph), BTreeSet::from([root]));
    }

    #[test]
    fn primary_root_is_lexicographically_smallest() {
        let r1 = Url::parse("file:///alpha.yaml").unwrap();
        let r2 = Url::parse("file:///beta.yaml").unwrap();
        let shared = Url::parse("file:///shared.yaml").unwrap();

        let mut graph = ReferenceGraph::new();
        graph.replace_edges_for(&r1, vec![edge(&r1, &shared)]);
        graph.replace_edges_for(&r2, vec![edge(&r2, &shared)]);

        let mut resolver = RootResolver::new();
        resolver.set_classification(&r1, DocumentType::Root);
        resolver.set_classification(&r2, DocumentType::Root);

        assert_eq!(resolver.primary_root(&shared, &graph), Some(r1));
    }
}
