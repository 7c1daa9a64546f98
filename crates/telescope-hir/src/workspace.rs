//! The workspace: single mutation owner for all semantic state.
//!
//! Updates flow through [`Workspace::update_document`], which keeps the
//! document store, reference graph, operation-ID index, and root set
//! consistent in one step and records which URIs can no longer trust their
//! cached diagnostics.

use std::collections::BTreeSet;
use std::sync::Arc;

use rustc_hash::FxHashSet;
use telescope_syntax::{build_json, build_yaml, DocFormat, LineIndex, ParseFailure};
use tracing::{debug, warn};
use url::Url;

use crate::atoms::{extract_atoms, AtomIndex};
use crate::classify::{identify_type, DocumentType};
use crate::graph::{collect_edges, ReferenceGraph};
use crate::operations::OperationIdIndex;
use crate::resolve::{deref, ResolveError, ResolvedRef};
use crate::roots::RootResolver;
use crate::store::{DocumentEntry, DocumentStore};
use crate::uri;

/// Filenames that are never OpenAPI documents, rejected before parsing.
const REJECTED_FILENAMES: &[&str] = &[
    "package.json",
    "package-lock.json",
    "tsconfig.json",
    "jsconfig.json",
    "composer.json",
    "deno.json",
    "deno.jsonc",
    "angular.json",
    "nx.json",
    ".eslintrc.json",
    ".prettierrc.json",
    "babel.config.json",
    "pnpm-lock.yaml",
    ".pre-commit-config.yaml",
];

/// Result of a document update.
#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    /// The document parsed and was (re)indexed.
    Updated {
        /// Its classification.
        doc_type: DocumentType,
    },
    /// The document cannot be OpenAPI and was not indexed.
    Skipped,
    /// The document failed to parse; previous state was dropped.
    Failed(ParseFailure),
}

/// All semantic state for one workspace.
#[derive(Debug)]
pub struct Workspace {
    store: DocumentStore,
    graph: ReferenceGraph,
    operation_ids: OperationIdIndex,
    roots: RootResolver,
    workspace_folders: Vec<Url>,
    affected: FxHashSet<Url>,
}

impl Workspace {
    /// Creates a workspace bounded to `capacity` cached documents.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            store: DocumentStore::new(capacity),
            graph: ReferenceGraph::new(),
            operation_ids: OperationIdIndex::new(),
            roots: RootResolver::new(),
            workspace_folders: Vec::new(),
            affected: FxHashSet::default(),
        }
    }

    /// Replaces the workspace folder list.
    pub fn set_workspace_folders(&mut self, folders: Vec<Url>) {
        self.workspace_folders = folders;
    }

    /// The configured workspace folders.
    #[must_use]
    pub fn workspace_folders(&self) -> &[Url] {
        &self.workspace_folders
    }

    /// The longest workspace folder containing `uri`, if any.
    #[must_use]
    pub fn workspace_root_for(&self, uri: &Url) -> Option<&Url> {
        self.workspace_folders
            .iter()
            .filter(|folder| {
                let folder_str = folder.as_str();
                let target = uri.as_str();
                target.starts_with(folder_str)
                    && (folder_str.ends_with('/')
                        || target[folder_str.len()..].starts_with('/'))
            })
            .max_by_key(|folder| folder.as_str().len())
    }

    /// Parses, indexes, and caches one document.
    ///
    /// Parse failures drop any previous state for the URI and are reported in
    /// the outcome rather than as an error; no partial state survives.
    pub fn update_document(
        &mut self,
        uri: &Url,
        text: &str,
        language_id: &str,
        version: Option<i32>,
    ) -> UpdateOutcome {
        let uri = uri::normalize(uri);
        if !is_candidate(&uri, language_id) {
            if self.store.contains(&uri) {
                self.remove_document(&uri);
            }
            return UpdateOutcome::Skipped;
        }

        let shared_uri = Arc::new(uri.clone());
        let parsed = match detect_format(&uri, language_id) {
            DocFormat::Json => build_json(Arc::clone(&shared_uri), text),
            DocFormat::Yaml => build_yaml(Arc::clone(&shared_uri), text),
        };
        let ir = match parsed {
            Ok(ir) => ir,
            Err(failure) => {
                warn!(uri = %uri, error = %failure, "parse failed; dropping document state");
                self.purge(&uri);
                self.mark_affected_closure(&uri, &BTreeSet::new());
                return UpdateOutcome::Failed(failure);
            }
        };

        let doc_type = identify_type(&ir.root);
        let atoms = extract_atoms(&ir, doc_type);
        let workspace_root = self.workspace_root_for(&uri).cloned();
        let edges = collect_edges(&atoms, workspace_root.as_ref());
        self.graph.replace_edges_for(&uri, edges);
        let changed_ids = self.operation_ids.replace_for_uri(&uri, &atoms.operations);
        self.roots.set_classification(&uri, doc_type);

        let entry = DocumentEntry {
            line_index: Arc::new(LineIndex::new(text)),
            atoms: Arc::new(atoms),
            ir: Arc::new(ir),
            doc_type,
            version,
        };
        if let Some(evicted) = self.store.insert(uri.clone(), Arc::new(entry)) {
            debug!(uri = %evicted, "evicted least-recently-used document");
        }

        self.mark_affected_closure(&uri, &changed_ids);
        UpdateOutcome::Updated { doc_type }
    }

    /// Removes a document and all state derived from it.
    pub fn remove_document(&mut self, uri: &Url) {
        let uri = uri::normalize(uri);
        let changed_ids = self.purge(&uri);
        self.mark_affected_closure(&uri, &changed_ids);
    }

    fn purge(&mut self, uri: &Url) -> BTreeSet<String> {
        self.store.remove(uri);
        self.graph.remove(uri);
        self.roots.remove(uri);
        self.operation_ids.remove_uri(uri)
    }

    fn mark_affected_closure(&mut self, uri: &Url, changed_ids: &BTreeSet<String>) {
        self.affected.insert(uri.clone());
        for dependent in self.graph.dependents_of(uri) {
            self.affected.insert(dependent);
        }
        for holder in self.operation_ids.uris_with_ids(changed_ids) {
            self.affected.insert(holder);
        }
    }

    /// Explicitly marks a URI as affected.
    pub fn mark_affected(&mut self, uri: &Url) {
        self.affected.insert(uri::normalize(uri));
    }

    /// Takes the accumulated affected set, in deterministic order.
    pub fn drain_affected(&mut self) -> BTreeSet<Url> {
        self.affected.drain().collect()
    }

    /// Wipes all state.
    pub fn clear(&mut self) {
        self.store.clear();
        self.graph.clear();
        self.operation_ids.clear();
        self.roots.clear();
        self.affected.clear();
    }

    /// Read access without recency bump.
    #[must_use]
    pub fn entry(&self, uri: &Url) -> Option<Arc<DocumentEntry>> {
        self.store.peek(&uri::normalize(uri)).cloned()
    }

    /// Read access with recency bump.
    pub fn touch(&mut self, uri: &Url) -> Option<Arc<DocumentEntry>> {
        self.store.get(&uri::normalize(uri))
    }

    /// True when the URI is cached.
    #[must_use]
    pub fn contains(&self, uri: &Url) -> bool {
        self.store.contains(&uri::normalize(uri))
    }

    /// The reference graph.
    #[must_use]
    pub fn graph(&self) -> &ReferenceGraph {
        &self.graph
    }

    /// The operation-ID index.
    #[must_use]
    pub fn operation_ids(&self) -> &OperationIdIndex {
        &self.operation_ids
    }

    /// True when the document classified as a root specification.
    #[must_use]
    pub fn is_root(&self, uri: &Url) -> bool {
        self.roots.is_root(&uri::normalize(uri))
    }

    /// Every known root document.
    #[must_use]
    pub fn all_roots(&self) -> BTreeSet<Url> {
        self.roots.all_roots()
    }

    /// Roots that reach `uri` through the reference graph.
    #[must_use]
    pub fn roots_for(&self, uri: &Url) -> BTreeSet<Url> {
        self.roots.roots_for(&uri::normalize(uri), &self.graph)
    }

    /// The deterministic primary root for `uri`.
    #[must_use]
    pub fn primary_root(&self, uri: &Url) -> Option<Url> {
        self.roots.primary_root(&uri::normalize(uri), &self.graph)
    }

    /// Transitive non-remote dependencies of `uri`, excluding itself.
    #[must_use]
    pub fn linked_uris(&self, uri: &Url) -> Vec<Url> {
        let start = uri::normalize(uri);
        let mut seen: FxHashSet<Url> = FxHashSet::default();
        seen.insert(start.clone());
        let mut queue = vec![start];
        let mut linked = Vec::new();
        while let Some(current) = queue.pop() {
            for dependency in self.graph.dependencies_of(&current) {
                if seen.insert(dependency.clone()) {
                    linked.push(dependency.clone());
                    queue.push(dependency);
                }
            }
        }
        linked.sort();
        linked
    }

    /// The member list of a root's project: the root plus its transitive
    /// dependencies, root first.
    #[must_use]
    pub fn project_members(&self, root: &Url) -> Vec<Url> {
        let root = uri::normalize(root);
        let mut members = vec![root.clone()];
        members.extend(self.linked_uris(&root));
        members
    }

    /// Dereferences a raw `$ref` written in `origin`.
    ///
    /// # Errors
    ///
    /// See [`ResolveError`].
    pub fn deref(&self, origin: &Url, raw: &str) -> Result<ResolvedRef, ResolveError> {
        let origin = uri::normalize(origin);
        let workspace_root = self.workspace_root_for(&origin).cloned();
        deref(&self.store, &origin, raw, workspace_root.as_ref())
    }

    /// The atom index of a cached document.
    #[must_use]
    pub fn atoms(&self, uri: &Url) -> Option<Arc<AtomIndex>> {
        self.entry(uri).map(|entry| Arc::clone(&entry.atoms))
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new(DocumentStore::DEFAULT_CAPACITY)
    }
}

fn is_candidate(uri: &Url, language_id: &str) -> bool {
    let filename = uri
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");
    if REJECTED_FILENAMES.contains(&filename) {
        return false;
    }
    let known_language = matches!(language_id, "yaml" | "json" | "jsonc");
    let known_extension = filename
        .rsplit_once('.')
        .is_some_and(|(_, ext)| matches!(ext, "yaml" | "yml" | "json"));
    known_language || known_extension
}

fn detect_format(uri: &Url, language_id: &str) -> DocFormat {
    if matches!(language_id, "json" | "jsonc") {
        return DocFormat::Json;
    }
    if language_id == "yaml" {
        return DocFormat::Yaml;
    }
    if uri.path().ends_with(".json") {
        DocFormat::Json
    } else {
        DocFormat::Yaml
    }
}
