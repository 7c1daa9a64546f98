//! Per-document and workspace diagnostic scheduling.
//!
//! Caching happens at two levels: a per-document cache keyed by content hash
//! (serving `Unchanged` responses), and per-root snapshots keyed by the rule
//! signature plus a project hash over every member's content. Root
//! computations run under a FIFO concurrency gate. Cancellation at any
//! suspension point discards partial work without touching the caches.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use telescope_hir::{
    checkpoint, dedup_diagnostics, sort_diagnostics, CancellationToken, Cancelled, Diagnostic,
    Workspace,
};
use telescope_ide::engine::{result_id, run_rules};
use telescope_syntax::hash::sha1_hex;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;

use crate::config::TelescopeConfig;
use crate::fs::FileSystem;

/// Default bound on concurrently computed roots.
pub const DEFAULT_MAX_ROOT_CONCURRENCY: usize = 2;

/// Whether a report repeats the previous result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// Diagnostics are included.
    Full,
    /// The previous result id is still valid.
    Unchanged,
}

/// Response to a per-document diagnostic query.
#[derive(Debug, Clone)]
pub enum DocumentReport {
    /// The caller's previous result is still valid.
    Unchanged {
        /// The unchanged result id.
        result_id: String,
    },
    /// A full diagnostic set.
    Full {
        /// Identifier for this result.
        result_id: String,
        /// The diagnostics, canonically ordered.
        items: Vec<Diagnostic>,
    },
}

impl DocumentReport {
    /// The result id carried by either variant.
    #[must_use]
    pub fn result_id(&self) -> &str {
        match self {
            DocumentReport::Unchanged { result_id } | DocumentReport::Full { result_id, .. } => {
                result_id
            }
        }
    }
}

/// One document's entry in a workspace diagnostic response.
#[derive(Debug, Clone)]
pub struct WorkspaceReportEntry {
    /// The document.
    pub uri: Url,
    /// Full or unchanged.
    pub kind: ReportKind,
    /// Identifier for the document's current diagnostics.
    pub result_id: String,
    /// Diagnostics; present only for [`ReportKind::Full`].
    pub items: Option<Vec<Diagnostic>>,
}

#[derive(Debug, Clone)]
struct DocCache {
    result_id: String,
    content_hash: String,
    diagnostics: Vec<Diagnostic>,
}

#[derive(Debug)]
struct RootSnapshot {
    rules_signature: String,
    project_hash: String,
    by_uri: BTreeMap<Url, Vec<Diagnostic>>,
}

/// The diagnostics scheduler and its caches.
pub struct DiagnosticsScheduler {
    doc_cache: Mutex<FxHashMap<Url, DocCache>>,
    snapshots: Mutex<FxHashMap<Url, Arc<RootSnapshot>>>,
    member_index: Mutex<FxHashMap<Url, FxHashSet<Url>>>,
    gate: Arc<Semaphore>,
}

impl DiagnosticsScheduler {
    /// Creates a scheduler allowing `max_root_concurrency` concurrent roots.
    #[must_use]
    pub fn new(max_root_concurrency: usize) -> Self {
        Self {
            doc_cache: Mutex::new(FxHashMap::default()),
            snapshots: Mutex::new(FxHashMap::default()),
            member_index: Mutex::new(FxHashMap::default()),
            gate: Arc::new(Semaphore::new(max_root_concurrency.max(1))),
        }
    }

    /// Evicts cached results touching any of the given URIs.
    pub fn invalidate<'a>(&self, uris: impl IntoIterator<Item = &'a Url>) {
        let mut doc_cache = self.doc_cache.lock();
        let mut snapshots = self.snapshots.lock();
        let mut member_index = self.member_index.lock();
        for uri in uris {
            doc_cache.remove(uri);
            if let Some(roots) = member_index.remove(uri) {
                for root in roots {
                    snapshots.remove(&root);
                }
            }
            snapshots.remove(uri);
        }
    }

    /// Drops every cached result.
    pub fn clear(&self) {
        self.doc_cache.lock().clear();
        self.snapshots.lock().clear();
        self.member_index.lock().clear();
    }

    /// Answers a per-document diagnostic query.
    ///
    /// # Errors
    ///
    /// [`Cancelled`] when the token trips; no cache is updated.
    pub async fn document_diagnostics(
        &self,
        workspace: &Mutex<Workspace>,
        config: &TelescopeConfig,
        fs: &Arc<dyn FileSystem>,
        uri: &Url,
        previous_result_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<DocumentReport, Cancelled> {
        checkpoint(cancel)?;
        let folders = workspace.lock().workspace_folders().to_vec();

        if !config.in_scope(uri, &folders) {
            return Ok(DocumentReport::Full {
                result_id: result_id("out-of-scope", &[]),
                items: Vec::new(),
            });
        }

        // Content identity: the open buffer when cached, else the disk.
        let mut entry = workspace.lock().entry(uri);
        if entry.is_none() {
            checkpoint(cancel)?;
            let content = match fs.read(uri).await {
                Ok(content) => content,
                Err(err) => {
                    warn!(uri = %uri, error = %err, "cannot read document for diagnostics");
                    return Ok(DocumentReport::Full {
                        result_id: result_id("unreadable", &[]),
                        items: Vec::new(),
                    });
                }
            };
            checkpoint(cancel)?;
            let mut ws = workspace.lock();
            ws.update_document(uri, &content.text, "", None);
            let affected = ws.drain_affected();
            entry = ws.entry(uri);
            drop(ws);
            self.invalidate(affected.iter());
        }
        let Some(entry) = entry else {
            // Fast-rejected or unparseable: nothing to report.
            return Ok(DocumentReport::Full {
                result_id: result_id("not-openapi", &[]),
                items: Vec::new(),
            });
        };
        let content_hash = entry.ir.hash.clone();
        let version_label = entry
            .version
            .map_or_else(|| content_hash.clone(), |version| version.to_string());

        if let Some(cached) = self.doc_cache.lock().get(uri).cloned() {
            if cached.content_hash == content_hash {
                if previous_result_id == Some(cached.result_id.as_str()) {
                    return Ok(DocumentReport::Unchanged {
                        result_id: cached.result_id,
                    });
                }
                return Ok(DocumentReport::Full {
                    result_id: cached.result_id,
                    items: cached.diagnostics,
                });
            }
        }

        checkpoint(cancel)?;
        let mut diagnostics = {
            let ws = workspace.lock();
            run_rules(&ws, std::slice::from_ref(uri), config.rule_set(), cancel)?
        };
        diagnostics.retain(|diagnostic| diagnostic.uri.as_ref() == uri);
        config.apply_severity_policy(&mut diagnostics, &folders);
        sort_diagnostics(&mut diagnostics);
        dedup_diagnostics(&mut diagnostics);

        let id = result_id(&version_label, &diagnostics);
        self.doc_cache.lock().insert(
            uri.clone(),
            DocCache {
                result_id: id.clone(),
                content_hash,
                diagnostics: diagnostics.clone(),
            },
        );
        Ok(DocumentReport::Full {
            result_id: id,
            items: diagnostics,
        })
    }

    /// Answers a workspace diagnostic query over the given roots.
    ///
    /// # Errors
    ///
    /// [`Cancelled`] when the token trips. Snapshots completed before the
    /// cancellation remain cached; the in-flight computation is discarded.
    pub async fn workspace_diagnostics(
        &self,
        workspace: &Mutex<Workspace>,
        config: &TelescopeConfig,
        roots: impl IntoIterator<Item = Url>,
        previous_result_ids: &HashMap<Url, String>,
        cancel: &CancellationToken,
    ) -> Result<Vec<WorkspaceReportEntry>, Cancelled> {
        checkpoint(cancel)?;
        let folders = workspace.lock().workspace_folders().to_vec();
        let rules_signature = config.rule_set().signature();

        let futures: Vec<_> = roots
            .into_iter()
            .map(|root| {
                let rules_signature = rules_signature.clone();
                async move {
                    self.root_snapshot(workspace, config, root, rules_signature, cancel)
                        .await
                }
            })
            .collect();

        let mut merged: BTreeMap<Url, Vec<Diagnostic>> = BTreeMap::new();
        let mut member_hashes: BTreeMap<Url, std::collections::BTreeSet<String>> = BTreeMap::new();
        for result in join_all(futures).await {
            let snapshot = result?;
            for (uri, diagnostics) in &snapshot.by_uri {
                merged
                    .entry(uri.clone())
                    .or_default()
                    .extend(diagnostics.iter().cloned());
                member_hashes
                    .entry(uri.clone())
                    .or_default()
                    .insert(snapshot.project_hash.clone());
            }
        }

        checkpoint(cancel)?;
        let mut entries = Vec::with_capacity(merged.len());
        for (uri, mut diagnostics) in merged {
            config.apply_severity_policy(&mut diagnostics, &folders);
            sort_diagnostics(&mut diagnostics);
            dedup_diagnostics(&mut diagnostics);

            let version_label = {
                let ws = workspace.lock();
                ws.entry(&uri).map_or_else(
                    || "missing".to_string(),
                    |entry| {
                        entry
                            .version
                            .map_or_else(|| entry.ir.hash.clone(), |version| version.to_string())
                    },
                )
            };
            // A result is valid only while every member of its contributing
            // snapshots is unchanged, so the project hashes join the label.
            let snapshot_label = member_hashes
                .get(&uri)
                .map(|hashes| hashes.iter().cloned().collect::<Vec<_>>().join(","))
                .unwrap_or_default();
            let id = result_id(&format!("{version_label}|{snapshot_label}"), &diagnostics);
            if previous_result_ids.get(&uri).map(String::as_str) == Some(id.as_str()) {
                entries.push(WorkspaceReportEntry {
                    uri,
                    kind: ReportKind::Unchanged,
                    result_id: id,
                    items: None,
                });
            } else {
                entries.push(WorkspaceReportEntry {
                    uri,
                    kind: ReportKind::Full,
                    result_id: id,
                    items: Some(diagnostics),
                });
            }
        }
        Ok(entries)
    }

    async fn root_snapshot(
        &self,
        workspace: &Mutex<Workspace>,
        config: &TelescopeConfig,
        root: Url,
        rules_signature: String,
        cancel: &CancellationToken,
    ) -> Result<Arc<RootSnapshot>, Cancelled> {
        checkpoint(cancel)?;

        // Reuse a snapshot whose rule signature and project content match.
        let cached = self.snapshots.lock().get(&root).cloned();
        if let Some(snapshot) = cached {
            let current_hash = {
                let ws = workspace.lock();
                let members = ws.project_members(&root);
                project_hash(&ws, &members)
            };
            if snapshot.rules_signature == rules_signature
                && snapshot.project_hash == current_hash
            {
                debug!(root = %root, "reusing root snapshot");
                return Ok(snapshot);
            }
        }

        let permit = self.gate.acquire().await.map_err(|_| Cancelled)?;
        checkpoint(cancel)?;

        let snapshot = {
            let ws = workspace.lock();
            let members = ws.project_members(&root);
            let hash = project_hash(&ws, &members);
            let diagnostics = run_rules(&ws, &members, config.rule_set(), cancel)?;

            let mut by_uri: BTreeMap<Url, Vec<Diagnostic>> = BTreeMap::new();
            for diagnostic in diagnostics {
                by_uri
                    .entry(diagnostic.uri.as_ref().clone())
                    .or_default()
                    .push(diagnostic);
            }
            for diagnostics in by_uri.values_mut() {
                sort_diagnostics(diagnostics);
                dedup_diagnostics(diagnostics);
            }
            // Roots with no diagnostics still appear in the response.
            for member in &members {
                by_uri.entry(member.clone()).or_default();
            }
            Arc::new(RootSnapshot {
                rules_signature,
                project_hash: hash,
                by_uri,
            })
        };
        drop(permit);

        self.snapshots.lock().insert(root.clone(), Arc::clone(&snapshot));
        {
            let mut member_index = self.member_index.lock();
            for member in snapshot.by_uri.keys() {
                member_index
                    .entry(member.clone())
                    .or_default()
                    .insert(root.clone());
            }
        }
        Ok(snapshot)
    }
}

impl Default for DiagnosticsScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ROOT_CONCURRENCY)
    }
}

/// SHA-1 over the sorted `(uri, content-hash)` pairs of a project.
fn project_hash(workspace: &Workspace, members: &[Url]) -> String {
    let mut lines: Vec<String> = members
        .iter()
        .map(|uri| match workspace.entry(uri) {
            Some(entry) => format!("{uri}|{}", entry.ir.hash),
            None => format!("{uri}|missing"),
        })
        .collect();
    lines.sort();
    sha1_hex(lines.join("\n").as_bytes())
}
