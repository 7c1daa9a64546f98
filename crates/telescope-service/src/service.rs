//! The language-service facade: the interface the editor transport consumes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use telescope_hir::{
    checkpoint, CancellationToken, Cancelled, DocumentStore, Position, UpdateOutcome, Workspace,
};
use telescope_ide::{document_links, hover_for_ref, DocumentLink, Hover};
use tracing::{info, warn};
use url::Url;

use crate::config::TelescopeConfig;
use crate::fs::{FileChange, FileChangeKind, FileSystem, FileType, WatchHandle};
use crate::scheduler::{DiagnosticsScheduler, DocumentReport, WorkspaceReportEntry};

/// The core language service.
///
/// Owns all mutable state; watch callbacks enqueue changes that are applied
/// on the service's own call paths, never concurrently with queries.
pub struct LanguageService {
    fs: Arc<dyn FileSystem>,
    workspace: Mutex<Workspace>,
    config: Mutex<Arc<TelescopeConfig>>,
    scheduler: DiagnosticsScheduler,
    watch_handles: Mutex<Vec<WatchHandle>>,
    pending_changes: Arc<Mutex<Vec<FileChange>>>,
    scanned: AtomicBool,
}

impl LanguageService {
    /// Creates a service over the given filesystem with default limits.
    #[must_use]
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self::with_capacity(fs, DocumentStore::DEFAULT_CAPACITY)
    }

    /// Creates a service with an explicit document-store bound.
    #[must_use]
    pub fn with_capacity(fs: Arc<dyn FileSystem>, capacity: usize) -> Self {
        Self {
            fs,
            workspace: Mutex::new(Workspace::new(capacity)),
            config: Mutex::new(Arc::new(TelescopeConfig::default())),
            scheduler: DiagnosticsScheduler::default(),
            watch_handles: Mutex::new(Vec::new()),
            pending_changes: Arc::default(),
            scanned: AtomicBool::new(false),
        }
    }

    /// Applies an open-buffer update.
    pub fn update_document(
        &self,
        uri: &Url,
        text: &str,
        language_id: &str,
        version: Option<i32>,
    ) -> UpdateOutcome {
        let (outcome, affected) = {
            let mut ws = self.workspace.lock();
            let outcome = ws.update_document(uri, text, language_id, version);
            (outcome, ws.drain_affected())
        };
        self.scheduler.invalidate(affected.iter());
        outcome
    }

    /// Removes a document (editor close of a deleted file, etc.).
    pub fn remove_document(&self, uri: &Url) {
        let affected = {
            let mut ws = self.workspace.lock();
            ws.remove_document(uri);
            ws.drain_affected()
        };
        self.scheduler.invalidate(affected.iter());
    }

    /// Per-document diagnostics with result-ID reuse.
    ///
    /// # Errors
    ///
    /// [`Cancelled`] when the token trips.
    pub async fn compute_document_diagnostics(
        &self,
        uri: &Url,
        previous_result_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<DocumentReport, Cancelled> {
        self.apply_pending_changes(cancel).await?;
        let config = self.current_config();
        self.scheduler
            .document_diagnostics(
                &self.workspace,
                &config,
                &self.fs,
                uri,
                previous_result_id,
                cancel,
            )
            .await
    }

    /// Workspace diagnostics across every known root.
    ///
    /// # Errors
    ///
    /// [`Cancelled`] when the token trips.
    pub async fn compute_workspace_diagnostics(
        &self,
        previous_result_ids: &HashMap<Url, String>,
        cancel: &CancellationToken,
    ) -> Result<Vec<WorkspaceReportEntry>, Cancelled> {
        self.ensure_scanned(cancel).await?;
        self.apply_pending_changes(cancel).await?;
        let config = self.current_config();
        let roots = self.workspace.lock().all_roots();
        self.scheduler
            .workspace_diagnostics(&self.workspace, &config, roots, previous_result_ids, cancel)
            .await
    }

    /// Links for every external `$ref` in a document.
    #[must_use]
    pub fn document_links(&self, uri: &Url) -> Vec<DocumentLink> {
        let ws = self.workspace.lock();
        document_links(&ws, uri)
    }

    /// Hover preview for the `$ref` under the cursor.
    #[must_use]
    pub fn hover_for_ref(&self, uri: &Url, position: Position) -> Option<Hover> {
        let ws = self.workspace.lock();
        hover_for_ref(&ws, uri, position)
    }

    /// Replaces the configuration.
    ///
    /// Returns true (and drops all cached results) iff the config signature
    /// changed.
    pub fn set_config(&self, new_config: TelescopeConfig) -> bool {
        let mut current = self.config.lock();
        if current.signature() == new_config.signature() {
            return false;
        }
        *current = Arc::new(new_config);
        drop(current);
        self.scheduler.clear();
        info!("configuration changed; diagnostic caches dropped");
        true
    }

    /// Parses config text, falling back to defaults on parse failure.
    ///
    /// Returns true iff the effective configuration changed.
    pub fn load_config_text(&self, text: &str) -> bool {
        let config = match TelescopeConfig::from_yaml(text) {
            Ok(config) => config,
            Err(err) => {
                warn!(error = %err, "config parse failed; using defaults");
                TelescopeConfig::default()
            }
        };
        self.set_config(config)
    }

    /// Replaces the workspace folder list and re-registers watchers.
    pub fn set_workspace_folders(&self, folders: Vec<Url>) {
        {
            let mut ws = self.workspace.lock();
            ws.set_workspace_folders(folders.clone());
        }
        self.scanned.store(false, Ordering::SeqCst);

        let pending = Arc::clone(&self.pending_changes);
        let handler = Arc::new(move |change: FileChange| {
            pending.lock().push(change);
        });
        let mut handles = self.watch_handles.lock();
        handles.clear();
        match self.fs.watch(&folders, handler) {
            Ok(handle) => handles.push(handle),
            Err(err) => warn!(error = %err, "failed to register workspace watcher"),
        }
    }

    /// Releases watchers and drops all state. No files are written.
    pub fn shutdown(&self) {
        self.watch_handles.lock().clear();
        self.scheduler.clear();
        self.workspace.lock().clear();
        self.pending_changes.lock().clear();
    }

    fn current_config(&self) -> Arc<TelescopeConfig> {
        Arc::clone(&self.config.lock())
    }

    /// Applies queued watcher events onto the workspace.
    async fn apply_pending_changes(&self, cancel: &CancellationToken) -> Result<(), Cancelled> {
        let changes: Vec<FileChange> = std::mem::take(&mut *self.pending_changes.lock());
        for change in changes {
            checkpoint(cancel)?;
            match change.kind {
                FileChangeKind::Deleted => self.remove_document(&change.uri),
                FileChangeKind::Created | FileChangeKind::Changed => {
                    match self.fs.read(&change.uri).await {
                        Ok(content) => {
                            self.update_document(&change.uri, &content.text, "", None);
                        }
                        Err(err) => {
                            warn!(uri = %change.uri, error = %err, "watched file unreadable; dropping");
                            self.remove_document(&change.uri);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Walks the workspace folders once, loading every in-scope document.
    async fn ensure_scanned(&self, cancel: &CancellationToken) -> Result<(), Cancelled> {
        if self.scanned.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let folders = self.workspace.lock().workspace_folders().to_vec();
        let config = self.current_config();

        let mut queue: Vec<Url> = folders.clone();
        while let Some(dir) = queue.pop() {
            checkpoint(cancel)?;
            let entries = match self.fs.read_directory(&dir).await {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(uri = %dir, error = %err, "scan skipped directory");
                    continue;
                }
            };
            for (name, file_type) in entries {
                let Some(child) = join_dir(&dir, &name) else {
                    continue;
                };
                match file_type {
                    FileType::Directory => queue.push(child),
                    FileType::File => {
                        if !has_candidate_extension(&name) || !config.in_scope(&child, &folders) {
                            continue;
                        }
                        if self.workspace.lock().contains(&child) {
                            continue;
                        }
                        checkpoint(cancel)?;
                        match self.fs.read(&child).await {
                            Ok(content) => {
                                self.update_document(&child, &content.text, "", None);
                            }
                            Err(err) => {
                                warn!(uri = %child, error = %err, "scan skipped file");
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn has_candidate_extension(name: &str) -> bool {
    name.rsplit_once('.')
        .is_some_and(|(_, ext)| matches!(ext, "yaml" | "yml" | "json"))
}

fn join_dir(dir: &Url, name: &str) -> Option<Url> {
    if dir.path().ends_with('/') {
        dir.join(name).ok()
    } else {
        let mut base = dir.clone();
        base.set_path(&format!("{}/", dir.path()));
        base.join(name).ok()
    }
}
