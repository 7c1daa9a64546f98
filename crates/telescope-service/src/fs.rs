//! The abstract filesystem the core reads through.
//!
//! Two implementations ship with the crate: [`LocalFileSystem`] for real
//! disks (backed by `tokio::fs` and `notify`), and [`MemoryFileSystem`] as
//! the test double used throughout the integration suites.

use std::any::Any;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use notify::{RecursiveMode, Watcher};
use parking_lot::Mutex;
use telescope_syntax::hash::sha1_hex;
use thiserror::Error;
use tracing::warn;
use url::Url;

/// Filesystem errors.
#[derive(Debug, Clone, Error)]
pub enum FsError {
    /// The URI does not exist.
    #[error("not found: {uri}")]
    NotFound {
        /// The missing URI.
        uri: Url,
    },
    /// The URI scheme is not file-backed.
    #[error("unsupported uri `{uri}`")]
    Unsupported {
        /// The offending URI.
        uri: Url,
    },
    /// Any other I/O failure.
    #[error("{message}")]
    Io {
        /// The underlying error message.
        message: String,
    },
}

/// Result alias for filesystem operations.
pub type FsResult<T> = Result<T, FsError>;

/// The payload of a successful read.
#[derive(Debug, Clone)]
pub struct FileContent {
    /// File text (UTF-8, lossy-decoded).
    pub text: String,
    /// Modification time, milliseconds since the Unix epoch.
    pub mtime_ms: u64,
    /// SHA-1 of the text.
    pub hash: String,
}

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

/// Stat result.
#[derive(Debug, Clone, Copy)]
pub struct FileStat {
    /// Entry kind.
    pub file_type: FileType,
    /// Modification time, milliseconds since the Unix epoch.
    pub mtime_ms: u64,
    /// Size in bytes.
    pub size: u64,
}

/// What happened to a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChangeKind {
    /// The file appeared.
    Created,
    /// The file content changed.
    Changed,
    /// The file disappeared.
    Deleted,
}

/// A change event delivered to watch handlers.
#[derive(Debug, Clone)]
pub struct FileChange {
    /// The changed URI.
    pub uri: Url,
    /// What happened.
    pub kind: FileChangeKind,
}

/// Callback invoked on watched changes.
pub type WatchHandler = Arc<dyn Fn(FileChange) + Send + Sync>;

/// Scoped watcher registration; dropping it releases the watcher.
pub struct WatchHandle {
    guard: Option<Box<dyn Any + Send>>,
}

impl WatchHandle {
    /// A handle that owns nothing.
    #[must_use]
    pub fn noop() -> Self {
        Self { guard: None }
    }

    fn holding(guard: impl Any + Send) -> Self {
        Self {
            guard: Some(Box::new(guard)),
        }
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("active", &self.guard.is_some())
            .finish()
    }
}

/// The filesystem interface consumed by the core.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Reads a file.
    async fn read(&self, uri: &Url) -> FsResult<FileContent>;
    /// Stats a file or directory.
    async fn stat(&self, uri: &Url) -> FsResult<FileStat>;
    /// Lists a directory's entries.
    async fn read_directory(&self, uri: &Url) -> FsResult<Vec<(String, FileType)>>;
    /// Watches URIs (directories watch recursively) until the handle drops.
    fn watch(&self, uris: &[Url], handler: WatchHandler) -> FsResult<WatchHandle>;
}

fn to_path(uri: &Url) -> FsResult<PathBuf> {
    uri.to_file_path().map_err(|()| FsError::Unsupported {
        uri: uri.clone(),
    })
}

fn mtime_ms_of(metadata: &std::fs::Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|mtime| mtime.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |elapsed| elapsed.as_millis() as u64)
}

/// Disk-backed filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn read(&self, uri: &Url) -> FsResult<FileContent> {
        let path = to_path(uri)?;
        let bytes = tokio::fs::read(&path).await.map_err(|err| map_io(uri, &err))?;
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|err| map_io(uri, &err))?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let hash = sha1_hex(text.as_bytes());
        Ok(FileContent {
            text,
            mtime_ms: mtime_ms_of(&metadata),
            hash,
        })
    }

    async fn stat(&self, uri: &Url) -> FsResult<FileStat> {
        let path = to_path(uri)?;
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|err| map_io(uri, &err))?;
        Ok(FileStat {
            file_type: if metadata.is_dir() {
                FileType::Directory
            } else {
                FileType::File
            },
            mtime_ms: mtime_ms_of(&metadata),
            size: metadata.len(),
        })
    }

    async fn read_directory(&self, uri: &Url) -> FsResult<Vec<(String, FileType)>> {
        let path = to_path(uri)?;
        let mut reader = tokio::fs::read_dir(&path)
            .await
            .map_err(|err| map_io(uri, &err))?;
        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|err| map_io(uri, &err))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            let file_type = match entry.file_type().await {
                Ok(kind) if kind.is_dir() => FileType::Directory,
                Ok(_) => FileType::File,
                Err(_) => continue,
            };
            entries.push((name, file_type));
        }
        entries.sort();
        Ok(entries)
    }

    fn watch(&self, uris: &[Url], handler: WatchHandler) -> FsResult<WatchHandle> {
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
            let event = match result {
                Ok(event) => event,
                Err(err) => {
                    warn!(error = %err, "file watcher error");
                    return;
                }
            };
            let kind = match event.kind {
                notify::EventKind::Create(_) => FileChangeKind::Created,
                notify::EventKind::Modify(_) => FileChangeKind::Changed,
                notify::EventKind::Remove(_) => FileChangeKind::Deleted,
                _ => return,
            };
            for path in event.paths {
                if let Ok(uri) = Url::from_file_path(&path) {
                    handler(FileChange { uri, kind });
                }
            }
        })
        .map_err(|err| FsError::Io {
            message: err.to_string(),
        })?;

        for uri in uris {
            let path = to_path(uri)?;
            watcher
                .watch(&path, RecursiveMode::Recursive)
                .map_err(|err| FsError::Io {
                    message: err.to_string(),
                })?;
        }
        Ok(WatchHandle::holding(watcher))
    }
}

fn map_io(uri: &Url, err: &std::io::Error) -> FsError {
    if err.kind() == std::io::ErrorKind::NotFound {
        FsError::NotFound { uri: uri.clone() }
    } else {
        FsError::Io {
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct MemoryFile {
    text: String,
    mtime_ms: u64,
}

#[derive(Default)]
struct MemoryState {
    files: HashMap<Url, MemoryFile>,
    watchers: Vec<WatchHandler>,
    clock: u64,
}

/// In-memory filesystem for tests.
///
/// Mutations fire registered watch handlers synchronously, which mirrors how
/// the core serializes watcher callbacks onto its own executor.
#[derive(Clone, Default)]
pub struct MemoryFileSystem {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryFileSystem {
    /// Creates an empty filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or replaces a file and notifies watchers.
    pub fn write(&self, uri: &Url, text: impl Into<String>) {
        let (kind, handlers) = {
            let mut state = self.state.lock();
            state.clock += 1;
            let clock = state.clock;
            let existed = state
                .files
                .insert(
                    uri.clone(),
                    MemoryFile {
                        text: text.into(),
                        mtime_ms: clock,
                    },
                )
                .is_some();
            let kind = if existed {
                FileChangeKind::Changed
            } else {
                FileChangeKind::Created
            };
            (kind, state.watchers.clone())
        };
        for handler in handlers {
            handler(FileChange {
                uri: uri.clone(),
                kind,
            });
        }
    }

    /// Deletes a file and notifies watchers.
    pub fn delete(&self, uri: &Url) {
        let handlers = {
            let mut state = self.state.lock();
            if state.files.remove(uri).is_none() {
                return;
            }
            state.watchers.clone()
        };
        for handler in handlers {
            handler(FileChange {
                uri: uri.clone(),
                kind: FileChangeKind::Deleted,
            });
        }
    }
}

#[async_trait]
impl FileSystem for MemoryFileSystem {
    async fn read(&self, uri: &Url) -> FsResult<FileContent> {
        let state = self.state.lock();
        let file = state.files.get(uri).ok_or_else(|| FsError::NotFound {
            uri: uri.clone(),
        })?;
        Ok(FileContent {
            hash: sha1_hex(file.text.as_bytes()),
            text: file.text.clone(),
            mtime_ms: file.mtime_ms,
        })
    }

    async fn stat(&self, uri: &Url) -> FsResult<FileStat> {
        let state = self.state.lock();
        if let Some(file) = state.files.get(uri) {
            return Ok(FileStat {
                file_type: FileType::File,
                mtime_ms: file.mtime_ms,
                size: file.text.len() as u64,
            });
        }
        let prefix = directory_prefix(uri);
        if state.files.keys().any(|key| key.as_str().starts_with(&prefix)) {
            return Ok(FileStat {
                file_type: FileType::Directory,
                mtime_ms: 0,
                size: 0,
            });
        }
        Err(FsError::NotFound { uri: uri.clone() })
    }

    async fn read_directory(&self, uri: &Url) -> FsResult<Vec<(String, FileType)>> {
        let prefix = directory_prefix(uri);
        let state = self.state.lock();
        let mut entries: Vec<(String, FileType)> = Vec::new();
        for key in state.files.keys() {
            let Some(rest) = key.as_str().strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((dir, _)) => {
                    let entry = (dir.to_string(), FileType::Directory);
                    if !entries.contains(&entry) {
                        entries.push(entry);
                    }
                }
                None if !rest.is_empty() => entries.push((rest.to_string(), FileType::File)),
                None => {}
            }
        }
        if entries.is_empty() && !state.files.keys().any(|key| key.as_str().starts_with(&prefix)) {
            return Err(FsError::NotFound { uri: uri.clone() });
        }
        entries.sort();
        Ok(entries)
    }

    fn watch(&self, _uris: &[Url], handler: WatchHandler) -> FsResult<WatchHandle> {
        self.state.lock().watchers.push(handler);
        // Handlers live for the filesystem's lifetime; tests drop the whole
        // filesystem rather than individual registrations.
        Ok(WatchHandle::noop())
    }
}

fn directory_prefix(uri: &Url) -> String {
    let raw = uri.as_str();
    if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn memory_fs_read_and_stat() {
        let fs = MemoryFileSystem::new();
        let uri = url("file:///work/a.yaml");
        fs.write(&uri, "openapi: 3.1.0\n");

        let content = fs.read(&uri).await.unwrap();
        assert_eq!(content.text, "openapi: 3.1.0\n");
        assert_eq!(content.hash, sha1_hex(b"openapi: 3.1.0\n"));

        let stat = fs.stat(&uri).await.unwrap();
        assert_eq!(stat.file_type, FileType::File);

        let missing = fs.read(&url("file:///work/missing.yaml")).await;
        assert!(matches!(missing, Err(FsError::NotFound { .. })));
    }

    #[tokio::test]
    async fn memory_fs_lists_directories() {
        let fs = MemoryFileSystem::new();
        fs.write(&url("file:///work/a.yaml"), "a: 1\n");
        fs.write(&url("file:///work/sub/b.yaml"), "b: 1\n");

        let entries = fs.read_directory(&url("file:///work")).await.unwrap();
        assert_eq!(
            entries,
            vec![
                ("a.yaml".to_string(), FileType::File),
                ("sub".to_string(), FileType::Directory),
            ]
        );
    }

    #[tokio::test]
    async fn local_fs_reads_real_files() {
        let dir = std::env::temp_dir().join(format!("telescope-fs-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        let path = dir.join("spec.yaml");
        std::fs::write(&path, "openapi: 3.1.0\n").expect("write spec");

        let fs = LocalFileSystem;
        let uri = Url::from_file_path(&path).unwrap();
        let content = fs.read(&uri).await.unwrap();
        assert_eq!(content.text, "openapi: 3.1.0\n");
        assert_eq!(content.hash, sha1_hex(b"openapi: 3.1.0\n"));

        let dir_uri = Url::from_file_path(&dir).unwrap();
        let entries = fs.read_directory(&dir_uri).await.unwrap();
        assert!(entries
            .iter()
            .any(|(name, kind)| name == "spec.yaml" && *kind == FileType::File));

        let missing = Url::from_file_path(dir.join("gone.yaml")).unwrap();
        assert!(matches!(
            fs.read(&missing).await,
            Err(FsError::NotFound { .. })
        ));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn memory_fs_notifies_watchers() {
        let fs = MemoryFileSystem::new();
        let seen: Arc<Mutex<Vec<FileChange>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let _handle = fs
            .watch(
                &[],
                Arc::new(move |change| sink.lock().push(change)),
            )
            .unwrap();

        let uri = url("file:///work/a.yaml");
        fs.write(&uri, "a: 1\n");
        fs.write(&uri, "a: 2\n");
        fs.delete(&uri);

        let kinds: Vec<_> = seen.lock().iter().map(|change| change.kind).collect();
        assert_eq!(
            kinds,
            vec![
                FileChangeKind::Created,
                FileChangeKind::Changed,
                FileChangeKind::Deleted,
            ]
        );
    }
}
