//! `telescope-service` - The language-service layer of Telescope.
//!
//! This crate assembles the lower layers into the interface an editor
//! transport consumes:
//!
//! - **FileSystem**: The abstract async filesystem the core reads through
//! - **Configuration**: `.telescope/config.yaml` resolution into rule sets
//!   and include/exclude patterns
//! - **Scheduler**: Per-document and workspace diagnostic queries with
//!   result-ID reuse, snapshot caching, bounded concurrency, and cancellation
//! - **LanguageService**: The facade owning all mutable state
//!
//! No JSON-RPC lives here; the transport converts these types at its own
//! boundary.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod fs;
pub mod scheduler;
pub mod service;

pub use config::{ConfigError, TelescopeConfig, CONFIG_RELATIVE_PATH};
pub use fs::{
    FileChange, FileChangeKind, FileContent, FileStat, FileSystem, FileType, FsError,
    LocalFileSystem, MemoryFileSystem, WatchHandle,
};
pub use scheduler::{DiagnosticsScheduler, DocumentReport, ReportKind, WorkspaceReportEntry};
pub use service::LanguageService;
