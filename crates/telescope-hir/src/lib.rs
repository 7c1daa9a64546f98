//! `telescope-hir` - Semantic model for OpenAPI workspaces.
//!
//! This crate owns everything Telescope knows about a workspace beyond raw
//! syntax:
//!
//! - **Document store**: Bounded LRU cache of parsed documents
//! - **Reference graph**: Cross-file `$ref` dependencies and dependents
//! - **Atom indexes**: Operations, components, and other rule-relevant
//!   locations extracted per document
//! - **Classification**: What kind of OpenAPI (fragment) document a file is
//! - **Diagnostics**: The diagnostic data model shared with the rule engine
//!
//! # Architecture
//!
//! [`Workspace`] is the single mutation owner: every document update flows
//! through it, which keeps the store, graph, operation-ID index, and root set
//! consistent and maintains the affected-URI set that drives cache
//! invalidation upstream.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod atoms;
pub mod cancel;
pub mod classify;
pub mod diagnostics;
pub mod graph;
pub mod operations;
pub mod resolve;
pub mod roots;
pub mod store;
pub mod uri;
pub mod workspace;

pub use atoms::{AtomIndex, AtomRef, ComponentAtom, ComponentKind, OperationAtom, RefAtom};
pub use cancel::{checkpoint, CancellationToken, Cancelled};
pub use classify::{identify_type, DocumentType};
pub use diagnostics::{
    dedup_diagnostics, sort_diagnostics, Diagnostic, DiagnosticTag, Position, Range,
    RelatedInformation, Severity, DIAGNOSTIC_SOURCE,
};
pub use graph::{RefEdge, ReferenceGraph};
pub use operations::{OperationIdIndex, OperationOccurrence};
pub use resolve::{deref, ResolveError, ResolvedRef};
pub use roots::RootResolver;
pub use store::{DocumentEntry, DocumentStore};
pub use workspace::{UpdateOutcome, Workspace};
