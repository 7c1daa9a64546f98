//! `telescope-ide` - Rule execution and editor features for OpenAPI workspaces.
//!
//! This crate provides the analysis features built on top of `telescope-hir`:
//!
//! - **Rule engine**: Visitor dispatch over document atoms with per-run rule
//!   state, crash isolation, and cancellation
//! - **Built-in rules**: Naming, shape, and cross-file consistency checks
//! - **Result IDs**: Stable identifiers so transports can answer
//!   "unchanged since last query" cheaply
//! - **Document links** and **`$ref` hover** previews
//!
//! # Architecture
//!
//! All features are pure functions over a read-only [`telescope_hir::Workspace`]
//! snapshot; nothing here mutates semantic state.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod engine;
pub mod fix;
pub mod hover;
pub mod links;
pub mod rules;

pub use engine::{
    result_id, run_rules, ProjectCtx, Rule, RuleCtx, RuleKind, RuleMeta, RuleScope, RuleSet,
    RuleSpec,
};
pub use fix::{FilePatch, PatchOp};
pub use hover::{hover_for_ref, Hover};
pub use links::{document_links, DocumentLink};
pub use rules::{default_rule_set, rule_factory};
