//! `telescope-syntax` - Parsing and intermediate representation for OpenAPI sources.
//!
//! This crate provides the low-level layer of the Telescope pipeline:
//!
//! - **IR builders**: Lower YAML and JSON source text into a uniform tree of
//!   [`IrNode`]s with byte-accurate locations
//! - **JSON Pointers**: RFC 6901 addressing of every node in a document
//! - **Line index**: Cached line-start offsets for offset/position conversion
//!
//! # Design Principles
//!
//! Both builders produce the same [`IrDocument`] shape, so everything above
//! this crate (atom extraction, reference graphs, rules) is format-agnostic:
//!
//! - **Byte-accurate**: Every node records the byte range of its source,
//!   including separate key and value sub-ranges for object members
//! - **Addressable**: Every node carries the JSON Pointer that reaches it
//!   from the document root
//! - **All-or-nothing**: A parse error yields a [`ParseFailure`], never a
//!   partial tree
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use telescope_syntax::{build_yaml, IrKind};
//! use url::Url;
//!
//! let uri = Arc::new(Url::parse("file:///petstore.yaml").unwrap());
//! let doc = build_yaml(uri, "openapi: 3.1.0\ninfo:\n  title: Pets\n").unwrap();
//!
//! let title = doc.find_by_pointer("#/info/title").unwrap();
//! assert_eq!(title.kind, IrKind::String);
//! assert_eq!(title.as_str(), Some("Pets"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod hash;
pub mod ir;
pub mod json;
pub mod line_index;
pub mod loc;
pub mod pointer;
pub mod yaml;

mod error;

pub use error::{ParseFailure, PointerError};
pub use ir::{DocFormat, IrDocument, IrKind, IrNode, Scalar, SpecVersion};
pub use json::build_json;
pub use line_index::LineIndex;
pub use loc::Loc;
pub use yaml::build_yaml;
