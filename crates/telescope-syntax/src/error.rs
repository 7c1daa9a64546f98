//! Error types shared by the IR builders and pointer utilities.

use thiserror::Error;

/// A source document could not be parsed.
///
/// No partial IR is ever produced alongside this error; callers drop any
/// previously cached state for the document.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ParseFailure {
    /// Human-readable parser message.
    pub message: String,
    /// Byte offset of the failure, when the parser reported one.
    pub offset: Option<u32>,
}

impl ParseFailure {
    /// Creates a parse failure without a source offset.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            offset: None,
        }
    }

    /// Creates a parse failure anchored at a byte offset.
    pub fn at(message: impl Into<String>, offset: u32) -> Self {
        Self {
            message: message.into(),
            offset: Some(offset),
        }
    }
}

/// A JSON Pointer did not address any node in the document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PointerError {
    /// No node exists at the given pointer.
    #[error("no node at pointer `{0}`")]
    NotFound(String),
}
