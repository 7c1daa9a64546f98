//! The diagnostic data model.
//!
//! Severity, position, and range types are owned here rather than borrowed
//! from a transport crate; the transport converts at its boundary. Canonical
//! ordering and deduplication live next to the types because result-ID
//! stability depends on them.

use std::fmt;
use std::sync::Arc;

use url::Url;

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// A violation that makes the specification invalid.
    Error,
    /// A likely problem.
    Warning,
    /// Informational.
    Info,
    /// A style suggestion.
    Hint,
}

impl Severity {
    /// Wire form (`"error"`, `"warning"`, `"info"`, `"hint"`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Hint => "hint",
        }
    }

    /// Parses the wire form; `None` for anything unrecognized.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "error" | "err" => Some(Severity::Error),
            "warning" | "warn" => Some(Severity::Warning),
            "info" | "information" => Some(Severity::Info),
            "hint" => Some(Severity::Hint),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Zero-based line/column position. Columns count bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    /// Zero-based line.
    pub line: u32,
    /// Zero-based column, in bytes.
    pub character: u32,
}

impl Position {
    /// Creates a position.
    #[must_use]
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// Half-open range between two positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Range {
    /// Inclusive start.
    pub start: Position,
    /// Exclusive end.
    pub end: Position,
}

impl Range {
    /// Creates a range.
    #[must_use]
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start.line, self.start.character, self.end.line, self.end.character
        )
    }
}

/// A location in another (or the same) document related to a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedInformation {
    /// Document of the related location.
    pub uri: Arc<Url>,
    /// Range of the related location.
    pub range: Range,
    /// Message shown with the related location.
    pub message: String,
}

/// Extra presentation hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticTag {
    /// The flagged code is unused or unnecessary.
    Unnecessary,
    /// The flagged code is deprecated.
    Deprecated,
}

/// One reported problem.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Human-readable message.
    pub message: String,
    /// Severity.
    pub severity: Severity,
    /// Document the diagnostic applies to.
    pub uri: Arc<Url>,
    /// Range within the document.
    pub range: Range,
    /// Diagnostic code (the rule id for rule diagnostics).
    pub code: String,
    /// Producer name.
    pub source: String,
    /// Optional link to documentation for the code.
    pub code_description: Option<String>,
    /// Related locations (e.g. other occurrences of a duplicate).
    pub related_information: Vec<RelatedInformation>,
    /// Presentation hints.
    pub tags: Vec<DiagnosticTag>,
    /// Structured payload (fix proposals and the like).
    pub data: Option<serde_json::Value>,
}

/// Default `source` for diagnostics produced by this backend.
pub const DIAGNOSTIC_SOURCE: &str = "telescope";

impl Diagnostic {
    /// Creates a diagnostic with the default source and empty extras.
    pub fn new(
        uri: Arc<Url>,
        range: Range,
        severity: Severity,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            severity,
            uri,
            range,
            code: code.into(),
            source: DIAGNOSTIC_SOURCE.to_string(),
            code_description: None,
            related_information: Vec::new(),
            tags: Vec::new(),
            data: None,
        }
    }

    /// Adds a related location.
    #[must_use]
    pub fn with_related(mut self, uri: Arc<Url>, range: Range, message: impl Into<String>) -> Self {
        self.related_information.push(RelatedInformation {
            uri,
            range,
            message: message.into(),
        });
        self
    }

    /// Attaches a structured payload.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// The canonical ordering key: range start, range end, severity, code,
    /// message.
    #[must_use]
    pub fn sort_key(&self) -> (Position, Position, Severity, &str, &str) {
        (
            self.range.start,
            self.range.end,
            self.severity,
            &self.code,
            &self.message,
        )
    }

    /// The deduplication key used when merging overlapping snapshots.
    #[must_use]
    pub fn dedup_key(&self) -> (Range, Severity, &str, &str) {
        (self.range, self.severity, &self.code, &self.message)
    }

    /// Canonical single-line rendering, used for result-ID hashing.
    #[must_use]
    pub fn canonical_line(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.range, self.severity, self.code, self.source, self.message
        )
    }
}

/// Sorts diagnostics into canonical order.
pub fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}

/// Removes adjacent duplicates; call after [`sort_diagnostics`].
pub fn dedup_diagnostics(diagnostics: &mut Vec<Diagnostic>) {
    diagnostics.dedup_by(|a, b| a.dedup_key() == b.dedup_key());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diag(line: u32, code: &str, severity: Severity) -> Diagnostic {
        let uri = Arc::new(Url::parse("file:///a.yaml").unwrap());
        let range = Range::new(Position::new(line, 0), Position::new(line, 4));
        Diagnostic::new(uri, range, severity, code, format!("problem {code}"))
    }

    #[test]
    fn sorting_is_canonical() {
        let mut diagnostics = vec![
            diag(3, "b-rule", Severity::Warning),
            diag(1, "z-rule", Severity::Hint),
            diag(3, "a-rule", Severity::Warning),
            diag(3, "b-rule", Severity::Error),
        ];
        sort_diagnostics(&mut diagnostics);
        let codes: Vec<_> = diagnostics
            .iter()
            .map(|d| (d.range.start.line, d.code.as_str()))
            .collect();
        assert_eq!(
            codes,
            vec![(1, "z-rule"), (3, "b-rule"), (3, "a-rule"), (3, "b-rule")]
        );
        // Error sorts before Warning at the same range.
        assert_eq!(diagnostics[1].severity, Severity::Error);
    }

    #[test]
    fn dedup_drops_exact_repeats_only() {
        let mut diagnostics = vec![
            diag(1, "a", Severity::Warning),
            diag(1, "a", Severity::Warning),
            diag(1, "a", Severity::Error),
        ];
        sort_diagnostics(&mut diagnostics);
        dedup_diagnostics(&mut diagnostics);
        assert_eq!(diagnostics.len(), 2);
    }
}
