//! The uniform intermediate representation shared by both builders.

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use url::Url;

use crate::error::PointerError;
use crate::loc::Loc;
use crate::pointer;

/// The shape of an IR node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrKind {
    /// A mapping / JSON object.
    Object,
    /// A sequence / JSON array.
    Array,
    /// A string scalar.
    String,
    /// A numeric scalar.
    Number,
    /// A boolean scalar.
    Boolean,
    /// An explicit null (or empty YAML value).
    Null,
}

/// Scalar payload of a leaf node.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// String value.
    Str(String),
    /// Numeric value.
    Num(f64),
    /// Boolean value.
    Bool(bool),
    /// Null.
    Null,
}

impl Scalar {
    /// The string payload, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(value) => Some(value),
            _ => None,
        }
    }

    /// The numeric payload, if this is a number.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Num(value) => Some(*value),
            _ => None,
        }
    }

    /// The boolean payload, if this is a boolean.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

/// One node of the IR tree.
///
/// Invariants: `ptr` addresses this node from the document root, every
/// descendant shares the document's `uri`, and sibling spans are
/// non-decreasing in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct IrNode {
    /// JSON Pointer from the document root (`#` for the root itself).
    pub ptr: String,
    /// Node shape.
    pub kind: IrKind,
    /// The mapping key that introduced this node, when the parent is an object.
    pub key: Option<String>,
    /// Scalar payload for leaves.
    pub value: Option<Scalar>,
    /// Ordered children (array elements or object members).
    pub children: Vec<IrNode>,
    /// Source location.
    pub loc: Loc,
    /// Owning document URI.
    pub uri: Arc<Url>,
    /// For YAML aliases, the pointer of the anchored node (best-effort).
    pub alias_target_ptr: Option<String>,
}

impl IrNode {
    /// Looks up an object member by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&IrNode> {
        self.children
            .iter()
            .find(|child| child.key.as_deref() == Some(key))
    }

    /// Looks up an array element by index.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<&IrNode> {
        if self.kind == IrKind::Array {
            self.children.get(index)
        } else {
            None
        }
    }

    /// The string payload, if this is a string leaf.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.value.as_ref().and_then(Scalar::as_str)
    }

    /// The numeric payload, if this is a number leaf.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        self.value.as_ref().and_then(Scalar::as_f64)
    }

    /// The boolean payload, if this is a boolean leaf.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        self.value.as_ref().and_then(Scalar::as_bool)
    }

    /// Returns true for object nodes.
    #[must_use]
    pub fn is_object(&self) -> bool {
        self.kind == IrKind::Object
    }

    /// Returns true for array nodes.
    #[must_use]
    pub fn is_array(&self) -> bool {
        self.kind == IrKind::Array
    }

    /// Iterates `(key, child)` pairs of an object node.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &IrNode)> {
        self.children
            .iter()
            .filter_map(|child| Some((child.key.as_deref()?, child)))
    }

    /// Visits this node and every descendant in pre-order.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a IrNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    /// Visits this node and every descendant in post-order.
    pub fn walk_post<'a>(&'a self, visit: &mut impl FnMut(&'a IrNode)) {
        for child in &self.children {
            child.walk_post(visit);
        }
        visit(self);
    }

    /// The deepest node whose span contains `offset`.
    #[must_use]
    pub fn node_at_offset(&self, offset: u32) -> Option<&IrNode> {
        if !self.loc.contains(offset) {
            return None;
        }
        self.children
            .iter()
            .find_map(|child| child.node_at_offset(offset))
            .or(Some(self))
    }
}

/// Source format of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocFormat {
    /// YAML 1.2.
    Yaml,
    /// JSON, with comments and trailing commas tolerated.
    Json,
}

impl DocFormat {
    /// Markdown fence label for this format.
    #[must_use]
    pub fn fence_label(self) -> &'static str {
        match self {
            DocFormat::Yaml => "yaml",
            DocFormat::Json => "json",
        }
    }
}

/// Detected OpenAPI version of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecVersion {
    /// OpenAPI 3.0.x.
    V3_0,
    /// OpenAPI 3.1.x.
    V3_1,
    /// OpenAPI 3.2.x.
    V3_2,
    /// Not a recognized OpenAPI version.
    Unknown,
}

impl SpecVersion {
    /// Short display form (`"3.0"`, `"3.1"`, `"3.2"`, `"unknown"`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SpecVersion::V3_0 => "3.0",
            SpecVersion::V3_1 => "3.1",
            SpecVersion::V3_2 => "3.2",
            SpecVersion::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SpecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully parsed document: IR plus source metadata.
#[derive(Debug, Clone)]
pub struct IrDocument {
    /// Root IR node (`ptr == "#"`).
    pub root: IrNode,
    /// Document URI.
    pub uri: Arc<Url>,
    /// Source format.
    pub format: DocFormat,
    /// Detected OpenAPI version.
    pub version: SpecVersion,
    /// The raw source text.
    pub raw_text: String,
    /// SHA-1 of the raw text.
    pub hash: String,
    /// Parse timestamp, milliseconds since the Unix epoch.
    pub mtime_ms: u64,
}

impl IrDocument {
    /// Resolves a JSON Pointer (`#`, `#/a/0`, or bare `/a/0`) to a node.
    ///
    /// # Errors
    ///
    /// Returns [`PointerError::NotFound`] if any token fails to resolve.
    pub fn find_by_pointer(&self, ptr: &str) -> Result<&IrNode, PointerError> {
        let mut node = &self.root;
        for token in pointer::tokens(ptr) {
            node = match node.kind {
                IrKind::Object => node.get(&token),
                IrKind::Array => token.parse::<usize>().ok().and_then(|idx| node.at(idx)),
                _ => None,
            }
            .ok_or_else(|| PointerError::NotFound(ptr.to_string()))?;
        }
        Ok(node)
    }
}

/// Detects the OpenAPI version from a parsed root node.
///
/// Only full `3.<minor>.<patch>` strings are recognized; everything else is
/// [`SpecVersion::Unknown`].
#[must_use]
pub fn detect_version(root: &IrNode) -> SpecVersion {
    let Some(value) = root.get("openapi").and_then(IrNode::as_str) else {
        return SpecVersion::Unknown;
    };
    let Some(rest) = value.strip_prefix("3.") else {
        return SpecVersion::Unknown;
    };
    let mut parts = rest.splitn(2, '.');
    match (parts.next(), parts.next()) {
        (Some("0"), Some(_)) => SpecVersion::V3_0,
        (Some("1"), Some(_)) => SpecVersion::V3_1,
        (Some("2"), Some(_)) => SpecVersion::V3_2,
        _ => SpecVersion::Unknown,
    }
}

/// Drops all but the last occurrence of each duplicated object key.
pub(crate) fn dedup_object_keys(children: &mut Vec<IrNode>) {
    let mut last: rustc_hash::FxHashMap<String, usize> = rustc_hash::FxHashMap::default();
    for (idx, child) in children.iter().enumerate() {
        if let Some(key) = &child.key {
            last.insert(key.clone(), idx);
        }
    }
    if last.len() == children.len() {
        return;
    }
    let mut idx = 0;
    children.retain(|child| {
        let keep = child
            .key
            .as_ref()
            .is_none_or(|key| last.get(key) == Some(&idx));
        idx += 1;
        keep
    });
}

/// Milliseconds since the Unix epoch, for `IrDocument::mtime_ms`.
#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Renders the tree shape for snapshot tests (`kind ptr [= scalar]` lines).
#[must_use]
pub fn dump_tree(node: &IrNode) -> String {
    fn render(node: &IrNode, depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        let kind = format!("{:?}", node.kind).to_lowercase();
        out.push_str(&indent);
        out.push_str(&kind);
        out.push(' ');
        out.push_str(&node.ptr);
        match &node.value {
            Some(Scalar::Str(value)) => out.push_str(&format!(" = {value:?}")),
            Some(Scalar::Num(value)) => out.push_str(&format!(" = {value}")),
            Some(Scalar::Bool(value)) => out.push_str(&format!(" = {value}")),
            Some(Scalar::Null) => out.push_str(" = null"),
            None => {}
        }
        out.push('\n');
        for child in &node.children {
            render(child, depth + 1, out);
        }
    }
    let mut out = String::new();
    render(node, 0, &mut out);
    out
}
