//! Document-type classification.
//!
//! A deterministic decision tree over an already-parsed root node, highest
//! priority first. Fragments of a split specification (a lone path item, a
//! bare schema, …) are recognized by their shape so rules can treat them
//! appropriately even before any root references them.

use std::fmt;

use telescope_syntax::{IrKind, IrNode};

/// HTTP method keys recognized in path items.
pub const HTTP_METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace", "query",
];

const ROOT_KEYS: &[&str] = &[
    "info",
    "paths",
    "components",
    "webhooks",
    "servers",
    "security",
    "tags",
    "externalDocs",
];

const JSON_SCHEMA_KEYS: &[&str] = &["$schema", "$id", "$defs", "definitions"];

const SCHEMA_KEYS: &[&str] = &[
    "type", "properties", "allOf", "oneOf", "anyOf", "items", "$ref", "enum",
];

const SECURITY_SCHEME_TYPES: &[&str] = &["apiKey", "http", "oauth2", "openIdConnect", "mutualTLS"];

/// The kind of document a file represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentType {
    /// A top-level OpenAPI specification.
    Root,
    /// A path-item fragment.
    PathItem,
    /// An operation fragment.
    Operation,
    /// A components-section fragment.
    Components,
    /// A schema fragment.
    Schema,
    /// A parameter fragment.
    Parameter,
    /// A response fragment.
    Response,
    /// A request-body fragment.
    RequestBody,
    /// A header fragment.
    Header,
    /// A security-scheme fragment.
    SecurityScheme,
    /// An example fragment.
    Example,
    /// A link fragment.
    Link,
    /// A callback fragment.
    Callback,
    /// A standalone JSON Schema document.
    JsonSchema,
    /// Not recognizably OpenAPI-shaped.
    Unknown,
}

impl DocumentType {
    /// Kebab-case display form, matching the wire vocabulary.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::Root => "root",
            DocumentType::PathItem => "path-item",
            DocumentType::Operation => "operation",
            DocumentType::Components => "components",
            DocumentType::Schema => "schema",
            DocumentType::Parameter => "parameter",
            DocumentType::Response => "response",
            DocumentType::RequestBody => "request-body",
            DocumentType::Header => "header",
            DocumentType::SecurityScheme => "security-scheme",
            DocumentType::Example => "example",
            DocumentType::Link => "link",
            DocumentType::Callback => "callback",
            DocumentType::JsonSchema => "json-schema",
            DocumentType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a parsed root node.
#[must_use]
pub fn identify_type(root: &IrNode) -> DocumentType {
    if root.kind != IrKind::Object {
        return DocumentType::Unknown;
    }

    if version_marker(root) {
        return DocumentType::Root;
    }
    if has_any_key(root, ROOT_KEYS) {
        return DocumentType::Root;
    }
    if has_any_key(root, JSON_SCHEMA_KEYS) {
        return DocumentType::JsonSchema;
    }
    if HTTP_METHODS
        .iter()
        .any(|method| root.get(method).is_some_and(IrNode::is_object))
    {
        return DocumentType::PathItem;
    }
    if is_operation(root) {
        return DocumentType::Operation;
    }
    if is_parameter(root) {
        return DocumentType::Parameter;
    }
    if is_response(root) {
        return DocumentType::Response;
    }
    if is_request_body(root) {
        return DocumentType::RequestBody;
    }
    if is_header(root) {
        return DocumentType::Header;
    }
    if is_security_scheme(root) {
        return DocumentType::SecurityScheme;
    }
    if root.get("value").is_some() || root.get("externalValue").is_some() {
        return DocumentType::Example;
    }
    if is_link(root) {
        return DocumentType::Link;
    }
    if root
        .entries()
        .any(|(key, _)| key.contains('{') && key.contains('}'))
    {
        return DocumentType::Callback;
    }
    if has_any_key(root, SCHEMA_KEYS) {
        return DocumentType::Schema;
    }
    DocumentType::Unknown
}

fn version_marker(root: &IrNode) -> bool {
    let openapi = root
        .get("openapi")
        .and_then(IrNode::as_str)
        .is_some_and(|value| value.starts_with("3."));
    let swagger = root
        .get("swagger")
        .and_then(IrNode::as_str)
        .is_some_and(|value| value.starts_with("2."));
    openapi || swagger
}

fn has_any_key(node: &IrNode, keys: &[&str]) -> bool {
    keys.iter().any(|key| node.get(key).is_some())
}

fn is_operation(root: &IrNode) -> bool {
    let Some(responses) = root.get("responses").filter(|node| node.is_object()) else {
        return false;
    };
    let has_status_key = responses
        .entries()
        .any(|(key, _)| key == "default" || is_status_code_like(key));
    has_status_key
        || root.get("operationId").is_some_and(|n| n.as_str().is_some())
        || root.get("summary").is_some_and(|n| n.as_str().is_some())
}

/// `2xx`-style keys: three characters, digits or `X`, leading 1-5.
fn is_status_code_like(key: &str) -> bool {
    let bytes = key.as_bytes();
    bytes.len() == 3
        && (b'1'..=b'5').contains(&bytes[0])
        && bytes[1..]
            .iter()
            .all(|byte| byte.is_ascii_digit() || *byte == b'X' || *byte == b'x')
}

fn is_parameter(root: &IrNode) -> bool {
    root.get("name").is_some()
        && root
            .get("in")
            .and_then(IrNode::as_str)
            .is_some_and(|place| matches!(place, "query" | "header" | "path" | "cookie"))
}

fn is_response(root: &IrNode) -> bool {
    root.get("description").is_some()
        && (root.get("content").is_some_and(IrNode::is_object)
            || root.get("headers").is_some_and(IrNode::is_object))
}

fn is_request_body(root: &IrNode) -> bool {
    root.get("content").is_some()
        && root.get("headers").is_none()
        && (root.get("required").is_some_and(|n| n.as_bool().is_some())
            || root
                .get("description")
                .is_some_and(|n| n.as_str().is_some()))
}

fn is_header(root: &IrNode) -> bool {
    root.get("schema").is_some_and(IrNode::is_object)
        && root
            .get("deprecated")
            .is_some_and(|n| n.as_bool().is_some())
}

fn is_security_scheme(root: &IrNode) -> bool {
    root.get("type")
        .and_then(IrNode::as_str)
        .is_some_and(|kind| SECURITY_SCHEME_TYPES.contains(&kind))
        || root.get("flows").is_some_and(IrNode::is_object)
}

fn is_link(root: &IrNode) -> bool {
    root.get("responses").is_none()
        && (root
            .get("operationRef")
            .is_some_and(|n| n.as_str().is_some())
            || root
                .get("operationId")
                .is_some_and(|n| n.as_str().is_some()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use telescope_syntax::build_yaml;
    use url::Url;

    fn classify(text: &str) -> DocumentType {
        let uri = Arc::new(Url::parse("file:///doc.yaml").unwrap());
        let doc = build_yaml(uri, text).unwrap();
        identify_type(&doc.root)
    }

    #[test]
    fn version_markers_win() {
        assert_eq!(classify("openapi: 3.1.0\n"), DocumentType::Root);
        assert_eq!(classify("swagger: \"2.0\"\n"), DocumentType::Root);
    }

    #[test]
    fn top_level_root_keys() {
        assert_eq!(classify("paths: {}\n"), DocumentType::Root);
        assert_eq!(classify("info:\n  title: t\n"), DocumentType::Root);
    }

    #[test]
    fn json_schema_markers_beat_schema_keys() {
        assert_eq!(
            classify("$id: https://example.com/s\ntype: object\n"),
            DocumentType::JsonSchema
        );
    }

    #[test]
    fn path_item_requires_object_method_value() {
        assert_eq!(
            classify("get:\n  operationId: listPets\n"),
            DocumentType::PathItem
        );
        assert_eq!(classify("get: yes-please\n"), DocumentType::Unknown);
    }

    #[test]
    fn operation_needs_responses_plus_marker() {
        assert_eq!(
            classify("operationId: listPets\nresponses:\n  \"200\":\n    description: ok\n"),
            DocumentType::Operation
        );
        assert_eq!(
            classify("responses:\n  \"200\":\n    description: ok\n"),
            DocumentType::Operation
        );
    }

    #[test]
    fn fragment_shapes() {
        assert_eq!(classify("name: petId\nin: path\n"), DocumentType::Parameter);
        assert_eq!(
            classify("description: ok\ncontent: {}\n"),
            DocumentType::Response
        );
        assert_eq!(
            classify("content: {}\nrequired: true\n"),
            DocumentType::RequestBody
        );
        assert_eq!(
            classify("schema: {}\ndeprecated: false\n"),
            DocumentType::Header
        );
        assert_eq!(classify("type: oauth2\n"), DocumentType::SecurityScheme);
        assert_eq!(classify("value: 42\n"), DocumentType::Example);
        assert_eq!(classify("operationId: getPet\n"), DocumentType::Link);
        assert_eq!(
            classify("\"{$request.body#/url}\":\n  post: {}\n"),
            DocumentType::Callback
        );
        assert_eq!(
            classify("type: object\nproperties: {}\n"),
            DocumentType::Schema
        );
    }

    #[test]
    fn unrecognized_shapes_are_unknown() {
        assert_eq!(classify("x: 1\n"), DocumentType::Unknown);
        assert_eq!(classify("- 1\n- 2\n"), DocumentType::Unknown);
    }
}
