//! Atom extraction: the per-document index of rule-relevant IR locations.
//!
//! Atoms are derived, read-only views into the IR. They are rebuilt from
//! scratch on every document update; nothing here mutates the tree.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use telescope_syntax::{pointer, IrDocument, IrNode};
use url::Url;

use crate::classify::{DocumentType, HTTP_METHODS};

/// An HTTP operation, keyed by path template and method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationAtom {
    /// Owning document.
    pub uri: Arc<Url>,
    /// Path template string (empty for operations in path-item fragments).
    pub path: String,
    /// Lowercased HTTP method key.
    pub method: String,
    /// Pointer to the operation object.
    pub pointer: String,
    /// `operationId`, when present and a string.
    pub operation_id: Option<String>,
}

/// The component section a named component lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// `components.schemas`.
    Schemas,
    /// `components.parameters`.
    Parameters,
    /// `components.responses`.
    Responses,
    /// `components.requestBodies`.
    RequestBodies,
    /// `components.headers`.
    Headers,
    /// `components.securitySchemes`.
    SecuritySchemes,
    /// `components.examples`.
    Examples,
    /// `components.links`.
    Links,
    /// `components.callbacks`.
    Callbacks,
}

impl ComponentKind {
    /// All kinds, in specification order.
    pub const ALL: &'static [ComponentKind] = &[
        ComponentKind::Schemas,
        ComponentKind::Parameters,
        ComponentKind::Responses,
        ComponentKind::RequestBodies,
        ComponentKind::Headers,
        ComponentKind::SecuritySchemes,
        ComponentKind::Examples,
        ComponentKind::Links,
        ComponentKind::Callbacks,
    ];

    /// The section key under `components`.
    #[must_use]
    pub fn section_key(self) -> &'static str {
        match self {
            ComponentKind::Schemas => "schemas",
            ComponentKind::Parameters => "parameters",
            ComponentKind::Responses => "responses",
            ComponentKind::RequestBodies => "requestBodies",
            ComponentKind::Headers => "headers",
            ComponentKind::SecuritySchemes => "securitySchemes",
            ComponentKind::Examples => "examples",
            ComponentKind::Links => "links",
            ComponentKind::Callbacks => "callbacks",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.section_key())
    }
}

/// A named component entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentAtom {
    /// Owning document.
    pub uri: Arc<Url>,
    /// Component section.
    pub kind: ComponentKind,
    /// Component name (the map key).
    pub name: String,
    /// Pointer to the component value.
    pub pointer: String,
}

/// A plain addressed location (schema, parameter, response, …).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomRef {
    /// Owning document.
    pub uri: Arc<Url>,
    /// Pointer to the node.
    pub pointer: String,
}

/// A `$ref` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefAtom {
    /// Owning document.
    pub uri: Arc<Url>,
    /// Pointer to the `$ref` member itself.
    pub pointer: String,
    /// The raw reference string.
    pub raw: String,
}

/// Everything a document contributes to rule execution.
#[derive(Debug, Clone, Default)]
pub struct AtomIndex {
    /// HTTP operations (`paths.*.<method>`, plus fragment top-level methods).
    pub operations: Vec<OperationAtom>,
    /// Named components, grouped per section in declaration order.
    pub components: IndexMap<ComponentKind, Vec<ComponentAtom>>,
    /// Path items under `paths`.
    pub path_items: Vec<AtomRef>,
    /// Schema objects, structural plus `components.schemas`.
    pub schemas: Vec<AtomRef>,
    /// Parameter objects.
    pub parameters: Vec<AtomRef>,
    /// Response objects.
    pub responses: Vec<AtomRef>,
    /// Request bodies.
    pub request_bodies: Vec<AtomRef>,
    /// Header objects.
    pub headers: Vec<AtomRef>,
    /// Media-type objects (members of `content` maps).
    pub media_types: Vec<AtomRef>,
    /// Security requirement entries (members of `security` arrays).
    pub security_requirements: Vec<AtomRef>,
    /// Example objects.
    pub examples: Vec<AtomRef>,
    /// Link objects.
    pub links: Vec<AtomRef>,
    /// Callback objects.
    pub callbacks: Vec<AtomRef>,
    /// Every `$ref` member.
    pub references: Vec<RefAtom>,
}

impl AtomIndex {
    /// Components of one section, in declaration order.
    pub fn components_of(&self, kind: ComponentKind) -> impl Iterator<Item = &ComponentAtom> {
        self.components.get(&kind).into_iter().flatten()
    }
}

/// Extracts the atom index for one parsed document.
#[must_use]
pub fn extract_atoms(doc: &IrDocument, doc_type: DocumentType) -> AtomIndex {
    let mut atoms = AtomIndex::default();
    let uri = &doc.uri;

    collect_operations(doc, doc_type, &mut atoms);
    collect_components(doc, &mut atoms);
    collect_positional(&doc.root, uri, &mut atoms);

    atoms
}

fn collect_operations(doc: &IrDocument, doc_type: DocumentType, atoms: &mut AtomIndex) {
    let uri = &doc.uri;
    if let Some(paths) = doc.root.get("paths").filter(|node| node.is_object()) {
        for (path, item) in paths.entries() {
            atoms.path_items.push(AtomRef {
                uri: Arc::clone(uri),
                pointer: item.ptr.clone(),
            });
            if !item.is_object() {
                continue;
            }
            for (method, operation) in item.entries() {
                if HTTP_METHODS.contains(&method) && operation.is_object() {
                    atoms.operations.push(operation_atom(uri, path, method, operation));
                }
            }
        }
    }

    // A path-item fragment carries operations without a surrounding template.
    if doc_type == DocumentType::PathItem {
        for (method, operation) in doc.root.entries() {
            if HTTP_METHODS.contains(&method) && operation.is_object() {
                atoms.operations.push(operation_atom(uri, "", method, operation));
            }
        }
    }
}

fn operation_atom(uri: &Arc<Url>, path: &str, method: &str, node: &IrNode) -> OperationAtom {
    OperationAtom {
        uri: Arc::clone(uri),
        path: path.to_string(),
        method: method.to_string(),
        pointer: node.ptr.clone(),
        operation_id: node
            .get("operationId")
            .and_then(IrNode::as_str)
            .map(str::to_string),
    }
}

fn collect_components(doc: &IrDocument, atoms: &mut AtomIndex) {
    let Some(components) = doc.root.get("components").filter(|node| node.is_object()) else {
        return;
    };
    let uri = &doc.uri;
    for kind in ComponentKind::ALL {
        let Some(section) = components
            .get(kind.section_key())
            .filter(|node| node.is_object())
        else {
            continue;
        };
        for (name, value) in section.entries() {
            atoms.components.entry(*kind).or_default().push(ComponentAtom {
                uri: Arc::clone(uri),
                kind: *kind,
                name: name.to_string(),
                pointer: value.ptr.clone(),
            });
            let flat = AtomRef {
                uri: Arc::clone(uri),
                pointer: value.ptr.clone(),
            };
            match kind {
                ComponentKind::Schemas => atoms.schemas.push(flat),
                ComponentKind::Parameters => atoms.parameters.push(flat),
                ComponentKind::Responses => atoms.responses.push(flat),
                ComponentKind::RequestBodies => atoms.request_bodies.push(flat),
                ComponentKind::Headers => atoms.headers.push(flat),
                ComponentKind::Examples => atoms.examples.push(flat),
                ComponentKind::Links => atoms.links.push(flat),
                ComponentKind::Callbacks => atoms.callbacks.push(flat),
                ComponentKind::SecuritySchemes => {}
            }
        }
    }
}

/// True for the `components.<kind>` container maps themselves, whose members
/// were already indexed by [`collect_components`].
fn is_component_section(node: &IrNode) -> bool {
    let tokens = pointer::tokens(&node.ptr);
    tokens.len() == 2 && tokens[0] == "components"
}

fn collect_positional(node: &IrNode, uri: &Arc<Url>, atoms: &mut AtomIndex) {
    if node.key.as_deref() == Some("$ref") {
        if let Some(raw) = node.as_str() {
            atoms.references.push(RefAtom {
                uri: Arc::clone(uri),
                pointer: node.ptr.clone(),
                raw: raw.to_string(),
            });
        }
    }

    if !is_component_section(node) {
        match (node.key.as_deref(), node.is_object(), node.is_array()) {
            (Some("schema" | "items" | "additionalProperties"), true, _) => {
                push_ref(&mut atoms.schemas, uri, node);
            }
            (Some("properties"), true, _) => {
                for (_, child) in node.entries() {
                    if child.is_object() {
                        push_ref(&mut atoms.schemas, uri, child);
                    }
                }
            }
            (Some("allOf" | "oneOf" | "anyOf"), _, true) => {
                for child in &node.children {
                    if child.is_object() {
                        push_ref(&mut atoms.schemas, uri, child);
                    }
                }
            }
            (Some("parameters"), _, true) => {
                for child in &node.children {
                    if child.is_object() {
                        push_ref(&mut atoms.parameters, uri, child);
                    }
                }
            }
            (Some("responses"), true, _) => {
                for (_, child) in node.entries() {
                    push_ref(&mut atoms.responses, uri, child);
                }
            }
            (Some("requestBody"), true, _) => push_ref(&mut atoms.request_bodies, uri, node),
            (Some("headers"), true, _) => {
                for (_, child) in node.entries() {
                    push_ref(&mut atoms.headers, uri, child);
                }
            }
            (Some("content"), true, _) => {
                for (_, child) in node.entries() {
                    push_ref(&mut atoms.media_types, uri, child);
                }
            }
            (Some("security"), _, true) => {
                for child in &node.children {
                    push_ref(&mut atoms.security_requirements, uri, child);
                }
            }
            (Some("examples"), true, _) => {
                for (_, child) in node.entries() {
                    if child.is_object() {
                        push_ref(&mut atoms.examples, uri, child);
                    }
                }
            }
            (Some("links"), true, _) => {
                for (_, child) in node.entries() {
                    push_ref(&mut atoms.links, uri, child);
                }
            }
            (Some("callbacks"), true, _) => {
                for (_, child) in node.entries() {
                    push_ref(&mut atoms.callbacks, uri, child);
                }
            }
            _ => {}
        }
    }

    for child in &node.children {
        collect_positional(child, uri, atoms);
    }
}

fn push_ref(sink: &mut Vec<AtomRef>, uri: &Arc<Url>, node: &IrNode) {
    sink.push(AtomRef {
        uri: Arc::clone(uri),
        pointer: node.ptr.clone(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::identify_type;
    use telescope_syntax::build_yaml;

    fn atoms_for(text: &str) -> AtomIndex {
        let uri = Arc::new(Url::parse("file:///api.yaml").unwrap());
        let doc = build_yaml(uri, text).unwrap();
        let doc_type = identify_type(&doc.root);
        extract_atoms(&doc, doc_type)
    }

    const SPEC: &str = "\
openapi: 3.0.0
paths:
  /pets:
    get:
      operationId: listPets
      parameters:
        - name: limit
          in: query
          schema:
            type: integer
      responses:
        \"200\":
          description: ok
          content:
            application/json:
              schema:
                $ref: '#/components/schemas/Pets'
components:
  schemas:
    Pets:
      type: array
      items:
        type: object
";

    #[test]
    fn operations_are_keyed_by_path_and_method() {
        let atoms = atoms_for(SPEC);
        assert_eq!(atoms.operations.len(), 1);
        let op = &atoms.operations[0];
        assert_eq!(op.path, "/pets");
        assert_eq!(op.method, "get");
        assert_eq!(op.operation_id.as_deref(), Some("listPets"));
        assert_eq!(op.pointer, "#/paths/~1pets/get");
    }

    #[test]
    fn components_and_flat_lists_are_extracted() {
        let atoms = atoms_for(SPEC);
        let schemas: Vec<_> = atoms.components_of(ComponentKind::Schemas).collect();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].name, "Pets");

        // components.schemas.Pets, its items, parameter schema, media-type schema
        assert_eq!(atoms.schemas.len(), 4);
        assert_eq!(atoms.parameters.len(), 1);
        assert_eq!(atoms.responses.len(), 1);
        assert_eq!(atoms.media_types.len(), 1);
    }

    #[test]
    fn references_record_raw_strings() {
        let atoms = atoms_for(SPEC);
        assert_eq!(atoms.references.len(), 1);
        assert_eq!(atoms.references[0].raw, "#/components/schemas/Pets");
    }

    #[test]
    fn path_item_fragments_contribute_operations() {
        let atoms = atoms_for("get:\n  operationId: fromFragment\n  responses: {}\n");
        assert_eq!(atoms.operations.len(), 1);
        assert_eq!(atoms.operations[0].path, "");
        assert_eq!(
            atoms.operations[0].operation_id.as_deref(),
            Some("fromFragment")
        );
    }
}
