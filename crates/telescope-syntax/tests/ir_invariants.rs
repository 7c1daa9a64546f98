use std::sync::Arc;

use expect_test::expect;
use telescope_syntax::ir::dump_tree;
use telescope_syntax::{build_json, build_yaml, IrDocument, IrNode};
use url::Url;

const PETSTORE_YAML: &str = "\
openapi: 3.1.0
info:
  title: Pets
  version: \"1.0\"
paths:
  /pets:
    get:
      operationId: listPets
";

fn yaml_doc(text: &str) -> IrDocument {
    let uri = Arc::new(Url::parse("file:///spec.yaml").unwrap());
    build_yaml(uri, text).expect("valid yaml")
}

fn json_doc(text: &str) -> IrDocument {
    let uri = Arc::new(Url::parse("file:///spec.json").unwrap());
    build_json(uri, text).expect("valid json")
}

/// Every node's pointer resolves back to that node.
fn assert_pointer_roundtrip(doc: &IrDocument) {
    doc.root.walk(&mut |node| {
        let found = doc
            .find_by_pointer(&node.ptr)
            .unwrap_or_else(|_| panic!("pointer {} did not resolve", node.ptr));
        assert_eq!(found.ptr, node.ptr);
        assert_eq!(found.loc, node.loc);
    });
}

/// Sibling spans never overlap and appear in document order.
fn assert_offset_monotonicity(node: &IrNode) {
    for pair in node.children.windows(2) {
        assert!(
            pair[0].loc.end <= pair[1].loc.start,
            "sibling spans overlap: {} [{}..{}] then {} [{}..{}]",
            pair[0].ptr,
            pair[0].loc.start,
            pair[0].loc.end,
            pair[1].ptr,
            pair[1].loc.start,
            pair[1].loc.end,
        );
    }
    for child in &node.children {
        assert_offset_monotonicity(child);
    }
}

#[test]
fn yaml_pointer_roundtrip() {
    let doc = yaml_doc(PETSTORE_YAML);
    assert_pointer_roundtrip(&doc);
}

#[test]
fn yaml_offsets_are_monotone() {
    let doc = yaml_doc(PETSTORE_YAML);
    assert_offset_monotonicity(&doc.root);
}

#[test]
fn json_pointer_roundtrip() {
    let doc = json_doc(
        r#"{"openapi": "3.0.1", "paths": {"/pets": {"get": {"operationId": "listPets"}}}}"#,
    );
    assert_pointer_roundtrip(&doc);
    assert_offset_monotonicity(&doc.root);
}

#[test]
fn yaml_tree_shape() {
    let doc = yaml_doc(PETSTORE_YAML);
    expect![[r#"
        object #
          string #/openapi = "3.1.0"
          object #/info
            string #/info/title = "Pets"
            string #/info/version = "1.0"
          object #/paths
            object #/paths/~1pets
              object #/paths/~1pets/get
                string #/paths/~1pets/get/operationId = "listPets"
    "#]]
    .assert_eq(&dump_tree(&doc.root));
}

#[test]
fn yaml_and_json_agree_on_shape() {
    let yaml = yaml_doc("a:\n  - 1\n  - true\nb: null\n");
    let json = json_doc(r#"{"a": [1, true], "b": null}"#);
    assert_eq!(dump_tree(&yaml.root), dump_tree(&json.root));
}

#[test]
fn version_detection_requires_patch_segment() {
    assert_eq!(yaml_doc("openapi: 3.1.0\n").version.as_str(), "3.1");
    assert_eq!(yaml_doc("openapi: 3.2.1\n").version.as_str(), "3.2");
    assert_eq!(yaml_doc("openapi: \"3.1\"\n").version.as_str(), "unknown");
    assert_eq!(yaml_doc("swagger: \"2.0\"\n").version.as_str(), "unknown");
}
