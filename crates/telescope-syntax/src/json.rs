//! JSON → IR lowering.
//!
//! Comments and trailing commas are tolerated so editor-adjacent files
//! (`*.jsonc`-flavored specs) parse cleanly. The AST carries byte ranges, so
//! no span recovery is needed here.

use std::sync::Arc;

use jsonc_parser::ast::{ObjectPropName, Value};
use jsonc_parser::{parse_to_ast, CollectOptions, ParseOptions};
use url::Url;

use crate::error::ParseFailure;
use crate::ir::{self, DocFormat, IrDocument, IrKind, IrNode, Scalar};
use crate::loc::Loc;
use crate::pointer;

/// Parses JSON text into an [`IrDocument`].
///
/// Duplicate object keys keep the last value and do not fail the parse.
///
/// # Errors
///
/// Returns [`ParseFailure`] on syntax errors; no partial IR is produced.
pub fn build_json(uri: Arc<Url>, text: &str) -> Result<IrDocument, ParseFailure> {
    let parse_options = ParseOptions {
        allow_comments: true,
        allow_trailing_commas: true,
        ..ParseOptions::default()
    };
    let result = parse_to_ast(text, &CollectOptions::default(), &parse_options)
        .map_err(|err| ParseFailure::at(err.to_string(), err.range().start as u32))?;

    let root = match result.value {
        Some(value) => lower_value(&value, pointer::ROOT.to_string(), &uri),
        // Whitespace/comment-only input: a null root the classifier rejects.
        None => IrNode {
            ptr: pointer::ROOT.to_string(),
            kind: IrKind::Null,
            key: None,
            value: Some(Scalar::Null),
            children: Vec::new(),
            loc: Loc::default(),
            uri: Arc::clone(&uri),
            alias_target_ptr: None,
        },
    };

    let version = ir::detect_version(&root);
    Ok(IrDocument {
        root,
        uri,
        format: DocFormat::Json,
        version,
        hash: crate::hash::sha1_hex(text.as_bytes()),
        mtime_ms: ir::now_ms(),
        raw_text: text.to_string(),
    })
}

fn lower_value(value: &Value<'_>, ptr: String, uri: &Arc<Url>) -> IrNode {
    match value {
        Value::Object(object) => {
            let mut children: Vec<IrNode> = Vec::with_capacity(object.properties.len());
            for prop in &object.properties {
                let (key_text, key_range) = match &prop.name {
                    ObjectPropName::String(lit) => (lit.value.to_string(), lit.range),
                    ObjectPropName::Word(word) => (word.value.to_string(), word.range),
                };
                let child_ptr = pointer::append(&ptr, &key_text);
                let mut child = lower_value(&prop.value, child_ptr, uri);
                let (val_start, val_end) = (child.loc.start, child.loc.end);
                child.key = Some(key_text);
                child.loc = Loc {
                    start: prop.range.start as u32,
                    end: prop.range.end as u32,
                    key_start: Some(key_range.start as u32),
                    key_end: Some(key_range.end as u32),
                    val_start: Some(val_start),
                    val_end: Some(val_end),
                };
                children.push(child);
            }
            ir::dedup_object_keys(&mut children);
            IrNode {
                ptr,
                kind: IrKind::Object,
                key: None,
                value: None,
                children,
                loc: Loc::span(object.range.start as u32, object.range.end as u32),
                uri: Arc::clone(uri),
                alias_target_ptr: None,
            }
        }
        Value::Array(array) => {
            let children = array
                .elements
                .iter()
                .enumerate()
                .map(|(idx, element)| {
                    lower_value(element, pointer::append_index(&ptr, idx), uri)
                })
                .collect();
            IrNode {
                ptr,
                kind: IrKind::Array,
                key: None,
                value: None,
                children,
                loc: Loc::span(array.range.start as u32, array.range.end as u32),
                uri: Arc::clone(uri),
                alias_target_ptr: None,
            }
        }
        Value::StringLit(lit) => leaf(
            ptr,
            IrKind::String,
            Scalar::Str(lit.value.to_string()),
            (lit.range.start, lit.range.end),
            uri,
        ),
        Value::NumberLit(lit) => {
            let parsed = lit.value.parse::<f64>().unwrap_or(0.0);
            leaf(
                ptr,
                IrKind::Number,
                Scalar::Num(parsed),
                (lit.range.start, lit.range.end),
                uri,
            )
        }
        Value::BooleanLit(lit) => leaf(
            ptr,
            IrKind::Boolean,
            Scalar::Bool(lit.value),
            (lit.range.start, lit.range.end),
            uri,
        ),
        Value::NullKeyword(null) => leaf(
            ptr,
            IrKind::Null,
            Scalar::Null,
            (null.range.start, null.range.end),
            uri,
        ),
    }
}

fn leaf(
    ptr: String,
    kind: IrKind,
    value: Scalar,
    range: (usize, usize),
    uri: &Arc<Url>,
) -> IrNode {
    IrNode {
        ptr,
        kind,
        key: None,
        value: Some(value),
        children: Vec::new(),
        loc: Loc::span(range.0 as u32, range.1 as u32),
        uri: Arc::clone(uri),
        alias_target_ptr: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> IrDocument {
        let uri = Arc::new(Url::parse("file:///spec.json").unwrap());
        build_json(uri, text).expect("valid json")
    }

    #[test]
    fn comments_and_trailing_commas_are_tolerated() {
        let doc = parse("{\n  // spec entry\n  \"openapi\": \"3.0.4\",\n}\n");
        assert_eq!(
            doc.root.get("openapi").and_then(IrNode::as_str),
            Some("3.0.4")
        );
        assert_eq!(doc.version.as_str(), "3.0");
    }

    #[test]
    fn duplicate_keys_keep_last_value() {
        let doc = parse(r#"{"a": 1, "a": 2}"#);
        assert_eq!(doc.root.children.len(), 1);
        assert_eq!(doc.root.get("a").unwrap().as_f64(), Some(2.0));
    }

    #[test]
    fn key_and_value_ranges_cover_source() {
        let text = r#"{"info": {"title": "Pets"}}"#;
        let doc = parse(text);
        let title = doc.find_by_pointer("#/info/title").unwrap();
        let (key_start, key_end) = title.loc.key_range().unwrap();
        assert_eq!(&text[key_start as usize..key_end as usize], "\"title\"");
        let (val_start, val_end) = title.loc.value_range();
        assert_eq!(&text[val_start as usize..val_end as usize], "\"Pets\"");
    }

    #[test]
    fn syntax_error_fails_without_partial_ir() {
        let uri = Arc::new(Url::parse("file:///bad.json").unwrap());
        let err = build_json(uri, "{\"a\": }").unwrap_err();
        assert!(err.offset.is_some());
    }

    #[test]
    fn array_pointers_are_indexed() {
        let doc = parse(r#"{"tags": [{"name": "pets"}]}"#);
        let name = doc.find_by_pointer("#/tags/0/name").unwrap();
        assert_eq!(name.as_str(), Some("pets"));
    }
}
