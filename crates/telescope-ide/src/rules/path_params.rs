//! Path template / path parameter consistency.
//!
//! Placeholders in the path template must be declared as `in: path`
//! parameters (at the operation or path-item level, possibly behind `$ref`),
//! and declared path parameters must appear in the template. Missing
//! declarations get a fix proposal appending the parameter.

use std::sync::Arc;

use telescope_hir::atoms::OperationAtom;
use telescope_hir::{Range, Severity};
use telescope_syntax::{pointer, IrNode};
use url::Url;

use crate::engine::{Rule, RuleCtx, RuleKind, RuleMeta, RuleScope};
use crate::fix::{FilePatch, PatchOp};

static META: RuleMeta = RuleMeta {
    id: "path-params-match",
    number: Some(3),
    rule_type: RuleKind::OpenApi,
    severity: Severity::Warning,
    fixable: true,
    scope: RuleScope::Single,
};

/// Factory for the rule.
pub fn path_params_match() -> Box<dyn Rule> {
    Box::new(PathParamsMatch)
}

/// A declared `in: path` parameter and where it was declared.
struct DeclaredParam {
    name: String,
    pointer: String,
}

/// A `{name}` placeholder and its byte offset inside the template string.
struct Placeholder {
    name: String,
    offset: usize,
}

struct PathParamsMatch;

impl Rule for PathParamsMatch {
    fn meta(&self) -> &'static RuleMeta {
        &META
    }

    fn visit_operation(&mut self, ctx: &mut RuleCtx<'_>, operation: &OperationAtom) {
        // Operations in path-item fragments carry no template to check.
        if operation.path.is_empty() {
            return;
        }
        let uri = Arc::clone(ctx.uri());
        let item_pointer = match pointer::parent(&operation.pointer) {
            Some(parent) => parent,
            None => return,
        };

        let mut declared = Vec::new();
        if let Some(node) = ctx.node(&operation.pointer).and_then(|op| op.get("parameters")) {
            collect_declared(ctx, node, &mut declared);
        }
        if let Some(node) = ctx.node(&item_pointer).and_then(|item| item.get("parameters")) {
            collect_declared(ctx, node, &mut declared);
        }

        let placeholders = parse_placeholders(&operation.path);

        for placeholder in &placeholders {
            if declared.iter().any(|param| param.name == placeholder.name) {
                continue;
            }
            let range = placeholder_range(ctx, &item_pointer, &operation.path, placeholder)
                .or_else(|| ctx.locate_key(&uri, &item_pointer));
            let Some(range) = range else {
                continue;
            };
            let fix = missing_param_fix(&uri, &operation.pointer, &placeholder.name);
            ctx.report_with_fix(
                range,
                format!(
                    "path parameter \"{}\" is not declared by {} {}",
                    placeholder.name,
                    operation.method.to_uppercase(),
                    operation.path
                ),
                fix,
            );
        }

        for param in &declared {
            if placeholders.iter().any(|p| p.name == param.name) {
                continue;
            }
            // Parameters declared behind a cross-file $ref are located in the
            // other document; anchor the diagnostic at the declaring entry.
            let Some(range) = ctx
                .locate(&uri, &param.pointer)
                .or_else(|| ctx.locate_key(&uri, &operation.pointer))
            else {
                continue;
            };
            ctx.report(
                range,
                format!(
                    "declared path parameter \"{}\" does not appear in {}",
                    param.name, operation.path
                ),
            );
        }
    }
}

/// Collects `in: path` parameters from a `parameters` array, following `$ref`
/// entries best-effort.
fn collect_declared(ctx: &RuleCtx<'_>, parameters: &IrNode, declared: &mut Vec<DeclaredParam>) {
    if !parameters.is_array() {
        return;
    }
    for entry in &parameters.children {
        let (name, place) = match entry.get("$ref").and_then(IrNode::as_str) {
            Some(raw) => {
                let Ok(resolved) = ctx.deref(raw) else {
                    continue;
                };
                let Some(target) = resolved.node() else {
                    continue;
                };
                (
                    target.get("name").and_then(IrNode::as_str).map(str::to_string),
                    target.get("in").and_then(IrNode::as_str).map(str::to_string),
                )
            }
            None => (
                entry.get("name").and_then(IrNode::as_str).map(str::to_string),
                entry.get("in").and_then(IrNode::as_str).map(str::to_string),
            ),
        };
        if let (Some(name), Some(place)) = (name, place) {
            if place == "path" {
                declared.push(DeclaredParam {
                    name,
                    pointer: entry.ptr.clone(),
                });
            }
        }
    }
}

fn parse_placeholders(path: &str) -> Vec<Placeholder> {
    let mut placeholders = Vec::new();
    let mut rest = path;
    let mut base = 0;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        let name = &rest[open + 1..open + close];
        if !name.is_empty() {
            placeholders.push(Placeholder {
                name: name.to_string(),
                offset: base + open,
            });
        }
        base += open + close + 1;
        rest = &rest[open + close + 1..];
    }
    placeholders
}

/// The exact source range of one `{placeholder}` inside the path key.
fn placeholder_range(
    ctx: &RuleCtx<'_>,
    item_pointer: &str,
    path: &str,
    placeholder: &Placeholder,
) -> Option<Range> {
    let item = ctx.node(item_pointer)?;
    let (key_start, key_end) = item.loc.key_range()?;
    let key_text = &ctx.file().ir.raw_text[key_start as usize..key_end as usize];
    // Quoted keys shift the template by the opening quote.
    let shift = key_text.find(path)?;
    let start = key_start as usize + shift + placeholder.offset;
    let end = start + placeholder.name.len() + 2;
    Some(ctx.offset_to_range(start as u32, end as u32))
}

fn missing_param_fix(uri: &Url, operation_pointer: &str, name: &str) -> FilePatch {
    FilePatch {
        uri: uri.to_string(),
        ops: vec![PatchOp::Add {
            path: format!("{operation_pointer}/parameters/-"),
            value: serde_json::json!({
                "name": name,
                "in": "path",
                "required": true,
                "schema": { "type": "string" },
            }),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_parsed_with_offsets() {
        let found = parse_placeholders("/pets/{petId}/toys/{toyId}");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "petId");
        assert_eq!(found[0].offset, 6);
        assert_eq!(found[1].name, "toyId");
        assert_eq!(found[1].offset, 19);
    }

    #[test]
    fn empty_placeholders_are_ignored() {
        assert!(parse_placeholders("/pets/{}").is_empty());
        assert!(parse_placeholders("/plain/path").is_empty());
    }
}
