//! Structural rules for roots, operations, and paths.

use std::sync::Arc;

use telescope_hir::atoms::{AtomRef, OperationAtom};
use telescope_hir::{DocumentEntry, Range, Severity};
use telescope_syntax::{pointer, IrNode};

use crate::engine::{Rule, RuleCtx, RuleKind, RuleMeta, RuleScope};

static INFO_META: RuleMeta = RuleMeta {
    id: "info-required",
    number: Some(30),
    rule_type: RuleKind::OpenApi,
    severity: Severity::Error,
    fixable: false,
    scope: RuleScope::Single,
};

static SUCCESS_META: RuleMeta = RuleMeta {
    id: "operation-success-response",
    number: Some(31),
    rule_type: RuleKind::OpenApi,
    severity: Severity::Warning,
    fixable: false,
    scope: RuleScope::Single,
};

static TRAILING_META: RuleMeta = RuleMeta {
    id: "no-trailing-slash",
    number: Some(32),
    rule_type: RuleKind::OpenApi,
    severity: Severity::Warning,
    fixable: false,
    scope: RuleScope::Single,
};

/// Factory for [`INFO_META`].
pub fn info_required() -> Box<dyn Rule> {
    Box::new(InfoRequired)
}

/// Factory for [`SUCCESS_META`].
pub fn success_response() -> Box<dyn Rule> {
    Box::new(SuccessResponse)
}

/// Factory for [`TRAILING_META`].
pub fn no_trailing_slash() -> Box<dyn Rule> {
    Box::new(NoTrailingSlash)
}

struct InfoRequired;

impl Rule for InfoRequired {
    fn meta(&self) -> &'static RuleMeta {
        &INFO_META
    }

    fn visit_root(&mut self, ctx: &mut RuleCtx<'_>, entry: &DocumentEntry) {
        let uri = Arc::clone(ctx.uri());
        let root = &entry.ir.root;
        let Some(info) = root.get("info") else {
            let range = ctx
                .locate_first_child(&uri, "#")
                .unwrap_or_else(Range::default);
            ctx.report(range, "document has no info object");
            return;
        };

        let info_pointer = info.ptr.clone();
        for field in ["title", "version"] {
            let present = info
                .get(field)
                .and_then(IrNode::as_str)
                .is_some_and(|value| !value.is_empty());
            if present {
                continue;
            }
            let Some(range) = ctx
                .locate_first_child(&uri, &info_pointer)
                .or_else(|| ctx.locate_key(&uri, &info_pointer))
            else {
                continue;
            };
            ctx.report(range, format!("info.{field} is required"));
        }
    }
}

struct SuccessResponse;

impl Rule for SuccessResponse {
    fn meta(&self) -> &'static RuleMeta {
        &SUCCESS_META
    }

    fn visit_operation(&mut self, ctx: &mut RuleCtx<'_>, operation: &OperationAtom) {
        let uri = Arc::clone(ctx.uri());
        let Some(op_node) = ctx.node(&operation.pointer) else {
            return;
        };
        let subject = if operation.path.is_empty() {
            operation.method.to_uppercase()
        } else {
            format!("{} {}", operation.method.to_uppercase(), operation.path)
        };

        let Some(responses) = op_node.get("responses").filter(|node| node.is_object()) else {
            let Some(range) = ctx.locate_key(&uri, &operation.pointer) else {
                return;
            };
            ctx.report(range, format!("operation {subject} defines no responses"));
            return;
        };

        let has_success = responses.entries().any(|(key, _)| {
            key == "default" || key.starts_with('2') || key.starts_with('3')
        });
        if has_success {
            return;
        }
        let responses_pointer = responses.ptr.clone();
        let Some(range) = ctx.locate_key(&uri, &responses_pointer) else {
            return;
        };
        ctx.report(
            range,
            format!("operation {subject} has no success (2xx/3xx) or default response"),
        );
    }
}

struct NoTrailingSlash;

impl Rule for NoTrailingSlash {
    fn meta(&self) -> &'static RuleMeta {
        &TRAILING_META
    }

    fn visit_path_item(&mut self, ctx: &mut RuleCtx<'_>, atom: &AtomRef) {
        let Some(path) = pointer::last_token(&atom.pointer) else {
            return;
        };
        if path.len() <= 1 || !path.ends_with('/') {
            return;
        }
        let uri = Arc::clone(ctx.uri());
        let Some(range) = ctx.locate_key(&uri, &atom.pointer) else {
            return;
        };
        ctx.report(range, format!("path \"{path}\" must not end with a slash"));
    }
}
