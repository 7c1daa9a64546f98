//! `operationId` rules: presence and cross-file uniqueness.

use std::collections::BTreeMap;
use std::sync::Arc;

use telescope_hir::atoms::OperationAtom;
use telescope_hir::Severity;
use telescope_syntax::pointer;
use url::Url;

use crate::engine::{ProjectCtx, Rule, RuleCtx, RuleKind, RuleMeta, RuleScope};

static UNIQUE_META: RuleMeta = RuleMeta {
    id: "operationid-unique",
    number: Some(1),
    rule_type: RuleKind::OpenApi,
    severity: Severity::Warning,
    fixable: false,
    scope: RuleScope::CrossFile,
};

static REQUIRED_META: RuleMeta = RuleMeta {
    id: "operationid-required",
    number: Some(2),
    rule_type: RuleKind::OpenApi,
    severity: Severity::Warning,
    fixable: false,
    scope: RuleScope::Single,
};

/// Factory for [`UNIQUE_META`].
pub fn unique() -> Box<dyn Rule> {
    Box::new(OperationIdUnique)
}

/// Factory for [`REQUIRED_META`].
pub fn required() -> Box<dyn Rule> {
    Box::new(OperationIdRequired)
}

struct OperationIdUnique;

impl Rule for OperationIdUnique {
    fn meta(&self) -> &'static RuleMeta {
        &UNIQUE_META
    }

    fn finish_project(&mut self, ctx: &mut ProjectCtx<'_>) {
        // Occurrences inside this project, grouped by id in deterministic order.
        let mut in_project: BTreeMap<String, Vec<(Arc<Url>, String)>> = BTreeMap::new();
        for uri in ctx.entries() {
            let Some(entry) = ctx.entry(uri) else {
                continue;
            };
            for operation in &entry.atoms.operations {
                if let Some(id) = &operation.operation_id {
                    in_project
                        .entry(id.clone())
                        .or_default()
                        .push((Arc::clone(&operation.uri), operation.pointer.clone()));
                }
            }
        }

        for (id, occurrences) in &in_project {
            // Uniqueness is judged against the whole workspace index, so a
            // single-file pass still sees duplicates living elsewhere.
            let all = ctx.workspace().operation_ids().occurrences(id);
            if all.len() <= 1 {
                continue;
            }
            for (uri, op_pointer) in occurrences {
                let id_pointer = pointer::append(op_pointer, "operationId");
                let Some(range) = ctx
                    .locate(uri, &id_pointer)
                    .or_else(|| ctx.locate_key(uri, op_pointer))
                else {
                    continue;
                };
                let mut diagnostic = ctx.make_for(
                    Arc::clone(uri),
                    range,
                    format!(
                        "operationId \"{id}\" is not unique ({} occurrences across the project)",
                        all.len()
                    ),
                );
                for other in all {
                    if other.uri.as_ref() == uri.as_ref() && &other.pointer == op_pointer {
                        continue;
                    }
                    let other_pointer = pointer::append(&other.pointer, "operationId");
                    let Some(other_range) = ctx
                        .locate(&other.uri, &other_pointer)
                        .or_else(|| ctx.locate_key(&other.uri, &other.pointer))
                    else {
                        continue;
                    };
                    diagnostic = diagnostic.with_related(
                        Arc::clone(&other.uri),
                        other_range,
                        "also declared here",
                    );
                }
                ctx.report(diagnostic);
            }
        }
    }
}

struct OperationIdRequired;

impl Rule for OperationIdRequired {
    fn meta(&self) -> &'static RuleMeta {
        &REQUIRED_META
    }

    fn visit_operation(&mut self, ctx: &mut RuleCtx<'_>, operation: &OperationAtom) {
        if operation.operation_id.is_some() {
            return;
        }
        let uri = Arc::clone(ctx.uri());
        let Some(range) = ctx.locate_key(&uri, &operation.pointer) else {
            return;
        };
        let subject = if operation.path.is_empty() {
            operation.method.to_uppercase()
        } else {
            format!("{} {}", operation.method.to_uppercase(), operation.path)
        };
        ctx.report(range, format!("operation {subject} has no operationId"));
    }
}
