//! Reference rules: unresolved and remote `$ref` targets.

use std::sync::Arc;

use telescope_hir::atoms::RefAtom;
use telescope_hir::{ResolveError, Severity};

use crate::engine::{Rule, RuleCtx, RuleKind, RuleMeta, RuleScope};

static UNRESOLVED_META: RuleMeta = RuleMeta {
    id: "no-unresolved-ref",
    number: Some(10),
    rule_type: RuleKind::Generic,
    severity: Severity::Error,
    fixable: false,
    scope: RuleScope::CrossFile,
};

static REMOTE_META: RuleMeta = RuleMeta {
    id: "no-remote-ref",
    number: Some(11),
    rule_type: RuleKind::Generic,
    severity: Severity::Hint,
    fixable: false,
    scope: RuleScope::Single,
};

/// Factory for [`UNRESOLVED_META`].
pub fn unresolved() -> Box<dyn Rule> {
    Box::new(NoUnresolvedRef)
}

/// Factory for [`REMOTE_META`].
pub fn remote() -> Box<dyn Rule> {
    Box::new(NoRemoteRef)
}

struct NoUnresolvedRef;

impl Rule for NoUnresolvedRef {
    fn meta(&self) -> &'static RuleMeta {
        &UNRESOLVED_META
    }

    fn visit_reference(&mut self, ctx: &mut RuleCtx<'_>, reference: &RefAtom) {
        let error = match ctx.deref(&reference.raw) {
            // Remote targets are the other rule's concern.
            Ok(_) | Err(ResolveError::Remote { .. }) => return,
            Err(error) => error,
        };
        let uri = Arc::clone(ctx.uri());
        let Some(range) = ctx.locate(&uri, &reference.pointer) else {
            return;
        };
        ctx.report(range, error.to_string());
    }
}

struct NoRemoteRef;

impl Rule for NoRemoteRef {
    fn meta(&self) -> &'static RuleMeta {
        &REMOTE_META
    }

    fn visit_reference(&mut self, ctx: &mut RuleCtx<'_>, reference: &RefAtom) {
        if !matches!(ctx.deref(&reference.raw), Err(ResolveError::Remote { .. })) {
            return;
        }
        let uri = Arc::clone(ctx.uri());
        let Some(range) = ctx.locate(&uri, &reference.pointer) else {
            return;
        };
        ctx.report(
            range,
            format!(
                "remote reference `{}` is recorded but never validated",
                reference.raw
            ),
        );
    }
}
