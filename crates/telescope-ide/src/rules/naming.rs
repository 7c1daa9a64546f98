//! Naming rules for paths and components.

use std::sync::Arc;

use telescope_hir::atoms::{AtomRef, ComponentAtom};
use telescope_hir::Severity;
use telescope_syntax::pointer;

use crate::engine::{Rule, RuleCtx, RuleKind, RuleMeta, RuleScope};

static KEBAB_META: RuleMeta = RuleMeta {
    id: "path-kebab-case",
    number: Some(20),
    rule_type: RuleKind::OpenApi,
    severity: Severity::Hint,
    fixable: false,
    scope: RuleScope::Single,
};

static COMPONENT_META: RuleMeta = RuleMeta {
    id: "component-name-valid",
    number: Some(21),
    rule_type: RuleKind::OpenApi,
    severity: Severity::Error,
    fixable: false,
    scope: RuleScope::Single,
};

/// Factory for [`KEBAB_META`].
pub fn path_kebab_case() -> Box<dyn Rule> {
    Box::new(PathKebabCase)
}

/// Factory for [`COMPONENT_META`].
pub fn component_name_valid() -> Box<dyn Rule> {
    Box::new(ComponentNameValid)
}

struct PathKebabCase;

impl Rule for PathKebabCase {
    fn meta(&self) -> &'static RuleMeta {
        &KEBAB_META
    }

    fn visit_path_item(&mut self, ctx: &mut RuleCtx<'_>, atom: &AtomRef) {
        let Some(path) = pointer::last_token(&atom.pointer) else {
            return;
        };
        let offending = path
            .split('/')
            .filter(|segment| !segment.is_empty() && !segment.starts_with('{'))
            .find(|segment| !is_kebab(segment));
        let Some(segment) = offending else {
            return;
        };
        let uri = Arc::clone(ctx.uri());
        let Some(range) = ctx.locate_key(&uri, &atom.pointer) else {
            return;
        };
        ctx.report(
            range,
            format!("path segment \"{segment}\" is not lower-kebab-case"),
        );
    }
}

fn is_kebab(segment: &str) -> bool {
    segment
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '.')
}

struct ComponentNameValid;

impl Rule for ComponentNameValid {
    fn meta(&self) -> &'static RuleMeta {
        &COMPONENT_META
    }

    fn visit_component(&mut self, ctx: &mut RuleCtx<'_>, component: &ComponentAtom) {
        let valid = !component.name.is_empty()
            && component
                .name
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-'));
        if valid {
            return;
        }
        let uri = Arc::clone(ctx.uri());
        let Some(range) = ctx.locate_key(&uri, &component.pointer) else {
            return;
        };
        ctx.report(
            range,
            format!(
                "component name \"{}\" must match [a-zA-Z0-9._-]",
                component.name
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kebab_segments() {
        assert!(is_kebab("pets"));
        assert!(is_kebab("pet-toys"));
        assert!(is_kebab("v1.2"));
        assert!(!is_kebab("petToys"));
        assert!(!is_kebab("pet_toys"));
    }
}
