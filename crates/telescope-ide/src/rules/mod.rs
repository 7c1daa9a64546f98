//! The built-in rule library.
//!
//! Rules register here by id; configuration resolves ids against this table
//! and may override severities or disable rules entirely.

pub mod naming;
pub mod operation_ids;
pub mod path_params;
pub mod refs;
pub mod structure;

use crate::engine::{RuleFactory, RuleSet, RuleSpec};

/// Every built-in rule, id → factory.
pub const BUILTIN_RULES: &[(&str, RuleFactory)] = &[
    ("operationid-unique", operation_ids::unique),
    ("operationid-required", operation_ids::required),
    ("path-params-match", path_params::path_params_match),
    ("no-unresolved-ref", refs::unresolved),
    ("no-remote-ref", refs::remote),
    ("info-required", structure::info_required),
    ("operation-success-response", structure::success_response),
    ("no-trailing-slash", structure::no_trailing_slash),
    ("path-kebab-case", naming::path_kebab_case),
    ("component-name-valid", naming::component_name_valid),
];

/// Looks up a built-in rule factory by id.
#[must_use]
pub fn rule_factory(id: &str) -> Option<RuleFactory> {
    BUILTIN_RULES
        .iter()
        .find(|(rule_id, _)| *rule_id == id)
        .map(|(_, factory)| *factory)
}

/// All built-in rule ids.
pub fn rule_ids() -> impl Iterator<Item = &'static str> {
    BUILTIN_RULES.iter().map(|(id, _)| *id)
}

/// The "default" ruleset: every built-in rule at its default severity.
#[must_use]
pub fn default_rule_set() -> RuleSet {
    RuleSet::new(
        BUILTIN_RULES
            .iter()
            .map(|(_, factory)| RuleSpec {
                factory: *factory,
                severity: None,
            })
            .collect(),
    )
}
