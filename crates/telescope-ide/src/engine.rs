//! The rule engine: visitor dispatch, contexts, and result identifiers.
//!
//! Rules are instantiated fresh for every run, so per-run state lives in the
//! rule value itself. Dispatch walks each entry URI's atoms in a fixed order,
//! then runs `finish_project` once. A panicking rule is disabled for the rest
//! of the pass and its diagnostics are discarded; other rules continue.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use telescope_hir::atoms::{AtomRef, ComponentAtom, ComponentKind, OperationAtom, RefAtom};
use telescope_hir::{
    checkpoint, CancellationToken, Cancelled, Diagnostic, DocumentEntry, DocumentType, Position,
    Range, ResolveError, ResolvedRef, Severity, Workspace,
};
use telescope_syntax::{hash, IrNode};
use tracing::error;
use url::Url;

use crate::fix::FilePatch;

/// Whether a rule is OpenAPI-specific or generic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Applies only to OpenAPI-shaped documents.
    OpenApi,
    /// Applies to any YAML/JSON document.
    Generic,
}

/// Whether a rule needs cross-file context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleScope {
    /// The rule only looks at one file at a time.
    Single,
    /// The rule compares state across the project.
    CrossFile,
}

/// Static description of a rule.
#[derive(Debug, Clone, Copy)]
pub struct RuleMeta {
    /// Stable rule identifier; doubles as the diagnostic code.
    pub id: &'static str,
    /// Optional ordinal used in documentation.
    pub number: Option<u32>,
    /// Rule category.
    pub rule_type: RuleKind,
    /// Default severity, overridable by configuration.
    pub severity: Severity,
    /// True when the rule attaches fix proposals.
    pub fixable: bool,
    /// Single-file or cross-file.
    pub scope: RuleScope,
}

/// A lint rule.
///
/// Every visit method defaults to a no-op; rules implement only the entity
/// kinds they care about. Methods take `&mut self` so per-run state needs no
/// interior mutability.
#[allow(unused_variables)]
pub trait Rule {
    /// The rule's static metadata.
    fn meta(&self) -> &'static RuleMeta;

    /// Called once per document.
    fn visit_document(&mut self, ctx: &mut RuleCtx<'_>, entry: &DocumentEntry) {}
    /// Called for documents classified as roots.
    fn visit_root(&mut self, ctx: &mut RuleCtx<'_>, entry: &DocumentEntry) {}
    /// Called per path item under `paths`.
    fn visit_path_item(&mut self, ctx: &mut RuleCtx<'_>, atom: &AtomRef) {}
    /// Called per HTTP operation.
    fn visit_operation(&mut self, ctx: &mut RuleCtx<'_>, operation: &OperationAtom) {}
    /// Called per named component.
    fn visit_component(&mut self, ctx: &mut RuleCtx<'_>, component: &ComponentAtom) {}
    /// Called per schema object.
    fn visit_schema(&mut self, ctx: &mut RuleCtx<'_>, atom: &AtomRef) {}
    /// Called per parameter object.
    fn visit_parameter(&mut self, ctx: &mut RuleCtx<'_>, atom: &AtomRef) {}
    /// Called per response object.
    fn visit_response(&mut self, ctx: &mut RuleCtx<'_>, atom: &AtomRef) {}
    /// Called per request body.
    fn visit_request_body(&mut self, ctx: &mut RuleCtx<'_>, atom: &AtomRef) {}
    /// Called per header object.
    fn visit_header(&mut self, ctx: &mut RuleCtx<'_>, atom: &AtomRef) {}
    /// Called per media-type object.
    fn visit_media_type(&mut self, ctx: &mut RuleCtx<'_>, atom: &AtomRef) {}
    /// Called per security requirement.
    fn visit_security_requirement(&mut self, ctx: &mut RuleCtx<'_>, atom: &AtomRef) {}
    /// Called per example object.
    fn visit_example(&mut self, ctx: &mut RuleCtx<'_>, atom: &AtomRef) {}
    /// Called per link object.
    fn visit_link(&mut self, ctx: &mut RuleCtx<'_>, atom: &AtomRef) {}
    /// Called per callback object.
    fn visit_callback(&mut self, ctx: &mut RuleCtx<'_>, atom: &AtomRef) {}
    /// Called per `$ref` occurrence.
    fn visit_reference(&mut self, ctx: &mut RuleCtx<'_>, reference: &RefAtom) {}
    /// Called once after every entry URI has been visited.
    fn finish_project(&mut self, ctx: &mut ProjectCtx<'_>) {}
}

/// Factory producing a fresh rule instance for one run.
pub type RuleFactory = fn() -> Box<dyn Rule>;

/// One configured rule: its factory plus an optional severity override.
#[derive(Debug, Clone)]
pub struct RuleSpec {
    /// Fresh-instance factory.
    pub factory: RuleFactory,
    /// Severity override from configuration.
    pub severity: Option<Severity>,
}

/// The resolved set of rules for a run.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    specs: Vec<RuleSpec>,
}

impl RuleSet {
    /// Builds a rule set from specs.
    #[must_use]
    pub fn new(specs: Vec<RuleSpec>) -> Self {
        Self { specs }
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// True when no rules are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// SHA-1 over the sorted rule ids and effective severities.
    ///
    /// Two runs with the same signature produce comparable snapshots.
    #[must_use]
    pub fn signature(&self) -> String {
        let mut lines: Vec<String> = self
            .specs
            .iter()
            .map(|spec| {
                let rule = (spec.factory)();
                let meta = rule.meta();
                let severity = spec.severity.unwrap_or(meta.severity);
                format!("{}={severity}", meta.id)
            })
            .collect();
        lines.sort();
        hash::sha1_hex(lines.join("\n").as_bytes())
    }
}

struct ActiveRule {
    rule: Box<dyn Rule>,
    severity: Severity,
    crashed: bool,
}

/// Runs a rule set over the given entry URIs.
///
/// Entries whose documents are missing from the store or classified
/// `unknown` are silently skipped. Cancellation is checked before each URI
/// and before the project pass.
///
/// # Errors
///
/// [`Cancelled`] when the token trips; partial diagnostics are discarded.
pub fn run_rules(
    workspace: &Workspace,
    entries: &[Url],
    rule_set: &RuleSet,
    cancel: &CancellationToken,
) -> Result<Vec<Diagnostic>, Cancelled> {
    let mut active: Vec<ActiveRule> = rule_set
        .specs
        .iter()
        .map(|spec| {
            let rule = (spec.factory)();
            let severity = spec.severity.unwrap_or(rule.meta().severity);
            ActiveRule {
                rule,
                severity,
                crashed: false,
            }
        })
        .collect();
    let mut collected: Vec<Vec<Diagnostic>> = active.iter().map(|_| Vec::new()).collect();

    for uri in entries {
        checkpoint(cancel)?;
        let Some(entry) = workspace.entry(uri) else {
            continue;
        };
        if entry.doc_type == DocumentType::Unknown {
            continue;
        }
        for (state, sink) in active.iter_mut().zip(collected.iter_mut()) {
            if state.crashed {
                continue;
            }
            let meta = state.rule.meta();
            let mut ctx = RuleCtx {
                workspace,
                entry: &*entry,
                severity: state.severity,
                meta,
                sink: &mut *sink,
            };
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                dispatch_file(state.rule.as_mut(), &mut ctx, &entry);
            }));
            if outcome.is_err() {
                error!(rule = meta.id, uri = %uri, "rule crashed; disabling for this pass");
                state.crashed = true;
                sink.clear();
            }
        }
    }

    checkpoint(cancel)?;
    for (state, sink) in active.iter_mut().zip(collected.iter_mut()) {
        if state.crashed {
            continue;
        }
        let meta = state.rule.meta();
        let mut ctx = ProjectCtx {
            workspace,
            entries,
            severity: state.severity,
            meta,
            sink: &mut *sink,
        };
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            state.rule.finish_project(&mut ctx);
        }));
        if outcome.is_err() {
            error!(rule = meta.id, "rule crashed in project pass; diagnostics dropped");
            state.crashed = true;
            sink.clear();
        }
    }

    Ok(collected.into_iter().flatten().collect())
}

fn dispatch_file(rule: &mut dyn Rule, ctx: &mut RuleCtx<'_>, entry: &DocumentEntry) {
    rule.visit_document(ctx, entry);
    if entry.doc_type == DocumentType::Root {
        rule.visit_root(ctx, entry);
    }
    let atoms = &entry.atoms;
    for atom in &atoms.path_items {
        rule.visit_path_item(ctx, atom);
    }
    for operation in &atoms.operations {
        rule.visit_operation(ctx, operation);
    }
    for kind in ComponentKind::ALL {
        for component in atoms.components_of(*kind) {
            rule.visit_component(ctx, component);
        }
    }
    for atom in &atoms.schemas {
        rule.visit_schema(ctx, atom);
    }
    for atom in &atoms.parameters {
        rule.visit_parameter(ctx, atom);
    }
    for atom in &atoms.responses {
        rule.visit_response(ctx, atom);
    }
    for atom in &atoms.request_bodies {
        rule.visit_request_body(ctx, atom);
    }
    for atom in &atoms.headers {
        rule.visit_header(ctx, atom);
    }
    for atom in &atoms.media_types {
        rule.visit_media_type(ctx, atom);
    }
    for atom in &atoms.security_requirements {
        rule.visit_security_requirement(ctx, atom);
    }
    for atom in &atoms.examples {
        rule.visit_example(ctx, atom);
    }
    for atom in &atoms.links {
        rule.visit_link(ctx, atom);
    }
    for atom in &atoms.callbacks {
        rule.visit_callback(ctx, atom);
    }
    for reference in &atoms.references {
        rule.visit_reference(ctx, reference);
    }
}

/// Locates a pointer's value range in any cached document.
fn locate_in(workspace: &Workspace, uri: &Url, pointer: &str) -> Option<Range> {
    let entry = workspace.entry(uri)?;
    let node = entry.ir.find_by_pointer(pointer).ok()?;
    let (start, end) = node.loc.value_range();
    Some(range_of(&entry, start, end))
}

fn locate_key_in(workspace: &Workspace, uri: &Url, pointer: &str) -> Option<Range> {
    let entry = workspace.entry(uri)?;
    let node = entry.ir.find_by_pointer(pointer).ok()?;
    let (start, end) = node.loc.key_range().unwrap_or_else(|| node.loc.value_range());
    Some(range_of(&entry, start, end))
}

fn locate_first_child_in(workspace: &Workspace, uri: &Url, pointer: &str) -> Option<Range> {
    let entry = workspace.entry(uri)?;
    let node = entry.ir.find_by_pointer(pointer).ok()?;
    let first = node.children.first()?;
    let (start, end) = first.loc.key_range().unwrap_or_else(|| first.loc.value_range());
    Some(range_of(&entry, start, end))
}

fn range_of(entry: &DocumentEntry, start: u32, end: u32) -> Range {
    let (start_line, start_col) = entry.line_index.position(start);
    let (end_line, end_col) = entry.line_index.position(end);
    Range::new(
        Position::new(start_line, start_col),
        Position::new(end_line, end_col),
    )
}

/// Per-file rule context.
pub struct RuleCtx<'a> {
    workspace: &'a Workspace,
    entry: &'a DocumentEntry,
    severity: Severity,
    meta: &'static RuleMeta,
    sink: &'a mut Vec<Diagnostic>,
}

impl<'a> RuleCtx<'a> {
    /// The current document's URI.
    #[must_use]
    pub fn uri(&self) -> &'a Arc<Url> {
        self.entry.uri()
    }

    /// The current document entry.
    #[must_use]
    pub fn file(&self) -> &'a DocumentEntry {
        self.entry
    }

    /// The workspace snapshot.
    #[must_use]
    pub fn workspace(&self) -> &'a Workspace {
        self.workspace
    }

    /// Resolves a pointer in the current document.
    #[must_use]
    pub fn node(&self, pointer: &str) -> Option<&'a IrNode> {
        self.entry.ir.find_by_pointer(pointer).ok()
    }

    /// Builds a diagnostic prefilled with this rule's code, severity, and the
    /// current document.
    #[must_use]
    pub fn make(&self, range: Range, message: impl Into<String>) -> Diagnostic {
        Diagnostic::new(
            Arc::clone(self.entry.uri()),
            range,
            self.severity,
            self.meta.id,
            message,
        )
    }

    /// Reports a diagnostic at a range in the current document.
    pub fn report(&mut self, range: Range, message: impl Into<String>) {
        let diagnostic = self.make(range, message);
        self.sink.push(diagnostic);
    }

    /// Reports a fully built diagnostic (see [`RuleCtx::make`]).
    pub fn report_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.sink.push(diagnostic);
    }

    /// Reports a diagnostic carrying a fix proposal.
    pub fn report_with_fix(&mut self, range: Range, message: impl Into<String>, fix: FilePatch) {
        let diagnostic = self.make(range, message).with_data(fix.into_data());
        self.sink.push(diagnostic);
    }

    /// Value range of a pointer, in any cached document.
    #[must_use]
    pub fn locate(&self, uri: &Url, pointer: &str) -> Option<Range> {
        locate_in(self.workspace, uri, pointer)
    }

    /// Key range of a pointer (value range when it has no key).
    #[must_use]
    pub fn locate_key(&self, uri: &Url, pointer: &str) -> Option<Range> {
        locate_key_in(self.workspace, uri, pointer)
    }

    /// Range of an object's first child, for missing-required-field reports.
    #[must_use]
    pub fn locate_first_child(&self, uri: &Url, pointer: &str) -> Option<Range> {
        locate_first_child_in(self.workspace, uri, pointer)
    }

    /// Converts byte offsets in the current document to a range.
    #[must_use]
    pub fn offset_to_range(&self, start: u32, end: u32) -> Range {
        range_of(self.entry, start, end)
    }

    /// Transitive dependencies of a document.
    #[must_use]
    pub fn linked_uris(&self, uri: &Url) -> Vec<Url> {
        self.workspace.linked_uris(uri)
    }

    /// Roots reaching the given document.
    #[must_use]
    pub fn root_documents(&self, uri: &Url) -> std::collections::BTreeSet<Url> {
        self.workspace.roots_for(uri)
    }

    /// Deterministic primary root of a document.
    #[must_use]
    pub fn primary_root(&self, uri: &Url) -> Option<Url> {
        self.workspace.primary_root(uri)
    }

    /// Dereferences a raw `$ref` written in the current document.
    ///
    /// # Errors
    ///
    /// See [`ResolveError`].
    pub fn deref(&self, raw: &str) -> Result<ResolvedRef, ResolveError> {
        self.workspace.deref(self.entry.uri(), raw)
    }
}

/// Project-pass context for cross-file rules.
pub struct ProjectCtx<'a> {
    workspace: &'a Workspace,
    entries: &'a [Url],
    severity: Severity,
    meta: &'static RuleMeta,
    sink: &'a mut Vec<Diagnostic>,
}

impl<'a> ProjectCtx<'a> {
    /// The entry URIs of this run, in dispatch order.
    #[must_use]
    pub fn entries(&self) -> &'a [Url] {
        self.entries
    }

    /// The workspace snapshot.
    #[must_use]
    pub fn workspace(&self) -> &'a Workspace {
        self.workspace
    }

    /// The cached entry for one URI.
    #[must_use]
    pub fn entry(&self, uri: &Url) -> Option<Arc<DocumentEntry>> {
        self.workspace.entry(uri)
    }

    /// Builds a diagnostic for an arbitrary document in the project.
    #[must_use]
    pub fn make_for(&self, uri: Arc<Url>, range: Range, message: impl Into<String>) -> Diagnostic {
        Diagnostic::new(uri, range, self.severity, self.meta.id, message)
    }

    /// Reports a diagnostic.
    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.sink.push(diagnostic);
    }

    /// Value range of a pointer in any cached document.
    #[must_use]
    pub fn locate(&self, uri: &Url, pointer: &str) -> Option<Range> {
        locate_in(self.workspace, uri, pointer)
    }

    /// Key range of a pointer in any cached document.
    #[must_use]
    pub fn locate_key(&self, uri: &Url, pointer: &str) -> Option<Range> {
        locate_key_in(self.workspace, uri, pointer)
    }
}

/// Stable result identifier for one document's diagnostics.
///
/// `SHA-1(version || canonical diagnostics)`: identical inputs yield
/// identical IDs, so transports can skip unchanged payloads.
#[must_use]
pub fn result_id(version: &str, diagnostics: &[Diagnostic]) -> String {
    let mut sorted: Vec<&Diagnostic> = diagnostics.iter().collect();
    sorted.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    let mut canonical = String::from(version);
    for diagnostic in sorted {
        canonical.push('\n');
        canonical.push_str(&diagnostic.canonical_line());
    }
    hash::sha1_hex(canonical.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    static PANIC_META: RuleMeta = RuleMeta {
        id: "test-panic",
        number: None,
        rule_type: RuleKind::Generic,
        severity: Severity::Error,
        fixable: false,
        scope: RuleScope::Single,
    };

    struct PanickyRule;

    impl Rule for PanickyRule {
        fn meta(&self) -> &'static RuleMeta {
            &PANIC_META
        }

        fn visit_document(&mut self, ctx: &mut RuleCtx<'_>, _entry: &DocumentEntry) {
            ctx.report(Range::default(), "about to crash");
            panic!("boom");
        }
    }

    fn panicky() -> Box<dyn Rule> {
        Box::new(PanickyRule)
    }

    #[test]
    fn a_crashing_rule_is_isolated_and_its_diagnostics_dropped() {
        let mut workspace = Workspace::default();
        let uri = Url::parse("file:///a.yaml").unwrap();
        // No info object, so info-required still reports.
        workspace.update_document(&uri, "openapi: 3.1.0\n", "yaml", None);

        let specs = vec![
            RuleSpec {
                factory: panicky,
                severity: None,
            },
            RuleSpec {
                factory: crate::rules::rule_factory("info-required").unwrap(),
                severity: None,
            },
        ];
        let rule_set = RuleSet::new(specs);
        let cancel = CancellationToken::new();
        let diagnostics =
            run_rules(&workspace, &[uri], &rule_set, &cancel).expect("run completes");

        assert!(diagnostics.iter().all(|d| d.code != "test-panic"));
        assert!(diagnostics.iter().any(|d| d.code == "info-required"));
    }

    #[test]
    fn cancellation_aborts_before_work() {
        let workspace = Workspace::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = run_rules(
            &workspace,
            &[Url::parse("file:///a.yaml").unwrap()],
            &RuleSet::default(),
            &cancel,
        );
        assert!(outcome.is_err());
    }

    #[test]
    fn result_id_is_stable_and_order_independent() {
        let uri = Arc::new(Url::parse("file:///a.yaml").unwrap());
        let one = Diagnostic::new(
            Arc::clone(&uri),
            Range::new(Position::new(1, 0), Position::new(1, 4)),
            Severity::Warning,
            "rule-a",
            "first",
        );
        let two = Diagnostic::new(
            Arc::clone(&uri),
            Range::new(Position::new(2, 0), Position::new(2, 4)),
            Severity::Error,
            "rule-b",
            "second",
        );

        let forward = result_id("v1", &[one.clone(), two.clone()]);
        let backward = result_id("v1", &[two, one.clone()]);
        assert_eq!(forward, backward);

        assert_ne!(forward, result_id("v2", &[one.clone()]));
        assert_ne!(forward, result_id("v1", &[one]));
    }
}
