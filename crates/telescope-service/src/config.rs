//! Workspace configuration: `.telescope/config.yaml`.
//!
//! The raw file is a thin serde model; resolution turns preset names into a
//! concrete rule set, compiles include/exclude patterns, and fingerprints the
//! result so callers can detect configuration changes cheaply. Parse failures
//! are reported to the caller, which logs and falls back to the defaults.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use globset::{Glob, GlobSet, GlobSetBuilder};
use once_cell::sync::Lazy;
use serde::Deserialize;
use telescope_hir::{Diagnostic, Severity};
use telescope_ide::engine::{RuleSet, RuleSpec};
use telescope_ide::rules::rule_factory;
use telescope_syntax::hash::sha1_hex;
use thiserror::Error;
use tracing::warn;
use url::Url;

/// Where the config file lives, relative to a workspace folder.
pub const CONFIG_RELATIVE_PATH: &str = ".telescope/config.yaml";

/// Default include patterns when no config is present.
pub const DEFAULT_PATTERNS: &[&str] = &["**/*.yaml", "**/*.yml", "**/*.json"];

/// Rule presets: name, extended presets, directly included rules.
///
/// Preset resolution is depth-first; a name already on the path is ignored,
/// so preset cycles terminate after the first occurrence.
const PRESETS: &[(&str, &[&str], &[&str])] = &[
    (
        "minimal",
        &[],
        &["no-unresolved-ref", "info-required", "operationid-unique"],
    ),
    (
        "recommended",
        &["minimal"],
        &[
            "operationid-required",
            "path-params-match",
            "operation-success-response",
            "no-trailing-slash",
        ],
    ),
    (
        "default",
        &["recommended"],
        &["no-remote-ref", "path-kebab-case", "component-name-valid"],
    ),
];

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The YAML did not parse or did not match the schema.
    #[error("invalid config: {0}")]
    Parse(String),
    /// A glob pattern failed to compile.
    #[error("invalid glob pattern `{0}`")]
    Pattern(String),
}

/// Compiled include/exclude glob sets (leading `!` excludes).
#[derive(Debug, Clone)]
pub struct PatternSet {
    includes: GlobSet,
    excludes: GlobSet,
    source: Vec<String>,
}

static MATCH_ALL: Lazy<GlobSet> = Lazy::new(|| {
    let mut builder = GlobSetBuilder::new();
    if let Ok(glob) = Glob::new("**") {
        builder.add(glob);
    }
    builder.build().unwrap_or_else(|_| GlobSet::empty())
});

impl PatternSet {
    /// Compiles a pattern list; an empty include list matches everything.
    pub fn compile(patterns: &[String]) -> Result<Self, ConfigError> {
        let mut includes = GlobSetBuilder::new();
        let mut excludes = GlobSetBuilder::new();
        let mut any_include = false;
        for pattern in patterns {
            let (negated, body) = match pattern.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, pattern.as_str()),
            };
            let glob =
                Glob::new(body).map_err(|_| ConfigError::Pattern(pattern.clone()))?;
            if negated {
                excludes.add(glob);
            } else {
                includes.add(glob);
                any_include = true;
            }
        }
        let includes = if any_include {
            includes
                .build()
                .map_err(|err| ConfigError::Pattern(err.to_string()))?
        } else {
            MATCH_ALL.clone()
        };
        let excludes = excludes
            .build()
            .map_err(|err| ConfigError::Pattern(err.to_string()))?;
        Ok(Self {
            includes,
            excludes,
            source: patterns.to_vec(),
        })
    }

    /// Tests a URI against the set, matching workspace-relative paths.
    #[must_use]
    pub fn matches_uri(&self, uri: &Url, folders: &[Url]) -> bool {
        for candidate in candidates(uri, folders) {
            if self.excludes.is_match(&candidate) {
                return false;
            }
        }
        candidates(uri, folders).any(|candidate| self.includes.is_match(&candidate))
    }

    fn canonical(&self) -> String {
        self.source.join(",")
    }
}

fn candidates<'a>(uri: &'a Url, folders: &'a [Url]) -> impl Iterator<Item = String> + 'a {
    let full = uri.path().trim_start_matches('/').to_string();
    let relative = folders.iter().find_map(move |folder| {
        let folder_path = folder.path().trim_end_matches('/');
        uri.path()
            .strip_prefix(folder_path)
            .map(|rest| rest.trim_start_matches('/').to_string())
            .filter(|rest| !rest.is_empty())
    });
    relative.into_iter().chain(std::iter::once(full))
}

/// How an override changes one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeverityOverride {
    /// Re-severity the rule's diagnostics.
    Severity(Severity),
    /// Drop the rule's diagnostics entirely.
    Off,
}

fn parse_override(value: &str) -> Option<SeverityOverride> {
    if value.trim().eq_ignore_ascii_case("off") {
        return Some(SeverityOverride::Off);
    }
    Severity::parse(value).map(SeverityOverride::Severity)
}

/// A per-file-pattern severity override block.
#[derive(Debug, Clone)]
pub struct OverrideBlock {
    files: PatternSet,
    rules: HashMap<String, SeverityOverride>,
}

/// One `additionalValidation` group, parsed and exposed but not evaluated
/// (instance validation is out of scope).
#[derive(Debug, Clone)]
pub struct ValidationGroup {
    /// Group label.
    pub label: String,
    /// File patterns the group applies to.
    pub patterns: Vec<String>,
    /// Extra rule ids.
    pub rules: Vec<String>,
    /// Schema associations.
    pub schemas: Vec<(String, Option<String>)>,
}

/// The resolved workspace configuration.
#[derive(Debug, Clone)]
pub struct TelescopeConfig {
    patterns: PatternSet,
    rule_set: RuleSet,
    rule_patterns: Vec<(String, PatternSet)>,
    overrides: Vec<OverrideBlock>,
    groups: Vec<ValidationGroup>,
    signature: String,
}

impl Default for TelescopeConfig {
    fn default() -> Self {
        Self::resolve(ConfigFile::default())
    }
}

impl TelescopeConfig {
    /// Parses and resolves a config file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] when the YAML is malformed; callers fall back
    /// to [`TelescopeConfig::default`].
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            serde_yaml::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        Ok(Self::resolve(file))
    }

    fn resolve(file: ConfigFile) -> Self {
        let openapi = file.openapi;

        let pattern_source: Vec<String> = if openapi.patterns.is_empty() {
            DEFAULT_PATTERNS.iter().map(|p| (*p).to_string()).collect()
        } else {
            openapi.patterns.clone()
        };
        let patterns = PatternSet::compile(&pattern_source).unwrap_or_else(|err| {
            warn!(error = %err, "invalid include patterns; falling back to defaults");
            PatternSet::compile(
                &DEFAULT_PATTERNS
                    .iter()
                    .map(|p| (*p).to_string())
                    .collect::<Vec<_>>(),
            )
            .unwrap_or_else(|_| PatternSet {
                includes: MATCH_ALL.clone(),
                excludes: GlobSet::empty(),
                source: Vec::new(),
            })
        });

        // Preset resolution, depth-first with cycle tolerance.
        let mut enabled: BTreeSet<String> = BTreeSet::new();
        let bases: Vec<String> = if openapi.base.is_empty() {
            vec!["default".to_string()]
        } else {
            openapi.base.clone()
        };
        for base in &bases {
            let mut path: Vec<String> = Vec::new();
            resolve_preset(base, &mut enabled, &mut path);
        }

        let mut rule_patterns: Vec<(String, PatternSet)> = Vec::new();
        for entry in openapi.rules.iter().chain(openapi.custom_rules.iter()) {
            if rule_factory(&entry.rule).is_none() {
                warn!(rule = %entry.rule, "unknown rule in config; skipping");
                continue;
            }
            enabled.insert(entry.rule.clone());
            if let Some(pattern) = &entry.pattern {
                match PatternSet::compile(std::slice::from_ref(pattern)) {
                    Ok(set) => rule_patterns.push((entry.rule.clone(), set)),
                    Err(err) => warn!(error = %err, "invalid rule pattern; rule applies everywhere"),
                }
            }
        }

        let mut severities: BTreeMap<String, SeverityOverride> = BTreeMap::new();
        for (rule, value) in &openapi.rules_overrides {
            match parse_override(value) {
                Some(SeverityOverride::Off) => {
                    enabled.remove(rule);
                }
                Some(level) => {
                    severities.insert(rule.clone(), level);
                }
                None => warn!(rule = %rule, value = %value, "unrecognized severity override"),
            }
        }

        let specs: Vec<RuleSpec> = enabled
            .iter()
            .filter_map(|id| {
                let factory = rule_factory(id)?;
                let severity = match severities.get(id) {
                    Some(SeverityOverride::Severity(level)) => Some(*level),
                    _ => None,
                };
                Some(RuleSpec { factory, severity })
            })
            .collect();
        let rule_set = RuleSet::new(specs);

        let overrides: Vec<OverrideBlock> = openapi
            .overrides
            .iter()
            .filter_map(|entry| {
                let files = PatternSet::compile(&entry.files).ok()?;
                let rules: HashMap<String, SeverityOverride> = entry
                    .rules
                    .iter()
                    .filter_map(|(rule, value)| Some((rule.clone(), parse_override(value)?)))
                    .collect();
                Some(OverrideBlock { files, rules })
            })
            .collect();

        let groups: Vec<ValidationGroup> = file
            .additional_validation
            .groups
            .iter()
            .map(|(label, section)| ValidationGroup {
                label: label.clone(),
                patterns: section.patterns.clone(),
                rules: section.rules.iter().map(|entry| entry.rule.clone()).collect(),
                schemas: section
                    .schemas
                    .iter()
                    .map(|entry| (entry.schema.clone(), entry.pattern.clone()))
                    .collect(),
            })
            .collect();

        let signature = {
            let mut canonical = String::new();
            canonical.push_str(&rule_set.signature());
            canonical.push('\n');
            canonical.push_str(&patterns.canonical());
            for block in &overrides {
                canonical.push('\n');
                canonical.push_str(&block.files.canonical());
                let mut rules: Vec<String> = block
                    .rules
                    .iter()
                    .map(|(rule, level)| format!("{rule}={level:?}"))
                    .collect();
                rules.sort();
                canonical.push_str(&rules.join(","));
            }
            for group in &groups {
                canonical.push('\n');
                canonical.push_str(&group.label);
                canonical.push_str(&group.patterns.join(","));
                canonical.push_str(&group.rules.join(","));
            }
            sha1_hex(canonical.as_bytes())
        };

        Self {
            patterns,
            rule_set,
            rule_patterns,
            overrides,
            groups,
            signature,
        }
    }

    /// The resolved rule set.
    #[must_use]
    pub fn rule_set(&self) -> &RuleSet {
        &self.rule_set
    }

    /// The configuration fingerprint.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// The parsed `additionalValidation` groups.
    #[must_use]
    pub fn groups(&self) -> &[ValidationGroup] {
        &self.groups
    }

    /// True when the URI participates in diagnostics at all.
    ///
    /// The config file itself is always out of scope.
    #[must_use]
    pub fn in_scope(&self, uri: &Url, folders: &[Url]) -> bool {
        if uri.path().ends_with(CONFIG_RELATIVE_PATH) {
            return false;
        }
        self.patterns.matches_uri(uri, folders)
    }

    /// Applies per-rule pattern gates and per-file severity overrides.
    pub fn apply_severity_policy(&self, diagnostics: &mut Vec<Diagnostic>, folders: &[Url]) {
        diagnostics.retain(|diagnostic| {
            self.rule_patterns
                .iter()
                .filter(|(rule, _)| rule == &diagnostic.code)
                .all(|(_, patterns)| patterns.matches_uri(&diagnostic.uri, folders))
        });
        for diagnostic in diagnostics.iter_mut() {
            for block in &self.overrides {
                if !block.files.matches_uri(&diagnostic.uri, folders) {
                    continue;
                }
                if let Some(SeverityOverride::Severity(level)) = block.rules.get(&diagnostic.code)
                {
                    diagnostic.severity = *level;
                }
            }
        }
        diagnostics.retain(|diagnostic| {
            !self.overrides.iter().any(|block| {
                block.files.matches_uri(&diagnostic.uri, folders)
                    && block.rules.get(&diagnostic.code) == Some(&SeverityOverride::Off)
            })
        });
    }
}

fn resolve_preset(name: &str, enabled: &mut BTreeSet<String>, path: &mut Vec<String>) {
    let short = name
        .strip_prefix("@telescope/")
        .unwrap_or(name)
        .to_string();
    if path.contains(&short) {
        return;
    }
    let Some((_, extends, rules)) = PRESETS.iter().find(|(preset, _, _)| *preset == short) else {
        warn!(preset = %name, "unknown ruleset preset; ignoring");
        return;
    };
    path.push(short);
    for parent in *extends {
        resolve_preset(parent, enabled, path);
    }
    for rule in *rules {
        enabled.insert((*rule).to_string());
    }
    path.pop();
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    openapi: OpenApiSection,
    #[serde(default, rename = "additionalValidation")]
    additional_validation: AdditionalValidationSection,
}

#[derive(Debug, Default, Deserialize)]
struct OpenApiSection {
    #[serde(default)]
    base: Vec<String>,
    #[serde(default)]
    patterns: Vec<String>,
    #[serde(default)]
    rules: Vec<RuleEntry>,
    #[serde(default, rename = "rulesOverrides")]
    rules_overrides: BTreeMap<String, String>,
    #[serde(default, rename = "customRules")]
    custom_rules: Vec<RuleEntry>,
    #[serde(default)]
    overrides: Vec<OverrideEntry>,
}

#[derive(Debug, Deserialize)]
struct RuleEntry {
    rule: String,
    pattern: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OverrideEntry {
    #[serde(default)]
    files: Vec<String>,
    #[serde(default)]
    rules: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct AdditionalValidationSection {
    #[serde(default)]
    groups: BTreeMap<String, GroupSection>,
}

#[derive(Debug, Default, Deserialize)]
struct GroupSection {
    #[serde(default)]
    patterns: Vec<String>,
    #[serde(default)]
    rules: Vec<RuleEntry>,
    #[serde(default)]
    schemas: Vec<SchemaEntry>,
}

#[derive(Debug, Deserialize)]
struct SchemaEntry {
    schema: String,
    pattern: Option<String>,
}
