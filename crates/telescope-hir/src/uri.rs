//! URI normalization and `$ref` target resolution.
//!
//! Document identity is the fragment-free URI; percent-encoding is preserved
//! exactly as written. Relative references resolve against the *directory* of
//! the referencing document, and workspace-absolute references (leading `/`)
//! resolve against the workspace root.

use telescope_syntax::pointer;
use url::Url;

/// A resolved `$ref` target: document identity plus optional pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefTarget {
    /// Fragment-free target document URI.
    pub uri: Url,
    /// `#`-rooted pointer from the fragment, if one was given.
    pub pointer: Option<String>,
    /// True for `http(s)` targets, which are recorded but never loaded.
    pub remote: bool,
}

/// Strips the fragment from a URI, leaving percent-encoding untouched.
#[must_use]
pub fn normalize(uri: &Url) -> Url {
    if uri.fragment().is_none() {
        return uri.clone();
    }
    let mut normalized = uri.clone();
    normalized.set_fragment(None);
    normalized
}

/// Returns true for `http://` / `https://` URIs.
#[must_use]
pub fn is_remote(uri: &Url) -> bool {
    matches!(uri.scheme(), "http" | "https")
}

/// Resolves a raw `$ref` string against its origin document.
///
/// - `#/...` stays within `base`
/// - absolute URIs are taken as-is (`http(s)` ones marked remote)
/// - `/...` resolves against `workspace_root` when one is known
/// - anything else resolves relative to the directory of `base`
///
/// Returns `None` when the reference cannot be parsed as a URI at all.
#[must_use]
pub fn resolve_reference(
    base: &Url,
    raw: &str,
    workspace_root: Option<&Url>,
) -> Option<RefTarget> {
    let (path_part, fragment) = match raw.split_once('#') {
        Some((path, fragment)) => (path, Some(fragment)),
        None => (raw, None),
    };
    let pointer = fragment.map(pointer::from_fragment);

    if path_part.is_empty() {
        return Some(RefTarget {
            uri: normalize(base),
            pointer,
            remote: false,
        });
    }

    let target = match Url::parse(path_part) {
        Ok(absolute) => absolute,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            if let Some(root) = workspace_root.filter(|_| path_part.starts_with('/')) {
                join_under(root, path_part.trim_start_matches('/'))?
            } else {
                base.join(path_part).ok()?
            }
        }
        Err(_) => return None,
    };

    let remote = is_remote(&target);
    Some(RefTarget {
        uri: normalize(&target),
        pointer,
        remote,
    })
}

/// Joins a relative path under a directory-like base URI.
fn join_under(base: &Url, relative: &str) -> Option<Url> {
    if base.path().ends_with('/') {
        base.join(relative).ok()
    } else {
        let mut dir = base.clone();
        dir.set_path(&format!("{}/", base.path()));
        dir.join(relative).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("file:///work/api/main.yaml").unwrap()
    }

    #[test]
    fn same_document_fragment() {
        let target = resolve_reference(&base(), "#/components/schemas/Pet", None).unwrap();
        assert_eq!(target.uri.as_str(), "file:///work/api/main.yaml");
        assert_eq!(target.pointer.as_deref(), Some("#/components/schemas/Pet"));
        assert!(!target.remote);
    }

    #[test]
    fn relative_paths_resolve_against_source_directory() {
        let target = resolve_reference(&base(), "./sub.yaml#/x", None).unwrap();
        assert_eq!(target.uri.as_str(), "file:///work/api/sub.yaml");
        assert_eq!(target.pointer.as_deref(), Some("#/x"));

        let target = resolve_reference(&base(), "../shared/errors.yaml", None).unwrap();
        assert_eq!(target.uri.as_str(), "file:///work/shared/errors.yaml");
        assert_eq!(target.pointer, None);
    }

    #[test]
    fn leading_slash_resolves_against_workspace_root() {
        let root = Url::parse("file:///work").unwrap();
        let target = resolve_reference(&base(), "/models/pet.yaml", Some(&root)).unwrap();
        assert_eq!(target.uri.as_str(), "file:///work/models/pet.yaml");
    }

    #[test]
    fn remote_targets_are_flagged() {
        let target =
            resolve_reference(&base(), "https://example.com/openapi.yaml#/info", None).unwrap();
        assert!(target.remote);
        assert_eq!(target.uri.as_str(), "https://example.com/openapi.yaml");
        assert_eq!(target.pointer.as_deref(), Some("#/info"));
    }

    #[test]
    fn normalize_strips_fragment_only() {
        let uri = Url::parse("file:///work/a%20b.yaml#/x").unwrap();
        let normalized = normalize(&uri);
        assert_eq!(normalized.as_str(), "file:///work/a%20b.yaml");
    }
}
