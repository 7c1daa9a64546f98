//! RFC 6901 JSON Pointer utilities.
//!
//! Pointers are rooted at `#`: the root node's pointer is `"#"` and a child
//! reached by key `a` then index `0` is `"#/a/0"`. Tokens escape `~` as `~0`
//! and `/` as `~1`.

use std::borrow::Cow;

/// The root pointer.
pub const ROOT: &str = "#";

/// Escapes a single reference token (`~` → `~0`, `/` → `~1`).
#[must_use]
pub fn escape_token(token: &str) -> Cow<'_, str> {
    if token.contains(['~', '/']) {
        Cow::Owned(token.replace('~', "~0").replace('/', "~1"))
    } else {
        Cow::Borrowed(token)
    }
}

/// Unescapes a single reference token (`~1` → `/`, `~0` → `~`).
#[must_use]
pub fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// Appends a key token to a pointer.
#[must_use]
pub fn append(base: &str, token: &str) -> String {
    format!("{base}/{}", escape_token(token))
}

/// Appends an array index token to a pointer.
#[must_use]
pub fn append_index(base: &str, index: usize) -> String {
    format!("{base}/{index}")
}

/// Splits a pointer into unescaped reference tokens.
///
/// Accepts both `#/a/b` and bare `/a/b` forms; `#` and the empty string yield
/// no tokens.
#[must_use]
pub fn tokens(ptr: &str) -> Vec<String> {
    let body = ptr.strip_prefix('#').unwrap_or(ptr);
    let Some(body) = body.strip_prefix('/') else {
        return Vec::new();
    };
    body.split('/').map(unescape_token).collect()
}

/// Normalizes a `$ref` fragment into the `#`-rooted pointer form.
#[must_use]
pub fn from_fragment(fragment: &str) -> String {
    let body = fragment.strip_prefix('#').unwrap_or(fragment);
    if body.is_empty() {
        ROOT.to_string()
    } else if body.starts_with('/') {
        format!("#{body}")
    } else {
        format!("#/{body}")
    }
}

/// The final token of a pointer, unescaped.
#[must_use]
pub fn last_token(ptr: &str) -> Option<String> {
    tokens(ptr).pop()
}

/// The pointer one level up, or `None` for the root.
#[must_use]
pub fn parent(ptr: &str) -> Option<String> {
    let idx = ptr.rfind('/')?;
    if idx == 0 {
        return Some(ROOT.to_string());
    }
    Some(ptr[..idx].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_roundtrip() {
        let token = "a/b~c";
        assert_eq!(escape_token(token), "a~1b~0c");
        assert_eq!(unescape_token("a~1b~0c"), token);
    }

    #[test]
    fn append_escapes_tokens() {
        let ptr = append(ROOT, "paths");
        let ptr = append(&ptr, "/pets/{id}");
        assert_eq!(ptr, "#/paths/~1pets~1{id}");
        assert_eq!(tokens(&ptr), vec!["paths", "/pets/{id}"]);
    }

    #[test]
    fn root_has_no_tokens() {
        assert!(tokens(ROOT).is_empty());
        assert!(tokens("").is_empty());
    }

    #[test]
    fn parent_walks_up_one_level() {
        assert_eq!(parent("#/paths/~1pets/get").as_deref(), Some("#/paths/~1pets"));
        assert_eq!(parent("#/a").as_deref(), Some("#"));
        assert_eq!(parent("#"), None);
    }

    #[test]
    fn fragment_normalization() {
        assert_eq!(from_fragment("/components/schemas/Pet"), "#/components/schemas/Pet");
        assert_eq!(from_fragment("#/x"), "#/x");
        assert_eq!(from_fragment(""), "#");
    }
}
