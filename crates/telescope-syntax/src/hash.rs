//! Content hashing helpers.

use sha1::{Digest, Sha1};
use std::fmt::Write;

/// SHA-1 of `bytes`, rendered as lowercase hex.
///
/// Used for document content hashes, result identifiers, and config/ruleset
/// signatures; collision resistance is not a requirement here, only cheap
/// change detection.
#[must_use]
pub fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digest() {
        assert_eq!(
            sha1_hex(b"hello"),
            "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d"
        );
    }

    #[test]
    fn stable_across_calls() {
        assert_eq!(sha1_hex(b"openapi"), sha1_hex(b"openapi"));
        assert_ne!(sha1_hex(b"a"), sha1_hex(b"b"));
    }
}
