//! The bounded, LRU document store.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use telescope_syntax::{IrDocument, LineIndex};
use url::Url;

use crate::atoms::AtomIndex;
use crate::classify::DocumentType;

/// Everything cached for one parsed document.
#[derive(Debug, Clone)]
pub struct DocumentEntry {
    /// The parsed IR.
    pub ir: Arc<IrDocument>,
    /// Extracted atoms.
    pub atoms: Arc<AtomIndex>,
    /// Classification of the document.
    pub doc_type: DocumentType,
    /// Cached line-start offsets.
    pub line_index: Arc<LineIndex>,
    /// Editor-supplied document version, when the buffer is open.
    pub version: Option<i32>,
}

impl DocumentEntry {
    /// The document URI.
    #[must_use]
    pub fn uri(&self) -> &Arc<Url> {
        &self.ir.uri
    }
}

/// LRU-bounded cache of parsed documents keyed by normalized URI.
#[derive(Debug)]
pub struct DocumentStore {
    cache: LruCache<Url, Arc<DocumentEntry>>,
}

impl DocumentStore {
    /// Default capacity in documents.
    pub const DEFAULT_CAPACITY: usize = 500;

    /// Creates a store bounded to `capacity` documents (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
        }
    }

    /// Inserts or replaces an entry.
    ///
    /// Returns the URI evicted to make room, if the bound was exceeded.
    pub fn insert(&mut self, uri: Url, entry: Arc<DocumentEntry>) -> Option<Url> {
        match self.cache.push(uri.clone(), entry) {
            Some((evicted, _)) if evicted != uri => Some(evicted),
            _ => None,
        }
    }

    /// Fetches an entry and bumps its recency.
    pub fn get(&mut self, uri: &Url) -> Option<Arc<DocumentEntry>> {
        self.cache.get(uri).cloned()
    }

    /// Fetches an entry without touching recency (for read-only passes).
    #[must_use]
    pub fn peek(&self, uri: &Url) -> Option<&Arc<DocumentEntry>> {
        self.cache.peek(uri)
    }

    /// Removes an entry.
    pub fn remove(&mut self, uri: &Url) -> Option<Arc<DocumentEntry>> {
        self.cache.pop(uri)
    }

    /// Returns true if the URI is cached.
    #[must_use]
    pub fn contains(&self, uri: &Url) -> bool {
        self.cache.contains(uri)
    }

    /// Number of cached documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Returns true when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Iterates cached URIs, most recently used first.
    pub fn uris(&self) -> impl Iterator<Item = &Url> {
        self.cache.iter().map(|(uri, _)| uri)
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::extract_atoms;
    use crate::classify::identify_type;
    use telescope_syntax::build_yaml;

    fn entry(uri: &Url) -> Arc<DocumentEntry> {
        let uri = Arc::new(uri.clone());
        let ir = build_yaml(uri, "openapi: 3.0.0\n").unwrap();
        let doc_type = identify_type(&ir.root);
        let atoms = extract_atoms(&ir, doc_type);
        let line_index = LineIndex::new(&ir.raw_text);
        Arc::new(DocumentEntry {
            ir: Arc::new(ir),
            atoms: Arc::new(atoms),
            doc_type,
            line_index: Arc::new(line_index),
            version: None,
        })
    }

    #[test]
    fn evicts_least_recently_used() {
        let a = Url::parse("file:///a.yaml").unwrap();
        let b = Url::parse("file:///b.yaml").unwrap();
        let c = Url::parse("file:///c.yaml").unwrap();

        let mut store = DocumentStore::new(2);
        assert_eq!(store.insert(a.clone(), entry(&a)), None);
        assert_eq!(store.insert(b.clone(), entry(&b)), None);

        // Touch `a` so `b` becomes the eviction candidate.
        assert!(store.get(&a).is_some());
        assert_eq!(store.insert(c.clone(), entry(&c)), Some(b.clone()));
        assert!(store.contains(&a));
        assert!(!store.contains(&b));
    }

    #[test]
    fn replacing_same_uri_does_not_evict() {
        let a = Url::parse("file:///a.yaml").unwrap();
        let mut store = DocumentStore::new(1);
        assert_eq!(store.insert(a.clone(), entry(&a)), None);
        assert_eq!(store.insert(a.clone(), entry(&a)), None);
        assert_eq!(store.len(), 1);
    }
}
