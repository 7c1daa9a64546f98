//! The cross-file `operationId` occurrence index.

use std::collections::BTreeSet;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use url::Url;

use crate::atoms::OperationAtom;

/// One occurrence of an `operationId`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOccurrence {
    /// Document containing the operation.
    pub uri: Arc<Url>,
    /// Pointer to the operation object.
    pub pointer: String,
}

/// Tracks, per `operationId`, every `(uri, pointer)` occurrence.
#[derive(Debug, Default)]
pub struct OperationIdIndex {
    by_id: FxHashMap<String, Vec<OperationOccurrence>>,
}

impl OperationIdIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all occurrences contributed by `uri`.
    ///
    /// Returns the set of operation IDs whose occurrence set changed, which
    /// callers fold into the affected-URI computation.
    pub fn replace_for_uri(&mut self, uri: &Url, operations: &[OperationAtom]) -> BTreeSet<String> {
        let mut old_counts: FxHashMap<&str, usize> = FxHashMap::default();
        for (id, occurrences) in &self.by_id {
            let count = occurrences
                .iter()
                .filter(|occ| occ.uri.as_ref() == uri)
                .count();
            if count > 0 {
                old_counts.insert(id.as_str(), count);
            }
        }

        let mut new_counts: FxHashMap<&str, usize> = FxHashMap::default();
        for operation in operations {
            if let Some(id) = operation.operation_id.as_deref() {
                *new_counts.entry(id).or_default() += 1;
            }
        }

        let mut changed: BTreeSet<String> = BTreeSet::new();
        for (id, count) in &old_counts {
            if new_counts.get(id) != Some(count) {
                changed.insert((*id).to_string());
            }
        }
        for (id, count) in &new_counts {
            if old_counts.get(id) != Some(count) {
                changed.insert((*id).to_string());
            }
        }

        for occurrences in self.by_id.values_mut() {
            occurrences.retain(|occ| occ.uri.as_ref() != uri);
        }
        self.by_id.retain(|_, occurrences| !occurrences.is_empty());

        for operation in operations {
            let Some(id) = operation.operation_id.as_deref() else {
                continue;
            };
            self.by_id
                .entry(id.to_string())
                .or_default()
                .push(OperationOccurrence {
                    uri: Arc::clone(&operation.uri),
                    pointer: operation.pointer.clone(),
                });
        }

        changed
    }

    /// Removes every occurrence contributed by `uri`.
    pub fn remove_uri(&mut self, uri: &Url) -> BTreeSet<String> {
        self.replace_for_uri(uri, &[])
    }

    /// All occurrences of one operation ID.
    #[must_use]
    pub fn occurrences(&self, operation_id: &str) -> &[OperationOccurrence] {
        self.by_id
            .get(operation_id)
            .map_or(&[], Vec::as_slice)
    }

    /// True when the ID occurs at most once across the workspace.
    #[must_use]
    pub fn is_unique(&self, operation_id: &str) -> bool {
        self.occurrences(operation_id).len() <= 1
    }

    /// Unique URIs containing any of `ids`.
    #[must_use]
    pub fn uris_with_ids<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a String>,
    ) -> BTreeSet<Url> {
        let mut uris = BTreeSet::new();
        for id in ids {
            for occurrence in self.occurrences(id) {
                uris.insert(occurrence.uri.as_ref().clone());
            }
        }
        uris
    }

    /// Drops all state.
    pub fn clear(&mut self) {
        self.by_id.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(uri: &Arc<Url>, id: &str, pointer: &str) -> OperationAtom {
        OperationAtom {
            uri: Arc::clone(uri),
            path: "/p".to_string(),
            method: "get".to_string(),
            pointer: pointer.to_string(),
            operation_id: Some(id.to_string()),
        }
    }

    #[test]
    fn replace_reports_changed_ids() {
        let a = Arc::new(Url::parse("file:///a.yaml").unwrap());
        let b = Arc::new(Url::parse("file:///b.yaml").unwrap());
        let mut index = OperationIdIndex::new();

        let changed = index.replace_for_uri(&a, &[op(&a, "listPets", "#/paths/~1p/get")]);
        assert_eq!(changed, BTreeSet::from(["listPets".to_string()]));
        assert!(index.is_unique("listPets"));

        let changed = index.replace_for_uri(&b, &[op(&b, "listPets", "#/paths/~1p/get")]);
        assert_eq!(changed, BTreeSet::from(["listPets".to_string()]));
        assert!(!index.is_unique("listPets"));
        assert_eq!(index.occurrences("listPets").len(), 2);

        // Re-sending identical content is not a change.
        let changed = index.replace_for_uri(&b, &[op(&b, "listPets", "#/paths/~1p/get")]);
        assert!(changed.is_empty());

        let changed = index.remove_uri(&b);
        assert_eq!(changed, BTreeSet::from(["listPets".to_string()]));
        assert!(index.is_unique("listPets"));
    }

    #[test]
    fn uris_with_ids_collects_all_occurrences() {
        let a = Arc::new(Url::parse("file:///a.yaml").unwrap());
        let b = Arc::new(Url::parse("file:///b.yaml").unwrap());
        let mut index = OperationIdIndex::new();
        index.replace_for_uri(&a, &[op(&a, "x", "#/1")]);
        index.replace_for_uri(&b, &[op(&b, "x", "#/2")]);

        let ids = vec!["x".to_string()];
        let uris = index.uris_with_ids(&ids);
        assert_eq!(uris.len(), 2);
    }
}
