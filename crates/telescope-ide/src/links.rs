//! Document links for external `$ref` targets.

use telescope_hir::{uri as hir_uri, Position, Range, Workspace};
use url::Url;

/// A clickable link over a `$ref` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLink {
    /// Range of the reference string.
    pub range: Range,
    /// Link target, with the pointer restored as a fragment.
    pub target: Url,
}

/// Emits one link per external `$ref` in the document.
///
/// Remote targets link as written; file targets link to the resolved URI.
/// Same-document references produce no link (the editor's outline already
/// covers those).
#[must_use]
pub fn document_links(workspace: &Workspace, uri: &Url) -> Vec<DocumentLink> {
    let uri = hir_uri::normalize(uri);
    let Some(entry) = workspace.entry(&uri) else {
        return Vec::new();
    };

    let mut links = Vec::new();
    for edge in workspace.graph().edges_from(&uri) {
        if !edge.remote && edge.target_uri == uri {
            continue;
        }
        let Ok(node) = entry.ir.find_by_pointer(&edge.from_pointer) else {
            continue;
        };
        let (start, end) = node.loc.value_range();
        let (start_line, start_col) = entry.line_index.position(start);
        let (end_line, end_col) = entry.line_index.position(end);

        let mut target = edge.target_uri.clone();
        if let Some(fragment) = edge
            .target_pointer
            .as_deref()
            .and_then(|ptr| ptr.strip_prefix('#'))
            .filter(|rest| !rest.is_empty())
        {
            target.set_fragment(Some(fragment));
        }
        links.push(DocumentLink {
            range: Range::new(
                Position::new(start_line, start_col),
                Position::new(end_line, end_col),
            ),
            target,
        });
    }
    links
}
