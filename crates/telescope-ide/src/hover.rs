//! Hover previews for `$ref` targets.

use percent_encoding::percent_decode_str;
use telescope_hir::{uri as hir_uri, Position, Range, Workspace};
use url::Url;

/// Maximum number of excerpt lines rendered in a preview.
const MAX_EXCERPT_LINES: usize = 12;

/// A rendered hover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hover {
    /// Markdown content: target header plus a fenced excerpt.
    pub markdown: String,
    /// Range of the `$ref` the hover applies to.
    pub range: Range,
}

/// Resolves the `$ref` under `position` and renders a preview of its target.
///
/// Returns `None` when the position is not on a reference, or the reference
/// does not resolve to a loaded document.
#[must_use]
pub fn hover_for_ref(workspace: &Workspace, uri: &Url, position: Position) -> Option<Hover> {
    let uri = hir_uri::normalize(uri);
    let entry = workspace.entry(&uri)?;
    let offset = entry.line_index.offset(position.line, position.character);

    let (ref_node, raw) = entry.atoms.references.iter().find_map(|reference| {
        let node = entry.ir.find_by_pointer(&reference.pointer).ok()?;
        node.loc.contains(offset).then_some((node, &reference.raw))
    })?;

    let resolved = workspace.deref(&uri, raw).ok()?;
    let target = &resolved.entry;
    let target_node = resolved.node()?;

    let text = &target.ir.raw_text;
    let (start_line, _) = target.line_index.position(target_node.loc.start);
    let (end_line, _) = target.line_index.position(target_node.loc.end.max(target_node.loc.start));
    let total = end_line as usize - start_line as usize + 1;
    let shown = total.min(MAX_EXCERPT_LINES);

    let mut excerpt = String::new();
    for line in text.lines().skip(start_line as usize).take(shown) {
        excerpt.push_str(line);
        excerpt.push('\n');
    }
    if total > shown {
        excerpt.push_str("…\n");
    }

    let markdown = format!(
        "**{}**`{}`\n\n```{}\n{}```",
        file_label(target.uri()),
        resolved.pointer,
        target.ir.format.fence_label(),
        excerpt,
    );

    let (value_start, value_end) = ref_node.loc.value_range();
    let (line, col) = entry.line_index.position(value_start);
    let (end_line, end_col) = entry.line_index.position(value_end);
    Some(Hover {
        markdown,
        range: Range::new(Position::new(line, col), Position::new(end_line, end_col)),
    })
}

/// Display name of a document: its decoded final path segment.
fn file_label(uri: &Url) -> String {
    let segment = uri
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .unwrap_or_else(|| uri.path());
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hover_renders_target_excerpt() {
        let mut workspace = Workspace::default();
        let main = Url::parse("file:///api/main.yaml").unwrap();
        let model = Url::parse("file:///api/pet.yaml").unwrap();

        workspace.update_document(
            &main,
            "paths:\n  /pets:\n    $ref: './pet.yaml#/Pet'\n",
            "yaml",
            None,
        );
        workspace.update_document(
            &model,
            "Pet:\n  type: object\n  properties:\n    name:\n      type: string\n",
            "yaml",
            None,
        );

        // Position on the `$ref` value (line 2).
        let hover = hover_for_ref(&workspace, &main, Position::new(2, 10)).unwrap();
        assert!(hover.markdown.contains("**pet.yaml**"));
        assert!(hover.markdown.contains("#/Pet"));
        assert!(hover.markdown.contains("```yaml"));
        assert!(hover.markdown.contains("type: object"));
        assert_eq!(hover.range.start.line, 2);
    }

    #[test]
    fn hover_off_reference_is_none() {
        let mut workspace = Workspace::default();
        let main = Url::parse("file:///api/main.yaml").unwrap();
        workspace.update_document(&main, "info:\n  title: t\n", "yaml", None);
        assert!(hover_for_ref(&workspace, &main, Position::new(1, 4)).is_none());
    }
}
