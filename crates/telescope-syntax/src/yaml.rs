//! YAML 1.2 → IR lowering over the marked event stream.
//!
//! The parser's markers are character-indexed; a per-parse character→byte
//! table converts them so `Loc` spans stay byte-accurate for multibyte
//! sources. Scalar end offsets are recovered from the source text itself,
//! since the event stream only carries start markers.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use url::Url;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust2::scanner::{Marker, TScalarStyle};

use crate::error::ParseFailure;
use crate::ir::{self, DocFormat, IrDocument, IrKind, IrNode, Scalar};
use crate::loc::Loc;
use crate::pointer;

/// Parses YAML text into an [`IrDocument`].
///
/// Multi-document streams keep the first document. An empty stream lowers to
/// a null root so the classifier can reject it as non-OpenAPI.
///
/// # Errors
///
/// Returns [`ParseFailure`] on any scanner or parser error; no partial IR is
/// produced.
pub fn build_yaml(uri: Arc<Url>, text: &str) -> Result<IrDocument, ParseFailure> {
    let bytes = ByteMap::new(text);

    let mut collector = EventCollector::default();
    let mut parser = Parser::new_from_str(text);
    parser.load(&mut collector, false).map_err(|err| {
        ParseFailure::at(err.to_string(), bytes.byte_at(err.marker().index()))
    })?;

    let mut lowerer = Lowerer {
        events: collector.events,
        pos: 0,
        text,
        bytes,
        uri: Arc::clone(&uri),
        anchors: FxHashMap::default(),
    };
    let mut root = lowerer.lower_root()?;
    normalize_spans(&mut root);

    let version = ir::detect_version(&root);
    Ok(IrDocument {
        root,
        uri,
        format: DocFormat::Yaml,
        version,
        hash: crate::hash::sha1_hex(text.as_bytes()),
        mtime_ms: ir::now_ms(),
        raw_text: text.to_string(),
    })
}

/// Character-index → byte-offset table for one source text.
struct ByteMap {
    offsets: Vec<u32>,
    len: u32,
}

impl ByteMap {
    fn new(text: &str) -> Self {
        let mut offsets = Vec::with_capacity(text.len() + 1);
        for (byte_idx, _) in text.char_indices() {
            offsets.push(byte_idx as u32);
        }
        Self {
            offsets,
            len: text.len() as u32,
        }
    }

    fn byte_at(&self, char_idx: usize) -> u32 {
        self.offsets.get(char_idx).copied().unwrap_or(self.len)
    }
}

#[derive(Default)]
struct EventCollector {
    events: Vec<(Event, Marker)>,
}

impl MarkedEventReceiver for EventCollector {
    fn on_event(&mut self, ev: Event, mark: Marker) {
        self.events.push((ev, mark));
    }
}

/// Value recorded for an anchored node, replayed at alias sites.
#[derive(Clone)]
struct AnchorInfo {
    ptr: String,
    kind: IrKind,
    value: Option<Scalar>,
}

struct Lowerer<'a> {
    events: Vec<(Event, Marker)>,
    pos: usize,
    text: &'a str,
    bytes: ByteMap,
    uri: Arc<Url>,
    anchors: FxHashMap<usize, AnchorInfo>,
}

impl Lowerer<'_> {
    fn lower_root(&mut self) -> Result<IrNode, ParseFailure> {
        // Skip stream/document framing; the first content event is the root.
        while matches!(
            self.peek(),
            Some(Event::Nothing | Event::StreamStart | Event::DocumentStart)
        ) {
            self.pos += 1;
        }
        match self.peek() {
            None | Some(Event::StreamEnd | Event::DocumentEnd) => Ok(IrNode {
                ptr: pointer::ROOT.to_string(),
                kind: IrKind::Null,
                key: None,
                value: Some(Scalar::Null),
                children: Vec::new(),
                loc: Loc::default(),
                uri: Arc::clone(&self.uri),
                alias_target_ptr: None,
            }),
            _ => self.lower_value(pointer::ROOT.to_string()),
        }
    }

    fn peek(&self) -> Option<&Event> {
        self.events.get(self.pos).map(|(event, _)| event)
    }

    fn take(&mut self) -> (Event, u32) {
        let Some((slot, marker)) = self.events.get_mut(self.pos) else {
            return (Event::StreamEnd, self.bytes.len);
        };
        let event = std::mem::replace(slot, Event::Nothing);
        let offset = self.bytes.byte_at(marker.index());
        self.pos += 1;
        (event, offset)
    }

    /// Byte offset of the next pending event, used to bound scalar spans.
    fn next_bound(&self) -> u32 {
        self.events
            .get(self.pos)
            .map_or(self.bytes.len, |(_, marker)| {
                self.bytes.byte_at(marker.index())
            })
    }

    fn lower_value(&mut self, ptr: String) -> Result<IrNode, ParseFailure> {
        let (event, start) = self.take();
        match event {
            Event::Scalar(text, style, aid, ..) => {
                let end = self.scalar_end(start, &text, style);
                let (kind, value) = scalar_parts(&text, style);
                let node = IrNode {
                    ptr,
                    kind,
                    key: None,
                    value: Some(value),
                    children: Vec::new(),
                    loc: Loc::span(start, end),
                    uri: Arc::clone(&self.uri),
                    alias_target_ptr: None,
                };
                self.record_anchor(aid, &node);
                Ok(node)
            }
            Event::SequenceStart(aid, ..) => {
                let mut children = Vec::new();
                let end = loop {
                    if matches!(self.peek(), Some(Event::SequenceEnd) | None) {
                        break self.take().1;
                    }
                    let child_ptr = pointer::append_index(&ptr, children.len());
                    children.push(self.lower_value(child_ptr)?);
                };
                let node = IrNode {
                    ptr,
                    kind: IrKind::Array,
                    key: None,
                    value: None,
                    children,
                    loc: Loc::span(start, end.max(start)),
                    uri: Arc::clone(&self.uri),
                    alias_target_ptr: None,
                };
                self.record_anchor(aid, &node);
                Ok(node)
            }
            Event::MappingStart(aid, ..) => {
                let mut children = Vec::new();
                let end = loop {
                    if matches!(self.peek(), Some(Event::MappingEnd) | None) {
                        break self.take().1;
                    }
                    self.lower_pair(&ptr, &mut children)?;
                };
                ir::dedup_object_keys(&mut children);
                let node = IrNode {
                    ptr,
                    kind: IrKind::Object,
                    key: None,
                    value: None,
                    children,
                    loc: Loc::span(start, end.max(start)),
                    uri: Arc::clone(&self.uri),
                    alias_target_ptr: None,
                };
                self.record_anchor(aid, &node);
                Ok(node)
            }
            Event::Alias(aid) => {
                let info = self.anchors.get(&aid).cloned();
                let end = self.trimmed_bound(start);
                Ok(match info {
                    Some(info) => IrNode {
                        ptr,
                        kind: info.kind,
                        key: None,
                        value: info.value,
                        children: Vec::new(),
                        loc: Loc::span(start, end),
                        uri: Arc::clone(&self.uri),
                        alias_target_ptr: Some(info.ptr),
                    },
                    // Anchor outside the lowered scope: keep the node, drop the trace.
                    None => IrNode {
                        ptr,
                        kind: IrKind::Null,
                        key: None,
                        value: Some(Scalar::Null),
                        children: Vec::new(),
                        loc: Loc::span(start, end),
                        uri: Arc::clone(&self.uri),
                        alias_target_ptr: None,
                    },
                })
            }
            other => Err(ParseFailure::at(
                format!("unexpected YAML event {other:?}"),
                start,
            )),
        }
    }

    fn lower_pair(&mut self, parent_ptr: &str, children: &mut Vec<IrNode>) -> Result<(), ParseFailure> {
        if !matches!(self.peek(), Some(Event::Scalar(..))) {
            // Complex (non-scalar) mapping keys never occur in OpenAPI
            // documents; lower and discard the pair.
            let _ = self.lower_value(String::new())?;
            let _ = self.lower_value(String::new())?;
            return Ok(());
        }
        let (key_event, key_start) = self.take();
        let Event::Scalar(key_text, key_style, ..) = key_event else {
            return Ok(());
        };
        let key_end = self.scalar_end(key_start, &key_text, key_style);

        let child_ptr = pointer::append(parent_ptr, &key_text);
        let mut child = self.lower_value(child_ptr)?;
        let (val_start, val_end) = (child.loc.start, child.loc.end);
        child.key = Some(key_text);
        child.loc = Loc {
            start: key_start,
            end: val_end.max(key_end),
            key_start: Some(key_start),
            key_end: Some(key_end),
            val_start: Some(val_start),
            val_end: Some(val_end),
        };
        children.push(child);
        Ok(())
    }

    fn record_anchor(&mut self, aid: usize, node: &IrNode) {
        if aid > 0 {
            self.anchors.insert(
                aid,
                AnchorInfo {
                    ptr: node.ptr.clone(),
                    kind: node.kind,
                    value: node.value.clone(),
                },
            );
        }
    }

    /// End offset of a scalar that starts at `start`.
    fn scalar_end(&self, start: u32, value: &str, style: TScalarStyle) -> u32 {
        let rest = &self.text[start as usize..];
        match style {
            TScalarStyle::Plain => {
                // Plain scalars usually appear verbatim in the source.
                if rest.starts_with(value) {
                    start + value.len() as u32
                } else {
                    self.trimmed_bound(start)
                }
            }
            TScalarStyle::SingleQuoted | TScalarStyle::DoubleQuoted => {
                let quote = rest.chars().next().unwrap_or('"');
                let mut escaped = false;
                for (idx, ch) in rest.char_indices().skip(1) {
                    if escaped {
                        escaped = false;
                    } else if ch == '\\' && quote == '"' {
                        escaped = true;
                    } else if ch == quote {
                        return start + idx as u32 + ch.len_utf8() as u32;
                    }
                }
                self.trimmed_bound(start)
            }
            _ => self.trimmed_bound(start),
        }
    }

    /// Next event's offset, pulled back over trailing whitespace.
    fn trimmed_bound(&self, start: u32) -> u32 {
        let bound = self.next_bound().max(start);
        let slice = &self.text[start as usize..bound as usize];
        start + slice.trim_end().len() as u32
    }
}

/// Infers kind and payload from scalar text per the YAML 1.2 core schema.
fn scalar_parts(text: &str, style: TScalarStyle) -> (IrKind, Scalar) {
    if style != TScalarStyle::Plain {
        return (IrKind::String, Scalar::Str(text.to_string()));
    }
    match text {
        "" | "~" | "null" | "Null" | "NULL" => return (IrKind::Null, Scalar::Null),
        "true" | "True" | "TRUE" => return (IrKind::Boolean, Scalar::Bool(true)),
        "false" | "False" | "FALSE" => return (IrKind::Boolean, Scalar::Bool(false)),
        _ => {}
    }
    if let Ok(int) = text.parse::<i64>() {
        return (IrKind::Number, Scalar::Num(int as f64));
    }
    if let Ok(float) = text.parse::<f64>() {
        return (IrKind::Number, Scalar::Num(float));
    }
    (IrKind::String, Scalar::Str(text.to_string()))
}

/// Clamps event-marker overshoot so sibling spans stay ordered and parents
/// cover their children.
fn normalize_spans(node: &mut IrNode) {
    for child in &mut node.children {
        normalize_spans(child);
    }
    for idx in 0..node.children.len().saturating_sub(1) {
        let next_start = node.children[idx + 1].loc.start;
        let loc = &mut node.children[idx].loc;
        if loc.end > next_start && next_start >= loc.start {
            loc.end = next_start;
            if let Some(val_end) = loc.val_end.as_mut() {
                *val_end = (*val_end).min(next_start);
            }
        }
    }
    if let Some(last) = node.children.last() {
        node.loc.end = node.loc.end.max(last.loc.end);
    }
    node.loc.end = node.loc.end.max(node.loc.start);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> IrDocument {
        let uri = Arc::new(Url::parse("file:///spec.yaml").unwrap());
        build_yaml(uri, text).expect("valid yaml")
    }

    #[test]
    fn scalars_infer_core_schema_kinds() {
        let doc = parse("a: 1\nb: true\nc: ~\nd: text\ne: \"3.0\"\n");
        assert_eq!(doc.root.get("a").unwrap().kind, IrKind::Number);
        assert_eq!(doc.root.get("b").unwrap().as_bool(), Some(true));
        assert_eq!(doc.root.get("c").unwrap().kind, IrKind::Null);
        assert_eq!(doc.root.get("d").unwrap().as_str(), Some("text"));
        assert_eq!(doc.root.get("e").unwrap().as_str(), Some("3.0"));
    }

    #[test]
    fn key_and_value_spans_cover_source() {
        let text = "info:\n  title: Pets\n";
        let doc = parse(text);
        let title = doc.find_by_pointer("#/info/title").unwrap();
        let (key_start, key_end) = title.loc.key_range().unwrap();
        assert_eq!(&text[key_start as usize..key_end as usize], "title");
        let (val_start, val_end) = title.loc.value_range();
        assert_eq!(&text[val_start as usize..val_end as usize], "Pets");
    }

    #[test]
    fn parse_error_reports_failure() {
        let uri = Arc::new(Url::parse("file:///bad.yaml").unwrap());
        let err = build_yaml(uri, "a: [1, 2\n").unwrap_err();
        assert!(!err.message.is_empty());
    }

    #[test]
    fn alias_records_anchor_pointer() {
        let doc = parse("base: &shared\n  a: 1\nother: *shared\n");
        let other = doc.root.get("other").unwrap();
        assert_eq!(other.kind, IrKind::Object);
        assert_eq!(other.alias_target_ptr.as_deref(), Some("#/base"));
    }

    #[test]
    fn duplicate_keys_keep_last() {
        let doc = parse("a: 1\na: 2\n");
        assert_eq!(doc.root.children.len(), 1);
        assert_eq!(doc.root.get("a").unwrap().as_f64(), Some(2.0));
    }

    #[test]
    fn empty_stream_lowers_to_null_root() {
        let doc = parse("");
        assert_eq!(doc.root.kind, IrKind::Null);
    }
}
