/*!
 * HTML segmentation and reassembly.
 *
 * Article HTML is split into translatable block-level segments. Only the
 * leaf-most translatable elements are emitted: a `<li>` wrapping a `<p>`
 * yields the `<p>` alone. Reassembly writes each segment's translation
 * back into the element it came from, leaving the rest of the document
 * intact.
 */

use html5ever::parse_document;
use html5ever::serialize::{SerializeOpts, TraversalScope, serialize};
use html5ever::tendril::{StrTendril, TendrilSink};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

use crate::errors::SegmentError;

/// Block-level elements whose text is translated
pub const TRANSLATABLE_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "blockquote", "figcaption", "td", "th",
];

/// One translatable unit of an article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Position used for reassembly
    pub index: usize,
    /// Element tag name
    pub tag: String,
    /// Plain text content
    pub text: String,
    /// Original element markup including attributes
    pub inner_html: String,
    /// Translated text, once available
    pub translated: Option<String>,
    /// Set when a human should look at this segment
    pub needs_review: bool,
}

impl Segment {
    pub fn new(index: usize, tag: impl Into<String>, text: impl Into<String>, inner_html: impl Into<String>) -> Self {
        Self {
            index,
            tag: tag.into(),
            text: text.into(),
            inner_html: inner_html.into(),
            translated: None,
            needs_review: false,
        }
    }

    /// The original opening tag with its attributes, e.g. `<p class="lead">`.
    ///
    /// Falls back to a bare tag when the stored markup has no closing `>`.
    pub fn opening_tag(&self) -> String {
        let mut quote: Option<char> = None;
        for (i, c) in self.inner_html.char_indices() {
            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '"') | (None, '\'') => quote = Some(c),
                (None, '>') => return self.inner_html[..=i].to_string(),
                (None, _) => {}
            }
        }
        format!("<{}>", self.tag)
    }

    /// Text to render: the translation when present, the source otherwise
    pub fn output_text(&self) -> &str {
        self.translated.as_deref().unwrap_or(&self.text)
    }

    /// Mark the segment untranslated and in need of review
    pub fn flag_untranslated(&mut self) {
        self.translated = Some(self.text.clone());
        self.needs_review = true;
    }
}

fn is_translatable(tag: &str) -> bool {
    TRANSLATABLE_TAGS.contains(&tag)
}

fn element_name(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.to_string()),
        _ => None,
    }
}

fn has_translatable_descendant(node: &Handle) -> bool {
    node.children.borrow().iter().any(|child| {
        element_name(child).is_some_and(|tag| is_translatable(&tag)) || has_translatable_descendant(child)
    })
}

fn collect_text(node: &Handle, parts: &mut Vec<String>) {
    for child in node.children.borrow().iter() {
        match &child.data {
            NodeData::Text { contents } => {
                let text = contents.borrow();
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    parts.push(trimmed.to_string());
                }
            }
            NodeData::Element { .. } => collect_text(child, parts),
            _ => {}
        }
    }
}

fn serialize_node(node: &Handle, tag: &str, traversal_scope: TraversalScope) -> Result<String, SegmentError> {
    let mut buf: Vec<u8> = Vec::new();
    let opts = SerializeOpts {
        traversal_scope,
        ..Default::default()
    };
    serialize(&mut buf, &SerializableHandle::from(node.clone()), opts).map_err(|e| SegmentError::Serialize {
        tag: tag.to_string(),
        message: e.to_string(),
    })?;
    String::from_utf8(buf).map_err(|e| SegmentError::Serialize {
        tag: tag.to_string(),
        message: e.to_string(),
    })
}

/// A leaf-most translatable element with its tag and extracted text
struct SegmentNode {
    handle: Handle,
    tag: String,
    text: String,
}

fn collect_segment_nodes(node: &Handle, found: &mut Vec<SegmentNode>) {
    if let Some(tag) = element_name(node) {
        if is_translatable(&tag) && !has_translatable_descendant(node) {
            let mut parts = Vec::new();
            collect_text(node, &mut parts);
            let text = parts.join(" ");
            if !text.is_empty() {
                found.push(SegmentNode {
                    handle: node.clone(),
                    tag,
                    text,
                });
            }
            return;
        }
    }

    for child in node.children.borrow().iter() {
        collect_segment_nodes(child, found);
    }
}

fn parse(html: &str) -> RcDom {
    parse_document(RcDom::default(), Default::default()).one(html)
}

/// Split HTML into translatable segments, in document order.
pub fn segment_html(html: &str) -> Result<Vec<Segment>, SegmentError> {
    let dom = parse(html);
    let mut found = Vec::new();
    collect_segment_nodes(&dom.document, &mut found);

    found
        .into_iter()
        .enumerate()
        .map(|(index, node)| {
            let inner_html = serialize_node(&node.handle, &node.tag, TraversalScope::IncludeNode)?;
            Ok(Segment::new(index, node.tag, node.text, inner_html))
        })
        .collect()
}

fn find_element(node: &Handle, name: &str) -> Option<Handle> {
    if element_name(node).as_deref() == Some(name) {
        return Some(node.clone());
    }
    node.children.borrow().iter().find_map(|child| find_element(child, name))
}

/// Replace every child of `node` with a single text node
fn replace_children_with_text(node: &Handle, text: &str) {
    let text_node = Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from_slice(text)),
    });
    text_node.parent.set(Some(Rc::downgrade(node)));

    let mut children = node.children.borrow_mut();
    for child in children.iter() {
        child.parent.set(None);
    }
    children.clear();
    children.push(text_node);
}

fn is_full_document(html: &str) -> bool {
    let head = html.trim_start().get(..9).unwrap_or_default().to_ascii_lowercase();
    head.starts_with("<!doctype") || head.starts_with("<html")
}

/// Rebuild the source document with each segment's output text.
///
/// The source is parsed again and segment `i` is matched to the `i`-th
/// segment element, so everything outside the segments (containers, tables,
/// images, inline markup of untranslated segments) is kept as is. Segments
/// without a translation are left untouched. A fragment comes back as a
/// fragment; a full document keeps its doctype and head.
pub fn reassemble_html(source_html: &str, segments: &[Segment]) -> Result<String, SegmentError> {
    let dom = parse(source_html);
    let mut found = Vec::new();
    collect_segment_nodes(&dom.document, &mut found);

    for segment in segments {
        if let (Some(node), Some(translated)) = (found.get(segment.index), segment.translated.as_deref()) {
            replace_children_with_text(&node.handle, translated);
        }
    }

    if is_full_document(source_html) {
        return serialize_node(&dom.document, "#document", TraversalScope::ChildrenOnly(None));
    }
    match find_element(&dom.document, "body") {
        Some(body) => serialize_node(&body, "body", TraversalScope::ChildrenOnly(None)),
        None => Ok(String::new()),
    }
}
