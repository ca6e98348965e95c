//! Mutable document arena.
//!
//! `scraper` parses HTML into an immutable tree; the annotator needs to insert badges,
//! rewrite inline styles and observe added nodes. Pages are imported once into this
//! arena, mutated in place, and re-serialized on demand. CSS selectors are evaluated
//! through a [`Snapshot`]: the arena is written back out with a node-id attribute on
//! every element, re-parsed by `scraper`, and matches are mapped back to [`NodeId`]s.

use newsbadge_core::{Error, Result};
use std::collections::HashSet;
use std::fmt::Write as _;

/// Attribute carrying arena ids inside a snapshot. Never present in rendered output.
const SNAPSHOT_ID_ATTR: &str = "data-newsbadge-node";

const VOID_TAGS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Not part of the visible text.
const RAW_TEXT_TAGS: [&str; 3] = ["script", "style", "noscript"];

/// Children parse as one raw text node and are written back unescaped.
const RAW_SERIALIZE_TAGS: [&str; 8] = [
    "script", "style", "noscript", "xmp", "iframe", "noembed", "noframes", "plaintext",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct ElementData {
    pub tag: String,
    attrs: Vec<(String, String)>,
}

impl ElementData {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Document,
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    /// Roots of subtrees inserted through `append_html`, oldest first.
    added: Vec<NodeId>,
}

impl Document {
    pub fn parse(html: &str) -> Self {
        let parsed = html_scraper::Html::parse_document(html);
        let mut doc = Self::empty();
        let root = doc.root();
        let html_el = parsed.root_element();
        let id = doc.push_element(root, html_el.value().name(), html_el.value().attrs());
        doc.import_children(id, html_el);
        doc
    }

    fn empty() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
            added: Vec::new(),
        }
    }

    fn import_children(&mut self, parent: NodeId, el: html_scraper::ElementRef<'_>) {
        for child in el.children() {
            if let Some(child_el) = html_scraper::ElementRef::wrap(child) {
                let id =
                    self.push_element(parent, child_el.value().name(), child_el.value().attrs());
                self.import_children(id, child_el);
            } else if let Some(text) = child.value().as_text() {
                let id = self.alloc(NodeKind::Text(text.to_string()));
                self.attach(parent, id);
            }
        }
    }

    fn push_element<'a>(
        &mut self,
        parent: NodeId,
        tag: &str,
        attrs: impl Iterator<Item = (&'a str, &'a str)>,
    ) -> NodeId {
        let attrs = attrs
            .filter(|(k, _)| *k != SNAPSHOT_ID_ATTR)
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let id = self.alloc(NodeKind::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attrs,
        }));
        self.attach(parent, id);
        id
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.node(id)?.kind {
            NodeKind::Element(e) => Some(e),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes.get_mut(id.0)?.kind {
            NodeKind::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag.as_str())
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attr(name)
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        let Some(el) = self.element_mut(id) else {
            return;
        };
        match el.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => el.attrs.push((name.to_string(), value.to_string())),
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Some(el) = self.element_mut(id) {
            el.attrs.retain(|(k, _)| k != name);
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .map(|c| c.split_whitespace().any(|x| x == class))
            .unwrap_or(false)
    }

    /// Lower-cased `class` + `id` + `role` haystack for substring heuristics.
    pub fn class_id_role_lc(&self, id: NodeId) -> String {
        let mut out = String::new();
        for name in ["class", "id", "role"] {
            if let Some(v) = self.attr(id, name) {
                out.push_str(v);
                out.push(' ');
            }
        }
        out.to_ascii_lowercase()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Parent chain, nearest first, excluding `id` itself and the document node.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |p| self.parent(*p))
            .filter(move |p| self.element(*p).is_some())
    }

    /// True while the node is reachable from the document root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut cur = Some(id);
        while let Some(c) = cur {
            if c == self.root() {
                return true;
            }
            cur = self.parent(c);
        }
        false
    }

    /// Pre-order element descendants of `id` (excluding `id`).
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            if self.element(n).is_some() {
                out.push(n);
                stack.extend(self.children(n).iter().rev().copied());
            }
        }
        out
    }

    pub fn first_element_by_tag(&self, tag: &str) -> Option<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .find(|n| self.tag(*n) == Some(tag))
    }

    pub fn body(&self) -> Option<NodeId> {
        self.first_element_by_tag("body")
    }

    pub fn head(&self) -> Option<NodeId> {
        self.first_element_by_tag("head")
    }

    /// Whitespace-normalized text content, skipping `script`/`style` and any subtree
    /// for which `skip` returns true.
    pub fn text_with(&self, id: NodeId, skip: &dyn Fn(&Document, NodeId) -> bool) -> String {
        let mut raw = String::new();
        self.collect_text(id, skip, &mut raw);
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    pub fn text(&self, id: NodeId) -> String {
        self.text_with(id, &|_, _| false)
    }

    fn collect_text(
        &self,
        id: NodeId,
        skip: &dyn Fn(&Document, NodeId) -> bool,
        out: &mut String,
    ) {
        let Some(node) = self.node(id) else {
            return;
        };
        match &node.kind {
            NodeKind::Text(t) => {
                out.push_str(t);
            }
            NodeKind::Element(e) => {
                if RAW_TEXT_TAGS.contains(&e.tag.as_str()) || skip(self, id) {
                    return;
                }
                for c in &node.children {
                    self.collect_text(*c, skip, out);
                }
                out.push(' ');
            }
            NodeKind::Document => {
                for c in &node.children {
                    self.collect_text(*c, skip, out);
                }
            }
        }
    }

    /// Inline style property value (last declaration wins), lower-cased name match.
    pub fn style(&self, id: NodeId, prop: &str) -> Option<String> {
        let style = self.attr(id, "style")?;
        parse_declarations(style)
            .into_iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(prop))
            .map(|(_, v)| v)
    }

    /// Set (`Some`) or clear (`None`) one inline style property, keeping the others.
    pub fn set_style(&mut self, id: NodeId, prop: &str, value: Option<&str>) {
        let mut decls = self
            .attr(id, "style")
            .map(parse_declarations)
            .unwrap_or_default();
        decls.retain(|(k, _)| !k.eq_ignore_ascii_case(prop));
        if let Some(v) = value {
            decls.push((prop.to_string(), v.to_string()));
        }
        if decls.is_empty() {
            self.remove_attr(id, "style");
        } else {
            let s = decls
                .iter()
                .map(|(k, v)| format!("{k}: {v}"))
                .collect::<Vec<_>>()
                .join("; ");
            self.set_attr(id, "style", &s);
        }
    }

    /// Create a detached element. Attach it with `append_child`.
    pub fn create_element(&mut self, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        self.alloc(NodeKind::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeKind::Text(text.to_string()))
    }

    /// Attach `child` as the last child of `parent`, detaching it first if needed.
    /// Not reported to mutation observers.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.remove(child);
        self.attach(parent, child);
    }

    /// Detach `id` from its parent. The subtree stays allocated but unreachable.
    pub fn remove(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        self.nodes[parent.0].children.retain(|c| *c != id);
        self.nodes[id.0].parent = None;
    }

    /// Parse `html` as a fragment and append its top-level nodes under `parent`.
    /// The inserted element roots are recorded for `take_added`.
    pub fn append_html(&mut self, parent: NodeId, html: &str) -> Vec<NodeId> {
        let frag = html_scraper::Html::parse_fragment(html);
        let first_new = self.nodes.len();
        self.import_children(parent, frag.root_element());
        let inserted: Vec<NodeId> = self
            .children(parent)
            .iter()
            .copied()
            .filter(|c| c.0 >= first_new && self.element(*c).is_some())
            .collect();
        self.added.extend(inserted.iter().copied());
        inserted
    }

    /// Drain the roots inserted since the last call (mutation-observer records).
    pub fn take_added(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.added)
    }

    /// Serialize the attached tree.
    pub fn to_html(&self) -> String {
        let mut out = String::from("<!DOCTYPE html>");
        for c in self.children(self.root()) {
            self.write_node(*c, false, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, with_ids: bool, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        match &node.kind {
            NodeKind::Document => {
                for c in &node.children {
                    self.write_node(*c, with_ids, out);
                }
            }
            NodeKind::Text(t) => {
                let raw = node
                    .parent
                    .and_then(|p| self.tag(p))
                    .map(|t| RAW_SERIALIZE_TAGS.contains(&t))
                    .unwrap_or(false);
                if raw {
                    out.push_str(t);
                } else {
                    escape_text(t, out);
                }
            }
            NodeKind::Element(e) => {
                out.push('<');
                out.push_str(&e.tag);
                for (k, v) in &e.attrs {
                    out.push(' ');
                    out.push_str(k);
                    out.push_str("=\"");
                    escape_attr(v, out);
                    out.push('"');
                }
                if with_ids {
                    let _ = write!(out, " {SNAPSHOT_ID_ATTR}=\"{}\"", id.0);
                }
                out.push('>');
                if VOID_TAGS.contains(&e.tag.as_str()) {
                    return;
                }
                for c in &node.children {
                    self.write_node(*c, with_ids, out);
                }
                out.push_str("</");
                out.push_str(&e.tag);
                out.push('>');
            }
        }
    }

    /// Freeze the current tree for selector evaluation.
    pub fn snapshot(&self) -> Snapshot {
        let mut html = String::from("<!DOCTYPE html>");
        for c in self.children(self.root()) {
            self.write_node(*c, true, &mut html);
        }
        Snapshot {
            html: html_scraper::Html::parse_document(&html),
        }
    }
}

/// Parsed copy of a [`Document`] whose elements carry their arena ids.
pub struct Snapshot {
    html: html_scraper::Html,
}

impl Snapshot {
    /// Matches in document order. Malformed selectors yield `Error::Selector`.
    pub fn select(&self, selector: &str) -> Result<Vec<NodeId>> {
        let sel = html_scraper::Selector::parse(selector).map_err(|e| Error::Selector {
            selector: selector.to_string(),
            reason: e.to_string(),
        })?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for el in self.html.select(&sel) {
            let Some(id) = el
                .value()
                .attr(SNAPSHOT_ID_ATTR)
                .and_then(|s| s.parse::<usize>().ok())
            else {
                continue;
            };
            if seen.insert(id) {
                out.push(NodeId(id));
            }
        }
        Ok(out)
    }
}

fn parse_declarations(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|d| {
            let (k, v) = d.split_once(':')?;
            let k = k.trim();
            let v = v.trim();
            (!k.is_empty()).then(|| (k.to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}

fn escape_text(s: &str, out: &mut String) {
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

fn escape_attr(s: &str, out: &mut String) {
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}
