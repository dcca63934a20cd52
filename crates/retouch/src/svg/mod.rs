//! Owned, mutable SVG tree.
//!
//! Diagram engines hand back markup; every post-processing pass (identity stamping, semantic
//! coloring, overlay replay, interactive editing) works on this arena instead of on strings.
//! Nodes are never freed while a document lives, so a [`NodeId`] stays valid for the lifetime of
//! the document it came from. A fresh render always produces a fresh document.

mod geom;
mod path;
mod style;

pub use geom::{BBox, DeterministicTextMeasurer, TextMeasurer, TextMetrics, TextStyle};
pub use path::PathData;

use crate::error::SvgError;
use indexmap::IndexMap;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
enum NodeKind {
    Element {
        name: String,
        attrs: IndexMap<String, String>,
    },
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SvgDocument {
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl SvgDocument {
    /// Parses engine markup. The first `<svg>` element found becomes the document root, so
    /// markup wrapped in an outer container is accepted.
    pub fn parse(markup: &str) -> Result<Self, SvgError> {
        let doc = roxmltree::Document::parse(markup)?;
        let root = doc
            .descendants()
            .find(|n| n.has_tag_name("svg"))
            .ok_or(SvgError::MissingRoot)?;

        let mut out = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        out.root = out.build(root, None, true);
        Ok(out)
    }

    fn push(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent,
            children: Vec::new(),
        });
        if let Some(p) = parent {
            self.nodes[p.0].children.push(id);
        }
        id
    }

    fn build(&mut self, n: roxmltree::Node<'_, '_>, parent: Option<NodeId>, is_root: bool) -> NodeId {
        let mut attrs: IndexMap<String, String> = IndexMap::new();

        let parent_el = n.parent_element();
        for ns in n.namespaces() {
            if ns.name() == Some("xml") {
                continue;
            }
            let inherited = !is_root
                && parent_el.is_some_and(|p| {
                    p.namespaces()
                        .any(|pns| pns.name() == ns.name() && pns.uri() == ns.uri())
                });
            if inherited {
                continue;
            }
            let key = match ns.name() {
                Some(prefix) => format!("xmlns:{prefix}"),
                None => "xmlns".to_string(),
            };
            attrs.insert(key, ns.uri().to_string());
        }

        for a in n.attributes() {
            let key = match a.namespace().and_then(|uri| n.lookup_prefix(uri)) {
                Some(prefix) if !prefix.is_empty() => format!("{prefix}:{}", a.name()),
                _ => a.name().to_string(),
            };
            attrs.insert(key, a.value().to_string());
        }

        let tag = n.tag_name();
        let name = match tag.namespace().and_then(|uri| n.lookup_prefix(uri)) {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}:{}", tag.name()),
            _ => tag.name().to_string(),
        };

        let id = self.push(NodeKind::Element { name, attrs }, parent);
        for c in n.children() {
            if c.is_element() {
                self.build(c, Some(id), false);
            } else if c.is_text() {
                if let Some(t) = c.text() {
                    self.push(NodeKind::Text(t.to_string()), Some(id));
                }
            }
        }
        id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].kind, NodeKind::Element { .. })
    }

    /// Local tag name as written in the markup (prefixed names keep their prefix).
    pub fn name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { name, .. } => Some(name.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn is(&self, id: NodeId, tag: &str) -> bool {
        self.name(id) == Some(tag)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[id.0]
            .children
            .iter()
            .copied()
            .filter(|c| self.is_element(*c))
    }

    pub fn attr(&self, id: NodeId, key: &str) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { attrs, .. } => attrs.get(key).map(|v| v.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn attrs(&self, id: NodeId) -> impl Iterator<Item = (&str, &str)> + '_ {
        let attrs = match &self.nodes[id.0].kind {
            NodeKind::Element { attrs, .. } => Some(attrs),
            NodeKind::Text(_) => None,
        };
        attrs
            .into_iter()
            .flat_map(|m| m.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Numeric attribute value; missing or unparsable values read as `None`.
    pub fn attr_f64(&self, id: NodeId, key: &str) -> Option<f64> {
        let raw = self.attr(id, key)?;
        let raw = raw.trim().trim_end_matches("px");
        raw.parse::<f64>().ok().filter(|v| v.is_finite())
    }

    /// Sets an attribute. Existing attributes keep their position so re-setting the same value
    /// leaves the serialized form unchanged.
    pub fn set_attr(&mut self, id: NodeId, key: &str, value: impl Into<String>) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[id.0].kind {
            let value = value.into();
            match attrs.get_mut(key) {
                Some(slot) => *slot = value,
                None => {
                    attrs.insert(key.to_string(), value);
                }
            }
        }
    }

    pub fn set_attr_num(&mut self, id: NodeId, key: &str, value: f64) {
        self.set_attr(id, key, fmt_num(value));
    }

    pub fn remove_attr(&mut self, id: NodeId, key: &str) -> Option<String> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Element { attrs, .. } => attrs.shift_remove(key),
            NodeKind::Text(_) => None,
        }
    }

    pub fn classes(&self, id: NodeId) -> impl Iterator<Item = &str> + '_ {
        self.attr(id, "class").unwrap_or_default().split_whitespace()
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.classes(id).any(|c| c == class)
    }

    /// Concatenated text of every descendant text node.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].kind {
            NodeKind::Text(t) => out.push_str(t),
            NodeKind::Element { .. } => {
                for c in &self.nodes[id.0].children {
                    self.collect_text(*c, out);
                }
            }
        }
    }

    /// Element descendants of `id` in document (depth-first, pre-order) order, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[id.0].children.iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            if !self.is_element(n) {
                continue;
            }
            out.push(n);
            stack.extend(self.nodes[n.0].children.iter().rev().copied());
        }
        out
    }

    /// Every element in the document in traversal order, root first.
    pub fn elements(&self) -> Vec<NodeId> {
        let mut out = vec![self.root];
        out.extend(self.descendants(self.root));
        out
    }

    pub fn elements_named(&self, tag: &str) -> Vec<NodeId> {
        self.elements()
            .into_iter()
            .filter(|n| self.is(*n, tag))
            .collect()
    }

    /// First descendant element with the given tag (the `querySelector` shape).
    pub fn find_descendant(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        self.descendants(id).into_iter().find(|n| self.is(*n, tag))
    }

    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |n| self.parent(*n))
    }

    /// `id` itself or its nearest ancestor satisfying `pred`.
    pub fn closest(&self, id: NodeId, pred: impl Fn(&Self, NodeId) -> bool) -> Option<NodeId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|n| self.is_element(*n) && pred(self, *n))
    }

    pub fn is_descendant_of(&self, id: NodeId, ancestor: NodeId) -> bool {
        self.ancestors(id).any(|a| a == ancestor)
    }

    /// Detaches `id` from its parent and re-appends it as the parent's last child, which makes it
    /// paint on top of its siblings.
    pub fn move_to_end(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        let children = &mut self.nodes[parent.0].children;
        if children.last() == Some(&id) {
            return;
        }
        children.retain(|c| *c != id);
        children.push(id);
    }

    pub fn to_svg_string(&self) -> String {
        let mut out = String::new();
        self.write_node(self.root, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].kind {
            NodeKind::Text(t) => out.push_str(&escape_text(t)),
            NodeKind::Element { name, attrs } => {
                out.push('<');
                out.push_str(name);
                for (k, v) in attrs {
                    let _ = write!(out, r#" {k}="{}""#, escape_attr(v));
                }
                let children = &self.nodes[id.0].children;
                if children.is_empty() {
                    out.push_str("/>");
                    return;
                }
                out.push('>');
                for c in children {
                    self.write_node(*c, out);
                }
                let _ = write!(out, "</{name}>");
            }
        }
    }
}

/// Formats a coordinate the way the engine does: at most three decimals, no trailing zeros.
pub fn fmt_num(v: f64) -> String {
    fmt_places(v, 3)
}

/// Formats `v` rounded to `places` decimals, without trailing zeros.
pub fn fmt_places(v: f64, places: u32) -> String {
    let text = format!("{:.*}", places as usize, v);
    let text = if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text.as_str()
    };
    match text {
        "-0" => "0".to_string(),
        other => other.to_string(),
    }
}

fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}
