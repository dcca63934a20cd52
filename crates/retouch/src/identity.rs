//! Element Identity Resolver.
//!
//! The engine regenerates the whole SVG tree on every render, so edits cannot hold on to nodes.
//! Instead each line, path, group and embedded block is stamped with its ordinal within its own
//! kind, in document order. Re-rendering the same source yields the same ordinals, which makes
//! the ordinal a usable overlay key across renders. Nothing stronger is promised: once the
//! diagram's structure changes, old keys may point at different elements or at nothing.

use crate::svg::{NodeId, SvgDocument};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker attribute carrying an element's ordinal identifier.
pub const ORDINAL_ATTR: &str = "data-retouch-id";

/// Set on the root once stamping has run, so stamping is at most once per tree.
const STAMPED_ATTR: &str = "data-retouch-stamped";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementKind {
    Line,
    Path,
    Group,
    EmbeddedBlock,
    Text,
    Rect,
    Other,
}

impl ElementKind {
    pub fn of(doc: &SvgDocument, node: NodeId) -> Self {
        match doc.name(node) {
            Some("line") => Self::Line,
            Some("path") => Self::Path,
            Some("g") => Self::Group,
            Some("foreignObject") => Self::EmbeddedBlock,
            Some("text") => Self::Text,
            Some("rect") => Self::Rect,
            _ => Self::Other,
        }
    }

    /// The four kinds that get an ordinal.
    pub const TRACKED: [ElementKind; 4] = [
        ElementKind::Line,
        ElementKind::Path,
        ElementKind::Group,
        ElementKind::EmbeddedBlock,
    ];

    fn ordinal_prefix(self) -> Option<&'static str> {
        match self {
            Self::Line => Some("line"),
            Self::Path => Some("path"),
            Self::Group => Some("group"),
            Self::EmbeddedBlock => Some("block"),
            _ => None,
        }
    }

    /// Human-readable label shown on the edit surface.
    pub fn label(self) -> &'static str {
        match self {
            Self::Line => "Line",
            Self::Path => "Path",
            Self::Group => "Note/Group",
            Self::EmbeddedBlock => "Math Expression",
            Self::Text => "Text",
            Self::Rect => "Rectangle",
            Self::Other => "Element",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn ordinal(kind: ElementKind, ordinal: usize) -> Option<Self> {
        kind.ordinal_prefix().map(|p| Self(format!("{p}-{ordinal}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StampReport {
    pub lines: usize,
    pub paths: usize,
    pub groups: usize,
    pub blocks: usize,
    /// `true` when the tree had already been stamped and nothing changed.
    pub already_stamped: bool,
}

impl StampReport {
    pub fn total(&self) -> usize {
        self.lines + self.paths + self.groups + self.blocks
    }
}

/// Lookup from identifier to live node for one stamped tree.
#[derive(Debug, Clone, Default)]
pub struct IdentityIndex {
    by_id: FxHashMap<ElementId, NodeId>,
}

impl IdentityIndex {
    pub fn get(&self, id: &ElementId) -> Option<NodeId> {
        self.by_id.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityResolver;

impl IdentityResolver {
    pub fn new() -> Self {
        Self
    }

    /// Assigns per-kind ordinals in depth-first document order. Running it again on the same tree
    /// is a no-op.
    pub fn stamp(&self, doc: &mut SvgDocument) -> StampReport {
        let root = doc.root();
        if doc.attr(root, STAMPED_ATTR).is_some() {
            return StampReport {
                already_stamped: true,
                ..StampReport::default()
            };
        }

        let mut report = StampReport::default();
        for node in doc.elements() {
            let kind = ElementKind::of(doc, node);
            let counter = match kind {
                ElementKind::Line => &mut report.lines,
                ElementKind::Path => &mut report.paths,
                ElementKind::Group => &mut report.groups,
                ElementKind::EmbeddedBlock => &mut report.blocks,
                _ => continue,
            };
            if let Some(id) = ElementId::ordinal(kind, *counter) {
                doc.set_attr(node, ORDINAL_ATTR, id.0);
            }
            *counter += 1;
        }
        doc.set_attr(root, STAMPED_ATTR, "true");
        tracing::debug!(
            lines = report.lines,
            paths = report.paths,
            groups = report.groups,
            blocks = report.blocks,
            "stamped element ordinals"
        );
        report
    }

    /// Reconstructs an element's identifier: its ordinal marker when present, otherwise a key
    /// derived from its content and dimensions.
    pub fn identify(&self, doc: &SvgDocument, node: NodeId) -> ElementId {
        if let Some(marker) = doc.attr(node, ORDINAL_ATTR) {
            return ElementId::new(marker);
        }
        ElementId(fallback_key(doc, node))
    }

    /// Maps every identifiable element of the tree. When two elements derive the same key the
    /// first one in document order wins.
    pub fn index(&self, doc: &SvgDocument) -> IdentityIndex {
        let mut by_id = FxHashMap::default();
        for node in doc.elements() {
            by_id.entry(self.identify(doc, node)).or_insert(node);
        }
        IdentityIndex { by_id }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

fn fallback_key(doc: &SvgDocument, node: NodeId) -> String {
    let tag = doc.name(node).unwrap_or_default();
    let attr = |key: &str| doc.attr(node, key).unwrap_or("null").to_string();
    match tag {
        "foreignObject" => format!(
            "foreignObject_{}_{}_{}",
            truncate(doc.text_content(node).trim(), 20),
            attr("width"),
            attr("height"),
        ),
        "g" => {
            let rect = doc.find_descendant(node, "rect");
            let text = doc.find_descendant(node, "text");
            let content = text
                .map(|t| doc.text_content(t).trim().to_string())
                .unwrap_or_default();
            let dim = |key: &str| {
                rect.and_then(|r| doc.attr(r, key))
                    .unwrap_or("undefined")
                    .to_string()
            };
            format!("group_{content}_{}_{}", dim("width"), dim("height"))
        }
        "text" => format!("text_{}", truncate(doc.text_content(node).trim(), 20)),
        "line" => format!(
            "line_{}_{}",
            doc.attr(node, "class").unwrap_or_default(),
            doc.attr(node, "name").unwrap_or_default(),
        ),
        "path" => format!(
            "path_{}_{}",
            doc.attr(node, "class").unwrap_or_default(),
            truncate(doc.attr(node, "d").unwrap_or_default(), 20),
        ),
        other => format!("{other}_{}", node.index()),
    }
}
