use super::ApplyReport;
use crate::identity::{ElementId, IdentityIndex};
use crate::svg::{NodeId, PathData, SvgDocument};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Where the user put an element. `(x, y)` is always the element's anchor, never a delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionEdit {
    pub x: f64,
    pub y: f64,
    /// Tag name of the element the edit was recorded on.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "timestamp", with = "chrono::serde::ts_milliseconds")]
    pub recorded_at: DateTime<Utc>,
}

impl PositionEdit {
    pub fn new(x: f64, y: f64, kind: impl Into<String>, recorded_at: DateTime<Utc>) -> Self {
        Self {
            x,
            y,
            kind: kind.into(),
            recorded_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionOverlay(IndexMap<ElementId, PositionEdit>);

impl PositionOverlay {
    pub fn get(&self, id: &ElementId) -> Option<&PositionEdit> {
        self.0.get(id)
    }

    pub fn insert(&mut self, id: ElementId, edit: PositionEdit) {
        self.0.insert(id, edit);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ElementId, &PositionEdit)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn merge(&mut self, other: &PositionOverlay) {
        for (id, edit) in &other.0 {
            self.0.insert(id.clone(), edit.clone());
        }
    }

    pub(super) fn paint(&self, doc: &mut SvgDocument, index: &IdentityIndex) -> ApplyReport {
        let mut report = ApplyReport::default();
        for (id, edit) in &self.0 {
            match index.get(id) {
                Some(node) if set_position(doc, node, edit.x, edit.y) => report.applied += 1,
                _ => report.skipped += 1,
            }
        }
        report
    }
}

fn group_parts(doc: &SvgDocument, group: NodeId) -> Option<(NodeId, NodeId)> {
    let rect = doc.find_descendant(group, "rect")?;
    let text = doc.find_descendant(group, "text")?;
    Some((rect, text))
}

fn xy(doc: &SvgDocument, node: NodeId, kx: &str, ky: &str) -> (f64, f64) {
    (
        doc.attr_f64(node, kx).unwrap_or(0.0),
        doc.attr_f64(node, ky).unwrap_or(0.0),
    )
}

/// Whether [`set_position`] knows how to move this element.
pub fn is_movable(doc: &SvgDocument, node: NodeId) -> bool {
    match doc.name(node) {
        Some("g") => group_parts(doc, node).is_some(),
        Some("rect" | "text" | "foreignObject" | "line") => true,
        Some("path") => doc
            .attr(node, "d")
            .is_some_and(|d| PathData::parse(d).is_ok()),
        _ => false,
    }
}

/// The point a position edit is expressed in: the rectangle origin of a rect+label group, the
/// x/y of labels, rectangles and embedded blocks, the first endpoint of a line and the start
/// point of a path.
pub fn anchor_of(doc: &SvgDocument, node: NodeId) -> Option<(f64, f64)> {
    match doc.name(node)? {
        "g" => group_parts(doc, node).map(|(rect, _)| xy(doc, rect, "x", "y")),
        "rect" | "foreignObject" => Some(xy(doc, node, "x", "y")),
        "text" => Some(doc.text_anchor_point(node)),
        "line" => Some(xy(doc, node, "x1", "y1")),
        "path" => PathData::parse(doc.attr(node, "d")?)
            .ok()
            .map(|p| p.start_point()),
        _ => None,
    }
}

/// Moves `node` so its anchor lands on `(x, y)`. Labels, boxes and embedded blocks are set
/// absolutely; lines and paths are translated by the distance from their current anchor, which
/// makes a repeated call a no-op. Returns `false` for elements that cannot be moved.
pub fn set_position(doc: &mut SvgDocument, node: NodeId, x: f64, y: f64) -> bool {
    let Some(name) = doc.name(node).map(str::to_string) else {
        return false;
    };
    match name.as_str() {
        "g" => {
            let Some((rect, text)) = group_parts(doc, node) else {
                return false;
            };
            let (rx, ry) = xy(doc, rect, "x", "y");
            let (tx, ty) = doc.text_anchor_point(text);
            doc.set_attr_num(rect, "x", x);
            doc.set_attr_num(rect, "y", y);
            move_text(doc, text, x + (tx - rx), y + (ty - ry));
            true
        }
        "rect" | "foreignObject" => {
            doc.set_attr_num(node, "x", x);
            doc.set_attr_num(node, "y", y);
            true
        }
        "text" => {
            move_text(doc, node, x, y);
            true
        }
        "line" => {
            let (x1, y1) = xy(doc, node, "x1", "y1");
            let (x2, y2) = xy(doc, node, "x2", "y2");
            let (dx, dy) = (x - x1, y - y1);
            doc.set_attr_num(node, "x1", x1 + dx);
            doc.set_attr_num(node, "y1", y1 + dy);
            doc.set_attr_num(node, "x2", x2 + dx);
            doc.set_attr_num(node, "y2", y2 + dy);
            true
        }
        "path" => {
            let Some(path) = doc.attr(node, "d").and_then(|d| PathData::parse(d).ok()) else {
                return false;
            };
            let (sx, sy) = path.start_point();
            let moved = path.translate(x - sx, y - sy);
            doc.set_attr(node, "d", moved);
            true
        }
        _ => false,
    }
}

/// Moves a label's anchor to `(x, y)`. Positioned `tspan` children travel with it.
fn move_text(doc: &mut SvgDocument, text: NodeId, x: f64, y: f64) {
    let (ax, ay) = doc.text_anchor_point(text);
    let (dx, dy) = (x - ax, y - ay);
    if dx == 0.0 && dy == 0.0 {
        return;
    }
    let own_x = doc.attr(text, "x").is_some();
    let own_y = doc.attr(text, "y").is_some();
    if own_x {
        doc.set_attr_num(text, "x", x);
    }
    if own_y {
        doc.set_attr_num(text, "y", y);
    }
    let tspans: Vec<NodeId> = doc
        .child_elements(text)
        .filter(|c| doc.is(*c, "tspan"))
        .collect();
    for t in tspans {
        if let Some(tx) = doc.attr_f64(t, "x") {
            doc.set_attr_num(t, "x", tx + dx);
        }
        if let Some(ty) = doc.attr_f64(t, "y") {
            doc.set_attr_num(t, "y", ty + dy);
        }
    }
}
