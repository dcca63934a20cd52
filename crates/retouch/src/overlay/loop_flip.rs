use super::ApplyReport;
use crate::identity::{ElementId, IdentityIndex};
use crate::svg::{NodeId, PathData, SvgDocument};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Present on a path whose loop is currently drawn mirrored.
pub const FLIPPED_ATTR: &str = "data-retouch-flipped";

/// Path data of a flipped loop as it was before the flip.
pub const UNFLIPPED_D_ATTR: &str = "data-retouch-unflipped";

/// Identifiers of self-loops the user has flipped. Membership is the whole state: flipping is an
/// involution, so no geometry needs to be stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoopFlipOverlay(IndexSet<ElementId>);

impl LoopFlipOverlay {
    pub fn contains(&self, id: &ElementId) -> bool {
        self.0.contains(id)
    }

    pub fn insert(&mut self, id: ElementId) {
        self.0.insert(id);
    }

    pub fn remove(&mut self, id: &ElementId) {
        self.0.shift_remove(id);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ElementId> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn merge(&mut self, other: &LoopFlipOverlay) {
        self.0.extend(other.0.iter().cloned());
    }

    pub(super) fn paint(&self, doc: &mut SvgDocument, index: &IdentityIndex) -> ApplyReport {
        let mut report = ApplyReport::default();
        for id in &self.0 {
            match index.get(id) {
                Some(node) if ensure_flipped(doc, node) => report.applied += 1,
                _ => report.skipped += 1,
            }
        }
        report
    }
}

pub fn is_flipped(doc: &SvgDocument, node: NodeId) -> bool {
    doc.attr(node, FLIPPED_ATTR).is_some()
}

fn self_loop(doc: &SvgDocument, node: NodeId) -> Option<PathData> {
    if !doc.is(node, "path") {
        return None;
    }
    let path = PathData::parse(doc.attr(node, "d")?).ok()?;
    path.is_self_loop().then_some(path)
}

/// Mirrors a self-loop and toggles its flipped marker. Returns the new flipped state, or `None`
/// when `node` is not a self-loop path.
pub fn flip_path(doc: &mut SvgDocument, node: NodeId) -> Option<bool> {
    let path = self_loop(doc, node)?;
    let mirrored = path.flip_horizontal();
    if is_flipped(doc, node) {
        // The saved text wins unless the loop moved while flipped.
        let restored = doc
            .remove_attr(node, UNFLIPPED_D_ATTR)
            .filter(|saved| {
                let saved = PathData::parse(saved);
                let mirrored = PathData::parse(&mirrored);
                matches!((saved, mirrored), (Ok(a), Ok(b)) if a.same_geometry(&b))
            })
            .unwrap_or(mirrored);
        doc.set_attr(node, "d", restored);
        doc.remove_attr(node, FLIPPED_ATTR);
        Some(false)
    } else {
        doc.set_attr(node, UNFLIPPED_D_ATTR, path.as_str().to_string());
        doc.set_attr(node, "d", mirrored);
        doc.set_attr(node, FLIPPED_ATTR, "true");
        Some(true)
    }
}

/// Brings a self-loop into the flipped state, leaving it alone when it already is. Returns
/// `false` when `node` is not a self-loop path.
pub fn ensure_flipped(doc: &mut SvgDocument, node: NodeId) -> bool {
    if is_flipped(doc, node) {
        return self_loop(doc, node).is_some();
    }
    flip_path(doc, node).is_some()
}
