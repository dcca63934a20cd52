//! Modification Store.
//!
//! Three independent edit layers keyed by [`ElementId`]: positions, colors and flipped loops.
//! Layers outlive the trees they were recorded on and are replayed onto each fresh render. Replay
//! is idempotent and silently skips keys whose element no longer exists.

mod colors;
mod loop_flip;
mod position;

pub use colors::{ColorEdit, ColorOverlay, color_target};
pub use loop_flip::{FLIPPED_ATTR, LoopFlipOverlay, UNFLIPPED_D_ATTR, ensure_flipped, flip_path, is_flipped};
pub use position::{PositionEdit, PositionOverlay, anchor_of, is_movable, set_position};

pub(crate) use colors::paint_channel;

use crate::identity::{ElementId, IdentityResolver};
use crate::svg::SvgDocument;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayKind {
    Position,
    Color,
    LoopFlip,
}

impl OverlayKind {
    pub const ALL: [OverlayKind; 3] = [Self::Position, Self::Color, Self::LoopFlip];
}

/// One edit to record against an element.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayRecord {
    Position(PositionEdit),
    /// Channels left as `None` keep whatever was recorded before.
    Color(ColorEdit),
    /// `true` marks the loop as flipped, `false` removes the mark.
    LoopFlip(bool),
}

impl OverlayRecord {
    pub fn kind(&self) -> OverlayKind {
        match self {
            Self::Position(_) => OverlayKind::Position,
            Self::Color(_) => OverlayKind::Color,
            Self::LoopFlip(_) => OverlayKind::LoopFlip,
        }
    }
}

/// The full contents of one layer.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlaySnapshot {
    Position(PositionOverlay),
    Color(ColorOverlay),
    LoopFlip(LoopFlipOverlay),
}

impl OverlaySnapshot {
    pub fn kind(&self) -> OverlayKind {
        match self {
            Self::Position(_) => OverlayKind::Position,
            Self::Color(_) => OverlayKind::Color,
            Self::LoopFlip(_) => OverlayKind::LoopFlip,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Position(o) => o.len(),
            Self::Color(o) => o.len(),
            Self::LoopFlip(o) => o.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// All three layers in their shareable form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverlaySet {
    #[serde(skip_serializing_if = "PositionOverlay::is_empty")]
    pub positions: PositionOverlay,
    #[serde(skip_serializing_if = "ColorOverlay::is_empty")]
    pub colors: ColorOverlay,
    #[serde(skip_serializing_if = "LoopFlipOverlay::is_empty")]
    pub flipped_loops: LoopFlipOverlay,
}

impl OverlaySet {
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() && self.colors.is_empty() && self.flipped_loops.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: usize,
    /// Keys with no live element in the tree.
    pub skipped: usize,
}

impl ApplyReport {
    pub fn absorb(&mut self, other: ApplyReport) {
        self.applied += other.applied;
        self.skipped += other.skipped;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModificationStore {
    layers: OverlaySet,
}

impl ModificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn record(&mut self, id: ElementId, record: OverlayRecord) {
        tracing::debug!(id = %id, kind = ?record.kind(), "recording edit");
        match record {
            OverlayRecord::Position(edit) => self.layers.positions.insert(id, edit),
            OverlayRecord::Color(edit) => self.layers.colors.record(id, edit),
            OverlayRecord::LoopFlip(true) => self.layers.flipped_loops.insert(id),
            OverlayRecord::LoopFlip(false) => self.layers.flipped_loops.remove(&id),
        }
    }

    pub fn positions(&self) -> &PositionOverlay {
        &self.layers.positions
    }

    pub fn colors(&self) -> &ColorOverlay {
        &self.layers.colors
    }

    pub fn flipped_loops(&self) -> &LoopFlipOverlay {
        &self.layers.flipped_loops
    }

    /// A copy of one layer.
    pub fn get_all(&self, kind: OverlayKind) -> OverlaySnapshot {
        match kind {
            OverlayKind::Position => OverlaySnapshot::Position(self.layers.positions.clone()),
            OverlayKind::Color => OverlaySnapshot::Color(self.layers.colors.clone()),
            OverlayKind::LoopFlip => OverlaySnapshot::LoopFlip(self.layers.flipped_loops.clone()),
        }
    }

    /// Merges `snapshot` into its layer (incoming entries replace existing ones with the same
    /// key) and paints those entries onto `doc`.
    pub fn apply_all(
        &mut self,
        snapshot: &OverlaySnapshot,
        doc: &mut SvgDocument,
        resolver: &IdentityResolver,
    ) -> ApplyReport {
        let index = resolver.index(doc);
        match snapshot {
            OverlaySnapshot::Position(overlay) => {
                self.layers.positions.merge(overlay);
                overlay.paint(doc, &index)
            }
            OverlaySnapshot::Color(overlay) => {
                self.layers.colors.merge(overlay);
                overlay.paint(doc, &index)
            }
            OverlaySnapshot::LoopFlip(overlay) => {
                self.layers.flipped_loops.merge(overlay);
                overlay.paint(doc, &index)
            }
        }
    }

    /// Paints the stored contents of one layer onto a fresh tree.
    pub fn replay(
        &self,
        kind: OverlayKind,
        doc: &mut SvgDocument,
        resolver: &IdentityResolver,
    ) -> ApplyReport {
        let index = resolver.index(doc);
        let report = match kind {
            OverlayKind::Position => self.layers.positions.paint(doc, &index),
            OverlayKind::Color => self.layers.colors.paint(doc, &index),
            OverlayKind::LoopFlip => self.layers.flipped_loops.paint(doc, &index),
        };
        if report.skipped > 0 {
            tracing::debug!(?kind, skipped = report.skipped, "overlay keys without a live element");
        }
        report
    }

    pub fn clear(&mut self, kind: OverlayKind) {
        match kind {
            OverlayKind::Position => self.layers.positions = PositionOverlay::default(),
            OverlayKind::Color => self.layers.colors = ColorOverlay::default(),
            OverlayKind::LoopFlip => self.layers.flipped_loops = LoopFlipOverlay::default(),
        }
    }

    pub fn clear_all(&mut self) {
        self.layers = OverlaySet::default();
    }

    pub fn export(&self) -> OverlaySet {
        self.layers.clone()
    }

    /// Merges every layer of `set` without painting anything.
    pub fn merge(&mut self, set: &OverlaySet) {
        self.layers.positions.merge(&set.positions);
        self.layers.colors.merge(&set.colors);
        self.layers.flipped_loops.merge(&set.flipped_loops);
    }
}
