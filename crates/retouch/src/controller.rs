//! Interactive Manipulation Controller.
//!
//! A headless model of the editing affordances: which elements react to the pointer, which one is
//! being edited, and what each control does to the tree and to the [`ModificationStore`]. Every
//! control writes through immediately; there is no pending state to commit.

use crate::color::{Color, ColorChannel};
use crate::identity::{ElementId, ElementKind, IdentityResolver};
use crate::overlay::{
    ColorEdit, ModificationStore, OverlayRecord, PositionEdit, anchor_of, flip_path,
    is_movable, paint_channel, set_position,
};
use crate::svg::{NodeId, PathData, SvgDocument};
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;

const HOVER_OPACITY: &str = "0.8";
const HOVER_OUTLINE: &str = "2px solid #007acc";
const DEFAULT_GROUP_FILL: &str = "#EDF2AE";
const DEFAULT_GROUP_STROKE: &str = "#666";
const CONTENT_PREVIEW_CHARS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerState {
    #[default]
    Off,
    On,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// The fixed stepper deltas of the edit surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    MinusFive,
    MinusOne,
    PlusOne,
    PlusFive,
}

impl Step {
    pub fn delta(self) -> f64 {
        match self {
            Self::MinusFive => -5.0,
            Self::MinusOne => -1.0,
            Self::PlusOne => 1.0,
            Self::PlusFive => 5.0,
        }
    }
}

/// Fill/border pickers for a rect+label group.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorControls {
    pub target: NodeId,
    pub fill: String,
    pub stroke: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementInfo {
    pub kind: ElementKind,
    pub content: String,
    pub x: f64,
    pub y: f64,
    pub colors: Option<ColorControls>,
}

impl ElementInfo {
    pub fn label(&self) -> &'static str {
        self.kind.label()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditSurface {
    pub target: NodeId,
    pub id: ElementId,
    pub info: ElementInfo,
    pub input_x: f64,
    pub input_y: f64,
    /// Anchor when the surface opened; "reset" returns here.
    pub opened_x: f64,
    pub opened_y: f64,
    pub self_loop: bool,
}

/// What a control did, so the caller can schedule follow-up work such as auto-save.
#[derive(Debug, Clone, PartialEq)]
pub enum EditEffect {
    Moved { id: ElementId, x: f64, y: f64 },
    Recolored { id: ElementId, channel: ColorChannel },
    LoopFlipped { id: ElementId, flipped: bool },
    /// Nothing to do: controller off, no surface, or the control does not apply.
    Ignored,
}

impl EditEffect {
    pub fn changed(&self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

#[derive(Debug, Default)]
pub struct Controller {
    state: ControllerState,
    resolver: IdentityResolver,
    /// Pointer-reactive node to the element it edits. Group members map to their group.
    handlers: FxHashMap<NodeId, NodeId>,
    hovered: Option<NodeId>,
    surface: Option<EditSurface>,
}

impl Controller {
    pub fn new(resolver: IdentityResolver) -> Self {
        Self {
            resolver,
            ..Self::default()
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn is_on(&self) -> bool {
        self.state == ControllerState::On
    }

    pub fn surface(&self) -> Option<&EditSurface> {
        self.surface.as_ref()
    }

    /// Number of elements currently reacting to the pointer.
    pub fn attached(&self) -> usize {
        self.handlers.len()
    }

    pub fn toggle(&mut self, doc: &mut SvgDocument) -> ControllerState {
        match self.state {
            ControllerState::Off => self.enable(doc),
            ControllerState::On => self.disable(doc),
        }
        self.state
    }

    pub fn enable(&mut self, doc: &mut SvgDocument) {
        self.state = ControllerState::On;
        self.attach(doc);
    }

    /// Detaches every handler, strips the hover affordances and closes the surface. Recorded
    /// edits are untouched.
    pub fn disable(&mut self, doc: &mut SvgDocument) {
        self.state = ControllerState::Off;
        for node in doc.elements() {
            doc.remove_style(node, "cursor");
            doc.remove_style(node, "opacity");
            doc.remove_style(node, "outline");
        }
        self.handlers.clear();
        self.hovered = None;
        self.close();
        tracing::info!("interactive mode off");
    }

    /// Attaches handlers to a (new) tree. A surface opened on an older tree is closed.
    pub fn attach(&mut self, doc: &mut SvgDocument) {
        self.handlers.clear();
        self.hovered = None;
        self.close();
        if !self.is_on() {
            return;
        }

        let mut groups = 0usize;
        for g in doc.elements_named("g") {
            let rect = doc.find_descendant(g, "rect");
            let text = doc.find_descendant(g, "text");
            if let (Some(rect), Some(text)) = (rect, text) {
                for member in [rect, text] {
                    self.handlers.insert(member, g);
                }
                groups += 1;
            }
        }

        let mut standalone = 0usize;
        for node in doc.elements() {
            let eligible = match doc.name(node) {
                Some("foreignObject" | "line" | "path") => true,
                Some("text") => !doc.ancestors(node).any(|a| doc.is(a, "g")),
                _ => false,
            };
            if eligible {
                self.handlers.insert(node, node);
                standalone += 1;
            }
        }

        let clickable: Vec<NodeId> = self.handlers.keys().copied().collect();
        for node in clickable {
            doc.set_style(node, "cursor", "pointer");
        }
        tracing::info!(groups, standalone, "interactive mode on");
    }

    fn handler_for(&self, doc: &SvgDocument, node: NodeId) -> Option<NodeId> {
        std::iter::once(node)
            .chain(doc.ancestors(node))
            .find_map(|n| self.handlers.get(&n).copied())
    }

    fn hover_nodes(&self, doc: &SvgDocument, node: NodeId) -> Vec<(NodeId, bool)> {
        let Some(target) = self.handler_for(doc, node) else {
            return Vec::new();
        };
        if doc.is(target, "g") {
            let rect = doc.find_descendant(target, "rect");
            let text = doc.find_descendant(target, "text");
            rect.map(|r| (r, true))
                .into_iter()
                .chain(text.map(|t| (t, false)))
                .collect()
        } else {
            vec![(target, true)]
        }
    }

    pub fn pointer_enter(&mut self, doc: &mut SvgDocument, node: NodeId) {
        if !self.is_on() {
            return;
        }
        for (n, outline) in self.hover_nodes(doc, node) {
            doc.set_style(n, "opacity", HOVER_OPACITY);
            if outline {
                doc.set_style(n, "outline", HOVER_OUTLINE);
            }
        }
        self.hovered = self.handler_for(doc, node);
    }

    pub fn pointer_leave(&mut self, doc: &mut SvgDocument, node: NodeId) {
        if !self.is_on() {
            return;
        }
        for (n, _) in self.hover_nodes(doc, node) {
            doc.remove_style(n, "opacity");
            doc.remove_style(n, "outline");
        }
        self.hovered = None;
    }

    pub fn hovered(&self) -> Option<NodeId> {
        self.hovered
    }

    /// Opens the edit surface for whatever `node` belongs to, closing any open one. Clicks inside
    /// an embedded block always target the block.
    pub fn click(&mut self, doc: &SvgDocument, node: NodeId) -> Option<&EditSurface> {
        if !self.is_on() {
            return None;
        }
        let target = match doc.closest(node, |d, n| d.is(n, "foreignObject")) {
            Some(block) => block,
            None => self.handler_for(doc, node)?,
        };
        self.close();

        let info = element_info(doc, target);
        let self_loop = doc.is(target, "path")
            && doc
                .attr(target, "d")
                .and_then(|d| PathData::parse(d).ok())
                .is_some_and(|p| p.is_self_loop());
        let surface = EditSurface {
            target,
            id: self.resolver.identify(doc, target),
            input_x: info.x,
            input_y: info.y,
            opened_x: info.x,
            opened_y: info.y,
            info,
            self_loop,
        };
        tracing::debug!(id = %surface.id, kind = surface.info.label(), "edit surface opened");
        self.surface = Some(surface);
        self.surface.as_ref()
    }

    pub fn close(&mut self) {
        self.surface = None;
    }

    /// Types a value into one coordinate field without applying it.
    pub fn set_input(&mut self, axis: Axis, value: f64) {
        if let Some(s) = &mut self.surface {
            match axis {
                Axis::X => s.input_x = value,
                Axis::Y => s.input_y = value,
            }
        }
    }

    pub fn nudge(
        &mut self,
        doc: &mut SvgDocument,
        store: &mut ModificationStore,
        axis: Axis,
        step: Step,
        now: DateTime<Utc>,
    ) -> EditEffect {
        let Some(s) = &mut self.surface else {
            return EditEffect::Ignored;
        };
        match axis {
            Axis::X => s.input_x += step.delta(),
            Axis::Y => s.input_y += step.delta(),
        }
        self.apply_position(doc, store, now)
    }

    /// Moves the element to the typed coordinates and records its new anchor.
    pub fn apply_position(
        &mut self,
        doc: &mut SvgDocument,
        store: &mut ModificationStore,
        now: DateTime<Utc>,
    ) -> EditEffect {
        let Some(s) = &mut self.surface else {
            return EditEffect::Ignored;
        };
        if !is_movable(doc, s.target) || !set_position(doc, s.target, s.input_x, s.input_y) {
            return EditEffect::Ignored;
        }
        let (x, y) = anchor_of(doc, s.target).unwrap_or((s.input_x, s.input_y));
        s.info.x = x;
        s.info.y = y;
        let tag = doc.name(s.target).unwrap_or_default().to_string();
        store.record(
            s.id.clone(),
            OverlayRecord::Position(PositionEdit::new(x, y, tag, now)),
        );
        EditEffect::Moved {
            id: s.id.clone(),
            x,
            y,
        }
    }

    /// Puts the element back where it was when the surface opened.
    pub fn reset_position(
        &mut self,
        doc: &mut SvgDocument,
        store: &mut ModificationStore,
        now: DateTime<Utc>,
    ) -> EditEffect {
        let Some(s) = &mut self.surface else {
            return EditEffect::Ignored;
        };
        s.input_x = s.opened_x;
        s.input_y = s.opened_y;
        self.apply_position(doc, store, now)
    }

    pub fn set_color(
        &mut self,
        doc: &mut SvgDocument,
        store: &mut ModificationStore,
        channel: ColorChannel,
        color: Color,
        now: DateTime<Utc>,
    ) -> EditEffect {
        let Some(s) = &mut self.surface else {
            return EditEffect::Ignored;
        };
        let Some(controls) = &mut s.info.colors else {
            return EditEffect::Ignored;
        };
        paint_channel(doc, controls.target, channel, &color);
        match channel {
            ColorChannel::Fill => controls.fill = color.to_hex(),
            ColorChannel::Stroke => controls.stroke = color.to_hex(),
        }
        store.record(
            s.id.clone(),
            OverlayRecord::Color(ColorEdit::channel(channel, color, now)),
        );
        EditEffect::Recolored {
            id: s.id.clone(),
            channel,
        }
    }

    /// Mirrors the self-loop under edit and toggles its membership in the loop-flip layer.
    pub fn flip_loop(&mut self, doc: &mut SvgDocument, store: &mut ModificationStore) -> EditEffect {
        let Some(s) = &self.surface else {
            return EditEffect::Ignored;
        };
        if !s.self_loop {
            return EditEffect::Ignored;
        }
        let Some(flipped) = flip_path(doc, s.target) else {
            return EditEffect::Ignored;
        };
        store.record(s.id.clone(), OverlayRecord::LoopFlip(flipped));
        EditEffect::LoopFlipped {
            id: s.id.clone(),
            flipped,
        }
    }
}

fn preview(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() > CONTENT_PREVIEW_CHARS {
        let head: String = text.chars().take(CONTENT_PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

fn picker_value(doc: &SvgDocument, node: NodeId, property: &str, fallback: &str) -> String {
    let raw = doc
        .attr(node, property)
        .map(str::to_string)
        .or_else(|| doc.style(node, property))
        .unwrap_or_else(|| fallback.to_string());
    Color::parse(&raw)
        .map(|c| c.to_hex())
        .unwrap_or(raw)
}

/// Describes an element the way the edit surface shows it.
pub fn element_info(doc: &SvgDocument, node: NodeId) -> ElementInfo {
    let kind = ElementKind::of(doc, node);
    let (x, y) = anchor_of(doc, node).unwrap_or((0.0, 0.0));
    let mut colors = None;
    let content = match kind {
        ElementKind::Group => {
            match (
                doc.find_descendant(node, "rect"),
                doc.find_descendant(node, "text"),
            ) {
                (Some(rect), Some(text)) => {
                    colors = Some(ColorControls {
                        target: rect,
                        fill: picker_value(doc, rect, "fill", DEFAULT_GROUP_FILL),
                        stroke: picker_value(doc, rect, "stroke", DEFAULT_GROUP_STROKE),
                    });
                    non_empty_or(doc.text_content(text).trim().to_string(), "Group")
                }
                _ => "Group element".to_string(),
            }
        }
        ElementKind::EmbeddedBlock => non_empty_or(preview(&doc.text_content(node)), "Math expression"),
        ElementKind::Rect => doc.attr(node, "name").unwrap_or("Rectangle").to_string(),
        ElementKind::Text => non_empty_or(preview(&doc.text_content(node)), "Text"),
        ElementKind::Line => doc
            .attr(node, "name")
            .or_else(|| doc.attr(node, "class"))
            .unwrap_or("Line")
            .to_string(),
        ElementKind::Path => "Path element".to_string(),
        ElementKind::Other => doc.name(node).unwrap_or_default().to_string(),
    };
    ElementInfo {
        kind,
        content,
        x,
        y,
        colors,
    }
}
