//! Semantic Color Matcher.
//!
//! Paints the rendered nodes that stand for a declared [`Entity`] with its colors. Matching is
//! best effort: a label with no matching entity stays as the engine drew it, and ambiguity is
//! settled by tier order and then list order.

use crate::entities::Entity;
use crate::svg::{BBox, DeterministicTextMeasurer, NodeId, SvgDocument};
use serde::Serialize;

const STROKE_WIDTH: &str = "2px";

/// Label classes that never name a participant.
const NON_PARTICIPANT_TEXT: &[&str] = &[
    "messageText",
    "noteText",
    "loopText",
    "labelText",
    "sequenceNumber",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum MatchTier {
    /// Node's declared lifeline key equals the entity's key.
    LifelineKey,
    /// Visible label equals the entity's display name.
    ExactName,
    /// Case-insensitive containment in either direction.
    Substring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaintTarget {
    /// Stick figure: head circle and body lines of the enclosing `g.actor-man`.
    Figure(NodeId),
    /// Rectangle nearest to the label.
    Box(NodeId),
    Lifeline(NodeId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    /// Label or lifeline node that was matched.
    pub node: NodeId,
    pub entity: usize,
    pub tier: MatchTier,
    pub target: PaintTarget,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchReport {
    pub records: Vec<MatchRecord>,
    /// Labels that matched an entity but had no rectangle close enough to paint.
    pub unplaced: usize,
}

impl MatchReport {
    pub fn figures(&self) -> usize {
        self.count(|t| matches!(t, PaintTarget::Figure(_)))
    }

    pub fn boxes(&self) -> usize {
        self.count(|t| matches!(t, PaintTarget::Box(_)))
    }

    pub fn lifelines(&self) -> usize {
        self.count(|t| matches!(t, PaintTarget::Lifeline(_)))
    }

    fn count(&self, pred: impl Fn(&PaintTarget) -> bool) -> usize {
        self.records.iter().filter(|r| pred(&r.target)).count()
    }
}

/// Finds the entity a label stands for. Tiers are tried in order across the whole list, so an
/// exact key match on a later entity beats a substring match on an earlier one.
pub fn match_label(
    entities: &[Entity],
    key: Option<&str>,
    label: &str,
) -> Option<(usize, MatchTier)> {
    if let Some(hit) = match_declared(entities, key, label) {
        return Some(hit);
    }
    if label.is_empty() {
        return None;
    }
    let label = label.to_lowercase();
    entities
        .iter()
        .position(|e| {
            let name = e.display_name.to_lowercase();
            name.contains(&label) || label.contains(&name)
        })
        .map(|i| (i, MatchTier::Substring))
}

/// Key and exact-name tiers only. Lifelines carry nothing but the key, so a substring test on it
/// would match far too much.
pub fn match_lifeline(entities: &[Entity], key: &str) -> Option<(usize, MatchTier)> {
    if key.is_empty() {
        return None;
    }
    match_declared(entities, Some(key), key)
}

fn match_declared(
    entities: &[Entity],
    key: Option<&str>,
    label: &str,
) -> Option<(usize, MatchTier)> {
    if let Some(key) = key.filter(|k| !k.is_empty()) {
        if let Some(i) = entities
            .iter()
            .position(|e| e.lifeline_key.as_deref() == Some(key))
        {
            return Some((i, MatchTier::LifelineKey));
        }
    }
    if label.is_empty() {
        return None;
    }
    entities
        .iter()
        .position(|e| e.display_name == label)
        .map(|i| (i, MatchTier::ExactName))
}

#[derive(Debug, Clone)]
pub struct ColorMatcher {
    measurer: DeterministicTextMeasurer,
    max_box_distance: f64,
}

impl Default for ColorMatcher {
    fn default() -> Self {
        Self {
            measurer: DeterministicTextMeasurer::default(),
            max_box_distance: 100.0,
        }
    }
}

impl ColorMatcher {
    pub fn new(measurer: DeterministicTextMeasurer, max_box_distance: f64) -> Self {
        Self {
            measurer,
            max_box_distance,
        }
    }

    pub fn max_box_distance(&self) -> f64 {
        self.max_box_distance
    }

    /// Decides every paint operation without touching the tree.
    pub fn plan(&self, doc: &SvgDocument, entities: &[Entity]) -> MatchReport {
        let mut report = MatchReport::default();
        if entities.is_empty() {
            return report;
        }

        let rects: Vec<(NodeId, BBox)> = doc
            .elements_named("rect")
            .into_iter()
            .filter_map(|r| doc.bbox(r, &self.measurer).map(|b| (r, b)))
            .collect();

        for text in doc.elements_named("text") {
            if NON_PARTICIPANT_TEXT.iter().any(|c| doc.has_class(text, c)) {
                continue;
            }
            let label = doc.text_content(text).trim().to_string();
            let key = declared_key(doc, text);
            let Some((entity, tier)) = match_label(entities, key, &label) else {
                continue;
            };

            let figure = doc
                .ancestors(text)
                .find(|g| doc.is(*g, "g") && doc.has_class(*g, "actor-man"));
            let target = match figure {
                Some(g) => Some(PaintTarget::Figure(g)),
                None => self.nearest_rect(doc, text, &rects).map(PaintTarget::Box),
            };
            match target {
                Some(target) => {
                    tracing::debug!(label = %label, entity, ?tier, ?target, "matched label");
                    report.records.push(MatchRecord {
                        node: text,
                        entity,
                        tier,
                        target,
                    });
                }
                None => {
                    tracing::debug!(label = %label, entity, "no rectangle close enough to label");
                    report.unplaced += 1;
                }
            }
        }

        for line in doc.elements_named("line") {
            if !doc.has_class(line, "actor-line") {
                continue;
            }
            let key = doc.attr(line, "name").unwrap_or_default();
            if let Some((entity, tier)) = match_lifeline(entities, key) {
                report.records.push(MatchRecord {
                    node: line,
                    entity,
                    tier,
                    target: PaintTarget::Lifeline(line),
                });
            }
        }
        report
    }

    /// Paints the tree using `entities` and reports what was painted.
    pub fn paint(&self, doc: &mut SvgDocument, entities: &[Entity]) -> MatchReport {
        let report = self.plan(doc, entities);
        for record in &report.records {
            let entity = &entities[record.entity];
            match record.target {
                PaintTarget::Figure(g) => paint_figure(doc, g, entity),
                PaintTarget::Box(rect) => {
                    doc.set_style(rect, "fill", entity.fill.as_str());
                    doc.set_style(rect, "stroke", entity.border.as_str());
                    doc.set_style(rect, "stroke-width", STROKE_WIDTH);
                }
                PaintTarget::Lifeline(line) => {
                    doc.set_style(line, "stroke", entity.border.as_str());
                    doc.set_style(line, "stroke-width", STROKE_WIDTH);
                }
            }
        }
        tracing::debug!(
            figures = report.figures(),
            boxes = report.boxes(),
            lifelines = report.lifelines(),
            "semantic colors applied"
        );
        report
    }

    fn nearest_rect(
        &self,
        doc: &SvgDocument,
        text: NodeId,
        rects: &[(NodeId, BBox)],
    ) -> Option<NodeId> {
        let text_box = doc.bbox(text, &self.measurer)?;
        let mut best: Option<(NodeId, f64)> = None;
        for (rect, rect_box) in rects {
            let d = rect_box.origin_distance(&text_box);
            if d >= self.max_box_distance {
                continue;
            }
            if best.is_none_or(|(_, bd)| d < bd) {
                best = Some((*rect, d));
            }
        }
        best.map(|(r, _)| r)
    }
}

/// The key a label declares: its own `name`, the nearest named group, or a named sibling
/// rectangle.
fn declared_key(doc: &SvgDocument, text: NodeId) -> Option<&str> {
    if let Some(name) = doc.attr(text, "name") {
        return Some(name);
    }
    if let Some(g) = doc.closest(text, |d, n| d.is(n, "g") && d.attr(n, "name").is_some()) {
        return doc.attr(g, "name");
    }
    let parent = doc.parent(text)?;
    doc.child_elements(parent)
        .find(|c| doc.is(*c, "rect") && doc.attr(*c, "name").is_some())
        .and_then(|r| doc.attr(r, "name"))
}

fn paint_figure(doc: &mut SvgDocument, figure: NodeId, entity: &Entity) {
    if let Some(circle) = doc.find_descendant(figure, "circle") {
        doc.set_style(circle, "fill", entity.fill.as_str());
        doc.set_style(circle, "stroke", entity.border.as_str());
        doc.set_style(circle, "stroke-width", STROKE_WIDTH);
    }
    let lines: Vec<NodeId> = doc
        .descendants(figure)
        .into_iter()
        .filter(|n| doc.is(*n, "line"))
        .collect();
    for line in lines {
        doc.set_style(line, "stroke", entity.border.as_str());
        doc.set_style(line, "stroke-width", STROKE_WIDTH);
    }
}
