use super::ApplyReport;
use crate::color::{Color, ColorChannel};
use crate::identity::{ElementId, IdentityIndex};
use crate::svg::{NodeId, SvgDocument};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorEdit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<Color>,
    #[serde(rename = "timestamp", with = "chrono::serde::ts_milliseconds")]
    pub recorded_at: DateTime<Utc>,
}

impl ColorEdit {
    pub fn channel(channel: ColorChannel, color: Color, recorded_at: DateTime<Utc>) -> Self {
        let mut edit = Self {
            fill: None,
            stroke: None,
            recorded_at,
        };
        match channel {
            ColorChannel::Fill => edit.fill = Some(color),
            ColorChannel::Stroke => edit.stroke = Some(color),
        }
        edit
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorOverlay(IndexMap<ElementId, ColorEdit>);

impl ColorOverlay {
    pub fn get(&self, id: &ElementId) -> Option<&ColorEdit> {
        self.0.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ElementId, &ColorEdit)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Records the channels `edit` sets; channels it leaves out keep their earlier value.
    pub fn record(&mut self, id: ElementId, edit: ColorEdit) {
        match self.0.get_mut(&id) {
            Some(existing) => {
                if edit.fill.is_some() {
                    existing.fill = edit.fill;
                }
                if edit.stroke.is_some() {
                    existing.stroke = edit.stroke;
                }
                existing.recorded_at = edit.recorded_at;
            }
            None => {
                self.0.insert(id, edit);
            }
        }
    }

    /// Whole-entry merge: an incoming entry replaces the stored one.
    pub fn merge(&mut self, other: &ColorOverlay) {
        for (id, edit) in &other.0 {
            self.0.insert(id.clone(), edit.clone());
        }
    }

    pub(super) fn paint(&self, doc: &mut SvgDocument, index: &IdentityIndex) -> ApplyReport {
        let mut report = ApplyReport::default();
        for (id, edit) in &self.0 {
            let Some(node) = index.get(id) else {
                report.skipped += 1;
                continue;
            };
            let target = color_target(doc, node);
            if let Some(fill) = &edit.fill {
                paint_channel(doc, target, ColorChannel::Fill, fill);
            }
            if let Some(stroke) = &edit.stroke {
                paint_channel(doc, target, ColorChannel::Stroke, stroke);
            }
            report.applied += 1;
        }
        report
    }
}

/// The node that actually carries a color: a group's rectangle, or the element itself.
pub fn color_target(doc: &SvgDocument, node: NodeId) -> NodeId {
    if doc.is(node, "g") {
        if let Some(rect) = doc.find_descendant(node, "rect") {
            return rect;
        }
    }
    node
}

/// Writes the color both as presentation attribute and inline style, so it beats any stylesheet
/// rule and any earlier inline paint.
pub(crate) fn paint_channel(
    doc: &mut SvgDocument,
    node: NodeId,
    channel: ColorChannel,
    color: &Color,
) {
    doc.set_attr(node, channel.property(), color.as_str());
    doc.set_style(node, channel.property(), color.as_str());
}
