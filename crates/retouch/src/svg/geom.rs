use super::{NodeId, PathData, SvgDocument};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BBox {
    pub fn from_points(points: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        let mut it = points.into_iter();
        let (x0, y0) = it.next()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (x0, y0, x0, y0);
        for (x, y) in it {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        Some(Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        })
    }

    pub fn union(self, other: Self) -> Self {
        let min_x = self.x.min(other.x);
        let min_y = self.y.min(other.y);
        let max_x = (self.x + self.width).max(other.x + other.width);
        let max_y = (self.y + self.height).max(other.y + other.height);
        Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        }
    }

    /// Manhattan distance between the two box origins.
    pub fn origin_distance(&self, other: &Self) -> f64 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

#[derive(Debug, Clone)]
pub struct TextStyle {
    pub font_size: f64,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self { font_size: 16.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    pub width: f64,
    pub height: f64,
    pub line_count: usize,
}

pub trait TextMeasurer {
    fn measure(&self, text: &str, style: &TextStyle) -> TextMetrics;
}

/// Character-count based text box estimate. Good enough to rank label/rectangle proximity; it
/// never tries to match a browser's font metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeterministicTextMeasurer {
    pub char_width_factor: f64,
    pub line_height_factor: f64,
}

impl Default for DeterministicTextMeasurer {
    fn default() -> Self {
        Self {
            char_width_factor: 0.6,
            line_height_factor: 1.2,
        }
    }
}

impl TextMeasurer for DeterministicTextMeasurer {
    fn measure(&self, text: &str, style: &TextStyle) -> TextMetrics {
        let char_width_factor = if self.char_width_factor == 0.0 {
            0.6
        } else {
            self.char_width_factor
        };
        let line_height_factor = if self.line_height_factor == 0.0 {
            1.2
        } else {
            self.line_height_factor
        };

        let lines: Vec<&str> = text.split('\n').collect();
        let font_size = style.font_size.max(1.0);
        let max_chars = lines
            .iter()
            .map(|l| l.trim().chars().count())
            .max()
            .unwrap_or(0);

        TextMetrics {
            width: max_chars as f64 * font_size * char_width_factor,
            height: lines.len() as f64 * font_size * line_height_factor,
            line_count: lines.len(),
        }
    }
}

impl SvgDocument {
    /// Untransformed bounding box in user units. Text boxes are estimated with `measurer`.
    pub fn bbox(&self, id: NodeId, measurer: &dyn TextMeasurer) -> Option<BBox> {
        let name = self.name(id)?;
        match name {
            "rect" | "foreignObject" | "image" | "use" => Some(BBox {
                x: self.attr_f64(id, "x").unwrap_or(0.0),
                y: self.attr_f64(id, "y").unwrap_or(0.0),
                width: self.attr_f64(id, "width").unwrap_or(0.0),
                height: self.attr_f64(id, "height").unwrap_or(0.0),
            }),
            "line" => BBox::from_points([
                (
                    self.attr_f64(id, "x1").unwrap_or(0.0),
                    self.attr_f64(id, "y1").unwrap_or(0.0),
                ),
                (
                    self.attr_f64(id, "x2").unwrap_or(0.0),
                    self.attr_f64(id, "y2").unwrap_or(0.0),
                ),
            ]),
            "circle" | "ellipse" => {
                let cx = self.attr_f64(id, "cx").unwrap_or(0.0);
                let cy = self.attr_f64(id, "cy").unwrap_or(0.0);
                let rx = self
                    .attr_f64(id, "r")
                    .or_else(|| self.attr_f64(id, "rx"))
                    .unwrap_or(0.0);
                let ry = self
                    .attr_f64(id, "r")
                    .or_else(|| self.attr_f64(id, "ry"))
                    .unwrap_or(0.0);
                Some(BBox {
                    x: cx - rx,
                    y: cy - ry,
                    width: 2.0 * rx,
                    height: 2.0 * ry,
                })
            }
            "path" => {
                let d = self.attr(id, "d")?;
                let path = PathData::parse(d).ok()?;
                BBox::from_points(path.hull_points())
            }
            "text" => self.text_bbox(id, measurer),
            _ => self
                .child_elements(id)
                .filter_map(|c| self.bbox(c, measurer))
                .reduce(BBox::union),
        }
    }

    /// Position a label is anchored at: the `text` element's own x/y, or its first `tspan`'s.
    pub fn text_anchor_point(&self, id: NodeId) -> (f64, f64) {
        let tspan = self.child_elements(id).find(|c| self.is(*c, "tspan"));
        let x = self
            .attr_f64(id, "x")
            .or_else(|| tspan.and_then(|t| self.attr_f64(t, "x")))
            .unwrap_or(0.0);
        let y = self
            .attr_f64(id, "y")
            .or_else(|| tspan.and_then(|t| self.attr_f64(t, "y")))
            .unwrap_or(0.0);
        (x, y)
    }

    fn font_size(&self, id: NodeId) -> f64 {
        self.closest(id, |d, n| d.presentation(n, "font-size").is_some())
            .and_then(|n| self.presentation(n, "font-size"))
            .and_then(|v| v.trim().trim_end_matches("px").parse::<f64>().ok())
            .unwrap_or(16.0)
    }

    fn text_bbox(&self, id: NodeId, measurer: &dyn TextMeasurer) -> Option<BBox> {
        let lines: Vec<String> = {
            let tspans: Vec<NodeId> = self
                .child_elements(id)
                .filter(|c| self.is(*c, "tspan"))
                .collect();
            if tspans.is_empty() {
                vec![self.text_content(id)]
            } else {
                tspans.iter().map(|t| self.text_content(*t)).collect()
            }
        };
        let metrics = measurer.measure(
            &lines.join("\n"),
            &TextStyle {
                font_size: self.font_size(id),
            },
        );

        let (x, y) = self.text_anchor_point(id);
        let anchor = self.presentation(id, "text-anchor").unwrap_or_default();
        let left = match anchor.trim() {
            "middle" => x - metrics.width / 2.0,
            "end" => x - metrics.width,
            _ => x,
        };
        let baseline = self.presentation(id, "dominant-baseline").unwrap_or_default();
        let top = match baseline.trim() {
            "central" | "middle" => y - metrics.height / 2.0,
            "hanging" | "text-before-edge" => y,
            _ => y - metrics.height * 0.8,
        };
        Some(BBox {
            x: left,
            y: top,
            width: metrics.width,
            height: metrics.height,
        })
    }
}
