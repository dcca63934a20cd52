//! Span-preserving SVG path data.
//!
//! Edits rewrite only the numbers they change and copy everything else from the source string,
//! so an edit followed by its inverse restores the original text.

use super::fmt_places;
use crate::error::PathError;
use regex::Regex;
use std::sync::OnceLock;

fn re_token() -> &'static Regex {
    static ONCE: OnceLock<Regex> = OnceLock::new();
    ONCE.get_or_init(|| {
        Regex::new(r"[MmLlHhVvCcSsQqTtAaZz]|[-+]?(?:\d+\.\d*|\.\d+|\d+)(?:[eE][-+]?\d+)?").unwrap()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    X,
    Y,
    ControlX,
    ControlY,
    Other,
}

fn roles(command: char) -> &'static [Role] {
    use Role::*;
    match command.to_ascii_uppercase() {
        'M' | 'L' | 'T' => &[X, Y],
        'H' => &[X],
        'V' => &[Y],
        'C' => &[ControlX, ControlY, ControlX, ControlY, X, Y],
        'S' | 'Q' => &[ControlX, ControlY, X, Y],
        'A' => &[Other, Other, Other, Other, Other, X, Y],
        _ => &[],
    }
}

#[derive(Debug, Clone, Copy)]
struct Number {
    value: f64,
    places: u32,
    start: usize,
    end: usize,
}

/// Decimal places needed to write `tok` exactly without an exponent.
fn decimal_places(tok: &str) -> u32 {
    let (mantissa, exp) = match tok.find(['e', 'E']) {
        Some(i) => (&tok[..i], tok[i + 1..].parse::<i64>().unwrap_or(0)),
        None => (tok, 0),
    };
    let frac = mantissa
        .split_once('.')
        .map(|(_, f)| f.len() as i64)
        .unwrap_or(0);
    (frac - exp).clamp(0, MAX_PLACES as i64) as u32
}

const MAX_PLACES: u32 = 12;

#[derive(Debug, Clone)]
struct Segment {
    command: char,
    args: Vec<Number>,
    absolute: bool,
    from: (f64, f64),
    to: (f64, f64),
}

#[derive(Debug, Clone)]
pub struct PathData {
    source: String,
    segments: Vec<Segment>,
}

impl PathData {
    pub fn parse(d: &str) -> Result<Self, PathError> {
        let mut raw: Vec<(char, Vec<Number>)> = Vec::new();
        let mut command: Option<char> = None;
        let mut pending: Vec<Number> = Vec::new();

        for m in re_token().find_iter(d) {
            let tok = m.as_str();
            let first = tok.chars().next().unwrap_or(' ');
            if first.is_ascii_alphabetic() && !matches!(first, 'e' | 'E') {
                if let Some(c) = command {
                    if !pending.is_empty() {
                        return Err(PathError::TruncatedArguments { command: c });
                    }
                }
                if raw.is_empty() && !matches!(first, 'M' | 'm') {
                    return Err(PathError::MissingMoveTo);
                }
                command = Some(first);
                if matches!(first, 'Z' | 'z') {
                    raw.push((first, Vec::new()));
                }
                continue;
            }

            let Some(c) = command else {
                return Err(PathError::MissingMoveTo);
            };
            let Ok(value) = tok.parse::<f64>() else {
                continue;
            };
            pending.push(Number {
                value,
                places: decimal_places(tok),
                start: m.start(),
                end: m.end(),
            });
            let arity = roles(c).len();
            if arity > 0 && pending.len() == arity {
                raw.push((c, std::mem::take(&mut pending)));
                // Extra coordinate pairs after a moveto are implicit linetos.
                command = Some(match c {
                    'M' => 'L',
                    'm' => 'l',
                    other => other,
                });
            }
        }

        if let Some(c) = command {
            if !pending.is_empty() {
                return Err(PathError::TruncatedArguments { command: c });
            }
        }
        if raw.is_empty() {
            return Err(PathError::Empty);
        }

        let mut segments = Vec::with_capacity(raw.len());
        let mut cur = (0.0, 0.0);
        let mut subpath_start = (0.0, 0.0);
        for (i, (command, args)) in raw.into_iter().enumerate() {
            let absolute = command.is_ascii_uppercase() || i == 0;
            let from = cur;
            let v = |k: usize| args.get(k).map(|n| n.value).unwrap_or(0.0);
            let (base_x, base_y) = if absolute { (0.0, 0.0) } else { from };
            let to = match command.to_ascii_uppercase() {
                'M' | 'L' | 'T' => (base_x + v(0), base_y + v(1)),
                'H' => (base_x + v(0), from.1),
                'V' => (from.0, base_y + v(0)),
                'C' => (base_x + v(4), base_y + v(5)),
                'S' | 'Q' => (base_x + v(2), base_y + v(3)),
                'A' => (base_x + v(5), base_y + v(6)),
                _ => subpath_start,
            };
            if command.eq_ignore_ascii_case(&'M') {
                subpath_start = to;
            }
            cur = to;
            segments.push(Segment {
                command,
                args,
                absolute,
                from,
                to,
            });
        }

        Ok(Self {
            source: d.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn start_point(&self) -> (f64, f64) {
        self.segments.first().map(|s| s.to).unwrap_or((0.0, 0.0))
    }

    pub fn end_point(&self) -> (f64, f64) {
        self.segments.last().map(|s| s.to).unwrap_or((0.0, 0.0))
    }

    pub fn has_curve(&self) -> bool {
        self.segments.iter().any(|s| {
            matches!(
                s.command.to_ascii_uppercase(),
                'C' | 'S' | 'Q' | 'T' | 'A'
            )
        })
    }

    /// Structural self-loop test: the path starts and ends on a shared X or Y coordinate and
    /// curves in between.
    pub fn is_self_loop(&self) -> bool {
        const EPS: f64 = 1e-6;
        if self.segments.len() < 2 || !self.has_curve() {
            return false;
        }
        let (sx, sy) = self.start_point();
        let (ex, ey) = self.end_point();
        (sx - ex).abs() < EPS || (sy - ey).abs() < EPS
    }

    /// Every point the path passes through or bends towards, in absolute coordinates.
    pub fn hull_points(&self) -> Vec<(f64, f64)> {
        let mut out = Vec::new();
        for seg in &self.segments {
            let (bx, by) = if seg.absolute { (0.0, 0.0) } else { seg.from };
            let rs = roles(seg.command);
            let mut k = 0;
            while k + 1 < rs.len() {
                match (rs[k], rs[k + 1]) {
                    (Role::X, Role::Y) | (Role::ControlX, Role::ControlY) => {
                        out.push((bx + seg.args[k].value, by + seg.args[k + 1].value));
                        k += 2;
                    }
                    _ => k += 1,
                }
            }
            if seg.command.eq_ignore_ascii_case(&'H') || seg.command.eq_ignore_ascii_case(&'V') {
                out.push(seg.to);
            }
        }
        out
    }

    /// Shifts the path by `(dx, dy)`. Relative segments follow their absolute predecessors, so
    /// only absolute coordinates change.
    pub fn translate(&self, dx: f64, dy: f64) -> String {
        let mut edits = Vec::new();
        for seg in &self.segments {
            if !seg.absolute {
                continue;
            }
            for (n, role) in seg.args.iter().zip(roles(seg.command)) {
                match role {
                    Role::X | Role::ControlX => edits.push((*n, n.value + dx)),
                    Role::Y | Role::ControlY => edits.push((*n, n.value + dy)),
                    Role::Other => {}
                }
            }
        }
        self.rewrite(edits)
    }

    /// Mirrors the curve control points about the vertical line halfway between the start and end
    /// X coordinates. End points stay put, so applying this twice is the identity.
    pub fn flip_horizontal(&self) -> String {
        let axis_sum = self.start_point().0 + self.end_point().0;
        let mut edits = Vec::new();
        for seg in &self.segments {
            for (n, role) in seg.args.iter().zip(roles(seg.command)) {
                if *role != Role::ControlX {
                    continue;
                }
                let value = if seg.absolute {
                    axis_sum - n.value
                } else {
                    let abs = seg.from.0 + n.value;
                    (axis_sum - abs) - seg.from.0
                };
                edits.push((*n, value));
            }
        }
        self.rewrite(edits)
    }

    /// True when both paths have the same commands and the same numbers, however the numbers
    /// are written.
    pub fn same_geometry(&self, other: &PathData) -> bool {
        self.segments.len() == other.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| {
                a.command == b.command
                    && a.args.len() == b.args.len()
                    && a.args
                        .iter()
                        .zip(&b.args)
                        .all(|(x, y)| (x.value - y.value).abs() < 1e-9)
            })
    }

    /// Places to write rewritten numbers with. Sums and differences of the source numbers are
    /// exact at the finest precision found in the path.
    fn places(&self) -> u32 {
        self.segments
            .iter()
            .flat_map(|seg| seg.args.iter().map(|n| n.places))
            .max()
            .unwrap_or(0)
            .max(3)
    }

    fn rewrite(&self, mut edits: Vec<(Number, f64)>) -> String {
        edits.sort_by_key(|(n, _)| n.start);
        let places = self.places();
        let src = self.source.as_str();
        let bytes = src.as_bytes();
        let mut out = String::with_capacity(src.len() + 8);
        let mut last = 0usize;
        for (n, value) in edits {
            out.push_str(&src[last..n.start]);
            last = n.end;
            if (value - n.value).abs() < 1e-9 {
                out.push_str(&src[n.start..n.end]);
                continue;
            }
            let text = fmt_places(value, places);
            let prev = out.as_bytes().last().copied();
            if prev.is_some_and(|b| b.is_ascii_digit() || b == b'.')
                && text.as_bytes().first().is_some_and(|b| b.is_ascii_digit())
            {
                out.push(' ');
            }
            out.push_str(&text);
            if bytes.get(n.end) == Some(&b'.') {
                out.push(' ');
            }
        }
        out.push_str(&src[last..]);
        out
    }
}
