mod debounce;
mod entities;
mod overlay;
mod path;
mod session;

use crate::svg::{NodeId, SvgDocument};
use chrono::{DateTime, TimeZone, Utc};

pub(crate) const BASIC_SVG: &str = include_str!("../../../../fixtures/sequence/basic.svg");
pub(crate) const BASIC_MMD: &str = include_str!("../../../../fixtures/sequence/basic.mmd");
pub(crate) const MATH_SVG: &str = include_str!("../../../../fixtures/sequence/math.svg");

pub(crate) fn basic() -> SvgDocument {
    SvgDocument::parse(BASIC_SVG).unwrap()
}

pub(crate) fn at(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).unwrap()
}

/// First element named `tag` whose text content is `text`.
pub(crate) fn by_text(doc: &SvgDocument, tag: &str, text: &str) -> NodeId {
    doc.elements_named(tag)
        .into_iter()
        .find(|n| doc.text_content(*n).trim() == text)
        .unwrap_or_else(|| panic!("no <{tag}> with text {text:?}"))
}

/// First element named `tag` carrying `class`.
pub(crate) fn by_class(doc: &SvgDocument, tag: &str, class: &str) -> NodeId {
    doc.elements_named(tag)
        .into_iter()
        .find(|n| doc.has_class(*n, class))
        .unwrap_or_else(|| panic!("no <{tag}> with class {class:?}"))
}

/// Element whose `name` attribute is `key`.
pub(crate) fn by_name(doc: &SvgDocument, tag: &str, key: &str) -> NodeId {
    doc.elements_named(tag)
        .into_iter()
        .find(|n| doc.attr(*n, "name") == Some(key))
        .unwrap_or_else(|| panic!("no <{tag}> named {key:?}"))
}

pub(crate) fn self_loop(doc: &SvgDocument) -> NodeId {
    doc.elements_named("path")
        .into_iter()
        .find(|n| doc.has_class(*n, "messageLine0"))
        .unwrap()
}
