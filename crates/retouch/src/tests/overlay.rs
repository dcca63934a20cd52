use super::*;
use crate::color::{Color, ColorChannel};
use crate::identity::{ElementId, IdentityResolver};
use crate::overlay::{
    ColorEdit, FLIPPED_ATTR, ModificationStore, OverlayKind, OverlayRecord, OverlaySet,
    OverlaySnapshot, PositionEdit, UNFLIPPED_D_ATTR, anchor_of, flip_path, is_flipped,
    set_position,
};

const LINE_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg"><line x1="100" y1="100" x2="200" y2="100" class="messageLine0"/></svg>"#;

fn stamped(markup: &str) -> SvgDocument {
    let mut doc = SvgDocument::parse(markup).unwrap();
    IdentityResolver::new().stamp(&mut doc);
    doc
}

#[test]
fn moving_a_line_translates_both_endpoints() {
    let mut doc = stamped(LINE_SVG);
    let line = doc.elements_named("line")[0];
    assert!(set_position(&mut doc, line, 110.0, 95.0));
    assert_eq!(doc.attr(line, "x1"), Some("110"));
    assert_eq!(doc.attr(line, "y1"), Some("95"));
    assert_eq!(doc.attr(line, "x2"), Some("210"));
    assert_eq!(doc.attr(line, "y2"), Some("95"));
    assert_eq!(anchor_of(&doc, line), Some((110.0, 95.0)));
}

#[test]
fn position_replay_is_idempotent() {
    let resolver = IdentityResolver::new();
    let mut store = ModificationStore::new();
    store.record(
        ElementId::from("line-0"),
        OverlayRecord::Position(PositionEdit::new(110.0, 95.0, "line", at(0))),
    );

    let mut doc = stamped(LINE_SVG);
    let first = store.replay(OverlayKind::Position, &mut doc, &resolver);
    let once = doc.to_svg_string();
    let second = store.replay(OverlayKind::Position, &mut doc, &resolver);
    assert_eq!(first.applied, 1);
    assert_eq!(second.applied, 1);
    assert_eq!(doc.to_svg_string(), once);
}

#[test]
fn positions_survive_a_rerender() {
    let resolver = IdentityResolver::new();
    let mut store = ModificationStore::new();
    let mut doc = basic();
    resolver.stamp(&mut doc);
    let note = doc.parent(by_class(&doc, "rect", "note")).unwrap();
    let id = resolver.identify(&doc, note);
    assert!(set_position(&mut doc, note, 300.0, 220.0));
    store.record(
        id.clone(),
        OverlayRecord::Position(PositionEdit::new(300.0, 220.0, "g", at(5))),
    );

    let mut fresh = basic();
    resolver.stamp(&mut fresh);
    let report = store.replay(OverlayKind::Position, &mut fresh, &resolver);
    assert_eq!(report.applied, 1);
    assert_eq!(report.skipped, 0);

    let rect = by_class(&fresh, "rect", "note");
    assert_eq!(fresh.attr(rect, "x"), Some("300"));
    assert_eq!(fresh.attr(rect, "y"), Some("220"));
    // The label keeps its offset from the rectangle.
    let label = by_class(&fresh, "text", "noteText");
    assert_eq!(fresh.attr(label, "x"), Some("425"));
    assert_eq!(fresh.attr(label, "y"), Some("225"));
    let tspan = fresh.child_elements(label).next().unwrap();
    assert_eq!(fresh.attr(tspan, "x"), Some("425"));
}

#[test]
fn unknown_keys_are_skipped_silently() {
    let resolver = IdentityResolver::new();
    let mut store = ModificationStore::new();
    store.record(
        ElementId::from("line-42"),
        OverlayRecord::Position(PositionEdit::new(1.0, 2.0, "line", at(0))),
    );
    let mut doc = stamped(LINE_SVG);
    let before = doc.to_svg_string();
    let report = store.replay(OverlayKind::Position, &mut doc, &resolver);
    assert_eq!(report.applied, 0);
    assert_eq!(report.skipped, 1);
    assert_eq!(doc.to_svg_string(), before);
}

#[test]
fn color_records_merge_per_channel() {
    let mut store = ModificationStore::new();
    let id = ElementId::from("group-10");
    store.record(
        id.clone(),
        OverlayRecord::Color(ColorEdit::channel(
            ColorChannel::Fill,
            Color::parse("#ff0000").unwrap(),
            at(1),
        )),
    );
    store.record(
        id.clone(),
        OverlayRecord::Color(ColorEdit::channel(
            ColorChannel::Stroke,
            Color::parse("#00ff00").unwrap(),
            at(2),
        )),
    );
    let edit = store.colors().get(&id).unwrap();
    assert_eq!(edit.fill.as_ref().map(Color::as_str), Some("#ff0000"));
    assert_eq!(edit.stroke.as_ref().map(Color::as_str), Some("#00ff00"));
    assert_eq!(edit.recorded_at, at(2));
}

#[test]
fn color_replay_paints_the_group_rectangle() {
    let resolver = IdentityResolver::new();
    let mut store = ModificationStore::new();
    store.record(
        ElementId::from("group-10"),
        OverlayRecord::Color(ColorEdit::channel(
            ColorChannel::Fill,
            Color::parse("#ABCDEF").unwrap(),
            at(1),
        )),
    );
    let mut doc = basic();
    resolver.stamp(&mut doc);
    store.replay(OverlayKind::Color, &mut doc, &resolver);
    let rect = by_class(&doc, "rect", "note");
    assert_eq!(doc.attr(rect, "fill"), Some("#ABCDEF"));
    assert_eq!(doc.style(rect, "fill").as_deref(), Some("#ABCDEF"));
    // Stroke was never recorded.
    assert_eq!(doc.attr(rect, "stroke"), Some("#666"));
}

#[test]
fn flipping_twice_restores_the_path() {
    let mut doc = basic();
    let path = self_loop(&doc);
    let original = doc.attr(path, "d").unwrap().to_string();

    assert_eq!(flip_path(&mut doc, path), Some(true));
    assert!(is_flipped(&doc, path));
    assert_eq!(
        doc.attr(path, "d"),
        Some("M 476,273 C 416,263 416,303 476,283")
    );

    assert_eq!(flip_path(&mut doc, path), Some(false));
    assert!(!is_flipped(&doc, path));
    assert_eq!(doc.attr(path, "d"), Some(original.as_str()));
}

#[test]
fn flipping_twice_restores_fractional_path_text() {
    let d = "M 100.5,20 C 160.25,40 160.0,80 100.5,100";
    let mut doc = SvgDocument::parse(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg"><path d="{d}"/></svg>"#
    ))
    .unwrap();
    let path = doc.elements_named("path")[0];

    assert_eq!(flip_path(&mut doc, path), Some(true));
    assert_eq!(
        doc.attr(path, "d"),
        Some("M 100.5,20 C 40.75,40 41,80 100.5,100")
    );
    assert_eq!(flip_path(&mut doc, path), Some(false));
    assert_eq!(doc.attr(path, "d"), Some(d));
    assert_eq!(doc.attr(path, UNFLIPPED_D_ATTR), None);

    for _ in 0..4 {
        flip_path(&mut doc, path);
    }
    assert_eq!(doc.attr(path, "d"), Some(d));
}

#[test]
fn unflipping_a_moved_loop_mirrors_its_current_geometry() {
    let mut doc = SvgDocument::parse(
        r#"<svg xmlns="http://www.w3.org/2000/svg"><path d="M 75,133 C 135,123 135,153 75,143"/></svg>"#,
    )
    .unwrap();
    let path = doc.elements_named("path")[0];
    flip_path(&mut doc, path);
    assert!(set_position(&mut doc, path, 80.0, 133.0));
    assert_eq!(flip_path(&mut doc, path), Some(false));
    assert_eq!(
        doc.attr(path, "d"),
        Some("M 80,133 C 140,123 140,153 80,143")
    );
}

#[test]
fn straight_paths_do_not_flip() {
    let mut doc = SvgDocument::parse(
        r#"<svg xmlns="http://www.w3.org/2000/svg"><path d="M 0,0 L 10,0"/></svg>"#,
    )
    .unwrap();
    let path = doc.elements_named("path")[0];
    assert_eq!(flip_path(&mut doc, path), None);
    assert_eq!(doc.attr(path, FLIPPED_ATTR), None);
}

#[test]
fn loop_flip_replay_is_idempotent() {
    let resolver = IdentityResolver::new();
    let mut store = ModificationStore::new();
    store.record(ElementId::from("path-1"), OverlayRecord::LoopFlip(true));

    let mut doc = basic();
    resolver.stamp(&mut doc);
    store.replay(OverlayKind::LoopFlip, &mut doc, &resolver);
    store.replay(OverlayKind::LoopFlip, &mut doc, &resolver);
    assert_eq!(
        doc.attr(self_loop(&doc), "d"),
        Some("M 476,273 C 416,263 416,303 476,283")
    );

    store.record(ElementId::from("path-1"), OverlayRecord::LoopFlip(false));
    assert!(store.flipped_loops().is_empty());
}

#[test]
fn apply_all_merges_then_paints() {
    let resolver = IdentityResolver::new();
    let mut store = ModificationStore::new();
    let mut incoming = ModificationStore::new();
    incoming.record(
        ElementId::from("line-0"),
        OverlayRecord::Position(PositionEdit::new(0.0, 0.0, "line", at(3))),
    );

    let mut doc = stamped(LINE_SVG);
    let snapshot = incoming.get_all(OverlayKind::Position);
    let report = store.apply_all(&snapshot, &mut doc, &resolver);
    assert_eq!(report.applied, 1);
    assert_eq!(store.positions().len(), 1);
    let line = doc.elements_named("line")[0];
    assert_eq!(doc.attr(line, "x2"), Some("100"));
    assert!(matches!(
        store.get_all(OverlayKind::Position),
        OverlaySnapshot::Position(p) if p.len() == 1
    ));
}

#[test]
fn exported_layers_reproduce_edits_after_clearing() {
    let resolver = IdentityResolver::new();
    let mut store = ModificationStore::new();
    let mut doc = basic();
    resolver.stamp(&mut doc);
    let note = doc.parent(by_class(&doc, "rect", "note")).unwrap();
    let id = resolver.identify(&doc, note);
    assert!(set_position(&mut doc, note, 300.0, 220.0));
    store.record(
        id.clone(),
        OverlayRecord::Position(PositionEdit::new(300.0, 220.0, "g", at(5))),
    );
    store.record(
        id,
        OverlayRecord::Color(ColorEdit::channel(
            ColorChannel::Fill,
            Color::parse("#ABCDEF").unwrap(),
            at(6),
        )),
    );
    let loop_path = self_loop(&doc);
    flip_path(&mut doc, loop_path);
    store.record(ElementId::from("path-1"), OverlayRecord::LoopFlip(true));
    let edited = store.export();

    let kinds = [OverlayKind::LoopFlip, OverlayKind::Position, OverlayKind::Color];
    let exported: Vec<_> = kinds.iter().map(|k| store.get_all(*k)).collect();
    for kind in kinds {
        store.clear(kind);
    }
    assert!(store.is_empty());

    let mut fresh = basic();
    resolver.stamp(&mut fresh);
    for snapshot in &exported {
        let report = store.apply_all(snapshot, &mut fresh, &resolver);
        assert_eq!(report.skipped, 0);
    }
    assert_eq!(store.export(), edited);

    let note = fresh.parent(by_class(&fresh, "rect", "note")).unwrap();
    assert_eq!(anchor_of(&fresh, note), Some((300.0, 220.0)));
    assert_eq!(
        fresh.style(by_class(&fresh, "rect", "note"), "fill").as_deref(),
        Some("#ABCDEF")
    );
    assert_eq!(fresh.attr(self_loop(&fresh), "d"), doc.attr(loop_path, "d"));
}

#[test]
fn applying_an_exported_layer_twice_changes_nothing() {
    let resolver = IdentityResolver::new();
    let mut store = ModificationStore::new();
    store.record(
        ElementId::from("group-10"),
        OverlayRecord::Position(PositionEdit::new(300.0, 220.0, "g", at(1))),
    );
    store.record(
        ElementId::from("group-10"),
        OverlayRecord::Color(ColorEdit::channel(
            ColorChannel::Stroke,
            Color::parse("#123456").unwrap(),
            at(2),
        )),
    );
    store.record(ElementId::from("path-1"), OverlayRecord::LoopFlip(true));

    for kind in [OverlayKind::LoopFlip, OverlayKind::Position, OverlayKind::Color] {
        let mut doc = basic();
        resolver.stamp(&mut doc);
        let snapshot = store.get_all(kind);
        let first = store.apply_all(&snapshot, &mut doc, &resolver);
        let once = doc.to_svg_string();
        let second = store.apply_all(&snapshot, &mut doc, &resolver);
        assert_eq!(first.applied, 1, "{kind:?}");
        assert_eq!(second.applied, 1, "{kind:?}");
        assert_eq!(doc.to_svg_string(), once, "{kind:?}");
    }
}

#[test]
fn clear_empties_one_layer_only() {
    let mut store = ModificationStore::new();
    store.record(ElementId::from("path-1"), OverlayRecord::LoopFlip(true));
    store.record(
        ElementId::from("line-0"),
        OverlayRecord::Position(PositionEdit::new(1.0, 1.0, "line", at(0))),
    );
    store.clear(OverlayKind::LoopFlip);
    assert!(store.flipped_loops().is_empty());
    assert_eq!(store.positions().len(), 1);
    store.clear_all();
    assert!(store.is_empty());
}

#[test]
fn overlay_set_serializes_with_original_field_names() {
    let mut store = ModificationStore::new();
    store.record(
        ElementId::from("line-3"),
        OverlayRecord::Position(PositionEdit::new(110.0, 95.0, "line", at(1_700_000_000_000))),
    );
    store.record(ElementId::from("path-1"), OverlayRecord::LoopFlip(true));
    let json = serde_json::to_value(store.export()).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "positions": {
                "line-3": {"x": 110.0, "y": 95.0, "type": "line", "timestamp": 1_700_000_000_000i64}
            },
            "flippedLoops": ["path-1"]
        })
    );

    let back: OverlaySet = serde_json::from_value(json).unwrap();
    assert_eq!(back, store.export());
}
