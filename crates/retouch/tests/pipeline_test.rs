use retouch::share::{MemoryStore, decode_inline};
use retouch::{
    Axis, ElementId, Entity, ManualClock, NoPause, PrerenderedEngine, RetouchConfig, Session,
    Startup, Step, SvgDocument,
};
use std::path::PathBuf;
use url::Url;

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

fn fixture(name: &str) -> String {
    let path = workspace_root().join("fixtures").join("sequence").join(name);
    std::fs::read_to_string(&path).expect("fixture")
}

fn session(clock: &ManualClock) -> Session<PrerenderedEngine, NoPause> {
    Session::new(
        RetouchConfig::default(),
        PrerenderedEngine::new(fixture("basic.svg")),
        NoPause,
        Box::new(MemoryStore::new()),
        Box::new(clock.clone()),
    )
}

fn message_text(doc: &SvgDocument, label: &str) -> retouch::NodeId {
    doc.elements_named("text")
        .into_iter()
        .find(|n| doc.text_content(*n).trim() == label)
        .expect("message label")
}

#[test]
fn edits_follow_the_diagram_through_renders_and_shares() {
    let clock = ManualClock::new(1_700_000_000_000);
    let mut author = session(&clock);
    author.set_source(&fixture("basic.mmd"));
    futures::executor::block_on(author.render()).expect("render");

    author.toggle_interactive();
    let label = message_text(author.document().expect("document"), "forward");
    let surface = author.click(label).expect("surface");
    assert_eq!((surface.input_x, surface.input_y), (375.0, 143.0));
    author.nudge(Axis::Y, Step::PlusFive);
    author.nudge(Axis::X, Step::MinusOne);

    futures::executor::block_on(author.render()).expect("re-render");
    let doc = author.document().expect("document");
    let moved = message_text(doc, "forward");
    assert_eq!(doc.attr(moved, "x"), Some("374"));
    assert_eq!(doc.attr(moved, "y"), Some("148"));
    // Labels carry no ordinal; they are keyed by their text.
    assert!(
        author
            .modifications()
            .positions()
            .get(&ElementId::from("text_forward"))
            .is_some()
    );

    let base = Url::parse("https://editor.example/").expect("url");
    let shared = author.share_inline(&base).expect("share");
    let data = shared
        .query_pairs()
        .find(|(k, _)| k == "data")
        .map(|(_, v)| v.into_owned())
        .expect("data param");
    let snapshot = decode_inline(&data).expect("decode");
    assert_eq!(snapshot.participants, Entity::defaults());
    assert_eq!(snapshot.modifications.expect("edits").positions.len(), 1);

    let mut reader = session(&clock);
    assert_eq!(reader.startup(Some(&shared)), Startup::InlineData);
    futures::executor::block_on(reader.render()).expect("render");
    let doc = reader.document().expect("document");
    let moved = message_text(doc, "forward");
    assert_eq!(doc.attr(moved, "x"), Some("374"));
    assert_eq!(doc.attr(moved, "y"), Some("148"));
}

#[test]
fn math_labels_are_addressable_blocks() {
    let clock = ManualClock::new(0);
    let mut s = Session::new(
        RetouchConfig::default(),
        PrerenderedEngine::new(fixture("math.svg")),
        NoPause,
        Box::new(MemoryStore::new()),
        Box::new(clock),
    );
    s.set_source("sequenceDiagram\n  Alice->>Alice: $$E = mc^2$$");
    futures::executor::block_on(s.render()).expect("render");
    let doc = s.document().expect("document");
    let block = doc.elements_named("foreignObject")[0];
    assert_eq!(doc.attr(block, "data-retouch-id"), Some("block-0"));
}
