use super::*;
use crate::clock::ManualClock;
use crate::color::{Color, ColorChannel};
use crate::config::RetouchConfig;
use crate::controller::{Axis, ControllerState, EditEffect, Step};
use crate::entities::{Entity, Role};
use crate::error::{EngineError, RenderError, StorageError};
use crate::identity::ElementId;
use crate::orchestrator::{DiagramEngine, NoPause, PrerenderedEngine};
use crate::session::{Session, Startup, StatusLevel};
use crate::share::{AutoSave, KeyValueStore, MemoryStore, ShareSnapshot, encode_inline};
use futures::executor::block_on;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::cell::RefCell;
use std::rc::Rc;
use url::Url;

/// Storage shared between a session and the test body.
#[derive(Clone, Default)]
struct SharedStore(Rc<RefCell<MemoryStore>>);

impl KeyValueStore for SharedStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.0.borrow().get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.0.borrow_mut().set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.0.borrow_mut().remove(key)
    }
}

struct BrokenEngine;

impl DiagramEngine for BrokenEngine {
    async fn render(&self, _diagram_id: &str, _source: &str) -> Result<String, EngineError> {
        Err(EngineError::new("Lexical error on line 3"))
    }
}

fn session_with(
    engine: PrerenderedEngine,
    store: &SharedStore,
    clock: &ManualClock,
) -> Session<PrerenderedEngine, NoPause> {
    Session::new(
        RetouchConfig::default(),
        engine,
        NoPause,
        Box::new(store.clone()),
        Box::new(clock.clone()),
    )
}

fn session(store: &SharedStore, clock: &ManualClock) -> Session<PrerenderedEngine, NoPause> {
    session_with(PrerenderedEngine::new(BASIC_SVG), store, clock)
}

fn base() -> Url {
    Url::parse("https://example.test/editor").unwrap()
}

#[test]
fn render_paints_and_reports_success() {
    let store = SharedStore::default();
    let clock = ManualClock::new(0);
    let mut s = session(&store, &clock);
    s.set_source(BASIC_MMD);
    block_on(s.render()).unwrap();

    assert_eq!(s.status().message, "Rendered successfully!");
    assert_eq!(s.status().level, StatusLevel::Success);
    let doc = s.document().unwrap();
    let circle = doc.elements_named("circle")[0];
    assert_eq!(doc.style(circle, "fill").as_deref(), Some("#87CEEB"));
    assert!(s.svg().unwrap().starts_with("<svg"));
}

#[test]
fn blank_source_asks_for_code() {
    let store = SharedStore::default();
    let clock = ManualClock::new(0);
    let mut s = session(&store, &clock);
    let err = block_on(s.render()).unwrap_err();
    assert!(matches!(err, RenderError::EmptySource));
    assert_eq!(s.status().message, "Please enter some Mermaid code");
    assert_eq!(s.status().level, StatusLevel::Error);
}

#[test]
fn engine_failures_surface_verbatim_and_keep_edits() {
    let store = SharedStore::default();
    let clock = ManualClock::new(0);
    let mut s: Session<BrokenEngine, NoPause> = Session::new(
        RetouchConfig::default(),
        BrokenEngine,
        NoPause,
        Box::new(store.clone()),
        Box::new(clock.clone()),
    );
    s.set_source("sequenceDiagram\n  A->>");
    block_on(s.render()).unwrap_err();
    assert_eq!(s.status().message, "Lexical error on line 3");
    assert!(s.document().is_none());
    assert_eq!(s.toggle_interactive(), ControllerState::Off);
    assert_eq!(s.status().message, "Please render a diagram first");
}

#[test]
fn edits_survive_rerender_and_are_autosaved_after_quiet_period() {
    let store = SharedStore::default();
    let clock = ManualClock::new(10_000);
    let mut s = session(&store, &clock);
    s.set_source(BASIC_MMD);
    block_on(s.render()).unwrap();
    // Source edits arm the save as well; let that one go first.
    clock.advance_ms(1_000);
    assert!(s.tick());

    assert_eq!(s.toggle_interactive(), ControllerState::On);
    assert_eq!(
        s.status().message,
        "Interactive mode ON - Click elements to adjust positions"
    );
    let path = self_loop(s.document().unwrap());
    assert!(s.click(path).unwrap().self_loop);
    assert!(matches!(
        s.flip_loop(),
        EditEffect::LoopFlipped { flipped: true, .. }
    ));
    assert!(s.autosave_pending());

    clock.advance_ms(400);
    assert!(!s.tick());
    let effect = s.nudge(Axis::X, Step::PlusFive);
    assert_eq!(
        effect,
        EditEffect::Moved {
            id: ElementId::from("path-1"),
            x: 481.0,
            y: 273.0
        }
    );
    clock.advance_ms(999);
    assert!(!s.tick());
    clock.advance_ms(1);
    assert!(s.tick());

    let saved = AutoSave.restore(&store).unwrap().unwrap();
    let edits = saved.modifications.unwrap();
    assert!(edits.flipped_loops.contains(&ElementId::from("path-1")));
    assert_eq!(edits.positions.len(), 1);

    block_on(s.render()).unwrap();
    assert!(s.controller().is_on());
    assert!(s.controller().surface().is_none());
    let doc = s.document().unwrap();
    assert_eq!(
        doc.attr(self_loop(doc), "d"),
        Some("M 481,273 C 421,263 421,303 481,283")
    );
}

#[test]
fn short_links_reload_in_a_new_session() {
    let store = SharedStore::default();
    let clock = ManualClock::new(0);
    let mut rng = StdRng::seed_from_u64(11);

    let mut author = session(&store, &clock);
    author.set_source(BASIC_MMD);
    block_on(author.render()).unwrap();
    author.toggle_interactive();
    let rect = by_class(author.document().unwrap(), "rect", "note");
    author.click(rect).unwrap();
    author.set_element_color(ColorChannel::Fill, Color::parse("#ff00ff").unwrap());
    let url = author.share_short_link(&base(), &mut rng).unwrap();
    assert_eq!(author.status().message, "Shareable link created!");

    let mut reader = session(&store, &clock);
    let startup = reader.startup(Some(&url));
    assert!(matches!(startup, Startup::SharedLink(_)));
    assert_eq!(reader.status().message, "Shared diagram loaded successfully!");
    assert_eq!(reader.source(), BASIC_MMD);
    block_on(reader.render()).unwrap();
    let doc = reader.document().unwrap();
    assert_eq!(doc.attr(by_class(doc, "rect", "note"), "fill"), Some("#ff00ff"));
}

#[test]
fn unknown_short_links_report_failure() {
    let store = SharedStore::default();
    let clock = ManualClock::new(0);
    let mut s = session(&store, &clock);
    let url = Url::parse("https://example.test/editor?id=Nope1234").unwrap();
    assert_eq!(s.startup(Some(&url)), Startup::Failed);
    assert_eq!(s.status().message, "Shared link not found or expired");
    assert_eq!(s.status().level, StatusLevel::Error);
}

#[test]
fn inline_data_replaces_the_entity_list() {
    let store = SharedStore::default();
    let clock = ManualClock::new(0);
    let mut s = session(&store, &clock);
    let shared = ShareSnapshot::new(
        "sequenceDiagram\n  A->>B: hi",
        vec![Entity::new(
            "Alice",
            Some("A"),
            Role::Actor,
            Color::parse("pink").unwrap(),
            Color::parse("purple").unwrap(),
        )],
    );
    let mut url = base();
    url.set_query(Some(&format!("data={}", encode_inline(&shared).unwrap())));

    assert_eq!(s.startup(Some(&url)), Startup::InlineData);
    assert_eq!(s.source(), "sequenceDiagram\n  A->>B: hi");
    assert_eq!(s.entities().len(), 1);
    assert_eq!(s.entities().entities()[0].display_name, "Alice");
}

#[test]
fn startup_without_share_restores_previous_work() {
    let store = SharedStore::default();
    let clock = ManualClock::new(0);
    {
        let mut first = session(&store, &clock);
        first.set_source("sequenceDiagram\n  X->>Y: saved");
        first.autosave_now().unwrap();
    }
    let mut second = session(&store, &clock);
    assert_eq!(second.startup(None), Startup::RestoredWork);
    assert_eq!(second.source(), "sequenceDiagram\n  X->>Y: saved");
    assert_eq!(second.status().message, "Previous work restored");

    let mut empty = session(&SharedStore::default(), &clock);
    assert_eq!(empty.startup(None), Startup::Fresh);
}

#[test]
fn reset_formatting_discards_all_edits() {
    let store = SharedStore::default();
    let clock = ManualClock::new(0);
    let mut s = session(&store, &clock);
    s.set_source(BASIC_MMD);
    block_on(s.render()).unwrap();
    s.toggle_interactive();
    let path = self_loop(s.document().unwrap());
    s.click(path);
    s.flip_loop();
    s.autosave_now().unwrap();

    block_on(s.reset_formatting()).unwrap();
    assert!(s.modifications().is_empty());
    assert!(!s.controller().is_on());
    assert!(AutoSave.restore(&store).unwrap().is_none());
    assert_eq!(
        s.status().message,
        "All formatting cleared - diagram reset to original!"
    );
    let doc = s.document().unwrap();
    assert_eq!(
        doc.attr(self_loop(doc), "d"),
        Some("M 476,273 C 536,263 536,303 476,283")
    );
}

#[test]
fn sharing_nothing_is_refused() {
    let store = SharedStore::default();
    let clock = ManualClock::new(0);
    let mut s = session(&store, &clock);
    assert!(s.share_inline(&base()).is_err());
    assert_eq!(s.status().message, "No code to share");
}

#[test]
fn entity_edits_report_status_and_schedule_saves() {
    let store = SharedStore::default();
    let clock = ManualClock::new(0);
    let mut s = session(&store, &clock);

    s.add_entity(Entity::new(
        "Dora",
        None,
        Role::Box,
        Color::parse("white").unwrap(),
        Color::parse("black").unwrap(),
    ))
    .unwrap();
    assert_eq!(s.status().message, "Participant added successfully!");
    assert!(s.autosave_pending());

    s.set_entity_color(0, ColorChannel::Stroke, Color::parse("navy").unwrap())
        .unwrap();
    assert_eq!(s.status().message, "Consumer (C) border color updated");

    s.add_entity(Entity::new(
        "Dora",
        None,
        Role::Box,
        Color::parse("white").unwrap(),
        Color::parse("black").unwrap(),
    ))
    .unwrap_err();
    assert_eq!(s.status().level, StatusLevel::Error);

    s.clear_entities();
    assert!(s.entities().is_empty());
    s.reset_entities();
    assert_eq!(s.entities().len(), 3);
    assert_eq!(s.status().message, "Reset to default participants");
}

#[test]
fn apply_colors_needs_a_rendered_diagram() {
    let store = SharedStore::default();
    let clock = ManualClock::new(0);
    let mut s = session(&store, &clock);
    assert!(!s.apply_entity_colors());
    assert_eq!(s.status().message, "Please render a diagram first");

    s.set_source(BASIC_MMD);
    block_on(s.render()).unwrap();
    s.set_entity_color(1, ColorChannel::Fill, Color::parse("#00ff00").unwrap())
        .unwrap();
    assert!(s.apply_entity_colors());
    let doc = s.document().unwrap();
    let rect = by_name(doc, "rect", "I");
    assert_eq!(doc.style(rect, "fill").as_deref(), Some("#00ff00"));
    assert_eq!(s.status().message, "All colors applied!");
}

#[test]
fn storage_failures_do_not_break_the_session() {
    let clock = ManualClock::new(0);
    let mut s: Session<PrerenderedEngine, NoPause> = Session::new(
        RetouchConfig::default(),
        PrerenderedEngine::new(BASIC_SVG),
        NoPause,
        Box::new(MemoryStore::with_quota(8)),
        Box::new(clock.clone()),
    );
    s.set_source(BASIC_MMD);
    assert!(s.autosave_now().is_err());
    assert_eq!(s.status().level, StatusLevel::Error);
    block_on(s.render()).unwrap();
    assert_eq!(s.status().message, "Rendered successfully!");
}
