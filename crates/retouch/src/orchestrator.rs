//! Render/Reapply Orchestrator.
//!
//! Sequences one full render: engine call, identity stamping, semantic coloring, note
//! reordering, then overlay replay in a fixed order. Each stage starts after the previous one
//! (and its settle delay) has finished. Replaying user colors after semantic colors makes user
//! overrides win; replaying loop flips before positions keeps path translation working on the
//! flipped geometry.

use crate::entities::Entity;
use crate::error::{EngineError, RenderError};
use crate::identity::{IdentityResolver, StampReport};
use crate::matcher::{ColorMatcher, MatchReport};
use crate::overlay::{ApplyReport, ModificationStore, OverlayKind};
use crate::svg::{NodeId, SvgDocument};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, RenderError>;

/// The external diagram engine: source text in, SVG markup out. A rejection carries the
/// engine's own message.
pub trait DiagramEngine {
    fn render(
        &self,
        diagram_id: &str,
        source: &str,
    ) -> impl Future<Output = std::result::Result<String, EngineError>>;
}

/// An engine that always returns the same markup. Useful when the SVG was produced elsewhere.
#[derive(Debug, Clone)]
pub struct PrerenderedEngine {
    markup: String,
}

impl PrerenderedEngine {
    pub fn new(markup: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
        }
    }
}

impl DiagramEngine for PrerenderedEngine {
    async fn render(
        &self,
        _diagram_id: &str,
        _source: &str,
    ) -> std::result::Result<String, EngineError> {
        Ok(self.markup.clone())
    }
}

/// Waits between stages so the engine's own asynchronous layout can settle.
pub trait Pause {
    fn pause(&self, duration: Duration) -> impl Future<Output = ()>;
}

/// Blocks the current thread for the requested duration.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    async fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Skips every delay. For engines that finish before returning.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPause;

impl Pause for NoPause {
    async fn pause(&self, _duration: Duration) {}
}

/// Settle delays in milliseconds after each stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageDelays {
    pub after_render: u64,
    pub after_coloring: u64,
    pub after_reorder: u64,
    pub after_loop_flips: u64,
    pub after_positions: u64,
    pub after_colors: u64,
}

impl Default for StageDelays {
    fn default() -> Self {
        Self {
            after_render: 100,
            after_coloring: 50,
            after_reorder: 50,
            after_loop_flips: 50,
            after_positions: 50,
            after_colors: 50,
        }
    }
}

impl StageDelays {
    pub fn zero() -> Self {
        Self {
            after_render: 0,
            after_coloring: 0,
            after_reorder: 0,
            after_loop_flips: 0,
            after_positions: 0,
            after_colors: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Render,
    Stamp,
    SemanticColor,
    ReorderNotes,
    ReplayLoopFlips,
    ReplayPositions,
    ReplayColors,
    ReorderNotesFinal,
}

impl Stage {
    pub const ORDER: [Stage; 8] = [
        Stage::Render,
        Stage::Stamp,
        Stage::SemanticColor,
        Stage::ReorderNotes,
        Stage::ReplayLoopFlips,
        Stage::ReplayPositions,
        Stage::ReplayColors,
        Stage::ReorderNotesFinal,
    ];
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub loop_flips: ApplyReport,
    pub positions: ApplyReport,
    pub colors: ApplyReport,
}

impl ReplayReport {
    pub fn total(&self) -> ApplyReport {
        let mut total = ApplyReport::default();
        total.absorb(self.loop_flips);
        total.absorb(self.positions);
        total.absorb(self.colors);
        total
    }
}

#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub diagram_id: String,
    pub document: SvgDocument,
    pub stamp: StampReport,
    pub colors: MatchReport,
    pub replay: ReplayReport,
    pub notes_raised: usize,
    /// Stages in the order they completed.
    pub stages: Vec<Stage>,
}

impl RenderOutcome {
    pub fn svg(&self) -> String {
        self.document.to_svg_string()
    }
}

/// Note groups (a `g` holding a `rect.note`), in document order.
fn note_groups(doc: &SvgDocument) -> Vec<NodeId> {
    doc.elements_named("rect")
        .into_iter()
        .filter(|r| doc.has_class(*r, "note"))
        .filter_map(|r| doc.parent(r).filter(|p| doc.is(*p, "g")))
        .collect()
}

/// Moves every note group to the end of its parent so notes paint above lifelines and messages.
/// Relative order among notes is kept.
pub fn raise_notes(doc: &mut SvgDocument) -> usize {
    let notes = note_groups(doc);
    for g in &notes {
        doc.move_to_end(*g);
    }
    notes.len()
}

#[derive(Debug)]
pub struct Orchestrator<E, P> {
    engine: E,
    pause: P,
    resolver: IdentityResolver,
    matcher: ColorMatcher,
    delays: StageDelays,
    counter: u64,
}

impl<E: DiagramEngine, P: Pause> Orchestrator<E, P> {
    pub fn new(engine: E, pause: P) -> Self {
        Self {
            engine,
            pause,
            resolver: IdentityResolver::new(),
            matcher: ColorMatcher::default(),
            delays: StageDelays::default(),
            counter: 0,
        }
    }

    pub fn with_matcher(mut self, matcher: ColorMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_delays(mut self, delays: StageDelays) -> Self {
        self.delays = delays;
        self
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    pub fn matcher(&self) -> &ColorMatcher {
        &self.matcher
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    async fn settle(&self, ms: u64) {
        self.pause.pause(Duration::from_millis(ms)).await;
    }

    /// Runs the whole pipeline. An engine rejection aborts before anything else runs; the
    /// modification store is only read, never written.
    pub async fn run(
        &mut self,
        source: &str,
        entities: &[Entity],
        store: &ModificationStore,
    ) -> Result<RenderOutcome> {
        let source = source.trim();
        if source.is_empty() {
            return Err(RenderError::EmptySource);
        }

        self.counter += 1;
        let diagram_id = format!("retouch-{}", self.counter);
        let mut stages = Vec::with_capacity(Stage::ORDER.len());

        let markup = match self.engine.render(&diagram_id, source).await {
            Ok(markup) => markup,
            Err(err) => {
                tracing::warn!(diagram_id = %diagram_id, error = %err, "engine rejected source");
                return Err(RenderError::Engine(err));
            }
        };
        stages.push(Stage::Render);
        self.settle(self.delays.after_render).await;

        let mut document = SvgDocument::parse(&markup)?;

        let stamp = self.resolver.stamp(&mut document);
        stages.push(Stage::Stamp);

        let colors = self.matcher.paint(&mut document, entities);
        stages.push(Stage::SemanticColor);
        self.settle(self.delays.after_coloring).await;

        raise_notes(&mut document);
        stages.push(Stage::ReorderNotes);
        self.settle(self.delays.after_reorder).await;

        let loop_flips = store.replay(OverlayKind::LoopFlip, &mut document, &self.resolver);
        stages.push(Stage::ReplayLoopFlips);
        self.settle(self.delays.after_loop_flips).await;

        let positions = store.replay(OverlayKind::Position, &mut document, &self.resolver);
        stages.push(Stage::ReplayPositions);
        self.settle(self.delays.after_positions).await;

        let replayed_colors = store.replay(OverlayKind::Color, &mut document, &self.resolver);
        stages.push(Stage::ReplayColors);
        self.settle(self.delays.after_colors).await;

        let notes_raised = raise_notes(&mut document);
        stages.push(Stage::ReorderNotesFinal);

        let replay = ReplayReport {
            loop_flips,
            positions,
            colors: replayed_colors,
        };
        tracing::info!(
            diagram_id = %diagram_id,
            stamped = stamp.total(),
            painted = colors.records.len(),
            replayed = replay.total().applied,
            skipped = replay.total().skipped,
            "render pipeline finished"
        );

        Ok(RenderOutcome {
            diagram_id,
            document,
            stamp,
            colors,
            replay,
            notes_raised,
            stages,
        })
    }

    /// Blocking wrapper around [`Orchestrator::run`] for callers without an executor.
    pub fn run_blocking(
        &mut self,
        source: &str,
        entities: &[Entity],
        store: &ModificationStore,
    ) -> Result<RenderOutcome> {
        futures::executor::block_on(self.run(source, entities, store))
    }
}
