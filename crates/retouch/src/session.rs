//! Editor session.
//!
//! Owns every piece of editor state and wires the components together explicitly: the source
//! buffer, the entity list, the recorded edits, the interactive controller, the render pipeline,
//! persistence and the status line. Failures of any single feature end up as an error status;
//! the session itself stays usable.

use crate::clock::Clock;
use crate::color::{Color, ColorChannel};
use crate::config::RetouchConfig;
use crate::controller::{Axis, Controller, ControllerState, EditEffect, EditSurface, Step};
use crate::debounce::Debouncer;
use crate::entities::{Entity, EntityStore};
use crate::error::{EntityError, RenderError, ShareError, StorageError};
use crate::identity::IdentityResolver;
use crate::orchestrator::{DiagramEngine, Orchestrator, Pause, RenderOutcome};
use crate::overlay::ModificationStore;
use crate::share::{
    AutoSave, KeyValueStore, ShareRequest, ShareSnapshot, ShortId, ShortLinks, decode_inline,
    encode_inline, parse_share_url, share_url,
};
use crate::svg::{NodeId, SvgDocument};
use rand::Rng;
use serde::Serialize;
use url::Url;

/// The text-editing surface the source comes from.
pub trait SourceEditor {
    fn content(&self) -> String;
    fn set_content(&mut self, text: &str);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBuffer {
    text: String,
}

impl TextBuffer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl SourceEditor for TextBuffer {
    fn content(&self) -> String {
        self.text.clone()
    }

    fn set_content(&mut self, text: &str) {
        self.text = text.to_string();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    #[default]
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Status {
    pub message: String,
    pub level: StatusLevel,
}

impl Status {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: StatusLevel::Info,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: StatusLevel::Success,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: StatusLevel::Error,
        }
    }
}

/// How startup populated the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Startup {
    /// Loaded from a stored short link.
    SharedLink(ShortId),
    /// Loaded from inline `data`.
    InlineData,
    /// No share parameter; the auto-saved work came back.
    RestoredWork,
    /// Nothing to load.
    Fresh,
    /// A share parameter was present but could not be loaded.
    Failed,
}

pub struct Session<E, P> {
    config: RetouchConfig,
    editor: Box<dyn SourceEditor>,
    storage: Box<dyn KeyValueStore>,
    clock: Box<dyn Clock>,
    orchestrator: Orchestrator<E, P>,
    entities: EntityStore,
    modifications: ModificationStore,
    controller: Controller,
    autosave: AutoSave,
    debouncer: Debouncer,
    links: ShortLinks,
    document: Option<SvgDocument>,
    last_render: Option<RenderOutcome>,
    status: Status,
}

impl<E: DiagramEngine, P: Pause> Session<E, P> {
    pub fn new(
        config: RetouchConfig,
        engine: E,
        pause: P,
        storage: Box<dyn KeyValueStore>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let entities = match EntityStore::new(config.default_entities.clone()) {
            Ok(store) => store,
            Err(err) => {
                tracing::warn!(error = %err, "configured default entities rejected; using built-in list");
                EntityStore::with_defaults()
            }
        };
        let orchestrator = Orchestrator::new(engine, pause)
            .with_matcher(config.matcher())
            .with_delays(config.delays);
        Self {
            editor: Box::new(TextBuffer::default()),
            storage,
            clock,
            orchestrator,
            entities,
            modifications: ModificationStore::new(),
            controller: Controller::new(IdentityResolver::new()),
            autosave: AutoSave,
            debouncer: Debouncer::new(config.autosave_debounce()),
            links: ShortLinks::new(config.share_retention_days),
            document: None,
            last_render: None,
            status: Status::default(),
            config,
        }
    }

    pub fn with_editor(mut self, editor: Box<dyn SourceEditor>) -> Self {
        self.editor = editor;
        self
    }

    pub fn config(&self) -> &RetouchConfig {
        &self.config
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    fn set_status(&mut self, status: Status) {
        match status.level {
            StatusLevel::Error => tracing::warn!(status = %status.message, "status changed"),
            _ => tracing::info!(status = %status.message, "status changed"),
        }
        self.status = status;
    }

    pub fn source(&self) -> String {
        self.editor.content()
    }

    /// Replaces the source text. Counts as an edit for auto-save.
    pub fn set_source(&mut self, text: &str) {
        self.editor.set_content(text);
        self.debouncer.schedule(self.clock.now());
    }

    pub fn entities(&self) -> &EntityStore {
        &self.entities
    }

    pub fn modifications(&self) -> &ModificationStore {
        &self.modifications
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn document(&self) -> Option<&SvgDocument> {
        self.document.as_ref()
    }

    pub fn last_render(&self) -> Option<&RenderOutcome> {
        self.last_render.as_ref()
    }

    pub fn svg(&self) -> Option<String> {
        self.document.as_ref().map(SvgDocument::to_svg_string)
    }

    // --- rendering -------------------------------------------------------------------------

    /// Runs the full pipeline on the current source. On failure the previous tree is dropped
    /// and the error becomes the status; recorded edits are never touched.
    pub async fn render(&mut self) -> Result<(), RenderError> {
        let source = self.editor.content();
        self.set_status(Status::info("Rendering..."));
        let result = self
            .orchestrator
            .run(&source, self.entities.entities(), &self.modifications)
            .await;
        match result {
            Ok(outcome) => {
                let mut document = outcome.document.clone();
                if self.controller.is_on() {
                    self.controller.attach(&mut document);
                }
                self.document = Some(document);
                self.last_render = Some(outcome);
                self.set_status(Status::success("Rendered successfully!"));
                Ok(())
            }
            Err(err) => {
                self.document = None;
                self.last_render = None;
                self.controller.close();
                let message = match &err {
                    RenderError::EmptySource => err.to_string(),
                    RenderError::Engine(e) => e.message.clone(),
                    RenderError::Svg(e) => format!("Render failed - {e}"),
                };
                self.set_status(Status::error(message));
                Err(err)
            }
        }
    }

    /// Repaints the current tree with the entity colors without re-rendering.
    pub fn apply_entity_colors(&mut self) -> bool {
        let Some(doc) = self.document.as_mut() else {
            self.set_status(Status::error("Please render a diagram first"));
            return false;
        };
        self.orchestrator
            .matcher()
            .paint(doc, self.entities.entities());
        self.set_status(Status::success("All colors applied!"));
        true
    }

    // --- interactive editing ---------------------------------------------------------------

    pub fn toggle_interactive(&mut self) -> ControllerState {
        let Some(doc) = self.document.as_mut() else {
            self.set_status(Status::error("Please render a diagram first"));
            return self.controller.state();
        };
        let state = self.controller.toggle(doc);
        match state {
            ControllerState::On => self.set_status(Status::success(
                "Interactive mode ON - Click elements to adjust positions",
            )),
            ControllerState::Off => self.set_status(Status::info("Interactive mode OFF")),
        }
        state
    }

    pub fn pointer_enter(&mut self, node: NodeId) {
        if let Some(doc) = self.document.as_mut() {
            self.controller.pointer_enter(doc, node);
        }
    }

    pub fn pointer_leave(&mut self, node: NodeId) {
        if let Some(doc) = self.document.as_mut() {
            self.controller.pointer_leave(doc, node);
        }
    }

    pub fn click(&mut self, node: NodeId) -> Option<&EditSurface> {
        let doc = self.document.as_ref()?;
        self.controller.click(doc, node)
    }

    pub fn close_surface(&mut self) {
        self.controller.close();
    }

    pub fn set_input(&mut self, axis: Axis, value: f64) {
        self.controller.set_input(axis, value);
    }

    fn edited(&mut self, effect: EditEffect) -> EditEffect {
        if effect.changed() {
            self.debouncer.schedule(self.clock.now());
        }
        effect
    }

    pub fn nudge(&mut self, axis: Axis, step: Step) -> EditEffect {
        let now = self.clock.now();
        let Some(doc) = self.document.as_mut() else {
            return EditEffect::Ignored;
        };
        let effect = self
            .controller
            .nudge(doc, &mut self.modifications, axis, step, now);
        self.edited(effect)
    }

    pub fn apply_position(&mut self) -> EditEffect {
        let now = self.clock.now();
        let Some(doc) = self.document.as_mut() else {
            return EditEffect::Ignored;
        };
        let effect = self
            .controller
            .apply_position(doc, &mut self.modifications, now);
        self.edited(effect)
    }

    pub fn reset_position(&mut self) -> EditEffect {
        let now = self.clock.now();
        let Some(doc) = self.document.as_mut() else {
            return EditEffect::Ignored;
        };
        let effect = self
            .controller
            .reset_position(doc, &mut self.modifications, now);
        self.edited(effect)
    }

    pub fn set_element_color(&mut self, channel: ColorChannel, color: Color) -> EditEffect {
        let now = self.clock.now();
        let Some(doc) = self.document.as_mut() else {
            return EditEffect::Ignored;
        };
        let effect = self
            .controller
            .set_color(doc, &mut self.modifications, channel, color, now);
        self.edited(effect)
    }

    pub fn flip_loop(&mut self) -> EditEffect {
        let Some(doc) = self.document.as_mut() else {
            return EditEffect::Ignored;
        };
        let effect = self.controller.flip_loop(doc, &mut self.modifications);
        self.edited(effect)
    }

    /// Clears every recorded edit, leaves interactive mode, drops the auto-saved work and
    /// renders from scratch.
    pub async fn reset_formatting(&mut self) -> Result<(), RenderError> {
        self.set_status(Status::info("Clearing all formatting..."));
        self.modifications.clear_all();
        if self.controller.is_on() {
            match self.document.as_mut() {
                Some(doc) => self.controller.disable(doc),
                None => self.controller.close(),
            }
        }
        self.debouncer.cancel();
        if let Err(err) = self.autosave.clear(self.storage.as_mut()) {
            tracing::warn!(error = %err, "could not clear saved work");
        }
        self.render().await?;
        self.set_status(Status::success(
            "All formatting cleared - diagram reset to original!",
        ));
        Ok(())
    }

    // --- persistence -----------------------------------------------------------------------

    /// Runs a due auto-save. Call periodically; returns whether a save ran.
    pub fn tick(&mut self) -> bool {
        if !self.debouncer.fire_if_due(self.clock.now()) {
            return false;
        }
        self.autosave_now().unwrap_or(false)
    }

    pub fn autosave_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Saves the work in progress immediately. Storage failures become an error status.
    pub fn autosave_now(&mut self) -> Result<bool, StorageError> {
        self.debouncer.cancel();
        let code = self.editor.content();
        let result = self.autosave.save(
            self.storage.as_mut(),
            &code,
            self.entities.entities(),
            &self.modifications.export(),
            self.clock.now(),
        );
        if let Err(err) = &result {
            tracing::warn!(error = %err, "auto-save failed");
            self.set_status(Status::error("Auto-save failed"));
        }
        result
    }

    fn snapshot(&self) -> Result<ShareSnapshot, ShareError> {
        let snapshot = ShareSnapshot::new(self.editor.content(), self.entities.entities().to_vec())
            .with_modifications(self.modifications.export());
        if snapshot.code.trim().is_empty() {
            return Err(ShareError::MissingCode);
        }
        Ok(snapshot)
    }

    /// Share URL carrying the whole snapshot inline.
    pub fn share_inline(&mut self, base: &Url) -> Result<Url, ShareError> {
        let result = self
            .snapshot()
            .and_then(|s| encode_inline(&s))
            .map(|data| share_url(base, &ShareRequest::Inline(data)));
        self.share_status(&result);
        result
    }

    /// Stores the snapshot under a fresh short id and returns the `?id=` URL.
    pub fn share_short_link<R: Rng + ?Sized>(
        &mut self,
        base: &Url,
        rng: &mut R,
    ) -> Result<Url, ShareError> {
        let now = self.clock.now();
        let result = self.snapshot().and_then(|s| {
            let id = self.links.create(self.storage.as_mut(), &s, now, rng)?;
            Ok(share_url(base, &ShareRequest::ShortId(id.as_str().to_string())))
        });
        self.share_status(&result);
        result
    }

    fn share_status(&mut self, result: &Result<Url, ShareError>) {
        let status = match result {
            Ok(_) => Status::success("Shareable link created!"),
            Err(ShareError::MissingCode) => Status::error("No code to share"),
            Err(err) => {
                tracing::warn!(error = %err, "share failed");
                Status::error("Failed to generate shareable link")
            }
        };
        self.set_status(status);
    }

    fn load_snapshot(&mut self, snapshot: ShareSnapshot) {
        self.editor.set_content(&snapshot.code);
        if !snapshot.participants.is_empty() {
            if let Err(err) = self.entities.replace_all(snapshot.participants) {
                tracing::warn!(error = %err, "shared participants rejected; keeping current list");
            }
        }
        if let Some(set) = &snapshot.modifications {
            self.modifications.merge(set);
        }
    }

    /// Startup sequence: purge expired short links, then load the share named by `url`
    /// (`id` before `data`), falling back to the auto-saved work when there is none.
    pub fn startup(&mut self, url: Option<&Url>) -> Startup {
        let now = self.clock.now();
        if let Err(err) = self.links.purge_expired(self.storage.as_mut(), now) {
            tracing::warn!(error = %err, "short link cleanup failed");
        }

        match url.and_then(parse_share_url) {
            Some(ShareRequest::ShortId(raw)) => {
                let loaded = ShortId::parse(&raw)
                    .and_then(|id| Ok((self.links.load(self.storage.as_mut(), &id)?, id)));
                match loaded {
                    Ok((snapshot, id)) => {
                        self.load_snapshot(snapshot);
                        self.set_status(Status::success("Shared diagram loaded successfully!"));
                        Startup::SharedLink(id)
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "short link load failed");
                        self.set_status(Status::error("Shared link not found or expired"));
                        Startup::Failed
                    }
                }
            }
            Some(ShareRequest::Inline(data)) => match decode_inline(&data) {
                Ok(snapshot) => {
                    self.load_snapshot(snapshot);
                    self.set_status(Status::success("Shared diagram loaded successfully!"));
                    Startup::InlineData
                }
                Err(err) => {
                    tracing::warn!(error = %err, "inline share data rejected");
                    self.set_status(Status::error("Could not load shared diagram"));
                    Startup::Failed
                }
            },
            None => self.restore_work(),
        }
    }

    fn restore_work(&mut self) -> Startup {
        match self.autosave.restore(self.storage.as_ref()) {
            Ok(Some(record)) => {
                self.editor.set_content(&record.code);
                if let Err(err) = self.entities.replace_all(record.participants) {
                    tracing::warn!(error = %err, "saved participants rejected; keeping current list");
                }
                if let Some(set) = &record.modifications {
                    self.modifications.merge(set);
                }
                self.set_status(Status::success("Previous work restored"));
                Startup::RestoredWork
            }
            Ok(None) => Startup::Fresh,
            Err(err) => {
                tracing::warn!(error = %err, "work restoration failed");
                Startup::Fresh
            }
        }
    }

    // --- entity list -----------------------------------------------------------------------

    fn entity_result<T>(&mut self, result: Result<T, EntityError>, ok: String) -> Result<T, EntityError> {
        match &result {
            Ok(_) => {
                self.set_status(Status::success(ok));
                self.debouncer.schedule(self.clock.now());
            }
            Err(err) => self.set_status(Status::error(err.to_string())),
        }
        result
    }

    pub fn add_entity(&mut self, entity: Entity) -> Result<usize, EntityError> {
        let result = self.entities.add(entity);
        self.entity_result(result, "Participant added successfully!".to_string())
    }

    pub fn rename_entity(&mut self, index: usize, name: &str) -> Result<(), EntityError> {
        let result = self.entities.rename(index, name);
        self.entity_result(result, "Participant updated".to_string())
    }

    pub fn set_entity_key(&mut self, index: usize, key: Option<&str>) -> Result<(), EntityError> {
        let result = self.entities.set_key(index, key);
        self.entity_result(result, "Participant updated".to_string())
    }

    pub fn set_entity_color(
        &mut self,
        index: usize,
        channel: ColorChannel,
        color: Color,
    ) -> Result<(), EntityError> {
        let result = self.entities.set_color(index, channel, color);
        let label = match channel {
            ColorChannel::Fill => "bg",
            ColorChannel::Stroke => "border",
        };
        let name = self
            .entities
            .get(index)
            .map(|e| e.display_name.clone())
            .unwrap_or_default();
        self.entity_result(result, format!("{name} {label} color updated"))
    }

    pub fn remove_entity(&mut self, index: usize) -> Result<Entity, EntityError> {
        let result = self.entities.remove(index);
        self.entity_result(result, "Participant deleted".to_string())
    }

    pub fn reset_entities(&mut self) {
        self.entities.reset_to_defaults();
        self.debouncer.schedule(self.clock.now());
        match self.document.as_mut() {
            Some(doc) => {
                self.orchestrator
                    .matcher()
                    .paint(doc, self.entities.entities());
                self.set_status(Status::success("Reset to default participants and colors!"));
            }
            None => self.set_status(Status::success("Reset to default participants")),
        }
    }

    pub fn clear_entities(&mut self) {
        self.entities.clear();
        self.debouncer.schedule(self.clock.now());
        self.set_status(Status::success("All participants cleared"));
    }
}
