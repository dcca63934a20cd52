#![forbid(unsafe_code)]

//! `retouch` post-processes engine-rendered Mermaid sequence diagrams and keeps user edits alive
//! across re-renders.
//!
//! The engine produces a fresh SVG tree for every render. `retouch` stamps that tree with stable
//! ordinal identifiers, paints participants with their configured colors, and replays recorded
//! position, color and loop-flip edits on top. Sessions can be shared through URL-safe inline
//! data or stored short links, and work in progress is auto-saved.
//!
//! The main entry points:
//! - [`Orchestrator`]: one render through the full post-processing pipeline
//! - [`Session`]: editor state wired together (source, entities, edits, persistence)
//! - [`share`]: snapshots, inline encoding, short links and auto-save

pub mod clock;
pub mod color;
pub mod config;
pub mod controller;
pub mod debounce;
pub mod entities;
pub mod error;
pub mod identity;
pub mod matcher;
pub mod orchestrator;
pub mod overlay;
pub mod session;
pub mod share;
pub mod svg;

pub use clock::{Clock, ManualClock, SystemClock};
pub use color::{Color, ColorChannel};
pub use config::RetouchConfig;
pub use controller::{Axis, Controller, ControllerState, EditEffect, EditSurface, Step};
pub use entities::{Entity, EntityStore, Role};
pub use error::{
    ColorError, ConfigError, EngineError, EntityError, Error, RenderError, ShareError,
    StorageError, SvgError,
};
pub use identity::{ElementId, ElementKind, IdentityResolver};
pub use matcher::{ColorMatcher, MatchReport, MatchTier};
pub use orchestrator::{
    DiagramEngine, NoPause, Orchestrator, Pause, PrerenderedEngine, RenderOutcome, Stage,
    StageDelays, ThreadPause,
};
pub use overlay::{ModificationStore, OverlayKind, OverlayRecord, OverlaySet};
pub use session::{Session, SourceEditor, Startup, Status, StatusLevel, TextBuffer};
pub use share::ShareSnapshot;
pub use svg::{NodeId, SvgDocument};

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests;
