//! User-declared diagram participants.
//!
//! The list is an explicit store handed to whoever needs it. Readers borrow a slice; writers go
//! through methods that enforce name/key uniqueness and notify subscribers.

use crate::color::{Color, ColorChannel};
use crate::error::EntityError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub type Result<T> = std::result::Result<T, EntityError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Stick figure: head circle plus body lines.
    #[serde(rename = "actor")]
    Actor,
    /// Boxed participant: a rectangle around the label.
    #[serde(rename = "participant", alias = "box")]
    Box,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(
        rename = "key",
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub lifeline_key: Option<String>,
    #[serde(rename = "type")]
    pub role: Role,
    #[serde(rename = "bg")]
    pub fill: Color,
    pub border: Color,
}

fn empty_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

impl Entity {
    pub fn new(
        display_name: impl Into<String>,
        lifeline_key: Option<&str>,
        role: Role,
        fill: Color,
        border: Color,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            lifeline_key: lifeline_key
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string),
            role,
            fill,
            border,
        }
    }

    /// The seed list an editor starts with.
    pub fn defaults() -> Vec<Entity> {
        vec![
            Entity::new(
                "Consumer (C)",
                Some("C"),
                Role::Actor,
                Color::from_trusted("#87CEEB"),
                Color::from_trusted("#4682B4"),
            ),
            Entity::new(
                "Intermediary (I)",
                Some("I"),
                Role::Box,
                Color::from_trusted("#FFB6C1"),
                Color::from_trusted("#DC143C"),
            ),
            Entity::new(
                "Broker (B)",
                Some("B"),
                Role::Box,
                Color::from_trusted("#FFFFE0"),
                Color::from_trusted("#FFD700"),
            ),
        ]
    }

    pub fn color(&self, channel: ColorChannel) -> &Color {
        match channel {
            ColorChannel::Fill => &self.fill,
            ColorChannel::Stroke => &self.border,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityChange {
    Added(usize),
    Updated(usize),
    Removed(usize),
    /// The whole list was swapped (reset, clear, snapshot restore).
    Replaced,
}

type Listener = Box<dyn FnMut(&EntityChange, &[Entity])>;

#[derive(Default)]
pub struct EntityStore {
    entities: Vec<Entity>,
    seed: Vec<Entity>,
    revision: u64,
    listeners: Vec<Listener>,
}

impl fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityStore")
            .field("entities", &self.entities)
            .field("revision", &self.revision)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl EntityStore {
    /// A store holding `entities`, which also become the list [`Self::reset_to_defaults`]
    /// restores.
    pub fn new(entities: Vec<Entity>) -> Result<Self> {
        validate_unique(&entities)?;
        Ok(Self {
            seed: entities.clone(),
            entities,
            revision: 0,
            listeners: Vec::new(),
        })
    }

    pub fn with_defaults() -> Self {
        Self {
            entities: Entity::defaults(),
            seed: Entity::defaults(),
            revision: 0,
            listeners: Vec::new(),
        }
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn get(&self, index: usize) -> Option<&Entity> {
        self.entities.get(index)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Bumped on every successful mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&EntityChange, &[Entity]) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn add(&mut self, mut entity: Entity) -> Result<usize> {
        entity.display_name = entity.display_name.trim().to_string();
        if entity.display_name.is_empty() {
            return Err(EntityError::EmptyName);
        }
        self.check_name(&entity.display_name, None)?;
        if let Some(key) = &entity.lifeline_key {
            self.check_key(key, None)?;
        }
        self.entities.push(entity);
        let index = self.entities.len() - 1;
        self.changed(EntityChange::Added(index));
        Ok(index)
    }

    pub fn rename(&mut self, index: usize, name: &str) -> Result<()> {
        self.ensure_index(index)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(EntityError::EmptyName);
        }
        if self.entities[index].display_name == name {
            return Ok(());
        }
        self.check_name(name, Some(index))?;
        self.entities[index].display_name = name.to_string();
        self.changed(EntityChange::Updated(index));
        Ok(())
    }

    /// Sets or clears (`None` / blank) the lifeline key.
    pub fn set_key(&mut self, index: usize, key: Option<&str>) -> Result<()> {
        self.ensure_index(index)?;
        let key = key.map(str::trim).filter(|k| !k.is_empty());
        if self.entities[index].lifeline_key.as_deref() == key {
            return Ok(());
        }
        if let Some(k) = key {
            self.check_key(k, Some(index))?;
        }
        self.entities[index].lifeline_key = key.map(str::to_string);
        self.changed(EntityChange::Updated(index));
        Ok(())
    }

    pub fn set_color(&mut self, index: usize, channel: ColorChannel, color: Color) -> Result<()> {
        self.ensure_index(index)?;
        let entity = &mut self.entities[index];
        match channel {
            ColorChannel::Fill => entity.fill = color,
            ColorChannel::Stroke => entity.border = color,
        }
        self.changed(EntityChange::Updated(index));
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<Entity> {
        self.ensure_index(index)?;
        let removed = self.entities.remove(index);
        self.changed(EntityChange::Removed(index));
        Ok(removed)
    }

    /// Swaps in a whole list, e.g. from a restored snapshot. Rejected lists leave the store as is.
    pub fn replace_all(&mut self, entities: Vec<Entity>) -> Result<()> {
        validate_unique(&entities)?;
        self.entities = entities;
        self.changed(EntityChange::Replaced);
        Ok(())
    }

    pub fn reset_to_defaults(&mut self) {
        self.entities = self.seed.clone();
        self.changed(EntityChange::Replaced);
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.changed(EntityChange::Replaced);
    }

    fn ensure_index(&self, index: usize) -> Result<()> {
        if index < self.entities.len() {
            Ok(())
        } else {
            Err(EntityError::UnknownIndex(index))
        }
    }

    fn check_name(&self, name: &str, skip: Option<usize>) -> Result<()> {
        let taken = self
            .entities
            .iter()
            .enumerate()
            .any(|(i, e)| Some(i) != skip && e.display_name == name);
        if taken {
            return Err(EntityError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    fn check_key(&self, key: &str, skip: Option<usize>) -> Result<()> {
        let taken = self
            .entities
            .iter()
            .enumerate()
            .any(|(i, e)| Some(i) != skip && e.lifeline_key.as_deref() == Some(key));
        if taken {
            return Err(EntityError::DuplicateKey(key.to_string()));
        }
        Ok(())
    }

    fn changed(&mut self, change: EntityChange) {
        self.revision += 1;
        tracing::debug!(?change, revision = self.revision, "entity list changed");
        for listener in &mut self.listeners {
            listener(&change, &self.entities);
        }
    }
}

fn validate_unique(entities: &[Entity]) -> Result<()> {
    for (i, e) in entities.iter().enumerate() {
        if e.display_name.trim().is_empty() {
            return Err(EntityError::EmptyName);
        }
        let rest = &entities[..i];
        if rest.iter().any(|o| o.display_name == e.display_name) {
            return Err(EntityError::DuplicateName(e.display_name.clone()));
        }
        if let Some(key) = &e.lifeline_key {
            if rest.iter().any(|o| o.lifeline_key.as_ref() == Some(key)) {
                return Err(EntityError::DuplicateKey(key.clone()));
            }
        }
    }
    Ok(())
}
