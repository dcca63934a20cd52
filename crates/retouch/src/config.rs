use crate::entities::Entity;
use crate::error::ConfigError;
use crate::matcher::ColorMatcher;
use crate::orchestrator::StageDelays;
use crate::svg::DeterministicTextMeasurer;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::Path;

/// Accepted auto-save quiet periods, in milliseconds.
pub const AUTOSAVE_DEBOUNCE_RANGE_MS: RangeInclusive<u64> = 500..=1000;

/// Tunables for a session. Every field has a default, so a config file only needs the values it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetouchConfig {
    pub delays: StageDelays,
    pub autosave_debounce_ms: u64,
    pub share_retention_days: u32,
    /// Largest Manhattan distance between a label and the rectangle painted for it.
    pub box_match_distance: f64,
    pub text_metrics: TextMetricsConfig,
    pub default_entities: Vec<Entity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextMetricsConfig {
    pub char_width_factor: f64,
    pub line_height_factor: f64,
}

impl Default for TextMetricsConfig {
    fn default() -> Self {
        Self {
            char_width_factor: 0.6,
            line_height_factor: 1.2,
        }
    }
}

impl Default for RetouchConfig {
    fn default() -> Self {
        Self {
            delays: StageDelays::default(),
            autosave_debounce_ms: 1000,
            share_retention_days: 30,
            box_match_distance: 100.0,
            text_metrics: TextMetricsConfig::default(),
            default_entities: Entity::defaults(),
        }
    }
}

impl RetouchConfig {
    pub fn from_json(path_label: &str, json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|source| ConfigError::Json {
            path: path_label.to_string(),
            source,
        })?;
        config.validate(path_label)?;
        Ok(config)
    }

    pub fn validate(&self, path_label: &str) -> Result<(), ConfigError> {
        if !AUTOSAVE_DEBOUNCE_RANGE_MS.contains(&self.autosave_debounce_ms) {
            return Err(ConfigError::OutOfRange {
                path: path_label.to_string(),
                field: "autosave_debounce_ms",
                min: *AUTOSAVE_DEBOUNCE_RANGE_MS.start(),
                max: *AUTOSAVE_DEBOUNCE_RANGE_MS.end(),
                value: self.autosave_debounce_ms,
            });
        }
        Ok(())
    }

    /// The auto-save quiet period, forced into the accepted range for configs built in code.
    pub fn autosave_debounce(&self) -> u64 {
        self.autosave_debounce_ms.clamp(
            *AUTOSAVE_DEBOUNCE_RANGE_MS.start(),
            *AUTOSAVE_DEBOUNCE_RANGE_MS.end(),
        )
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let label = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: label.clone(),
            source,
        })?;
        Self::from_json(&label, &raw)
    }

    pub fn measurer(&self) -> DeterministicTextMeasurer {
        DeterministicTextMeasurer {
            char_width_factor: self.text_metrics.char_width_factor,
            line_height_factor: self.text_metrics.line_height_factor,
        }
    }

    pub fn matcher(&self) -> ColorMatcher {
        ColorMatcher::new(self.measurer(), self.box_match_distance)
    }
}
