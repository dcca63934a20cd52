use crate::error::ColorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A CSS color value as the user typed it. Validated on construction; the original spelling is
/// what gets written into the SVG so `#87CEEB` stays `#87CEEB`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(String);

impl Color {
    pub fn parse(value: &str) -> Result<Self, ColorError> {
        let trimmed = value.trim();
        svgtypes::Color::from_str(trimmed).map_err(|_| ColorError {
            value: value.to_string(),
        })?;
        Ok(Self(trimmed.to_string()))
    }

    /// For literals known to be valid CSS colors.
    pub(crate) fn from_trusted(value: &str) -> Self {
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `#rrggbb` form, the shape a color picker input accepts.
    pub fn to_hex(&self) -> String {
        match svgtypes::Color::from_str(&self.0) {
            Ok(c) => format!("#{:02x}{:02x}{:02x}", c.red, c.green, c.blue),
            Err(_) => self.0.clone(),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Color {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Color {
    type Error = ColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Color> for String {
    fn from(value: Color) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorChannel {
    Fill,
    Stroke,
}

impl ColorChannel {
    pub fn property(self) -> &'static str {
        match self {
            Self::Fill => "fill",
            Self::Stroke => "stroke",
        }
    }
}
