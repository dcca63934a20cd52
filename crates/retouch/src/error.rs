pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Svg(#[from] SvgError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Entity(#[from] EntityError),

    #[error(transparent)]
    Color(#[from] ColorError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Share(#[from] ShareError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, thiserror::Error)]
pub enum SvgError {
    #[error("failed to parse SVG markup: {0}")]
    Parse(#[from] roxmltree::Error),

    #[error("markup does not contain an <svg> element")]
    MissingRoot,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PathError {
    #[error("path data must start with a moveto command")]
    MissingMoveTo,

    #[error("path command `{command}` is missing arguments")]
    TruncatedArguments { command: char },

    #[error("path data is empty")]
    Empty,
}

/// A rejection from the diagram engine. The message is kept verbatim so it can be shown to the
/// user exactly as the engine reported it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct EngineError {
    pub message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Please enter some Mermaid code")]
    EmptySource,

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("engine returned unusable SVG: {0}")]
    Svg(#[from] SvgError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntityError {
    #[error("Please enter a participant display name")]
    EmptyName,

    #[error("Participant with the name `{0}` already exists")]
    DuplicateName(String),

    #[error("Participant with the lifeline key `{0}` already exists")]
    DuplicateKey(String),

    #[error("no participant at index {0}")]
    UnknownIndex(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("`{value}` is not a valid CSS color")]
pub struct ColorError {
    pub value: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O failed for `{key}`: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("stored record `{key}` is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize record `{key}`: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("storage quota exceeded while writing `{key}`")]
    QuotaExceeded { key: String },

    #[error("`{0}` is not a valid storage key")]
    InvalidKey(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    #[error("share data is not valid URL-safe base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("share data is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("share data is not a valid snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported snapshot version `{0}`")]
    UnsupportedVersion(String),

    #[error("No code in share data")]
    MissingCode,

    #[error("`{0}` is not a valid short link id")]
    InvalidShortId(String),

    #[error("Shared link not found or expired")]
    NotFound,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config `{path}`: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config `{path}`: `{field}` must be between {min} and {max}, got {value}")]
    OutOfRange {
        path: String,
        field: &'static str,
        min: u64,
        max: u64,
        value: u64,
    },
}
