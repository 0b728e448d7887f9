use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeskPilotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Image load error: {0}")]
    ImageLoad(String),

    #[error("Screen capture error: {0}")]
    Capture(String),

    #[error("Text recognition error: {0}")]
    Recognition(String),

    #[error("Advisor error: {0}")]
    Advisor(String),

    #[error("SSE parsing error: {0}")]
    SseParsing(String),

    #[error("Device error: {0}")]
    Device(String),

    #[error("Signal source error: {0}")]
    Signal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl serde::Serialize for DeskPilotError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type DeskPilotResult<T> = Result<T, DeskPilotError>;
