use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("Strategy not found: {name} (available: {})", available.join(", "))]
    StrategyNotFound { name: String, available: Vec<String> },
    #[error("Strategy already registered: {0}")]
    StrategyAlreadyRegistered(String),
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),
    #[error("Template {token} expects {expected} parameters, got {got}")]
    DecodeMismatch { token: String, expected: usize, got: usize },
    #[error("layer {index} ({strategy}) failed: {source}")]
    Layer {
        index: usize,
        strategy: String,
        #[source]
        source: Box<CompressionError>,
    },
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CompressionError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedEnvelope(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, CompressionError>;
