use thiserror::Error;

/// Engine-wide error taxonomy.
///
/// Only `Config` escapes the process at startup; everything else is
/// absorbed at the tick loop boundary so a transient failure never stops
/// trading.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Order rejected: {0}")]
    Rejected(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Unknown asset: {0}")]
    AssetNotFound(String),
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        EngineError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Parse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
