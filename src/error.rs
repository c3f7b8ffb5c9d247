//! Crate-wide error types.

use thiserror::Error;

pub type FlameResult<T> = Result<T, FlameError>;

#[derive(Debug, Error)]
pub enum FlameError {
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    #[error("command failed: {0}")]
    Command(String),

    #[error("probe failed on run {run}: {message}")]
    Probe { run: usize, message: String },

    #[error("cannot select a representative run from an empty batch")]
    EmptyInput,

    #[error("store error: {0}")]
    Store(String),
}
