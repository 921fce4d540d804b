// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Catalog fetch failed: {0}")]
    Catalog(String),

    #[error("Trigger ledger error: {0}")]
    Ledger(String),

    /// A second timer was registered for a window that already has one.
    #[error("Timer already registered for window {0}")]
    TimerAlreadyRegistered(String),

    #[error("Timeout coordinator used outside of a Tokio runtime")]
    NoRuntime,

    #[error("Rule not found: {0}")]
    UnknownRule(String),

    #[error("No rule or route named '{0}'")]
    UnknownTarget(String),

    #[error("Rule registered twice: {0}")]
    DuplicateRule(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, EngineError>;
