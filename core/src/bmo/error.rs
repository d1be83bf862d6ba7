//! Crate-wide error taxonomy for the BMO orchestration runtime.
//!
//! Mirrors the "kinds, not type names" error design: every fallible public
//! operation in `bmo::*` returns one of these variants rather than bubbling
//! raw `std::io::Error`/`serde_json::Error` up to callers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BmoError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("timed out: {0}")]
    Timeout(String),
}

impl BmoError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn permission(msg: impl Into<String>) -> Self {
        Self::Permission(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Whether a caller could plausibly succeed by retrying unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }

    /// A short, user-facing rendering — no internal detail leaked.
    pub fn user_message(&self) -> String {
        match self {
            Self::Configuration(_) => "a configuration file could not be read".to_string(),
            Self::NotFound(m) => format!("not found: {m}"),
            Self::Permission(m) => format!("not permitted: {m}"),
            Self::Transport(_) => "a network or process call failed".to_string(),
            Self::Parse(_) => "malformed data was ignored".to_string(),
            Self::Timeout(_) => "the operation timed out".to_string(),
        }
    }
}

impl From<std::io::Error> for BmoError {
    fn from(e: std::io::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for BmoError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

impl From<anyhow::Error> for BmoError {
    fn from(e: anyhow::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BmoError>;
