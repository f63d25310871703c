//! Structured error types for capscope
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Record-level damage inside a capture is not an error: the loader stops
//! early and reports it in [`LoadReport`](crate::document::LoadReport).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Capture is {len} bytes, shorter than the {expected}-byte header")]
    HeaderTooShort { len: usize, expected: usize },

    #[error("Loading was cancelled")]
    Cancelled,

    #[error("Background task failed: {0}")]
    Join(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum SymbolizeError {
    #[error("Symbolization was cancelled")]
    Cancelled,

    #[error("{symbolizer} symbolizer failed to prepare: {reason}")]
    PrepareFailed { symbolizer: &'static str, reason: String },

    #[error("Capture does not contain {0}")]
    MissingInput(String),

    #[error("Background task failed: {0}")]
    Join(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SymbolizeError {
    /// Whether the caller asked for this failure.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[derive(Error, Debug)]
pub enum CallgraphError {
    #[error("Callgraph construction was cancelled")]
    Cancelled,

    #[error("Background task failed: {0}")]
    Join(String),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<tokio::task::JoinError> for CaptureError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Join(err.to_string())
    }
}

impl From<tokio::task::JoinError> for SymbolizeError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Join(err.to_string())
    }
}

impl From<tokio::task::JoinError> for CallgraphError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Join(err.to_string())
    }
}
