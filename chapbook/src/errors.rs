//! Error types for chapbook

use std::time::Duration;

use thiserror::Error;

/// Main error type for chapbook
#[derive(Error, Debug)]
pub enum ChapError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Template error: {0}")]
    TemplateError(#[from] tera::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Generation error: {0}")]
    GenerationError(String),

    #[error("Execution error: {reason}")]
    ExecutionError {
        reason: String,
        stdout: String,
        stderr: String,
    },

    #[error("Timed out after {after:?}")]
    Timeout {
        after: Duration,
        stdout: String,
        stderr: String,
    },

    #[error("Packaging error: {0}")]
    PackagingError(String),

    #[error("Notebook error: {0}")]
    NotebookError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChapError {
    /// Output captured from an external process before it failed, if any
    pub fn captured_output(&self) -> Option<(&str, &str)> {
        match self {
            ChapError::ExecutionError { stdout, stderr, .. }
            | ChapError::Timeout { stdout, stderr, .. } => Some((stdout, stderr)),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for ChapError {
    fn from(err: anyhow::Error) -> Self {
        ChapError::Internal(err.to_string())
    }
}

impl From<walkdir::Error> for ChapError {
    fn from(err: walkdir::Error) -> Self {
        ChapError::PackagingError(err.to_string())
    }
}
