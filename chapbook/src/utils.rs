//! Utility functions

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::ChapError;

/// Version information of the binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Calculate SHA256 hash of data
pub fn sha256_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Check a workflow name before it is joined into a path.
///
/// Names are single path components made of ASCII letters, digits, `_`,
/// `-` and `.`, and may not start with a dot.
pub fn validate_name(kind: &str, name: &str) -> Result<(), ChapError> {
    if name.is_empty() {
        return Err(ChapError::ValidationError(format!("empty {} name", kind)));
    }
    if name.starts_with('.') {
        return Err(ChapError::ValidationError(format!(
            "invalid {} name {:?}: leading dot",
            kind, name
        )));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(ChapError::ValidationError(format!(
            "invalid {} name {:?}: character {:?} not allowed",
            kind, name, c
        )));
    }
    Ok(())
}

/// Check that a module or class name is a Python identifier, since it ends
/// up in a dotted import path.
pub fn validate_identifier(kind: &str, name: &str) -> Result<(), ChapError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if !valid {
        return Err(ChapError::ValidationError(format!(
            "invalid {} {:?}: not a Python identifier",
            kind, name
        )));
    }
    Ok(())
}
