//! Lexical path guard for every filesystem-touching tool.
//!
//! Paths supplied by the model are untrusted. They are normalized without
//! touching the filesystem and must stay inside the working directory.

use std::path::PathBuf;

use thiserror::Error;

/// Path rejected by [`clean_path`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path traversal found: absolute path '{0}' is not allowed")]
    Absolute(String),
    #[error("path traversal found: '{0}' escapes the working directory")]
    Escapes(String),
}

/// Normalize `path` into a root-relative path.
///
/// Empty input maps to `.`. Backslashes count as separators so Windows-style
/// traversal is rejected on every platform.
pub fn clean_path(path: &str) -> Result<PathBuf, PathError> {
    let unified = path.replace('\\', "/");
    if unified.starts_with('/') || has_drive_prefix(&unified) {
        return Err(PathError::Absolute(path.to_string()));
    }

    let mut parts: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(PathError::Escapes(path.to_string()));
                }
            }
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return Ok(PathBuf::from("."));
    }
    Ok(PathBuf::from(parts.join("/")))
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
