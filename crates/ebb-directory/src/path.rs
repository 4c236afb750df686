//! Directory path validation and node naming.
//!
//! Every identifier owns one node, `/<id>`, in the coordination service. An
//! optional relative path addresses nodes below it: `/<id>/<path>`. Valid
//! relative paths:
//! - may be empty (the identifier's own node)
//! - consist of `/`-separated, non-empty segments
//! - must not start or end with `/`
//! - must not contain `.` or `..` segments
//! - must not contain whitespace or control characters

use ebb_types::EbbId;

use crate::error::{DirectoryError, Result};

fn invalid(path: &str, reason: impl Into<String>) -> DirectoryError {
    DirectoryError::InvalidPath {
        path: path.to_string(),
        reason: reason.into(),
    }
}

/// Validate a path relative to an identifier's node.
pub fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Ok(());
    }
    if path.starts_with('/') || path.ends_with('/') {
        return Err(invalid(path, "must not start or end with '/'"));
    }
    if let Some(ch) = path.chars().find(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid(path, format!("contains forbidden character: {ch:?}")));
    }
    for segment in path.split('/') {
        match segment {
            "" => return Err(invalid(path, "contains an empty segment")),
            "." | ".." => return Err(invalid(path, "contains a relative segment")),
            _ => {}
        }
    }
    Ok(())
}

/// Node of the identifier itself.
pub fn id_node(id: EbbId) -> String {
    format!("/{}", id.raw())
}

/// Node addressed by `(id, path)`; the path must already be valid.
pub fn node_path(id_node: &str, path: &str) -> String {
    if path.is_empty() {
        id_node.to_string()
    } else {
        format!("{id_node}/{path}")
    }
}

/// Path of `node` relative to `id_node`, if it lies at or below it.
pub fn relative_to<'a>(id_node: &str, node: &'a str) -> Option<&'a str> {
    let rest = node.strip_prefix(id_node)?;
    if rest.is_empty() {
        Some("")
    } else {
        rest.strip_prefix('/')
    }
}
