//! Slash-delimited path lookup

use super::node::Node;
use crate::error::{FsError, FsResult};
use std::sync::Arc;

/// Paths with more segments than this resolve to `NotFound`.
pub const MAX_DEPTH: usize = 64;

/// Resolve `path` from `context`, or from the root when it is absolute.
///
/// Directories are reconciled before they are descended. Links in the
/// middle of a path are always followed; a final link is replaced by its
/// source only when `follow` is set.
pub fn resolve(context: &Arc<Node>, path: &str, follow: bool) -> FsResult<Arc<Node>> {
    let segments: Vec<&str> = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.len() > MAX_DEPTH {
        return Err(FsError::NotFound);
    }

    let mut current = if path.starts_with('/') {
        context.root().ok_or(FsError::NotFound)?
    } else {
        context.clone()
    };

    for segment in segments {
        let dir = current.target()?;
        if !dir.is_dir() {
            return Err(FsError::NotADirectory);
        }
        current = match segment {
            "." => dir,
            ".." => dir.parent().unwrap_or(dir),
            name => dir.child(name)?.ok_or(FsError::NotFound)?,
        };
    }

    if follow { current.target() } else { Ok(current) }
}
