//! Error types for the object model.
//!
//! `GitError` covers decoding of stored objects (trees, blobs, hashes) and
//! path resolution over trees. Transport failures live in
//! [`crate::protocol::types::TransportError`] so callers of either layer
//! branch on a small closed set.
//!
//! Notes:
//! - `FileNotFound` collapses "no such entry", "wrong object
//!   kind" and "missing submodule object" into one kind.
//! - Truncated or malformed tree records surface as `InvalidTreeItem`.

use thiserror::Error;

#[derive(Error, Debug)]
/// Unified error enumeration for the object model.
pub enum GitError {
    /// Object is not of the kind the operation expects.
    #[error("The `{0}` is not a valid git object type.")]
    InvalidObjectType(String),

    /// Invalid tree entry (mode/name/hash) or a record cut short.
    #[error("The `{0}` is not a valid git tree item.")]
    InvalidTreeItem(String),

    /// Invalid SHA1 hash formatting or value.
    #[error("The {0} is not a valid Hash value ")]
    InvalidHashValue(String),

    /// Path does not resolve to a blob reachable from the tree.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// Object missing from the store.
    #[error("Can't find specific object: {0}")]
    ObjectNotFound(String),

    /// I/O error from underlying reader.
    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),
}
