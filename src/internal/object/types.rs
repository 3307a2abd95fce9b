//! Object type enumeration used across the object model.

use std::fmt::{self, Display};

/// In Git, each object type is assigned a unique integer value, which is used to identify the
/// type of the object in Git repositories.
///
/// * `Commit` (1): a snapshot of the project plus history metadata.
/// * `Tree` (2): a directory listing mapping names to blobs and subtrees.
/// * `Blob` (3): the content of a file.
/// * `Tag` (4): an annotated marker pointing at another object.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub enum ObjectType {
    Commit = 1,
    Tree,
    Blob,
    Tag,
}

const COMMIT_OBJECT_TYPE: &[u8] = b"commit";
const TREE_OBJECT_TYPE: &[u8] = b"tree";
const BLOB_OBJECT_TYPE: &[u8] = b"blob";
const TAG_OBJECT_TYPE: &[u8] = b"tag";

impl Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ObjectType::Blob => write!(f, "blob"),
            ObjectType::Tree => write!(f, "tree"),
            ObjectType::Commit => write!(f, "commit"),
            ObjectType::Tag => write!(f, "tag"),
        }
    }
}

impl ObjectType {
    pub fn to_bytes(&self) -> &'static [u8] {
        match self {
            ObjectType::Commit => COMMIT_OBJECT_TYPE,
            ObjectType::Tree => TREE_OBJECT_TYPE,
            ObjectType::Blob => BLOB_OBJECT_TYPE,
            ObjectType::Tag => TAG_OBJECT_TYPE,
        }
    }

}
