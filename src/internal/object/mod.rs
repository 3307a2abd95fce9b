//! Object model definitions for Git blobs and trees, plus the store contract
//! they are resolved through.
//!
//! The store owns object bytes; everything here references them through
//! [`RawObject`], whose payload is a cheaply clonable [`Bytes`] so every call
//! to [`RawObject::reader`] hands out a fresh stream without copying.
//!
//! | Type | Role |
//! |------|------|
//! | [`RawObject`] | typed, sized byte stream as returned by a store |
//! | [`store::ObjectStore`] | `get(hash) -> Option<RawObject>` |
//! | [`tree::Tree`] | decoded directory snapshot, resolves paths and walks files |
//! | [`blob::Blob`] / [`blob::File`] | file payload and its path projection |
pub mod blob;
pub mod store;
pub mod tree;
pub mod types;

use std::io::Cursor;

use bytes::Bytes;

use crate::{hash::ObjectHash, internal::object::types::ObjectType};

/// An object as held by a store: its kind, id and raw (inflated) content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawObject {
    object_type: ObjectType,
    hash: ObjectHash,
    data: Bytes,
}

impl RawObject {
    /// Wrap content whose id is already known.
    pub fn new(object_type: ObjectType, hash: ObjectHash, data: impl Into<Bytes>) -> Self {
        Self {
            object_type,
            hash,
            data: data.into(),
        }
    }

    /// Wrap content and compute its git object id.
    pub fn from_content(object_type: ObjectType, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let hash = ObjectHash::from_type_and_data(object_type, &data);
        Self::new(object_type, hash, data)
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn hash(&self) -> ObjectHash {
        self.hash
    }

    /// A fresh reader positioned at the start of the content.
    pub fn reader(&self) -> Cursor<Bytes> {
        Cursor::new(self.data.clone())
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    #[test]
    fn test_reader_is_fresh_each_call() {
        let object = RawObject::from_content(ObjectType::Blob, "hello");
        let mut first = String::new();
        object.reader().read_to_string(&mut first).unwrap();
        let mut second = String::new();
        object.reader().read_to_string(&mut second).unwrap();

        assert_eq!(first, "hello");
        assert_eq!(second, "hello");
        assert_eq!(object.size(), 5);
        assert_eq!(
            object.hash().to_string(),
            "b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0"
        );
    }
}
