//! In Git, a blob (binary large object) stores the content of a file without any
//! metadata: no name, no mode, no timestamps. Names come from the tree entry
//! that points at the blob, which is why [`File`] pairs the two.

use std::{
    fmt::Display,
    io::{self, Cursor, Read},
};

use bstr::BString;
use bytes::Bytes;

use crate::{
    errors::GitError,
    hash::ObjectHash,
    internal::object::{RawObject, types::ObjectType},
};

/// File content addressed by its hash.
#[derive(Eq, Debug, Clone)]
pub struct Blob {
    pub id: ObjectHash,
    pub data: Bytes,
}

impl PartialEq for Blob {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Display for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "Type: Blob")?;
        writeln!(f, "Size: {}", self.data.len())
    }
}

impl Blob {
    /// Create a blob from content, computing its id.
    pub fn from_content(content: impl Into<Bytes>) -> Self {
        let data = content.into();
        Blob {
            id: ObjectHash::from_type_and_data(ObjectType::Blob, &data),
            data,
        }
    }

    /// View a stored object as a blob.
    pub fn from_object(object: &RawObject) -> Result<Self, GitError> {
        if object.object_type() != ObjectType::Blob {
            return Err(GitError::InvalidObjectType(object.object_type().to_string()));
        }
        Ok(Blob {
            id: object.hash(),
            data: object.data().clone(),
        })
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn reader(&self) -> Cursor<Bytes> {
        Cursor::new(self.data.clone())
    }
}

/// A blob seen through a path relative to some tree.
///
/// Produced by [`Tree::file`](super::tree::Tree::file) and
/// [`Tree::files`](super::tree::Tree::files); it is not itself addressable.
#[derive(Debug)]
pub struct File {
    /// Full path relative to the tree the lookup or walk started from.
    pub name: BString,
    pub id: ObjectHash,
    pub size: usize,
    reader: Cursor<Bytes>,
}

impl File {
    pub fn new(name: impl Into<BString>, blob: &Blob) -> Self {
        File {
            name: name.into(),
            id: blob.id,
            size: blob.size(),
            reader: blob.reader(),
        }
    }

    /// Remaining content as a byte buffer, without copying.
    pub fn contents(&self) -> Bytes {
        let position = (self.reader.position() as usize).min(self.size);
        self.reader.get_ref().slice(position..)
    }
}

impl Read for File {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_from_content() {
        let blob = Blob::from_content("Hello, world!");
        assert_eq!(
            blob.id.to_string(),
            "5dd01c177f5d7d1be5346a5bc18a569a7410c2ef"
        );
        assert_eq!(blob.size(), 13);
    }

    #[test]
    fn test_blob_from_non_blob_object() {
        let object = RawObject::from_content(ObjectType::Tree, Bytes::new());
        assert!(matches!(
            Blob::from_object(&object),
            Err(GitError::InvalidObjectType(_))
        ));
    }

    #[test]
    fn test_file_read() {
        let blob = Blob::from_content("abcdef");
        let mut file = File::new("dir/a.txt", &blob);
        let mut head = [0u8; 2];
        file.read_exact(&mut head).unwrap();
        assert_eq!(&head, b"ab");
        assert_eq!(file.contents(), Bytes::from_static(b"cdef"));

        let mut rest = String::new();
        file.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "cdef");
        assert_eq!(file.size, 6);
        assert_eq!(file.id, blob.id);
    }
}
