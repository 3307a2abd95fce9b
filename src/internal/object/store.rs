//! Content-addressable object store contract and an in-memory implementation.
//!
//! The trees and blobs in this crate never own storage; they hold an
//! `Arc<dyn ObjectStore>` and resolve child ids through it on demand. Any
//! number of concurrent readers may share one store.

use bytes::Bytes;
use dashmap::DashMap;

use crate::{
    hash::ObjectHash,
    internal::object::{
        RawObject,
        tree::{Tree, TreeItem},
        types::ObjectType,
    },
};

/// Resolves an object id to the stored object.
///
/// `None` is a normal answer: a tree entry pointing at a submodule commit has
/// no local object.
pub trait ObjectStore: Send + Sync {
    fn get(&self, hash: &ObjectHash) -> Option<RawObject>;
}

/// Thread-safe store backed by a concurrent map.
#[derive(Default, Debug)]
pub struct MemoryStore {
    objects: DashMap<ObjectHash, RawObject>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store content under its computed id and return the id.
    pub fn insert(&self, object_type: ObjectType, data: impl Into<Bytes>) -> ObjectHash {
        self.insert_object(RawObject::from_content(object_type, data))
    }

    pub fn insert_object(&self, object: RawObject) -> ObjectHash {
        let hash = object.hash();
        self.objects.insert(hash, object);
        hash
    }

    /// Encode `items` as a tree object and store it.
    pub fn insert_tree(&self, items: Vec<TreeItem>) -> ObjectHash {
        self.insert(ObjectType::Tree, Tree::encode_items(items))
    }

    /// Every stored object of the given kind, in no particular order.
    pub fn objects_of_type(&self, object_type: ObjectType) -> Vec<RawObject> {
        self.objects
            .iter()
            .filter(|entry| entry.value().object_type() == object_type)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl ObjectStore for MemoryStore {
    fn get(&self, hash: &ObjectHash) -> Option<RawObject> {
        self.objects.get(hash).map(|entry| entry.value().clone())
    }
}
