//! In Git, the SHA-1 hash algorithm is used to generate unique identifiers for Git objects.
//! Each object corresponds to exactly one 20-byte digest, which is how the object store
//! locates it and how tree entries point at their children.
//!

use std::{fmt::Display, io, str::FromStr};

use sha1::Digest;

use crate::{errors::GitError, internal::object::types::ObjectType};

/// Size in bytes of an object id.
pub const HASH_SIZE: usize = 20;
/// Length of an object id rendered as hex.
pub const HASH_HEX_LEN: usize = HASH_SIZE * 2;

/// The [`ObjectHash`] struct, encapsulating a `[u8; 20]` array, represents Git object ids.
/// Equality is byte-exact; the display form is the usual 40-character lowercase hex string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ObjectHash(pub [u8; HASH_SIZE]);

impl Display for ObjectHash {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl AsRef<[u8]> for ObjectHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Parses a 40-character hexadecimal string into an [`ObjectHash`].
impl FromStr for ObjectHash {
    type Err = GitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != HASH_HEX_LEN {
            return Err(GitError::InvalidHashValue(s.to_string()));
        }
        let mut h = [0u8; HASH_SIZE];
        hex::decode_to_slice(s, &mut h).map_err(|_| GitError::InvalidHashValue(s.to_string()))?;
        Ok(ObjectHash(h))
    }
}

impl ObjectHash {
    /// The all-zero id used on the wire for "no object" (ref creation/deletion).
    pub const ZERO: ObjectHash = ObjectHash([0u8; HASH_SIZE]);

    /// Calculates the SHA-1 of the given data.
    pub fn new(data: &[u8]) -> ObjectHash {
        let h = sha1::Sha1::digest(data);
        let mut bytes = [0u8; HASH_SIZE];
        bytes.copy_from_slice(h.as_ref());
        ObjectHash(bytes)
    }

    /// Create ObjectHash from object type and data, i.e. the id git assigns to
    /// `"<type> <len>\0<data>"`.
    pub fn from_type_and_data(object_type: ObjectType, data: &[u8]) -> ObjectHash {
        let mut d: Vec<u8> = Vec::with_capacity(data.len() + 32);
        d.extend(object_type.to_bytes());
        d.push(b' ');
        d.extend(data.len().to_string().as_bytes());
        d.push(b'\x00');
        d.extend(data);
        ObjectHash::new(&d)
    }

    /// Create ObjectHash from a byte slice
    pub fn from_bytes(bytes: &[u8]) -> Result<ObjectHash, GitError> {
        if bytes.len() != HASH_SIZE {
            return Err(GitError::InvalidHashValue(hex::encode(bytes)));
        }
        let mut h = [0u8; HASH_SIZE];
        h.copy_from_slice(bytes);
        Ok(ObjectHash(h))
    }

    /// Create ObjectHash from a stream
    pub fn from_stream(data: &mut impl io::Read) -> io::Result<ObjectHash> {
        let mut h = [0u8; HASH_SIZE];
        data.read_exact(&mut h)?;
        Ok(ObjectHash(h))
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Export the hash to a byte vector
    pub fn to_data(self) -> Vec<u8> {
        self.0.to_vec()
    }
}
