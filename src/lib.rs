//! Git-Remote-Core: the client-side core of a Git implementation. It resolves
//! and walks tree snapshots held in an object store, and talks the smart
//! protocol to remote repositories over SSH.
//!
//! Core Capabilities
//! - Tree objects: decode/encode the binary tree format, resolve slash-separated
//!   paths to files, stream every file of a snapshot from a background producer.
//! - Transport: parse SSH endpoints, pluggable authentication (agent, key file,
//!   password), a session state machine running one remote command per channel.
//! - Smart protocol: one-time reference advertisement, fetch (`want`/`have`
//!   negotiation, pack download) and send (ref updates, pack upload, status report).
//!
//! Modules
//! - `internal::object`: raw objects, the `ObjectStore` contract, Blob/File, Tree.
//! - `protocol`: endpoints, auth, SSH connector, sessions and the pack exchange.
//! - `config`: transport and traversal settings.
//! - `errors`: object model error type.
//! - `hash`: SHA-1 object ids.
//!
//! Typical Usage
//! - Read a file: `Tree::from_store(store, &id)?.file("src/lib.rs")`.
//! - Walk a snapshot: `for file in tree.files() { ... }`.
//! - Fetch: `Client::new().new_fetch_pack_session(endpoint)?`, then
//!   `advertised_references().await?` and `fetch_pack(&request).await?`.

pub mod config;
pub mod errors;
pub mod hash;
pub mod internal;
pub mod protocol;

pub use config::{TransportConfig, TraversalConfig};
pub use errors::GitError;
pub use hash::ObjectHash;
pub use internal::object::{
    RawObject,
    blob::{Blob, File},
    store::{MemoryStore, ObjectStore},
    tree::{Tree, TreeItem, TreeItemMode},
    types::ObjectType,
};
pub use protocol::{
    AuthMethod, Client, Endpoint, FetchPackSession, SendPackSession, ServiceType,
    TransportError,
};
