//! Client side of the Git smart protocol over SSH.
//!
//! A [`Client`] hands out [`FetchPackSession`]s and [`SendPackSession`]s for
//! an [`Endpoint`]. Each session dials once, runs one remote program
//! (`git-upload-pack` or `git-receive-pack`), reads the reference
//! advertisement once and then negotiates in its direction.
pub mod auth;
pub mod client;
pub mod endpoint;
pub mod pack;
pub mod session;
pub mod ssh;
pub mod types;
pub mod utils;

// Re-export main interfaces
pub use auth::{AuthMethod, PasswordAuth, PublicKeysAuth, SshAgentAuth};
pub use client::Client;
pub use endpoint::Endpoint;
pub use pack::{
    AdvertisedRefs, FetchPackSession, PackSession, ReceivePackRequest, ReceivePackResponse,
    SendPackSession, UploadPackRequest, UploadPackResponse,
};
pub use session::{CommandDone, Session, SessionState};
pub use ssh::{Connection, Connector, RemoteChannel, SshConnector};
pub use types::*;
