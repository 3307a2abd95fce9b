//! Pluggable credentials for SSH sessions.
//!
//! An [`AuthMethod`] only describes how to authenticate: it produces a
//! [`ClientConfig`] that the connector consumes when the session dials. It
//! never owns the network connection.

use std::{
    env,
    ffi::OsString,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use russh_keys::key::KeyPair;

use super::types::TransportError;

/// Environment variable holding the local SSH agent socket.
pub const SSH_AUTH_SOCK: &str = "SSH_AUTH_SOCK";
/// User assumed when the endpoint does not carry one.
pub const DEFAULT_USER: &str = "git";

/// What the connector needs to authenticate one connection.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub user: String,
    pub credential: Credential,
}

#[derive(Clone)]
pub enum Credential {
    /// Offer every identity held by the agent listening on `socket`.
    Agent { socket: PathBuf },
    KeyPair(Arc<KeyPair>),
    Password(String),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Agent { socket } => f.debug_struct("Agent").field("socket", socket).finish(),
            Credential::KeyPair(_) => f.write_str("KeyPair(..)"),
            Credential::Password(_) => f.write_str("Password(..)"),
        }
    }
}

/// Strategy producing a connection configuration.
pub trait AuthMethod: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn client_config(&self) -> Result<ClientConfig, TransportError>;
}

/// Public-key authentication through a running SSH agent.
#[derive(Debug, Clone)]
pub struct SshAgentAuth {
    user: String,
    socket: PathBuf,
}

impl SshAgentAuth {
    /// Use the agent advertised in `SSH_AUTH_SOCK`.
    ///
    /// Fails with `AuthRequired` when no agent is available.
    pub fn new(user: &str) -> Result<Self, TransportError> {
        Self::from_socket(user, env::var_os(SSH_AUTH_SOCK))
    }

    /// Use the agent at `socket`; a missing or empty path means no agent.
    pub fn from_socket(user: &str, socket: Option<OsString>) -> Result<Self, TransportError> {
        let socket = socket.filter(|s| !s.is_empty()).ok_or_else(|| {
            tracing::debug!("no agent socket, cannot authenticate with an agent");
            TransportError::AuthRequired
        })?;
        Ok(Self::with_socket(user, socket))
    }

    pub fn with_socket(user: &str, socket: impl Into<PathBuf>) -> Self {
        Self {
            user: user_or_default(user),
            socket: socket.into(),
        }
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }
}

impl AuthMethod for SshAgentAuth {
    fn name(&self) -> &'static str {
        "ssh-public-key-agent"
    }

    fn client_config(&self) -> Result<ClientConfig, TransportError> {
        Ok(ClientConfig {
            user: self.user.clone(),
            credential: Credential::Agent {
                socket: self.socket.clone(),
            },
        })
    }
}

/// Public-key authentication with a private key file.
#[derive(Clone)]
pub struct PublicKeysAuth {
    user: String,
    path: PathBuf,
    passphrase: Option<String>,
}

impl fmt::Debug for PublicKeysAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKeysAuth")
            .field("user", &self.user)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl PublicKeysAuth {
    pub fn new(user: &str, path: impl Into<PathBuf>, passphrase: Option<String>) -> Self {
        Self {
            user: user_or_default(user),
            path: path.into(),
            passphrase,
        }
    }
}

impl AuthMethod for PublicKeysAuth {
    fn name(&self) -> &'static str {
        "ssh-public-keys"
    }

    /// Loads the key on every call so a rotated key file is picked up.
    fn client_config(&self) -> Result<ClientConfig, TransportError> {
        let key = russh_keys::load_secret_key(&self.path, self.passphrase.as_deref()).map_err(
            |e| {
                tracing::warn!("cannot load private key {}: {}", self.path.display(), e);
                TransportError::AuthRequired
            },
        )?;
        Ok(ClientConfig {
            user: self.user.clone(),
            credential: Credential::KeyPair(Arc::new(key)),
        })
    }
}

/// Password authentication.
#[derive(Clone)]
pub struct PasswordAuth {
    user: String,
    password: String,
}

impl fmt::Debug for PasswordAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordAuth")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl PasswordAuth {
    pub fn new(user: &str, password: impl Into<String>) -> Self {
        Self {
            user: user_or_default(user),
            password: password.into(),
        }
    }
}

impl AuthMethod for PasswordAuth {
    fn name(&self) -> &'static str {
        "ssh-password"
    }

    fn client_config(&self) -> Result<ClientConfig, TransportError> {
        Ok(ClientConfig {
            user: self.user.clone(),
            credential: Credential::Password(self.password.clone()),
        })
    }
}

fn user_or_default(user: &str) -> String {
    if user.is_empty() {
        DEFAULT_USER.to_string()
    } else {
        user.to_string()
    }
}
