//! Transport session state machine.
//!
//! ```text
//! Disconnected --connect--> Connected --run_command--> CommandRunning
//!      ^                        |                          |
//!      |  (connect failure)     |                     wait(done)
//!      +------------------------+                          v
//!                               +-------close-------- CommandFinished
//!                               v
//!                             Closed
//! ```
//!
//! A session owns one connection and at most one command channel; the
//! channel runs one remote command. Its standard input and output are exposed
//! as in-process pipes. Callers must write all of their input and close it
//! with [`Session::close_stdin`] before expecting end-of-output; a stalled
//! read/write pair otherwise deadlocks.
use std::{env, ffi::OsString, path::PathBuf, sync::Arc, time::Duration};

use tokio::{
    io::{AsyncWriteExt, DuplexStream},
    sync::oneshot,
};

use super::{
    auth::{AuthMethod, SSH_AUTH_SOCK, SshAgentAuth},
    endpoint::Endpoint,
    ssh::{Connection, Connector, RemoteChannel},
    types::TransportError,
    utils::quote_path,
};
use crate::config::TransportConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    CommandRunning,
    /// Connected, but the channel's one command has completed.
    CommandFinished,
    Closed,
}

/// Completion signal of a remote command.
///
/// Fires exactly once; awaiting it after the command already finished
/// returns the stored outcome.
#[derive(Debug)]
pub struct CommandDone {
    receiver: oneshot::Receiver<Result<(), TransportError>>,
}

impl CommandDone {
    pub async fn wait(self) -> Result<(), TransportError> {
        self.receiver.await.unwrap_or_else(|_| {
            Err(TransportError::Ssh(
                "command task ended without reporting".to_string(),
            ))
        })
    }
}

/// Remote-side halves of the command pipes, held until the command starts.
struct RemotePipes {
    stdin: DuplexStream,
    stdout: DuplexStream,
}

pub struct Session {
    endpoint: Endpoint,
    config: TransportConfig,
    connector: Arc<dyn Connector>,
    auth: Option<Arc<dyn AuthMethod>>,
    state: SessionState,
    connection: Option<Box<dyn Connection>>,
    channel: Option<Box<dyn RemoteChannel>>,
    remote_pipes: Option<RemotePipes>,
    stdin: Option<DuplexStream>,
    stdout: Option<DuplexStream>,
}

impl Session {
    /// Bind a session to `endpoint`; rejects hosts outside
    /// `config.allowed_hosts`.
    pub fn new(
        endpoint: Endpoint,
        config: TransportConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, TransportError> {
        if !config.is_host_allowed(&endpoint.host) {
            return Err(TransportError::UnsupportedRepositoryHost(
                endpoint.host.clone(),
            ));
        }
        Ok(Self {
            endpoint,
            config,
            connector,
            auth: None,
            state: SessionState::Disconnected,
            connection: None,
            channel: None,
            remote_pipes: None,
            stdin: None,
            stdout: None,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        matches!(
            self.state,
            SessionState::Connected | SessionState::CommandRunning | SessionState::CommandFinished
        )
    }

    /// Override the default agent-based credentials. Only allowed before the
    /// session connects.
    pub fn set_auth(&mut self, auth: Arc<dyn AuthMethod>) -> Result<(), TransportError> {
        match self.state {
            SessionState::Disconnected => {
                self.auth = Some(auth);
                Ok(())
            }
            SessionState::Closed => Err(TransportError::SessionClosed),
            _ => Err(TransportError::AlreadyConnected),
        }
    }

    /// Credentials used when none were set explicitly: the configured agent
    /// socket, else `SSH_AUTH_SOCK`.
    fn default_auth(&self) -> Result<Arc<dyn AuthMethod>, TransportError> {
        let socket = self
            .config
            .agent_socket
            .clone()
            .map(PathBuf::into_os_string)
            .or_else(|| env::var_os(SSH_AUTH_SOCK));
        Ok(Arc::new(agent_auth_for(&self.endpoint, socket)?))
    }

    /// Authenticate, dial and open the command channel.
    ///
    /// Any failure leaves the session `Disconnected` with nothing open.
    pub async fn connect(&mut self) -> Result<(), TransportError> {
        match self.state {
            SessionState::Disconnected => {}
            SessionState::Closed => return Err(TransportError::SessionClosed),
            _ => return Err(TransportError::AlreadyConnected),
        }

        let auth = match &self.auth {
            Some(auth) => auth.clone(),
            None => {
                let auth = self.default_auth()?;
                self.auth = Some(auth.clone());
                auth
            }
        };
        let client_config = auth.client_config()?;
        let (host, port) = self.endpoint.host_with_port(self.config.default_port);
        tracing::debug!("connecting to {}:{} using {}", host, port, auth.name());

        let timeout = Duration::from_secs(self.config.connect_timeout_secs);
        let dial = self.connector.connect(&host, port, client_config);
        let mut connection = match tokio::time::timeout(timeout, dial).await {
            Ok(connection) => connection?,
            Err(_) => {
                return Err(TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("connecting to {host}:{port} timed out"),
                )));
            }
        };

        let channel = match connection.open_channel().await {
            Ok(channel) => channel,
            Err(e) => {
                if let Err(close_err) = connection.disconnect().await {
                    tracing::warn!("closing connection after channel failure: {}", close_err);
                }
                return Err(e);
            }
        };

        let (stdin_local, stdin_remote) = tokio::io::duplex(self.config.pipe_buffer_size);
        let (stdout_remote, stdout_local) = tokio::io::duplex(self.config.pipe_buffer_size);
        self.connection = Some(connection);
        self.channel = Some(channel);
        self.remote_pipes = Some(RemotePipes {
            stdin: stdin_remote,
            stdout: stdout_remote,
        });
        self.stdin = Some(stdin_local);
        self.stdout = Some(stdout_local);
        self.state = SessionState::Connected;
        Ok(())
    }

    pub(crate) fn ensure_connected(&self) -> Result<(), TransportError> {
        match self.state {
            SessionState::Disconnected => Err(TransportError::NotConnected),
            SessionState::Closed => Err(TransportError::SessionClosed),
            _ => Ok(()),
        }
    }

    /// Start `program '<endpoint path>'` on the channel.
    ///
    /// Returns immediately; the returned signal fires when the remote
    /// process has exited and its output has been handed over.
    pub fn run_command(&mut self, program: &str) -> Result<CommandDone, TransportError> {
        self.ensure_connected()?;
        let (Some(channel), Some(pipes)) = (self.channel.take(), self.remote_pipes.take()) else {
            return Err(TransportError::CommandAlreadyStarted);
        };

        let command = format!("{program} {}", quote_path(&self.endpoint.path));
        let (sender, receiver) = oneshot::channel();
        tokio::spawn(async move {
            let result = channel.run(command, pipes.stdin, pipes.stdout).await;
            if let Err(e) = &result {
                tracing::error!("remote command failed: {}", e);
            }
            let _ = sender.send(result);
        });

        self.state = SessionState::CommandRunning;
        Ok(CommandDone { receiver })
    }

    /// Wait for the running command and mark the channel as used.
    pub async fn wait(&mut self, done: CommandDone) -> Result<(), TransportError> {
        let result = done.wait().await;
        if self.state == SessionState::CommandRunning {
            self.state = SessionState::CommandFinished;
        }
        result
    }

    /// Remote process standard input.
    pub fn stdin(&mut self) -> Result<&mut DuplexStream, TransportError> {
        self.ensure_connected()?;
        self.stdin
            .as_mut()
            .ok_or_else(|| TransportError::Io(std::io::ErrorKind::BrokenPipe.into()))
    }

    /// Remote process standard output.
    pub fn stdout(&mut self) -> Result<&mut DuplexStream, TransportError> {
        self.ensure_connected()?;
        self.stdout
            .as_mut()
            .ok_or_else(|| TransportError::Io(std::io::ErrorKind::BrokenPipe.into()))
    }

    /// Half-close: signal end of input to the remote process.
    pub async fn close_stdin(&mut self) -> Result<(), TransportError> {
        self.ensure_connected()?;
        if let Some(mut stdin) = self.stdin.take() {
            stdin.shutdown().await?;
        }
        Ok(())
    }

    /// Release the connection. A no-op on a session that never connected;
    /// a closed session cannot be reopened.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        match self.state {
            SessionState::Disconnected | SessionState::Closed => return Ok(()),
            _ => {}
        }

        self.state = SessionState::Closed;
        self.stdin = None;
        self.stdout = None;
        self.remote_pipes = None;
        self.channel = None;
        match self.connection.take() {
            Some(mut connection) => connection.disconnect().await,
            None => Ok(()),
        }
    }
}

/// Agent authentication as the endpoint's user.
fn agent_auth_for(
    endpoint: &Endpoint,
    socket: Option<OsString>,
) -> Result<SshAgentAuth, TransportError> {
    let user = endpoint.user.as_deref().unwrap_or_default();
    SshAgentAuth::from_socket(user, socket)
}
