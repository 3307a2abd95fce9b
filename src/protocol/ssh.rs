//! SSH transport for the Git smart protocol
//!
//! Sessions talk to the network only through the [`Connector`],
//! [`Connection`] and [`RemoteChannel`] traits; [`SshConnector`] implements
//! them on top of `russh`.
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use russh::{ChannelMsg, Disconnect, client};
use russh_keys::key::PublicKey;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

use super::{
    auth::{ClientConfig, Credential},
    types::TransportError,
};
use crate::config::TransportConfig;

/// Opens authenticated connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Dial `host:port` and authenticate with `config`.
    ///
    /// On failure nothing stays open.
    async fn connect(
        &self,
        host: &str,
        port: u16,
        config: ClientConfig,
    ) -> Result<Box<dyn Connection>, TransportError>;
}

/// An authenticated connection.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn open_channel(&mut self) -> Result<Box<dyn RemoteChannel>, TransportError>;

    async fn disconnect(&mut self) -> Result<(), TransportError>;
}

/// A session channel able to execute exactly one remote command.
#[async_trait]
pub trait RemoteChannel: Send {
    /// Execute `command`, forwarding `stdin` to the remote process and its
    /// standard output into `stdout` until the process exits.
    ///
    /// `stdout` is dropped on return so the reading side sees end-of-stream.
    async fn run(
        self: Box<Self>,
        command: String,
        stdin: DuplexStream,
        stdout: DuplexStream,
    ) -> Result<(), TransportError>;
}

/// `russh`-backed connector.
#[derive(Clone)]
pub struct SshConnector {
    config: Arc<client::Config>,
    strict_host_key_checking: bool,
    buffer_size: usize,
}

impl SshConnector {
    pub fn new(config: &TransportConfig) -> Self {
        let ssh_config = client::Config {
            inactivity_timeout: config.inactivity_timeout_secs.map(Duration::from_secs),
            ..Default::default()
        };
        Self {
            config: Arc::new(ssh_config),
            strict_host_key_checking: config.strict_host_key_checking,
            buffer_size: config.pipe_buffer_size,
        }
    }
}

/// Host key policy for one connection.
struct HostKeyCheck {
    host: String,
    port: u16,
    strict: bool,
}

#[async_trait]
impl client::Handler for HostKeyCheck {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint();
        if !self.strict {
            tracing::debug!("accepting host key {} for {}", fingerprint, self.host);
            return Ok(true);
        }
        match russh_keys::check_known_hosts(&self.host, self.port, server_public_key) {
            Ok(known) => {
                if !known {
                    tracing::warn!("host key {} for {} is not known", fingerprint, self.host);
                }
                Ok(known)
            }
            Err(e) => {
                tracing::warn!("host key {} for {} rejected: {}", fingerprint, self.host, e);
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        config: ClientConfig,
    ) -> Result<Box<dyn Connection>, TransportError> {
        let handler = HostKeyCheck {
            host: host.to_string(),
            port,
            strict: self.strict_host_key_checking,
        };
        let mut handle = client::connect(self.config.clone(), (host, port), handler).await?;
        tracing::debug!("connected to {}:{}", host, port);

        let user = config.user.clone();
        match authenticate(&mut handle, config).await {
            Ok(true) => {
                tracing::debug!("authenticated to {} as {}", host, user);
                Ok(Box::new(SshConnection {
                    handle,
                    buffer_size: self.buffer_size,
                }))
            }
            Ok(false) => {
                close_handle(&handle).await;
                Err(TransportError::AuthRequired)
            }
            Err(e) => {
                close_handle(&handle).await;
                Err(e)
            }
        }
    }
}

async fn close_handle(handle: &client::Handle<HostKeyCheck>) {
    if let Err(e) = handle
        .disconnect(Disconnect::ByApplication, "", "English")
        .await
    {
        tracing::debug!("disconnect after failed auth: {}", e);
    }
}

async fn authenticate(
    handle: &mut client::Handle<HostKeyCheck>,
    config: ClientConfig,
) -> Result<bool, TransportError> {
    let user = config.user;
    match config.credential {
        Credential::Password(password) => {
            Ok(handle.authenticate_password(user, password).await?)
        }
        Credential::KeyPair(key) => Ok(handle.authenticate_publickey(user, key).await?),
        Credential::Agent { socket } => authenticate_with_agent(handle, user, socket).await,
    }
}

#[cfg(unix)]
async fn authenticate_with_agent(
    handle: &mut client::Handle<HostKeyCheck>,
    user: String,
    socket: std::path::PathBuf,
) -> Result<bool, TransportError> {
    use russh_keys::agent::client::AgentClient;

    let mut agent = AgentClient::connect_uds(&socket).await.map_err(|e| {
        tracing::warn!("cannot reach ssh agent at {}: {}", socket.display(), e);
        TransportError::AuthRequired
    })?;
    let identities = agent.request_identities().await.map_err(|e| {
        tracing::warn!("ssh agent refused to list identities: {}", e);
        TransportError::AuthRequired
    })?;

    for key in identities {
        let fingerprint = key.fingerprint();
        let (returned, result) = handle.authenticate_future(user.clone(), key, agent).await;
        agent = returned;
        match result {
            Ok(true) => return Ok(true),
            Ok(false) => tracing::debug!("agent key {} rejected", fingerprint),
            Err(e) => tracing::debug!("agent could not sign with {}: {:?}", fingerprint, e),
        }
    }
    Ok(false)
}

#[cfg(not(unix))]
async fn authenticate_with_agent(
    _handle: &mut client::Handle<HostKeyCheck>,
    _user: String,
    socket: std::path::PathBuf,
) -> Result<bool, TransportError> {
    tracing::warn!("ssh agent at {} is not supported on this platform", socket.display());
    Err(TransportError::AuthRequired)
}

struct SshConnection {
    handle: client::Handle<HostKeyCheck>,
    buffer_size: usize,
}

#[async_trait]
impl Connection for SshConnection {
    async fn open_channel(&mut self) -> Result<Box<dyn RemoteChannel>, TransportError> {
        let channel = self.handle.channel_open_session().await?;
        Ok(Box::new(SshChannel {
            channel,
            buffer_size: self.buffer_size,
        }))
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await?;
        Ok(())
    }
}

struct SshChannel {
    channel: russh::Channel<client::Msg>,
    buffer_size: usize,
}

#[async_trait]
impl RemoteChannel for SshChannel {
    async fn run(
        self: Box<Self>,
        command: String,
        mut stdin: DuplexStream,
        mut stdout: DuplexStream,
    ) -> Result<(), TransportError> {
        let SshChannel {
            mut channel,
            buffer_size,
        } = *self;
        tracing::debug!("exec: {}", command);
        channel.exec(true, command.as_bytes()).await?;

        let mut buf = vec![0u8; buffer_size];
        let mut stdin_open = true;
        let mut exit_status = None;
        loop {
            tokio::select! {
                read = stdin.read(&mut buf), if stdin_open => {
                    match read? {
                        0 => {
                            stdin_open = false;
                            channel.eof().await?;
                        }
                        n => channel.data(&buf[..n]).await?,
                    }
                }
                msg = channel.wait() => match msg {
                    Some(ChannelMsg::Data { ref data }) => stdout.write_all(data).await?,
                    Some(ChannelMsg::ExtendedData { ref data, ext }) => {
                        tracing::debug!(
                            "remote stderr({}): {}",
                            ext,
                            String::from_utf8_lossy(data).trim_end()
                        );
                    }
                    Some(ChannelMsg::ExitStatus { exit_status: status }) => {
                        exit_status = Some(status);
                    }
                    Some(ChannelMsg::Eof) => stdout.shutdown().await?,
                    Some(ChannelMsg::Failure) => {
                        return Err(TransportError::Ssh(format!(
                            "remote refused to execute `{command}`"
                        )));
                    }
                    Some(ChannelMsg::Close) | None => break,
                    Some(_) => {}
                },
            }
        }

        exit_outcome(exit_status)
    }
}

/// A channel that closes without reporting an exit status did not complete.
fn exit_outcome(exit_status: Option<u32>) -> Result<(), TransportError> {
    match exit_status {
        Some(0) => Ok(()),
        Some(status) => Err(TransportError::CommandFailed(status)),
        None => Err(TransportError::Ssh(
            "remote command exited without status".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_outcome() {
        assert!(exit_outcome(Some(0)).is_ok());
        assert!(matches!(
            exit_outcome(Some(128)),
            Err(TransportError::CommandFailed(128))
        ));
        assert!(matches!(
            exit_outcome(None),
            Err(TransportError::Ssh(ref msg)) if msg.contains("without status")
        ));
    }
}
