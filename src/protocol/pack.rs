//! Fetch and send sessions.
//!
//! Both directions share one [`PackSession`]; the [`PackService`] marker
//! only fixes the remote program and the shape of the negotiation.
//! Lifecycle, authentication and the advertisement read are common.
use std::{collections::HashMap, marker::PhantomData, sync::Arc};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::{
    auth::AuthMethod,
    endpoint::Endpoint,
    session::{CommandDone, Session, SessionState},
    ssh::Connector,
    types::{
        Capability, CommandStatus, GitRef, LF, NUL, RefCommand, SP, ServiceType, TransportError,
    },
    utils::{PktLine, add_flush, add_pkt_line_string, read_pkt_line},
};
use crate::{config::TransportConfig, hash::ObjectHash};

/// Name the remote sends in place of a ref when it has none to advertise.
const CAPABILITIES_REF: &str = "capabilities^{}";
const PEELED_SUFFIX: &str = "^{}";
const S_UPLOAD: ServiceType = ServiceType::UploadPack;
const S_RECEIVE: ServiceType = ServiceType::ReceivePack;

pub trait PackService: Send + Sync + 'static {
    const SERVICE: ServiceType;
}

/// `git-upload-pack`: the remote sends objects.
#[derive(Debug)]
pub struct UploadPack;

/// `git-receive-pack`: the remote receives objects and ref updates.
#[derive(Debug)]
pub struct ReceivePack;

impl PackService for UploadPack {
    const SERVICE: ServiceType = ServiceType::UploadPack;
}

impl PackService for ReceivePack {
    const SERVICE: ServiceType = ServiceType::ReceivePack;
}

pub type FetchPackSession = PackSession<UploadPack>;
pub type SendPackSession = PackSession<ReceivePack>;

/// The remote's one-time reference advertisement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdvertisedRefs {
    pub head: Option<ObjectHash>,
    /// Advertised refs in wire order, `HEAD` excluded.
    pub refs: Vec<GitRef>,
    /// Targets of annotated tags, keyed by tag ref name.
    pub peeled: HashMap<String, ObjectHash>,
    pub capabilities: Vec<Capability>,
}

impl AdvertisedRefs {
    pub fn is_empty(&self) -> bool {
        self.head.is_none() && self.refs.is_empty()
    }

    pub fn reference(&self, name: &str) -> Option<&ObjectHash> {
        self.refs.iter().find(|r| r.name == name).map(|r| &r.hash)
    }

    pub fn supports(&self, capability: &Capability) -> bool {
        self.capabilities.contains(capability)
    }
}

#[derive(Debug, Clone, Default)]
pub struct UploadPackRequest {
    pub wants: Vec<ObjectHash>,
    pub haves: Vec<ObjectHash>,
    /// Sent on the first `want` line.
    pub capabilities: Vec<Capability>,
}

#[derive(Debug, Clone, Default)]
pub struct UploadPackResponse {
    /// Objects the remote acknowledged as common, in order.
    pub acks: Vec<ObjectHash>,
    /// Raw pack stream following the negotiation; empty when nothing was
    /// wanted.
    pub pack: Bytes,
}

#[derive(Debug, Clone, Default)]
pub struct ReceivePackRequest {
    pub commands: Vec<RefCommand>,
    /// Sent on the first command line; `report-status` is always added.
    pub capabilities: Vec<Capability>,
    pub pack: Bytes,
}

#[derive(Debug, Clone, Default)]
pub struct ReceivePackResponse {
    /// `None` when the remote unpacked successfully.
    pub unpack_error: Option<String>,
    /// The request's commands with their reported status.
    pub commands: Vec<RefCommand>,
}

impl ReceivePackResponse {
    pub fn is_success(&self) -> bool {
        self.unpack_error.is_none()
            && self
                .commands
                .iter()
                .all(|c| c.status == CommandStatus::Success)
    }
}

pub struct PackSession<S: PackService> {
    session: Session,
    advertised: bool,
    done: Option<CommandDone>,
    _service: PhantomData<S>,
}

impl<S: PackService> PackSession<S> {
    pub fn new(
        endpoint: Endpoint,
        config: TransportConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            session: Session::new(endpoint, config, connector)?,
            advertised: false,
            done: None,
            _service: PhantomData,
        })
    }

    pub fn service(&self) -> ServiceType {
        S::SERVICE
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn set_auth(&mut self, auth: Arc<dyn AuthMethod>) -> Result<(), TransportError> {
        self.session.set_auth(auth)
    }

    pub async fn connect(&mut self) -> Result<(), TransportError> {
        self.session.connect().await
    }

    pub async fn close(&mut self) -> Result<(), TransportError> {
        self.done = None;
        self.session.close().await
    }

    /// Read the reference advertisement, connecting and starting the remote
    /// program first if needed. Can only be called once per session.
    pub async fn advertised_references(&mut self) -> Result<AdvertisedRefs, TransportError> {
        if self.advertised {
            return Err(TransportError::AdvertisedReferencesAlreadyCalled);
        }
        if self.session.state() == SessionState::Disconnected {
            self.session.connect().await?;
        }
        if self.done.is_none() {
            self.done = Some(self.session.run_command(&S::SERVICE.to_string())?);
        }
        self.advertised = true;

        let service = S::SERVICE;
        let stdout = self.session.stdout()?;
        let mut advertisement = AdvertisedRefs::default();
        let mut first = true;
        loop {
            let line = match read_pkt_line(stdout, service).await? {
                Some(PktLine::Data(data)) => data,
                Some(PktLine::Flush) => break,
                None => {
                    tracing::warn!("{} ended before the advertisement flush", service);
                    return Err(TransportError::answer_format(service));
                }
            };
            parse_advertised_line(&line, first, &mut advertisement, service)?;
            first = false;
        }
        tracing::debug!(
            "{} advertised {} refs, {} capabilities",
            service,
            advertisement.refs.len(),
            advertisement.capabilities.len()
        );
        Ok(advertisement)
    }

    /// The completion signal of the running command, available once the
    /// advertisement has been read.
    fn take_command(&mut self) -> Result<CommandDone, TransportError> {
        self.session.ensure_connected()?;
        if !self.advertised {
            return Err(TransportError::CommandNotStarted);
        }
        self.done.take().ok_or(TransportError::CommandNotStarted)
    }

    /// Drain the remote's remaining output and wait for the command to exit.
    async fn finish(&mut self, done: CommandDone) -> Result<Bytes, TransportError> {
        let mut rest = Vec::new();
        self.session.stdout()?.read_to_end(&mut rest).await?;
        self.session.wait(done).await?;
        Ok(Bytes::from(rest))
    }

    /// Write the request and the pack, then half-close input.
    async fn send(&mut self, request: &[u8], pack: &[u8]) -> Result<(), TransportError> {
        let stdin = self.session.stdin()?;
        stdin.write_all(request).await?;
        if !pack.is_empty() {
            stdin.write_all(pack).await?;
        }
        stdin.flush().await?;
        self.session.close_stdin().await
    }

    async fn read_line(&mut self) -> Result<Option<PktLine>, TransportError> {
        read_pkt_line(self.session.stdout()?, S::SERVICE).await
    }
}

fn parse_advertised_line(
    line: &[u8],
    first: bool,
    advertisement: &mut AdvertisedRefs,
    service: ServiceType,
) -> Result<(), TransportError> {
    let line = line.strip_suffix(&[LF as u8]).unwrap_or(line);
    let (reference, capabilities) = match line.iter().position(|b| *b == NUL as u8) {
        Some(i) if first => (&line[..i], Some(&line[i + 1..])),
        Some(_) => {
            tracing::warn!("capabilities after the first advertised ref");
            return Err(TransportError::answer_format(service));
        }
        None => (line, None),
    };

    let reference = String::from_utf8_lossy(reference);
    if let Some(message) = reference.strip_prefix("ERR ") {
        return Err(TransportError::RemoteError(message.to_string()));
    }
    let (hash, name) = reference
        .split_once(SP)
        .and_then(|(hash, name)| Some((hash.parse::<ObjectHash>().ok()?, name)))
        .filter(|(_, name)| !name.is_empty())
        .ok_or_else(|| {
            tracing::warn!("malformed advertised ref: {:?}", reference);
            TransportError::answer_format(service)
        })?;

    if let Some(capabilities) = capabilities {
        advertisement.capabilities = String::from_utf8_lossy(capabilities)
            .split(SP)
            .filter(|c| !c.is_empty())
            .filter_map(|c| c.parse().ok())
            .collect();
    }

    if name == CAPABILITIES_REF {
        // Empty repository: the line only carries capabilities.
    } else if name == "HEAD" {
        advertisement.head = Some(hash);
    } else if let Some(tag) = name.strip_suffix(PEELED_SUFFIX) {
        advertisement.peeled.insert(tag.to_string(), hash);
    } else {
        advertisement.refs.push(GitRef {
            name: name.to_string(),
            hash,
        });
    }
    Ok(())
}

impl PackSession<UploadPack> {
    /// Negotiate and receive a pack.
    ///
    /// Wants and haves are sent in one go followed by `done`; the response
    /// is the `ACK`/`NAK` lines and the pack stream after them.
    pub async fn fetch_pack(
        &mut self,
        request: &UploadPackRequest,
    ) -> Result<UploadPackResponse, TransportError> {
        let done = self.take_command()?;

        let mut buf = BytesMut::new();
        for (i, want) in request.wants.iter().enumerate() {
            if i == 0 && !request.capabilities.is_empty() {
                add_pkt_line_string(
                    &mut buf,
                    format!("want {want}{SP}{}{LF}", join_capabilities(&request.capabilities)),
                );
            } else {
                add_pkt_line_string(&mut buf, format!("want {want}{LF}"));
            }
        }
        add_flush(&mut buf);
        if request.wants.is_empty() {
            self.send(&buf, &[]).await?;
            self.finish(done).await?;
            return Ok(UploadPackResponse::default());
        }
        for have in &request.haves {
            add_pkt_line_string(&mut buf, format!("have {have}{LF}"));
        }
        add_pkt_line_string(&mut buf, format!("done{LF}"));
        self.send(&buf, &[]).await?;

        let mut acks = Vec::new();
        loop {
            let text = match self.read_line().await? {
                Some(line @ PktLine::Data(_)) => line.as_text().unwrap_or_default(),
                Some(PktLine::Flush) => continue,
                None => {
                    tracing::warn!("upload-pack ended before its final ACK/NAK");
                    return Err(TransportError::answer_format(S_UPLOAD));
                }
            };
            if text == "NAK" {
                break;
            }
            if let Some(message) = text.strip_prefix("ERR ") {
                return Err(TransportError::RemoteError(message.to_string()));
            }
            let Some(ack) = text.strip_prefix("ACK ") else {
                tracing::warn!("unexpected negotiation line: {:?}", text);
                return Err(TransportError::answer_format(S_UPLOAD));
            };
            let (hash, status) = match ack.split_once(SP) {
                Some((hash, status)) => (hash, Some(status)),
                None => (ack, None),
            };
            let hash = hash.parse::<ObjectHash>().map_err(|e| {
                tracing::warn!("bad ACK hash {:?}: {}", hash, e);
                TransportError::answer_format(S_UPLOAD)
            })?;
            acks.push(hash);
            // `continue`, `common` and `ready` acks precede the final one.
            if status.is_none() {
                break;
            }
        }

        let pack = self.finish(done).await?;
        tracing::debug!("received {} pack bytes, {} acks", pack.len(), acks.len());
        Ok(UploadPackResponse { acks, pack })
    }
}

impl PackSession<ReceivePack> {
    /// Send ref updates and a pack, then read the remote's report.
    pub async fn send_pack(
        &mut self,
        request: ReceivePackRequest,
    ) -> Result<ReceivePackResponse, TransportError> {
        let done = self.take_command()?;

        let ReceivePackRequest {
            mut commands,
            mut capabilities,
            pack,
        } = request;
        if !capabilities.contains(&Capability::ReportStatus) {
            capabilities.insert(0, Capability::ReportStatus);
        }

        let mut buf = BytesMut::new();
        for (i, command) in commands.iter().enumerate() {
            if i == 0 {
                add_pkt_line_string(
                    &mut buf,
                    format!(
                        "{}{NUL}{}{LF}",
                        command.to_line(),
                        join_capabilities(&capabilities)
                    ),
                );
            } else {
                add_pkt_line_string(&mut buf, format!("{}{LF}", command.to_line()));
            }
        }
        add_flush(&mut buf);
        if commands.is_empty() {
            self.send(&buf, &[]).await?;
            self.finish(done).await?;
            return Ok(ReceivePackResponse::default());
        }
        self.send(&buf, &pack).await?;

        let unpack_error = match self.read_line().await? {
            Some(line @ PktLine::Data(_)) => {
                let text = line.as_text().unwrap_or_default();
                match text.strip_prefix("unpack ") {
                    Some("ok") => None,
                    Some(error) => Some(error.to_string()),
                    None => {
                        tracing::warn!("expected unpack status, got {:?}", text);
                        return Err(TransportError::answer_format(S_RECEIVE));
                    }
                }
            }
            _ => {
                tracing::warn!("receive-pack ended without a status report");
                return Err(TransportError::answer_format(S_RECEIVE));
            }
        };

        loop {
            let text = match self.read_line().await? {
                Some(line @ PktLine::Data(_)) => line.as_text().unwrap_or_default(),
                Some(PktLine::Flush) => break,
                None => {
                    tracing::warn!("receive-pack report ended before flush");
                    return Err(TransportError::answer_format(S_RECEIVE));
                }
            };
            apply_status_line(&text, &mut commands)?;
        }

        self.finish(done).await?;
        Ok(ReceivePackResponse {
            unpack_error,
            commands,
        })
    }
}

/// Apply one `ok <ref>` / `ng <ref> <reason>` line.
fn apply_status_line(text: &str, commands: &mut [RefCommand]) -> Result<(), TransportError> {
    let (ok, rest) = if let Some(rest) = text.strip_prefix("ok ") {
        (true, rest)
    } else if let Some(rest) = text.strip_prefix("ng ") {
        (false, rest)
    } else {
        tracing::warn!("unexpected report-status line: {:?}", text);
        return Err(TransportError::answer_format(S_RECEIVE));
    };
    let (ref_name, reason) = match rest.split_once(SP) {
        Some((name, reason)) => (name, reason),
        None => (rest, ""),
    };

    match commands.iter_mut().find(|c| c.ref_name == ref_name) {
        Some(command) if ok => command.success(),
        Some(command) => command.failed(reason.to_string()),
        None => tracing::warn!("status for unknown ref {}", ref_name),
    }
    Ok(())
}

fn join_capabilities(capabilities: &[Capability]) -> String {
    capabilities
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(&SP.to_string())
}
