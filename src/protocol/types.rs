use std::fmt;
use std::str::FromStr;

use crate::hash::ObjectHash;

/// Transport error kinds.
///
/// The first seven variants are the stable kinds callers branch on
/// (retry on `AuthRequired`, give up on `UnsupportedVcs`, ...). The rest
/// carry lifecycle misuse and failures of the underlying connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("cannot connect: auth required")]
    AuthRequired,

    #[error("ssh session already created")]
    AlreadyConnected,

    #[error("not connected")]
    NotConnected,

    #[error("only git is supported: {0}")]
    UnsupportedVcs(String),

    #[error("unsupported repository host: {0}")]
    UnsupportedRepositoryHost(String),

    #[error("cannot call advertised_references twice")]
    AdvertisedReferencesAlreadyCalled,

    #[error("{0} bad answer format")]
    AnswerFormat(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("session is closed")]
    SessionClosed,

    #[error("a remote command was already started on this channel")]
    CommandAlreadyStarted,

    #[error("remote command has not been started")]
    CommandNotStarted,

    #[error("remote command exited with status {0}")]
    CommandFailed(u32),

    #[error("remote error: {0}")]
    RemoteError(String),

    #[error("ssh error: {0}")]
    Ssh(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    pub fn answer_format(service: ServiceType) -> Self {
        TransportError::AnswerFormat(service.to_string())
    }
}

impl From<russh::Error> for TransportError {
    fn from(e: russh::Error) -> Self {
        TransportError::Ssh(e.to_string())
    }
}

/// Git service types for smart protocol. `Display` gives the remote program name.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ServiceType {
    UploadPack,
    ReceivePack,
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ServiceType::UploadPack => write!(f, "git-upload-pack"),
            ServiceType::ReceivePack => write!(f, "git-receive-pack"),
        }
    }
}

impl FromStr for ServiceType {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "git-upload-pack" => Ok(ServiceType::UploadPack),
            "git-receive-pack" => Ok(ServiceType::ReceivePack),
            _ => Err(TransportError::UnsupportedVcs(s.to_string())),
        }
    }
}

/// Capabilities a client cares about when reading an advertisement or
/// composing a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Capability {
    MultiAck,
    MultiAckDetailed,
    NoDone,
    SideBand,
    SideBand64k,
    ReportStatus,
    OfsDelta,
    ThinPack,
    Shallow,
    IncludeTag,
    DeleteRefs,
    NoProgress,
    Quiet,
    Atomic,
    Symref(String),
    ObjectFormat(String),
    Agent(String),
    Unknown(String),
}

impl FromStr for Capability {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix("agent=") {
            return Ok(Capability::Agent(rest.to_string()));
        }
        if let Some(rest) = s.strip_prefix("symref=") {
            return Ok(Capability::Symref(rest.to_string()));
        }
        if let Some(rest) = s.strip_prefix("object-format=") {
            return Ok(Capability::ObjectFormat(rest.to_string()));
        }

        match s {
            "multi_ack" => Ok(Capability::MultiAck),
            "multi_ack_detailed" => Ok(Capability::MultiAckDetailed),
            "no-done" => Ok(Capability::NoDone),
            "side-band" => Ok(Capability::SideBand),
            "side-band-64k" => Ok(Capability::SideBand64k),
            "report-status" => Ok(Capability::ReportStatus),
            "ofs-delta" => Ok(Capability::OfsDelta),
            "thin-pack" => Ok(Capability::ThinPack),
            "shallow" => Ok(Capability::Shallow),
            "include-tag" => Ok(Capability::IncludeTag),
            "delete-refs" => Ok(Capability::DeleteRefs),
            "no-progress" => Ok(Capability::NoProgress),
            "quiet" => Ok(Capability::Quiet),
            "atomic" => Ok(Capability::Atomic),
            _ => Ok(Capability::Unknown(s.to_string())),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::MultiAck => write!(f, "multi_ack"),
            Capability::MultiAckDetailed => write!(f, "multi_ack_detailed"),
            Capability::NoDone => write!(f, "no-done"),
            Capability::SideBand => write!(f, "side-band"),
            Capability::SideBand64k => write!(f, "side-band-64k"),
            Capability::ReportStatus => write!(f, "report-status"),
            Capability::OfsDelta => write!(f, "ofs-delta"),
            Capability::ThinPack => write!(f, "thin-pack"),
            Capability::Shallow => write!(f, "shallow"),
            Capability::IncludeTag => write!(f, "include-tag"),
            Capability::DeleteRefs => write!(f, "delete-refs"),
            Capability::NoProgress => write!(f, "no-progress"),
            Capability::Quiet => write!(f, "quiet"),
            Capability::Atomic => write!(f, "atomic"),
            Capability::Symref(value) => write!(f, "symref={value}"),
            Capability::ObjectFormat(format) => write!(f, "object-format={format}"),
            Capability::Agent(agent) => write!(f, "agent={agent}"),
            Capability::Unknown(s) => write!(f, "{s}"),
        }
    }
}

/// Git reference information
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GitRef {
    pub name: String,
    pub hash: ObjectHash,
}

/// Reference update sent to `git-receive-pack`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefCommand {
    pub old_hash: ObjectHash,
    pub new_hash: ObjectHash,
    pub ref_name: String,
    pub status: CommandStatus,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandStatus {
    Pending,
    Success,
    Failed,
}

impl RefCommand {
    pub fn new(old_hash: ObjectHash, new_hash: ObjectHash, ref_name: String) -> Self {
        Self {
            old_hash,
            new_hash,
            ref_name,
            status: CommandStatus::Pending,
            error_message: None,
        }
    }

    pub fn failed(&mut self, error: String) {
        self.status = CommandStatus::Failed;
        self.error_message = Some(error);
    }

    pub fn success(&mut self) {
        self.status = CommandStatus::Success;
        self.error_message = None;
    }

    /// Wire form without capabilities: `<old> <new> <ref>`.
    pub fn to_line(&self) -> String {
        format!("{}{SP}{}{SP}{}", self.old_hash, self.new_hash, self.ref_name)
    }
}

/// Protocol constants
pub const LF: char = '\n';
pub const SP: char = ' ';
pub const NUL: char = '\0';
pub const PKT_LINE_END_MARKER: &[u8; 4] = b"0000";
/// Largest pkt-line git will send, length prefix included.
pub const MAX_PKT_LINE_LEN: usize = 65520;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_round_trip() {
        for s in [
            "multi_ack",
            "side-band-64k",
            "symref=HEAD:refs/heads/main",
            "agent=git/2.43",
            "x-custom",
        ] {
            let cap: Capability = s.parse().unwrap();
            assert_eq!(cap.to_string(), s);
        }
        assert_eq!(
            "report-status".parse::<Capability>().unwrap(),
            Capability::ReportStatus
        );
    }

    #[test]
    fn test_service_type_names() {
        assert_eq!(ServiceType::UploadPack.to_string(), "git-upload-pack");
        assert_eq!(
            "git-receive-pack".parse::<ServiceType>().unwrap(),
            ServiceType::ReceivePack
        );
        assert!(matches!(
            "hg-serve".parse::<ServiceType>(),
            Err(TransportError::UnsupportedVcs(_))
        ));
    }

    #[test]
    fn test_ref_command_line() {
        let a = ObjectHash::new(b"a");
        let create = RefCommand::new(ObjectHash::ZERO, a, "refs/heads/new".to_string());
        let delete = RefCommand::new(a, ObjectHash::ZERO, "refs/heads/old".to_string());
        assert_eq!(
            create.to_line(),
            format!("{} {} refs/heads/new", ObjectHash::ZERO, a)
        );
        assert_eq!(
            delete.to_line(),
            format!("{} {} refs/heads/old", a, ObjectHash::ZERO)
        );
    }

    #[test]
    fn test_ref_command_status() {
        let mut cmd = RefCommand::new(ObjectHash::ZERO, ObjectHash::new(b"a"), "r".to_string());
        cmd.failed("non-fast-forward".to_string());
        assert_eq!(cmd.status, CommandStatus::Failed);
        cmd.success();
        assert_eq!(cmd.status, CommandStatus::Success);
        assert!(cmd.error_message.is_none());
    }
}
