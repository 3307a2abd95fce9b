use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Settings for SSH transport sessions.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct TransportConfig {
    /// Port used when the endpoint does not name one.
    pub default_port: u16,
    pub connect_timeout_secs: u64,
    pub inactivity_timeout_secs: Option<u64>,
    /// Capacity of the in-process stdin/stdout pipes bound to a command channel.
    pub pipe_buffer_size: usize,
    /// Hosts a session may be opened against. Empty means any host.
    pub allowed_hosts: Vec<String>,
    /// Reject server keys not present in `~/.ssh/known_hosts`.
    pub strict_host_key_checking: bool,
    /// Agent socket for sessions without explicit credentials. Falls back to
    /// `SSH_AUTH_SOCK` when unset; an empty path disables the agent.
    pub agent_socket: Option<PathBuf>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            default_port: 22,
            connect_timeout_secs: 30,
            inactivity_timeout_secs: None,
            pipe_buffer_size: 64 * 1024,
            allowed_hosts: Vec::new(),
            strict_host_key_checking: false,
            agent_socket: None,
        }
    }
}

impl TransportConfig {
    pub fn is_host_allowed(&self, host: &str) -> bool {
        self.allowed_hosts.is_empty()
            || self
                .allowed_hosts
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(host))
    }
}

/// Settings for lazy tree traversal.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct TraversalConfig {
    /// Bound of the hand-off channel between the traversal producer and its consumer.
    pub channel_capacity: usize,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_config_partial_json() {
        let config: TransportConfig =
            serde_json::from_str(r#"{"default_port": 2222, "allowed_hosts": ["github.com"]}"#)
                .unwrap();
        assert_eq!(config.default_port, 2222);
        assert_eq!(config.connect_timeout_secs, 30);
        assert!(config.is_host_allowed("GitHub.com"));
        assert!(!config.is_host_allowed("gitlab.com"));
        assert!(config.agent_socket.is_none());
    }

    #[test]
    fn test_agent_socket_from_json() {
        let config: TransportConfig =
            serde_json::from_str(r#"{"agent_socket": "/run/user/1000/agent.sock"}"#).unwrap();
        assert_eq!(
            config.agent_socket,
            Some(PathBuf::from("/run/user/1000/agent.sock"))
        );
    }

    #[test]
    fn test_empty_allow_list_accepts_any_host() {
        let config = TransportConfig::default();
        assert!(config.is_host_allowed("example.org"));
    }

    #[test]
    fn test_traversal_config_default() {
        let config: TraversalConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.channel_capacity, 1);
    }
}
