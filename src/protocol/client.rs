//! Entry point that hands out fetch and send sessions sharing one
//! configuration and one connector.
use std::sync::Arc;

use super::{
    endpoint::Endpoint,
    pack::{FetchPackSession, SendPackSession},
    ssh::{Connector, SshConnector},
    types::TransportError,
};
use crate::config::TransportConfig;

#[derive(Clone)]
pub struct Client {
    config: TransportConfig,
    connector: Arc<dyn Connector>,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// SSH client with the default configuration.
    pub fn new() -> Self {
        Self::with_config(TransportConfig::default())
    }

    pub fn with_config(config: TransportConfig) -> Self {
        let connector = Arc::new(SshConnector::new(&config));
        Self { config, connector }
    }

    /// Client dialing through a custom connector, e.g. an in-process remote.
    pub fn with_connector(config: TransportConfig, connector: Arc<dyn Connector>) -> Self {
        Self { config, connector }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn new_fetch_pack_session(
        &self,
        endpoint: Endpoint,
    ) -> Result<FetchPackSession, TransportError> {
        FetchPackSession::new(endpoint, self.config.clone(), self.connector.clone())
    }

    pub fn new_send_pack_session(
        &self,
        endpoint: Endpoint,
    ) -> Result<SendPackSession, TransportError> {
        SendPackSession::new(endpoint, self.config.clone(), self.connector.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{session::SessionState, types::ServiceType};

    #[test]
    fn test_sessions_start_disconnected() {
        let client = Client::new();
        let endpoint: Endpoint = "git@github.com:org/repo.git".parse().unwrap();
        let fetch = client.new_fetch_pack_session(endpoint.clone()).unwrap();
        let send = client.new_send_pack_session(endpoint).unwrap();
        assert_eq!(fetch.service(), ServiceType::UploadPack);
        assert_eq!(send.service(), ServiceType::ReceivePack);
        assert_eq!(fetch.state(), SessionState::Disconnected);
        assert_eq!(send.session().endpoint().host, "github.com");
    }

    #[test]
    fn test_client_applies_allow_list() {
        let client = Client::with_config(TransportConfig {
            allowed_hosts: vec!["github.com".to_string()],
            ..Default::default()
        });
        let endpoint: Endpoint = "ssh://gitlab.com/org/repo.git".parse().unwrap();
        assert!(matches!(
            client.new_fetch_pack_session(endpoint),
            Err(TransportError::UnsupportedRepositoryHost(_))
        ));
    }
}
