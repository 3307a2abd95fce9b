//! Remote addresses understood by the SSH transport.
//!
//! Accepted forms:
//!
//! ```text
//! ssh://[user@]host[:port]/path
//! git+ssh://... / ssh+git://...
//! [user@]host:path                (scp-like)
//! ```

use std::{fmt, str::FromStr};

use super::types::TransportError;

const SSH_SCHEMES: &[&str] = &["ssh", "git+ssh", "ssh+git"];
const OTHER_VCS_SCHEMES: &[&str] = &["svn", "svn+ssh", "hg", "hg+ssh", "bzr", "bzr+ssh", "cvs"];

/// Parsed remote address. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub protocol: String,
    pub user: Option<String>,
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
}

impl Endpoint {
    /// `host:port`, filling in `default_port` when the address named none.
    pub fn host_with_port(&self, default_port: u16) -> (String, u16) {
        (self.host.clone(), self.port.unwrap_or(default_port))
    }

    fn parse_url(scheme: &str, rest: &str) -> Result<Endpoint, TransportError> {
        let invalid = |why: &str| TransportError::InvalidEndpoint(format!("{scheme}://{rest}: {why}"));

        let (authority, path) = match rest.find('/') {
            Some(i) => rest.split_at(i),
            None => return Err(invalid("missing repository path")),
        };
        if path.len() <= 1 {
            return Err(invalid("missing repository path"));
        }

        let (user, host_port) = split_user(authority);
        let (host, port) = if let Some(bracketed) = host_port.strip_prefix('[') {
            // [ipv6]:port
            let end = bracketed.find(']').ok_or_else(|| invalid("unterminated IPv6 host"))?;
            let port = match &bracketed[end + 1..] {
                "" => None,
                p => Some(p.strip_prefix(':').ok_or_else(|| invalid("bad port"))?),
            };
            (&bracketed[..end], port)
        } else {
            match host_port.rsplit_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (host_port, None),
            }
        };
        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        // `host:` with nothing after the colon means the default port
        let port = match port {
            Some("") | None => None,
            Some(p) => Some(p.parse::<u16>().map_err(|_| invalid("bad port"))?),
        };

        Ok(Endpoint {
            protocol: scheme.to_string(),
            user: user.map(str::to_string),
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }

    fn parse_scp_like(s: &str) -> Result<Endpoint, TransportError> {
        let invalid = |why: &str| TransportError::InvalidEndpoint(format!("{s}: {why}"));

        let (authority, path) = s.split_once(':').ok_or_else(|| invalid("not a remote address"))?;
        if authority.contains('/') {
            return Err(invalid("local paths are not supported"));
        }
        let (user, host) = split_user(authority);
        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        if path.is_empty() {
            return Err(invalid("missing repository path"));
        }

        Ok(Endpoint {
            protocol: "ssh".to_string(),
            user: user.map(str::to_string),
            host: host.to_string(),
            port: None,
            path: path.to_string(),
        })
    }
}

fn split_user(authority: &str) -> (Option<&str>, &str) {
    match authority.rsplit_once('@') {
        Some((user, host)) if !user.is_empty() => (Some(user), host),
        Some((_, host)) => (None, host),
        None => (None, authority),
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once("://") {
            Some((scheme, rest)) => {
                let scheme = scheme.to_ascii_lowercase();
                if OTHER_VCS_SCHEMES.contains(&scheme.as_str()) {
                    return Err(TransportError::UnsupportedVcs(scheme));
                }
                if !SSH_SCHEMES.contains(&scheme.as_str()) {
                    return Err(TransportError::InvalidEndpoint(format!(
                        "unsupported scheme `{scheme}`"
                    )));
                }
                Endpoint::parse_url(&scheme, rest)
            }
            None => Endpoint::parse_scp_like(s),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://", self.protocol)?;
        if let Some(user) = &self.user {
            write!(f, "{user}@")?;
        }
        if self.host.contains(':') {
            write!(f, "[{}]", self.host)?;
        } else {
            write!(f, "{}", self.host)?;
        }
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        if !self.path.starts_with('/') {
            write!(f, "/")?;
        }
        write!(f, "{}", self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ssh_url() {
        let ep: Endpoint = "ssh://git@github.com:2222/org/repo.git".parse().unwrap();
        assert_eq!(ep.protocol, "ssh");
        assert_eq!(ep.user.as_deref(), Some("git"));
        assert_eq!(ep.host, "github.com");
        assert_eq!(ep.port, Some(2222));
        assert_eq!(ep.path, "/org/repo.git");
        assert_eq!(ep.to_string(), "ssh://git@github.com:2222/org/repo.git");
    }

    #[test]
    fn test_default_port() {
        let ep: Endpoint = "ssh://example.org/repo".parse().unwrap();
        assert_eq!(ep.user, None);
        assert_eq!(ep.host_with_port(22), ("example.org".to_string(), 22));
    }

    #[test]
    fn test_empty_port_uses_default() {
        let ep: Endpoint = "ssh://host:/repo".parse().unwrap();
        assert_eq!(ep.host, "host");
        assert_eq!(ep.port, None);
        assert_eq!(ep.path, "/repo");
        assert_eq!(ep.host_with_port(22), ("host".to_string(), 22));

        let ep: Endpoint = "ssh://[::1]:/repo".parse().unwrap();
        assert_eq!(ep.host, "::1");
        assert_eq!(ep.port, None);
    }

    #[test]
    fn test_parse_ipv6_host() {
        let ep: Endpoint = "ssh://[::1]:2022/repo".parse().unwrap();
        assert_eq!(ep.host, "::1");
        assert_eq!(ep.port, Some(2022));
        assert_eq!(ep.to_string(), "ssh://[::1]:2022/repo");
    }

    #[test]
    fn test_parse_scp_like() {
        let ep: Endpoint = "git@github.com:src-d/go-git.git".parse().unwrap();
        assert_eq!(ep.protocol, "ssh");
        assert_eq!(ep.user.as_deref(), Some("git"));
        assert_eq!(ep.host, "github.com");
        assert_eq!(ep.port, None);
        assert_eq!(ep.path, "src-d/go-git.git");
        assert_eq!(ep.to_string(), "ssh://git@github.com/src-d/go-git.git");
    }

    #[test]
    fn test_other_vcs_rejected() {
        assert!(matches!(
            "svn+ssh://host/repo".parse::<Endpoint>(),
            Err(TransportError::UnsupportedVcs(_))
        ));
        assert!(matches!(
            "hg://host/repo".parse::<Endpoint>(),
            Err(TransportError::UnsupportedVcs(_))
        ));
    }

    #[test]
    fn test_invalid_endpoints() {
        for s in [
            "https://github.com/org/repo",
            "ssh://host",
            "ssh://host/",
            "ssh://:22/repo",
            "ssh://host:notaport/repo",
            "./local/path:x",
            "host:",
            "plainword",
        ] {
            assert!(
                matches!(s.parse::<Endpoint>(), Err(TransportError::InvalidEndpoint(_))),
                "expected `{s}` to be rejected"
            );
        }
    }
}
