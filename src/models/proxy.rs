use serde::{Deserialize, Serialize};

use crate::error::{Result, ScrapeError};

/// Basic-auth credential for an upstream proxy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyCredential {
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
}

/// How the client talks to the proxy itself
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyScheme {
    #[default]
    Http,
    Https,
}

impl ProxyScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyScheme::Http => "http",
            ProxyScheme::Https => "https",
        }
    }
}

/// Egress identity that outbound requests can be routed through
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyIdentity {
    /// `host:port`, unique within a pool
    pub id: String,
    #[serde(default)]
    pub scheme: ProxyScheme,
    pub host: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<ProxyCredential>,
}

impl ProxyIdentity {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        Self {
            id: format!("{}:{}", host, port),
            scheme: ProxyScheme::Http,
            host,
            port,
            credential: None,
        }
    }

    pub fn with_credential(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credential = Some(ProxyCredential {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn with_scheme(mut self, scheme: ProxyScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Parse `http[s]://[user:pass@]host:port`
    pub fn parse(raw: &str) -> Result<Self> {
        let url = url::Url::parse(raw.trim())
            .map_err(|e| ScrapeError::InvalidConfig(format!("invalid proxy URL '{}': {}", raw, e)))?;

        let scheme = match url.scheme() {
            "http" => ProxyScheme::Http,
            "https" => ProxyScheme::Https,
            other => {
                return Err(ScrapeError::InvalidConfig(format!(
                    "unsupported proxy scheme '{}' in '{}'",
                    other, raw
                )))
            }
        };

        let host = url
            .host_str()
            .ok_or_else(|| ScrapeError::InvalidConfig(format!("proxy URL '{}' has no host", raw)))?;
        let port = url.port_or_known_default().unwrap_or(80);

        let identity = Self::new(host, port).with_scheme(scheme);
        if url.username().is_empty() {
            Ok(identity)
        } else {
            Ok(identity.with_credential(url.username(), url.password().unwrap_or_default()))
        }
    }

    /// Proxy URL without credentials, suitable for the HTTP client
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.scheme.as_str(), self.host, self.port)
    }
}

impl std::fmt::Display for ProxyIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Pool change notification for observers
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyEvent {
    /// A new current identity was selected; `None` when proxying is disabled
    Rotated(Option<ProxyIdentity>),
    Added(ProxyIdentity),
    Removed(ProxyIdentity),
    Cleared,
}

impl ProxyEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ProxyEvent::Rotated(_) => "proxy-rotated",
            ProxyEvent::Added(_) => "proxy-added",
            ProxyEvent::Removed(_) => "proxy-removed",
            ProxyEvent::Cleared => "proxies-cleared",
        }
    }

    /// Identity the event refers to, if any
    pub fn identity(&self) -> Option<&ProxyIdentity> {
        match self {
            ProxyEvent::Rotated(p) => p.as_ref(),
            ProxyEvent::Added(p) | ProxyEvent::Removed(p) => Some(p),
            ProxyEvent::Cleared => None,
        }
    }
}
