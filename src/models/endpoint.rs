//! Server endpoint model

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use crate::error::{AppError, AppResult};

static HOSTNAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$")
        .expect("hostname pattern is valid")
});

static NUMERIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9.]+$").expect("numeric pattern is valid"));

/// A backend address that can be probed and used as the API origin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerEndpoint {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    /// Set when a health probe last succeeded against this address
    pub verified_at: Option<DateTime<Utc>>,
}

impl ServerEndpoint {
    /// Parse a candidate address.
    ///
    /// Accepts a full URL (`https://library.example.edu`), a `host:port`
    /// pair, or a bare host; missing parts come from the defaults.
    pub fn parse(candidate: &str, default_scheme: &str, default_port: u16) -> AppResult<Self> {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return Err(AppError::Configuration("Server address is empty".to_string()));
        }

        if candidate.contains("://") {
            let url = Url::parse(candidate)
                .map_err(|e| AppError::Configuration(format!("Invalid server URL '{}': {}", candidate, e)))?;
            let host = url
                .host_str()
                .ok_or_else(|| AppError::Configuration(format!("Server URL '{}' has no host", candidate)))?;
            if !is_valid_host(host) {
                return Err(AppError::Configuration(format!("Invalid server host '{}'", host)));
            }
            let port = url
                .port_or_known_default()
                .unwrap_or(default_port);
            return Ok(Self::new(url.scheme(), host, port));
        }

        let (host, port) = match candidate.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| AppError::Configuration(format!("Invalid port in '{}'", candidate)))?;
                (host, port)
            }
            None => (candidate, default_port),
        };

        if !is_valid_host(host) {
            return Err(AppError::Configuration(format!("Invalid server host '{}'", host)));
        }

        Ok(Self::new(default_scheme, host, port))
    }

    pub fn new(scheme: &str, host: &str, port: u16) -> Self {
        Self {
            scheme: scheme.to_lowercase(),
            host: host.to_lowercase(),
            port,
            verified_at: None,
        }
    }

    /// Origin of the endpoint, omitting the port when it is the scheme default
    pub fn origin(&self) -> String {
        let default_port = match self.scheme.as_str() {
            "http" => Some(80),
            "https" => Some(443),
            _ => None,
        };
        if default_port == Some(self.port) {
            format!("{}://{}", self.scheme, self.host)
        } else {
            format!("{}://{}:{}", self.scheme, self.host, self.port)
        }
    }

    /// Base URL for API calls under the given path prefix
    pub fn base_url(&self, api_prefix: &str) -> String {
        let prefix = api_prefix.trim_end_matches('/');
        if prefix.is_empty() {
            self.origin()
        } else if prefix.starts_with('/') {
            format!("{}{}", self.origin(), prefix)
        } else {
            format!("{}/{}", self.origin(), prefix)
        }
    }

    /// Same address, ignoring verification metadata
    pub fn same_address(&self, other: &ServerEndpoint) -> bool {
        self.scheme == other.scheme && self.host == other.host && self.port == other.port
    }

    pub fn verified_now(mut self) -> Self {
        self.verified_at = Some(Utc::now());
        self
    }
}

impl std::fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.origin())
    }
}

/// Dotted-quad IPv4 address or RFC 1123 hostname
pub fn is_valid_host(host: &str) -> bool {
    if host.is_empty() || host.len() > 253 {
        return false;
    }
    if NUMERIC_RE.is_match(host) {
        return host.parse::<Ipv4Addr>().is_ok();
    }
    HOSTNAME_RE.is_match(host)
}
