//! Client and user identifiers.
//!
//! Both are absolute `http`/`https` URLs with a path free of dot segments,
//! no fragment and no userinfo. They differ only on the host:
//!
//! | Rule                | `ClientId`            | `Me`      |
//! |---------------------|-----------------------|-----------|
//! | explicit port       | allowed               | rejected  |
//! | IP literal host     | loopback only         | rejected  |
//!
//! Values are immutable once parsed; equality is exact comparison of the
//! canonical string.

use std::net::{Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};
use url::{Host, Url};

use crate::error::IdentifierError;

/// URL identifying a requesting application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClientId(Url);

/// URL identifying a user (their personal domain).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Me(Url);

impl ClientId {
    /// Parse and validate a client identifier.
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        let url = parse_common(raw)?;

        match url.host() {
            Some(Host::Ipv4(ip)) if ip != Ipv4Addr::LOCALHOST => {
                return Err(IdentifierError::NonLoopbackIp(ip.to_string()));
            }
            Some(Host::Ipv6(ip)) if ip != Ipv6Addr::LOCALHOST => {
                return Err(IdentifierError::NonLoopbackIp(ip.to_string()));
            }
            _ => {}
        }

        Ok(Self(url))
    }

    /// Canonical string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Underlying URL.
    #[must_use]
    pub const fn as_url(&self) -> &Url {
        &self.0
    }

    /// Whether `url` lives on the same scheme, host and port as this client.
    ///
    /// Redirects outside the client's origin must be published by the client.
    #[must_use]
    pub fn same_origin(&self, url: &Url) -> bool {
        self.0.origin() == url.origin()
    }
}

impl Me {
    /// Parse and validate a user profile URL.
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        let url = parse_common(raw)?;

        // `Url::port` hides the scheme's default port, so look at the raw authority.
        if url.port().is_some() || has_explicit_port(raw) {
            return Err(IdentifierError::Port);
        }
        if matches!(url.host(), Some(Host::Ipv4(_) | Host::Ipv6(_))) {
            return Err(IdentifierError::IpAddress);
        }

        Ok(Self(url))
    }

    /// Canonical string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Underlying URL.
    #[must_use]
    pub const fn as_url(&self) -> &Url {
        &self.0
    }

    /// Whether `url` is served from this profile's origin.
    #[must_use]
    pub fn owns(&self, url: &Url) -> bool {
        self.0.origin() == url.origin()
    }
}

/// Rules shared by both identifiers.
fn parse_common(raw: &str) -> Result<Url, IdentifierError> {
    if let Some(c) = raw.chars().find(|c| matches!(c, '\\' | '\t' | '\r' | '\n')) {
        return Err(IdentifierError::IllegalCharacter(c));
    }
    // `Url::parse` resolves dot segments, so they must be caught on the raw input.
    if raw_path(raw).split('/').any(is_dot_segment) {
        return Err(IdentifierError::DotSegment);
    }

    let url = Url::parse(raw)?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(IdentifierError::Scheme(url.scheme().to_owned()));
    }
    if url.fragment().is_some() {
        return Err(IdentifierError::Fragment);
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(IdentifierError::UserInfo);
    }
    match url.host() {
        None => return Err(IdentifierError::MissingHost),
        Some(Host::Domain(domain)) if domain.is_empty() => {
            return Err(IdentifierError::MissingHost);
        }
        _ => {}
    }

    Ok(url)
}

/// Path portion of a raw `scheme://authority/path?query#fragment` string.
fn raw_path(raw: &str) -> &str {
    let Some((_, rest)) = raw.split_once("://") else {
        return "";
    };
    let Some(start) = rest.find(['/', '?', '#']) else {
        return "";
    };
    let path = &rest[start..];
    let end = path.find(['?', '#']).unwrap_or(path.len());
    &path[..end]
}

/// Whether the raw authority carries a `:port` after the host, even an empty
/// or default one.
fn has_explicit_port(raw: &str) -> bool {
    let Some((_, rest)) = raw.split_once("://") else {
        return false;
    };
    let authority = &rest[..rest.find(['/', '?', '#']).unwrap_or(rest.len())];
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, hp)| hp);
    let after_host = match host_port.strip_prefix('[') {
        Some(v6) => v6.split_once(']').map_or("", |(_, tail)| tail),
        None => host_port,
    };
    after_host.contains(':')
}

fn is_dot_segment(segment: &str) -> bool {
    matches!(segment.to_ascii_lowercase().as_str(), "." | ".." | "%2e" | "%2e%2e" | ".%2e" | "%2e.")
}

macro_rules! identifier_conversions {
    ($ty:ident) => {
        impl std::str::FromStr for $ty {
            type Err = IdentifierError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $ty {
            type Error = IdentifierError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.0.into()
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

identifier_conversions!(ClientId);
identifier_conversions!(Me);
