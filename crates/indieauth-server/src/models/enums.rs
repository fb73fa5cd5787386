//! Closed enumerations for protocol wire values.
//!
//! Unknown values are rejected when parsed; nothing downstream ever sees an
//! "undefined" variant.

use serde::{Deserialize, Serialize};

use crate::error::UnknownVariant;

/// An access scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Access to the user's profile information.
    Profile,
    /// Access to the user's email address.
    Email,
    /// Create new posts.
    Create,
    /// Edit existing posts.
    Update,
    /// Delete posts.
    Delete,
    /// Upload to the media endpoint.
    Media,
    /// Read private resources.
    Read,
    /// Manage following list.
    Follow,
    /// Mute users.
    Mute,
    /// Block users.
    Block,
    /// Manage reader channels.
    Channels,
    /// Create drafts only.
    Draft,
    /// Restore deleted posts.
    Undelete,
}

impl Scope {
    /// Every scope, in declaration order.
    pub const ALL: [Self; 13] = [
        Self::Profile,
        Self::Email,
        Self::Create,
        Self::Update,
        Self::Delete,
        Self::Media,
        Self::Read,
        Self::Follow,
        Self::Mute,
        Self::Block,
        Self::Channels,
        Self::Draft,
        Self::Undelete,
    ];

    /// Wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Email => "email",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Media => "media",
            Self::Read => "read",
            Self::Follow => "follow",
            Self::Mute => "mute",
            Self::Block => "block",
            Self::Channels => "channels",
            Self::Draft => "draft",
            Self::Undelete => "undelete",
        }
    }
}

/// OAuth grant type accepted at the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Authorization code exchange.
    AuthorizationCode,
    /// Ticket-Auth ticket exchange.
    Ticket,
}

impl GrantType {
    pub const ALL: [Self; 2] = [Self::AuthorizationCode, Self::Ticket];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::Ticket => "ticket",
        }
    }
}

/// Authorization endpoint response type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Authorization code flow (the only supported one).
    #[default]
    Code,
}

impl ResponseType {
    pub const ALL: [Self; 1] = [Self::Code];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
        }
    }
}

/// Token endpoint action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Add the token to the revocation denylist.
    Revoke,
}

impl Action {
    pub const ALL: [Self; 1] = [Self::Revoke];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Revoke => "revoke",
        }
    }
}

/// Consent decision posted by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// User approved the request.
    Allow,
    /// User denied the request.
    Deny,
}

impl Decision {
    pub const ALL: [Self; 2] = [Self::Allow, Self::Deny];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }
}

/// Issued token type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenType {
    /// RFC 6750 bearer token.
    #[default]
    Bearer,
}

impl TokenType {
    pub const ALL: [Self; 1] = [Self::Bearer];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bearer => "Bearer",
        }
    }
}

macro_rules! wire_str {
    ($ty:ident, $kind:literal) => {
        impl std::str::FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .into_iter()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| UnknownVariant::new($kind, s))
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_str!(Scope, "scope");
wire_str!(GrantType, "grant_type");
wire_str!(ResponseType, "response_type");
wire_str!(Action, "action");
wire_str!(Decision, "authorize");
wire_str!(TokenType, "token_type");
