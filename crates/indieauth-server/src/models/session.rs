//! Authorization-code sessions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{ClientId, Me, Scopes};
use crate::oauth::pkce::CodeChallenge;

/// An approved authorization request, keyed by its one-time `code`.
///
/// Created when the user allows a request; consumed once by code exchange or
/// reaped once older than the code TTL.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub code: String,
    pub client_id: ClientId,
    pub redirect_uri: Url,
    pub me: Me,
    pub scope: Scopes,
    #[serde(flatten, default, skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<CodeChallenge>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session is older than `ttl` at `now`.
    #[must_use]
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.created_at > ttl
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("client_id", &self.client_id.as_str())
            .field("redirect_uri", &self.redirect_uri.as_str())
            .field("me", &self.me.as_str())
            .field("scope", &self.scope.to_wire())
            .field("created_at", &self.created_at)
            .finish()
    }
}
