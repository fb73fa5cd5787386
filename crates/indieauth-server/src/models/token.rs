//! Access tokens, their JWT claims and wire responses.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::{ClientId, Me, Scopes, TokenType};

/// An issued access token together with the facts it was issued for.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    pub access_token: String,
    pub token_type: TokenType,
    pub client_id: ClientId,
    pub me: Me,
    pub scope: Scopes,
    pub issued_at: DateTime<Utc>,
    /// `None` for tokens that never expire.
    pub expires_at: Option<DateTime<Utc>>,
    /// Random unique token id (`jti` claim). Revocation is keyed by `access_token`.
    pub jti: String,
}

impl Token {
    /// Rebuild a token from verified claims.
    pub fn from_claims(access_token: impl Into<String>, claims: Claims) -> Result<Self, String> {
        let client_id = ClientId::parse(&claims.iss).map_err(|e| format!("iss: {e}"))?;
        let me = Me::parse(&claims.sub).map_err(|e| format!("sub: {e}"))?;
        let issued_at = Utc
            .timestamp_opt(claims.iat, 0)
            .single()
            .ok_or_else(|| format!("iat out of range: {}", claims.iat))?;
        let expires_at = match claims.exp {
            Some(exp) => Some(
                Utc.timestamp_opt(exp, 0)
                    .single()
                    .ok_or_else(|| format!("exp out of range: {exp}"))?,
            ),
            None => None,
        };

        Ok(Self {
            access_token: access_token.into(),
            token_type: TokenType::Bearer,
            client_id,
            me,
            scope: claims.scope,
            issued_at,
            expires_at,
            jti: claims.jti,
        })
    }

    /// Seconds until expiry, if the token expires.
    #[must_use]
    pub fn expires_in(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expires_at.map(|at| (at - now).num_seconds().max(0))
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("client_id", &self.client_id.as_str())
            .field("me", &self.me.as_str())
            .field("scope", &self.scope.to_wire())
            .field("expires_at", &self.expires_at)
            .field("jti", &self.jti)
            .finish()
    }
}

/// Signed JWT payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Client the token was issued to.
    pub iss: String,
    /// The user.
    pub sub: String,
    #[serde(default)]
    pub scope: Scopes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    pub iat: i64,
    pub jti: String,
}

/// Successful token endpoint response body.
///
/// Fields are kept as plain strings so responses from other servers parse
/// even when they use values this server would not issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub scope: String,
    pub me: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
}

impl TokenResponse {
    /// Response describing `token`, with `expires_in` relative to `now`.
    #[must_use]
    pub fn new(token: &Token, now: DateTime<Utc>) -> Self {
        Self {
            access_token: token.access_token.clone(),
            token_type: token.token_type.as_str().to_owned(),
            scope: token.scope.to_wire(),
            me: token.me.to_string(),
            expires_in: token.expires_in(now),
        }
    }
}

/// Body of `GET /token` and `POST /introspect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub me: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl TokenInfo {
    /// The answer for unknown, expired or revoked tokens.
    #[must_use]
    pub const fn inactive() -> Self {
        Self { active: false, me: None, client_id: None, scope: None, exp: None, iat: None }
    }
}

impl From<&Token> for TokenInfo {
    fn from(token: &Token) -> Self {
        Self {
            active: true,
            me: Some(token.me.to_string()),
            client_id: Some(token.client_id.to_string()),
            scope: Some(token.scope.to_wire()),
            exp: token.expires_at.map(|at| at.timestamp()),
            iat: Some(token.issued_at.timestamp()),
        }
    }
}
