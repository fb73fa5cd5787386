//! Error types for the IndieAuth server.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.
//! Every layer has its own error enum; all of them collapse into [`OAuthError`],
//! the `{error, error_description, error_uri}` object returned to HTTP callers.

use std::time::Duration;

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Errors from the outbound HTTP transport.
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    /// HTTP transport error (connection, DNS, TLS, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Middleware error
    #[error("Middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    /// Request timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The remote answered with a non-success status
    #[error("Unexpected status {status} from {url}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// JSON parsing error
    #[error("Failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    /// Form body could not be encoded
    #[error("Failed to encode form: {0}")]
    Encode(#[from] serde_urlencoded::ser::Error),
}

impl ClientError {
    /// Create an unexpected status error.
    #[must_use]
    pub fn unexpected_status(status: u16, url: impl Into<String>) -> Self {
        Self::UnexpectedStatus { status, url: url.into() }
    }

    /// Returns true if the request never completed within its deadline.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Errors from endpoint discovery.
#[derive(thiserror::Error, Debug)]
pub enum DiscoveryError {
    /// The target was fetched but advertises no value for the relation.
    #[error("no {relation} advertised by {url}")]
    EndpointNotFound {
        /// Requested relation, e.g. `token_endpoint`
        relation: String,
        /// Profile or resource URL that was inspected
        url: String,
    },

    /// An advertised value could not be resolved to an absolute URL.
    #[error("invalid {relation} value {value:?}: {source}")]
    InvalidEndpoint {
        /// Relation the value was declared for
        relation: String,
        /// Raw advertised value
        value: String,
        /// Parse failure
        source: url::ParseError,
    },

    /// Fetching the target or its metadata document failed.
    #[error("discovery request failed: {0}")]
    Client(#[from] ClientError),
}

impl DiscoveryError {
    /// Create an endpoint-not-found error.
    #[must_use]
    pub fn not_found(relation: impl Into<String>, url: impl Into<String>) -> Self {
        Self::EndpointNotFound { relation: relation.into(), url: url.into() }
    }

    /// Returns true if discovery completed but found nothing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::EndpointNotFound { .. })
    }
}

/// A `client_id` or `me` URL rejected by the identifier rules.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// Not an absolute URL.
    #[error("not an absolute URL: {0}")]
    Malformed(#[from] url::ParseError),

    /// Scheme other than `http` or `https`.
    #[error("scheme must be http or https, got {0:?}")]
    Scheme(String),

    /// Backslash or ASCII tab/newline, which URL parsing would rewrite or drop.
    #[error("must not contain {0:?}")]
    IllegalCharacter(char),

    /// Path contains a `.` or `..` segment.
    #[error("path must not contain single-dot or double-dot segments")]
    DotSegment,

    /// Fragment component present.
    #[error("must not contain a fragment")]
    Fragment,

    /// Username or password component present.
    #[error("must not contain a username or password")]
    UserInfo,

    /// Host is empty.
    #[error("host is required")]
    MissingHost,

    /// Explicit port on a profile URL.
    #[error("must not contain a port")]
    Port,

    /// IP literal on a profile URL.
    #[error("must be a domain name, not an IP address")]
    IpAddress,

    /// IP literal on a client URL that is not loopback.
    #[error("IP address {0} is not a loopback address")]
    NonLoopbackIp(String),
}

/// A wire value outside one of the closed protocol enums.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} {value:?}")]
pub struct UnknownVariant {
    /// Enum being parsed, e.g. `scope`
    pub kind: &'static str,
    /// Rejected value
    pub value: String,
}

impl UnknownVariant {
    #[must_use]
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self { kind, value: value.into() }
    }
}

/// Errors from PKCE construction and validation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PkceError {
    /// Unknown `code_challenge_method`.
    #[error("unsupported code_challenge_method {0:?}")]
    UnsupportedMethod(String),

    /// A challenge was supplied without a method.
    #[error("code_challenge_method is required with code_challenge")]
    MissingMethod,

    /// A method was supplied without a challenge.
    #[error("code_challenge is required with code_challenge_method")]
    MissingChallenge,

    /// Verifier is shorter than 43 or longer than 128 characters.
    #[error("code_verifier must be 43-128 characters, got {0}")]
    VerifierLength(usize),

    /// Verifier uses characters outside the unreserved set.
    #[error("code_verifier must use only [A-Za-z0-9-._~]")]
    VerifierCharacters,

    /// The session recorded a challenge but no verifier was presented.
    #[error("code_verifier is required")]
    MissingVerifier,

    /// Recomputed challenge differs from the recorded one.
    #[error("code_verifier does not match code_challenge")]
    Mismatch,
}

/// Errors from approving and redeeming authorization codes.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    /// Code unknown, already redeemed or expired.
    #[error("authorization code not found")]
    NotFound,

    /// Presented `client_id` differs from the one the code was issued to.
    #[error("client_id does not match the authorization code")]
    ClientMismatch,

    /// Presented `redirect_uri` differs from the one the code was issued for.
    #[error("redirect_uri does not match the authorization code")]
    RedirectMismatch,

    /// A verifier was sent for a code issued without a challenge.
    #[error("code_verifier sent for a code issued without code_challenge")]
    UnexpectedVerifier,

    /// A code without scopes only proves identity and cannot buy a token.
    #[error("authorization code carries no scope")]
    EmptyScope,

    /// `redirect_uri` is off the client's origin and not published by it.
    #[error("redirect_uri {0} is not registered by the client")]
    UnregisteredRedirect(String),

    /// PKCE verification failed.
    #[error(transparent)]
    Pkce(#[from] PkceError),

    /// Fetching the client's published redirect URIs failed.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// Session store failure.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            other => Self::Store(other),
        }
    }
}

/// Errors from session, ticket and revocation stores.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No entry under this key (never existed, already used, or expired).
    #[error("not found")]
    NotFound,

    /// An entry already exists under this key.
    #[error("duplicate key")]
    Duplicate,

    /// Storage engine failure.
    #[error("storage failure: {0}")]
    Backend(String),
}

/// Errors from token issuance and verification.
#[derive(thiserror::Error, Debug)]
pub enum TokenError {
    /// Token is on the revocation denylist.
    #[error("token has been revoked")]
    Revoked,

    /// Token is past its `exp` claim.
    #[error("token has expired")]
    Expired,

    /// Token failed to parse or its signature does not verify.
    #[error("invalid token: {0}")]
    Invalid(jsonwebtoken::errors::Error),

    /// Signature verified but the claims are unusable.
    #[error("invalid token claims: {0}")]
    Claims(String),

    /// Token could not be signed.
    #[error("failed to sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),

    /// Revocation store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TokenError {
    /// Returns true if the token was deliberately revoked.
    #[must_use]
    pub const fn is_revoked(&self) -> bool {
        matches!(self, Self::Revoked)
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Invalid(err),
        }
    }
}

/// Errors from the Ticket-Auth delegation flow.
#[derive(thiserror::Error, Debug)]
pub enum TicketError {
    /// The subject does not advertise a ticket endpoint.
    #[error("{subject} does not advertise a ticket_endpoint")]
    NoTicketEndpoint {
        /// Ticket subject
        subject: String,
    },

    /// Discovery failed for another reason (transport, bad value).
    #[error(transparent)]
    Discovery(DiscoveryError),

    /// Posting the ticket or the redemption request failed.
    #[error("ticket delivery failed: {0}")]
    Delivery(#[from] ClientError),

    /// Ticket unknown, already exchanged or expired.
    #[error("ticket not found")]
    NotFound,

    /// The resource owner's token endpoint answered with something unusable.
    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    /// Ticket fields failed validation.
    #[error("invalid ticket {field}: {source}")]
    InvalidField {
        /// Offending field
        field: &'static str,
        /// Validation failure
        source: IdentifierError,
    },

    /// Ticket store failure.
    #[error(transparent)]
    Store(StoreError),

    /// Minting the exchanged token failed.
    #[error(transparent)]
    Token(#[from] TokenError),
}

impl From<StoreError> for TicketError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            other => Self::Store(other),
        }
    }
}

// ─── Protocol errors ─────────────────────────────────────────────────────────

/// Protocol error codes surfaced to HTTP callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or missing field, identifier or PKCE shape violation.
    InvalidRequest,
    /// Code or ticket not found, expired, used, or bound to another party.
    InvalidGrant,
    /// Bearer token invalid, expired or revoked.
    InvalidToken,
    /// Client is not allowed to use this flow.
    UnauthorizedClient,
    /// The user denied the request.
    AccessDenied,
    /// `response_type` other than `code`.
    UnsupportedResponseType,
    /// `grant_type` this server does not implement.
    UnsupportedGrantType,
    /// Discovery, network or signing failure.
    ServerError,
}

impl ErrorKind {
    /// Wire value of the error code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidGrant => "invalid_grant",
            Self::InvalidToken => "invalid_token",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::AccessDenied => "access_denied",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::ServerError => "server_error",
        }
    }

    /// HTTP status used when this error is returned directly.
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::InvalidToken | Self::UnauthorizedClient => StatusCode::UNAUTHORIZED,
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protocol-level error, serialized as `{error, error_description, error_uri}`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{kind}: {description}")]
pub struct OAuthError {
    /// Error code.
    #[serde(rename = "error")]
    pub kind: ErrorKind,
    /// Human-readable explanation.
    #[serde(rename = "error_description")]
    pub description: String,
    /// Optional link to documentation.
    #[serde(rename = "error_uri", skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

impl OAuthError {
    /// Create an error of the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind, description: impl Into<String>) -> Self {
        Self { kind, description: description.into(), uri: None }
    }

    /// Attach an `error_uri`.
    #[must_use]
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    #[must_use]
    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, description)
    }

    #[must_use]
    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidGrant, description)
    }

    #[must_use]
    pub fn invalid_token(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidToken, description)
    }

    #[must_use]
    pub fn unauthorized_client(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnauthorizedClient, description)
    }

    #[must_use]
    pub fn access_denied(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::AccessDenied, description)
    }

    #[must_use]
    pub fn unsupported_response_type(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedResponseType, description)
    }

    #[must_use]
    pub fn unsupported_grant_type(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedGrantType, description)
    }

    #[must_use]
    pub fn server_error(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServerError, description)
    }

    /// Invalid request naming the field whose identifier rule failed.
    #[must_use]
    pub fn invalid_identifier(field: &str, err: &IdentifierError) -> Self {
        Self::invalid_request(format!("invalid {field}: {err}"))
    }

    /// Code or ticket lookup failure. Deliberately identical for unknown,
    /// used and expired values.
    #[must_use]
    pub fn unknown_grant() -> Self {
        Self::invalid_grant("the provided grant is invalid, expired or already used")
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let status = self.kind.status();
        let body = if self.kind == ErrorKind::ServerError {
            tracing::error!(error = %self.description, "Request failed with server error");
            Self { description: "internal server error".to_owned(), ..self }
        } else {
            self
        };

        let is_token_error = body.kind == ErrorKind::InvalidToken;
        let mut response = (status, Json(body)).into_response();
        if is_token_error {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(r#"Bearer error="invalid_token""#),
            );
        }
        response
    }
}

impl From<UnknownVariant> for OAuthError {
    fn from(err: UnknownVariant) -> Self {
        match err.kind {
            "response_type" => Self::unsupported_response_type(err.to_string()),
            "grant_type" => Self::unsupported_grant_type(err.to_string()),
            _ => Self::invalid_request(err.to_string()),
        }
    }
}

impl From<PkceError> for OAuthError {
    fn from(err: PkceError) -> Self {
        match err {
            PkceError::Mismatch | PkceError::MissingVerifier => Self::invalid_grant(err.to_string()),
            _ => Self::invalid_request(err.to_string()),
        }
    }
}

impl From<StoreError> for OAuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::unknown_grant(),
            other => Self::server_error(other.to_string()),
        }
    }
}

impl From<SessionError> for OAuthError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound => Self::unknown_grant(),
            SessionError::ClientMismatch
            | SessionError::RedirectMismatch
            | SessionError::UnexpectedVerifier
            | SessionError::EmptyScope => Self::invalid_grant(err.to_string()),
            SessionError::UnregisteredRedirect(_) => Self::invalid_request(err.to_string()),
            SessionError::Pkce(inner) => inner.into(),
            SessionError::Discovery(DiscoveryError::EndpointNotFound { .. }) => {
                Self::invalid_request("client does not publish any redirect_uri")
            }
            SessionError::Discovery(inner) => inner.into(),
            SessionError::Store(inner) => inner.into(),
        }
    }
}

impl From<TokenError> for OAuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Revoked
            | TokenError::Expired
            | TokenError::Invalid(_)
            | TokenError::Claims(_) => Self::invalid_token(err.to_string()),
            TokenError::Signing(_) | TokenError::Store(_) => Self::server_error(err.to_string()),
        }
    }
}

impl From<DiscoveryError> for OAuthError {
    fn from(err: DiscoveryError) -> Self {
        match err {
            DiscoveryError::EndpointNotFound { .. } | DiscoveryError::InvalidEndpoint { .. } => {
                Self::invalid_request(err.to_string())
            }
            DiscoveryError::Client(_) => Self::server_error(err.to_string()),
        }
    }
}

impl From<TicketError> for OAuthError {
    fn from(err: TicketError) -> Self {
        match err {
            TicketError::NotFound => Self::unknown_grant(),
            TicketError::NoTicketEndpoint { .. } | TicketError::InvalidField { .. } => {
                Self::invalid_request(err.to_string())
            }
            TicketError::Discovery(inner) => inner.into(),
            TicketError::Token(inner) => inner.into(),
            TicketError::Store(inner) => inner.into(),
            TicketError::Delivery(_) | TicketError::InvalidResponse(_) => {
                Self::server_error(err.to_string())
            }
        }
    }
}

/// Result type alias for transport operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Result type alias for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Result type alias for token operations.
pub type TokenResult<T> = Result<T, TokenError>;

/// Result type alias for ticket operations.
pub type TicketResult<T> = Result<T, TicketError>;
