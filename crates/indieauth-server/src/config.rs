//! Configuration for the IndieAuth server.

use std::time::Duration;

use anyhow::{Context, bail};
use jsonwebtoken::Algorithm;
use url::Url;

use crate::models::{Scope, Scopes};

/// Configuration defaults.
pub mod defaults {
    use std::time::Duration;

    /// Public base URL when none is configured.
    pub const ISSUER: &str = "http://localhost:3000/";

    /// Access token lifetime (1 hour).
    pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(3600);

    /// Length of the random `jti` nonce in issued tokens.
    pub const NONCE_LENGTH: usize = 22;

    /// Authorization code lifetime (10 minutes).
    pub const CODE_TTL: Duration = Duration::from_secs(600);

    /// Ticket lifetime (10 minutes).
    pub const TICKET_TTL: Duration = Duration::from_secs(600);

    /// Store sweep interval.
    pub const GC_INTERVAL: Duration = Duration::from_secs(1);

    /// Outbound request timeout.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Outbound connection timeout.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Retries for transient outbound failures.
    pub const MAX_RETRIES: u32 = 2;

    /// HTTP listen port.
    pub const PORT: u16 = 3000;

    /// Upper bound for every configured lifetime (10 years).
    pub const MAX_LIFETIME: Duration = Duration::from_secs(10 * 365 * 24 * 3600);

    /// Authorization codes and tickets: characters of randomness.
    pub const CODE_LENGTH: usize = 32;

    /// User-Agent sent on discovery and ticket requests.
    pub const USER_AGENT: &str = concat!("indieauth-server/", env!("CARGO_PKG_VERSION"));

    /// Maximum idle connections kept per host.
    pub const MAX_KEEPALIVE: usize = 10;

    /// Idle connection expiry.
    pub const KEEPALIVE_EXPIRY: Duration = Duration::from_secs(30);
}

/// Server configuration.
#[derive(Clone)]
pub struct Config {
    /// Public base URL of this server; always ends with `/`.
    pub issuer: Url,

    /// Symmetric key used to sign access tokens.
    pub jwt_secret: String,

    /// HMAC algorithm used to sign access tokens.
    pub jwt_algorithm: Algorithm,

    /// Access token lifetime. Zero issues tokens without `exp`.
    pub access_token_ttl: Duration,

    /// Length of the random `jti` nonce.
    pub nonce_length: usize,

    /// Authorization code lifetime.
    pub code_ttl: Duration,

    /// Ticket lifetime.
    pub ticket_ttl: Duration,

    /// Interval between store sweeps.
    pub gc_interval: Duration,

    /// Scope of tokens minted for exchanged tickets.
    pub ticket_scope: Scopes,

    /// Outbound request timeout.
    pub request_timeout: Duration,

    /// Outbound connection timeout.
    pub connect_timeout: Duration,

    /// Retries for transient outbound failures.
    pub max_retries: u32,

    /// Password required on consent decisions (optional).
    pub auth_token: Option<String>,

    /// HTTP listen port.
    pub port: u16,
}

impl Config {
    /// Create a configuration with defaults for everything but the issuer
    /// and signing secret.
    #[must_use]
    pub fn new(issuer: Url, jwt_secret: impl Into<String>) -> Self {
        Self {
            issuer: with_trailing_slash(issuer),
            jwt_secret: jwt_secret.into(),
            jwt_algorithm: Algorithm::HS256,
            access_token_ttl: defaults::ACCESS_TOKEN_TTL,
            nonce_length: defaults::NONCE_LENGTH,
            code_ttl: defaults::CODE_TTL,
            ticket_ttl: defaults::TICKET_TTL,
            gc_interval: defaults::GC_INTERVAL,
            ticket_scope: Scopes::from(vec![Scope::Read]),
            request_timeout: defaults::REQUEST_TIMEOUT,
            connect_timeout: defaults::CONNECT_TIMEOUT,
            max_retries: defaults::MAX_RETRIES,
            auth_token: None,
            port: defaults::PORT,
        }
    }

    /// Create a test configuration: fixed secret, short timeouts, no retries.
    #[must_use]
    pub fn for_testing(issuer: &str) -> Self {
        let issuer = Url::parse(issuer).unwrap_or_else(|_| default_issuer());
        Self {
            request_timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(1),
            max_retries: 0,
            gc_interval: Duration::from_millis(50),
            ..Self::new(issuer, "test-secret-0123456789abcdef0123456789abcdef")
        }
    }

    /// Create configuration from environment variables (`.env` honoured).
    ///
    /// `INDIEAUTH_JWT_SECRET` is required; every other `INDIEAUTH_*`
    /// variable falls back to [`defaults`].
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let secret = std::env::var("INDIEAUTH_JWT_SECRET")
            .context("INDIEAUTH_JWT_SECRET must be set")?;
        let issuer = match std::env::var("INDIEAUTH_ISSUER") {
            Ok(raw) => Url::parse(&raw).with_context(|| format!("invalid INDIEAUTH_ISSUER {raw:?}"))?,
            Err(_) => default_issuer(),
        };

        let mut config = Self::new(issuer, secret);
        if let Some(raw) = var("INDIEAUTH_JWT_ALGORITHM") {
            config.jwt_algorithm = parse_algorithm(&raw)?;
        }
        if let Some(ttl) = secs("INDIEAUTH_ACCESS_TOKEN_TTL")? {
            config.access_token_ttl = ttl;
        }
        if let Some(ttl) = secs("INDIEAUTH_CODE_TTL")? {
            config.code_ttl = ttl;
        }
        if let Some(ttl) = secs("INDIEAUTH_TICKET_TTL")? {
            config.ticket_ttl = ttl;
        }
        if let Some(raw) = var("INDIEAUTH_TICKET_SCOPE") {
            config.ticket_scope = Scopes::parse(&raw)?;
        }
        if let Some(raw) = var("INDIEAUTH_NONCE_LENGTH") {
            config.nonce_length = raw.parse().context("invalid INDIEAUTH_NONCE_LENGTH")?;
        }
        config.auth_token = var("INDIEAUTH_AUTH_TOKEN");

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the server cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.jwt_secret.len() < 32 {
            bail!("JWT secret must be at least 32 bytes");
        }
        if !matches!(self.issuer.scheme(), "http" | "https") {
            bail!("issuer must be an http or https URL");
        }
        if self.nonce_length < 16 {
            bail!("nonce length must be at least 16");
        }
        if self.code_ttl.is_zero() || self.ticket_ttl.is_zero() {
            bail!("code and ticket lifetimes must be positive");
        }
        for (name, ttl) in [
            ("access token", self.access_token_ttl),
            ("code", self.code_ttl),
            ("ticket", self.ticket_ttl),
        ] {
            if ttl > defaults::MAX_LIFETIME {
                bail!("{name} lifetime must not exceed {}s", defaults::MAX_LIFETIME.as_secs());
            }
        }
        Ok(())
    }

    /// Code TTL as a calendar duration.
    #[must_use]
    pub fn code_lifetime(&self) -> chrono::Duration {
        to_chrono(self.code_ttl)
    }

    /// Ticket TTL as a calendar duration.
    #[must_use]
    pub fn ticket_lifetime(&self) -> chrono::Duration {
        to_chrono(self.ticket_ttl)
    }

    /// Replace the issuer, normalizing it to end with `/`.
    #[must_use]
    pub fn with_issuer(mut self, issuer: Url) -> Self {
        self.issuer = with_trailing_slash(issuer);
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(default_issuer(), crate::random::token())
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("issuer", &self.issuer.as_str())
            .field("jwt_algorithm", &self.jwt_algorithm)
            .field("access_token_ttl", &self.access_token_ttl)
            .field("code_ttl", &self.code_ttl)
            .field("ticket_ttl", &self.ticket_ttl)
            .field("ticket_scope", &self.ticket_scope.to_wire())
            .field("has_auth_token", &self.auth_token.is_some())
            .field("port", &self.port)
            .finish()
    }
}

/// Parse an HMAC algorithm name (`HS256`, `HS384`, `HS512`).
pub fn parse_algorithm(raw: &str) -> anyhow::Result<Algorithm> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => bail!("unsupported JWT algorithm {other:?}; expected HS256, HS384 or HS512"),
    }
}

fn default_issuer() -> Url {
    Url::parse(defaults::ISSUER).expect("default issuer is a valid URL")
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn secs(name: &str) -> anyhow::Result<Option<Duration>> {
    var(name)
        .map(|raw| raw.trim().parse::<u64>().map(Duration::from_secs).with_context(|| format!("invalid {name}")))
        .transpose()
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}
