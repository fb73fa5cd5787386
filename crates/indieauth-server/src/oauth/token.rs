//! Stateless JWT access tokens with a revocation denylist.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crate::config::Config;
use crate::error::{TokenError, TokenResult};
use crate::models::{Claims, ClientId, Me, Scopes, Token, TokenInfo, TokenType};
use crate::random;
use crate::store::RevocationStore;

/// What to mint a token for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewToken {
    /// Party the token is issued to (`iss`).
    pub issuer: ClientId,
    /// The user (`sub`).
    pub subject: Me,
    pub scope: Scopes,
    /// Lifetime; `None` mints a token without `exp`.
    pub expiration: Option<Duration>,
}

/// Mints, verifies and revokes access tokens.
#[derive(Clone)]
pub struct TokenService {
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    nonce_length: usize,
    revocations: Arc<dyn RevocationStore>,
}

impl TokenService {
    #[must_use]
    pub fn new(config: &Config, revocations: Arc<dyn RevocationStore>) -> Self {
        let secret = config.jwt_secret.as_bytes();
        Self {
            algorithm: config.jwt_algorithm,
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: config.access_token_ttl,
            nonce_length: config.nonce_length,
            revocations,
        }
    }

    /// Mint a token with the configured lifetime.
    pub fn issue(&self, issuer: &ClientId, subject: &Me, scope: &Scopes) -> TokenResult<Token> {
        self.issue_with(NewToken {
            issuer: issuer.clone(),
            subject: subject.clone(),
            scope: scope.clone(),
            expiration: (!self.ttl.is_zero()).then_some(self.ttl),
        })
    }

    /// Mint a token from explicit options.
    pub fn issue_with(&self, options: NewToken) -> TokenResult<Token> {
        self.issue_at(options, Utc::now())
    }

    fn issue_at(&self, options: NewToken, now: DateTime<Utc>) -> TokenResult<Token> {
        // Claims carry whole seconds.
        let now = DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now);
        let expires_at = options
            .expiration
            .map(|ttl| {
                chrono::Duration::from_std(ttl)
                    .ok()
                    .and_then(|ttl| now.checked_add_signed(ttl))
                    .ok_or_else(|| TokenError::Claims(format!("expiration {ttl:?} out of range")))
            })
            .transpose()?;

        let claims = Claims {
            iss: options.issuer.to_string(),
            sub: options.subject.to_string(),
            scope: options.scope.clone(),
            exp: expires_at.map(|at| at.timestamp()),
            iat: now.timestamp(),
            jti: random::string(self.nonce_length, random::ALPHANUMERIC),
        };

        let access_token = encode(&Header::new(self.algorithm), &claims, &self.encoding)
            .map_err(TokenError::Signing)?;

        tracing::info!(
            client_id = %options.issuer,
            me = %options.subject,
            scope = %options.scope,
            "Access token issued"
        );

        Ok(Token {
            access_token,
            token_type: TokenType::Bearer,
            client_id: options.issuer,
            me: options.subject,
            scope: options.scope,
            issued_at: now,
            expires_at,
            jti: claims.jti,
        })
    }

    /// Verify an access token.
    ///
    /// The denylist is consulted first, so a revoked token reports
    /// [`TokenError::Revoked`] even if it has also expired.
    pub async fn verify(&self, access_token: &str) -> TokenResult<Token> {
        if self.revocations.get(access_token).await?.is_some() {
            return Err(TokenError::Revoked);
        }
        self.decode(access_token, true)
    }

    /// Add a token to the denylist and return what it was.
    ///
    /// The signature must verify, but an expired token may still be revoked.
    /// Revoking twice is not an error.
    pub async fn revoke(&self, access_token: &str) -> TokenResult<Token> {
        let token = self.decode(access_token, false)?;
        self.revocations.create(token.clone()).await?;
        tracing::info!(client_id = %token.client_id, me = %token.me, "Access token revoked");
        Ok(token)
    }

    /// RFC 7662-style description of a token; any failure is inactive.
    pub async fn introspect(&self, access_token: &str) -> TokenInfo {
        match self.verify(access_token).await {
            Ok(token) => TokenInfo::from(&token),
            Err(e) => {
                tracing::debug!(error = %e, "Introspected inactive token");
                TokenInfo::inactive()
            }
        }
    }

    fn decode(&self, access_token: &str, check_expiry: bool) -> TokenResult<Token> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.validate_exp = check_expiry;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<Claims>(access_token, &self.decoding, &validation)?;
        Token::from_claims(access_token, data.claims).map_err(TokenError::Claims)
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("algorithm", &self.algorithm)
            .field("ttl", &self.ttl)
            .finish()
    }
}
