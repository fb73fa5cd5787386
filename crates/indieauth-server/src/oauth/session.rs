//! Authorization session lifecycle: approval creates a code, redemption
//! consumes it exactly once.

use std::sync::Arc;

use chrono::Utc;
use url::Url;

use crate::config::defaults;
use crate::discovery::Resolver;
use crate::error::{SessionError, SessionResult, StoreError};
use crate::models::{AuthorizationRequest, ClientId, ExchangeRequest, Session};
use crate::random;
use crate::store::SessionStore;

/// Attempts at drawing an unused code before giving up.
const CODE_ATTEMPTS: usize = 3;

/// Creates and redeems authorization sessions.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    resolver: Resolver,
}

impl SessionManager {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, resolver: Resolver) -> Self {
        Self { store, resolver }
    }

    /// Check that the request's `redirect_uri` belongs to its client.
    ///
    /// Same-origin redirects are accepted outright; any other redirect must
    /// be among the `redirect_uri` relations the client page publishes.
    pub async fn verify_redirect(&self, client_id: &ClientId, redirect_uri: &Url) -> SessionResult<()> {
        if client_id.same_origin(redirect_uri) {
            return Ok(());
        }

        let published = self.resolver.redirect_uris(client_id).await?;
        if published.iter().any(|uri| uri == redirect_uri) {
            Ok(())
        } else {
            tracing::warn!(
                client_id = %client_id,
                redirect_uri = %redirect_uri,
                "Redirect URI not published by client"
            );
            Err(SessionError::UnregisteredRedirect(redirect_uri.to_string()))
        }
    }

    /// Record the user's approval of `request` and return the new session.
    pub async fn approve(&self, request: &AuthorizationRequest) -> SessionResult<Session> {
        for _ in 0..CODE_ATTEMPTS {
            let session = Session {
                code: random::string(defaults::CODE_LENGTH, random::ALPHANUMERIC),
                client_id: request.client_id.clone(),
                redirect_uri: request.redirect_uri.clone(),
                me: request.me.clone(),
                scope: request.scope.clone(),
                code_challenge: request.code_challenge.clone(),
                created_at: Utc::now(),
            };

            match self.store.create(session.clone()).await {
                Ok(()) => {
                    tracing::info!(
                        client_id = %session.client_id,
                        me = %session.me,
                        scope = %session.scope,
                        pkce = session.code_challenge.is_some(),
                        "Authorization approved"
                    );
                    return Ok(session);
                }
                Err(StoreError::Duplicate) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(SessionError::Store(StoreError::Duplicate))
    }

    /// Consume the session for `exchange.code` and check the exchange
    /// against it.
    ///
    /// The code is spent even when a check fails; a second attempt with
    /// corrected parameters sees `NotFound`.
    pub async fn redeem(&self, exchange: &ExchangeRequest) -> SessionResult<Session> {
        let session = self.store.get_and_delete(&exchange.code).await?;

        if session.client_id != exchange.client_id {
            tracing::warn!(expected = %session.client_id, got = %exchange.client_id, "Code presented by another client");
            return Err(SessionError::ClientMismatch);
        }
        if session.redirect_uri != exchange.redirect_uri {
            tracing::warn!(client_id = %session.client_id, "Code presented with another redirect_uri");
            return Err(SessionError::RedirectMismatch);
        }

        match (&session.code_challenge, exchange.code_verifier.as_deref()) {
            (Some(challenge), verifier) => challenge.verify(verifier)?,
            (None, Some(_)) => return Err(SessionError::UnexpectedVerifier),
            (None, None) => {}
        }

        tracing::info!(client_id = %session.client_id, me = %session.me, "Authorization code redeemed");
        Ok(session)
    }

    /// [`redeem`](Self::redeem) for an access token: the session must carry
    /// at least one scope.
    pub async fn redeem_for_token(&self, exchange: &ExchangeRequest) -> SessionResult<Session> {
        let session = self.redeem(exchange).await?;
        if session.scope.is_empty() {
            return Err(SessionError::EmptyScope);
        }
        Ok(session)
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Document, StaticTransport};
    use crate::error::PkceError;
    use crate::models::{Me, ResponseType, Scopes};
    use crate::oauth::pkce::{CodeChallenge, CodeChallengeMethod};
    use crate::store::MemorySessionStore;

    const VERIFIER: &str = "a6128783714cfda1d388e2e98b6ae8221ac31aca31959e59512c59f5";
    const CHALLENGE: &str = "OfYAxt8zU2dAPDWQxTAUIteRzMsoj9QBdMIVEDOErUo";

    fn manager(transport: &StaticTransport) -> SessionManager {
        SessionManager::new(
            Arc::new(MemorySessionStore::new(chrono::Duration::minutes(10))),
            Resolver::new(Arc::new(transport.clone())),
        )
    }

    fn request(pkce: bool) -> AuthorizationRequest {
        AuthorizationRequest {
            client_id: ClientId::parse("https://app.example.com/").unwrap(),
            redirect_uri: Url::parse("https://app.example.com/callback").unwrap(),
            response_type: ResponseType::Code,
            me: Me::parse("https://user.example.net/").unwrap(),
            state: "state".into(),
            scope: Scopes::parse("create update").unwrap(),
            code_challenge: pkce.then(|| CodeChallenge {
                challenge: CHALLENGE.into(),
                method: CodeChallengeMethod::S256,
            }),
        }
    }

    fn exchange(code: &str, verifier: Option<&str>) -> ExchangeRequest {
        ExchangeRequest {
            code: code.into(),
            client_id: ClientId::parse("https://app.example.com/").unwrap(),
            redirect_uri: Url::parse("https://app.example.com/callback").unwrap(),
            code_verifier: verifier.map(str::to_owned),
        }
    }

    #[tokio::test]
    async fn test_approve_then_redeem_once() {
        let manager = manager(&StaticTransport::new());
        let session = manager.approve(&request(true)).await.unwrap();
        assert_eq!(session.code.len(), defaults::CODE_LENGTH);

        let redeemed = manager.redeem(&exchange(&session.code, Some(VERIFIER))).await.unwrap();
        assert_eq!(redeemed.me.as_str(), "https://user.example.net/");

        let replay = manager.redeem(&exchange(&session.code, Some(VERIFIER))).await;
        assert!(matches!(replay, Err(SessionError::NotFound)));
    }

    #[tokio::test]
    async fn test_wrong_verifier_spends_code() {
        let manager = manager(&StaticTransport::new());
        let session = manager.approve(&request(true)).await.unwrap();

        let wrong = "b".repeat(43);
        let result = manager.redeem(&exchange(&session.code, Some(&wrong))).await;
        assert!(matches!(result, Err(SessionError::Pkce(PkceError::Mismatch))));

        let retry = manager.redeem(&exchange(&session.code, Some(VERIFIER))).await;
        assert!(matches!(retry, Err(SessionError::NotFound)));
    }

    #[tokio::test]
    async fn test_missing_verifier() {
        let manager = manager(&StaticTransport::new());
        let session = manager.approve(&request(true)).await.unwrap();
        let result = manager.redeem(&exchange(&session.code, None)).await;
        assert!(matches!(result, Err(SessionError::Pkce(PkceError::MissingVerifier))));
    }

    #[tokio::test]
    async fn test_verifier_without_challenge() {
        let manager = manager(&StaticTransport::new());
        let session = manager.approve(&request(false)).await.unwrap();
        let result = manager.redeem(&exchange(&session.code, Some(VERIFIER))).await;
        assert!(matches!(result, Err(SessionError::UnexpectedVerifier)));
    }

    #[tokio::test]
    async fn test_client_and_redirect_mismatch() {
        let manager = manager(&StaticTransport::new());

        let session = manager.approve(&request(false)).await.unwrap();
        let mut other_client = exchange(&session.code, None);
        other_client.client_id = ClientId::parse("https://evil.example.com/").unwrap();
        assert!(matches!(manager.redeem(&other_client).await, Err(SessionError::ClientMismatch)));

        let session = manager.approve(&request(false)).await.unwrap();
        let mut other_redirect = exchange(&session.code, None);
        other_redirect.redirect_uri = Url::parse("https://app.example.com/other").unwrap();
        assert!(matches!(manager.redeem(&other_redirect).await, Err(SessionError::RedirectMismatch)));
    }

    #[tokio::test]
    async fn test_profile_only_code_cannot_buy_token() {
        let manager = manager(&StaticTransport::new());
        let mut profile_only = request(false);
        profile_only.scope = Scopes::default();

        let session = manager.approve(&profile_only).await.unwrap();
        let result = manager.redeem_for_token(&exchange(&session.code, None)).await;
        assert!(matches!(result, Err(SessionError::EmptyScope)));

        let session = manager.approve(&profile_only).await.unwrap();
        assert!(manager.redeem(&exchange(&session.code, None)).await.is_ok());
    }

    #[tokio::test]
    async fn test_verify_redirect() {
        let transport = StaticTransport::new();
        transport.serve(Document::new(
            Url::parse("https://app.example.com/").unwrap(),
            "text/html",
            r#"<link rel="redirect_uri" href="https://login.example.org/cb">"#,
        ));
        let manager = manager(&transport);
        let client_id = ClientId::parse("https://app.example.com/").unwrap();

        let same_origin = Url::parse("https://app.example.com/anything").unwrap();
        assert!(manager.verify_redirect(&client_id, &same_origin).await.is_ok());

        let published = Url::parse("https://login.example.org/cb").unwrap();
        assert!(manager.verify_redirect(&client_id, &published).await.is_ok());

        let unknown = Url::parse("https://login.example.org/other").unwrap();
        assert!(matches!(
            manager.verify_redirect(&client_id, &unknown).await,
            Err(SessionError::UnregisteredRedirect(_))
        ));
    }
}
