//! IndieAuth endpoint handlers.
//!
//! Implements:
//! - IndieAuth authorization endpoint with consent and profile-only redemption
//! - Token endpoint: code exchange, ticket exchange, revocation, verification
//! - RFC 7662-style introspection
//! - Ticket-Auth: sending tickets and receiving them as a subject
//! - RFC 8414 metadata with RFC 9207 `iss` on authorization responses

use std::sync::Arc;

use axum::{
    Form, Json,
    extract::{Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use axum_extra::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use axum_extra::typed_header::TypedHeaderRejection;
use chrono::Utc;
use subtle::ConstantTimeEq;
use url::Url;

use super::transport::HttpState;
use crate::discovery::relations;
use crate::error::OAuthError;
use crate::models::{
    AuthorizationRequest, AuthorizeParams, ConsentParams, Decision, ExchangeParams, IntrospectParams, Metadata,
    Scope, TicketParams, TicketSendParams, Token, TokenInfo, TokenParams, TokenRequest, TokenResponse,
};
use crate::oauth::pkce::CodeChallengeMethod;

type BearerHeader = Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>;

// ─── Discovery ───────────────────────────────────────────────────────────────

/// `GET /`
///
/// Health response that also advertises the metadata document, so the
/// server's own URL can be used as an IndieAuth endpoint source.
pub async fn handle_root(State(state): State<Arc<HttpState>>) -> Response {
    let mut response = health_check().await.into_response();
    let link = format!("<{}>; rel=\"{}\"", state.metadata_url(), relations::METADATA);
    if let Ok(value) = HeaderValue::from_str(&link) {
        response.headers_mut().insert(header::LINK, value);
    }
    response
}

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "indieauth-server",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// `GET /.well-known/oauth-authorization-server`
pub async fn handle_metadata(State(state): State<Arc<HttpState>>) -> Json<Metadata> {
    let scopes: Vec<&str> = Scope::ALL.iter().map(|s| s.as_str()).collect();
    let methods: Vec<&str> = CodeChallengeMethod::ALL.iter().map(|m| m.as_str()).collect();
    Json(Metadata::for_issuer(&state.config.issuer, &scopes, &methods))
}

// ─── Authorization endpoint ──────────────────────────────────────────────────

/// `GET /authorize`
///
/// Validate an authorization request and hand it back to the consent
/// front-end. Errors are never redirected: until the redirect URI is known
/// to belong to the client, the client cannot be trusted with them.
pub async fn handle_authorize_get(
    State(state): State<Arc<HttpState>>,
    Query(params): Query<AuthorizeParams>,
) -> Result<Json<AuthorizationRequest>, OAuthError> {
    let request = params.validate()?;
    state.sessions.verify_redirect(&request.client_id, &request.redirect_uri).await?;

    tracing::debug!(client_id = %request.client_id, me = %request.me, scope = %request.scope, "Authorization requested");
    Ok(Json(request))
}

/// `POST /authorize/verify`
///
/// The user's consent decision. Approval requires the server password when
/// one is configured.
pub async fn handle_consent(
    State(state): State<Arc<HttpState>>,
    Form(params): Form<ConsentParams>,
) -> Result<Response, OAuthError> {
    let consent = params.validate()?;
    let request = &consent.request;
    state.sessions.verify_redirect(&request.client_id, &request.redirect_uri).await?;

    let mut location = request.redirect_uri.clone();
    match consent.decision {
        Decision::Deny => {
            tracing::info!(client_id = %request.client_id, me = %request.me, "Authorization denied");
            location
                .query_pairs_mut()
                .append_pair("error", "access_denied")
                .append_pair("state", &request.state)
                .append_pair("iss", state.config.issuer.as_str());
        }
        Decision::Allow => {
            if let Some(expected) = state.config.auth_token.as_deref() {
                let given = consent.password.as_deref().unwrap_or_default();
                if !bool::from(expected.as_bytes().ct_eq(given.as_bytes())) {
                    tracing::warn!(client_id = %request.client_id, "Consent rejected: wrong password");
                    return Err(OAuthError::access_denied("invalid server password"));
                }
            }

            let session = state.sessions.approve(request).await?;
            location
                .query_pairs_mut()
                .append_pair("code", &session.code)
                .append_pair("state", &request.state)
                .append_pair("iss", state.config.issuer.as_str());
        }
    }

    Ok(found(&location))
}

/// `POST /authorize`
///
/// Redeem a code for the user's identity only. No access token is issued,
/// so sessions without scopes are accepted here.
pub async fn handle_authorize_post(
    State(state): State<Arc<HttpState>>,
    Form(params): Form<ExchangeParams>,
) -> Result<Response, OAuthError> {
    let exchange = params.validate()?;
    let session = state.sessions.redeem(&exchange).await?;

    Ok(no_store(Json(serde_json::json!({ "me": session.me.as_str() }))))
}

// ─── Token endpoint ──────────────────────────────────────────────────────────

/// `POST /token`
///
/// Exchange an authorization code or a ticket for an access token, or
/// revoke a token with `action=revoke`.
pub async fn handle_token(
    State(state): State<Arc<HttpState>>,
    Form(params): Form<TokenParams>,
) -> Result<Response, OAuthError> {
    match params.validate()? {
        TokenRequest::AuthorizationCode(exchange) => {
            let session = state.sessions.redeem_for_token(&exchange).await?;
            let token = state.tokens.issue(&session.client_id, &session.me, &session.scope)?;
            Ok(token_success(&token))
        }
        TokenRequest::Ticket { ticket } => {
            let token = state.tickets.exchange(&ticket).await?;
            Ok(token_success(&token))
        }
        TokenRequest::Revoke { token } => {
            // Revocation always succeeds from the caller's point of view.
            if let Err(e) = state.tokens.revoke(&token).await {
                tracing::warn!(error = %e, "Ignoring revocation of unusable token");
            }
            Ok(no_store(Json(serde_json::json!({}))))
        }
    }
}

/// `GET /token`
///
/// Verify the bearer token and describe it.
pub async fn handle_token_verify(State(state): State<Arc<HttpState>>, bearer: BearerHeader) -> Result<Response, OAuthError> {
    let token = authenticate(&state, bearer).await?;
    Ok(no_store(Json(serde_json::json!({
        "me": token.me.as_str(),
        "client_id": token.client_id.as_str(),
        "scope": token.scope.to_wire()
    }))))
}

/// `POST /introspect`
pub async fn handle_introspect(
    State(state): State<Arc<HttpState>>,
    Form(params): Form<IntrospectParams>,
) -> Result<Json<TokenInfo>, OAuthError> {
    let token = params.validate()?;
    Ok(Json(state.tokens.introspect(&token).await))
}

// ─── Ticket-Auth ─────────────────────────────────────────────────────────────

/// `POST /ticket/send`
///
/// Grant `subject` access to `resource`. Only the owner of the resource's
/// site may hand out tickets for it.
pub async fn handle_ticket_send(
    State(state): State<Arc<HttpState>>,
    bearer: BearerHeader,
    Form(params): Form<TicketSendParams>,
) -> Result<StatusCode, OAuthError> {
    let owner = authenticate(&state, bearer).await?;
    let request = params.validate()?;

    if !owner.me.owns(&request.resource) {
        tracing::warn!(me = %owner.me, resource = %request.resource, "Ticket requested for foreign resource");
        return Err(OAuthError::access_denied(format!("{} is not served from {}", request.resource, owner.me)));
    }

    state.tickets.generate(request.subject, request.resource).await?;
    Ok(StatusCode::ACCEPTED)
}

/// `POST /ticket`
///
/// This server acting as the subject's ticket endpoint: redeem the ticket
/// at the resource owner's token endpoint.
pub async fn handle_ticket(
    State(state): State<Arc<HttpState>>,
    Form(params): Form<TicketParams>,
) -> Result<StatusCode, OAuthError> {
    let ticket = params.validate()?;
    let response = state.tickets.redeem(&ticket).await?;

    tracing::info!(
        subject = %ticket.subject,
        resource = %ticket.resource,
        scope = %response.scope,
        expires_in = ?response.expires_in,
        "Access token received for ticket"
    );
    Ok(StatusCode::ACCEPTED)
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

async fn authenticate(state: &HttpState, bearer: BearerHeader) -> Result<Token, OAuthError> {
    let TypedHeader(Authorization(bearer)) =
        bearer.map_err(|_| OAuthError::invalid_token("missing or malformed bearer token"))?;
    Ok(state.tokens.verify(bearer.token()).await?)
}

/// Build a token response with required OAuth 2.0 cache headers (RFC 6749 §5.1).
fn token_success(token: &Token) -> Response {
    no_store(Json(TokenResponse::new(token, Utc::now())))
}

fn no_store(body: impl IntoResponse) -> Response {
    let mut response = body.into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

fn found(location: &Url) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}
