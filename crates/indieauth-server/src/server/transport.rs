//! HTTP routing and shared handler state.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use url::Url;

use super::handlers;
use crate::config::Config;
use crate::oauth::{SessionManager, TicketService, TokenService};

/// Path of this server's metadata document, relative to the issuer.
pub const METADATA_PATH: &str = ".well-known/oauth-authorization-server";

/// Shared state for HTTP handlers.
pub struct HttpState {
    pub config: Config,
    pub sessions: SessionManager,
    pub tokens: TokenService,
    pub tickets: TicketService,
}

impl HttpState {
    /// Absolute URL of this server's metadata document.
    #[must_use]
    pub fn metadata_url(&self) -> Url {
        self.config.issuer.join(METADATA_PATH).unwrap_or_else(|_| self.config.issuer.clone())
    }
}

impl std::fmt::Debug for HttpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpState").field("issuer", &self.config.issuer.as_str()).finish()
    }
}

/// Create the HTTP router.
pub fn create_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/", get(handlers::handle_root))
        .route("/health", get(handlers::health_check))
        .route(&format!("/{METADATA_PATH}"), get(handlers::handle_metadata))
        // Authorization endpoint
        .route("/authorize", get(handlers::handle_authorize_get).post(handlers::handle_authorize_post))
        .route("/authorize/verify", post(handlers::handle_consent))
        // Token endpoint: issue, exchange tickets, revoke, verify
        .route("/token", post(handlers::handle_token).get(handlers::handle_token_verify))
        .route("/introspect", post(handlers::handle_introspect))
        // Ticket-Auth
        .route("/ticket", post(handlers::handle_ticket))
        .route("/ticket/send", post(handlers::handle_ticket_send))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
