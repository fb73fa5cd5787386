//! Ticket-Auth: granting another person's site access to a resource.
//!
//! The resource owner's server generates a ticket and posts it to the
//! subject's ticket endpoint. The subject's server redeems it at the owner's
//! token endpoint, where it is exchanged exactly once for an access token.

use std::sync::Arc;

use url::Url;

use crate::client::Transport;
use crate::config::defaults;
use crate::discovery::{Resolver, relations};
use crate::error::{StoreError, TicketError, TicketResult};
use crate::models::{ClientId, Me, Scopes, Ticket, Token, TokenResponse};
use crate::oauth::token::TokenService;
use crate::random;
use crate::store::TicketStore;

/// Attempts at drawing an unused ticket value before giving up.
const TICKET_ATTEMPTS: usize = 3;

/// Generates, exchanges and redeems tickets.
#[derive(Clone)]
pub struct TicketService {
    store: Arc<dyn TicketStore>,
    resolver: Resolver,
    transport: Arc<dyn Transport>,
    tokens: TokenService,
    scope: Scopes,
}

impl TicketService {
    /// `scope` is granted to every token minted for an exchanged ticket.
    #[must_use]
    pub fn new(
        store: Arc<dyn TicketStore>,
        resolver: Resolver,
        transport: Arc<dyn Transport>,
        tokens: TokenService,
        scope: Scopes,
    ) -> Self {
        Self { store, resolver, transport, tokens, scope }
    }

    /// Grant `subject` access to `resource` with a fresh random ticket.
    pub async fn generate(&self, subject: Me, resource: Url) -> TicketResult<Ticket> {
        for _ in 0..TICKET_ATTEMPTS {
            let ticket = Ticket::new(
                random::string(defaults::CODE_LENGTH, random::ALPHANUMERIC),
                resource.clone(),
                subject.clone(),
            );
            match self.send(ticket).await {
                Err(TicketError::Store(StoreError::Duplicate)) => continue,
                other => return other,
            }
        }
        Err(TicketError::Store(StoreError::Duplicate))
    }

    /// Store `ticket` and deliver it to its subject's ticket endpoint.
    ///
    /// The resource must be usable as the exchanged token's issuer and the
    /// endpoint is discovered before anything is stored. If delivery fails the
    /// ticket is removed again, so an undelivered ticket can never be
    /// exchanged.
    pub async fn send(&self, ticket: Ticket) -> TicketResult<Ticket> {
        issuer_of(&ticket)?;

        let endpoint = match self.resolver.resolve(ticket.subject.as_url(), relations::TICKET_ENDPOINT).await {
            Ok(endpoint) => endpoint,
            Err(e) if e.is_not_found() => {
                return Err(TicketError::NoTicketEndpoint { subject: ticket.subject.to_string() });
            }
            Err(e) => return Err(TicketError::Discovery(e)),
        };

        self.store.create(ticket.clone()).await?;

        if let Err(e) = self.transport.post_form(&endpoint, &ticket.form()).await {
            if let Err(cleanup) = self.store.delete(&ticket.ticket).await {
                tracing::error!(error = %cleanup, "Failed to remove undelivered ticket");
            }
            tracing::warn!(subject = %ticket.subject, endpoint = %endpoint, error = %e, "Ticket delivery failed");
            return Err(TicketError::Delivery(e));
        }

        tracing::info!(
            subject = %ticket.subject,
            resource = %ticket.resource,
            endpoint = %endpoint,
            "Ticket sent"
        );
        Ok(ticket)
    }

    /// Exchange a ticket for an access token, consuming it.
    ///
    /// The token is issued in the name of the resource (`iss`) to the
    /// ticket's subject (`sub`), with the configured ticket scope.
    pub async fn exchange(&self, ticket: &str) -> TicketResult<Token> {
        let ticket = self.store.get_and_delete(ticket).await?;

        let issuer = issuer_of(&ticket)?;
        let token = self.tokens.issue(&issuer, &ticket.subject, &self.scope)?;

        tracing::info!(subject = %ticket.subject, resource = %ticket.resource, "Ticket exchanged");
        Ok(token)
    }

    /// Redeem a received ticket at the resource owner's token endpoint.
    pub async fn redeem(&self, ticket: &Ticket) -> TicketResult<TokenResponse> {
        let endpoint = self
            .resolver
            .resolve(&ticket.resource, relations::TOKEN_ENDPOINT)
            .await
            .map_err(TicketError::Discovery)?;

        let document = self
            .transport
            .post_form(&endpoint, &[("grant_type", "ticket"), ("ticket", ticket.ticket.as_str())])
            .await?;

        let response: TokenResponse =
            document.json().map_err(|e| TicketError::InvalidResponse(e.to_string()))?;
        if response.access_token.trim().is_empty() {
            return Err(TicketError::InvalidResponse("empty access_token".to_owned()));
        }
        Me::parse(&response.me)
            .map_err(|e| TicketError::InvalidResponse(format!("invalid me: {e}")))?;

        tracing::info!(
            resource = %ticket.resource,
            me = %response.me,
            scope = %response.scope,
            "Ticket redeemed"
        );
        Ok(response)
    }
}

/// The resource a ticket grants access to, as the issuer of exchanged tokens.
fn issuer_of(ticket: &Ticket) -> TicketResult<ClientId> {
    ClientId::parse(ticket.resource.as_str())
        .map_err(|source| TicketError::InvalidField { field: "resource", source })
}

impl std::fmt::Debug for TicketService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketService").field("scope", &self.scope.to_wire()).finish()
    }
}
