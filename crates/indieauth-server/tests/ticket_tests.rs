//! Ticket-Auth between two sites, end to end.

use std::sync::Arc;

use indieauth_server::client::{Document, StaticTransport, Transport};
use indieauth_server::config::Config;
use indieauth_server::discovery::Resolver;
use indieauth_server::error::{TicketError, TokenError};
use indieauth_server::models::{Me, Ticket};
use indieauth_server::oauth::{TicketService, TokenService};
use indieauth_server::store::{MemoryRevocationStore, MemoryTicketStore};
use url::Url;

const TICKET: &str = "32985723984723985792834";

struct Site {
    tickets: TicketService,
    tokens: TokenService,
    store: MemoryTicketStore,
}

fn site(transport: &StaticTransport) -> Site {
    let config = Config::for_testing("https://alice.example.com/");
    let transport: Arc<dyn Transport> = Arc::new(transport.clone());
    let store = MemoryTicketStore::new(config.ticket_lifetime());
    let tokens = TokenService::new(&config, Arc::new(MemoryRevocationStore::new()));
    let tickets = TicketService::new(
        Arc::new(store.clone()),
        Resolver::new(Arc::clone(&transport)),
        transport,
        tokens.clone(),
        config.ticket_scope.clone(),
    );
    Site { tickets, tokens, store }
}

fn bob(transport: &StaticTransport) {
    transport.serve(
        Document::new(Url::parse("https://bob.example.com/").unwrap(), "text/html", r#"<link rel="ticket_endpoint" href="/ticket">"#),
    );
    transport.serve(Document::new(Url::parse("https://bob.example.com/ticket").unwrap(), "text/plain", ""));
}

fn ticket() -> Ticket {
    Ticket::new(
        TICKET,
        Url::parse("https://alice.example.com/private/").unwrap(),
        Me::parse("https://bob.example.com/").unwrap(),
    )
}

#[tokio::test]
async fn test_generate_then_exchange_mints_token_for_subject() {
    let transport = StaticTransport::new();
    bob(&transport);
    let alice = site(&transport);

    alice.tickets.send(ticket()).await.unwrap();
    let token = alice.tickets.exchange(TICKET).await.unwrap();

    assert_eq!(token.me.as_str(), "https://bob.example.com/");
    assert_eq!(token.client_id.as_str(), "https://alice.example.com/private/");

    let verified = alice.tokens.verify(&token.access_token).await.unwrap();
    assert_eq!(verified.me, token.me);
}

#[tokio::test]
async fn test_ticket_exchanges_once() {
    let transport = StaticTransport::new();
    bob(&transport);
    let alice = site(&transport);

    alice.tickets.send(ticket()).await.unwrap();
    assert!(alice.tickets.exchange(TICKET).await.is_ok());
    assert!(matches!(alice.tickets.exchange(TICKET).await, Err(TicketError::NotFound)));
    assert!(matches!(alice.tickets.exchange("never-issued").await, Err(TicketError::NotFound)));
}

#[tokio::test]
async fn test_duplicate_ticket_value_rejected() {
    let transport = StaticTransport::new();
    bob(&transport);
    let alice = site(&transport);

    alice.tickets.send(ticket()).await.unwrap();
    assert!(matches!(alice.tickets.send(ticket()).await, Err(TicketError::Store(_))));
    assert_eq!(alice.store.len().await, 1);
}

#[tokio::test]
async fn test_unreachable_subject_is_a_discovery_error() {
    let transport = StaticTransport::new();
    transport.time_out(&Url::parse("https://bob.example.com/").unwrap());
    let alice = site(&transport);

    let result = alice.tickets.send(ticket()).await;
    assert!(matches!(result, Err(TicketError::Discovery(_))));
    assert!(alice.store.is_empty().await);
}

#[tokio::test]
async fn test_revoked_ticket_token_is_revoked() {
    let transport = StaticTransport::new();
    bob(&transport);
    let alice = site(&transport);

    alice.tickets.send(ticket()).await.unwrap();
    let token = alice.tickets.exchange(TICKET).await.unwrap();

    alice.tokens.revoke(&token.access_token).await.unwrap();
    assert!(matches!(alice.tokens.verify(&token.access_token).await, Err(TokenError::Revoked)));
}
