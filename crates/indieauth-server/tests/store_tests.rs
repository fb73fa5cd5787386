//! Store behavior under concurrency and at the expiry boundary.

use std::sync::Arc;

use chrono::{Duration, Utc};
use indieauth_server::error::StoreError;
use indieauth_server::models::{ClientId, Me, Scopes, Session, Ticket};
use indieauth_server::store::{Expiring, MemorySessionStore, MemoryTicketStore, SessionStore, TicketStore};
use url::Url;

fn session(code: &str, age: Duration) -> Session {
    Session {
        code: code.to_owned(),
        client_id: ClientId::parse("https://app.example.com/").unwrap(),
        redirect_uri: Url::parse("https://app.example.com/callback").unwrap(),
        me: Me::parse("https://user.example.net/").unwrap(),
        scope: Scopes::parse("create").unwrap(),
        code_challenge: None,
        created_at: Utc::now() - age,
    }
}

// =============================================================================
// Single use under contention
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_redemption_has_one_winner() {
    let store = Arc::new(MemorySessionStore::new(Duration::minutes(10)));
    store.create(session("contested", Duration::zero())).await.unwrap();

    let attempts: Vec<_> = (0..32)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.get_and_delete("contested").await })
        })
        .collect();

    let mut winners = 0;
    for attempt in futures::future::join_all(attempts).await {
        match attempt.unwrap() {
            Ok(s) => {
                assert_eq!(s.code, "contested");
                winners += 1;
            }
            Err(e) => assert_eq!(e, StoreError::NotFound),
        }
    }
    assert_eq!(winners, 1);
    assert!(store.is_empty().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ticket_exchange_has_one_winner() {
    let store = Arc::new(MemoryTicketStore::new(Duration::minutes(10)));
    store
        .create(Ticket::new(
            "32985723984723985792834",
            Url::parse("https://alice.example.com/private/").unwrap(),
            Me::parse("https://bob.example.com/").unwrap(),
        ))
        .await
        .unwrap();

    let attempts: Vec<_> = (0..16)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.get_and_delete("32985723984723985792834").await.is_ok() })
        })
        .collect();

    let winners = futures::future::join_all(attempts).await.into_iter().filter(|won| *won.as_ref().unwrap()).count();
    assert_eq!(winners, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_gc_races_with_redemption() {
    let store = Arc::new(MemorySessionStore::new(Duration::minutes(10)));
    for i in 0..200 {
        let age = if i % 2 == 0 { Duration::minutes(11) } else { Duration::zero() };
        store.create(session(&format!("code-{i}"), age)).await.unwrap();
    }

    let sweeper = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.gc().await.unwrap() })
    };
    let redeemer = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            let mut redeemed = 0;
            for i in (1..200).step_by(2) {
                if store.get_and_delete(&format!("code-{i}")).await.is_ok() {
                    redeemed += 1;
                }
            }
            redeemed
        })
    };

    let removed = sweeper.await.unwrap();
    let redeemed = redeemer.await.unwrap();
    assert_eq!(removed, 100);
    assert_eq!(redeemed, 100);
    assert!(store.is_empty().await);
}

// =============================================================================
// Expiry boundary
// =============================================================================

#[tokio::test]
async fn test_session_expiry_boundary() {
    let store = MemorySessionStore::new(Duration::minutes(10));
    store.create(session("fresh", Duration::minutes(9) + Duration::seconds(59))).await.unwrap();
    store.create(session("stale", Duration::minutes(10) + Duration::seconds(1))).await.unwrap();

    assert!(store.get("fresh").await.is_ok());
    assert_eq!(store.get("stale").await.unwrap_err(), StoreError::NotFound);

    assert_eq!(store.gc().await.unwrap(), 1);
    assert_eq!(store.len().await, 1);
    assert!(store.get_and_delete("fresh").await.is_ok());
}

#[tokio::test]
async fn test_gc_at_future_instant() {
    let store = MemoryTicketStore::new(Duration::minutes(10));
    store
        .create(Ticket::new(
            "t1",
            Url::parse("https://alice.example.com/").unwrap(),
            Me::parse("https://bob.example.com/").unwrap(),
        ))
        .await
        .unwrap();

    assert_eq!(store.gc_at(Utc::now() + Duration::minutes(9)).await.unwrap(), 0);
    assert_eq!(store.gc_at(Utc::now() + Duration::minutes(11)).await.unwrap(), 1);
    assert!(store.is_empty().await);
}
