//! In-memory store engines.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use super::{Expiring, RevocationStore, SessionStore, TicketStore};
use crate::error::{StoreError, StoreResult};
use crate::models::{Session, Ticket, Token};

/// A string-keyed map behind one async lock.
struct Table<V> {
    entries: RwLock<HashMap<String, V>>,
}

impl<V: Clone + Send + Sync> Table<V> {
    fn new() -> Self {
        Self { entries: RwLock::new(HashMap::new()) }
    }

    async fn insert_new(&self, key: String, value: V) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&key) {
            return Err(StoreError::Duplicate);
        }
        entries.insert(key, value);
        Ok(())
    }

    async fn insert(&self, key: String, value: V) {
        self.entries.write().await.insert(key, value);
    }

    async fn get(&self, key: &str) -> Option<V> {
        self.entries.read().await.get(key).cloned()
    }

    async fn take(&self, key: &str) -> Option<V> {
        self.entries.write().await.remove(key)
    }

    async fn remove(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Remove entries for which `expired` holds at `now`.
    ///
    /// Candidates are collected under the read lock, then each is re-checked
    /// and removed under its own write lock, yielding in between so request
    /// handlers are never starved by a long sweep. An entry taken by a
    /// handler in the meantime is simply skipped.
    async fn sweep<F>(&self, now: DateTime<Utc>, expired: F) -> usize
    where
        F: Fn(&V, DateTime<Utc>) -> bool + Send + Sync,
    {
        let candidates: Vec<String> = {
            let entries = self.entries.read().await;
            entries.iter().filter(|(_, v)| expired(v, now)).map(|(k, _)| k.clone()).collect()
        };

        let mut removed = 0;
        for key in candidates {
            {
                let mut entries = self.entries.write().await;
                if entries.get(&key).is_some_and(|v| expired(v, now)) {
                    entries.remove(&key);
                    removed += 1;
                }
            }
            tokio::task::yield_now().await;
        }
        removed
    }
}

// ─── Sessions ──────────────────────────────────────────────────────────────

/// Sessions held in process memory, expiring `ttl` after creation.
#[derive(Clone)]
pub struct MemorySessionStore {
    table: Arc<Table<Session>>,
    ttl: Duration,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { table: Arc::new(Table::new()), ttl }
    }

    /// Number of stored sessions, expired ones included.
    pub async fn len(&self) -> usize {
        self.table.len().await
    }

    /// Whether the store holds no sessions at all.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: Session) -> StoreResult<()> {
        self.table.insert_new(session.code.clone(), session).await
    }

    async fn get(&self, code: &str) -> StoreResult<Session> {
        self.table
            .get(code)
            .await
            .filter(|s| !s.is_expired(self.ttl, Utc::now()))
            .ok_or(StoreError::NotFound)
    }

    async fn get_and_delete(&self, code: &str) -> StoreResult<Session> {
        self.table
            .take(code)
            .await
            .filter(|s| !s.is_expired(self.ttl, Utc::now()))
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl Expiring for MemorySessionStore {
    async fn gc_at(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let ttl = self.ttl;
        Ok(self.table.sweep(now, |s, now| s.is_expired(ttl, now)).await)
    }
}

impl std::fmt::Debug for MemorySessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySessionStore").field("ttl", &self.ttl).finish()
    }
}

// ─── Tickets ───────────────────────────────────────────────────────────────

/// Tickets held in process memory, expiring `ttl` after creation.
#[derive(Clone)]
pub struct MemoryTicketStore {
    table: Arc<Table<Ticket>>,
    ttl: Duration,
}

impl MemoryTicketStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { table: Arc::new(Table::new()), ttl }
    }

    /// Number of stored tickets, expired ones included.
    pub async fn len(&self) -> usize {
        self.table.len().await
    }

    /// Whether the store holds no tickets at all.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl TicketStore for MemoryTicketStore {
    async fn create(&self, ticket: Ticket) -> StoreResult<()> {
        self.table.insert_new(ticket.ticket.clone(), ticket).await
    }

    async fn get_and_delete(&self, ticket: &str) -> StoreResult<Ticket> {
        self.table
            .take(ticket)
            .await
            .filter(|t| !t.is_expired(self.ttl, Utc::now()))
            .ok_or(StoreError::NotFound)
    }

    async fn delete(&self, ticket: &str) -> StoreResult<()> {
        self.table.remove(ticket).await;
        Ok(())
    }
}

#[async_trait]
impl Expiring for MemoryTicketStore {
    async fn gc_at(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let ttl = self.ttl;
        Ok(self.table.sweep(now, |t, now| t.is_expired(ttl, now)).await)
    }
}

impl std::fmt::Debug for MemoryTicketStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTicketStore").field("ttl", &self.ttl).finish()
    }
}

// ─── Revocations ───────────────────────────────────────────────────────────

/// Revocation records held in process memory.
///
/// A record outlives its usefulness once the token itself has expired, so
/// the sweep drops it then. Records of non-expiring tokens are kept forever.
#[derive(Clone)]
pub struct MemoryRevocationStore {
    table: Arc<Table<Token>>,
}

impl MemoryRevocationStore {
    #[must_use]
    pub fn new() -> Self {
        Self { table: Arc::new(Table::new()) }
    }

    /// Number of revocation records.
    pub async fn len(&self) -> usize {
        self.table.len().await
    }

    /// Whether no token has been revoked.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryRevocationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn create(&self, token: Token) -> StoreResult<()> {
        self.table.insert(token.access_token.clone(), token).await;
        Ok(())
    }

    async fn get(&self, access_token: &str) -> StoreResult<Option<Token>> {
        Ok(self.table.get(access_token).await)
    }

    async fn delete(&self, access_token: &str) -> StoreResult<()> {
        self.table.remove(access_token).await;
        Ok(())
    }
}

#[async_trait]
impl Expiring for MemoryRevocationStore {
    async fn gc_at(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        Ok(self.table.sweep(now, |t, now| t.expires_at.is_some_and(|at| at <= now)).await)
    }
}

impl std::fmt::Debug for MemoryRevocationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRevocationStore").finish()
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::models::{ClientId, Me, Scopes, TokenType};

    fn session(code: &str, created_at: DateTime<Utc>) -> Session {
        Session {
            code: code.to_owned(),
            client_id: ClientId::parse("https://app.example.com/").unwrap(),
            redirect_uri: Url::parse("https://app.example.com/callback").unwrap(),
            me: Me::parse("https://user.example.net/").unwrap(),
            scope: Scopes::parse("create").unwrap(),
            code_challenge: None,
            created_at,
        }
    }

    fn token(access_token: &str, expires_at: Option<DateTime<Utc>>) -> Token {
        Token {
            access_token: access_token.to_owned(),
            token_type: TokenType::Bearer,
            client_id: ClientId::parse("https://app.example.com/").unwrap(),
            me: Me::parse("https://user.example.net/").unwrap(),
            scope: Scopes::default(),
            issued_at: Utc::now(),
            expires_at,
            jti: "jti".to_owned(),
        }
    }

    #[test]
    fn test_duplicate_ticket_rejected() {
        let store = MemoryTicketStore::new(Duration::minutes(10));
        let ticket = Ticket::new(
            "t1",
            Url::parse("https://alice.example.com/").unwrap(),
            Me::parse("https://bob.example.com/").unwrap(),
        );
        tokio_test::block_on(async {
            store.create(ticket.clone()).await.unwrap();
            assert_eq!(store.create(ticket).await.unwrap_err(), StoreError::Duplicate);
            assert_eq!(store.len().await, 1);
        });
    }

    #[tokio::test]
    async fn test_session_get_and_delete_is_single_use() {
        let store = MemorySessionStore::new(Duration::minutes(10));
        store.create(session("code1", Utc::now())).await.unwrap();

        assert_eq!(store.get("code1").await.unwrap().code, "code1");
        assert_eq!(store.get_and_delete("code1").await.unwrap().code, "code1");
        assert_eq!(store.get_and_delete("code1").await.unwrap_err(), StoreError::NotFound);
        assert_eq!(store.get("code1").await.unwrap_err(), StoreError::NotFound);
    }

    #[tokio::test]
    async fn test_session_duplicate_code() {
        let store = MemorySessionStore::new(Duration::minutes(10));
        store.create(session("code1", Utc::now())).await.unwrap();
        assert_eq!(store.create(session("code1", Utc::now())).await.unwrap_err(), StoreError::Duplicate);
    }

    #[tokio::test]
    async fn test_expired_session_is_not_returned() {
        let store = MemorySessionStore::new(Duration::minutes(10));
        store.create(session("old", Utc::now() - Duration::minutes(11))).await.unwrap();

        assert_eq!(store.get("old").await.unwrap_err(), StoreError::NotFound);
        assert_eq!(store.get_and_delete("old").await.unwrap_err(), StoreError::NotFound);
    }

    #[tokio::test]
    async fn test_session_gc() {
        let store = MemorySessionStore::new(Duration::minutes(10));
        let now = Utc::now();
        store.create(session("fresh", now)).await.unwrap();
        store.create(session("stale", now - Duration::minutes(30))).await.unwrap();

        assert_eq!(store.gc_at(now).await.unwrap(), 1);
        assert_eq!(store.len().await, 1);
        assert!(store.get("fresh").await.is_ok());
    }

    #[tokio::test]
    async fn test_ticket_delete() {
        let store = MemoryTicketStore::new(Duration::minutes(10));
        let ticket = Ticket::new(
            "t1",
            Url::parse("https://alice.example.com/").unwrap(),
            Me::parse("https://bob.example.com/").unwrap(),
        );
        store.create(ticket).await.unwrap();
        store.delete("t1").await.unwrap();
        store.delete("t1").await.unwrap();
        assert_eq!(store.get_and_delete("t1").await.unwrap_err(), StoreError::NotFound);
    }

    #[tokio::test]
    async fn test_revocation_gc_drops_expired_tokens_only() {
        let store = MemoryRevocationStore::new();
        let now = Utc::now();
        store.create(token("expired", Some(now - Duration::seconds(1)))).await.unwrap();
        store.create(token("live", Some(now + Duration::hours(1)))).await.unwrap();
        store.create(token("forever", None)).await.unwrap();

        assert_eq!(store.gc_at(now).await.unwrap(), 1);
        assert!(store.get("expired").await.unwrap().is_none());
        assert!(store.get("live").await.unwrap().is_some());
        assert!(store.get("forever").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_revocation_is_idempotent() {
        let store = MemoryRevocationStore::new();
        store.create(token("t", None)).await.unwrap();
        store.create(token("t", None)).await.unwrap();
        assert_eq!(store.len().await, 1);

        store.delete("t").await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_revocation_keyed_by_access_token() {
        let store = MemoryRevocationStore::new();
        store.create(token("first", None)).await.unwrap();

        // Same jti, different token string
        assert!(store.get("second").await.unwrap().is_none());
        assert_eq!(store.get("first").await.unwrap().unwrap().jti, "jti");
    }
}
