//! Persistence contracts consumed by the protocol engines.
//!
//! Every store is shared by concurrent request handlers and its own
//! background sweep. Implementations must make `get_and_delete` a single
//! critical section: of any number of concurrent calls for one key, exactly
//! one returns the value.

mod memory;
pub mod sweeper;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreResult;
use crate::models::{Session, Ticket, Token};

pub use memory::{MemoryRevocationStore, MemorySessionStore, MemoryTicketStore};

/// Storage of approved authorization sessions, keyed by code.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session. Fails with `Duplicate` if the code is taken.
    async fn create(&self, session: Session) -> StoreResult<()>;

    /// Look up an unexpired session without consuming it.
    async fn get(&self, code: &str) -> StoreResult<Session>;

    /// Atomically remove and return an unexpired session.
    async fn get_and_delete(&self, code: &str) -> StoreResult<Session>;
}

/// Storage of issued tickets, keyed by ticket value.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Persist a new ticket. Fails with `Duplicate` if the value is taken.
    async fn create(&self, ticket: Ticket) -> StoreResult<()>;

    /// Atomically remove and return an unexpired ticket.
    async fn get_and_delete(&self, ticket: &str) -> StoreResult<Ticket>;

    /// Remove a ticket regardless of age. Absent tickets are not an error.
    async fn delete(&self, ticket: &str) -> StoreResult<()>;
}

/// Denylist of revoked access tokens, keyed by the literal token string.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Record `token` as revoked. Recording it twice is not an error.
    async fn create(&self, token: Token) -> StoreResult<()>;

    /// The revocation record for `access_token`, if any.
    async fn get(&self, access_token: &str) -> StoreResult<Option<Token>>;

    /// Drop the revocation record. Absent records are not an error.
    async fn delete(&self, access_token: &str) -> StoreResult<()>;
}

/// A store whose entries expire and can be swept.
#[async_trait]
pub trait Expiring: Send + Sync {
    /// Remove every entry expired at `now`; returns how many were removed.
    async fn gc_at(&self, now: DateTime<Utc>) -> StoreResult<usize>;

    /// Remove every entry expired now.
    async fn gc(&self) -> StoreResult<usize> {
        self.gc_at(Utc::now()).await
    }
}
