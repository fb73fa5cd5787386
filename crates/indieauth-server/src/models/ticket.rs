//! Ticket-Auth tickets.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::Me;

/// A delegated-access ticket: `subject` may access `resource` once the
/// ticket is exchanged at the resource owner's token endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket: String,
    pub resource: Url,
    pub subject: Me,
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    /// Build a ticket created now.
    #[must_use]
    pub fn new(ticket: impl Into<String>, resource: Url, subject: Me) -> Self {
        Self { ticket: ticket.into(), resource, subject, created_at: Utc::now() }
    }

    /// Whether the ticket is older than `ttl` at `now`.
    #[must_use]
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.created_at > ttl
    }

    /// Form fields posted to the subject's ticket endpoint.
    #[must_use]
    pub fn form(&self) -> [(&'static str, &str); 3] {
        [
            ("ticket", self.ticket.as_str()),
            ("subject", self.subject.as_str()),
            ("resource", self.resource.as_str()),
        ]
    }
}

impl std::fmt::Debug for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ticket")
            .field("resource", &self.resource.as_str())
            .field("subject", &self.subject.as_str())
            .field("created_at", &self.created_at)
            .finish()
    }
}
