//! IndieAuth protocol engines.
//!
//! ## Supported Standards
//! - IndieAuth (authorization code flow with `me` discovery)
//! - RFC 7636: PKCE (plain, MD5, S1, S256, S512)
//! - RFC 7519: stateless JWT access tokens with a revocation denylist
//! - Ticket-Auth: delegating resource access to another site

pub mod pkce;
pub mod session;
pub mod ticket;
pub mod token;

pub use session::SessionManager;
pub use ticket::TicketService;
pub use token::{NewToken, TokenService};
