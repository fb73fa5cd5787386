//! Data model of the authorization server.
//!
//! Identifiers and wire enums are validated when parsed, so every value
//! held by these types is already known to be well formed.

mod enums;
mod identifier;
mod metadata;
pub mod requests;
mod scopes;
mod session;
mod ticket;
mod token;

pub use enums::{Action, Decision, GrantType, ResponseType, Scope, TokenType};
pub use identifier::{ClientId, Me};
pub use metadata::Metadata;
pub use requests::{
    AuthorizationRequest, AuthorizeParams, Consent, ConsentParams, ExchangeParams, ExchangeRequest,
    IntrospectParams, TicketParams, TicketSendParams, TicketSendRequest, TokenParams, TokenRequest,
};
pub use scopes::Scopes;
pub use session::Session;
pub use ticket::Ticket;
pub use token::{Claims, Token, TokenInfo, TokenResponse};
