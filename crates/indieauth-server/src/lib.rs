//! IndieAuth Server
//!
//! An IndieAuth authorization server: users sign in to third-party apps with
//! their own website URL, and sites delegate access to each other with
//! Ticket-Auth.
//!
//! # Features
//!
//! - **Identifier validation**: `client_id` and `me` URLs checked against the IndieAuth rules
//! - **PKCE**: plain, MD5, S1, S256 and S512 challenges
//! - **Stateless tokens**: signed JWTs with a revocation denylist
//! - **Endpoint discovery**: `Link` headers, HTML `rel` markup and metadata documents
//! - **Ticket-Auth**: send, receive and exchange tickets
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use indieauth_server::{client::HttpClient, config::Config, server::IndieAuthServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let transport = Arc::new(HttpClient::new(&config)?);
//!     IndieAuthServer::new(config, transport).run_http().await
//! }
//! ```

pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod models;
pub mod oauth;
pub mod random;
pub mod server;
pub mod store;

pub use client::{HttpClient, StaticTransport, Transport};
pub use config::Config;
pub use error::{OAuthError, SessionError, TicketError, TokenError};
