//! IndieAuth HTTP server.
//!
//! Wires the protocol engines to their in-memory stores, serves them over
//! axum and runs the background sweepers that reap expired codes, tickets
//! and revocation records.

pub mod handlers;
pub mod transport;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::client::Transport;
use crate::config::Config;
use crate::discovery::Resolver;
use crate::oauth::{SessionManager, TicketService, TokenService};
use crate::store::{Expiring, MemoryRevocationStore, MemorySessionStore, MemoryTicketStore, sweeper};

pub use transport::{HttpState, create_router};

/// IndieAuth authorization server.
pub struct IndieAuthServer {
    state: Arc<HttpState>,
    /// Stores swept in the background, by name.
    expiring: Vec<(&'static str, Arc<dyn Expiring>)>,
}

impl IndieAuthServer {
    /// Build the server on in-memory stores, reaching other sites through
    /// `transport`.
    #[must_use]
    pub fn new(config: Config, transport: Arc<dyn Transport>) -> Self {
        let sessions = Arc::new(MemorySessionStore::new(config.code_lifetime()));
        let tickets = Arc::new(MemoryTicketStore::new(config.ticket_lifetime()));
        let revocations = Arc::new(MemoryRevocationStore::new());

        let resolver = Resolver::new(Arc::clone(&transport));
        let tokens = TokenService::new(&config, revocations.clone());
        let state = HttpState {
            sessions: SessionManager::new(sessions.clone(), resolver.clone()),
            tickets: TicketService::new(
                tickets.clone(),
                resolver,
                transport,
                tokens.clone(),
                config.ticket_scope.clone(),
            ),
            tokens,
            config,
        };

        let expiring = vec![
            ("sessions", sessions as Arc<dyn Expiring>),
            ("tickets", tickets as Arc<dyn Expiring>),
            ("revocations", revocations as Arc<dyn Expiring>),
        ];

        Self { state: Arc::new(state), expiring }
    }

    /// Shared handler state.
    #[must_use]
    pub fn state(&self) -> Arc<HttpState> {
        Arc::clone(&self.state)
    }

    /// The HTTP router, for serving or for driving in tests.
    #[must_use]
    pub fn router(&self) -> Router {
        create_router(self.state())
    }

    /// Start one sweeper per expiring store. Each stops when `shutdown`
    /// turns `true`.
    fn spawn_sweepers(&self, shutdown: &watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let period = self.state.config.gc_interval;
        self.expiring
            .iter()
            .map(|(name, store)| sweeper::spawn(*name, Arc::clone(store), period, shutdown.clone()))
            .collect()
    }

    /// Serve HTTP on the configured port until ctrl-c.
    ///
    /// # Errors
    ///
    /// Returns error on bind or server failure.
    pub async fn run_http(self) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.port));
        tracing::info!(issuer = %self.state.config.issuer, "Starting IndieAuth server");

        let listener = TcpListener::bind(addr).await?;
        tracing::info!("HTTP server listening on http://{}", addr);

        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on `listener` with the store sweepers running, until `shutdown`
    /// completes. Sweepers are stopped and awaited before returning, whether
    /// or not the server exited cleanly.
    ///
    /// # Errors
    ///
    /// Returns error on server failure.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sweepers = self.spawn_sweepers(&shutdown_rx);

        let result = axum::serve(listener, self.router()).with_graceful_shutdown(shutdown).await;

        let _ = shutdown_tx.send(true);
        for joined in futures::future::join_all(sweepers).await {
            if let Err(e) = joined {
                tracing::warn!(error = %e, "Sweeper task failed");
            }
        }

        tracing::info!("HTTP server shut down");
        Ok(result?)
    }
}

impl std::fmt::Debug for IndieAuthServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndieAuthServer")
            .field("issuer", &self.state.config.issuer.as_str())
            .field("stores", &self.expiring.iter().map(|(name, _)| *name).collect::<Vec<_>>())
            .finish()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
