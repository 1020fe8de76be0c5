//! Replay server exposing every stored route

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::body::Incoming;
use hyper::header::HeaderValue;
use hyper::Request;
use tracing::{debug, info};

use crate::config::Config;
use crate::network::{HttpResponse, HttpServer, RequestHandler};
use crate::storage::RouteStore;
use crate::{AcacheError, Result};

use super::ReplayTable;

impl RequestHandler for ReplayTable {
    async fn handle(&self, request: Request<Incoming>) -> HttpResponse {
        let response = self.respond(request.method(), request.uri().path());
        debug!(
            "{} {} -> {}",
            request.method(),
            request.uri().path(),
            response.status()
        );
        response
    }
}

/// Replay server bound to its listen address
///
/// The route snapshot is loaded once at bind time; routes stored later are
/// served after a restart.
pub struct ReplayServer {
    server: HttpServer,
    table: Arc<ReplayTable>,
}

impl ReplayServer {
    /// Load every route from `store` and bind `config.bind_address`
    ///
    /// # Errors
    ///
    /// Returns error if the snapshot cannot be loaded or the address cannot
    /// be bound
    pub async fn bind(store: &RouteStore, config: &Config) -> Result<Self> {
        let routes = store.get_all()?;

        let default_content_type = HeaderValue::from_str(&config.default_content_type)
            .map_err(|e| AcacheError::ConfigError(format!("Invalid default_content_type: {e}")))?;
        let table = ReplayTable::from_routes(&routes, &default_content_type);

        let addr = config.socket_addr()?;
        let server = HttpServer::bind(addr, config.limits.max_connections).await?;

        info!("Registered {} routes", table.len());

        Ok(Self {
            server,
            table: Arc::new(table),
        })
    }

    /// Bound address
    ///
    /// # Errors
    ///
    /// Returns error if the socket address cannot be read
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.server.local_addr()
    }

    /// Number of registered routes
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.table.len()
    }

    /// Serve until Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns error if the listener fails
    pub async fn run(self) -> Result<()> {
        self.server.run(self.table).await
    }

    /// Serve until `shutdown` completes
    ///
    /// # Errors
    ///
    /// Returns error if the listener fails
    pub async fn serve_until<S>(self, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        self.server.serve_until(self.table, shutdown).await
    }
}

/// Load the store, bind, and serve until Ctrl-C
///
/// # Errors
///
/// Returns error if loading, binding or serving fails
pub async fn start(store: &RouteStore, config: &Config) -> Result<()> {
    ReplayServer::bind(store, config).await?.run().await
}
