//! Capture orchestration: fetch, buffer, store

use std::fmt::Display;
use std::sync::Arc;

use hyper::body::Body;
use tracing::{debug, info, warn};

use crate::key::normalize_alias;
use crate::storage::{Route, RouteStore};
use crate::{AcacheError, Result};

use super::{Fetch, StorableResponse};

/// Captures upstream resources into the route store
pub struct CacheManager<F> {
    store: Arc<RouteStore>,
    fetcher: F,
    max_response_size: usize,
}

impl<F> CacheManager<F>
where
    F: Fetch,
    <F::Body as Body>::Error: Display,
{
    /// Create a new cache manager
    #[must_use]
    pub fn new(store: Arc<RouteStore>, fetcher: F) -> Self {
        Self {
            store,
            fetcher,
            max_response_size: usize::MAX,
        }
    }

    /// Refuse to capture bodies larger than `limit` bytes
    #[must_use]
    pub fn with_max_response_size(mut self, limit: usize) -> Self {
        self.max_response_size = limit;
        self
    }

    /// Underlying store
    #[must_use]
    pub fn store(&self) -> &RouteStore {
        &self.store
    }

    /// Fetch `url` and store the response under `alias`
    ///
    /// # Errors
    ///
    /// Returns error if any stage (alias, fetch, read, store) fails; nothing
    /// is written in that case
    pub async fn add_route(&self, url: &str, alias: &str) -> Result<()> {
        self.capture(url, alias).await.map(|_| ())
    }

    /// Like [`add_route`](Self::add_route), returning the stored route
    ///
    /// # Errors
    ///
    /// Returns error if any stage fails
    pub async fn capture(&self, url: &str, alias: &str) -> Result<Route> {
        let result = self.capture_inner(url, alias).await;

        if let Err(e) = &result {
            warn!("Capture of '{}' failed at {} stage: {}", alias, e.stage(), e);
        }

        result
    }

    async fn capture_inner(&self, url: &str, alias: &str) -> Result<Route> {
        let alias = normalize_alias(alias)?;

        debug!("Capturing {} as '{}'", url, alias);

        // Fetch completes before the store transaction opens
        let live = self.fetcher.fetch(url).await?;
        let response =
            StorableResponse::from_live_response_limited(live, self.max_response_size).await?;

        let route = Route::from_response(url, &alias, response)?;

        // SQLite writes block, keep them off the runtime workers
        let store = Arc::clone(&self.store);
        let route = tokio::task::spawn_blocking(move || store.put(&route).map(|()| route))
            .await
            .map_err(|e| AcacheError::Other(format!("Store task failed: {e}")))??;

        info!(
            "Captured {} as '{}' ({} bytes, key: {})",
            url,
            route.alias,
            route.data.len(),
            &route.id[..8]
        );

        Ok(route)
    }

    /// Numbered listing of stored routes
    ///
    /// # Errors
    ///
    /// Returns error if the snapshot cannot be loaded
    pub fn list_routes(&self) -> Result<String> {
        Ok(self.store.get_all()?.summary())
    }
}
