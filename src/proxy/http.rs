//! HTTP proxy that captures every forwarded response

use std::fmt::Display;
use std::sync::Arc;

use hyper::body::{Body, Incoming};
use hyper::header::HeaderValue;
use hyper::{Method, Request, StatusCode};
use tracing::{debug, info};

use crate::capture::{validate_upstream_url, CacheManager, Fetch};
use crate::network::{error_response, text_response, HttpResponse, RequestHandler};
use crate::replay::ReplayRoute;
use crate::{AcacheError, Result};

/// Forwards `GET` requests to a base URL and stores what comes back
///
/// The alias of each capture is the decoded request path, so replaying the
/// store later serves the same paths without the upstream.
pub struct HttpProxy<F> {
    manager: Arc<CacheManager<F>>,
    base_url: String,
    default_content_type: HeaderValue,
}

impl<F> HttpProxy<F>
where
    F: Fetch + 'static,
    <F::Body as Body>::Error: Display,
{
    /// Create a proxy in front of `base_url`
    ///
    /// # Errors
    ///
    /// Returns error if `base_url` is not an http(s) URL or the default
    /// content type is not a valid header value
    pub fn new(
        manager: Arc<CacheManager<F>>,
        base_url: &str,
        default_content_type: &str,
    ) -> Result<Self> {
        validate_upstream_url(base_url)?;

        let default_content_type = HeaderValue::from_str(default_content_type)
            .map_err(|e| AcacheError::ConfigError(format!("Invalid default_content_type: {e}")))?;

        Ok(Self {
            manager,
            base_url: base_url.trim_end_matches('/').to_string(),
            default_content_type,
        })
    }

    /// Upstream URL for an inbound path and query
    #[must_use]
    pub fn upstream_url(&self, path_and_query: &str) -> String {
        format!("{}{path_and_query}", self.base_url)
    }

    /// Capture one path and answer with the captured response
    pub async fn forward(&self, method: &Method, path_and_query: &str, path: &str) -> HttpResponse {
        if *method != Method::GET {
            return text_response(StatusCode::METHOD_NOT_ALLOWED, "only GET is proxied");
        }

        let alias = match urlencoding::decode(path) {
            Ok(alias) => alias.into_owned(),
            Err(_) => {
                return error_response(&AcacheError::InvalidAlias(path.to_string()));
            }
        };

        let url = self.upstream_url(path_and_query);
        debug!("Proxying {} -> {}", path, url);

        match self.manager.capture(&url, &alias).await {
            Ok(route) => {
                let replay = ReplayRoute::from_route(&route, &self.default_content_type);
                info!("Saved {} as '{}' ({})", url, route.alias, replay.status());
                replay.to_response()
            }
            Err(e) => error_response(&e),
        }
    }
}

impl<F> RequestHandler for HttpProxy<F>
where
    F: Fetch + 'static,
    <F::Body as Body>::Error: Display,
{
    async fn handle(&self, request: Request<Incoming>) -> HttpResponse {
        let method = request.method().clone();
        let uri = request.uri();
        let path_and_query = uri
            .path_and_query()
            .map_or_else(|| "/".to_string(), ToString::to_string);
        let path = uri.path().to_string();

        self.forward(&method, &path_and_query, &path).await
    }
}
