//! Lookup table from replay path to prepared response

use std::collections::HashMap;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::{Method, Response, StatusCode};
use tracing::{debug, warn};

use crate::key::route_path;
use crate::network::{not_found, HttpResponse};
use crate::storage::{Route, Routes};

/// Headers describing the original connection or framing, never replayed
const SKIPPED_HEADERS: &[&str] = &[
    "connection",
    "content-length",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// A route prepared for serving
#[derive(Debug, Clone)]
pub struct ReplayRoute {
    status: StatusCode,
    content_type: HeaderValue,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Bytes,
}

impl ReplayRoute {
    /// Prepare `route`, falling back to `default_content_type` when it has none
    #[must_use]
    pub fn from_route(route: &Route, default_content_type: &HeaderValue) -> Self {
        let status = StatusCode::from_u16(route.status_code).unwrap_or_else(|_| {
            warn!(
                "Route '{}' has invalid status {}, replaying 200",
                route.alias, route.status_code
            );
            StatusCode::OK
        });

        let content_type = if route.content_type.is_empty() {
            default_content_type.clone()
        } else {
            HeaderValue::from_str(&route.content_type).unwrap_or_else(|_| {
                warn!("Route '{}' has invalid content type", route.alias);
                default_content_type.clone()
            })
        };

        let mut headers = Vec::new();
        for (name, values) in &route.headers {
            let lower = name.to_ascii_lowercase();
            // Content-Type is set from the route's own field
            if lower == "content-type" || SKIPPED_HEADERS.contains(&lower.as_str()) {
                continue;
            }
            let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
                warn!("Route '{}' has invalid header name '{}'", route.alias, name);
                continue;
            };
            for value in values {
                match HeaderValue::from_str(value) {
                    Ok(value) => headers.push((name.clone(), value)),
                    Err(_) => warn!("Route '{}' has invalid value for '{}'", route.alias, name),
                }
            }
        }

        Self {
            status,
            content_type,
            headers,
            body: Bytes::from(route.data.clone()),
        }
    }

    /// Build a fresh response carrying the stored bytes
    #[must_use]
    pub fn to_response(&self) -> HttpResponse {
        let mut response = Response::new(Full::new(self.body.clone()));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            headers.append(name.clone(), value.clone());
        }
        headers.insert(CONTENT_TYPE, self.content_type.clone());

        response
    }

    /// Replayed status
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// Path to route mapping built once from a snapshot
#[derive(Debug, Default)]
pub struct ReplayTable {
    routes: HashMap<String, ReplayRoute>,
}

impl ReplayTable {
    /// Build the table; a later route with the same path replaces an earlier one
    #[must_use]
    pub fn from_routes(routes: &Routes, default_content_type: &HeaderValue) -> Self {
        let mut table = HashMap::with_capacity(routes.len());

        for route in routes {
            let path = route_path(&route.alias);
            debug!("Registering {} -> {}", path, route.url);

            if table
                .insert(path.clone(), ReplayRoute::from_route(route, default_content_type))
                .is_some()
            {
                warn!("Duplicate alias {}, last registration wins", path);
            }
        }

        Self { routes: table }
    }

    /// Route registered at `path`
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<&ReplayRoute> {
        self.routes.get(path)
    }

    /// Answer a request; only `GET` on a registered path matches
    ///
    /// `path` is the request path as sent on the wire and is percent-decoded
    /// before lookup, since aliases are stored decoded.
    #[must_use]
    pub fn respond(&self, method: &Method, path: &str) -> HttpResponse {
        let Ok(path) = urlencoding::decode(path) else {
            debug!("Undecodable path {}", path);
            return not_found();
        };

        match self.lookup(&path) {
            Some(route) if *method == Method::GET => route.to_response(),
            _ => not_found(),
        }
    }

    /// Number of registered paths
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// True if nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
