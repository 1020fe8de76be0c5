//! Upstream fetch collaborator

use std::future::Future;
use std::time::Duration;

use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use http_body_util::StreamBody;
use hyper::body::{Body, Bytes, Frame};
use hyper::Response;
use tracing::debug;

use crate::{AcacheError, Result};

/// Fetches one upstream resource as a live response
///
/// The returned body is one-shot; it is drained exactly once by
/// [`StorableResponse`](super::StorableResponse).
pub trait Fetch: Send + Sync {
    /// Streaming body type
    type Body: Body<Data = Bytes> + Send + 'static;

    /// Fetch `url`
    ///
    /// Implementations report unreachable upstreams and non-success
    /// statuses as `Fetch` errors.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Response<Self::Body>>> + Send;
}

/// Body of a response fetched over the network
pub type NetworkBody = StreamBody<BoxStream<'static, std::result::Result<Frame<Bytes>, reqwest::Error>>>;

/// HTTP(S) fetcher
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a new fetcher
    ///
    /// # Errors
    ///
    /// Returns error if the TLS backend cannot be initialized
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("acache/", env!("CARGO_PKG_VERSION")))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| AcacheError::Other(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    type Body = NetworkBody;

    async fn fetch(&self, url: &str) -> Result<Response<NetworkBody>> {
        validate_upstream_url(url)?;

        debug!("Fetching {}", url);

        let upstream = self.client.get(url).send().await.map_err(|e| AcacheError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let status = upstream.status();
        if !status.is_success() {
            return Err(AcacheError::Fetch {
                url: url.to_string(),
                reason: format!("upstream answered {status}"),
            });
        }

        let headers = upstream.headers().clone();
        let body = StreamBody::new(upstream.bytes_stream().map_ok(Frame::data).boxed());

        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;

        Ok(response)
    }
}

/// Check that `url` is an absolute `http` or `https` URL
///
/// # Errors
///
/// Returns `Fetch` if the scheme is missing or unsupported
pub fn validate_upstream_url(url: &str) -> Result<()> {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"));

    match rest {
        Some(rest) if !rest.is_empty() => Ok(()),
        _ => Err(AcacheError::Fetch {
            url: url.to_string(),
            reason: "invalid URL, expected http:// or https://".to_string(),
        }),
    }
}
