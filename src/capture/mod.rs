//! Capture of upstream responses into the route store

mod fetch;
mod manager;
mod response;

pub use fetch::{validate_upstream_url, Fetch, HttpFetcher, NetworkBody};
pub use manager::CacheManager;
pub use response::{StorableResponse, RESPONSE_MAGIC, RESPONSE_VERSION};
