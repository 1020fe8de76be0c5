//! Recording proxy in front of a remote API

mod http;

pub use http::HttpProxy;
