//! Network layer for acache
//!
//! A small hyper HTTP/1 server with bounded concurrency. Each connection is
//! served on its own task.

mod connection_pool;
mod http;
mod server;

pub use connection_pool::ConnectionLimiter;
pub use http::{error_response, not_found, text_response, HttpResponse};
pub use server::{HttpServer, RequestHandler};
