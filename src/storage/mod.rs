//! Durable storage for captured routes

mod route;
mod store;

pub use route::{Route, Routes};
pub use store::RouteStore;

/// Name of the single bucket holding all routes
pub const BUCKET_NAME: &str = "acache";
