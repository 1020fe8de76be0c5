//! Replay of captured responses as live HTTP routes

mod server;
mod table;

pub use server::{start, ReplayServer};
pub use table::{ReplayRoute, ReplayTable};
