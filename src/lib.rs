//! acache - capture HTTP API responses once, replay them offline
//!
//! Responses are fetched from a remote API, stored in a single-file
//! database keyed by a short alias, and later served verbatim from local
//! routes without contacting the remote API again.

#![deny(unsafe_code)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::multiple_crate_versions
)]

pub mod capture;
pub mod config;
pub mod error;
pub mod key;
pub mod network;
pub mod proxy;
pub mod replay;
pub mod storage;

pub use error::{AcacheError, Result};
