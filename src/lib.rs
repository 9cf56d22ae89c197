//! jobpoll library
//!
//! A pull-based job queue: an in-memory queue server exposed over HTTP
//! and a worker client that polls it, processes jobs concurrently and
//! posts results back.

use shadow_rs::shadow;
shadow!(build);

pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod queue;
pub mod server;
pub mod state;

pub use state::AppState;

pub fn pkg_version() -> &'static str {
    build::PKG_VERSION
}

pub fn clap_long_version() -> &'static str {
    build::CLAP_LONG_VERSION
}
