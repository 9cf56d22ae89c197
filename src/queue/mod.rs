//! In-memory job queue shared by HTTP handlers and in-process producers.

pub mod error;
mod server;
mod store;

pub use error::{QueueError, QueueResult};
pub use server::{QueueOptions, QueueServer};
pub use store::JobStore;
