//! Worker client for the polling protocol.
//!
//! A [`QueueWorker`] keeps two bounded local queues between the remote
//! queue server and user code:
//!
//! ```text
//! fetch loop ──▶ [jobs] ──▶ dispatch ──▶ handler ──▶ [results] ──▶ submit loop
//! ```
//!
//! Both loops stop on [`QueueWorker::shutdown`], which also waits for
//! in-flight handlers and flushes queued results.

pub mod error;
pub mod options;
pub mod transport;
mod worker;


pub use error::{WorkerError, WorkerResult};
pub use options::WorkerOptions;
pub use transport::{HttpTransport, QueueTransport};
pub use worker::QueueWorker;
