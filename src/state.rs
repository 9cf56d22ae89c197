//! Application state for the Axum router.

use std::sync::Arc;

use crate::queue::QueueServer;

/// Shared state handed to every handler.
///
/// Cloning is cheap: the queue and the token are both reference counted.
pub struct AppState<J, R> {
    pub queue: QueueServer<J, R>,
    /// Shared secret expected in the worker authorization header.
    pub worker_token: Arc<str>,
}

impl<J, R> AppState<J, R> {
    pub fn new(queue: QueueServer<J, R>, worker_token: impl Into<Arc<str>>) -> Self {
        Self {
            queue,
            worker_token: worker_token.into(),
        }
    }
}

impl<J, R> Clone for AppState<J, R> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            worker_token: Arc::clone(&self.worker_token),
        }
    }
}
