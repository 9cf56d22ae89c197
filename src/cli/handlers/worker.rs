//! Worker command handler
//!
//! Runs a [`QueueWorker`] with the built-in arithmetic processor until
//! Ctrl+C or SIGTERM.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::client::QueueWorker;
use crate::config::settings::Settings;
use crate::error::{AppError, AppResult};
use crate::server::shutdown_signal;

/// Arithmetic operation named by a job's `task` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Sub,
    Mul,
    Div,
}

/// `{"task": "add", "a": 2, "b": 3}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArithmeticJob {
    pub task: Operation,
    pub a: f64,
    pub b: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum ArithmeticError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("{task:?} overflowed to a non-finite result")]
    NonFinite { task: Operation },
}

/// Evaluate a single job.
pub fn evaluate(job: &ArithmeticJob) -> Result<f64, ArithmeticError> {
    let value = match job.task {
        Operation::Add => job.a + job.b,
        Operation::Sub => job.a - job.b,
        Operation::Mul => job.a * job.b,
        Operation::Div => {
            if job.b == 0.0 {
                return Err(ArithmeticError::DivisionByZero);
            }
            job.a / job.b
        }
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(ArithmeticError::NonFinite { task: job.task })
    }
}

/// Handler for the worker command
pub struct WorkerCommandHandler {
    config: Settings,
}

impl WorkerCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// Process jobs until a shutdown signal arrives, then drain and stop.
    pub async fn execute(&self) -> AppResult<()> {
        let worker_config = &self.config.worker;
        tracing::info!(
            server_url = %worker_config.server_url,
            concurrency = worker_config.concurrency,
            poll_interval_ms = worker_config.poll_interval_ms,
            "Starting arithmetic worker"
        );

        let worker: QueueWorker<ArithmeticJob, f64> = QueueWorker::connect(
            &worker_config.server_url,
            self.config.auth.worker_token.clone(),
            worker_config.worker_options(),
        )
        .map_err(|e| AppError::from(anyhow::Error::new(e)))?;

        let processor = worker.clone();
        let mut processing = tokio::spawn(async move {
            processor
                .process_jobs(|job: ArithmeticJob| async move { evaluate(&job) })
                .await
        });

        tokio::select! {
            _ = shutdown_signal() => {}
            finished = &mut processing => {
                tracing::warn!(outcome = ?finished, "Job processing stopped unexpectedly");
            }
        }

        worker.shutdown().await;
        if !processing.is_finished() {
            processing.abort();
        }

        tracing::info!("Worker shutdown complete");
        Ok(())
    }

    pub fn config(&self) -> &Settings {
        &self.config
    }
}
