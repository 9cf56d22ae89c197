//! Server module for managing the queue server lifecycle
//!
//! This module handles queue initialization, the lease reaper, HTTP startup
//! and graceful shutdown.

use std::future::Future;

use serde_json::Value;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::api::routes::create_router;
use crate::config::{Environment, settings::Settings};
use crate::queue::QueueServer;
use crate::state::AppState;

/// Queue server for JSON payloads and results
pub type JsonQueue = QueueServer<Value, Value>;

/// HTTP server manager
///
/// The queue starts empty. Embedding programs produce jobs through
/// [`Server::queue`] before or while [`Server::serve`] runs:
///
/// ```ignore
/// let server = Server::new(settings);
/// let queue = server.queue();
/// tokio::spawn(server.run());
///
/// let outcome = queue.submit_and_wait(json!({"task": "add", "a": 2, "b": 3})).await?;
/// ```
pub struct Server {
    settings: Settings,
    queue: JsonQueue,
}

impl Server {
    /// Create a new server with an empty queue built from the settings
    pub fn new(settings: Settings) -> Self {
        let queue = QueueServer::new(settings.queue.queue_options());
        Self { settings, queue }
    }

    /// Handle to the queue served by this server, for producing jobs in-process
    pub fn queue(&self) -> JsonQueue {
        self.queue.clone()
    }

    /// Bind the configured address and serve until Ctrl+C or SIGTERM
    ///
    /// # Errors
    /// - Address binding errors
    /// - Server runtime errors
    pub async fn run(self) -> anyhow::Result<()> {
        tracing::info!(
            app_name = %self.settings.application.name,
            app_version = %self.settings.application.version,
            environment = %Environment::from_env().as_str(),
            "Application starting"
        );

        let address = self.settings.server.address();
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!(error = %e, address = %address, "Failed to bind to address");
            anyhow::anyhow!("Failed to bind to {}: {}", address, e)
        })?;

        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let server = &self.settings.server;
        let queue_config = &self.settings.queue;

        tracing::info!(
            host = %server.host,
            port = server.port,
            base_path = %server.base_path,
            "Server configuration loaded"
        );
        tracing::info!(
            lease_timeout = queue_config.lease_timeout,
            reap_interval = queue_config.reap_interval,
            "Queue configuration loaded"
        );
        tracing::info!(
            level = %self.settings.logger.level,
            console_enabled = %self.settings.logger.console.enabled,
            file_enabled = %self.settings.logger.file.enabled,
            "Logger configuration loaded"
        );

        let reaper_token = CancellationToken::new();
        let reaper = queue_config.queue_options().lease_timeout.map(|_| {
            self.queue
                .spawn_lease_reaper(queue_config.reap_interval(), reaper_token.clone())
        });

        let state = AppState::new(self.queue.clone(), self.settings.auth.worker_token.as_str());
        let router = create_router(state, &server.base_path);

        if let Ok(address) = listener.local_addr() {
            tracing::info!(address = %address, "Server listening");
        }

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await;

        reaper_token.cancel();
        if let Some(reaper) = reaper
            && let Err(e) = reaper.await
        {
            tracing::error!(error = %e, "Lease reaper ended abnormally");
        }

        served?;
        tracing::info!(pending_jobs = self.queue.len(), "Server shutdown complete");

        Ok(())
    }
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
