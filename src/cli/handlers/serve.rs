//! Serve command handler
//!
//! Handles the serve command including dry-run validation and server startup.

use crate::config::settings::Settings;
use crate::error::{AppError, AppResult};
use crate::server::Server;

/// Handler for the serve command
pub struct ServeCommandHandler {
    config: Settings,
}

impl ServeCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// Execute the serve command with optional dry-run support
    ///
    /// # Errors
    /// - Configuration validation errors
    /// - Server startup errors (if not dry-run)
    pub async fn execute(&self, dry_run: bool) -> AppResult<()> {
        if dry_run {
            return self.validate_only();
        }

        Server::new(self.config.clone())
            .run()
            .await
            .map_err(AppError::from)
    }

    /// Validate configuration without starting the server
    pub fn validate_only(&self) -> AppResult<()> {
        self.config.validate()?;

        let server = &self.config.server;
        let queue = &self.config.queue;
        let base_path = if server.base_path.is_empty() {
            "/"
        } else {
            server.base_path.as_str()
        };

        println!("✓ Configuration is valid");
        println!("✓ Server would bind to: {}", server.address());
        println!("✓ Queue endpoints mounted at: {base_path}");
        match queue.lease_timeout {
            0 => println!("✓ Job leases disabled"),
            secs => println!("✓ Job lease timeout: {secs}s"),
        }
        println!("✓ Worker token is configured");
        println!("✓ Logger configuration is valid");

        println!("Dry run completed successfully - configuration is ready for deployment");
        Ok(())
    }

    pub fn config(&self) -> &Settings {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_valid_config() -> Settings {
        let mut config = Settings::default();
        config.auth.worker_token = "secret".to_string();
        config
    }

    #[test]
    fn test_serve_handler_new() {
        let config = create_valid_config();
        let handler = ServeCommandHandler::new(config.clone());
        assert_eq!(handler.config(), &config);
    }

    #[tokio::test]
    async fn test_serve_handler_dry_run() {
        let handler = ServeCommandHandler::new(create_valid_config());
        assert!(handler.execute(true).await.is_ok());
    }

    #[tokio::test]
    async fn test_serve_handler_dry_run_invalid_config() {
        let mut config = create_valid_config();
        config.server.port = 0;
        let handler = ServeCommandHandler::new(config);

        assert!(matches!(
            handler.execute(true).await,
            Err(AppError::Configuration { ref key, .. }) if key == "server.port"
        ));
    }

    #[tokio::test]
    async fn test_serve_handler_dry_run_requires_token() {
        let handler = ServeCommandHandler::new(Settings::default());
        assert!(handler.execute(true).await.is_err());
    }
}
