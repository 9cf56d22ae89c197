//! Command executor for dispatching CLI commands
//!
//! This module provides the main entry point for executing CLI commands
//! after parsing and configuration loading.

use super::handlers::{ServeCommandHandler, WorkerCommandHandler};
use super::parser::{Cli, Commands};
use crate::config::settings::Settings;
use crate::error::{AppError, AppResult};

/// Execute a CLI command with the given settings
///
/// With no subcommand the queue server is started.
///
/// # Errors
/// Returns errors from command handlers or validation failures
pub async fn execute_command(cli: &Cli, settings: Settings) -> AppResult<()> {
    validate_command_args(cli, &settings)?;

    match &cli.command {
        Some(Commands::Serve { dry_run, .. }) => {
            ServeCommandHandler::new(settings).execute(*dry_run).await
        }
        None => ServeCommandHandler::new(settings).execute(false).await,
        Some(Commands::Worker { .. }) => WorkerCommandHandler::new(settings).execute().await,
    }
}

/// Validate command arguments before execution
fn validate_command_args(cli: &Cli, settings: &Settings) -> AppResult<()> {
    cli.validate().map_err(|reason| AppError::Validation {
        field: "cli_arguments".to_string(),
        reason,
    })?;

    match cli.command {
        Some(Commands::Serve { .. }) | None => warn_on_privileged_bind(settings),
        Some(Commands::Worker { .. }) => warn_on_plaintext_remote(settings),
    }

    Ok(())
}

fn warn_on_privileged_bind(settings: &Settings) {
    if settings.server.port < 1024 {
        eprintln!(
            "Warning: Binding to port {} typically requires root privileges",
            settings.server.port
        );
    }
}

fn warn_on_plaintext_remote(settings: &Settings) {
    let Ok(url) = reqwest::Url::parse(&settings.worker.server_url) else {
        return;
    };
    let local = matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"));
    if url.scheme() == "http" && !local {
        eprintln!(
            "Warning: Worker token will be sent in plain text to {}",
            settings.worker.server_url
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::parser::Cli;
    use clap::Parser;

    fn create_valid_config() -> Settings {
        let mut config = Settings::default();
        config.auth.worker_token = "secret".to_string();
        config
    }

    #[tokio::test]
    async fn test_execute_serve_dry_run() {
        let cli = Cli::try_parse_from(["jobpoll", "serve", "--dry-run"]).unwrap();
        assert!(execute_command(&cli, create_valid_config()).await.is_ok());
    }

    #[test]
    fn test_validate_command_args() {
        let cli = Cli::try_parse_from(["jobpoll", "serve", "--port", "8080"]).unwrap();
        assert!(validate_command_args(&cli, &create_valid_config()).is_ok());

        let cli = Cli::try_parse_from(["jobpoll", "worker"]).unwrap();
        assert!(validate_command_args(&cli, &create_valid_config()).is_ok());
    }

    #[test]
    fn test_validate_conflicting_args() {
        let cli = Cli {
            command: None,
            config: None,
            env: None,
            verbose: true,
            quiet: true,
        };

        assert!(matches!(
            validate_command_args(&cli, &create_valid_config()),
            Err(AppError::Validation { ref field, .. }) if field == "cli_arguments"
        ));
    }
}
