//! Configuration merger for CLI arguments and config files
//!
//! This module handles merging CLI argument overrides with file-based configuration,
//! implementing the configuration precedence logic.

use std::path::Path;

use super::parser::{Cli, Commands};
use crate::config::error::ConfigError;
use crate::config::{ConfigLoader, Environment, settings::Settings};

/// Configuration merger that handles CLI argument integration with file-based configuration
///
/// CLI arguments override configuration file and environment values.
pub struct ConfigurationMerger {
    base_config: Settings,
}

impl ConfigurationMerger {
    pub fn new(base_config: Settings) -> Self {
        Self { base_config }
    }

    /// Load the base configuration from the given file, or from the layered
    /// configuration directory when no file is given.
    ///
    /// The result is not validated yet; `merge_cli_args` validates after
    /// overrides are applied so a CLI flag can fix an invalid file value.
    ///
    /// # Errors
    /// Returns ConfigError if the file is unreadable or parsing fails
    pub fn from_config_path(
        config_path: Option<&Path>,
        environment: Option<Environment>,
    ) -> Result<Self, ConfigError> {
        let mut loader = match config_path {
            Some(path) => {
                Self::validate_config_file_access(path)?;
                ConfigLoader::default().with_config_file(path)
            }
            None => ConfigLoader::new()?,
        };

        if let Some(environment) = environment {
            loader = loader.with_environment(environment);
        }

        Ok(Self::new(loader.load_unvalidated()?))
    }

    fn validate_config_file_access(path: &Path) -> Result<(), ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::validation(
                "config_file",
                format!("Configuration path is not a readable file: '{}'", path.display()),
            ));
        }

        std::fs::File::open(path).map(|_| ()).map_err(|e| {
            ConfigError::validation(
                "config_file",
                format!("Cannot read configuration file '{}': {e}", path.display()),
            )
        })
    }

    /// Merge CLI arguments with the base configuration
    ///
    /// Precedence:
    /// 1. Command-specific CLI arguments
    /// 2. Global CLI flags (`--verbose`, `--quiet`)
    /// 3. Configuration file and environment values
    ///
    /// # Errors
    /// Returns ConfigError if the merged configuration fails validation
    pub fn merge_cli_args(&self, cli: &Cli) -> Result<Settings, ConfigError> {
        let mut config = self.base_config.clone();

        Self::apply_global_overrides(&mut config, cli);

        if let Some(ref command) = cli.command {
            Self::apply_command_overrides(&mut config, command);
        }

        config.validate()?;

        Ok(config)
    }

    fn apply_global_overrides(config: &mut Settings, cli: &Cli) {
        if cli.verbose {
            config.logger.level = "debug".to_string();
        } else if cli.quiet {
            config.logger.level = "error".to_string();
        }
    }

    fn apply_command_overrides(config: &mut Settings, command: &Commands) {
        match command {
            Commands::Serve {
                host,
                port,
                log_level,
                dry_run: _,
            } => {
                if let Some(host_addr) = host {
                    config.server.host = host_addr.clone();
                }
                if let Some(port_num) = port {
                    config.server.port = *port_num;
                }
                if let Some(level) = log_level {
                    config.logger.level = (*level).into();
                }
            }
            Commands::Worker {
                url,
                concurrency,
                log_level,
            } => {
                if let Some(url) = url {
                    config.worker.server_url = url.clone();
                }
                if let Some(concurrency) = concurrency {
                    config.worker.concurrency = *concurrency;
                }
                if let Some(level) = log_level {
                    config.logger.level = (*level).into();
                }
            }
        }
    }

    pub fn config(&self) -> &Settings {
        &self.base_config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::parser::Cli;
    use crate::config::loader::{ENV_LOCK, EnvGuard};
    use clap::Parser;

    fn create_valid_base_config() -> Settings {
        let mut config = Settings::default();
        config.auth.worker_token = "secret".to_string();
        config
    }

    fn merge(args: &[&str]) -> Result<Settings, ConfigError> {
        let cli = Cli::try_parse_from(args).unwrap();
        ConfigurationMerger::new(create_valid_base_config()).merge_cli_args(&cli)
    }

    #[test]
    fn test_configuration_merger_new() {
        let base_config = Settings::default();
        let merger = ConfigurationMerger::new(base_config.clone());
        assert_eq!(merger.config(), &base_config);
    }

    #[test]
    fn test_merge_verbose_and_quiet_flags() {
        assert_eq!(merge(&["jobpoll", "--verbose"]).unwrap().logger.level, "debug");
        assert_eq!(merge(&["jobpoll", "--quiet"]).unwrap().logger.level, "error");
    }

    #[test]
    fn test_merge_serve_overrides() {
        let merged = merge(&["jobpoll", "serve", "--host", "0.0.0.0", "--port", "9090"]).unwrap();
        assert_eq!(merged.server.host, "0.0.0.0");
        assert_eq!(merged.server.port, 9090);
        assert_eq!(merged.worker, create_valid_base_config().worker);
    }

    #[test]
    fn test_merge_worker_overrides() {
        let merged = merge(&[
            "jobpoll",
            "worker",
            "--url",
            "http://10.0.0.5:8080/queue",
            "--concurrency",
            "3",
        ])
        .unwrap();
        assert_eq!(merged.worker.server_url, "http://10.0.0.5:8080/queue");
        assert_eq!(merged.worker.concurrency, 3);
        assert_eq!(merged.server, create_valid_base_config().server);
    }

    #[test]
    fn test_command_log_level_overrides_global() {
        let merged = merge(&["jobpoll", "--verbose", "serve", "--log-level", "warn"]).unwrap();
        assert_eq!(merged.logger.level, "warn");

        let merged = merge(&["jobpoll", "--quiet", "worker", "--log-level", "trace"]).unwrap();
        assert_eq!(merged.logger.level, "trace");
    }

    #[test]
    fn test_merge_validates_result() {
        let cli = Cli::try_parse_from(["jobpoll", "serve"]).unwrap();
        let merger = ConfigurationMerger::new(Settings::default());
        match merger.merge_cli_args(&cli) {
            Err(ConfigError::ValidationError { field, .. }) => {
                assert_eq!(field, "auth.worker_token");
            }
            other => panic!("Expected ValidationError, got {other:?}"),
        }
    }

    #[test]
    fn test_from_config_path_loads_single_file() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut env = EnvGuard::new();
        env.clear_jobpoll_vars();

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("jobpoll.toml");
        std::fs::write(
            &path,
            "[server]\nport = 7000\n\n[auth]\nworker_token = \"from-file\"\n",
        )
        .unwrap();

        let merger = ConfigurationMerger::from_config_path(Some(&path), None).unwrap();
        assert_eq!(merger.config().server.port, 7000);
        assert_eq!(merger.config().auth.worker_token, "from-file");

        let cli = Cli::try_parse_from(["jobpoll", "serve", "--port", "7001"]).unwrap();
        assert_eq!(merger.merge_cli_args(&cli).unwrap().server.port, 7001);
    }

    #[test]
    fn test_from_config_path_rejects_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(matches!(
            ConfigurationMerger::from_config_path(Some(dir.path()), None),
            Err(ConfigError::ValidationError { .. })
        ));
    }
}
