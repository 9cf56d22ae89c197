//! CLI argument parsing with clap
//!
//! This module defines the command-line interface structure using clap,
//! including all commands, arguments, and their documentation.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Pull-based job queue server and worker
#[derive(Parser, Debug)]
#[command(name = "jobpoll")]
#[command(about = "Pull-based job queue: an HTTP queue server and a polling worker")]
#[command(long_about = "
jobpoll runs either side of a pull-based job queue. The queue server keeps
jobs in memory and hands them out over HTTP; workers poll it for new jobs,
process them concurrently and post the results back. Both sides share a
secret that workers send in the X-Worker-Authorization header.

EXAMPLES:
    # Start the queue server with default configuration
    jobpoll serve

    # Start the server on all interfaces
    jobpoll serve --host 0.0.0.0 --port 8080

    # Use custom configuration file
    jobpoll --config /path/to/config.toml serve

    # Check configuration without starting the server
    jobpoll serve --dry-run

    # Run an arithmetic worker against a server
    jobpoll worker --url http://127.0.0.1:8080/queue --concurrency 4

The shared secret is read from auth.worker_token or JOBPOLL_AUTH__WORKER_TOKEN.

A standalone server starts with an empty queue. Producers embed jobpoll as a
library, build a Server and create jobs through Server::queue().
")]
#[command(version = crate::build::CLAP_LONG_VERSION)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path
    ///
    /// Load a single TOML file instead of the layered configuration directory.
    /// The file must exist and be readable.
    ///
    /// Example: --config /etc/jobpoll/production.toml
    #[arg(short, long, value_name = "FILE", value_parser = super::validation::validate_config_file_path)]
    pub config: Option<PathBuf>,

    /// Override environment detection
    ///
    /// Selects which `{environment}.toml` layer is loaded.
    ///
    /// Available values: development (dev), test, staging, production (prod)
    #[arg(short, long, value_enum)]
    pub env: Option<Environment>,

    /// Enable verbose logging
    ///
    /// Increases log output to debug level. Cannot be used with --quiet.
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-error output
    ///
    /// Reduces log output to error level only. Cannot be used with --verbose.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the queue server (default)
    ///
    /// Serves `GET {base}/jobs` and `POST {base}/results` until Ctrl+C or SIGTERM.
    ///
    /// The queue starts empty. Jobs are produced by programs that embed the
    /// server as a library and create them through Server::queue().
    ///
    /// Examples:
    ///   jobpoll serve                           # Start with defaults
    ///   jobpoll serve --host 0.0.0.0 --port 80  # Bind to all interfaces on port 80
    ///   jobpoll serve --dry-run                 # Validate config without starting
    Serve {
        /// Host address to bind to
        ///
        /// Use 127.0.0.1 for localhost only, or 0.0.0.0 to accept connections from any interface.
        ///
        /// Default: 127.0.0.1
        #[arg(long, value_name = "ADDRESS", value_parser = super::validation::validate_host_address)]
        host: Option<String>,

        /// Port number to listen on
        ///
        /// Default: 8080
        #[arg(short, long, value_name = "PORT", value_parser = super::validation::validate_port)]
        port: Option<u16>,

        /// Log level override
        ///
        /// Overrides both configuration file settings and global --verbose/--quiet flags.
        #[arg(long, value_enum)]
        log_level: Option<LogLevel>,

        /// Validate configuration and exit
        #[arg(long)]
        dry_run: bool,
    },
    /// Run an arithmetic worker
    ///
    /// Polls the queue for `{"task": "add|sub|mul|div", "a": .., "b": ..}` jobs
    /// and posts the numeric result back.
    ///
    /// Examples:
    ///   jobpoll worker --url http://queue.internal:8080/queue
    ///   jobpoll worker --concurrency 4
    Worker {
        /// Queue base URL, including the server's base path
        #[arg(short, long, value_name = "URL", value_parser = super::validation::validate_server_url)]
        url: Option<String>,

        /// Maximum number of jobs processed at once
        #[arg(short = 'n', long, value_name = "N", value_parser = super::validation::validate_concurrency)]
        concurrency: Option<usize>,

        /// Log level override
        #[arg(long, value_enum)]
        log_level: Option<LogLevel>,
    },
}

/// Environment options
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Environment {
    #[value(name = "development", alias = "dev")]
    Development,
    #[value(name = "test")]
    Test,
    #[value(name = "staging", alias = "stage")]
    Staging,
    #[value(name = "production", alias = "prod")]
    Production,
}

/// Log level options
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    #[value(name = "error")]
    Error,
    #[value(name = "warn", alias = "warning")]
    Warn,
    #[value(name = "info")]
    Info,
    #[value(name = "debug")]
    Debug,
    #[value(name = "trace")]
    Trace,
}

impl Cli {
    /// Validate argument combinations clap cannot express
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use --verbose and --quiet together".to_string());
        }

        Ok(())
    }

    /// Whether the parsed command only checks configuration
    pub fn is_dry_run(&self) -> bool {
        matches!(self.command, Some(Commands::Serve { dry_run: true, .. }))
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => "error".to_string(),
            LogLevel::Warn => "warn".to_string(),
            LogLevel::Info => "info".to_string(),
            LogLevel::Debug => "debug".to_string(),
            LogLevel::Trace => "trace".to_string(),
        }
    }
}

impl From<Environment> for crate::config::Environment {
    fn from(env: Environment) -> Self {
        match env {
            Environment::Development => crate::config::Environment::Development,
            Environment::Test => crate::config::Environment::Test,
            Environment::Staging => crate::config::Environment::Staging,
            Environment::Production => crate::config::Environment::Production,
        }
    }
}
