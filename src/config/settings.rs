//! Configuration settings structures for jobpoll
//!
//! This module defines all configuration structures that can be loaded from
//! TOML files and environment variables.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::WorkerOptions;
use crate::client::options::build_http_client;
use crate::config::error::ConfigError;
use crate::logger::{ConsoleConfig, FileConfig, LogFormat, LoggerConfig};
use crate::queue::QueueOptions;

// ============================================================================
// Default value functions
// ============================================================================

fn default_app_name() -> String {
    "jobpoll".to_string()
}

fn default_app_version() -> String {
    crate::pkg_version().to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_lease_timeout() -> u64 {
    300
}

fn default_reap_interval() -> u64 {
    5
}

fn default_wait_poll_interval_ms() -> u64 {
    50
}

fn default_wait_timeout() -> u64 {
    60
}

fn default_server_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_buffer_size() -> usize {
    100
}

fn default_concurrency() -> usize {
    16
}

fn default_request_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_path() -> String {
    "logs/jobpoll.log".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

// ============================================================================
// Application Configuration
// ============================================================================

/// Application basic information configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    #[serde(default = "default_app_name")]
    pub name: String,

    #[serde(default = "default_app_version")]
    pub version: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: default_app_version(),
        }
    }
}

// ============================================================================
// Server Configuration
// ============================================================================

/// Queue server HTTP configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Prefix for the queue endpoints, e.g. `/queue`. Empty mounts them at the root.
    #[serde(default)]
    pub base_path: String,
}

impl ServerConfig {
    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_path: String::new(),
        }
    }
}

// ============================================================================
// Auth Configuration
// ============================================================================

/// Shared secret exchanged between the queue server and its workers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub worker_token: String,
}

// ============================================================================
// Queue Configuration
// ============================================================================

/// Server-side queue behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Seconds a fetched job may stay pending before it is handed out again (0 disables)
    #[serde(default = "default_lease_timeout")]
    pub lease_timeout: u64,

    /// Seconds between expired lease sweeps
    #[serde(default = "default_reap_interval")]
    pub reap_interval: u64,

    /// Fallback re-check interval while waiting for a job, in milliseconds
    #[serde(default = "default_wait_poll_interval_ms")]
    pub wait_poll_interval_ms: u64,

    /// Seconds to wait for a job outcome before giving up
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout: u64,
}

impl QueueConfig {
    pub fn queue_options(&self) -> QueueOptions {
        QueueOptions {
            lease_timeout: (self.lease_timeout > 0).then(|| Duration::from_secs(self.lease_timeout)),
            wait_poll_interval: Duration::from_millis(self.wait_poll_interval_ms),
            wait_timeout: self.wait_timeout(),
        }
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            lease_timeout: default_lease_timeout(),
            reap_interval: default_reap_interval(),
            wait_poll_interval_ms: default_wait_poll_interval_ms(),
            wait_timeout: default_wait_timeout(),
        }
    }
}

// ============================================================================
// Worker Configuration
// ============================================================================

/// Worker client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Queue base URL including the server's base path
    #[serde(default = "default_server_url")]
    pub server_url: String,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_buffer_size")]
    pub job_buffer_size: usize,

    #[serde(default = "default_buffer_size")]
    pub result_buffer_size: usize,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl WorkerConfig {
    pub fn worker_options(&self) -> WorkerOptions {
        WorkerOptions::default()
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
            .with_job_buffer_size(self.job_buffer_size)
            .with_result_buffer_size(self.result_buffer_size)
            .with_concurrency(self.concurrency)
            .with_http_client(build_http_client(Duration::from_secs(self.request_timeout)))
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            poll_interval_ms: default_poll_interval_ms(),
            job_buffer_size: default_buffer_size(),
            result_buffer_size: default_buffer_size(),
            concurrency: default_concurrency(),
            request_timeout: default_request_timeout(),
        }
    }
}

// ============================================================================
// Logger Configuration
// ============================================================================

/// Console output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub colored: bool,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            colored: default_true(),
        }
    }
}

/// File output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_log_path")]
    pub path: String,

    #[serde(default = "default_true")]
    pub append: bool,

    /// Log format: "full", "compact", or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_log_path(),
            append: default_true(),
            format: default_log_format(),
        }
    }
}

/// Logger configuration as it appears in configuration files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub console: ConsoleSettings,

    #[serde(default)]
    pub file: FileSettings,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            console: ConsoleSettings::default(),
            file: FileSettings::default(),
        }
    }
}

impl LoggerSettings {
    /// Convert the file representation into the runtime LoggerConfig
    pub fn into_logger_config(self) -> Result<LoggerConfig, ConfigError> {
        let console = ConsoleConfig::new(self.console.enabled, self.console.colored);
        let file = self.file.into_file_config()?;

        LoggerConfig::new(console, file, self.level)
            .map_err(|e| ConfigError::validation("logger", e.to_string()))
    }
}

impl FileSettings {
    pub fn into_file_config(self) -> Result<FileConfig, ConfigError> {
        let format = self
            .format
            .parse::<LogFormat>()
            .map_err(|e| ConfigError::validation("logger.file.format", e.to_string()))?;

        FileConfig::new(self.enabled, PathBuf::from(self.path), self.append, format)
            .map_err(|e| ConfigError::validation("logger.file", e.to_string()))
    }
}

// ============================================================================
// Main Settings Structure
// ============================================================================

/// Complete application settings
///
/// This structure represents the entire configuration that can be loaded
/// from TOML files and environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub application: ApplicationConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub logger: LoggerSettings,
}
