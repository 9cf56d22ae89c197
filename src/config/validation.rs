//! Configuration validation logic
//!
//! Each section checks its own ranges and formats; `Settings::validate`
//! runs them all and reports the first failure.

use crate::config::error::ConfigError;
use crate::config::settings::{
    AuthConfig, LoggerSettings, QueueConfig, ServerConfig, Settings, WorkerConfig,
};

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

const VALID_LOG_FORMATS: &[&str] = &["full", "compact", "json"];

/// Longest accepted lease, in seconds (30 days)
const MAX_LEASE_TIMEOUT_SECS: u64 = 30 * 24 * 60 * 60;

impl ServerConfig {
    /// # Validation Rules
    /// - Port must be between 1 and 65535
    /// - Base path is empty or starts with `/` and has no trailing `/`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::validation(
                "server.port",
                "Port must be between 1 and 65535. Please specify a valid port number.",
            ));
        }

        validate_base_path(&self.base_path)
    }
}

/// Check a router base path such as `/queue`.
pub fn validate_base_path(base_path: &str) -> Result<(), ConfigError> {
    if base_path.is_empty() {
        return Ok(());
    }

    if !base_path.starts_with('/') || base_path.ends_with('/') {
        return Err(ConfigError::validation(
            "server.base_path",
            format!("Base path '{base_path}' must start with '/' and must not end with '/'."),
        ));
    }

    if base_path.contains("//") || base_path.chars().any(char::is_whitespace) {
        return Err(ConfigError::validation(
            "server.base_path",
            format!("Base path '{base_path}' contains empty segments or whitespace."),
        ));
    }

    Ok(())
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_token.trim().is_empty() {
            return Err(ConfigError::validation(
                "auth.worker_token",
                "Worker token is required. Set it in the configuration or via JOBPOLL_AUTH__WORKER_TOKEN.",
            ));
        }
        Ok(())
    }
}

impl QueueConfig {
    /// # Validation Rules
    /// - `lease_timeout` may be 0 (leases disabled) and must not exceed 30 days
    /// - `reap_interval`, `wait_poll_interval_ms` and `wait_timeout` must be greater than 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lease_timeout > MAX_LEASE_TIMEOUT_SECS {
            return Err(ConfigError::validation(
                "queue.lease_timeout",
                format!("Lease timeout must not exceed {MAX_LEASE_TIMEOUT_SECS} seconds."),
            ));
        }

        if self.reap_interval == 0 {
            return Err(ConfigError::validation(
                "queue.reap_interval",
                "Reap interval must be greater than 0 seconds.",
            ));
        }

        if self.wait_poll_interval_ms == 0 {
            return Err(ConfigError::validation(
                "queue.wait_poll_interval_ms",
                "Wait poll interval must be greater than 0 milliseconds.",
            ));
        }

        if self.wait_timeout == 0 {
            return Err(ConfigError::validation(
                "queue.wait_timeout",
                "Wait timeout must be greater than 0 seconds.",
            ));
        }

        Ok(())
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.server_url).map_err(|e| {
            ConfigError::validation(
                "worker.server_url",
                format!("Invalid server URL '{}': {e}", self.server_url),
            )
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::validation(
                "worker.server_url",
                format!("Server URL '{}' must use http or https.", self.server_url),
            ));
        }

        let positive = [
            ("worker.poll_interval_ms", self.poll_interval_ms as usize),
            ("worker.job_buffer_size", self.job_buffer_size),
            ("worker.result_buffer_size", self.result_buffer_size),
            ("worker.concurrency", self.concurrency),
            ("worker.request_timeout", self.request_timeout as usize),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::validation(field, "Value must be greater than 0."));
            }
        }

        Ok(())
    }
}

impl LoggerSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let level = self.level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::validation(
                "logger.level",
                format!(
                    "Invalid log level '{}'. Valid levels are: {}",
                    self.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            ));
        }

        if !self.console.enabled && !self.file.enabled {
            return Err(ConfigError::validation(
                "logger",
                "At least one output (console or file) must be enabled.",
            ));
        }

        if self.file.enabled && self.file.path.trim().is_empty() {
            return Err(ConfigError::validation(
                "logger.file.path",
                "File path cannot be empty when file output is enabled.",
            ));
        }

        let format = self.file.format.to_lowercase();
        if !VALID_LOG_FORMATS.contains(&format.as_str()) {
            return Err(ConfigError::validation(
                "logger.file.format",
                format!(
                    "Invalid log format '{}'. Valid formats are: {}",
                    self.file.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            ));
        }

        Ok(())
    }
}

impl Settings {
    /// Validate every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.auth.validate()?;
        self.queue.validate()?;
        self.worker.validate()?;
        self.logger.validate()?;
        Ok(())
    }
}
