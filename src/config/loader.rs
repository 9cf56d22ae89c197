//! Configuration loader for jobpoll
//!
//! This module provides the `ConfigLoader` struct that handles loading
//! configuration from multiple sources with proper precedence.

use std::path::{Path, PathBuf};

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};

use crate::config::environment::Environment as AppEnvironment;
use crate::config::error::ConfigError;
use crate::config::settings::Settings;

const CONFIG_DIR_ENV: &str = "JOBPOLL_CONFIG_DIR";

const CONFIG_FILE_ENV: &str = "JOBPOLL_CONFIG_FILE";

const DEFAULT_CONFIG_DIR: &str = "config";

/// Environment variable prefix for configuration overrides
const ENV_PREFIX: &str = "JOBPOLL";

/// Separator for nested configuration keys in environment variables
const ENV_SEPARATOR: &str = "__";

/// Configuration loader that handles layered configuration loading
///
/// The loader supports the following configuration sources (in order of priority):
/// 1. `default.toml` - Base default configuration (required)
/// 2. `{environment}.toml` - Environment-specific configuration (optional)
/// 3. `local.toml` - Local development overrides (optional)
/// 4. `JOBPOLL_*` environment variables (highest priority)
#[derive(Debug)]
pub struct ConfigLoader {
    config_dir: PathBuf,
    /// Specific configuration file path (if set, skips layered loading)
    config_file: Option<PathBuf>,
    environment: AppEnvironment,
}

impl ConfigLoader {
    /// Create a new configuration loader from the process environment
    ///
    /// This reads:
    /// - Configuration directory (`JOBPOLL_CONFIG_DIR`)
    /// - Specific configuration file (`JOBPOLL_CONFIG_FILE`)
    /// - Application environment (`JOBPOLL_APP_ENV`)
    ///
    /// # Errors
    ///
    /// Returns an error if both `JOBPOLL_CONFIG_DIR` and `JOBPOLL_CONFIG_FILE`
    /// are set, as they are mutually exclusive.
    pub fn new() -> Result<Self, ConfigError> {
        let config_dir_var = std::env::var(CONFIG_DIR_ENV).ok();
        let config_file = std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from);

        if config_file.is_some() && config_dir_var.is_some() {
            return Err(ConfigError::mutual_exclusivity(
                "JOBPOLL_CONFIG_DIR and JOBPOLL_CONFIG_FILE cannot both be set. \
                 Use JOBPOLL_CONFIG_DIR for layered configuration or \
                 JOBPOLL_CONFIG_FILE for a single configuration file.",
            ));
        }

        Ok(Self {
            config_dir: config_dir_var
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR)),
            config_file,
            environment: AppEnvironment::from_env(),
        })
    }

    /// Load a single file instead of the layered directory.
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn with_environment(mut self, environment: AppEnvironment) -> Self {
        self.environment = environment;
        self
    }

    pub fn environment(&self) -> AppEnvironment {
        self.environment
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_file(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }

    /// Load configuration from all sources and validate it
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `default.toml` (or the single configuration file) is not found
    /// - Configuration parsing fails
    /// - Configuration validation fails
    pub fn load(&self) -> Result<Settings, ConfigError> {
        let settings = self.load_unvalidated()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load configuration without validating it.
    ///
    /// Used when command line overrides are applied before validation.
    pub fn load_unvalidated(&self) -> Result<Settings, ConfigError> {
        let config = self.build_config()?;
        config.try_deserialize().map_err(|e| {
            ConfigError::ParseError(format!("Failed to deserialize configuration: {e}"))
        })
    }

    fn build_config(&self) -> Result<Config, ConfigError> {
        let builder = Config::builder();

        let builder = match self.config_file {
            Some(ref config_file) => add_file_source(builder, config_file, true)?,
            None => self.build_layered_config(builder)?,
        };

        // JOBPOLL_SERVER__PORT -> server.port
        let builder = add_env_source(builder);

        builder.build().map_err(ConfigError::from)
    }

    fn build_layered_config(
        &self,
        builder: ConfigBuilder<DefaultState>,
    ) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let default_path = self.config_dir.join("default.toml");
        let builder = add_file_source(builder, &default_path, true)?;

        let env_path = self
            .config_dir
            .join(format!("{}.toml", self.environment.as_str()));
        let builder = add_file_source(builder, &env_path, false)?;

        let local_path = self.config_dir.join("local.toml");
        add_file_source(builder, &local_path, false)
    }
}

fn add_file_source(
    builder: ConfigBuilder<DefaultState>,
    path: &Path,
    required: bool,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    if required && !path.exists() {
        return Err(ConfigError::file_not_found(format!(
            "Required configuration file not found: {}",
            path.display()
        )));
    }

    let Some(path_str) = path.to_str() else {
        return Err(ConfigError::ParseError(format!(
            "Configuration path is not valid UTF-8: {}",
            path.display()
        )));
    };

    Ok(builder.add_source(File::new(path_str, FileFormat::Toml).required(required)))
}

fn add_env_source(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator(ENV_SEPARATOR)
            .ignore_empty(true)
            .try_parsing(true),
    )
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| Self {
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            config_file: None,
            environment: AppEnvironment::default(),
        })
    }
}

/// Serializes tests that touch process environment variables.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Sets environment variables for a test and restores them on drop.
#[cfg(test)]
pub(crate) struct EnvGuard {
    vars_to_restore: Vec<(String, Option<String>)>,
}

#[cfg(test)]
impl EnvGuard {
    pub(crate) fn new() -> Self {
        Self {
            vars_to_restore: Vec::new(),
        }
    }

    pub(crate) fn set(&mut self, key: &str, value: &str) {
        self.vars_to_restore.push((key.to_string(), std::env::var(key).ok()));
        unsafe {
            std::env::set_var(key, value);
        }
    }

    pub(crate) fn remove(&mut self, key: &str) {
        self.vars_to_restore.push((key.to_string(), std::env::var(key).ok()));
        unsafe {
            std::env::remove_var(key);
        }
    }

    /// Clear every variable the loader reads.
    pub(crate) fn clear_jobpoll_vars(&mut self) {
        let keys: Vec<String> = std::env::vars()
            .map(|(key, _)| key)
            .filter(|key| key.starts_with("JOBPOLL_"))
            .collect();
        for key in keys {
            self.remove(&key);
        }
    }
}

#[cfg(test)]
impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, original_value) in self.vars_to_restore.iter().rev() {
            unsafe {
                match original_value {
                    Some(value) => std::env::set_var(key, value),
                    None => std::env::remove_var(key),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup_config_dir(files: &[(&str, &str)]) -> TempDir {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        for (name, content) in files {
            fs::write(temp_dir.path().join(name), content).expect("Failed to write config file");
        }
        temp_dir
    }

    const DEFAULT_TOML: &str = r#"
[application]
name = "jobpoll-test"
version = "1.0.0"

[server]
host = "127.0.0.1"
port = 3000
base_path = "/queue"

[auth]
worker_token = "from-default"

[queue]
lease_timeout = 120

[logger]
level = "info"
"#;

    #[test]
    fn test_config_loader_new_default() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut env = EnvGuard::new();
        env.clear_jobpoll_vars();

        let loader = ConfigLoader::new().expect("Should create loader");
        assert_eq!(loader.config_dir(), Path::new("config"));
        assert!(loader.config_file().is_none());
        assert_eq!(loader.environment(), AppEnvironment::Development);
    }

    #[test]
    fn test_config_loader_reads_env_vars() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut env = EnvGuard::new();
        env.clear_jobpoll_vars();
        env.set("JOBPOLL_CONFIG_DIR", "/custom/config");
        env.set("JOBPOLL_APP_ENV", "production");

        let loader = ConfigLoader::new().expect("Should create loader");
        assert_eq!(loader.config_dir(), Path::new("/custom/config"));
        assert_eq!(loader.environment(), AppEnvironment::Production);
    }

    #[test]
    fn test_config_loader_mutual_exclusivity_error() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut env = EnvGuard::new();
        env.clear_jobpoll_vars();
        env.set("JOBPOLL_CONFIG_DIR", "/custom/config");
        env.set("JOBPOLL_CONFIG_FILE", "/path/to/config.toml");

        match ConfigLoader::new() {
            Err(ConfigError::MutualExclusivityError(msg)) => {
                assert!(msg.contains("JOBPOLL_CONFIG_DIR"));
                assert!(msg.contains("JOBPOLL_CONFIG_FILE"));
            }
            other => panic!("Expected MutualExclusivityError, got {other:?}"),
        }
    }

    #[test]
    fn test_load_missing_default_toml() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut env = EnvGuard::new();
        env.clear_jobpoll_vars();

        let temp_dir = setup_config_dir(&[]);
        env.set("JOBPOLL_CONFIG_DIR", temp_dir.path().to_str().unwrap());

        match ConfigLoader::new().unwrap().load() {
            Err(ConfigError::FileNotFound(msg)) => assert!(msg.contains("default.toml")),
            other => panic!("Expected FileNotFound error, got {other:?}"),
        }
    }

    #[test]
    fn test_layered_loading_precedence() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut env = EnvGuard::new();
        env.clear_jobpoll_vars();

        let temp_dir = setup_config_dir(&[
            ("default.toml", DEFAULT_TOML),
            ("test.toml", "[server]\nport = 4000\n"),
            ("local.toml", "[auth]\nworker_token = \"from-local\"\n"),
        ]);
        env.set("JOBPOLL_CONFIG_DIR", temp_dir.path().to_str().unwrap());
        env.set("JOBPOLL_APP_ENV", "test");
        env.set("JOBPOLL_QUEUE__LEASE_TIMEOUT", "0");

        let settings = ConfigLoader::new().unwrap().load().unwrap();
        assert_eq!(settings.application.name, "jobpoll-test");
        assert_eq!(settings.server.port, 4000);
        assert_eq!(settings.server.base_path, "/queue");
        assert_eq!(settings.auth.worker_token, "from-local");
        assert_eq!(settings.queue.lease_timeout, 0);
        assert_eq!(settings.worker.concurrency, 16);
    }

    #[test]
    fn test_single_file_mode_skips_layers() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut env = EnvGuard::new();
        env.clear_jobpoll_vars();

        let temp_dir = setup_config_dir(&[
            ("custom.toml", DEFAULT_TOML),
            ("local.toml", "[server]\nport = 5000\n"),
        ]);

        let loader = ConfigLoader::new()
            .unwrap()
            .with_config_file(temp_dir.path().join("custom.toml"));
        let settings = loader.load().unwrap();
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.auth.worker_token, "from-default");
    }

    #[test]
    fn test_load_rejects_invalid_settings() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut env = EnvGuard::new();
        env.clear_jobpoll_vars();

        let temp_dir = setup_config_dir(&[("default.toml", "[server]\nport = 0\n")]);
        env.set("JOBPOLL_CONFIG_DIR", temp_dir.path().to_str().unwrap());

        let loader = ConfigLoader::new().unwrap();
        assert!(matches!(
            loader.load(),
            Err(ConfigError::ValidationError { .. })
        ));
        assert_eq!(loader.load_unvalidated().unwrap().server.port, 0);
    }
}
