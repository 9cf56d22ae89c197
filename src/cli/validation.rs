//! CLI argument validation functions
//!
//! This module provides custom validation functions for CLI arguments
//! that go beyond what clap can validate automatically.

use std::fs;
use std::path::PathBuf;

/// Validate port number is within valid range (1-65535)
pub fn validate_port(port_str: &str) -> Result<u16, String> {
    let port: u16 = port_str.parse().map_err(|_| {
        format!("Port must be a valid number between 1 and 65535, got: '{port_str}'")
    })?;

    if port == 0 {
        return Err("Port must be between 1 and 65535. Port 0 is not allowed.".to_string());
    }

    Ok(port)
}

/// Validate that a file path is accessible (exists and is readable)
pub fn validate_config_file_path(path_str: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(format!("Configuration file does not exist: '{path_str}'"));
    }

    if !path.is_file() {
        return Err(format!("Configuration path is not a file: '{path_str}'"));
    }

    match fs::File::open(&path) {
        Ok(_) => Ok(path),
        Err(e) => Err(format!("Cannot read configuration file '{path_str}': {e}")),
    }
}

/// Validate host address format (basic validation)
pub fn validate_host_address(host_str: &str) -> Result<String, String> {
    let host = host_str.trim();

    if host.is_empty() {
        return Err("Host address cannot be empty".to_string());
    }

    if host.contains(' ') {
        return Err("Host address cannot contain spaces".to_string());
    }

    if host == "localhost" || host == "0.0.0.0" || host.starts_with("127.") {
        return Ok(host.to_string());
    }

    // Dotted quads must have octets in range
    if host.chars().all(|c| c.is_ascii_digit() || c == '.') {
        let parts: Vec<&str> = host.split('.').collect();
        if parts.len() == 4 {
            for part in parts {
                if part.parse::<u8>().is_err() {
                    return Err(format!("Invalid IPv4 address format: '{host_str}'"));
                }
            }
            return Ok(host.to_string());
        }
    }

    if host.len() > 253 {
        return Err("Host address is too long (maximum 253 characters)".to_string());
    }

    Ok(host.to_string())
}

/// Validate the worker's queue URL: http or https with a host.
pub fn validate_server_url(url_str: &str) -> Result<String, String> {
    let url = reqwest::Url::parse(url_str.trim())
        .map_err(|e| format!("Invalid server URL '{url_str}': {e}"))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("Server URL '{url_str}' must use http or https"));
    }

    if url.host_str().is_none() {
        return Err(format!("Server URL '{url_str}' has no host"));
    }

    Ok(url_str.trim().to_string())
}

/// Validate the worker concurrency cap (1-1024)
pub fn validate_concurrency(value: &str) -> Result<usize, String> {
    let concurrency: usize = value
        .parse()
        .map_err(|_| format!("Concurrency must be a positive number, got: '{value}'"))?;

    if concurrency == 0 {
        return Err("Concurrency must be greater than 0".to_string());
    }

    if concurrency > 1024 {
        return Err("Concurrency cannot exceed 1024".to_string());
    }

    Ok(concurrency)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_validation_valid_ports() {
        for port_str in ["1", "80", "443", "3000", "8080", "65535"] {
            assert!(validate_port(port_str).is_ok(), "Port {port_str} should be valid");
        }
    }

    #[test]
    fn test_port_validation_invalid_ports() {
        for port_str in ["0", "65536", "99999", "abc", "-1", ""] {
            assert!(validate_port(port_str).is_err(), "Port {port_str} should be invalid");
        }
    }

    #[test]
    fn test_host_validation_valid_hosts() {
        let valid_hosts = [
            "localhost",
            "127.0.0.1",
            "0.0.0.0",
            "192.168.1.1",
            "10.0.0.1",
            "example.com",
            "my-server.local",
        ];

        for host in valid_hosts {
            assert!(validate_host_address(host).is_ok(), "Host {host} should be valid");
        }
    }

    #[test]
    fn test_host_validation_invalid_hosts() {
        let long_host = "x".repeat(300);
        let invalid_hosts = ["", "   ", "host with spaces", "999.999.999.999", &long_host];

        for host in invalid_hosts {
            assert!(validate_host_address(host).is_err(), "Host '{host}' should be invalid");
        }
    }

    #[test]
    fn test_config_file_path_validation() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("jobpoll.toml");
        std::fs::write(&file, "[server]\nport = 9000\n").unwrap();

        assert_eq!(validate_config_file_path(file.to_str().unwrap()).unwrap(), file);
        assert!(validate_config_file_path(dir.path().to_str().unwrap()).is_err());
        assert!(validate_config_file_path("/definitely/not/here.toml").is_err());
    }

    #[test]
    fn test_server_url_validation() {
        assert!(validate_server_url("http://127.0.0.1:8080/queue").is_ok());
        assert!(validate_server_url("https://queue.example.com").is_ok());

        for bad in ["", "queue.example.com", "ftp://queue.example.com", "file:///tmp/queue"] {
            assert!(validate_server_url(bad).is_err(), "URL '{bad}' should be invalid");
        }
    }

    #[test]
    fn test_concurrency_validation() {
        assert_eq!(validate_concurrency("1"), Ok(1));
        assert_eq!(validate_concurrency("64"), Ok(64));

        for bad in ["0", "1025", "-3", "many"] {
            assert!(validate_concurrency(bad).is_err(), "Concurrency '{bad}' should be invalid");
        }
    }
}
