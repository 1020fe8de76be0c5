//! Configuration types for acache

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::{AcacheError, Result};

/// Content type replayed when a route captured none
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Default listen port for `serve` and `proxy`
pub const DEFAULT_PORT: u16 = 4000;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the route database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Listen address, `host:port` or `:port`
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Content type used when a route has none
    #[serde(default = "default_content_type")]
    pub default_content_type: String,
    /// Resource limits
    #[serde(default)]
    pub limits: LimitsConfig,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("acache.db")
}

fn default_bind_address() -> String {
    format!(":{DEFAULT_PORT}")
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

/// Resource limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum captured response body in bytes
    pub max_response_size: usize,
    /// Maximum concurrent connections on the replay server
    pub max_connections: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_response_size: 256 * 1024 * 1024, // 256 MB
            max_connections: 1024,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            bind_address: default_bind_address(),
            default_content_type: default_content_type(),
            limits: LimitsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AcacheError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| AcacheError::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(AcacheError::ConfigError(
                "database_path cannot be empty".to_string(),
            ));
        }

        parse_bind_address(&self.bind_address)?;

        if self.limits.max_response_size == 0 {
            return Err(AcacheError::ConfigError(
                "max_response_size must be > 0".to_string(),
            ));
        }

        if self.limits.max_connections == 0 {
            return Err(AcacheError::ConfigError(
                "max_connections must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Resolved listen address
    ///
    /// # Errors
    ///
    /// Returns error if the bind address does not parse
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        parse_bind_address(&self.bind_address)
    }
}

/// Parse a listen address, accepting the `:port` shorthand for all interfaces
///
/// # Errors
///
/// Returns error if the address is not a valid socket address
pub fn parse_bind_address(addr: &str) -> Result<SocketAddr> {
    let addr = addr.trim();
    let full = if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    };

    full.parse::<SocketAddr>()
        .map_err(|e| AcacheError::ConfigError(format!("Invalid bind address '{addr}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_parse() {
        let config_toml = r#"
            database_path = "/tmp/routes.db"
            bind_address = "127.0.0.1:8080"

            [limits]
            max_response_size = 1024
            max_connections = 8
        "#;

        let config: Config = toml::from_str(config_toml).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/routes.db"));
        assert_eq!(config.limits.max_response_size, 1024);
        assert_eq!(config.default_content_type, DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"bind_address = \":9000\"\n").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.socket_addr().unwrap().port(), 9000);
        assert_eq!(config.database_path, PathBuf::from("acache.db"));
    }

    #[test]
    fn test_invalid_bind_address() {
        let config = Config {
            bind_address: "not an address".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_port_shorthand() {
        let addr = parse_bind_address(":0").unwrap();
        assert!(addr.ip().is_unspecified());
        assert_eq!(addr.port(), 0);
    }

    #[test]
    fn test_zero_limits_rejected() {
        let mut config = Config::default();
        config.limits.max_connections = 0;
        assert!(config.validate().is_err());
    }
}
