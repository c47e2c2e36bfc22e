use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::{AdminError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main admin service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// This service's own name and address
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Seed addresses for the sibling services
    #[serde(default)]
    pub services: ServicesConfig,
    /// Outbound call settings
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Circuit breaker settings shared by every call site
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    /// Prometheus exporter settings
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Outbound request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Identity announced to the configuration service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_identity_name")]
    pub name: String,
    #[serde(default = "default_address")]
    pub ip: String,
}

/// Startup addresses of the sibling services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default = "default_address")]
    pub ecostreet: String,
    #[serde(default = "default_address")]
    pub database: String,
    #[serde(default = "default_address")]
    pub configuration: String,
    #[serde(default = "default_address")]
    pub play: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Scheme prepended to every resolved address
    #[serde(default = "default_scheme")]
    pub scheme: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Expose a Prometheus scrape endpoint at `/metrics`
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of the compact text format
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout() -> u64 {
    5
}

fn default_identity_name() -> String {
    "admin_core_service".to_string()
}

fn default_address() -> String {
    "35.190.119.123".to_string()
}

fn default_scheme() -> String {
    "http".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_secs: default_timeout(),
        }
    }
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            name: default_identity_name(),
            ip: default_address(),
        }
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            ecostreet: default_address(),
            database: default_address(),
            configuration: default_address(),
            play: default_address(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
        }
    }
}

impl AdminConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AdminError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| AdminError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AdminError::Config("Server port must be > 0".to_string()));
        }

        if self.server.timeout_secs == 0 {
            return Err(AdminError::Config(
                "Outbound timeout must be > 0".to_string(),
            ));
        }

        if self.identity.name.is_empty() || self.identity.ip.is_empty() {
            return Err(AdminError::Config(
                "Identity name and ip cannot be empty".to_string(),
            ));
        }

        let seeds = [
            ("ecostreet", &self.services.ecostreet),
            ("database", &self.services.database),
            ("configuration", &self.services.configuration),
            ("play", &self.services.play),
        ];
        for (name, address) in seeds {
            if address.is_empty() {
                return Err(AdminError::Config(format!(
                    "Seed address cannot be empty for service: {}",
                    name
                )));
            }
        }

        if !["http", "https"].contains(&self.dispatch.scheme.as_str()) {
            return Err(AdminError::Config(format!(
                "Dispatch scheme must be http or https, got '{}'",
                self.dispatch.scheme
            )));
        }

        if self.circuit_breaker.failure_threshold == 0 {
            return Err(AdminError::Config(
                "Circuit breaker failure threshold must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Create a default configuration for testing
    pub fn default_config() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_valid_config() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 9000
  timeout_secs: 3

identity:
  name: "admin_core_service"
  ip: "10.0.0.1"

services:
  ecostreet: "ecostreet-core-service"
  database: "database-core-service:8080"

circuit_breaker:
  failure_threshold: 3
  recovery_timeout_ms: 500
"#;

        let config = AdminConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.timeout(), Duration::from_secs(3));
        assert_eq!(config.identity.ip, "10.0.0.1");
        assert_eq!(config.services.database, "database-core-service:8080");
        assert_eq!(config.services.configuration, "35.190.119.123");
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.circuit_breaker.recovery_timeout_ms, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_values() {
        let config = AdminConfig::from_yaml("{}").unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.timeout_secs, 5);
        assert_eq!(config.identity.name, "admin_core_service");
        assert_eq!(config.dispatch.scheme, "http");
        assert_eq!(config.circuit_breaker.failure_threshold, 1);
        assert_eq!(config.circuit_breaker.recovery_timeout_ms, 10_000);
        assert!(!config.metrics.enabled);
        assert!(!config.logging.json);
    }

    #[test]
    fn test_validate_empty_seed() {
        let mut config = AdminConfig::default_config();
        config.services.play = String::new();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_invalid_scheme() {
        let mut config = AdminConfig::default_config();
        config.dispatch.scheme = "ftp".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_threshold() {
        let mut config = AdminConfig::default_config();
        config.circuit_breaker.failure_threshold = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server:\n  port: 7070").unwrap();

        let config = AdminConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 7070);
    }

    #[test]
    fn test_from_missing_file() {
        let result = AdminConfig::from_file("/nonexistent/admin.yaml");
        assert!(matches!(result, Err(AdminError::Config(_))));
    }
}
