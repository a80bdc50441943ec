//! Application identity and HTTP server configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development.
    #[default]
    Development,
    /// Automated test runs.
    Testing,
    /// Pre-production.
    Staging,
    /// Production.
    Production,
}

impl Environment {
    /// Return the environment as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Testing => "testing",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application identity settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Application name, used for header names and log targets.
    #[serde(default = "default_name")]
    pub name: String,
    /// Deployment environment.
    #[serde(default)]
    pub environment: Environment,
    /// Enables verbose database logging.
    #[serde(default)]
    pub debug: bool,
}

impl AppSettings {
    /// Lowercased application name.
    pub fn slug(&self) -> String {
        self.name.to_lowercase()
    }

    /// Whether the application runs under the test environment.
    pub fn is_testing(&self) -> bool {
        self.environment == Environment::Testing
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: default_name(),
            environment: Environment::default(),
            debug: false,
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerConfig {
    /// `host:port` pair for binding the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_name() -> String {
    "prodkit".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}
