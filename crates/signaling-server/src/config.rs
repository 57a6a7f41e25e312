//! Relay configuration

use std::net::SocketAddr;
use std::path::Path;

use peercall_infra_common::config::{from_toml_str, load_toml};
use peercall_infra_common::LoggingSection;
use serde::Deserialize;

use crate::error::{RelayError, Result};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Longest envelope line the relay accepts
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 64 * 1024;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub bind_addr: String,
    pub max_message_len: usize,
    pub logging: LoggingSection,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            logging: LoggingSection::default(),
        }
    }
}

impl RelayConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = load_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = from_toml_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_addr
            .parse()
            .map_err(|e| RelayError::Config(format!("invalid bind_addr {:?}: {}", self.bind_addr, e)))
    }

    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;
        if self.max_message_len == 0 {
            return Err(RelayError::Config("max_message_len must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.socket_addr().unwrap().port(), 8080);
        assert_eq!(config.max_message_len, 64 * 1024);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_file() {
        let config = RelayConfig::from_toml_str(
            r#"
            bind_addr = "127.0.0.1:9000"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.max_message_len, DEFAULT_MAX_MESSAGE_LEN);
    }

    #[test]
    fn test_bad_address_rejected() {
        assert!(matches!(
            RelayConfig::from_toml_str(r#"bind_addr = "nowhere""#),
            Err(RelayError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            RelayConfig::from_file("/no/such/relay.toml"),
            Err(RelayError::Io(_))
        ));
    }
}
