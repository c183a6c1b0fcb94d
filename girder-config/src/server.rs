// Server settings

use crate::validation::{ConfigValidator, Validate};
use crate::{ConfigError, ConfigLoader, Result};
use girder_core::ApplicationBuilder;
use girder_core::logging::{LogConfig, LogFormat, LogLevel};
use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, ToSocketAddrs};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "warning", "error"];
const LOG_FORMATS: &[&str] = &["json", "plain", "text", "pretty", "compact"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub format: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

/// Listener and request handling settings for an application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_id_header: String,
    /// Request body limit in bytes
    pub body_limit: usize,
    pub log: LogSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_id_header: girder_core::REQUEST_ID_HEADER.to_string(),
            body_limit: girder_core::DEFAULT_BODY_LIMIT,
            log: LogSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults overlaid with `GIRDER_*` environment variables, validated
    pub fn from_env() -> Result<Self> {
        Self::load_with(&ConfigLoader::new())
    }

    pub fn load_with(loader: &ConfigLoader) -> Result<Self> {
        let config: Self = loader.load()?;
        config.validate()?;
        Ok(config)
    }

    pub fn log_config(&self) -> Result<LogConfig> {
        let level = LogLevel::from_name(&self.log.level).ok_or_else(|| {
            ConfigError::ValidationError(format!("unknown log level {:?}", self.log.level))
        })?;
        let format = LogFormat::from_name(&self.log.format).ok_or_else(|| {
            ConfigError::ValidationError(format!("unknown log format {:?}", self.log.format))
        })?;
        Ok(LogConfig::new().level(level).format(format))
    }

    /// Resolves `host:port`; the first address wins
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| ConfigError::ValidationError(format!("host {:?} has no address", self.host)))
    }

    /// Apply request handling settings to an application under construction
    pub fn apply(&self, builder: ApplicationBuilder) -> ApplicationBuilder {
        builder
            .request_id_header(self.request_id_header.clone())
            .body_limit(self.body_limit)
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> Result<()> {
        ConfigValidator::not_empty(&self.host, "host")?;
        ConfigValidator::is_port(self.port, "port")?;
        ConfigValidator::not_empty(&self.request_id_header, "request_id_header")?;
        ConfigValidator::positive(self.body_limit, "body_limit")?;
        ConfigValidator::one_of(&self.log.level, LOG_LEVELS, "log.level")?;
        ConfigValidator::one_of(&self.log.format, LOG_FORMATS, "log.format")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EnvSource;

    fn env(pairs: &[(&str, &str)]) -> EnvSource {
        EnvSource::Fixed(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.request_id_header, "x-request-id");
        assert_eq!(config.body_limit, 2 * 1024 * 1024);
        assert_eq!(config.log, LogSettings::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let loader = ConfigLoader::new().env_source(env(&[
            ("GIRDER_PORT", "9090"),
            ("GIRDER_LOG__FORMAT", "compact"),
        ]));
        let config = ServerConfig::load_with(&loader).unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.log.format, "compact");
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let loader = ConfigLoader::new().env_source(env(&[("GIRDER_PORT", "0")]));
        assert!(matches!(
            ServerConfig::load_with(&loader),
            Err(ConfigError::ValidationError(_))
        ));

        let loader = ConfigLoader::new().env_source(env(&[("GIRDER_PORT", "eighty")]));
        assert!(matches!(
            ServerConfig::load_with(&loader),
            Err(ConfigError::DeserializationError(_))
        ));
    }

    #[test]
    fn test_log_config() {
        let mut config = ServerConfig::default();
        config.log.level = "Warning".into();
        config.log.format = "text".into();
        let log = config.log_config().unwrap();
        assert_eq!(log.level, LogLevel::Warn);
        assert_eq!(log.format, LogFormat::Plain);

        config.log.level = "chatty".into();
        assert!(config.log_config().is_err());
    }

    #[test]
    fn test_socket_addr() {
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 3000,
            ..Default::default()
        };
        assert_eq!(config.socket_addr().unwrap(), "127.0.0.1:3000".parse().unwrap());
    }
}
