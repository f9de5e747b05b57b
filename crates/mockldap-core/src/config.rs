//! Configuration structures for the mock directory server.
//!
//! The server has a single naming context and a single privileged identity. Both are plain
//! configuration so tests can run several differently-shaped directories side by side.

use crate::dn::DistinguishedName;
use crate::Error;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Default listening port.
pub const DEFAULT_PORT: u16 = 1389;

/// Default listening host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default naming-context suffix.
pub const DEFAULT_SUFFIX: &str = "o=testultrax";

/// Default privileged bind DN.
pub const DEFAULT_ROOT_DN: &str = "cn=root";

/// Default privileged bind password.
pub const DEFAULT_ROOT_PASSWORD: &str = "secret";

/// Configuration for a mock directory server instance.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    /// Host or address to bind the listener on
    #[validate(length(min = 1))]
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port (0 picks an ephemeral port)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Naming-context root every entry lives beneath
    #[validate(custom(function = "validate_dn"))]
    #[serde(default = "default_suffix")]
    pub suffix: String,

    /// Privileged identity allowed to write
    #[validate(custom(function = "validate_dn"))]
    #[serde(default = "default_root_dn")]
    pub root_dn: String,

    /// Secret of the privileged identity
    #[serde(default = "default_root_password", skip_serializing)]
    pub root_password: SecretString,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_suffix() -> String {
    DEFAULT_SUFFIX.to_string()
}

fn default_root_dn() -> String {
    DEFAULT_ROOT_DN.to_string()
}

fn default_root_password() -> SecretString {
    SecretString::from(DEFAULT_ROOT_PASSWORD)
}

fn validate_dn(value: &str) -> Result<(), ValidationError> {
    DistinguishedName::parse(value)
        .map(|_| ())
        .map_err(|_| ValidationError::new("invalid_dn"))
}

impl ServerConfig {
    /// Creates a configuration with the defaults (`127.0.0.1:1389`, `o=testultrax`,
    /// `cn=root` / `secret`).
    #[must_use]
    pub fn new() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            suffix: default_suffix(),
            root_dn: default_root_dn(),
            root_password: default_root_password(),
        }
    }

    /// Set the listening host.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the listening port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the naming-context suffix.
    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Set the privileged identity and its secret.
    #[must_use]
    pub fn with_root_credentials(
        mut self,
        root_dn: impl Into<String>,
        root_password: impl Into<String>,
    ) -> Self {
        self.root_dn = root_dn.into();
        self.root_password = SecretString::from(root_password.into());
        self
    }

    /// `host:port` string suitable for binding a listener.
    #[must_use]
    pub fn bind_address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Parsed naming-context suffix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the suffix is not a valid DN.
    pub fn suffix_dn(&self) -> Result<DistinguishedName, Error> {
        DistinguishedName::parse(&self.suffix)
            .map_err(|e| Error::ConfigError(format!("Invalid suffix `{}`: {e}", self.suffix)))
    }

    /// Parsed privileged identity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the root DN is not a valid DN.
    pub fn root_dn(&self) -> Result<DistinguishedName, Error> {
        DistinguishedName::parse(&self.root_dn)
            .map_err(|e| Error::ConfigError(format!("Invalid root DN `{}`: {e}", self.root_dn)))
    }

    /// Secret of the privileged identity.
    #[must_use]
    pub fn root_password(&self) -> &str {
        self.root_password.expose_secret()
    }

    /// Validates every field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationError`] listing the invalid fields.
    pub fn check(&self) -> Result<(), Error> {
        self.validate()?;
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::new();
        assert_eq!(config.bind_address(), "127.0.0.1:1389");
        assert_eq!(config.suffix_dn().unwrap().as_str(), "o=testultrax");
        assert_eq!(config.root_dn().unwrap().as_str(), "cn=root");
        assert_eq!(config.root_password(), "secret");
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_server_config_builder() {
        let config = ServerConfig::new()
            .with_host("::1")
            .with_port(0)
            .with_suffix("dc=example,dc=com")
            .with_root_credentials("cn=admin,dc=example,dc=com", "hunter2");

        assert_eq!(config.bind_address(), "[::1]:0");
        assert!(config
            .root_dn()
            .unwrap()
            .is_beneath(&config.suffix_dn().unwrap()));
        assert_eq!(config.root_password(), "hunter2");
    }

    #[test]
    fn test_invalid_suffix_rejected() {
        let config = ServerConfig::new().with_suffix("not a dn");
        assert!(matches!(config.check(), Err(Error::ValidationError(_))));
        assert!(config.suffix_dn().is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: ServerConfig = serde_json::from_str(r#"{"port": 10389}"#).unwrap();
        assert_eq!(config.port, 10389);
        assert_eq!(config.suffix, DEFAULT_SUFFIX);
        assert_eq!(config.root_password(), DEFAULT_ROOT_PASSWORD);
    }

    #[test]
    fn test_password_not_serialized() {
        let json = serde_json::to_string(&ServerConfig::new()).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("testultrax"));
    }
}
