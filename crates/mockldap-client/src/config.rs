//! Configuration for the sample directory clients.

use mockldap_core::Result;
use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Default server URL.
pub const DEFAULT_SERVER: &str = "ldap://localhost:1389";
/// Default bind DN used for listing and seeding.
pub const DEFAULT_BIND_USER: &str = "cn=root";
/// Default bind password.
pub const DEFAULT_BIND_PASSWORD: &str = "secret";
/// Default user search filter.
pub const DEFAULT_FILTER: &str = "(email=*@ultraxinc.com)";
/// Default search base.
pub const DEFAULT_SEARCH_BASE: &str = "o=testultrax";
/// Default attribute holding the login name.
pub const DEFAULT_USERNAME_ATTRIBUTE: &str = "samaccountname";
/// Default DN template for user authentication.
pub const DEFAULT_AUTH_DN_TEMPLATE: &str = "cn=%USERNAME%, o=testultrax";
/// Placeholder replaced by the login name in the auth DN template.
pub const USERNAME_PLACEHOLDER: &str = "%USERNAME%";
/// Default connection timeout (seconds).
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 10;
/// Default operation timeout (seconds).
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 10;

/// Connection and query settings for [`crate::DirectoryClient`].
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    url: String,
    bind_dn: String,
    bind_password: SecretString,
    search_filter: String,
    search_base: String,
    username_attribute: String,
    auth_dn_template: String,
    tls_verify: bool,
    tls_ca_cert: Option<PathBuf>,
    connection_timeout_secs: u64,
    operation_timeout_secs: u64,
}

impl DirectoryConfig {
    /// Creates a configuration for `url`, binding as `bind_dn` for listing and seeding.
    ///
    /// # Errors
    ///
    /// Returns an error if the provided URL is invalid.
    pub fn new(
        url: impl Into<String>,
        bind_dn: impl Into<String>,
        bind_password: impl Into<String>,
    ) -> Result<Self> {
        let url_string = url.into();
        Url::parse(&url_string)?;

        Ok(Self {
            url: url_string,
            bind_dn: bind_dn.into(),
            bind_password: SecretString::from(bind_password.into()),
            search_filter: DEFAULT_FILTER.to_string(),
            search_base: DEFAULT_SEARCH_BASE.to_string(),
            username_attribute: DEFAULT_USERNAME_ATTRIBUTE.to_string(),
            auth_dn_template: DEFAULT_AUTH_DN_TEMPLATE.to_string(),
            tls_verify: true,
            tls_ca_cert: None,
            connection_timeout_secs: DEFAULT_CONNECTION_TIMEOUT_SECS,
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
        })
    }

    /// Returns the server URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the DN used for listing and seeding.
    #[must_use]
    pub fn bind_dn(&self) -> &str {
        &self.bind_dn
    }

    /// Returns the bind password.
    #[must_use]
    pub fn bind_password(&self) -> &str {
        self.bind_password.expose_secret()
    }

    /// Returns the user search filter.
    #[must_use]
    pub fn search_filter(&self) -> &str {
        &self.search_filter
    }

    /// Returns the search base.
    #[must_use]
    pub fn search_base(&self) -> &str {
        &self.search_base
    }

    /// Returns the attribute read as the login name.
    #[must_use]
    pub fn username_attribute(&self) -> &str {
        &self.username_attribute
    }

    /// Returns the auth DN template.
    #[must_use]
    pub fn auth_dn_template(&self) -> &str {
        &self.auth_dn_template
    }

    /// DN to bind as when authenticating `username`.
    #[must_use]
    pub fn auth_dn(&self, username: &str) -> String {
        self.auth_dn_template.replacen(USERNAME_PLACEHOLDER, username, 1)
    }

    /// Returns whether TLS certificate verification is enabled.
    #[must_use]
    pub const fn tls_verify(&self) -> bool {
        self.tls_verify
    }

    /// Optional custom CA certificate path.
    #[must_use]
    pub fn tls_ca_cert(&self) -> Option<&PathBuf> {
        self.tls_ca_cert.as_ref()
    }

    /// Returns the connection timeout duration.
    #[must_use]
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Returns the operation timeout duration.
    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Overrides the user search filter.
    #[must_use]
    pub fn with_search_filter(mut self, filter: impl Into<String>) -> Self {
        self.search_filter = filter.into();
        self
    }

    /// Overrides the search base.
    #[must_use]
    pub fn with_search_base(mut self, base: impl Into<String>) -> Self {
        self.search_base = base.into();
        self
    }

    /// Overrides the attribute read as the login name.
    #[must_use]
    pub fn with_username_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.username_attribute = attribute.into();
        self
    }

    /// Overrides the auth DN template.
    ///
    /// The string should contain `%USERNAME%` where the login name will be substituted.
    #[must_use]
    pub fn with_auth_dn_template(mut self, template: impl Into<String>) -> Self {
        self.auth_dn_template = template.into();
        self
    }

    /// Enables or disables TLS certificate verification.
    #[must_use]
    pub const fn with_tls_verification(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Sets the custom CA certificate path for TLS verification.
    #[must_use]
    pub fn with_tls_ca_cert(mut self, path: PathBuf) -> Self {
        self.tls_ca_cert = Some(path);
        self
    }

    /// Overrides the connection timeout in seconds.
    #[must_use]
    pub const fn with_connection_timeout_secs(mut self, seconds: u64) -> Self {
        self.connection_timeout_secs = seconds;
        self
    }

    /// Overrides the operation timeout in seconds.
    #[must_use]
    pub const fn with_operation_timeout_secs(mut self, seconds: u64) -> Self {
        self.operation_timeout_secs = seconds;
        self
    }
}
