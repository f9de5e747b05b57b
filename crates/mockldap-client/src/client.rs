//! LDAP client for listing, authenticating and seeding directory users.

use crate::{
    config::DirectoryConfig,
    seed::SeedEntry,
    user::{normalize_users, DirectoryUser},
};
use async_trait::async_trait;
use futures::future::join_all;
use ldap3::{LdapConnAsync, LdapConnSettings, Mod, Scope, SearchEntry};
use mockldap_core::{AttributeMap, Error, Result};
use native_tls::{Certificate, TlsConnector};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

/// Attributes requested when listing users, besides the username attribute.
const USER_ATTRIBUTES: &[&str] = &["cn", "givenname", "sn", "mail"];

/// Represents the search scope for LDAP queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// Base object only.
    Base,
    /// One level below the base.
    OneLevel,
    /// Entire subtree.
    Subtree,
}

impl From<SearchScope> for Scope {
    fn from(scope: SearchScope) -> Self {
        match scope {
            SearchScope::Base => Scope::Base,
            SearchScope::OneLevel => Scope::OneLevel,
            SearchScope::Subtree => Scope::Subtree,
        }
    }
}

/// LDAP entry representation used by the client.
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    /// Distinguished name of the entry.
    pub dn: String,
    /// Attributes, looked up case-insensitively.
    pub attributes: AttributeMap,
}

/// Outcome of [`DirectoryClient::seed`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    /// Entries added.
    pub added: usize,
    /// Entries the server refused.
    pub failed: usize,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait LdapSession: Send + Sync {
    async fn simple_bind(&self, dn: &str, password: &str) -> Result<()>;
    async fn search(
        &self,
        base_dn: &str,
        scope: SearchScope,
        filter: &str,
        attributes: Vec<String>,
    ) -> Result<Vec<DirectoryEntry>>;
    async fn add(&self, dn: &str, attributes: &AttributeMap) -> Result<()>;
    async fn unbind(&self) -> Result<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait LdapConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn LdapSession>>;
}

/// Directory client with pluggable LDAP backend.
pub struct DirectoryClient {
    config: Arc<DirectoryConfig>,
    connector: Box<dyn LdapConnector>,
}

impl DirectoryClient {
    /// Creates a client that uses the real LDAP connector.
    #[must_use]
    pub fn new(config: DirectoryConfig) -> Self {
        let config = Arc::new(config);
        let connector: Box<dyn LdapConnector> = Box::new(RealLdapConnector::new(config.clone()));
        Self { config, connector }
    }

    #[cfg(test)]
    #[must_use]
    pub(crate) fn with_connector(config: DirectoryConfig, connector: Box<dyn LdapConnector>) -> Self {
        Self {
            config: Arc::new(config),
            connector,
        }
    }

    /// Lists the users matching the configured filter, sorted by full name.
    ///
    /// Records without an email, first name or last name, or whose full name is a single
    /// word, are left out.
    ///
    /// # Errors
    ///
    /// Returns the directory error raised by the bind or the search.
    pub async fn list_users(&self) -> Result<Vec<DirectoryUser>> {
        let session = self.bound_session().await?;

        let username_attribute = self.config.username_attribute();
        let attributes = std::iter::once(username_attribute)
            .chain(USER_ATTRIBUTES.iter().copied())
            .map(str::to_owned)
            .collect();
        let entries = self
            .execute_with_timeout(session.search(
                self.config.search_base(),
                SearchScope::Subtree,
                self.config.search_filter(),
                attributes,
            ))
            .await?;
        session.unbind().await?;

        Ok(normalize_users(
            entries
                .iter()
                .map(|entry| DirectoryUser::from_entry(entry, username_attribute)),
        ))
    }

    /// Binds as `username` (through the auth DN template) with `password`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCredentials`], [`Error::NoSuchObject`] or
    /// [`Error::NoSuchAttribute`] as reported by the server.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<()> {
        let session = self.connector.connect().await?;
        let dn = self.config.auth_dn(username);
        self.execute_with_timeout(session.simple_bind(&dn, password)).await?;
        session.unbind().await?;
        info!(%username, "authenticated");
        Ok(())
    }

    /// Adds `entries` concurrently over one bound connection.
    ///
    /// Every add is awaited; failures are logged and counted rather than aborting the rest.
    ///
    /// # Errors
    ///
    /// Returns an error only if the connection or the bind fails.
    pub async fn seed(&self, entries: &[SeedEntry]) -> Result<SeedReport> {
        let session = self.bound_session().await?;

        let results = join_all(entries.iter().map(|entry| {
            let session = &session;
            async move {
                let result = self
                    .execute_with_timeout(session.add(&entry.dn, &entry.attributes))
                    .await;
                if let Err(err) = &result {
                    warn!(dn = %entry.dn, error = %err, "seed add failed");
                }
                result
            }
        }))
        .await;
        session.unbind().await?;

        let added = results.iter().filter(|result| result.is_ok()).count();
        let report = SeedReport {
            added,
            failed: results.len() - added,
        };
        info!(added = report.added, failed = report.failed, "seed complete");
        Ok(report)
    }

    async fn bound_session(&self) -> Result<Box<dyn LdapSession>> {
        let session = self.connector.connect().await?;
        self.execute_with_timeout(
            session.simple_bind(self.config.bind_dn(), self.config.bind_password()),
        )
        .await?;
        Ok(session)
    }

    async fn execute_with_timeout<F, T>(&self, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        timeout(self.config.operation_timeout(), fut)
            .await
            .map_err(|_| Error::Timeout("directory operation timed out".to_string()))?
    }
}

/// Real LDAP connector backed by `ldap3`.
pub struct RealLdapConnector {
    config: Arc<DirectoryConfig>,
}

impl RealLdapConnector {
    /// Creates a new connector instance.
    #[must_use]
    pub fn new(config: Arc<DirectoryConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl LdapConnector for RealLdapConnector {
    async fn connect(&self) -> Result<Box<dyn LdapSession>> {
        let settings = build_ldap_settings(&self.config)?;
        let (conn, ldap) = LdapConnAsync::with_settings(settings, self.config.url())
            .await
            .map_err(map_ldap_error)?;
        ldap3::drive!(conn);
        Ok(Box::new(RealLdapSession {
            inner: ldap,
            operation_timeout: self.config.operation_timeout(),
        }))
    }
}

/// `ldap3::Ldap` handles are cheap clones multiplexed over one connection, so each call
/// works on its own clone and calls can run concurrently.
struct RealLdapSession {
    inner: ldap3::Ldap,
    operation_timeout: Duration,
}

#[async_trait]
impl LdapSession for RealLdapSession {
    async fn simple_bind(&self, dn: &str, password: &str) -> Result<()> {
        let mut ldap = self.inner.clone();
        timeout(self.operation_timeout, ldap.simple_bind(dn, password))
            .await
            .map_err(|_| Error::Timeout("bind timed out".to_string()))?
            .map_err(map_ldap_error)?
            .success()
            .map_err(map_ldap_error)?;
        Ok(())
    }

    async fn search(
        &self,
        base_dn: &str,
        scope: SearchScope,
        filter: &str,
        attributes: Vec<String>,
    ) -> Result<Vec<DirectoryEntry>> {
        let mut ldap = self.inner.clone();
        let result = timeout(
            self.operation_timeout,
            ldap.search(base_dn, scope.into(), filter, attributes),
        )
        .await
        .map_err(|_| Error::Timeout("search timed out".to_string()))?
        .map_err(map_ldap_error)?;
        let (entries, _) = result.success().map_err(map_ldap_error)?;
        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(|entry| DirectoryEntry {
                dn: entry.dn,
                attributes: entry.attrs.into_iter().collect(),
            })
            .collect())
    }

    async fn add(&self, dn: &str, attributes: &AttributeMap) -> Result<()> {
        let (attrs, rest) = ordered_add(attributes);

        let mut ldap = self.inner.clone();
        timeout(self.operation_timeout, ldap.add(dn, attrs))
            .await
            .map_err(|_| Error::Timeout("add timed out".to_string()))?
            .map_err(map_ldap_error)?
            .success()
            .map_err(map_ldap_error)?;

        if !rest.is_empty() {
            timeout(self.operation_timeout, ldap.modify(dn, rest))
                .await
                .map_err(|_| Error::Timeout("modify timed out".to_string()))?
                .map_err(map_ldap_error)?
                .success()
                .map_err(map_ldap_error)?;
        }
        Ok(())
    }

    async fn unbind(&self) -> Result<()> {
        let mut ldap = self.inner.clone();
        timeout(self.operation_timeout, ldap.unbind())
            .await
            .map_err(|_| Error::Timeout("unbind timed out".to_string()))?
            .map_err(map_ldap_error)?;
        Ok(())
    }
}

type AddAttributes = Vec<(String, HashSet<String>)>;

/// Splits `attributes` into an add carrying the first value of each attribute and
/// single-value appends for the remaining values, in order.
///
/// Values travel as sets on the wire, so a multi-valued attribute only keeps its order
/// when its values arrive one at a time.
fn ordered_add(attributes: &AttributeMap) -> (AddAttributes, Vec<Mod<String>>) {
    let mut initial = Vec::new();
    let mut rest = Vec::new();
    for attr in attributes.iter() {
        let mut values = attr.values.iter();
        let Some(first) = values.next() else {
            continue;
        };
        initial.push((attr.name.clone(), HashSet::from([first.clone()])));
        rest.extend(
            values.map(|value| Mod::Add(attr.name.clone(), HashSet::from([value.clone()]))),
        );
    }
    (initial, rest)
}

fn build_ldap_settings(config: &DirectoryConfig) -> Result<LdapConnSettings> {
    let mut settings = LdapConnSettings::new().set_conn_timeout(config.connection_timeout());

    if !config.tls_verify() {
        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|err| {
                Error::ConfigError(format!("failed to construct TLS connector: {err}"))
            })?;
        settings = settings.set_connector(connector).set_no_tls_verify(true);
    } else if let Some(cert_path) = config.tls_ca_cert() {
        let pem = fs::read(cert_path).map_err(|err| {
            Error::ConfigError(format!(
                "failed to read CA certificate {}: {err}",
                cert_path.display()
            ))
        })?;
        let certificate = Certificate::from_pem(&pem)
            .map_err(|err| Error::ConfigError(format!("invalid CA certificate: {err}")))?;
        let connector = TlsConnector::builder()
            .add_root_certificate(certificate)
            .build()
            .map_err(|err| Error::ConfigError(format!("failed to load CA certificate: {err}")))?;
        settings = settings.set_connector(connector);
    }

    Ok(settings)
}

/// Result codes received from the server become the matching typed error.
fn map_ldap_error(err: ldap3::LdapError) -> Error {
    match err {
        ldap3::LdapError::LdapResult { result } => Error::from_result_code(result.rc, result.text),
        other => Error::ExternalServiceError {
            service: "ldap".to_string(),
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::{roster_entries, DEFAULT_MAIL_DOMAIN};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_config() -> DirectoryConfig {
        DirectoryConfig::new("ldap://localhost:1389", "cn=root", "secret").unwrap()
    }

    fn person(full: &str, username: &str, mail: &str) -> DirectoryEntry {
        let (first, last) = full.split_once(' ').unwrap_or((full, ""));
        let attributes = [
            ("cn", full),
            ("sAMAccountName", username),
            ("mail", mail),
            ("givenName", first),
            ("sn", last),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(name, value)| (name, vec![value]))
        .collect();
        DirectoryEntry {
            dn: format!("cn={username},o=testultrax"),
            attributes,
        }
    }

    #[tokio::test]
    async fn list_users_filters_and_sorts() {
        let mut session = MockLdapSession::new();
        session
            .expect_simple_bind()
            .withf(|dn, password| dn == "cn=root" && password == "secret")
            .returning(|_, _| Ok(()));
        session
            .expect_search()
            .withf(|base, scope, filter, attributes| {
                base == "o=testultrax"
                    && *scope == SearchScope::Subtree
                    && filter == "(email=*@ultraxinc.com)"
                    && *attributes == ["samaccountname", "cn", "givenname", "sn", "mail"]
            })
            .returning(|_, _, _, _| {
                Ok(vec![
                    person("Sally Peters", "speters", "speters@ultraxinc.com"),
                    person("Ben Hacker", "bhacker", "bhacker@ultraxinc.com"),
                    person("Nomail Person", "nperson", ""),
                    person("Cher", "cher", "cher@ultraxinc.com"),
                ])
            });
        session.expect_unbind().times(1).returning(|| Ok(()));

        let mut connector = MockLdapConnector::new();
        connector
            .expect_connect()
            .return_once(move || Ok(Box::new(session)));

        let client = DirectoryClient::with_connector(sample_config(), Box::new(connector));
        let users = client.list_users().await.unwrap();
        let names: Vec<_> = users.iter().filter_map(|u| u.full_name.as_deref()).collect();
        assert_eq!(names, vec!["Ben Hacker", "Sally Peters"]);
        assert_eq!(users[0].username.as_deref(), Some("bhacker"));
    }

    #[tokio::test]
    async fn list_users_propagates_bind_failure() {
        let mut session = MockLdapSession::new();
        session
            .expect_simple_bind()
            .returning(|_, _| Err(Error::InvalidCredentials("cn=root".to_string())));

        let mut connector = MockLdapConnector::new();
        connector
            .expect_connect()
            .return_once(move || Ok(Box::new(session)));

        let client = DirectoryClient::with_connector(sample_config(), Box::new(connector));
        assert!(matches!(
            client.list_users().await,
            Err(Error::InvalidCredentials(_))
        ));
    }

    #[tokio::test]
    async fn authenticate_binds_with_templated_dn() {
        let mut session = MockLdapSession::new();
        session
            .expect_simple_bind()
            .withf(|dn, password| dn == "cn=clincoln, o=testultrax" && password == "123")
            .returning(|_, _| Ok(()));
        session.expect_unbind().returning(|| Ok(()));

        let mut connector = MockLdapConnector::new();
        connector
            .expect_connect()
            .return_once(move || Ok(Box::new(session)));

        let client = DirectoryClient::with_connector(sample_config(), Box::new(connector));
        client.authenticate("clincoln", "123").await.unwrap();
    }

    #[tokio::test]
    async fn authenticate_reports_wrong_password() {
        let mut session = MockLdapSession::new();
        session
            .expect_simple_bind()
            .returning(|dn, _| Err(Error::InvalidCredentials(dn.to_string())));

        let mut connector = MockLdapConnector::new();
        connector
            .expect_connect()
            .return_once(move || Ok(Box::new(session)));

        let client = DirectoryClient::with_connector(sample_config(), Box::new(connector));
        assert!(matches!(
            client.authenticate("clincoln", "nope").await,
            Err(Error::InvalidCredentials(_))
        ));
    }

    #[tokio::test]
    async fn seed_awaits_every_add_and_counts_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut session = MockLdapSession::new();
        session.expect_simple_bind().returning(|_, _| Ok(()));
        session.expect_add().times(18).returning(move |dn, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            if dn.starts_with("cn=bhacker") {
                Err(Error::EntryAlreadyExists(dn.to_string()))
            } else {
                Ok(())
            }
        });
        session.expect_unbind().times(1).returning(|| Ok(()));

        let mut connector = MockLdapConnector::new();
        connector
            .expect_connect()
            .times(1)
            .return_once(move || Ok(Box::new(session)));

        let client = DirectoryClient::with_connector(sample_config(), Box::new(connector));
        let report = client
            .seed(&roster_entries("o=testultrax", DEFAULT_MAIL_DOMAIN))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 18);
        assert_eq!(report, SeedReport { added: 17, failed: 1 });
    }

    #[test]
    fn ordered_add_appends_extra_values_in_order() {
        let attributes: AttributeMap = [
            ("cn", vec!["Ben Hacker"]),
            ("description", vec!["c", "a", "b"]),
            ("seeAlso", vec![]),
        ]
        .into_iter()
        .collect();

        let (initial, rest) = ordered_add(&attributes);
        assert_eq!(
            initial,
            vec![
                ("cn".to_string(), HashSet::from(["Ben Hacker".to_string()])),
                ("description".to_string(), HashSet::from(["c".to_string()])),
            ]
        );
        assert_eq!(
            rest,
            vec![
                Mod::Add("description".to_string(), HashSet::from(["a".to_string()])),
                Mod::Add("description".to_string(), HashSet::from(["b".to_string()])),
            ]
        );
    }

    #[test]
    fn ordered_add_single_values_need_no_follow_up() {
        let entry = &roster_entries("o=testultrax", DEFAULT_MAIL_DOMAIN)[0];
        let (initial, rest) = ordered_add(&entry.attributes);
        assert_eq!(initial.len(), 8);
        assert!(rest.is_empty());
    }

    #[test]
    fn tls_settings_follow_config() {
        let missing = sample_config().with_tls_ca_cert(PathBuf::from("/nonexistent/ca.pem"));
        assert!(matches!(
            build_ldap_settings(&missing),
            Err(Error::ConfigError(message)) if message.contains("/nonexistent/ca.pem")
        ));

        let insecure = sample_config()
            .with_tls_verification(false)
            .with_tls_ca_cert(PathBuf::from("/nonexistent/ca.pem"));
        assert!(build_ldap_settings(&insecure).is_ok());
        assert!(build_ldap_settings(&sample_config()).is_ok());
    }

    #[test]
    fn result_codes_map_to_typed_errors() {
        let err = map_ldap_error(ldap3::LdapError::LdapResult {
            result: ldap3::LdapResult {
                rc: 68,
                matched: String::new(),
                text: "cn=bhacker".to_string(),
                refs: Vec::new(),
                ctrls: Vec::new(),
            },
        });
        assert_eq!(err, Error::EntryAlreadyExists("cn=bhacker".to_string()));
    }
}
