//! Shared directory state.
//!
//! One [`Directory`] is shared by every connection. Mutating operations hold the store's
//! write lock from precondition check to commit, so concurrent writers never interleave.

use mockldap_core::config::ServerConfig;
use mockldap_core::{AttributeMap, DistinguishedName, Result};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::access::{OperationKind, PrivilegedIdentity};
use crate::handlers::{self, Change, SearchParams};
use crate::store::{Entry, EntryStore};

/// Result of a search: the projected entries plus whether the size limit cut it short.
#[derive(Debug, Default)]
pub struct SearchOutcome {
    /// Matching entries with their attributes projected to the requested set.
    pub entries: Vec<Entry>,
    /// True if more entries matched than the request allowed.
    pub size_limit_exceeded: bool,
}

/// The in-memory directory served to clients.
#[derive(Debug)]
pub struct Directory {
    suffix: DistinguishedName,
    privileged: PrivilegedIdentity,
    store: RwLock<EntryStore>,
}

impl Directory {
    /// Creates an empty directory from the server configuration.
    ///
    /// # Errors
    ///
    /// Returns [`mockldap_core::Error::ConfigError`] if the suffix or privileged DN does not
    /// parse.
    pub fn new(config: &ServerConfig) -> Result<Self> {
        Ok(Self {
            suffix: config.suffix_dn()?,
            privileged: PrivilegedIdentity::new(config.root_dn()?, config.root_password()),
            store: RwLock::new(EntryStore::new()),
        })
    }

    /// Naming context every entry lives beneath.
    #[must_use]
    pub fn suffix(&self) -> &DistinguishedName {
        &self.suffix
    }

    /// Number of stored entries.
    pub async fn entry_count(&self) -> usize {
        self.store.read().await.len()
    }

    /// Checks bind credentials. `Ok(None)` means the connection is now anonymous.
    ///
    /// # Errors
    ///
    /// See [`handlers::bind`].
    pub async fn bind(&self, dn: &str, password: &str) -> Result<Option<DistinguishedName>> {
        let store = self.store.read().await;
        let result = handlers::bind(&store, &self.suffix, &self.privileged, dn, password);
        match &result {
            Ok(Some(identity)) => info!(%identity, "bind succeeded"),
            Ok(None) => debug!("anonymous bind"),
            Err(err) => info!(dn, error = %err, "bind failed"),
        }
        result
    }

    /// Adds an entry.
    ///
    /// # Errors
    ///
    /// [`mockldap_core::Error::InsufficientAccessRights`] unless `caller` is privileged;
    /// otherwise see [`handlers::add`].
    pub async fn add(
        &self,
        caller: Option<&DistinguishedName>,
        dn: &str,
        attributes: AttributeMap,
    ) -> Result<()> {
        self.privileged.authorize(caller, OperationKind::Add)?;
        let mut store = self.store.write().await;
        handlers::add(&mut store, &self.suffix, dn, attributes)?;
        debug!(dn, entries = store.len(), "entry added");
        Ok(())
    }

    /// Compares an attribute value.
    ///
    /// # Errors
    ///
    /// [`mockldap_core::Error::InsufficientAccessRights`] unless `caller` is privileged;
    /// otherwise see [`handlers::compare`].
    pub async fn compare(
        &self,
        caller: Option<&DistinguishedName>,
        dn: &str,
        attribute: &str,
        value: &str,
    ) -> Result<bool> {
        self.privileged.authorize(caller, OperationKind::Compare)?;
        let store = self.store.read().await;
        handlers::compare(&store, &self.suffix, dn, attribute, value)
    }

    /// Deletes an entry.
    ///
    /// # Errors
    ///
    /// [`mockldap_core::Error::InsufficientAccessRights`] unless `caller` is privileged;
    /// otherwise see [`handlers::delete`].
    pub async fn delete(&self, caller: Option<&DistinguishedName>, dn: &str) -> Result<()> {
        self.privileged.authorize(caller, OperationKind::Delete)?;
        let mut store = self.store.write().await;
        handlers::delete(&mut store, &self.suffix, dn)?;
        debug!(dn, entries = store.len(), "entry deleted");
        Ok(())
    }

    /// Applies a change list to an entry.
    ///
    /// # Errors
    ///
    /// [`mockldap_core::Error::InsufficientAccessRights`] unless `caller` is privileged;
    /// otherwise see [`handlers::modify`].
    pub async fn modify(
        &self,
        caller: Option<&DistinguishedName>,
        dn: &str,
        changes: &[Change],
    ) -> Result<()> {
        self.privileged.authorize(caller, OperationKind::Modify)?;
        let mut store = self.store.write().await;
        handlers::modify(&mut store, &self.suffix, dn, changes)?;
        debug!(dn, changes = changes.len(), "entry modified");
        Ok(())
    }

    /// Runs a search. Open to every caller, bound or not.
    ///
    /// # Errors
    ///
    /// See [`handlers::search`].
    pub async fn search(
        &self,
        caller: Option<&DistinguishedName>,
        params: &SearchParams,
    ) -> Result<SearchOutcome> {
        self.privileged.authorize(caller, OperationKind::Search)?;
        let store = self.store.read().await;

        let mut outcome = SearchOutcome::default();
        for entry in handlers::search(&store, &self.suffix, params)? {
            if params.size_limit > 0 && outcome.entries.len() == params.size_limit {
                outcome.size_limit_exceeded = true;
                break;
            }
            outcome.entries.push(Entry::new(
                entry.dn.clone(),
                handlers::project(&entry.attributes, &params.attributes),
            ));
        }
        debug!(
            base = %params.base,
            returned = outcome.entries.len(),
            truncated = outcome.size_limit_exceeded,
            "search complete"
        );
        Ok(outcome)
    }
}
