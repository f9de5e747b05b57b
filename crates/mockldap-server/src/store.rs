//! In-memory entry store.
//!
//! A flat map from the leading RDN of an entry's DN to the entry itself. The store does no
//! locking of its own; [`crate::Directory`] owns it behind a `RwLock`.

use std::collections::BTreeMap;

use mockldap_core::{AttributeMap, DistinguishedName, Error, Result};

/// A directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Name the entry was added under.
    pub dn: DistinguishedName,
    /// Attributes of the entry.
    pub attributes: AttributeMap,
}

impl Entry {
    /// Creates an entry.
    #[must_use]
    pub fn new(dn: DistinguishedName, attributes: AttributeMap) -> Self {
        Self { dn, attributes }
    }

    /// Store key of the entry.
    #[must_use]
    pub fn key(&self) -> String {
        self.dn.rdn_key()
    }
}

/// Entries keyed by their leading RDN (see [`DistinguishedName::rdn_key`]).
#[derive(Debug, Default)]
pub struct EntryStore {
    entries: BTreeMap<String, Entry>,
}

impl EntryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up an entry by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    /// Mutable lookup, used by modify.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Entry> {
        self.entries.get_mut(key)
    }

    /// Inserts `entry` under its key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntryAlreadyExists`] if the key is taken; the store is left unchanged.
    pub fn put(&mut self, entry: Entry) -> Result<()> {
        let key = entry.key();
        if self.entries.contains_key(&key) {
            return Err(Error::EntryAlreadyExists(entry.dn.to_string()));
        }
        self.entries.insert(key, entry);
        Ok(())
    }

    /// Removes and returns the entry stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchObject`] if nothing is stored under `key`.
    pub fn delete(&mut self, key: &str) -> Result<Entry> {
        self.entries
            .remove(key)
            .ok_or_else(|| Error::NoSuchObject(key.to_string()))
    }

    /// Iterates `(key, entry)` pairs in key order. Each call starts a fresh pass.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entry)> + '_ {
        self.entries.iter().map(|(key, entry)| (key.as_str(), entry))
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
