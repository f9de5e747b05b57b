//! Operation handlers.
//!
//! Each handler is a plain function over the entry store. None of them consult the
//! authorization gate or take locks; [`crate::Directory`] does both before calling in.
//! Precondition failures are checked in a fixed order per handler: name syntax, then
//! existence, then attribute presence, then value.

use ldap3_proto::proto::LdapFilter;
use mockldap_core::{AttributeMap, DistinguishedName, Error, Result};

use crate::access::PrivilegedIdentity;
use crate::filter;
use crate::store::{Entry, EntryStore};

/// Attribute holding the passwords an entry may bind with.
pub const PASSWORD_ATTRIBUTE: &str = "userpassword";

/// Kind of a single modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Set-union the values into the attribute.
    Add,
    /// Remove the attribute.
    Delete,
    /// Overwrite the attribute (remove it when no values are given).
    Replace,
}

/// One entry of a modify request's change list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// What to do.
    pub kind: ChangeKind,
    /// Attribute to act on.
    pub attribute: String,
    /// Values carried by the change.
    pub values: Vec<String>,
}

impl Change {
    /// Creates a change.
    #[must_use]
    pub fn new(kind: ChangeKind, attribute: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            kind,
            attribute: attribute.into(),
            values,
        }
    }
}

/// Search scope relative to the search base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// The base object only.
    Base,
    /// Immediate children of the base.
    OneLevel,
    /// The base and everything beneath it.
    Subtree,
}

/// Parameters of a search.
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Search base DN.
    pub base: String,
    /// Scope relative to `base`.
    pub scope: SearchScope,
    /// Entry selection predicate.
    pub filter: LdapFilter,
    /// Requested attributes; empty or `*` means all, `1.1` means none.
    pub attributes: Vec<String>,
    /// Maximum number of entries to return; 0 means unlimited.
    pub size_limit: usize,
}

impl SearchParams {
    /// Subtree search under `base` returning every attribute.
    #[must_use]
    pub fn subtree(base: impl Into<String>, filter: LdapFilter) -> Self {
        Self {
            base: base.into(),
            scope: SearchScope::Subtree,
            filter,
            attributes: Vec::new(),
            size_limit: 0,
        }
    }
}

/// Parses `dn` and checks that it names something beneath `suffix`.
fn resolve(suffix: &DistinguishedName, dn: &str) -> Result<DistinguishedName> {
    let name = DistinguishedName::parse(dn)?;
    if !name.is_beneath(suffix) {
        return Err(Error::NoSuchObject(name.to_string()));
    }
    Ok(name)
}

/// Verifies bind credentials and returns the identity to record on the connection.
///
/// `Ok(None)` is an anonymous bind (empty name and password).
///
/// # Errors
///
/// [`Error::InvalidCredentials`] for a wrong password, [`Error::NoSuchObject`] for an unknown
/// or out-of-suffix name, [`Error::NoSuchAttribute`] when the entry has no password.
pub fn bind(
    store: &EntryStore,
    suffix: &DistinguishedName,
    privileged: &PrivilegedIdentity,
    dn: &str,
    password: &str,
) -> Result<Option<DistinguishedName>> {
    if dn.trim().is_empty() {
        return if password.is_empty() {
            Ok(None)
        } else {
            Err(Error::InvalidCredentials(
                "password supplied without a name".to_string(),
            ))
        };
    }

    let name = DistinguishedName::parse(dn)?;
    if privileged.is(&name) {
        return if privileged.verify(password) {
            Ok(Some(name))
        } else {
            Err(Error::InvalidCredentials(name.to_string()))
        };
    }

    if !name.is_beneath(suffix) {
        return Err(Error::NoSuchObject(name.to_string()));
    }
    let entry = store
        .get(&name.rdn_key())
        .ok_or_else(|| Error::NoSuchObject(name.to_string()))?;
    let passwords = entry
        .attributes
        .get(PASSWORD_ATTRIBUTE)
        .ok_or_else(|| Error::NoSuchAttribute("userPassword".to_string()))?;
    if !passwords.iter().any(|candidate| candidate == password) {
        return Err(Error::InvalidCredentials(name.to_string()));
    }

    Ok(Some(name))
}

/// Stores `attributes` under `dn`. No schema checks are made.
///
/// # Errors
///
/// [`Error::EntryAlreadyExists`] if the leading RDN is taken.
pub fn add(
    store: &mut EntryStore,
    suffix: &DistinguishedName,
    dn: &str,
    attributes: AttributeMap,
) -> Result<()> {
    let name = resolve(suffix, dn)?;
    store.put(Entry::new(name, attributes))
}

/// Tests whether `attribute` of `dn` holds `value`.
///
/// # Errors
///
/// [`Error::NoSuchObject`] if the entry is absent, [`Error::NoSuchAttribute`] if the
/// attribute is unset.
pub fn compare(
    store: &EntryStore,
    suffix: &DistinguishedName,
    dn: &str,
    attribute: &str,
    value: &str,
) -> Result<bool> {
    let name = resolve(suffix, dn)?;
    let entry = store
        .get(&name.rdn_key())
        .ok_or_else(|| Error::NoSuchObject(name.to_string()))?;
    let values = entry
        .attributes
        .get(attribute)
        .ok_or_else(|| Error::NoSuchAttribute(attribute.to_string()))?;
    Ok(values.iter().any(|candidate| candidate == value))
}

/// Removes the entry named `dn`.
///
/// # Errors
///
/// [`Error::NoSuchObject`] if the entry is absent.
pub fn delete(store: &mut EntryStore, suffix: &DistinguishedName, dn: &str) -> Result<()> {
    let name = resolve(suffix, dn)?;
    store
        .delete(&name.rdn_key())
        .map(|_| ())
        .map_err(|_| Error::NoSuchObject(name.to_string()))
}

/// Applies `changes` in order to the entry named `dn`.
///
/// Each change sees the effect of the ones before it. Changes are applied to a copy and the
/// entry is only updated when every change succeeds.
///
/// # Errors
///
/// [`Error::ProtocolError`] for an empty change list, [`Error::NoSuchObject`] if the entry is
/// absent, [`Error::NoSuchAttribute`] when `replace` or `delete` names an unset attribute.
pub fn modify(
    store: &mut EntryStore,
    suffix: &DistinguishedName,
    dn: &str,
    changes: &[Change],
) -> Result<()> {
    if changes.is_empty() {
        return Err(Error::ProtocolError("changes required".to_string()));
    }
    let name = resolve(suffix, dn)?;
    let entry = store
        .get_mut(&name.rdn_key())
        .ok_or_else(|| Error::NoSuchObject(name.to_string()))?;

    let mut working = entry.attributes.clone();
    for change in changes {
        apply_change(&mut working, change)?;
    }
    entry.attributes = working;
    Ok(())
}

fn apply_change(attributes: &mut AttributeMap, change: &Change) -> Result<()> {
    match change.kind {
        ChangeKind::Replace => {
            if !attributes.contains(&change.attribute) {
                return Err(Error::NoSuchAttribute(change.attribute.clone()));
            }
            attributes.set(change.attribute.clone(), change.values.clone());
        }
        ChangeKind::Add => attributes.append_unique(change.attribute.clone(), change.values.clone()),
        ChangeKind::Delete => {
            attributes
                .remove(&change.attribute)
                .ok_or_else(|| Error::NoSuchAttribute(change.attribute.clone()))?;
        }
    }
    Ok(())
}

/// Which stored entries a search base and scope can reach.
enum Reach {
    Nothing,
    Everything,
    Only(String),
}

/// Lazily yields the entries matching `params`, scanning the whole store.
///
/// The store is flat: every entry sits directly beneath the suffix. A base equal to the suffix
/// reaches all entries with `one` or `sub` scope and nothing with `base`. A base naming an
/// entry reaches that entry with `base` or `sub` and nothing with `one`. The base must match
/// the stored entry's full DN, not just its leading RDN.
///
/// # Errors
///
/// [`Error::InvalidDnSyntax`] for an unparsable base, [`Error::NoSuchObject`] for a base
/// outside the suffix or naming a missing entry.
pub fn search<'a>(
    store: &'a EntryStore,
    suffix: &DistinguishedName,
    params: &'a SearchParams,
) -> Result<impl Iterator<Item = &'a Entry> + 'a> {
    let base = DistinguishedName::parse(&params.base)?;
    let reach = if base.equivalent(suffix) {
        match params.scope {
            SearchScope::Base => Reach::Nothing,
            SearchScope::OneLevel | SearchScope::Subtree => Reach::Everything,
        }
    } else if base.is_beneath(suffix) {
        let key = base.rdn_key();
        if !store.get(&key).is_some_and(|entry| entry.dn.equivalent(&base)) {
            return Err(Error::NoSuchObject(base.to_string()));
        }
        match params.scope {
            SearchScope::OneLevel => Reach::Nothing,
            SearchScope::Base | SearchScope::Subtree => Reach::Only(key),
        }
    } else {
        return Err(Error::NoSuchObject(base.to_string()));
    };

    Ok(store
        .iter()
        .filter(move |(key, _)| match &reach {
            Reach::Nothing => false,
            Reach::Everything => true,
            Reach::Only(only) => only.as_str() == *key,
        })
        .map(|(_, entry)| entry)
        .filter(move |entry| filter::matches(&params.filter, &entry.attributes)))
}

/// Restricts `attributes` to the `requested` names.
///
/// An empty request or `*` keeps everything; `1.1` alone keeps nothing.
#[must_use]
pub fn project(attributes: &AttributeMap, requested: &[String]) -> AttributeMap {
    if requested.is_empty() || requested.iter().any(|name| name == "*") {
        return attributes.clone();
    }
    attributes
        .iter()
        .filter(|attr| {
            requested
                .iter()
                .any(|name| name.eq_ignore_ascii_case(&attr.name))
        })
        .map(|attr| (attr.name.clone(), attr.values.clone()))
        .collect()
}
