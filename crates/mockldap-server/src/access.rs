//! Authorization gate.

use std::fmt;

use mockldap_core::{DistinguishedName, Error, Result};
use secrecy::{ExposeSecret, SecretString};

/// Operations subject to the gate. Bind is never gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Add an entry.
    Add,
    /// Compare an attribute value.
    Compare,
    /// Delete an entry.
    Delete,
    /// Modify an entry.
    Modify,
    /// Search the directory.
    Search,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "add",
            Self::Compare => "compare",
            Self::Delete => "delete",
            Self::Modify => "modify",
            Self::Search => "search",
        })
    }
}

/// The one identity with write access, and its secret.
#[derive(Debug)]
pub struct PrivilegedIdentity {
    dn: DistinguishedName,
    password: SecretString,
}

impl PrivilegedIdentity {
    /// Creates the privileged identity.
    #[must_use]
    pub fn new(dn: DistinguishedName, password: impl Into<String>) -> Self {
        Self {
            dn,
            password: SecretString::from(password.into()),
        }
    }

    /// Privileged DN.
    #[must_use]
    pub fn dn(&self) -> &DistinguishedName {
        &self.dn
    }

    /// True if `dn` names the privileged identity.
    #[must_use]
    pub fn is(&self, dn: &DistinguishedName) -> bool {
        self.dn.equivalent(dn)
    }

    /// True if `password` is the privileged secret.
    #[must_use]
    pub fn verify(&self, password: &str) -> bool {
        self.password.expose_secret() == password
    }

    /// Search is open to everyone; everything else needs the privileged identity bound.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InsufficientAccessRights`] when the bound identity may not perform `kind`.
    pub fn authorize(&self, bound: Option<&DistinguishedName>, kind: OperationKind) -> Result<()> {
        if kind == OperationKind::Search || bound.is_some_and(|dn| self.is(dn)) {
            return Ok(());
        }
        Err(Error::InsufficientAccessRights(format!(
            "{kind} requires {}",
            self.dn
        )))
    }
}
