//! # mockldap-core
//!
//! Core types shared by the mockldap directory server and its sample clients.
//!
//! ## Modules
//!
//! - [`error`] - Error type, LDAP result code mapping
//! - [`dn`] - Distinguished name parsing and suffix handling
//! - [`attributes`] - Case-insensitive attribute maps
//! - [`config`] - Server configuration

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod attributes;
pub mod config;
pub mod dn;
pub mod error;

// Re-export commonly used types
pub use attributes::AttributeMap;
pub use dn::{DistinguishedName, DistinguishedNameError, RelativeDistinguishedName};
pub use error::{Error, Result};
