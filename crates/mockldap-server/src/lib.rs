//! # mockldap-server
//!
//! A minimal in-memory LDAP directory for tests.
//!
//! Entries live in a flat map keyed by the first RDN of their DN. Anyone may search; every
//! other operation requires the connection to be bound as the configured privileged
//! identity.
//!
//! ## Example
//!
//! ```no_run
//! use mockldap_core::config::ServerConfig;
//! use mockldap_server::RunningServer;
//!
//! # async fn example() -> mockldap_core::Result<()> {
//! let server = RunningServer::start(&ServerConfig::default().with_port(0)).await?;
//! println!("listening on {}", server.url());
//! server.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod access;
pub mod directory;
pub mod filter;
pub mod handlers;
pub mod listener;
pub mod server;
pub mod session;
pub mod store;

pub use access::{OperationKind, PrivilegedIdentity};
pub use directory::{Directory, SearchOutcome};
pub use handlers::{Change, ChangeKind, SearchParams, SearchScope};
pub use listener::{LdapListener, ServerAction};
pub use server::RunningServer;
pub use session::{LdapResponseState, LdapSession};
pub use store::{Entry, EntryStore};
