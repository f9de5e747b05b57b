//! # mockldap-client
//!
//! Sample clients for the mock directory: list users, authenticate a user and seed the
//! directory with a fixed roster.
//!
//! ## Example
//!
//! ```no_run
//! use mockldap_client::{DirectoryClient, DirectoryConfig};
//!
//! # async fn example() -> mockldap_core::Result<()> {
//! let config = DirectoryConfig::new("ldap://localhost:1389", "cn=root", "secret")?;
//! let client = DirectoryClient::new(config);
//!
//! for user in client.list_users().await? {
//!     println!("{:?}", user.full_name);
//! }
//! client.authenticate("clincoln", "123").await?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod seed;
pub mod user;

pub use client::{DirectoryClient, DirectoryEntry, SearchScope, SeedReport};
pub use config::DirectoryConfig;
pub use seed::{roster_entries, SeedEntry};
pub use user::DirectoryUser;
