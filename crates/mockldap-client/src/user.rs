//! Directory user records as presented by the listing client.

use serde::Serialize;

use crate::client::DirectoryEntry;

/// A user projected from a directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryUser {
    /// `cn` of the entry.
    pub full_name: Option<String>,
    /// Value of the configured username attribute.
    pub username: Option<String>,
    /// `mail` of the entry.
    pub email: Option<String>,
    /// `givenName` of the entry.
    pub first_name: Option<String>,
    /// `sn` of the entry.
    pub last_name: Option<String>,
}

impl DirectoryUser {
    /// Projects `entry`, reading the login name from `username_attribute`.
    ///
    /// Empty values are treated as missing.
    #[must_use]
    pub fn from_entry(entry: &DirectoryEntry, username_attribute: &str) -> Self {
        let field = |name: &str| {
            entry
                .attributes
                .first(name)
                .filter(|value| !value.is_empty())
                .map(str::to_owned)
        };

        Self {
            full_name: field("cn"),
            username: field(username_attribute),
            email: field("mail"),
            first_name: field("givenName"),
            last_name: field("sn"),
        }
    }

    /// True if the record has an email, a first and last name, and a full name containing
    /// whitespace.
    #[must_use]
    pub fn is_listable(&self) -> bool {
        self.email.is_some()
            && self.first_name.is_some()
            && self.last_name.is_some()
            && self
                .full_name
                .as_deref()
                .is_some_and(|name| name.contains(char::is_whitespace))
    }
}

/// Drops unlistable records and sorts the rest by full name.
#[must_use]
pub fn normalize_users(users: impl IntoIterator<Item = DirectoryUser>) -> Vec<DirectoryUser> {
    let mut listed: Vec<DirectoryUser> = users
        .into_iter()
        .filter(DirectoryUser::is_listable)
        .collect();
    listed.sort_by(|a, b| a.full_name.cmp(&b.full_name));
    listed
}
