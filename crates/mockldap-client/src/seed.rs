//! The fixed roster used to populate a fresh directory.

use mockldap_core::AttributeMap;

/// Mail domain given to seeded users.
pub const DEFAULT_MAIL_DOMAIN: &str = "ultraxinc.com";

/// Password every seeded user binds with.
pub const SEED_PASSWORD: &str = "123";

/// Full names of the seeded users.
pub const ROSTER: &[&str] = &[
    "Ben Hacker",
    "Sally Peters",
    "Chris Lincoln",
    "Brian Lincoln",
    "Sharon Hestad",
    "Michael Henley",
    "Troy Prewitt",
    "Travis Fisher",
    "Dave Petet",
    "Brett Nowlin",
    "Kyle McCracken",
    "Ryan Keeler",
    "Nick Ortiz",
    "King Butcher",
    "Gannon Ross",
    "Tyler Tisdale",
    "Alex Larman",
    "Scott Carlson",
];

/// One entry to add: its DN and attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedEntry {
    /// DN to add the entry under.
    pub dn: String,
    /// Attributes of the entry.
    pub attributes: AttributeMap,
}

/// Login name for `First Last`: lowercase first initial followed by the lowercase last name.
#[must_use]
pub fn username_for(first: &str, last: &str) -> String {
    let initial = first.chars().next().map(|c| c.to_lowercase().to_string());
    format!("{}{}", initial.unwrap_or_default(), last.to_lowercase())
}

/// Builds the roster entries beneath `suffix`.
#[must_use]
pub fn roster_entries(suffix: &str, mail_domain: &str) -> Vec<SeedEntry> {
    ROSTER
        .iter()
        .filter_map(|full_name| {
            let (first, last) = full_name.split_once(' ')?;
            let username = username_for(first, last);
            let mail = format!("{username}@{mail_domain}");
            let attributes = [
                ("cn", full_name.to_string()),
                ("givenname", first.to_string()),
                ("sn", last.to_string()),
                ("sAMAccountName", username.clone()),
                ("email", mail.clone()),
                ("mail", mail),
                ("userpassword", SEED_PASSWORD.to_string()),
                ("objectclass", "Person".to_string()),
            ]
            .into_iter()
            .map(|(name, value)| (name, [value]))
            .collect();
            Some(SeedEntry {
                dn: format!("cn={username}, {suffix}"),
                attributes,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames() {
        assert_eq!(username_for("Ben", "Hacker"), "bhacker");
        assert_eq!(username_for("Kyle", "McCracken"), "kmccracken");
    }

    #[test]
    fn roster_is_complete_and_unique() {
        let entries = roster_entries("o=testultrax", DEFAULT_MAIL_DOMAIN);
        assert_eq!(entries.len(), 18);

        let mut dns: Vec<&str> = entries.iter().map(|e| e.dn.as_str()).collect();
        dns.sort_unstable();
        dns.dedup();
        assert_eq!(dns.len(), 18);
    }

    #[test]
    fn entry_shape() {
        let entries = roster_entries("o=testultrax", "example.com");
        let chris = entries
            .iter()
            .find(|e| e.dn == "cn=clincoln, o=testultrax")
            .unwrap();
        assert_eq!(chris.attributes.first("cn"), Some("Chris Lincoln"));
        assert_eq!(chris.attributes.first("samaccountname"), Some("clincoln"));
        assert_eq!(chris.attributes.first("mail"), Some("clincoln@example.com"));
        assert_eq!(chris.attributes.first("email"), Some("clincoln@example.com"));
        assert_eq!(chris.attributes.first("userPassword"), Some("123"));
        assert_eq!(chris.attributes.len(), 8);
    }
}
